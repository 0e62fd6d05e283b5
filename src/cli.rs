//! Minimal CLI parsing for run overrides.

use std::env;
use std::path::PathBuf;

#[derive(Debug, Default)]
pub struct CliOptions {
    pub concurrency: Option<usize>,
    pub output: Option<PathBuf>,
}

impl CliOptions {
    pub fn from_args() -> Self {
        let mut options = CliOptions::default();
        let mut args = env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--concurrency" => {
                    if let Some(value) = args.next() {
                        options.concurrency = value.parse().ok();
                    }
                }
                "--output" => {
                    if let Some(value) = args.next() {
                        options.output = Some(PathBuf::from(value));
                    }
                }
                _ if arg.starts_with("--concurrency=") => {
                    if let Some(value) = arg.split_once('=').map(|(_, v)| v) {
                        options.concurrency = value.parse().ok();
                    }
                }
                _ if arg.starts_with("--output=") => {
                    if let Some(value) = arg.split_once('=').map(|(_, v)| v) {
                        options.output = Some(PathBuf::from(value));
                    }
                }
                _ => {}
            }
        }
        options
    }
}
