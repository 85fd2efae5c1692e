#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod app;
mod exporters;

use std::process::ExitCode;

use clap::Parser;

use crate::app::{options::Options, runtime::Config};

fn main() -> ExitCode {
    env_logger::Builder::from_env("MOF_LOG")
        .format_timestamp(None)
        .init();

    let options = Options::parse();
    match Config::new(options).and_then(|app| app.start()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(why) => {
            eprintln!("{why}");
            ExitCode::FAILURE
        }
    }
}
