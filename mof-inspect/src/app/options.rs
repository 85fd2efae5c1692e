/*!
 Command line options for the inspector.
*/

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::app::error::RuntimeError;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Option names, reused in validation messages
pub const OPTION_INCLUDE_DIR: &str = "include-dir";
pub const OPTION_MAX_SIZE: &str = "max-size";
pub const OPTION_NAMESPACE: &str = "namespace";

const LONG_ABOUT: &str = "Decode CIM MOF text or binary MOF files and print their classes or instances.

Classes that a file refers to but does not declare are looked up in the files passed with
-s/--schema. Include records and `#pragma include` are resolved against -i/--include-dir;
without it, a file that includes another fails to decode.

Set MOF_LOG=debug to trace the records as they are decoded.";

/// Which records to print
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Mode {
    #[default]
    Classes,
    Instances,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ExportType {
    /// MOF-like text
    #[default]
    Txt,
    /// One JSON object per line
    Ndjson,
}

#[derive(Parser, Debug)]
#[command(
    name = "mof-inspect",
    version = VERSION,
    about = "Decode and inspect CIM MOF files",
    long_about = LONG_ABOUT
)]
pub struct Options {
    /// MOF files to decode, each from its first byte
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,
    #[arg(short = 'm', long = "mode", value_enum, default_value_t = Mode::Classes)]
    pub mode: Mode,
    #[arg(short = 'f', long = "format", value_enum, default_value_t = ExportType::Txt)]
    pub format: ExportType,
    /// MOF files whose classes back lookups of undeclared classes
    #[arg(short = 's', long = "schema", value_name = "FILE")]
    pub schemas: Vec<PathBuf>,
    /// Directory that includes are resolved against
    #[arg(short = 'i', long = OPTION_INCLUDE_DIR, value_name = "DIR")]
    pub include_dir: Option<PathBuf>,
    /// Namespace used until a file sets its own
    #[arg(long = OPTION_NAMESPACE, value_name = "NAMESPACE")]
    pub namespace: Option<String>,
    /// Largest file, in bytes, that will be decoded
    #[arg(long = OPTION_MAX_SIZE, value_name = "BYTES")]
    pub max_size: Option<usize>,
    /// Locale forwarded to the deserializer
    #[arg(long = "locale", value_name = "LOCALE")]
    pub locale: Option<String>,
}

impl Options {
    /// Reject option values that parse but cannot be used
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if let Some(dir) = &self.include_dir {
            if !dir.is_dir() {
                return Err(RuntimeError::InvalidOptions(format!(
                    "--{OPTION_INCLUDE_DIR} {} is not a directory",
                    dir.display()
                )));
            }
        }
        if self.max_size == Some(0) {
            return Err(RuntimeError::InvalidOptions(format!(
                "--{OPTION_MAX_SIZE} must be greater than 0"
            )));
        }
        if self.namespace.as_deref().is_some_and(str::is_empty) {
            return Err(RuntimeError::InvalidOptions(format!(
                "--{OPTION_NAMESPACE} cannot be empty"
            )));
        }
        Ok(())
    }
}
