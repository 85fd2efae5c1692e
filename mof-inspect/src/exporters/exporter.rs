use std::{io::Write, path::Path};

use cim_mof::{
    mof::models::{ElementFlags, NamedMap, Qualifier},
    CimClass, CimInstance, CimValue,
};

use crate::app::{
    error::RuntimeError,
    runtime::{Config, Decoded},
};

/// Defines behavior for decoding the input files and writing their records to an output stream
pub trait Exporter<'a, W: Write>: Sized {
    /// Create a new exporter that writes to `out`
    fn new(config: &'a Config, out: W) -> Self;
    /// The application state the exporter was created with
    fn config(&self) -> &'a Config;
    /// Write a single decoded class
    fn export_class(&mut self, file: &Path, class: &CimClass) -> Result<(), RuntimeError>;
    /// Write a single decoded instance
    fn export_instance(&mut self, file: &Path, instance: &CimInstance)
        -> Result<(), RuntimeError>;
    /// Get the stream to write to
    fn out(&mut self) -> &mut W;

    /// Decode every input file in order, stopping at the first failure
    fn iter_files(&mut self) -> Result<(), RuntimeError> {
        let config = self.config();
        for file in &config.options.files {
            match config.decode_file(file, config.options.mode)? {
                Decoded::Classes(classes) => {
                    for class in &classes {
                        self.export_class(file, class)?;
                    }
                }
                Decoded::Instances(instances) => {
                    for instance in &instances {
                        self.export_instance(file, instance)?;
                    }
                }
            }
        }
        self.out().flush().map_err(RuntimeError::DiskError)
    }

    fn write_to_file(out: &mut W, text: &str) -> Result<(), RuntimeError> {
        writeln!(out, "{text}").map_err(RuntimeError::DiskError)
    }
}

/// Defines behavior for formatting decoded records to the desired output format
pub(super) trait Writer<T> {
    /// Format a class with its local declarations
    fn format_class(&self, class: &CimClass) -> T;
    /// Format an instance, possibly embedded at `indent` levels deep
    fn format_instance(&self, instance: &CimInstance, indent: usize) -> T;
    /// Format a property, qualifier, or default value
    fn format_value(&self, value: &CimValue, indent: usize) -> T;
    /// Format a set of qualifiers
    fn format_qualifiers(&self, qualifiers: &NamedMap<Qualifier>) -> T;
}

/// MOF qualifier names for each element flag
const FLAG_NAMES: [(ElementFlags, &str); 10] = [
    (ElementFlags::KEY, "Key"),
    (ElementFlags::IN, "In"),
    (ElementFlags::OUT, "Out"),
    (ElementFlags::REQUIRED, "Required"),
    (ElementFlags::STATIC, "Static"),
    (ElementFlags::ABSTRACT, "Abstract"),
    (ElementFlags::TERMINAL, "Terminal"),
    (ElementFlags::EXPENSIVE, "Expensive"),
    (ElementFlags::STREAM, "Stream"),
    (ElementFlags::READONLY, "Read"),
];

/// The MOF qualifier names for a set of element flags
pub(super) fn flag_names(flags: ElementFlags) -> Vec<&'static str> {
    FLAG_NAMES
        .iter()
        .filter(|(flag, _)| flags.contains(*flag))
        .map(|(_, name)| *name)
        .collect()
}
