/*!
 Application state built from the command line options.
*/

use std::{
    fs,
    io::{stdout, BufWriter},
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use cim_mof::{
    mof::hooks::HookError, CimClass, CimInstance, DeserializeOptions, DeserializerConfig,
    MofDeserializer,
};
use log::info;

use crate::{
    app::{
        error::RuntimeError,
        options::{ExportType, Mode, Options},
        schema::SchemaRepository,
    },
    exporters::{exporter::Exporter, ndjson::NDJSON, txt::TXT},
};

/// The records decoded from one file
#[derive(Debug)]
pub enum Decoded {
    Classes(Vec<Arc<CimClass>>),
    Instances(Vec<CimInstance>),
}

/// Stores the application state and handles application lifecycle
pub struct Config {
    /// App configuration options
    pub options: Options,
    pub deserializer: MofDeserializer,
    /// Classes loaded from `--schema` files
    pub schema: SchemaRepository,
}

impl Config {
    /// Validate the options and load every schema file
    pub fn new(options: Options) -> Result<Config, RuntimeError> {
        options.validate()?;

        let mut config = DeserializerConfig::default();
        if let Some(namespace) = &options.namespace {
            let server = config.default_server.clone();
            config = config.with_default_namespace(&server, namespace);
        }
        if let Some(size) = options.max_size {
            config = config.with_max_buffer_size(size);
        }

        let mut app = Config {
            options,
            deserializer: MofDeserializer::with_config(config),
            schema: SchemaRepository::new(),
        };
        for path in app.options.schemas.clone() {
            let classes = match app.decode_file(&path, Mode::Classes)? {
                Decoded::Classes(classes) => classes,
                Decoded::Instances(_) => vec![],
            };
            info!("loaded {} classes from {}", classes.len(), path.display());
            classes.into_iter().for_each(|class| app.schema.add(class));
        }
        if !app.schema.is_empty() {
            info!("{} schema classes available", app.schema.len());
        }
        Ok(app)
    }

    /// Build the per-call options, wiring the hooks to the schema and the include directory
    pub fn deserialize_options(&self) -> DeserializeOptions<'_> {
        let mut options = DeserializeOptions::new();
        if let Some(locale) = self.options.locale.as_deref() {
            options = options.with_locale(locale);
        }
        if !self.schema.is_empty() {
            options = options.with_class_resolver(|_server, namespace, class_name| {
                self.schema.find(namespace, class_name).ok_or_else(|| {
                    HookError::from(format!(
                        "class `{class_name}` is not in any schema for {namespace}"
                    ))
                })
            });
        }
        if let Some(dir) = self.options.include_dir.as_deref() {
            options = options
                .with_include_resolver(move |file| Ok(fs::read(include_path(dir, file)?)?));
        }
        options
    }

    /// Read and decode a single file from its first byte
    pub fn decode_file(&self, path: &Path, mode: Mode) -> Result<Decoded, RuntimeError> {
        let bytes =
            fs::read(path).map_err(|why| RuntimeError::ReadError(why, path.to_path_buf()))?;
        let mut offset = 0;
        let options = self.deserialize_options();

        let decoded = match mode {
            Mode::Classes => self
                .deserializer
                .deserialize_classes(Some(bytes.as_slice()), &mut offset, options)
                .map(Decoded::Classes),
            Mode::Instances => self
                .deserializer
                .deserialize_instances(Some(bytes.as_slice()), &mut offset, options)
                .map(Decoded::Instances),
        };
        decoded.map_err(|why| RuntimeError::DeserializeError(why, path.to_path_buf()))
    }

    /// Decode every file and write the records in the selected format
    pub fn start(&self) -> Result<(), RuntimeError> {
        let out = BufWriter::new(stdout().lock());
        match self.options.format {
            ExportType::Txt => TXT::new(self, out).iter_files(),
            ExportType::Ndjson => NDJSON::new(self, out).iter_files(),
        }
    }
}

/// Resolve an included file name inside `dir`, refusing names that could leave it
fn include_path(dir: &Path, file: &str) -> Result<PathBuf, HookError> {
    let name = Path::new(file);
    if file.is_empty() || !name.components().all(|part| matches!(part, Component::Normal(_))) {
        return Err(HookError::from(format!(
            "included file `{file}` is not a plain path inside {}",
            dir.display()
        )));
    }
    Ok(dir.join(name))
}

#[cfg(test)]
mod tests {
    use std::{
        env::{current_dir, temp_dir},
        fs,
        path::PathBuf,
    };

    use clap::Parser;

    use crate::app::{
        options::{Mode, Options},
        runtime::{include_path, Config, Decoded},
    };

    fn fixture(name: &str) -> PathBuf {
        current_dir()
            .unwrap()
            .as_path()
            .join("../cim-mof/test_data/mof")
            .join(name)
    }

    fn config(args: &[&str]) -> Config {
        let mut argv = vec!["mof-inspect"];
        argv.extend_from_slice(args);
        Config::new(Options::try_parse_from(argv).unwrap()).unwrap()
    }

    #[test]
    fn can_decode_file() {
        let path = fixture("TwoClasses.bmof");
        let app = config(&[path.to_str().unwrap()]);

        match app.decode_file(&path, Mode::Classes).unwrap() {
            Decoded::Classes(classes) => assert_eq!(classes.len(), 2),
            Decoded::Instances(_) => panic!("expected classes"),
        }
    }

    /// A document holding one instance of `B` that sets `p`, with no class declarations
    fn instance_only_document() -> Vec<u8> {
        let mut body = vec![];
        body.extend(1u32.to_le_bytes());
        body.extend(b"B");
        body.extend(1u16.to_le_bytes());
        body.extend(1u32.to_le_bytes());
        body.extend(b"p");
        body.push(0x01);
        body.extend(1u32.to_le_bytes());
        body.extend(b"x");

        let mut bytes = b"BMOF".to_vec();
        bytes.extend(1u16.to_le_bytes());
        bytes.push(0x02);
        bytes.extend((body.len() as u32).to_le_bytes());
        bytes.extend(body);
        bytes.push(0x00);
        bytes
    }

    #[test]
    fn can_resolve_from_schema() {
        let schema = fixture("TwoClasses.bmof");
        let data = temp_dir().join("mof-inspect-instance-only.bmof");
        fs::write(&data, instance_only_document()).unwrap();

        let app = config(&["-s", schema.to_str().unwrap(), data.to_str().unwrap()]);
        assert_eq!(app.schema.len(), 2);

        match app.decode_file(&data, Mode::Instances).unwrap() {
            Decoded::Instances(instances) => {
                assert_eq!(instances.len(), 1);
                assert_eq!(instances[0].class_name(), "B");
                assert_eq!(instances[0].class.superclass_name(), Some("A"));
            }
            Decoded::Classes(_) => panic!("expected instances"),
        }

        let without_schema = config(&[data.to_str().unwrap()]);
        assert!(without_schema.decode_file(&data, Mode::Instances).is_err());
    }

    /// A document made of `records` followed by an end tag
    fn document(records: &[Vec<u8>]) -> Vec<u8> {
        let mut bytes = b"BMOF".to_vec();
        bytes.extend(1u16.to_le_bytes());
        records.iter().for_each(|record| bytes.extend(record));
        bytes.push(0x00);
        bytes
    }

    fn include_record(file: &str) -> Vec<u8> {
        let mut record = vec![0x03];
        record.extend((file.len() as u32 + 4).to_le_bytes());
        record.extend((file.len() as u32).to_le_bytes());
        record.extend(file.as_bytes());
        record
    }

    #[test]
    fn can_resolve_include_path() {
        let dir = PathBuf::from("inc");
        assert_eq!(include_path(&dir, "a.bmof").unwrap(), dir.join("a.bmof"));
        assert_eq!(
            include_path(&dir, "nested/a.bmof").unwrap(),
            dir.join("nested").join("a.bmof")
        );
    }

    #[test]
    fn cant_resolve_include_outside_dir() {
        let dir = PathBuf::from("inc");
        assert!(include_path(&dir, "../secret.bmof").is_err());
        assert!(include_path(&dir, "nested/../../secret.bmof").is_err());
        assert!(include_path(&dir, "/etc/secret.bmof").is_err());
        assert!(include_path(&dir, "./a.bmof").is_err());
        assert!(include_path(&dir, "").is_err());
    }

    #[test]
    fn can_read_include_from_dir() {
        let root = temp_dir().join("mof-inspect-include-inside");
        let inc = root.join("inc");
        fs::create_dir_all(&inc).unwrap();
        fs::write(inc.join("empty.bmof"), document(&[])).unwrap();
        let data = root.join("main.bmof");
        fs::write(&data, document(&[include_record("empty.bmof")])).unwrap();

        let app = config(&["-i", inc.to_str().unwrap(), data.to_str().unwrap()]);
        match app.decode_file(&data, Mode::Classes).unwrap() {
            Decoded::Classes(classes) => assert!(classes.is_empty()),
            Decoded::Instances(_) => panic!("expected classes"),
        }
    }

    #[test]
    fn cant_read_include_outside_dir() {
        let root = temp_dir().join("mof-inspect-include-outside");
        let inc = root.join("inc");
        fs::create_dir_all(&inc).unwrap();
        fs::write(root.join("secret.bmof"), document(&[])).unwrap();
        let data = inc.join("main.bmof");
        fs::write(&data, document(&[include_record("../secret.bmof")])).unwrap();

        let app = config(&["-i", inc.to_str().unwrap(), data.to_str().unwrap()]);
        let error = app.decode_file(&data, Mode::Classes).unwrap_err();
        assert!(error.to_string().contains("not a plain path"));
    }

    #[test]
    fn can_decode_text_with_pragma_include() {
        let root = temp_dir().join("mof-inspect-include-text");
        let inc = root.join("inc");
        fs::create_dir_all(&inc).unwrap();
        fs::write(inc.join("base.mof"), "class A{string p;};").unwrap();
        let data = root.join("main.mof");
        fs::write(
            &data,
            "#pragma include(\"base.mof\")\ninstance of A{p=\"a\";};",
        )
        .unwrap();

        let app = config(&["-i", inc.to_str().unwrap(), data.to_str().unwrap()]);
        match app.decode_file(&data, Mode::Instances).unwrap() {
            Decoded::Instances(instances) => {
                assert_eq!(instances.len(), 1);
                assert_eq!(instances[0].class_name(), "A");
            }
            Decoded::Classes(_) => panic!("expected instances"),
        }

        fs::write(&data, "#pragma include(\"../main.mof\")").unwrap();
        let error = app.decode_file(&data, Mode::Classes).unwrap_err();
        assert!(error.to_string().contains("not a plain path"));
    }

    #[test]
    fn cant_decode_missing_file() {
        let path = fixture("Missing.bmof");
        let app = config(&[path.to_str().unwrap()]);

        assert!(app.decode_file(&path, Mode::Classes).is_err());
    }

    #[test]
    fn can_apply_size_limit() {
        let path = fixture("Inventory.bmof");
        let app = config(&["--max-size", "16", path.to_str().unwrap()]);

        let error = app.decode_file(&path, Mode::Classes).unwrap_err();
        assert!(error.to_string().contains("size limit exceeded"));
    }
}
