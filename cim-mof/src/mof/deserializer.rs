/*!
 Entry points that turn a buffer of MOF data into classes or instances.

 A buffer holds MOF text, or one or more binary documents back to back, optionally followed by MOF text.
 Each binary document is a signature, a format version, a sequence of tagged and length-prefixed records,
 and an end tag. Wherever a document could start, bytes without the signature are read as MOF text to the
 end of the buffer.
*/

use std::sync::Arc;

use log::{debug, warn};

use crate::{
    error::mof::MofError,
    mof::{
        config::DeserializerConfig,
        hooks::DeserializeOptions,
        models::{CimClass, CimInstance},
        session::{Record, Session, Target},
    },
    util::cursor::MofCursor,
};

/// Marks the start of every document
pub const SIGNATURE: &[u8; 4] = b"BMOF";
/// Signature and format version
const HEADER_LENGTH: usize = 6;

/// Closes a document; carries no length
const END: u8 = 0x00;
/// A class declaration
const CLASS: u8 = 0x01;
/// An instance of a class
const INSTANCE: u8 = 0x02;
/// Names a file whose documents are decoded in place
const INCLUDE: u8 = 0x03;
/// A `name`/`value` compiler directive
const PRAGMA: u8 = 0x04;

/// Decodes MOF text and binary MOF buffers
///
/// The deserializer holds only immutable configuration, so one value can serve any number of calls.
///
/// # Example:
///
/// ```
/// use cim_mof::{error::mof::ErrorKind, mof::{deserializer::MofDeserializer, hooks::DeserializeOptions}};
///
/// let deserializer = MofDeserializer::new();
/// let buffer = [0x00u8];
/// let mut offset = 0;
/// let result = deserializer.deserialize_classes(Some(&buffer[..]), &mut offset, DeserializeOptions::new());
///
/// assert_eq!(result.unwrap_err().kind(), ErrorKind::MalformedContent);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MofDeserializer {
    config: DeserializerConfig,
}

impl MofDeserializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DeserializerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DeserializerConfig {
        &self.config
    }

    /// Decode every class in `buffer`, starting at `offset`
    ///
    /// Instance records are skipped without being decoded. On success `offset` is left at the end
    /// of the buffer; on failure it is left after the last complete top-level record.
    pub fn deserialize_classes(
        &self,
        buffer: Option<&[u8]>,
        offset: &mut usize,
        options: DeserializeOptions<'_>,
    ) -> Result<Vec<Arc<CimClass>>, MofError> {
        let records = self.deserialize(buffer, offset, options, Target::Classes)?;
        Ok(records
            .into_iter()
            .filter_map(|record| match record {
                Record::Class(class) => Some(class),
                Record::Instance(_) => None,
            })
            .collect())
    }

    /// Decode every instance in `buffer`, starting at `offset`
    ///
    /// Class records are decoded so later instances can bind to them, but are not returned.
    pub fn deserialize_instances(
        &self,
        buffer: Option<&[u8]>,
        offset: &mut usize,
        options: DeserializeOptions<'_>,
    ) -> Result<Vec<CimInstance>, MofError> {
        let records = self.deserialize(buffer, offset, options, Target::Instances)?;
        Ok(records
            .into_iter()
            .filter_map(|record| match record {
                Record::Instance(instance) => Some(instance),
                Record::Class(_) => None,
            })
            .collect())
    }

    fn check_size(&self, size: usize) -> Result<(), MofError> {
        if size > self.config.max_buffer_size {
            return Err(MofError::SizeLimitExceeded {
                size,
                limit: self.config.max_buffer_size,
            });
        }
        Ok(())
    }

    fn deserialize(
        &self,
        buffer: Option<&[u8]>,
        offset: &mut usize,
        options: DeserializeOptions<'_>,
        target: Target,
    ) -> Result<Vec<Record>, MofError> {
        let buffer = buffer.ok_or(MofError::NullBuffer)?;
        self.check_size(buffer.len())?;
        if *offset >= buffer.len() {
            return Err(MofError::OffsetOutOfRange {
                offset: *offset,
                len: buffer.len(),
            });
        }

        let mut session = Session::new(&self.config, options, target);
        debug!(
            target: "mof",
            "deserializing {target:?} from {} bytes at {:#x}, locale {}",
            buffer.len(),
            *offset,
            session.locale.unwrap_or("default")
        );

        let mut cursor = MofCursor::at(buffer, *offset)?;
        let mut out = vec![];
        session.read_documents(&mut cursor, &mut out, Some(offset))?;
        Ok(out)
    }
}

impl Session<'_, '_> {
    /// Read documents until the cursor is exhausted
    ///
    /// `committed` is moved past each top-level record or declaration as soon as it has been decoded.
    fn read_documents(
        &mut self,
        cursor: &mut MofCursor,
        out: &mut Vec<Record>,
        mut committed: Option<&mut usize>,
    ) -> Result<(), MofError> {
        while !cursor.is_empty() {
            if !cursor.remaining_bytes().starts_with(SIGNATURE) {
                return self.read_text(cursor, out, committed);
            }
            self.read_header(cursor)?;
            loop {
                let done = self.read_record(cursor, out)?;
                if let Some(committed) = committed.as_deref_mut() {
                    *committed = cursor.position();
                }
                if done {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Validate a document signature and format version
    fn read_header(&self, cursor: &mut MofCursor) -> Result<(), MofError> {
        let start = cursor.position();
        let bytes = cursor.remaining_bytes();
        if bytes.len() < HEADER_LENGTH || !bytes.starts_with(SIGNATURE) {
            return Err(MofError::InvalidSignature(start));
        }
        cursor.read_exact_bytes(SIGNATURE.len())?;

        let version = cursor.read_u16()?;
        if version == 0 {
            return Err(MofError::InvalidVersion {
                version,
                offset: start,
            });
        }
        if version > self.config.format_version {
            return Err(MofError::UnsupportedVersion {
                version,
                supported: self.config.format_version,
            });
        }
        debug!(target: "mof", "document version {version} at {start:#x}");
        Ok(())
    }

    /// Read one record, returning whether it was the end of the document
    fn read_record(
        &mut self,
        cursor: &mut MofCursor,
        out: &mut Vec<Record>,
    ) -> Result<bool, MofError> {
        let start = cursor.position();
        let tag = cursor.read_u8()?;
        if tag == END {
            return Ok(true);
        }
        if !matches!(tag, CLASS | INSTANCE | INCLUDE | PRAGMA) {
            return Err(MofError::UnknownRecord { tag, offset: start });
        }

        let length = cursor.read_u32()? as usize;
        let mut body = cursor.read_block(length)?;
        match tag {
            CLASS => {
                let class = self.read_class(&mut body)?;
                if self.target == Target::Classes {
                    out.push(Record::Class(class));
                }
            }
            INSTANCE if self.target == Target::Classes => {
                // Skipped, not decoded
                return Ok(false);
            }
            INSTANCE => {
                let instance = self.read_instance(&mut body, 0)?;
                out.push(Record::Instance(instance));
            }
            INCLUDE => {
                let file = body.read_string()?;
                body.finish()?;
                self.include(&file, out)?;
            }
            _ => {
                let name = body.read_string()?;
                let value = body.read_string()?;
                self.apply_pragma(&name, &value);
            }
        }
        body.finish()?;
        Ok(false)
    }

    pub(crate) fn apply_pragma(&mut self, name: &str, value: &str) {
        match name.to_lowercase().as_str() {
            "namespace" => self.set_namespace(value),
            "locale" | "instancelocale" | "classflags" | "deleteclass" => {
                debug!(target: "mof", "ignoring pragma {name}(\"{value}\")");
            }
            _ => warn!(target: "mof", "skipping unknown pragma {name}(\"{value}\")"),
        }
    }

    /// Decode an included file as if it appeared in place of the include record or pragma
    pub(crate) fn include(&mut self, file: &str, out: &mut Vec<Record>) -> Result<(), MofError> {
        if self.get_included_file.is_none() {
            return Err(MofError::MissingIncludeResolver(file.to_string()));
        }
        if !self.config.include_files {
            return Err(MofError::IncludeNotSupported(file.to_string()));
        }
        if self.includes.len() >= self.config.max_include_depth {
            return Err(MofError::IncludeTooDeep(self.config.max_include_depth));
        }
        if self.includes.iter().any(|open| open == file) {
            return Err(MofError::IncludeCycle(file.to_string()));
        }

        let content = match self.get_included_file.as_mut() {
            Some(hook) => hook(file).map_err(|source| MofError::IncludeResolution {
                file: file.to_string(),
                source,
            })?,
            None => return Err(MofError::MissingIncludeResolver(file.to_string())),
        };
        if content.len() > self.config.max_buffer_size {
            return Err(MofError::SizeLimitExceeded {
                size: content.len(),
                limit: self.config.max_buffer_size,
            });
        }
        debug!(target: "mof", "including `{file}` ({} bytes)", content.len());

        self.includes.push(file.to_string());
        let mut cursor = MofCursor::new(&content);
        let result = self.read_documents(&mut cursor, out, None);
        self.includes.pop();

        result.map_err(|source| MofError::Included {
            file: file.to_string(),
            source: Box::new(source),
        })
    }
}
