/*!
 MOF text, the interchange form of the language: `class A { string p; };`.

 Text is decoded from UTF-8 or UTF-16, with or without a byte order mark, then parsed and compiled
 one declaration at a time so each class is visible to the declarations after it.
*/

pub(crate) mod compile;
mod lexer;
mod parser;

use log::debug;

use crate::{
    error::mof::MofError,
    mof::{
        session::{Record, Session, Target},
        text::parser::{Declaration, Parser},
    },
    util::cursor::MofCursor,
};

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];
const UTF16_LE_BOM: [u8; 2] = [0xFF, 0xFE];
const UTF16_BE_BOM: [u8; 2] = [0xFE, 0xFF];

/// Maps positions in decoded text back to offsets in the buffer it was decoded from
#[derive(Debug)]
struct ByteOffsets {
    /// Buffer offset of the first character, after any byte order mark
    base: usize,
    /// Bytes per UTF-16 code unit, or `None` for UTF-8 text
    unit_width: Option<usize>,
    /// The last text position mapped, and the code units before it
    text_pos: usize,
    units: usize,
}

impl ByteOffsets {
    fn utf8(base: usize) -> Self {
        Self {
            base,
            unit_width: None,
            text_pos: 0,
            units: 0,
        }
    }

    fn utf16(base: usize) -> Self {
        Self {
            base,
            unit_width: Some(2),
            text_pos: 0,
            units: 0,
        }
    }

    /// The buffer offset of byte `pos` of `text`; positions must not decrease between calls
    fn at(&mut self, text: &str, pos: usize) -> usize {
        let Some(width) = self.unit_width else {
            return self.base + pos;
        };
        self.units += text
            .get(self.text_pos..pos)
            .map_or(0, |skipped| skipped.encode_utf16().count());
        self.text_pos = pos;
        self.base + self.units * width
    }
}

/// Decode MOF text starting at buffer offset `start`
fn decode(bytes: &[u8], start: usize) -> Result<(String, ByteOffsets), MofError> {
    if let Some(rest) = bytes.strip_prefix(&UTF8_BOM) {
        return decode_utf8(rest, start + UTF8_BOM.len());
    }
    if let Some(rest) = bytes.strip_prefix(&UTF16_LE_BOM) {
        return decode_utf16(rest, start + UTF16_LE_BOM.len(), u16::from_le_bytes);
    }
    if let Some(rest) = bytes.strip_prefix(&UTF16_BE_BOM) {
        return decode_utf16(rest, start + UTF16_BE_BOM.len(), u16::from_be_bytes);
    }

    // MOF text starts with ASCII, so a zero byte next to a non-zero one marks UTF-16 without a BOM
    match bytes {
        [first, 0, ..] if *first != 0 => decode_utf16(bytes, start, u16::from_le_bytes),
        [0, second, ..] if *second != 0 => decode_utf16(bytes, start, u16::from_be_bytes),
        _ => decode_utf8(bytes, start),
    }
}

fn decode_utf8(bytes: &[u8], base: usize) -> Result<(String, ByteOffsets), MofError> {
    let text = std::str::from_utf8(bytes).map_err(|source| MofError::InvalidString {
        offset: base + source.valid_up_to(),
        source,
    })?;
    Ok((text.to_string(), ByteOffsets::utf8(base)))
}

fn decode_utf16(
    bytes: &[u8],
    base: usize,
    unit: fn([u8; 2]) -> u16,
) -> Result<(String, ByteOffsets), MofError> {
    if bytes.len() % 2 != 0 {
        return Err(MofError::InvalidUtf16 {
            offset: base + bytes.len() - 1,
        });
    }

    let units = bytes.chunks_exact(2).map(|pair| unit([pair[0], pair[1]]));
    let mut text = String::with_capacity(bytes.len() / 2);
    let mut decoded = 0;
    for letter in char::decode_utf16(units) {
        let Ok(letter) = letter else {
            return Err(MofError::InvalidUtf16 {
                offset: base + decoded * 2,
            });
        };
        decoded += letter.len_utf16();
        text.push(letter);
    }
    Ok((text, ByteOffsets::utf16(base)))
}

impl Session<'_, '_> {
    /// Compile the MOF text that fills the rest of the cursor
    ///
    /// `committed` is moved past each declaration as soon as it has been compiled.
    pub(crate) fn read_text(
        &mut self,
        cursor: &mut MofCursor,
        out: &mut Vec<Record>,
        mut committed: Option<&mut usize>,
    ) -> Result<(), MofError> {
        let start = cursor.position();
        let (text, mut offsets) = decode(cursor.remaining_bytes(), start)?;
        debug!(target: "mof", "compiling {} bytes of MOF text at {start:#x}", text.len());

        let mut parser = Parser::new(&text, self.config.max_instance_depth);
        while let Some(declaration) = parser.next_declaration()? {
            self.compile_declaration(declaration, out)?;
            if let Some(committed) = committed.as_deref_mut() {
                *committed = offsets.at(&text, parser.consumed());
            }
        }

        // Trailing whitespace and comments belong to the text
        cursor.read_exact_bytes(cursor.remaining())?;
        if let Some(committed) = committed {
            *committed = cursor.position();
        }
        Ok(())
    }

    fn compile_declaration(
        &mut self,
        declaration: Declaration,
        out: &mut Vec<Record>,
    ) -> Result<(), MofError> {
        match declaration {
            Declaration::Class(syntax) => {
                let class = self.compile_class(syntax)?;
                if self.target == Target::Classes {
                    out.push(Record::Class(class));
                }
            }
            // Skipped, not compiled
            Declaration::Instance(_) if self.target == Target::Classes => {}
            Declaration::Instance(syntax) => {
                let instance = self.compile_instance(&syntax, 0)?;
                out.push(Record::Instance(instance));
            }
            Declaration::Pragma { name, value } if name.eq_ignore_ascii_case("include") => {
                self.include(&value, out)?;
            }
            Declaration::Pragma { name, value } => self.apply_pragma(&name, &value),
            Declaration::QualifierType(syntax) => self.compile_qualifier_type(syntax)?,
        }
        Ok(())
    }
}
