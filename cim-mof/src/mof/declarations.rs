/*!
 Decoders for the pieces classes are built from: type tags, flags, values, qualifiers, properties, and methods.
*/

use log::trace;

use crate::{
    error::mof::MofError,
    mof::{
        models::{
            CimInstance, CimType, CimValue, ElementFlags, Flavor, MethodDeclaration, NamedMap,
            ParameterDeclaration, PropertyDeclaration, Qualifier,
        },
        session::Session,
    },
    util::{cursor::MofCursor, dates::parse_dmtf},
};

/// Value slot marker for `NULL`
const VALUE_NULL: u8 = 0x00;
/// Value slot marker for a present value
const VALUE_PRESENT: u8 = 0x01;

impl Session<'_, '_> {
    /// Read a type tag, rejecting tags that do not name a CIM type
    pub(crate) fn read_type(&self, cursor: &mut MofCursor) -> Result<CimType, MofError> {
        let offset = cursor.position();
        let tag = cursor.read_u8()?;
        CimType::from_tag(tag).ok_or(MofError::UnknownType { tag, offset })
    }

    /// Read a qualifier flavor, filling in the CIM defaults for unset pairs
    fn read_flavor(&self, cursor: &mut MofCursor) -> Result<Flavor, MofError> {
        let offset = cursor.position();
        let bits = cursor.read_u32()?;
        Flavor::from_bits(bits)
            .and_then(Flavor::with_defaults)
            .ok_or(MofError::InvalidFlags {
                what: "flavor",
                bits,
                offset,
            })
    }

    fn read_element_flags(&self, cursor: &mut MofCursor) -> Result<ElementFlags, MofError> {
        let offset = cursor.position();
        let bits = cursor.read_u32()?;
        ElementFlags::from_bits(bits).ok_or(MofError::InvalidFlags {
            what: "element",
            bits,
            offset,
        })
    }

    /// Read the class named by a reference or embedded instance declaration, if any
    fn read_reference_class(
        &self,
        cursor: &mut MofCursor,
        cim_type: CimType,
    ) -> Result<Option<String>, MofError> {
        let offset = cursor.position();
        let class_name = cursor.read_string()?;
        if class_name.is_empty() {
            return Ok(None);
        }
        if !cim_type.accepts_class() {
            return Err(MofError::InvalidDeclaration {
                offset,
                reason: "only references and embedded instances may name a class",
            });
        }
        Ok(Some(class_name))
    }

    /// Read a presence marker and, if present, a value of `cim_type`
    ///
    /// `owner` names the element the value belongs to, for diagnostics.
    pub(crate) fn read_value_slot(
        &mut self,
        cursor: &mut MofCursor,
        cim_type: CimType,
        reference_class: Option<&str>,
        owner: &str,
        depth: usize,
    ) -> Result<Option<CimValue>, MofError> {
        let offset = cursor.position();
        match cursor.read_u8()? {
            VALUE_NULL => Ok(None),
            VALUE_PRESENT => self
                .read_value(cursor, cim_type, reference_class, owner, depth)
                .map(Some),
            value => Err(MofError::InvalidMarker {
                what: "value presence",
                value,
                offset,
            }),
        }
    }

    /// Read a value of `cim_type`, which may be an array
    pub(crate) fn read_value(
        &mut self,
        cursor: &mut MofCursor,
        cim_type: CimType,
        reference_class: Option<&str>,
        owner: &str,
        depth: usize,
    ) -> Result<CimValue, MofError> {
        if !cim_type.is_array() {
            return self.read_scalar(cursor, cim_type, reference_class, owner, depth);
        }

        let offset = cursor.position();
        let count = cursor.read_u32()? as usize;
        // Every element takes at least one byte
        if count > cursor.remaining() {
            return Err(MofError::ArrayTooLong {
                offset,
                count,
                remaining: cursor.remaining(),
            });
        }

        let element_type = cim_type.element_type();
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(self.read_scalar(cursor, element_type, reference_class, owner, depth)?);
        }
        Ok(CimValue::Array(items))
    }

    fn read_scalar(
        &mut self,
        cursor: &mut MofCursor,
        cim_type: CimType,
        reference_class: Option<&str>,
        owner: &str,
        depth: usize,
    ) -> Result<CimValue, MofError> {
        let offset = cursor.position();
        let value = match cim_type {
            CimType::Boolean => match cursor.read_u8()? {
                0 => CimValue::Boolean(false),
                1 => CimValue::Boolean(true),
                value => {
                    return Err(MofError::InvalidMarker {
                        what: "boolean",
                        value,
                        offset,
                    })
                }
            },
            CimType::UInt8 => CimValue::UInt8(cursor.read_u8()?),
            CimType::SInt8 => CimValue::SInt8(cursor.read_i8()?),
            CimType::UInt16 => CimValue::UInt16(cursor.read_u16()?),
            CimType::SInt16 => CimValue::SInt16(cursor.read_i16()?),
            CimType::UInt32 => CimValue::UInt32(cursor.read_u32()?),
            CimType::SInt32 => CimValue::SInt32(cursor.read_i32()?),
            CimType::UInt64 => CimValue::UInt64(cursor.read_u64()?),
            CimType::SInt64 => CimValue::SInt64(cursor.read_i64()?),
            CimType::Real32 => CimValue::Real32(cursor.read_f32()?),
            CimType::Real64 => CimValue::Real64(cursor.read_f64()?),
            CimType::Char16 => CimValue::Char16(cursor.read_u16()?),
            CimType::DateTime => {
                let text = cursor.read_string()?;
                match parse_dmtf(&text) {
                    Ok(value) => CimValue::DateTime(value),
                    Err(reason) => {
                        return Err(MofError::InvalidDateTime {
                            value: text,
                            reason,
                        })
                    }
                }
            }
            CimType::String => CimValue::String(cursor.read_string()?),
            CimType::Reference => CimValue::Reference(cursor.read_string()?),
            CimType::Instance => {
                let instance = self.read_instance(cursor, depth + 1)?;
                embed(instance, reference_class, owner)?
            }
            _ => {
                return Err(MofError::InvalidDeclaration {
                    offset,
                    reason: "array elements cannot be arrays",
                })
            }
        };
        Ok(value)
    }

    /// Read a count-prefixed list of qualifiers attached to `owner`
    pub(crate) fn read_qualifiers(
        &mut self,
        cursor: &mut MofCursor,
        owner: &str,
    ) -> Result<NamedMap<Qualifier>, MofError> {
        let count = cursor.read_u16()?;
        let mut qualifiers = NamedMap::new();
        for _ in 0..count {
            let name = self.read_name(cursor, "qualifier")?;
            let cim_type = self.read_type(cursor)?;
            let flavor = self.read_flavor(cursor)?;
            let value = self.read_value_slot(cursor, cim_type, None, &name, 0)?;

            trace!(target: "mof", "qualifier `{name}` on `{owner}`: {value:?}");
            insert_unique(
                &mut qualifiers,
                owner,
                &name,
                Qualifier {
                    name: name.clone(),
                    cim_type,
                    flavor,
                    value,
                    propagated: false,
                },
            )?;
        }
        Ok(qualifiers)
    }

    /// Read a property declared by `class_name`
    pub(crate) fn read_property(
        &mut self,
        cursor: &mut MofCursor,
        class_name: &str,
    ) -> Result<PropertyDeclaration, MofError> {
        let name = self.read_name(cursor, "property")?;
        let cim_type = self.read_type(cursor)?;
        let flags = self.read_element_flags(cursor)?;
        let reference_class = self.read_reference_class(cursor, cim_type)?;
        let owner = format!("{class_name}.{name}");
        let qualifiers = self.read_qualifiers(cursor, &owner)?;
        let default =
            self.read_value_slot(cursor, cim_type, reference_class.as_deref(), &owner, 0)?;

        trace!(target: "mof", "property `{owner}` of type {cim_type}");
        Ok(PropertyDeclaration {
            name,
            cim_type,
            flags,
            reference_class,
            qualifiers,
            default,
            class_origin: class_name.to_string(),
            propagated: false,
        })
    }

    fn read_parameter(
        &mut self,
        cursor: &mut MofCursor,
        method: &str,
    ) -> Result<ParameterDeclaration, MofError> {
        let name = self.read_name(cursor, "parameter")?;
        let cim_type = self.read_type(cursor)?;
        let flags = self.read_element_flags(cursor)?;
        let reference_class = self.read_reference_class(cursor, cim_type)?;
        let qualifiers = self.read_qualifiers(cursor, &format!("{method}({name})"))?;

        Ok(ParameterDeclaration {
            name,
            cim_type,
            flags,
            reference_class,
            qualifiers,
        })
    }

    /// Read a method declared by `class_name`
    pub(crate) fn read_method(
        &mut self,
        cursor: &mut MofCursor,
        class_name: &str,
    ) -> Result<MethodDeclaration, MofError> {
        let name = self.read_name(cursor, "method")?;
        let return_type = self.read_type(cursor)?;
        let owner = format!("{class_name}.{name}");
        let qualifiers = self.read_qualifiers(cursor, &owner)?;

        let count = cursor.read_u16()?;
        let mut parameters = NamedMap::new();
        for _ in 0..count {
            let parameter = self.read_parameter(cursor, &owner)?;
            insert_unique(&mut parameters, &owner, &parameter.name.clone(), parameter)?;
        }

        trace!(target: "mof", "method `{owner}` with {count} parameters");
        Ok(MethodDeclaration {
            name,
            return_type,
            qualifiers,
            parameters,
            class_origin: class_name.to_string(),
            propagated: false,
        })
    }
}

/// Wrap an embedded instance, checking it against the class the property names
pub(crate) fn embed(
    instance: CimInstance,
    reference_class: Option<&str>,
    owner: &str,
) -> Result<CimValue, MofError> {
    if let Some(expected) = reference_class {
        if !instance.class.derives_from(expected) {
            return Err(MofError::EmbeddedClassMismatch {
                property: owner.to_string(),
                expected: expected.to_string(),
                found: instance.class.name.clone(),
            });
        }
    }
    Ok(CimValue::Instance(Box::new(instance)))
}

/// Add a named member, rejecting a second member with the same name
pub(crate) fn insert_unique<T>(
    members: &mut NamedMap<T>,
    owner: &str,
    name: &str,
    member: T,
) -> Result<(), MofError> {
    if members.contains(name) {
        return Err(MofError::DuplicateMember {
            owner: owner.to_string(),
            name: name.to_string(),
        });
    }
    members.insert(name, member);
    Ok(())
}
