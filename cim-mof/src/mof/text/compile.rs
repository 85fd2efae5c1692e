/*!
 Turns parsed MOF text declarations into classes and instances, typing each literal against its declaration.
*/

use std::sync::Arc;

use log::trace;

use crate::{
    error::mof::MofError,
    mof::{
        declarations::{embed, insert_unique},
        instance::{declared_property, finish_instance},
        models::{
            fold_name, CimClass, CimInstance, CimProperty, CimType, CimValue, ElementFlags,
            Flavor, MethodDeclaration, NamedMap, ParameterDeclaration, PropertyDeclaration,
            Qualifier,
        },
        session::Session,
        text::parser::{
            ClassSyntax, DataType, InstanceSyntax, MethodSyntax, ParameterSyntax, PropertySyntax,
            QualifierSyntax, QualifierTypeSyntax, ValueSyntax,
        },
    },
    util::dates::parse_dmtf,
};

/// Boolean qualifiers that also set a flag on the property or parameter they annotate
const FLAG_QUALIFIERS: [(&str, ElementFlags); 9] = [
    ("Key", ElementFlags::KEY),
    ("In", ElementFlags::IN),
    ("Out", ElementFlags::OUT),
    ("Required", ElementFlags::REQUIRED),
    ("Static", ElementFlags::STATIC),
    ("Abstract", ElementFlags::ABSTRACT),
    ("Terminal", ElementFlags::TERMINAL),
    ("Expensive", ElementFlags::EXPENSIVE),
    ("Stream", ElementFlags::STREAM),
];

/// A qualifier declared with `Qualifier Name : type ...`
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QualifierType {
    pub(crate) cim_type: CimType,
    pub(crate) flavor: Flavor,
    pub(crate) default: Option<CimValue>,
}

impl Session<'_, '_> {
    pub(crate) fn compile_qualifier_type(
        &mut self,
        syntax: QualifierTypeSyntax,
    ) -> Result<(), MofError> {
        let flavor = syntax
            .flavor
            .with_defaults()
            .ok_or_else(|| MofError::InvalidFlavor(syntax.name.clone()))?;
        let default = match &syntax.default {
            Some(value) => self.literal(value, syntax.cim_type, None, &syntax.name, 0)?,
            None => None,
        };

        trace!(target: "mof", "qualifier type `{}` of type {}", syntax.name, syntax.cim_type);
        self.qualifier_types.insert(
            fold_name(&syntax.name),
            QualifierType {
                cim_type: syntax.cim_type,
                flavor,
                default,
            },
        );
        Ok(())
    }

    /// Compile a class declaration and register it so later declarations can refer to it
    pub(crate) fn compile_class(&mut self, syntax: ClassSyntax) -> Result<Arc<CimClass>, MofError> {
        if self.is_declared(&syntax.name) {
            return Err(MofError::DuplicateClass(syntax.name));
        }
        let superclass = match &syntax.superclass {
            Some(parent) => Some(self.resolve_class(parent)?),
            None => None,
        };
        let qualifiers = self.compile_qualifiers(&syntax.qualifiers, &syntax.name)?;

        let mut properties = NamedMap::new();
        for property in syntax.properties {
            let property = self.compile_property(property, &syntax.name)?;
            insert_unique(&mut properties, &syntax.name, &property.name.clone(), property)?;
        }

        let mut methods = NamedMap::new();
        for method in syntax.methods {
            let method = self.compile_method(method, &syntax.name)?;
            insert_unique(&mut methods, &syntax.name, &method.name.clone(), method)?;
        }

        self.define_class(syntax.name, superclass, qualifiers, properties, methods)
    }

    fn compile_qualifiers(
        &mut self,
        syntax: &[QualifierSyntax],
        owner: &str,
    ) -> Result<NamedMap<Qualifier>, MofError> {
        let mut qualifiers = NamedMap::new();
        for qualifier in syntax {
            let declared = self
                .qualifier_types
                .get(&fold_name(&qualifier.name))
                .cloned();
            let cim_type = match &declared {
                Some(declared) => declared.cim_type,
                None => infer_type(qualifier.value.as_ref()),
            };
            let value = match &qualifier.value {
                Some(value) => self.literal(value, cim_type, None, &qualifier.name, 0)?,
                None if cim_type == CimType::Boolean => Some(CimValue::Boolean(true)),
                None => declared.as_ref().and_then(|declared| declared.default.clone()),
            };
            let written = declared.as_ref().map_or(qualifier.flavor, |declared| {
                merge_flavor(qualifier.flavor, declared.flavor)
            });
            let flavor = written
                .with_defaults()
                .ok_or_else(|| MofError::InvalidFlavor(qualifier.name.clone()))?;

            trace!(target: "mof", "qualifier `{}` on `{owner}`: {value:?}", qualifier.name);
            insert_unique(
                &mut qualifiers,
                owner,
                &qualifier.name,
                Qualifier {
                    name: qualifier.name.clone(),
                    cim_type,
                    flavor,
                    value,
                    propagated: false,
                },
            )?;
        }
        Ok(qualifiers)
    }

    fn compile_property(
        &mut self,
        syntax: PropertySyntax,
        class_name: &str,
    ) -> Result<PropertyDeclaration, MofError> {
        let owner = format!("{class_name}.{}", syntax.name);
        let qualifiers = self.compile_qualifiers(&syntax.qualifiers, &owner)?;
        let (cim_type, reference_class) = member_type(&syntax.data_type, syntax.array, &qualifiers);
        let default = match &syntax.default {
            Some(value) => self.literal(value, cim_type, reference_class.as_deref(), &owner, 0)?,
            None => None,
        };

        trace!(target: "mof", "property `{owner}` of type {cim_type}");
        Ok(PropertyDeclaration {
            name: syntax.name,
            cim_type,
            flags: element_flags(&qualifiers),
            reference_class,
            qualifiers,
            default,
            class_origin: class_name.to_string(),
            propagated: false,
        })
    }

    fn compile_parameter(
        &mut self,
        syntax: ParameterSyntax,
        method: &str,
    ) -> Result<ParameterDeclaration, MofError> {
        let qualifiers =
            self.compile_qualifiers(&syntax.qualifiers, &format!("{method}({})", syntax.name))?;
        let (cim_type, reference_class) = member_type(&syntax.data_type, syntax.array, &qualifiers);

        Ok(ParameterDeclaration {
            name: syntax.name,
            cim_type,
            flags: element_flags(&qualifiers),
            reference_class,
            qualifiers,
        })
    }

    fn compile_method(
        &mut self,
        syntax: MethodSyntax,
        class_name: &str,
    ) -> Result<MethodDeclaration, MofError> {
        let owner = format!("{class_name}.{}", syntax.name);
        let qualifiers = self.compile_qualifiers(&syntax.qualifiers, &owner)?;
        let return_type = match syntax.return_type {
            DataType::Scalar(cim_type) => cim_type,
            DataType::Reference(_) => CimType::Reference,
        };

        let mut parameters = NamedMap::new();
        for parameter in syntax.parameters {
            let parameter = self.compile_parameter(parameter, &owner)?;
            insert_unique(&mut parameters, &owner, &parameter.name.clone(), parameter)?;
        }

        trace!(target: "mof", "method `{owner}` with {} parameters", parameters.len());
        Ok(MethodDeclaration {
            name: syntax.name,
            return_type,
            qualifiers,
            parameters,
            class_origin: class_name.to_string(),
            propagated: false,
        })
    }

    /// Compile an instance declaration; `depth` counts the embedded instances enclosing it
    pub(crate) fn compile_instance(
        &mut self,
        syntax: &InstanceSyntax,
        depth: usize,
    ) -> Result<CimInstance, MofError> {
        if depth > self.config.max_instance_depth {
            return Err(MofError::NestingTooDeep(self.config.max_instance_depth));
        }

        let class = self.instance_class(&syntax.class_name)?;
        let mut properties = NamedMap::new();
        for assignment in &syntax.properties {
            let declaration = declared_property(&class, &properties, &assignment.name)?;
            let owner = format!("{}.{}", class.name, declaration.name);
            let value = self.literal(
                &assignment.value,
                declaration.cim_type,
                declaration.reference_class.as_deref(),
                &owner,
                depth,
            )?;
            trace!(target: "mof", "{owner} = {value:?}");

            properties.insert(
                &assignment.name,
                CimProperty {
                    name: declaration.name.clone(),
                    cim_type: declaration.cim_type,
                    value,
                },
            );
        }

        let instance = finish_instance(class, properties, depth);
        if let Some(alias) = &syntax.alias {
            let key = fold_name(alias);
            if self.aliases.contains_key(&key) {
                return Err(MofError::DuplicateAlias(alias.clone()));
            }
            self.aliases.insert(key, object_path(&instance));
        }
        Ok(instance)
    }

    /// Type a literal as `cim_type`; `None` is a `NULL` value
    fn literal(
        &mut self,
        value: &ValueSyntax,
        cim_type: CimType,
        reference_class: Option<&str>,
        owner: &str,
        depth: usize,
    ) -> Result<Option<CimValue>, MofError> {
        match value {
            ValueSyntax::Null => Ok(None),
            ValueSyntax::Array(items) if cim_type.is_array() => {
                let element_type = cim_type.element_type();
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.scalar(item, element_type, reference_class, owner, depth)?);
                }
                Ok(Some(CimValue::Array(out)))
            }
            _ if cim_type.is_array() => Err(mismatch(value, cim_type, owner)),
            _ => self
                .scalar(value, cim_type, reference_class, owner, depth)
                .map(Some),
        }
    }

    fn scalar(
        &mut self,
        value: &ValueSyntax,
        cim_type: CimType,
        reference_class: Option<&str>,
        owner: &str,
        depth: usize,
    ) -> Result<CimValue, MofError> {
        let out_of_range = || mismatch(value, cim_type, owner);
        let typed = match (cim_type, value) {
            (CimType::Boolean, ValueSyntax::Boolean(flag)) => CimValue::Boolean(*flag),
            (CimType::UInt8, ValueSyntax::Integer(v)) => {
                CimValue::UInt8(u8::try_from(*v).map_err(|_| out_of_range())?)
            }
            (CimType::SInt8, ValueSyntax::Integer(v)) => {
                CimValue::SInt8(i8::try_from(*v).map_err(|_| out_of_range())?)
            }
            (CimType::UInt16, ValueSyntax::Integer(v)) => {
                CimValue::UInt16(u16::try_from(*v).map_err(|_| out_of_range())?)
            }
            (CimType::SInt16, ValueSyntax::Integer(v)) => {
                CimValue::SInt16(i16::try_from(*v).map_err(|_| out_of_range())?)
            }
            (CimType::UInt32, ValueSyntax::Integer(v)) => {
                CimValue::UInt32(u32::try_from(*v).map_err(|_| out_of_range())?)
            }
            (CimType::SInt32, ValueSyntax::Integer(v)) => {
                CimValue::SInt32(i32::try_from(*v).map_err(|_| out_of_range())?)
            }
            (CimType::UInt64, ValueSyntax::Integer(v)) => {
                CimValue::UInt64(u64::try_from(*v).map_err(|_| out_of_range())?)
            }
            (CimType::SInt64, ValueSyntax::Integer(v)) => {
                CimValue::SInt64(i64::try_from(*v).map_err(|_| out_of_range())?)
            }
            (CimType::Real32, ValueSyntax::Integer(v)) => CimValue::Real32(*v as f32),
            (CimType::Real32, ValueSyntax::Real(v)) => CimValue::Real32(*v as f32),
            (CimType::Real64, ValueSyntax::Integer(v)) => CimValue::Real64(*v as f64),
            (CimType::Real64, ValueSyntax::Real(v)) => CimValue::Real64(*v),
            (CimType::Char16, ValueSyntax::Char(unit)) => CimValue::Char16(*unit),
            (CimType::DateTime, ValueSyntax::String(text)) => match parse_dmtf(text) {
                Ok(value) => CimValue::DateTime(value),
                Err(reason) => {
                    return Err(MofError::InvalidDateTime {
                        value: text.clone(),
                        reason,
                    })
                }
            },
            (CimType::String, ValueSyntax::String(text)) => CimValue::String(text.clone()),
            (CimType::Reference, ValueSyntax::String(path)) => CimValue::Reference(path.clone()),
            (CimType::Reference, ValueSyntax::Alias(alias)) => {
                match self.aliases.get(&fold_name(alias)) {
                    Some(path) => CimValue::Reference(path.clone()),
                    None => return Err(MofError::UnknownAlias(alias.clone())),
                }
            }
            (CimType::Instance, ValueSyntax::Instance(syntax)) => {
                let instance = self.compile_instance(syntax, depth + 1)?;
                embed(instance, reference_class, owner)?
            }
            _ => return Err(out_of_range()),
        };
        Ok(typed)
    }
}

fn mismatch(value: &ValueSyntax, expected: CimType, owner: &str) -> MofError {
    MofError::InvalidLiteral {
        owner: owner.to_string(),
        expected,
        found: value.describe(),
    }
}

/// The type of an undeclared qualifier, from the value written for it
fn infer_type(value: Option<&ValueSyntax>) -> CimType {
    match value {
        None | Some(ValueSyntax::Null) | Some(ValueSyntax::Boolean(_)) => CimType::Boolean,
        Some(ValueSyntax::Integer(value)) => integer_type([*value]),
        Some(ValueSyntax::Real(_)) => CimType::Real64,
        Some(ValueSyntax::String(_)) => CimType::String,
        Some(ValueSyntax::Char(_)) => CimType::Char16,
        Some(ValueSyntax::Alias(_)) => CimType::Reference,
        Some(ValueSyntax::Instance(_)) => CimType::Instance,
        Some(ValueSyntax::Array(items)) => {
            let integers: Vec<i128> = items
                .iter()
                .filter_map(|item| match item {
                    ValueSyntax::Integer(value) => Some(*value),
                    _ => None,
                })
                .collect();
            let element_type = if items.iter().any(|item| matches!(item, ValueSyntax::Real(_))) {
                CimType::Real64
            } else if !integers.is_empty() {
                integer_type(integers)
            } else {
                items
                    .first()
                    .map_or(CimType::String, |item| infer_type(Some(item)))
            };
            element_type.array_type()
        }
    }
}

/// The narrowest of `sint32`, `sint64`, and `uint64` that holds every value
fn integer_type(values: impl IntoIterator<Item = i128>) -> CimType {
    let mut cim_type = CimType::SInt32;
    for value in values {
        if i64::try_from(value).is_err() {
            return CimType::UInt64;
        }
        if i32::try_from(value).is_err() {
            cim_type = CimType::SInt64;
        }
    }
    cim_type
}

/// Flavors written on a qualifier win over its declared flavors, pair by pair
fn merge_flavor(written: Flavor, declared: Flavor) -> Flavor {
    let mut flavor = written | (declared & Flavor::TRANSLATABLE);
    for pair in [
        Flavor::ENABLE_OVERRIDE | Flavor::DISABLE_OVERRIDE,
        Flavor::TO_SUBCLASS | Flavor::RESTRICTED,
    ] {
        if !written.intersects(pair) {
            flavor |= declared & pair;
        }
    }
    flavor
}

fn element_flags(qualifiers: &NamedMap<Qualifier>) -> ElementFlags {
    FLAG_QUALIFIERS
        .iter()
        .filter(|(name, _)| {
            qualifiers
                .get(name)
                .and_then(|qualifier| qualifier.value.as_ref())
                .and_then(CimValue::as_bool)
                .unwrap_or(false)
        })
        .fold(ElementFlags::empty(), |flags, (_, flag)| flags | *flag)
}

/// The type and class of a property or parameter
///
/// A `string` marked `EmbeddedInstance("Class")` or `EmbeddedObject` holds an embedded instance.
fn member_type(
    data_type: &DataType,
    array: bool,
    qualifiers: &NamedMap<Qualifier>,
) -> (CimType, Option<String>) {
    let (cim_type, class) = match data_type {
        DataType::Reference(class) => (CimType::Reference, Some(class.clone())),
        DataType::Scalar(CimType::String) => {
            let embedded_class = qualifiers
                .get("EmbeddedInstance")
                .and_then(|qualifier| qualifier.value.as_ref())
                .and_then(CimValue::as_str);
            let embedded_object = qualifiers
                .get("EmbeddedObject")
                .and_then(|qualifier| qualifier.value.as_ref())
                .and_then(CimValue::as_bool)
                .unwrap_or(false);
            match embedded_class {
                Some(class) => (CimType::Instance, Some(class.to_string())),
                None if embedded_object => (CimType::Instance, None),
                None => (CimType::String, None),
            }
        }
        DataType::Scalar(cim_type) => (*cim_type, None),
    };
    if array {
        return (cim_type.array_type(), class);
    }
    (cim_type, class)
}

/// The object path an alias stands for: `Class.Key="value",...`, or `Class=@` without keys
fn object_path(instance: &CimInstance) -> String {
    let keys: Vec<String> = instance
        .properties
        .iter()
        .filter(|property| {
            instance
                .class
                .properties
                .get(&property.name)
                .is_some_and(|declaration| declaration.flags.contains(ElementFlags::KEY))
        })
        .map(|property| match &property.value {
            Some(value @ (CimValue::String(_) | CimValue::Reference(_) | CimValue::DateTime(_))) => {
                let text = value.to_string().replace('\\', "\\\\").replace('"', "\\\"");
                format!("{}=\"{text}\"", property.name)
            }
            Some(value) => format!("{}={value}", property.name),
            None => format!("{}=NULL", property.name),
        })
        .collect();

    if keys.is_empty() {
        return format!("{}=@", instance.class.name);
    }
    format!("{}.{}", instance.class.name, keys.join(","))
}

#[cfg(test)]
mod tests {
    use crate::mof::{
        models::{CimType, Flavor},
        text::{
            compile::{infer_type, integer_type, merge_flavor},
            parser::ValueSyntax,
        },
    };

    #[test]
    fn can_infer_qualifier_types() {
        assert_eq!(infer_type(None), CimType::Boolean);
        assert_eq!(
            infer_type(Some(&ValueSyntax::String("x".to_string()))),
            CimType::String
        );
        assert_eq!(
            infer_type(Some(&ValueSyntax::Array(vec![
                ValueSyntax::Integer(1),
                ValueSyntax::Real(0.5)
            ]))),
            CimType::Real64Array
        );
        assert_eq!(
            infer_type(Some(&ValueSyntax::Array(vec![]))),
            CimType::StringArray
        );
    }

    #[test]
    fn can_widen_integers() {
        assert_eq!(integer_type([1, -1]), CimType::SInt32);
        assert_eq!(integer_type([1, 1 << 40]), CimType::SInt64);
        assert_eq!(integer_type([u64::MAX as i128]), CimType::UInt64);
    }

    #[test]
    fn written_flavor_wins_by_pair() {
        let declared = Flavor::DISABLE_OVERRIDE | Flavor::RESTRICTED | Flavor::TRANSLATABLE;

        assert_eq!(
            merge_flavor(Flavor::TO_SUBCLASS, declared),
            Flavor::TO_SUBCLASS | Flavor::DISABLE_OVERRIDE | Flavor::TRANSLATABLE
        );
        assert_eq!(merge_flavor(Flavor::empty(), declared), declared);
    }
}
