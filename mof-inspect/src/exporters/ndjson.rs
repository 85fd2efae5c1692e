use std::{io::Write, path::Path};

use json::{from, object, JsonValue};

use cim_mof::{
    mof::models::{MethodDeclaration, NamedMap, ParameterDeclaration, PropertyDeclaration, Qualifier},
    CimClass, CimInstance, CimValue,
};

use crate::{
    app::{error::RuntimeError, runtime::Config},
    exporters::exporter::{flag_names, Exporter, Writer},
};

/// Writes one JSON object per record
pub struct NDJSON<'a, W: Write> {
    /// Data that is setup from the application's runtime
    pub config: &'a Config,
    pub out: W,
}

impl<'a, W: Write> Exporter<'a, W> for NDJSON<'a, W> {
    fn new(config: &'a Config, out: W) -> Self {
        NDJSON { config, out }
    }

    fn config(&self) -> &'a Config {
        self.config
    }

    fn export_class(&mut self, file: &Path, class: &CimClass) -> Result<(), RuntimeError> {
        let mut record = self.format_class(class);
        record["file"] = from(file.display().to_string());
        Self::write_to_file(&mut self.out, &record.dump())
    }

    fn export_instance(
        &mut self,
        file: &Path,
        instance: &CimInstance,
    ) -> Result<(), RuntimeError> {
        let mut record = self.format_instance(instance, 0);
        record["file"] = from(file.display().to_string());
        Self::write_to_file(&mut self.out, &record.dump())
    }

    fn out(&mut self) -> &mut W {
        &mut self.out
    }
}

impl<'a, W: Write> Writer<JsonValue> for NDJSON<'a, W> {
    fn format_class(&self, class: &CimClass) -> JsonValue {
        let properties: Vec<JsonValue> = class
            .properties
            .iter()
            .map(|property| self.format_property(property))
            .collect();
        let methods: Vec<JsonValue> = class
            .methods
            .iter()
            .map(|method| self.format_method(method))
            .collect();

        let mut json_class = object! {
            kind: "class",
            name: class.name.as_str(),
            server: class.server_name.as_str(),
            namespace: class.namespace.as_str(),
            qualifiers: self.format_qualifiers(&class.qualifiers),
            properties: properties,
            methods: methods,
        };
        json_class["superclass"] = match class.superclass_name() {
            Some(parent) => from(parent),
            None => JsonValue::Null,
        };
        json_class
    }

    fn format_instance(&self, instance: &CimInstance, indent: usize) -> JsonValue {
        let mut properties = JsonValue::new_object();
        for property in &instance.properties {
            properties[property.name.as_str()] = match &property.value {
                Some(value) => self.format_value(value, indent + 1),
                None => JsonValue::Null,
            };
        }

        let mut json_instance = object! {
            class: instance.class_name(),
            properties: properties,
        };
        // Embedded instances are values, not records
        if indent == 0 {
            json_instance["kind"] = from("instance");
        }
        json_instance
    }

    fn format_value(&self, value: &CimValue, indent: usize) -> JsonValue {
        match value {
            CimValue::Boolean(flag) => from(*flag),
            CimValue::UInt8(number) => from(*number),
            CimValue::SInt8(number) => from(*number),
            CimValue::UInt16(number) => from(*number),
            CimValue::SInt16(number) => from(*number),
            CimValue::UInt32(number) => from(*number),
            CimValue::SInt32(number) => from(*number),
            CimValue::UInt64(number) => from(*number),
            CimValue::SInt64(number) => from(*number),
            CimValue::Real32(number) => from(*number),
            CimValue::Real64(number) => from(*number),
            CimValue::String(text) | CimValue::Reference(text) => from(text.as_str()),
            CimValue::Char16(_) | CimValue::DateTime(_) => from(value.to_string()),
            CimValue::Instance(instance) => self.format_instance(instance, indent),
            CimValue::Array(items) => JsonValue::Array(
                items
                    .iter()
                    .map(|item| self.format_value(item, indent))
                    .collect(),
            ),
        }
    }

    fn format_qualifiers(&self, qualifiers: &NamedMap<Qualifier>) -> JsonValue {
        let mut json_qualifiers = JsonValue::new_object();
        for qualifier in qualifiers {
            json_qualifiers[qualifier.name.as_str()] = match &qualifier.value {
                Some(value) => self.format_value(value, 0),
                None => JsonValue::Null,
            };
        }
        json_qualifiers
    }
}

impl<'a, W: Write> NDJSON<'a, W> {
    fn format_property(&self, property: &PropertyDeclaration) -> JsonValue {
        let mut json_property = object! {
            name: property.name.as_str(),
            flags: flag_names(property.flags),
            qualifiers: self.format_qualifiers(&property.qualifiers),
            origin: property.class_origin.as_str(),
            propagated: property.propagated,
        };
        json_property["type"] = from(property.cim_type.to_string());
        if let Some(class_name) = &property.reference_class {
            json_property["reference_class"] = from(class_name.as_str());
        }
        if let Some(default) = &property.default {
            json_property["default"] = self.format_value(default, 1);
        }
        json_property
    }

    fn format_parameter(&self, parameter: &ParameterDeclaration) -> JsonValue {
        let mut json_parameter = object! {
            name: parameter.name.as_str(),
            flags: flag_names(parameter.flags),
            qualifiers: self.format_qualifiers(&parameter.qualifiers),
        };
        json_parameter["type"] = from(parameter.cim_type.to_string());
        if let Some(class_name) = &parameter.reference_class {
            json_parameter["reference_class"] = from(class_name.as_str());
        }
        json_parameter
    }

    fn format_method(&self, method: &MethodDeclaration) -> JsonValue {
        let parameters: Vec<JsonValue> = method
            .parameters
            .iter()
            .map(|parameter| self.format_parameter(parameter))
            .collect();
        object! {
            name: method.name.as_str(),
            return_type: method.return_type.to_string(),
            qualifiers: self.format_qualifiers(&method.qualifiers),
            parameters: parameters,
            origin: method.class_origin.as_str(),
            propagated: method.propagated,
        }
    }
}
