use std::{
    io::Write,
    path::{Path, PathBuf},
};

use cim_mof::{
    mof::models::{
        CimType, ElementFlags, MethodDeclaration, NamedMap, PropertyDeclaration, Qualifier,
    },
    CimClass, CimInstance, CimValue,
};

use crate::{
    app::{error::RuntimeError, runtime::Config, sanitizers::escape_string},
    exporters::exporter::{flag_names, Exporter, Writer},
};

const INDENT: &str = "    ";

/// Writes records as MOF-like text
pub struct TXT<'a, W: Write> {
    /// Data that is setup from the application's runtime
    pub config: &'a Config,
    pub out: W,
    /// The file whose records are currently being written
    current_file: Option<PathBuf>,
}

impl<'a, W: Write> Exporter<'a, W> for TXT<'a, W> {
    fn new(config: &'a Config, out: W) -> Self {
        TXT {
            config,
            out,
            current_file: None,
        }
    }

    fn config(&self) -> &'a Config {
        self.config
    }

    fn export_class(&mut self, file: &Path, class: &CimClass) -> Result<(), RuntimeError> {
        self.write_file_header(file)?;
        let text = self.format_class(class);
        Self::write_to_file(&mut self.out, &text)
    }

    fn export_instance(
        &mut self,
        file: &Path,
        instance: &CimInstance,
    ) -> Result<(), RuntimeError> {
        self.write_file_header(file)?;
        let text = format!("{};\n", self.format_instance(instance, 0));
        Self::write_to_file(&mut self.out, &text)
    }

    fn out(&mut self) -> &mut W {
        &mut self.out
    }
}

impl<'a, W: Write> Writer<String> for TXT<'a, W> {
    fn format_class(&self, class: &CimClass) -> String {
        let mut text = String::new();
        let qualifiers = self.format_qualifiers(&class.qualifiers);
        if !qualifiers.is_empty() {
            text.push_str(&qualifiers);
            text.push('\n');
        }
        text.push_str(&format!("class {}", class.name));
        if let Some(parent) = class.superclass_name() {
            text.push_str(&format!(" : {parent}"));
        }
        text.push_str("\n{\n");

        // Inherited members are declared by the superclass
        for property in class.properties.iter().filter(|p| !p.propagated) {
            text.push_str(&format!("{INDENT}{}\n", self.format_property(property)));
        }
        for method in class.methods.iter().filter(|m| !m.propagated) {
            text.push_str(&format!("{INDENT}{}\n", self.format_method(method)));
        }
        text.push_str("};\n");
        text
    }

    fn format_instance(&self, instance: &CimInstance, indent: usize) -> String {
        let pad = INDENT.repeat(indent);
        let mut text = format!("instance of {}\n{pad}{{\n", instance.class_name());
        for property in &instance.properties {
            let value = match &property.value {
                Some(value) => self.format_value(value, indent + 1),
                None => "NULL".to_string(),
            };
            text.push_str(&format!("{pad}{INDENT}{} = {value};\n", property.name));
        }
        text.push_str(&format!("{pad}}}"));
        text
    }

    fn format_value(&self, value: &CimValue, indent: usize) -> String {
        match value {
            CimValue::String(text) | CimValue::Reference(text) => {
                format!("\"{}\"", escape_string(text))
            }
            CimValue::DateTime(_) => format!("\"{value}\""),
            CimValue::Char16(_) => format!("'{}'", escape_string(&value.to_string())),
            CimValue::Instance(instance) => self.format_instance(instance, indent),
            CimValue::Array(items) => {
                let items: Vec<String> = items
                    .iter()
                    .map(|item| self.format_value(item, indent))
                    .collect();
                format!("{{{}}}", items.join(", "))
            }
            other => other.to_string(),
        }
    }

    fn format_qualifiers(&self, qualifiers: &NamedMap<Qualifier>) -> String {
        let parts = self.qualifier_parts(qualifiers);
        if parts.is_empty() {
            return String::new();
        }
        format!("[{}]", parts.join(", "))
    }
}

impl<'a, W: Write> TXT<'a, W> {
    /// Write a comment naming the file when its first record is written
    fn write_file_header(&mut self, file: &Path) -> Result<(), RuntimeError> {
        if self.current_file.as_deref() != Some(file) {
            self.current_file = Some(file.to_path_buf());
            Self::write_to_file(&mut self.out, &format!("// {}\n", file.display()))?;
        }
        Ok(())
    }

    /// Qualifiers declared on the element itself
    fn qualifier_parts(&self, qualifiers: &NamedMap<Qualifier>) -> Vec<String> {
        qualifiers
            .iter()
            .filter(|qualifier| !qualifier.propagated)
            .map(|qualifier| match &qualifier.value {
                Some(value) => format!("{}({})", qualifier.name, self.format_value(value, 0)),
                None => qualifier.name.clone(),
            })
            .collect()
    }

    /// The bracketed list that precedes a declaration, with a trailing space
    fn format_attributes(
        &self,
        flags: ElementFlags,
        embedded: Option<&str>,
        qualifiers: &NamedMap<Qualifier>,
    ) -> String {
        let mut parts: Vec<String> = flag_names(flags).into_iter().map(String::from).collect();
        if let Some(class_name) = embedded {
            parts.push(format!("EmbeddedInstance(\"{}\")", escape_string(class_name)));
        }
        parts.extend(self.qualifier_parts(qualifiers));
        if parts.is_empty() {
            return String::new();
        }
        format!("[{}] ", parts.join(", "))
    }

    fn format_property(&self, property: &PropertyDeclaration) -> String {
        let embedded = match property.cim_type.element_type() {
            CimType::Instance => property.reference_class.as_deref(),
            _ => None,
        };
        let mut text = self.format_attributes(property.flags, embedded, &property.qualifiers);
        text.push_str(&format_declaration(
            property.cim_type,
            property.reference_class.as_deref(),
            &property.name,
        ));
        if let Some(default) = &property.default {
            text.push_str(&format!(" = {}", self.format_value(default, 1)));
        }
        text.push(';');
        text
    }

    fn format_method(&self, method: &MethodDeclaration) -> String {
        let parameters: Vec<String> = method
            .parameters
            .iter()
            .map(|parameter| {
                let embedded = match parameter.cim_type.element_type() {
                    CimType::Instance => parameter.reference_class.as_deref(),
                    _ => None,
                };
                format!(
                    "{}{}",
                    self.format_attributes(parameter.flags, embedded, &parameter.qualifiers),
                    format_declaration(
                        parameter.cim_type,
                        parameter.reference_class.as_deref(),
                        &parameter.name
                    )
                )
            })
            .collect();
        format!(
            "{}{} {}({});",
            self.format_attributes(ElementFlags::empty(), None, &method.qualifiers),
            method.return_type,
            method.name,
            parameters.join(", ")
        )
    }
}

/// A typed name, with array brackets after the name as MOF writes them
fn format_declaration(cim_type: CimType, reference_class: Option<&str>, name: &str) -> String {
    let element = cim_type.element_type();
    let type_name = match (element, reference_class) {
        (CimType::Reference, Some(class_name)) => format!("{class_name} ref"),
        _ => element.to_string(),
    };
    let suffix = if cim_type.is_array() { "[]" } else { "" };
    format!("{type_name} {name}{suffix}")
}
