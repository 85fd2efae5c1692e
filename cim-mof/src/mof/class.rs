/*!
 Decodes class declaration records and links them to their superclass.
*/

use std::sync::Arc;

use log::debug;

use crate::{
    error::mof::MofError,
    mof::{
        declarations::insert_unique,
        models::{CimClass, MethodDeclaration, NamedMap, PropertyDeclaration, Qualifier},
        session::Session,
    },
    util::cursor::MofCursor,
};

impl Session<'_, '_> {
    /// Read one class body and register it so later records can refer to it
    pub(crate) fn read_class(&mut self, cursor: &mut MofCursor) -> Result<Arc<CimClass>, MofError> {
        let name = self.read_name(cursor, "class")?;
        if self.is_declared(&name) {
            return Err(MofError::DuplicateClass(name));
        }

        let superclass = match cursor.read_string()?.as_str() {
            "" => None,
            parent => Some(self.resolve_class(parent)?),
        };

        let qualifiers = self.read_qualifiers(cursor, &name)?;

        let count = cursor.read_u16()?;
        let mut properties = NamedMap::new();
        for _ in 0..count {
            let property = self.read_property(cursor, &name)?;
            insert_unique(&mut properties, &name, &property.name.clone(), property)?;
        }

        let count = cursor.read_u16()?;
        let mut methods = NamedMap::new();
        for _ in 0..count {
            let method = self.read_method(cursor, &name)?;
            insert_unique(&mut methods, &name, &method.name.clone(), method)?;
        }

        self.define_class(name, superclass, qualifiers, properties, methods)
    }

    /// Link a class's own declarations to its superclass and register it for later records
    pub(crate) fn define_class(
        &mut self,
        name: String,
        superclass: Option<Arc<CimClass>>,
        qualifiers: NamedMap<Qualifier>,
        properties: NamedMap<PropertyDeclaration>,
        methods: NamedMap<MethodDeclaration>,
    ) -> Result<Arc<CimClass>, MofError> {
        let parent = superclass.as_deref();
        let class = CimClass {
            qualifiers: inherit_qualifiers(&name, parent.map(|p| &p.qualifiers), qualifiers)?,
            properties: merge_properties(&name, parent, properties)?,
            methods: merge_methods(&name, parent, methods)?,
            server_name: self.server.clone(),
            namespace: self.namespace.clone(),
            superclass,
            name,
        };

        debug!(
            target: "mof",
            "decoded class `{}` with {} properties and {} methods, superclass {:?}",
            class.name,
            class.properties.len(),
            class.methods.len(),
            class.superclass_name()
        );
        let class = Arc::new(class);
        self.declare(Arc::clone(&class));
        Ok(class)
    }
}

/// Qualifiers that only apply to the element declaring them, whatever their flavor
const ALWAYS_RESTRICTED: [&str; 1] = ["Abstract"];

/// The qualifiers of an ancestor element that a descendant inherits
fn propagate(inherited: &NamedMap<Qualifier>) -> NamedMap<Qualifier> {
    let mut out = NamedMap::new();
    for qualifier in inherited.iter().filter(|q| {
        q.flavor.propagates()
            && !ALWAYS_RESTRICTED
                .iter()
                .any(|name| name.eq_ignore_ascii_case(&q.name))
    }) {
        out.insert(
            &qualifier.name,
            Qualifier {
                propagated: true,
                ..qualifier.clone()
            },
        );
    }
    out
}

/// Merge an element's own qualifiers over the ones it inherits
fn inherit_qualifiers(
    element: &str,
    inherited: Option<&NamedMap<Qualifier>>,
    local: NamedMap<Qualifier>,
) -> Result<NamedMap<Qualifier>, MofError> {
    let mut merged = inherited.map(propagate).unwrap_or_default();
    for qualifier in local {
        if let Some(parent) = merged.get(&qualifier.name) {
            if !parent.flavor.overridable() && parent.value != qualifier.value {
                return Err(MofError::QualifierOverride {
                    element: element.to_string(),
                    qualifier: qualifier.name,
                });
            }
        }
        merged.insert(&qualifier.name.clone(), qualifier);
    }
    Ok(merged)
}

/// Inherited properties come first; a redeclared property keeps its inherited position
fn merge_properties(
    class_name: &str,
    parent: Option<&CimClass>,
    local: NamedMap<PropertyDeclaration>,
) -> Result<NamedMap<PropertyDeclaration>, MofError> {
    let mut merged = NamedMap::new();
    for property in parent.into_iter().flat_map(|p| p.properties.iter()) {
        merged.insert(
            &property.name,
            PropertyDeclaration {
                qualifiers: propagate(&property.qualifiers),
                propagated: true,
                ..property.clone()
            },
        );
    }

    for mut property in local {
        if let Some(inherited) = merged.get(&property.name) {
            if inherited.cim_type != property.cim_type {
                return Err(MofError::TypeOverride {
                    class: class_name.to_string(),
                    element: property.name,
                    inherited: inherited.cim_type,
                    declared: property.cim_type,
                });
            }
            let own = std::mem::take(&mut property.qualifiers);
            property.qualifiers = inherit_qualifiers(
                &format!("{class_name}.{}", property.name),
                Some(&inherited.qualifiers),
                own,
            )?;
        }
        merged.insert(&property.name.clone(), property);
    }
    Ok(merged)
}

/// Methods follow the same inheritance rules as properties
fn merge_methods(
    class_name: &str,
    parent: Option<&CimClass>,
    local: NamedMap<MethodDeclaration>,
) -> Result<NamedMap<MethodDeclaration>, MofError> {
    let mut merged = NamedMap::new();
    for method in parent.into_iter().flat_map(|p| p.methods.iter()) {
        merged.insert(
            &method.name,
            MethodDeclaration {
                qualifiers: propagate(&method.qualifiers),
                propagated: true,
                ..method.clone()
            },
        );
    }

    for mut method in local {
        if let Some(inherited) = merged.get(&method.name) {
            if inherited.return_type != method.return_type {
                return Err(MofError::TypeOverride {
                    class: class_name.to_string(),
                    element: method.name,
                    inherited: inherited.return_type,
                    declared: method.return_type,
                });
            }
            let own = std::mem::take(&mut method.qualifiers);
            method.qualifiers = inherit_qualifiers(
                &format!("{class_name}.{}", method.name),
                Some(&inherited.qualifiers),
                own,
            )?;
        }
        merged.insert(&method.name.clone(), method);
    }
    Ok(merged)
}
