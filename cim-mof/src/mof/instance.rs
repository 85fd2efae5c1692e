/*!
 Decodes instance bodies, both top-level instance records and embedded instance values.
*/

use std::sync::Arc;

use log::{debug, trace};

use crate::{
    error::mof::MofError,
    mof::{
        models::{CimClass, CimInstance, CimProperty, NamedMap, PropertyDeclaration},
        session::Session,
    },
    util::cursor::MofCursor,
};

impl Session<'_, '_> {
    /// Read one instance body; `depth` counts the embedded instances enclosing it
    pub(crate) fn read_instance(
        &mut self,
        cursor: &mut MofCursor,
        depth: usize,
    ) -> Result<CimInstance, MofError> {
        if depth > self.config.max_instance_depth {
            return Err(MofError::NestingTooDeep(self.config.max_instance_depth));
        }

        let class_name = self.read_name(cursor, "instance class")?;
        let class = self.instance_class(&class_name)?;

        let count = cursor.read_u16()?;
        let mut properties = NamedMap::new();
        for _ in 0..count {
            let name = cursor.read_string()?;
            let declaration = declared_property(&class, &properties, &name)?;

            let owner = format!("{}.{}", class.name, declaration.name);
            let value = self.read_value_slot(
                cursor,
                declaration.cim_type,
                declaration.reference_class.as_deref(),
                &owner,
                depth,
            )?;
            trace!(target: "mof", "{owner} = {value:?}");

            properties.insert(
                &name,
                CimProperty {
                    name: declaration.name.clone(),
                    cim_type: declaration.cim_type,
                    value,
                },
            );
        }

        Ok(finish_instance(class, properties, depth))
    }

    /// Resolve the class an instance belongs to, which must not be abstract
    pub(crate) fn instance_class(&mut self, class_name: &str) -> Result<Arc<CimClass>, MofError> {
        let class = self.resolve_class(class_name)?;
        if class.is_abstract() {
            return Err(MofError::AbstractInstance(class.name.clone()));
        }
        Ok(class)
    }
}

/// Look up the declaration for a property an instance sets, which it may set only once
pub(crate) fn declared_property<'a>(
    class: &'a CimClass,
    assigned: &NamedMap<CimProperty>,
    name: &str,
) -> Result<&'a PropertyDeclaration, MofError> {
    let Some(declaration) = class.properties.get(name) else {
        return Err(MofError::UnknownProperty {
            class: class.name.clone(),
            property: name.to_string(),
        });
    };
    if assigned.contains(name) {
        return Err(MofError::DuplicateMember {
            owner: format!("instance of {}", class.name),
            name: name.to_string(),
        });
    }
    Ok(declaration)
}

pub(crate) fn finish_instance(
    class: Arc<CimClass>,
    properties: NamedMap<CimProperty>,
    depth: usize,
) -> CimInstance {
    if depth == 0 {
        debug!(
            target: "mof",
            "decoded instance of `{}` with {} properties",
            class.name,
            properties.len()
        );
    }
    CimInstance { class, properties }
}
