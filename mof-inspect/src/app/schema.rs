/*!
 Classes loaded from schema files, used to answer lookups for classes a file does not declare.
*/

use std::{collections::HashMap, sync::Arc};

use cim_mof::CimClass;
use log::warn;

/// Schema classes keyed by namespace and name
#[derive(Debug, Default)]
pub struct SchemaRepository {
    classes: HashMap<String, Arc<CimClass>>,
}

/// Namespaces compare without regard to case or the direction of their separators
fn key(namespace: &str, class_name: &str) -> String {
    format!(
        "{}:{}",
        namespace.replace('\\', "/").to_lowercase(),
        class_name.to_lowercase()
    )
}

impl SchemaRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Add a class; a later class with the same name and namespace replaces an earlier one
    pub fn add(&mut self, class: Arc<CimClass>) {
        let key = key(&class.namespace, &class.name);
        if let Some(previous) = self.classes.insert(key, class) {
            warn!(
                "schema class {}:{} was loaded more than once",
                previous.namespace, previous.name
            );
        }
    }

    pub fn find(&self, namespace: &str, class_name: &str) -> Option<Arc<CimClass>> {
        self.classes.get(&key(namespace, class_name)).cloned()
    }
}
