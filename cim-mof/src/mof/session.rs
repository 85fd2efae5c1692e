/*!
 State shared by the decoders for the duration of a single deserialize call.
*/

use std::{collections::HashMap, sync::Arc};

use log::debug;

use crate::{
    error::mof::MofError,
    mof::{
        config::DeserializerConfig,
        hooks::{DeserializeOptions, GetIncludedFileContent, OnClassNeeded},
        models::{fold_name, CimClass, CimInstance},
        text::compile::QualifierType,
    },
    util::cursor::MofCursor,
};

/// Which kind of record a call returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Target {
    Classes,
    Instances,
}

/// A decoded top-level record
#[derive(Debug)]
pub(crate) enum Record {
    Class(Arc<CimClass>),
    Instance(CimInstance),
}

/// Decoding context for one deserialize call
pub(crate) struct Session<'c, 'h> {
    pub(crate) config: &'c DeserializerConfig,
    pub(crate) target: Target,
    pub(crate) locale: Option<&'h str>,
    on_class_needed: Option<Box<OnClassNeeded<'h>>>,
    pub(crate) get_included_file: Option<Box<GetIncludedFileContent<'h>>>,
    /// Classes declared in the buffer so far, keyed by namespace and name
    declared: HashMap<String, Arc<CimClass>>,
    /// Classes returned by the class resolver, so each is requested once
    resolved: HashMap<String, Arc<CimClass>>,
    pub(crate) server: String,
    pub(crate) namespace: String,
    /// Files currently being included, outermost first
    pub(crate) includes: Vec<String>,
    /// Object paths of aliased instances, keyed by folded alias
    pub(crate) aliases: HashMap<String, String>,
    /// Qualifier declarations seen so far, keyed by folded name
    pub(crate) qualifier_types: HashMap<String, QualifierType>,
}

impl<'c, 'h> Session<'c, 'h> {
    pub(crate) fn new(
        config: &'c DeserializerConfig,
        options: DeserializeOptions<'h>,
        target: Target,
    ) -> Self {
        Self {
            config,
            target,
            locale: options.locale,
            on_class_needed: options.on_class_needed,
            get_included_file: options.get_included_file,
            declared: HashMap::new(),
            resolved: HashMap::new(),
            server: config.default_server.clone(),
            namespace: config.default_namespace.clone(),
            includes: vec![],
            aliases: HashMap::new(),
            qualifier_types: HashMap::new(),
        }
    }

    /// Classes with the same name in different namespaces are distinct
    fn class_key(&self, class_name: &str) -> String {
        format!(
            "{}:{}",
            fold_name(&self.namespace.replace('\\', "/")),
            fold_name(class_name)
        )
    }

    pub(crate) fn is_declared(&self, class_name: &str) -> bool {
        self.declared.contains_key(&self.class_key(class_name))
    }

    pub(crate) fn declare(&mut self, class: Arc<CimClass>) {
        let key = self.class_key(&class.name);
        self.declared.insert(key, class);
    }

    /// Find a class declared earlier in the buffer, falling back to the class resolver
    pub(crate) fn resolve_class(&mut self, class_name: &str) -> Result<Arc<CimClass>, MofError> {
        let key = self.class_key(class_name);
        if let Some(class) = self.declared.get(&key).or_else(|| self.resolved.get(&key)) {
            return Ok(Arc::clone(class));
        }

        let Some(hook) = self.on_class_needed.as_mut() else {
            return Err(MofError::ClassNotFound {
                class: class_name.to_string(),
                namespace: self.namespace.clone(),
            });
        };

        debug!(
            target: "mof",
            "requesting class `{class_name}` from {}:{}",
            self.server,
            self.namespace
        );
        let class = hook(&self.server, &self.namespace, class_name).map_err(|source| {
            MofError::ClassResolution {
                class: class_name.to_string(),
                source,
            }
        })?;
        if fold_name(&class.name) != fold_name(class_name) {
            return Err(MofError::ResolvedClassMismatch {
                requested: class_name.to_string(),
                returned: class.name.clone(),
            });
        }

        self.resolved.insert(key, Arc::clone(&class));
        Ok(class)
    }

    /// Read a name that may not be empty
    pub(crate) fn read_name(
        &self,
        cursor: &mut MofCursor,
        what: &'static str,
    ) -> Result<String, MofError> {
        let offset = cursor.position();
        let name = cursor.read_string()?;
        if name.is_empty() {
            return Err(MofError::EmptyName { what, offset });
        }
        Ok(name)
    }

    /// Apply a `namespace` pragma, which may name a server as `\\server\ns` or `//server/ns`
    pub(crate) fn set_namespace(&mut self, path: &str) {
        let server_path = path
            .strip_prefix("\\\\")
            .or_else(|| path.strip_prefix("//"));
        match server_path.and_then(|rest| rest.split_once(['\\', '/'])) {
            Some((server, namespace)) => {
                self.server = server.to_string();
                self.namespace = namespace.to_string();
            }
            None => self.namespace = path.to_string(),
        }
        debug!(
            target: "mof",
            "namespace is now {}:{}",
            self.server,
            self.namespace
        );
    }
}

#[cfg(test)]
mod tests {
    use crate::mof::{
        config::DeserializerConfig,
        hooks::DeserializeOptions,
        session::{Session, Target},
    };

    #[test]
    fn can_set_namespace_with_server() {
        let config = DeserializerConfig::default();
        let mut session = Session::new(&config, DeserializeOptions::new(), Target::Classes);

        session.set_namespace("\\\\Servername\\root\\TestNamespace");

        assert_eq!(session.server, "Servername");
        assert_eq!(session.namespace, "root\\TestNamespace");
    }

    #[test]
    fn can_set_namespace_without_server() {
        let config = DeserializerConfig::default();
        let mut session = Session::new(&config, DeserializeOptions::new(), Target::Classes);

        session.set_namespace("root/interop");

        assert_eq!(session.server, ".");
        assert_eq!(session.namespace, "root/interop");
    }

    #[test]
    fn namespaces_scope_class_keys() {
        let config = DeserializerConfig::default();
        let mut session = Session::new(&config, DeserializeOptions::new(), Target::Classes);
        let before = session.class_key("A");

        session.set_namespace("root\\CIMV2");

        assert_eq!(before, session.class_key("a"));
        session.set_namespace("root/other");
        assert_ne!(before, session.class_key("a"));
    }
}
