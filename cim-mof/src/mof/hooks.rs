/*!
 Callbacks the deserializer uses to reach outside of the buffer it is decoding.

 Both hooks run synchronously on the calling thread. The deserializer imposes no timeout on them and
 does not retry; an error they return becomes the source of the resulting [`MofError`](crate::error::mof::MofError).
*/

use std::{
    error::Error,
    fmt::{Debug, Formatter, Result},
    sync::Arc,
};

use crate::mof::models::CimClass;

/// Errors raised by a hook
pub type HookError = Box<dyn Error + Send + Sync>;

/// Resolve a class that is not declared earlier in the buffer, given `(server_name, namespace, class_name)`
pub type OnClassNeeded<'a> =
    dyn FnMut(&str, &str, &str) -> std::result::Result<Arc<CimClass>, HookError> + 'a;

/// Fetch the raw bytes of a file named by an include record
pub type GetIncludedFileContent<'a> =
    dyn FnMut(&str) -> std::result::Result<Vec<u8>, HookError> + 'a;

/// Per-call options for [`MofDeserializer`](crate::mof::deserializer::MofDeserializer)
///
/// # Example:
///
/// ```
/// use std::sync::Arc;
/// use cim_mof::mof::{hooks::DeserializeOptions, models::CimClass};
///
/// let options = DeserializeOptions::new()
///     .with_locale("en-US")
///     .with_class_resolver(|_server, namespace, class| Ok(Arc::new(CimClass::new(class, namespace))));
/// ```
#[derive(Default)]
pub struct DeserializeOptions<'a> {
    /// Only used in diagnostics
    pub locale: Option<&'a str>,
    pub on_class_needed: Option<Box<OnClassNeeded<'a>>>,
    pub get_included_file: Option<Box<GetIncludedFileContent<'a>>>,
}

impl<'a> DeserializeOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_locale(mut self, locale: &'a str) -> Self {
        self.locale = Some(locale);
        self
    }

    pub fn with_class_resolver<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&str, &str, &str) -> std::result::Result<Arc<CimClass>, HookError> + 'a,
    {
        self.on_class_needed = Some(Box::new(hook));
        self
    }

    pub fn with_include_resolver<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&str) -> std::result::Result<Vec<u8>, HookError> + 'a,
    {
        self.get_included_file = Some(Box::new(hook));
        self
    }
}

impl Debug for DeserializeOptions<'_> {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result {
        fmt.debug_struct("DeserializeOptions")
            .field("locale", &self.locale)
            .field("on_class_needed", &self.on_class_needed.is_some())
            .field("get_included_file", &self.get_included_file.is_some())
            .finish()
    }
}
