/*!
 Settings fixed when a [`MofDeserializer`](crate::mof::deserializer::MofDeserializer) is created.
*/

/// Largest buffer accepted by default, 50 MiB
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 50 * 1024 * 1024;
/// Newest format version this crate understands
pub const FORMAT_VERSION: u16 = 1;
/// Server name passed to class resolvers when no `namespace` pragma names one
pub const DEFAULT_SERVER: &str = ".";
/// Namespace used until a `namespace` pragma changes it
pub const DEFAULT_NAMESPACE: &str = "root/cimv2";

/// Deserializer settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeserializerConfig {
    /// Buffers, and included files, larger than this are rejected before decoding
    pub max_buffer_size: usize,
    /// Documents with a newer format version are not supported
    pub format_version: u16,
    pub default_server: String,
    pub default_namespace: String,
    /// Whether include records are processed at all
    pub include_files: bool,
    pub max_include_depth: usize,
    /// How deeply embedded instances may nest inside each other
    pub max_instance_depth: usize,
}

impl DeserializerConfig {
    pub fn with_max_buffer_size(mut self, size: usize) -> Self {
        self.max_buffer_size = size;
        self
    }

    pub fn with_format_version(mut self, version: u16) -> Self {
        self.format_version = version;
        self
    }

    pub fn with_default_namespace(mut self, server: &str, namespace: &str) -> Self {
        self.default_server = server.to_string();
        self.default_namespace = namespace.to_string();
        self
    }

    pub fn with_include_files(mut self, enabled: bool) -> Self {
        self.include_files = enabled;
        self
    }

    pub fn with_max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth;
        self
    }

    pub fn with_max_instance_depth(mut self, depth: usize) -> Self {
        self.max_instance_depth = depth;
        self
    }
}

impl Default for DeserializerConfig {
    fn default() -> Self {
        Self {
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            format_version: FORMAT_VERSION,
            default_server: DEFAULT_SERVER.to_string(),
            default_namespace: DEFAULT_NAMESPACE.to_string(),
            include_files: true,
            max_include_depth: 8,
            max_instance_depth: 32,
        }
    }
}
