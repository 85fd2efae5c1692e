pub mod error;
pub mod options;
pub mod runtime;
pub mod sanitizers;
pub mod schema;
