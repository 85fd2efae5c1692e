/*!
 Contains logic and data structures used to deserialize Managed Object Format (MOF) data into
 CIM classes and instances.

 ## Overview

 MOF text declares classes with qualifiers, properties, and methods, and instances that assign values to
 the properties of a class. Text is parsed and compiled one declaration at a time.

 The crate also reads its own compact binary encoding of the same declarations. Each declaration is a
 tagged, length-prefixed record; values use fixed-width little-endian scalars and length-prefixed strings.
 This encoding is not the compiled MOF format produced by other MOF compilers.

 ## Resolution

 Superclasses and instance classes are bound to classes declared earlier in the same call. Anything else
 is requested through [`hooks::OnClassNeeded`]. Include records and `#pragma include` pull in more data
 through [`hooks::GetIncludedFileContent`].
*/

mod class;
pub mod config;
mod declarations;
pub mod deserializer;
pub mod hooks;
mod instance;
pub mod models;
mod session;
mod tests;
mod text;
