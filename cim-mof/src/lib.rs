#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

pub mod error;
pub mod mof;
pub mod util;

pub use crate::{
    error::mof::{ErrorKind, MofError},
    mof::{
        config::DeserializerConfig,
        deserializer::MofDeserializer,
        hooks::DeserializeOptions,
        models::{CimClass, CimInstance, CimType, CimValue},
    },
};
