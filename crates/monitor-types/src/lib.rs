//! Foundation types for the Monitor command engine.
//!
//! This crate holds the data shared by every Monitor crate: lexical tokens,
//! runtime values, the explicit member tables that replace run-time
//! reflection, configuration, and the error taxonomy.

pub mod config;
pub mod error;
pub mod member;
pub mod token;
pub mod value;

pub use config::{MonitorConfig, NumberMode};
pub use error::{MonitorError, Result};
pub use member::{
    IntKind, MonitorObject, ObjectRef, ParamSpec, TypeInfo, TypeInfoBuilder, TypeRegistry,
    ValueType,
};
pub use token::{Token, TokenKind, TokenizationResult};
pub use value::{EnumSpec, Value};
