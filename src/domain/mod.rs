//! Domain Layer
//!
//! Entities, value objects and the ports the registrar talks through.

pub mod entities;
pub mod ports;
pub mod value_objects;

pub use entities::{Endpoint, ServiceRecord};
pub use value_objects::{RegistryKey, Weight};
