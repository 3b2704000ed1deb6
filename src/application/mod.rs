//! Application Layer
//!
//! The two use cases of the registrar: sizing the instance and keeping its
//! registration alive.

pub mod capacity_prober;
pub mod registrar;

pub use capacity_prober::CapacityProber;
pub use registrar::{RegistrationState, Registrar};
