//! Configuration types for Stencil.
//!
//! Everything here is read once when the view engine is constructed and is
//! immutable afterwards. See [`ConfigLoader`] for the `stencil.yaml` format.

pub mod env;
pub mod loader;
pub mod types;

pub use env::*;
pub use loader::*;
pub use types::*;
