pub mod config;
pub mod error;
pub mod dsl;
pub mod compiler;
pub mod runtime;
pub mod sources;

pub use error::CompositionError;
