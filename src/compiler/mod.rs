pub mod bucket;
pub mod codec;
pub mod expander;
pub mod loader;
