pub mod context;
pub mod engine;
pub mod resolver;
pub mod sampler;
pub mod storage;
pub mod text;
