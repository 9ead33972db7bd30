use async_trait::async_trait;
use crate::dsl::ExtensionData;
use anyhow::Result;
use std::fmt::Debug;

pub mod file;
pub mod http;
pub mod memory;

pub use file::DirectoryExtensionSource;
pub use http::HttpExtensionSource;
pub use memory::MemoryExtensionSource;

/// 扩展文本来源接口：按名称取回一个扩展
///
/// A failed fetch is replaced by an empty extension in the engine.
#[async_trait]
pub trait ExtensionSource: Send + Sync + Debug {
    async fn fetch(&self, name: &str) -> Result<ExtensionData>;
}
