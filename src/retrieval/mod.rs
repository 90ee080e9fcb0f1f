//! 证据检索 - 按角色集合检索与业务最相关的知识片段

use anyhow::Result;
use async_trait::async_trait;

use crate::types::evidence::EvidenceItem;

pub mod chunk_store;

pub use chunk_store::ChunkFileStore;

/// 证据库
///
/// 返回按相关度降序排列的至多`k`条证据；集合不存在或为空时返回空列表。
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    async fn query(&self, collection: &str, query: &str, k: usize) -> Result<Vec<EvidenceItem>>;
}

/// 检索被禁用时使用的空证据库
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledEvidenceStore;

#[async_trait]
impl EvidenceStore for DisabledEvidenceStore {
    async fn query(&self, _collection: &str, _query: &str, _k: usize) -> Result<Vec<EvidenceItem>> {
        Ok(Vec::new())
    }
}
