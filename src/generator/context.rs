use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::config::Config;
use crate::llm::{GenerationEngine, LLMClient};
use crate::retrieval::{ChunkFileStore, DisabledEvidenceStore, EvidenceStore};

/// 一次顾问运行所需的全部依赖，由调用方显式注入
#[derive(Clone)]
pub struct AdvisoryContext {
    /// 文本生成引擎
    pub engine: Arc<dyn GenerationEngine>,
    /// 证据库
    pub evidence_store: Arc<dyn EvidenceStore>,
    /// 配置
    pub config: Config,
}

impl AdvisoryContext {
    pub fn new(
        config: Config,
        engine: Arc<dyn GenerationEngine>,
        evidence_store: Arc<dyn EvidenceStore>,
    ) -> Self {
        Self {
            engine,
            evidence_store,
            config,
        }
    }

    /// 按配置构建基于rig的LLM客户端与分片文件证据库
    pub fn from_config(config: Config) -> Result<(Self, LLMClient)> {
        let llm_client = LLMClient::new(config.llm.clone())?;
        let evidence_store: Arc<dyn EvidenceStore> = if config.retrieval.enabled {
            Arc::new(ChunkFileStore::new(config.retrieval.knowledge_dir.clone()))
        } else {
            Arc::new(DisabledEvidenceStore)
        };
        let context = Self::new(config, Arc::new(llm_client.clone()), evidence_store);
        Ok((context, llm_client))
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.config.llm.timeout_seconds.max(1))
    }

    pub fn retrieval_timeout(&self) -> Duration {
        Duration::from_secs(self.config.retrieval.timeout_seconds.max(1))
    }

    pub fn evidence_k(&self) -> usize {
        self.config.retrieval.top_k
    }
}
