use thiserror::Error;

use crate::types::persona::Persona;

/// 单个顾问节点的失败原因
#[derive(Error, Debug)]
pub enum AdvisorError {
    #[error("{persona} generation failed: {source}")]
    Generation {
        persona: Persona,
        #[source]
        source: anyhow::Error,
    },

    #[error("{persona} generation timed out after {seconds}s")]
    GenerationTimeout { persona: Persona, seconds: u64 },

    #[error("{persona} retrieval failed: {source}")]
    Retrieval {
        persona: Persona,
        #[source]
        source: anyhow::Error,
    },

    #[error("{persona} retrieval timed out after {seconds}s")]
    RetrievalTimeout { persona: Persona, seconds: u64 },

    #[error("{persona} advisor task aborted: {message}")]
    TaskAborted { persona: Persona, message: String },
}

/// 整次运行级别的失败
#[derive(Error, Debug)]
pub enum OrchestrationError {
    /// 三位顾问全部失败，没有可合并的内容
    #[error("all advisors failed: {}", .failures.join("; "))]
    AllAdvisorsFailed { failures: Vec<String> },

    #[error("advisory graph has no advisors registered")]
    NoAdvisors,
}
