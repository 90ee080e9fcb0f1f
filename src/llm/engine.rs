//! 文本生成引擎的抽象 - 输入按角色标记的消息，输出生成文本

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// 按角色标记的一条消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// 文本生成引擎
///
/// 输出不保证是合法JSON，调用方需自行做结构化提取。
#[async_trait]
pub trait GenerationEngine: Send + Sync {
    async fn submit(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// 拆分为系统提示词与用户提示词，多条同角色消息以空行拼接
pub fn split_prompts(messages: &[ChatMessage]) -> (String, String) {
    let join = |role: Role| {
        messages
            .iter()
            .filter(|m| m.role == role)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    };
    (join(Role::System), join(Role::User))
}
