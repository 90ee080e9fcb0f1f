//! 顾问智能体 - 每位顾问以固定角色独立分析同一份业务上下文
//!
//! 执行流程：检索证据并构建提示词 -> 限时生成 -> 结构化解析 -> 必要时修复一次。
//! 单个顾问的任何失败都在这里收敛为降级结果，不会影响其他顾问。

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::generator::context::AdvisoryContext;
use crate::generator::error::AdvisorError;
use crate::generator::prompt::{AdvisorPrompt, AdvisorPromptBuilder};
use crate::generator::structured_output::{parse_structured, repair};
use crate::llm::ChatMessage;
use crate::types::analysis::AdvisorAnalysis;
use crate::types::business::BusinessContext;
use crate::types::persona::Persona;
use crate::types::report::AdvisorResult;

pub mod agents;

pub use agents::offer_advisor::OfferAdvisor;
pub use agents::operations_advisor::OperationsAdvisor;
pub use agents::positioning_advisor::PositioningAdvisor;

/// 所有顾问共享的输出约束，接在角色描述之后
pub const OUTPUT_CONTRACT: &str = "You MUST return ONLY a single JSON object matching the schema provided. \
No commentary, no markdown, no code fences. \
If KPIs are missing, include a 'proposed_kpis' array with exactly 3 items of the form {\"kpi\": \"\", \"why\": \"\"}. \
If you cannot determine a value, set it to the string \"I_DONT_KNOW\".";

/// 拼接角色描述与输出约束
pub fn persona_system_prompt(role_line: &str) -> String {
    format!("{}\n{}", role_line, OUTPUT_CONTRACT)
}

/// 顾问智能体
#[async_trait]
pub trait AdvisorAgent: Send + Sync {
    fn persona(&self) -> Persona;

    /// 角色系统提示词
    fn system_prompt(&self) -> String;

    /// 完整执行一次分析，失败时返回带错误描述的降级结果
    async fn execute(&self, context: &AdvisoryContext, business: &BusinessContext) -> AdvisorResult {
        let persona = self.persona();
        info!(persona = %persona, node = persona.node_name(), "🤖 顾问开始分析");

        let AdvisorPrompt {
            messages,
            provenance,
        } = AdvisorPromptBuilder::new(self.system_prompt())
            .build(context, business, persona, context.evidence_k())
            .await;

        let text = match generate(context, persona, &messages).await {
            Ok(text) => text,
            Err(e) => {
                warn!(persona = %persona, error = %e, "❌ 顾问分析失败，使用降级结果");
                return AdvisorResult::failed(persona, provenance, e);
            }
        };

        let parsed = parse_structured(&text);
        let repaired = repair(
            parsed,
            context.engine.as_ref(),
            &messages,
            context.generation_timeout(),
        )
        .await;
        let analysis = AdvisorAnalysis::from_mapping(repaired);

        if analysis.is_degraded() {
            warn!(persona = %persona, "⚠️ 顾问输出无法结构化，保留原始文本");
        } else {
            let missing = analysis.missing_keys();
            if !missing.is_empty() {
                debug!(persona = %persona, missing = ?missing, "修复后仍缺少字段");
            }
        }
        info!(
            persona = %persona,
            bottlenecks = analysis.bottlenecks().len(),
            evidence = provenance.len(),
            "✅ 顾问分析完成"
        );
        AdvisorResult::new(persona, analysis, provenance)
    }
}

/// 限时提交生成请求
async fn generate(
    context: &AdvisoryContext,
    persona: Persona,
    messages: &[ChatMessage],
) -> Result<String, AdvisorError> {
    let timeout: Duration = context.generation_timeout();
    match tokio::time::timeout(timeout, context.engine.submit(messages)).await {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(source)) => Err(AdvisorError::Generation { persona, source }),
        Err(_) => Err(AdvisorError::GenerationTimeout {
            persona,
            seconds: timeout.as_secs(),
        }),
    }
}

/// 三位顾问，按规范顺序排列
pub fn default_advisors() -> Vec<Arc<dyn AdvisorAgent>> {
    vec![
        Arc::new(OperationsAdvisor),
        Arc::new(PositioningAdvisor),
        Arc::new(OfferAdvisor),
    ]
}
