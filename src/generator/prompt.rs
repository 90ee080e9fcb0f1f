use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::generator::context::AdvisoryContext;
use crate::generator::error::AdvisorError;
use crate::llm::ChatMessage;
use crate::types::business::{BusinessContext, KpiBaseline};
use crate::types::evidence::{EvidenceItem, ProvenanceEntry};
use crate::types::persona::Persona;

/// 检索为空时写入提示词的标记
pub const NO_EVIDENCE_MARKER: &str = "NO_RETRIEVED_EVIDENCE";

/// 未提供KPI时写入提示词的标记
pub const NO_KPI_MARKER: &str = "none";

/// 要求顾问遵循的输出结构
pub const COACH_JSON_SCHEMA: &str = r#"Respond ONLY in this JSON format (exact keys; additional keys are allowed but the listed keys should be present):

{
  "bottlenecks": [
    {
      "name": "",
      "diagnosis": "",
      "tactical_fix": ["", ""],
      "priority": "low|medium|high"
    }
  ],
  "top_recommendation": "",
  "kpis_to_track": ["kpi_name1", "kpi_name2"],
  "proposed_kpis": [
    {"kpi": "", "why": ""}
  ],
  "summary": ""
}"#;

/// 构建完成的顾问提示词及其证据溯源
#[derive(Debug, Clone, PartialEq)]
pub struct AdvisorPrompt {
    /// 依次为系统消息与用户消息
    pub messages: Vec<ChatMessage>,
    pub provenance: Vec<ProvenanceEntry>,
}

/// 顾问提示词构建器
///
/// 先按角色集合检索证据，再把业务上下文、KPI与证据拼装为用户消息。
/// 检索失败或超时不会中断构建，只会退化为无证据的提示词。
pub struct AdvisorPromptBuilder {
    system_prompt: String,
}

impl AdvisorPromptBuilder {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
        }
    }

    pub async fn build(
        &self,
        context: &AdvisoryContext,
        business: &BusinessContext,
        persona: Persona,
        k: usize,
    ) -> AdvisorPrompt {
        let evidence = retrieve_evidence(context, business, persona, k).await;

        let provenance = evidence
            .iter()
            .enumerate()
            .map(|(i, item)| ProvenanceEntry::from_ranked(i + 1, item))
            .collect();
        let user_prompt = format_user_prompt(business, persona.collection_id(), &evidence);

        AdvisorPrompt {
            messages: vec![
                ChatMessage::system(self.system_prompt.clone()),
                ChatMessage::user(user_prompt),
            ],
            provenance,
        }
    }
}

async fn retrieve_evidence(
    context: &AdvisoryContext,
    business: &BusinessContext,
    persona: Persona,
    k: usize,
) -> Vec<EvidenceItem> {
    let timeout = context.retrieval_timeout();
    let query = business.retrieval_query();
    let lookup = context
        .evidence_store
        .query(persona.collection_id(), &query, k);

    let failure = match tokio::time::timeout(timeout, lookup).await {
        Ok(Ok(mut items)) => {
            items.truncate(k);
            debug!(persona = %persona, count = items.len(), "证据检索完成");
            return items;
        }
        Ok(Err(source)) => AdvisorError::Retrieval { persona, source },
        Err(_) => AdvisorError::RetrievalTimeout {
            persona,
            seconds: timeout.as_secs(),
        },
    };
    warn!(error = %failure, "⚠️ 证据检索失败，按无证据继续");
    Vec::new()
}

/// 证据块，序号从1开始
pub fn format_evidence_block(evidence: &[EvidenceItem]) -> String {
    if evidence.is_empty() {
        return NO_EVIDENCE_MARKER.to_string();
    }
    evidence
        .iter()
        .enumerate()
        .map(|(i, item)| {
            format!(
                "--- EVIDENCE {} (source={}, chunk_id={}) ---\n{}",
                i + 1,
                item.source,
                item.chunk_id,
                item.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// KPI块，每行`- 名称: 值`
pub fn format_kpi_block(kpis: &BTreeMap<String, KpiBaseline>) -> String {
    if kpis.is_empty() {
        return NO_KPI_MARKER.to_string();
    }
    kpis.iter()
        .map(|(name, baseline)| match baseline {
            Some(value) => format!("- {}: {}", name, value),
            None => format!("- {}: null", name),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_user_prompt(
    business: &BusinessContext,
    collection: &str,
    evidence: &[EvidenceItem],
) -> String {
    format!(
        "Business Description:\n{}\n\nGoal:\n{}\n\nKPIs:\n{}\n\n\
         Retrieved Evidence (top {} from coach collection '{}'):\n{}\n\n\
         Respond STRICTLY in this JSON format (no extra commentary):\n{}\n",
        business.description,
        business.goal,
        format_kpi_block(&business.kpis),
        evidence.len(),
        collection,
        format_evidence_block(evidence),
        COACH_JSON_SCHEMA
    )
}
