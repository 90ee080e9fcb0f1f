use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::types::analysis::{AdvisorAnalysis, Bottleneck, ProposedKpi};
use crate::types::business::BusinessContext;
use crate::types::evidence::ProvenanceEntry;
use crate::types::persona::Persona;

/// 单个顾问节点的产出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorResult {
    pub persona: Persona,
    pub analysis: AdvisorAnalysis,
    pub provenance: Vec<ProvenanceEntry>,
}

impl AdvisorResult {
    pub fn new(persona: Persona, analysis: AdvisorAnalysis, provenance: Vec<ProvenanceEntry>) -> Self {
        Self {
            persona,
            analysis,
            provenance,
        }
    }

    /// 顾问执行失败时的占位结果
    pub fn failed(
        persona: Persona,
        provenance: Vec<ProvenanceEntry>,
        error: impl std::fmt::Display,
    ) -> Self {
        Self::new(persona, AdvisorAnalysis::failed(error), provenance)
    }

    pub fn is_failure(&self) -> bool {
        self.analysis.is_failure()
    }
}

/// 报告中单个顾问的洞察
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachInsight {
    pub analysis: AdvisorAnalysis,
    pub provenance: Vec<ProvenanceEntry>,
}

/// 行动计划条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionItem {
    pub fix: String,
    pub from: Persona,
}

/// 合并后的最终报告，每次运行生成一次，之后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalReport {
    /// 业务上下文回显
    pub business_snapshot: BusinessContext,

    pub coach_insights: BTreeMap<Persona, CoachInsight>,

    /// 按优先级全局排序后的瓶颈
    pub consensus_bottlenecks: Vec<Bottleneck>,

    pub action_plan: Vec<ActionItem>,

    /// 各顾问关注KPI的并集
    pub kpis_to_track: BTreeSet<String>,

    pub proposed_kpis: Vec<ProposedKpi>,

    pub final_summary: String,

    pub rag_provenance: BTreeMap<Persona, Vec<ProvenanceEntry>>,

    /// 根据KPI基线推算的目标值
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub kpi_targets: BTreeMap<String, f64>,
}
