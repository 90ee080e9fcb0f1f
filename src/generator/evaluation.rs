//! 场景评估 - 用一组固定业务场景跑完整流程，记录校验结果与基础指标

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::generator::context::AdvisoryContext;
use crate::generator::orchestrator::AdvisoryGraph;
use crate::types::business::BusinessContext;
use crate::types::persona::Persona;
use crate::types::report::FinalReport;

/// 一个评估场景
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub business: BusinessContext,
}

impl Scenario {
    pub fn new(name: impl Into<String>, business: BusinessContext) -> Self {
        Self {
            name: name.into(),
            business,
        }
    }
}

/// 内置的三个场景
pub fn default_scenarios() -> Vec<Scenario> {
    vec![
        Scenario::new(
            "diaper_manufacturing",
            BusinessContext::new(
                "Diaper manufacturing business with moderate local sales and high production costs.",
                "Get profitable in 6 months",
            )
            .with_kpi("production_cost_per_unit", None)
            .with_kpi("revenue", None),
        ),
        Scenario::new(
            "local_coaching_saas",
            BusinessContext::new(
                "Bootstrapped coaching SaaS selling monthly subscriptions to coaches.",
                "Double monthly recurring revenue in 6 months",
            ),
        ),
        Scenario::new(
            "small_retail_chain",
            BusinessContext::new(
                "3-store retail chain with inconsistent inventory and declining footfall.",
                "Increase same-store sales by 20% in 3 months",
            )
            .with_kpi("conversion_rate", None),
        ),
    ]
}

/// 单个场景的报告指标
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioMetrics {
    pub num_consensus_bottlenecks: usize,
    pub num_action_plan_items: usize,
    pub num_kpis_to_track: usize,
    pub num_proposed_kpis: usize,
    pub provenance_counts: BTreeMap<Persona, usize>,
}

impl ScenarioMetrics {
    pub fn from_report(report: &FinalReport) -> Self {
        Self {
            num_consensus_bottlenecks: report.consensus_bottlenecks.len(),
            num_action_plan_items: report.action_plan.len(),
            num_kpis_to_track: report.kpis_to_track.len(),
            num_proposed_kpis: report.proposed_kpis.len(),
            provenance_counts: report
                .coach_insights
                .iter()
                .map(|(persona, insight)| (*persona, insight.provenance.len()))
                .collect(),
        }
    }
}

/// 单个场景的评估结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub scenario: String,
    pub run_id: String,
    pub start_ts: f64,
    pub end_ts: f64,
    pub ok: bool,
    pub errors: Vec<String>,
    #[serde(default)]
    pub metrics: ScenarioMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_report_path: Option<PathBuf>,
}

/// 评估汇总
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub runs: Vec<ScenarioOutcome>,
}

impl EvaluationSummary {
    pub fn passed(&self) -> usize {
        self.runs.iter().filter(|run| run.ok).count()
    }
}

/// 场景评估器
pub struct EvaluationHarness {
    graph: AdvisoryGraph,
    metadata_dir: PathBuf,
}

impl EvaluationHarness {
    pub fn new(graph: AdvisoryGraph, metadata_dir: impl Into<PathBuf>) -> Self {
        Self {
            graph,
            metadata_dir: metadata_dir.into(),
        }
    }

    /// 依次运行全部场景并写出汇总文件，单个场景失败只记录错误
    pub async fn run(
        &self,
        context: &AdvisoryContext,
        scenarios: &[Scenario],
    ) -> Result<(EvaluationSummary, PathBuf)> {
        tokio::fs::create_dir_all(&self.metadata_dir)
            .await
            .with_context(|| {
                format!("Failed to create metadata dir: {}", self.metadata_dir.display())
            })?;

        let mut summary = EvaluationSummary::default();
        for scenario in scenarios {
            summary.runs.push(self.run_scenario(context, scenario).await);
        }

        let path = self
            .metadata_dir
            .join(format!("eval_results_{}.json", Utc::now().timestamp()));
        tokio::fs::write(&path, serde_json::to_string_pretty(&summary)?)
            .await
            .with_context(|| format!("Failed to write evaluation summary: {}", path.display()))?;
        info!(
            path = %path.display(),
            passed = summary.passed(),
            total = summary.runs.len(),
            "📊 评估完成"
        );
        Ok((summary, path))
    }

    async fn run_scenario(&self, context: &AdvisoryContext, scenario: &Scenario) -> ScenarioOutcome {
        let run_id = format!("eval-{}", short_id());
        info!(scenario = %scenario.name, run_id = %run_id, "▶️ 运行评估场景");

        let mut outcome = ScenarioOutcome {
            scenario: scenario.name.clone(),
            run_id,
            start_ts: unix_seconds(),
            end_ts: 0.0,
            ok: false,
            errors: Vec::new(),
            metrics: ScenarioMetrics::default(),
            final_report_path: None,
        };

        match self.graph.invoke(context, &scenario.business).await {
            Ok(report) => {
                outcome.errors = report.validate();
                outcome.ok = outcome.errors.is_empty();
                outcome.metrics = ScenarioMetrics::from_report(&report);
                match self.save_report(&scenario.name, &outcome.run_id, &report).await {
                    Ok(path) => outcome.final_report_path = Some(path),
                    Err(e) => warn!(scenario = %scenario.name, error = %e, "⚠️ 场景报告保存失败"),
                }
            }
            Err(e) => {
                warn!(scenario = %scenario.name, error = %e, "❌ 评估场景执行失败");
                outcome.errors.push(format!("exception_during_invoke: {}", e));
            }
        }

        outcome.end_ts = unix_seconds();
        outcome
    }

    async fn save_report(&self, scenario: &str, run_id: &str, report: &FinalReport) -> Result<PathBuf> {
        let path = report_path(&self.metadata_dir, scenario, run_id);
        tokio::fs::write(&path, serde_json::to_string_pretty(report)?).await?;
        Ok(path)
    }
}

fn report_path(metadata_dir: &Path, scenario: &str, run_id: &str) -> PathBuf {
    metadata_dir.join(format!("final_report_{}_{}.json", scenario, run_id))
}

/// 8位十六进制短标识
pub fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn unix_seconds() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::llm::{ChatMessage, GenerationEngine};
    use crate::retrieval::DisabledEvidenceStore;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// 描述中含有"retail"时失败，其余返回固定分析
    struct RetailFailingEngine;

    #[async_trait]
    impl GenerationEngine for RetailFailingEngine {
        async fn submit(&self, messages: &[ChatMessage]) -> Result<String> {
            if messages[1].content.contains("retail") {
                return Err(anyhow!("model overloaded"));
            }
            Ok(r#"{"bottlenecks": [{"name": "b", "tactical_fix": ["f1", "f2"], "priority": "high"}],
                  "top_recommendation": "r", "kpis_to_track": ["revenue"],
                  "proposed_kpis": [{"kpi": "margin", "why": "w"}], "summary": "s"}"#
                .to_string())
        }
    }

    #[test]
    fn test_default_scenarios() {
        let scenarios = default_scenarios();
        let names: Vec<&str> = scenarios.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["diaper_manufacturing", "local_coaching_saas", "small_retail_chain"]
        );
        assert_eq!(scenarios[0].business.kpis.get("revenue"), Some(&None));
        assert!(scenarios[1].business.kpis.is_empty());
    }

    #[test]
    fn test_short_id_shape() {
        let id = short_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_harness_records_success_and_failure() {
        let temp_dir = TempDir::new().unwrap();
        let context = AdvisoryContext::new(
            Config::default(),
            Arc::new(RetailFailingEngine),
            Arc::new(DisabledEvidenceStore),
        );
        let harness = EvaluationHarness::new(AdvisoryGraph::default(), temp_dir.path());

        let (summary, path) = harness.run(&context, &default_scenarios()).await.unwrap();

        assert_eq!(summary.runs.len(), 3);
        assert_eq!(summary.passed(), 2);

        let diaper = &summary.runs[0];
        assert!(diaper.ok);
        assert!(diaper.run_id.starts_with("eval-"));
        assert!(diaper.end_ts >= diaper.start_ts);
        assert_eq!(diaper.metrics.num_consensus_bottlenecks, 3);
        assert_eq!(diaper.metrics.num_action_plan_items, 6);
        assert_eq!(diaper.metrics.num_kpis_to_track, 1);
        assert_eq!(diaper.metrics.num_proposed_kpis, 3);
        assert_eq!(diaper.metrics.provenance_counts[&Persona::SamOvens], 0);
        assert!(diaper.final_report_path.as_ref().unwrap().exists());

        let retail = &summary.runs[2];
        assert!(!retail.ok);
        assert!(retail.errors[0].starts_with("exception_during_invoke: all advisors failed"));
        assert!(retail.final_report_path.is_none());

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["runs"].as_array().unwrap().len(), 3);
        assert!(
            path.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("eval_results_")
        );
    }
}
