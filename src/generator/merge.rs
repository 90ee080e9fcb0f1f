//! 合并节点 - 把三位顾问的结果确定性地汇总为最终报告

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::types::analysis::Bottleneck;
use crate::types::business::BusinessContext;
use crate::types::report::{ActionItem, AdvisorResult, CoachInsight, FinalReport};

/// 行动计划的最大条目数
pub const ACTION_PLAN_LIMIT: usize = 8;

/// 各顾问摘要之间的分隔符
pub const SUMMARY_SEPARATOR: &str = " || ";

/// 合并各顾问的结果
///
/// 输出只取决于输入内容，与顾问完成的先后无关：
/// 先按角色规范顺序排列，再按优先级做稳定排序。
pub fn merge(business: &BusinessContext, results: &[AdvisorResult]) -> FinalReport {
    let mut ordered: Vec<&AdvisorResult> = results.iter().collect();
    ordered.sort_by_key(|result| result.persona);

    let mut coach_insights = BTreeMap::new();
    let mut rag_provenance = BTreeMap::new();
    let mut all_bottlenecks: Vec<Bottleneck> = Vec::new();
    let mut kpis_to_track = BTreeSet::new();
    let mut proposed_kpis = Vec::new();
    let mut summaries = Vec::new();

    for result in &ordered {
        coach_insights.insert(
            result.persona,
            CoachInsight {
                analysis: result.analysis.clone(),
                provenance: result.provenance.clone(),
            },
        );
        rag_provenance.insert(result.persona, result.provenance.clone());

        for bottleneck in result.analysis.bottlenecks() {
            if bottleneck.has_unrecognized_priority() {
                warn!(
                    persona = %result.persona,
                    bottleneck = %bottleneck.name,
                    priority = ?bottleneck.priority,
                    "⚠️ 无法识别的优先级，按medium处理"
                );
            }
            all_bottlenecks.push(bottleneck.attributed_to(result.persona));
        }

        kpis_to_track.extend(result.analysis.kpis_to_track().iter().cloned());
        proposed_kpis.extend(result.analysis.proposed_kpis().iter().cloned());

        if let Some(summary) = result.analysis.summary().filter(|s| !s.is_empty()) {
            summaries.push(summary.to_string());
        }
    }

    // sort_by是稳定排序，同优先级保持角色顺序与顾问内部顺序
    all_bottlenecks.sort_by(|a, b| b.priority_rank().cmp(&a.priority_rank()));

    let action_plan: Vec<ActionItem> = all_bottlenecks
        .iter()
        .flat_map(|bottleneck| {
            let from = bottleneck.source;
            bottleneck
                .tactical_fix
                .iter()
                .filter_map(move |fix| from.map(|from| ActionItem { fix: fix.clone(), from }))
        })
        .take(ACTION_PLAN_LIMIT)
        .collect();

    debug!(
        bottlenecks = all_bottlenecks.len(),
        actions = action_plan.len(),
        kpis = kpis_to_track.len(),
        "合并完成"
    );

    FinalReport {
        business_snapshot: business.clone(),
        coach_insights,
        consensus_bottlenecks: all_bottlenecks,
        action_plan,
        kpis_to_track,
        proposed_kpis,
        final_summary: summaries.join(SUMMARY_SEPARATOR),
        rag_provenance,
        kpi_targets: suggest_kpi_targets(business),
    }
}

/// 根据已知KPI基线给出参考目标值，保留两位小数
pub fn suggest_kpi_targets(business: &BusinessContext) -> BTreeMap<String, f64> {
    const RULES: [(&str, &str, f64); 5] = [
        ("revenue", "revenue_target_6_months", 1.3),
        ("revenue", "revenue_target_12_months", 1.5),
        ("conversion_rate", "conversion_rate_target", 1.25),
        ("customer_acquisition_cost", "cac_target", 0.85),
        ("production_cost_per_unit", "production_cost_per_unit_target", 0.9),
    ];

    RULES
        .iter()
        .filter_map(|(kpi, target, factor)| {
            let baseline = business.kpis.get(*kpi).copied().flatten()?;
            Some((target.to_string(), round2(baseline * factor)))
        })
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
