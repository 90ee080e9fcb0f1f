//! 报告结构校验 - 只检查形状，不判断内容质量

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;

use crate::types::report::FinalReport;

/// 最终报告必须包含的顶层键
pub const REQUIRED_TOP_KEYS: [&str; 6] = [
    "business_snapshot",
    "coach_insights",
    "consensus_bottlenecks",
    "action_plan",
    "kpis_to_track",
    "final_summary",
];

/// 校验报告结构，返回全部问题；空列表表示通过
pub fn validate_final_report(report: &Value) -> Vec<String> {
    let Some(fields) = report.as_object() else {
        return vec!["final_report must be a dict".to_string()];
    };

    let mut errors: Vec<String> = REQUIRED_TOP_KEYS
        .iter()
        .filter(|key| !fields.contains_key(**key))
        .map(|key| format!("missing top-level key: {}", key))
        .collect();

    match fields.get("business_snapshot") {
        Some(Value::Object(snapshot)) => {
            for key in ["description", "goal"] {
                if !snapshot.contains_key(key) {
                    errors.push(format!("business_snapshot missing {}", key));
                }
            }
        }
        Some(_) => errors.push("business_snapshot must be an object".to_string()),
        None => {}
    }

    if fields.get("coach_insights").is_some_and(|v| !v.is_object()) {
        errors.push("coach_insights must be an object".to_string());
    }
    for key in ["consensus_bottlenecks", "action_plan", "kpis_to_track"] {
        if fields.get(key).is_some_and(|v| !v.is_array()) {
            errors.push(format!("{} must be a list", key));
        }
    }
    if fields.get("final_summary").is_some_and(|v| !v.is_string()) {
        errors.push("final_summary must be a string".to_string());
    }

    // 可选字段出现时同样检查类型
    if fields.get("proposed_kpis").is_some_and(|v| !v.is_array()) {
        errors.push("proposed_kpis must be a list".to_string());
    }
    if fields.get("rag_provenance").is_some_and(|v| !v.is_object()) {
        errors.push("rag_provenance must be an object".to_string());
    }

    errors
}

/// 读取并校验一个报告文件；文件不可读或不是JSON时返回错误
pub async fn validate_report_file(path: &Path) -> Result<Vec<String>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read report: {}", path.display()))?;
    let report: Value = serde_json::from_str(&content)
        .with_context(|| format!("Report is not valid JSON: {}", path.display()))?;
    Ok(validate_final_report(&report))
}

impl FinalReport {
    /// 以序列化后的形状做结构校验
    pub fn validate(&self) -> Vec<String> {
        match serde_json::to_value(self) {
            Ok(value) => validate_final_report(&value),
            Err(e) => vec![format!("final_report could not be serialized: {}", e)],
        }
    }
}
