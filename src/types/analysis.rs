use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::types::persona::Persona;

/// 顾问输出必须包含的键
pub const REQUIRED_ANALYSIS_KEYS: [&str; 4] =
    ["bottlenecks", "top_recommendation", "kpis_to_track", "summary"];

/// 无法解析时保存原始文本所用的键
pub const RAW_TEXT_KEY: &str = "raw_text";

/// 模型无法给出取值时约定使用的占位符
pub const UNKNOWN_VALUE: &str = "I_DONT_KNOW";

/// 瓶颈优先级，声明顺序即排序权重 high > medium > low
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// 只识别精确的小写取值，其余一律视为无法识别
    pub fn parse(raw: &str) -> Option<Priority> {
        match raw {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

/// 一个被诊断出的业务瓶颈
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Bottleneck {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub diagnosis: String,

    /// 战术修复步骤，保持模型给出的顺序
    #[serde(default)]
    pub tactical_fix: Vec<String>,

    /// 模型给出的原始优先级文本
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,

    /// 来源角色，仅在合并阶段标记
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Persona>,

    /// 模型附带的其他字段
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Bottleneck {
    /// 排序用的优先级，缺失或无法识别时按medium处理
    pub fn priority_rank(&self) -> Priority {
        self.priority
            .as_deref()
            .and_then(Priority::parse)
            .unwrap_or(Priority::Medium)
    }

    /// 给出了优先级但取值无法识别
    pub fn has_unrecognized_priority(&self) -> bool {
        matches!(self.priority.as_deref(), Some(raw) if Priority::parse(raw).is_none())
    }

    /// 构造一个标记了来源角色的新瓶颈，不修改原值
    pub fn attributed_to(&self, persona: Persona) -> Bottleneck {
        Bottleneck {
            source: Some(persona),
            ..self.clone()
        }
    }

    fn from_value(value: &Value) -> Option<Bottleneck> {
        match value {
            Value::Object(fields) => {
                let mut extra = fields.clone();
                let name = extra.remove("name").and_then(text_of).unwrap_or_default();
                let diagnosis = extra.remove("diagnosis").and_then(text_of).unwrap_or_default();
                let tactical_fix = extra
                    .remove("tactical_fix")
                    .map(texts_of)
                    .unwrap_or_default();
                let priority = extra.remove("priority").and_then(text_of);
                // 来源只能由合并阶段写入
                extra.remove("source");
                Some(Bottleneck {
                    name,
                    diagnosis,
                    tactical_fix,
                    priority,
                    source: None,
                    extra,
                })
            }
            Value::String(name) if name != UNKNOWN_VALUE => Some(Bottleneck {
                name: name.clone(),
                ..Default::default()
            }),
            _ => None,
        }
    }
}

/// 顾问在缺少KPI时提出的建议指标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProposedKpi {
    #[serde(default)]
    pub kpi: String,

    #[serde(default)]
    pub why: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProposedKpi {
    fn from_value(value: &Value) -> Option<ProposedKpi> {
        match value {
            Value::Object(fields) => {
                let mut extra = fields.clone();
                let kpi = extra.remove("kpi").and_then(text_of).unwrap_or_default();
                let why = extra.remove("why").and_then(text_of).unwrap_or_default();
                Some(ProposedKpi { kpi, why, extra })
            }
            Value::String(kpi) if kpi != UNKNOWN_VALUE => Some(ProposedKpi {
                kpi: kpi.clone(),
                ..Default::default()
            }),
            _ => None,
        }
    }
}

/// 解析成功的顾问分析
///
/// 即使经过修复，必需字段也可能缺失，因此全部建模为可选。
/// 缺失的必需字段序列化为`null`，重新加载时仍能识别为结构化结果。
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct AnalysisRecord {
    pub bottlenecks: Option<Vec<Bottleneck>>,

    pub top_recommendation: Option<String>,

    pub kpis_to_track: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposed_kpis: Option<Vec<ProposedKpi>>,

    pub summary: Option<String>,

    /// 模型输出中的其他键
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AnalysisRecord {
    fn from_mapping(mut fields: Map<String, Value>) -> Self {
        let bottlenecks = fields
            .remove("bottlenecks")
            .and_then(|v| list_of(v, Bottleneck::from_value));
        let top_recommendation = fields.remove("top_recommendation").and_then(text_of);
        let kpis_to_track = fields.remove("kpis_to_track").and_then(|v| match v {
            Value::Null => None,
            other => Some(texts_of(other)),
        });
        let proposed_kpis = fields
            .remove("proposed_kpis")
            .and_then(|v| list_of(v, ProposedKpi::from_value));
        let summary = fields.remove("summary").and_then(text_of);

        Self {
            bottlenecks,
            top_recommendation,
            kpis_to_track,
            proposed_kpis,
            summary,
            extra: fields,
        }
    }

    /// 缺失的必需键
    pub fn missing_keys(&self) -> Vec<&'static str> {
        let present = [
            self.bottlenecks.is_some(),
            self.top_recommendation.is_some(),
            self.kpis_to_track.is_some(),
            self.summary.is_some(),
        ];
        REQUIRED_ANALYSIS_KEYS
            .iter()
            .zip(present)
            .filter_map(|(key, present)| (!present).then_some(*key))
            .collect()
    }
}

/// 降级的顾问分析：模型输出无法解析，或该顾问整体执行失败
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DegradedAnalysis {
    #[serde(default)]
    pub raw_text: String,

    /// 执行失败时的错误描述
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 单个顾问的分析结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AdvisorAnalysis {
    WellFormed(AnalysisRecord),
    Degraded(DegradedAnalysis),
}

impl AdvisorAnalysis {
    /// 从解析/修复后的映射构建分析结果
    ///
    /// 只要出现任一约定字段即视为结构化结果，否则保留为原始文本。
    pub fn from_mapping(fields: Map<String, Value>) -> Self {
        if has_schema_keys(&fields) {
            return AdvisorAnalysis::WellFormed(AnalysisRecord::from_mapping(fields));
        }

        let raw_text = match fields.get(RAW_TEXT_KEY) {
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
            None if fields.is_empty() => String::new(),
            None => Value::Object(fields).to_string(),
        };
        AdvisorAnalysis::Degraded(DegradedAnalysis {
            raw_text,
            error: None,
        })
    }

    /// 顾问执行失败时的占位结果
    pub fn failed(error: impl std::fmt::Display) -> Self {
        AdvisorAnalysis::Degraded(DegradedAnalysis {
            raw_text: String::new(),
            error: Some(error.to_string()),
        })
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, AdvisorAnalysis::Degraded(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, AdvisorAnalysis::Degraded(d) if d.error.is_some())
    }

    /// 执行失败时的错误描述
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            AdvisorAnalysis::Degraded(degraded) => degraded.error.as_deref(),
            AdvisorAnalysis::WellFormed(_) => None,
        }
    }

    pub fn bottlenecks(&self) -> &[Bottleneck] {
        match self {
            AdvisorAnalysis::WellFormed(record) => record.bottlenecks.as_deref().unwrap_or(&[]),
            AdvisorAnalysis::Degraded(_) => &[],
        }
    }

    pub fn kpis_to_track(&self) -> &[String] {
        match self {
            AdvisorAnalysis::WellFormed(record) => record.kpis_to_track.as_deref().unwrap_or(&[]),
            AdvisorAnalysis::Degraded(_) => &[],
        }
    }

    pub fn proposed_kpis(&self) -> &[ProposedKpi] {
        match self {
            AdvisorAnalysis::WellFormed(record) => record.proposed_kpis.as_deref().unwrap_or(&[]),
            AdvisorAnalysis::Degraded(_) => &[],
        }
    }

    /// 执行失败的占位结果以错误描述作为摘要
    pub fn summary(&self) -> Option<&str> {
        match self {
            AdvisorAnalysis::WellFormed(record) => record.summary.as_deref(),
            AdvisorAnalysis::Degraded(degraded) => degraded.error.as_deref(),
        }
    }

    pub fn missing_keys(&self) -> Vec<&'static str> {
        match self {
            AdvisorAnalysis::WellFormed(record) => record.missing_keys(),
            AdvisorAnalysis::Degraded(_) => REQUIRED_ANALYSIS_KEYS.to_vec(),
        }
    }
}

impl<'de> Deserialize<'de> for AdvisorAnalysis {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let fields = match value {
            Value::Object(fields) => fields,
            other => Map::from_iter([(RAW_TEXT_KEY.to_string(), other)]),
        };
        if fields.contains_key("error") && !has_schema_keys(&fields) {
            let degraded: DegradedAnalysis =
                serde_json::from_value(Value::Object(fields)).map_err(serde::de::Error::custom)?;
            return Ok(AdvisorAnalysis::Degraded(degraded));
        }
        Ok(AdvisorAnalysis::from_mapping(fields))
    }
}

fn has_schema_keys(fields: &Map<String, Value>) -> bool {
    REQUIRED_ANALYSIS_KEYS
        .iter()
        .chain(std::iter::once(&"proposed_kpis"))
        .any(|key| fields.contains_key(*key))
}

fn text_of(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

fn texts_of(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.into_iter().filter_map(text_of).collect(),
        Value::String(text) if text == UNKNOWN_VALUE => Vec::new(),
        Value::Null => Vec::new(),
        other => text_of(other).into_iter().collect(),
    }
}

fn list_of<T>(value: Value, convert: fn(&Value) -> Option<T>) -> Option<Vec<T>> {
    match value {
        Value::Null => None,
        Value::Array(items) => Some(items.iter().filter_map(convert).collect()),
        other => Some(convert(&other).into_iter().collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapping(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_priority_weights() {
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
    }

    #[test]
    fn test_priority_parse_is_exact() {
        assert_eq!(Priority::parse("high"), Some(Priority::High));
        assert_eq!(Priority::parse("urgent"), None);
        assert_eq!(Priority::parse("HIGH"), None);
    }

    #[test]
    fn test_unrecognized_priority_ranks_as_medium() {
        let bottleneck = Bottleneck {
            priority: Some("urgent".to_string()),
            ..Default::default()
        };
        assert_eq!(bottleneck.priority_rank(), Priority::Medium);
        assert!(bottleneck.has_unrecognized_priority());

        let missing = Bottleneck::default();
        assert_eq!(missing.priority_rank(), Priority::Medium);
        assert!(!missing.has_unrecognized_priority());
    }

    #[test]
    fn test_attributed_to_leaves_original_untouched() {
        let original = Bottleneck {
            name: "Cash flow".to_string(),
            ..Default::default()
        };
        let tagged = original.attributed_to(Persona::SamOvens);
        assert_eq!(tagged.source, Some(Persona::SamOvens));
        assert_eq!(original.source, None);
        assert_eq!(tagged.name, original.name);
    }

    #[test]
    fn test_well_formed_mapping() {
        let analysis = AdvisorAnalysis::from_mapping(mapping(json!({
            "bottlenecks": [{
                "name": "Low margins",
                "diagnosis": "Raw material costs",
                "tactical_fix": ["Renegotiate suppliers", "Raise prices"],
                "priority": "high",
                "confidence": 0.7
            }],
            "top_recommendation": "Fix pricing",
            "kpis_to_track": ["gross_margin"],
            "summary": "Margins are the issue",
            "notes": "extra"
        })));

        assert!(!analysis.is_degraded());
        assert!(analysis.missing_keys().is_empty());
        let bottleneck = &analysis.bottlenecks()[0];
        assert_eq!(bottleneck.tactical_fix.len(), 2);
        assert_eq!(bottleneck.extra.get("confidence"), Some(&json!(0.7)));
        assert_eq!(analysis.summary(), Some("Margins are the issue"));

        let AdvisorAnalysis::WellFormed(record) = analysis else {
            panic!("expected well formed analysis");
        };
        assert_eq!(record.extra.get("notes"), Some(&json!("extra")));
    }

    #[test]
    fn test_partial_mapping_reports_missing_keys() {
        let analysis = AdvisorAnalysis::from_mapping(mapping(json!({
            "summary": "only a summary",
            "raw_text": "garbled"
        })));
        assert!(!analysis.is_degraded());
        assert_eq!(
            analysis.missing_keys(),
            vec!["bottlenecks", "top_recommendation", "kpis_to_track"]
        );
        assert!(analysis.bottlenecks().is_empty());
    }

    #[test]
    fn test_raw_text_mapping_is_degraded() {
        let analysis = AdvisorAnalysis::from_mapping(mapping(json!({"raw_text": "hello {not json"})));
        assert_eq!(
            analysis,
            AdvisorAnalysis::Degraded(DegradedAnalysis {
                raw_text: "hello {not json".to_string(),
                error: None,
            })
        );
        assert!(!analysis.is_failure());
    }

    #[test]
    fn test_sentinel_list_values_are_empty() {
        let analysis = AdvisorAnalysis::from_mapping(mapping(json!({
            "bottlenecks": "I_DONT_KNOW",
            "kpis_to_track": "I_DONT_KNOW",
            "top_recommendation": "I_DONT_KNOW",
            "summary": "I_DONT_KNOW"
        })));
        assert!(analysis.bottlenecks().is_empty());
        assert!(analysis.kpis_to_track().is_empty());
        assert!(analysis.missing_keys().is_empty());
    }

    #[test]
    fn test_failed_placeholder_serialization() {
        let analysis = AdvisorAnalysis::failed("generation timed out");
        assert!(analysis.is_failure());
        let value = serde_json::to_value(&analysis).unwrap();
        assert_eq!(value, json!({"raw_text": "", "error": "generation timed out"}));

        let back: AdvisorAnalysis = serde_json::from_value(value).unwrap();
        assert_eq!(back, analysis);
    }

    #[test]
    fn test_well_formed_serialization_keeps_extra_keys() {
        let analysis = AdvisorAnalysis::from_mapping(mapping(json!({
            "summary": "s",
            "kpis_to_track": ["a"],
            "custom": 1
        })));
        let value = serde_json::to_value(&analysis).unwrap();
        assert_eq!(
            value,
            json!({
                "bottlenecks": null,
                "top_recommendation": null,
                "kpis_to_track": ["a"],
                "summary": "s",
                "custom": 1
            })
        );
    }

    #[test]
    fn test_null_fields_survive_reload() {
        let analysis = AdvisorAnalysis::from_mapping(mapping(json!({
            "summary": null,
            "bottlenecks": null
        })));
        assert!(!analysis.is_degraded());

        let json = serde_json::to_string(&analysis).unwrap();
        let back: AdvisorAnalysis = serde_json::from_str(&json).unwrap();
        assert!(!back.is_degraded());
        assert_eq!(back, analysis);
    }

    #[test]
    fn test_failed_placeholder_summary_is_error() {
        let analysis = AdvisorAnalysis::failed("sam_ovens generation failed: upstream unavailable");
        assert!(analysis.bottlenecks().is_empty());
        assert_eq!(
            analysis.summary(),
            Some("sam_ovens generation failed: upstream unavailable")
        );
        assert_eq!(
            AdvisorAnalysis::from_mapping(mapping(json!({"raw_text": "prose"}))).summary(),
            None
        );
    }
}
