//! 结构化输出 - 从模型文本中提取JSON对象，并在缺少必需字段时做一次修复

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{info, warn};

use crate::llm::{ChatMessage, GenerationEngine};
use crate::types::analysis::{RAW_TEXT_KEY, REQUIRED_ANALYSIS_KEYS, UNKNOWN_VALUE};

/// 修复时缺少系统消息所用的默认系统提示词
pub const REPAIR_FALLBACK_SYSTEM: &str = "You are a strict JSON assistant.";

static FENCE_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```(?:json)?\s*").unwrap());
static FENCE_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*```$").unwrap());

/// 从模型文本中解析出JSON对象
///
/// 依次尝试首个`{`到最后一个`}`之间的片段与整段文本；
/// 都失败或结果不是对象时返回`{"raw_text": 原文}`。
pub fn parse_structured(text: &str) -> Map<String, Value> {
    let stripped = FENCE_OPEN.replace_all(text.trim(), "");
    let stripped = FENCE_CLOSE.replace_all(&stripped, "");
    let candidate_text = stripped.trim_matches(|c| c == '`' || c == ' ' || c == '\n');

    let braced = match (candidate_text.find('{'), candidate_text.rfind('}')) {
        (Some(start), Some(end)) if end > start => Some(&candidate_text[start..=end]),
        _ => None,
    };

    let parsed = braced
        .and_then(|slice| serde_json::from_str::<Value>(slice).ok())
        .or_else(|| serde_json::from_str::<Value>(candidate_text).ok());

    match parsed {
        Some(Value::Object(fields)) => fields,
        _ => raw_text_mapping(text),
    }
}

fn raw_text_mapping(text: &str) -> Map<String, Value> {
    Map::from_iter([(RAW_TEXT_KEY.to_string(), Value::String(text.to_string()))])
}

/// 缺失的必需键，保持约定顺序
pub fn missing_required_keys(parsed: &Map<String, Value>) -> Vec<&'static str> {
    REQUIRED_ANALYSIS_KEYS
        .iter()
        .filter(|key| !parsed.contains_key(**key))
        .copied()
        .collect()
}

/// 附加在用户消息末尾的修复指令
pub fn repair_instruction(missing: &[&str]) -> String {
    format!(
        "\n\nIMPORTANT: Your previous response was missing keys: {}. \
         Return ONLY a valid JSON object that includes these keys. \
         Do not include any text outside the JSON. \
         If you can't determine a value, use \"{}\".",
        missing.join(", "),
        UNKNOWN_VALUE
    )
}

/// 必需字段不全时重新提交一次，修复结果中的键覆盖原值
///
/// 不论修复结果是否完整都只提交一次；提交失败或超时返回原映射。
pub async fn repair(
    parsed: Map<String, Value>,
    engine: &dyn GenerationEngine,
    messages: &[ChatMessage],
    timeout: Duration,
) -> Map<String, Value> {
    let missing = missing_required_keys(&parsed);
    if missing.is_empty() {
        return parsed;
    }
    info!(missing = ?missing, "🔧 输出缺少必需字段，尝试修复");

    let system = messages
        .first()
        .cloned()
        .unwrap_or_else(|| ChatMessage::system(REPAIR_FALLBACK_SYSTEM));
    let last_content = messages.last().map(|m| m.content.as_str()).unwrap_or_default();
    let repair_messages = vec![
        system,
        ChatMessage::user(format!("{}{}", last_content, repair_instruction(&missing))),
    ];

    let response = match tokio::time::timeout(timeout, engine.submit(&repair_messages)).await {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            warn!(error = %e, "⚠️ 修复请求失败，保留原输出");
            return parsed;
        }
        Err(_) => {
            warn!(seconds = timeout.as_secs(), "⚠️ 修复请求超时，保留原输出");
            return parsed;
        }
    };

    let mut merged = parsed;
    merged.extend(parse_structured(&response));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// 记录每次提交的消息并返回固定回复
    struct RecordingEngine {
        reply: Result<String, String>,
        calls: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl RecordingEngine {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl GenerationEngine for RecordingEngine {
        async fn submit(&self, messages: &[ChatMessage]) -> Result<String> {
            self.calls.lock().unwrap().push(messages.to_vec());
            self.reply.clone().map_err(|e| anyhow!(e))
        }
    }

    fn mapping(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn original_messages() -> Vec<ChatMessage> {
        vec![
            ChatMessage::system("persona"),
            ChatMessage::user("describe the business"),
        ]
    }

    #[test]
    fn test_parse_fenced_json() {
        let parsed = parse_structured("```json\n{\"summary\": \"ok\"}\n```");
        assert_eq!(parsed, mapping(json!({"summary": "ok"})));
    }

    #[test]
    fn test_parse_plain_json() {
        let parsed = parse_structured("  {\"a\": 1, \"b\": [1, 2]}  ");
        assert_eq!(parsed, mapping(json!({"a": 1, "b": [1, 2]})));
    }

    #[test]
    fn test_parse_json_wrapped_in_prose() {
        let parsed = parse_structured("Here is my analysis: {\"summary\": \"scale ops\"} Hope it helps.");
        assert_eq!(parsed, mapping(json!({"summary": "scale ops"})));
    }

    #[test]
    fn test_parse_is_idempotent_across_wrappings() {
        let object = r#"{"bottlenecks": [{"name": "ops", "priority": "high"}], "summary": "s"}"#;
        let inputs = [
            format!("```json\n{}\n```", object),
            object.to_string(),
            format!("Sure, here you go: {} Let me know.", object),
        ];

        let expected: Map<String, Value> = serde_json::from_str(object).unwrap();
        for input in &inputs {
            let first = parse_structured(input);
            assert_eq!(first, expected, "input: {}", input);

            let reparsed = parse_structured(&Value::Object(first.clone()).to_string());
            assert_eq!(reparsed, first, "input: {}", input);
        }
    }

    #[test]
    fn test_parse_unbalanced_text_keeps_raw() {
        let parsed = parse_structured("hello {not json");
        assert_eq!(parsed, mapping(json!({"raw_text": "hello {not json"})));
    }

    #[test]
    fn test_parse_empty_text() {
        assert_eq!(parse_structured(""), mapping(json!({"raw_text": ""})));
    }

    #[test]
    fn test_parse_non_object_json_keeps_raw() {
        let parsed = parse_structured("[1, 2, 3]");
        assert_eq!(parsed, mapping(json!({"raw_text": "[1, 2, 3]"})));
    }

    #[test]
    fn test_missing_required_keys_order() {
        let parsed = mapping(json!({"summary": "s", "bottlenecks": []}));
        assert_eq!(missing_required_keys(&parsed), vec!["top_recommendation", "kpis_to_track"]);
    }

    #[tokio::test]
    async fn test_repair_skipped_when_complete() {
        let engine = RecordingEngine::replying("{}");
        let parsed = mapping(json!({
            "bottlenecks": [],
            "top_recommendation": "raise prices",
            "kpis_to_track": ["revenue"],
            "summary": "fine"
        }));

        let result = repair(parsed.clone(), &engine, &original_messages(), Duration::from_secs(5)).await;
        assert_eq!(result, parsed);
        assert_eq!(engine.call_count(), 0);
    }

    #[tokio::test]
    async fn test_repair_merges_and_submits_once() {
        let engine = RecordingEngine::replying(
            "{\"top_recommendation\": \"hire an ops lead\", \"kpis_to_track\": [\"churn\"]}",
        );
        let parsed = mapping(json!({"bottlenecks": [], "summary": "partial"}));

        let result = repair(parsed, &engine, &original_messages(), Duration::from_secs(5)).await;

        // 修复结果仍缺少字段也不会再次提交
        assert_eq!(engine.call_count(), 1);
        assert_eq!(result["top_recommendation"], json!("hire an ops lead"));
        assert_eq!(result["kpis_to_track"], json!(["churn"]));
        assert_eq!(result["summary"], json!("partial"));

        let calls = engine.calls.lock().unwrap();
        let sent = &calls[0];
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], ChatMessage::system("persona"));
        assert_eq!(sent[1].role, Role::User);
        assert!(sent[1].content.starts_with("describe the business\n\nIMPORTANT:"));
        assert!(sent[1].content.contains("missing keys: top_recommendation, kpis_to_track."));
        assert!(sent[1].content.contains("use \"I_DONT_KNOW\""));
    }

    #[tokio::test]
    async fn test_repair_response_wins_on_conflict() {
        let engine = RecordingEngine::replying("{\"summary\": \"repaired\", \"bottlenecks\": []}");
        let parsed = mapping(json!({"summary": "first"}));

        let result = repair(parsed, &engine, &original_messages(), Duration::from_secs(5)).await;
        assert_eq!(result["summary"], json!("repaired"));
        assert_eq!(engine.call_count(), 1);
    }

    #[tokio::test]
    async fn test_repair_engine_error_returns_original() {
        let engine = RecordingEngine::failing("rate limited");
        let parsed = mapping(json!({"raw_text": "not json"}));

        let result = repair(parsed.clone(), &engine, &original_messages(), Duration::from_secs(5)).await;
        assert_eq!(result, parsed);
        assert_eq!(engine.call_count(), 1);
    }

    #[tokio::test]
    async fn test_repair_without_messages_uses_fallback_system() {
        let engine = RecordingEngine::replying("{}");
        let _ = repair(Map::new(), &engine, &[], Duration::from_secs(5)).await;

        let calls = engine.calls.lock().unwrap();
        assert_eq!(calls[0][0], ChatMessage::system(REPAIR_FALLBACK_SYSTEM));
        assert!(calls[0][1].content.starts_with("\n\nIMPORTANT:"));
    }
}
