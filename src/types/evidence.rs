use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `source`缺失时依次尝试的元数据键
const SOURCE_KEYS: [&str; 2] = ["source", "source_file"];
/// `chunk_id`缺失时依次尝试的元数据键
const CHUNK_ID_KEYS: [&str; 2] = ["chunk_id", "chunk"];

const UNKNOWN_SOURCE: &str = "unknown";

/// 一条检索到的证据片段
///
/// 在检索边界处统一归一化，下游不再关心原始元数据的具体形状。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub text: String,
    pub source: String,
    pub chunk_id: String,
    /// 原始元数据
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl EvidenceItem {
    /// 从正文与任意形状的元数据构建证据
    pub fn from_document(text: impl Into<String>, metadata: Map<String, Value>) -> Self {
        let source = first_label(&metadata, &SOURCE_KEYS).unwrap_or_else(|| UNKNOWN_SOURCE.to_string());
        let chunk_id = first_label(&metadata, &CHUNK_ID_KEYS).unwrap_or_default();
        Self {
            text: text.into(),
            source,
            chunk_id,
            metadata,
        }
    }
}

fn first_label(metadata: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| metadata.get(*key))
        .find_map(|value| match value {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
}

/// 证据溯源条目，`evidence_rank`从1开始，按检索返回顺序分配
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceEntry {
    pub evidence_rank: usize,
    pub source: String,
    pub chunk_id: String,
}

impl ProvenanceEntry {
    pub fn from_ranked(rank: usize, item: &EvidenceItem) -> Self {
        Self {
            evidence_rank: rank,
            source: item.source.clone(),
            chunk_id: item.chunk_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_primary_metadata_keys() {
        let item = EvidenceItem::from_document(
            "text",
            meta(json!({"source": "offers.txt", "chunk_id": 4})),
        );
        assert_eq!(item.source, "offers.txt");
        assert_eq!(item.chunk_id, "4");
    }

    #[test]
    fn test_fallback_metadata_keys() {
        let item = EvidenceItem::from_document(
            "text",
            meta(json!({"source_file": "scale.txt", "chunk": "c-7"})),
        );
        assert_eq!(item.source, "scale.txt");
        assert_eq!(item.chunk_id, "c-7");
    }

    #[test]
    fn test_missing_metadata_defaults() {
        let item = EvidenceItem::from_document("text", Map::new());
        assert_eq!(item.source, "unknown");
        assert_eq!(item.chunk_id, "");
    }

    #[test]
    fn test_null_primary_key_falls_through() {
        let item = EvidenceItem::from_document(
            "text",
            meta(json!({"source": null, "source_file": "b.txt"})),
        );
        assert_eq!(item.source, "b.txt");
    }
}
