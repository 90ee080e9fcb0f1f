use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::retrieval::EvidenceStore;
use crate::types::evidence::EvidenceItem;

/// 去重后的分片文件，存在时优先使用
const DEDUP_CHUNKS_FILE: &str = "chunks_dedup.jsonl";
const CHUNKS_FILE: &str = "chunks.jsonl";

/// 参与打分的最短词长
const MIN_TERM_LEN: usize = 3;

/// 基于离线分片文件的证据库
///
/// 目录结构为`<root>/<collection>/chunks.jsonl`，每行一个JSON对象，
/// 正文在`text`字段，其余字段作为元数据。相关度按TF-IDF词项匹配计算。
#[derive(Debug, Clone)]
pub struct ChunkFileStore {
    root: PathBuf,
}

impl ChunkFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 集合对应的分片文件
    fn chunks_path(&self, collection: &str) -> Option<PathBuf> {
        let dir = self.root.join(collection);
        [DEDUP_CHUNKS_FILE, CHUNKS_FILE]
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
    }

    async fn load_chunks(path: &Path) -> Result<Vec<EvidenceItem>> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read chunk file: {}", path.display()))?;

        let mut chunks = Vec::new();
        let mut skipped = 0usize;
        for line in content.lines().filter(|line| !line.trim().is_empty()) {
            match serde_json::from_str::<Value>(line) {
                Ok(Value::Object(mut fields)) => {
                    let text = match fields.remove("text") {
                        Some(Value::String(text)) => text,
                        _ => {
                            skipped += 1;
                            continue;
                        }
                    };
                    chunks.push(EvidenceItem::from_document(text, fields));
                }
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            warn!(path = %path.display(), skipped, "⚠️ 跳过无法解析的分片");
        }
        Ok(chunks)
    }
}

#[async_trait]
impl EvidenceStore for ChunkFileStore {
    async fn query(&self, collection: &str, query: &str, k: usize) -> Result<Vec<EvidenceItem>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let Some(path) = self.chunks_path(collection) else {
            debug!(collection, "证据集合不存在");
            return Ok(Vec::new());
        };

        let chunks = Self::load_chunks(&path).await?;
        let ranked = rank_chunks(&chunks, query);
        Ok(ranked
            .into_iter()
            .take(k)
            .map(|index| chunks[index].clone())
            .collect())
    }
}

/// 按相关度降序返回全部分片的下标，同分时保持文件顺序
///
/// 没有命中任何查询词的分片排在最后，集合非空时总能取满`k`条。
fn rank_chunks(chunks: &[EvidenceItem], query: &str) -> Vec<usize> {
    let query_terms: HashSet<String> = tokenize(query).collect();
    if query_terms.is_empty() {
        return (0..chunks.len()).collect();
    }

    let term_counts: Vec<HashMap<String, usize>> = chunks
        .iter()
        .map(|chunk| {
            let mut counts = HashMap::new();
            for term in tokenize(&chunk.text) {
                *counts.entry(term).or_insert(0) += 1;
            }
            counts
        })
        .collect();

    let total = chunks.len() as f64;
    let idf: HashMap<&str, f64> = query_terms
        .iter()
        .map(|term| {
            let df = term_counts.iter().filter(|c| c.contains_key(term)).count() as f64;
            (term.as_str(), (1.0 + total / (1.0 + df)).ln())
        })
        .collect();

    let mut scored: Vec<(usize, f64)> = term_counts
        .iter()
        .enumerate()
        .map(|(index, counts)| {
            let score: f64 = query_terms
                .iter()
                .filter_map(|term| {
                    counts
                        .get(term)
                        .map(|tf| (1.0 + (*tf as f64).ln()) * idf[term.as_str()])
                })
                .sum();
            (index, score)
        })
        .collect();

    // sort_by是稳定排序
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().map(|(index, _)| index).collect()
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() >= MIN_TERM_LEN)
        .map(|word| word.to_lowercase())
}
