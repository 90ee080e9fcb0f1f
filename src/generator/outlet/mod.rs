//! 运行结果落盘 - 单次报告文件 + 追加写入的运行日志

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::types::report::FinalReport;

/// 追加写入的运行日志文件名
pub const RUN_LOG_FILE: &str = "runs.jsonl";

/// 最新报告的导出文件名
pub const LATEST_REPORT_FILE: &str = "latest_final_report.json";

/// 一次完成的运行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub final_report: FinalReport,
}

impl RunRecord {
    pub fn new(run_id: impl Into<String>, final_report: FinalReport) -> Self {
        Self {
            run_id: run_id.into(),
            timestamp: Utc::now(),
            final_report,
        }
    }
}

/// 落盘结果
#[derive(Debug, Clone, PartialEq)]
pub struct SavedRun {
    pub report_path: PathBuf,
    /// 运行日志是否追加成功
    pub logged: bool,
}

pub trait Outlet {
    async fn save(&self, record: &RunRecord) -> Result<SavedRun>;
}

/// 写入元数据目录的落盘实现
pub struct DiskOutlet {
    metadata_dir: PathBuf,
}

impl DiskOutlet {
    pub fn new(metadata_dir: impl Into<PathBuf>) -> Self {
        Self {
            metadata_dir: metadata_dir.into(),
        }
    }

    pub fn report_path(&self, run_id: &str) -> PathBuf {
        self.metadata_dir.join(format!("final_report_{}.json", run_id))
    }

    pub fn run_log_path(&self) -> PathBuf {
        self.metadata_dir.join(RUN_LOG_FILE)
    }

    async fn append_run_log(&self, record: &RunRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let path = self.run_log_path();
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open run log: {}", path.display()))?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

impl Outlet for DiskOutlet {
    async fn save(&self, record: &RunRecord) -> Result<SavedRun> {
        tokio::fs::create_dir_all(&self.metadata_dir)
            .await
            .with_context(|| {
                format!("Failed to create metadata dir: {}", self.metadata_dir.display())
            })?;

        let report_path = self.report_path(&record.run_id);
        let pretty = serde_json::to_string_pretty(&record.final_report)?;
        tokio::fs::write(&report_path, pretty)
            .await
            .with_context(|| format!("Failed to write report: {}", report_path.display()))?;
        info!(path = %report_path.display(), "💾 已保存最终报告");

        // 日志写入失败不影响本次运行
        let logged = match self.append_run_log(record).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "⚠️ 运行日志追加失败");
                false
            }
        };

        Ok(SavedRun {
            report_path,
            logged,
        })
    }
}

/// 导出的最新报告
#[derive(Debug, Clone, PartialEq)]
pub struct LatestReport {
    pub run_id: String,
    pub path: PathBuf,
}

/// 取运行日志中最后一条有效记录，导出其报告
///
/// 早期日志的运行标识字段名为`thread_id`，同样识别。
pub async fn extract_latest(metadata_dir: &Path) -> Result<LatestReport> {
    let log_path = metadata_dir.join(RUN_LOG_FILE);
    if !log_path.exists() {
        return Err(anyhow!("No run log found at {}", log_path.display()));
    }
    let content = tokio::fs::read_to_string(&log_path)
        .await
        .with_context(|| format!("Failed to read run log: {}", log_path.display()))?;

    let last_line = content
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| anyhow!("No valid runs found in {}", log_path.display()))?;
    let mut entry: Value =
        serde_json::from_str(last_line).context("Latest run log entry is not valid JSON")?;

    let final_report = entry
        .get_mut("final_report")
        .map(Value::take)
        .ok_or_else(|| anyhow!("Latest run log entry has no final_report"))?;
    let run_id = ["run_id", "thread_id"]
        .iter()
        .find_map(|key| entry.get(*key).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string();

    let path = metadata_dir.join(LATEST_REPORT_FILE);
    tokio::fs::write(&path, serde_json::to_string_pretty(&final_report)?)
        .await
        .with_context(|| format!("Failed to write latest report: {}", path.display()))?;
    info!(path = %path.display(), run_id = %run_id, "💾 已导出最新报告");

    Ok(LatestReport { run_id, path })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::merge::merge;
    use crate::types::business::BusinessContext;
    use tempfile::TempDir;

    fn record(run_id: &str, description: &str) -> RunRecord {
        let report = merge(&BusinessContext::new(description, "grow"), &[]);
        RunRecord::new(run_id, report)
    }

    #[tokio::test]
    async fn test_save_writes_report_and_appends_log() {
        let temp_dir = TempDir::new().unwrap();
        let metadata_dir = temp_dir.path().join("metadata");
        let outlet = DiskOutlet::new(&metadata_dir);

        let first = outlet.save(&record("biz-00000001", "first")).await.unwrap();
        let second = outlet.save(&record("biz-00000002", "second")).await.unwrap();

        assert!(first.logged && second.logged);
        assert_eq!(first.report_path, metadata_dir.join("final_report_biz-00000001.json"));

        let saved: FinalReport =
            serde_json::from_str(&std::fs::read_to_string(&second.report_path).unwrap()).unwrap();
        assert_eq!(saved.business_snapshot.description, "second");

        let log = std::fs::read_to_string(metadata_dir.join(RUN_LOG_FILE)).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: RunRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.run_id, "biz-00000001");
    }

    #[tokio::test]
    async fn test_extract_latest_takes_last_entry() {
        let temp_dir = TempDir::new().unwrap();
        let outlet = DiskOutlet::new(temp_dir.path());
        outlet.save(&record("biz-aaaaaaaa", "older")).await.unwrap();
        outlet.save(&record("biz-bbbbbbbb", "newer")).await.unwrap();

        let latest = extract_latest(temp_dir.path()).await.unwrap();
        assert_eq!(latest.run_id, "biz-bbbbbbbb");
        assert_eq!(latest.path, temp_dir.path().join(LATEST_REPORT_FILE));

        let exported: Value =
            serde_json::from_str(&std::fs::read_to_string(&latest.path).unwrap()).unwrap();
        assert_eq!(exported["business_snapshot"]["description"], "newer");
    }

    #[tokio::test]
    async fn test_extract_latest_accepts_legacy_entries() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(RUN_LOG_FILE),
            "{\"thread_id\": \"biz-legacy01\", \"final_report\": {\"final_summary\": \"x\"}, \"timestamp\": 1.5}\n\n",
        )
        .unwrap();

        let latest = extract_latest(temp_dir.path()).await.unwrap();
        assert_eq!(latest.run_id, "biz-legacy01");
    }

    #[tokio::test]
    async fn test_extract_latest_without_log_fails() {
        let temp_dir = TempDir::new().unwrap();
        assert!(extract_latest(temp_dir.path()).await.is_err());

        std::fs::write(temp_dir.path().join(RUN_LOG_FILE), "\n  \n").unwrap();
        assert!(extract_latest(temp_dir.path()).await.is_err());
    }
}
