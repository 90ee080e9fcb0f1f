use anyhow::Result;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::Config;
use crate::generator::context::AdvisoryContext;
use crate::generator::evaluation::{
    EvaluationHarness, EvaluationSummary, default_scenarios, short_id,
};
use crate::generator::orchestrator::AdvisoryGraph;
use crate::generator::outlet::{DiskOutlet, LatestReport, Outlet, RunRecord, SavedRun};
use crate::types::business::BusinessContext;
use crate::types::report::FinalReport;

/// 阶段计时
pub struct TimingScope {
    start_time: Instant,
    phase_start_times: BTreeMap<&'static str, Instant>,
    phase_durations: BTreeMap<&'static str, Duration>,
}

impl Default for TimingScope {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingScope {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            phase_start_times: BTreeMap::new(),
            phase_durations: BTreeMap::new(),
        }
    }

    pub fn start_phase(&mut self, phase: &'static str) {
        self.phase_start_times.insert(phase, Instant::now());
    }

    pub fn end_phase(&mut self, phase: &'static str) -> Option<Duration> {
        let duration = self.phase_start_times.remove(phase)?.elapsed();
        self.phase_durations.insert(phase, duration);
        Some(duration)
    }

    pub fn total_duration(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn phase_durations(&self) -> &BTreeMap<&'static str, Duration> {
        &self.phase_durations
    }
}

/// 计时阶段名称
pub struct TimingKeys;

impl TimingKeys {
    pub const ADVISORS: &'static str = "advisors";
    pub const VALIDATION: &'static str = "validation";
    pub const OUTPUT: &'static str = "output";
}

/// 一次完成的运行
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: String,
    pub report: FinalReport,
    /// 报告结构校验发现的问题，不阻止落盘
    pub validation_errors: Vec<String>,
    pub saved: SavedRun,
}

/// 运行标识，形如`biz-1a2b3c4d`
pub fn new_run_id() -> String {
    format!("biz-{}", short_id())
}

/// 按配置启动一次顾问分析
pub async fn launch(config: &Config, business: &BusinessContext) -> Result<RunOutcome> {
    let (context, llm_client) = AdvisoryContext::from_config(config.clone())?;

    if config.check_connection {
        llm_client.check_connection().await?;
    }

    let outlet = DiskOutlet::new(&config.output.metadata_dir);
    launch_with(&context, &AdvisoryGraph::default(), &outlet, business).await
}

/// 使用给定依赖执行一次运行：编排 -> 校验 -> 落盘
pub async fn launch_with(
    context: &AdvisoryContext,
    graph: &AdvisoryGraph,
    outlet: &impl Outlet,
    business: &BusinessContext,
) -> Result<RunOutcome> {
    let run_id = new_run_id();
    let mut timing = TimingScope::new();
    info!(run_id = %run_id, "🚀 开始顾问分析运行");

    timing.start_phase(TimingKeys::ADVISORS);
    let report = graph.invoke(context, business).await?;
    timing.end_phase(TimingKeys::ADVISORS);

    timing.start_phase(TimingKeys::VALIDATION);
    let validation_errors = report.validate();
    for error in &validation_errors {
        warn!(run_id = %run_id, error = %error, "⚠️ 报告结构校验未通过");
    }
    timing.end_phase(TimingKeys::VALIDATION);

    timing.start_phase(TimingKeys::OUTPUT);
    let record = RunRecord::new(run_id.clone(), report);
    let saved = outlet.save(&record).await?;
    timing.end_phase(TimingKeys::OUTPUT);

    for (phase, duration) in timing.phase_durations() {
        info!(phase = *phase, seconds = duration.as_secs_f64(), "⏱️ 阶段耗时");
    }
    info!(
        run_id = %run_id,
        seconds = timing.total_duration().as_secs_f64(),
        "✅ 运行完成"
    );

    Ok(RunOutcome {
        run_id,
        report: record.final_report,
        validation_errors,
        saved,
    })
}

/// 运行内置评估场景
pub async fn evaluate(config: &Config) -> Result<EvaluationSummary> {
    let (context, llm_client) = AdvisoryContext::from_config(config.clone())?;
    if config.check_connection {
        llm_client.check_connection().await?;
    }

    let harness = EvaluationHarness::new(AdvisoryGraph::default(), &config.output.metadata_dir);
    let (summary, _) = harness.run(&context, &default_scenarios()).await?;
    Ok(summary)
}

/// 导出最近一次运行的报告
pub async fn extract_latest(config: &Config) -> Result<LatestReport> {
    crate::generator::outlet::extract_latest(&config.output.metadata_dir).await
}
