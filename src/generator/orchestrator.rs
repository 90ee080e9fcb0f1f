use futures::future::join_all;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::generator::advisor::{AdvisorAgent, default_advisors};
use crate::generator::context::AdvisoryContext;
use crate::generator::error::{AdvisorError, OrchestrationError};
use crate::generator::merge::merge;
use crate::types::business::BusinessContext;
use crate::types::report::{AdvisorResult, FinalReport};

/// 顾问编排图：起点并行扇出到各顾问节点，全部完成后扇入合并节点
pub struct AdvisoryGraph {
    advisors: Vec<Arc<dyn AdvisorAgent>>,
}

impl Default for AdvisoryGraph {
    fn default() -> Self {
        Self::with_advisors(default_advisors())
    }
}

impl AdvisoryGraph {
    pub fn with_advisors(advisors: Vec<Arc<dyn AdvisorAgent>>) -> Self {
        Self { advisors }
    }

    /// 执行一次完整运行
    ///
    /// 每个顾问节点在独立任务中运行，节点内的错误与panic都转为降级结果。
    /// 合并节点只在全部节点完成后执行一次；所有顾问都失败时整体失败。
    pub async fn invoke(
        &self,
        context: &AdvisoryContext,
        business: &BusinessContext,
    ) -> Result<FinalReport, OrchestrationError> {
        if self.advisors.is_empty() {
            return Err(OrchestrationError::NoAdvisors);
        }
        info!(advisors = self.advisors.len(), "🚀 开始并行执行顾问分析...");

        let results = self.run_advisors(context, business).await;

        let failures: Vec<String> = results
            .iter()
            .filter(|result| result.is_failure())
            .map(|result| {
                format!(
                    "{}: {}",
                    result.persona,
                    result.analysis.failure_reason().unwrap_or_default()
                )
            })
            .collect();
        if failures.len() == results.len() {
            error!(failures = ?failures, "❌ 所有顾问均执行失败");
            return Err(OrchestrationError::AllAdvisorsFailed { failures });
        }
        if !failures.is_empty() {
            warn!(failed = failures.len(), "⚠️ 部分顾问执行失败，继续合并");
        }

        let report = merge(business, &results);
        info!(
            bottlenecks = report.consensus_bottlenecks.len(),
            actions = report.action_plan.len(),
            "✓ 合并节点执行完毕"
        );
        Ok(report)
    }

    /// 扇出执行全部顾问，结果按顾问注册顺序返回
    pub async fn run_advisors(
        &self,
        context: &AdvisoryContext,
        business: &BusinessContext,
    ) -> Vec<AdvisorResult> {
        let handles: Vec<_> = self
            .advisors
            .iter()
            .map(|advisor| {
                let advisor = Arc::clone(advisor);
                let context = context.clone();
                let business = business.clone();
                tokio::spawn(async move { advisor.execute(&context, &business).await })
            })
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .zip(&self.advisors)
            .map(|(joined, advisor)| match joined {
                Ok(result) => result,
                Err(join_error) => {
                    let persona = advisor.persona();
                    let failure = AdvisorError::TaskAborted {
                        persona,
                        message: join_error.to_string(),
                    };
                    warn!(error = %failure, "❌ 顾问任务异常退出");
                    AdvisorResult::failed(persona, Vec::new(), failure)
                }
            })
            .collect()
    }
}
