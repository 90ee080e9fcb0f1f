use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// KPI基线值，`None`表示用户只给出了名称
pub type KpiBaseline = Option<f64>;

/// 业务上下文，单次运行内不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BusinessContext {
    /// 业务描述
    #[serde(alias = "business_description")]
    pub description: String,

    /// 目标
    pub goal: String,

    /// KPI名称到基线值的映射
    #[serde(default)]
    pub kpis: BTreeMap<String, KpiBaseline>,
}

impl BusinessContext {
    pub fn new(description: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            goal: goal.into(),
            kpis: BTreeMap::new(),
        }
    }

    pub fn with_kpi(mut self, name: impl Into<String>, baseline: KpiBaseline) -> Self {
        self.kpis.insert(name.into(), baseline);
        self
    }

    /// 检索证据时使用的查询语句
    pub fn retrieval_query(&self) -> String {
        format!("{}\nGoal: {}", self.description, self.goal)
    }
}
