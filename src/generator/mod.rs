// 顾问分析流程
// 起点 -> {dan_analysis, sam_analysis, alex_analysis} 并行 -> merge_report -> 终点
// 每个顾问节点：检索证据 -> 构建提示词 -> 生成 -> 解析 -> 缺字段时修复一次

pub mod advisor;
pub mod context;
pub mod error;
pub mod evaluation;
pub mod merge;
pub mod orchestrator;
pub mod outlet;
pub mod prompt;
pub mod structured_output;
pub mod validator;
pub mod workflow;
