use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::warn;

use crate::config::{Config, LLMProvider};
use crate::types::business::{BusinessContext, KpiBaseline};

/// BizScale - 多顾问协同的业务增长诊断工具
#[derive(Parser, Debug)]
#[command(name = "bizscale")]
#[command(
    about = "Runs three advisor personas over a business description in parallel, grounds each in retrieved evidence, and merges their diagnoses into one prioritized report."
)]
#[command(version)]
pub struct Cli {
    /// 是否启用详细日志
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 对一个业务执行完整的顾问分析
    Run(RunArgs),
    /// 运行内置评估场景
    Evaluate(ConfigArgs),
    /// 导出最近一次运行的报告
    Latest(ConfigArgs),
    /// 校验一个报告文件的结构
    Validate(ValidateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl ConfigArgs {
    pub fn load(&self) -> Result<Config> {
        Config::load(self.config.as_deref())
    }
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// 业务描述
    #[arg(short, long)]
    pub description: String,

    /// 目标
    #[arg(short, long)]
    pub goal: String,

    /// KPI，格式为`名称`或`名称=基线值`，可重复
    #[arg(long = "kpi", value_parser = parse_kpi)]
    pub kpis: Vec<(String, KpiBaseline)>,

    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 关闭证据检索
    #[arg(long)]
    pub no_rag: bool,

    /// 运行前检查模型连接
    #[arg(long)]
    pub check_connection: bool,

    /// LLM Provider (openai, moonshot, deepseek, mistral, openrouter, anthropic, gemini, ollama)
    #[arg(long)]
    pub llm_provider: Option<String>,

    /// LLM API KEY
    #[arg(long)]
    pub llm_api_key: Option<String>,

    /// LLM API基地址
    #[arg(long)]
    pub llm_api_base_url: Option<String>,

    /// 模型名称
    #[arg(long)]
    pub model: Option<String>,

    /// 温度参数
    #[arg(long)]
    pub temperature: Option<f64>,

    /// 每位顾问检索的证据条数
    #[arg(long)]
    pub top_k: Option<usize>,

    /// 知识库目录
    #[arg(long)]
    pub knowledge_dir: Option<PathBuf>,

    /// 报告输出目录
    #[arg(long)]
    pub metadata_dir: Option<PathBuf>,
}

impl RunArgs {
    /// 加载配置文件并用命令行参数覆盖
    pub fn to_config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;

        if let Some(provider_str) = &self.llm_provider {
            match provider_str.parse::<LLMProvider>() {
                Ok(provider) => config.llm.provider = provider,
                Err(_) => warn!(
                    provider = %provider_str,
                    "⚠️ 未知的provider，使用{}",
                    config.llm.provider
                ),
            }
        }
        if let Some(api_key) = &self.llm_api_key {
            config.llm.api_key = api_key.clone();
        }
        if let Some(api_base_url) = &self.llm_api_base_url {
            config.llm.api_base_url = api_base_url.clone();
        }
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
        if let Some(temperature) = self.temperature {
            config.llm.temperature = temperature;
        }
        if let Some(top_k) = self.top_k {
            config.retrieval.top_k = top_k;
        }
        if let Some(knowledge_dir) = &self.knowledge_dir {
            config.retrieval.knowledge_dir = knowledge_dir.clone();
        }
        if let Some(metadata_dir) = &self.metadata_dir {
            config.output.metadata_dir = metadata_dir.clone();
        }
        if self.no_rag {
            config.retrieval.enabled = false;
        }
        config.check_connection |= self.check_connection;

        Ok(config)
    }

    pub fn business(&self) -> BusinessContext {
        self.kpis.iter().fold(
            BusinessContext::new(self.description.clone(), self.goal.clone()),
            |business, (name, baseline)| business.with_kpi(name.clone(), *baseline),
        )
    }
}

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// 报告JSON文件
    pub file: PathBuf,
}

/// 解析`名称`或`名称=基线值`
pub fn parse_kpi(raw: &str) -> Result<(String, KpiBaseline), String> {
    let (name, value) = match raw.split_once('=') {
        Some((name, value)) => (name.trim(), Some(value.trim())),
        None => (raw.trim(), None),
    };
    if name.is_empty() {
        return Err(format!("KPI name is empty in '{}'", raw));
    }

    let baseline = match value {
        None | Some("") => None,
        Some(value) => Some(
            value
                .parse::<f64>()
                .map_err(|_| format!("KPI '{}' has a non-numeric value '{}'", name, value))?,
        ),
    };
    Ok((name.to_string(), baseline))
}
