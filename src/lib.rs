pub mod cli;
pub mod config;
pub mod generator;
pub mod llm;
pub mod retrieval;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use generator::context::AdvisoryContext;
pub use generator::orchestrator::AdvisoryGraph;
pub use generator::workflow::launch;
pub use types::business::BusinessContext;
pub use types::report::FinalReport;
