pub mod naming;
pub mod orchestrator;
pub mod pool;
pub mod report;
