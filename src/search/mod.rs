pub mod classifier;
pub mod client;
pub mod query;
pub mod ranker;
