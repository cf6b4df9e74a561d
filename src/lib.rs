pub mod aggregate;
pub mod catalog;
pub mod engine;
pub mod filter;
pub mod fixtures;
pub mod host;
pub mod judge;
pub mod normalize;
pub mod options;
pub mod orchestrator;
pub mod report;
pub mod stats;
pub mod tool;
pub mod types;
