pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod rate_limit;
pub mod scheduler;
pub mod scope;
pub mod stats;
