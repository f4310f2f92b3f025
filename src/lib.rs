pub mod adapters;
pub mod auc;
pub mod billing;
pub mod concurrency;
pub mod config;
pub mod crawl;
pub mod domain;
pub mod errors;
pub mod events;
pub mod index;
pub mod orchestrator;
pub mod queue;
pub mod rate_limiter;
pub mod worker;
pub mod zdr;
