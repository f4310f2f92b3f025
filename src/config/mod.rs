//! Deployment configuration for the core: credit costs, rate-limit and
//! concurrency defaults, cache/queue/billing tunables, and deployment flags.
//! Built with a typestate builder so a missing `database_url` is a compile
//! error rather than a runtime surprise.

pub mod builder;
pub mod types;

pub use builder::{CoreConfigBuilder, WithDatabaseUrl};
pub use types::{CoreConfig, CreditCosts};
