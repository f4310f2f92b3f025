//! Type-safe builder for `CoreConfig` using the typestate pattern: a
//! `database_url` must be supplied before `.build()` is callable.

use std::marker::PhantomData;
use std::time::Duration;

use super::types::{CoreConfig, CreditCosts};

pub struct WithDatabaseUrl;

pub struct CoreConfigBuilder<State = ()> {
    inner: CoreConfig,
    _phantom: PhantomData<State>,
}

impl Default for CoreConfigBuilder<()> {
    fn default() -> Self {
        Self {
            inner: CoreConfig::default(),
            _phantom: PhantomData,
        }
    }
}

impl CoreConfig {
    #[must_use]
    pub fn builder() -> CoreConfigBuilder<()> {
        CoreConfigBuilder::default()
    }
}

impl CoreConfigBuilder<()> {
    #[must_use]
    pub fn database_url(self, url: impl Into<String>) -> CoreConfigBuilder<WithDatabaseUrl> {
        let mut inner = self.inner;
        inner.database_url = url.into();
        CoreConfigBuilder {
            inner,
            _phantom: PhantomData,
        }
    }
}

impl CoreConfigBuilder<WithDatabaseUrl> {
    #[must_use]
    pub fn credit_costs(mut self, costs: CreditCosts) -> Self {
        self.inner.credit_costs = costs;
        self
    }

    #[must_use]
    pub fn auc_cache_ttl(mut self, ttl: Duration) -> Self {
        self.inner.auc_cache_ttl = ttl;
        self
    }

    #[must_use]
    pub fn billing_batch_size(mut self, size: usize) -> Self {
        self.inner.billing_batch_size = size;
        self
    }

    #[must_use]
    pub fn billing_flush_interval(mut self, interval: Duration) -> Self {
        self.inner.billing_flush_interval = interval;
        self
    }

    #[must_use]
    pub fn zdr_sweep_interval(mut self, interval: Duration) -> Self {
        self.inner.zdr_sweep_interval = interval;
        self
    }

    #[must_use]
    pub fn db_auth_bypass(mut self, bypass: bool) -> Self {
        self.inner.db_auth_bypass = bypass;
        self
    }

    #[must_use]
    pub fn preview_credential(mut self, credential: impl Into<String>) -> Self {
        self.inner.preview_credential = Some(credential.into());
        self
    }

    #[must_use]
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.inner.user_agent = ua.into();
        self
    }

    #[must_use]
    pub fn build(self) -> CoreConfig {
        self.inner
    }
}

impl From<CoreConfigBuilder<WithDatabaseUrl>> for CoreConfig {
    fn from(builder: CoreConfigBuilder<WithDatabaseUrl>) -> Self {
        builder.build()
    }
}
