use std::time::Duration;

use scrapeforge_core::config::{CoreConfig, CreditCosts};

#[test]
fn builder_requires_database_url_before_build() {
    // `CoreConfig::builder().build()` without a database_url does not
    // compile: `.build()` only exists on `CoreConfigBuilder<WithDatabaseUrl>`.
    let config = CoreConfig::builder().database_url("sqlite://test.sqlite").build();
    assert_eq!(config.database_url(), "sqlite://test.sqlite");
}

#[test]
fn builder_fields_default_unless_overridden() {
    let config = CoreConfig::builder().database_url("sqlite::memory:").build();
    assert_eq!(config.rate_limit_window(), Duration::from_secs(60));
    assert_eq!(config.job_max_retries(), 3);
    assert_eq!(config.queue_band_weights(), (4, 2, 1));
}

#[test]
fn builder_overrides_apply() {
    let costs = CreditCosts {
        per_page: 2.0,
        llm_format_multiplier: 10.0,
        map_call: 0.5,
        search_per_document: 1.5,
    };
    let config = CoreConfig::builder()
        .database_url("sqlite::memory:")
        .credit_costs(costs.clone())
        .auc_cache_ttl(Duration::from_secs(30))
        .billing_batch_size(50)
        .db_auth_bypass(true)
        .preview_credential("preview-token")
        .build();

    assert_eq!(config.credit_costs(), &costs);
    assert_eq!(config.auc_cache_ttl(), Duration::from_secs(30));
    assert_eq!(config.billing_batch_size(), 50);
    assert!(config.db_auth_bypass());
    assert_eq!(config.preview_credential(), Some("preview-token"));
}

#[test]
fn default_credit_costs_apply_llm_multiplier_only_to_llm_formats() {
    let costs = CreditCosts::default();
    assert_eq!(costs.per_page, 1.0);
    assert_eq!(costs.per_page * costs.llm_format_multiplier, 5.0);
}
