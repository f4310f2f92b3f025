use scrapeforge_core::domain::{
    Credential, JobMode, ProxyMode, ScrapeJob, ScrapeJobOptions, Team, TeamId,
};
use uuid::Uuid;

#[test]
fn credential_must_be_uuid_shaped() {
    assert!(Credential(Uuid::new_v4().to_string()).is_well_formed());
    assert!(!Credential("not-a-uuid".to_string()).is_well_formed());
}

#[test]
fn scrape_job_new_derives_zdr_flag_from_options() {
    let team = TeamId(Uuid::new_v4());
    let options = ScrapeJobOptions {
        zero_data_retention: true,
        ..Default::default()
    };
    let job = ScrapeJob::new(team, "https://example.com".to_string(), options, JobMode::Single);
    assert!(job.zdr);
    assert_eq!(job.attempts, 0);
    assert!(job.credential.is_none());
}

#[test]
fn with_credential_attaches_after_construction() {
    let team = TeamId(Uuid::new_v4());
    let credential = Credential(Uuid::new_v4().to_string());
    let job = ScrapeJob::new(team, "https://example.com".to_string(), ScrapeJobOptions::default(), JobMode::Single)
        .with_credential(credential.clone());
    assert_eq!(job.credential, Some(credential));
}

#[test]
fn timeout_and_max_age_fall_back_to_documented_defaults() {
    let options = ScrapeJobOptions::default();
    assert_eq!(options.timeout(), std::time::Duration::from_secs(30));
    assert_eq!(options.max_age(), std::time::Duration::from_secs(4 * 60 * 60));
}

#[test]
fn proxy_mode_defaults_to_basic_and_displays_lowercase() {
    assert_eq!(ProxyMode::default(), ProxyMode::Basic);
    assert_eq!(ProxyMode::Stealth.to_string(), "stealth");
}

#[test]
fn team_carries_zdr_and_concurrency_policy() {
    let team = Team {
        id: TeamId(Uuid::new_v4()),
        plan: "growth".to_string(),
        concurrency_max: 10,
        allow_zdr: true,
        force_zdr: false,
    };
    assert!(team.allow_zdr);
    assert!(!team.force_zdr);
}
