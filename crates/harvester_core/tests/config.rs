use harvester_core::{ConfigError, HarvestConfig, Source, SourceTarget};

fn config_with(sources: Vec<Source>) -> HarvestConfig {
    HarvestConfig {
        sources,
        ..HarvestConfig::default()
    }
}

#[test]
fn defaults_are_valid_once_a_source_exists() {
    let config = config_with(vec![
        Source::static_page("calendar", "http://boletin.example.mx/2024/47/index.html"),
        Source::paginated("posts", "ITAM_mx"),
    ]);
    assert_eq!(config.validate(), Ok(()));

    let settings = config.run_settings();
    assert_eq!(settings.worker_pool_size, 5);
    assert_eq!(settings.request_budget, 5);
    assert_eq!(settings.page_size, 100);
    assert_eq!(settings.inter_request_delay.as_millis(), 1_000);
    assert!(settings.use_cache);
}

#[test]
fn rejects_empty_and_duplicate_sources() {
    assert_eq!(config_with(vec![]).validate(), Err(ConfigError::NoSources));

    let dup = config_with(vec![
        Source::paginated("same", "a"),
        Source::paginated("same", "b"),
    ]);
    assert_eq!(
        dup.validate(),
        Err(ConfigError::DuplicateSourceId("same".to_string()))
    );
}

#[test]
fn rejects_bad_handles_and_urls() {
    let handle = config_with(vec![Source::paginated("p", "not a handle!")]);
    assert!(matches!(
        handle.validate(),
        Err(ConfigError::InvalidHandle { .. })
    ));

    let url = config_with(vec![Source::static_page("c", "ftp://example.com/cal")]);
    assert!(matches!(url.validate(), Err(ConfigError::InvalidUrl { .. })));

    let relative = config_with(vec![Source::static_page("c", "/cal.html")]);
    assert!(matches!(
        relative.validate(),
        Err(ConfigError::InvalidUrl { .. })
    ));
}

#[test]
fn rejects_out_of_range_options() {
    let mut config = config_with(vec![Source::paginated("p", "handle_1")]);
    config.page_size = 101;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::OutOfRange {
            name: "page_size",
            ..
        })
    ));

    config.page_size = 50;
    config.worker_pool_size = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::OutOfRange {
            name: "worker_pool_size",
            ..
        })
    ));
}

#[test]
fn api_sources_need_the_endpoint_minimum_page_size() {
    let mut config = config_with(vec![Source::paginated("p", "handle_1")]);
    config.page_size = 2;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::OutOfRange {
            name: "page_size",
            ..
        })
    ));

    config.page_size = 5;
    assert_eq!(config.validate(), Ok(()));

    let calendar_only = HarvestConfig {
        page_size: 2,
        ..config_with(vec![Source::static_page("c", "https://example.com/cal")])
    };
    assert_eq!(calendar_only.validate(), Ok(()));
}

#[test]
fn static_page_target_reports_mode() {
    let source = Source {
        id: "c".into(),
        target: SourceTarget::StaticPage {
            url: "https://example.com".to_string(),
            link_prefix: Some("https://example.com/evento/".to_string()),
            scope_selector: None,
        },
    };
    assert_eq!(source.mode(), harvester_core::DiscoveryMode::StaticPage);
}
