use clap::Parser;

use super::*;

#[test]
fn defaults_are_applied() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
    assert_eq!(settings.server.graceful_shutdown, Duration::from_secs(30));
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert!(settings.database.url.is_none());
    assert_eq!(settings.listing, ListingSettings::default());
    assert_eq!(settings.listing.page_size.get(), DEFAULT_PAGE_SIZE);
    assert_eq!(
        settings.listing.comment_page_size.get(),
        DEFAULT_COMMENT_PAGE_SIZE
    );
    assert!(settings.content.seed_file.is_none());
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.listing.page_size = Some(5);

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        listing_page_size: Some(25),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.listing.page_size.get(), 25);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn zero_page_size_is_rejected() {
    let mut raw = RawSettings::default();
    raw.listing.page_size = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero page size");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "listing.page_size",
            ..
        }
    ));
}

#[test]
fn zero_port_is_rejected() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(0);

    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "server.port",
            ..
        })
    ));
}

#[test]
fn unknown_log_level_is_rejected() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("chatty".to_string());

    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "logging.level",
            ..
        })
    ));
}

#[test]
fn blank_database_url_means_in_memory() {
    let mut raw = RawSettings::default();
    raw.database.url = Some("   ".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.database.url.is_none());
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["quire"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_import_arguments() {
    let args = CliArgs::parse_from([
        "quire",
        "import",
        "--database-url",
        "postgres://example",
        "/tmp/blog.toml",
    ]);

    match args.command.expect("import command") {
        Command::Import(import) => {
            assert_eq!(
                import.database.database_url.as_deref(),
                Some("postgres://example")
            );
            assert_eq!(import.file, std::path::Path::new("/tmp/blog.toml"));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "quire",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--listing-comment-page-size",
        "50",
        "--content-seed-file",
        "content/blog.toml",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(serve.overrides.listing_comment_page_size, Some(50));
            assert_eq!(
                serve.overrides.content_seed_file.as_deref(),
                Some(std::path::Path::new("content/blog.toml"))
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn load_reads_explicit_config_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("quire.toml");
    std::fs::write(
        &path,
        "[listing]\npage_size = 3\n\n[server]\nport = 8080\n",
    )
    .expect("write config");

    let args = CliArgs::parse_from([
        "quire",
        "--config-file",
        path.to_str().expect("utf-8 path"),
        "serve",
    ]);
    let settings = load(&args).expect("settings");

    assert_eq!(settings.listing.page_size.get(), 3);
    assert_eq!(settings.server.addr.port(), 8080);
}
