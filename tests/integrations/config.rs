use notifan::cli::Cli;
use notifan::config::{Config, LegacyEnv};
use notifan::retry::BackoffStrategy;
use serial_test::serial;
use std::io::Write;
use tempfile::NamedTempFile;

fn toml_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", content).unwrap();
    file
}

#[test]
#[serial]
fn test_load_full_valid_config() {
    let file = toml_file(
        r#"
        log_level = "debug"
        [dispatch]
        timeout_seconds = 20
        max_concurrency = 3
        skip_titles = ["heartbeat"]
        [dispatch.retry]
        max_attempts = 4
        base_delay_seconds = 0.5
        max_delay_seconds = 8.0
        strategy = "linear"
        jitter = false
        [hitokoto]
        enabled = true
        [channels.console]
        enabled = false
        [channels.bark]
        push = "devkey"
        archive = 1
        [channels.telegram]
        bot_token = "123:abc"
        user_id = 42
        proxy_host = "127.0.0.1"
        proxy_port = 7890
        [channels.qmsg]
        key = "qkey"
        kind = "group"
        [channels.wecom_app]
        corp_id = "ww1"
        corp_secret = "secret"
        agent_id = 1000002
        [channels.smtp]
        server = "smtp.example.com:465"
        ssl = true
    "#,
    );

    let cli = Cli {
        config: Some(file.path().to_path_buf()),
        ..Default::default()
    };
    let config = Config::figment(&cli, LegacyEnv::default()).extract::<Config>().unwrap();

    assert_eq!(config.log_level, "debug");
    assert_eq!(config.dispatch.timeout_seconds, 20);
    assert_eq!(config.dispatch.max_concurrency, 3);
    assert_eq!(config.dispatch.skip_titles, vec!["heartbeat"]);
    assert_eq!(config.dispatch.retry.max_attempts, 4);
    assert_eq!(config.dispatch.retry.strategy, BackoffStrategy::Linear);
    assert!(!config.dispatch.retry.jitter);
    assert_eq!(config.dispatch.retry.multiplier, 2.0, "unset keys keep defaults");
    assert!(config.hitokoto.enabled);
    assert_eq!(config.hitokoto.url, "https://v1.hitokoto.cn/");
    assert!(!config.channels.console.enabled);
    assert_eq!(config.channels.bark.push.as_deref(), Some("devkey"));
    assert_eq!(config.channels.bark.archive.as_deref(), Some("1"));
    assert_eq!(config.channels.telegram.user_id.as_deref(), Some("42"));
    assert_eq!(config.channels.telegram.proxy_port.as_deref(), Some("7890"));
    assert_eq!(config.channels.qmsg.kind.as_deref(), Some("group"));
    assert_eq!(config.channels.wecom_app.agent_id.as_deref(), Some("1000002"));
    assert!(config.channels.smtp.ssl);
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_cli_overrides_file_and_env() {
    let file = toml_file(
        r#"
        [dispatch]
        timeout_seconds = 20
        max_concurrency = 3
        [dispatch.retry]
        max_attempts = 4
    "#,
    );

    std::env::set_var("NOTIFAN_DISPATCH__MAX_CONCURRENCY", "7");
    std::env::set_var("NOTIFAN_LOG_LEVEL", "warn");
    let cli = Cli {
        config: Some(file.path().to_path_buf()),
        timeout: Some(5),
        retry_attempts: Some(1),
        ..Default::default()
    };
    let config = Config::figment(&cli, LegacyEnv::default()).extract::<Config>();
    std::env::remove_var("NOTIFAN_DISPATCH__MAX_CONCURRENCY");
    std::env::remove_var("NOTIFAN_LOG_LEVEL");

    let config = config.unwrap();
    assert_eq!(config.dispatch.timeout_seconds, 5);
    assert_eq!(config.dispatch.max_concurrency, 7);
    assert_eq!(config.dispatch.retry.max_attempts, 1);
    assert_eq!(config.log_level, "warn");
}

#[test]
#[serial]
fn test_prefixed_env_wins_over_legacy_env() {
    std::env::set_var("NOTIFAN_CHANNELS__SERVERCHAN__KEY", "SCT-prefixed");
    let legacy = LegacyEnv::from_vars([("PUSH_KEY", "SCT-legacy"), ("QYWX_KEY", "robot")]);
    let config = Config::figment(&Cli::default(), legacy).extract::<Config>();
    std::env::remove_var("NOTIFAN_CHANNELS__SERVERCHAN__KEY");

    let config = config.unwrap();
    assert_eq!(config.channels.serverchan.key.as_deref(), Some("SCT-prefixed"));
    assert_eq!(config.channels.wecom_bot.key.as_deref(), Some("robot"));
}

#[test]
#[serial]
fn test_load_reads_legacy_process_env() {
    std::env::set_var("NOTIFICATION_RETRY_ATTEMPTS", "5");
    let config = Config::load(&Cli::default());
    std::env::remove_var("NOTIFICATION_RETRY_ATTEMPTS");

    assert_eq!(config.unwrap().dispatch.retry.max_attempts, 5);
}

#[test]
#[serial]
fn test_invalid_toml_is_an_error() {
    let file = toml_file("[dispatch\ntimeout_seconds = ");
    let cli = Cli {
        config: Some(file.path().to_path_buf()),
        ..Default::default()
    };
    assert!(Config::load(&cli).is_err());
}

#[test]
#[serial]
fn test_wrong_type_is_an_error() {
    let file = toml_file("[dispatch]\ntimeout_seconds = \"soon\"\n");
    let cli = Cli {
        config: Some(file.path().to_path_buf()),
        ..Default::default()
    };
    assert!(Config::load(&cli).is_err());
}
