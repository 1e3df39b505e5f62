use std::collections::HashMap;

use super::*;

fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| vars.get(key).cloned()
}

#[test]
fn refuses_to_load_without_api_key() {
    let err = load_settings_from(None, env_of(&[])).expect_err("missing key");
    assert_eq!(err.to_string(), API_KEY_MISSING);

    let err =
        load_settings_from(None, env_of(&[("GROQ_API_KEY", "   ")])).expect_err("blank key");
    assert_eq!(err.to_string(), API_KEY_MISSING);
}

#[test]
fn defaults_apply_when_only_key_is_set() {
    let settings =
        load_settings_from(None, env_of(&[("GROQ_API_KEY", "gsk-test")])).expect("settings");
    assert_eq!(settings.llm_api_key, "gsk-test");
    assert_eq!(settings.llm_api_url, DEFAULT_API_URL);
    assert_eq!(settings.llm_model, DEFAULT_MODEL);
    assert_eq!(settings.llm_timeout_seconds, None);
    assert_eq!(settings.server_bind, "127.0.0.1:8080");
    assert_eq!(settings.session_idle(), Duration::from_secs(30 * 60));
}

#[test]
fn session_idle_timeout_comes_from_file_then_environment() {
    let settings = load_settings_from(
        Some("session_idle_seconds = 120"),
        env_of(&[("GROQ_API_KEY", "k")]),
    )
    .expect("settings");
    assert_eq!(settings.session_idle(), Duration::from_secs(120));

    let settings = load_settings_from(
        Some("session_idle_seconds = 120"),
        env_of(&[("GROQ_API_KEY", "k"), ("APP__SESSION_IDLE_SECONDS", "15")]),
    )
    .expect("settings");
    assert_eq!(settings.session_idle_seconds, 15);

    load_settings_from(
        None,
        env_of(&[("GROQ_API_KEY", "k"), ("APP__SESSION_IDLE_SECONDS", "forever")]),
    )
    .expect_err("unparsable");
    load_settings_from(
        None,
        env_of(&[("GROQ_API_KEY", "k"), ("APP__SESSION_IDLE_SECONDS", "0")]),
    )
    .expect_err("zero");
}

#[test]
fn environment_overrides_file_and_app_prefix_wins() {
    let file = r#"
        bind_addr = "0.0.0.0:9000"
        database_url = "sqlite://./file.db"
        llm_model = "file-model"
        llm_timeout_seconds = 30
    "#;
    let settings = load_settings_from(
        Some(file),
        env_of(&[
            ("GROQ_API_KEY", "plain"),
            ("APP__LLM_API_KEY", "prefixed"),
            ("DATABASE_URL", "sqlite://./env.db"),
            ("APP__LLM_MODEL", "env-model"),
        ]),
    )
    .expect("settings");

    assert_eq!(settings.server_bind, "0.0.0.0:9000");
    assert_eq!(settings.database_url, "sqlite://./env.db");
    assert_eq!(settings.llm_api_key, "prefixed");
    assert_eq!(settings.llm_model, "env-model");
    assert_eq!(settings.llm_timeout_seconds, Some(30));

    let config = settings.assistant_config();
    assert_eq!(config.timeout, Some(Duration::from_secs(30)));
    assert_eq!(config.model, "env-model");
}

#[test]
fn unreadable_file_is_ignored() {
    let settings = load_settings_from(Some("not = [valid"), env_of(&[("GROQ_API_KEY", "k")]))
        .expect("settings");
    assert_eq!(settings.server_bind, Settings::default().server_bind);
}

#[test]
fn rejects_bad_api_url_and_timeout() {
    let err = load_settings_from(
        None,
        env_of(&[("GROQ_API_KEY", "k"), ("APP__LLM_API_URL", "ftp://example.com/x")]),
    )
    .expect_err("scheme");
    assert!(err.to_string().contains("http or https"));

    load_settings_from(
        None,
        env_of(&[("GROQ_API_KEY", "k"), ("APP__LLM_API_URL", "not a url")]),
    )
    .expect_err("parse");

    load_settings_from(
        None,
        env_of(&[("GROQ_API_KEY", "k"), ("APP__LLM_TIMEOUT_SECONDS", "soon")]),
    )
    .expect_err("timeout");
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/test.db"),
        "sqlite://./data/test.db"
    );
    assert_eq!(
        normalize_database_url("data\\test.db"),
        "sqlite://data/test.db"
    );
}

#[test]
fn keeps_explicit_urls_and_defaults_blank_input() {
    assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
    assert_eq!(
        normalize_database_url(" sqlite://./x.db "),
        "sqlite://./x.db"
    );
    assert_eq!(normalize_database_url("  "), Settings::default().database_url);
}
