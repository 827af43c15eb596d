#[cfg(test)]
mod tests {
    use endercom_config::ConfigLoader;
    use endercom_config::schema::*;
    use std::collections::HashMap;
    use std::io::Write;
    use std::time::Duration;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    fn configured() -> EndercomConfig {
        let mut config = EndercomConfig::default();
        config.agent.api_key = Some("key".into());
        config.agent.frequency_id = Some("freq".into());
        config
    }

    // ── Default tests ──────────────────────────────────────────

    #[test]
    fn test_defaults_match_runtime_defaults() {
        let config = EndercomConfig::default();
        assert_eq!(config.agent.base_url, "https://endercom.io");
        assert_eq!(config.run.poll_interval_ms, 2000);
        assert_eq!(config.run.handler_timeout_secs, 30);
        assert_eq!(config.server.port, 8000);
        assert!(config.server.heartbeat);
        assert!(config.server.a2a);
        assert!(!config.server.enabled);
        assert_eq!(config.function.port, 3002);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: EndercomConfig = toml::from_str(
            r#"
            [agent]
            frequency_id = "freq-7"

            [server]
            port = 9000
            a2a = false
            "#,
        )
        .unwrap();
        assert_eq!(config.agent.frequency_id.as_deref(), Some("freq-7"));
        assert_eq!(config.agent.name, "endercom-agent");
        assert_eq!(config.server.port, 9000);
        assert!(!config.server.a2a);
        assert!(config.server.heartbeat);
        assert_eq!(config.run.max_retries, 3);
    }

    // ── Conversions ────────────────────────────────────────────

    #[test]
    fn test_agent_options_require_credentials() {
        let err = EndercomConfig::default().agent_options().unwrap_err();
        assert!(err.to_string().contains("FREQUENCY_API_KEY"));

        let mut config = EndercomConfig::default();
        config.agent.api_key = Some("key".into());
        let err = config.agent_options().unwrap_err();
        assert!(err.to_string().contains("FREQUENCY_ID"));

        let options = configured().agent_options().unwrap();
        assert_eq!(options.frequency_id, "freq");
        assert_eq!(options.agent_name, "endercom-agent");
    }

    #[test]
    fn test_run_and_server_options() {
        let mut config = configured();
        config.run.poll_interval_ms = 750;
        config.server.api_key = Some("secret".into());
        config.server.heartbeat = false;

        let run = config.run_options();
        assert_eq!(run.poll_interval, Duration::from_millis(750));
        assert!(run.validate().is_ok());

        let server = config.server_options();
        assert!(!server.enable_heartbeat);
        assert_eq!(server.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_redacted_masks_keys() {
        let mut config = configured();
        config.server.api_key = Some("secret".into());
        let shown = toml::to_string(&config.redacted()).unwrap();
        assert!(!shown.contains("secret"));
        assert!(!shown.contains("\"key\""));
        assert!(shown.contains("<redacted>"));
    }

    // ── Environment overrides ──────────────────────────────────

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = configured();
        config.agent.name = "from-file".into();
        let config = ConfigLoader::apply_overrides(
            config,
            env(&[
                ("FREQUENCY_API_KEY", "env-key"),
                ("AGENT_NAME", "from-env"),
                ("BASE_URL", "http://localhost:9999"),
                ("ENDERCOM_POLL_INTERVAL", "0.5"),
            ]),
        );
        assert_eq!(config.agent.api_key.as_deref(), Some("env-key"));
        assert_eq!(config.agent.frequency_id.as_deref(), Some("freq"));
        assert_eq!(config.agent.name, "from-env");
        assert_eq!(config.agent.base_url, "http://localhost:9999");
        assert_eq!(config.run.poll_interval_ms, 500);
    }

    #[test]
    fn test_blank_or_invalid_env_ignored() {
        let config = ConfigLoader::apply_overrides(
            configured(),
            env(&[("FREQUENCY_ID", "  "), ("ENDERCOM_POLL_INTERVAL", "soon")]),
        );
        assert_eq!(config.agent.frequency_id.as_deref(), Some("freq"));
        assert_eq!(config.run.poll_interval_ms, 2000);
    }

    // ── Validation ─────────────────────────────────────────────

    #[test]
    fn test_default_config_only_warns() {
        let warnings = EndercomConfig::default().validate().unwrap();
        assert!(warnings.iter().any(|w| w.field == "agent.api_key"));
        assert!(warnings.iter().all(|w| w.severity != WarningSeverity::Error));
    }

    #[test]
    fn test_zero_poll_interval_is_error() {
        let mut config = configured();
        config.run.poll_interval_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.contains("run.poll_interval_ms"));
    }

    #[test]
    fn test_bad_base_url_is_error() {
        let mut config = configured();
        config.agent.base_url = "ftp://example.com".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_server_key_is_error() {
        let mut config = configured();
        config.server.api_key = Some(String::new());
        assert!(config.validate().unwrap_err().contains("server.api_key"));
    }

    #[test]
    fn test_issues_lists_errors_and_warnings_together() {
        let mut config = EndercomConfig::default();
        config.function.timeout_secs = 0;
        let issues = config.issues();
        assert!(issues.iter().any(|w| w.field == "function.timeout_secs"
            && w.severity == WarningSeverity::Error));
        assert!(issues.iter().any(|w| w.field == "agent.api_key"
            && w.severity == WarningSeverity::Warning));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_warning_display_has_hint() {
        let w = ConfigWarning {
            field: "run.dedup_window".into(),
            message: "too small".into(),
            severity: WarningSeverity::Error,
            hint: Some("Default is 10000".into()),
        };
        let shown = w.to_string();
        assert!(shown.starts_with("❌ run.dedup_window"));
        assert!(shown.contains("↳ Default is 10000"));
    }

    // ── Loader ─────────────────────────────────────────────────

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("endercom.toml");
        let mut f = std::fs::File::create(&config_path).unwrap();
        writeln!(
            f,
            r#"
[agent]
api_key = "k"
frequency_id = "file-freq"

[run]
poll_interval_ms = 1500

[logging]
format = "json"
"#
        )
        .unwrap();

        let loader = ConfigLoader::load(Some(config_path.as_path())).unwrap();
        assert!(loader.from_file());
        assert_eq!(loader.path(), config_path.as_path());
        let config = loader.get();
        assert_eq!(config.run.poll_interval_ms, 1500);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("endercom.toml");
        std::fs::write(&config_path, "[run\npoll_interval_ms = ").unwrap();
        let err = ConfigLoader::load(Some(config_path.as_path())).err().unwrap();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("endercom.toml");
        std::fs::write(&config_path, "[run]\ndedup_window = 0\n").unwrap();
        assert!(ConfigLoader::load(Some(config_path.as_path())).is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let result = ConfigLoader::load(Some(std::path::Path::new("/nonexistent/endercom.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_path_prefers_explicit() {
        let p = std::path::Path::new("/tmp/custom.toml");
        assert_eq!(ConfigLoader::resolve_path(Some(p)), p.to_path_buf());
    }

    #[test]
    fn test_read_skips_validation() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("endercom.toml");
        std::fs::write(&config_path, "[run]\ndedup_window = 0\n").unwrap();
        let loader = ConfigLoader::read(Some(config_path.as_path())).unwrap();
        assert_eq!(loader.get().run.dedup_window, 0);
        assert!(loader.get().validate().is_err());
    }
}
