use std::path::PathBuf;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Debug mode: panics render a plain-text diagnostic (default: `true`).
    pub debug: bool,
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Directory served under `/static` (default: `static`).
    pub static_dir: PathBuf,
    /// Directory of `*.hbs` templates overriding the built-in ones
    /// (default: `templates`).
    pub templates_dir: PathBuf,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Emit logs as JSON lines instead of human-readable text (default: `false`).
    pub log_json: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default     |
    /// |------------------------|-------------|
    /// | `SAKUYA_DEBUG`         | `true`      |
    /// | `HOST`                 | `0.0.0.0`   |
    /// | `PORT`                 | `8000`      |
    /// | `STATIC_DIR`           | `static`    |
    /// | `TEMPLATES_DIR`        | `templates` |
    /// | `REQUEST_TIMEOUT_SECS` | `30`        |
    /// | `LOG_JSON`             | `false`     |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Panics on malformed values: misconfiguration should fail at startup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let debug = parse_bool(&var("SAKUYA_DEBUG", "true"))
            .expect("SAKUYA_DEBUG must be a boolean (true/false, 1/0, yes/no, on/off)");

        let port: u16 = var("PORT", "8000")
            .parse()
            .expect("PORT must be a valid u16");

        let request_timeout_secs: u64 = var("REQUEST_TIMEOUT_SECS", "30")
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let log_json = parse_bool(&var("LOG_JSON", "false")).expect("LOG_JSON must be a boolean");

        Self {
            debug,
            host: var("HOST", "0.0.0.0"),
            port,
            static_dir: PathBuf::from(var("STATIC_DIR", "static")),
            templates_dir: PathBuf::from(var("TEMPLATES_DIR", "templates")),
            request_timeout_secs,
            log_json,
        }
    }
}

/// Parse the usual spellings of a boolean environment value.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> ServerConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]);
        assert!(config.debug);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert_eq!(config.static_dir, PathBuf::from("static"));
        assert_eq!(config.templates_dir, PathBuf::from("templates"));
        assert_eq!(config.request_timeout_secs, 30);
        assert!(!config.log_json);
    }

    #[test]
    fn overrides_are_read() {
        let config = config_from(&[
            ("SAKUYA_DEBUG", "off"),
            ("PORT", "9001"),
            ("STATIC_DIR", "/srv/static"),
        ]);
        assert!(!config.debug);
        assert_eq!(config.port, 9001);
        assert_eq!(config.static_dir, PathBuf::from("/srv/static"));
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        for truthy in ["1", "true", "TRUE", " yes ", "On"] {
            assert_eq!(parse_bool(truthy), Some(true), "{truthy}");
        }
        for falsy in ["0", "false", "No", "OFF"] {
            assert_eq!(parse_bool(falsy), Some(false), "{falsy}");
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    #[should_panic(expected = "PORT must be a valid u16")]
    fn invalid_port_panics() {
        config_from(&[("PORT", "eighty")]);
    }
}
