use homefix_core::BridgeConfig;
use nova_sonic::config::DEFAULT_REGION;
use nova_sonic::{SonicClientConfig, SonicConfigError, StaticCredentials};
use secrecy::SecretString;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub sonic: SonicClientConfig,
    pub bridge: BridgeConfig,
    pub log_level: Level,
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Names the environment variable behind a rejected client setting.
fn sonic_config_error(err: SonicConfigError, region_var: &str) -> ConfigError {
    let var = match err {
        SonicConfigError::InvalidRegion(_) => region_var,
        SonicConfigError::EmptyAccessKeyId => "AWS_ACCESS_KEY_ID",
        SonicConfigError::EmptySecretAccessKey => "AWS_SECRET_ACCESS_KEY",
    };
    ConfigError::InvalidValue(var.to_string(), err.to_string())
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let (region_var, region) = optional_var("AWS_REGION")
            .map(|region| ("AWS_REGION", region))
            .or_else(|| {
                optional_var("AWS_DEFAULT_REGION").map(|region| ("AWS_DEFAULT_REGION", region))
            })
            .unwrap_or(("AWS_REGION", DEFAULT_REGION.to_string()));

        let credentials = match (
            optional_var("AWS_ACCESS_KEY_ID"),
            optional_var("AWS_SECRET_ACCESS_KEY"),
        ) {
            (Some(access_key_id), Some(secret_access_key)) => Some(StaticCredentials {
                access_key_id,
                secret_access_key: SecretString::from(secret_access_key),
                session_token: optional_var("AWS_SESSION_TOKEN"),
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::MissingVar(
                    "AWS_SECRET_ACCESS_KEY must be set together with AWS_ACCESS_KEY_ID"
                        .to_string(),
                ));
            }
            (None, Some(_)) => {
                return Err(ConfigError::MissingVar(
                    "AWS_ACCESS_KEY_ID must be set together with AWS_SECRET_ACCESS_KEY"
                        .to_string(),
                ));
            }
        };

        let sonic = SonicClientConfig {
            region,
            endpoint_url: optional_var("BEDROCK_ENDPOINT_URL"),
            credentials,
        };
        sonic
            .validate()
            .map_err(|e| sonic_config_error(e, region_var))?;

        let mut bridge = BridgeConfig::default();
        if let Some(model_id) = optional_var("NOVA_SONIC_MODEL_ID") {
            bridge.model_id = model_id;
        }
        if let Some(voice_id) = optional_var("NOVA_SONIC_VOICE_ID") {
            bridge.voice_id = voice_id;
        }
        if let Some(system_prompt) = optional_var("NOVA_SONIC_SYSTEM_PROMPT") {
            bridge.system_prompt = system_prompt;
        }
        if let Some(interval_str) = optional_var("KEEPALIVE_INTERVAL_SECS") {
            let secs = interval_str
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "KEEPALIVE_INTERVAL_SECS".to_string(),
                        format!("'{}' is not a positive number of seconds", interval_str),
                    )
                })?;
            bridge.keepalive_interval = Duration::from_secs(secs);
        }

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            sonic,
            bridge,
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homefix_core::config::{DEFAULT_MODEL_ID, DEFAULT_VOICE_ID};
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::env;

    fn clear_env_vars() {
        unsafe {
            env::remove_var("BIND_ADDRESS");
            env::remove_var("AWS_REGION");
            env::remove_var("AWS_DEFAULT_REGION");
            env::remove_var("BEDROCK_ENDPOINT_URL");
            env::remove_var("AWS_ACCESS_KEY_ID");
            env::remove_var("AWS_SECRET_ACCESS_KEY");
            env::remove_var("AWS_SESSION_TOKEN");
            env::remove_var("NOVA_SONIC_MODEL_ID");
            env::remove_var("NOVA_SONIC_VOICE_ID");
            env::remove_var("NOVA_SONIC_SYSTEM_PROMPT");
            env::remove_var("KEEPALIVE_INTERVAL_SECS");
            env::remove_var("RUST_LOG");
        }
    }

    #[test]
    fn test_config_error_display() {
        let missing_var = ConfigError::MissingVar("TEST_VAR".to_string());
        assert_eq!(
            format!("{}", missing_var),
            "Missing environment variable: TEST_VAR"
        );

        let invalid_value =
            ConfigError::InvalidValue("TEST_VAR".to_string(), "bad_value".to_string());
        assert_eq!(
            format!("{}", invalid_value),
            "Invalid value for environment variable TEST_VAR: bad_value"
        );
    }

    #[test]
    #[serial]
    fn test_config_from_env_defaults() {
        clear_env_vars();

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "0.0.0.0:8000");
        assert_eq!(config.sonic.region, "us-east-1");
        assert_eq!(config.sonic.endpoint_url, None);
        assert!(config.sonic.credentials.is_none());
        assert_eq!(config.bridge, BridgeConfig::default());
        assert_eq!(config.bridge.model_id, DEFAULT_MODEL_ID);
        assert_eq!(config.bridge.voice_id, DEFAULT_VOICE_ID);
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    #[serial]
    fn test_config_from_env_custom_values() {
        clear_env_vars();
        unsafe {
            env::set_var("BIND_ADDRESS", "127.0.0.1:8080");
            env::set_var("AWS_REGION", "eu-north-1");
            env::set_var("BEDROCK_ENDPOINT_URL", "http://localhost:4566");
            env::set_var("AWS_ACCESS_KEY_ID", "AKIDEXAMPLE");
            env::set_var("AWS_SECRET_ACCESS_KEY", "secret");
            env::set_var("AWS_SESSION_TOKEN", "token");
            env::set_var("NOVA_SONIC_MODEL_ID", "amazon.nova-sonic-v2:0");
            env::set_var("NOVA_SONIC_VOICE_ID", "tiffany");
            env::set_var("NOVA_SONIC_SYSTEM_PROMPT", "  Be brief.  ");
            env::set_var("KEEPALIVE_INTERVAL_SECS", "10");
            env::set_var("RUST_LOG", "debug");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "127.0.0.1:8080");
        assert_eq!(config.sonic.region, "eu-north-1");
        assert_eq!(config.sonic.endpoint_url(), "http://localhost:4566");
        let credentials = config.sonic.credentials.expect("credentials");
        assert_eq!(credentials.access_key_id, "AKIDEXAMPLE");
        assert_eq!(credentials.secret_access_key.expose_secret(), "secret");
        assert_eq!(credentials.session_token.as_deref(), Some("token"));
        assert_eq!(config.bridge.model_id, "amazon.nova-sonic-v2:0");
        assert_eq!(config.bridge.voice_id, "tiffany");
        assert_eq!(config.bridge.effective_system_prompt(), "Be brief.");
        assert_eq!(config.bridge.keepalive_interval, Duration::from_secs(10));
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    #[serial]
    fn test_config_default_region_fallback() {
        clear_env_vars();
        unsafe {
            env::set_var("AWS_DEFAULT_REGION", "us-west-2");
        }

        let config = Config::from_env().expect("Config should load successfully");
        assert_eq!(config.sonic.region, "us-west-2");

        unsafe {
            env::set_var("AWS_REGION", "ap-northeast-1");
        }
        let config = Config::from_env().expect("Config should load successfully");
        assert_eq!(config.sonic.region, "ap-northeast-1");
    }

    #[test]
    #[serial]
    fn test_config_invalid_bind_address() {
        clear_env_vars();
        unsafe {
            env::set_var("BIND_ADDRESS", "not-a-valid-address");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "BIND_ADDRESS"),
            _ => panic!("Expected InvalidValue for BIND_ADDRESS"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_region() {
        clear_env_vars();
        unsafe {
            env::set_var("AWS_REGION", "US EAST");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "AWS_REGION"),
            _ => panic!("Expected InvalidValue for AWS_REGION"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_default_region_names_its_variable() {
        clear_env_vars();
        unsafe {
            env::set_var("AWS_DEFAULT_REGION", "Eu West");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "AWS_DEFAULT_REGION"),
            _ => panic!("Expected InvalidValue for AWS_DEFAULT_REGION"),
        }
    }

    #[test]
    fn test_client_errors_name_the_offending_variable() {
        let cases = [
            (SonicConfigError::InvalidRegion("x y".into()), "AWS_REGION"),
            (SonicConfigError::EmptyAccessKeyId, "AWS_ACCESS_KEY_ID"),
            (SonicConfigError::EmptySecretAccessKey, "AWS_SECRET_ACCESS_KEY"),
        ];
        for (err, expected) in cases {
            match sonic_config_error(err, "AWS_REGION") {
                ConfigError::InvalidValue(var, _) => assert_eq!(var, expected),
                _ => panic!("Expected InvalidValue for {expected}"),
            }
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_log_level() {
        clear_env_vars();
        unsafe {
            env::set_var("RUST_LOG", "not-a-level");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "RUST_LOG"),
            _ => panic!("Expected InvalidValue for RUST_LOG"),
        }
    }

    #[test]
    #[serial]
    fn test_config_rejects_zero_keepalive() {
        clear_env_vars();
        for value in ["0", "-5", "soon"] {
            unsafe {
                env::set_var("KEEPALIVE_INTERVAL_SECS", value);
            }
            let err = Config::from_env().unwrap_err();
            match err {
                ConfigError::InvalidValue(var, _) => assert_eq!(var, "KEEPALIVE_INTERVAL_SECS"),
                _ => panic!("Expected InvalidValue for KEEPALIVE_INTERVAL_SECS"),
            }
        }
    }

    #[test]
    #[serial]
    fn test_config_half_specified_credentials() {
        clear_env_vars();
        unsafe {
            env::set_var("AWS_ACCESS_KEY_ID", "AKIDEXAMPLE");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(msg) => assert!(msg.contains("AWS_SECRET_ACCESS_KEY")),
            _ => panic!("Expected MissingVar for AWS_SECRET_ACCESS_KEY"),
        }
    }
}
