//! Configuration loader.

use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::schema::Config;

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load configuration from a string.
    pub fn load_str(content: &str) -> Result<Config, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let config: Config = toml::from_str(&expanded)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Expand environment variables in the format `${VAR}`.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let mut result = content.to_string();
        let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("static regex");

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let var_value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotSet(var_name.to_string()))?;
            result = result.replace(&cap[0], &var_value);
        }

        Ok(result)
    }

    fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.pool.max_sessions == 0 {
            return Err(ConfigError::Invalid(
                "pool.max_sessions must be at least 1".to_string(),
            ));
        }
        if config.engine.step_attempts == 0 {
            return Err(ConfigError::Invalid(
                "engine.step_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_empty_config() {
        let config = ConfigLoader::load_str("").unwrap();
        assert_eq!(config.pool.max_sessions, 4);
        assert!(config.browser.headless);
    }

    #[test]
    fn test_load_basic_config() {
        let content = r#"
            [pool]
            max_sessions = 2
            acquire_timeout_secs = 10

            [engine]
            step_attempts = 5
        "#;
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.pool.max_sessions, 2);
        assert_eq!(config.pool.acquire_timeout_secs, 10);
        assert_eq!(config.engine.step_attempts, 5);
        // Untouched sections keep their defaults.
        assert_eq!(config.pipeline.run_budget_secs, 300);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[browser]\nheadless = false").unwrap();
        let config = ConfigLoader::load(file.path()).unwrap();
        assert!(!config.browser.headless);
    }

    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("AUTOAPPLY_TEST_PORT", "9555");
        let config =
            ConfigLoader::load_str("[browser]\ndebug_port_base = ${AUTOAPPLY_TEST_PORT}").unwrap();
        assert_eq!(config.browser.debug_port_base, 9555);
    }

    #[test]
    fn test_env_var_missing() {
        let result = ConfigLoader::load_str("[browser]\ndebug_port_base = ${AUTOAPPLY_NOT_SET}");
        assert!(matches!(result, Err(ConfigError::EnvVarNotSet(_))));
    }

    #[test]
    fn test_zero_sessions_rejected() {
        let result = ConfigLoader::load_str("[pool]\nmax_sessions = 0");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
