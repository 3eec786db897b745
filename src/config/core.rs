use anyhow::{Context, Result, bail};
use figment::{
    Figment,
    providers::{Env, Format, Json, Toml, Yaml},
};
use std::path::{Path, PathBuf};

use super::{CanaryConfig, smart_load};

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

const ENV_PREFIX: &str = "CANARY_SWEEP_";
const REPO_CONFIG_STEM: &str = "canary-sweep";

/// Where the layered configuration is read from, lowest priority first
#[derive(Debug, Clone)]
pub struct ConfigSources {
    /// Directory holding `config.{toml,json,yaml,yml}`
    pub user_config_dir: Option<PathBuf>,
    /// Directory holding `canary-sweep.{toml,json,yaml,yml}`
    pub repo_dir: Option<PathBuf>,
    /// Explicit `--config` file; must exist
    pub custom_file: Option<PathBuf>,
    pub env_prefix: String,
}

impl ConfigSources {
    /// User config under `$HOME/.config`, repo config in the working directory
    pub fn standard(custom_file: Option<&Path>) -> Self {
        Self {
            user_config_dir: std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config").join("canary-sweep")),
            repo_dir: Some(PathBuf::from(".")),
            custom_file: custom_file.map(Path::to_path_buf),
            env_prefix: ENV_PREFIX.to_string(),
        }
    }
}

pub struct ConfigLoader {
    figment: Figment,
}

impl ConfigLoader {
    pub fn load(custom_config: Option<&Path>) -> Result<Self> {
        Self::from_sources(&ConfigSources::standard(custom_config))
    }

    pub fn from_sources(sources: &ConfigSources) -> Result<Self> {
        let mut figment = Figment::new().merge(Toml::string(DEFAULT_CONFIG)); // Embedded defaults

        if let Some(dir) = &sources.user_config_dir {
            figment = Self::merge_all_formats(figment, dir, "config");
        }
        if let Some(dir) = &sources.repo_dir {
            figment = Self::merge_all_formats(figment, dir, REPO_CONFIG_STEM);
        }

        if let Some(custom_path) = &sources.custom_file {
            if !custom_path.is_file() {
                bail!("Config file not found: {}", custom_path.display());
            }
            tracing::debug!("Loading config file {}", custom_path.display());
            figment = figment.merge(smart_load::auto(custom_path));
        }

        // Environment variables override every file
        figment = figment.merge(Env::prefixed(&sources.env_prefix).split("__"));

        Ok(ConfigLoader { figment })
    }

    /// Extract the merged configuration
    pub fn extract(&self) -> Result<CanaryConfig> {
        self.figment.extract().context("Invalid configuration")
    }

    fn merge_all_formats(figment: Figment, dir: &Path, stem: &str) -> Figment {
        figment
            .merge(Toml::file(dir.join(format!("{stem}.toml"))))
            .merge(Json::file(dir.join(format!("{stem}.json"))))
            .merge(Yaml::file(dir.join(format!("{stem}.yaml"))))
            .merge(Yaml::file(dir.join(format!("{stem}.yml"))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn isolated(env_prefix: &str) -> ConfigSources {
        ConfigSources {
            user_config_dir: None,
            repo_dir: None,
            custom_file: None,
            env_prefix: env_prefix.to_string(),
        }
    }

    #[test]
    fn test_embedded_defaults_match_struct_defaults() {
        let config = ConfigLoader::from_sources(&isolated("CANARY_SWEEP_TEST_DEFAULTS_"))
            .unwrap()
            .extract()
            .unwrap();
        assert_eq!(config, CanaryConfig::default());
    }

    #[test]
    fn test_repo_config_overrides_user_config() {
        let user_dir = TempDir::new().unwrap();
        let repo_dir = TempDir::new().unwrap();
        fs::write(user_dir.path().join("config.toml"), "[scanner]\nworkers = 2\nfollow_symlinks = true\n").unwrap();
        fs::write(repo_dir.path().join("canary-sweep.yaml"), "scanner:\n  workers: 6\n").unwrap();

        let sources = ConfigSources {
            user_config_dir: Some(user_dir.path().to_path_buf()),
            repo_dir: Some(repo_dir.path().to_path_buf()),
            ..isolated("CANARY_SWEEP_TEST_LAYERS_")
        };
        let config = ConfigLoader::from_sources(&sources).unwrap().extract().unwrap();

        assert_eq!(config.scanner.workers, 6);
        assert!(config.scanner.follow_symlinks);
        // Untouched keys keep their defaults
        assert_eq!(config.report.path, PathBuf::from("report.json"));
    }

    #[test]
    fn test_custom_file_and_env() {
        let temp_dir = TempDir::new().unwrap();
        let custom = temp_dir.path().join("custom.json");
        fs::write(&custom, r#"{"remediation": {"remove": true}, "report": {"pretty": false}}"#).unwrap();

        unsafe {
            std::env::set_var("CANARY_SWEEP_TEST_ENV_REPORT__PRETTY", "true");
        }
        let sources = ConfigSources {
            custom_file: Some(custom),
            ..isolated("CANARY_SWEEP_TEST_ENV_")
        };
        let config = ConfigLoader::from_sources(&sources).unwrap().extract().unwrap();
        unsafe {
            std::env::remove_var("CANARY_SWEEP_TEST_ENV_REPORT__PRETTY");
        }

        assert!(config.remediation.remove);
        assert!(config.report.pretty);
    }

    #[test]
    fn test_missing_custom_file_is_an_error() {
        let sources = ConfigSources {
            custom_file: Some(PathBuf::from("/definitely/not/here.toml")),
            ..isolated("CANARY_SWEEP_TEST_MISSING_")
        };
        assert!(ConfigLoader::from_sources(&sources).is_err());
    }

    #[test]
    fn test_invalid_value_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let custom = temp_dir.path().join("bad.toml");
        fs::write(&custom, "[scanner]\nworkers = \"many\"\n").unwrap();

        let sources = ConfigSources {
            custom_file: Some(custom),
            ..isolated("CANARY_SWEEP_TEST_INVALID_")
        };
        assert!(ConfigLoader::from_sources(&sources).unwrap().extract().is_err());
    }
}
