//! Layered configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use gatepath_core::checkpoint::CheckpointConfig;
use gatepath_core::construct::ScoringConfig;
use gatepath_core::engine::{EngineConfig, ProgramConfig};
use gatepath_core::mastery::MasteryConfig;
use gatepath_core::readiness::ReadinessWeights;

/// Top-level gatepath configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatepathConfig {
    /// JSON file the store is persisted to.
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,
    #[serde(default)]
    pub program: ProgramConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub mastery: MasteryConfig,
    #[serde(default)]
    pub readiness: ReadinessWeights,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    /// Fixed seed for checkpoint shuffling.
    #[serde(default)]
    pub shuffle_seed: Option<u64>,
}

fn default_data_path() -> PathBuf {
    PathBuf::from("./gatepath-data.json")
}

impl Default for GatepathConfig {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            program: ProgramConfig::default(),
            scoring: ScoringConfig::default(),
            mastery: MasteryConfig::default(),
            readiness: ReadinessWeights::default(),
            checkpoint: CheckpointConfig::default(),
            shuffle_seed: None,
        }
    }
}

impl GatepathConfig {
    /// The engine's share of the configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            program: self.program.clone(),
            scoring: self.scoring.clone(),
            mastery: self.mastery.clone(),
            readiness: self.readiness,
            checkpoint: self.checkpoint.clone(),
            shuffle_seed: self.shuffle_seed,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.engine_config()
            .validate()
            .context("invalid engine configuration")?;
        Ok(())
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `gatepath.toml` in the current directory
/// 2. `~/.config/gatepath/config.toml`
///
/// `GATEPATH_DATA_PATH` overrides `data_path`.
pub fn load_config() -> Result<GatepathConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<GatepathConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("gatepath.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!("loading config from {}", path.display());
            parse_config_str(
                &std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config: {}", path.display()))?,
            )
            .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => GatepathConfig::default(),
    };

    if let Ok(data_path) = std::env::var("GATEPATH_DATA_PATH") {
        config.data_path = PathBuf::from(data_path);
    }
    config.data_path = PathBuf::from(resolve_env_vars(&config.data_path.to_string_lossy()));

    config.validate()?;
    Ok(config)
}

/// Parse a config from a TOML string.
pub fn parse_config_str(content: &str) -> Result<GatepathConfig> {
    Ok(toml::from_str::<GatepathConfig>(content)?)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("gatepath"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_GATEPATH_TEST_VAR", "data");
        assert_eq!(resolve_env_vars("${_GATEPATH_TEST_VAR}"), "data");
        assert_eq!(
            resolve_env_vars("/srv/${_GATEPATH_TEST_VAR}/store.json"),
            "/srv/data/store.json"
        );
        std::env::remove_var("_GATEPATH_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = GatepathConfig::default();
        assert_eq!(config.data_path, PathBuf::from("./gatepath-data.json"));
        assert_eq!(config.readiness, ReadinessWeights::STANDARD);
        assert!(config.program.baseline_module_ids.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
data_path = "state/learners.json"
shuffle_seed = 7

[program]
baseline_module_ids = ["baseline-quant", "baseline-verbal"]
total_skill_count = 24

[scoring]
learning_rate = 0.2

[checkpoint]
target_size = 10
"#;
        let config = parse_config_str(toml_str).unwrap();
        assert_eq!(config.program.baseline_module_ids.len(), 2);
        assert_eq!(config.program.total_skill_count, 24);
        assert_eq!(config.scoring.learning_rate, 0.2);
        assert_eq!(config.scoring.weak_construct_threshold, 60.0);
        assert_eq!(config.checkpoint.target_size, 10);
        assert_eq!(config.checkpoint.fetch_limit, 60);
        assert_eq!(config.shuffle_seed, Some(7));

        let engine = config.engine_config();
        assert_eq!(engine.program, config.program);
        assert_eq!(engine.shuffle_seed, Some(7));
    }

    #[test]
    fn weights_must_sum_to_one() {
        let config = parse_config_str(
            r#"
[readiness]
accuracy = 0.5
speed_index = 0.25
stability = 0.20
coverage = 0.15
"#,
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(format!("{err:#}").contains("sum"));
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let err = load_config_from(Some(Path::new("/nonexistent/gatepath.toml"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn explicit_path_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gatepath.toml");
        std::fs::write(&path, "[program]\ntotal_skill_count = 5\n").unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.program.total_skill_count, 5);
    }
}
