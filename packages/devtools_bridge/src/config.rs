use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::filter::FilterConfig;
use crate::session::{BridgeOptions, DEFAULT_MAX_AGE};

// =============================================================================
// Bridge config (figment-deserialized from defaults / devtools.toml / env vars)
// =============================================================================
//
//   devtools.toml:   max_age = 50
//                    [filters]
//                    blacklist = ["TICK"]
//
//   env var:         DEVTOOLS_MAX_AGE=50
//                    DEVTOOLS_FILTERS__BLACKLIST='["TICK"]'

/// Default interval between actor heartbeats.
pub const DEFAULT_HEARTBEAT_MS: u64 = 222;

/// File name looked up in the config directory.
pub const CONFIG_FILE: &str = "devtools.toml";

/// Tunables a host can set without code.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BridgeFileConfig {
    #[serde(default = "default_max_age")]
    pub max_age: usize,
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_ms: u64,
    #[serde(default)]
    pub filters: Option<FilterConfig>,
}

impl Default for BridgeFileConfig {
    fn default() -> Self {
        Self {
            max_age: default_max_age(),
            heartbeat_ms: default_heartbeat_ms(),
            filters: None,
        }
    }
}

fn default_max_age() -> usize {
    DEFAULT_MAX_AGE
}

fn default_heartbeat_ms() -> u64 {
    DEFAULT_HEARTBEAT_MS
}

/// Build a figment that layers: defaults → devtools.toml → DEVTOOLS_* env vars.
///
/// Env vars use double-underscore for nesting:
///   `DEVTOOLS_FILTERS__WHITELIST='["INCREMENT"]'`  →  `filters.whitelist`
pub fn load_config(config_dir: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(BridgeFileConfig::default()))
        .merge(Toml::file(config_dir.join(CONFIG_FILE)))
        .merge(Env::prefixed("DEVTOOLS_").split("__"))
}

impl BridgeFileConfig {
    pub fn load(config_dir: &Path) -> Result<Self, BridgeError> {
        let config: Self = load_config(config_dir)
            .extract()
            .map_err(|e| BridgeError::Config(Box::new(e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.heartbeat_ms == 0 {
            return Err(BridgeError::InvalidConfig("heartbeat_ms must be greater than zero"));
        }
        Ok(())
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }

    /// Options for [`crate::enhance`]; creators and codec are left to the host.
    pub fn into_options(self) -> BridgeOptions {
        BridgeOptions {
            max_age: Some(self.max_age),
            filters: self.filters,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let fc: BridgeFileConfig = load_config(tmp.path()).extract().unwrap();
        assert_eq!(fc, BridgeFileConfig::default());
        assert_eq!(fc.heartbeat(), Duration::from_millis(222));
    }

    #[test]
    fn test_load_config_toml_sets_values() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            "max_age = 5\nheartbeat_ms = 50\n[filters]\nblacklist = [\"TICK\", \"TOCK\"]\n",
        )
        .unwrap();

        let fc = BridgeFileConfig::load(tmp.path()).unwrap();
        assert_eq!(fc.max_age, 5);
        assert_eq!(fc.heartbeat_ms, 50);
        let filters = fc.filters.clone().unwrap();
        assert_eq!(filters.blacklist, Some(vec!["TICK".to_string(), "TOCK".to_string()]));
        assert_eq!(filters.whitelist, None);

        let options = fc.into_options();
        assert_eq!(options.max_age(), 5);
        assert!(options.action_creators.is_none());
    }

    #[test]
    fn test_load_config_rejects_bad_types() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), "max_age = \"lots\"\n").unwrap();
        assert!(matches!(
            BridgeFileConfig::load(tmp.path()),
            Err(BridgeError::Config(_))
        ));
    }

    #[test]
    fn test_load_config_rejects_zero_heartbeat() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), "heartbeat_ms = 0\n").unwrap();
        assert!(matches!(
            BridgeFileConfig::load(tmp.path()),
            Err(BridgeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_zero_max_age_falls_back() {
        let fc = BridgeFileConfig {
            max_age: 0,
            ..Default::default()
        };
        assert_eq!(fc.into_options().max_age(), DEFAULT_MAX_AGE);
    }
}
