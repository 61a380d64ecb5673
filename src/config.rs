use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use volcap::UntieredPolicy;

use crate::paths;

/// Environment variable overriding the `untiered` setting
pub const ENV_UNTIERED: &str = "FREESPACE_UNTIERED";

// ============================================================================
// Config
// ============================================================================

/// freespace configuration (`config.toml`)
///
/// ```toml
/// # "degrade" (default): report the single free-space number for both tiers
/// # "error": fail on volumes without a purgeable-space tier
/// untiered = "degrade"
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub untiered: UntieredPolicy,
}

impl Config {
    /// Load the config file (if any) and apply environment overrides
    pub fn load() -> Result<Self> {
        let path = paths::config_file()?;
        let env_untiered = std::env::var(ENV_UNTIERED).ok();
        Self::load_from(&path)?.with_overrides(env_untiered.as_deref())
    }

    /// Load config from a specific file. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid config format in {}", path.display()))?;
        log::debug!("Loaded config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    /// Apply an `untiered` override (from `FREESPACE_UNTIERED`)
    pub fn with_overrides(mut self, untiered: Option<&str>) -> Result<Self> {
        if let Some(value) = untiered {
            self.untiered = value
                .parse()
                .with_context(|| format!("Invalid {ENV_UNTIERED}"))?;
            log::debug!("Using untiered policy from {}: {}", ENV_UNTIERED, self.untiered);
        }
        Ok(self)
    }
}
