use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::smoothing::HR_SMOOTH_WINDOW;

pub const ENV_SHEET_URL: &str = "RUNLOG_SHEET_URL";
pub const ENV_ACTIVITY: &str = "RUNLOG_ACTIVITY";
pub const ENV_CACHE_TTL_SECS: &str = "RUNLOG_CACHE_TTL_SECS";

fn default_activity() -> Option<String> {
    Some("Run".to_string())
}
fn default_ttl_secs() -> u64 {
    600
}
fn default_hr_window() -> usize {
    HR_SMOOTH_WINDOW
}
fn default_timeout_secs() -> u64 {
    10
}

/// Oppsett for én pipeline-instans (én per prosess).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default, alias = "private_gsheets_url")]
    pub sheet_url: Option<String>,
    /// None eller "" = ingen filtrering
    #[serde(default = "default_activity")]
    pub activity_filter: Option<String>,
    #[serde(default = "default_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_hr_window")]
    pub hr_window: usize,
    #[serde(default = "default_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Opak credential for private ark
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sheet_url: None,
            activity_filter: default_activity(),
            cache_ttl_secs: default_ttl_secs(),
            hr_window: default_hr_window(),
            http_timeout_secs: default_timeout_secs(),
            access_token: None,
        }
    }
}

impl PipelineConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hr_window == 0 {
            return Err(ConfigError::Invalid("hr_window must be at least 1".into()));
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::Invalid("http_timeout_secs must be at least 1".into()));
        }
        Ok(())
    }

    /// Miljøvariabler vinner over fil.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub(crate) fn apply_overrides<F>(&mut self, get: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = get(ENV_SHEET_URL) {
            self.sheet_url = Some(url);
        }
        if let Some(activity) = get(ENV_ACTIVITY) {
            self.activity_filter = Some(activity);
        }
        if let Some(ttl) = get(ENV_CACHE_TTL_SECS) {
            self.cache_ttl_secs = ttl.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{ENV_CACHE_TTL_SECS} is not a number: {ttl:?}"))
            })?;
        }
        Ok(())
    }
}

/// Parser config-JSON med sti til feltet som feilet.
pub fn parse_config(json: &str) -> Result<PipelineConfig, ConfigError> {
    let mut de = serde_json::Deserializer::from_str(json);
    let cfg: PipelineConfig =
        serde_path_to_error::deserialize(&mut de).map_err(|e| ConfigError::Parse {
            path: e.path().to_string(),
            message: e.inner().to_string(),
        })?;
    cfg.validate()?;
    Ok(cfg)
}

/// Leser inn config fra disk (JSON).
/// Hvis filen ikke finnes, returneres default-config.
pub fn load_config(path: impl AsRef<Path>) -> Result<PipelineConfig, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        log::warn!("config not found at {}, using defaults", path.display());
        return Ok(PipelineConfig::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let cfg = parse_config(&contents)?;
    log::info!(
        "config loaded from {} (activity={:?}, ttl={}s)",
        path.display(),
        cfg.activity_filter,
        cfg.cache_ttl_secs
    );
    Ok(cfg)
}

/// Lagrer config til disk som JSON (pretty-print).
pub fn save_config(cfg: &PipelineConfig, path: impl AsRef<Path>) -> Result<(), ConfigError> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(cfg).map_err(|e| ConfigError::Parse {
        path: String::new(),
        message: e.to_string(),
    })?;
    std::fs::write(path, json).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    log::info!("config saved to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn overrides_win_over_file_values() {
        let mut cfg = parse_config(r#"{"sheet_url":"https://a","cache_ttl_secs":30}"#).unwrap();
        let env: HashMap<&str, &str> =
            [(ENV_SHEET_URL, "https://b"), (ENV_CACHE_TTL_SECS, " 120 ")].into_iter().collect();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(cfg.sheet_url.as_deref(), Some("https://b"));
        assert_eq!(cfg.cache_ttl_secs, 120);
        assert_eq!(cfg.activity_filter.as_deref(), Some("Run"));
    }

    #[test]
    fn bad_ttl_override_is_invalid() {
        let mut cfg = PipelineConfig::default();
        let err = cfg
            .apply_overrides(|k| (k == ENV_CACHE_TTL_SECS).then(|| "ten".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
