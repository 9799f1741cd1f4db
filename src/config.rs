use std::collections::BTreeMap;
use std::env;
use std::path::Path;

use crate::error::ConfigError;
use crate::models::EventCode;

const DEFAULT_LOG_FILTER: &str = "info";

/// Process-level settings read from the environment (and `.env`, if present).
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: Option<String>,
    pub log_filter: String,
}

impl Settings {
    pub fn load() -> Self {
        dotenvy::dotenv().ok();

        Self {
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty()),
            log_filter: env::var("DRIVER_RISK_LOG")
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string()),
        }
    }

    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::MissingDatabaseUrl)
    }
}

/// User-entered percent per event code. Values are kept as entered so that
/// out-of-range input reaches validation instead of being clamped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeightConfig {
    percents: BTreeMap<EventCode, i64>,
}

impl WeightConfig {
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (EventCode, i64)>,
    {
        Self {
            percents: pairs.into_iter().collect(),
        }
    }

    /// Reads a JSON object such as `{"16": 60, "25": 40}`.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::WeightsFile {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw).map_err(|source| ConfigError::WeightsFormat {
            path: path.display().to_string(),
            source,
        })
    }

    fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        let percents: BTreeMap<EventCode, i64> = serde_json::from_str(raw)?;
        Ok(Self { percents })
    }

    pub fn set(&mut self, code: EventCode, percent: i64) {
        self.percents.insert(code, percent);
    }

    pub fn get(&self, code: EventCode) -> Option<i64> {
        self.percents.get(&code).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EventCode, i64)> + '_ {
        self.percents.iter().map(|(code, percent)| (*code, *percent))
    }

    /// Restricts the configuration to the offered codes, filling unset ones
    /// with 0. Returns the codes that were dropped.
    pub fn restrict_to(&self, offered: &[EventCode]) -> (WeightConfig, Vec<EventCode>) {
        let dropped = self
            .percents
            .keys()
            .copied()
            .filter(|code| !offered.contains(code))
            .collect();
        let restricted = WeightConfig::from_pairs(
            offered
                .iter()
                .map(|code| (*code, self.get(*code).unwrap_or(0))),
        );
        (restricted, dropped)
    }
}

/// Combines the weights file with `CODE=PERCENT` overrides (overrides win).
/// Returns `None` only when the user supplied neither.
pub fn assemble_weights(
    file: Option<&Path>,
    overrides: &[(EventCode, i64)],
) -> Result<Option<WeightConfig>, ConfigError> {
    if file.is_none() && overrides.is_empty() {
        return Ok(None);
    }

    let mut weights = match file {
        Some(path) => WeightConfig::from_json_file(path)?,
        None => WeightConfig::default(),
    };
    for (code, percent) in overrides {
        weights.set(*code, *percent);
    }
    Ok(Some(weights))
}

/// Parses a `CODE=PERCENT` command-line override.
pub fn parse_weight_override(raw: &str) -> Result<(EventCode, i64), ConfigError> {
    let invalid = || ConfigError::WeightOverride(raw.to_string());
    let (code, percent) = raw.split_once('=').ok_or_else(invalid)?;
    let code = code.trim().parse().map_err(|_| invalid())?;
    let percent = percent.trim().parse().map_err(|_| invalid())?;
    Ok((code, percent))
}
