//! Dispenser configuration.
//!
//! `DispenserSettings` is what a scene author writes (TOML or code);
//! `ClaimConfig` is the validated, immutable form the core runs on.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::warn;

use crate::campaign_window::{CampaignBoundary, CampaignWindow};
use crate::capabilities::{HttpError, ValidatedUrl};
use crate::event::{CampaignId, DispenserKey};
use crate::present::PresenterConfig;
use crate::{DEFAULT_COOLDOWN_MS, PRODUCTION_REWARDS_SERVER, TESTING_REWARDS_SERVER};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting '{field}'")]
    MissingField { field: &'static str },

    #[error("unparseable {field} '{value}', treating it as unconstrained")]
    InvalidDate { field: &'static str, value: String },

    #[error("invalid settings: {message}")]
    Parse { message: String },

    #[error("could not read settings from {path}: {message}")]
    Io { path: String, message: String },

    #[error("invalid rewards server: {0}")]
    InvalidServer(#[from] HttpError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Testing,
}

impl Environment {
    pub fn default_server(self) -> &'static str {
        match self {
            Environment::Production => PRODUCTION_REWARDS_SERVER,
            Environment::Testing => TESTING_REWARDS_SERVER,
        }
    }
}

fn default_cooldown_ms() -> u64 {
    DEFAULT_COOLDOWN_MS
}

/// Raw dispenser settings as authored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispenserSettings {
    pub campaign_id: String,
    pub dispenser_key: String,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub environment: Environment,
    /// Overrides the environment's rewards server.
    #[serde(default)]
    pub rewards_server: Option<String>,
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    #[serde(default)]
    pub presenter: PresenterConfig,
}

impl DispenserSettings {
    pub fn new(campaign_id: impl Into<String>, dispenser_key: impl Into<String>) -> Self {
        Self {
            campaign_id: campaign_id.into(),
            dispenser_key: dispenser_key.into(),
            start_date: None,
            end_date: None,
            environment: Environment::default(),
            rewards_server: None,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            presenter: PresenterConfig::default(),
        }
    }

    #[must_use]
    pub fn with_window(mut self, start: Option<&str>, end: Option<&str>) -> Self {
        self.start_date = start.map(str::to_string);
        self.end_date = end.map(str::to_string);
        self
    }

    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }
}

/// Validated configuration for one dispenser. Built once, never mutated.
///
/// The default value is the unconfigured core: claims fail until a
/// `Configured` event brings a real config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaimConfig {
    pub campaign_id: CampaignId,
    pub dispenser_key: DispenserKey,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub window: CampaignWindow,
    pub environment: Environment,
    pub rewards_server: String,
    pub cooldown_ms: u64,
    pub presenter: PresenterConfig,
}

impl ClaimConfig {
    /// Validates settings. Unparseable dates are logged and dropped; they
    /// never fail the build.
    pub fn from_settings(settings: DispenserSettings) -> Result<Self, ConfigError> {
        let campaign_id = settings.campaign_id.trim();
        if campaign_id.is_empty() {
            return Err(ConfigError::MissingField { field: "campaign_id" });
        }
        let dispenser_key = settings.dispenser_key.trim();
        if dispenser_key.is_empty() {
            return Err(ConfigError::MissingField { field: "dispenser_key" });
        }

        let rewards_server = settings
            .rewards_server
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| settings.environment.default_server())
            .trim_end_matches('/')
            .to_string();
        ValidatedUrl::new(rewards_server.as_str())?;

        let start = parse_boundary("start_date", settings.start_date.as_deref(), CampaignBoundary::parse_start);
        let end = parse_boundary("end_date", settings.end_date.as_deref(), CampaignBoundary::parse_end);

        Ok(Self {
            campaign_id: CampaignId::new(campaign_id),
            dispenser_key: DispenserKey::new(dispenser_key),
            start_date: settings.start_date,
            end_date: settings.end_date,
            window: CampaignWindow::new(start, end),
            environment: settings.environment,
            rewards_server,
            cooldown_ms: settings.cooldown_ms,
            presenter: settings.presenter,
        })
    }

    pub fn is_configured(&self) -> bool {
        !self.dispenser_key.as_str().is_empty()
    }

    pub fn claim_url(&self) -> Result<ValidatedUrl, HttpError> {
        match self.environment {
            Environment::Production => ValidatedUrl::with_query(
                &format!("{}/api/rewards", self.rewards_server),
                &[("campaign_id", self.campaign_id.as_str())],
            ),
            Environment::Testing => ValidatedUrl::new(format!(
                "{}/api/campaigns/{}/rewards",
                self.rewards_server,
                self.campaign_id
            )),
        }
    }

    pub fn captcha_url(&self) -> Result<ValidatedUrl, HttpError> {
        ValidatedUrl::new(format!("{}/api/captcha", self.rewards_server))
    }
}

fn parse_boundary(
    field: &'static str,
    raw: Option<&str>,
    parse: fn(&str) -> Option<CampaignBoundary>,
) -> Option<CampaignBoundary> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    let boundary = parse(raw);
    if boundary.is_none() {
        let err = ConfigError::InvalidDate {
            field,
            value: raw.to_string(),
        };
        warn!(field, value = raw, "{err}");
    }
    boundary
}
