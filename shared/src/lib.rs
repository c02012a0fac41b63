// lib.rs - Reward dispenser claim core

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod app;
pub mod campaign_window;
pub mod capabilities;
pub mod classify;
pub mod config;
pub mod controller;
pub mod event;
pub mod host;
pub mod model;
pub mod present;
pub mod text;

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub use app::{App, ViewModel, ViewState};
pub use capabilities::{Capabilities, Effect};
pub use config::{ClaimConfig, DispenserSettings};
pub use controller::{ClaimController, Collaborators};
pub use crux_core::{App as CruxApp, Core};
pub use event::Event;
pub use model::{ClaimState, Model, Outcome, PrettyError};

pub const DEFAULT_COOLDOWN_MS: u64 = 3000;
pub const PRODUCTION_REWARDS_SERVER: &str = "https://rewards.decentraland.org";
pub const TESTING_REWARDS_SERVER: &str = "https://rewards.decentraland.zone";
pub const CLAIM_TIMEOUT: Duration = Duration::from_secs(30);
pub const CAPTCHA_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Configuration,
    Identity,
    Transport,
    Protocol,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Configuration => "CONFIGURATION_ERROR",
            Self::Identity => "IDENTITY_ERROR",
            Self::Transport => "TRANSPORT_ERROR",
            Self::Protocol => "PROTOCOL_ERROR",
        }
    }
}

/// Failures that end a claim attempt before a business outcome is known.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClaimError {
    #[error("{0}")]
    Configuration(#[from] config::ConfigError),

    #[error("{0}")]
    Identity(String),

    #[error("Error fetching reward server. {0}")]
    Transport(String),

    #[error("{0}")]
    Protocol(String),
}

impl ClaimError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Identity(_) => ErrorKind::Identity,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Protocol(_) => ErrorKind::Protocol,
        }
    }

    /// Text handed to the error presenter. Never shown to players verbatim.
    #[must_use]
    pub fn raw_text(&self) -> String {
        self.to_string()
    }
}

#[must_use]
pub fn get_current_time_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnixTimeMs(pub u64);

impl UnixTimeMs {
    #[must_use]
    pub fn now() -> Self {
        Self(get_current_time_ms())
    }

    /// Signed view for comparisons against calendar instants, which may predate the epoch.
    #[must_use]
    pub fn as_signed_millis(self) -> i64 {
        i64::try_from(self.0).unwrap_or(i64::MAX)
    }

    #[must_use]
    pub fn add_millis(self, ms: u64) -> Self {
        Self(self.0.saturating_add(ms))
    }

    #[must_use]
    pub fn is_before(self, other: Self) -> bool {
        self.0 < other.0
    }
}

/// Source of "now" for the shell. The core itself never reads a clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> UnixTimeMs;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> UnixTimeMs {
        UnixTimeMs::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod time_tests {
        use super::*;

        #[test]
        fn test_add_millis_saturates() {
            assert_eq!(UnixTimeMs(u64::MAX - 1).add_millis(10), UnixTimeMs(u64::MAX));
            assert_eq!(UnixTimeMs(1_000).add_millis(3_000), UnixTimeMs(4_000));
        }

        #[test]
        fn test_ordering_helpers() {
            let earlier = UnixTimeMs(1_000);
            let later = UnixTimeMs(2_000);
            assert!(earlier.is_before(later));
            assert!(!later.is_before(earlier));
            assert!(!earlier.is_before(earlier));
        }

        #[test]
        fn test_default_is_epoch() {
            assert_eq!(UnixTimeMs::default(), UnixTimeMs(0));
        }

        #[test]
        fn test_signed_millis() {
            assert_eq!(UnixTimeMs(42).as_signed_millis(), 42);
            assert_eq!(UnixTimeMs(u64::MAX).as_signed_millis(), i64::MAX);
        }
    }

    mod error_tests {
        use super::*;
        use crate::config::ConfigError;

        #[test]
        fn test_error_kinds() {
            let transport = ClaimError::Transport("connection reset".into());
            assert_eq!(transport.kind(), ErrorKind::Transport);
            assert_eq!(transport.kind().code(), "TRANSPORT_ERROR");

            let identity = ClaimError::Identity("no wallet".into());
            assert_eq!(identity.kind(), ErrorKind::Identity);

            let config = ClaimError::from(ConfigError::MissingField { field: "dispenser_key" });
            assert_eq!(config.kind().code(), "CONFIGURATION_ERROR");
        }

        #[test]
        fn test_transport_raw_text_is_prefixed() {
            let err = ClaimError::Transport("HTTP 400: bad request".into());
            assert_eq!(
                err.raw_text(),
                "Error fetching reward server. HTTP 400: bad request"
            );
        }
    }
}
