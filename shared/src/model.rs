use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::campaign_window::CampaignBoundary;
use crate::capabilities::Identity;
use crate::config::ClaimConfig;
use crate::event::{AttemptId, CaptchaId, DispenserKey};
use crate::present::ErrorPresenter;
use crate::UnixTimeMs;

/// A failure ready for the panel: bounded `display` text plus the optional
/// full text behind "see details".
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PrettyError {
    pub display: String,
    pub details: Option<String>,
}

impl PrettyError {
    pub fn plain(display: impl Into<String>) -> Self {
        Self {
            display: display.into(),
            details: None,
        }
    }

    pub fn with_details(display: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            display: display.into(),
            details: Some(details.into()),
        }
    }

    pub fn has_details(&self) -> bool {
        self.details.as_deref().is_some_and(|d| !d.is_empty())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CaptchaChallenge {
    pub id: CaptchaId,
    pub image_url: String,
    /// What the player has typed so far.
    pub user_input: String,
}

/// Where the panel is. The captcha challenge only exists inside
/// `CaptchaRequired`, so a stale challenge cannot outlive its screen.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub enum ClaimState {
    #[default]
    Idle,
    Waiting,
    CaptchaRequired {
        challenge: CaptchaChallenge,
    },
    Error {
        error: PrettyError,
    },
    CampaignNotStarted {
        starts_at: CampaignBoundary,
    },
    CampaignEnded {
        ended_at: CampaignBoundary,
    },
    /// Server says inactive and the local window has no better explanation.
    CampaignClosed,
    OutOfStock,
    AlreadyClaimed,
    Success {
        thumbnail_url: String,
    },
}

impl ClaimState {
    pub fn name(&self) -> &'static str {
        match self {
            ClaimState::Idle => "idle",
            ClaimState::Waiting => "waiting",
            ClaimState::CaptchaRequired { .. } => "captcha_required",
            ClaimState::Error { .. } => "error",
            ClaimState::CampaignNotStarted { .. } => "campaign_not_started",
            ClaimState::CampaignEnded { .. } => "campaign_ended",
            ClaimState::CampaignClosed => "campaign_closed",
            ClaimState::OutOfStock => "out_of_stock",
            ClaimState::AlreadyClaimed => "already_claimed",
            ClaimState::Success { .. } => "success",
        }
    }

    pub fn challenge(&self) -> Option<&CaptchaChallenge> {
        match self {
            ClaimState::CaptchaRequired { challenge } => Some(challenge),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&PrettyError> {
        match self {
            ClaimState::Error { error } => Some(error),
            _ => None,
        }
    }
}

/// The business result of the latest attempt.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Success { thumbnail_url: String },
    AlreadyClaimed,
    OutOfStock,
    CampaignNotStarted { boundary: CampaignBoundary },
    CampaignEnded { boundary: CampaignBoundary },
    CampaignClosedGeneric,
    CaptchaRequired { id: CaptchaId, image_url: String },
    Error { raw: String },
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptPhase {
    ResolvingIdentity,
    ResolvingRealm,
    Claiming,
    FetchingCaptcha,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CaptchaAnswer {
    pub id: CaptchaId,
    pub value: String,
}

/// The in-flight claim. Results tagged with any other id are stale.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Attempt {
    pub id: AttemptId,
    pub phase: AttemptPhase,
    pub captcha: Option<CaptchaAnswer>,
    /// When the player asked. Cooldown and campaign window are measured from here.
    pub started_at: UnixTimeMs,
    /// The catalyst sent with the claim is loopback or LAN.
    pub local_catalyst: bool,
}

impl Attempt {
    pub fn new(phase: AttemptPhase, captcha: Option<CaptchaAnswer>, started_at: UnixTimeMs) -> Self {
        Self {
            id: AttemptId::generate(),
            phase,
            captcha,
            started_at,
            local_catalyst: false,
        }
    }
}

/// Mutable per-dispenser session. Only the core writes it.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ClaimSession {
    pub state: ClaimState,
    pub claimed_keys: HashSet<DispenserKey>,
    pub cooldown_until: Option<UnixTimeMs>,
    pub identity: Option<Identity>,
    pub attempt: Option<Attempt>,
    pub last_outcome: Option<Outcome>,
    pub show_error_details: bool,
}

impl ClaimSession {
    pub fn is_cooling_down(&self, now: UnixTimeMs) -> bool {
        self.cooldown_until.is_some_and(|until| now.is_before(until))
    }

    pub fn has_claimed(&self, key: &DispenserKey) -> bool {
        self.claimed_keys.contains(key)
    }

    pub fn in_flight(&self) -> bool {
        self.attempt.is_some()
    }

    pub fn is_live(&self, attempt: &AttemptId) -> bool {
        self.attempt.as_ref().is_some_and(|a| &a.id == attempt)
    }

    pub fn live_attempt_mut(&mut self, attempt: &AttemptId) -> Option<&mut Attempt> {
        self.attempt.as_mut().filter(|a| &a.id == attempt)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Model {
    pub config: ClaimConfig,
    pub session: ClaimSession,
    pub presenter: ErrorPresenter,
}

impl Model {
    pub fn new(config: ClaimConfig) -> Self {
        let mut model = Self::default();
        model.configure(config);
        model
    }

    /// Swaps in a new dispenser config. Keys already claimed stay claimed.
    pub fn configure(&mut self, config: ClaimConfig) {
        self.presenter = ErrorPresenter::new(config.presenter.clone());
        self.config = config;
        self.session = ClaimSession {
            claimed_keys: std::mem::take(&mut self.session.claimed_keys),
            ..ClaimSession::default()
        };
    }
}
