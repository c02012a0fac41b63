use serde::{Deserialize, Serialize};
use std::fmt;

use crate::capabilities::{HttpReply, Identity, RealmInfo};
use crate::config::ClaimConfig;
use crate::UnixTimeMs;

// --- Typed IDs ---

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, Hash)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

typed_id!(CampaignId);
typed_id!(DispenserKey);
typed_id!(CaptchaId);
typed_id!(AttemptId);

impl AttemptId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

// --- Events ---

/// Everything that can move the claim state machine.
///
/// The first group comes from the shell and the UI; the shell stamps `now` on
/// the events that can start an attempt. The second group carries capability
/// results back into the core, each tagged with the attempt that asked for it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    Configured(ClaimConfig),
    ClaimRequested {
        now: UnixTimeMs,
    },
    CaptchaInputChanged(String),
    CaptchaSubmitted {
        answer: String,
        now: UnixTimeMs,
    },
    ToggleErrorDetails,
    Closed,

    IdentityResolved {
        attempt: AttemptId,
        identity: Option<Identity>,
    },
    RealmResolved {
        attempt: AttemptId,
        realm: Option<RealmInfo>,
    },
    ClaimResponded {
        attempt: AttemptId,
        reply: HttpReply,
    },
    CaptchaFetched {
        attempt: AttemptId,
        reply: HttpReply,
    },
}

impl Event {
    /// The attempt an effect result belongs to. `None` for UI events.
    pub fn attempt(&self) -> Option<&AttemptId> {
        match self {
            Event::IdentityResolved { attempt, .. }
            | Event::RealmResolved { attempt, .. }
            | Event::ClaimResponded { attempt, .. }
            | Event::CaptchaFetched { attempt, .. } => Some(attempt),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Event::Configured(_) => "configured",
            Event::ClaimRequested { .. } => "claim_requested",
            Event::CaptchaInputChanged(_) => "captcha_input_changed",
            Event::CaptchaSubmitted { .. } => "captcha_submitted",
            Event::ToggleErrorDetails => "toggle_error_details",
            Event::Closed => "closed",
            Event::IdentityResolved { .. } => "identity_resolved",
            Event::RealmResolved { .. } => "realm_resolved",
            Event::ClaimResponded { .. } => "claim_responded",
            Event::CaptchaFetched { .. } => "captcha_fetched",
        }
    }
}
