//! The claim state machine.
//!
//! `App` is a crux app: `update` reads an event, mutates the model and asks
//! the shell for work through [`Capabilities`]. No clock reads, no I/O; time
//! arrives on the events the shell stamps.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::campaign_window::WindowCheck;
use crate::capabilities::{Capabilities, HttpReply, Identity, RealmInfo};
use crate::classify::{self, Verdict};
use crate::config::ConfigError;
use crate::event::{AttemptId, CaptchaId, Event};
use crate::model::{
    Attempt, AttemptPhase, CaptchaAnswer, CaptchaChallenge, ClaimState, Model, Outcome, PrettyError,
};
use crate::present::LOCAL_PREVIEW_HINT;
use crate::text;
use crate::{ClaimError, UnixTimeMs};

pub const WALLET_REQUIRED: &str = "You must be connected with an Ethereum wallet to claim rewards.";
pub const CAPTCHA_EMPTY: &str = "Please complete the captcha.";
pub const CAPTCHA_EXPIRED: &str = "Captcha session expired. Please try again.";
pub const CAPTCHA_UNAVAILABLE: &str = "Captcha could not be loaded. Please try again.";
pub const CAPTCHA_LOAD_FAILED: &str = "Captcha could not be loaded. ";
pub const INVALID_RESPONSE: &str = "Error fetching reward server.\nInvalid response.";

const MARKETPLACE_HINT: &str = "You can check the marketplace to see if it's available for sale.";
const HIGHLIGHT: &str = "#FE9F5A";

#[derive(Serialize)]
struct ClaimBody<'a> {
    campaign_key: &'a str,
    catalyst: &'a str,
    beneficiary: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    captcha_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    captcha_value: Option<&'a str>,
}

#[derive(Default)]
pub struct App;

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        if let Some(attempt) = event.attempt() {
            if !model.session.is_live(attempt) {
                debug!(event = event.name(), %attempt, "discarding result of superseded attempt");
                record_superseded_claim(&event, model);
                return;
            }
        }

        match event {
            Event::Configured(config) => {
                info!(campaign_id = %config.campaign_id, dispenser_key = %config.dispenser_key, "dispenser configured");
                model.configure(config);
                caps.render.render();
            }
            Event::ClaimRequested { now } => self.request_claim(model, now, caps),
            Event::CaptchaInputChanged(input) => {
                if let ClaimState::CaptchaRequired { challenge } = &mut model.session.state {
                    challenge.user_input = input;
                    caps.render.render();
                }
            }
            Event::CaptchaSubmitted { answer, now } => self.submit_captcha(model, &answer, now, caps),
            Event::ToggleErrorDetails => {
                let has_details = model.session.state.error().is_some_and(PrettyError::has_details);
                if has_details {
                    model.session.show_error_details = !model.session.show_error_details;
                    caps.render.render();
                }
            }
            Event::Closed => {
                model.session.attempt = None;
                model.session.show_error_details = false;
                model.session.state = ClaimState::Idle;
                info!("claim panel closed");
                caps.render.render();
            }
            Event::IdentityResolved { attempt, identity } => {
                self.identity_resolved(model, attempt, identity, caps);
            }
            Event::RealmResolved { attempt, realm } => self.realm_resolved(model, attempt, realm, caps),
            Event::ClaimResponded { reply, .. } => self.claim_responded(model, reply, caps),
            Event::CaptchaFetched { reply, .. } => self.captcha_fetched(model, reply, caps),
        }
    }

    fn view(&self, model: &Model) -> ViewModel {
        let session = &model.session;
        let outcome = session.last_outcome.clone();
        let base = ViewModel {
            outcome,
            ..ViewModel::default()
        };

        match &session.state {
            ClaimState::Idle => base,
            ClaimState::Waiting => ViewModel {
                state: ViewState::Waiting,
                visible: true,
                title: "<b>Preparing your reward.</b>".into(),
                description: "Please wait and do not leave the scene.".into(),
                ..base
            },
            ClaimState::CaptchaRequired { challenge } => ViewModel {
                state: ViewState::Captcha,
                visible: true,
                title: "<b>Solve the captcha</b>".into(),
                description: "Type the main characters shown in the image.".into(),
                captcha: Some(CaptchaView {
                    image_url: challenge.image_url.clone(),
                    input: challenge.user_input.clone(),
                }),
                ..base
            },
            ClaimState::Error { error } => {
                let view = ErrorView::new(error, session.show_error_details);
                ViewModel {
                    state: ViewState::Error,
                    visible: true,
                    title: view.title.clone(),
                    description: if view.showing_details {
                        view.details.clone().unwrap_or_default()
                    } else {
                        view.body.clone().unwrap_or_default()
                    },
                    error: Some(view),
                    ..base
                }
            }
            ClaimState::CampaignNotStarted { starts_at } => ViewModel {
                state: ViewState::CampaignNotStarted,
                visible: true,
                title: "<b>You're a bit early!</b>".into(),
                description: format!(
                    "<b>Claim this reward <color={HIGHLIGHT}>{}</color> \nstarting at <color={HIGHLIGHT}>{}</color></b>",
                    starts_at.month_day(),
                    starts_at.clock_time()
                ),
                ..base
            },
            ClaimState::CampaignEnded { ended_at } => ViewModel {
                state: ViewState::CampaignEnded,
                visible: true,
                title: "<b>You just missed it!</b>".into(),
                description: format!(
                    "<b>This campaign ended on \n<color={HIGHLIGHT}>{} {}</color>\n\n{MARKETPLACE_HINT}</b>",
                    ended_at.month_day(),
                    ended_at.clock_time()
                ),
                ..base
            },
            ClaimState::CampaignClosed => ViewModel {
                state: ViewState::CampaignEnded,
                visible: true,
                title: "<b>Campaign ended!</b>".into(),
                description: format!(
                    "<b>This reward dispenser is closed at this moment.\n\n{MARKETPLACE_HINT}</b>"
                ),
                ..base
            },
            ClaimState::OutOfStock => ViewModel {
                state: ViewState::CampaignEnded,
                visible: true,
                title: "<b>You just missed it!</b>".into(),
                description: format!("<b>Sorry, we are out of stock for this reward.\n\n{MARKETPLACE_HINT}</b>"),
                ..base
            },
            ClaimState::AlreadyClaimed => ViewModel {
                state: ViewState::AlreadyClaimed,
                visible: true,
                title: "<b>Check your backpack!</b>".into(),
                description: "<b>You already claimed this \nReward!</b>".into(),
                ..base
            },
            ClaimState::Success { thumbnail_url } => ViewModel {
                state: ViewState::Success,
                visible: true,
                title: "<b>Reward Incoming!</b>".into(),
                description: "It will arrive in your backpack in a few minutes.".into(),
                thumbnail_url: Some(thumbnail_url.clone()),
                ..base
            },
        }
    }
}

impl App {
    fn request_claim(&self, model: &mut Model, now: UnixTimeMs, caps: &Capabilities) {
        let session = &mut model.session;
        if session.is_cooling_down(now) {
            debug!(until = ?session.cooldown_until, "claim ignored during cooldown");
            return;
        }
        if session.in_flight() {
            debug!("claim ignored while an attempt is in flight");
            return;
        }

        if matches!(session.state, ClaimState::CaptchaRequired { .. }) {
            session.state = ClaimState::Idle;
        }

        if !model.config.is_configured() {
            warn!("claim requested before the dispenser was configured");
            let error = ClaimError::from(ConfigError::MissingField { field: "dispenser_key" });
            return fail(model, &error, caps);
        }

        if model.session.has_claimed(&model.config.dispenser_key) {
            return settle(model, ClaimState::AlreadyClaimed, Outcome::AlreadyClaimed, caps);
        }

        match model.config.window.check(now) {
            WindowCheck::NotStarted(boundary) => {
                return settle(
                    model,
                    ClaimState::CampaignNotStarted { starts_at: boundary },
                    Outcome::CampaignNotStarted { boundary },
                    caps,
                );
            }
            WindowCheck::Ended(boundary) => {
                return settle(
                    model,
                    ClaimState::CampaignEnded { ended_at: boundary },
                    Outcome::CampaignEnded { boundary },
                    caps,
                );
            }
            WindowCheck::Open => {}
        }

        let attempt = Attempt::new(AttemptPhase::ResolvingIdentity, None, now);
        let id = attempt.id.clone();
        model.session.attempt = Some(attempt);
        debug!(attempt = %id, "claim attempt started");
        caps.profile
            .current_identity(move |identity| Event::IdentityResolved { attempt: id, identity });
    }

    fn submit_captcha(&self, model: &mut Model, answer: &str, now: UnixTimeMs, caps: &Capabilities) {
        if model.session.in_flight() {
            debug!("captcha answer ignored while an attempt is in flight");
            return;
        }

        let challenge = match &model.session.state {
            ClaimState::CaptchaRequired { challenge } => challenge.clone(),
            _ => return fail_local(model, CAPTCHA_EXPIRED, caps),
        };

        let value = answer.trim();
        if value.is_empty() {
            return fail_local(model, CAPTCHA_EMPTY, caps);
        }

        let has_identity = model.session.identity.is_some();
        let phase = if has_identity {
            AttemptPhase::ResolvingRealm
        } else {
            AttemptPhase::ResolvingIdentity
        };
        let attempt = Attempt::new(
            phase,
            Some(CaptchaAnswer {
                id: challenge.id,
                value: value.to_string(),
            }),
            now,
        );
        let id = attempt.id.clone();

        model.session.attempt = Some(attempt);
        model.session.state = ClaimState::Waiting;
        model.session.show_error_details = false;
        info!(attempt = %id, "captcha answer submitted");
        caps.render.render();

        if has_identity {
            caps.realm
                .current_realm(move |realm| Event::RealmResolved { attempt: id, realm });
        } else {
            caps.profile
                .current_identity(move |identity| Event::IdentityResolved { attempt: id, identity });
        }
    }

    fn identity_resolved(
        &self,
        model: &mut Model,
        attempt: AttemptId,
        identity: Option<Identity>,
        caps: &Capabilities,
    ) {
        let Some(identity) = identity.filter(Identity::can_claim) else {
            warn!("claim rejected: no connected wallet");
            return fail(model, &ClaimError::Identity(WALLET_REQUIRED.to_string()), caps);
        };

        let cooldown_ms = model.config.cooldown_ms;
        let session = &mut model.session;
        let Some(live) = session.live_attempt_mut(&attempt) else {
            return;
        };
        live.phase = AttemptPhase::ResolvingRealm;
        let started_at = live.started_at;

        session.identity = Some(identity);
        session.cooldown_until = Some(started_at.add_millis(cooldown_ms));
        session.state = ClaimState::Waiting;
        session.show_error_details = false;
        info!(state = "waiting", "claim in progress");

        caps.render.render();
        caps.realm
            .current_realm(move |realm| Event::RealmResolved { attempt, realm });
    }

    fn realm_resolved(
        &self,
        model: &mut Model,
        attempt: AttemptId,
        realm: Option<RealmInfo>,
        caps: &Capabilities,
    ) {
        let Some(identity) = model.session.identity.clone() else {
            return fail(model, &ClaimError::Identity(WALLET_REQUIRED.to_string()), caps);
        };

        let url = match model.config.claim_url() {
            Ok(url) => url,
            Err(e) => return fail(model, &ClaimError::from(ConfigError::from(e)), caps),
        };

        let realm = realm.unwrap_or_default();
        let catalyst = realm.catalyst();
        let local_catalyst = realm.is_local_preview();
        let beneficiary = identity.beneficiary();
        let captcha = model
            .session
            .attempt
            .as_ref()
            .and_then(|a| a.captcha.clone())
            .filter(|c| !c.id.as_str().is_empty() && !c.value.is_empty());

        let body = ClaimBody {
            campaign_key: model.config.dispenser_key.as_str(),
            catalyst: &catalyst,
            beneficiary: &beneficiary,
            captcha_id: captcha.as_ref().map(|c| c.id.as_str()),
            captcha_value: captcha.as_ref().map(|c| c.value.as_str()),
        };
        let body = match serde_json::to_vec(&body) {
            Ok(body) => body,
            Err(e) => return fail(model, &ClaimError::Protocol(e.to_string()), caps),
        };

        if let Some(live) = model.session.live_attempt_mut(&attempt) {
            live.phase = AttemptPhase::Claiming;
            live.local_catalyst = local_catalyst;
        }
        debug!(%catalyst, local_catalyst, with_captcha = captcha.is_some(), "sending claim");

        caps.http
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .body(body)
            .send(move |result| Event::ClaimResponded {
                attempt: attempt.clone(),
                reply: HttpReply::from(result),
            });
    }

    fn claim_responded(&self, model: &mut Model, reply: HttpReply, caps: &Capabilities) {
        let (local_catalyst, started_at) = model
            .session
            .attempt
            .as_ref()
            .map_or((false, UnixTimeMs::default()), |a| (a.local_catalyst, a.started_at));

        let (status, body) = match reply {
            HttpReply::Answered { status, body } => (status, body),
            HttpReply::Failed { message } => {
                warn!(error = %message, "claim request failed");
                if local_catalyst && message.contains("400") {
                    return fail_with(model, LOCAL_PREVIEW_HINT, true, caps);
                }
                return fail(model, &ClaimError::Transport(message), caps);
            }
        };

        if local_catalyst && status == 400 {
            warn!(status, "rewards server rejected a local preview claim");
            return fail_with(model, LOCAL_PREVIEW_HINT, true, caps);
        }

        if body.trim().is_empty() {
            warn!(status, "empty claim response");
            let raw = if local_catalyst { LOCAL_PREVIEW_HINT } else { INVALID_RESPONSE };
            return fail_with(model, raw, true, caps);
        }

        let verdict = classify::classify(&body);
        info!(verdict = verdict_name(&verdict), status, "claim response classified");
        self.apply_verdict(model, verdict, started_at, caps);
    }

    fn apply_verdict(&self, model: &mut Model, verdict: Verdict, started_at: UnixTimeMs, caps: &Capabilities) {
        match verdict {
            Verdict::CaptchaRequired => self.fetch_captcha(model, caps),
            Verdict::OutOfStock => settle(model, ClaimState::OutOfStock, Outcome::OutOfStock, caps),
            Verdict::AlreadyClaimed => {
                let key = model.config.dispenser_key.clone();
                model.session.claimed_keys.insert(key);
                settle(model, ClaimState::AlreadyClaimed, Outcome::AlreadyClaimed, caps);
            }
            Verdict::InactiveCampaign => match model.config.window.check(started_at) {
                WindowCheck::NotStarted(boundary) => settle(
                    model,
                    ClaimState::CampaignNotStarted { starts_at: boundary },
                    Outcome::CampaignNotStarted { boundary },
                    caps,
                ),
                WindowCheck::Ended(boundary) => settle(
                    model,
                    ClaimState::CampaignEnded { ended_at: boundary },
                    Outcome::CampaignEnded { boundary },
                    caps,
                ),
                WindowCheck::Open => settle(
                    model,
                    ClaimState::CampaignClosed,
                    Outcome::CampaignClosedGeneric,
                    caps,
                ),
            },
            Verdict::Success { image } => {
                let key = model.config.dispenser_key.clone();
                model.session.claimed_keys.insert(key);
                settle(
                    model,
                    ClaimState::Success {
                        thumbnail_url: image.clone(),
                    },
                    Outcome::Success {
                        thumbnail_url: image.clone(),
                    },
                    caps,
                );
                caps.activation.reward_claimed(image);
            }
            Verdict::Error(raw) => {
                warn!(raw_len = raw.len(), "unrecognized claim response");
                fail(model, &ClaimError::Protocol(raw), caps);
            }
        }
    }

    fn fetch_captcha(&self, model: &mut Model, caps: &Capabilities) {
        let url = match model.config.captcha_url() {
            Ok(url) => url,
            Err(e) => return fail_local(model, &format!("{CAPTCHA_LOAD_FAILED}{e}"), caps),
        };
        let Some(attempt) = model.session.attempt.as_mut() else {
            return;
        };
        attempt.phase = AttemptPhase::FetchingCaptcha;
        let id = attempt.id.clone();
        debug!(attempt = %id, "fetching captcha challenge");

        caps.http.post(url.as_str()).send(move |result| Event::CaptchaFetched {
            attempt: id.clone(),
            reply: HttpReply::from(result),
        });
    }

    fn captcha_fetched(&self, model: &mut Model, reply: HttpReply, caps: &Capabilities) {
        let parsed = match reply {
            HttpReply::Answered { body, .. } => serde_json::from_str::<Value>(&body)
                .map_err(|e| format!("failed to parse JSON: {e}")),
            HttpReply::Failed { message } => Err(message),
        };
        let body = match parsed {
            Ok(body) => body,
            Err(message) => {
                warn!(error = %message, "captcha fetch failed");
                return fail_local(model, &format!("{CAPTCHA_LOAD_FAILED}{message}"), caps);
            }
        };

        let data = body.get("data");
        let id = data.and_then(|d| d.get("id")).and_then(value_text);
        let image = data.and_then(|d| d.get("image")).and_then(value_text);
        let (Some(id), Some(image_url)) = (id, image) else {
            warn!("captcha response missing id or image");
            return fail_local(model, CAPTCHA_UNAVAILABLE, caps);
        };

        let id = CaptchaId::new(id);
        settle(
            model,
            ClaimState::CaptchaRequired {
                challenge: CaptchaChallenge {
                    id: id.clone(),
                    image_url: image_url.clone(),
                    user_input: String::new(),
                },
            },
            Outcome::CaptchaRequired { id, image_url },
            caps,
        );
    }
}

/// A superseded answer can still prove the reward is ours.
fn record_superseded_claim(event: &Event, model: &mut Model) {
    let Event::ClaimResponded {
        reply: HttpReply::Answered { body, .. },
        ..
    } = event
    else {
        return;
    };
    let confirmed = matches!(
        classify::classify(body),
        Verdict::Success { .. } | Verdict::AlreadyClaimed
    );
    if confirmed {
        let key = model.config.dispenser_key.clone();
        model.session.claimed_keys.insert(key);
    }
}

fn settle(model: &mut Model, state: ClaimState, outcome: Outcome, caps: &Capabilities) {
    info!(state = state.name(), "claim state changed");
    let session = &mut model.session;
    session.attempt = None;
    session.show_error_details = false;
    session.state = state;
    session.last_outcome = Some(outcome);
    caps.render.render();
}

fn fail(model: &mut Model, error: &ClaimError, caps: &Capabilities) {
    debug!(kind = error.kind().code(), "claim failed");
    fail_with(model, &error.raw_text(), false, caps);
}

fn fail_local(model: &mut Model, message: &str, caps: &Capabilities) {
    fail_with(model, message, false, caps);
}

fn fail_with(model: &mut Model, raw: &str, override_heuristics: bool, caps: &Capabilities) {
    let error = model.presenter.present(raw, override_heuristics);
    settle(
        model,
        ClaimState::Error { error },
        Outcome::Error { raw: raw.to_string() },
        caps,
    );
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn verdict_name(verdict: &Verdict) -> &'static str {
    match verdict {
        Verdict::Success { .. } => "success",
        Verdict::OutOfStock => "out_of_stock",
        Verdict::AlreadyClaimed => "already_claimed",
        Verdict::CaptchaRequired => "captcha_required",
        Verdict::InactiveCampaign => "inactive_campaign",
        Verdict::Error(_) => "error",
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub enum ViewState {
    #[default]
    Hidden,
    Waiting,
    Captcha,
    Error,
    CampaignNotStarted,
    /// Also used for out-of-stock and generically closed campaigns.
    CampaignEnded,
    AlreadyClaimed,
    Success,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct CaptchaView {
    pub image_url: String,
    pub input: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorView {
    pub display: String,
    pub title: String,
    pub body: Option<String>,
    pub details: Option<String>,
    pub can_show_details: bool,
    pub showing_details: bool,
}

impl ErrorView {
    fn new(error: &PrettyError, show_details: bool) -> Self {
        let (title, body) = text::split_title_and_body(&error.display);
        let can_show_details = error.has_details();
        Self {
            display: error.display.clone(),
            title,
            body,
            details: error.details.clone(),
            can_show_details,
            showing_details: can_show_details && show_details,
        }
    }
}

/// Everything the panel needs to draw itself.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ViewModel {
    pub state: ViewState,
    pub visible: bool,
    pub title: String,
    pub description: String,
    pub error: Option<ErrorView>,
    pub captcha: Option<CaptchaView>,
    pub thumbnail_url: Option<String>,
    pub outcome: Option<Outcome>,
}
