//! The shell around the crux core.
//!
//! The controller owns a `Core<Effect, App>`, stamps user events with the
//! clock and performs every effect the core asks for against the host's
//! collaborators. The core's model lock is never held across a collaborator
//! call, so `close()` can land while a claim is in flight; the attempt id on
//! every result decides whether it still counts.

use std::collections::VecDeque;
use std::sync::Arc;

use crux_core::Core;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::app::{App, ViewModel};
use crate::capabilities::{
    into_protocol, Capabilities, Effect, HttpError, HttpTransport, IdentityProvider, RealmProvider, RequestKind,
    TransportRequest, TransportResult,
};
use crate::config::{ClaimConfig, DispenserSettings};
use crate::event::{CampaignId, DispenserKey, Event};
use crate::{ClaimError, Clock, SystemClock};

type SuccessHook = Arc<dyn Fn() + Send + Sync>;

/// What the host plugs into the shell.
#[derive(Clone)]
pub struct Collaborators {
    http: Arc<dyn HttpTransport>,
    identity: Arc<dyn IdentityProvider>,
    realm: Arc<dyn RealmProvider>,
    clock: Arc<dyn Clock>,
}

impl Collaborators {
    pub fn new(
        http: Arc<dyn HttpTransport>,
        identity: Arc<dyn IdentityProvider>,
        realm: Arc<dyn RealmProvider>,
    ) -> Self {
        Self {
            http,
            identity,
            realm,
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_http(mut self, http: Arc<dyn HttpTransport>) -> Self {
        self.http = http;
        self
    }

    #[must_use]
    pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = identity;
        self
    }
}

pub struct ClaimController {
    core: Core<Effect, App>,
    collaborators: Collaborators,
    captcha_url: Option<String>,
    view_tx: watch::Sender<ViewModel>,
    on_success: Option<SuccessHook>,
    campaign_id: CampaignId,
    dispenser_key: DispenserKey,
}

impl ClaimController {
    pub fn new(config: ClaimConfig, collaborators: Collaborators) -> Self {
        let campaign_id = config.campaign_id.clone();
        let dispenser_key = config.dispenser_key.clone();
        let captcha_url = config.captcha_url().ok().map(|url| url.as_str().to_string());

        let core: Core<Effect, App> = Core::new::<Capabilities>();
        // Configuring only renders, and nobody is subscribed yet.
        drop(core.process_event(Event::Configured(config)));
        let (view_tx, _) = watch::channel(core.view());

        info!(%campaign_id, %dispenser_key, "claim controller ready");

        Self {
            core,
            collaborators,
            captcha_url,
            view_tx,
            on_success: None,
            campaign_id,
            dispenser_key,
        }
    }

    pub fn from_settings(settings: DispenserSettings, collaborators: Collaborators) -> Result<Self, ClaimError> {
        let config = ClaimConfig::from_settings(settings)?;
        Ok(Self::new(config, collaborators))
    }

    /// Runs after a successful claim, once the success view is published.
    #[must_use]
    pub fn with_on_success(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(hook));
        self
    }

    pub async fn request_claim(&self) {
        let now = self.collaborators.clock.now();
        self.dispatch(Event::ClaimRequested { now }).await;
    }

    pub async fn submit_captcha(&self, answer: impl Into<String>) {
        let now = self.collaborators.clock.now();
        self.dispatch(Event::CaptchaSubmitted {
            answer: answer.into(),
            now,
        })
        .await;
    }

    pub async fn set_captcha_input(&self, input: impl Into<String>) {
        self.dispatch(Event::CaptchaInputChanged(input.into())).await;
    }

    pub async fn toggle_error_details(&self) {
        self.dispatch(Event::ToggleErrorDetails).await;
    }

    /// Hides the panel. Anything still in flight is discarded when it lands.
    pub async fn close(&self) {
        self.dispatch(Event::Closed).await;
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewModel> {
        self.view_tx.subscribe()
    }

    /// The last published view.
    pub fn view(&self) -> ViewModel {
        self.view_tx.borrow().clone()
    }

    /// Feeds one event through the core, then performs every effect it
    /// produces, including the ones resolving earlier effects yields, until
    /// the queue drains.
    #[instrument(skip(self, event), fields(campaign_id = %self.campaign_id, dispenser_key = %self.dispenser_key))]
    pub async fn dispatch(&self, event: Event) {
        debug!(event = event.name(), "update");
        let mut queue = VecDeque::from(self.core.process_event(event));

        while let Some(effect) = queue.pop_front() {
            queue.extend(self.perform(effect).await);
        }
    }

    async fn perform(&self, effect: Effect) -> Vec<Effect> {
        debug!(effect = effect_name(&effect), "perform");
        match effect {
            Effect::Render(_) => {
                self.view_tx.send_replace(self.core.view());
                Vec::new()
            }
            Effect::Profile(mut request) => {
                let identity = self.collaborators.identity.current_identity().await;
                self.core.resolve(&mut request, identity)
            }
            Effect::Realm(mut request) => {
                let realm = self.collaborators.realm.current_realm().await;
                self.core.resolve(&mut request, realm)
            }
            Effect::Http(mut request) => {
                let kind = self.request_kind(&request.operation.url);
                let outgoing = TransportRequest::from_protocol(&request.operation, kind);
                let result = self.execute(outgoing).await;
                self.core.resolve(&mut request, into_protocol(result))
            }
            Effect::Activation(_) => {
                if let Some(hook) = &self.on_success {
                    hook();
                }
                Vec::new()
            }
        }
    }

    fn request_kind(&self, url: &str) -> RequestKind {
        if self.captcha_url.as_deref() == Some(url) {
            RequestKind::Captcha
        } else {
            RequestKind::Claim
        }
    }

    /// Sends a request, bounded by its own timeout whatever the transport does.
    async fn execute(&self, request: TransportRequest) -> TransportResult {
        let timeout = request.timeout();
        match tokio::time::timeout(timeout, self.collaborators.http.execute(request)).await {
            Ok(result) => result,
            Err(_) => {
                let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(timeout_ms, "request timed out");
                Err(HttpError::Timeout { timeout_ms })
            }
        }
    }
}

fn effect_name(effect: &Effect) -> &'static str {
    match effect {
        Effect::Render(_) => "render",
        Effect::Profile(_) => "profile",
        Effect::Realm(_) => "realm",
        Effect::Http(_) => "http",
        Effect::Activation(_) => "activation",
    }
}
