mod activation;
mod http;
mod identity;
mod realm;

pub use self::activation::{Activation, ActivationOperation};
pub use self::http::{
    into_protocol, HttpError, HttpReply, HttpTransport, RequestKind, TransportRequest,
    TransportResponse, TransportResult, ValidatedUrl,
};
pub use self::identity::{Identity, IdentityProvider, Profile, ProfileOperation};
pub use self::realm::{Realm, RealmInfo, RealmOperation, RealmProvider};

pub use crux_core::render::Render;
pub use crux_http::Http;

use crate::app::App;
use crate::event::Event;

/// Everything the claim core can ask of the shell.
#[derive(crux_core::macros::Effect)]
#[effect(app = "App")]
pub struct Capabilities {
    pub http: Http<Event>,
    pub render: Render<Event>,
    pub profile: Profile<Event>,
    pub realm: Realm<Event>,
    pub activation: Activation<Event>,
}

#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex, PoisonError};

    use crate::controller::Collaborators;
    use crate::{Clock, UnixTimeMs};

    pub const SUCCESS_BODY: &str = r#"{"ok":true,"data":[{"image":"https://cdn.example/reward.png"}]}"#;
    pub const CAPTCHA_BODY: &str = r#"{"ok":false,"code":"captcha_required","error":"Captcha required"}"#;
    pub const CAPTCHA_CHALLENGE_BODY: &str =
        r#"{"data":{"id":"cap-1","image":"https://cdn.example/captcha.png"}}"#;

    /// Scripted transport. Claim and captcha requests have separate queues;
    /// every request is recorded.
    #[derive(Default)]
    pub struct MockTransport {
        claims: Mutex<VecDeque<TransportResult>>,
        captchas: Mutex<VecDeque<TransportResult>>,
        sent: Mutex<Vec<TransportRequest>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_claim(&self, result: TransportResult) -> &Self {
            self.claims.lock().unwrap_or_else(PoisonError::into_inner).push_back(result);
            self
        }

        pub fn push_claim_body(&self, body: &str) -> &Self {
            self.push_claim(Ok(TransportResponse::ok(body)))
        }

        pub fn push_captcha_body(&self, body: &str) -> &Self {
            self.captchas
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_back(Ok(TransportResponse::ok(body)));
            self
        }

        pub fn sent(&self) -> Vec<TransportRequest> {
            self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
        }

        pub fn sent_count(&self, kind: RequestKind) -> usize {
            self.sent().iter().filter(|r| r.kind() == kind).count()
        }
    }

    #[async_trait]
    impl HttpTransport for MockTransport {
        async fn execute(&self, request: TransportRequest) -> TransportResult {
            let queue = match request.kind() {
                RequestKind::Claim => &self.claims,
                RequestKind::Captcha => &self.captchas,
            };
            let next = queue.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
            self.sent.lock().unwrap_or_else(PoisonError::into_inner).push(request);
            next.unwrap_or_else(|| {
                Err(HttpError::Network {
                    message: "no scripted response".to_string(),
                })
            })
        }
    }

    pub struct StaticIdentity(pub Option<Identity>);

    impl StaticIdentity {
        pub fn wallet(address: &str) -> Self {
            Self(Some(Identity::web3(address)))
        }

        pub fn signed_out() -> Self {
            Self(None)
        }
    }

    #[async_trait]
    impl IdentityProvider for StaticIdentity {
        async fn current_identity(&self) -> Option<Identity> {
            self.0.clone()
        }
    }

    pub struct StaticRealm(pub Option<RealmInfo>);

    impl StaticRealm {
        pub fn at(base_url: &str) -> Self {
            Self(Some(RealmInfo::from_base_url(base_url)))
        }
    }

    #[async_trait]
    impl RealmProvider for StaticRealm {
        async fn current_realm(&self) -> Option<RealmInfo> {
            self.0.clone()
        }
    }

    /// Clock that only moves when told to.
    #[derive(Debug, Default)]
    pub struct ManualClock(AtomicU64);

    impl ManualClock {
        pub fn at(ms: u64) -> Self {
            Self(AtomicU64::new(ms))
        }

        pub fn advance(&self, ms: u64) {
            self.0.fetch_add(ms, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> UnixTimeMs {
            UnixTimeMs(self.0.load(Ordering::SeqCst))
        }
    }

    pub struct Harness {
        pub http: Arc<MockTransport>,
        pub clock: Arc<ManualClock>,
        pub collaborators: Collaborators,
    }

    /// Mock collaborators for a signed-in player on a public realm.
    pub fn mock_collaborators(now_ms: u64) -> Harness {
        with_collaborators(
            now_ms,
            StaticIdentity::wallet("0xAbC0000000000000000000000000000000000001"),
            StaticRealm::at("https://peer.decentraland.org"),
        )
    }

    pub fn with_collaborators(now_ms: u64, identity: StaticIdentity, realm: StaticRealm) -> Harness {
        let http = Arc::new(MockTransport::new());
        let clock = Arc::new(ManualClock::at(now_ms));
        let collaborators = Collaborators::new(http.clone(), Arc::new(identity), Arc::new(realm))
            .with_clock(clock.clone());
        Harness {
            http,
            clock,
            collaborators,
        }
    }
}
