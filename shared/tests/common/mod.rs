#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use dispenser_core::capabilities::{
    HttpError, HttpTransport, Identity, IdentityProvider, RealmInfo, RealmProvider, RequestKind,
    TransportRequest, TransportResponse, TransportResult,
};
use dispenser_core::{ClaimConfig, Clock, Collaborators, DispenserSettings, UnixTimeMs};

pub const NOW_MS: u64 = 1_700_000_000_000;
pub const WALLET: &str = "0x1111111111111111111111111111111111111111";

#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<(RequestKind, TransportResult)>>,
    sent: Mutex<Vec<TransportRequest>>,
}

impl ScriptedTransport {
    pub fn reply(&self, kind: RequestKind, body: &str) {
        self.reply_status(kind, 200, body);
    }

    pub fn reply_status(&self, kind: RequestKind, status: u16, body: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back((kind, Ok(TransportResponse::new(status, body))));
    }

    pub fn fail(&self, kind: RequestKind, error: HttpError) {
        self.responses.lock().unwrap().push_back((kind, Err(error)));
    }

    pub fn sent(&self) -> Vec<TransportRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn execute(&self, request: TransportRequest) -> TransportResult {
        self.sent.lock().unwrap().push(request.clone());
        let mut responses = self.responses.lock().unwrap();
        match responses.pop_front() {
            Some((kind, result)) => {
                assert_eq!(kind, request.kind(), "scripted response for the wrong request");
                result
            }
            None => panic!("unexpected request to {}", request.url()),
        }
    }
}

pub struct FixedIdentity(pub Option<Identity>);

#[async_trait]
impl IdentityProvider for FixedIdentity {
    async fn current_identity(&self) -> Option<Identity> {
        self.0.clone()
    }
}

pub struct FixedRealm(pub Option<RealmInfo>);

#[async_trait]
impl RealmProvider for FixedRealm {
    async fn current_realm(&self) -> Option<RealmInfo> {
        self.0.clone()
    }
}

pub struct StepClock(AtomicU64);

impl StepClock {
    pub fn advance(&self, ms: u64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for StepClock {
    fn now(&self) -> UnixTimeMs {
        UnixTimeMs(self.0.load(Ordering::SeqCst))
    }
}

pub struct Setup {
    pub transport: Arc<ScriptedTransport>,
    pub clock: Arc<StepClock>,
    pub collaborators: Collaborators,
}

pub fn setup_with(identity: Option<Identity>, realm_url: &str) -> Setup {
    let transport = Arc::new(ScriptedTransport::default());
    let clock = Arc::new(StepClock(AtomicU64::new(NOW_MS)));
    let collaborators = Collaborators::new(
        transport.clone(),
        Arc::new(FixedIdentity(identity)),
        Arc::new(FixedRealm(Some(RealmInfo::from_base_url(realm_url)))),
    )
    .with_clock(clock.clone());
    Setup {
        transport,
        clock,
        collaborators,
    }
}

pub fn setup() -> Setup {
    setup_with(Some(Identity::web3(WALLET)), "https://peer.decentraland.org")
}

pub fn config(settings: DispenserSettings) -> ClaimConfig {
    ClaimConfig::from_settings(settings).unwrap()
}

pub fn default_config() -> ClaimConfig {
    config(DispenserSettings::new("campaign-42", "dispenser-42"))
}
