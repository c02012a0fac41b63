use async_trait::async_trait;
use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

use crate::host;

/// Where the scene is currently served from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealmInfo {
    pub base_url: Option<String>,
    pub domain: Option<String>,
}

impl RealmInfo {
    pub fn from_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            domain: None,
        }
    }

    /// The catalyst origin sent to the rewards service: the explicit base URL,
    /// else the domain, with `https://` added when no scheme is given.
    pub fn catalyst(&self) -> String {
        let origin = [self.base_url.as_deref(), self.domain.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or_default();

        if origin.is_empty() || origin.starts_with("http://") || origin.starts_with("https://") {
            origin.to_string()
        } else {
            format!("https://{origin}")
        }
    }

    pub fn is_local_preview(&self) -> bool {
        host::is_local_url(&self.catalyst())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RealmOperation {
    CurrentRealm,
}

impl Operation for RealmOperation {
    /// `None` when the realm is not known yet.
    type Output = Option<RealmInfo>;
}

#[derive(Clone)]
pub struct Realm<Ev> {
    context: CapabilityContext<RealmOperation, Ev>,
}

impl<Ev> Capability<Ev> for Realm<Ev> {
    type Operation = RealmOperation;
    type MappedSelf<MappedEv> = Realm<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Realm::new(self.context.map_event(f))
    }
}

impl<Ev> Realm<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<RealmOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn current_realm<F>(&self, make_event: F)
    where
        F: FnOnce(Option<RealmInfo>) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let realm = ctx.request_from_shell(RealmOperation::CurrentRealm).await;
            ctx.update_app(make_event(realm));
        });
    }
}

#[async_trait]
pub trait RealmProvider: Send + Sync {
    /// `None` when the realm is not known yet.
    async fn current_realm(&self) -> Option<RealmInfo>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_wins() {
        let realm = RealmInfo {
            base_url: Some("https://peer.decentraland.org".into()),
            domain: Some("other.org".into()),
        };
        assert_eq!(realm.catalyst(), "https://peer.decentraland.org");
        assert!(!realm.is_local_preview());
    }

    #[test]
    fn test_domain_gets_https() {
        let realm = RealmInfo {
            base_url: None,
            domain: Some("peer.decentraland.org".into()),
        };
        assert_eq!(realm.catalyst(), "https://peer.decentraland.org");
    }

    #[test]
    fn test_empty_base_url_falls_back() {
        let realm = RealmInfo {
            base_url: Some(String::new()),
            domain: Some("localhost:8000".into()),
        };
        assert_eq!(realm.catalyst(), "https://localhost:8000");
        assert!(realm.is_local_preview());
    }

    #[test]
    fn test_unknown_realm() {
        assert_eq!(RealmInfo::default().catalyst(), "");
        assert!(!RealmInfo::default().is_local_preview());
    }

    #[test]
    fn test_lan_preview() {
        assert!(RealmInfo::from_base_url("http://192.168.0.12:8000").is_local_preview());
    }
}
