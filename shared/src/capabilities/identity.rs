use async_trait::async_trait;
use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

/// The player as far as the rewards service cares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// A wallet is attached to the session at all (guest sessions have none).
    pub connected_wallet: bool,
    /// The wallet is a real web3 wallet rather than a guest key.
    pub has_connected_web3: bool,
    pub user_id: String,
}

impl Identity {
    pub fn web3(address: impl Into<String>) -> Self {
        Self {
            connected_wallet: true,
            has_connected_web3: true,
            user_id: address.into(),
        }
    }

    pub fn can_claim(&self) -> bool {
        self.connected_wallet && !self.user_id.trim().is_empty()
    }

    /// Address credited with the reward. Empty for wallets that are not web3.
    pub fn beneficiary(&self) -> String {
        if self.has_connected_web3 {
            self.user_id.to_lowercase()
        } else {
            String::new()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfileOperation {
    CurrentIdentity,
}

impl Operation for ProfileOperation {
    /// `None` when nobody is signed in.
    type Output = Option<Identity>;
}

/// Asks the shell who is playing.
#[derive(Clone)]
pub struct Profile<Ev> {
    context: CapabilityContext<ProfileOperation, Ev>,
}

impl<Ev> Capability<Ev> for Profile<Ev> {
    type Operation = ProfileOperation;
    type MappedSelf<MappedEv> = Profile<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Profile::new(self.context.map_event(f))
    }
}

impl<Ev> Profile<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<ProfileOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn current_identity<F>(&self, make_event: F)
    where
        F: FnOnce(Option<Identity>) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let identity = ctx.request_from_shell(ProfileOperation::CurrentIdentity).await;
            ctx.update_app(make_event(identity));
        });
    }
}

/// Shell-side source of the identity behind [`ProfileOperation`].
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `None` when nobody is signed in.
    async fn current_identity(&self) -> Option<Identity>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beneficiary_is_lowercased() {
        let identity = Identity::web3("0xABCdef");
        assert_eq!(identity.beneficiary(), "0xabcdef");
    }

    #[test]
    fn test_guest_wallet_has_no_beneficiary() {
        let identity = Identity {
            connected_wallet: true,
            has_connected_web3: false,
            user_id: "0xGuest".into(),
        };
        assert!(identity.can_claim());
        assert_eq!(identity.beneficiary(), "");
    }

    #[test]
    fn test_disconnected_cannot_claim() {
        assert!(!Identity::default().can_claim());
        let no_key = Identity {
            connected_wallet: true,
            has_connected_web3: true,
            user_id: "  ".into(),
        };
        assert!(!no_key.can_claim());
    }
}
