use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationOperation {
    /// The reward is on its way; the scene may react (open a door, play a sound).
    RewardClaimed { thumbnail_url: String },
}

impl Operation for ActivationOperation {
    type Output = ();
}

/// Fire-and-forget notification to the scene after a successful claim.
#[derive(Clone)]
pub struct Activation<Ev> {
    context: CapabilityContext<ActivationOperation, Ev>,
}

impl<Ev> Capability<Ev> for Activation<Ev> {
    type Operation = ActivationOperation;
    type MappedSelf<MappedEv> = Activation<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Activation::new(self.context.map_event(f))
    }
}

impl<Ev> Activation<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<ActivationOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn reward_claimed(&self, thumbnail_url: impl Into<String>) {
        let ctx = self.context.clone();
        let operation = ActivationOperation::RewardClaimed {
            thumbnail_url: thumbnail_url.into(),
        };
        self.context.spawn(async move {
            ctx.notify_shell(operation).await;
        });
    }
}
