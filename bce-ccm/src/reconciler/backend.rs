//! Backend pool reconciler.
//!
//! Only membership is converged. The weight of an existing member is left
//! as found; new members get [`DEFAULT_WEIGHT`].

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use bce_client::{BackendServer, BlbApi};
use tracing::{debug, info};

use super::Reconciler;
use crate::error::Result;

/// Weight of every member this controller adds.
pub const DEFAULT_WEIGHT: u32 = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendPlan {
    pub remove: Vec<String>,
    pub add: Vec<String>,
}

impl BackendPlan {
    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.add.is_empty()
    }
}

/// Diff desired members against the registered backend servers by instance ID.
pub fn plan_backends(desired: &BTreeSet<String>, actual: &[BackendServer]) -> BackendPlan {
    let registered: BTreeSet<&str> = actual.iter().map(|b| b.instance_id.as_str()).collect();

    BackendPlan {
        remove: registered
            .iter()
            .filter(|id| !desired.contains(**id))
            .map(|id| id.to_string())
            .collect(),
        add: desired
            .iter()
            .filter(|id| !registered.contains(id.as_str()))
            .cloned()
            .collect(),
    }
}

pub struct BackendPoolReconciler<C> {
    api: Arc<C>,
}

impl<C: BlbApi> BackendPoolReconciler<C> {
    pub fn new(api: Arc<C>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl<C: BlbApi> Reconciler for BackendPoolReconciler<C> {
    type Desired = BTreeSet<String>;
    type Outcome = BackendPlan;

    async fn reconcile(&self, lb_id: &str, desired: &Self::Desired) -> Result<Self::Outcome> {
        let actual = self.api.describe_backend_servers(lb_id).await?;
        let plan = plan_backends(desired, &actual);
        if plan.is_empty() {
            debug!("Backend pool of {} already converged", lb_id);
            return Ok(plan);
        }

        if !plan.remove.is_empty() {
            info!("Removing backend servers {:?} from {}", plan.remove, lb_id);
            self.api.remove_backend_servers(lb_id, &plan.remove).await?;
        }
        if !plan.add.is_empty() {
            info!("Adding backend servers {:?} to {}", plan.add, lb_id);
            let servers: Vec<BackendServer> = plan
                .add
                .iter()
                .map(|instance_id| BackendServer {
                    instance_id: instance_id.clone(),
                    weight: DEFAULT_WEIGHT,
                })
                .collect();
            self.api.add_backend_servers(lb_id, &servers).await?;
        }

        Ok(plan)
    }

    async fn finalize(&self, lb_id: &str) -> Result<()> {
        info!("Removing all backend servers of {}", lb_id);
        self.reconcile(lb_id, &BTreeSet::new()).await?;
        Ok(())
    }
}
