//! Listener reconciler - keeps the port listeners of a load balancer in sync.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bce_client::{BlbApi, TcpListener};
use serde::Serialize;
use tracing::{debug, info};

use super::Reconciler;
use crate::error::Result;
use crate::service::Protocol;

/// A listener, keyed by its port on the load balancer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listener {
    pub port: u16,
    pub protocol: Protocol,
    pub backend_port: u16,
    pub scheduler: String,
}

impl Listener {
    pub fn to_tcp(&self) -> TcpListener {
        TcpListener {
            listener_port: self.port,
            backend_port: self.backend_port,
            scheduler: self.scheduler.clone(),
        }
    }

    pub fn from_tcp(listener: &TcpListener) -> Self {
        Self {
            port: listener.listener_port,
            protocol: Protocol::Tcp,
            backend_port: listener.backend_port,
            scheduler: listener.scheduler.clone(),
        }
    }
}

/// Calls needed to converge the listeners of one load balancer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListenerPlan {
    /// Ports to remove in one batch.
    pub delete: Vec<u16>,
    pub update: Vec<Listener>,
    pub create: Vec<Listener>,
}

impl ListenerPlan {
    pub fn is_empty(&self) -> bool {
        self.delete.is_empty() && self.update.is_empty() && self.create.is_empty()
    }
}

/// Diff desired against actual listeners.
///
/// The port is the only identity. A listener whose protocol differs from the
/// desired one cannot be updated in place, so it is deleted and recreated.
pub fn plan_listeners(desired: &[Listener], actual: &[Listener]) -> ListenerPlan {
    let wanted: BTreeMap<u16, &Listener> = desired.iter().map(|l| (l.port, l)).collect();
    let existing: BTreeMap<u16, &Listener> = actual.iter().map(|l| (l.port, l)).collect();

    let mut plan = ListenerPlan::default();
    for (port, current) in &existing {
        match wanted.get(port) {
            None => plan.delete.push(*port),
            Some(want) if *want == *current => {}
            Some(want) if want.protocol != current.protocol => {
                plan.delete.push(*port);
                plan.create.push((*want).clone());
            }
            Some(want) => plan.update.push((*want).clone()),
        }
    }
    for (port, want) in &wanted {
        if !existing.contains_key(port) {
            plan.create.push((*want).clone());
        }
    }
    plan.create.sort_by_key(|l| l.port);
    plan
}

/// Listener reconciler for one region.
pub struct ListenerReconciler<C> {
    api: Arc<C>,
}

impl<C: BlbApi> ListenerReconciler<C> {
    pub fn new(api: Arc<C>) -> Self {
        Self { api }
    }

    /// Current listeners of every implemented protocol.
    pub async fn actual(&self, lb_id: &str) -> Result<Vec<Listener>> {
        let tcp = self.api.describe_tcp_listeners(lb_id, None).await?;
        Ok(tcp.iter().map(Listener::from_tcp).collect())
    }

    async fn apply(&self, lb_id: &str, plan: &ListenerPlan) -> Result<()> {
        if !plan.delete.is_empty() {
            info!("Deleting listeners {:?} on {}", plan.delete, lb_id);
            self.api.delete_listeners(lb_id, &plan.delete).await?;
        }

        for listener in &plan.update {
            info!(
                "Updating {} listener {} -> {} on {}",
                listener.protocol, listener.port, listener.backend_port, lb_id
            );
            match listener.protocol {
                Protocol::Tcp => {
                    self.api
                        .update_tcp_listener(lb_id, &listener.to_tcp())
                        .await?
                }
            }
        }

        for listener in &plan.create {
            info!(
                "Creating {} listener {} -> {} on {}",
                listener.protocol, listener.port, listener.backend_port, lb_id
            );
            match listener.protocol {
                Protocol::Tcp => {
                    self.api
                        .create_tcp_listener(lb_id, &listener.to_tcp())
                        .await?
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl<C: BlbApi> Reconciler for ListenerReconciler<C> {
    type Desired = Vec<Listener>;
    type Outcome = ListenerPlan;

    async fn reconcile(&self, lb_id: &str, desired: &Self::Desired) -> Result<Self::Outcome> {
        let actual = self.actual(lb_id).await?;
        let plan = plan_listeners(desired, &actual);
        if plan.is_empty() {
            debug!("Listeners of {} already converged", lb_id);
            return Ok(plan);
        }

        self.apply(lb_id, &plan).await?;
        Ok(plan)
    }

    async fn finalize(&self, lb_id: &str) -> Result<()> {
        info!("Removing all listeners of {}", lb_id);
        self.reconcile(lb_id, &Vec::new()).await?;
        Ok(())
    }
}
