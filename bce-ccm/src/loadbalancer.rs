//! Load balancer provisioner.
//!
//! Drives one load balancer through
//! `Absent -> Creating -> Available -> Configuring -> Converged` and back
//! through `Deleting -> Absent`. Every call starts by reading the remote
//! state, so a call that failed halfway is resumed by simply calling again.

use std::fmt;
use std::sync::Arc;

use bce_client::{BlbApi, CloudApi, CreateLoadBalancerArgs, LoadBalancer, LoadBalancerStatus};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::eip::ElasticIpBinder;
use crate::error::{CcmError, Result};
use crate::poller::{PollPolicy, wait_until};
use crate::reconciler::Reconciler;
use crate::reconciler::backend::BackendPoolReconciler;
use crate::reconciler::listener::ListenerReconciler;
use crate::service::DesiredEndpointSet;

/// Look up a load balancer by its exact name.
///
/// The describe call matches names fuzzily, so `default-web` would also
/// return `default-web2`.
pub(crate) async fn find_load_balancer<C: BlbApi + ?Sized>(
    api: &C,
    name: &str,
) -> Result<Option<LoadBalancer>> {
    let mut matching: Vec<LoadBalancer> = api
        .describe_load_balancers(name)
        .await?
        .into_iter()
        .filter(|lb| lb.name == name)
        .collect();

    if matching.len() > 1 {
        let ids: Vec<&str> = matching.iter().map(|lb| lb.blb_id.as_str()).collect();
        warn!(
            "Found {} load balancers named {}: {:?}, using {}",
            matching.len(),
            name,
            ids,
            ids[0]
        );
    }
    Ok(if matching.is_empty() {
        None
    } else {
        Some(matching.swap_remove(0))
    })
}

/// Convergence phase of a load balancer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Absent,
    Creating,
    Available,
    Configuring,
    Converged,
    Deleting,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Absent => "absent",
            Phase::Creating => "creating",
            Phase::Available => "available",
            Phase::Configuring => "configuring",
            Phase::Converged => "converged",
            Phase::Deleting => "deleting",
        };
        f.write_str(s)
    }
}

fn enter(name: &str, phase: Phase) {
    info!("Load balancer {}: {}", name, phase);
}

/// Where a new load balancer is placed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placement {
    pub vpc_id: Option<String>,
    pub subnet_id: Option<String>,
}

/// What the orchestrator publishes for a load balanced service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressStatus {
    pub load_balancer_id: String,
    pub name: String,
    pub status: LoadBalancerStatus,
    /// Public IP, or the internal address while none is bound.
    pub ingress_ip: String,
}

impl IngressStatus {
    fn from_load_balancer(lb: &LoadBalancer) -> Self {
        Self {
            load_balancer_id: lb.blb_id.clone(),
            name: lb.name.clone(),
            status: lb.status,
            ingress_ip: lb.public_ip().unwrap_or(&lb.address).to_string(),
        }
    }
}

pub struct LoadBalancerProvisioner<C> {
    api: Arc<C>,
    policy: PollPolicy,
    listeners: ListenerReconciler<C>,
    backends: BackendPoolReconciler<C>,
    eip: ElasticIpBinder<C>,
}

impl<C: CloudApi> LoadBalancerProvisioner<C> {
    pub fn new(api: Arc<C>, policy: PollPolicy) -> Self {
        Self {
            listeners: ListenerReconciler::new(api.clone()),
            backends: BackendPoolReconciler::new(api.clone()),
            eip: ElasticIpBinder::new(api.clone(), policy.clone()),
            api,
            policy,
        }
    }

    /// Converge load balancer `name` to `desired` and return its public address.
    ///
    /// Calling it again with unchanged input only describes.
    pub async fn ensure(
        &self,
        name: &str,
        desired: &DesiredEndpointSet,
        placement: &Placement,
        cancel: &CancellationToken,
    ) -> Result<IngressStatus> {
        let lb = match find_load_balancer(self.api.as_ref(), name).await? {
            Some(lb) => {
                debug!("Found load balancer {} ({})", name, lb.blb_id);
                lb
            }
            None => {
                enter(name, Phase::Absent);
                self.create(name, placement, cancel).await?
            }
        };

        let lb = if lb.is_available() {
            lb
        } else {
            self.wait_available(name, cancel).await?
        };
        enter(name, Phase::Available);

        enter(name, Phase::Configuring);
        let plan = self
            .listeners
            .reconcile(&lb.blb_id, &desired.listeners)
            .await?;
        debug!("Listener changes on {}: {:?}", lb.blb_id, plan);

        // Listener changes flip the balancer to updating for a while.
        let lb = self.wait_available(name, cancel).await?;
        self.backends
            .reconcile(&lb.blb_id, &desired.members)
            .await?;

        let ip = self.eip.ensure(&lb, cancel).await?;
        enter(name, Phase::Converged);

        Ok(IngressStatus {
            load_balancer_id: lb.blb_id,
            name: lb.name,
            status: LoadBalancerStatus::Available,
            ingress_ip: ip,
        })
    }

    /// Same as [`ensure`](Self::ensure); convergence has no separate update path.
    pub async fn update(
        &self,
        name: &str,
        desired: &DesiredEndpointSet,
        placement: &Placement,
        cancel: &CancellationToken,
    ) -> Result<IngressStatus> {
        self.ensure(name, desired, placement, cancel).await
    }

    /// Current status of load balancer `name`, if it exists.
    pub async fn get(&self, name: &str) -> Result<Option<IngressStatus>> {
        let lb = find_load_balancer(self.api.as_ref(), name).await?;
        Ok(lb.as_ref().map(IngressStatus::from_load_balancer))
    }

    /// Tear down load balancer `name`. A missing load balancer is not an error.
    pub async fn delete(&self, name: &str, cancel: &CancellationToken) -> Result<()> {
        match self.teardown(name, cancel).await {
            Err(e) if e.is_not_found() => {
                info!("Load balancer {} vanished during teardown: {}", name, e);
                enter(name, Phase::Absent);
                Ok(())
            }
            result => result,
        }
    }

    async fn teardown(&self, name: &str, cancel: &CancellationToken) -> Result<()> {
        let Some(lb) = find_load_balancer(self.api.as_ref(), name).await? else {
            debug!("Load balancer {} does not exist, nothing to delete", name);
            return Ok(());
        };
        enter(name, Phase::Deleting);

        let lb = if lb.is_available() {
            lb
        } else {
            self.wait_available(name, cancel).await?
        };
        self.listeners.finalize(&lb.blb_id).await?;

        let lb = self.wait_available(name, cancel).await?;
        self.backends.finalize(&lb.blb_id).await?;
        self.eip.release(&lb, cancel).await?;

        info!("Deleting load balancer {} ({})", name, lb.blb_id);
        self.api.delete_load_balancer(&lb.blb_id).await?;
        enter(name, Phase::Absent);
        Ok(())
    }

    async fn create(
        &self,
        name: &str,
        placement: &Placement,
        cancel: &CancellationToken,
    ) -> Result<LoadBalancer> {
        enter(name, Phase::Creating);
        let args = CreateLoadBalancerArgs {
            name: name.to_string(),
            desc: format!("auto generated by cce:{}", name),
            vpc_id: placement.vpc_id.clone(),
            subnet_id: placement.subnet_id.clone(),
        };
        let created = self.api.create_load_balancer(&args).await?;
        info!(
            "Created load balancer {} ({}, {})",
            name, created.blb_id, created.address
        );

        // A new balancer may not be listed yet, so absence is retried too.
        let api = self.api.as_ref();
        let lb = wait_until(
            &self.policy,
            cancel,
            &format!("load balancer {}", name),
            move || async move { Ok::<_, CcmError>(Some(find_load_balancer(api, name).await?)) },
            |lb: &Option<LoadBalancer>| lb.as_ref().is_some_and(LoadBalancer::is_available),
        )
        .await?;

        lb.ok_or_else(|| CcmError::NotFound(format!("load balancer {}", name)))
    }

    async fn wait_available(&self, name: &str, cancel: &CancellationToken) -> Result<LoadBalancer> {
        let api = self.api.as_ref();
        wait_until(
            &self.policy,
            cancel,
            &format!("load balancer {}", name),
            move || find_load_balancer(api, name),
            LoadBalancer::is_available,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::listener::Listener;
    use crate::service::{DEFAULT_SCHEDULER, Protocol};
    use bce_client::test_util::{Call, FakeCloud, FakeSettings};
    use std::collections::BTreeSet;
    use std::time::Duration;

    fn provisioner(cloud: &Arc<FakeCloud>) -> LoadBalancerProvisioner<FakeCloud> {
        LoadBalancerProvisioner::new(cloud.clone(), PollPolicy::new(10, Duration::from_millis(1)))
    }

    fn desired() -> DesiredEndpointSet {
        DesiredEndpointSet {
            listeners: vec![Listener {
                port: 80,
                protocol: Protocol::Tcp,
                backend_port: 30080,
                scheduler: DEFAULT_SCHEDULER.to_string(),
            }],
            members: BTreeSet::from(["i-1".to_string()]),
        }
    }

    #[tokio::test]
    async fn test_find_ignores_fuzzy_matches() {
        let cloud = FakeCloud::new();
        cloud.seed_load_balancer("default-web2", LoadBalancerStatus::Available);
        assert!(find_load_balancer(&cloud, "default-web").await.unwrap().is_none());

        let id = cloud.seed_load_balancer("default-web", LoadBalancerStatus::Available);
        let found = find_load_balancer(&cloud, "default-web").await.unwrap().unwrap();
        assert_eq!(found.blb_id, id);
    }

    #[tokio::test]
    async fn test_ensure_waits_out_visibility_lag() {
        let cloud = Arc::new(FakeCloud::with_settings(FakeSettings {
            lb_visibility_lag: 2,
            lb_settle: 2,
            listener_settle: 1,
            eip_settle: 1,
        }));

        let status = provisioner(&cloud)
            .ensure("default-web", &desired(), &Placement::default(), &CancellationToken::new())
            .await
            .unwrap();

        let creates = cloud
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::CreateLoadBalancer { .. }))
            .count();
        assert_eq!(creates, 1);
        assert_eq!(cloud.load_balancers().len(), 1);
        assert_eq!(
            cloud.load_balancer("default-web").unwrap().public_ip,
            status.ingress_ip
        );
    }

    #[tokio::test]
    async fn test_get_reports_internal_address_until_bound() {
        let cloud = Arc::new(FakeCloud::new());
        let provisioner = provisioner(&cloud);
        assert!(provisioner.get("default-web").await.unwrap().is_none());

        let id = cloud.seed_load_balancer("default-web", LoadBalancerStatus::Creating);
        let status = provisioner.get("default-web").await.unwrap().unwrap();
        assert_eq!(status.load_balancer_id, id);
        assert_eq!(status.status, LoadBalancerStatus::Creating);
        assert_eq!(
            status.ingress_ip,
            cloud.load_balancer("default-web").unwrap().address
        );
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let cloud = Arc::new(FakeCloud::new());
        provisioner(&cloud)
            .delete("default-web", &CancellationToken::new())
            .await
            .unwrap();
        assert!(cloud.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_balancer_blocks_configuration() {
        let cloud = Arc::new(FakeCloud::new());
        cloud.seed_load_balancer("default-web", LoadBalancerStatus::Paused);

        let err = provisioner(&cloud)
            .ensure("default-web", &desired(), &Placement::default(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, CcmError::NotReady { attempts: 10, .. }));
        assert!(cloud.mutations().is_empty());
    }
}
