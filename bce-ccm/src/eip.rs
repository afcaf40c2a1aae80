//! Elastic IP binder - gives a load balancer its public address.

use std::sync::Arc;

use bce_client::{BlbApi, CreateEipArgs, Eip, EipApi, EipInstanceType, LoadBalancer};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{CcmError, Result};
use crate::loadbalancer::find_load_balancer;
use crate::poller::{PollPolicy, wait_until};

pub struct ElasticIpBinder<C> {
    api: Arc<C>,
    policy: PollPolicy,
}

impl<C: BlbApi + EipApi> ElasticIpBinder<C> {
    pub fn new(api: Arc<C>, policy: PollPolicy) -> Self {
        Self { api, policy }
    }

    /// Make sure `lb` has a public IP bound and return it.
    ///
    /// An unbound EIP named after the load balancer, left behind by an
    /// earlier run that stopped between create and bind, is bound instead of
    /// allocating another one.
    pub async fn ensure(&self, lb: &LoadBalancer, cancel: &CancellationToken) -> Result<String> {
        if let Some(ip) = lb.public_ip() {
            debug!("Load balancer {} already has public IP {}", lb.name, ip);
            return Ok(ip.to_string());
        }

        let eips = self.api.get_eips(None).await?;
        if let Some(bound) = eips.iter().find(|e| e.is_bound_to(&lb.blb_id)) {
            debug!("EIP {} is already bound to {}", bound.eip, lb.blb_id);
            return Ok(bound.eip.clone());
        }

        let ip = match eips
            .into_iter()
            .find(|e| e.name == lb.name && e.instance_id.is_empty())
        {
            Some(leftover) => {
                info!("Reusing unbound EIP {} for {}", leftover.eip, lb.name);
                leftover.eip
            }
            None => {
                let args = CreateEipArgs::for_load_balancer(&lb.name);
                let ip = self.api.create_eip(&args).await?;
                info!(
                    "Created EIP {} ({} Mbps) for {}",
                    ip, args.bandwidth_in_mbps, lb.name
                );
                ip
            }
        };

        self.wait_eip_available(&ip, cancel).await?;

        let api = self.api.as_ref();
        let name = lb.name.as_str();
        wait_until(
            &self.policy,
            cancel,
            &format!("load balancer {}", name),
            move || find_load_balancer(api, name),
            LoadBalancer::is_available,
        )
        .await?;

        info!("Binding EIP {} to load balancer {}", ip, lb.blb_id);
        self.api
            .bind_eip(&ip, EipInstanceType::Blb, &lb.blb_id)
            .await?;
        Ok(ip)
    }

    /// Delete the public IP bound to `lb`, unbinding it first, plus any
    /// unbound EIP named after it.
    ///
    /// An EIP that is already gone is fine. An EIP bound to something else
    /// is left alone.
    pub async fn release(&self, lb: &LoadBalancer, cancel: &CancellationToken) -> Result<()> {
        match lb.public_ip() {
            Some(ip) => self.release_bound(lb, ip, cancel).await?,
            None => debug!("Load balancer {} has no public IP", lb.name),
        }

        // Created for this balancer by a run that stopped before binding.
        let leftovers: Vec<String> = self
            .api
            .get_eips(None)
            .await?
            .into_iter()
            .filter(|e| e.name == lb.name && e.instance_id.is_empty())
            .map(|e| e.eip)
            .collect();
        for ip in leftovers {
            match self.wait_eip_available(&ip, cancel).await {
                Ok(_) => {}
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
            info!("Deleting unbound EIP {} left for {}", ip, lb.name);
            self.api.delete_eip(&ip).await?;
        }
        Ok(())
    }

    async fn release_bound(
        &self,
        lb: &LoadBalancer,
        ip: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let Some(eip) = self.get_eip(ip).await? else {
            info!("EIP {} is already gone", ip);
            return Ok(());
        };

        if !eip.instance_id.is_empty() {
            if !eip.is_bound_to(&lb.blb_id) {
                warn!(
                    "EIP {} is bound to {} {}, not to {}, leaving it",
                    ip, eip.instance_type, eip.instance_id, lb.blb_id
                );
                return Ok(());
            }
            info!("Unbinding EIP {} from {}", ip, lb.blb_id);
            self.api.unbind_eip(ip).await?;
        }

        self.wait_eip_available(ip, cancel).await?;
        info!("Deleting EIP {}", ip);
        self.api.delete_eip(ip).await?;
        Ok(())
    }

    async fn get_eip(&self, ip: &str) -> Result<Option<Eip>> {
        let eips = self.api.get_eips(Some(ip)).await?;
        Ok(eips.into_iter().find(|e| e.eip == ip))
    }

    async fn wait_eip_available(&self, ip: &str, cancel: &CancellationToken) -> Result<Eip> {
        wait_until(
            &self.policy,
            cancel,
            &format!("EIP {}", ip),
            || self.get_eip(ip),
            Eip::is_available,
        )
        .await
        .map_err(|e| match e {
            CcmError::NotFound(_) => CcmError::NotFound(format!("EIP {} disappeared", ip)),
            e => e,
        })
    }
}
