//! The `baidubce` cloud provider.
//!
//! [`BceCloud`] is what the orchestrator talks to. It turns services and
//! nodes into desired state, resolves everything the components need as
//! explicit inputs (instance IDs, VPC, subnet) and hands off to the
//! provisioner, the route reconciler and the instance helpers.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use bce_client::{CloudApi, HttpClient};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::CloudConfig;
use crate::error::{CcmError, Result};
use crate::instances::{Instances, NodeAddress, Zone};
use crate::loadbalancer::{IngressStatus, LoadBalancerProvisioner, Placement};
use crate::route::{ManagedRoute, RouteChange, RouteTableReconciler};
use crate::service::{DesiredEndpointSet, Node, ServiceSpec};

/// Name the provider registers under.
pub const PROVIDER_NAME: &str = "baidubce";

pub struct BceCloud<C> {
    config: CloudConfig,
    provisioner: LoadBalancerProvisioner<C>,
    routes: RouteTableReconciler<C>,
    instances: Instances<C>,
}

impl BceCloud<HttpClient> {
    /// Provider talking to the endpoints of `config`.
    pub fn from_config(config: CloudConfig) -> Result<Self> {
        let api = HttpClient::new(config.http_config())?;
        info!(
            "BCE cloud provider for cluster {} at {}",
            config.cluster_id,
            api.base_url()
        );
        Ok(Self::new(config, Arc::new(api)))
    }
}

impl<C: CloudApi> BceCloud<C> {
    pub fn new(config: CloudConfig, api: Arc<C>) -> Self {
        let instances = || Instances::new(api.clone(), &config.cluster_id, &config.region);
        Self {
            provisioner: LoadBalancerProvisioner::new(api.clone(), config.poll_policy()),
            routes: RouteTableReconciler::new(api.clone(), instances()),
            instances: instances(),
            config,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }

    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    // =========================================================================
    // Load balancers
    // =========================================================================

    /// Converge the load balancer of `service` over `nodes`.
    ///
    /// The service is validated before anything is read or changed.
    pub async fn ensure_load_balancer(
        &self,
        service: &ServiceSpec,
        nodes: &[Node],
        cancel: &CancellationToken,
    ) -> Result<IngressStatus> {
        let listeners = service.validate()?;
        let name = service.load_balancer_name();
        info!(
            "Ensuring load balancer {} for {}/{} over {} node(s)",
            name,
            service.namespace,
            service.name,
            nodes.len()
        );

        let desired = DesiredEndpointSet {
            listeners,
            members: self.resolve_members(nodes).await?,
        };
        let placement = self.placement().await?;
        self.provisioner
            .ensure(&name, &desired, &placement, cancel)
            .await
    }

    pub async fn update_load_balancer(
        &self,
        service: &ServiceSpec,
        nodes: &[Node],
        cancel: &CancellationToken,
    ) -> Result<IngressStatus> {
        self.ensure_load_balancer(service, nodes, cancel).await
    }

    pub async fn ensure_load_balancer_deleted(
        &self,
        service: &ServiceSpec,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let name = service.load_balancer_name();
        info!(
            "Deleting load balancer {} of {}/{}",
            name, service.namespace, service.name
        );
        self.provisioner.delete(&name, cancel).await
    }

    pub async fn get_load_balancer(&self, service: &ServiceSpec) -> Result<Option<IngressStatus>> {
        self.provisioner.get(&service.load_balancer_name()).await
    }

    /// Cloud instance IDs of `nodes`.
    ///
    /// Nodes the orchestrator already mapped are taken as they are; the rest
    /// are looked up by internal IP. Nodes without an instance are skipped.
    async fn resolve_members(&self, nodes: &[Node]) -> Result<BTreeSet<String>> {
        let mut members = BTreeSet::new();
        let mut unresolved = vec![];
        for node in nodes {
            match node.instance_id.as_deref().filter(|id| !id.is_empty()) {
                Some(id) => {
                    members.insert(id.to_string());
                }
                None => unresolved.push(node),
            }
        }
        if unresolved.is_empty() {
            return Ok(members);
        }

        let inventory = self.instances.list().await?;
        let by_ip: HashMap<&str, &str> = inventory
            .iter()
            .map(|i| (i.internal_ip.as_str(), i.instance_id.as_str()))
            .collect();
        for node in unresolved {
            match by_ip.get(node.internal_ip.as_str()) {
                Some(id) => {
                    debug!("Node {} is instance {}", node.name, id);
                    members.insert(id.to_string());
                }
                None => warn!(
                    "Node {} ({}) has no instance in cluster {}, skipping it",
                    node.name, node.internal_ip, self.config.cluster_id
                ),
            }
        }
        Ok(members)
    }

    /// VPC and subnet for a new load balancer.
    async fn placement(&self) -> Result<Placement> {
        if let (Some(vpc_id), Some(subnet_id)) = (self.config.vpc_id(), self.config.subnet_id()) {
            return Ok(Placement {
                vpc_id: Some(vpc_id.to_string()),
                subnet_id: Some(subnet_id.to_string()),
            });
        }

        let inventory = self.instances.list().await?;
        let first = inventory.first();
        Ok(Placement {
            vpc_id: self
                .config
                .vpc_id()
                .map(str::to_string)
                .or_else(|| first.map(|i| i.vpc_id.clone())),
            subnet_id: self
                .config
                .subnet_id()
                .map(str::to_string)
                .or_else(|| first.map(|i| i.subnet_id.clone())),
        })
    }

    // =========================================================================
    // Routes
    // =========================================================================

    /// The cluster's VPC, resolved on every call.
    pub async fn vpc_id(&self) -> Result<String> {
        if let Some(vpc_id) = self.config.vpc_id() {
            return Ok(vpc_id.to_string());
        }
        self.instances
            .list()
            .await?
            .into_iter()
            .next()
            .map(|i| i.vpc_id)
            .ok_or_else(|| {
                CcmError::NotFound(format!(
                    "VPC of cluster {}: no VpcId configured and no instances",
                    self.config.cluster_id
                ))
            })
    }

    pub async fn list_routes(&self) -> Result<Vec<ManagedRoute>> {
        let vpc_id = self.vpc_id().await?;
        self.routes.list_managed_routes(&vpc_id).await
    }

    pub async fn create_route(&self, cidr: &str, node_ip: &str) -> Result<RouteChange> {
        let vpc_id = self.vpc_id().await?;
        self.routes.create_route(&vpc_id, cidr, node_ip).await
    }

    pub async fn delete_route(&self, cidr: &str) -> Result<usize> {
        let vpc_id = self.vpc_id().await?;
        self.routes.delete_route(&vpc_id, cidr).await
    }

    // =========================================================================
    // Instances
    // =========================================================================

    pub fn node_addresses(&self, node_name: &str) -> Result<Vec<NodeAddress>> {
        self.instances.node_addresses(node_name)
    }

    pub async fn instance_id(&self, node_name: &str) -> Result<String> {
        self.instances.instance_id(node_name).await
    }

    pub async fn external_id(&self, node_name: &str) -> Result<String> {
        self.instances.external_id(node_name).await
    }

    pub fn instance_type(&self, node_name: &str) -> &'static str {
        self.instances.instance_type(node_name)
    }

    pub async fn zone(&self, node_name: &str) -> Result<Zone> {
        self.instances.zone(node_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ServicePort;
    use bce_client::test_util::{Call, DEFAULT_VPC_ID, FakeCloud, instance};

    fn config() -> CloudConfig {
        CloudConfig {
            cluster_id: "c-test".to_string(),
            master_id: "m-test".to_string(),
            endpoint: "cce.test".to_string(),
            region: "bj".to_string(),
            ..Default::default()
        }
    }

    fn node(ip: &str, instance_id: Option<&str>) -> Node {
        Node {
            name: ip.to_string(),
            internal_ip: ip.to_string(),
            instance_id: instance_id.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_resolve_members_looks_up_missing_ids() {
        let fake = Arc::new(FakeCloud::new());
        fake.add_instance(instance("i-2", "10.0.0.2"));
        let cloud = BceCloud::new(config(), fake.clone());

        let members = cloud
            .resolve_members(&[
                node("10.0.0.1", Some("i-1")),
                node("10.0.0.2", None),
                node("10.0.0.3", None),
            ])
            .await
            .unwrap();

        assert_eq!(
            members,
            BTreeSet::from(["i-1".to_string(), "i-2".to_string()])
        );
    }

    #[tokio::test]
    async fn test_resolve_members_skips_inventory_when_mapped() {
        let fake = Arc::new(FakeCloud::new());
        let cloud = BceCloud::new(config(), fake.clone());

        cloud
            .resolve_members(&[node("10.0.0.1", Some("i-1"))])
            .await
            .unwrap();
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn test_vpc_id_is_not_cached() {
        let fake = Arc::new(FakeCloud::new());
        fake.add_instance(instance("i-1", "10.0.0.1"));
        let cloud = BceCloud::new(config(), fake.clone());

        assert_eq!(cloud.vpc_id().await.unwrap(), DEFAULT_VPC_ID);
        assert_eq!(cloud.vpc_id().await.unwrap(), DEFAULT_VPC_ID);
        let lists = fake
            .calls()
            .into_iter()
            .filter(|c| *c == Call::ListInstances)
            .count();
        assert_eq!(lists, 2);
    }

    #[tokio::test]
    async fn test_vpc_id_without_instances() {
        let cloud = BceCloud::new(config(), Arc::new(FakeCloud::new()));
        assert!(matches!(
            cloud.vpc_id().await.unwrap_err(),
            CcmError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_invalid_service_makes_no_calls() {
        let fake = Arc::new(FakeCloud::new());
        let cloud = BceCloud::new(config(), fake.clone());
        let service = ServiceSpec {
            ports: vec![ServicePort {
                name: None,
                port: 53,
                protocol: "UDP".to_string(),
                node_port: 30053,
            }],
            ..ServiceSpec::named("default", "dns")
        };

        let err = cloud
            .ensure_load_balancer(&service, &[], &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CcmError::Unsupported(_)));
        assert!(fake.calls().is_empty());
    }

    #[test]
    fn test_provider_name() {
        let cloud = BceCloud::new(config(), Arc::new(FakeCloud::new()));
        assert_eq!(cloud.provider_name(), "baidubce");
        assert_eq!(cloud.instance_type("10.0.0.1"), "BCC");
    }
}
