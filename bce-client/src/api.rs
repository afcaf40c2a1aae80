//! Remote API trait definitions.
//!
//! One trait per remote service so the reconcilers only depend on what
//! they call. Every call is a single synchronous request/response; state
//! changes are only ever observed by describing or listing again.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    BackendServer, CreateEipArgs, CreateLoadBalancerArgs, CreateLoadBalancerResponse,
    CreateRouteRuleArgs, Eip, EipInstanceType, Instance, LoadBalancer, RouteTable, TcpListener,
};

/// Load balancer (BLB) operations.
#[async_trait]
pub trait BlbApi: Send + Sync {
    /// Describe load balancers whose name matches `name`.
    async fn describe_load_balancers(&self, name: &str) -> Result<Vec<LoadBalancer>>;

    /// Create a load balancer.
    async fn create_load_balancer(
        &self,
        args: &CreateLoadBalancerArgs,
    ) -> Result<CreateLoadBalancerResponse>;

    /// Delete a load balancer.
    async fn delete_load_balancer(&self, lb_id: &str) -> Result<()>;

    /// Describe the TCP listeners of a load balancer, optionally a single port.
    async fn describe_tcp_listeners(
        &self,
        lb_id: &str,
        port: Option<u16>,
    ) -> Result<Vec<TcpListener>>;

    /// Create a TCP listener.
    async fn create_tcp_listener(&self, lb_id: &str, listener: &TcpListener) -> Result<()>;

    /// Update backend port and scheduler of an existing TCP listener.
    async fn update_tcp_listener(&self, lb_id: &str, listener: &TcpListener) -> Result<()>;

    /// Delete listeners on the given ports, whatever their protocol.
    async fn delete_listeners(&self, lb_id: &str, ports: &[u16]) -> Result<()>;

    /// Describe the backend servers of a load balancer.
    async fn describe_backend_servers(&self, lb_id: &str) -> Result<Vec<BackendServer>>;

    /// Register backend servers.
    async fn add_backend_servers(&self, lb_id: &str, servers: &[BackendServer]) -> Result<()>;

    /// Deregister backend servers by instance ID.
    async fn remove_backend_servers(&self, lb_id: &str, instance_ids: &[String]) -> Result<()>;
}

/// Elastic IP operations.
#[async_trait]
pub trait EipApi: Send + Sync {
    /// Create an EIP, returning its address.
    async fn create_eip(&self, args: &CreateEipArgs) -> Result<String>;

    /// List EIPs, optionally only the given address.
    async fn get_eips(&self, ip: Option<&str>) -> Result<Vec<Eip>>;

    /// Bind an EIP to an instance.
    async fn bind_eip(
        &self,
        ip: &str,
        instance_type: EipInstanceType,
        instance_id: &str,
    ) -> Result<()>;

    /// Unbind an EIP from whatever it is bound to.
    async fn unbind_eip(&self, ip: &str) -> Result<()>;

    /// Release an EIP.
    async fn delete_eip(&self, ip: &str) -> Result<()>;
}

/// VPC route table operations.
#[async_trait]
pub trait VpcApi: Send + Sync {
    /// Get the route table of a VPC, including all of its rules.
    async fn get_route_table(&self, vpc_id: &str) -> Result<RouteTable>;

    /// Create a route rule, returning its ID.
    async fn create_route_rule(&self, args: &CreateRouteRuleArgs) -> Result<String>;

    /// Delete a route rule.
    async fn delete_route_rule(&self, rule_id: &str) -> Result<()>;
}

/// Read-only view of the cluster's instance inventory.
#[async_trait]
pub trait InstanceApi: Send + Sync {
    /// List all instances of a cluster.
    async fn list_instances(&self, cluster_id: &str) -> Result<Vec<Instance>>;
}

/// Everything the cloud controller talks to.
pub trait CloudApi: BlbApi + EipApi + VpcApi + InstanceApi {}

impl<T: BlbApi + EipApi + VpcApi + InstanceApi> CloudApi for T {}
