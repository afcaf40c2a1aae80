//! In-memory simulation of the remote APIs for tests.
//!
//! [`FakeCloud`] keeps the state a real region would hold and records every
//! call it receives. It reproduces the two properties the reconcilers have
//! to cope with: resources move through non-terminal states before they
//! become usable, and a freshly created load balancer may not show up in
//! listings yet.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::api::{BlbApi, EipApi, InstanceApi, VpcApi};
use crate::error::{ApiError, Result};
use crate::types::{
    BackendServer, CreateEipArgs, CreateLoadBalancerArgs, CreateLoadBalancerResponse,
    CreateRouteRuleArgs, Eip, EipInstanceType, EipStatus, Instance, InstanceStatus,
    LoadBalancer, LoadBalancerStatus, RouteRule, RouteTable, TcpListener,
};

/// VPC used by [`instance`] and the default route table.
pub const DEFAULT_VPC_ID: &str = "vpc-test";

/// A call received by [`FakeCloud`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    DescribeLoadBalancers { name: String },
    CreateLoadBalancer { name: String },
    DeleteLoadBalancer { lb_id: String },
    DescribeTcpListeners { lb_id: String },
    CreateTcpListener { lb_id: String, port: u16 },
    UpdateTcpListener { lb_id: String, port: u16 },
    DeleteListeners { lb_id: String, ports: Vec<u16> },
    DescribeBackendServers { lb_id: String },
    AddBackendServers { lb_id: String, instance_ids: Vec<String> },
    RemoveBackendServers { lb_id: String, instance_ids: Vec<String> },
    CreateEip { name: String },
    GetEips,
    BindEip { ip: String, instance_id: String },
    UnbindEip { ip: String },
    DeleteEip { ip: String },
    GetRouteTable { vpc_id: String },
    CreateRouteRule { destination: String, nexthop_id: String },
    DeleteRouteRule { rule_id: String },
    ListInstances,
}

impl Call {
    /// Whether the call changes remote state.
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Call::DescribeLoadBalancers { .. }
                | Call::DescribeTcpListeners { .. }
                | Call::DescribeBackendServers { .. }
                | Call::GetEips
                | Call::GetRouteTable { .. }
                | Call::ListInstances
        )
    }
}

/// How sluggish the simulated region is, counted in describe calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct FakeSettings {
    /// Describes a new load balancer stays invisible for.
    pub lb_visibility_lag: u32,
    /// Describes a visible new load balancer reports `creating` for.
    pub lb_settle: u32,
    /// Describes a load balancer reports `updating` for after a listener change.
    pub listener_settle: u32,
    /// Describes an EIP reports `creating`/`unbinding` for.
    pub eip_settle: u32,
}

struct FakeLoadBalancer {
    lb: LoadBalancer,
    hidden_for: u32,
    pending: u32,
    listeners: BTreeMap<u16, TcpListener>,
    backends: Vec<BackendServer>,
}

struct FakeEip {
    eip: Eip,
    pending: u32,
}

type FailurePredicate = Box<dyn Fn(&Call) -> bool + Send>;

#[derive(Default)]
struct State {
    next_id: u64,
    settings: FakeSettings,
    load_balancers: Vec<FakeLoadBalancer>,
    eips: Vec<FakeEip>,
    route_tables: Vec<RouteTable>,
    instances: Vec<Instance>,
    calls: Vec<Call>,
    failure: Option<FailurePredicate>,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn record(&mut self, call: Call) -> Result<()> {
        let fail = self.failure.as_ref().is_some_and(|matches| matches(&call));
        self.calls.push(call);
        if fail {
            self.failure = None;
            return Err(ApiError::Status {
                status: 500,
                code: "InternalError".to_string(),
                message: "injected failure".to_string(),
                request_id: "fake".to_string(),
            });
        }
        Ok(())
    }

    fn lb_mut(&mut self, lb_id: &str) -> Result<&mut FakeLoadBalancer> {
        self.load_balancers
            .iter_mut()
            .find(|f| f.lb.blb_id == lb_id)
            .ok_or_else(|| not_found(format!("load balancer {}", lb_id)))
    }

    fn available_lb_mut(&mut self, lb_id: &str) -> Result<&mut FakeLoadBalancer> {
        let fake = self.lb_mut(lb_id)?;
        if !fake.lb.is_available() {
            return Err(conflict(format!(
                "load balancer {} is {:?}",
                lb_id, fake.lb.status
            )));
        }
        Ok(fake)
    }

    fn eip_mut(&mut self, ip: &str) -> Result<&mut FakeEip> {
        self.eips
            .iter_mut()
            .find(|f| f.eip.eip == ip)
            .ok_or_else(|| not_found(format!("EIP {}", ip)))
    }

    fn perturb(&mut self, lb_id: &str) -> Result<()> {
        let settle = self.settings.listener_settle;
        let fake = self.lb_mut(lb_id)?;
        if settle > 0 {
            fake.lb.status = LoadBalancerStatus::Updating;
            fake.pending = settle;
        }
        Ok(())
    }
}

fn not_found(what: String) -> ApiError {
    ApiError::Status {
        status: 404,
        code: "NoSuchObject".to_string(),
        message: format!("{} does not exist", what),
        request_id: "fake".to_string(),
    }
}

fn conflict(message: String) -> ApiError {
    ApiError::Status {
        status: 409,
        code: "OperationDenied".to_string(),
        message,
        request_id: "fake".to_string(),
    }
}

/// A running cluster instance in [`DEFAULT_VPC_ID`].
pub fn instance(instance_id: &str, internal_ip: &str) -> Instance {
    Instance {
        instance_id: instance_id.to_string(),
        instance_name: format!("node-{}", instance_id),
        status: InstanceStatus::Running,
        internal_ip: internal_ip.to_string(),
        zone_name: "cn-bj-a".to_string(),
        vpc_id: DEFAULT_VPC_ID.to_string(),
        subnet_id: "sbn-test".to_string(),
    }
}

/// In-memory stand-in for the BLB, EIP, VPC and CCE APIs.
pub struct FakeCloud {
    state: Mutex<State>,
}

impl Default for FakeCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeCloud {
    /// A region where everything settles immediately, with an empty route
    /// table for [`DEFAULT_VPC_ID`].
    pub fn new() -> Self {
        Self::with_settings(FakeSettings::default())
    }

    pub fn with_settings(settings: FakeSettings) -> Self {
        let state = State {
            settings,
            route_tables: vec![RouteTable {
                route_table_id: "rt-test".to_string(),
                vpc_id: DEFAULT_VPC_ID.to_string(),
                route_rules: vec![],
            }],
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // -------------------------------------------------------------------------
    // Seeding
    // -------------------------------------------------------------------------

    pub fn add_instance(&self, instance: Instance) {
        self.state().instances.push(instance);
    }

    /// Seed an existing load balancer that stays in `status` until changed.
    pub fn seed_load_balancer(&self, name: &str, status: LoadBalancerStatus) -> String {
        let mut state = self.state();
        let blb_id = format!("lb-{}", state.next_id());
        let address = format!("192.168.0.{}", state.next_id);
        state.load_balancers.push(FakeLoadBalancer {
            lb: LoadBalancer {
                blb_id: blb_id.clone(),
                name: name.to_string(),
                desc: String::new(),
                address,
                status,
                public_ip: String::new(),
            },
            hidden_for: 0,
            pending: 0,
            listeners: BTreeMap::new(),
            backends: vec![],
        });
        blb_id
    }

    pub fn seed_listener(&self, lb_id: &str, listener: TcpListener) {
        if let Ok(fake) = self.state().lb_mut(lb_id) {
            fake.listeners.insert(listener.listener_port, listener);
        }
    }

    pub fn seed_backend(&self, lb_id: &str, server: BackendServer) {
        if let Ok(fake) = self.state().lb_mut(lb_id) {
            fake.backends.push(server);
        }
    }

    /// Seed an EIP that is already `available`.
    pub fn seed_eip(&self, name: &str) -> String {
        let mut state = self.state();
        let ip = format!("180.76.0.{}", state.next_id());
        state.eips.push(FakeEip {
            eip: Eip {
                name: name.to_string(),
                eip: ip.clone(),
                status: EipStatus::Available,
                instance_type: String::new(),
                instance_id: String::new(),
                bandwidth_in_mbps: 1000,
            },
            pending: 0,
        });
        ip
    }

    /// Seed a route rule into the table of [`DEFAULT_VPC_ID`].
    pub fn seed_route_rule(
        &self,
        destination: &str,
        source: &str,
        nexthop_type: &str,
        nexthop_id: &str,
    ) -> String {
        let mut state = self.state();
        let rule_id = format!("rr-{}", state.next_id());
        if let Some(table) = state.route_tables.first_mut() {
            table.route_rules.push(RouteRule {
                route_rule_id: rule_id.clone(),
                route_table_id: table.route_table_id.clone(),
                source_address: source.to_string(),
                destination_address: destination.to_string(),
                nexthop_id: nexthop_id.to_string(),
                nexthop_type: nexthop_type.to_string(),
                description: String::new(),
            });
        }
        rule_id
    }

    pub fn set_load_balancer_status(&self, lb_id: &str, status: LoadBalancerStatus) {
        if let Ok(fake) = self.state().lb_mut(lb_id) {
            fake.lb.status = status;
            fake.pending = 0;
        }
    }

    /// Fail the next call matching `matches` with a 500.
    pub fn fail_next(&self, matches: impl Fn(&Call) -> bool + Send + 'static) {
        self.state().failure = Some(Box::new(matches));
    }

    // -------------------------------------------------------------------------
    // Inspection (not recorded as calls)
    // -------------------------------------------------------------------------

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.is_mutation())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn load_balancers(&self) -> Vec<LoadBalancer> {
        self.state()
            .load_balancers
            .iter()
            .map(|f| f.lb.clone())
            .collect()
    }

    pub fn load_balancer(&self, name: &str) -> Option<LoadBalancer> {
        self.load_balancers().into_iter().find(|lb| lb.name == name)
    }

    pub fn listeners(&self, lb_id: &str) -> Vec<TcpListener> {
        self.state()
            .lb_mut(lb_id)
            .map(|f| f.listeners.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn backends(&self, lb_id: &str) -> Vec<BackendServer> {
        self.state()
            .lb_mut(lb_id)
            .map(|f| f.backends.clone())
            .unwrap_or_default()
    }

    pub fn eips(&self) -> Vec<Eip> {
        self.state().eips.iter().map(|f| f.eip.clone()).collect()
    }

    pub fn route_rules(&self) -> Vec<RouteRule> {
        self.state()
            .route_tables
            .iter()
            .flat_map(|t| t.route_rules.clone())
            .collect()
    }
}

#[async_trait]
impl BlbApi for FakeCloud {
    async fn describe_load_balancers(&self, name: &str) -> Result<Vec<LoadBalancer>> {
        let mut state = self.state();
        state.record(Call::DescribeLoadBalancers {
            name: name.to_string(),
        })?;

        let mut found = vec![];
        for fake in state.load_balancers.iter_mut() {
            // The real API matches names fuzzily.
            if !fake.lb.name.contains(name) {
                continue;
            }
            if fake.hidden_for > 0 {
                fake.hidden_for -= 1;
                continue;
            }
            found.push(fake.lb.clone());
            if fake.pending > 0 {
                fake.pending -= 1;
                if fake.pending == 0 {
                    fake.lb.status = LoadBalancerStatus::Available;
                }
            }
        }
        Ok(found)
    }

    async fn create_load_balancer(
        &self,
        args: &CreateLoadBalancerArgs,
    ) -> Result<CreateLoadBalancerResponse> {
        let mut state = self.state();
        state.record(Call::CreateLoadBalancer {
            name: args.name.clone(),
        })?;

        let blb_id = format!("lb-{}", state.next_id());
        let address = format!("192.168.0.{}", state.next_id);
        let settings = state.settings;
        let status = if settings.lb_settle > 0 {
            LoadBalancerStatus::Creating
        } else {
            LoadBalancerStatus::Available
        };
        state.load_balancers.push(FakeLoadBalancer {
            lb: LoadBalancer {
                blb_id: blb_id.clone(),
                name: args.name.clone(),
                desc: args.desc.clone(),
                address: address.clone(),
                status,
                public_ip: String::new(),
            },
            hidden_for: settings.lb_visibility_lag,
            pending: settings.lb_settle,
            listeners: BTreeMap::new(),
            backends: vec![],
        });
        Ok(CreateLoadBalancerResponse {
            blb_id,
            name: args.name.clone(),
            address,
        })
    }

    async fn delete_load_balancer(&self, lb_id: &str) -> Result<()> {
        let mut state = self.state();
        state.record(Call::DeleteLoadBalancer {
            lb_id: lb_id.to_string(),
        })?;

        state.lb_mut(lb_id)?;
        state.load_balancers.retain(|f| f.lb.blb_id != lb_id);
        for fake in state.eips.iter_mut().filter(|f| f.eip.is_bound_to(lb_id)) {
            fake.eip.status = EipStatus::Available;
            fake.eip.instance_id.clear();
            fake.eip.instance_type.clear();
        }
        Ok(())
    }

    async fn describe_tcp_listeners(
        &self,
        lb_id: &str,
        port: Option<u16>,
    ) -> Result<Vec<TcpListener>> {
        let mut state = self.state();
        state.record(Call::DescribeTcpListeners {
            lb_id: lb_id.to_string(),
        })?;

        let fake = state.lb_mut(lb_id)?;
        Ok(fake
            .listeners
            .values()
            .filter(|l| port.is_none_or(|p| l.listener_port == p))
            .cloned()
            .collect())
    }

    async fn create_tcp_listener(&self, lb_id: &str, listener: &TcpListener) -> Result<()> {
        let mut state = self.state();
        state.record(Call::CreateTcpListener {
            lb_id: lb_id.to_string(),
            port: listener.listener_port,
        })?;

        let fake = state.lb_mut(lb_id)?;
        if fake.listeners.contains_key(&listener.listener_port) {
            return Err(conflict(format!(
                "port {} already has a listener",
                listener.listener_port
            )));
        }
        fake.listeners
            .insert(listener.listener_port, listener.clone());
        state.perturb(lb_id)
    }

    async fn update_tcp_listener(&self, lb_id: &str, listener: &TcpListener) -> Result<()> {
        let mut state = self.state();
        state.record(Call::UpdateTcpListener {
            lb_id: lb_id.to_string(),
            port: listener.listener_port,
        })?;

        let fake = state.lb_mut(lb_id)?;
        match fake.listeners.get_mut(&listener.listener_port) {
            Some(existing) => *existing = listener.clone(),
            None => {
                return Err(not_found(format!(
                    "listener {} on {}",
                    listener.listener_port, lb_id
                )));
            }
        }
        state.perturb(lb_id)
    }

    async fn delete_listeners(&self, lb_id: &str, ports: &[u16]) -> Result<()> {
        let mut state = self.state();
        state.record(Call::DeleteListeners {
            lb_id: lb_id.to_string(),
            ports: ports.to_vec(),
        })?;

        let fake = state.lb_mut(lb_id)?;
        for port in ports {
            fake.listeners.remove(port);
        }
        state.perturb(lb_id)
    }

    async fn describe_backend_servers(&self, lb_id: &str) -> Result<Vec<BackendServer>> {
        let mut state = self.state();
        state.record(Call::DescribeBackendServers {
            lb_id: lb_id.to_string(),
        })?;

        Ok(state.lb_mut(lb_id)?.backends.clone())
    }

    async fn add_backend_servers(&self, lb_id: &str, servers: &[BackendServer]) -> Result<()> {
        let mut state = self.state();
        state.record(Call::AddBackendServers {
            lb_id: lb_id.to_string(),
            instance_ids: servers.iter().map(|s| s.instance_id.clone()).collect(),
        })?;

        let fake = state.available_lb_mut(lb_id)?;
        for server in servers {
            if fake.backends.iter().any(|b| b.instance_id == server.instance_id) {
                return Err(conflict(format!(
                    "{} is already a backend server",
                    server.instance_id
                )));
            }
            fake.backends.push(server.clone());
        }
        Ok(())
    }

    async fn remove_backend_servers(&self, lb_id: &str, instance_ids: &[String]) -> Result<()> {
        let mut state = self.state();
        state.record(Call::RemoveBackendServers {
            lb_id: lb_id.to_string(),
            instance_ids: instance_ids.to_vec(),
        })?;

        let fake = state.available_lb_mut(lb_id)?;
        fake.backends
            .retain(|b| !instance_ids.contains(&b.instance_id));
        Ok(())
    }
}

#[async_trait]
impl EipApi for FakeCloud {
    async fn create_eip(&self, args: &CreateEipArgs) -> Result<String> {
        let mut state = self.state();
        state.record(Call::CreateEip {
            name: args.name.clone(),
        })?;

        let ip = format!("180.76.0.{}", state.next_id());
        let settle = state.settings.eip_settle;
        state.eips.push(FakeEip {
            eip: Eip {
                name: args.name.clone(),
                eip: ip.clone(),
                status: if settle > 0 {
                    EipStatus::Creating
                } else {
                    EipStatus::Available
                },
                instance_type: String::new(),
                instance_id: String::new(),
                bandwidth_in_mbps: args.bandwidth_in_mbps,
            },
            pending: settle,
        });
        Ok(ip)
    }

    async fn get_eips(&self, ip: Option<&str>) -> Result<Vec<Eip>> {
        let mut state = self.state();
        state.record(Call::GetEips)?;

        let mut found = vec![];
        for fake in state.eips.iter_mut() {
            if ip.is_some_and(|ip| fake.eip.eip != ip) {
                continue;
            }
            found.push(fake.eip.clone());
            if fake.pending > 0 {
                fake.pending -= 1;
                if fake.pending == 0 {
                    fake.eip.status = EipStatus::Available;
                }
            }
        }
        Ok(found)
    }

    async fn bind_eip(
        &self,
        ip: &str,
        instance_type: EipInstanceType,
        instance_id: &str,
    ) -> Result<()> {
        let mut state = self.state();
        state.record(Call::BindEip {
            ip: ip.to_string(),
            instance_id: instance_id.to_string(),
        })?;

        if !state.eip_mut(ip)?.eip.is_available() {
            return Err(conflict(format!("EIP {} is not available", ip)));
        }
        state.available_lb_mut(instance_id)?.lb.public_ip = ip.to_string();
        let fake = state.eip_mut(ip)?;
        fake.eip.status = EipStatus::Binded;
        fake.eip.instance_type = instance_type.as_str().to_string();
        fake.eip.instance_id = instance_id.to_string();
        Ok(())
    }

    async fn unbind_eip(&self, ip: &str) -> Result<()> {
        let mut state = self.state();
        state.record(Call::UnbindEip { ip: ip.to_string() })?;

        let settle = state.settings.eip_settle;
        let fake = state.eip_mut(ip)?;
        if fake.eip.instance_id.is_empty() {
            return Err(conflict(format!("EIP {} is not bound", ip)));
        }
        let lb_id = std::mem::take(&mut fake.eip.instance_id);
        fake.eip.instance_type.clear();
        if settle > 0 {
            fake.eip.status = EipStatus::Unbinding;
            fake.pending = settle;
        } else {
            fake.eip.status = EipStatus::Available;
        }
        if let Ok(lb) = state.lb_mut(&lb_id) {
            lb.lb.public_ip.clear();
        }
        Ok(())
    }

    async fn delete_eip(&self, ip: &str) -> Result<()> {
        let mut state = self.state();
        state.record(Call::DeleteEip { ip: ip.to_string() })?;

        if !state.eip_mut(ip)?.eip.is_available() {
            return Err(conflict(format!("EIP {} is not available", ip)));
        }
        state.eips.retain(|f| f.eip.eip != ip);
        Ok(())
    }
}

#[async_trait]
impl VpcApi for FakeCloud {
    async fn get_route_table(&self, vpc_id: &str) -> Result<RouteTable> {
        let mut state = self.state();
        state.record(Call::GetRouteTable {
            vpc_id: vpc_id.to_string(),
        })?;

        state
            .route_tables
            .iter()
            .find(|t| t.vpc_id == vpc_id)
            .cloned()
            .ok_or_else(|| not_found(format!("route table of {}", vpc_id)))
    }

    async fn create_route_rule(&self, args: &CreateRouteRuleArgs) -> Result<String> {
        let mut state = self.state();
        state.record(Call::CreateRouteRule {
            destination: args.destination_address.clone(),
            nexthop_id: args.nexthop_id.clone(),
        })?;

        let rule_id = format!("rr-{}", state.next_id());
        let table = state
            .route_tables
            .iter_mut()
            .find(|t| t.route_table_id == args.route_table_id)
            .ok_or_else(|| not_found(format!("route table {}", args.route_table_id)))?;
        table.route_rules.push(RouteRule {
            route_rule_id: rule_id.clone(),
            route_table_id: args.route_table_id.clone(),
            source_address: args.source_address.clone(),
            destination_address: args.destination_address.clone(),
            nexthop_id: args.nexthop_id.clone(),
            nexthop_type: args.nexthop_type.clone(),
            description: args.description.clone(),
        });
        Ok(rule_id)
    }

    async fn delete_route_rule(&self, rule_id: &str) -> Result<()> {
        let mut state = self.state();
        state.record(Call::DeleteRouteRule {
            rule_id: rule_id.to_string(),
        })?;

        let table = state
            .route_tables
            .iter_mut()
            .find(|t| t.route_rules.iter().any(|r| r.route_rule_id == rule_id))
            .ok_or_else(|| not_found(format!("route rule {}", rule_id)))?;
        table.route_rules.retain(|r| r.route_rule_id != rule_id);
        Ok(())
    }
}

#[async_trait]
impl InstanceApi for FakeCloud {
    async fn list_instances(&self, _cluster_id: &str) -> Result<Vec<Instance>> {
        let mut state = self.state();
        state.record(Call::ListInstances)?;
        Ok(state.instances.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_created_load_balancer_settles_after_describes() {
        let cloud = FakeCloud::with_settings(FakeSettings {
            lb_visibility_lag: 1,
            lb_settle: 2,
            ..Default::default()
        });
        cloud
            .create_load_balancer(&CreateLoadBalancerArgs {
                name: "web".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(cloud.describe_load_balancers("web").await.unwrap().is_empty());
        let seen: Vec<_> = [
            cloud.describe_load_balancers("web").await.unwrap(),
            cloud.describe_load_balancers("web").await.unwrap(),
            cloud.describe_load_balancers("web").await.unwrap(),
        ]
        .into_iter()
        .map(|lbs| lbs[0].status)
        .collect();
        assert_eq!(
            seen,
            vec![
                LoadBalancerStatus::Creating,
                LoadBalancerStatus::Creating,
                LoadBalancerStatus::Available
            ]
        );
    }

    #[tokio::test]
    async fn test_backend_changes_require_available_load_balancer() {
        let cloud = FakeCloud::new();
        let lb_id = cloud.seed_load_balancer("web", LoadBalancerStatus::Updating);
        let err = cloud
            .add_backend_servers(
                &lb_id,
                &[BackendServer {
                    instance_id: "i-1".to_string(),
                    weight: 100,
                }],
            )
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(409));
    }

    #[tokio::test]
    async fn test_fail_next_is_one_shot() {
        let cloud = FakeCloud::new();
        cloud.fail_next(|c| matches!(c, Call::ListInstances));
        assert!(cloud.list_instances("c-1").await.is_err());
        assert!(cloud.list_instances("c-1").await.is_ok());
        assert_eq!(cloud.calls().len(), 2);
        assert!(cloud.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_bind_and_unbind_track_public_ip() {
        let cloud = FakeCloud::new();
        let lb_id = cloud.seed_load_balancer("web", LoadBalancerStatus::Available);
        let ip = cloud.seed_eip("web");

        cloud.bind_eip(&ip, EipInstanceType::Blb, &lb_id).await.unwrap();
        assert_eq!(cloud.load_balancer("web").unwrap().public_ip, ip);
        assert!(cloud.delete_eip(&ip).await.is_err());

        cloud.unbind_eip(&ip).await.unwrap();
        assert_eq!(cloud.load_balancer("web").unwrap().public_ip(), None);
        cloud.delete_eip(&ip).await.unwrap();
        assert!(cloud.eips().is_empty());
    }
}
