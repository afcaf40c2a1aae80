//! Wire types for the BLB, EIP, VPC and CCE APIs.
//!
//! Field names follow the provider's camelCase JSON. Status enums decode
//! values they do not know as `Unknown` instead of failing the whole listing.

use serde::{Deserialize, Serialize};

/// Next-hop type of route rules owned by the cloud controller.
pub const NEXTHOP_TYPE_CUSTOM: &str = "custom";

// =============================================================================
// BLB
// =============================================================================

/// Lifecycle status of a load balancer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadBalancerStatus {
    Creating,
    Available,
    Updating,
    Paused,
    Unavailable,
    #[serde(other)]
    Unknown,
}

/// A layer-4 load balancer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancer {
    pub blb_id: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    /// Internal (VPC) address.
    #[serde(default)]
    pub address: String,
    pub status: LoadBalancerStatus,
    /// Bound EIP, empty when none.
    #[serde(default)]
    pub public_ip: String,
}

impl LoadBalancer {
    /// Only an available load balancer accepts listener, backend or EIP changes.
    pub fn is_available(&self) -> bool {
        self.status == LoadBalancerStatus::Available
    }

    /// The bound public IP, if any.
    pub fn public_ip(&self) -> Option<&str> {
        Some(self.public_ip.as_str()).filter(|ip| !ip.is_empty())
    }
}

/// Request body for creating a load balancer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLoadBalancerArgs {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub desc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
}

/// Response of a load balancer creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLoadBalancerResponse {
    pub blb_id: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
}

/// A TCP listener as described, created or updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TcpListener {
    pub listener_port: u16,
    pub backend_port: u16,
    pub scheduler: String,
}

/// A backend server registered on a load balancer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendServer {
    pub instance_id: String,
    pub weight: u32,
}

// =============================================================================
// EIP
// =============================================================================

/// Lifecycle status of an elastic IP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EipStatus {
    Creating,
    Available,
    Binded,
    Binding,
    Unbinding,
    Updating,
    Paused,
    Unavailable,
    #[serde(other)]
    Unknown,
}

/// Kind of resource an EIP is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EipInstanceType {
    #[serde(rename = "BLB")]
    Blb,
    #[serde(rename = "BCC")]
    Bcc,
}

impl EipInstanceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EipInstanceType::Blb => "BLB",
            EipInstanceType::Bcc => "BCC",
        }
    }
}

/// An elastic IP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip {
    #[serde(default)]
    pub name: String,
    pub eip: String,
    pub status: EipStatus,
    /// `BLB` or `BCC` while bound, empty otherwise.
    #[serde(default)]
    pub instance_type: String,
    #[serde(default)]
    pub instance_id: String,
    #[serde(default)]
    pub bandwidth_in_mbps: u32,
}

impl Eip {
    pub fn is_available(&self) -> bool {
        self.status == EipStatus::Available
    }

    /// Whether the EIP is bound (or binding) to the given instance.
    pub fn is_bound_to(&self, instance_id: &str) -> bool {
        !self.instance_id.is_empty() && self.instance_id == instance_id
    }
}

/// Billing options of a new EIP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Billing {
    pub payment_timing: String,
    pub billing_method: String,
}

/// Request body for creating an EIP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEipArgs {
    pub bandwidth_in_mbps: u32,
    pub billing: Billing,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

impl CreateEipArgs {
    /// Postpaid, traffic-billed EIP named after the load balancer it will front.
    pub fn for_load_balancer(name: &str) -> Self {
        Self {
            bandwidth_in_mbps: 1000,
            billing: Billing {
                payment_timing: "Postpaid".to_string(),
                billing_method: "ByTraffic".to_string(),
            },
            name: name.to_string(),
        }
    }
}

// =============================================================================
// VPC
// =============================================================================

/// The route table of a VPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteTable {
    pub route_table_id: String,
    pub vpc_id: String,
    #[serde(default)]
    pub route_rules: Vec<RouteRule>,
}

/// A single route table row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRule {
    pub route_rule_id: String,
    #[serde(default)]
    pub route_table_id: String,
    pub source_address: String,
    pub destination_address: String,
    #[serde(default)]
    pub nexthop_id: String,
    pub nexthop_type: String,
    #[serde(default)]
    pub description: String,
}

/// Request body for creating a route rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRouteRuleArgs {
    pub route_table_id: String,
    pub source_address: String,
    pub destination_address: String,
    pub nexthop_id: String,
    pub nexthop_type: String,
    #[serde(default)]
    pub description: String,
}

// =============================================================================
// CCE instances
// =============================================================================

/// Status of a cluster instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceStatus {
    Creating,
    Running,
    Starting,
    Stopping,
    Stopped,
    Deleting,
    Deleted,
    CreateFailed,
    Error,
    Expired,
    #[serde(other)]
    Unknown,
}

impl InstanceStatus {
    /// Failed or going away; routes towards such an instance are pointless.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InstanceStatus::CreateFailed
                | InstanceStatus::Deleted
                | InstanceStatus::Deleting
                | InstanceStatus::Error
        )
    }
}

/// A cluster node's backing compute instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    #[serde(rename = "id")]
    pub instance_id: String,
    #[serde(rename = "name", default)]
    pub instance_name: String,
    pub status: InstanceStatus,
    #[serde(default)]
    pub internal_ip: String,
    #[serde(default)]
    pub zone_name: String,
    #[serde(default)]
    pub vpc_id: String,
    #[serde(default)]
    pub subnet_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_balancer_decodes_unknown_status() {
        let lb: LoadBalancer = serde_json::from_str(
            r#"{"blbId":"lb-1","name":"web","address":"10.0.0.5","status":"migrating"}"#,
        )
        .unwrap();
        assert_eq!(lb.status, LoadBalancerStatus::Unknown);
        assert_eq!(lb.public_ip(), None);
        assert!(!lb.is_available());
    }

    #[test]
    fn test_eip_binding_fields() {
        let eip: Eip = serde_json::from_str(
            r#"{"name":"web","eip":"180.76.1.1","status":"binded","instanceType":"BLB","instanceId":"lb-1"}"#,
        )
        .unwrap();
        assert_eq!(eip.status, EipStatus::Binded);
        assert!(eip.is_bound_to("lb-1"));
        assert!(!eip.is_bound_to("lb-2"));
    }

    #[test]
    fn test_instance_terminal_statuses() {
        let ins: Instance = serde_json::from_str(
            r#"{"id":"i-1","name":"node-1","status":"CreateFailed","internalIp":"10.0.0.2"}"#,
        )
        .unwrap();
        assert!(ins.status.is_terminal());
        assert!(!InstanceStatus::Running.is_terminal());
    }

    #[test]
    fn test_create_eip_args_serialization() {
        let json = serde_json::to_value(CreateEipArgs::for_load_balancer("web")).unwrap();
        assert_eq!(json["bandwidthInMbps"], 1000);
        assert_eq!(json["billing"]["paymentTiming"], "Postpaid");
        assert_eq!(json["billing"]["billingMethod"], "ByTraffic");
        assert_eq!(json["name"], "web");
    }
}
