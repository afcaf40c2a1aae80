//! Desired state as handed over by the orchestrator.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CcmError, Result};
use crate::reconciler::listener::Listener;

/// Longest load balancer name the provider accepts.
pub const MAX_LOAD_BALANCER_NAME_LEN: usize = 64;

/// Hex digits of the hash suffix in a load balancer name.
const NAME_HASH_LEN: usize = 8;

/// 32-bit FNV-1a. Fixed here because the result is persisted remotely.
fn fnv1a(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0x811c_9dc5, |hash: u32, &b| {
        (hash ^ u32::from(b)).wrapping_mul(0x0100_0193)
    })
}

/// Listener scheduler used for every listener this controller creates.
pub const DEFAULT_SCHEDULER: &str = "RoundRobin";

/// Listener protocol.
///
/// Only TCP is implemented. HTTP, HTTPS and UDP listeners live behind their
/// own provider endpoints; supporting one means adding a variant here, a
/// describe call in `ListenerReconciler::actual` and an arm in its
/// create/update dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Protocol {
    #[serde(rename = "TCP")]
    Tcp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = CcmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "TCP" => Ok(Protocol::Tcp),
            "UDP" | "SCTP" | "HTTP" | "HTTPS" => Err(CcmError::Unsupported(format!(
                "{} listeners (only TCP load balancers are supported)",
                s
            ))),
            _ => Err(CcmError::Validation(format!("unknown protocol {:?}", s))),
        }
    }
}

fn default_protocol() -> String {
    Protocol::Tcp.as_str().to_string()
}

/// A port exposed by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePort {
    #[serde(default)]
    pub name: Option<String>,
    pub port: u16,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    /// Port on every node traffic is forwarded to.
    pub node_port: u16,
}

/// The service a load balancer fronts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub ports: Vec<ServicePort>,
    /// Fixed public address requested by the user. Never supported.
    #[serde(default)]
    pub load_balancer_ip: Option<String>,
}

/// A cluster node as known to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub name: String,
    pub internal_ip: String,
    /// Cloud instance ID, when the orchestrator already knows it.
    #[serde(default)]
    pub instance_id: Option<String>,
}

/// What a load balancer should look like after convergence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredEndpointSet {
    pub listeners: Vec<Listener>,
    /// Backend members by cloud instance ID.
    pub members: BTreeSet<String>,
}

impl ServiceSpec {
    /// A service with no ports, for lookups and deletion.
    pub fn named(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            ports: vec![],
            load_balancer_ip: None,
        }
    }

    /// Remote name of the service's load balancer.
    ///
    /// A readable `namespace-name` prefix followed by a hash of the exact
    /// `namespace/name` pair. Sanitizing and truncating the prefix can map
    /// different services onto the same text; the suffix keeps them apart.
    /// Stable across calls and releases, which is what makes repeated
    /// convergence find the balancer it created earlier.
    pub fn load_balancer_name(&self) -> String {
        let mut prefix: String = format!("{}-{}", self.namespace, self.name)
            .chars()
            .map(|c| {
                let c = c.to_ascii_lowercase();
                if c.is_ascii_alphanumeric() || c == '-' {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        prefix.truncate(MAX_LOAD_BALANCER_NAME_LEN - NAME_HASH_LEN - 1);
        let key = format!("{}/{}", self.namespace, self.name);
        format!("{}-{:08x}", prefix, fnv1a(key.as_bytes()))
    }

    /// Check the load balancer preconditions and derive the desired listeners.
    pub fn validate(&self) -> Result<Vec<Listener>> {
        if self.ports.is_empty() {
            return Err(CcmError::Validation(
                "requested load balancer with no ports".to_string(),
            ));
        }
        if self.load_balancer_ip.as_deref().is_some_and(|ip| !ip.is_empty()) {
            return Err(CcmError::Validation(
                "loadBalancerIP cannot be specified, a public IP is always allocated".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        let mut listeners = Vec::with_capacity(self.ports.len());
        for port in &self.ports {
            let protocol: Protocol = port.protocol.parse()?;
            if !seen.insert(port.port) {
                return Err(CcmError::Validation(format!(
                    "port {} is declared more than once",
                    port.port
                )));
            }
            if port.node_port == 0 {
                return Err(CcmError::Validation(format!(
                    "port {} has no node port",
                    port.port
                )));
            }
            listeners.push(Listener {
                port: port.port,
                protocol,
                backend_port: port.node_port,
                scheduler: DEFAULT_SCHEDULER.to_string(),
            });
        }
        Ok(listeners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(port: u16, protocol: &str, node_port: u16) -> ServicePort {
        ServicePort {
            name: None,
            port,
            protocol: protocol.to_string(),
            node_port,
        }
    }

    fn service(ports: Vec<ServicePort>) -> ServiceSpec {
        ServiceSpec {
            ports,
            ..ServiceSpec::named("default", "web")
        }
    }

    #[test]
    fn test_load_balancer_name_is_stable_and_sanitized() {
        let svc = ServiceSpec::named("Kube_System", "dns.v2");
        let name = svc.load_balancer_name();
        assert!(name.starts_with("kube-system-dns-v2-"), "{}", name);
        assert_eq!(name.len(), "kube-system-dns-v2-".len() + NAME_HASH_LEN);
        assert!(
            name.chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        );
        assert_eq!(name, svc.load_balancer_name());

        let long = ServiceSpec::named("ns", &"x".repeat(100));
        assert_eq!(long.load_balancer_name().len(), MAX_LOAD_BALANCER_NAME_LEN);
    }

    #[test]
    fn test_fnv1a_reference_values() {
        assert_eq!(fnv1a(b""), 0x811c_9dc5);
        assert_eq!(fnv1a(b"a"), 0xe40c_292c);
        assert_eq!(fnv1a(b"foobar"), 0xbf9c_f968);
    }

    #[test]
    fn test_load_balancer_names_do_not_collide() {
        // Same text once namespace and name are joined.
        let a = ServiceSpec::named("a-b", "c").load_balancer_name();
        let b = ServiceSpec::named("a", "b-c").load_balancer_name();
        assert_ne!(a, b);

        // Same text once sanitized.
        let dotted = ServiceSpec::named("default", "web.v1").load_balancer_name();
        let dashed = ServiceSpec::named("default", "web-v1").load_balancer_name();
        assert_ne!(dotted, dashed);

        // Same first 64 characters.
        let stem = "x".repeat(70);
        let first = ServiceSpec::named("ns", &format!("{}-one", stem)).load_balancer_name();
        let second = ServiceSpec::named("ns", &format!("{}-two", stem)).load_balancer_name();
        assert_eq!(first.len(), MAX_LOAD_BALANCER_NAME_LEN);
        assert_eq!(second.len(), MAX_LOAD_BALANCER_NAME_LEN);
        assert_ne!(first, second);
    }

    #[test]
    fn test_validate_builds_tcp_listeners() {
        let listeners = service(vec![port(80, "TCP", 30080), port(443, "tcp", 30443)])
            .validate()
            .unwrap();
        assert_eq!(listeners.len(), 2);
        assert_eq!(listeners[0].protocol, Protocol::Tcp);
        assert_eq!(listeners[0].backend_port, 30080);
        assert_eq!(listeners[1].scheduler, DEFAULT_SCHEDULER);
    }

    #[test]
    fn test_validate_rejects_empty_ports() {
        let result = service(vec![]).validate();
        assert!(matches!(result, Err(CcmError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_fixed_address() {
        let mut svc = service(vec![port(80, "TCP", 30080)]);
        svc.load_balancer_ip = Some("180.76.1.1".to_string());
        assert!(matches!(svc.validate(), Err(CcmError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_non_tcp() {
        let result = service(vec![port(80, "TCP", 30080), port(53, "UDP", 30053)]).validate();
        assert!(matches!(result, Err(CcmError::Unsupported(_))));

        let result = service(vec![port(80, "QUIC", 30080)]).validate();
        assert!(matches!(result, Err(CcmError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_duplicate_ports() {
        let result = service(vec![port(80, "TCP", 30080), port(80, "TCP", 30081)]).validate();
        assert!(matches!(result, Err(CcmError::Validation(_))));
    }

    #[test]
    fn test_service_port_defaults_to_tcp() {
        let svc: ServiceSpec = serde_json::from_str(
            r#"{"namespace":"default","name":"web","ports":[{"port":80,"nodePort":30080}]}"#,
        )
        .unwrap();
        assert_eq!(svc.ports[0].protocol, "TCP");
        assert!(svc.validate().is_ok());
    }
}
