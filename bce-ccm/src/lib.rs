//! Reconciliation engine of the BCE cloud controller.
//!
//! Converges a BLB load balancer (listeners, backend pool, public IP) and
//! the cluster's VPC route table toward the state the orchestrator asks
//! for. The remote API is the only store of convergence state: every
//! operation re-reads it, so an interrupted operation is resumed by running
//! it again.

pub mod cloud;
pub mod config;
pub mod eip;
pub mod error;
pub mod instances;
pub mod loadbalancer;
pub mod poller;
pub mod reconciler;
pub mod route;
pub mod service;

pub use cloud::{BceCloud, PROVIDER_NAME};
pub use config::{CloudConfig, ConfigError};
pub use error::{CcmError, Result};
pub use loadbalancer::{IngressStatus, LoadBalancerProvisioner, Phase, Placement};
pub use poller::{PollPolicy, wait_until};
pub use route::{ManagedRoute, RouteChange, RouteTableReconciler};
pub use service::{DesiredEndpointSet, Node, Protocol, ServicePort, ServiceSpec};
