//! Client boundary for the Baidu Cloud (BCE) APIs the cloud controller drives.
//!
//! - BLB: load balancers, TCP listeners, backend servers
//! - EIP: elastic public IPs and their bindings
//! - VPC: route tables and route rules
//! - CCE: the cluster's instance inventory (read-only)
//!
//! [`HttpClient`] talks to the real endpoints; [`test_util::FakeCloud`] simulates
//! the same asynchronous, eventually consistent behaviour in memory.

pub mod api;
pub mod error;
pub mod http;
pub mod test_util;
pub mod types;

pub use api::{BlbApi, CloudApi, EipApi, InstanceApi, VpcApi};
pub use error::{ApiError, Result};
pub use http::{HttpClient, HttpClientConfig};
pub use types::*;
