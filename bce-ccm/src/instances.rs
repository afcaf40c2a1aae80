//! Node and zone lookups against the cluster inventory.
//!
//! Nodes are named after their internal IP, which is also how they are
//! matched to cloud instances.

use std::net::IpAddr;
use std::sync::Arc;

use bce_client::{Instance, InstanceApi};
use serde::Serialize;
use tracing::debug;

use crate::error::{CcmError, Result};

/// Instance type reported for every node.
pub const INSTANCE_TYPE: &str = "BCC";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NodeAddressType {
    #[serde(rename = "InternalIP")]
    InternalIp,
    Hostname,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeAddress {
    #[serde(rename = "type")]
    pub kind: NodeAddressType,
    pub address: String,
}

/// Failure domain of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub failure_domain: String,
    pub region: String,
}

fn parse_node_name(node_name: &str) -> Result<IpAddr> {
    node_name.parse().map_err(|_| {
        CcmError::Validation(format!(
            "node name {:?} should be an IP address",
            node_name
        ))
    })
}

pub struct Instances<C> {
    api: Arc<C>,
    cluster_id: String,
    region: String,
}

impl<C: InstanceApi> Instances<C> {
    pub fn new(api: Arc<C>, cluster_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            api,
            cluster_id: cluster_id.into(),
            region: region.into(),
        }
    }

    pub fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    /// Every instance of the cluster.
    pub async fn list(&self) -> Result<Vec<Instance>> {
        Ok(self.api.list_instances(&self.cluster_id).await?)
    }

    /// Addresses of a node. Needs no lookup, the name is the address.
    pub fn node_addresses(&self, node_name: &str) -> Result<Vec<NodeAddress>> {
        parse_node_name(node_name)?;
        Ok(vec![
            NodeAddress {
                kind: NodeAddressType::InternalIp,
                address: node_name.to_string(),
            },
            NodeAddress {
                kind: NodeAddressType::Hostname,
                address: node_name.to_string(),
            },
        ])
    }

    /// The cluster instance with internal IP `internal_ip`.
    pub async fn instance_by_internal_ip(&self, internal_ip: &str) -> Result<Instance> {
        parse_node_name(internal_ip)?;
        let instance = self
            .list()
            .await?
            .into_iter()
            .find(|i| i.internal_ip == internal_ip)
            .ok_or_else(|| {
                CcmError::NotFound(format!(
                    "instance with internal IP {} in cluster {}",
                    internal_ip, self.cluster_id
                ))
            })?;
        debug!("Node {} is instance {}", internal_ip, instance.instance_id);
        Ok(instance)
    }

    pub async fn instance_id(&self, node_name: &str) -> Result<String> {
        Ok(self.instance_by_internal_ip(node_name).await?.instance_id)
    }

    /// Same as [`instance_id`](Self::instance_id).
    pub async fn external_id(&self, node_name: &str) -> Result<String> {
        self.instance_id(node_name).await
    }

    pub fn instance_type(&self, _node_name: &str) -> &'static str {
        INSTANCE_TYPE
    }

    pub async fn zone(&self, node_name: &str) -> Result<Zone> {
        let instance = self.instance_by_internal_ip(node_name).await?;
        Ok(Zone {
            failure_domain: instance.zone_name,
            region: self.region.clone(),
        })
    }
}
