//! VPC route table reconciler.
//!
//! Owns the route rules with a `custom` next hop and source `0.0.0.0/0`;
//! every other rule in the table is left alone. Rules are keyed by
//! destination CIDR and there is at most one managed rule per CIDR.

use std::collections::HashMap;
use std::sync::Arc;

use bce_client::{CreateRouteRuleArgs, InstanceApi, NEXTHOP_TYPE_CUSTOM, RouteRule, VpcApi};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::Result;
use crate::instances::Instances;

/// Source address of managed route rules.
pub const MANAGED_SOURCE: &str = "0.0.0.0/0";

/// Description put on every rule this controller creates.
pub const ROUTE_DESCRIPTION: &str = "generated by bce-k8s";

/// Whether a route rule belongs to this controller.
pub fn is_managed(rule: &RouteRule) -> bool {
    rule.nexthop_type == NEXTHOP_TYPE_CUSTOM && rule.source_address == MANAGED_SOURCE
}

/// A managed route rule as reported to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedRoute {
    pub rule_id: String,
    pub destination_cidr: String,
    pub nexthop_id: String,
    /// Internal IP of the next-hop instance, when it is a cluster instance.
    pub target_node: Option<String>,
}

/// Result of [`RouteTableReconciler::create_route`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteChange {
    /// The rule already existed and was the only one for its CIDR.
    Unchanged,
    /// The rule already existed; other rules for the CIDR were deleted.
    Collapsed { rule_id: String, removed: usize },
    /// The target instance is gone or failed, nothing was done.
    Skipped,
    /// A new rule was created after deleting `replaced` stale ones.
    Created { rule_id: String, replaced: usize },
}

pub struct RouteTableReconciler<C> {
    api: Arc<C>,
    instances: Instances<C>,
}

impl<C: VpcApi + InstanceApi> RouteTableReconciler<C> {
    pub fn new(api: Arc<C>, instances: Instances<C>) -> Self {
        Self { api, instances }
    }

    async fn managed_rules(&self, vpc_id: &str) -> Result<(String, Vec<RouteRule>)> {
        let table = self.api.get_route_table(vpc_id).await?;
        let rules = table.route_rules.into_iter().filter(is_managed).collect();
        Ok((table.route_table_id, rules))
    }

    /// Managed route rules of `vpc_id`.
    pub async fn list_managed_routes(&self, vpc_id: &str) -> Result<Vec<ManagedRoute>> {
        let (_, rules) = self.managed_rules(vpc_id).await?;
        let instances = self.instances.list().await?;
        let nodes: HashMap<&str, &str> = instances
            .iter()
            .map(|i| (i.instance_id.as_str(), i.internal_ip.as_str()))
            .collect();

        Ok(rules
            .into_iter()
            .map(|rule| {
                let target_node = nodes.get(rule.nexthop_id.as_str()).map(|ip| ip.to_string());
                if target_node.is_none() {
                    debug!(
                        "Route {} points at unknown instance {}",
                        rule.route_rule_id, rule.nexthop_id
                    );
                }
                ManagedRoute {
                    rule_id: rule.route_rule_id,
                    destination_cidr: rule.destination_address,
                    nexthop_id: rule.nexthop_id,
                    target_node,
                }
            })
            .collect())
    }

    /// Route `cidr` to the instance with internal IP `target_ip`.
    ///
    /// Existing managed rules for `cidr` with another next hop are deleted
    /// first, so a node change replaces the old route.
    pub async fn create_route(
        &self,
        vpc_id: &str,
        cidr: &str,
        target_ip: &str,
    ) -> Result<RouteChange> {
        let target = self.instances.instance_by_internal_ip(target_ip).await?;
        if target.status.is_terminal() {
            info!(
                "Not routing {} to {} ({}), instance is {:?}",
                cidr, target_ip, target.instance_id, target.status
            );
            return Ok(RouteChange::Skipped);
        }

        let (route_table_id, rules) = self.managed_rules(vpc_id).await?;
        let same_cidr: Vec<RouteRule> = rules
            .into_iter()
            .filter(|r| r.destination_address == cidr)
            .collect();
        let existing = same_cidr
            .iter()
            .find(|r| r.nexthop_id == target.instance_id)
            .map(|r| r.route_rule_id.clone());

        let mut removed = 0;
        for stale in same_cidr
            .iter()
            .filter(|r| Some(&r.route_rule_id) != existing.as_ref())
        {
            info!(
                "Deleting route {} ({} via {})",
                stale.route_rule_id, cidr, stale.nexthop_id
            );
            self.api.delete_route_rule(&stale.route_rule_id).await?;
            removed += 1;
        }

        if let Some(rule_id) = existing {
            debug!("Route {} via {} already exists", cidr, target.instance_id);
            return Ok(if removed == 0 {
                RouteChange::Unchanged
            } else {
                RouteChange::Collapsed { rule_id, removed }
            });
        }

        let args = CreateRouteRuleArgs {
            route_table_id,
            source_address: MANAGED_SOURCE.to_string(),
            destination_address: cidr.to_string(),
            nexthop_id: target.instance_id.clone(),
            nexthop_type: NEXTHOP_TYPE_CUSTOM.to_string(),
            description: ROUTE_DESCRIPTION.to_string(),
        };
        let rule_id = self.api.create_route_rule(&args).await?;
        info!(
            "Created route {} ({} via {})",
            rule_id, cidr, target.instance_id
        );
        Ok(RouteChange::Created {
            rule_id,
            replaced: removed,
        })
    }

    /// Delete every managed rule for `cidr` and return how many there were.
    pub async fn delete_route(&self, vpc_id: &str, cidr: &str) -> Result<usize> {
        let (_, rules) = self.managed_rules(vpc_id).await?;
        let mut deleted = 0;
        for rule in rules.iter().filter(|r| r.destination_address == cidr) {
            info!("Deleting route {} ({})", rule.route_rule_id, cidr);
            match self.api.delete_route_rule(&rule.route_rule_id).await {
                Ok(()) => deleted += 1,
                Err(e) if e.status() == Some(404) => {
                    debug!("Route {} is already gone", rule.route_rule_id)
                }
                Err(e) => return Err(e.into()),
            }
        }
        if deleted == 0 {
            debug!("No managed route for {}", cidr);
        }
        Ok(deleted)
    }
}
