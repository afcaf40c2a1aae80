//! Reconcilers for the sub-resources of a load balancer.
//!
//! Each reconciler reads the actual state from the remote API, compares it
//! with the desired state and issues the calls needed to converge. Nothing
//! is cached between calls.

pub mod backend;
pub mod listener;

use async_trait::async_trait;

use crate::error::Result;

/// Trait for load balancer sub-resource reconcilers.
#[async_trait]
pub trait Reconciler: Send + Sync {
    /// The desired state handed in by the provisioner.
    type Desired: Send + Sync;
    /// What the reconciler changed.
    type Outcome;

    /// Converge the sub-resources of load balancer `lb_id` to `desired`.
    async fn reconcile(&self, lb_id: &str, desired: &Self::Desired) -> Result<Self::Outcome>;

    /// Converge toward the empty state ahead of deleting the load balancer.
    async fn finalize(&self, lb_id: &str) -> Result<()>;
}
