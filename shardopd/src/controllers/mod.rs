use crate::api::store::ClusterStore;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub mod status;

pub use status::{DesiredPhase, StatusController};

/// Controller trait defines the contract for controllers driven by the outer
/// control loop.
#[async_trait]
pub trait Controller: Send + Sync + 'static {
    // Name used for identifying the controller.
    fn name(&self) -> &'static str;

    // Reconcile the resource identified by key, e.g. resource name.
    async fn reconcile(&self, key: &str, store: Arc<dyn ClusterStore>) -> Result<()>;
}
