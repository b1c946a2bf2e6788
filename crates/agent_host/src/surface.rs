//! Host side of a page surface: presence checks, message delivery and
//! receiver installation.

use serde::{Deserialize, Serialize};
use shared::messages::{PageAck, PageMessage};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SurfaceId(pub u64);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("{0} no longer exists")]
    SurfaceGone(SurfaceId),

    #[error("could not install a receiver in {surface}: {detail}")]
    Injection { surface: SurfaceId, detail: String },
}

#[async_trait::async_trait]
pub trait SurfaceHost: Send + Sync {
    async fn exists(&self, surface: SurfaceId) -> bool;

    /// Hand `message` to the surface's receiver. `None` when nothing answered.
    async fn send(&self, surface: SurfaceId, message: &PageMessage) -> Option<PageAck>;

    async fn inject_receiver(&self, surface: SurfaceId) -> Result<(), HostError>;

    /// Bring up the settings surface.
    async fn open_options_page(&self) {}
}
