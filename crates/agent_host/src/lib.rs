//! Agent Host - the extension's background side and its page receivers
//!
//! This crate provides:
//! - The background coordinator that runs lookups and answers surface requests
//! - Delivery of results to pages, installing a receiver when none answers
//! - The page agent that shows one notification at a time
//! - An in-process surface host used by the command line front end

pub mod background;
pub mod coordinator;
pub mod local_host;
pub mod page_agent;
pub mod surface;

pub use background::{Background, LookupReport};
pub use coordinator::{DeliveryCoordinator, DeliveryFailed};
pub use local_host::{CanvasFactory, LocalSurfaceHost};
pub use page_agent::{ClickTarget, NotificationCanvas, NotificationContent, NotificationId, PageAgent};
pub use surface::{HostError, SurfaceHost, SurfaceId};
