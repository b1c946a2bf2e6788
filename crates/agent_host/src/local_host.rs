//! In-process surface host.
//!
//! Pages are plain slots keyed by [`SurfaceId`]. A slot either has a
//! [`PageAgent`] receiver or not; installing one runs the agent's init and
//! forwards its readiness ping to the channel returned by [`LocalSurfaceHost::new`].

use parking_lot::Mutex;
use shared::messages::{PageAck, PageMessage, PageRequest};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::page_agent::{NotificationCanvas, PageAgent};
use crate::surface::{HostError, SurfaceHost, SurfaceId};

pub type CanvasFactory = Arc<dyn Fn(SurfaceId) -> Arc<dyn NotificationCanvas> + Send + Sync>;

struct Slot {
    agent: Option<Arc<PageAgent>>,
    // Receivers cannot be installed into restricted pages.
    restricted: bool,
}

pub struct LocalSurfaceHost {
    slots: Mutex<HashMap<SurfaceId, Slot>>,
    next_id: AtomicU64,
    canvas_factory: CanvasFactory,
    page_requests: mpsc::UnboundedSender<(SurfaceId, PageRequest)>,
    options_opened: AtomicUsize,
}

impl LocalSurfaceHost {
    pub fn new(canvas_factory: CanvasFactory) -> (Self, mpsc::UnboundedReceiver<(SurfaceId, PageRequest)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let host = Self {
            slots: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            canvas_factory,
            page_requests: tx,
            options_opened: AtomicUsize::new(0),
        };
        (host, rx)
    }

    /// Open a page. With `with_receiver` the agent is installed up front, the
    /// way a page loaded after the extension starts would have it.
    pub async fn open_surface(&self, with_receiver: bool) -> SurfaceId {
        let id = SurfaceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.slots.lock().insert(
            id,
            Slot {
                agent: None,
                restricted: false,
            },
        );
        if with_receiver {
            self.install(id).await;
        }
        debug!(surface = %id, with_receiver, "surface opened");
        id
    }

    /// A page where receivers cannot be installed (browser-internal pages).
    pub fn open_restricted_surface(&self) -> SurfaceId {
        let id = SurfaceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.slots.lock().insert(
            id,
            Slot {
                agent: None,
                restricted: true,
            },
        );
        id
    }

    pub async fn close_surface(&self, surface: SurfaceId) {
        let slot = self.slots.lock().remove(&surface);
        if let Some(agent) = slot.and_then(|s| s.agent) {
            agent.teardown().await;
        }
        debug!(surface = %surface, "surface closed");
    }

    pub fn agent(&self, surface: SurfaceId) -> Option<Arc<PageAgent>> {
        self.slots.lock().get(&surface).and_then(|s| s.agent.clone())
    }

    pub fn options_opened(&self) -> usize {
        self.options_opened.load(Ordering::Relaxed)
    }

    async fn install(&self, surface: SurfaceId) -> Option<Arc<PageAgent>> {
        let agent = {
            let mut slots = self.slots.lock();
            let slot = slots.get_mut(&surface)?;
            let agent = Arc::new(PageAgent::new((self.canvas_factory)(surface)));
            slot.agent = Some(agent.clone());
            agent
        };
        if let Some(ping) = agent.init().await {
            if self.page_requests.send((surface, ping)).is_err() {
                debug!(surface = %surface, "nobody is listening for page requests");
            }
        }
        Some(agent)
    }
}

#[async_trait::async_trait]
impl SurfaceHost for LocalSurfaceHost {
    async fn exists(&self, surface: SurfaceId) -> bool {
        self.slots.lock().contains_key(&surface)
    }

    async fn send(&self, surface: SurfaceId, message: &PageMessage) -> Option<PageAck> {
        let agent = self.agent(surface)?;
        Some(agent.handle(message).await)
    }

    async fn inject_receiver(&self, surface: SurfaceId) -> Result<(), HostError> {
        let restricted = self.slots.lock().get(&surface).map(|slot| slot.restricted);
        if restricted.is_none() {
            return Err(HostError::SurfaceGone(surface));
        }
        if restricted == Some(true) {
            warn!(surface = %surface, "cannot install a receiver here");
            return Err(HostError::Injection {
                surface,
                detail: "page does not accept receivers".into(),
            });
        }
        self.install(surface)
            .await
            .map(|_| ())
            .ok_or(HostError::SurfaceGone(surface))
    }

    async fn open_options_page(&self) {
        self.options_opened.fetch_add(1, Ordering::Relaxed);
        info!("settings surface requested");
    }
}
