//! The receiver that lives inside a page and shows lookup results.
//!
//! Each page owns one [`PageAgent`] with its own session. At most one
//! notification is visible; a newer one replaces it. A notification goes away
//! when its timer fires, when the user clicks outside it, or when the page is
//! torn down.

use serde::{Deserialize, Serialize};
use shared::messages::{PageAck, PageMessage, PageRequest, ResultNotice};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

pub const RESULT_DISPLAY: Duration = Duration::from_millis(3000);
pub const ERROR_DISPLAY: Duration = Duration::from_millis(6000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(Uuid);

impl NotificationId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// What a notification shows: an optional bold heading and the body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationContent {
    pub heading: Option<String>,
    pub body: String,
}

impl NotificationContent {
    pub fn plain(body: impl Into<String>) -> Self {
        Self {
            heading: None,
            body: body.into(),
        }
    }

    pub fn titled(heading: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            heading: Some(heading.into()),
            body: body.into(),
        }
    }
}

/// Where a document click landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickTarget {
    Notification(NotificationId),
    Elsewhere,
}

/// The page's drawing surface.
#[async_trait::async_trait]
pub trait NotificationCanvas: Send + Sync {
    async fn mount(&self, id: NotificationId, content: &NotificationContent, is_error: bool);

    async fn unmount(&self, id: NotificationId);

    /// Start or stop listening for document clicks.
    async fn listen_for_clicks(&self, enabled: bool);
}

struct ActiveNotification {
    id: NotificationId,
    timer: JoinHandle<()>,
}

#[derive(Default)]
struct PageSession {
    ready: bool,
    active: Option<ActiveNotification>,
}

pub struct PageAgent {
    canvas: Arc<dyn NotificationCanvas>,
    session: Arc<Mutex<PageSession>>,
}

impl PageAgent {
    pub fn new(canvas: Arc<dyn NotificationCanvas>) -> Self {
        Self {
            canvas,
            session: Arc::new(Mutex::new(PageSession::default())),
        }
    }

    /// Mark the agent ready. Returns the readiness ping on the first call only.
    pub async fn init(&self) -> Option<PageRequest> {
        let mut session = self.session.lock().await;
        if session.ready {
            return None;
        }
        session.ready = true;
        info!("page agent ready");
        Some(PageRequest::ContentScriptReady)
    }

    pub async fn is_ready(&self) -> bool {
        self.session.lock().await.ready
    }

    /// Id of the visible notification, if any.
    pub async fn active(&self) -> Option<NotificationId> {
        self.session.lock().await.active.as_ref().map(|a| a.id)
    }

    pub async fn handle(&self, message: &PageMessage) -> PageAck {
        match message {
            PageMessage::ShowTranslationResult(ResultNotice::Translation { text, translation }) => {
                self.show(NotificationContent::titled(text, translation), false)
                    .await;
            }
            PageMessage::ShowTranslationResult(ResultNotice::Error { error }) => {
                self.show(NotificationContent::plain(error), true).await;
            }
        }
        PageAck::received()
    }

    pub async fn show(&self, content: NotificationContent, is_error: bool) -> NotificationId {
        let mut session = self.session.lock().await;
        match session.active.take() {
            Some(previous) => {
                previous.timer.abort();
                self.canvas.unmount(previous.id).await;
            }
            None => self.canvas.listen_for_clicks(true).await,
        }

        let id = NotificationId::new();
        self.canvas.mount(id, &content, is_error).await;
        debug!(%id, is_error, "notification shown");

        let lifetime = if is_error { ERROR_DISPLAY } else { RESULT_DISPLAY };
        let canvas = self.canvas.clone();
        let timer_session = self.session.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(lifetime).await;
            let mut session = timer_session.lock().await;
            if session.active.as_ref().is_some_and(|a| a.id == id) {
                session.active = None;
                canvas.unmount(id).await;
                canvas.listen_for_clicks(false).await;
                debug!(%id, "notification expired");
            }
        });

        session.active = Some(ActiveNotification { id, timer });
        id
    }

    pub async fn dismiss(&self) {
        let mut session = self.session.lock().await;
        self.clear(&mut session).await;
    }

    pub async fn on_document_click(&self, target: ClickTarget) {
        let mut session = self.session.lock().await;
        let Some(active) = session.active.as_ref() else {
            return;
        };
        if target == ClickTarget::Notification(active.id) {
            return;
        }
        self.clear(&mut session).await;
    }

    /// Page is going away: drop the notification, its timer and the listener.
    pub async fn teardown(&self) {
        let mut session = self.session.lock().await;
        self.clear(&mut session).await;
        session.ready = false;
    }

    async fn clear(&self, session: &mut PageSession) {
        if let Some(active) = session.active.take() {
            active.timer.abort();
            self.canvas.unmount(active.id).await;
            self.canvas.listen_for_clicks(false).await;
            debug!(id = %active.id, "notification dismissed");
        }
    }
}
