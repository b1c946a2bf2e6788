//! Notifications drawn on the terminal.

use agent_host::{NotificationCanvas, NotificationContent, NotificationId};
use tracing::debug;

pub struct TerminalCanvas {
    color: bool,
}

impl TerminalCanvas {
    pub fn new(color: bool) -> Self {
        Self { color }
    }
}

/// One notification as terminal text. Headings are bold, errors red.
pub fn render(content: &NotificationContent, is_error: bool, color: bool) -> String {
    let mut lines = Vec::new();
    if let Some(heading) = &content.heading {
        lines.push(if color {
            format!("\x1b[1m{}:\x1b[0m", heading)
        } else {
            format!("{}:", heading)
        });
    }
    let body = if is_error && color {
        format!("\x1b[31m{}\x1b[0m", content.body)
    } else if is_error {
        format!("[错误] {}", content.body)
    } else {
        content.body.clone()
    };
    lines.push(body);
    lines.join("\n")
}

#[async_trait::async_trait]
impl NotificationCanvas for TerminalCanvas {
    async fn mount(&self, id: NotificationId, content: &NotificationContent, is_error: bool) {
        debug!(%id, "mounting notification");
        println!("{}", render(content, is_error, self.color));
    }

    async fn unmount(&self, id: NotificationId) {
        debug!(%id, "notification removed");
    }

    async fn listen_for_clicks(&self, enabled: bool) {
        debug!(enabled, "outside-click listener");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_plain() {
        let result = NotificationContent::titled("ubiquitous", "ubi 到处都是");
        assert_eq!(render(&result, false, false), "ubiquitous:\nubi 到处都是");

        let error = NotificationContent::plain("网络连接失败，请检查您的互联网连接");
        assert_eq!(render(&error, true, false), "[错误] 网络连接失败，请检查您的互联网连接");
    }

    #[test]
    fn test_render_color() {
        let result = NotificationContent::titled("a", "b");
        assert_eq!(render(&result, false, true), "\x1b[1ma:\x1b[0m\nb");
    }
}
