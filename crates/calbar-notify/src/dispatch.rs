//! Showing alerts on the desktop.

use std::sync::Mutex;
use std::time::Duration;

use notify_rust::Notification;
use tracing::debug;

use crate::error::{NotifyError, NotifyResult};
use crate::scheduler::DispatchRequest;

/// Displays a [`DispatchRequest`]. Fire-and-forget: success only means the
/// notification service accepted it.
pub trait Dispatcher {
    fn dispatch(&self, request: &DispatchRequest) -> NotifyResult<()>;
}

/// Native notifications through `notify-rust`.
#[derive(Debug, Clone)]
pub struct DesktopDispatcher {
    app_name: String,
    timeout: Duration,
}

impl DesktopDispatcher {
    pub const DEFAULT_APP_NAME: &'static str = "Calendar";
    pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

    pub fn new(app_name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            app_name: app_name.into(),
            timeout,
        }
    }
}

impl Default for DesktopDispatcher {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_APP_NAME,
            Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
        )
    }
}

impl Dispatcher for DesktopDispatcher {
    fn dispatch(&self, request: &DispatchRequest) -> NotifyResult<()> {
        let mut notification = Notification::new();
        notification
            .appname(&self.app_name)
            .summary(&request.title)
            .timeout(self.timeout);

        #[cfg(target_os = "macos")]
        notification
            .subtitle(&request.subtitle)
            .body(&body_with_link(&request.body, request.link.as_deref()));

        #[cfg(not(target_os = "macos"))]
        notification.body(&folded_body(request));

        debug!(event_id = %request.event_id, "showing notification");
        notification
            .show()
            .map(|_| ())
            .map_err(|e| NotifyError::dispatch(e.to_string()))
    }
}

fn body_with_link(body: &str, link: Option<&str>) -> String {
    match link {
        Some(link) => format!("{body}\n{link}"),
        None => body.to_string(),
    }
}

/// Servers without subtitles get it as the first body line.
#[cfg_attr(target_os = "macos", allow(dead_code))]
fn folded_body(request: &DispatchRequest) -> String {
    let body = body_with_link(&request.body, request.link.as_deref());
    if request.subtitle.is_empty() {
        body
    } else {
        format!("{}\n{body}", request.subtitle)
    }
}

/// Keeps requests in memory instead of showing them.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<DispatchRequest>>,
    fail: bool,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records every request but reports each as failed.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::default(),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<DispatchRequest> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl Dispatcher for RecordingDispatcher {
    fn dispatch(&self, request: &DispatchRequest) -> NotifyResult<()> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());
        if self.fail {
            Err(NotifyError::dispatch("notification service unavailable"))
        } else {
            Ok(())
        }
    }
}

impl<D: Dispatcher + ?Sized> Dispatcher for &D {
    fn dispatch(&self, request: &DispatchRequest) -> NotifyResult<()> {
        (**self).dispatch(request)
    }
}
