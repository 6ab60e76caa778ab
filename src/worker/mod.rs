// Notification dispatcher - a background task that decouples "an
// outcome happened" from "the user sees it". Pages post structured
// intents into its inbox and move on; the worker outlives any page.
//
// Reframed from browser service-worker lifecycle events as one state
// machine: Installing -> Waiting -> Active -> Controlling, with
// SKIP_WAITING and CLIENTS_CLAIM as explicit overrides.

pub mod cache;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::services::notifier::NotificationIntent;
use cache::{FetchError, FetchResult, PageFetcher, VersionedCache};

/// Static assets pre-populated into the cache on install
pub const DEFAULT_PRECACHE: &[&str] = &["/", "/offline", "/static/app.css", "/static/app.js"];

/// Inbox capacity; posts are fire-and-forget, so a full inbox drops the
/// message with a warning rather than blocking the page.
pub const INBOX_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Installing,
    Waiting,
    Active,
    Controlling,
}

/// Messages a page (or the reservation flow) posts to the worker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkerMessage {
    #[serde(rename = "SHOW_NOTIFICATION")]
    ShowNotification { notification: NotificationIntent },

    #[serde(rename = "SKIP_WAITING")]
    SkipWaiting,

    #[serde(rename = "CLIENTS_CLAIM")]
    ClientsClaim,

    #[serde(rename = "NOTIFICATION_CLICK")]
    NotificationClick { tag: String },
}

/// Cloneable sending side of the worker inbox
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<WorkerMessage>,
}

impl WorkerHandle {
    pub fn new(tx: mpsc::Sender<WorkerMessage>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::Receiver<WorkerMessage>) {
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        (Self::new(tx), rx)
    }

    /// Posts a notification intent, fire-and-forget: the caller never
    /// awaits worker-side completion beyond this send.
    pub fn notify(&self, intent: NotificationIntent) {
        self.post(WorkerMessage::ShowNotification {
            notification: intent,
        });
    }

    pub fn post(&self, message: WorkerMessage) {
        if let Err(e) = self.tx.try_send(message) {
            tracing::warn!(error = %e, "Worker inbox unavailable, dropping message");
        }
    }
}

/// An open page known to the worker; the click handler focuses one of
/// these or opens a new one.
#[derive(Debug, Clone)]
pub struct PageClient {
    pub id: Uuid,
    pub url: String,
    pub focused: bool,
}

pub struct NotificationDispatcher {
    state: LifecycleState,
    version: String,
    cache: VersionedCache,
    fetcher: PageFetcher,
    precache: Vec<String>,
    visible: Vec<NotificationIntent>,
    clients: Vec<PageClient>,
}

impl NotificationDispatcher {
    pub fn new(origin: &str, version: &str, precache: Vec<String>) -> Self {
        Self {
            state: LifecycleState::Installing,
            version: version.to_string(),
            cache: VersionedCache::new(),
            fetcher: PageFetcher::new(origin, version),
            precache,
            visible: Vec::new(),
            clients: Vec::new(),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn cache(&self) -> &VersionedCache {
        &self.cache
    }

    /// Install step: pre-populate the fixed asset set into the versioned
    /// cache. Any asset failing to fetch fails the install.
    pub async fn install(&mut self) -> Result<(), FetchError> {
        for path in &self.precache {
            self.fetcher.precache(&self.cache, path).await?;
        }
        self.state = LifecycleState::Waiting;
        tracing::info!(
            version = %self.version,
            assets = self.precache.len(),
            "Worker installed"
        );
        Ok(())
    }

    /// Activate step: delete every cache version not matching the
    /// current tag, then take control of open pages immediately.
    pub async fn activate(&mut self) {
        let purged = self.cache.purge_except(&self.version).await;
        if !purged.is_empty() {
            tracing::info!(?purged, version = %self.version, "Purged stale cache versions");
        }
        self.state = LifecycleState::Active;
        self.claim_clients();
    }

    /// Takes control of all open pages without waiting for a reload
    pub fn claim_clients(&mut self) {
        self.state = LifecycleState::Controlling;
    }

    pub fn register_client(&mut self, url: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.clients.push(PageClient {
            id,
            url: url.to_string(),
            focused: false,
        });
        id
    }

    pub fn visible_notifications(&self) -> &[NotificationIntent] {
        &self.visible
    }

    pub fn focused_client(&self) -> Option<&PageClient> {
        self.clients.iter().find(|c| c.focused)
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Displays a notification, replacing any prior one sharing the same
    /// tag; untagged notifications stack.
    pub fn show_notification(&mut self, intent: NotificationIntent) {
        if let Some(tag) = intent.tag.as_deref() {
            self.visible.retain(|n| n.tag.as_deref() != Some(tag));
        }
        tracing::debug!(tag = ?intent.tag, title = %intent.title, "Displaying notification");
        self.visible.push(intent);
    }

    /// Click on a notification: focus an existing page already showing
    /// the deep-link target, otherwise open a new one. The notification
    /// is dismissed regardless of which branch runs.
    pub fn handle_click(&mut self, tag: &str) {
        let Some(intent) = self.visible.iter().find(|n| n.tag.as_deref() == Some(tag)) else {
            return;
        };
        let url = intent.data.url.clone();

        for client in &mut self.clients {
            client.focused = false;
        }
        if let Some(client) = self.clients.iter_mut().find(|c| c.url == url) {
            client.focused = true;
        } else {
            self.clients.push(PageClient {
                id: Uuid::new_v4(),
                url,
                focused: true,
            });
        }

        self.visible.retain(|n| n.tag.as_deref() != Some(tag));
    }

    /// Network-first fetch for navigable pages, delegated to the cache
    pub async fn fetch_page(&self, method: &str, path: &str) -> Result<FetchResult, FetchError> {
        self.fetcher.fetch(&self.cache, method, path).await
    }

    pub async fn handle_message(&mut self, message: WorkerMessage) {
        match message {
            WorkerMessage::ShowNotification { notification } => {
                self.show_notification(notification);
            }
            WorkerMessage::SkipWaiting => {
                if self.state == LifecycleState::Waiting {
                    self.activate().await;
                }
            }
            WorkerMessage::ClientsClaim => {
                if self.state != LifecycleState::Installing {
                    self.claim_clients();
                }
            }
            WorkerMessage::NotificationClick { tag } => {
                self.handle_click(&tag);
            }
        }
    }

    /// Runs the worker to completion: install, activate, then drain the
    /// inbox until every handle is dropped.
    pub async fn run(mut self, mut rx: mpsc::Receiver<WorkerMessage>) {
        if let Err(e) = self.install().await {
            tracing::error!(error = %e, "Worker install failed");
            return;
        }
        self.activate().await;

        while let Some(message) = rx.recv().await {
            self.handle_message(message).await;
        }
        tracing::info!("Worker inbox closed, shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::notifier::{rental_error_intent, rental_success_intent};

    fn dispatcher() -> NotificationDispatcher {
        NotificationDispatcher::new("http://localhost:0", "test-v1", vec![])
    }

    #[test]
    fn same_tag_replaces_prior_notification() {
        let mut worker = dispatcher();
        worker.show_notification(rental_error_intent("first failure"));
        worker.show_notification(rental_error_intent("second failure"));

        assert_eq!(worker.visible_notifications().len(), 1);
        assert_eq!(worker.visible_notifications()[0].body, "second failure");
    }

    #[test]
    fn distinct_tags_are_independent_channels() {
        let mut worker = dispatcher();
        worker.show_notification(rental_error_intent("failure"));
        worker.show_notification(rental_success_intent("Pier 4", Uuid::new_v4()));

        assert_eq!(worker.visible_notifications().len(), 2);
    }

    #[test]
    fn click_focuses_existing_client_and_dismisses() {
        let mut worker = dispatcher();
        let rental_id = Uuid::new_v4();
        let url = format!("/rentals/{rental_id}");
        worker.register_client("/stations");
        worker.register_client(&url);

        worker.show_notification(rental_success_intent("Pier 4", rental_id));
        worker.handle_click(crate::services::notifier::TAG_RENTAL_SUCCESS);

        assert_eq!(worker.client_count(), 2);
        assert_eq!(worker.focused_client().map(|c| c.url.as_str()), Some(url.as_str()));
        assert!(worker.visible_notifications().is_empty());
    }

    #[test]
    fn click_opens_new_client_when_target_not_open() {
        let mut worker = dispatcher();
        worker.register_client("/stations");

        worker.show_notification(rental_error_intent("failure"));
        worker.handle_click(crate::services::notifier::TAG_RENTAL_ERROR);

        assert_eq!(worker.client_count(), 2);
        assert_eq!(worker.focused_client().map(|c| c.url.as_str()), Some("/"));
        assert!(worker.visible_notifications().is_empty());
    }

    #[test]
    fn message_envelope_wire_format() {
        let json = serde_json::json!({
            "type": "SHOW_NOTIFICATION",
            "notification": {
                "title": "Power bank reserved",
                "body": "Ready",
                "requireInteraction": false,
                "data": { "url": "/rentals/abc" },
            },
        });
        let message: WorkerMessage = serde_json::from_value(json).unwrap();
        assert!(matches!(message, WorkerMessage::ShowNotification { .. }));

        let skip: WorkerMessage = serde_json::from_value(serde_json::json!({"type": "SKIP_WAITING"})).unwrap();
        assert!(matches!(skip, WorkerMessage::SkipWaiting));
    }
}
