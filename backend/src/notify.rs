use uuid::Uuid;

use crate::models::{Notification, NotificationKind};
use crate::store::Store;

/// Records an in-app notification. Failures are logged, never returned.
pub async fn notify(
    store: &dyn Store,
    user_id: Uuid,
    kind: NotificationKind,
    title: impl Into<String>,
    body: impl Into<String>,
    link: Option<String>,
) {
    let notification = Notification::new(user_id, kind, title, body, link);
    if let Err(e) = store.insert_notification(notification).await {
        log::warn!("Failed to record {} notification for {}: {}", kind, user_id, e);
    }
}
