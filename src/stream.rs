//! Observable view of the currently registered notifications of one category.

use std::sync::Arc;

use futures::Stream;
use serde::Serialize;
use tokio::sync::watch;

use crate::notification::{Notification, NotificationCategory, NotificationId};
use crate::registry::Registrar;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveNotification {
    pub id: NotificationId,
    pub notification: Notification,
}

/// Follows the registry and yields the notifications of a single category.
///
/// Consumers that fall behind only ever see the latest view; producers never
/// wait for them.
pub struct NotificationStream {
    category: NotificationCategory,
    receiver: watch::Receiver<Arc<Registrar>>,
    last: Vec<ActiveNotification>,
}

fn filter(registrar: &Registrar, category: NotificationCategory) -> Vec<ActiveNotification> {
    registrar
        .iter()
        .filter(|(_, notification)| notification.is_in(category))
        .map(|(id, notification)| ActiveNotification {
            id: *id,
            notification: notification.clone(),
        })
        .collect()
}

impl NotificationStream {
    pub fn new(category: NotificationCategory, mut receiver: watch::Receiver<Arc<Registrar>>) -> Self {
        let last = filter(&receiver.borrow_and_update(), category);
        Self {
            category,
            receiver,
            last,
        }
    }

    pub fn category(&self) -> NotificationCategory {
        self.category
    }

    /// Current notifications of this category, ordered by id.
    ///
    /// The returned view counts as seen: a following [`Self::changed`] only
    /// resolves once the view differs from it.
    pub fn current(&mut self) -> Vec<ActiveNotification> {
        let view = filter(&self.receiver.borrow_and_update(), self.category);
        self.last = view.clone();
        view
    }

    /// Waits until the view of this category differs from the one last
    /// returned by `current` or `changed`, and returns the new view. Registry changes that only touch
    /// other categories are skipped.
    ///
    /// Returns `None` once the registry is gone.
    pub async fn changed(&mut self) -> Option<Vec<ActiveNotification>> {
        loop {
            if self.receiver.changed().await.is_err() {
                return None;
            }
            let view = filter(&self.receiver.borrow_and_update(), self.category);
            if view != self.last {
                self.last = view.clone();
                return Some(view);
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = Vec<ActiveNotification>> {
        futures::stream::unfold(self, |mut stream| async move {
            stream.changed().await.map(|view| (view, stream))
        })
    }
}
