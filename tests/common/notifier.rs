//! Platform notifier fake that records what would be on screen

use anyhow::{bail, Result};
use mail_notification_tracker::{Notification, NotificationId, PlatformNotifier};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

pub struct RecordingNotifier {
    on_screen: Mutex<BTreeMap<NotificationId, Notification>>,
    cancelled: Mutex<Vec<NotificationId>>,
    call_counts: Mutex<HashMap<&'static str, usize>>,
    fail_show: Mutex<bool>,
}

#[allow(dead_code)]
impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            on_screen: Mutex::new(BTreeMap::new()),
            cancelled: Mutex::new(Vec::new()),
            call_counts: Mutex::new(HashMap::new()),
            fail_show: Mutex::new(false),
        }
    }

    /// Pretends `id` is still on screen from an earlier run.
    pub fn leave_on_screen(&self, id: NotificationId, notification: Notification) {
        self.on_screen.lock().unwrap().insert(id, notification);
    }

    pub fn on_screen_ids(&self) -> Vec<NotificationId> {
        self.on_screen.lock().unwrap().keys().copied().collect()
    }

    pub fn on_screen(&self) -> BTreeMap<NotificationId, Notification> {
        self.on_screen.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<NotificationId> {
        self.cancelled.lock().unwrap().clone()
    }

    pub fn set_fail_show(&self, fail: bool) {
        *self.fail_show.lock().unwrap() = fail;
    }

    pub fn get_call_count(&self, method: &str) -> usize {
        *self.call_counts.lock().unwrap().get(method).unwrap_or(&0)
    }

    fn increment_call(&self, method: &'static str) {
        let mut counts = self.call_counts.lock().unwrap();
        *counts.entry(method).or_insert(0) += 1;
    }
}

impl PlatformNotifier for RecordingNotifier {
    fn show(&self, id: NotificationId, notification: &Notification) -> Result<()> {
        self.increment_call("show");
        if *self.fail_show.lock().unwrap() {
            bail!("notification channel disabled");
        }
        self.on_screen
            .lock()
            .unwrap()
            .insert(id, notification.clone());
        Ok(())
    }

    fn cancel(&self, id: NotificationId) -> Result<()> {
        self.increment_call("cancel");
        self.on_screen.lock().unwrap().remove(&id);
        self.cancelled.lock().unwrap().push(id);
        Ok(())
    }
}
