//! Notifier seam between the scanning engine and the channel fan-out.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Notification;

/// Something that can take a notification and get it delivered. The
/// production implementation is the channel dispatcher; tests inject
/// recording fakes.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn dispatch(&self, notification: &Notification) -> Result<()>;
}
