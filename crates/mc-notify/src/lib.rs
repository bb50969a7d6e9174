//! mc-notify: outbound delivery for Mission Control
//!
//! A bounded job queue drained by a worker pool. Workers wake agents over
//! HTTP and post alerts to the Telegram team chat. Every failure ends up as a
//! `{success: false, error}` outcome and a log line, never as a caller error.

mod error;
mod format;
mod queue;
mod telegram;
mod wake;

pub use error::{NotifyError, Result};
pub use format::{render_alert, truncate};
pub use queue::{OutboundQueue, QueueHandle, QueueOptions, QueueStats, RetryPolicy};
pub use telegram::{TeamChannel, TelegramChannel};
pub use wake::{AgentWaker, HttpWaker, POLLING_MODE, wake_payload};
