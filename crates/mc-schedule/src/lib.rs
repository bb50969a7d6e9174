//! メンテナンスジョブのスケジュール実行モジュール
//!
//! cron 形式で指定した時刻に受信箱の分類やエージェント状態の更新を実行します。

mod config;
mod error;
mod scheduler;

pub use config::{JobKind, ScheduleConfig, ScheduleJob};
pub use error::{Result, ScheduleError};
pub use scheduler::{Scheduler, SchedulerHandle};
