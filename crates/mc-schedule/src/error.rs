//! エラー型定義 (mc-schedule)

use thiserror::Error;

/// mc-schedule のエラー型
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("cron パースエラー: {name}: {source}")]
    CronParse {
        name: String,
        #[source]
        source: cron::error::Error,
    },

    #[error("設定ファイル読み込みエラー: {0}")]
    ConfigLoad(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Core error: {0}")]
    Core(#[from] mc_core::Error),
}

/// Result 型エイリアス
pub type Result<T> = std::result::Result<T, ScheduleError>;
