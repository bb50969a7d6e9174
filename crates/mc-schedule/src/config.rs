//! スケジュール設定
//!
//! TOML 形式の設定ファイルからスケジュールを読み込みます。

use cron::Schedule as CronSchedule;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::error::{Result, ScheduleError};

/// 実行するメンテナンスジョブの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// 受信箱のタスクを専門分野で自動割り当て
    ClassifyInbox,
    /// 応答のないエージェントを idle / offline に変更
    RefreshAgentStatuses,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClassifyInbox => "classify_inbox",
            Self::RefreshAgentStatuses => "refresh_agent_statuses",
        }
    }
}

/// スケジュール全体の設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// スケジュールジョブのリスト
    #[serde(default)]
    pub schedules: Vec<ScheduleJob>,
}

/// 個別のスケジュールジョブ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleJob {
    /// ジョブ名
    pub name: String,

    /// cron 形式のスケジュール (秒を含む 6 フィールド, 例: "0 */15 * * * *")
    pub cron: String,

    /// 実行するジョブ
    pub job: JobKind,

    /// 有効/無効
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl ScheduleJob {
    pub fn new(name: impl Into<String>, cron: impl Into<String>, job: JobKind) -> Self {
        Self {
            name: name.into(),
            cron: cron.into(),
            job,
            enabled: true,
        }
    }

    /// cron 文字列をパース
    pub fn schedule(&self) -> Result<CronSchedule> {
        CronSchedule::from_str(&self.cron).map_err(|source| ScheduleError::CronParse {
            name: self.name.clone(),
            source,
        })
    }
}

impl Default for ScheduleConfig {
    /// 組み込みのジョブ: 15 分ごとの受信箱分類と毎時のエージェント状態更新
    fn default() -> Self {
        Self {
            schedules: vec![
                ScheduleJob::new("classify_inbox", "0 */15 * * * *", JobKind::ClassifyInbox),
                ScheduleJob::new("refresh_agent_statuses", "0 0 * * * *", JobKind::RefreshAgentStatuses),
            ],
        }
    }
}

impl ScheduleConfig {
    /// TOML ファイルから設定を読み込む
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ScheduleError::ConfigLoad(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ScheduleConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// デフォルトパスから設定を読み込む
    pub fn load_default() -> Result<Self> {
        let paths = ["schedule.toml", "config/schedule.toml", ".mission-control/schedule.toml"];

        for path in &paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        // 設定ファイルがない場合は組み込みのジョブを使う
        Ok(Self::default())
    }

    /// 指定パスがあればそこから、なければデフォルトパスから読み込む
    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::load_default(),
        }
    }

    /// すべての cron 式を検証
    pub fn validate(&self) -> Result<()> {
        for job in &self.schedules {
            job.schedule()?;
        }
        Ok(())
    }

    /// 有効なジョブのみを返す
    pub fn enabled_jobs(&self) -> Vec<&ScheduleJob> {
        self.schedules.iter().filter(|j| j.enabled).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[[schedules]]
name = "受信箱の分類"
cron = "0 */5 * * * *"
job = "classify_inbox"

[[schedules]]
name = "状態更新"
cron = "0 30 * * * *"
job = "refresh_agent_statuses"
enabled = false
"#;
        let config = ScheduleConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.schedules.len(), 2);
        assert_eq!(config.schedules[0].job, JobKind::ClassifyInbox);
        assert!(config.schedules[0].enabled); // デフォルトで有効
        assert_eq!(config.enabled_jobs().len(), 1);
    }

    #[test]
    fn test_invalid_cron_rejected() {
        let toml = r#"
[[schedules]]
name = "broken"
cron = "invalid"
job = "classify_inbox"
"#;
        let err = ScheduleConfig::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, ScheduleError::CronParse { .. }));
    }

    #[test]
    fn test_unknown_job_rejected() {
        let toml = r#"
[[schedules]]
name = "x"
cron = "0 * * * * *"
job = "send_newsletter"
"#;
        assert!(ScheduleConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_builtin_jobs_parse() {
        let config = ScheduleConfig::default();
        assert_eq!(config.enabled_jobs().len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[[schedules]]\nname = \"hourly\"\ncron = \"0 0 * * * *\"\njob = \"refresh_agent_statuses\""
        )
        .unwrap();

        let config = ScheduleConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.schedules[0].name, "hourly");
    }

    #[test]
    fn test_missing_file() {
        let err = ScheduleConfig::from_file("/nonexistent/schedule.toml").unwrap_err();
        assert!(matches!(err, ScheduleError::ConfigLoad(_)));
    }
}
