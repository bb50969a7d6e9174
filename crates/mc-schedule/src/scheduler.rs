//! スケジューラー
//!
//! cron スケジュールに基づいてメンテナンスジョブを実行します。

use chrono::Utc;
use mc_core::{AgentRegistry, TaskService};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::{JobKind, ScheduleConfig, ScheduleJob};

/// スケジューラーのハンドル
pub struct SchedulerHandle {
    /// スケジューラータスクの終了送信
    shutdown_tx: broadcast::Sender<()>,
    /// 実行中のタスクハンドル
    handle: JoinHandle<()>,
}

impl SchedulerHandle {
    /// スケジューラーを停止
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.handle.await;
    }
}

/// ジョブの実行に必要なサービス
#[derive(Clone)]
struct JobContext {
    tasks: TaskService,
    agents: AgentRegistry,
}

/// スケジューラー
pub struct Scheduler {
    config: ScheduleConfig,
    context: JobContext,
}

impl Scheduler {
    /// 新しいスケジューラーを作成
    pub fn new(config: ScheduleConfig, tasks: TaskService, agents: AgentRegistry) -> Self {
        Self {
            config,
            context: JobContext { tasks, agents },
        }
    }

    /// スケジューラーを開始
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        // 停止要求を取りこぼさないよう、起動前に受信側を用意する
        let jobs: Vec<_> = self
            .config
            .enabled_jobs()
            .into_iter()
            .map(|job| (job.clone(), self.context.clone(), shutdown_tx.subscribe()))
            .collect();

        let handle = tokio::spawn(async move {
            info!("スケジューラーを開始しました ({} ジョブ)", jobs.len());

            // 各ジョブを別々のタスクで実行
            let mut job_handles = Vec::new();

            for (job, context, mut rx) in jobs {
                let handle = tokio::spawn(async move {
                    run_schedule_job(job, context, &mut rx).await;
                });

                job_handles.push(handle);
            }

            // 全ジョブが終了するまで待機
            for handle in job_handles {
                let _ = handle.await;
            }

            info!("スケジューラーを停止しました");
        });

        SchedulerHandle { shutdown_tx, handle }
    }
}

/// 個別のスケジュールジョブを実行
async fn run_schedule_job(job: ScheduleJob, context: JobContext, shutdown_rx: &mut broadcast::Receiver<()>) {
    // cron スケジュールをパース
    let schedule = match job.schedule() {
        Ok(s) => s,
        Err(e) => {
            error!(job = %job.name, "cron パースエラー: {}", e);
            return;
        }
    };

    info!(job = %job.name, cron = %job.cron, "スケジュールジョブを開始");

    loop {
        // 次の実行時刻を取得
        let now = Utc::now();
        let next = match schedule.upcoming(Utc).next() {
            Some(t) => t,
            None => {
                warn!(job = %job.name, "次の実行時刻を取得できません");
                break;
            }
        };

        let delay = (next - now).to_std().unwrap_or(Duration::ZERO);

        // 実行時刻まで待機（シャットダウン確認付き）
        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                match execute_job(job.job, &context) {
                    Ok(summary) => info!(job = %job.name, "ジョブ完了: {}", summary),
                    Err(e) => error!(job = %job.name, "ジョブ失敗: {}", e),
                }
            }
            _ = shutdown_rx.recv() => {
                info!(job = %job.name, "シャットダウン要求を受信");
                break;
            }
        }
    }
}

/// ジョブを実行して結果の要約を返す
fn execute_job(kind: JobKind, context: &JobContext) -> mc_core::Result<String> {
    match kind {
        JobKind::ClassifyInbox => {
            let report = context.tasks.classify_inbox()?;
            Ok(format!("{}/{} 件を割り当て", report.assigned, report.total))
        }
        JobKind::RefreshAgentStatuses => {
            let changed = context.agents.refresh_statuses()?;
            Ok(format!("{} 件のエージェント状態を更新", changed))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mc_core::model::{NewAgent, NewTask, TaskStatus};
    use mc_core::{ExpertiseTable, NullSink, Store};
    use std::sync::Arc;

    fn context() -> JobContext {
        let store = Arc::new(Store::in_memory().unwrap());
        let agents = AgentRegistry::new(store.clone());
        agents
            .register(NewAgent {
                session_key: "main".to_string(),
                name: "Gilfoyl".to_string(),
                emoji: None,
                role: "coordinator".to_string(),
                description: None,
            })
            .unwrap();
        let tasks = TaskService::new(store, ExpertiseTable::default(), Arc::new(NullSink));
        JobContext { tasks, agents }
    }

    #[test]
    fn test_execute_classify_inbox() {
        let context = context();
        context.tasks.create(NewTask::new("fix the deploy")).unwrap();

        let summary = execute_job(JobKind::ClassifyInbox, &context).unwrap();
        assert_eq!(summary, "1/1 件を割り当て");
        assert!(context.tasks.list(Some(TaskStatus::Inbox)).unwrap().is_empty());
    }

    #[test]
    fn test_execute_refresh() {
        let context = context();
        let summary = execute_job(JobKind::RefreshAgentStatuses, &context).unwrap();
        assert_eq!(summary, "0 件のエージェント状態を更新");
    }

    #[tokio::test]
    async fn test_scheduler_runs_and_stops() {
        let context = context();
        context.tasks.create(NewTask::new("audit infra")).unwrap();

        let config = ScheduleConfig {
            schedules: vec![ScheduleJob::new("every_second", "* * * * * *", JobKind::ClassifyInbox)],
        };
        let handle = Scheduler::new(config, context.tasks.clone(), context.agents.clone()).start();

        tokio::time::sleep(Duration::from_millis(2100)).await;
        handle.stop().await;

        assert_eq!(context.tasks.list(Some(TaskStatus::Assigned)).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stop_without_jobs() {
        let config = ScheduleConfig { schedules: vec![] };
        let context = context();
        let handle = Scheduler::new(config, context.tasks, context.agents).start();
        handle.stop().await;
    }
}
