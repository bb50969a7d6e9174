//! Bounded outbound queue drained by a worker pool

use async_trait::async_trait;
use mc_core::{DeliveryOutcome, DeliveryTracker, NotifierConfig, OutboundJob, OutboundSink};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::format::render_alert;
use crate::telegram::{TeamChannel, TelegramChannel};
use crate::wake::{AgentWaker, HttpWaker, POLLING_MODE};

/// Fixed-delay retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure
    pub retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 0,
            delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueOptions {
    pub workers: usize,
    pub capacity: usize,
    pub retry: RetryPolicy,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self::from_config(&NotifierConfig::default())
    }
}

impl QueueOptions {
    pub fn from_config(config: &NotifierConfig) -> Self {
        Self {
            workers: config.workers.max(1),
            capacity: config.queue_capacity.max(1),
            retry: RetryPolicy {
                retries: config.retries,
                delay: Duration::from_millis(config.retry_delay_ms),
            },
        }
    }
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
}

/// Point-in-time queue counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub enqueued: u64,
    pub dropped: u64,
    pub delivered: u64,
    pub failed: u64,
    pub retried: u64,
}

struct Envelope {
    job: OutboundJob,
    reply: Option<oneshot::Sender<DeliveryOutcome>>,
}

/// Producer side of the queue; cheap to clone
#[derive(Clone)]
pub struct OutboundQueue {
    tx: mpsc::Sender<Envelope>,
    counters: Arc<Counters>,
}

/// Running worker pool
pub struct QueueHandle {
    shutdown_tx: broadcast::Sender<()>,
    workers: Vec<JoinHandle<()>>,
}

impl QueueHandle {
    /// Stop accepting jobs and wait for the workers to finish what is queued
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

struct Worker {
    channel: Arc<dyn TeamChannel>,
    waker: Arc<dyn AgentWaker>,
    tracker: Option<DeliveryTracker>,
    retry: RetryPolicy,
    counters: Arc<Counters>,
}

impl OutboundQueue {
    /// Telegram channel plus HTTP waker, both built from configuration
    pub fn from_config(config: &NotifierConfig, tracker: DeliveryTracker) -> Result<(Self, QueueHandle)> {
        let channel = Arc::new(TelegramChannel::from_config(config)?);
        if !channel.is_configured() {
            warn!("Telegram team channel not configured, broadcasts will fail");
        }
        let waker = Arc::new(HttpWaker::from_config(config)?);
        if config.wake_url.is_none() {
            info!("No agent wake URL configured, agents will poll for notifications");
        }

        Ok(Self::start(QueueOptions::from_config(config), channel, waker, Some(tracker)))
    }

    pub fn start(
        options: QueueOptions,
        channel: Arc<dyn TeamChannel>,
        waker: Arc<dyn AgentWaker>,
        tracker: Option<DeliveryTracker>,
    ) -> (Self, QueueHandle) {
        let (tx, rx) = mpsc::channel::<Envelope>(options.capacity.max(1));
        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let counters = Arc::new(Counters::default());
        let rx = Arc::new(Mutex::new(rx));

        let worker = Arc::new(Worker {
            channel,
            waker,
            tracker,
            retry: options.retry,
            counters: counters.clone(),
        });

        let workers = (0..options.workers.max(1))
            .map(|id| {
                let worker = worker.clone();
                let rx = rx.clone();
                let mut shutdown = shutdown_tx.subscribe();
                tokio::spawn(async move {
                    debug!(worker = id, "outbound worker started");
                    loop {
                        let envelope = tokio::select! {
                            envelope = async { rx.lock().await.recv().await } => match envelope {
                                Some(envelope) => envelope,
                                None => break,
                            },
                            _ = shutdown.recv() => break,
                        };
                        worker.deliver(envelope).await;
                    }

                    // scheduled jobs still run; new ones are refused
                    loop {
                        let next = {
                            let mut rx = rx.lock().await;
                            rx.close();
                            rx.try_recv()
                        };
                        match next {
                            Ok(envelope) => worker.deliver(envelope).await,
                            Err(_) => break,
                        }
                    }
                    debug!(worker = id, "outbound worker stopped");
                })
            })
            .collect();

        info!(workers = options.workers.max(1), capacity = options.capacity, "outbound queue started");
        (Self { tx, counters }, QueueHandle { shutdown_tx, workers })
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            retried: self.counters.retried.load(Ordering::Relaxed),
        }
    }

    /// Never waits for room; a full or closed queue drops the job
    fn submit(&self, envelope: Envelope) -> std::result::Result<(), &'static str> {
        let label = envelope.job.label();
        match self.tx.try_send(envelope) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(job = label, "outbound queue full, job dropped");
                Err("outbound queue full")
            }
            Err(TrySendError::Closed(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(job = label, "outbound queue closed, job dropped");
                Err("outbound queue closed")
            }
        }
    }
}

#[async_trait]
impl OutboundSink for OutboundQueue {
    fn enqueue(&self, job: OutboundJob) {
        let _ = self.submit(Envelope { job, reply: None });
    }

    async fn dispatch(&self, job: OutboundJob) -> DeliveryOutcome {
        let (reply, outcome) = oneshot::channel();
        if let Err(reason) = self.submit(Envelope {
            job,
            reply: Some(reply),
        }) {
            return DeliveryOutcome::failed(reason);
        }

        outcome
            .await
            .unwrap_or_else(|_| DeliveryOutcome::failed("outbound worker stopped"))
    }
}

impl Worker {
    async fn deliver(&self, envelope: Envelope) {
        let outcome = self.run(&envelope.job).await;
        if let Some(reply) = envelope.reply {
            let _ = reply.send(outcome);
        }
    }

    async fn run(&self, job: &OutboundJob) -> DeliveryOutcome {
        let mut attempt = 0;
        loop {
            match self.attempt(job).await {
                Ok(result) => {
                    self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                    return DeliveryOutcome::ok(result);
                }
                Err(e) if e.is_retryable() && attempt < self.retry.retries => {
                    attempt += 1;
                    self.counters.retried.fetch_add(1, Ordering::Relaxed);
                    warn!(job = job.label(), attempt, error = %e, "outbound delivery failed, retrying");
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(e) => {
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(job = job.label(), error = %e, "outbound delivery failed");
                    return DeliveryOutcome::failed(e.to_string());
                }
            }
        }
    }

    async fn attempt(&self, job: &OutboundJob) -> Result<String> {
        match job {
            OutboundJob::Broadcast(alert) => self.channel.send(alert.audience(), &render_alert(alert)).await,
            OutboundJob::Wake(request) => match self.waker.wake(request).await? {
                None => Ok(POLLING_MODE.to_string()),
                Some(result) => {
                    if let (Some(tracker), Some(id)) = (&self.tracker, &request.notification_id) {
                        if let Err(e) = tracker.record_delivery_attempt(id) {
                            warn!(notification = %id, error = %e, "failed to record delivery attempt");
                        }
                    }
                    Ok(result)
                }
            },
        }
    }
}
