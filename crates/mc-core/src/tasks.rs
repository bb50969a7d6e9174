//! Task lifecycle: creation, assignment, the state machine and inbox routing

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::delivery::DeliveryTracker;
use crate::model::{
    AUTO_APPROVE, Activity, ActivityDetail, ActivityKind, Agent, AutoApprovePolicy, NewNotification,
    NewTask, NotificationKind, Policy, PolicyValue, Reference, Task, TaskPatch, TaskStatus,
};
use crate::outbound::{Alert, OutboundJob, OutboundSink, WakeReason, WakeRequest};
use crate::routing::ExpertiseTable;
use crate::store::Store;
use crate::{Error, Result};

/// Actor name used when no agent is acting
const SYSTEM_ACTOR: &str = "System";

/// Result of a batch inbox classification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxReport {
    pub assigned: usize,
    pub total: usize,
}

/// Result of one auto-transition evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoTransitionOutcome {
    pub transitioned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AutoTransitionOutcome {
    fn skipped(reason: &str) -> Self {
        Self {
            transitioned: false,
            from: None,
            to: None,
            reason: Some(reason.to_string()),
        }
    }
}

/// One automatic edge of the state machine
struct TransitionRule {
    from: TaskStatus,
    to: TaskStatus,
    guard: fn(&Task, &AutoApprovePolicy) -> bool,
}

/// Evaluated in order; the first rule whose `from` and guard match wins
const AUTO_RULES: &[TransitionRule] = &[
    TransitionRule {
        from: TaskStatus::Inbox,
        to: TaskStatus::Assigned,
        guard: assigned_with_allowed_priority,
    },
    TransitionRule {
        from: TaskStatus::Assigned,
        to: TaskStatus::InProgress,
        guard: unconditional,
    },
];

fn assigned_with_allowed_priority(task: &Task, policy: &AutoApprovePolicy) -> bool {
    !task.assignee_ids.is_empty() && policy.allows(task.priority)
}

fn unconditional(_: &Task, _: &AutoApprovePolicy) -> bool {
    true
}

/// Task operations over the store, with notifications and outbound alerts
#[derive(Clone)]
pub struct TaskService {
    store: Arc<Store>,
    tracker: DeliveryTracker,
    expertise: Arc<ExpertiseTable>,
    outbound: Arc<dyn OutboundSink>,
}

impl TaskService {
    pub fn new(store: Arc<Store>, expertise: ExpertiseTable, outbound: Arc<dyn OutboundSink>) -> Self {
        Self {
            tracker: DeliveryTracker::new(store.clone()),
            store,
            expertise: Arc::new(expertise),
            outbound,
        }
    }

    pub fn get(&self, id: &str) -> Result<Task> {
        self.store.task(id)?.ok_or_else(|| Error::not_found("task", id))
    }

    pub fn list(&self, status: Option<TaskStatus>) -> Result<Vec<Task>> {
        self.store.list_tasks(status)
    }

    pub fn create(&self, new: NewTask) -> Result<Task> {
        new.validate()?;
        let actor = self.resolve_actor(new.created_by.as_deref())?;
        let assignees = self.resolve_agents(&new.assignees)?;

        let now = Utc::now();
        let task = Task {
            id: uuid::Uuid::now_v7().to_string(),
            title: new.title,
            description: new.description,
            status: if assignees.is_empty() {
                TaskStatus::Inbox
            } else {
                TaskStatus::Assigned
            },
            priority: new.priority,
            assignee_ids: assignees.iter().map(|a| a.id.clone()).collect(),
            created_by: new.created_by,
            due_at: new.due_at,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        self.store.insert_task(&task)?;
        info!(id = %task.id, status = task.status.as_str(), "task created");

        self.store.log_activity(
            Activity::new(
                ActivityKind::TaskCreated,
                format!("{} created task \"{}\"", actor_name(actor.as_ref()), task.title),
            )
            .by_agent(actor.as_ref().map(|a| a.id.clone()))
            .on_task(&task.id),
        );

        if !assignees.is_empty() {
            self.notify_assignees(&task, &assignees, actor.as_ref(), "New task assigned")?;
            self.broadcast_assignment(&task, &assignees, actor.as_ref());
        }
        Ok(task)
    }

    /// Update descriptive fields; status is untouched
    pub fn update(&self, id: &str, patch: TaskPatch, actor_key: Option<&str>) -> Result<Task> {
        patch.validate()?;
        let actor = self.resolve_actor(actor_key)?;
        let mut task = self.get(id)?;

        patch.apply(&mut task);
        task.updated_at = Utc::now();
        self.store.save_task(&task)?;

        self.store.log_activity(
            Activity::new(
                ActivityKind::TaskUpdated,
                format!("{} updated task \"{}\"", actor_name(actor.as_ref()), task.title),
            )
            .by_agent(actor.map(|a| a.id))
            .on_task(&task.id),
        );
        Ok(task)
    }

    /// Direct transition to any status
    pub fn update_status(&self, id: &str, status: TaskStatus, actor_key: Option<&str>) -> Result<Task> {
        let actor = self.resolve_actor(actor_key)?;
        let mut task = self.get(id)?;
        let from = task.status;

        let now = Utc::now();
        task.status = status;
        task.updated_at = now;
        if status == TaskStatus::Done && task.completed_at.is_none() {
            task.completed_at = Some(now);
        }
        self.store.save_task(&task)?;
        debug!(id, from = from.as_str(), to = status.as_str(), "task status updated");

        let name = actor_name(actor.as_ref()).to_string();
        let kind = if status == TaskStatus::Done {
            ActivityKind::TaskCompleted
        } else {
            ActivityKind::TaskUpdated
        };
        self.store.log_activity(
            Activity::new(
                kind,
                format!("{} moved \"{}\" from {} to {}", name, task.title, from, status),
            )
            .by_agent(actor.map(|a| a.id))
            .on_task(&task.id)
            .with_detail(ActivityDetail::Transition {
                from,
                to: status,
                automatic: false,
            }),
        );

        match status {
            TaskStatus::Done => self.outbound.enqueue(OutboundJob::Broadcast(Alert::TaskCompleted {
                title: task.title.clone(),
                agent: name,
            })),
            TaskStatus::Blocked => self.outbound.enqueue(OutboundJob::Broadcast(Alert::TaskBlocked {
                title: task.title.clone(),
                agent: name,
            })),
            _ => {}
        }
        Ok(task)
    }

    /// Replace the assignee set; only newly added agents are notified
    pub fn assign(&self, id: &str, assignee_keys: &[String], actor_key: Option<&str>) -> Result<Task> {
        let actor = self.resolve_actor(actor_key)?;
        let assignees = self.resolve_agents(assignee_keys)?;
        let mut task = self.get(id)?;

        let added: Vec<Agent> = assignees
            .iter()
            .filter(|a| !task.assignee_ids.contains(&a.id))
            .cloned()
            .collect();

        task.assignee_ids = assignees.iter().map(|a| a.id.clone()).collect();
        task.status = if task.assignee_ids.is_empty() {
            TaskStatus::Inbox
        } else {
            TaskStatus::Assigned
        };
        task.updated_at = Utc::now();
        self.store.save_task(&task)?;

        let names: Vec<&str> = assignees.iter().map(|a| a.name.as_str()).collect();
        self.store.log_activity(
            Activity::new(
                ActivityKind::TaskAssigned,
                format!(
                    "{} assigned \"{}\" to {}",
                    actor_name(actor.as_ref()),
                    task.title,
                    if names.is_empty() { "nobody".to_string() } else { names.join(", ") }
                ),
            )
            .by_agent(actor.as_ref().map(|a| a.id.clone()))
            .on_task(&task.id)
            .with_detail(ActivityDetail::Assignment {
                assignee_ids: task.assignee_ids.clone(),
            }),
        );

        if !added.is_empty() {
            self.notify_assignees(&task, &added, actor.as_ref(), "Task assigned to you")?;
            self.broadcast_assignment(&task, &added, actor.as_ref());
        }
        Ok(task)
    }

    /// Apply at most one automatic hop, gated by the `auto_approve` policy
    pub fn auto_transition(&self, id: &str, actor_key: Option<&str>) -> Result<AutoTransitionOutcome> {
        let actor = self.resolve_actor(actor_key)?;
        let mut task = self.get(id)?;
        let policy = self.auto_approve_policy()?;

        if !policy.enabled {
            return Ok(AutoTransitionOutcome::skipped("auto_approve disabled"));
        }

        let Some(rule) = AUTO_RULES
            .iter()
            .find(|rule| rule.from == task.status && (rule.guard)(&task, &policy))
        else {
            return Ok(AutoTransitionOutcome::skipped("no matching transition"));
        };

        let from = task.status;
        task.status = rule.to;
        task.updated_at = Utc::now();
        self.store.save_task(&task)?;
        info!(id, from = from.as_str(), to = rule.to.as_str(), "task auto-transitioned");

        self.store.log_activity(
            Activity::new(
                ActivityKind::TaskUpdated,
                format!("Auto-transition: \"{}\" {} -> {}", task.title, from, rule.to),
            )
            .by_agent(actor.map(|a| a.id))
            .on_task(&task.id)
            .with_detail(ActivityDetail::Transition {
                from,
                to: rule.to,
                automatic: true,
            }),
        );

        Ok(AutoTransitionOutcome {
            transitioned: true,
            from: Some(from),
            to: Some(rule.to),
            reason: None,
        })
    }

    /// Remove a task and every notification pointing at it
    pub fn delete(&self, id: &str, actor_key: Option<&str>) -> Result<()> {
        let actor = self.resolve_actor(actor_key)?;
        let task = self.get(id)?;

        let removed = self.tracker.delete_for_reference(&task.id)?;
        self.store.delete_task(&task.id)?;
        debug!(id, notifications = removed, "task deleted");

        self.store.log_activity(
            Activity::new(
                ActivityKind::TaskDeleted,
                format!("{} deleted task \"{}\"", actor_name(actor.as_ref()), task.title),
            )
            .by_agent(actor.map(|a| a.id))
            .on_task(&task.id),
        );
        Ok(())
    }

    /// Route every inbox task through the expertise classifier
    pub fn classify_inbox(&self) -> Result<InboxReport> {
        let inbox = self.store.list_tasks(Some(TaskStatus::Inbox))?;
        let mut report = InboxReport {
            assigned: 0,
            total: inbox.len(),
        };

        for task in inbox {
            match self.auto_assign(task) {
                Ok(true) => report.assigned += 1,
                Ok(false) => {}
                Err(e) => warn!(error = %e, "inbox task skipped"),
            }
        }

        info!(assigned = report.assigned, total = report.total, "inbox classified");
        Ok(report)
    }

    fn auto_assign(&self, mut task: Task) -> Result<bool> {
        let mut assignees = Vec::new();
        for key in self.expertise.classify(&task.classification_text()) {
            match self.store.agent_by_key(&key)? {
                Some(agent) => assignees.push(agent),
                None => debug!(key = %key, "classifier candidate is not a registered agent"),
            }
        }
        if assignees.is_empty() {
            return Ok(false);
        }

        task.assignee_ids = assignees.iter().map(|a| a.id.clone()).collect();
        task.status = TaskStatus::Assigned;
        task.updated_at = Utc::now();
        self.store.save_task(&task)?;

        let names: Vec<&str> = assignees.iter().map(|a| a.name.as_str()).collect();
        self.store.log_activity(
            Activity::new(
                ActivityKind::TaskAssigned,
                format!("Auto-assigned \"{}\" to {}", task.title, names.join(", ")),
            )
            .on_task(&task.id)
            .with_detail(ActivityDetail::Assignment {
                assignee_ids: task.assignee_ids.clone(),
            }),
        );

        self.notify_assignees(&task, &assignees, None, "Auto-assigned task")?;
        Ok(true)
    }

    fn auto_approve_policy(&self) -> Result<AutoApprovePolicy> {
        Ok(match self.store.policy(AUTO_APPROVE)? {
            Some(Policy {
                value: PolicyValue::AutoApprove(policy),
                ..
            }) => policy,
            Some(_) => {
                warn!("stored auto_approve policy is not typed, using default");
                AutoApprovePolicy::default()
            }
            None => AutoApprovePolicy::default(),
        })
    }

    fn resolve_actor(&self, key: Option<&str>) -> Result<Option<Agent>> {
        key.map(|key| {
            self.store
                .agent_by_key(key)?
                .ok_or_else(|| Error::not_found("agent", key))
        })
        .transpose()
    }

    /// Resolve session keys to agents, dropping duplicates
    fn resolve_agents(&self, keys: &[String]) -> Result<Vec<Agent>> {
        let mut agents: Vec<Agent> = Vec::with_capacity(keys.len());
        for key in keys {
            let agent = self
                .store
                .agent_by_key(key)?
                .ok_or_else(|| Error::not_found("agent", key.as_str()))?;
            if !agents.iter().any(|a| a.id == agent.id) {
                agents.push(agent);
            }
        }
        Ok(agents)
    }

    /// One assignment notification plus a wake job per agent
    fn notify_assignees(&self, task: &Task, agents: &[Agent], actor: Option<&Agent>, title: &str) -> Result<()> {
        for agent in agents {
            let notification = self.tracker.create(
                NewNotification::new(&agent.id, NotificationKind::Assignment, title, &task.title)
                    .from_agent(actor.map(|a| a.id.clone()))
                    .with_reference(Reference::task(&task.id)),
            )?;

            self.outbound.enqueue(OutboundJob::Wake(WakeRequest {
                agent_key: agent.session_key.clone(),
                agent_name: agent.name.clone(),
                notification_id: Some(notification.id),
                reason: WakeReason::TaskAssigned {
                    task_id: task.id.clone(),
                    title: task.title.clone(),
                    description: task.description.clone(),
                    assigner: actor_name(actor).to_string(),
                },
            }));
        }
        Ok(())
    }

    fn broadcast_assignment(&self, task: &Task, agents: &[Agent], actor: Option<&Agent>) {
        self.outbound.enqueue(OutboundJob::Broadcast(Alert::TaskAssigned {
            assigner: actor_name(actor).to_string(),
            assignees: agents.iter().map(|a| a.name.clone()).collect(),
            title: task.title.clone(),
            description: task.description.clone(),
        }));
    }
}

fn actor_name(actor: Option<&Agent>) -> &str {
    actor.map(|a| a.name.as_str()).unwrap_or(SYSTEM_ACTOR)
}
