//! Agent registry: provisioning, heartbeats and status upkeep

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use crate::model::{Activity, ActivityKind, Agent, AgentPatch, AgentStatus, NewAgent};
use crate::routing::AgentProfile;
use crate::store::Store;
use crate::{Error, Result};

/// Silence after which an agent is considered gone
const OFFLINE_AFTER_HOURS: i64 = 24;

/// Silence after which an active agent drops back to idle
const IDLE_AFTER_HOURS: i64 = 6;

#[derive(Clone)]
pub struct AgentRegistry {
    store: Arc<Store>,
}

impl AgentRegistry {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn register(&self, new: NewAgent) -> Result<Agent> {
        new.validate()?;
        let agent = self.store.insert_agent(&new, Utc::now())?;
        info!(key = %agent.session_key, "agent registered");

        self.store.log_activity(
            Activity::new(ActivityKind::AgentJoined, format!("{} joined the team", agent.name))
                .by_agent(Some(agent.id.clone()))
                .on_agent(&agent.id),
        );
        Ok(agent)
    }

    /// Register roster entries that have no agent yet; returns how many were added
    pub fn seed_roster(&self, roster: &[AgentProfile]) -> Result<usize> {
        let mut added = 0;
        for profile in roster {
            if self.store.agent_by_key(&profile.key)?.is_some() {
                continue;
            }
            self.register(NewAgent {
                session_key: profile.key.clone(),
                name: profile.name.clone(),
                emoji: None,
                role: "agent".to_string(),
                description: Some(profile.domain.clone()),
            })?;
            added += 1;
        }
        Ok(added)
    }

    pub fn get(&self, session_key: &str) -> Result<Agent> {
        self.store
            .agent_by_key(session_key)?
            .ok_or_else(|| Error::not_found("agent", session_key))
    }

    pub fn list(&self) -> Result<Vec<Agent>> {
        self.store.list_agents()
    }

    /// Stamp `last_seen_at` without touching status
    pub fn heartbeat(&self, session_key: &str) -> Result<Agent> {
        self.store.touch_agent(session_key, Utc::now())?;
        self.get(session_key)
    }

    pub fn update_status(
        &self,
        session_key: &str,
        status: AgentStatus,
        current_task_id: Option<String>,
    ) -> Result<Agent> {
        let mut agent = self.get(session_key)?;
        let previous = agent.status;

        agent.status = status;
        if current_task_id.is_some() {
            agent.current_task_id = current_task_id;
        }
        agent.last_seen_at = Utc::now();
        self.store.save_agent(&agent)?;

        if previous != status {
            self.store.log_activity(
                Activity::new(
                    ActivityKind::AgentStatusChanged,
                    format!("{} is now {}", agent.name, status.as_str()),
                )
                .by_agent(Some(agent.id.clone()))
                .on_agent(&agent.id),
            );
        }
        Ok(agent)
    }

    pub fn update(&self, session_key: &str, patch: AgentPatch) -> Result<Agent> {
        patch.validate()?;
        let mut agent = self.get(session_key)?;
        patch.apply(&mut agent);
        self.store.save_agent(&agent)?;
        Ok(agent)
    }

    /// Demote silent agents; returns how many changed
    pub fn refresh_statuses(&self) -> Result<usize> {
        self.refresh_statuses_at(Utc::now())
    }

    pub fn refresh_statuses_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let offline_cutoff = now - Duration::hours(OFFLINE_AFTER_HOURS);
        let idle_cutoff = now - Duration::hours(IDLE_AFTER_HOURS);

        let mut changed = 0;
        for mut agent in self.store.list_agents()? {
            let next = if agent.last_seen_at < offline_cutoff && agent.status != AgentStatus::Offline {
                AgentStatus::Offline
            } else if agent.last_seen_at < idle_cutoff && agent.status == AgentStatus::Active {
                AgentStatus::Idle
            } else {
                continue;
            };

            debug!(key = %agent.session_key, from = agent.status.as_str(), to = next.as_str(), "agent status refreshed");
            agent.status = next;
            self.store.save_agent(&agent)?;
            changed += 1;
        }

        if changed > 0 {
            info!(changed, "agent statuses refreshed");
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> AgentRegistry {
        AgentRegistry::new(Arc::new(Store::in_memory().unwrap()))
    }

    fn new_agent(key: &str, name: &str) -> NewAgent {
        NewAgent {
            session_key: key.to_string(),
            name: name.to_string(),
            emoji: None,
            role: "test".to_string(),
            description: None,
        }
    }

    #[test]
    fn test_register_logs_join() {
        let registry = registry();
        let agent = registry.register(new_agent("bestia", "Bestia")).unwrap();
        assert_eq!(agent.status, AgentStatus::Idle);

        let feed = registry.store.recent_activities(10, None).unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].kind, ActivityKind::AgentJoined);
        assert_eq!(feed[0].message, "Bestia joined the team");
    }

    #[test]
    fn test_register_rejects_blank_key() {
        let err = registry().register(new_agent(" ", "Nobody")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_status_change() {
        let registry = registry();
        registry.register(new_agent("main", "Gilfoyl")).unwrap();

        let agent = registry
            .update_status("main", AgentStatus::Active, Some("task-1".to_string()))
            .unwrap();
        assert_eq!(agent.status, AgentStatus::Active);
        assert_eq!(agent.current_task_id.as_deref(), Some("task-1"));

        let feed = registry.store.recent_activities(10, None).unwrap();
        assert_eq!(feed[0].kind, ActivityKind::AgentStatusChanged);
    }

    #[test]
    fn test_unknown_agent() {
        let registry = registry();
        assert!(registry.heartbeat("ghost").unwrap_err().is_not_found());
        assert!(
            registry
                .update_status("ghost", AgentStatus::Idle, None)
                .unwrap_err()
                .is_not_found()
        );
    }

    #[test]
    fn test_update_metadata() {
        let registry = registry();
        registry.register(new_agent("assistant", "Zosia")).unwrap();

        let agent = registry
            .update(
                "assistant",
                AgentPatch {
                    emoji: Some("📅".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(agent.emoji.as_deref(), Some("📅"));
        assert_eq!(agent.name, "Zosia");
    }

    #[test]
    fn test_seed_roster_skips_existing() {
        let registry = registry();
        registry.register(new_agent("main", "Gilfoyl")).unwrap();

        let roster = AgentProfile::default_roster();
        assert_eq!(registry.seed_roster(&roster).unwrap(), roster.len() - 1);
        assert_eq!(registry.list().unwrap().len(), roster.len());
        assert_eq!(registry.get("main").unwrap().role, "test");

        assert_eq!(registry.seed_roster(&roster).unwrap(), 0);
    }

    #[test]
    fn test_refresh_statuses() {
        let registry = registry();
        registry.register(new_agent("stale", "Stale")).unwrap();
        registry.register(new_agent("busy", "Busy")).unwrap();
        registry.register(new_agent("fresh", "Fresh")).unwrap();
        registry.update_status("busy", AgentStatus::Active, None).unwrap();
        registry.update_status("fresh", AgentStatus::Active, None).unwrap();

        // seven hours on, nothing has gone offline yet
        let later = Utc::now() + Duration::hours(7);
        assert_eq!(registry.refresh_statuses_at(later).unwrap(), 2);
        assert_eq!(registry.get("busy").unwrap().status, AgentStatus::Idle);
        assert_eq!(registry.get("stale").unwrap().status, AgentStatus::Idle);

        let much_later = Utc::now() + Duration::hours(25);
        assert_eq!(registry.refresh_statuses_at(much_later).unwrap(), 3);
        assert_eq!(registry.get("fresh").unwrap().status, AgentStatus::Offline);

        // already offline agents are left alone
        assert_eq!(registry.refresh_statuses_at(much_later).unwrap(), 0);
    }
}
