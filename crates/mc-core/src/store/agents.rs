use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};

use super::{Store, new_id, parse_enum, parse_ts, ts};
use crate::model::{Agent, NewAgent};
use crate::{Error, Result};

const AGENT_COLUMNS: &str =
    "id, session_key, name, emoji, role, description, status, current_task_id, last_seen_at";

fn agent_from_row(row: &Row<'_>) -> rusqlite::Result<Agent> {
    let status: String = row.get(6)?;
    let last_seen_at: String = row.get(8)?;

    Ok(Agent {
        id: row.get(0)?,
        session_key: row.get(1)?,
        name: row.get(2)?,
        emoji: row.get(3)?,
        role: row.get(4)?,
        description: row.get(5)?,
        status: parse_enum(6, &status)?,
        current_task_id: row.get(7)?,
        last_seen_at: parse_ts(8, &last_seen_at)?,
    })
}

impl Store {
    /// Insert a new agent; the session key must be unused
    pub fn insert_agent(&self, new: &NewAgent, now: DateTime<Utc>) -> Result<Agent> {
        let conn = self.conn()?;

        let exists: Option<String> = conn
            .query_row(
                "SELECT id FROM agents WHERE session_key = ?1",
                params![new.session_key],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(Error::Validation(format!(
                "agent already registered: {}",
                new.session_key
            )));
        }

        let agent = Agent {
            id: new_id(),
            session_key: new.session_key.clone(),
            name: new.name.clone(),
            emoji: new.emoji.clone(),
            role: new.role.clone(),
            description: new.description.clone(),
            status: Default::default(),
            current_task_id: None,
            last_seen_at: now,
        };

        conn.execute(
            "INSERT INTO agents (id, session_key, name, emoji, role, description, status, current_task_id, last_seen_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                agent.id,
                agent.session_key,
                agent.name,
                agent.emoji,
                agent.role,
                agent.description,
                agent.status.as_str(),
                agent.current_task_id,
                ts(&agent.last_seen_at),
            ],
        )?;

        Ok(agent)
    }

    pub fn agent(&self, id: &str) -> Result<Option<Agent>> {
        let conn = self.conn()?;
        let agent = conn
            .query_row(
                &format!("SELECT {} FROM agents WHERE id = ?1", AGENT_COLUMNS),
                params![id],
                agent_from_row,
            )
            .optional()?;
        Ok(agent)
    }

    pub fn agent_by_key(&self, session_key: &str) -> Result<Option<Agent>> {
        let conn = self.conn()?;
        let agent = conn
            .query_row(
                &format!("SELECT {} FROM agents WHERE session_key = ?1", AGENT_COLUMNS),
                params![session_key],
                agent_from_row,
            )
            .optional()?;
        Ok(agent)
    }

    pub fn list_agents(&self) -> Result<Vec<Agent>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM agents ORDER BY session_key",
            AGENT_COLUMNS
        ))?;

        let agents = stmt
            .query_map([], agent_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(agents)
    }

    /// Overwrite the mutable fields of an existing agent
    pub fn save_agent(&self, agent: &Agent) -> Result<()> {
        let conn = self.conn()?;
        let affected = conn.execute(
            "UPDATE agents SET name = ?2, emoji = ?3, role = ?4, description = ?5,
                status = ?6, current_task_id = ?7, last_seen_at = ?8
             WHERE id = ?1",
            params![
                agent.id,
                agent.name,
                agent.emoji,
                agent.role,
                agent.description,
                agent.status.as_str(),
                agent.current_task_id,
                ts(&agent.last_seen_at),
            ],
        )?;

        if affected == 0 {
            return Err(Error::not_found("agent", &agent.id));
        }
        Ok(())
    }

    /// Stamp `last_seen_at` by session key
    pub fn touch_agent(&self, session_key: &str, now: DateTime<Utc>) -> Result<()> {
        let conn = self.conn()?;
        let affected = conn.execute(
            "UPDATE agents SET last_seen_at = ?2 WHERE session_key = ?1",
            params![session_key, ts(&now)],
        )?;

        if affected == 0 {
            return Err(Error::not_found("agent", session_key));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AgentStatus;

    fn new_agent(key: &str) -> NewAgent {
        NewAgent {
            session_key: key.to_string(),
            name: key.to_uppercase(),
            emoji: Some("🤖".to_string()),
            role: "test".to_string(),
            description: None,
        }
    }

    #[test]
    fn test_insert_and_lookup() {
        let store = Store::in_memory().unwrap();
        let agent = store.insert_agent(&new_agent("main"), Utc::now()).unwrap();

        assert_eq!(agent.status, AgentStatus::Idle);
        let by_key = store.agent_by_key("main").unwrap().unwrap();
        assert_eq!(by_key.id, agent.id);
        let by_id = store.agent(&agent.id).unwrap().unwrap();
        assert_eq!(by_id.session_key, "main");
    }

    #[test]
    fn test_duplicate_session_key_rejected() {
        let store = Store::in_memory().unwrap();
        store.insert_agent(&new_agent("main"), Utc::now()).unwrap();
        let err = store.insert_agent(&new_agent("main"), Utc::now()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_touch_unknown_agent() {
        let store = Store::in_memory().unwrap();
        assert!(store.touch_agent("ghost", Utc::now()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_save_agent() {
        let store = Store::in_memory().unwrap();
        let mut agent = store.insert_agent(&new_agent("bestia"), Utc::now()).unwrap();
        agent.status = AgentStatus::Active;
        store.save_agent(&agent).unwrap();

        let loaded = store.agent(&agent.id).unwrap().unwrap();
        assert_eq!(loaded.status, AgentStatus::Active);
        assert_eq!(store.list_agents().unwrap().len(), 1);
    }
}
