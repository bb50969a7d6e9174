use chrono::{DateTime, Utc};
use rusqlite::{Row, params};

use super::{Store, new_id, parse_json, parse_ts, ts};
use crate::Result;
use crate::model::{NewRouterDecision, RouterDecision};

const DECISION_COLUMNS: &str = "id, message_id, targets, reasoning, model, cost, triggered, created_at";

fn decision_from_row(row: &Row<'_>) -> rusqlite::Result<RouterDecision> {
    let targets: String = row.get(2)?;
    let created_at: String = row.get(7)?;

    Ok(RouterDecision {
        id: row.get(0)?,
        message_id: row.get(1)?,
        targets: parse_json(2, &targets)?,
        reasoning: row.get(3)?,
        model: row.get(4)?,
        cost: row.get(5)?,
        triggered: row.get(6)?,
        created_at: parse_ts(7, &created_at)?,
    })
}

impl Store {
    /// Append a router decision
    pub fn insert_decision(&self, new: NewRouterDecision, now: DateTime<Utc>) -> Result<RouterDecision> {
        let decision = RouterDecision {
            id: new_id(),
            message_id: new.message_id,
            targets: new.targets,
            reasoning: new.reasoning,
            model: new.model,
            cost: new.cost,
            triggered: new.triggered,
            created_at: now,
        };
        let targets = serde_json::to_string(&decision.targets)?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO router_decisions (id, message_id, targets, reasoning, model, cost, triggered, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                decision.id,
                decision.message_id,
                targets,
                decision.reasoning,
                decision.model,
                decision.cost,
                decision.triggered,
                ts(&decision.created_at),
            ],
        )?;

        Ok(decision)
    }

    pub fn decisions_since(&self, since: DateTime<Utc>) -> Result<Vec<RouterDecision>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM router_decisions WHERE created_at >= ?1 ORDER BY created_at",
            DECISION_COLUMNS
        ))?;
        let decisions = stmt
            .query_map(params![ts(&since)], decision_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(decisions)
    }

    /// Most recent decisions, newest first
    pub fn recent_decisions(&self, limit: usize) -> Result<Vec<RouterDecision>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM router_decisions ORDER BY created_at DESC LIMIT ?1",
            DECISION_COLUMNS
        ))?;
        let decisions = stmt
            .query_map(params![limit as i64], decision_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(decisions)
    }

    /// Total routing spend (USD) recorded since `since`
    pub fn routing_cost_since(&self, since: DateTime<Utc>) -> Result<f64> {
        let conn = self.conn()?;
        let total: f64 = conn.query_row(
            "SELECT COALESCE(SUM(cost), 0.0) FROM router_decisions WHERE created_at >= ?1",
            params![ts(&since)],
            |row| row.get(0),
        )?;
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_decision(cost: f64) -> NewRouterDecision {
        NewRouterDecision {
            message_id: "msg-1".to_string(),
            targets: vec!["main".to_string()],
            reasoning: "test".to_string(),
            model: "claude-3-haiku-20240307".to_string(),
            cost,
            triggered: true,
        }
    }

    #[test]
    fn test_cost_window() {
        let store = Store::in_memory().unwrap();
        let now = Utc::now();
        store.insert_decision(new_decision(0.25), now - Duration::days(2)).unwrap();
        store.insert_decision(new_decision(0.01), now).unwrap();
        store.insert_decision(new_decision(0.02), now).unwrap();

        let since = now - Duration::hours(1);
        assert!((store.routing_cost_since(since).unwrap() - 0.03).abs() < 1e-9);
        assert_eq!(store.decisions_since(since).unwrap().len(), 2);
    }

    #[test]
    fn test_cost_empty_is_zero() {
        let store = Store::in_memory().unwrap();
        assert_eq!(store.routing_cost_since(Utc::now()).unwrap(), 0.0);
    }

    #[test]
    fn test_recent_decisions_newest_first() {
        let store = Store::in_memory().unwrap();
        let now = Utc::now();
        store.insert_decision(new_decision(0.1), now - Duration::minutes(5)).unwrap();
        let latest = store.insert_decision(new_decision(0.2), now).unwrap();

        let recent = store.recent_decisions(1).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, latest.id);
        assert_eq!(recent[0].targets, vec!["main"]);
    }
}
