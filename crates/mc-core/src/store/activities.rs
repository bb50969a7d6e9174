use rusqlite::{Row, params};
use tracing::warn;

use super::{Store, parse_enum, parse_json, parse_ts, ts};
use crate::Result;
use crate::model::{Activity, ActivityTarget};

const ACTIVITY_COLUMNS: &str = "id, kind, agent_id, message, target_id, target_kind, detail, created_at";

fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<Activity> {
    let kind: String = row.get(1)?;
    let target_id: Option<String> = row.get(4)?;
    let target_kind: Option<String> = row.get(5)?;
    let detail: Option<String> = row.get(6)?;
    let created_at: String = row.get(7)?;

    Ok(Activity {
        id: row.get(0)?,
        kind: parse_enum(1, &kind)?,
        agent_id: row.get(2)?,
        message: row.get(3)?,
        target: target_id.map(|id| ActivityTarget {
            id,
            kind: target_kind.unwrap_or_default(),
        }),
        detail: detail.map(|d| parse_json(6, &d)).transpose()?,
        created_at: parse_ts(7, &created_at)?,
    })
}

impl Store {
    pub fn insert_activity(&self, activity: &Activity) -> Result<()> {
        let detail = activity
            .detail
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO activities (id, kind, agent_id, message, target_id, target_kind, detail, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                activity.id,
                activity.kind.as_str(),
                activity.agent_id,
                activity.message,
                activity.target.as_ref().map(|t| t.id.as_str()),
                activity.target.as_ref().map(|t| t.kind.as_str()),
                detail,
                ts(&activity.created_at),
            ],
        )?;
        Ok(())
    }

    /// Append to the feed; a failed write is logged, never returned
    pub fn log_activity(&self, activity: Activity) {
        if let Err(e) = self.insert_activity(&activity) {
            warn!(kind = activity.kind.as_str(), error = %e, "failed to append activity");
        }
    }

    /// Newest activities first, optionally limited to one acting agent
    pub fn recent_activities(&self, limit: usize, agent_id: Option<&str>) -> Result<Vec<Activity>> {
        let conn = self.conn()?;
        let activities = match agent_id {
            Some(agent_id) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM activities WHERE agent_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
                    ACTIVITY_COLUMNS
                ))?;
                stmt.query_map(params![agent_id, limit as i64], activity_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM activities ORDER BY created_at DESC, rowid DESC LIMIT ?1",
                    ACTIVITY_COLUMNS
                ))?;
                stmt.query_map(params![limit as i64], activity_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(activities)
    }
}
