use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{Store, new_id, parse_enum, parse_opt_ts, parse_ts, ts};
use crate::model::{NewNotification, Notification, Reference};
use crate::{Error, Result};

const NOTIFICATION_COLUMNS: &str = "id, target_agent_id, from_agent_id, kind, title, content, \
     reference_id, reference_kind, read, delivered, delivery_attempts, last_ping_at, \
     acknowledged_at, read_at, created_at";

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    let kind: String = row.get(3)?;
    let reference_id: Option<String> = row.get(6)?;
    let reference_kind: Option<String> = row.get(7)?;
    let created_at: String = row.get(14)?;

    Ok(Notification {
        id: row.get(0)?,
        target_agent_id: row.get(1)?,
        from_agent_id: row.get(2)?,
        kind: parse_enum(3, &kind)?,
        title: row.get(4)?,
        content: row.get(5)?,
        reference: reference_id.map(|id| Reference {
            id,
            kind: reference_kind.unwrap_or_default(),
        }),
        read: row.get(8)?,
        delivered: row.get(9)?,
        delivery_attempts: row.get(10)?,
        last_ping_at: parse_opt_ts(11, row.get(11)?)?,
        acknowledged_at: parse_opt_ts(12, row.get(12)?)?,
        read_at: parse_opt_ts(13, row.get(13)?)?,
        created_at: parse_ts(14, &created_at)?,
    })
}

fn load(conn: &Connection, id: &str) -> Result<Option<Notification>> {
    let notification = conn
        .query_row(
            &format!("SELECT {} FROM notifications WHERE id = ?1", NOTIFICATION_COLUMNS),
            params![id],
            notification_from_row,
        )
        .optional()?;
    Ok(notification)
}

fn agent_exists(conn: &Connection, agent_id: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM agents WHERE id = ?1", params![agent_id], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

impl Store {
    /// Insert a notification; the target agent must exist
    pub fn insert_notification(&self, new: NewNotification, now: DateTime<Utc>) -> Result<Notification> {
        let conn = self.conn()?;
        if !agent_exists(&conn, &new.target_agent_id)? {
            return Err(Error::not_found("agent", new.target_agent_id));
        }

        let notification = Notification {
            id: new_id(),
            target_agent_id: new.target_agent_id,
            from_agent_id: new.from_agent_id,
            kind: new.kind,
            title: new.title,
            content: new.content,
            reference: new.reference,
            read: false,
            delivered: false,
            delivery_attempts: 0,
            last_ping_at: None,
            acknowledged_at: None,
            read_at: None,
            created_at: now,
        };

        conn.execute(
            "INSERT INTO notifications (id, target_agent_id, from_agent_id, kind, title, content,
                reference_id, reference_kind, read, delivered, delivery_attempts, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, 0, 0, ?9)",
            params![
                notification.id,
                notification.target_agent_id,
                notification.from_agent_id,
                notification.kind.as_str(),
                notification.title,
                notification.content,
                notification.reference.as_ref().map(|r| r.id.as_str()),
                notification.reference.as_ref().map(|r| r.kind.as_str()),
                ts(&notification.created_at),
            ],
        )?;

        Ok(notification)
    }

    pub fn notification(&self, id: &str) -> Result<Option<Notification>> {
        let conn = self.conn()?;
        load(&conn, id)
    }

    /// Undelivered notifications, oldest first
    pub fn list_undelivered(&self, target_agent_id: Option<&str>) -> Result<Vec<Notification>> {
        let conn = self.conn()?;
        let notifications = match target_agent_id {
            Some(target) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM notifications WHERE delivered = 0 AND target_agent_id = ?1
                     ORDER BY created_at",
                    NOTIFICATION_COLUMNS
                ))?;
                stmt.query_map(params![target], notification_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM notifications WHERE delivered = 0 ORDER BY created_at",
                    NOTIFICATION_COLUMNS
                ))?;
                stmt.query_map([], notification_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(notifications)
    }

    /// Latest notifications for one agent, newest first
    pub fn list_notifications_for(
        &self,
        target_agent_id: &str,
        unread_only: bool,
        limit: usize,
    ) -> Result<Vec<Notification>> {
        let conn = self.conn()?;
        let sql = if unread_only {
            format!(
                "SELECT {} FROM notifications WHERE target_agent_id = ?1 AND read = 0
                 ORDER BY created_at DESC LIMIT ?2",
                NOTIFICATION_COLUMNS
            )
        } else {
            format!(
                "SELECT {} FROM notifications WHERE target_agent_id = ?1
                 ORDER BY created_at DESC LIMIT ?2",
                NOTIFICATION_COLUMNS
            )
        };

        let mut stmt = conn.prepare(&sql)?;
        let notifications = stmt
            .query_map(params![target_agent_id, limit as i64], notification_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(notifications)
    }

    /// Count one attempt and flag the record delivered.
    ///
    /// Returns `None` when the id is unknown.
    pub fn record_delivery_attempt(&self, id: &str, now: DateTime<Utc>) -> Result<Option<Notification>> {
        let conn = self.conn()?;
        let affected = conn.execute(
            "UPDATE notifications
             SET delivery_attempts = delivery_attempts + 1, last_ping_at = ?2, delivered = 1
             WHERE id = ?1",
            params![id, ts(&now)],
        )?;

        if affected == 0 {
            return Ok(None);
        }
        load(&conn, id)
    }

    pub fn acknowledge_notification(&self, id: &str, now: DateTime<Utc>) -> Result<Notification> {
        let conn = self.conn()?;
        let stamp = ts(&now);
        let affected = conn.execute(
            "UPDATE notifications SET acknowledged_at = ?2, read = 1, read_at = ?2 WHERE id = ?1",
            params![id, stamp],
        )?;

        if affected == 0 {
            return Err(Error::not_found("notification", id));
        }
        load(&conn, id)?.ok_or_else(|| Error::not_found("notification", id))
    }

    pub fn mark_notification_read(&self, id: &str, now: DateTime<Utc>) -> Result<Notification> {
        let conn = self.conn()?;
        let affected = conn.execute(
            "UPDATE notifications SET read = 1, read_at = COALESCE(read_at, ?2) WHERE id = ?1",
            params![id, ts(&now)],
        )?;

        if affected == 0 {
            return Err(Error::not_found("notification", id));
        }
        load(&conn, id)?.ok_or_else(|| Error::not_found("notification", id))
    }

    /// Mark every unread notification of an agent read; returns how many changed
    pub fn mark_all_notifications_read(&self, target_agent_id: &str, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn()?;
        if !agent_exists(&conn, target_agent_id)? {
            return Err(Error::not_found("agent", target_agent_id));
        }

        let affected = conn.execute(
            "UPDATE notifications SET read = 1, read_at = ?2 WHERE target_agent_id = ?1 AND read = 0",
            params![target_agent_id, ts(&now)],
        )?;
        Ok(affected)
    }

    pub fn count_unread(&self, target_agent_id: &str) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE target_agent_id = ?1 AND read = 0",
            params![target_agent_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn delete_notifications_for_reference(&self, reference_id: &str) -> Result<usize> {
        let conn = self.conn()?;
        let affected = conn.execute(
            "DELETE FROM notifications WHERE reference_id = ?1",
            params![reference_id],
        )?;
        Ok(affected)
    }
}
