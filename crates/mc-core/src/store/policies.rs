use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};

use super::{Store, parse_ts, ts};
use crate::Result;
use crate::model::{Policy, PolicyValue};

struct PolicyRow {
    name: String,
    value: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PolicyRow {
    fn decode(self) -> Result<Policy> {
        let raw: serde_json::Value = serde_json::from_str(&self.value)?;
        Ok(Policy {
            value: PolicyValue::decode(&self.name, raw)?,
            name: self.name,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn policy_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PolicyRow> {
    let created_at: String = row.get(3)?;
    let updated_at: String = row.get(4)?;
    Ok(PolicyRow {
        name: row.get(0)?,
        value: row.get(1)?,
        description: row.get(2)?,
        created_at: parse_ts(3, &created_at)?,
        updated_at: parse_ts(4, &updated_at)?,
    })
}

impl Store {
    pub fn policy(&self, name: &str) -> Result<Option<Policy>> {
        let row = {
            let conn = self.conn()?;
            conn.query_row(
                "SELECT name, value, description, created_at, updated_at FROM policies WHERE name = ?1",
                params![name],
                policy_row,
            )
            .optional()?
        };
        row.map(PolicyRow::decode).transpose()
    }

    pub fn list_policies(&self) -> Result<Vec<Policy>> {
        let rows = {
            let conn = self.conn()?;
            let mut stmt = conn.prepare(
                "SELECT name, value, description, created_at, updated_at FROM policies ORDER BY name",
            )?;
            stmt.query_map([], policy_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        };
        rows.into_iter().map(PolicyRow::decode).collect()
    }

    /// Insert or replace a policy value.
    ///
    /// A `None` description keeps the stored one; `created_at` survives updates.
    pub fn upsert_policy(
        &self,
        name: &str,
        value: &PolicyValue,
        description: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Policy> {
        let json = serde_json::to_string(&value.to_json()?)?;
        let stamp = ts(&now);

        {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO policies (name, value, description, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(name) DO UPDATE SET
                    value = excluded.value,
                    description = COALESCE(excluded.description, policies.description),
                    updated_at = excluded.updated_at",
                params![name, json, description, stamp],
            )?;
        }

        self.policy(name)?
            .ok_or_else(|| crate::Error::not_found("policy", name))
    }

    pub fn delete_policy(&self, name: &str) -> Result<bool> {
        let conn = self.conn()?;
        let affected = conn.execute("DELETE FROM policies WHERE name = ?1", params![name])?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AUTO_APPROVE, AutoApprovePolicy, TaskPriority};
    use serde_json::json;

    #[test]
    fn test_upsert_keeps_description_and_created_at() {
        let store = Store::in_memory().unwrap();
        let first = store
            .upsert_policy(
                AUTO_APPROVE,
                &PolicyValue::AutoApprove(AutoApprovePolicy::default()),
                Some("gate for inbox"),
                Utc::now(),
            )
            .unwrap();

        let disabled = PolicyValue::AutoApprove(AutoApprovePolicy {
            enabled: false,
            allowed_priorities: vec![TaskPriority::Low],
        });
        let second = store.upsert_policy(AUTO_APPROVE, &disabled, None, Utc::now()).unwrap();

        assert_eq!(second.description.as_deref(), Some("gate for inbox"));
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.value, disabled);
    }

    #[test]
    fn test_other_policy_round_trip() {
        let store = Store::in_memory().unwrap();
        let value = PolicyValue::Other(json!({"limit": 3}));
        store.upsert_policy("custom", &value, None, Utc::now()).unwrap();

        let loaded = store.policy("custom").unwrap().unwrap();
        assert_eq!(loaded.value, value);
        assert_eq!(store.list_policies().unwrap().len(), 1);
    }

    #[test]
    fn test_delete_policy() {
        let store = Store::in_memory().unwrap();
        assert!(!store.delete_policy("missing").unwrap());
        store
            .upsert_policy("x", &PolicyValue::Other(json!(1)), None, Utc::now())
            .unwrap();
        assert!(store.delete_policy("x").unwrap());
        assert!(store.policy("x").unwrap().is_none());
    }
}
