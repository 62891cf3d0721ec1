//! The shared star map: every client's bubble records under one namespace.
//!
//! Publishing is an upsert that merges the incoming fields over whatever is
//! already stored for that id, so a record carrying only `views` updates the
//! count and leaves the rest alone. Each write takes the next change
//! sequence number; subscribers poll [`StarMap::changes_since`] with the last
//! sequence they saw and receive the latest state of every record written
//! after it. A client sees its own publishes come back this way.

use std::path::Path;

use bv_core::{BubbleRecord, now_unix_millis};
use rusqlite::{OptionalExtension, TransactionBehavior, params};
use serde_json::{Map, Value};

use crate::error::{Result, StoreError};
use crate::store::Store;

/// One entry read from the change feed.
#[derive(Debug, Clone)]
pub struct Change {
    pub seq: u64,
    pub id: String,
    /// `None` when the stored body could not be decoded.
    pub record: Option<BubbleRecord>,
}

pub struct StarMap {
    store: Store,
    namespace: String,
}

impl StarMap {
    pub fn open(path: &Path, namespace: &str) -> Result<Self> {
        Ok(Self {
            store: Store::open(path)?,
            namespace: namespace.to_string(),
        })
    }

    pub fn open_in_memory(namespace: &str) -> Result<Self> {
        Ok(Self {
            store: Store::open_in_memory()?,
            namespace: namespace.to_string(),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Upsert a record under its id. Returns the change sequence it was
    /// written at.
    pub fn publish(&mut self, record: &BubbleRecord) -> Result<u64> {
        let id = record
            .key()
            .ok_or_else(|| StoreError::InvalidData("record without id".into()))?
            .to_string();
        let incoming = serde_json::to_value(record)?;

        let tx = self
            .store
            .conn_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT body FROM records WHERE namespace = ?1 AND id = ?2",
                params![self.namespace, id],
                |row| row.get(0),
            )
            .optional()?;
        let mut merged = match existing.and_then(|b| serde_json::from_str::<Value>(&b).ok()) {
            Some(Value::Object(fields)) => fields,
            _ => Map::new(),
        };
        if let Value::Object(fields) = incoming {
            merged.extend(fields);
        }
        let body = serde_json::to_string(&Value::Object(merged))?;

        let seq: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM records WHERE namespace = ?1",
            [&self.namespace],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO records (namespace, id, body, seq, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(namespace, id) DO UPDATE SET
                body = excluded.body,
                seq = excluded.seq,
                updated_at = excluded.updated_at",
            params![self.namespace, id, body, seq, now_unix_millis() as i64],
        )?;
        tx.commit()?;

        tracing::debug!(id = %id, seq, "published record");
        Ok(seq as u64)
    }

    /// Latest stored state of one record.
    pub fn get(&self, id: &str) -> Result<Option<BubbleRecord>> {
        let body: Option<String> = self
            .store
            .conn()
            .query_row(
                "SELECT body FROM records WHERE namespace = ?1 AND id = ?2",
                params![self.namespace, id],
                |row| row.get(0),
            )
            .optional()?;
        match body {
            Some(b) => Ok(Some(BubbleRecord::from_json(&b)?)),
            None => Ok(None),
        }
    }

    /// Every record written after `cursor`, in write order.
    /// Pass 0 to replay the whole namespace.
    pub fn changes_since(&self, cursor: u64) -> Result<Vec<Change>> {
        let mut stmt = self.store.conn().prepare(
            "SELECT seq, id, body FROM records
             WHERE namespace = ?1 AND seq > ?2
             ORDER BY seq",
        )?;
        let rows: Vec<(i64, String, String)> = stmt
            .query_map(params![self.namespace, cursor as i64], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<std::result::Result<_, _>>()?;

        let changes = rows
            .into_iter()
            .map(|(seq, id, body)| {
                let record = match BubbleRecord::from_json(&body) {
                    Ok(r) => Some(r),
                    Err(e) => {
                        tracing::warn!(id = %id, seq, "undecodable record body: {e}");
                        None
                    }
                };
                Change {
                    seq: seq as u64,
                    id,
                    record,
                }
            })
            .collect();
        Ok(changes)
    }

    /// Highest sequence written so far, 0 for an empty namespace.
    pub fn head(&self) -> Result<u64> {
        let seq: i64 = self.store.conn().query_row(
            "SELECT COALESCE(MAX(seq), 0) FROM records WHERE namespace = ?1",
            [&self.namespace],
            |row| row.get(0),
        )?;
        Ok(seq as u64)
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self.store.conn().query_row(
            "SELECT COUNT(*) FROM records WHERE namespace = ?1",
            [&self.namespace],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    /// Span this namespace was first populated with. The first caller records
    /// `span`; later callers get the recorded value back so they can compare.
    pub fn settle_span(&self, span: u32) -> Result<u32> {
        let key = format!("span:{}", self.namespace);
        if let Some(stored) = self.store.get_metadata(&key)? {
            return stored.parse().map_err(|_| {
                StoreError::InvalidData(format!(
                    "span for {} is not a number: {stored}",
                    self.namespace
                ))
            });
        }
        self.store.set_metadata(&key, &span.to_string())?;
        Ok(span)
    }
}
