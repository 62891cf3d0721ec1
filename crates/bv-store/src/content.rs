//! Content-addressed blob store for thought text.
//!
//! A thought's identifier is the SHA-256 of its UTF-8 bytes, so identical
//! text from any client yields the identical id and dedups for free. The
//! backing database is opened lazily; a failed write drops the handle and
//! re-initializes exactly once before reporting the node as unavailable.

use std::path::PathBuf;

use bv_core::now_unix_millis;
use rusqlite::{OptionalExtension, params};
use sha2::{Digest, Sha256};

use crate::error::{Result, StoreError};
use crate::store::Store;

/// Content identifier for `text`: lowercase hex SHA-256.
pub fn content_id(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

pub struct ContentStore {
    /// `None` means an in-memory node.
    path: Option<PathBuf>,
    node: Option<Store>,
}

impl ContentStore {
    /// Lazy handle on a file-backed node. Nothing is opened until first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            node: None,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            node: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.node.is_some()
    }

    /// Store `text` and return its identifier. Storing the same text again
    /// is a no-op that returns the same id.
    pub fn crystallize(&mut self, text: &str) -> Result<String> {
        let cid = content_id(text);
        if let Err(first) = self.put(&cid, text) {
            tracing::warn!("content write failed, re-initializing node: {first}");
            self.node = None;
            self.put(&cid, text)
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }
        tracing::debug!(cid = %cid, bytes = text.len(), "crystallized thought");
        Ok(cid)
    }

    /// Fetch the text behind an identifier, `None` if it was never stored here.
    pub fn hydrate(&mut self, cid: &str) -> Result<Option<String>> {
        let node = self.node()?;
        let body = node
            .conn()
            .query_row("SELECT body FROM blobs WHERE cid = ?1", [cid], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(body)
    }

    pub fn count(&mut self) -> Result<usize> {
        let node = self.node()?;
        let n: i64 = node
            .conn()
            .query_row("SELECT COUNT(*) FROM blobs", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    fn put(&mut self, cid: &str, text: &str) -> Result<()> {
        let node = self.node()?;
        node.conn().execute(
            "INSERT OR IGNORE INTO blobs (cid, body, created_at) VALUES (?1, ?2, ?3)",
            params![cid, text, now_unix_millis() as i64],
        )?;
        Ok(())
    }

    fn node(&mut self) -> Result<&Store> {
        if self.node.is_none() {
            let opened = match &self.path {
                Some(path) => Store::open(path),
                None => Store::open_in_memory(),
            };
            let store = opened.map_err(|e| StoreError::Unavailable(e.to_string()))?;
            self.node = Some(store);
        }
        self.node
            .as_ref()
            .ok_or_else(|| StoreError::Unavailable("content node missing".into()))
    }
}
