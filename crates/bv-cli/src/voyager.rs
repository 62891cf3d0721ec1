//! One client's view of the universe, wired to its collaborators.
//!
//! A `Voyager` owns the local [`Universe`] plus handles on the content store
//! and the star map, and runs the UI-facing pipelines: ignite (store →
//! project → reconcile → publish), pulse, hydrate, warp and drift.

use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use bv_core::{
    Bubble, BubbleRecord, LifecycleRules, Position, Universe, UniverseConfig, UniverseError,
    UniverseEvent,
};
use bv_store::{BLOBS_FILE, Change, ContentStore, STARMAP_FILE, StarMap, StoreError, load_config};

#[derive(Debug)]
pub enum VoyagerError {
    /// Nothing left after trimming. Storage is never touched.
    EmptyThought,
    StorageUnavailable(String),
    Store(StoreError),
    Universe(UniverseError),
}

impl fmt::Display for VoyagerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoyagerError::EmptyThought => write!(f, "thought is empty"),
            VoyagerError::StorageUnavailable(msg) => write!(f, "storage unavailable: {msg}"),
            VoyagerError::Store(e) => write!(f, "{e}"),
            VoyagerError::Universe(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for VoyagerError {}

impl From<StoreError> for VoyagerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(msg) => VoyagerError::StorageUnavailable(msg),
            other => VoyagerError::Store(other),
        }
    }
}

impl From<UniverseError> for VoyagerError {
    fn from(e: UniverseError) -> Self {
        VoyagerError::Universe(e)
    }
}

pub struct Voyager {
    config: UniverseConfig,
    universe: Universe,
    content: ContentStore,
    starmap: StarMap,
    cursor: u64,
}

impl Voyager {
    /// Open the collaborators under `data_dir`, creating it if needed.
    /// The content node is opened lazily on first use.
    pub fn open(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;
        let config = load_config(data_dir).context("failed to load universe config")?;
        let starmap = StarMap::open(&data_dir.join(STARMAP_FILE), &config.namespace)
            .context("failed to open star map")?;
        let content = ContentStore::new(data_dir.join(BLOBS_FILE));
        let voyager = Self::with_parts(config, content, starmap);
        let settled = voyager
            .namespace_span()
            .context("failed to settle namespace span")?;
        if settled != voyager.config.span {
            tracing::warn!(
                local = voyager.config.span,
                namespace = settled,
                "configured span differs from the namespace, bubbles will not line up with other clients"
            );
        }
        Ok(voyager)
    }

    pub fn with_parts(config: UniverseConfig, content: ContentStore, starmap: StarMap) -> Self {
        Self {
            config,
            universe: Universe::new(),
            content,
            starmap,
            cursor: 0,
        }
    }

    pub fn config(&self) -> &UniverseConfig {
        &self.config
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    pub fn lifecycle(&self) -> LifecycleRules {
        self.config.lifecycle()
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn drain_events(&mut self) -> Vec<UniverseEvent> {
        self.universe.drain_events()
    }

    /// Pull everything published since the last sync into the universe.
    /// Returns how many records were applied.
    pub fn sync(&mut self) -> Result<usize, VoyagerError> {
        let changes = self.starmap.changes_since(self.cursor)?;
        Ok(changes
            .into_iter()
            .filter(|change| self.apply(change))
            .count())
    }

    /// Apply one change from the feed. Malformed records are logged and
    /// dropped; they are other clients' noise, never the user's problem.
    pub fn apply(&mut self, change: &Change) -> bool {
        self.cursor = self.cursor.max(change.seq);
        let Some(record) = &change.record else {
            tracing::debug!(id = %change.id, seq = change.seq, "skipping undecodable record");
            return false;
        };
        match self.universe.on_remote_update(record) {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(id = %change.id, seq = change.seq, "dropping record: {e}");
                false
            }
        }
    }

    /// Turn a thought into a bubble and publish it.
    ///
    /// Storage failures abort before anything is published. Publishing
    /// itself is best effort: a failed publish is logged and the bubble
    /// stays local, with its content already stored. Text someone already
    /// published keeps its stored view count and creation time.
    pub fn ignite(&mut self, text: &str) -> Result<Bubble, VoyagerError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(VoyagerError::EmptyThought);
        }

        let cid = self.content.crystallize(text)?;
        if let Err(e) = self.refresh(&cid) {
            tracing::warn!(cid = %cid, "could not read stored record before ignite: {e}");
        }
        let position = self.config.projector().project(text);
        let record = self.universe.create(&cid, text, position)?;

        if let Err(e) = self.starmap.publish(&record) {
            tracing::warn!(cid = %cid, "publish failed, bubble stays local: {e}");
        }
        tracing::info!(cid = %cid, "ignited thought");

        self.universe
            .get(&cid)
            .cloned()
            .ok_or(VoyagerError::Universe(UniverseError::UnknownBubble(cid)))
    }

    /// Read the last published value, add one view, write it back.
    ///
    /// Two clients doing this at once can lose a view.
    pub fn pulse(&mut self, id: &str) -> Result<Bubble, VoyagerError> {
        self.refresh(id)?;

        let record = self.universe.pulse(id)?;
        let views_only = BubbleRecord {
            id: record.id.clone(),
            view_count: record.view_count,
            ..Default::default()
        };
        if let Err(e) = self.starmap.publish(&views_only) {
            tracing::warn!(id = %id, "publish failed after pulse: {e}");
        }

        self.universe
            .get(id)
            .cloned()
            .ok_or_else(|| VoyagerError::Universe(UniverseError::UnknownBubble(id.to_string())))
    }

    /// Merge the star map's latest record for `id` into the universe, so a
    /// write that follows starts from the last published value.
    fn refresh(&mut self, id: &str) -> Result<(), VoyagerError> {
        if let Some(latest) = self.starmap.get(id)?
            && let Err(e) = self.universe.on_remote_update(&latest)
        {
            tracing::debug!(id = %id, "stored record unusable: {e}");
        }
        Ok(())
    }

    /// The stored thought text, `None` once it has evaporated.
    pub fn hydrate(&mut self, id: &str) -> Result<Option<String>, VoyagerError> {
        Ok(self.content.hydrate(id)?)
    }

    pub fn resolve_target(&self, query: &str) -> Position {
        self.config.navigator().resolve_target(query)
    }

    /// Apply `steps` entropy steps to every bubble and publish the new
    /// positions. View counts are left out of the published records.
    pub fn drift(&mut self, steps: usize) -> Result<usize, VoyagerError> {
        let rules = self.lifecycle();
        let mut published = 0;
        for _ in 0..steps {
            for record in self.universe.drift(&rules) {
                let moved = BubbleRecord {
                    id: record.id,
                    x: record.x,
                    y: record.y,
                    z: record.z,
                    ..Default::default()
                };
                match self.starmap.publish(&moved) {
                    Ok(_) => published += 1,
                    Err(e) => tracing::warn!("publish failed during drift: {e}"),
                }
            }
        }
        Ok(published)
    }

    pub fn blob_count(&mut self) -> Result<usize, VoyagerError> {
        Ok(self.content.count()?)
    }

    /// Span the namespace was first populated with. Records ours if the
    /// namespace has none yet.
    pub fn namespace_span(&self) -> Result<u32, VoyagerError> {
        Ok(self.starmap.settle_span(self.config.span)?)
    }

    pub fn record_count(&self) -> Result<usize, VoyagerError> {
        Ok(self.starmap.count()?)
    }

    /// Fold the star map's WAL back into the main file before exit.
    pub fn checkpoint(&self) {
        if let Err(e) = self.starmap.store().checkpoint_truncate() {
            tracing::warn!("star map checkpoint failed: {e}");
        }
    }
}
