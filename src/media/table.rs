//! Stream table
//!
//! The authoritative collection of stream records, split into an upstream
//! and a downstream namespace. Every structural change is reported to the
//! renderer before the call returns, so a removed id is never observable
//! after `remove` comes back.

use super::record::{StreamId, StreamKind, StreamRecord};
use crate::render::{Direction, Renderer};
use crate::signaling::NegotiationHandle;
use crate::utils::{SessionError, SessionResult};
use std::collections::HashMap;
use std::sync::Arc;

pub struct StreamTable {
    up: HashMap<StreamId, StreamRecord>,
    down: HashMap<StreamId, StreamRecord>,
    renderer: Arc<dyn Renderer>,
    next_seq: u64,
    /// Bumped for a kind whenever its records are torn down in bulk
    epochs: HashMap<StreamKind, u64>,
}

impl StreamTable {
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        Self {
            up: HashMap::new(),
            down: HashMap::new(),
            renderer,
            next_seq: 0,
            epochs: HashMap::new(),
        }
    }

    fn map(&self, direction: Direction) -> &HashMap<StreamId, StreamRecord> {
        match direction {
            Direction::Up => &self.up,
            Direction::Down => &self.down,
        }
    }

    fn map_mut(&mut self, direction: Direction) -> &mut HashMap<StreamId, StreamRecord> {
        match direction {
            Direction::Up => &mut self.up,
            Direction::Down => &mut self.down,
        }
    }

    /// Fresh id, unused in the given namespace
    pub fn allocate_id(&self, direction: Direction) -> StreamId {
        let map = self.map(direction);
        loop {
            let id = StreamId::random();
            if !map.contains_key(&id) {
                return id;
            }
        }
    }

    /// Insert a new record. An id already present in the record's namespace
    /// is rejected and the record's resources are released.
    pub fn insert(&mut self, mut record: StreamRecord) -> SessionResult<StreamId> {
        let direction = record.direction();
        if self.map(direction).contains_key(record.id()) {
            let id = record.id().clone();
            tracing::error!("Duplicate {:?} stream id {}", direction, id);
            record.release();
            return Err(SessionError::DuplicateId(id));
        }

        self.next_seq += 1;
        record.seq = self.next_seq;

        let id = record.id().clone();
        let tile = record.tile();
        self.map_mut(direction).insert(id.clone(), record);

        self.renderer.attach(&id, &tile);
        self.renderer.recompute_layout();

        tracing::debug!("Inserted {:?} stream {}", tile.kind, id);
        Ok(id)
    }

    /// Put a record in place of the one holding the same id, keeping its
    /// tile. The previous record, if any, is released. Returns whether a
    /// record was replaced.
    pub fn replace(&mut self, mut record: StreamRecord) -> bool {
        let direction = record.direction();
        let id = record.id().clone();

        let previous = self.map_mut(direction).remove(&id);
        let replaced = previous.is_some();
        match previous {
            Some(old) => {
                record.seq = old.seq;
                old.release();
            }
            None => {
                self.next_seq += 1;
                record.seq = self.next_seq;
            }
        }

        let tile = record.tile();
        self.map_mut(direction).insert(id.clone(), record);

        // attach rebinds an existing tile
        self.renderer.attach(&id, &tile);
        self.renderer.recompute_layout();

        tracing::debug!("Replaced {:?} stream {} (existing: {})", tile.kind, id, replaced);
        replaced
    }

    pub fn get(&self, direction: Direction, id: &StreamId) -> Option<&StreamRecord> {
        self.map(direction).get(id)
    }

    pub fn get_mut(&mut self, direction: Direction, id: &StreamId) -> Option<&mut StreamRecord> {
        self.map_mut(direction).get_mut(id)
    }

    pub fn up(&self, id: &StreamId) -> Option<&StreamRecord> {
        self.up.get(id)
    }

    pub fn up_mut(&mut self, id: &StreamId) -> Option<&mut StreamRecord> {
        self.up.get_mut(id)
    }

    pub fn down(&self, id: &StreamId) -> Option<&StreamRecord> {
        self.down.get(id)
    }

    pub fn down_mut(&mut self, id: &StreamId) -> Option<&mut StreamRecord> {
        self.down.get_mut(id)
    }

    /// Read access that requires the record to exist
    pub fn require(&self, direction: Direction, id: &StreamId) -> SessionResult<&StreamRecord> {
        self.get(direction, id)
            .ok_or_else(|| SessionError::UnknownRecord(id.clone()))
    }

    pub fn contains(&self, direction: Direction, id: &StreamId) -> bool {
        self.map(direction).contains_key(id)
    }

    /// Destroy one record. Absent ids are a no-op; returns whether anything
    /// was removed.
    pub fn remove(&mut self, direction: Direction, id: &StreamId) -> bool {
        let record = match self.map_mut(direction).remove(id) {
            Some(record) => record,
            None => return false,
        };

        record.release();
        self.renderer.detach(id);
        self.renderer.recompute_layout();
        true
    }

    /// Destroy every upstream record of `kind`, or all of them when `kind`
    /// is `None`. Returns the number of records destroyed.
    pub fn remove_by_kind(&mut self, kind: Option<StreamKind>) -> usize {
        match kind {
            Some(kind) => *self.epochs.entry(kind).or_insert(0) += 1,
            None => {
                for kind in [StreamKind::Local, StreamKind::Screenshare, StreamKind::File] {
                    *self.epochs.entry(kind).or_insert(0) += 1;
                }
            }
        }

        let ids: Vec<StreamId> = self
            .sorted_ids(Direction::Up)
            .into_iter()
            .filter(|id| {
                kind.map_or(true, |k| self.up.get(id).map(|r| r.kind()) == Some(k))
            })
            .collect();

        let mut removed = 0;
        for id in &ids {
            if self.remove(Direction::Up, id) {
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!("Destroyed {} upstream stream(s) of kind {:?}", removed, kind);
        }
        removed
    }

    /// Destroy every downstream record
    pub fn remove_all_down(&mut self) -> usize {
        let ids = self.sorted_ids(Direction::Down);
        ids.iter().filter(|id| self.remove(Direction::Down, id)).count()
    }

    /// Teardown generation of `kind`, used by in-flight acquisitions to
    /// notice a bulk destroy that happened while they were suspended
    pub fn epoch(&self, kind: StreamKind) -> u64 {
        self.epochs.get(&kind).copied().unwrap_or(0)
    }

    /// First upstream record of `kind`, in insertion order
    pub fn find_by_kind(&self, kind: StreamKind) -> Option<StreamId> {
        self.up
            .values()
            .filter(|r| r.kind() == kind)
            .min_by_key(|r| r.seq)
            .map(|r| r.id().clone())
    }

    pub fn count_kind(&self, kind: StreamKind) -> usize {
        self.up.values().filter(|r| r.kind() == kind).count()
    }

    /// Ids of a namespace in insertion order
    pub fn sorted_ids(&self, direction: Direction) -> Vec<StreamId> {
        let mut records: Vec<&StreamRecord> = self.map(direction).values().collect();
        records.sort_by_key(|r| r.seq);
        records.into_iter().map(|r| r.id().clone()).collect()
    }

    /// Negotiation handles of a namespace, for work that suspends and so
    /// cannot hold a borrow of the table
    pub fn handles(&self, direction: Direction) -> Vec<(StreamId, Arc<dyn NegotiationHandle>)> {
        self.sorted_ids(direction)
            .into_iter()
            .filter_map(|id| {
                let handle = self.get(direction, &id)?.handle().clone();
                Some((id, handle))
            })
            .collect()
    }

    pub fn records(&self, direction: Direction) -> impl Iterator<Item = &StreamRecord> {
        self.map(direction).values()
    }

    pub fn len(&self, direction: Direction) -> usize {
        self.map(direction).len()
    }

    pub fn is_empty(&self) -> bool {
        self.up.is_empty() && self.down.is_empty()
    }
}

impl std::fmt::Debug for StreamTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTable")
            .field("up", &self.up.len())
            .field("down", &self.down.len())
            .finish()
    }
}
