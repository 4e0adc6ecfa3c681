//! Record persistence on top of a shared [`KeyValueStore`].
//!
//! Loading never fails and saving never raises: failures are logged and the
//! caller keeps working with what it has in memory. Once the backend reports
//! itself unavailable the store switches to a private [`MemoryStore`] for the
//! rest of the session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::codec::{Codec, DecodeOutcome, Decoded};
use super::memory::MemoryStore;
use super::{KeyValueStore, StorageEvent};
use crate::error::StoreError;
use crate::sync::TabId;
use crate::timer::{TimerKind, TimerRecord};

/// A decoded record together with the raw value it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded {
    pub decoded: Decoded,
    /// What the store holds for the key after loading.
    pub raw: Option<String>,
}

pub struct RecordStore {
    backend: Arc<dyn KeyValueStore>,
    fallback: MemoryStore,
    degraded: AtomicBool,
    codec: Codec,
    tab: TabId,
}

impl RecordStore {
    pub fn new(backend: Arc<dyn KeyValueStore>, codec: Codec) -> Self {
        Self {
            backend,
            fallback: MemoryStore::new(),
            degraded: AtomicBool::new(false),
            codec,
            tab: TabId::new(),
        }
    }

    pub fn with_tab(mut self, tab: TabId) -> Self {
        self.tab = tab;
        self
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn tab(&self) -> &TabId {
        &self.tab
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    /// Another handle on the same backend, as a new tab.
    pub fn sibling(&self) -> Self {
        Self::new(Arc::clone(&self.backend), self.codec)
    }

    fn active(&self) -> &dyn KeyValueStore {
        if self.is_degraded() {
            &self.fallback
        } else {
            self.backend.as_ref()
        }
    }

    fn degrade(&self, err: &StoreError) {
        if !self.degraded.swap(true, Ordering::SeqCst) {
            warn!(error = %err, "store unavailable, keeping timers in memory for this session");
        }
    }

    /// Change feed of the backend, if it has one.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<StorageEvent>> {
        if self.is_degraded() {
            None
        } else {
            self.backend.subscribe()
        }
    }

    pub fn read_raw(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.active().get(key) {
            Err(e) if e.is_unavailable() && !self.is_degraded() => {
                self.degrade(&e);
                self.fallback.get(key)
            }
            other => other,
        }
    }

    /// Write a raw value. Returns whether it was stored anywhere.
    pub fn save_raw(&self, key: &str, raw: &str) -> bool {
        match self.active().set(key, raw, &self.tab) {
            Ok(()) => true,
            Err(e) if e.is_unavailable() && !self.is_degraded() => {
                self.degrade(&e);
                self.fallback.set(key, raw, &self.tab).is_ok()
            }
            Err(e) => {
                warn!(key, error = %e, "dropping write");
                false
            }
        }
    }

    pub fn remove(&self, key: &str) -> bool {
        match self.active().remove(key, &self.tab) {
            Ok(()) => true,
            Err(e) if e.is_unavailable() && !self.is_degraded() => {
                self.degrade(&e);
                self.fallback.remove(key, &self.tab).is_ok()
            }
            Err(e) => {
                warn!(key, error = %e, "dropping remove");
                false
            }
        }
    }

    /// Load the record under `key`. A legacy record is written back in the
    /// current layout straight away.
    pub fn load(&self, key: &str, kind: TimerKind) -> Loaded {
        let raw = match self.read_raw(key) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "reading record failed, using default");
                None
            }
        };
        let decoded = self.codec.decode(raw.as_deref(), kind);
        match &decoded.outcome {
            DecodeOutcome::Defaulted(reason) => {
                warn!(key, %kind, %reason, "stored record unusable, using default")
            }
            DecodeOutcome::Migrated => info!(key, %kind, "migrating legacy record"),
            DecodeOutcome::Repaired => debug!(key, %kind, "repaired stored record"),
            DecodeOutcome::Missing | DecodeOutcome::Clean => {}
        }
        let raw = if decoded.outcome.needs_save() {
            self.save(key, &decoded.record).or(raw)
        } else {
            raw
        };
        Loaded { decoded, raw }
    }

    pub fn load_record(&self, key: &str, kind: TimerKind) -> TimerRecord {
        self.load(key, kind).decoded.record
    }

    /// Encode and write a record now. Returns the raw value written.
    pub fn save(&self, key: &str, record: &TimerRecord) -> Option<String> {
        let raw = match self.codec.encode(record) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "encoding record failed");
                return None;
            }
        };
        self.save_raw(key, &raw).then_some(raw)
    }
}
