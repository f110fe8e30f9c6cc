//! Handles on the PDR table, written by the control plane and read by the
//! fast path.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::io;
use std::sync::{Mutex, PoisonError, RwLock};

use aya::maps::{HashMap as BpfHashMap, MapData, MapError};
use thiserror::Error;
use upf_xdp_common::{PdrKey, PdrLookup, PdrValue, PDR_LIST_MAX_SIZE};

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("PDR table is full ({capacity} rules)")]
    CapacityExceeded { capacity: u32 },

    #[error("PDR table update failed: {0}")]
    UpdateFailed(#[source] BoxError),

    #[error("no such PDR")]
    NotFound,

    #[error("PDR table is closed")]
    Closed,
}

/// Single-writer, many-reader PDR store.
///
/// Inserting an existing key overwrites it; a new key on a full table is
/// rejected, nothing is evicted.
pub trait PdrTable: Send + Sync {
    fn insert(&self, key: PdrKey, value: PdrValue) -> Result<(), TableError>;

    fn remove(&self, key: &PdrKey) -> Result<(), TableError>;

    fn get(&self, key: &PdrKey) -> Option<PdrValue>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn capacity(&self) -> u32 {
        PDR_LIST_MAX_SIZE
    }
}

/// In-process table with the same capacity rules as the kernel map.
#[derive(Debug)]
pub struct MemoryPdrTable {
    rules: RwLock<HashMap<PdrKey, PdrValue>>,
    capacity: u32,
}

impl MemoryPdrTable {
    pub fn new() -> Self {
        Self::with_capacity(PDR_LIST_MAX_SIZE)
    }

    pub fn with_capacity(capacity: u32) -> Self {
        MemoryPdrTable {
            rules: RwLock::new(HashMap::new()),
            capacity,
        }
    }
}

impl Default for MemoryPdrTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PdrTable for MemoryPdrTable {
    fn insert(&self, key: PdrKey, value: PdrValue) -> Result<(), TableError> {
        let mut rules = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        if !rules.contains_key(&key) && rules.len() >= self.capacity as usize {
            return Err(TableError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        rules.insert(key, value);
        Ok(())
    }

    fn remove(&self, key: &PdrKey) -> Result<(), TableError> {
        let mut rules = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        rules.remove(key).map(|_| ()).ok_or(TableError::NotFound)
    }

    fn get(&self, key: &PdrKey) -> Option<PdrValue> {
        let rules = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        rules.get(key).copied()
    }

    fn len(&self) -> usize {
        self.rules.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn capacity(&self) -> u32 {
        self.capacity
    }
}

impl PdrLookup for MemoryPdrTable {
    fn lookup(&self, key: &PdrKey) -> Option<PdrValue> {
        self.get(key)
    }
}

/// The `PDR_LIST` map of a loaded object.
pub struct BpfPdrTable {
    map: Mutex<BpfHashMap<MapData, PdrKey, PdrValue>>,
}

impl BpfPdrTable {
    pub fn new(map: BpfHashMap<MapData, PdrKey, PdrValue>) -> Self {
        BpfPdrTable {
            map: Mutex::new(map),
        }
    }
}

impl PdrTable for BpfPdrTable {
    fn insert(&self, key: PdrKey, value: PdrValue) -> Result<(), TableError> {
        let mut map = self.map.lock().unwrap_or_else(PoisonError::into_inner);
        map.insert(key, value, 0).map_err(|e| {
            if has_errno(&e, libc::E2BIG) {
                TableError::CapacityExceeded {
                    capacity: PDR_LIST_MAX_SIZE,
                }
            } else {
                TableError::UpdateFailed(e.into())
            }
        })
    }

    fn remove(&self, key: &PdrKey) -> Result<(), TableError> {
        let mut map = self.map.lock().unwrap_or_else(PoisonError::into_inner);
        map.remove(key).map_err(|e| match e {
            MapError::KeyNotFound => TableError::NotFound,
            e if has_errno(&e, libc::ENOENT) => TableError::NotFound,
            e => TableError::UpdateFailed(e.into()),
        })
    }

    fn get(&self, key: &PdrKey) -> Option<PdrValue> {
        let map = self.map.lock().unwrap_or_else(PoisonError::into_inner);
        map.get(key, 0).ok()
    }

    fn len(&self) -> usize {
        let map = self.map.lock().unwrap_or_else(PoisonError::into_inner);
        map.keys().filter(Result::is_ok).count()
    }
}

impl PdrLookup for BpfPdrTable {
    fn lookup(&self, key: &PdrKey) -> Option<PdrValue> {
        self.get(key)
    }
}

/// Looks for an OS error with the given errno anywhere in the source chain.
fn has_errno(err: &(dyn StdError + 'static), errno: i32) -> bool {
    let mut cur = Some(err);
    while let Some(e) = cur {
        if let Some(io) = e.downcast_ref::<io::Error>() {
            if io.raw_os_error() == Some(errno) {
                return true;
            }
        }
        cur = e.source();
    }
    false
}
