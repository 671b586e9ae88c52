//! Shared record store
//!
//! A region laid out as `[StoreHeader][capacity x EnvironmentalRecord]`. The creating
//! process appends through [`SharedRecordStore::reserve`], which hands out disjoint
//! slot ranges by bumping the header's `count`; the copy into those slots happens
//! outside any lock. Once ingestion is done the owner calls
//! [`SharedRecordStore::seal`]; readers only see records of a sealed store.
//!
//! # Backings
//!
//! - `create`/`attach`: a named POSIX shared memory object, for the ingester and
//!   analyzer running as separate processes.
//! - `anonymous`: the same layout in an anonymous mapping, for single-process runs.

mod header;
mod region;

use std::io;
use std::ops::Range;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::record::{EnvironmentalRecord, RECORD_SIZE};
use header::{region_len, StoreHeader, HEADER_SIZE, STATE_SEALED, STORE_MAGIC};
use region::Region;

pub use header::HEADER_SIZE as STORE_HEADER_SIZE;

const SEAL_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid shared region name '{0}'")]
    InvalidName(String),
    #[error("failed to {op} shared region '{name}'")]
    Os {
        op: &'static str,
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("a store of {capacity} records does not fit in the address space")]
    CapacityOverflow { capacity: u64 },
    #[error("region of {bytes} bytes is too large for this platform")]
    TooLarge { bytes: usize },
    #[error("{0}")]
    Layout(String),
    #[error("shared region '{0}' is not initialized yet")]
    Uninitialized(String),
    #[error("expected a store with capacity {expected}, found {found}")]
    CapacityMismatch { expected: u64, found: u64 },
    #[error("record store is sealed; no further appends are accepted")]
    Sealed,
    #[error("record store has not been sealed by its producer yet")]
    NotSealed,
    #[error("record store is attached read-only")]
    ReadOnly,
    #[error("record store was not sealed within {0:?}")]
    SealTimeout(Duration),
}

impl StoreError {
    /// The region does not exist yet, or its creator has not finished the header
    pub fn is_pending(&self) -> bool {
        match self {
            StoreError::Os {
                op: "open", source, ..
            } => source.kind() == io::ErrorKind::NotFound,
            StoreError::Uninitialized(_) => true,
            _ => false,
        }
    }
}

/// Fixed-capacity array of records in a shareable mapping
pub struct SharedRecordStore {
    region: Region,
    capacity: u64,
}

impl std::fmt::Debug for SharedRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRecordStore")
            .field("name", &self.region.name())
            .field("capacity", &self.capacity)
            .field("count", &self.len())
            .field("sealed", &self.is_sealed())
            .field("writable", &self.region.is_writable())
            .finish()
    }
}

impl SharedRecordStore {
    /// Create a named store able to hold `capacity` records
    pub fn create(name: &str, capacity: u64) -> Result<Self, StoreError> {
        let len = region_len(capacity).ok_or(StoreError::CapacityOverflow { capacity })?;
        let region = Region::create_named(name, len)?;
        Ok(Self::initialize(region, capacity))
    }

    /// Store in an anonymous mapping, visible to this process only
    pub fn anonymous(capacity: u64) -> Result<Self, StoreError> {
        let len = region_len(capacity).ok_or(StoreError::CapacityOverflow { capacity })?;
        let region = Region::anonymous(len)?;
        Ok(Self::initialize(region, capacity))
    }

    fn initialize(region: Region, capacity: u64) -> Self {
        // Zero-filled by ftruncate or the anonymous mapping; only this handle writes it.
        unsafe {
            StoreHeader::publish(region.as_ptr().cast::<StoreHeader>(), capacity);
        }
        Self { region, capacity }
    }

    /// Map an existing named store read-only.
    ///
    /// The header is validated against this build's record layout. When
    /// `expected_capacity` is given it must match the creator's capacity.
    pub fn attach(name: &str, expected_capacity: Option<u64>) -> Result<Self, StoreError> {
        let region = Region::open_named_readonly(name)?;
        if region.len() < HEADER_SIZE {
            return Err(StoreError::Uninitialized(name.to_string()));
        }

        let header = unsafe { &*region.as_ptr().cast::<StoreHeader>() };
        match header.magic() {
            STORE_MAGIC => {}
            0 => return Err(StoreError::Uninitialized(name.to_string())),
            _ => {
                return Err(StoreError::Layout(format!(
                    "shared region '{}' is not a record store",
                    name
                )))
            }
        }
        if header.record_size != RECORD_SIZE as u64 {
            return Err(StoreError::Layout(format!(
                "record size mismatch: region has {} bytes per record, this build uses {}",
                header.record_size, RECORD_SIZE
            )));
        }
        let capacity = header.capacity;
        match region_len(capacity) {
            Some(len) if len <= region.len() => {}
            _ => {
                return Err(StoreError::Layout(format!(
                    "shared region '{}' is {} bytes, too small for {} records",
                    name,
                    region.len(),
                    capacity
                )))
            }
        }
        if let Some(expected) = expected_capacity {
            if expected != capacity {
                return Err(StoreError::CapacityMismatch {
                    expected,
                    found: capacity,
                });
            }
        }

        Ok(Self { region, capacity })
    }

    /// [`attach`](Self::attach), retrying until `timeout` while the region does not
    /// exist yet or its creator is still writing the header
    pub fn attach_within(
        name: &str,
        expected_capacity: Option<u64>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let deadline = Instant::now() + timeout;
        loop {
            match Self::attach(name, expected_capacity) {
                Err(e) if e.is_pending() => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(e);
                    }
                    std::thread::sleep(SEAL_POLL_INTERVAL.min(deadline - now));
                }
                attached => return attached,
            }
        }
    }

    /// Remove a named store from the system. Existing mappings stay valid.
    pub fn unlink(name: &str) -> Result<bool, StoreError> {
        region::unlink(name)
    }

    /// Unlink the named object when this handle is dropped
    pub fn set_unlink_on_drop(&mut self, unlink: bool) {
        self.region.set_unlink_on_drop(unlink);
    }

    fn header(&self) -> &StoreHeader {
        unsafe { &*self.region.as_ptr().cast::<StoreHeader>() }
    }

    fn slots(&self) -> *mut EnvironmentalRecord {
        unsafe { self.region.as_ptr().add(HEADER_SIZE).cast() }
    }

    pub fn name(&self) -> Option<&str> {
        self.region.name()
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Number of reserved slots
    pub fn len(&self) -> u64 {
        self.header().count.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_writable(&self) -> bool {
        self.region.is_writable()
    }

    pub fn is_sealed(&self) -> bool {
        self.header().state.load(Ordering::Acquire) == STATE_SEALED
    }

    /// Reserve up to `k` contiguous slots.
    ///
    /// This is the only contended step of an append. When fewer than `k` slots are
    /// left the reservation is partial and [`Reservation::dropped`] says how many
    /// records will not be stored; a full store grants zero slots.
    pub fn reserve(&self, k: usize) -> Result<Reservation<'_>, StoreError> {
        if !self.region.is_writable() {
            return Err(StoreError::ReadOnly);
        }
        if self.is_sealed() {
            return Err(StoreError::Sealed);
        }

        let capacity = self.capacity;
        let wanted = k as u64;
        let header = self.header();
        let start = if wanted == 0 {
            header.count.load(Ordering::Acquire)
        } else {
            match header
                .count
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                    (count < capacity).then(|| count + wanted.min(capacity - count))
                }) {
                Ok(previous) => previous,
                Err(full) => full,
            }
        };
        let granted = wanted.min(capacity.saturating_sub(start)) as usize;

        Ok(Reservation {
            store: self,
            start,
            granted,
            requested: k,
        })
    }

    /// Reserve and fill slots for `records` in one step
    pub fn append(&self, records: &[EnvironmentalRecord]) -> Result<AppendOutcome, StoreError> {
        let reservation = self.reserve(records.len())?;
        let dropped = reservation.dropped();
        let appended = reservation.fill(records);
        Ok(AppendOutcome { appended, dropped })
    }

    /// Mark the store read-only for every consumer
    pub fn seal(&self) -> Result<(), StoreError> {
        if !self.region.is_writable() {
            return Err(StoreError::ReadOnly);
        }
        self.header().state.store(STATE_SEALED, Ordering::Release);
        Ok(())
    }

    /// Poll the seal flag until the producer publishes it or `timeout` passes
    pub fn wait_sealed(&self, timeout: Duration) -> Result<(), StoreError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_sealed() {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(StoreError::SealTimeout(timeout));
            }
            std::thread::sleep(SEAL_POLL_INTERVAL.min(deadline - now));
        }
    }

    /// The populated records of a sealed store
    pub fn records(&self) -> Result<&[EnvironmentalRecord], StoreError> {
        if !self.is_sealed() {
            return Err(StoreError::NotSealed);
        }
        let count = self.len().min(self.capacity) as usize;
        // Sealed: no writer touches [0, count) anymore, and any bit pattern is a
        // valid record.
        Ok(unsafe { std::slice::from_raw_parts(self.slots(), count) })
    }
}

/// Slots `[start, start + granted)` handed to one writer
#[must_use = "reserved slots stay zeroed unless filled"]
pub struct Reservation<'a> {
    store: &'a SharedRecordStore,
    start: u64,
    granted: usize,
    requested: usize,
}

impl Reservation<'_> {
    pub fn range(&self) -> Range<u64> {
        self.start..self.start + self.granted as u64
    }

    pub fn granted(&self) -> usize {
        self.granted
    }

    /// Records requested but refused for lack of capacity
    pub fn dropped(&self) -> usize {
        self.requested - self.granted
    }

    /// Copy the leading records into the reserved slots. Returns how many were stored.
    pub fn fill(self, records: &[EnvironmentalRecord]) -> usize {
        let n = self.granted.min(records.len());
        if n == 0 {
            return 0;
        }
        // Ranges handed out by `reserve` never overlap, so this writer is the only
        // one touching these slots.
        unsafe {
            std::ptr::copy_nonoverlapping(
                records.as_ptr(),
                self.store.slots().add(self.start as usize),
                n,
            );
        }
        n
    }
}

/// Outcome of [`SharedRecordStore::append`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AppendOutcome {
    pub appended: usize,
    pub dropped: usize,
}
