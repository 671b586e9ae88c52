//! Header at the start of every record region
//!
//! The first two words are `{capacity, count}`; `state`, `record_size` and `magic`
//! follow so an attaching process can validate the layout and observe the seal.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::record::RECORD_SIZE;

/// `b"AQSTORE1"` read as a little-endian word
pub const STORE_MAGIC: u64 = u64::from_le_bytes(*b"AQSTORE1");

pub const STATE_APPENDABLE: u64 = 0;
pub const STATE_SEALED: u64 = 1;

/// `magic` is written last, with release ordering. An attacher that reads it
/// with acquire ordering and finds [`STORE_MAGIC`] sees every other field.
#[repr(C)]
pub struct StoreHeader {
    pub capacity: u64,
    pub count: AtomicU64,
    pub state: AtomicU64,
    pub record_size: u64,
    pub magic: AtomicU64,
}

/// Byte offset of the first record slot
pub const HEADER_SIZE: usize = std::mem::size_of::<StoreHeader>();

const _: () = assert!(HEADER_SIZE % std::mem::align_of::<crate::record::EnvironmentalRecord>() == 0);

impl StoreHeader {
    /// Fill in a header over zeroed memory and publish it.
    ///
    /// # Safety
    ///
    /// `header` must point to a writable, zero-filled, suitably aligned header that
    /// no other thread or process writes to.
    pub unsafe fn publish(header: *mut StoreHeader, capacity: u64) {
        std::ptr::addr_of_mut!((*header).capacity).write(capacity);
        std::ptr::addr_of_mut!((*header).record_size).write(RECORD_SIZE as u64);
        (*header).count.store(0, Ordering::Relaxed);
        (*header).state.store(STATE_APPENDABLE, Ordering::Relaxed);
        (*header).magic.store(STORE_MAGIC, Ordering::Release);
    }

    /// The magic word, or zero while the creator is still writing the header
    pub fn magic(&self) -> u64 {
        self.magic.load(Ordering::Acquire)
    }
}

/// Total region length for `capacity` records, or `None` on overflow
pub fn region_len(capacity: u64) -> Option<usize> {
    let capacity = usize::try_from(capacity).ok()?;
    capacity.checked_mul(RECORD_SIZE)?.checked_add(HEADER_SIZE)
}
