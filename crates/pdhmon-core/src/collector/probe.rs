//! Two-phase buffer discovery for native calls returning variable-length data.
//!
//! A native call is first made with a zero-size buffer so it can report the
//! size it needs, then again with a buffer of exactly that size. Every call
//! site that reads counter metadata, raw counter arrays or registry blobs goes
//! through [`probe`].

use tracing::debug;

use crate::collector::status::PdhStatus;

/// Upper bound on sized fetches when the required size keeps growing
/// between calls (e.g. instances appearing mid-probe).
pub const MAX_PROBE_ATTEMPTS: usize = 3;

/// Reusable, 8-byte aligned scratch buffer handed to native calls.
///
/// `size` is the in/out byte count the native call reads and updates. While
/// the buffer is unallocated, [`ProbeBuffer::as_mut_ptr`] returns null so the
/// callee only reports the size it needs.
#[derive(Debug, Default)]
pub struct ProbeBuffer {
    words: Vec<u64>,
    size: u32,
    allocated: bool,
}

impl ProbeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Byte size reported by (or offered to) the native call.
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn size_mut(&mut self) -> &mut u32 {
        &mut self.size
    }

    /// Whether the buffer currently offers storage to the callee.
    pub fn is_allocated(&self) -> bool {
        self.allocated
    }

    /// Bytes of storage offered to the callee.
    pub fn capacity(&self) -> usize {
        if self.allocated { self.size as usize } else { 0 }
    }

    /// Data pointer for the native call; null during the sizing phase.
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        if self.allocated {
            self.words.as_mut_ptr().cast()
        } else {
            std::ptr::null_mut()
        }
    }

    pub fn as_ptr(&self) -> *const u8 {
        if self.allocated {
            self.words.as_ptr().cast()
        } else {
            std::ptr::null()
        }
    }

    /// Storage as aligned words, limited to the allocated region.
    pub fn words(&self) -> &[u64] {
        if self.allocated {
            &self.words[..self.size.div_ceil(8) as usize]
        } else {
            &[]
        }
    }

    pub fn words_mut(&mut self) -> &mut [u64] {
        if self.allocated {
            let len = self.size.div_ceil(8) as usize;
            &mut self.words[..len]
        } else {
            &mut []
        }
    }

    /// Copies out the first `size` bytes of the allocated region.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.words()
            .iter()
            .flat_map(|word| word.to_ne_bytes())
            .take(self.capacity())
            .collect()
    }

    /// Drops back to the sizing phase, keeping the allocation for reuse.
    fn reset(&mut self) {
        self.size = 0;
        self.allocated = false;
    }

    /// Offers exactly `size` bytes to the next call.
    fn allocate(&mut self, size: u32) {
        let words = size.div_ceil(8) as usize;
        if self.words.len() < words {
            self.words.resize(words, 0);
        }
        self.words[..words].fill(0);
        self.size = size;
        self.allocated = true;
    }
}

/// Growth rule for callees whose reported size cannot be trusted after a
/// failed sized call.
///
/// The next offer is at least `initial` bytes and at least `step` bytes more
/// than the previous offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedGrowth {
    pub initial: u32,
    pub step: u32,
}

impl FixedGrowth {
    pub fn next_size(self, reported: u32, offered: u32) -> u32 {
        reported
            .max(self.initial)
            .max(offered.saturating_add(self.step))
    }
}

/// Runs the probe-then-fetch protocol for `call`.
///
/// On `Ok`, `buffer` holds the fetched data and its byte size. A sizing call
/// that succeeds with a reported size of zero means there is nothing to fetch
/// and leaves the buffer unallocated; one that succeeds with a non-zero size
/// is treated as a size report. The returned status on `Err` is the one the
/// native call reported.
pub fn probe<F>(buffer: &mut ProbeBuffer, call: F) -> Result<(), PdhStatus>
where
    F: FnMut(&mut ProbeBuffer) -> PdhStatus,
{
    probe_bounded(buffer, MAX_PROBE_ATTEMPTS, call)
}

/// [`probe`] with a caller-chosen bound on sized calls.
pub fn probe_bounded<F>(
    buffer: &mut ProbeBuffer,
    max_attempts: usize,
    mut call: F,
) -> Result<(), PdhStatus>
where
    F: FnMut(&mut ProbeBuffer) -> PdhStatus,
{
    buffer.reset();
    let status = call(buffer);
    if status.is_success() && buffer.size() == 0 {
        return Ok(());
    }
    if !status.is_success() && !status.is_more_data() {
        return Err(status);
    }

    let mut status = PdhStatus::MORE_DATA;
    for attempt in 1..=max_attempts {
        let required = buffer.size();
        buffer.allocate(required);
        status = call(buffer);
        if status.is_success() {
            return Ok(());
        }
        if !status.is_more_data() {
            return Err(status);
        }
        debug!(
            attempt,
            required,
            grown_to = buffer.size(),
            "buffer grew between probe and fetch"
        );
        if buffer.size() <= required {
            // The callee did not report a larger size; retrying would loop.
            break;
        }
    }
    Err(status)
}
