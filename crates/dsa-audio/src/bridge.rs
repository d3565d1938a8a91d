//! Audio bridge between the frame tick and the output device
//!
//! A fixed-capacity single-producer single-consumer ring of stereo i16
//! pairs. The session pushes whatever the core produced each tick; the
//! device callback pulls as much as it needs. Neither side takes a lock:
//! `tail` only moves in `push` and `head` only moves in `pull`, and each
//! side publishes its index with release ordering after touching the slots.
//! Overflow drops the newest pairs and underflow yields silence.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

/// One stereo sample pair, `[left, right]`
pub type StereoSample = [i16; 2];

/// Default capacity in stereo pairs
pub const DEFAULT_CAPACITY: usize = 8192;

const SILENCE: StereoSample = [0, 0];

fn pack([left, right]: StereoSample) -> u32 {
    ((left as u16 as u32) << 16) | right as u16 as u32
}

fn unpack(slot: u32) -> StereoSample {
    [(slot >> 16) as u16 as i16, slot as u16 as i16]
}

/// Counters kept by the bridge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Pairs accepted by `push`
    pub pushed: u64,
    /// Pairs discarded because the ring was full
    pub dropped: u64,
    /// Pairs handed to the consumer
    pub pulled: u64,
    /// Silent pairs emitted because the ring ran dry
    pub underrun: u64,
}

/// Single-producer single-consumer stereo sample ring
///
/// `push` must only be called from one thread at a time, and so must
/// `pull`. The two may run concurrently.
#[derive(Debug)]
pub struct AudioBridge {
    /// Packed pairs, indexed by position modulo capacity
    slots: Box<[AtomicU32]>,
    /// Pairs consumed so far
    head: AtomicUsize,
    /// Pairs produced so far
    tail: AtomicUsize,
    pushed: AtomicU64,
    dropped: AtomicU64,
    pulled: AtomicU64,
    underrun: AtomicU64,
}

impl AudioBridge {
    /// Create a bridge holding up to `capacity` pairs (at least one)
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity.max(1)).map(|_| AtomicU32::new(0)).collect(),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            pushed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            pulled: AtomicU64::new(0),
            underrun: AtomicU64::new(0),
        }
    }

    fn slot(&self, position: usize) -> &AtomicU32 {
        &self.slots[position % self.slots.len()]
    }

    /// Queued pairs between `head` and `tail`, clamped to capacity
    fn queued(&self, head: usize, tail: usize) -> usize {
        tail.wrapping_sub(head).min(self.capacity())
    }

    /// Append interleaved `L, R, L, R, ...` samples
    ///
    /// Returns the number of pairs accepted. Pairs that do not fit are
    /// dropped; a trailing unpaired sample is ignored.
    pub fn push(&self, interleaved: &[i16]) -> usize {
        let offered = interleaved.len() / 2;
        if offered == 0 {
            return 0;
        }

        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        let accepted = offered.min(self.capacity() - self.queued(head, tail));
        for (offset, pair) in interleaved.chunks_exact(2).take(accepted).enumerate() {
            self.slot(tail.wrapping_add(offset))
                .store(pack([pair[0], pair[1]]), Ordering::Relaxed);
        }
        self.tail
            .store(tail.wrapping_add(accepted), Ordering::Release);

        self.pushed.fetch_add(accepted as u64, Ordering::Relaxed);
        let dropped = offered - accepted;
        if dropped > 0 {
            self.dropped.fetch_add(dropped as u64, Ordering::Relaxed);
            tracing::trace!("Audio bridge full, dropped {} pairs", dropped);
        }
        accepted
    }

    /// Fill `out` with queued pairs, padding with silence once the ring is empty
    ///
    /// Returns the number of real pairs written. Pairs read while a `reset`
    /// ran are discarded.
    pub fn pull(&self, out: &mut [StereoSample]) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        let mut taken = out.len().min(self.queued(head, tail));
        for (offset, slot) in out.iter_mut().take(taken).enumerate() {
            *slot = unpack(self.slot(head.wrapping_add(offset)).load(Ordering::Relaxed));
        }
        if taken > 0
            && self
                .head
                .compare_exchange(
                    head,
                    head.wrapping_add(taken),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_err()
        {
            taken = 0;
        }

        let silent = out.len() - taken;
        if silent > 0 {
            out[taken..].fill(SILENCE);
            self.underrun.fetch_add(silent as u64, Ordering::Relaxed);
        }
        self.pulled.fetch_add(taken as u64, Ordering::Relaxed);
        taken
    }

    /// Empty the ring, restoring its full free capacity
    ///
    /// Called from the producer side; a concurrent `pull` sees an empty ring.
    pub fn reset(&self) {
        let tail = self.tail.load(Ordering::Acquire);
        self.head.store(tail, Ordering::Release);
    }

    /// Queued pairs
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        self.queued(head, tail)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Free slots
    pub fn available(&self) -> usize {
        self.capacity() - self.len()
    }

    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            pushed: self.pushed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            pulled: self.pulled.load(Ordering::Relaxed),
            underrun: self.underrun.load(Ordering::Relaxed),
        }
    }

    #[cfg(test)]
    fn head(&self) -> usize {
        self.head.load(Ordering::Acquire)
    }
}

impl Default for AudioBridge {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
