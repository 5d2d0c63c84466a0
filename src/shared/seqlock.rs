//! Fixed-size records behind sequence locks.
//!
//! A record is encoded into `N` machine words. Writers never block readers:
//! a reader retries only when it observed a write in progress on the slot it
//! was reading. Each [`SharedRecord`] keeps two slots and flips between them
//! on every write, so a reader of the latest value only races a writer that
//! has already lapped it once.

use std::sync::{
    atomic::{fence, AtomicU64, Ordering},
    Mutex, PoisonError,
};

/// A value with a fixed binary layout of `N` words.
pub trait Record<const N: usize>: Sized {
    fn encode(&self) -> [u64; N];
    fn decode(words: &[u64; N]) -> Self;
}

struct Slot<const N: usize> {
    sequence: AtomicU64,
    words: [AtomicU64; N],
}

impl<const N: usize> Slot<N> {
    fn new(words: [u64; N]) -> Self {
        Self {
            sequence: AtomicU64::new(0),
            words: words.map(AtomicU64::new),
        }
    }

    fn write(&self, words: [u64; N]) {
        let sequence = self.sequence.load(Ordering::Relaxed);
        self.sequence.store(sequence.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);
        for (slot, word) in self.words.iter().zip(words) {
            slot.store(word, Ordering::Relaxed);
        }
        self.sequence
            .store(sequence.wrapping_add(2), Ordering::Release);
    }

    /// None if a writer touched the slot while reading.
    fn try_read(&self) -> Option<[u64; N]> {
        let before = self.sequence.load(Ordering::Acquire);
        if before % 2 == 1 {
            return None;
        }
        let mut words = [0; N];
        for (word, slot) in words.iter_mut().zip(self.words.iter()) {
            *word = slot.load(Ordering::Relaxed);
        }
        fence(Ordering::Acquire);
        let after = self.sequence.load(Ordering::Relaxed);
        (before == after).then_some(words)
    }
}

pub struct SharedRecord<T, const N: usize> {
    epoch: AtomicU64,
    slots: [Slot<N>; 2],
    writer: Mutex<()>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Record<N>, const N: usize> SharedRecord<T, N> {
    pub fn new(value: &T) -> Self {
        let words = value.encode();
        Self {
            epoch: AtomicU64::new(0),
            slots: [Slot::new(words), Slot::new(words)],
            writer: Mutex::new(()),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn store(&self, value: &T) {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let next = self.epoch.load(Ordering::Relaxed).wrapping_add(1);
        self.slots[(next % 2) as usize].write(value.encode());
        self.epoch.store(next, Ordering::Release);
    }

    pub fn load(&self) -> T {
        loop {
            let epoch = self.epoch.load(Ordering::Acquire);
            if let Some(words) = self.slots[(epoch % 2) as usize].try_read() {
                return T::decode(&words);
            }
            std::hint::spin_loop();
        }
    }

    /// Number of completed writes. Readers compare epochs to detect updates.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }
}
