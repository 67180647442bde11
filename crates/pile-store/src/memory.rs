use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::config::{AllocationMode, PileConfig};
use crate::error::{PileError, PileResult};
use crate::handle::Handle;
use crate::traits::Pile;

/// Point-in-time counters for an [`InMemoryPile`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PileStats {
    /// Live records.
    pub object_count: usize,
    /// Segments that have not been released.
    pub segment_count: usize,
    /// Payload bytes held by live records.
    pub utilized_bytes: u64,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    data: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
struct Segment {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    used: u64,
}

impl Segment {
    fn slot(&self, handle: Handle) -> Option<&Slot> {
        self.slots
            .get(handle.address() as usize)
            .filter(|s| s.generation == handle.generation() && s.data.is_some())
    }

    fn slot_mut(&mut self, handle: Handle) -> Option<&mut Slot> {
        self.slots
            .get_mut(handle.address() as usize)
            .filter(|s| s.generation == handle.generation() && s.data.is_some())
    }

    fn has_free_slot(&self) -> bool {
        !self.free.is_empty()
    }
}

#[derive(Debug, Default)]
struct Inner {
    // Released segments stay as `None` so their indices are never handed out
    // again.
    segments: Vec<Option<Segment>>,
    objects: usize,
    utilized: u64,
}

/// In-memory, segmented pile.
///
/// Records are byte copies kept in fixed-budget segments behind a `RwLock`.
/// Every `get` clones the stored bytes, so callers never alias stored data.
/// Intended for tests and for embedding a process-local pile.
pub struct InMemoryPile {
    config: PileConfig,
    inner: RwLock<Inner>,
}

impl InMemoryPile {
    /// Create an empty pile with the default configuration.
    pub fn new() -> Self {
        Self::with_config(PileConfig::default())
    }

    /// Create an empty pile with the given configuration.
    pub fn with_config(config: PileConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// The configuration this pile was created with.
    pub fn config(&self) -> &PileConfig {
        &self.config
    }

    /// Number of live records.
    pub fn len(&self) -> PileResult<usize> {
        Ok(self.read()?.objects)
    }

    /// Returns `true` if the pile holds no live records.
    pub fn is_empty(&self) -> PileResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Current counters.
    pub fn stats(&self) -> PileResult<PileStats> {
        let inner = self.read()?;
        Ok(PileStats {
            object_count: inner.objects,
            segment_count: inner.segments.iter().flatten().count(),
            utilized_bytes: inner.utilized,
        })
    }

    /// Release every segment holding no live record.
    ///
    /// Handles into released segments stop resolving. Returns the number of
    /// segments released.
    pub fn compact(&self) -> PileResult<usize> {
        let mut inner = self.write()?;
        let mut released = 0;
        for entry in inner.segments.iter_mut() {
            if entry.as_ref().is_some_and(|seg| seg.live == 0) {
                *entry = None;
                released += 1;
            }
        }
        debug!(released, "compacted pile");
        Ok(released)
    }

    /// Drop every record and release every segment.
    pub fn purge(&self) -> PileResult<()> {
        let mut inner = self.write()?;
        for entry in inner.segments.iter_mut() {
            *entry = None;
        }
        inner.objects = 0;
        inner.utilized = 0;
        Ok(())
    }

    fn read(&self) -> PileResult<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|e| PileError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> PileResult<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|e| PileError::LockPoisoned(e.to_string()))
    }

    fn check_budget(&self, utilized: u64, growth: u64) -> PileResult<()> {
        if let Some(limit) = self.config.max_memory {
            let requested = utilized.saturating_add(growth);
            if requested > limit {
                return Err(PileError::OutOfSpace { requested, limit });
            }
        }
        Ok(())
    }

    /// Pick the segment that receives a new record of `size` bytes,
    /// opening a fresh segment if none fits.
    fn target_segment(&self, inner: &mut Inner, size: u64) -> PileResult<usize> {
        let limit = self.config.segment_size;
        let fits = |seg: &Segment| seg.used + size <= limit;
        let found = match self.config.allocation_mode {
            AllocationMode::ReuseSpace => inner
                .segments
                .iter()
                .enumerate()
                .filter_map(|(i, s)| s.as_ref().map(|s| (i, s)))
                .filter(|&(_, s)| fits(s))
                .max_by_key(|(_, s)| s.has_free_slot())
                .map(|(i, _)| i),
            AllocationMode::FavorSpeed => inner
                .segments
                .iter()
                .enumerate()
                .next_back()
                .and_then(|(i, s)| s.as_ref().filter(|s| fits(*s)).map(|_| i)),
        };
        if let Some(index) = found {
            return Ok(index);
        }

        let index = inner.segments.len();
        if u32::try_from(index).map_or(true, |i| i == u32::MAX) {
            return Err(PileError::OutOfSpace {
                requested: size,
                limit: self.config.max_memory.unwrap_or(u64::MAX),
            });
        }
        inner.segments.push(Some(Segment::default()));
        debug!(segment = index, "opened pile segment");
        Ok(index)
    }
}

impl Default for InMemoryPile {
    fn default() -> Self {
        Self::new()
    }
}

impl Pile for InMemoryPile {
    fn put(&self, data: &[u8]) -> PileResult<Handle> {
        let size = data.len() as u64;
        if size > self.config.segment_size {
            return Err(PileError::ObjectTooLarge {
                size,
                limit: self.config.segment_size,
            });
        }

        let mut inner = self.write()?;
        self.check_budget(inner.utilized, size)?;
        let index = self.target_segment(&mut inner, size)?;
        let reuse = self.config.allocation_mode == AllocationMode::ReuseSpace;

        let segment = inner.segments[index].get_or_insert_with(Segment::default);
        let (address, generation) = match segment.free.pop().filter(|_| reuse) {
            Some(address) => {
                let slot = &mut segment.slots[address as usize];
                slot.generation += 1;
                slot.data = Some(data.to_vec());
                (address, slot.generation)
            }
            None => {
                let address = segment.slots.len() as u32;
                segment.slots.push(Slot {
                    generation: 0,
                    data: Some(data.to_vec()),
                });
                (address, 0)
            }
        };
        segment.live += 1;
        segment.used += size;
        inner.objects += 1;
        inner.utilized += size;

        Ok(Handle::new(index as u32, address, generation))
    }

    fn put_at(&self, handle: Handle, data: &[u8]) -> PileResult<()> {
        let size = data.len() as u64;
        if size > self.config.segment_size {
            return Err(PileError::ObjectTooLarge {
                size,
                limit: self.config.segment_size,
            });
        }

        let mut inner = self.write()?;
        let utilized = inner.utilized;
        let segment = inner
            .segments
            .get_mut(handle.segment() as usize)
            .and_then(Option::as_mut)
            .ok_or(PileError::InvalidHandle(handle))?;
        let slot = segment
            .slot_mut(handle)
            .ok_or(PileError::InvalidHandle(handle))?;

        let old = slot.data.as_ref().map_or(0, |d| d.len() as u64);
        if size > old {
            self.check_budget(utilized, size - old)?;
        }
        // Overwrites stay in place even if the segment goes over budget.
        slot.data = Some(data.to_vec());
        segment.used = segment.used - old + size;
        inner.utilized = inner.utilized - old + size;
        Ok(())
    }

    fn get(&self, handle: Handle) -> PileResult<Vec<u8>> {
        let inner = self.read()?;
        inner
            .segments
            .get(handle.segment() as usize)
            .and_then(Option::as_ref)
            .and_then(|seg| seg.slot(handle))
            .and_then(|slot| slot.data.clone())
            .ok_or(PileError::InvalidHandle(handle))
    }

    fn remove(&self, handle: Handle) -> PileResult<bool> {
        let mut inner = self.write()?;
        let reuse = self.config.allocation_mode == AllocationMode::ReuseSpace;
        let Some(segment) = inner
            .segments
            .get_mut(handle.segment() as usize)
            .and_then(Option::as_mut)
        else {
            return Ok(false);
        };
        let Some(slot) = segment.slot_mut(handle) else {
            return Ok(false);
        };

        let size = slot.data.take().map_or(0, |d| d.len() as u64);
        // A slot at the last generation is retired, never reused.
        if reuse && slot.generation < u32::MAX {
            segment.free.push(handle.address());
        }
        segment.live -= 1;
        segment.used -= size;
        inner.objects -= 1;
        inner.utilized -= size;
        Ok(true)
    }
}

impl std::fmt::Debug for InMemoryPile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats().unwrap_or_default();
        f.debug_struct("InMemoryPile")
            .field("object_count", &stats.object_count)
            .field("segment_count", &stats.segment_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::PileExt;

    fn small_pile(mode: AllocationMode) -> InMemoryPile {
        InMemoryPile::with_config(PileConfig {
            allocation_mode: mode,
            segment_size: 64,
            max_memory: None,
        })
    }

    // -----------------------------------------------------------------------
    // Core contract
    // -----------------------------------------------------------------------

    #[test]
    fn put_and_get() {
        let pile = InMemoryPile::new();
        let h = pile.put(b"hello").unwrap();
        assert!(h.is_valid());
        assert_eq!(pile.get(h).unwrap(), b"hello");
    }

    #[test]
    fn put_never_returns_a_live_handle() {
        let pile = InMemoryPile::new();
        let a = pile.put(b"a").unwrap();
        let b = pile.put(b"a").unwrap();
        assert_ne!(a, b);
        assert_eq!(pile.len().unwrap(), 2);
    }

    #[test]
    fn put_at_overwrites() {
        let pile = InMemoryPile::new();
        let h = pile.put(b"one").unwrap();
        pile.put_at(h, b"three").unwrap();
        assert_eq!(pile.get(h).unwrap(), b"three");
        assert_eq!(pile.stats().unwrap().utilized_bytes, 5);
    }

    #[test]
    fn get_returns_independent_copy() {
        let pile = InMemoryPile::new();
        let h = pile.put(b"abc").unwrap();
        let mut copy = pile.get(h).unwrap();
        copy[0] = b'z';
        assert_eq!(pile.get(h).unwrap(), b"abc");
    }

    #[test]
    fn removed_handle_is_invalid() {
        let pile = InMemoryPile::new();
        let h = pile.put(b"gone").unwrap();
        assert!(pile.remove(h).unwrap());
        assert!(matches!(pile.get(h), Err(PileError::InvalidHandle(x)) if x == h));
        assert!(matches!(pile.put_at(h, b"x"), Err(PileError::InvalidHandle(_))));
        assert!(!pile.remove(h).unwrap());
        assert!(!pile.contains(h).unwrap());
    }

    #[test]
    fn sentinel_never_resolves() {
        let pile = InMemoryPile::new();
        pile.put(b"x").unwrap();
        assert!(matches!(
            pile.get(Handle::INVALID),
            Err(PileError::InvalidHandle(_))
        ));
        assert!(!pile.remove(Handle::INVALID).unwrap());
    }

    // -----------------------------------------------------------------------
    // Allocation modes
    // -----------------------------------------------------------------------

    #[test]
    fn reuse_space_bumps_generation() {
        let pile = small_pile(AllocationMode::ReuseSpace);
        let old = pile.put(b"old").unwrap();
        pile.remove(old).unwrap();
        let new = pile.put(b"new").unwrap();

        assert_eq!(new.segment(), old.segment());
        assert_eq!(new.address(), old.address());
        assert_ne!(new.generation(), old.generation());
        assert!(matches!(pile.get(old), Err(PileError::InvalidHandle(_))));
        assert_eq!(pile.get(new).unwrap(), b"new");
    }

    #[test]
    fn exhausted_generation_retires_slot() {
        let pile = small_pile(AllocationMode::ReuseSpace);
        let first = pile.put(b"a").unwrap();
        {
            let mut inner = pile.write().unwrap();
            let segment = inner.segments[0].as_mut().unwrap();
            segment.slots[first.address() as usize].generation = u32::MAX;
        }
        let last = Handle::new(first.segment(), first.address(), u32::MAX);
        assert!(pile.remove(last).unwrap());

        let next = pile.put(b"b").unwrap();
        assert_ne!(next.address(), last.address());
        assert!(matches!(pile.get(last), Err(PileError::InvalidHandle(_))));
        assert!(matches!(pile.get(first), Err(PileError::InvalidHandle(_))));
    }

    #[test]
    fn favor_speed_never_reuses_slots() {
        let pile = small_pile(AllocationMode::FavorSpeed);
        let old = pile.put(b"old").unwrap();
        pile.remove(old).unwrap();
        let new = pile.put(b"new").unwrap();
        assert_ne!(new.address(), old.address());
    }

    #[test]
    fn segments_roll_over_when_full() {
        let pile = small_pile(AllocationMode::FavorSpeed);
        let a = pile.put(&[0u8; 40]).unwrap();
        let b = pile.put(&[1u8; 40]).unwrap();
        assert_ne!(a.segment(), b.segment());
        assert_eq!(pile.stats().unwrap().segment_count, 2);
    }

    #[test]
    fn object_larger_than_segment_is_rejected() {
        let pile = small_pile(AllocationMode::ReuseSpace);
        let err = pile.put(&[0u8; 65]).unwrap_err();
        assert!(matches!(err, PileError::ObjectTooLarge { size: 65, limit: 64 }));
    }

    #[test]
    fn max_memory_is_enforced() {
        let pile = InMemoryPile::with_config(PileConfig {
            max_memory: Some(10),
            ..Default::default()
        });
        let h = pile.put(&[0u8; 8]).unwrap();
        assert!(matches!(
            pile.put(&[0u8; 8]),
            Err(PileError::OutOfSpace { requested: 16, limit: 10 })
        ));
        assert!(matches!(
            pile.put_at(h, &[0u8; 12]),
            Err(PileError::OutOfSpace { .. })
        ));
        // Shrinking is always allowed.
        pile.put_at(h, &[0u8; 2]).unwrap();
    }

    // -----------------------------------------------------------------------
    // Compaction
    // -----------------------------------------------------------------------

    #[test]
    fn compact_releases_empty_segments_only() {
        let pile = small_pile(AllocationMode::FavorSpeed);
        let a = pile.put(&[0u8; 40]).unwrap();
        let b = pile.put(&[1u8; 40]).unwrap();
        pile.remove(a).unwrap();

        assert_eq!(pile.compact().unwrap(), 1);
        assert_eq!(pile.stats().unwrap().segment_count, 1);
        assert_eq!(pile.get(b).unwrap(), vec![1u8; 40]);

        // A new segment never takes the released index.
        let c = pile.put(&[2u8; 40]).unwrap();
        assert_ne!(c.segment(), a.segment());
        assert!(matches!(pile.get(a), Err(PileError::InvalidHandle(_))));
    }

    #[test]
    fn purge_invalidates_everything() {
        let pile = InMemoryPile::new();
        let h = pile.put(b"x").unwrap();
        pile.purge().unwrap();
        assert!(pile.is_empty().unwrap());
        let fresh = pile.put(b"y").unwrap();
        assert_ne!(fresh, h);
        assert!(matches!(pile.get(h), Err(PileError::InvalidHandle(_))));
    }

    // -----------------------------------------------------------------------
    // Typed access
    // -----------------------------------------------------------------------

    #[test]
    fn typed_values_through_dyn_pile() {
        use std::sync::Arc;

        let pile: Arc<dyn Pile> = Arc::new(InMemoryPile::new());
        let h = pile.put_value(&vec![1u32, 2, 3]).unwrap();
        let v: Vec<u32> = pile.get_value(h).unwrap();
        assert_eq!(v, vec![1, 2, 3]);

        pile.put_value_at(h, &vec![4u32]).unwrap();
        let v: Vec<u32> = pile.get_value(h).unwrap();
        assert_eq!(v, vec![4]);
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let pile = InMemoryPile::new();
        let h = pile.put_value(&(0u32, [7u64; 8])).unwrap();
        assert!(matches!(
            pile.get_value::<u32>(h),
            Err(PileError::Serialization(_))
        ));
        let (tag, body): (u32, [u64; 8]) = pile.get_value(h).unwrap();
        assert_eq!((tag, body), (0, [7; 8]));
    }

    #[test]
    fn decode_mismatch_is_serialization_error() {
        let pile = InMemoryPile::new();
        let h = pile.put(&[1u8]).unwrap();
        assert!(matches!(
            pile.get_value::<String>(h),
            Err(PileError::Serialization(_))
        ));
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    #[test]
    fn concurrent_puts_yield_distinct_handles() {
        use std::collections::HashSet;
        use std::sync::Arc;
        use std::thread;

        let pile = Arc::new(InMemoryPile::new());
        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let pile = Arc::clone(&pile);
                thread::spawn(move || {
                    (0..16u8)
                        .map(|j| pile.put(&[i, j]).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all = HashSet::new();
        for t in handles {
            for h in t.join().expect("thread should not panic") {
                assert!(all.insert(h));
            }
        }
        assert_eq!(pile.len().unwrap(), 128);
    }

    #[test]
    fn debug_format() {
        let pile = InMemoryPile::new();
        pile.put(b"x").unwrap();
        let debug = format!("{pile:?}");
        assert!(debug.contains("InMemoryPile"));
        assert!(debug.contains("object_count"));
    }
}
