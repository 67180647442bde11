//! The pile-backed doubly linked list.
//!
//! [`PileList`] keeps its header and every node as separate pile records
//! linked by handle. No operation holds a resolved record across a pile
//! call it does not control: each step re-reads what it needs, changes its
//! local copy, and writes it back.
//!
//! # Invariants
//!
//! - `head` and `tail` are the sentinel together, exactly when `count == 0`.
//! - Walking `count` steps along `next` from `head` ends at `tail`; one more
//!   step reaches the sentinel. The same holds along `prev` from `tail`.
//! - `a.next == b` implies `b.prev == a` for linked nodes.
//! - Every linked node's `owner` is the header's handle.
//!
//! # Write ordering
//!
//! The pile has no multi-call transactions, so structural updates are
//! ordered to keep every stored handle resolvable between calls: new
//! records are written before anything links to them, and neighbors and
//! the header are rewritten before a node's record is released.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use pile_store::{Handle, Pile};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ListError, ListResult};
use crate::iter::{Direction, Iter, Nodes, Walk};
use crate::node::PileNode;
use crate::record::{self, Link, ListRecord, NodeRecord};

/// A doubly linked list whose header and nodes live in a pile.
///
/// A `PileList` value is just the pile plus the header's handle; cloning it
/// or [`attach`](Self::attach)ing to the same handle gives another view of
/// the same list.
///
/// Concurrent structural changes to one list need an external lock held
/// for the whole operation. Read-only walks may interleave with each other.
pub struct PileList<T> {
    pile: Arc<dyn Pile>,
    handle: Handle,
    _marker: PhantomData<fn() -> T>,
}

impl<T> PileList<T> {
    pub(crate) fn from_parts(pile: Arc<dyn Pile>, handle: Handle) -> Self {
        Self {
            pile,
            handle,
            _marker: PhantomData,
        }
    }

    /// Persist a new, empty list header in `pile`.
    pub fn new(pile: Arc<dyn Pile>) -> ListResult<Self> {
        let header = record::create_list(pile.as_ref())?;
        debug!(list = %header.this, "created list");
        Ok(Self::from_parts(pile, header.this))
    }

    /// Persist a new, empty list in the application's current pile.
    pub fn new_default() -> ListResult<Self> {
        Self::new(pile_app::current_pile()?)
    }

    /// Attach to a list previously persisted at `handle`.
    pub fn attach(pile: Arc<dyn Pile>, handle: Handle) -> ListResult<Self> {
        record::load_list(pile.as_ref(), handle)?;
        Ok(Self::from_parts(pile, handle))
    }

    /// The handle of the list header.
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// The pile holding this list.
    pub fn pile(&self) -> Arc<dyn Pile> {
        Arc::clone(&self.pile)
    }

    /// Number of elements. Reads the stored counter; never walks the chain.
    pub fn len(&self) -> ListResult<usize> {
        Ok(self.header()?.count as usize)
    }

    pub fn is_empty(&self) -> ListResult<bool> {
        Ok(self.header()?.count == 0)
    }

    /// Always `false`: every list accepts structural changes.
    pub fn is_read_only(&self) -> bool {
        false
    }

    /// The first node, or `None` if the list is empty.
    pub fn first(&self) -> ListResult<Option<PileNode<T>>> {
        let header = self.header()?;
        self.node_at(header.this, Link::Head, header.head)
    }

    /// The last node, or `None` if the list is empty.
    pub fn last(&self) -> ListResult<Option<PileNode<T>>> {
        let header = self.header()?;
        self.node_at(header.this, Link::Tail, header.tail)
    }

    /// Lazily walk the values from head to tail.
    ///
    /// Each call starts a new walk. The iterator yields copies and stops
    /// after the first error.
    pub fn iter(&self) -> Iter<T> {
        Iter::new(self.walk(Direction::Forward))
    }

    /// Lazily walk the values from tail to head.
    pub fn iter_rev(&self) -> Iter<T> {
        Iter::new(self.walk(Direction::Backward))
    }

    /// Lazily walk the nodes from head to tail.
    pub fn nodes(&self) -> Nodes<T> {
        Nodes::new(self.walk(Direction::Forward))
    }

    /// Remove every node, releasing their records. The header stays.
    ///
    /// The header is reset first, so the released chain is never reachable
    /// from the list while it is being torn down.
    pub fn clear(&self) -> ListResult<()> {
        let mut header = self.header()?;
        let (old_head, old_count) = (header.head, header.count);
        header.head = Handle::INVALID;
        header.tail = Handle::INVALID;
        header.count = 0;
        record::store_list(self.pile.as_ref(), &header)?;

        let (mut from, mut link, mut current) = (header.this, Link::Head, old_head);
        let mut released = 0u64;
        while let Some(rec) = record::follow(self.pile.as_ref(), from, link, current)? {
            record::release_node(self.pile.as_ref(), &rec)?;
            released += 1;
            (from, link, current) = (rec.this, Link::Next, rec.next);
        }
        if released != old_count {
            warn!(list = %self.handle, released, count = old_count, "cleared chain length differed from count");
        }
        debug!(list = %self.handle, released, "cleared list");
        Ok(())
    }

    /// Clear the list and release its header. Handles to it stop resolving.
    pub fn destroy(self) -> ListResult<()> {
        self.clear()?;
        self.pile.remove(self.handle)?;
        debug!(list = %self.handle, "destroyed list");
        Ok(())
    }

    /// Check every structural invariant, walking the chain both ways.
    ///
    /// Returns the first violation found as [`ListError::Corrupt`], or the
    /// broken link that stopped the walk.
    pub fn check_integrity(&self) -> ListResult<()> {
        let result = self.verify();
        if let Err(e) = &result {
            warn!(list = %self.handle, error = %e, "list integrity check failed");
        }
        result
    }

    pub(crate) fn header(&self) -> ListResult<ListRecord> {
        record::load_list(self.pile.as_ref(), self.handle)
    }

    fn walk(&self, direction: Direction) -> Walk {
        Walk::new(Arc::clone(&self.pile), self.handle, direction)
    }

    fn node_at(&self, from: Handle, link: Link, target: Handle) -> ListResult<Option<PileNode<T>>> {
        let found = record::follow(self.pile.as_ref(), from, link, target)?;
        Ok(found.map(|rec| PileNode::from_parts(Arc::clone(&self.pile), rec.this)))
    }

    fn corrupt(&self, handle: Handle, reason: impl Into<String>) -> ListError {
        ListError::Corrupt {
            handle,
            reason: reason.into(),
        }
    }

    fn verify(&self) -> ListResult<()> {
        let header = self.header()?;
        if header.head.is_invalid() != header.tail.is_invalid() {
            return Err(self.corrupt(header.this, "only one of head and tail is the sentinel"));
        }
        if header.head.is_invalid() != (header.count == 0) {
            return Err(self.corrupt(
                header.this,
                format!("head is {} but count is {}", header.head, header.count),
            ));
        }

        for direction in [Direction::Forward, Direction::Backward] {
            let mut expected_back = Handle::INVALID;
            let mut seen = 0u64;
            for rec in self.walk(direction) {
                let rec = rec?;
                if rec.owner != header.this {
                    return Err(self.corrupt(rec.this, format!("owned by {}", rec.owner)));
                }
                let back = match direction {
                    Direction::Forward => rec.prev,
                    Direction::Backward => rec.next,
                };
                if back != expected_back {
                    return Err(self.corrupt(
                        rec.this,
                        format!("back link is {back}, expected {expected_back}"),
                    ));
                }
                expected_back = rec.this;
                seen += 1;
            }
            let end = match direction {
                Direction::Forward => header.tail,
                Direction::Backward => header.head,
            };
            if expected_back != end {
                return Err(self.corrupt(
                    header.this,
                    format!("walk ended at {expected_back}, expected {end}"),
                ));
            }
            if seen != header.count {
                return Err(self.corrupt(
                    header.this,
                    format!("walked {seen} nodes, count is {}", header.count),
                ));
            }
        }
        Ok(())
    }

    /// Rewrite the neighbors of `rec` and the header so the chain bypasses
    /// it. `rec` itself is not written.
    fn splice_out(&self, rec: &NodeRecord) -> ListResult<()> {
        let pile = self.pile.as_ref();
        let mut header = self.header()?;

        // Resolve both neighbors before writing anything.
        let prev = record::follow(pile, rec.this, Link::Previous, rec.prev)?;
        let next = record::follow(pile, rec.this, Link::Next, rec.next)?;
        if prev.is_none() && header.head != rec.this {
            return Err(self.corrupt(rec.this, "no predecessor but not the head"));
        }
        if next.is_none() && header.tail != rec.this {
            return Err(self.corrupt(rec.this, "no successor but not the tail"));
        }
        let count = header
            .count
            .checked_sub(1)
            .ok_or_else(|| self.corrupt(header.this, "count is zero but a node is linked"))?;

        match prev {
            Some(mut p) => {
                p.next = rec.next;
                record::store_node(pile, &p)?;
            }
            None => header.head = rec.next,
        }
        match next {
            Some(mut n) => {
                n.prev = rec.prev;
                record::store_node(pile, &n)?;
            }
            None => header.tail = rec.prev,
        }
        header.count = count;
        record::store_list(pile, &header)
    }
}

impl<T: Serialize + DeserializeOwned> PileList<T> {
    /// Append `value`; returns the new node.
    ///
    /// Costs a fixed number of pile calls regardless of length.
    pub fn push_back(&self, value: &T) -> ListResult<PileNode<T>> {
        let pile = self.pile.as_ref();
        let mut header = self.header()?;
        let old_tail = record::follow(pile, header.this, Link::Tail, header.tail)?;

        let node = PileNode::create(
            Arc::clone(&self.pile),
            header.this,
            header.tail,
            Handle::INVALID,
            value,
        )?;
        match old_tail {
            Some(mut tail) => {
                tail.next = node.handle();
                record::store_node(pile, &tail)?;
            }
            None => header.head = node.handle(),
        }
        header.tail = node.handle();
        header.count += 1;
        record::store_list(pile, &header)?;

        debug!(list = %header.this, node = %node.handle(), count = header.count, "appended node");
        Ok(node)
    }

    /// Collection-style name for [`push_back`](Self::push_back).
    pub fn add(&self, value: &T) -> ListResult<PileNode<T>> {
        self.push_back(value)
    }

    /// Prepend `value`; returns the new node.
    pub fn push_front(&self, value: &T) -> ListResult<PileNode<T>> {
        let pile = self.pile.as_ref();
        let mut header = self.header()?;
        let old_head = record::follow(pile, header.this, Link::Head, header.head)?;

        let node = PileNode::create(
            Arc::clone(&self.pile),
            header.this,
            Handle::INVALID,
            header.head,
            value,
        )?;
        match old_head {
            Some(mut head) => {
                head.prev = node.handle();
                record::store_node(pile, &head)?;
            }
            None => header.tail = node.handle(),
        }
        header.head = node.handle();
        header.count += 1;
        record::store_list(pile, &header)?;

        debug!(list = %header.this, node = %node.handle(), count = header.count, "prepended node");
        Ok(node)
    }

    /// Unlink `node` from this list without releasing it.
    ///
    /// The node keeps its value and becomes detached; the caller decides
    /// whether to [`erase`](PileNode::erase) it. Returns `false` if the node
    /// does not belong to this list.
    pub fn detach(&self, node: &PileNode<T>) -> ListResult<bool> {
        let rec = node.record()?;
        if rec.owner != self.handle {
            return Ok(false);
        }
        self.splice_out(&rec)?;
        record::store_node(self.pile.as_ref(), &rec.detached())?;
        debug!(list = %self.handle, node = %rec.this, "detached node");
        Ok(true)
    }

    /// Copy the values into `dest` starting at `start`, head first.
    ///
    /// Fails with [`ListError::CapacityExceeded`] before writing anything if
    /// `dest` cannot hold every element from `start` on.
    pub fn copy_to(&self, dest: &mut [T], start: usize) -> ListResult<()> {
        let available = dest.len();
        let required = start.saturating_add(self.len()?);
        if required > available {
            return Err(ListError::CapacityExceeded {
                required,
                available,
            });
        }
        for (i, value) in self.iter().enumerate() {
            let slot = dest
                .get_mut(start + i)
                .ok_or(ListError::CapacityExceeded {
                    required: start + i + 1,
                    available,
                })?;
            *slot = value?;
        }
        Ok(())
    }

    /// Collect copies of every value, head first.
    pub fn to_vec(&self) -> ListResult<Vec<T>> {
        self.iter().collect()
    }
}

impl<T: Serialize + DeserializeOwned + PartialEq> PileList<T> {
    /// Returns `true` if some element equals `value`.
    pub fn contains(&self, value: &T) -> ListResult<bool> {
        Ok(self.find_record(value)?.is_some())
    }

    /// The first node whose value equals `value`.
    pub fn find(&self, value: &T) -> ListResult<Option<PileNode<T>>> {
        Ok(self
            .find_record(value)?
            .map(|rec| PileNode::from_parts(Arc::clone(&self.pile), rec.this)))
    }

    /// Remove the first element equal to `value` and release its records.
    ///
    /// Returns `false`, leaving the list untouched, if there is none.
    pub fn remove(&self, value: &T) -> ListResult<bool> {
        let Some(rec) = self.find_record(value)? else {
            return Ok(false);
        };
        self.splice_out(&rec)?;
        record::release_node(self.pile.as_ref(), &rec)?;
        debug!(list = %self.handle, node = %rec.this, "removed node");
        Ok(true)
    }

    fn find_record(&self, value: &T) -> ListResult<Option<NodeRecord>> {
        for rec in self.walk(Direction::Forward) {
            let rec = rec?;
            let candidate: T = record::load_value(self.pile.as_ref(), &rec)?;
            if candidate == *value {
                return Ok(Some(rec));
            }
        }
        Ok(None)
    }
}

impl<T> Clone for PileList<T> {
    fn clone(&self) -> Self {
        Self::from_parts(Arc::clone(&self.pile), self.handle)
    }
}

impl<T> fmt::Debug for PileList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PileList")
            .field("handle", &self.handle)
            .finish()
    }
}
