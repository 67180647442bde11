//! A single list element stored in a pile.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use pile_store::{Handle, Pile, PileError};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ListError, ListResult};
use crate::list::PileList;
use crate::record::{self, Link, NodeRecord};

/// Handle to one node of a [`PileList`].
///
/// A `PileNode` holds no node data itself, only the pile and the node's own
/// handle. Every accessor reads the current record from the pile, so a node
/// obtained before a list mutation still reports the links as they are now.
///
/// Values come back as copies: changing what [`value`](Self::value)
/// returned does nothing until it is written with
/// [`set_value`](Self::set_value).
///
/// Links are only changed by [`PileList`] operations.
pub struct PileNode<T> {
    pile: Arc<dyn Pile>,
    handle: Handle,
    _marker: PhantomData<fn() -> T>,
}

impl<T> PileNode<T> {
    pub(crate) fn from_parts(pile: Arc<dyn Pile>, handle: Handle) -> Self {
        Self {
            pile,
            handle,
            _marker: PhantomData,
        }
    }

    /// The handle of this node's record.
    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub(crate) fn record(&self) -> ListResult<NodeRecord> {
        record::load_node(self.pile.as_ref(), self.handle)
    }
}

impl<T: Serialize + DeserializeOwned> PileNode<T> {
    /// Persist `value` as a new, detached node.
    pub fn new(pile: Arc<dyn Pile>, value: &T) -> ListResult<Self> {
        Self::create(pile, Handle::INVALID, Handle::INVALID, Handle::INVALID, value)
    }

    /// Persist `value` as a new, detached node in the application's
    /// current pile.
    pub fn new_default(value: &T) -> ListResult<Self> {
        Self::new(pile_app::current_pile()?, value)
    }

    /// Persist `value` as a node owned by `owner` with the given neighbors.
    ///
    /// Neighbors are not updated; splicing is up to the list. If the node
    /// record cannot be written, the payload is released again.
    pub(crate) fn create(
        pile: Arc<dyn Pile>,
        owner: Handle,
        prev: Handle,
        next: Handle,
        value: &T,
    ) -> ListResult<Self> {
        let value = record::create_value(pile.as_ref(), value)?;
        let created = record::create_node(
            pile.as_ref(),
            NodeRecord {
                this: Handle::INVALID,
                prev,
                next,
                owner,
                value,
            },
        );
        match created {
            Ok(rec) => Ok(Self::from_parts(pile, rec.this)),
            Err(e) => {
                pile.remove(value)?;
                Err(e)
            }
        }
    }

    /// Attach to the node record at `handle`.
    ///
    /// Fails with [`PileError::InvalidHandle`] if the
    /// record is gone, or `UnexpectedRecord` if it is not a node.
    pub fn load(pile: Arc<dyn Pile>, handle: Handle) -> ListResult<Self> {
        record::load_node(pile.as_ref(), handle)?;
        Ok(Self::from_parts(pile, handle))
    }

    /// A copy of the node's value.
    pub fn value(&self) -> ListResult<T> {
        let rec = self.record()?;
        record::load_value(self.pile.as_ref(), &rec)
    }

    /// Overwrite the node's value.
    pub fn set_value(&self, value: &T) -> ListResult<()> {
        let mut rec = self.record()?;
        if rec.value.is_valid() {
            return match record::store_value(self.pile.as_ref(), rec.value, value) {
                Ok(()) => Ok(()),
                Err(ListError::Pile(PileError::InvalidHandle(_))) => Err(ListError::BrokenLink {
                    node: rec.this,
                    link: Link::Value,
                    target: rec.value,
                }),
                Err(e) => Err(e),
            };
        }
        rec.value = record::create_value(self.pile.as_ref(), value)?;
        record::store_node(self.pile.as_ref(), &rec)
    }

    /// The list this node belongs to, or `None` if detached.
    pub fn list(&self) -> ListResult<Option<PileList<T>>> {
        let rec = self.record()?;
        if rec.owner.is_invalid() {
            return Ok(None);
        }
        match record::load_list(self.pile.as_ref(), rec.owner) {
            Ok(_) => Ok(Some(PileList::from_parts(Arc::clone(&self.pile), rec.owner))),
            Err(ListError::Pile(PileError::InvalidHandle(_))) => {
                Err(ListError::BrokenLink {
                    node: rec.this,
                    link: Link::Owner,
                    target: rec.owner,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// The following node, or `None` at the tail.
    pub fn next(&self) -> ListResult<Option<PileNode<T>>> {
        let rec = self.record()?;
        self.neighbor(&rec, Link::Next, rec.next)
    }

    /// The preceding node, or `None` at the head.
    pub fn previous(&self) -> ListResult<Option<PileNode<T>>> {
        let rec = self.record()?;
        self.neighbor(&rec, Link::Previous, rec.prev)
    }

    /// Returns `true` if the node belongs to no list.
    pub fn is_detached(&self) -> ListResult<bool> {
        Ok(!self.record()?.is_attached())
    }

    /// Release a detached node's record and value.
    ///
    /// Fails with [`ListError::StillLinked`] while the node belongs to a
    /// list; detach it through the list first.
    pub fn erase(self) -> ListResult<()> {
        let rec = self.record()?;
        if rec.is_attached() {
            return Err(ListError::StillLinked(rec.this));
        }
        record::release_node(self.pile.as_ref(), &rec)
    }

    fn neighbor(
        &self,
        rec: &NodeRecord,
        link: Link,
        target: Handle,
    ) -> ListResult<Option<PileNode<T>>> {
        let found = record::follow(self.pile.as_ref(), rec.this, link, target)?;
        Ok(found.map(|n| PileNode::from_parts(Arc::clone(&self.pile), n.this)))
    }
}

impl<T> Clone for PileNode<T> {
    fn clone(&self) -> Self {
        Self::from_parts(Arc::clone(&self.pile), self.handle)
    }
}

impl<T> fmt::Debug for PileNode<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PileNode")
            .field("handle", &self.handle)
            .finish()
    }
}
