//! Lazy walks over a list's chain.
//!
//! Each iterator starts from the list header the first time it is polled
//! and resolves one node per step. Creating a new iterator starts a new
//! walk; iterators never share a cursor.
//!
//! Mutating the list while an iterator is live is undefined: the walk may
//! or may not observe the change, and may end in an error.

use std::marker::PhantomData;
use std::sync::Arc;

use pile_store::{Handle, Pile};
use serde::de::DeserializeOwned;

use crate::error::{ListError, ListResult};
use crate::node::PileNode;
use crate::record::{self, Link, NodeRecord};

/// Walk direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Direction {
    Forward,
    Backward,
}

#[derive(Clone, Copy, Debug)]
enum Position {
    Start,
    At {
        from: Handle,
        link: Link,
        current: Handle,
        remaining: u64,
    },
    Done,
}

/// Record-level walk shared by the public iterators. Fused after the first
/// error or the end of the chain.
pub(crate) struct Walk {
    pile: Arc<dyn Pile>,
    list: Handle,
    direction: Direction,
    position: Position,
}

impl Walk {
    pub(crate) fn new(pile: Arc<dyn Pile>, list: Handle, direction: Direction) -> Self {
        Self {
            pile,
            list,
            direction,
            position: Position::Start,
        }
    }

    fn step(&mut self) -> ListResult<Option<NodeRecord>> {
        let (from, link, current, remaining) = match self.position {
            Position::Done => return Ok(None),
            Position::Start => {
                let header = record::load_list(self.pile.as_ref(), self.list)?;
                match self.direction {
                    Direction::Forward => (header.this, Link::Head, header.head, header.count),
                    Direction::Backward => (header.this, Link::Tail, header.tail, header.count),
                }
            }
            Position::At {
                from,
                link,
                current,
                remaining,
            } => (from, link, current, remaining),
        };

        if current.is_invalid() {
            self.position = Position::Done;
            return Ok(None);
        }
        // A chain longer than the header's count is either a cycle or a
        // lost count update; stop rather than walk forever.
        if remaining == 0 {
            return Err(ListError::Corrupt {
                handle: self.list,
                reason: format!("chain continues past count at {current}"),
            });
        }

        let rec = record::follow_required(self.pile.as_ref(), from, link, current)?;
        let (link, next) = match self.direction {
            Direction::Forward => (Link::Next, rec.next),
            Direction::Backward => (Link::Previous, rec.prev),
        };
        self.position = Position::At {
            from: rec.this,
            link,
            current: next,
            remaining: remaining - 1,
        };
        Ok(Some(rec))
    }
}

impl Iterator for Walk {
    type Item = ListResult<NodeRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.step() {
            Ok(Some(rec)) => Some(Ok(rec)),
            Ok(None) => None,
            Err(e) => {
                self.position = Position::Done;
                Some(Err(e))
            }
        }
    }
}

/// Iterator over copies of a list's values. See [`PileList::iter`].
///
/// [`PileList::iter`]: crate::PileList::iter
pub struct Iter<T> {
    walk: Walk,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Iter<T> {
    pub(crate) fn new(walk: Walk) -> Self {
        Self {
            walk,
            _marker: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> Iterator for Iter<T> {
    type Item = ListResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let rec = match self.walk.next()? {
            Ok(rec) => rec,
            Err(e) => return Some(Err(e)),
        };
        let value = record::load_value(self.walk.pile.as_ref(), &rec);
        if value.is_err() {
            self.walk.position = Position::Done;
        }
        Some(value)
    }
}

/// Iterator over a list's nodes. See [`PileList::nodes`].
///
/// [`PileList::nodes`]: crate::PileList::nodes
pub struct Nodes<T> {
    walk: Walk,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Nodes<T> {
    pub(crate) fn new(walk: Walk) -> Self {
        Self {
            walk,
            _marker: PhantomData,
        }
    }
}

impl<T> Iterator for Nodes<T> {
    type Item = ListResult<PileNode<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        let pile = Arc::clone(&self.walk.pile);
        Some(
            self.walk
                .next()?
                .map(|rec| PileNode::from_parts(pile, rec.this)),
        )
    }
}

impl<T> std::iter::FusedIterator for Iter<T> where T: DeserializeOwned {}
impl<T> std::iter::FusedIterator for Nodes<T> {}
