//! Persisted shapes of list headers and nodes, and the helpers that move
//! them in and out of a pile.
//!
//! Every record the collections write, payloads included, is wrapped in
//! one tagged [`Record`], so a handle of the wrong kind is always told apart
//! on load.
//!
//! Records are plain copies: a loaded record is never updated behind the
//! caller's back, and a change only takes effect once it is stored again.

use std::fmt;

use pile_store::{Handle, Pile, PileError, PileExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ListError, ListResult};

/// The kinds of record the collections write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Node,
    List,
    Value,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node => write!(f, "node"),
            Self::List => write!(f, "list"),
            Self::Value => write!(f, "value"),
        }
    }
}

/// A handle-valued field of a node or list record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Link {
    /// Node to its predecessor.
    Previous,
    /// Node to its successor.
    Next,
    /// Node to the list header that owns it.
    Owner,
    /// Node to its payload.
    Value,
    /// List header to its first node.
    Head,
    /// List header to its last node.
    Tail,
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Previous => write!(f, "previous"),
            Self::Next => write!(f, "next"),
            Self::Owner => write!(f, "owner"),
            Self::Value => write!(f, "value"),
            Self::Head => write!(f, "head"),
            Self::Tail => write!(f, "tail"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct NodeRecord {
    pub this: Handle,
    pub prev: Handle,
    pub next: Handle,
    pub owner: Handle,
    pub value: Handle,
}

impl NodeRecord {
    pub fn is_attached(&self) -> bool {
        self.owner.is_valid()
    }

    /// Same node, value kept, every link cleared.
    pub fn detached(&self) -> Self {
        Self {
            prev: Handle::INVALID,
            next: Handle::INVALID,
            owner: Handle::INVALID,
            ..*self
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ListRecord {
    pub this: Handle,
    pub head: Handle,
    pub tail: Handle,
    pub count: u64,
}

impl ListRecord {
    pub fn empty(this: Handle) -> Self {
        Self {
            this,
            head: Handle::INVALID,
            tail: Handle::INVALID,
            count: 0,
        }
    }
}

#[derive(Serialize, Deserialize)]
enum Record {
    Node(NodeRecord),
    List(ListRecord),
    /// An element payload, itself encoded with [`pile_store::encode`].
    Value(Vec<u8>),
}

fn load(pile: &dyn Pile, handle: Handle, expected: RecordKind) -> ListResult<Record> {
    pile.get_value::<Record>(handle).map_err(|e| match e {
        PileError::Serialization(_) => ListError::UnexpectedRecord { handle, expected },
        other => ListError::Pile(other),
    })
}

/// Load the node record at `handle`.
pub(crate) fn load_node(pile: &dyn Pile, handle: Handle) -> ListResult<NodeRecord> {
    match load(pile, handle, RecordKind::Node)? {
        Record::Node(rec) => Ok(rec),
        _ => Err(ListError::UnexpectedRecord {
            handle,
            expected: RecordKind::Node,
        }),
    }
}

/// Load the list header at `handle`.
pub(crate) fn load_list(pile: &dyn Pile, handle: Handle) -> ListResult<ListRecord> {
    match load(pile, handle, RecordKind::List)? {
        Record::List(rec) => Ok(rec),
        _ => Err(ListError::UnexpectedRecord {
            handle,
            expected: RecordKind::List,
        }),
    }
}

/// Persist `value` as a payload record.
pub(crate) fn create_value<T: Serialize>(pile: &dyn Pile, value: &T) -> ListResult<Handle> {
    let bytes = pile_store::encode(value)?;
    Ok(pile.put_value(&Record::Value(bytes))?)
}

/// Overwrite the payload record at `handle`.
pub(crate) fn store_value<T: Serialize>(pile: &dyn Pile, handle: Handle, value: &T) -> ListResult<()> {
    let bytes = pile_store::encode(value)?;
    pile.put_value_at(handle, &Record::Value(bytes))?;
    Ok(())
}

/// Allocate a node record; the returned record has `this` filled in.
pub(crate) fn create_node(pile: &dyn Pile, mut rec: NodeRecord) -> ListResult<NodeRecord> {
    rec.this = Handle::INVALID;
    rec.this = pile.put_value(&Record::Node(rec))?;
    if let Err(e) = store_node(pile, &rec) {
        pile.remove(rec.this)?;
        return Err(e);
    }
    Ok(rec)
}

/// Allocate an empty list header.
pub(crate) fn create_list(pile: &dyn Pile) -> ListResult<ListRecord> {
    let this = pile.put_value(&Record::List(ListRecord::empty(Handle::INVALID)))?;
    let rec = ListRecord::empty(this);
    store_list(pile, &rec)?;
    Ok(rec)
}

pub(crate) fn store_node(pile: &dyn Pile, rec: &NodeRecord) -> ListResult<()> {
    pile.put_value_at(rec.this, &Record::Node(*rec))?;
    Ok(())
}

pub(crate) fn store_list(pile: &dyn Pile, rec: &ListRecord) -> ListResult<()> {
    pile.put_value_at(rec.this, &Record::List(*rec))?;
    Ok(())
}

/// Follow `link` from the record at `from` to `target`.
///
/// The sentinel resolves to `None`. Any other handle that does not resolve
/// is a broken link, never "no neighbor".
pub(crate) fn follow(
    pile: &dyn Pile,
    from: Handle,
    link: Link,
    target: Handle,
) -> ListResult<Option<NodeRecord>> {
    let Some(target) = target.to_option() else {
        return Ok(None);
    };
    match load_node(pile, target) {
        Ok(rec) => Ok(Some(rec)),
        Err(ListError::Pile(PileError::InvalidHandle(_))) => Err(ListError::BrokenLink {
            node: from,
            link,
            target,
        }),
        Err(e) => Err(e),
    }
}

/// Like [`follow`], for a link that must not be the sentinel.
pub(crate) fn follow_required(
    pile: &dyn Pile,
    from: Handle,
    link: Link,
    target: Handle,
) -> ListResult<NodeRecord> {
    follow(pile, from, link, target)?.ok_or(ListError::BrokenLink {
        node: from,
        link,
        target,
    })
}

/// Read a copy of the payload of `rec`.
pub(crate) fn load_value<T: DeserializeOwned>(pile: &dyn Pile, rec: &NodeRecord) -> ListResult<T> {
    let broken = ListError::BrokenLink {
        node: rec.this,
        link: Link::Value,
        target: rec.value,
    };
    if rec.value.is_invalid() {
        return Err(broken);
    }
    match load(pile, rec.value, RecordKind::Value) {
        Ok(Record::Value(bytes)) => Ok(pile_store::decode(&bytes)?),
        Ok(_) => Err(ListError::UnexpectedRecord {
            handle: rec.value,
            expected: RecordKind::Value,
        }),
        Err(ListError::Pile(PileError::InvalidHandle(_))) => Err(broken),
        Err(e) => Err(e),
    }
}

/// Release the node record and then its payload.
pub(crate) fn release_node(pile: &dyn Pile, rec: &NodeRecord) -> ListResult<()> {
    pile.remove(rec.this)?;
    if rec.value.is_valid() {
        pile.remove(rec.value)?;
    }
    Ok(())
}
