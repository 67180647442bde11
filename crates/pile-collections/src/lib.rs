//! Linked collections stored in a pile.
//!
//! A [`PileList`] is a doubly linked list whose header and nodes are
//! separate pile records. Nodes refer to each other only by [`Handle`]:
//! every step of a walk resolves the next handle afresh, and every link
//! change is a read, a local edit and a write-back.
//!
//! Because the pile hands out copies, nothing here ever aliases stored
//! data. A stored link that no longer resolves is reported as
//! [`ListError::BrokenLink`] and aborts the operation; it is never taken to
//! mean "end of list".
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use pile_collections::PileList;
//! use pile_store::{InMemoryPile, Pile};
//!
//! let pile: Arc<dyn Pile> = Arc::new(InMemoryPile::new());
//! let list = PileList::new(pile).unwrap();
//! list.add(&1).unwrap();
//! list.add(&2).unwrap();
//! list.add(&3).unwrap();
//! assert!(list.remove(&2).unwrap());
//! assert_eq!(list.to_vec().unwrap(), vec![1, 3]);
//! ```
//!
//! [`Handle`]: pile_store::Handle

pub mod error;
pub mod iter;
pub mod list;
pub mod node;
pub mod record;

pub use error::{ListError, ListResult};
pub use iter::{Iter, Nodes};
pub use list::PileList;
pub use node::PileNode;
pub use record::{Link, RecordKind};
