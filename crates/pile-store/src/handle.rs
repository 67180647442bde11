use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque address of a record held by a [`Pile`](crate::Pile).
///
/// A handle names a slot (`segment`, `address`) plus the `generation` the
/// slot had when the record was written. When a slot is released and later
/// reused, its generation moves on, so handles to the old record stop
/// resolving instead of silently reading the new one. A slot whose
/// generation reaches `u32::MAX` is retired rather than wrapped.
///
/// Handles are never dereferenced directly; resolve them through the pile.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle {
    segment: u32,
    address: u32,
    generation: u32,
}

impl Handle {
    /// The sentinel handle. Represents "no record".
    pub const INVALID: Self = Self {
        segment: u32::MAX,
        address: u32::MAX,
        generation: u32::MAX,
    };

    /// Build a handle from its raw parts.
    pub const fn new(segment: u32, address: u32, generation: u32) -> Self {
        Self {
            segment,
            address,
            generation,
        }
    }

    /// Returns `true` if this is the sentinel handle.
    pub fn is_invalid(&self) -> bool {
        *self == Self::INVALID
    }

    /// Returns `true` unless this is the sentinel handle.
    ///
    /// A valid-looking handle may still fail to resolve if its record has
    /// been removed.
    pub fn is_valid(&self) -> bool {
        !self.is_invalid()
    }

    /// `None` for the sentinel, `Some(self)` otherwise.
    pub fn to_option(self) -> Option<Self> {
        if self.is_invalid() {
            None
        } else {
            Some(self)
        }
    }

    /// Segment index within the pile.
    pub fn segment(&self) -> u32 {
        self.segment
    }

    /// Slot index within the segment.
    pub fn address(&self) -> u32 {
        self.address
    }

    /// Slot generation at the time the record was written.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalid() {
            write!(f, "Handle(INVALID)")
        } else {
            write!(f, "Handle({self})")
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalid() {
            write!(f, "invalid")
        } else {
            write!(f, "{}:{}@{}", self.segment, self.address, self.generation)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_invalid() {
        assert!(Handle::default().is_invalid());
        assert!(!Handle::default().is_valid());
    }

    #[test]
    fn generation_distinguishes_handles() {
        let a = Handle::new(0, 7, 1);
        let b = Handle::new(0, 7, 2);
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn option_conversion() {
        let h = Handle::new(1, 2, 3);
        assert_eq!(h.to_option(), Some(h));
        assert_eq!(Handle::INVALID.to_option(), None);
    }

    #[test]
    fn display_format() {
        assert_eq!(format!("{}", Handle::new(2, 10, 4)), "2:10@4");
        assert_eq!(format!("{}", Handle::INVALID), "invalid");
        assert_eq!(format!("{:?}", Handle::INVALID), "Handle(INVALID)");
    }

    #[test]
    fn serde_roundtrip() {
        let h = Handle::new(3, 4, 5);
        let json = serde_json::to_string(&h).unwrap();
        let parsed: Handle = serde_json::from_str(&json).unwrap();
        assert_eq!(h, parsed);
    }
}
