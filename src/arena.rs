//! Bump arena owning every AST node of one compilation.
//!
//! Backed by a [`Bump`] with an allocation limit, so the tree has a hard
//! byte budget and running out is an [`ArenaError`] rather than an abort.
//! Nodes are handed out as shared references tied to the arena's lifetime.
//! Nothing is freed individually and no destructor ever runs; dropping the
//! arena releases the whole tree at once.

use std::mem::{needs_drop, size_of};

use bumpalo::Bump;

use crate::error::{ArenaError, ExhaustedSnafu};

/// Capacity used when the caller does not configure one.
pub const DEFAULT_CAPACITY: usize = 4 * 1024 * 1024;

#[derive(Debug)]
pub struct Arena {
  bump: Bump,
  capacity: usize,
}

impl Arena {
  /// Create an arena that never holds more than `capacity` bytes.
  pub fn with_capacity(capacity: usize) -> Self {
    let bump = Bump::new();
    bump.set_allocation_limit(Some(capacity));
    Self { bump, capacity }
  }

  /// Move `value` into the arena.
  pub fn alloc<T>(&self, value: T) -> Result<&T, ArenaError> {
    debug_assert!(!needs_drop::<T>());
    self.bump.try_alloc(value).map(|node| &*node).map_err(|_| {
      ExhaustedSnafu {
        requested: size_of::<T>(),
        limit: self.capacity,
      }
      .build()
    })
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Bytes taken from the system so far, chunk overhead included.
  pub fn allocated_bytes(&self) -> usize {
    self.bump.allocated_bytes()
  }

  pub fn remaining(&self) -> usize {
    self.capacity.saturating_sub(self.allocated_bytes())
  }
}

impl Default for Arena {
  fn default() -> Self {
    Self::with_capacity(DEFAULT_CAPACITY)
  }
}
