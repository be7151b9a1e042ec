// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The generic double-buffered pending/committed staging container.
//!
//! Every renderer resource stages mutations from the logic thread into a
//! pending snapshot and exposes exactly one commit point through which the
//! render thread promotes the pending snapshot to the committed one. All
//! access goes through a single per-resource mutex; lock hold times are
//! bounded (validation plus a memory copy), and backend GPU calls happen
//! outside the lock.

use crate::merle_bitflags;
use std::sync::Mutex;

merle_bitflags! {
    /// Marks which aspects of a resource changed since the last backend sync.
    pub struct DirtyFlags: u32 {
        /// Scalar parameters changed (size, flags, formats, clear values).
        const PARAMETERS = 1 << 0;
        /// Bulk payload changed (pixel levels, byte buffers, program sources).
        const DATA = 1 << 1;
    }
}

impl DirtyFlags {
    /// All aspects dirty.
    pub const ALL: Self = Self {
        bits: Self::PARAMETERS.bits | Self::DATA.bits,
    };
}

struct StagedInner<T> {
    pending: T,
    committed: T,
    /// Aspects staged since the last commit.
    pending_dirty: DirtyFlags,
    /// Aspects committed but not yet synchronized with the backend. Stays
    /// set across a failed backend sync so the next frame retries from the
    /// last good committed snapshot.
    committed_dirty: DirtyFlags,
}

/// A double-buffered value with a single explicit commit point.
///
/// The lifecycle per aspect is: **Unmodified → Dirty** ([`Staged::stage`]) **→
/// Committed** ([`Staged::commit`]) **→ Backend-Synced**
/// ([`Staged::mark_synced`]) **→ Unmodified**.
pub struct Staged<T> {
    inner: Mutex<StagedInner<T>>,
}

impl<T: Clone> Staged<T> {
    /// Creates a new staged value; both sides start equal and clean.
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(StagedInner {
                pending: value.clone(),
                committed: value,
                pending_dirty: DirtyFlags::EMPTY,
                committed_dirty: DirtyFlags::EMPTY,
            }),
        }
    }

    /// Mutates the pending snapshot under the lock and accumulates `dirty`.
    ///
    /// When `mutate` returns an error the dirty flags are left untouched, so
    /// a rejected mutation stages nothing; callers must validate before
    /// modifying the snapshot.
    pub fn stage<R, E>(
        &self,
        dirty: DirtyFlags,
        mutate: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Result<R, E> {
        let mut inner = self.inner.lock().unwrap();
        let result = mutate(&mut inner.pending)?;
        inner.pending_dirty |= dirty;
        Ok(result)
    }

    /// The single commit point: folds the staged dirty mask into the
    /// committed one and, when anything is dirty, promotes the pending
    /// snapshot to committed.
    ///
    /// Returns a clone of the committed snapshot together with the aspects
    /// awaiting backend synchronization, or `None` when nothing changed
    /// since the last successful sync (making repeated calls no-ops). The
    /// caller performs backend work on the returned snapshot outside the
    /// lock and then calls [`Staged::mark_synced`] on success.
    pub fn commit(&self) -> Option<(T, DirtyFlags)> {
        let mut inner = self.inner.lock().unwrap();
        let pending_dirty = inner.pending_dirty;
        inner.committed_dirty |= pending_dirty;
        inner.pending_dirty = DirtyFlags::EMPTY;

        if inner.committed_dirty.is_empty() {
            return None;
        }

        if !pending_dirty.is_empty() {
            inner.committed = inner.pending.clone();
        }
        Some((inner.committed.clone(), inner.committed_dirty))
    }

    /// Clears the committed dirty mask after a successful backend sync.
    pub fn mark_synced(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.committed_dirty = DirtyFlags::EMPTY;
    }

    /// Returns `true` when aspects are committed but not yet backend-synced.
    pub fn awaiting_sync(&self) -> bool {
        !self.inner.lock().unwrap().committed_dirty.is_empty()
    }

    /// Returns `true` when mutations are staged but not yet committed.
    pub fn has_pending_changes(&self) -> bool {
        !self.inner.lock().unwrap().pending_dirty.is_empty()
    }

    /// Reads the pending snapshot under the lock.
    pub fn read_pending<R>(&self, read: impl FnOnce(&T) -> R) -> R {
        read(&self.inner.lock().unwrap().pending)
    }

    /// Reads the committed snapshot under the lock.
    pub fn read_committed<R>(&self, read: impl FnOnce(&T) -> R) -> R {
        read(&self.inner.lock().unwrap().committed)
    }
}

impl<T: Clone + Default> Default for Staged<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + std::fmt::Debug> std::fmt::Debug for Staged<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("Staged")
            .field("pending_dirty", &inner.pending_dirty)
            .field("committed_dirty", &inner.committed_dirty)
            .field("committed", &inner.committed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type NoError = std::convert::Infallible;

    fn stage_value(staged: &Staged<u32>, value: u32) {
        staged
            .stage::<_, NoError>(DirtyFlags::DATA, |pending| {
                *pending = value;
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn commit_promotes_pending_once() {
        let staged = Staged::new(0u32);
        stage_value(&staged, 7);

        let (value, dirty) = staged.commit().expect("first commit sees the change");
        assert_eq!(value, 7);
        assert!(dirty.contains(DirtyFlags::DATA));
        staged.mark_synced();

        assert!(staged.commit().is_none(), "second commit is a no-op");
    }

    #[test]
    fn failed_sync_keeps_committed_dirty() {
        let staged = Staged::new(0u32);
        stage_value(&staged, 7);

        assert!(staged.commit().is_some());
        // Backend sync failed: mark_synced is not called.
        assert!(staged.awaiting_sync());

        // The next frame retries with the same committed snapshot.
        let (value, dirty) = staged.commit().expect("retry sees committed dirty");
        assert_eq!(value, 7);
        assert!(dirty.contains(DirtyFlags::DATA));
    }

    #[test]
    fn staging_is_last_write_wins() {
        let staged = Staged::new(0u32);
        stage_value(&staged, 1);
        stage_value(&staged, 2);
        stage_value(&staged, 3);

        let (value, _) = staged.commit().unwrap();
        assert_eq!(value, 3);
    }

    #[test]
    fn rejected_mutation_stages_nothing() {
        let staged = Staged::new(0u32);
        let result = staged.stage::<(), &str>(DirtyFlags::DATA, |_| Err("rejected"));
        assert!(result.is_err());
        assert!(!staged.has_pending_changes());
        assert!(staged.commit().is_none());
    }

    #[test]
    fn dirty_masks_accumulate_across_stages() {
        let staged = Staged::new(0u32);
        staged
            .stage::<_, NoError>(DirtyFlags::PARAMETERS, |_| Ok(()))
            .unwrap();
        stage_value(&staged, 5);

        let (_, dirty) = staged.commit().unwrap();
        assert_eq!(dirty, DirtyFlags::ALL);
    }

    #[test]
    fn committed_reads_lag_until_commit() {
        let staged = Staged::new(1u32);
        stage_value(&staged, 2);
        assert_eq!(staged.read_pending(|v| *v), 2);
        assert_eq!(staged.read_committed(|v| *v), 1);

        staged.commit();
        assert_eq!(staged.read_committed(|v| *v), 2);
    }
}
