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

//! Generational arena storage for renderer resources.
//!
//! Handles are a slot index plus a generation counter; a handle whose
//! generation no longer matches its slot resolves to nothing, so stale
//! handles are detected instead of reaching freed or reused storage.
//!
//! Destruction is deferred: retiring an entry removes it from the active set
//! immediately (the Zombie state) but parks the value in a frame-stamped
//! retire queue. The queue is drained at a frame boundary once no in-flight
//! frame can still reference the entry, at which point the backend frees the
//! native objects.

/// An opaque handle into an [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    /// Returns the slot index of the handle.
    #[inline]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Returns the generation of the handle.
    #[inline]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

macro_rules! typed_handle {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub(crate) Handle);

        impl $name {
            /// Returns the underlying untyped handle.
            #[inline]
            pub const fn raw(&self) -> Handle {
                self.0
            }
        }
    };
}

typed_handle! {
    /// A handle to a texture resource.
    TextureHandle
}
typed_handle! {
    /// A handle to a shader resource.
    ShaderHandle
}
typed_handle! {
    /// A handle to a blend-state resource.
    BlendStateHandle
}
typed_handle! {
    /// A handle to a buffer resource.
    BufferHandle
}
typed_handle! {
    /// A handle to a mesh-buffer resource.
    MeshBufferHandle
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

#[derive(Debug)]
struct Retired<T> {
    value: T,
    slot: u32,
    frame: u64,
}

/// A generational arena with deferred, frame-stamped destruction.
#[derive(Debug)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    retired: Vec<Retired<T>>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            retired: Vec::new(),
        }
    }

    /// Inserts a value and returns its handle.
    pub fn insert(&mut self, value: T) -> Handle {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            Handle {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                value: Some(value),
            });
            Handle {
                index,
                generation: 0,
            }
        }
    }

    /// Resolves a handle, returning `None` for stale or retired handles.
    pub fn get(&self, handle: Handle) -> Option<&T> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_ref()
    }

    /// Removes the entry from the active set and parks it in the retire
    /// queue stamped with `frame`. The handle resolves to `None` from this
    /// point on. Returns `false` for a stale handle.
    pub fn retire(&mut self, handle: Handle, frame: u64) -> bool {
        let Some(slot) = self.slots.get_mut(handle.index as usize) else {
            return false;
        };
        if slot.generation != handle.generation {
            return false;
        }
        let Some(value) = slot.value.take() else {
            return false;
        };
        self.retired.push(Retired {
            value,
            slot: handle.index,
            frame,
        });
        true
    }

    /// Drains every retired entry stamped at or before `frame`, bumping the
    /// slot generation and returning the slot to the free list. The freed
    /// value and its original handle are passed to `on_free` so the caller
    /// can release native objects.
    pub fn drain_retired(&mut self, frame: u64, mut on_free: impl FnMut(Handle, T)) {
        let mut index = 0;
        while index < self.retired.len() {
            if self.retired[index].frame <= frame {
                let entry = self.retired.swap_remove(index);
                let slot = &mut self.slots[entry.slot as usize];
                let handle = Handle {
                    index: entry.slot,
                    generation: slot.generation,
                };
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(entry.slot);
                on_free(handle, entry.value);
            } else {
                index += 1;
            }
        }
    }

    /// Returns the number of entries waiting in the retire queue.
    pub fn retired_len(&self) -> usize {
        self.retired.len()
    }

    /// Iterates over the active entries with their handles.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value.as_ref().map(|value| {
                (
                    Handle {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    value,
                )
            })
        })
    }

    /// Returns the number of active entries.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.value.is_some()).count()
    }

    /// Returns `true` when there are no active entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let mut arena = Arena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");

        assert_eq!(arena.get(a), Some(&"a"));
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn retired_handles_resolve_to_none_immediately() {
        let mut arena = Arena::new();
        let a = arena.insert("a");

        assert!(arena.retire(a, 1));
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.retired_len(), 1);
        // Retiring again is a no-op on a stale handle.
        assert!(!arena.retire(a, 1));
    }

    #[test]
    fn drain_respects_frame_stamp() {
        let mut arena = Arena::new();
        let a = arena.insert("a");
        arena.retire(a, 5);

        let mut freed = Vec::new();
        arena.drain_retired(4, |handle, value| freed.push((handle, value)));
        assert!(freed.is_empty(), "frame 5 is still in flight");

        arena.drain_retired(5, |handle, value| freed.push((handle, value)));
        assert_eq!(freed.len(), 1);
        assert_eq!(freed[0].0, a);
        assert_eq!(freed[0].1, "a");
    }

    #[test]
    fn generation_detects_slot_reuse() {
        let mut arena = Arena::new();
        let a = arena.insert("a");
        arena.retire(a, 0);
        arena.drain_retired(0, |_, _| {});

        let b = arena.insert("b");
        // The slot is reused, the generation is not.
        assert_eq!(b.index(), a.index());
        assert_ne!(b.generation(), a.generation());
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.get(b), Some(&"b"));
    }

    #[test]
    fn iter_skips_retired_entries() {
        let mut arena = Arena::new();
        let _a = arena.insert(1);
        let b = arena.insert(2);
        arena.retire(b, 0);

        let values: Vec<i32> = arena.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![1]);
    }
}
