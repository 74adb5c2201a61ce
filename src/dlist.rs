// Copyright 2025 larder Project Authors
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

//! An intrusive doubly-linked ordering list.
//!
//! The list links entries through a [`DlistLink`] embedded in the entry
//! itself, so ordering updates never allocate and removal is O(1) given the
//! entry pointer. The front of the list holds the newest entry, the back the
//! oldest.

use std::{marker::PhantomData, ptr::NonNull};

/// The link embedded into every listed item.
#[derive(Debug, Default)]
pub struct DlistLink {
    prev: Option<NonNull<DlistLink>>,
    next: Option<NonNull<DlistLink>>,
    is_linked: bool,
}

impl DlistLink {
    /// Whether the link is currently attached to a list.
    pub fn is_linked(&self) -> bool {
        self.is_linked
    }
}

unsafe impl Send for DlistLink {}
unsafe impl Sync for DlistLink {}

/// Converts between item pointers and their embedded link pointers.
///
/// # Safety
///
/// `item2link` and `link2item` MUST be exact inverses, both resolving to the
/// same [`DlistLink`] field of the item.
pub unsafe trait Adapter {
    /// The listed item type.
    type Item;

    /// Resolve the embedded link of an item.
    ///
    /// # Safety
    ///
    /// `item` MUST point to a live item.
    unsafe fn item2link(item: NonNull<Self::Item>) -> NonNull<DlistLink>;

    /// Recover the item holding a link.
    ///
    /// # Safety
    ///
    /// `link` MUST point to the link embedded in a live item.
    unsafe fn link2item(link: NonNull<DlistLink>) -> NonNull<Self::Item>;
}

/// Intrusive doubly-linked list over items described by adapter `A`.
///
/// The list never owns its items; callers allocate and free them.
pub struct Dlist<A>
where
    A: Adapter,
{
    head: Option<NonNull<DlistLink>>,
    tail: Option<NonNull<DlistLink>>,

    len: usize,

    _marker: PhantomData<A>,
}

unsafe impl<A> Send for Dlist<A> where A: Adapter {}
unsafe impl<A> Sync for Dlist<A> where A: Adapter {}

impl<A> Dlist<A>
where
    A: Adapter,
{
    /// Create an empty list.
    pub fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
            _marker: PhantomData,
        }
    }

    /// Get the length of the list.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Link an item at the front of the list.
    ///
    /// # Safety
    ///
    /// `item` MUST be live and not linked in any list.
    pub unsafe fn push_front(&mut self, item: NonNull<A::Item>) {
        let mut link = A::item2link(item);
        debug_assert!(!link.as_ref().is_linked());

        link.as_mut().prev = None;
        link.as_mut().next = self.head;
        if let Some(mut head) = self.head {
            head.as_mut().prev = Some(link);
        }
        self.head = Some(link);
        if self.tail.is_none() {
            self.tail = Some(link);
        }

        link.as_mut().is_linked = true;
        self.len += 1;
    }

    /// Unlink an item.
    ///
    /// # Safety
    ///
    /// `item` MUST be linked in this list.
    pub unsafe fn remove(&mut self, item: NonNull<A::Item>) {
        let mut link = A::item2link(item);
        debug_assert!(link.as_ref().is_linked());

        let prev = link.as_ref().prev;
        let next = link.as_ref().next;
        match prev {
            Some(mut prev) => prev.as_mut().next = next,
            None => self.head = next,
        }
        match next {
            Some(mut next) => next.as_mut().prev = prev,
            None => self.tail = prev,
        }

        link.as_mut().prev = None;
        link.as_mut().next = None;
        link.as_mut().is_linked = false;
        self.len -= 1;
    }

    /// Move a linked item to the front. No-op if it already is the front.
    ///
    /// # Safety
    ///
    /// `item` MUST be linked in this list.
    pub unsafe fn move_to_front(&mut self, item: NonNull<A::Item>) {
        let link = A::item2link(item);
        if self.head == Some(link) {
            return;
        }
        self.remove(item);
        self.push_front(item);
    }

    /// Get the last (oldest) item of the list.
    pub fn back(&self) -> Option<NonNull<A::Item>> {
        self.tail.map(|link| unsafe { A::link2item(link) })
    }

    /// Unlink and return the last (oldest) item of the list.
    pub fn pop_back(&mut self) -> Option<NonNull<A::Item>> {
        let item = self.back()?;
        unsafe { self.remove(item) };
        Some(item)
    }

    /// Iterate the list from the back (oldest) to the front (newest).
    pub fn iter_back(&self) -> BackIter<'_, A> {
        BackIter {
            link: self.tail,
            _list: PhantomData,
        }
    }

    /// Unlink every item and reset the list. Items are not freed.
    ///
    /// # Safety
    ///
    /// Every linked item MUST still be live.
    pub unsafe fn clear(&mut self) {
        let mut cur = self.head;
        while let Some(mut link) = cur {
            cur = link.as_ref().next;
            link.as_mut().prev = None;
            link.as_mut().next = None;
            link.as_mut().is_linked = false;
        }
        self.head = None;
        self.tail = None;
        self.len = 0;
    }
}

impl<A> Default for Dlist<A>
where
    A: Adapter,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Back-to-front item pointer iterator.
pub struct BackIter<'a, A>
where
    A: Adapter,
{
    link: Option<NonNull<DlistLink>>,
    _list: PhantomData<&'a Dlist<A>>,
}

impl<'a, A> Iterator for BackIter<'a, A>
where
    A: Adapter,
{
    type Item = NonNull<A::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let link = self.link?;
        self.link = unsafe { link.as_ref().prev };
        Some(unsafe { A::link2item(link) })
    }
}
