// Lazily materialized sequences
//
// Each element is either resolved or a placeholder key. Placeholders are
// resolved through a loader on first access and replaced in place. Slots
// live in shared cells, so a slice resolves the same objects as the list
// it was cut from.

use crate::core::error::{RhdError, Result};
use crate::core::format::GroupKind;
use crate::core::model::GroupMember;
use std::cell::RefCell;
use std::fmt;
use std::ops::Range;
use std::rc::Rc;

/// What a placeholder needs to be loaded later.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LazyKey {
    /// The analog signal of one channel group.
    Signal(GroupKind),
    /// The events of one digital input, by native order.
    Events { native_order: i32 },
}

impl fmt::Display for LazyKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LazyKey::Signal(kind) => write!(f, "signal {}", kind),
            LazyKey::Events { native_order } => write!(f, "events of digital input {}", native_order),
        }
    }
}

impl GroupMember for LazyKey {
    fn channel_group(&self) -> GroupKind {
        match self {
            LazyKey::Signal(kind) => *kind,
            LazyKey::Events { .. } => GroupKind::DigitalIn,
        }
    }
}

/// Single-item resolution entry point used by `LazyList`.
pub trait LazyLoader<T> {
    /// `lazy` is the mode the owning container was read with.
    fn load_lazy(&self, key: &LazyKey, lazy: bool) -> Result<T>;
}

#[derive(Debug)]
pub enum Slot<T> {
    Resolved(Rc<T>),
    Pending(LazyKey),
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        match self {
            Slot::Resolved(item) => Slot::Resolved(Rc::clone(item)),
            Slot::Pending(key) => Slot::Pending(key.clone()),
        }
    }
}

impl<T> From<T> for Slot<T> {
    fn from(item: T) -> Self {
        Slot::Resolved(Rc::new(item))
    }
}

pub struct LazyList<T> {
    slots: Vec<Rc<RefCell<Slot<T>>>>,
    lazy: bool,
    loader: Option<Rc<dyn LazyLoader<T>>>,
}

impl<T> LazyList<T> {
    /// A list without a loader; pending items in it cannot be resolved.
    pub fn new(lazy: bool) -> Self {
        Self {
            slots: Vec::new(),
            lazy,
            loader: None,
        }
    }

    pub fn with_loader(loader: Rc<dyn LazyLoader<T>>, lazy: bool) -> Self {
        Self {
            slots: Vec::new(),
            lazy,
            loader: Some(loader),
        }
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn out_of_range(&self, index: usize) -> RhdError {
        RhdError::IndexOutOfRange {
            index,
            len: self.slots.len(),
        }
    }

    /// Returns item `index`, loading and memoizing it if it is a placeholder.
    pub fn get(&self, index: usize) -> Result<Rc<T>> {
        let cell = self.slots.get(index).ok_or_else(|| self.out_of_range(index))?;
        let key = match &*cell.borrow() {
            Slot::Resolved(item) => return Ok(Rc::clone(item)),
            Slot::Pending(key) => key.clone(),
        };

        let loader = self.loader.as_ref().ok_or_else(|| RhdError::Unresolvable {
            key: key.to_string(),
            reason: "no loader attached".to_string(),
        })?;
        let item = Rc::new(loader.load_lazy(&key, self.lazy)?);
        *cell.borrow_mut() = Slot::Resolved(Rc::clone(&item));
        Ok(item)
    }

    /// Current state of slot `index`, without resolving it.
    pub fn slot(&self, index: usize) -> Option<Slot<T>> {
        self.slots.get(index).map(|cell| cell.borrow().clone())
    }

    pub fn is_resolved(&self, index: usize) -> bool {
        matches!(self.slot(index), Some(Slot::Resolved(_)))
    }

    pub fn pending_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|cell| matches!(&*cell.borrow(), Slot::Pending(_)))
            .count()
    }

    /// A lazy view over `range` that shares slots with this list.
    pub fn slice(&self, range: Range<usize>) -> Result<LazyList<T>> {
        if range.start > range.end {
            return Err(self.out_of_range(range.start));
        }
        let slots = self
            .slots
            .get(range.clone())
            .ok_or_else(|| self.out_of_range(range.end))?;
        Ok(Self {
            slots: slots.to_vec(),
            lazy: self.lazy,
            loader: self.loader.clone(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<Rc<T>>> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }

    pub fn resolve_all(&self) -> Result<Vec<Rc<T>>> {
        self.iter().collect()
    }

    pub fn push(&mut self, slot: impl Into<Slot<T>>) {
        self.slots.push(Rc::new(RefCell::new(slot.into())));
    }

    pub fn push_pending(&mut self, key: LazyKey) {
        self.push(Slot::Pending(key));
    }

    pub fn insert(&mut self, index: usize, slot: impl Into<Slot<T>>) -> Result<()> {
        if index > self.slots.len() {
            return Err(self.out_of_range(index));
        }
        self.slots.insert(index, Rc::new(RefCell::new(slot.into())));
        Ok(())
    }

    /// Replaces slot `index` in this list only; slices keep the old slot.
    pub fn set(&mut self, index: usize, slot: impl Into<Slot<T>>) -> Result<()> {
        if index >= self.slots.len() {
            return Err(self.out_of_range(index));
        }
        self.slots[index] = Rc::new(RefCell::new(slot.into()));
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<Slot<T>> {
        if index >= self.slots.len() {
            return Err(self.out_of_range(index));
        }
        let cell = self.slots.remove(index);
        let slot = cell.borrow().clone();
        Ok(slot)
    }

    pub fn reverse(&mut self) {
        self.slots.reverse();
    }

    pub fn extend<I, S>(&mut self, slots: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<Slot<T>>,
    {
        for slot in slots {
            self.push(slot);
        }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

impl<T: GroupMember> LazyList<T> {
    /// Group of item `index`, from the item or its key; never resolves.
    pub fn group_at(&self, index: usize) -> Option<GroupKind> {
        self.slots.get(index).map(|cell| match &*cell.borrow() {
            Slot::Resolved(item) => item.channel_group(),
            Slot::Pending(key) => key.channel_group(),
        })
    }

    pub fn groups(&self) -> Vec<GroupKind> {
        (0..self.len()).filter_map(|i| self.group_at(i)).collect()
    }
}

/// Clones share slots, like a full-range slice.
impl<T> Clone for LazyList<T> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
            lazy: self.lazy,
            loader: self.loader.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for LazyList<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<LazyList lazy={}>", self.lazy)?;
        f.debug_list()
            .entries(self.slots.iter().map(|cell| cell.borrow().clone()))
            .finish()
    }
}
