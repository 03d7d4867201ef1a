//! Ordered collection with membership hooks
//!
//! [`ObservableList`] backs the child and component lists of every entity.
//! Each mutation is bracketed by observer callbacks:
//!
//! 1. `adding` / `removing` run before the list changes and may veto it by
//!    returning an error
//! 2. the list is mutated
//! 3. `added` / `removed` run after the change
//!
//! Callbacks run with no internal borrow held, so an observer is free to
//! read the list it observes.

use std::cell::RefCell;
use std::fmt;

use crate::core::{EcsError, Result};

/// Callbacks invoked around list mutations. All methods default to no-ops.
pub trait ListObserver<T> {
    /// Before `item` is appended. An error leaves the list unchanged.
    fn adding(&self, _item: &T) -> Result<()> {
        Ok(())
    }

    /// After `item` was appended.
    fn added(&self, _item: &T) -> Result<()> {
        Ok(())
    }

    /// Before `item` is removed. An error leaves the list unchanged.
    fn removing(&self, _item: &T) -> Result<()> {
        Ok(())
    }

    /// After `item` was removed.
    fn removed(&self, _item: &T) -> Result<()> {
        Ok(())
    }
}

/// An ordered list that notifies an observer about every add and remove.
///
/// In distinct mode (the default) an item equal to one already present is
/// silently ignored on add; no hooks fire for it.
pub struct ObservableList<T> {
    items: RefCell<Vec<T>>,
    observer: Option<Box<dyn ListObserver<T>>>,
    distinct: bool,
}

impl<T: Clone + PartialEq> ObservableList<T> {
    /// Create an empty distinct list without an observer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: RefCell::new(Vec::new()),
            observer: None,
            distinct: true,
        }
    }

    /// Create an empty distinct list reporting to `observer`.
    #[must_use]
    pub fn with_observer(observer: impl ListObserver<T> + 'static) -> Self {
        Self {
            items: RefCell::new(Vec::new()),
            observer: Some(Box::new(observer)),
            distinct: true,
        }
    }

    /// Allow the same item to be stored more than once.
    #[must_use]
    pub fn allow_duplicates(mut self) -> Self {
        self.distinct = false;
        self
    }

    /// Whether duplicates are ignored on add.
    #[must_use]
    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    /// Append an item.
    ///
    /// Returns `Ok(false)` when the item was ignored as a duplicate.
    ///
    /// # Errors
    ///
    /// Propagates errors from the observer. An error from `adding` leaves the
    /// list unchanged; an error from `added` is reported after the item was
    /// stored.
    pub fn add(&self, item: T) -> Result<bool> {
        if self.distinct && self.contains(&item) {
            return Ok(false);
        }

        if let Some(observer) = &self.observer {
            observer.adding(&item)?;
        }
        self.items.borrow_mut().push(item.clone());
        if let Some(observer) = &self.observer {
            observer.added(&item)?;
        }
        Ok(true)
    }

    /// Append several items in order, stopping at the first error.
    ///
    /// # Errors
    ///
    /// See [`add`](Self::add).
    pub fn extend(&self, items: impl IntoIterator<Item = T>) -> Result<()> {
        for item in items {
            self.add(item)?;
        }
        Ok(())
    }

    /// Item at `index`, if any.
    #[must_use]
    pub fn at(&self, index: usize) -> Option<T> {
        self.items.borrow().get(index).cloned()
    }

    /// Position of the first item equal to `item`.
    #[must_use]
    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.items.borrow().iter().position(|x| x == item)
    }

    /// Whether `item` is in the list.
    #[must_use]
    pub fn contains(&self, item: &T) -> bool {
        self.items.borrow().contains(item)
    }

    /// First item matching the predicate.
    pub fn find(&self, mut predicate: impl FnMut(&T) -> bool) -> Option<T> {
        self.items.borrow().iter().find(|x| predicate(x)).cloned()
    }

    /// Remove the item at `index` and return it.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::IndexOutOfRange`] when `index >= len`, or an
    /// observer error.
    pub fn remove_at(&self, index: usize) -> Result<T> {
        let item = {
            let items = self.items.borrow();
            items.get(index).cloned().ok_or(EcsError::IndexOutOfRange {
                index,
                len: items.len(),
            })?
        };

        if let Some(observer) = &self.observer {
            observer.removing(&item)?;
        }
        {
            // `removing` may have reshuffled the list, so find the item again
            let mut items = self.items.borrow_mut();
            match items.get(index) {
                Some(current) if *current == item => {
                    items.remove(index);
                }
                _ => {
                    if let Some(position) = items.iter().position(|x| *x == item) {
                        items.remove(position);
                    }
                }
            }
        }
        if let Some(observer) = &self.observer {
            observer.removed(&item)?;
        }
        Ok(item)
    }

    /// Remove the first occurrence of `item`. Returns `Ok(false)` if absent.
    ///
    /// # Errors
    ///
    /// Propagates observer errors.
    pub fn remove(&self, item: &T) -> Result<bool> {
        match self.index_of(item) {
            Some(index) => self.remove_at(index).map(|_| true),
            None => Ok(false),
        }
    }

    /// Remove every item front to back, firing hooks for each.
    ///
    /// # Errors
    ///
    /// Stops at the first observer error.
    pub fn clear(&self) -> Result<()> {
        while !self.is_empty() {
            self.remove_at(0)?;
        }
        Ok(())
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Copy of the current items.
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.items.borrow().clone()
    }

    /// Iterate over a snapshot of the items.
    ///
    /// Mutating the list while iterating does not affect the iteration.
    pub fn iter(&self) -> std::vec::IntoIter<T> {
        self.snapshot().into_iter()
    }
}

impl<T: Clone + PartialEq> Default for ObservableList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for ObservableList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableList")
            .field("items", &self.items.borrow())
            .field("distinct", &self.distinct)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use proptest::prelude::*;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        log: Rc<RefCell<Vec<String>>>,
        veto: Option<u32>,
    }

    impl ListObserver<u32> for Recorder {
        fn adding(&self, item: &u32) -> Result<()> {
            if self.veto == Some(*item) {
                return Err(EcsError::custom("vetoed"));
            }
            self.log.borrow_mut().push(format!("adding {item}"));
            Ok(())
        }

        fn added(&self, item: &u32) -> Result<()> {
            self.log.borrow_mut().push(format!("added {item}"));
            Ok(())
        }

        fn removing(&self, item: &u32) -> Result<()> {
            self.log.borrow_mut().push(format!("removing {item}"));
            Ok(())
        }

        fn removed(&self, item: &u32) -> Result<()> {
            self.log.borrow_mut().push(format!("removed {item}"));
            Ok(())
        }
    }

    fn recorded_list(veto: Option<u32>) -> (ObservableList<u32>, Rc<RefCell<Vec<String>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let list = ObservableList::with_observer(Recorder {
            log: Rc::clone(&log),
            veto,
        });
        (list, log)
    }

    #[test]
    fn test_hooks_bracket_mutations() {
        let (list, log) = recorded_list(None);
        list.add(1).unwrap();
        list.remove(&1).unwrap();

        assert_eq!(
            *log.borrow(),
            vec!["adding 1", "added 1", "removing 1", "removed 1"]
        );
    }

    #[test]
    fn test_distinct_ignores_duplicate() {
        let (list, log) = recorded_list(None);
        assert!(list.add(7).unwrap());
        assert!(!list.add(7).unwrap());

        assert_eq!(list.len(), 1);
        assert_eq!(log.borrow().iter().filter(|l| *l == "added 7").count(), 1);
    }

    #[test]
    fn test_duplicates_allowed_when_not_distinct() {
        let list = ObservableList::new().allow_duplicates();
        list.add(1).unwrap();
        list.add(1).unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_adding_can_veto() {
        let (list, _) = recorded_list(Some(3));
        assert!(list.add(3).is_err());
        assert!(list.is_empty());
    }

    #[test]
    fn test_remove_at_out_of_range() {
        let list = ObservableList::new();
        list.add(1_u32).unwrap();
        let err = list.remove_at(4).unwrap_err();
        assert!(matches!(err, EcsError::IndexOutOfRange { index: 4, len: 1 }));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_remove_absent_item_is_noop() {
        let list = ObservableList::new();
        list.add(1_u32).unwrap();
        assert!(!list.remove(&2).unwrap());
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_clear_fires_removed_for_each() {
        let (list, log) = recorded_list(None);
        list.extend([1, 2, 3]).unwrap();
        log.borrow_mut().clear();
        list.clear().unwrap();

        assert!(list.is_empty());
        let removed: Vec<_> = log
            .borrow()
            .iter()
            .filter(|l| l.starts_with("removed"))
            .cloned()
            .collect();
        assert_eq!(removed, vec!["removed 1", "removed 2", "removed 3"]);
    }

    #[test]
    fn test_lookup_helpers() {
        let list = ObservableList::new();
        list.extend([10_u32, 20, 30]).unwrap();
        assert_eq!(list.at(1), Some(20));
        assert_eq!(list.at(9), None);
        assert_eq!(list.index_of(&30), Some(2));
        assert_eq!(list.find(|x| *x > 15), Some(20));
        assert_eq!(list.iter().collect::<Vec<_>>(), vec![10, 20, 30]);
    }

    proptest! {
        #[test]
        fn prop_distinct_list_never_holds_duplicates(values in proptest::collection::vec(0_u8..16, 0..64)) {
            let list = ObservableList::new();
            for value in &values {
                list.add(*value).unwrap();
            }
            let items = list.snapshot();
            let mut deduped = items.clone();
            deduped.sort_unstable();
            deduped.dedup();
            prop_assert_eq!(items.len(), deduped.len());
        }
    }
}
