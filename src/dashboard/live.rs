//! Lists kept current from the change feed

use serde::de::DeserializeOwned;
use std::cmp::Reverse;
use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::models::{Booking, Post};
use crate::services::realtime::{ChangeEvent, ChangeKind, Table};

/// A row the dashboard can display and patch from change events
pub trait Record: Clone + DeserializeOwned {
    const TABLE: Table;
    type SortKey: Ord;

    fn id(&self) -> i64;
    fn sort_key(&self) -> Self::SortKey;
}

impl Record for Post {
    const TABLE: Table = Table::Posts;
    type SortKey = Reverse<(DateTime<Utc>, i64)>;

    fn id(&self) -> i64 {
        self.id
    }

    fn sort_key(&self) -> Self::SortKey {
        Reverse((self.updated_at, self.id))
    }
}

impl Record for Booking {
    const TABLE: Table = Table::Bookings;
    type SortKey = Reverse<(NaiveDate, NaiveTime, i64)>;

    fn id(&self) -> i64 {
        self.id
    }

    fn sort_key(&self) -> Self::SortKey {
        Reverse((self.date, self.time, self.id))
    }
}

/// Records keyed by id, kept in sort-key order
#[derive(Debug, Clone)]
pub struct LiveList<T> {
    items: Vec<T>,
}

impl<T> Default for LiveList<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Record> LiveList<T> {
    /// Build from an unordered snapshot. When an id appears more than
    /// once the last copy wins.
    pub fn new(items: Vec<T>) -> Self {
        let by_id: BTreeMap<i64, T> = items.into_iter().map(|item| (item.id(), item)).collect();
        let mut items: Vec<T> = by_id.into_values().collect();
        items.sort_by_key(|item| item.sort_key());
        Self { items }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn position(&self, id: i64) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    /// Insert or replace by id, keeping the sort order
    pub fn upsert(&mut self, item: T) {
        self.remove(item.id());
        let key = item.sort_key();
        let index = self.items.partition_point(|existing| existing.sort_key() <= key);
        self.items.insert(index, item);
    }

    /// Remove by id, returning the row and where it was
    pub fn remove(&mut self, id: i64) -> Option<(usize, T)> {
        let index = self.position(id)?;
        Some((index, self.items.remove(index)))
    }

    /// Put `item` back at `index` when that keeps the order, otherwise
    /// wherever its sort key belongs. Replaces any row with the same id.
    pub(crate) fn restore(&mut self, index: usize, item: T) {
        self.remove(item.id());
        let key = item.sort_key();
        let index = index.min(self.items.len());
        let fits_before = index == 0 || self.items[index - 1].sort_key() <= key;
        let fits_after = index == self.items.len() || key <= self.items[index].sort_key();
        if fits_before && fits_after {
            self.items.insert(index, item);
        } else {
            self.upsert(item);
        }
    }

    pub fn is_sorted(&self) -> bool {
        self.items.windows(2).all(|w| w[0].sort_key() <= w[1].sort_key())
    }

    /// Patch the list from a change event. Events for other tables are
    /// ignored. Returns whether the list changed.
    pub fn apply_change(&mut self, event: &ChangeEvent) -> bool {
        if event.table != T::TABLE {
            return false;
        }
        match event.kind {
            ChangeKind::Insert | ChangeKind::Update => {
                let Some(record) = event.record.clone() else {
                    tracing::warn!("Change event {:?} #{} has no record", event.kind, event.id);
                    return false;
                };
                match serde_json::from_value::<T>(record) {
                    Ok(item) => {
                        self.upsert(item);
                        true
                    }
                    Err(e) => {
                        tracing::warn!("Undecodable change record #{}: {}", event.id, e);
                        false
                    }
                }
            }
            ChangeKind::Delete => self.remove(event.id).is_some(),
        }
    }
}
