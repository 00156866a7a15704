//! Optimistic edits
//!
//! A change is applied to the local list before the server confirms it.
//! The returned [`PendingChange`] remembers the previous row so a failed
//! request can put it back exactly where it was.

use std::future::Future;

use crate::dashboard::live::{LiveList, Record};
use crate::services::realtime::ChangeEvent;

/// Local edit to apply ahead of the server
pub enum Mutation<T> {
    Update(Box<dyn FnOnce(&mut T) + Send>),
    Remove,
}

impl<T> Mutation<T> {
    pub fn update(f: impl FnOnce(&mut T) + Send + 'static) -> Self {
        Mutation::Update(Box::new(f))
    }
}

/// Token for an applied, unconfirmed change
#[must_use = "a pending change must be committed or rolled back"]
#[derive(Debug)]
pub struct PendingChange<T> {
    id: i64,
    previous: T,
    position: usize,
    removed: bool,
}

impl<T> PendingChange<T> {
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn previous(&self) -> &T {
        &self.previous
    }
}

#[derive(Debug, Clone)]
pub struct OptimisticList<T> {
    list: LiveList<T>,
}

impl<T> Default for OptimisticList<T> {
    fn default() -> Self {
        Self {
            list: LiveList::default(),
        }
    }
}

impl<T: Record> OptimisticList<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            list: LiveList::new(items),
        }
    }

    pub fn items(&self) -> &[T] {
        self.list.items()
    }

    pub fn get(&self, id: i64) -> Option<&T> {
        self.list.get(id)
    }

    pub fn apply_change(&mut self, event: &ChangeEvent) -> bool {
        self.list.apply_change(event)
    }

    /// Apply `mutation` locally. `None` when no row has this id.
    ///
    /// An update may change the row's sort key, so the edited row is
    /// re-inserted at its sorted position.
    pub fn begin(&mut self, id: i64, mutation: Mutation<T>) -> Option<PendingChange<T>> {
        let (position, previous) = self.list.remove(id)?;

        let removed = match mutation {
            Mutation::Update(f) => {
                let mut edited = previous.clone();
                f(&mut edited);
                self.list.upsert(edited);
                false
            }
            Mutation::Remove => true,
        };

        Some(PendingChange {
            id,
            previous,
            position,
            removed,
        })
    }

    /// The server accepted the change
    pub fn commit(&mut self, change: PendingChange<T>) {
        drop(change);
    }

    /// The server rejected the change: restore the previous row where it was
    pub fn rollback(&mut self, change: PendingChange<T>) {
        let PendingChange {
            id,
            previous,
            position,
            removed,
        } = change;

        // A delete from the feed since `begin` wins over the rollback
        if !removed && self.list.position(id).is_none() {
            return;
        }
        self.list.restore(position, previous);
    }

    /// Apply locally, await the remote call, then commit or roll back.
    ///
    /// Unknown ids skip the local step and only run the remote call.
    pub async fn run<R, E, Fut>(&mut self, id: i64, mutation: Mutation<T>, remote: Fut) -> Result<R, E>
    where
        Fut: Future<Output = Result<R, E>>,
    {
        let pending = self.begin(id, mutation);
        let result = remote.await;
        if let Some(change) = pending {
            match &result {
                Ok(_) => self.commit(change),
                Err(_) => {
                    tracing::debug!("Rolling back optimistic change to #{}", change.id());
                    self.rollback(change);
                }
            }
        }
        result
    }
}
