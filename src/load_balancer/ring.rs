//! Fixed-capacity rotating ring of worker identities.
//!
//! `get_next` hands out the head and requeues it at the tail in one step
//! under the ring lock, so N consecutive calls visit every member exactly
//! once no matter how many tasks issue them. It is a visiting rotation, not a
//! lease: the same member may be handed to another caller while still in use.

use std::collections::VecDeque;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, Notify};

/// Errors raised by ring operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RingError {
    #[error("ring capacity must be at least 1")]
    ZeroCapacity,

    #[error("ring of capacity {capacity} seeded with {seeded} members")]
    SeedMismatch { capacity: usize, seeded: usize },

    #[error("ring is full ({capacity} members)")]
    Full { capacity: usize },

    #[error("no worker obtained before the wait was cancelled")]
    Unavailable,

    #[error("ring is locked by another caller")]
    Contended,

    #[error("ring has no members")]
    Empty,
}

/// A ring of `capacity` members with serialized access.
#[derive(Debug)]
pub struct WorkerRing<T> {
    capacity: usize,
    members: Mutex<VecDeque<T>>,
    refilled: Notify,
}

impl<T: Clone> WorkerRing<T> {
    /// Create a ring seeded with exactly `capacity` members.
    pub fn new(capacity: usize, seed: impl IntoIterator<Item = T>) -> Result<Self, RingError> {
        if capacity == 0 {
            return Err(RingError::ZeroCapacity);
        }
        let members: VecDeque<T> = seed.into_iter().collect();
        if members.len() != capacity {
            return Err(RingError::SeedMismatch {
                capacity,
                seeded: members.len(),
            });
        }
        Ok(Self {
            capacity,
            members: Mutex::new(members),
            refilled: Notify::new(),
        })
    }

    /// Create a ring whose capacity is the number of members given.
    pub fn from_members(members: Vec<T>) -> Result<Self, RingError> {
        Self::new(members.len(), members)
    }

    /// Fixed capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn len(&self) -> usize {
        self.members.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.members.lock().await.is_empty()
    }

    pub async fn contains(&self, member: &T) -> bool
    where
        T: PartialEq,
    {
        self.members.lock().await.contains(member)
    }

    /// Members in rotation order, head first.
    pub async fn snapshot(&self) -> Vec<T> {
        self.members.lock().await.iter().cloned().collect()
    }

    /// Return a member to the tail. Fails once the ring is at capacity.
    pub async fn add(&self, member: T) -> Result<(), RingError> {
        let mut members = self.members.lock().await;
        if members.len() >= self.capacity {
            return Err(RingError::Full {
                capacity: self.capacity,
            });
        }
        members.push_back(member);
        drop(members);
        self.refilled.notify_waiters();
        Ok(())
    }

    /// Remove one occurrence of `member`.
    pub async fn remove(&self, member: &T) -> bool
    where
        T: PartialEq,
    {
        let mut members = self.members.lock().await;
        match members.iter().position(|m| m == member) {
            Some(index) => {
                members.remove(index);
                true
            }
            None => false,
        }
    }

    /// Take every member out of the ring, head first.
    pub async fn drain(&self) -> Vec<T> {
        self.members.lock().await.drain(..).collect()
    }

    /// Hand out the head and requeue it at the tail.
    ///
    /// Waits for the lock, and for a member if the ring was drained. Dropping
    /// the returned future at any point leaves the ring untouched.
    pub async fn get_next(&self) -> T {
        loop {
            let refilled = self.refilled.notified();
            tokio::pin!(refilled);
            refilled.as_mut().enable();

            if let Some(member) = Self::rotate(&mut *self.members.lock().await) {
                return member;
            }
            refilled.await;
        }
    }

    /// `get_next`, giving up with `Unavailable` after `timeout`.
    pub async fn get_next_within(&self, timeout: Duration) -> Result<T, RingError> {
        tokio::time::timeout(timeout, self.get_next())
            .await
            .map_err(|_| {
                tracing::warn!(timeout_ms = timeout.as_millis() as u64, "Gave up waiting for the worker ring");
                RingError::Unavailable
            })
    }

    /// `get_next` without waiting.
    pub fn try_get_next(&self) -> Result<T, RingError> {
        let mut members = self.members.try_lock().map_err(|_| RingError::Contended)?;
        Self::rotate(&mut members).ok_or(RingError::Empty)
    }

    fn rotate(members: &mut VecDeque<T>) -> Option<T> {
        if members.is_empty() {
            return None;
        }
        members.rotate_left(1);
        members.back().cloned()
    }
}
