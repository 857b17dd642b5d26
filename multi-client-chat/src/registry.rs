//! Fixed-capacity table of connected sessions.
//!
//! The registry is an arena of slots. Free slots are tracked in an ordered
//! free list so `add` always takes the lowest free index, which keeps `/list`
//! output in a stable order. The registry is generic over the connection
//! handle so the bookkeeping can be exercised without real sockets.

use std::{collections::BTreeSet, fmt};

use thiserror::Error;

/// Longest display name accepted by [`Registry::rename`], in characters.
pub const MAX_NAME_LEN: usize = 20;

/// Default number of concurrently connected sessions.
pub const DEFAULT_MAX_CLIENTS: usize = 100;

/// Process-unique session identifier. Never reused, so an event carrying a
/// removed id can not reach whichever session later occupies the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
pub struct Session<H> {
    pub id: SessionId,
    pub name: String,
    pub handle: H,
}

/// Returned by [`Registry::add`] when every slot is taken. Carries the
/// handle back so the caller can notify and close the connection.
#[derive(Debug)]
pub struct RegistryFull<H>(pub H);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenameError {
    #[error("Invalid username length")]
    InvalidLength,
    #[error("Username already taken")]
    Taken,
    #[error("Unknown session")]
    UnknownSession,
}

pub struct Registry<H> {
    slots: Vec<Option<Session<H>>>,
    free: BTreeSet<usize>,
    next_id: u64,
}

impl<H> Registry<H> {
    pub fn with_capacity(max_clients: usize) -> Self {
        Self {
            slots: (0..max_clients).map(|_| None).collect(),
            free: (0..max_clients).collect(),
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.len() == self.slots.len()
    }

    /// Registers a connection in the lowest free slot and assigns it the
    /// default name `User<id>`.
    pub fn add(&mut self, handle: H) -> Result<&Session<H>, RegistryFull<H>> {
        let Some(slot) = self.free.pop_first() else {
            return Err(RegistryFull(handle));
        };

        let (id, name) = self.fresh_identity();
        Ok(&*self.slots[slot].insert(Session { id, name, handle }))
    }

    /// Frees the slot held by `id`. Dropping the returned session closes its
    /// handle. Unknown or already removed ids are ignored.
    pub fn remove(&mut self, id: SessionId) -> Option<Session<H>> {
        let slot = self.slot_of(id)?;
        let session = self.slots[slot].take();
        self.free.insert(slot);
        session
    }

    pub fn get(&self, id: SessionId) -> Option<&Session<H>> {
        self.slot_of(id).and_then(|slot| self.slots[slot].as_ref())
    }

    /// Case-insensitive exact match against active sessions.
    pub fn find_by_name(&self, name: &str) -> Option<&Session<H>> {
        self.iter().find(|session| session.name.eq_ignore_ascii_case(name))
    }

    /// Changes the display name of `id`, returning the previous name.
    pub fn rename(&mut self, id: SessionId, new_name: &str) -> Result<String, RenameError> {
        let length = new_name.chars().count();
        if length == 0 || length > MAX_NAME_LEN {
            return Err(RenameError::InvalidLength);
        }

        if self
            .iter()
            .any(|session| session.id != id && session.name.eq_ignore_ascii_case(new_name))
        {
            return Err(RenameError::Taken);
        }

        let session = self
            .slot_of(id)
            .and_then(|slot| self.slots[slot].as_mut())
            .ok_or(RenameError::UnknownSession)?;
        Ok(std::mem::replace(&mut session.name, new_name.to_string()))
    }

    /// Active sessions in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Session<H>> {
        self.slots.iter().flatten()
    }

    fn slot_of(&self, id: SessionId) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|session| session.id == id))
    }

    fn fresh_identity(&mut self) -> (SessionId, String) {
        loop {
            let id = SessionId(self.next_id);
            self.next_id += 1;

            // A renamed session may already hold a future default name.
            let name = format!("User{id}");
            if self.find_by_name(&name).is_none() {
                return (id, name);
            }
        }
    }
}

impl<H> Default for Registry<H> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_CLIENTS)
    }
}
