//! The storage backend that jobs are executed against.
//!
//! [`Remote`] is the seam for a storage transport. [`InMemoryRemote`] keeps objects in a shared
//! map, which is enough to drive a full run and to verify that the registry never hands out an
//! object that no longer exists.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::{fmt, io, task};

use async_trait::async_trait;
use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use thiserror::Error;
use tokio::io::{AsyncRead, ReadBuf};

/// Errors returned by a [`Remote`].
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The targeted object does not exist.
    #[error("object `{container}/{name}` not found")]
    NotFound {
        /// Container of the missing object.
        container: String,
        /// Name of the missing object.
        name: String,
    },

    /// A failure requested through [`InMemoryRemote::fail_next_creates`].
    #[error("injected failure")]
    Injected,

    /// An I/O error while streaming a payload.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// A storage backend that executes individual operations.
#[async_trait]
pub trait Remote: fmt::Debug + Send + Sync {
    /// Uploads a new object and returns the number of bytes written.
    async fn create(
        &self,
        container: &str,
        name: &str,
        payload: Payload,
    ) -> Result<u64, RemoteError>;

    /// Downloads an object and returns the number of bytes read.
    async fn read(&self, container: &str, name: &str) -> Result<u64, RemoteError>;

    /// Replaces the contents of an existing object and returns the number of bytes written.
    async fn update(
        &self,
        container: &str,
        name: &str,
        payload: Payload,
    ) -> Result<u64, RemoteError>;

    /// Permanently deletes an object.
    async fn delete(&self, container: &str, name: &str) -> Result<(), RemoteError>;

    /// Posts synthetic contents that are not tracked as an object.
    async fn post(&self, contents: &str) -> Result<(), RemoteError>;
}

/// Randomized contents of an object.
///
/// Clone this instance to reuse it with deterministic contents.
#[derive(Debug, Clone)]
pub struct Payload {
    /// The remaining length of the payload in bytes.
    pub len: u64,
    /// The RNG used to fill the payload with random bytes.
    pub rng: SmallRng,
}

impl Payload {
    /// Creates a payload of `len` bytes derived from `seed`.
    pub fn new(seed: u64, len: u64) -> Self {
        Self {
            len,
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl AsyncRead for Payload {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut task::Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> task::Poll<io::Result<()>> {
        let len_to_fill = (buf.remaining() as u64).min(self.len) as usize;

        let fill_buf = buf.initialize_unfilled_to(len_to_fill);
        self.rng.fill_bytes(fill_buf);

        self.len -= len_to_fill as u64;
        buf.advance(len_to_fill);

        task::Poll::Ready(Ok(()))
    }
}

type Store = HashMap<(String, String), u64>;

/// A [`Remote`] that keeps object sizes in memory.
///
/// The remote is [`Clone`] so tests can hold a handle for direct inspection while the runner owns
/// another one.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRemote {
    store: Arc<Mutex<Store>>,
    posted: Arc<Mutex<Vec<String>>>,
    failing_creates: Arc<AtomicUsize>,
}

impl InMemoryRemote {
    /// Creates an empty remote.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` creations fail with [`RemoteError::Injected`].
    pub fn fail_next_creates(&self, count: usize) {
        self.failing_creates.store(count, Ordering::SeqCst);
    }

    /// Returns `true` if the object exists.
    pub fn contains(&self, container: &str, name: &str) -> bool {
        self.store
            .lock()
            .unwrap()
            .contains_key(&(container.to_owned(), name.to_owned()))
    }

    /// Returns the number of stored objects.
    pub fn len(&self) -> usize {
        self.store.lock().unwrap().len()
    }

    /// Returns `true` if no objects are stored.
    pub fn is_empty(&self) -> bool {
        self.store.lock().unwrap().is_empty()
    }

    /// Returns all contents posted so far.
    pub fn posted(&self) -> Vec<String> {
        self.posted.lock().unwrap().clone()
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_creates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    async fn write_payload(
        &self,
        key: (String, String),
        mut payload: Payload,
    ) -> Result<u64, RemoteError> {
        let written = tokio::io::copy(&mut payload, &mut tokio::io::sink()).await?;
        self.store.lock().unwrap().insert(key, written);
        Ok(written)
    }

    fn not_found(container: &str, name: &str) -> RemoteError {
        RemoteError::NotFound {
            container: container.to_owned(),
            name: name.to_owned(),
        }
    }
}

#[async_trait]
impl Remote for InMemoryRemote {
    async fn create(
        &self,
        container: &str,
        name: &str,
        payload: Payload,
    ) -> Result<u64, RemoteError> {
        if self.take_injected_failure() {
            return Err(RemoteError::Injected);
        }
        self.write_payload((container.to_owned(), name.to_owned()), payload).await
    }

    async fn read(&self, container: &str, name: &str) -> Result<u64, RemoteError> {
        let key = (container.to_owned(), name.to_owned());
        let size = self.store.lock().unwrap().get(&key).copied();
        size.ok_or_else(|| Self::not_found(container, name))
    }

    async fn update(
        &self,
        container: &str,
        name: &str,
        payload: Payload,
    ) -> Result<u64, RemoteError> {
        let key = (container.to_owned(), name.to_owned());
        if !self.store.lock().unwrap().contains_key(&key) {
            return Err(Self::not_found(container, name));
        }
        self.write_payload(key, payload).await
    }

    async fn delete(&self, container: &str, name: &str) -> Result<(), RemoteError> {
        let key = (container.to_owned(), name.to_owned());
        match self.store.lock().unwrap().remove(&key) {
            Some(_) => Ok(()),
            None => Err(Self::not_found(container, name)),
        }
    }

    async fn post(&self, contents: &str) -> Result<(), RemoteError> {
        self.posted.lock().unwrap().push(contents.to_owned());
        Ok(())
    }
}
