use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt as _;
use futures::future::{BoxFuture, Shared};

use crate::StdError;

/// Failure of a deferred value, shared by every awaiter.
///
/// All awaiters of one [`Deferred`] observe the same error instance.
#[derive(Clone)]
pub struct SharedError(Arc<StdError>);

impl SharedError {
    pub fn new(error: StdError) -> Self {
        Self(Arc::new(error))
    }

    /// The error produced by the factory.
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.0.as_ref().as_ref()
    }

    /// Whether two handles refer to the same failure.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Display for SharedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for SharedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedError").field(&self.0).finish()
    }
}

impl std::error::Error for SharedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<StdError> for SharedError {
    fn from(value: StdError) -> Self {
        Self::new(value)
    }
}

/// Observed progress of a [`Deferred`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredState {
    Pending,
    Resolved,
    Failed,
}

/// A value produced once by a spawned unit of work and awaited by any number
/// of dependents.
///
/// The unit starts running on the ambient Tokio runtime as soon as it is
/// created and always runs to completion, even if nobody awaits it. A panic
/// inside the unit is reported as a [`SharedError`].
pub struct Deferred<T> {
    inner: Shared<BoxFuture<'static, Result<T, SharedError>>>,
}

impl<T> Deferred<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Spawns `future` on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a Tokio runtime.
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, StdError>> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        let inner = async move {
            match handle.await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(SharedError::new(err)),
                Err(err) => Err(SharedError::new(Box::new(err))),
            }
        }
        .boxed()
        .shared();
        Self { inner }
    }

    /// An already resolved value.
    pub fn ready(value: T) -> Self {
        let inner = futures::future::ready(Ok(value)).boxed().shared();
        Self { inner }
    }

    /// Waits for the value. Every caller gets a clone of the same result.
    pub async fn get(&self) -> Result<T, SharedError> {
        self.inner.clone().await
    }

    /// Progress as seen by the awaiters so far.
    ///
    /// A unit that finished but was never awaited is still reported as
    /// pending.
    pub fn state(&self) -> DeferredState {
        match self.inner.peek() {
            None => DeferredState::Pending,
            Some(Ok(_)) => DeferredState::Resolved,
            Some(Err(_)) => DeferredState::Failed,
        }
    }
}

impl<T> Clone for Deferred<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for Deferred<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("state", &self.state())
            .finish()
    }
}
