//! Outbound worker pool.
//!
//! Provider calls run on a runtime of their own, separate from whatever
//! runtime accepts inbound requests. The pool bounds both the number of calls
//! running at once (`max_in_flight`) and the number allowed to wait for a slot
//! (`queue_capacity`). Submissions past both bounds are refused immediately.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinHandle};
use tracing::debug;

use crate::{ConfigError, ValidationError};

pub const OUTBOUND_THREAD_NAME: &str = "switchyard-outbound";

/// Sizing of the outbound pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub worker_threads: usize,
    pub max_in_flight: usize,
    pub queue_capacity: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            worker_threads: 4,
            max_in_flight: 200,
            queue_capacity: 500,
        }
    }
}

impl PoolSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.worker_threads == 0 {
            return Err(ValidationError::ZeroPoolSetting {
                field: "worker_threads",
            });
        }
        if self.max_in_flight == 0 {
            return Err(ValidationError::ZeroPoolSetting {
                field: "max_in_flight",
            });
        }
        Ok(())
    }

    /// Total number of submissions that may be admitted at once.
    pub const fn admission_capacity(&self) -> usize {
        self.max_in_flight.saturating_add(self.queue_capacity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("outbound pool saturated: {capacity} calls already admitted")]
pub struct PoolSaturated {
    pub capacity: usize,
}

/// Grants the right to run one call. Awaiting [`InFlight::enter`] is where a
/// queued task waits.
#[derive(Debug, Clone)]
pub struct InFlight {
    permits: Arc<Semaphore>,
}

impl InFlight {
    /// Waits for a running slot. `None` only when the pool is shutting down.
    pub async fn enter(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.permits).acquire_owned().await.ok()
    }
}

/// Decrements the admission count when the task finishes or is dropped.
struct Admission {
    admitted: Arc<AtomicUsize>,
}

impl Drop for Admission {
    fn drop(&mut self) {
        self.admitted.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Handle to a submitted task. Dropping it aborts the task.
#[derive(Debug)]
pub struct TaskHandle<T> {
    inner: JoinHandle<T>,
}

impl<T> TaskHandle<T> {
    pub fn abort(&self) {
        self.inner.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }
}

impl<T> Drop for TaskHandle<T> {
    fn drop(&mut self) {
        self.inner.abort();
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx)
    }
}

/// Bounded pool dedicated to provider calls. Shared by every aggregate request.
pub struct OutboundPool {
    runtime: Option<Runtime>,
    handle: Handle,
    permits: Arc<Semaphore>,
    admitted: Arc<AtomicUsize>,
    settings: PoolSettings,
}

impl OutboundPool {
    /// Builds a dedicated multi-thread runtime sized by `settings`.
    pub fn new(settings: PoolSettings) -> Result<Self, ConfigError> {
        settings.validate()?;

        let runtime = Builder::new_multi_thread()
            .worker_threads(settings.worker_threads)
            .thread_name(OUTBOUND_THREAD_NAME)
            .enable_all()
            .build()
            .map_err(ConfigError::Runtime)?;
        let handle = runtime.handle().clone();

        debug!(
            worker_threads = settings.worker_threads,
            max_in_flight = settings.max_in_flight,
            queue_capacity = settings.queue_capacity,
            "outbound pool started"
        );

        Ok(Self::assemble(Some(runtime), handle, settings))
    }

    /// Runs tasks on an existing runtime. `worker_threads` is ignored.
    pub fn on_handle(handle: Handle, settings: PoolSettings) -> Result<Self, ValidationError> {
        settings.validate()?;
        Ok(Self::assemble(None, handle, settings))
    }

    fn assemble(runtime: Option<Runtime>, handle: Handle, settings: PoolSettings) -> Self {
        Self {
            runtime,
            handle,
            permits: Arc::new(Semaphore::new(settings.max_in_flight)),
            admitted: Arc::new(AtomicUsize::new(0)),
            settings,
        }
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub const fn settings(&self) -> PoolSettings {
        self.settings
    }

    /// Submissions admitted and not yet finished, running or queued.
    pub fn admitted(&self) -> usize {
        self.admitted.load(Ordering::Acquire)
    }

    pub fn in_flight(&self) -> usize {
        self.settings
            .max_in_flight
            .saturating_sub(self.permits.available_permits())
    }

    /// Admits one task. `task` receives the [`InFlight`] gate and must enter it
    /// before doing bounded work.
    pub fn submit<F, Fut>(&self, task: F) -> Result<TaskHandle<Fut::Output>, PoolSaturated>
    where
        F: FnOnce(InFlight) -> Fut,
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        let capacity = self.settings.admission_capacity();
        let admitted = self
            .admitted
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < capacity).then_some(current + 1)
            });
        if admitted.is_err() {
            return Err(PoolSaturated { capacity });
        }

        let admission = Admission {
            admitted: Arc::clone(&self.admitted),
        };
        let future = task(InFlight {
            permits: Arc::clone(&self.permits),
        });

        let inner = self.handle.spawn(async move {
            let _admission = admission;
            future.await
        });
        Ok(TaskHandle { inner })
    }
}

impl Drop for OutboundPool {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl std::fmt::Debug for OutboundPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundPool")
            .field("dedicated", &self.runtime.is_some())
            .field("settings", &self.settings)
            .field("admitted", &self.admitted())
            .finish()
    }
}
