//! Generic subsystem runtime — shared scaffolding for channel tasks.
//!
//! A [`Component`] is an independently-runnable unit owned by a subsystem
//! (today: a console channel). The subsystem constructs components with
//! their shared state already captured, then hands them to
//! [`spawn_components`]. Any component error cancels the shared
//! [`CancellationToken`] so siblings and `main` shut down together.

use std::future::Future;
use std::pin::Pin;

use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::AppError;

// ── Component ─────────────────────────────────────────────────────────────────

/// A boxed, owned future returned by [`Component::run`].
pub type ComponentFuture =
    Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'static>>;

/// A self-contained, concurrently-runnable unit owned by a subsystem.
///
/// [`Component::run`] is called once by [`spawn_components`] and should run
/// until `shutdown` is cancelled or the component's own work is done.
pub trait Component: Send + 'static {
    /// Stable identifier used in log messages.
    fn id(&self) -> &str;

    /// Consume the component and return its run-loop as a boxed future.
    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture;
}

// ── SubsystemHandle ───────────────────────────────────────────────────────────

/// Handle to a running component set. `.join()` it to wait for all of them.
pub struct SubsystemHandle {
    inner: JoinHandle<Result<(), AppError>>,
}

impl SubsystemHandle {
    /// Await all components and return the first error, if any.
    pub async fn join(self) -> Result<(), AppError> {
        match self.inner.await {
            Ok(r) => r,
            Err(e) => Err(AppError::Runtime(format!("subsystem task panicked: {e}"))),
        }
    }
}

// ── spawn_components ──────────────────────────────────────────────────────────

/// Spawn each [`Component`] as its own Tokio task.
///
/// If any component returns `Err` or panics, `shutdown` is cancelled and the
/// first error is returned once the remaining components have drained.
pub fn spawn_components(
    components: Vec<Box<dyn Component>>,
    shutdown: CancellationToken,
) -> SubsystemHandle {
    let handle = tokio::spawn(async move {
        let mut set: JoinSet<Result<(), AppError>> = JoinSet::new();

        for component in components {
            debug!(component = component.id(), "spawning component");
            set.spawn(component.run(shutdown.clone()));
        }

        let mut first_err: Option<AppError> = None;

        while let Some(res) = set.join_next().await {
            match res {
                Err(e) => {
                    error!("component panicked: {e}");
                    shutdown.cancel();
                    first_err.get_or_insert_with(|| {
                        AppError::Runtime(format!("component panicked: {e}"))
                    });
                }
                Ok(Err(e)) => {
                    error!("component error: {e}");
                    shutdown.cancel();
                    first_err.get_or_insert(e);
                }
                Ok(Ok(())) => {}
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    });

    SubsystemHandle { inner: handle }
}
