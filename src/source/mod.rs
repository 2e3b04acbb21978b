//! Data source contract for quantity sample streams.
//!
//! A data source pushes batches of samples to a [`SampleHandler`] from its
//! own thread until the subscription is cancelled. The recorder never polls.

pub mod channel;
pub mod simulated;
pub mod types;
pub mod units;

use crossbeam_channel::Sender;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::warn;

// Re-export commonly used types
pub use channel::{ChannelSource, SampleFeed};
pub use simulated::{SimulatedConfig, SimulatedSource};
pub use types::{QuantityType, Sample};
pub use units::{Dimension, Unit, UnitError};

/// What the receiving side did with a delivered batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The batch was persisted; carries the number of samples written.
    Recorded(usize),
    /// The receiver is not recording (not started yet or already stopped).
    Ignored,
    /// Handling the batch failed and the recording was aborted.
    Aborted,
}

impl Delivery {
    /// Whether the source should keep pushing batches.
    pub fn wants_more(&self) -> bool {
        matches!(self, Delivery::Recorded(_))
    }
}

/// Receiving side of a subscription.
pub trait BatchTarget: Send + Sync {
    fn deliver(&self, batch: Vec<Sample>) -> Delivery;
}

impl<F> BatchTarget for F
where
    F: Fn(Vec<Sample>) -> Delivery + Send + Sync,
{
    fn deliver(&self, batch: Vec<Sample>) -> Delivery {
        self(batch)
    }
}

/// Push callback handed to a data source on subscribe.
///
/// Cloneable and callable from any thread.
#[derive(Clone)]
pub struct SampleHandler {
    target: Arc<dyn BatchTarget>,
}

impl SampleHandler {
    pub fn new(target: Arc<dyn BatchTarget>) -> Self {
        Self { target }
    }

    /// Build a handler from a closure.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(Vec<Sample>) -> Delivery + Send + Sync + 'static,
    {
        Self::new(Arc::new(f))
    }

    /// Deliver one batch of newly available samples.
    pub fn deliver(&self, batch: Vec<Sample>) -> Delivery {
        self.target.deliver(batch)
    }
}

impl fmt::Debug for SampleHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleHandler").finish_non_exhaustive()
    }
}

/// An active subscription to a data source.
pub trait Subscription: Send {
    /// Stop delivery. Blocks until the delivery thread has exited; calling it
    /// again is a no-op.
    fn cancel(&mut self);
}

/// Subscription backed by a delivery thread and a stop channel.
pub(crate) struct ThreadSubscription {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ThreadSubscription {
    pub(crate) fn new(stop_tx: Sender<()>, handle: JoinHandle<()>) -> Self {
        Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }
}

impl Subscription for ThreadSubscription {
    fn cancel(&mut self) {
        // Dropping the sender disconnects the stop channel.
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            // Cancelling from the delivery thread itself must not self-join.
            if handle.thread().id() != thread::current().id() {
                let name = handle.thread().name().unwrap_or("delivery").to_string();
                if let Err(panic) = handle.join() {
                    let reason = panic
                        .downcast_ref::<&str>()
                        .copied()
                        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
                        .unwrap_or("unknown cause");
                    warn!(thread = %name, "delivery thread panicked: {reason}");
                }
            }
        }
    }
}

impl Drop for ThreadSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// The data source collaborator a recorder reads from.
pub trait QuantityDataSource: Send + Sync {
    /// Whether the source can deliver `quantity_type` samples convertible to `unit`.
    fn supports(&self, quantity_type: QuantityType, unit: &Unit) -> bool;

    /// Start continuous delivery of new samples to `handler`.
    ///
    /// Fails if the user has not authorized the quantity type, the source is
    /// unavailable, or the type/unit pairing is unsupported.
    fn subscribe(
        &self,
        quantity_type: QuantityType,
        unit: Unit,
        handler: SampleHandler,
    ) -> Result<Box<dyn Subscription>, SourceError>;
}

/// Errors a data source can report when subscribing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("access to {0} samples was not authorized")]
    AuthorizationDenied(QuantityType),
    #[error("data source unavailable: {0}")]
    Unavailable(String),
    #[error("{quantity_type} samples cannot be delivered in {unit}")]
    Unsupported { quantity_type: QuantityType, unit: Unit },
}
