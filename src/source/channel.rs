//! Host-fed data source.
//!
//! Bridges any producer that can hand over sample batches (a vendor SDK
//! callback, a replay of a previous session, a test) into the push contract:
//! batches sent through a [`SampleFeed`] are forwarded to the subscribed
//! handler from a dedicated pump thread.

use crate::source::{
    QuantityDataSource, QuantityType, Sample, SampleHandler, SourceError, Subscription,
    ThreadSubscription, Unit,
};
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::debug;

/// Producer side of a [`ChannelSource`].
#[derive(Debug, Clone)]
pub struct SampleFeed {
    sender: Sender<Vec<Sample>>,
}

impl SampleFeed {
    /// Queue a batch for delivery. Returns false once the source is gone.
    pub fn send(&self, batch: Vec<Sample>) -> bool {
        self.sender.send(batch).is_ok()
    }
}

/// A data source whose samples are supplied by the host through a channel.
pub struct ChannelSource {
    receiver: Receiver<Vec<Sample>>,
    authorized: bool,
    unavailable: Option<String>,
    subscribed: Arc<AtomicBool>,
}

impl ChannelSource {
    /// Create a source and the feed that supplies it.
    pub fn new() -> (Self, SampleFeed) {
        let (sender, receiver) = unbounded();
        let source = Self {
            receiver,
            authorized: true,
            unavailable: None,
            subscribed: Arc::new(AtomicBool::new(false)),
        };
        (source, SampleFeed { sender })
    }

    /// Set whether subscribing is authorized.
    pub fn with_authorization(mut self, authorized: bool) -> Self {
        self.authorized = authorized;
        self
    }

    /// Make every subscribe attempt fail as unavailable.
    pub fn with_unavailable(mut self, reason: impl Into<String>) -> Self {
        self.unavailable = Some(reason.into());
        self
    }

    /// Whether a pump thread is currently attached.
    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::SeqCst)
    }
}

impl QuantityDataSource for ChannelSource {
    fn supports(&self, quantity_type: QuantityType, unit: &Unit) -> bool {
        quantity_type.accepts(unit)
    }

    fn subscribe(
        &self,
        quantity_type: QuantityType,
        unit: Unit,
        handler: SampleHandler,
    ) -> Result<Box<dyn Subscription>, SourceError> {
        if let Some(reason) = &self.unavailable {
            return Err(SourceError::Unavailable(reason.clone()));
        }
        if !self.authorized {
            return Err(SourceError::AuthorizationDenied(quantity_type));
        }
        if !self.supports(quantity_type, &unit) {
            return Err(SourceError::Unsupported {
                quantity_type,
                unit,
            });
        }
        if self.subscribed.swap(true, Ordering::SeqCst) {
            return Err(SourceError::Unavailable(
                "channel source already has a subscriber".to_string(),
            ));
        }

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let receiver = self.receiver.clone();
        let subscribed = self.subscribed.clone();

        let spawned = thread::Builder::new()
            .name(format!("channel-{quantity_type}"))
            .spawn(move || {
                pump(receiver, stop_rx, handler);
                subscribed.store(false, Ordering::SeqCst);
            });

        match spawned {
            Ok(handle) => Ok(Box::new(ThreadSubscription::new(stop_tx, handle))),
            Err(e) => {
                self.subscribed.store(false, Ordering::SeqCst);
                Err(SourceError::Unavailable(e.to_string()))
            }
        }
    }
}

/// Forward batches until stopped, the feed is dropped, or the handler declines.
fn pump(receiver: Receiver<Vec<Sample>>, stop_rx: Receiver<()>, handler: SampleHandler) {
    loop {
        select! {
            recv(stop_rx) -> _ => break,
            recv(receiver) -> msg => match msg {
                Ok(batch) => {
                    let outcome = handler.deliver(batch);
                    if !outcome.wants_more() {
                        debug!(?outcome, "channel source pump stopping");
                        break;
                    }
                }
                Err(_) => break,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Delivery;
    use chrono::Utc;
    use std::time::Duration;

    fn bpm(value: f64) -> Sample {
        Sample::new(value, Unit::count_per_minute(), Utc::now())
    }

    #[test]
    fn test_forwards_fed_batches_in_order() {
        let (source, feed) = ChannelSource::new();
        let (tx, rx) = unbounded();
        let handler = SampleHandler::from_fn(move |batch| {
            let len = batch.len();
            let _ = tx.send(batch);
            Delivery::Recorded(len)
        });

        let mut subscription = source
            .subscribe(QuantityType::HeartRate, Unit::count_per_minute(), handler)
            .unwrap();
        assert!(source.is_subscribed());

        assert!(feed.send(vec![bpm(70.0), bpm(71.0)]));
        assert!(feed.send(vec![bpm(72.0)]));

        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(second[0].value, 72.0);

        subscription.cancel();
        assert!(!source.is_subscribed());
    }

    #[test]
    fn test_rejects_second_subscriber() {
        let (source, _feed) = ChannelSource::new();
        let handler = SampleHandler::from_fn(|_| Delivery::Recorded(0));

        let _first = source
            .subscribe(QuantityType::HeartRate, Unit::count_per_minute(), handler.clone())
            .unwrap();
        let second = source.subscribe(QuantityType::HeartRate, Unit::count_per_minute(), handler);
        assert!(matches!(second, Err(SourceError::Unavailable(_))));
    }

    #[test]
    fn test_configured_failures() {
        let handler = SampleHandler::from_fn(|_| Delivery::Recorded(0));

        let (source, _feed) = ChannelSource::new();
        let source = source.with_authorization(false);
        assert!(matches!(
            source.subscribe(QuantityType::HeartRate, Unit::count_per_minute(), handler.clone()),
            Err(SourceError::AuthorizationDenied(QuantityType::HeartRate))
        ));

        let (source, _feed) = ChannelSource::new();
        let source = source.with_unavailable("sensor asleep");
        assert_eq!(
            source
                .subscribe(QuantityType::HeartRate, Unit::count_per_minute(), handler)
                .err(),
            Some(SourceError::Unavailable("sensor asleep".to_string()))
        );
        assert!(!source.is_subscribed());
    }
}
