//! Simulated data source producing synthetic samples.
//!
//! Stands in for a real sensor API on machines without one. Samples follow a
//! slow sine wave around a baseline and are pushed in batches from a
//! background thread, the same way a real source delivers on its own context.

use crate::source::{
    QuantityDataSource, QuantityType, Sample, SampleHandler, SourceError, Subscription,
    ThreadSubscription, Unit,
};
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::f64::consts::TAU;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Samples per full sine period.
const WAVE_PERIOD_SAMPLES: f64 = 60.0;

/// Largest batch the generator can space evenly over one interval.
pub const MAX_BATCH_SIZE: usize = i32::MAX as usize;

/// Configuration for the simulated source.
#[derive(Debug, Clone)]
pub struct SimulatedConfig {
    /// Time between batches
    pub interval: Duration,
    /// Samples per batch
    pub batch_size: usize,
    /// Center of the generated values, in the quantity's default unit.
    /// Uses a per-quantity default when `None`.
    pub baseline: Option<f64>,
    /// Peak deviation from the baseline
    pub amplitude: f64,
    /// Whether the simulated user granted access
    pub authorized: bool,
    /// Source identifier stamped on every sample
    pub source_id: Option<String>,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            batch_size: 1,
            baseline: None,
            amplitude: 6.0,
            authorized: true,
            source_id: None,
        }
    }
}

/// A data source that synthesizes samples on a background thread.
pub struct SimulatedSource {
    config: SimulatedConfig,
    source_id: String,
}

impl SimulatedSource {
    pub fn new(config: SimulatedConfig) -> Self {
        let source_id = config
            .source_id
            .clone()
            .unwrap_or_else(default_source_id);

        Self { config, source_id }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new(SimulatedConfig::default())
    }
}

impl QuantityDataSource for SimulatedSource {
    fn supports(&self, quantity_type: QuantityType, unit: &Unit) -> bool {
        quantity_type.accepts(unit)
    }

    fn subscribe(
        &self,
        quantity_type: QuantityType,
        unit: Unit,
        handler: SampleHandler,
    ) -> Result<Box<dyn Subscription>, SourceError> {
        if !self.config.authorized {
            return Err(SourceError::AuthorizationDenied(quantity_type));
        }
        if !self.supports(quantity_type, &unit) {
            return Err(SourceError::Unsupported {
                quantity_type,
                unit,
            });
        }
        if self.config.batch_size == 0 || self.config.interval.is_zero() {
            return Err(SourceError::Unavailable(
                "simulated source needs a non-zero interval and batch size".to_string(),
            ));
        }
        if self.config.batch_size > MAX_BATCH_SIZE {
            return Err(SourceError::Unavailable(format!(
                "simulated batch size {} exceeds {MAX_BATCH_SIZE}",
                self.config.batch_size
            )));
        }

        let generator = WaveGenerator {
            quantity_type,
            unit,
            baseline: self
                .config
                .baseline
                .unwrap_or_else(|| default_baseline(quantity_type)),
            amplitude: self.config.amplitude,
            source_id: self.source_id.clone(),
            index: 0,
        };

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let interval = self.config.interval;
        let batch_size = self.config.batch_size;

        let handle = thread::Builder::new()
            .name(format!("simulated-{quantity_type}"))
            .spawn(move || run_delivery_loop(generator, handler, stop_rx, interval, batch_size))
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        debug!(%quantity_type, %unit, "simulated subscription started");
        Ok(Box::new(ThreadSubscription::new(stop_tx, handle)))
    }
}

/// Push a batch every `interval` until stopped or the handler declines.
fn run_delivery_loop(
    mut generator: WaveGenerator,
    handler: SampleHandler,
    stop_rx: Receiver<()>,
    interval: Duration,
    batch_size: usize,
) {
    loop {
        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            // Stop signal or cancelled subscription
            _ => break,
        }

        let batch = generator.next_batch(Utc::now(), interval, batch_size);
        let outcome = handler.deliver(batch);
        if !outcome.wants_more() {
            debug!(?outcome, "simulated source stopping, handler declined batch");
            break;
        }
    }
}

struct WaveGenerator {
    quantity_type: QuantityType,
    unit: Unit,
    baseline: f64,
    amplitude: f64,
    source_id: String,
    index: u64,
}

impl WaveGenerator {
    /// Samples evenly spaced over the interval ending at `now`.
    /// `size` is clamped to [`MAX_BATCH_SIZE`].
    fn next_batch(&mut self, now: DateTime<Utc>, interval: Duration, size: usize) -> Vec<Sample> {
        let count = i32::try_from(size.min(MAX_BATCH_SIZE)).unwrap_or(i32::MAX);
        let step = u32::try_from(count)
            .ok()
            .and_then(|n| interval.checked_div(n))
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .unwrap_or_else(chrono::Duration::zero);
        let native = self.quantity_type.default_unit();
        let window_start = step
            .checked_mul(count)
            .and_then(|span| now.checked_sub_signed(span))
            .unwrap_or(now);

        (0..count)
            .filter_map(|i| {
                let phase = TAU * self.index as f64 / WAVE_PERIOD_SAMPLES;
                self.index += 1;
                let value = self.baseline + self.amplitude * phase.sin();
                let value = match native.convert(value, &self.unit) {
                    Ok(v) => v,
                    Err(e) => {
                        warn!("simulated conversion failed: {e}");
                        return None;
                    }
                };
                let at = step
                    .checked_mul(i + 1)
                    .and_then(|offset| window_start.checked_add_signed(offset))
                    .unwrap_or(now);
                Some(Sample::new(value, self.unit, at).with_source(self.source_id.clone()))
            })
            .collect()
    }
}

fn default_baseline(quantity_type: QuantityType) -> f64 {
    match quantity_type {
        QuantityType::HeartRate => 72.0,
        QuantityType::RespiratoryRate => 14.0,
        QuantityType::OxygenSaturation => 97.0,
        QuantityType::BodyMass => 70.0,
        QuantityType::StepCount => 12.0,
    }
}

fn default_source_id() -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "localhost".to_string());
    format!("simulated@{host}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Delivery;
    use crossbeam_channel::unbounded;

    fn fast_config() -> SimulatedConfig {
        SimulatedConfig {
            interval: Duration::from_millis(10),
            batch_size: 3,
            source_id: Some("test-strap".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_generator_spacing_and_unit() {
        let mut generator = WaveGenerator {
            quantity_type: QuantityType::HeartRate,
            unit: Unit::count_per_second(),
            baseline: 60.0,
            amplitude: 0.0,
            source_id: "gen".to_string(),
            index: 0,
        };
        let now = Utc::now();
        let batch = generator.next_batch(now, Duration::from_secs(3), 3);

        assert_eq!(batch.len(), 3);
        assert_eq!(batch[2].start, now);
        assert_eq!(batch[1].start, now - chrono::Duration::seconds(1));
        for sample in &batch {
            assert_eq!(sample.unit, Unit::count_per_second());
            assert!((sample.value - 1.0).abs() < 1e-9);
            assert_eq!(sample.source.as_deref(), Some("gen"));
        }
    }

    #[test]
    fn test_generator_with_empty_batch() {
        let mut generator = WaveGenerator {
            quantity_type: QuantityType::HeartRate,
            unit: Unit::count_per_minute(),
            baseline: 72.0,
            amplitude: 6.0,
            source_id: "gen".to_string(),
            index: 0,
        };
        assert!(generator
            .next_batch(Utc::now(), Duration::from_secs(1), 0)
            .is_empty());
    }

    #[test]
    fn test_oversized_batch_rejected() {
        let source = SimulatedSource::new(SimulatedConfig {
            batch_size: MAX_BATCH_SIZE + 1,
            ..fast_config()
        });
        let handler = SampleHandler::from_fn(|_| Delivery::Recorded(0));

        let result = source.subscribe(QuantityType::HeartRate, Unit::count_per_minute(), handler);
        assert!(matches!(result, Err(SourceError::Unavailable(_))));
    }

    #[test]
    fn test_unauthorized_subscribe_fails() {
        let source = SimulatedSource::new(SimulatedConfig {
            authorized: false,
            ..fast_config()
        });
        let handler = SampleHandler::from_fn(|_| Delivery::Recorded(0));

        let err = source
            .subscribe(QuantityType::HeartRate, Unit::count_per_minute(), handler)
            .err()
            .unwrap();
        assert_eq!(err, SourceError::AuthorizationDenied(QuantityType::HeartRate));
    }

    #[test]
    fn test_unsupported_unit_fails() {
        let source = SimulatedSource::new(fast_config());
        let handler = SampleHandler::from_fn(|_| Delivery::Recorded(0));

        assert!(!source.supports(QuantityType::HeartRate, &Unit::kilogram()));
        let result = source.subscribe(QuantityType::HeartRate, Unit::kilogram(), handler);
        assert!(matches!(result, Err(SourceError::Unsupported { .. })));
    }

    #[test]
    fn test_pushes_batches_until_cancelled() {
        let source = SimulatedSource::new(fast_config());
        let (tx, rx) = unbounded();
        let handler = SampleHandler::from_fn(move |batch| {
            let len = batch.len();
            let _ = tx.send(batch);
            Delivery::Recorded(len)
        });

        let mut subscription = source
            .subscribe(QuantityType::HeartRate, Unit::count_per_minute(), handler)
            .unwrap();

        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        subscription.cancel();
        subscription.cancel();

        assert_eq!(first.len(), 3);
        assert!(second[0].start >= first[2].start);
        assert_eq!(first[0].source.as_deref(), Some("test-strap"));

        // Nothing arrives once cancel has returned.
        while rx.try_recv().is_ok() {}
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_stops_when_handler_declines() {
        let source = SimulatedSource::new(fast_config());
        let (tx, rx) = unbounded();
        let handler = SampleHandler::from_fn(move |_| {
            let _ = tx.send(());
            Delivery::Ignored
        });

        let _subscription = source
            .subscribe(QuantityType::HeartRate, Unit::count_per_minute(), handler)
            .unwrap();

        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }
}
