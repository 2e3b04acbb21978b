//! Quantity Recorder - real-time sensor sample recording for research tasks.
//!
//! A recorder subscribes to one live quantity stream (heart rate, respiratory
//! rate, ...) for the duration of a task step, keeps the most recent sample
//! available to the host, and persists every sample to a JSON-lines file for
//! later analysis.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Quantity Recorder                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐  batches  ┌──────────────┐   ┌───────────┐  │
//! │  │ Data source │──────────▶│   Recorder   │──▶│ Data file │  │
//! │  │ (own thread)│           │ (batch lock) │   │  (.jsonl) │  │
//! │  └─────────────┘           └──────────────┘   └───────────┘  │
//! │                               │       │                      │
//! │                               ▼       ▼                      │
//! │                      ┌──────────┐  ┌──────────┐              │
//! │                      │  Latest  │  │ Observer │              │
//! │                      │  sample  │  │(optional)│              │
//! │                      └──────────┘  └──────────┘              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use quantity_recorder::{QuantitySampleRecorder, QuantityType, SimulatedSource, TaskStep, Unit};
//!
//! let mut recorder = QuantitySampleRecorder::new(
//!     QuantityType::HeartRate,
//!     Unit::count_per_minute(),
//!     TaskStep::new("six-minute-walk"),
//!     "/tmp/study",
//!     Arc::new(SimulatedSource::default()),
//! )
//! .expect("output directory must exist");
//!
//! recorder.start().expect("failed to start recording");
//! std::thread::sleep(std::time::Duration::from_secs(5));
//! println!("latest: {:?}", recorder.latest_sample());
//! let result = recorder.stop().expect("failed to close data file");
//! ```

pub mod config;
pub mod recorder;
pub mod source;
pub mod summary;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError, SimulatedSettings};
pub use recorder::{
    FileResult, QuantitySampleRecorder, RecorderError, RecorderHandle, RecorderObserver,
    RecorderState, SampleRecord, TaskStep,
};
pub use source::{
    ChannelSource, Delivery, QuantityDataSource, QuantityType, Sample, SampleFeed, SampleHandler,
    SimulatedConfig, SimulatedSource, SourceError, Subscription, Unit,
};
pub use summary::RecordingSummary;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
