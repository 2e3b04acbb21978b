//! Demonstration of recording heart rate from a host-fed source.
//!
//! This example shows how to:
//! 1. Bridge a device that produces readings into a `ChannelSource`
//! 2. Create and start a recorder for a task step
//! 3. Observe updates and read the latest sample
//! 4. Stop the recorder and summarize the data file
//!
//! Run with: cargo run --example heart_rate_demo

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use quantity_recorder::{
    recorder::{RecorderHandle, RecorderObserver},
    ChannelSource, QuantitySampleRecorder, QuantityType, RecordingSummary, Sample, TaskStep,
    Unit,
};

struct PrintingObserver;

impl RecorderObserver for PrintingObserver {
    fn recorder_did_update(&self, recorder: &RecorderHandle) {
        if let Some(sample) = recorder.latest_sample() {
            println!(
                "  Heart rate: {:.0} {} at {}",
                sample.value,
                sample.unit,
                sample.start.format("%H:%M:%S%.3f")
            );
        }
    }
}

fn main() {
    println!("Quantity Recorder - Heart Rate Demo");
    println!("===================================");
    println!();

    let output = std::env::temp_dir().join("quantity-recorder-demo");
    if let Err(e) = std::fs::create_dir_all(&output) {
        eprintln!("Error creating {}: {e}", output.display());
        return;
    }

    let (source, feed) = ChannelSource::new();
    let mut recorder = match QuantitySampleRecorder::new(
        QuantityType::HeartRate,
        Unit::count_per_minute(),
        TaskStep::new("demo-walk"),
        &output,
        Arc::new(source),
    ) {
        Ok(recorder) => recorder,
        Err(e) => {
            eprintln!("Error creating recorder: {e}");
            return;
        }
    };
    recorder.set_observer(Some(Arc::new(PrintingObserver)));

    if let Err(e) = recorder.start() {
        eprintln!("Error starting recorder: {e}");
        return;
    }
    println!("Recording for 5 seconds...");
    println!();

    // A strap that reports in beats per second, two readings at a time.
    let running = Arc::new(AtomicBool::new(true));
    let device_running = running.clone();
    let device = thread::spawn(move || {
        let mut beat = 0u32;
        while device_running.load(Ordering::SeqCst) {
            let now = Utc::now();
            let batch = (0..2)
                .map(|i| {
                    beat += 1;
                    let per_sec = 1.15 + 0.05 * ((beat % 7) as f64 - 3.0) / 3.0;
                    Sample::new(
                        per_sec,
                        Unit::count_per_second(),
                        now - chrono::Duration::milliseconds(250 * (1 - i)),
                    )
                    .with_source("demo-strap")
                })
                .collect();
            if !feed.send(batch) {
                break;
            }
            thread::sleep(Duration::from_millis(500));
        }
    });

    thread::sleep(Duration::from_secs(5));

    println!();
    println!("Stopping recorder...");
    let result = recorder.stop();
    running.store(false, Ordering::SeqCst);
    let _ = device.join();

    match result {
        Ok(Some(result)) => {
            println!("Data file: {}", result.path.display());
            println!();
            match RecordingSummary::from_file(&result.path) {
                Ok(summary) => println!("{summary}"),
                Err(e) => eprintln!("Error reading data file: {e}"),
            }
        }
        Ok(None) => println!("Recorder was not running."),
        Err(e) => eprintln!("Error stopping recorder: {e}"),
    }

    println!();
    println!("{}", recorder.stats().summary());
    println!();
    println!("Demo complete!");
}
