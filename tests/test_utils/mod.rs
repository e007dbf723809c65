#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};

use anyhow::Result;
use pawtrack_core::geo_utils::Coordinate;
use pawtrack_core::gps_filter::RawSample;
use pawtrack_core::location_service::{PositionProvider, SampleSink, WatchHandle, WatchOptions};
use pawtrack_core::route_api::RoutePersistence;

pub fn sample(latitude: f64, longitude: f64, accuracy: f32) -> RawSample {
    RawSample {
        latitude,
        longitude,
        timestamp_ms: Some(1717000000000),
        accuracy: Some(accuracy),
        altitude: None,
        speed: None,
    }
}

pub fn load_raw_samples_for_test() -> Vec<RawSample> {
    let mut reader = csv::Reader::from_path("tests/data/raw_gps.csv").unwrap();
    reader
        .records()
        .map(|row| {
            let row = row.unwrap();
            RawSample {
                timestamp_ms: Some(row[0].parse().unwrap()),
                latitude: row[1].parse().unwrap(),
                longitude: row[2].parse().unwrap(),
                accuracy: Some(row[3].parse().unwrap()),
                altitude: None,
                speed: None,
            }
        })
        .collect()
}

/// Scripted stand-in for the device positioning subsystem: the test pushes
/// samples through `emit` and they arrive via the registered sink.
pub struct MockProvider {
    permission_granted: AtomicBool,
    fail_watch: AtomicBool,
    position: Mutex<Option<RawSample>>,
    sink: Arc<Mutex<Option<SampleSink>>>,
}

impl MockProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(MockProvider {
            permission_granted: AtomicBool::new(true),
            fail_watch: AtomicBool::new(false),
            position: Mutex::new(None),
            sink: Arc::new(Mutex::new(None)),
        })
    }

    pub fn deny_permission(&self) {
        self.permission_granted.store(false, Ordering::SeqCst);
    }

    pub fn fail_next_watch(&self) {
        self.fail_watch.store(true, Ordering::SeqCst);
    }

    pub fn set_position(&self, sample: RawSample) {
        *self.position.lock().unwrap() = Some(sample);
    }

    pub fn is_watching(&self) -> bool {
        self.sink.lock().unwrap().is_some()
    }

    /// Deliver one sample to the subscriber, if any. Cancelled
    /// subscriptions receive nothing, mirroring a real device stream.
    pub fn emit(&self, sample: RawSample) {
        if let Some(sink) = self.sink.lock().unwrap().as_mut() {
            sink(sample);
        }
    }
}

struct MockWatchHandle {
    sink: Arc<Mutex<Option<SampleSink>>>,
}

impl WatchHandle for MockWatchHandle {
    fn cancel(self: Box<Self>) {
        *self.sink.lock().unwrap() = None;
    }
}

impl PositionProvider for MockProvider {
    fn request_permission(&self) -> Result<bool> {
        Ok(self.permission_granted.load(Ordering::SeqCst))
    }

    fn current_position(&self) -> Result<RawSample> {
        self.position
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no position fix"))
    }

    fn watch(&self, _options: WatchOptions, sink: SampleSink) -> Result<Box<dyn WatchHandle>> {
        if self.fail_watch.swap(false, Ordering::SeqCst) {
            anyhow::bail!("positioning stream unavailable");
        }
        *self.sink.lock().unwrap() = Some(sink);
        Ok(Box::new(MockWatchHandle {
            sink: Arc::clone(&self.sink),
        }))
    }
}

pub const MOCK_ROUTE_ID: i64 = 42;

/// Remote collaborator double. Every `append_point` attempt (successful or
/// simulated-failed) is reported on the channel so tests can observe the
/// upload worker deterministically.
pub struct MockPersistence {
    fail_create: AtomicBool,
    fail_append: AtomicBool,
    appends: Mutex<mpsc::Sender<(i64, Coordinate)>>,
}

impl MockPersistence {
    pub fn new() -> (Arc<Self>, mpsc::Receiver<(i64, Coordinate)>) {
        let (tx, rx) = mpsc::channel();
        (
            Arc::new(MockPersistence {
                fail_create: AtomicBool::new(false),
                fail_append: AtomicBool::new(false),
                appends: Mutex::new(tx),
            }),
            rx,
        )
    }

    pub fn fail_create_route(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    pub fn fail_appends(&self) {
        self.fail_append.store(true, Ordering::SeqCst);
    }
}

impl RoutePersistence for MockPersistence {
    fn create_route(&self, _dog_id: i64) -> Result<i64> {
        if self.fail_create.load(Ordering::SeqCst) {
            anyhow::bail!("dog profile missing");
        }
        Ok(MOCK_ROUTE_ID)
    }

    fn append_point(&self, route_id: i64, coordinate: &Coordinate) -> Result<()> {
        let _ = self.appends.lock().unwrap().send((route_id, *coordinate));
        if self.fail_append.load(Ordering::SeqCst) {
            anyhow::bail!("network unreachable");
        }
        Ok(())
    }
}
