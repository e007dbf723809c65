use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use pawtrack_core::geo_utils::{bounding_box, format_distance, Coordinate};
use pawtrack_core::gps_filter::{RawSample, TrackingConfig};
use pawtrack_core::location_service::{
    LocationService, PositionProvider, SampleSink, WatchHandle, WatchOptions,
};
use pawtrack_core::route_api::RoutePersistence;
use pawtrack_core::track_recorder::TrackRecorder;

/// Replays a synthetic walk (with GPS jitter, one teleport, and a few bad
/// fixes mixed in) through the full recording pipeline, printing what
/// would be uploaded to the route API.

struct ReplayProvider {
    sink: Arc<Mutex<Option<SampleSink>>>,
}

struct ReplayHandle {
    sink: Arc<Mutex<Option<SampleSink>>>,
}

impl WatchHandle for ReplayHandle {
    fn cancel(self: Box<Self>) {
        *self.sink.lock().unwrap() = None;
    }
}

impl PositionProvider for ReplayProvider {
    fn request_permission(&self) -> Result<bool> {
        Ok(true)
    }

    fn current_position(&self) -> Result<RawSample> {
        Ok(make_sample(47.3769, 8.5417, 5.0))
    }

    fn watch(&self, _options: WatchOptions, sink: SampleSink) -> Result<Box<dyn WatchHandle>> {
        *self.sink.lock().unwrap() = Some(sink);
        Ok(Box::new(ReplayHandle {
            sink: Arc::clone(&self.sink),
        }))
    }
}

struct StdoutPersistence;

impl RoutePersistence for StdoutPersistence {
    fn create_route(&self, dog_id: i64) -> Result<i64> {
        println!("create route for dog {dog_id} -> route 1");
        Ok(1)
    }

    fn append_point(&self, route_id: i64, coordinate: &Coordinate) -> Result<()> {
        println!(
            "append to route {route_id}: ({:.6}, {:.6})",
            coordinate.latitude, coordinate.longitude
        );
        Ok(())
    }
}

fn make_sample(latitude: f64, longitude: f64, accuracy: f32) -> RawSample {
    RawSample {
        latitude,
        longitude,
        timestamp_ms: None,
        accuracy: Some(accuracy),
        altitude: None,
        speed: None,
    }
}

fn synthetic_walk() -> Vec<RawSample> {
    let mut samples = Vec::new();
    let lat = 47.3769;
    let mut lng = 8.5417;
    for i in 0..40 {
        lng += 0.00005;
        let accuracy = if i % 13 == 5 { 35.0 } else { 5.0 };
        samples.push(make_sample(lat, lng, accuracy));
        if i == 20 {
            // a teleport the filter should throw away
            samples.push(make_sample(lat, lng + 0.01, 5.0));
        }
    }
    samples
}

pub fn main() -> Result<()> {
    pawtrack_core::logs::init(".")?;

    let sink = Arc::new(Mutex::new(None));
    let provider = Arc::new(ReplayProvider {
        sink: Arc::clone(&sink),
    });
    let service = LocationService::new(provider);
    let mut recorder = TrackRecorder::new(
        service,
        TrackingConfig::default(),
        7,
        Arc::new(StdoutPersistence),
    );

    if !recorder.start_tracking() {
        bail!("failed to start tracking");
    }

    for sample in synthetic_walk() {
        if let Some(sink) = sink.lock().unwrap().as_mut() {
            sink(sample);
        }
    }
    recorder.stop_tracking();

    let points = recorder.route_points();
    println!();
    println!("recorded points: {}", points.len());
    println!(
        "total distance:  {}",
        format_distance(recorder.total_distance_m())
    );
    let coordinates: Vec<Coordinate> = points.iter().map(|p| p.coordinate).collect();
    if let Some(bounds) = bounding_box(&coordinates) {
        println!(
            "bounds:          {:.4}..{:.4} N, {:.4}..{:.4} E",
            bounds.min_lat, bounds.max_lat, bounds.min_lng, bounds.max_lng
        );
    }
    Ok(())
}
