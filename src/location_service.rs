use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::gps_filter::{FilterDecision, GpsFilter, RawSample, TrackingConfig};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct WatchOptions {
    pub min_interval_ms: u32,
    pub min_distance_m: f64,
}

pub type SampleSink = Box<dyn FnMut(RawSample) + Send>;

pub trait WatchHandle: Send {
    fn cancel(self: Box<Self>);
}

/// Boundary to the device positioning subsystem. The real implementation
/// lives in the mobile shell; tests drive a mock through the same trait.
pub trait PositionProvider: Send + Sync {
    fn request_permission(&self) -> Result<bool>;
    fn current_position(&self) -> Result<RawSample>;
    fn watch(&self, options: WatchOptions, sink: SampleSink) -> Result<Box<dyn WatchHandle>>;
}

/// Invoked for every raw sample, accepted or not, together with the
/// filtering decision. Rejected samples still drive the live cursor.
pub type SampleListener = Box<dyn FnMut(&RawSample, FilterDecision) + Send>;

/// Wraps the positioning stream and runs the per-sample filter inside the
/// delivery callback. What happens to accepted points is the recorder's
/// business, not ours.
pub struct LocationService {
    provider: Arc<dyn PositionProvider>,
    filter: Arc<Mutex<GpsFilter>>,
    watch: Option<Box<dyn WatchHandle>>,
}

impl LocationService {
    pub fn new(provider: Arc<dyn PositionProvider>) -> Self {
        LocationService {
            provider,
            filter: Arc::new(Mutex::new(GpsFilter::new(TrackingConfig::default()))),
            watch: None,
        }
    }

    /// Subscribe to the position stream. Returns `false` (never panics or
    /// throws past this boundary) when the config is invalid, permission
    /// is missing, or the subscription cannot be created.
    pub fn start(&mut self, config: TrackingConfig, mut listener: SampleListener) -> bool {
        if self.watch.is_some() {
            warn!("[location_service] `start` called while already running");
            return false;
        }
        if let Err(e) = config.validate() {
            error!("[location_service] invalid tracking config: {e}");
            return false;
        }
        match self.provider.request_permission() {
            Ok(true) => (),
            Ok(false) => {
                warn!("[location_service] location permission not granted");
                return false;
            }
            Err(e) => {
                error!("[location_service] permission request failed: {e}");
                return false;
            }
        }

        *self.filter.lock().unwrap() = GpsFilter::new(config);

        let filter = Arc::clone(&self.filter);
        let sink: SampleSink = Box::new(move |sample| {
            let decision = filter.lock().unwrap().classify(&sample);
            listener(&sample, decision);
        });
        let options = WatchOptions {
            min_interval_ms: config.time_interval_ms,
            min_distance_m: config.distance_interval_m,
        };
        match self.provider.watch(options, sink) {
            Ok(handle) => {
                self.watch = Some(handle);
                info!(
                    "[location_service] started: interval={}ms distance={}m save>{}m jump<{}m accuracy<{}m",
                    config.time_interval_ms,
                    config.distance_interval_m,
                    config.save_threshold_m,
                    config.max_jump_distance_m,
                    config.accuracy_threshold_m
                );
                true
            }
            Err(e) => {
                error!("[location_service] failed to start watching: {e}");
                false
            }
        }
    }

    /// Cancel the subscription and clear the filter state. No-op when not
    /// running.
    pub fn stop(&mut self) {
        if let Some(handle) = self.watch.take() {
            handle.cancel();
            self.filter.lock().unwrap().reset();
            info!("[location_service] stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.watch.is_some()
    }

    /// Forget the last accepted point without touching the subscription.
    /// Called when a new recording starts against a running service.
    pub fn reset_filter_state(&self) {
        self.filter.lock().unwrap().reset();
    }

    /// One-shot position read, `None` when permission is missing or the
    /// read fails.
    pub fn current_position(&self) -> Option<RawSample> {
        match self.provider.request_permission() {
            Ok(true) => (),
            Ok(false) => return None,
            Err(e) => {
                error!("[location_service] permission request failed: {e}");
                return None;
            }
        }
        match self.provider.current_position() {
            Ok(sample) => Some(sample),
            Err(e) => {
                warn!("[location_service] failed to read current position: {e}");
                None
            }
        }
    }
}
