use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::geo_utils::{haversine_distance, RoutePoint};
use crate::gps_filter::{RawSample, TrackingConfig};
use crate::location_service::{LocationService, SampleListener};
use crate::route_api::RoutePersistence;
use crate::uploader::PointUploader;

struct SessionState {
    is_tracking: bool,
    started_at: Option<DateTime<Utc>>,
    route_id: Option<i64>,
    route_points: Vec<RoutePoint>,
    total_distance_m: f64,
    current_position: Option<RawSample>,
}

impl SessionState {
    fn new() -> Self {
        SessionState {
            is_tracking: false,
            started_at: None,
            route_id: None,
            route_points: Vec::new(),
            total_distance_m: 0.0,
            current_position: None,
        }
    }
}

/// Owns the route being recorded: accumulates accepted points, keeps the
/// running distance, and hands every accepted point to the remote
/// persistence collaborator. One recorder drives one `LocationService`,
/// one session at a time.
pub struct TrackRecorder {
    service: LocationService,
    config: TrackingConfig,
    dog_id: i64,
    persistence: Arc<dyn RoutePersistence>,
    uploader: PointUploader,
    state: Arc<Mutex<SessionState>>,
}

impl TrackRecorder {
    pub fn new(
        service: LocationService,
        config: TrackingConfig,
        dog_id: i64,
        persistence: Arc<dyn RoutePersistence>,
    ) -> Self {
        let uploader = PointUploader::start(Arc::clone(&persistence));
        TrackRecorder {
            service,
            config,
            dog_id,
            persistence,
            uploader,
            state: Arc::new(Mutex::new(SessionState::new())),
        }
    }

    /// Begin a recording session: create the remote route, then start the
    /// location stream. `false` means nothing changed, neither locally
    /// nor in the service (permission denied, stream failure, or the
    /// remote route could not be created).
    pub fn start_tracking(&mut self) -> bool {
        if self.state.lock().unwrap().is_tracking {
            warn!("[track_recorder] `start_tracking` called while already tracking");
            return false;
        }

        // prime the live cursor so the map has a position before the
        // first stream sample arrives
        if let Some(position) = self.service.current_position() {
            self.state.lock().unwrap().current_position = Some(position);
        }

        let route_id = match self.persistence.create_route(self.dog_id) {
            Ok(id) => id,
            Err(e) => {
                error!("[track_recorder] failed to create remote route: {e:#}");
                return false;
            }
        };

        // route id must be visible to the listener before the first
        // sample can arrive
        self.state.lock().unwrap().route_id = Some(route_id);

        let listener = self.make_listener();
        if !self.service.start(self.config, listener) {
            self.state.lock().unwrap().route_id = None;
            return false;
        }

        let mut state = self.state.lock().unwrap();
        state.is_tracking = true;
        state.started_at = Some(Utc::now());
        info!("[track_recorder] recording started, route_id={route_id}");
        true
    }

    /// End the session. The recorded route stays available for display
    /// until `clear_route`. Uploads already queued are left to finish or
    /// fail on their own.
    pub fn stop_tracking(&mut self) {
        self.service.stop();
        let mut state = self.state.lock().unwrap();
        if state.is_tracking {
            state.is_tracking = false;
            info!(
                "[track_recorder] recording stopped: {} points, {:.1}m",
                state.route_points.len(),
                state.total_distance_m
            );
        }
    }

    /// Drop the recorded route and reset the filter, so the next session
    /// starts from a clean slate.
    pub fn clear_route(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.route_points.clear();
        state.total_distance_m = 0.0;
        state.route_id = None;
        state.started_at = None;
        drop(state);
        self.service.reset_filter_state();
        info!("[track_recorder] route cleared");
    }

    fn make_listener(&self) -> SampleListener {
        let state = Arc::clone(&self.state);
        let uploader = self.uploader.clone();
        Box::new(move |sample: &RawSample, decision| {
            let mut state = state.lock().unwrap();
            // every sample updates the live cursor, accepted or not
            state.current_position = Some(sample.clone());
            if !decision.is_accept() {
                return;
            }

            let point = RoutePoint {
                coordinate: sample.coordinate(),
                timestamp: Utc::now(),
            };
            let delta = state
                .route_points
                .last()
                .map(|last| haversine_distance(&last.coordinate, &point.coordinate));
            if let Some(delta) = delta {
                state.total_distance_m += delta;
            }
            state.route_points.push(point);

            match state.route_id {
                Some(route_id) => uploader.enqueue(route_id, point.coordinate),
                None => warn!("[track_recorder] accepted point with no remote route"),
            }
        })
    }

    pub fn is_tracking(&self) -> bool {
        self.state.lock().unwrap().is_tracking
    }

    pub fn route_points(&self) -> Vec<RoutePoint> {
        self.state.lock().unwrap().route_points.clone()
    }

    pub fn total_distance_m(&self) -> f64 {
        self.state.lock().unwrap().total_distance_m
    }

    pub fn current_position(&self) -> Option<RawSample> {
        self.state.lock().unwrap().current_position.clone()
    }

    pub fn route_id(&self) -> Option<i64> {
        self.state.lock().unwrap().route_id
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().unwrap().started_at
    }
}
