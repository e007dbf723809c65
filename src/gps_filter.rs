use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::geo_utils::{haversine_distance, should_save_point, Coordinate};

/// Thresholds for one tracking session. `time_interval_ms` and
/// `distance_interval_m` are handed to the positioning subsystem,
/// the rest drive our own filtering.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TrackingConfig {
    pub time_interval_ms: u32,
    pub distance_interval_m: f64,
    pub save_threshold_m: f64,
    pub max_jump_distance_m: f64,
    pub accuracy_threshold_m: f32,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        TrackingConfig {
            time_interval_ms: 3000,
            distance_interval_m: 3.0,
            save_threshold_m: 2.0,
            max_jump_distance_m: 100.0,
            accuracy_threshold_m: 20.0,
        }
    }
}

impl TrackingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.save_threshold_m <= 0.0 {
            bail!(
                "save_threshold_m must be positive, got {}",
                self.save_threshold_m
            );
        }
        if self.max_jump_distance_m <= self.save_threshold_m {
            bail!(
                "max_jump_distance_m ({}) must be greater than save_threshold_m ({})",
                self.max_jump_distance_m,
                self.save_threshold_m
            );
        }
        if self.accuracy_threshold_m <= 0.0 {
            bail!(
                "accuracy_threshold_m must be positive, got {}",
                self.accuracy_threshold_m
            );
        }
        Ok(())
    }
}

/// One unfiltered reading from the positioning subsystem.
#[derive(Clone, Debug, PartialEq)]
pub struct RawSample {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp_ms: Option<i64>,
    pub accuracy: Option<f32>,
    pub altitude: Option<f32>,
    pub speed: Option<f32>,
}

impl RawSample {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FilterDecision {
    /// Passed all checks, extends the route.
    Accept,
    /// Reported accuracy radius above the threshold.
    PoorAccuracy,
    /// Implausible jump from the last accepted point.
    Outlier,
    /// Within the save threshold of the last accepted point.
    BelowThreshold,
}

impl FilterDecision {
    pub fn is_accept(&self) -> bool {
        *self == FilterDecision::Accept
    }
}

pub struct GpsFilter {
    config: TrackingConfig,
    last_accepted: Option<Coordinate>,
    last_accepted_at: Option<DateTime<Utc>>,
}

impl GpsFilter {
    pub fn new(config: TrackingConfig) -> Self {
        GpsFilter {
            config,
            last_accepted: None,
            last_accepted_at: None,
        }
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    pub fn last_accepted(&self) -> Option<Coordinate> {
        self.last_accepted
    }

    pub fn last_accepted_at(&self) -> Option<DateTime<Utc>> {
        self.last_accepted_at
    }

    /// Classify one raw sample. Checks run in order: accuracy, seed,
    /// jump, movement threshold. A sample with no reported accuracy
    /// passes the accuracy check.
    pub fn classify(&mut self, sample: &RawSample) -> FilterDecision {
        if let Some(accuracy) = sample.accuracy {
            if accuracy > self.config.accuracy_threshold_m {
                debug!("[gps_filter] poor accuracy: {accuracy:.1}m");
                return FilterDecision::PoorAccuracy;
            }
        }

        let coordinate = sample.coordinate();
        if let Some(last) = &self.last_accepted {
            let distance = haversine_distance(last, &coordinate);
            if distance > self.config.max_jump_distance_m {
                debug!("[gps_filter] jump too large: {distance:.1}m");
                return FilterDecision::Outlier;
            }
            if !should_save_point(&coordinate, Some(last), self.config.save_threshold_m) {
                return FilterDecision::BelowThreshold;
            }
        }

        self.last_accepted = Some(coordinate);
        self.last_accepted_at = Some(Utc::now());
        FilterDecision::Accept
    }

    /// Forget the last accepted point, so the next sample seeds a fresh
    /// route with no jump check against stale state.
    pub fn reset(&mut self) {
        self.last_accepted = None;
        self.last_accepted_at = None;
    }
}
