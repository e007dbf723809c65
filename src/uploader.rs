use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use crate::geo_utils::Coordinate;
use crate::route_api::RoutePersistence;

struct UploadJob {
    route_id: i64,
    coordinate: Coordinate,
}

/* Accepted points are handed to a dedicated worker thread through a
channel, so a slow or failing network call never blocks the GPS callback.
Delivery is at-most-once on purpose: a failed upload is logged and
dropped, there is no retry queue and no backfill. The local route stays
the source of truth for the session. */
#[derive(Clone)]
pub struct PointUploader {
    tx: mpsc::Sender<UploadJob>,
}

impl PointUploader {
    pub fn start(persistence: Arc<dyn RoutePersistence>) -> Self {
        let (tx, rx) = mpsc::channel::<UploadJob>();
        thread::spawn(move || {
            // FIFO drain; the thread exits once all senders are dropped.
            while let Ok(job) = rx.recv() {
                if let Err(e) = persistence.append_point(job.route_id, &job.coordinate) {
                    warn!(
                        "[uploader] dropping point for route {}: {:#}",
                        job.route_id, e
                    );
                }
            }
        });
        PointUploader { tx }
    }

    /// Queue one point for upload. Best-effort: if the worker is gone the
    /// job is silently discarded.
    pub fn enqueue(&self, route_id: i64, coordinate: Coordinate) {
        let _ = self.tx.send(UploadJob {
            route_id,
            coordinate,
        });
    }
}
