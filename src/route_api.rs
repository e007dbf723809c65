use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::geo_utils::{total_distance, Coordinate, RoutePoint};

/// The remote collaborator the recorder persists through. `create_route`
/// is called once at session start, `append_point` once per accepted
/// point (best-effort, see `uploader`).
pub trait RoutePersistence: Send + Sync {
    fn create_route(&self, dog_id: i64) -> Result<i64>;
    fn append_point(&self, route_id: i64, coordinate: &Coordinate) -> Result<()>;
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Route {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "userId")]
    pub user_id: i64,
    #[serde(rename = "dogId")]
    pub dog_id: i64,
    #[serde(rename = "pointCount")]
    pub point_count: u32,
    #[serde(rename = "createdTime")]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(rename = "updatedTime")]
    pub updated_time: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PersistedPoint {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "routeId")]
    pub route_id: i64,
    pub longitude: f64,
    pub latitude: f64,
    #[serde(rename = "createdTime")]
    pub created_time: Option<DateTime<Utc>>,
}

impl PersistedPoint {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RouteDetail {
    pub route: Route,
    #[serde(rename = "routePoints")]
    pub route_points: Vec<PersistedPoint>,
}

impl RouteDetail {
    /// Distance re-derived from the persisted points. Independent from
    /// the recorder's running total: points whose upload failed are
    /// simply missing here, there is no reconciliation.
    pub fn total_distance_m(&self) -> f64 {
        let points: Vec<RoutePoint> = self
            .route_points
            .iter()
            .map(|p| RoutePoint {
                coordinate: p.coordinate(),
                timestamp: p.created_time.unwrap_or_default(),
            })
            .collect();
        total_distance(&points)
    }
}

// every endpoint wraps its payload in this envelope, `code != 0` is an
// application-level failure even on HTTP 200
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    code: i32,
    data: Option<T>,
    message: Option<String>,
}

#[derive(Serialize)]
struct CreateRouteRequest {
    #[serde(rename = "dogId")]
    dog_id: i64,
}

#[derive(Serialize)]
struct UpdateRouteLocationRequest {
    #[serde(rename = "routeId")]
    route_id: i64,
    longitude: f64,
    latitude: f64,
}

pub struct RouteApiClient {
    base_url: String,
    http: reqwest::blocking::Client,
    token: Mutex<Option<String>>,
}

impl RouteApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(RouteApiClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            token: Mutex::new(None),
        })
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.token.lock().unwrap() = token;
    }

    fn check_code<T>(response: &ApiResponse<T>, endpoint: &str) -> Result<()> {
        if response.code != 0 {
            bail!(
                "{} failed: code={} message={}",
                endpoint,
                response.code,
                response.message.clone().unwrap_or_default()
            );
        }
        Ok(())
    }

    fn unwrap_envelope<T>(response: ApiResponse<T>, endpoint: &str) -> Result<T> {
        Self::check_code(&response, endpoint)?;
        response
            .data
            .ok_or_else(|| anyhow!("{} returned no data", endpoint))
    }

    fn with_auth(
        &self,
        builder: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match self.token.lock().unwrap().as_deref() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn post_envelope<B: Serialize, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<ApiResponse<T>> {
        let url = format!("{}{}", self.base_url, endpoint);
        let builder = self.with_auth(self.http.post(url).json(body));
        let response = builder.send()?.error_for_status()?;
        Ok(response.json::<ApiResponse<T>>()?)
    }

    fn post<B: Serialize, T: DeserializeOwned>(&self, endpoint: &str, body: &B) -> Result<T> {
        Self::unwrap_envelope(self.post_envelope(endpoint, body)?, endpoint)
    }

    fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, endpoint);
        let builder = self.with_auth(self.http.get(url));
        let response = builder.send()?.error_for_status()?;
        Self::unwrap_envelope(response.json::<ApiResponse<T>>()?, endpoint)
    }

    pub fn list_routes(&self) -> Result<Vec<Route>> {
        self.get("/route/listAllRoutes")
    }

    pub fn get_route_detail(&self, route_id: i64) -> Result<RouteDetail> {
        self.get(&format!("/route/getRouteDetail?routeId={route_id}"))
    }
}

impl RoutePersistence for RouteApiClient {
    fn create_route(&self, dog_id: i64) -> Result<i64> {
        let route: Route = self.post("/route/createRoute", &CreateRouteRequest { dog_id })?;
        info!("[route_api] created route {} for dog {}", route.id, dog_id);
        Ok(route.id)
    }

    fn append_point(&self, route_id: i64, coordinate: &Coordinate) -> Result<()> {
        // this endpoint returns `data: null` on success, only `code` matters
        let response: ApiResponse<serde_json::Value> = self.post_envelope(
            "/route/updateRouteLocation",
            &UpdateRouteLocationRequest {
                route_id,
                longitude: coordinate.longitude,
                latitude: coordinate.latitude,
            },
        )?;
        Self::check_code(&response, "/route/updateRouteLocation")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_route_list() {
        let body = r#"{
            "code": 0,
            "data": [{
                "ID": 12,
                "userId": 3,
                "dogId": 7,
                "pointCount": 148,
                "createdTime": "2025-05-04T09:12:44Z",
                "updatedTime": "2025-05-04T09:58:01Z"
            }],
            "message": "ok"
        }"#;
        let response: ApiResponse<Vec<Route>> = serde_json::from_str(body).unwrap();
        let routes = RouteApiClient::unwrap_envelope(response, "/route/listAllRoutes").unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].id, 12);
        assert_eq!(routes[0].dog_id, 7);
        assert_eq!(routes[0].point_count, 148);
    }

    #[test]
    fn parse_route_detail() {
        let body = r#"{
            "code": 0,
            "data": {
                "route": {
                    "ID": 12,
                    "userId": 3,
                    "dogId": 7,
                    "pointCount": 2,
                    "createdTime": null,
                    "updatedTime": null
                },
                "routePoints": [
                    {"ID": 1, "routeId": 12, "longitude": 8.5417, "latitude": 47.3769, "createdTime": null},
                    {"ID": 2, "routeId": 12, "longitude": 8.5421, "latitude": 47.3775, "createdTime": null}
                ]
            },
            "message": ""
        }"#;
        let response: ApiResponse<RouteDetail> = serde_json::from_str(body).unwrap();
        let detail = RouteApiClient::unwrap_envelope(response, "/route/getRouteDetail").unwrap();
        assert_eq!(detail.route_points.len(), 2);
        assert_eq!(detail.route_points[0].coordinate().latitude, 47.3769);

        // ~67m north, ~30m east
        let distance = detail.total_distance_m();
        assert!(distance > 60.0 && distance < 90.0, "distance = {distance}");
    }

    #[test]
    fn non_zero_code_is_an_error() {
        let body = r#"{"code": 1102, "data": null, "message": "dog not found"}"#;
        let response: ApiResponse<Vec<Route>> = serde_json::from_str(body).unwrap();
        let err = RouteApiClient::unwrap_envelope(response, "/route/listAllRoutes").unwrap_err();
        assert!(err.to_string().contains("dog not found"));
    }

    #[test]
    fn request_bodies_use_wire_casing() {
        let body = serde_json::to_value(UpdateRouteLocationRequest {
            route_id: 9,
            longitude: 8.54,
            latitude: 47.37,
        })
        .unwrap();
        assert_eq!(body["routeId"], 9);
        assert_eq!(body["longitude"], 8.54);
        assert!(body.get("route_id").is_none());
    }
}
