//! HTTP adapter for the fleet data API.
//!
//! Blocking client with bearer authentication; implements the
//! [`DecisionDataSource`] seam the engine consumes.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::auth::TokenProvider;
use crate::config::ApiConfig;
use crate::model::{GeoPoint, IncidentSituation, ResourcePlan, RouteGeometry, TravelEstimate, Vehicle};
use crate::traits::{DataSourceError, DecisionDataSource};

pub struct FleetApiClient {
    config: ApiConfig,
    http: reqwest::blocking::Client,
    auth: TokenProvider,
}

impl FleetApiClient {
    pub fn new(config: ApiConfig, auth: TokenProvider) -> Result<Self, reqwest::Error> {
        let http = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self { config, http, auth })
    }

    fn url(&self, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    fn bearer_token(&self, endpoint: &str) -> Result<String, DataSourceError> {
        self.auth
            .access_token()
            .map_err(|err| DataSourceError::Transport {
                endpoint: endpoint.to_string(),
                source: Box::new(err),
            })
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, DataSourceError> {
        let token = self.bearer_token(path)?;
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .map_err(|err| DataSourceError::Transport {
                endpoint: path.to_string(),
                source: Box::new(err),
            })?;
        decode_response(path, response)
    }

    fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, DataSourceError> {
        let token = self.bearer_token(path)?;
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(body)
            .send()
            .map_err(|err| DataSourceError::Transport {
                endpoint: path.to_string(),
                source: Box::new(err),
            })?;
        decode_response(path, response)
    }
}

fn decode_response<T: DeserializeOwned>(
    path: &str,
    response: reqwest::blocking::Response,
) -> Result<T, DataSourceError> {
    let status = response.status();
    if !status.is_success() {
        return Err(DataSourceError::Status {
            endpoint: path.to_string(),
            status: status.as_u16(),
        });
    }
    response.json().map_err(|err| DataSourceError::Decode {
        endpoint: path.to_string(),
        source: Box::new(err),
    })
}

#[derive(Serialize)]
struct RouteRequest {
    from: RoutePoint,
    to: RoutePoint,
}

#[derive(Serialize)]
struct RoutePoint {
    latitude: f64,
    longitude: f64,
}

impl From<GeoPoint> for RoutePoint {
    fn from(point: GeoPoint) -> Self {
        Self {
            latitude: point.latitude,
            longitude: point.longitude,
        }
    }
}

#[derive(Deserialize)]
struct RouteResponse {
    distance_m: Option<f64>,
    duration_s: Option<f64>,
    geometry: Option<RouteGeometry>,
}

impl DecisionDataSource for FleetApiClient {
    fn incident_situation(&self, incident_id: Uuid) -> Result<IncidentSituation, DataSourceError> {
        self.get_json(&format!("incidents/{incident_id}/situation"))
    }

    fn resource_plan(&self, incident_id: Uuid) -> Result<ResourcePlan, DataSourceError> {
        self.get_json(&format!("incidents/{incident_id}/resource-plan"))
    }

    fn list_vehicles(&self) -> Result<Vec<Vehicle>, DataSourceError> {
        self.get_json("vehicles")
    }

    fn estimate_travel(
        &self,
        from: GeoPoint,
        to: GeoPoint,
    ) -> Result<TravelEstimate, DataSourceError> {
        let response: RouteResponse = self.post_json(
            "routing/route",
            &RouteRequest {
                from: from.into(),
                to: to.into(),
            },
        )?;

        Ok(TravelEstimate {
            distance_km: response.distance_m.map(|meters| meters / 1000.0),
            duration_min: response.duration_s.map(|seconds| seconds / 60.0),
            geometry: response.geometry,
        })
    }
}
