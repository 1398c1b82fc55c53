use async_trait::async_trait;
use rental_tracker_lib::{
    comms::{LoginRequest, ReportPayload, ServerMessage, ServerTripId, StartTripRequest, UpdateTripRequest},
    report::IncidentReport,
    trip::{BookingStatus, Trip},
    user::RenterSession,
};
use reqwest::{Client, Response, StatusCode, Url};
use serde_json::Value;

use crate::{
    config::ClientConfiguration, ADD_REPORT_PATH, END_TRIP_PATH, LOGIN_PATH, RECENT_TRIPS_PATH, RENTAL_STATUS_PATH,
    START_TRIP_PATH, UPDATE_TRIP_PATH,
};

use super::{ApiError, FleetApi};

const INVALID_CREDENTIALS: &str = "Invalid credentials. Please try again.";

/// `FleetApi` over HTTP/JSON.
#[derive(Clone)]
pub struct HttpFleetApi {
    client: Client,
    base_url: String,
}

impl HttpFleetApi {
    pub fn new(config: &ClientConfiguration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!("rental-tracker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Network(format!("Client build failed: {e}")))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// The trip id always becomes a single percent-encoded path segment, so it can never
    /// point the request at another endpoint.
    fn trip_url(&self, path: &str, trip_id: &ServerTripId) -> Result<Url, ApiError> {
        let mut url = Url::parse(&self.url(path)).map_err(|e| ApiError::Network(format!("Invalid url {}{path}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::Network(format!("Invalid base url {}", self.base_url)))?
            .pop_if_empty()
            .push(trip_id.as_str());
        Ok(url)
    }
}

fn request_error(err: reqwest::Error) -> ApiError {
    if err.is_decode() {
        ApiError::Decode(err.to_string())
    } else {
        ApiError::Network(err.to_string())
    }
}

/// Prefers the `Message` field of the body, falls back to the status text.
async fn error_message(response: Response) -> String {
    let status = response.status();
    let fallback = status.canonical_reason().unwrap_or("Request failed").to_string();

    match response.text().await {
        Ok(body) => serde_json::from_str::<ServerMessage>(&body)
            .ok()
            .and_then(|body| body.message)
            .unwrap_or(fallback),
        Err(_) => fallback,
    }
}

async fn ensure_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    Err(ApiError::Status {
        status: status.as_u16(),
        message: error_message(response).await,
    })
}

#[async_trait]
impl FleetApi for HttpFleetApi {
    async fn login(&self, email: &str, password: &str) -> Result<RenterSession, ApiError> {
        let response = self
            .client
            .post(self.url(LOGIN_PATH))
            .json(&LoginRequest::renter(email, password))
            .send()
            .await
            .map_err(request_error)?;

        if response.status() == StatusCode::UNAUTHORIZED {
            let message = match response.text().await {
                Ok(body) => serde_json::from_str::<ServerMessage>(&body).ok().and_then(|body| body.message),
                Err(_) => None,
            };
            return Err(ApiError::Unauthorized(message.unwrap_or_else(|| INVALID_CREDENTIALS.to_string())));
        }

        let renter = ensure_success(response).await?.json::<RenterSession>().await.map_err(request_error)?;

        if !renter.is_renter() {
            tracing::warn!("Rejected login for {} with role {}", renter.email, renter.role);
            return Err(ApiError::AccessDenied);
        }

        tracing::info!("Signed in renter {}", renter.renter_id);
        Ok(renter)
    }

    async fn rentals_by_status(&self, renter_id: i64, status: BookingStatus) -> Result<Vec<Trip>, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("{RENTAL_STATUS_PATH}{renter_id}")))
            .query(&[("status", status.as_str())])
            .send()
            .await
            .map_err(request_error)?;

        ensure_success(response).await?.json().await.map_err(request_error)
    }

    async fn recent_trips(&self, renter_id: i64) -> Result<Vec<Trip>, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("{RECENT_TRIPS_PATH}{renter_id}")))
            .send()
            .await
            .map_err(request_error)?;

        ensure_success(response).await?.json().await.map_err(request_error)
    }

    async fn submit_report(&self, report: &IncidentReport) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.url(ADD_REPORT_PATH))
            .json(&ReportPayload::from(report))
            .send()
            .await
            .map_err(request_error)?;

        ensure_success(response).await?;
        Ok(())
    }

    async fn start_trip(&self, request: &StartTripRequest) -> Result<ServerTripId, ApiError> {
        let response = self
            .client
            .post(self.url(START_TRIP_PATH))
            .json(request)
            .send()
            .await
            .map_err(request_error)?;

        let body = ensure_success(response).await?.text().await.map_err(request_error)?;

        // Some deployments answer with the bare id as text.
        let trip_id = match serde_json::from_str::<Value>(&body) {
            Ok(value) => ServerTripId::from_response(&value),
            Err(_) => ServerTripId::from_token(&body),
        };

        trip_id.ok_or_else(|| ApiError::Decode(format!("no trip id in start trip response: {body}")))
    }

    async fn update_trip(&self, trip_id: &ServerTripId, request: &UpdateTripRequest) -> Result<(), ApiError> {
        let response = self
            .client
            .put(self.trip_url(UPDATE_TRIP_PATH, trip_id)?)
            .json(request)
            .send()
            .await
            .map_err(request_error)?;

        ensure_success(response).await?;
        Ok(())
    }

    async fn end_trip(&self, trip_id: &ServerTripId) -> Result<(), ApiError> {
        let response = self
            .client
            .put(self.trip_url(END_TRIP_PATH, trip_id)?)
            .send()
            .await
            .map_err(request_error)?;

        ensure_success(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };

    use axum::{
        extract::{Path, Query, State},
        http::StatusCode,
        response::{IntoResponse, Response},
        routing::{get, post, put},
        Json, Router,
    };
    use chrono::{NaiveDate, NaiveTime, Utc};
    use rental_tracker_lib::{position::Position, report::IssueKind};
    use serde_json::json;

    use super::*;

    type Recorded = Arc<Mutex<Vec<(String, Value)>>>;

    async fn login(Json(body): Json<Value>) -> Response {
        match body["email"].as_str() {
            Some("ana@example.com") => Json(json!({
                "email": "ana@example.com", "role": body["role"], "userId": 1, "renterId": 5,
                "renterFname": "Ana", "renterLname": "Cruz", "rentedVehicleCount": 2, "upcomingRentCount": null
            }))
            .into_response(),
            Some("admin@example.com") => Json(json!({
                "email": "admin@example.com", "role": "admin", "userId": 2, "renterId": 0
            }))
            .into_response(),
            Some("silent@example.com") => StatusCode::UNAUTHORIZED.into_response(),
            _ => (StatusCode::UNAUTHORIZED, Json(json!({"Message": "Wrong password"}))).into_response(),
        }
    }

    async fn rentals(Path(renter_id): Path<i64>, Query(query): Query<HashMap<String, String>>) -> Json<Value> {
        let status = query.get("status").cloned().unwrap_or_default();
        Json(json!([{
            "rentedVehicleId": renter_id * 10, "vehicleId": 3, "car_model": status,
            "pickupDate": "2024-10-02", "pickupTime": "08:00:00"
        }]))
    }

    async fn start_trip(State(recorded): State<Recorded>, Json(body): Json<Value>) -> Json<Value> {
        recorded.lock().unwrap().push(("start".into(), body));
        Json(json!({"tripId": "T1"}))
    }

    async fn update_trip(State(recorded): State<Recorded>, Path(trip_id): Path<String>, Json(body): Json<Value>) -> StatusCode {
        recorded.lock().unwrap().push((format!("update {trip_id}"), body));
        StatusCode::OK
    }

    async fn end_trip(State(recorded): State<Recorded>, Path(trip_id): Path<String>) -> Response {
        if trip_id == "missing" {
            return (StatusCode::NOT_FOUND, Json(json!({"Message": "Trip not found"}))).into_response();
        }
        recorded.lock().unwrap().push((format!("end {trip_id}"), Value::Null));
        StatusCode::OK.into_response()
    }

    async fn add_report(State(recorded): State<Recorded>, Json(body): Json<Value>) -> StatusCode {
        recorded.lock().unwrap().push(("report".into(), body));
        StatusCode::CREATED
    }

    async fn serve() -> (HttpFleetApi, Recorded) {
        let recorded: Recorded = Arc::new(Mutex::new(Vec::new()));

        let app = Router::new()
            .route("/api/Login/login", post(login))
            .route("/api/Booking/rental-status/{renter_id}", get(rentals))
            .route("/api/Home/recent-trips/{renter_id}", get(|| async { Json(json!([])) }))
            .route("/api/Report/addReport", post(add_report))
            .route("/api/Location/start-trip", post(start_trip))
            .route("/api/Location/update-trip/{trip_id}", put(update_trip))
            .route("/api/Location/end-trip/{trip_id}", put(end_trip))
            .with_state(recorded.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = ClientConfiguration {
            api_base_url: format!("http://{addr}"),
            ..Default::default()
        };
        (HttpFleetApi::new(&config).unwrap(), recorded)
    }

    #[tokio::test]
    async fn login_as_renter() {
        let (api, _) = serve().await;

        let renter = api.login("ana@example.com", "secret").await.unwrap();
        assert_eq!(renter.renter_id, 5);
        assert_eq!(renter.rented_vehicle_count(), 2);
        assert_eq!(renter.upcoming_rent_count(), 0);
    }

    #[tokio::test]
    async fn login_failures() {
        let (api, _) = serve().await;

        assert_eq!(api.login("ana@example.org", "nope").await, Err(ApiError::Unauthorized("Wrong password".into())));
        assert_eq!(
            api.login("silent@example.com", "nope").await,
            Err(ApiError::Unauthorized(INVALID_CREDENTIALS.into()))
        );
        assert_eq!(api.login("admin@example.com", "secret").await, Err(ApiError::AccessDenied));
    }

    #[tokio::test]
    async fn rentals_pass_status_filter() {
        let (api, _) = serve().await;

        let trips = api.rentals_by_status(4, BookingStatus::Completed).await.unwrap();
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].rented_vehicle_id, 40);
        assert_eq!(trips[0].car_model, "Completed");

        assert!(api.recent_trips(4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn trip_lifecycle_requests() {
        let (api, recorded) = serve().await;
        let renter = api.login("ana@example.com", "secret").await.unwrap();
        let trip = Trip::new(31, 8, "Vios".into(), "2024-10-02".into(), "08:00:00".into());

        let trip_id = api.start_trip(&StartTripRequest::new(&renter, &trip, Utc::now())).await.unwrap();
        assert_eq!(trip_id, ServerTripId::new("T1"));

        let position = Position { latitude: 14.55, longitude: 121.02, speed: 3.5 };
        api.update_trip(&trip_id, &UpdateTripRequest::new(&position, Utc::now())).await.unwrap();
        api.end_trip(&trip_id).await.unwrap();

        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.len(), 3);
        assert_eq!(recorded[0].0, "start");
        assert_eq!(recorded[0].1["rented_vehicle_id"], 31);
        assert_eq!(recorded[1].0, "update T1");
        assert_eq!(recorded[1].1["location_latitude"], 14.55);
        assert_eq!(recorded[1].1["speed"], 3.5);
        assert_eq!(recorded[2].0, "end T1");
    }

    #[tokio::test]
    async fn end_trip_reports_server_message() {
        let (api, _) = serve().await;

        let err = api.end_trip(&ServerTripId::new("missing")).await.unwrap_err();
        assert_eq!(err, ApiError::Status { status: 404, message: "Trip not found".into() });
    }

    #[tokio::test]
    async fn submits_report() {
        let (api, recorded) = serve().await;
        let report = IncidentReport::new(
            5,
            IssueKind::FlatTire,
            NaiveDate::from_ymd_opt(2024, 10, 2).unwrap(),
            NaiveTime::from_hms_opt(17, 4, 9).unwrap(),
            "Front left",
            false,
        )
        .unwrap();

        api.submit_report(&report).await.unwrap();

        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded[0].1["nature_of_issue"], "Flat Tire");
        assert_eq!(recorded[0].1["date"], "2024-10-02");
        assert_eq!(recorded[0].1["time"], "17:04:09");
        assert_eq!(recorded[0].1["emergency"], "false");
    }

    async fn serve_start_body(body: &'static str) -> HttpFleetApi {
        let app = Router::new().route("/api/Location/start-trip", post(move || async move { body }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = ClientConfiguration {
            api_base_url: format!("http://{addr}"),
            ..Default::default()
        };
        HttpFleetApi::new(&config).unwrap()
    }

    fn start_request() -> StartTripRequest {
        let renter: RenterSession = serde_json::from_value(json!({
            "email": "ana@example.com", "role": "renter", "userId": 1, "renterId": 5
        }))
        .unwrap();
        let trip = Trip::new(31, 8, "Vios".into(), "2024-10-02".into(), "08:00:00".into());
        StartTripRequest::new(&renter, &trip, Utc::now())
    }

    #[tokio::test]
    async fn start_trip_accepts_plain_text_id() {
        let api = serve_start_body("T5").await;
        assert_eq!(api.start_trip(&start_request()).await, Ok(ServerTripId::new("T5")));
    }

    #[tokio::test]
    async fn start_trip_rejects_prose_body() {
        let api = serve_start_body("Trip started successfully").await;
        assert!(matches!(api.start_trip(&start_request()).await, Err(ApiError::Decode(_))));
    }

    #[tokio::test]
    async fn trip_id_stays_one_path_segment() {
        let (api, recorded) = serve().await;
        let position = Position { latitude: 14.55, longitude: 121.02, speed: 0.0 };

        api.update_trip(&ServerTripId::new("../end-trip/T7"), &UpdateTripRequest::new(&position, Utc::now()))
            .await
            .unwrap();
        api.end_trip(&ServerTripId::new("T7?force=1")).await.unwrap();

        let calls: Vec<String> = recorded.lock().unwrap().iter().map(|(call, _)| call.clone()).collect();
        assert_eq!(calls, vec!["update ../end-trip/T7", "end T7?force=1"]);
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() {
        let config = ClientConfiguration {
            api_base_url: "http://127.0.0.1:1/".into(),
            ..Default::default()
        };
        let api = HttpFleetApi::new(&config).unwrap();
        assert_eq!(api.base_url(), "http://127.0.0.1:1");

        assert!(matches!(api.end_trip(&ServerTripId::new("T1")).await, Err(ApiError::Network(_))));
    }
}
