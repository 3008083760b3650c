use std::fmt;
use std::net::SocketAddr;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use contracts::{
    ApiError, ErrorCode, IncidentKind, IncidentRecord, IncidentStatus, Location, Severity,
    SystemSnapshot, UnitState, SCHEMA_VERSION_V1,
};
use muster_core::oracle::{determine_requirements, IncidentDraft, OracleError};
use muster_core::{Runtime, TransportError};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Debug)]
pub enum ServerError {
    Io(std::io::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "server io error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<std::io::Error> for ServerError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

#[derive(Debug)]
struct HttpApiError {
    status: StatusCode,
    error: ApiError,
}

impl HttpApiError {
    fn incident_not_found(incident_id: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error: ApiError::new(
                ErrorCode::IncidentNotFound,
                "incident_id does not match a known incident",
                Some(format!("incident_id={incident_id}")),
            ),
        }
    }

    fn invalid_request(message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: ApiError::new(ErrorCode::InvalidRequest, message, details),
        }
    }

    fn negotiation_finished(incident_id: &str) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            error: ApiError::new(
                ErrorCode::InvalidRequest,
                "incident negotiation already finished",
                Some(format!("incident_id={incident_id}")),
            ),
        }
    }

    fn from_oracle(err: OracleError) -> Self {
        match err {
            OracleError::Malformed(detail) => {
                Self::invalid_request("report could not be parsed", Some(detail))
            }
            OracleError::Unavailable(detail) => Self {
                status: StatusCode::SERVICE_UNAVAILABLE,
                error: ApiError::new(
                    ErrorCode::OracleUnavailable,
                    "interpretation backend unavailable",
                    Some(detail),
                ),
            },
        }
    }
}

impl IntoResponse for HttpApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}

#[derive(Clone)]
struct AppState {
    runtime: Runtime,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Incident intake: either a structured submission from an integrated
/// dispatch system, or a free-text report routed through the oracle.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SubmitIncidentRequest {
    Structured(StructuredIncident),
    FreeText(FreeTextReport),
}

#[derive(Debug, Deserialize)]
struct StructuredIncident {
    kind: IncidentKind,
    severity: Severity,
    location: Location,
    description: Option<String>,
    estimated_impact: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct FreeTextReport {
    report: String,
    location: Option<Location>,
}

#[derive(Debug, Serialize)]
struct SubmitIncidentResponse {
    schema_version: String,
    incident: IncidentRecord,
}

#[derive(Debug, Deserialize)]
struct ListIncidentsQuery {
    status: Option<IncidentStatus>,
}

#[derive(Debug, Serialize)]
struct ListIncidentsResponse {
    schema_version: String,
    incidents: Vec<IncidentRecord>,
}

#[derive(Debug, Serialize)]
struct GetIncidentResponse {
    schema_version: String,
    incident: IncidentRecord,
}

#[derive(Debug, Serialize)]
struct CancelIncidentResponse {
    schema_version: String,
    incident_id: String,
    cancellation_requested: bool,
}

#[derive(Debug, Serialize)]
struct ListUnitsResponse {
    schema_version: String,
    units: Vec<UnitState>,
}

#[derive(Debug, Serialize)]
struct SnapshotResponse {
    schema_version: String,
    snapshot: SystemSnapshot,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    schema_version: String,
    incidents_total: usize,
    incidents_open: usize,
    incidents_resolved: usize,
    units_total: usize,
    units_engaged: usize,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn submit_incident(
    State(state): State<AppState>,
    Json(request): Json<SubmitIncidentRequest>,
) -> Result<(StatusCode, Json<SubmitIncidentResponse>), HttpApiError> {
    let record = match request {
        SubmitIncidentRequest::Structured(body) => {
            let requirements = determine_requirements(body.kind, body.severity);
            state.runtime.submit(IncidentDraft {
                kind: body.kind,
                severity: body.severity,
                location: body.location,
                status: IncidentStatus::Reported,
                requirements,
                estimated_impact: body.estimated_impact.unwrap_or(0),
                description: body.description,
            })
        }
        SubmitIncidentRequest::FreeText(body) => {
            let location = body
                .location
                .unwrap_or_else(|| map_center(&state.runtime));
            state
                .runtime
                .submit_report(&body.report, location)
                .map_err(HttpApiError::from_oracle)?
                .ok_or_else(|| {
                    HttpApiError::invalid_request(
                        "report did not describe an actionable incident",
                        None,
                    )
                })?
        }
    };

    info!(incident = %record.incident_id, "incident accepted over http");
    Ok((
        StatusCode::CREATED,
        Json(SubmitIncidentResponse {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            incident: record,
        }),
    ))
}

async fn list_incidents(
    State(state): State<AppState>,
    Query(query): Query<ListIncidentsQuery>,
) -> Json<ListIncidentsResponse> {
    let snapshot = state.runtime.board().snapshot();
    let incidents = snapshot
        .incidents
        .into_values()
        .filter(|record| query.status.map_or(true, |status| record.status == status))
        .collect();

    Json(ListIncidentsResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        incidents,
    })
}

async fn get_incident(
    State(state): State<AppState>,
    Path(incident_id): Path<String>,
) -> Result<Json<GetIncidentResponse>, HttpApiError> {
    let incident = state
        .runtime
        .board()
        .incident(&incident_id)
        .ok_or_else(|| HttpApiError::incident_not_found(&incident_id))?;

    Ok(Json(GetIncidentResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        incident,
    }))
}

async fn cancel_incident(
    State(state): State<AppState>,
    Path(incident_id): Path<String>,
) -> Result<Json<CancelIncidentResponse>, HttpApiError> {
    let Some(record) = state.runtime.board().incident(&incident_id) else {
        return Err(HttpApiError::incident_not_found(&incident_id));
    };
    if matches!(
        record.status,
        IncidentStatus::Resolved | IncidentStatus::Cancelled
    ) {
        return Err(HttpApiError::negotiation_finished(&incident_id));
    }

    match state.runtime.cancel_incident(&incident_id) {
        Ok(()) => Ok(Json(CancelIncidentResponse {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            incident_id,
            cancellation_requested: true,
        })),
        // The auctioneer has already left the bus.
        Err(TransportError::UnknownReceiver(_)) | Err(TransportError::MailboxClosed(_)) => {
            Err(HttpApiError::negotiation_finished(&incident_id))
        }
    }
}

async fn list_units(State(state): State<AppState>) -> Json<ListUnitsResponse> {
    let snapshot = state.runtime.board().snapshot();
    Json(ListUnitsResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        units: snapshot.units.into_values().collect(),
    })
}

async fn get_snapshot(State(state): State<AppState>) -> Json<SnapshotResponse> {
    Json(SnapshotResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        snapshot: state.runtime.board().snapshot(),
    })
}

async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let snapshot = state.runtime.board().snapshot();
    let incidents_total = snapshot.incidents.len();
    let incidents_resolved = snapshot
        .incidents
        .values()
        .filter(|record| record.status == IncidentStatus::Resolved)
        .count();
    let incidents_open = snapshot
        .incidents
        .values()
        .filter(|record| {
            !matches!(
                record.status,
                IncidentStatus::Resolved | IncidentStatus::Cancelled
            )
        })
        .count();
    let units_engaged = snapshot
        .units
        .values()
        .filter(|unit| unit.current_incident.is_some())
        .count();

    Json(StatusResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        incidents_total,
        incidents_open,
        incidents_resolved,
        units_total: snapshot.units.len(),
        units_engaged,
    })
}

fn map_center(runtime: &Runtime) -> Location {
    let bounds = runtime.config().map_bounds;
    Location::new(
        (bounds.min_x + bounds.max_x) / 2.0,
        (bounds.min_y + bounds.max_y) / 2.0,
    )
}

// ---------------------------------------------------------------------------
// Router and entry point
// ---------------------------------------------------------------------------

pub fn router(runtime: Runtime) -> Router {
    let state = AppState { runtime };
    Router::new()
        .route("/api/v1/incidents", post(submit_incident).get(list_incidents))
        .route("/api/v1/incidents/{incident_id}", get(get_incident))
        .route(
            "/api/v1/incidents/{incident_id}/cancel",
            post(cancel_incident),
        )
        .route("/api/v1/units", get(list_units))
        .route("/api/v1/snapshot", get(get_snapshot))
        .route("/api/v1/status", get(get_status))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, runtime: Runtime) -> Result<(), ServerError> {
    let app = router(runtime);
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "http surface listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::EngineConfig;

    fn test_state() -> AppState {
        AppState {
            runtime: Runtime::new(EngineConfig::default()),
        }
    }

    #[tokio::test]
    async fn structured_submission_creates_an_incident() {
        let state = test_state();
        let request = SubmitIncidentRequest::Structured(StructuredIncident {
            kind: IncidentKind::Fire,
            severity: Severity::High,
            location: Location::new(30.0, 40.0),
            description: Some("warehouse fire".to_string()),
            estimated_impact: Some(3),
        });

        let (status, Json(response)) = submit_incident(State(state.clone()), Json(request))
            .await
            .expect("submission accepted");

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(response.incident.incident_id, "inc_0001");
        assert_eq!(response.incident.estimated_impact, 3);
        assert!(state
            .runtime
            .board()
            .incident(&response.incident.incident_id)
            .is_some());
        state.runtime.shutdown();
    }

    #[tokio::test]
    async fn free_text_submission_routes_through_the_oracle() {
        let state = test_state();
        let request = SubmitIncidentRequest::FreeText(FreeTextReport {
            report: "severe fire, people trapped".to_string(),
            location: None,
        });

        let (_, Json(response)) = submit_incident(State(state.clone()), Json(request))
            .await
            .expect("submission accepted");

        assert_eq!(response.incident.kind, IncidentKind::Fire);
        // No location given: the report lands at the center of the map.
        assert!((response.incident.location.x - 50.0).abs() < 1e-9);
        state.runtime.shutdown();
    }

    #[tokio::test]
    async fn empty_report_is_rejected() {
        let state = test_state();
        let request = SubmitIncidentRequest::FreeText(FreeTextReport {
            report: "   ".to_string(),
            location: None,
        });

        let err = submit_incident(State(state.clone()), Json(request))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        state.runtime.shutdown();
    }

    #[tokio::test]
    async fn unknown_incident_lookup_is_404() {
        let state = test_state();
        let err = get_incident(State(state.clone()), Path("inc_9999".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.error.code, ErrorCode::IncidentNotFound);
        state.runtime.shutdown();
    }

    #[tokio::test]
    async fn status_counts_open_and_resolved_incidents() {
        let state = test_state();
        let request = SubmitIncidentRequest::Structured(StructuredIncident {
            kind: IncidentKind::Medical,
            severity: Severity::Medium,
            location: Location::new(10.0, 10.0),
            description: None,
            estimated_impact: None,
        });
        submit_incident(State(state.clone()), Json(request))
            .await
            .expect("submission accepted");

        let Json(status) = get_status(State(state.clone())).await;
        assert_eq!(status.incidents_total, 1);
        assert_eq!(status.incidents_open, 1);
        assert_eq!(status.incidents_resolved, 0);
        state.runtime.shutdown();
    }

    #[tokio::test]
    async fn intake_request_json_is_disambiguated_by_shape() {
        let structured: SubmitIncidentRequest = serde_json::from_value(serde_json::json!({
            "kind": "fire",
            "severity": "high",
            "location": {"x": 10.0, "y": 20.0}
        }))
        .expect("structured shape parses");
        assert!(matches!(structured, SubmitIncidentRequest::Structured(_)));

        let free_text: SubmitIncidentRequest = serde_json::from_value(serde_json::json!({
            "report": "smoke over the river district"
        }))
        .expect("free-text shape parses");
        assert!(matches!(free_text, SubmitIncidentRequest::FreeText(_)));
    }
}
