// GestAudit - Web Server
// REST API with Axum over the same SQLite store as the CLI

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post, put},
    Router,
};
use chrono::{Local, NaiveDate};
use gestaudit::{
    annual_csv, audit_csv, export_json, risks_csv, AnnualPlan, AnnualSummary, AppConfig, AppData, Audit,
    AuditError, AuditReport, AuditStage, AuditStore, AuditorProfile, CsvExport, CustomReportSection,
    DashboardStats, Finding, Institution, Recommendation, RecordRef, Risk, RiskSummary, BACKUP_FILE_NAME,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<AuditStore>>,
    config: Arc<AppConfig>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Response {
        (
            StatusCode::OK,
            Json(Self {
                success: true,
                data: Some(data),
                error: None,
            }),
        )
            .into_response()
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(message),
        }),
    )
        .into_response()
}

/// Domain errors keep their meaning as HTTP status codes.
fn failure(err: anyhow::Error) -> Response {
    let status = match err.downcast_ref::<AuditError>() {
        Some(AuditError::NotFound { .. }) => StatusCode::NOT_FOUND,
        Some(AuditError::ParentNotFound { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
        Some(AuditError::InvalidValue { .. }) => StatusCode::BAD_REQUEST,
        Some(AuditError::NotConfirmed { .. }) => StatusCode::CONFLICT,
        None => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("request failed: {:#}", err);
    }
    error_response(status, format!("{:#}", err))
}

impl AppState {
    fn lock(&self) -> Result<MutexGuard<'_, AuditStore>, Response> {
        self.store
            .lock()
            .map_err(|_| error_response(StatusCode::INTERNAL_SERVER_ERROR, "store lock poisoned".to_string()))
    }

    /// Run a read against the current snapshot.
    fn read<T: Serialize>(&self, f: impl FnOnce(&AppData) -> anyhow::Result<T>) -> Response {
        match self.lock() {
            Ok(store) => match f(store.data()) {
                Ok(value) => ApiResponse::ok(value),
                Err(e) => failure(e),
            },
            Err(resp) => resp,
        }
    }

    /// Run a write and answer with the reloaded full data.
    fn mutate(&self, f: impl FnOnce(&mut AuditStore) -> anyhow::Result<()>) -> Response {
        let mut store = match self.lock() {
            Ok(store) => store,
            Err(resp) => return resp,
        };
        match f(&mut store) {
            Ok(()) => ApiResponse::ok(store.data().clone()),
            Err(e) => failure(e),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct DeleteParams {
    #[serde(default)]
    confirm: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportParams {
    #[serde(default)]
    risk_matrix: bool,
}

#[derive(Debug, Default, Deserialize)]
struct DashboardParams {
    institution: Option<String>,
    today: Option<NaiveDate>,
}

// ============================================================================
// Read Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> Response {
    ApiResponse::ok("OK")
}

/// GET /api/data - Full snapshot
async fn get_data(State(state): State<AppState>) -> Response {
    state.read(|data| Ok(data.clone()))
}

/// GET /api/years - Years that have audits, newest first
async fn get_years(State(state): State<AppState>) -> Response {
    state.read(|data| Ok(data.years()))
}

/// GET /api/audits/:id/report?riskMatrix=bool
async fn get_audit_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ReportParams>,
) -> Response {
    state.read(|data| AuditReport::build(data, &id, params.risk_matrix))
}

/// GET /api/dashboard?institution=..&today=YYYY-MM-DD
async fn get_dashboard(State(state): State<AppState>, Query(params): Query<DashboardParams>) -> Response {
    let dashboard = state.config.dashboard.clone();
    state.read(|data| {
        let scoped = match &params.institution {
            Some(id) => {
                if data.institution(id).is_none() {
                    return Err(AuditError::NotFound {
                        entity: "institution",
                        id: id.clone(),
                    }
                    .into());
                }
                data.scoped_to_institution(id)
            }
            None => data.clone(),
        };
        let today = params.today.unwrap_or_else(|| Local::now().date_naive());
        Ok(DashboardStats::compute(
            &scoped,
            today,
            dashboard.deadline_window_days,
            dashboard.list_limit,
        ))
    })
}

/// GET /api/reports/annual/:year
async fn get_annual(State(state): State<AppState>, Path(year): Path<i32>) -> Response {
    state.read(|data| Ok(AnnualSummary::compute(data, year)))
}

/// GET /api/reports/plan/:year
async fn get_plan(State(state): State<AppState>, Path(year): Path<i32>) -> Response {
    state.read(|data| Ok(AnnualPlan::compute(data, year)))
}

/// GET /api/reports/risks/:year
async fn get_risk_summary(State(state): State<AppState>, Path(year): Path<i32>) -> Response {
    state.read(|data| Ok(RiskSummary::compute(data, year)))
}

// ============================================================================
// Downloads
// ============================================================================

fn download(file_name: &str, content_type: &str, body: String) -> Response {
    let disposition = format!(
        "attachment; filename*=UTF-8''{}",
        urlencoding::encode(file_name)
    );
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}

fn export(state: &AppState, f: impl FnOnce(&AppData) -> anyhow::Result<CsvExport>) -> Response {
    let store = match state.lock() {
        Ok(store) => store,
        Err(resp) => return resp,
    };
    match f(store.data()) {
        Ok(csv) => download(&csv.file_name, "text/csv; charset=utf-8", csv.content),
        Err(e) => failure(e),
    }
}

/// GET /api/export/json - Full backup as a download
async fn export_backup(State(state): State<AppState>) -> Response {
    let store = match state.lock() {
        Ok(store) => store,
        Err(resp) => return resp,
    };
    match export_json(store.data()) {
        Ok(json) => download(BACKUP_FILE_NAME, "application/json", json),
        Err(e) => failure(e),
    }
}

/// GET /api/export/csv/audit/:id
async fn export_audit_csv(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    export(&state, |data| audit_csv(data, &id))
}

/// GET /api/export/csv/annual/:year
async fn export_annual_csv(State(state): State<AppState>, Path(year): Path<i32>) -> Response {
    export(&state, |data| annual_csv(data, year))
}

/// GET /api/export/csv/risks/:year
async fn export_risks_csv(State(state): State<AppState>, Path(year): Path<i32>) -> Response {
    export(&state, |data| risks_csv(data, year))
}

// ============================================================================
// Write Handlers
// ============================================================================

async fn save_institution(State(state): State<AppState>, Json(record): Json<Institution>) -> Response {
    state.mutate(|store| store.save_institution(record).map(|_| ()))
}

async fn save_audit(State(state): State<AppState>, Json(record): Json<Audit>) -> Response {
    state.mutate(|store| store.save_audit(record).map(|_| ()))
}

async fn save_finding(State(state): State<AppState>, Json(record): Json<Finding>) -> Response {
    state.mutate(|store| store.save_finding(record).map(|_| ()))
}

async fn save_recommendation(State(state): State<AppState>, Json(record): Json<Recommendation>) -> Response {
    state.mutate(|store| store.save_recommendation(record).map(|_| ()))
}

async fn save_stage(State(state): State<AppState>, Json(record): Json<AuditStage>) -> Response {
    state.mutate(|store| store.save_stage(record).map(|_| ()))
}

async fn save_risk(State(state): State<AppState>, Json(record): Json<Risk>) -> Response {
    state.mutate(|store| store.save_risk(record).map(|_| ()))
}

async fn save_section(State(state): State<AppState>, Json(record): Json<CustomReportSection>) -> Response {
    state.mutate(|store| store.save_section(record).map(|_| ()))
}

/// PUT /api/profile
async fn save_profile(State(state): State<AppState>, Json(profile): Json<AuditorProfile>) -> Response {
    state.mutate(|store| store.save_profile(&profile))
}

/// POST /api/import?confirm=true - Replace everything with a backup
async fn import_backup(
    State(state): State<AppState>,
    Query(params): Query<DeleteParams>,
    Json(backup): Json<AppData>,
) -> Response {
    state.mutate(|store| store.import(&backup, params.confirm))
}

fn remove(state: &AppState, target: RecordRef, params: DeleteParams) -> Response {
    state.mutate(|store| store.delete(&target, params.confirm).map(|_| ()))
}

async fn delete_institution(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Response {
    remove(&state, RecordRef::Institution(id), params)
}

async fn delete_audit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Response {
    remove(&state, RecordRef::Audit(id), params)
}

async fn delete_finding(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Response {
    remove(&state, RecordRef::Finding(id), params)
}

async fn delete_recommendation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Response {
    remove(&state, RecordRef::Recommendation(id), params)
}

async fn delete_stage(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Response {
    remove(&state, RecordRef::Stage(id), params)
}

async fn delete_risk(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Response {
    remove(&state, RecordRef::Risk(id), params)
}

async fn delete_section(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Response {
    remove(&state, RecordRef::Section(id), params)
}

// ============================================================================
// Router
// ============================================================================

fn app(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/data", get(get_data))
        .route("/years", get(get_years))
        .route("/dashboard", get(get_dashboard))
        .route("/institutions", post(save_institution))
        .route("/institutions/:id", delete(delete_institution))
        .route("/audits", post(save_audit))
        .route("/audits/:id", delete(delete_audit))
        .route("/audits/:id/report", get(get_audit_report))
        .route("/findings", post(save_finding))
        .route("/findings/:id", delete(delete_finding))
        .route("/recommendations", post(save_recommendation))
        .route("/recommendations/:id", delete(delete_recommendation))
        .route("/stages", post(save_stage))
        .route("/stages/:id", delete(delete_stage))
        .route("/risks", post(save_risk))
        .route("/risks/:id", delete(delete_risk))
        .route("/sections", post(save_section))
        .route("/sections/:id", delete(delete_section))
        .route("/profile", put(save_profile))
        .route("/import", post(import_backup))
        .route("/reports/annual/:year", get(get_annual))
        .route("/reports/plan/:year", get(get_plan))
        .route("/reports/risks/:year", get(get_risk_summary))
        .route("/export/json", get(export_backup))
        .route("/export/csv/audit/:id", get(export_audit_csv))
        .route("/export/csv/annual/:year", get(export_annual_csv))
        .route("/export/csv/risks/:year", get(export_risks_csv))
        .with_state(state);

    Router::new().nest("/api", api_routes).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    )
}

// ============================================================================
// Main Server
// ============================================================================

fn init_tracing() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_env("GESTAUDIT_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))
}

async fn serve() -> anyhow::Result<()> {
    init_tracing()?;

    println!("🌐 GestAudit - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = AppConfig::load()?;
    let mut store = AuditStore::open(&config.database.path)?;
    println!("✓ Database opened: {}", config.database.path.display());

    if store.seed_if_empty()? {
        println!("✓ Empty database, demo data loaded");
    }

    let bind = config.server.bind.clone();
    let state = AppState {
        store: Arc::new(Mutex::new(store)),
        config: Arc::new(config),
    };

    let listener = tokio::net::TcpListener::bind(&bind).await?;

    println!("\n🚀 Server running on http://{}", bind);
    println!("   API: http://{}/api/data", bind);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app(state)).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = serve().await {
        eprintln!("❌ {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let mut store = AuditStore::open_in_memory().unwrap();
        store.seed_if_empty().unwrap();
        app(AppState {
            store: Arc::new(Mutex::new(store)),
            config: Arc::new(AppConfig::default()),
        })
    }

    async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health_and_data() {
        let app = test_app();
        let (status, body) = call(&app, get_req("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], "OK");

        let (status, body) = call(&app, get_req("/api/data")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["audits"].as_array().unwrap().len(), 4);
        println!("✅ Health/data endpoint test PASSED");
    }

    #[tokio::test]
    async fn test_cascade_delete_needs_confirmation() {
        let app = test_app();
        let delete_req = |uri: &str| Request::builder().method("DELETE").uri(uri).body(Body::empty()).unwrap();

        let (status, body) = call(&app, delete_req("/api/audits/1")).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("finding"));

        let (status, body) = call(&app, delete_req("/api/audits/1?confirm=true")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["audits"].as_array().unwrap().len(), 3);

        let (status, _) = call(&app, delete_req("/api/audits/1?confirm=true")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        println!("✅ Cascade delete endpoint test PASSED");
    }

    #[tokio::test]
    async fn test_save_risk_returns_scored_data() {
        let app = test_app();
        let payload = serde_json::json!({
            "auditId": "3",
            "description": "Contract renewals without bidding",
            "impact": "Catastrófico",
            "probability": "Quase Certo",
            "riskLevel": "Baixo",
            "controls": ""
        });
        let request = Request::builder()
            .method("POST")
            .uri("/api/risks")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap();

        let (status, body) = call(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        let risks = body["data"]["risks"].as_array().unwrap();
        let saved = risks
            .iter()
            .find(|r| r["description"] == "Contract renewals without bidding")
            .unwrap();
        assert_eq!(saved["riskLevel"], "Extremo");
        assert!(saved["id"].as_str().unwrap().starts_with("risk-"));
        println!("✅ Save risk endpoint test PASSED");
    }

    #[tokio::test]
    async fn test_orphan_is_rejected() {
        let app = test_app();
        let payload = serde_json::json!({
            "findingId": "missing",
            "recommendationCode": "R-99",
            "description": "x",
            "implementationResponsible": "y",
            "deadline": "2024-12-31",
            "status": "Pendente"
        });
        let request = Request::builder()
            .method("POST")
            .uri("/api/recommendations")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap();

        let (status, _) = call(&app, request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_report_and_csv_download() {
        let app = test_app();
        let (status, body) = call(&app, get_req("/api/audits/1/report?riskMatrix=true")).await;
        assert_eq!(status, StatusCode::OK);
        let titles: Vec<&str> = body["data"]["sections"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["title"].as_str().unwrap())
            .collect();
        assert!(titles.contains(&"Risk Matrix"));

        let response = app.clone().oneshot(get_req("/api/export/csv/annual/2024")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
        assert!(disposition.starts_with("attachment; filename*=UTF-8''"));
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.starts_with("\u{feff}".as_bytes()));
        println!("✅ Report/CSV endpoint test PASSED");
    }

    #[tokio::test]
    async fn test_dashboard_scoping() {
        let app = test_app();
        let (status, body) = call(&app, get_req("/api/dashboard?institution=inst-2&today=2024-08-20")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["totalAudits"], 2);

        let (status, _) = call(&app, get_req("/api/dashboard?institution=nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_dashboard_at_last_calendar_day_keeps_server_usable() {
        let app = test_app();
        let (status, body) = call(&app, get_req("/api/dashboard?today=%2B262142-12-31")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["nearDeadline"].as_array().unwrap().len(), 0);

        let (status, body) = call(&app, get_req("/api/data")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        println!("✅ Dashboard calendar-end endpoint test PASSED");
    }

    #[tokio::test]
    async fn test_import_over_profile_only_needs_confirmation() {
        let mut store = AuditStore::open_in_memory().unwrap();
        store
            .save_profile(&AuditorProfile {
                name: "Ana Costa".to_string(),
                ..AuditorProfile::default()
            })
            .unwrap();
        let app = app(AppState {
            store: Arc::new(Mutex::new(store)),
            config: Arc::new(AppConfig::default()),
        });

        let backup = export_json(&AppData::default()).unwrap();
        let import_req = |uri: &str| {
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(backup.clone()))
                .unwrap()
        };

        let (status, body) = call(&app, import_req("/api/import")).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("auditor profile"));

        let (status, body) = call(&app, import_req("/api/import?confirm=true")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["profile"]["name"], "");
    }
}
