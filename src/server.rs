use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::accounts::{self, AccountError, Session, User};
use crate::calc::leaderboard::load_leaderboard;
use crate::calc::{calculate_value, CalcError, Category, LeaderboardEntry};
use crate::config::Config;
use crate::forecast::{
    forecast_materials, historical_split, industry_average_split, predictor_from_config,
    BuildingProfile, BuildingUsage, WastePredictor,
};
use crate::output::xlsx::table_to_xlsx;
use crate::project::{
    MaterialRecord, MaterialUpdate, NewProject, Project, ProjectDetails, ProjectDetailsUpdate,
    ProjectError, DEFAULT_MATERIALS,
};
use crate::report::{build_chart, table_payload, ChartKind, ChartPayload, TablePayload};
use crate::store::{ProjectRepository, SqliteStore};

const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Clone)]
pub struct ApiState {
    config: Config,
    db_path: PathBuf,
    predictor: Arc<dyn WastePredictor>,
}

impl ApiState {
    pub fn new(config: Config, predictor: Arc<dyn WastePredictor>) -> Self {
        Self {
            db_path: config.resolved_db_path(),
            config,
            predictor,
        }
    }

    pub fn from_config(config: Config) -> Result<Self> {
        let predictor = predictor_from_config(&config.forecast)?;
        Ok(Self::new(config, predictor))
    }
}

#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    ok: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    ok: bool,
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    fn internal(error: impl std::fmt::Display) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
    }
}

impl From<AccountError> for ApiError {
    fn from(error: AccountError) -> Self {
        let status = match &error {
            AccountError::MissingFields => StatusCode::BAD_REQUEST,
            AccountError::EmailTaken => StatusCode::CONFLICT,
            AccountError::UnknownUser => StatusCode::NOT_FOUND,
            AccountError::WrongPassword | AccountError::Unauthenticated => {
                StatusCode::UNAUTHORIZED
            }
            AccountError::NotPermitted => StatusCode::FORBIDDEN,
            AccountError::Hash(_) | AccountError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, error.to_string())
    }
}

impl From<CalcError> for ApiError {
    fn from(error: CalcError) -> Self {
        Self::bad_request(error.to_string())
    }
}

impl From<ProjectError> for ApiError {
    fn from(error: ProjectError) -> Self {
        Self::bad_request(error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorBody {
            ok: false,
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
struct DeleteUserRequest {
    email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordRequest {
    #[serde(alias = "old_password")]
    old_password: String,
    #[serde(alias = "new_password")]
    new_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangeEmailRequest {
    password: String,
    #[serde(alias = "new_email")]
    new_email: String,
}

#[derive(Debug, Deserialize, Default)]
struct ProjectListQuery {
    #[serde(alias = "userId")]
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MaterialsRequest {
    materials: Vec<MaterialUpdate>,
}

#[derive(Debug, Deserialize)]
struct CalculateRequest {
    category: String,
    material: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PredictRequest {
    #[serde(default)]
    usage: String,
    #[serde(default)]
    gfa: f64,
    volume: Option<f64>,
    #[serde(default, alias = "floors")]
    floor: f64,
    #[serde(default, alias = "use_my_data")]
    use_my_data: bool,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct RegisterResponse {
    user: User,
    session: Session,
}

#[derive(Debug, Serialize)]
struct Deleted {
    deleted: bool,
}

#[derive(Debug, Serialize)]
struct Updated {
    updated: bool,
}

#[derive(Debug, Serialize)]
struct CalculateResponse {
    category: Category,
    material: Option<String>,
    value: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictResponse {
    total_waste: f64,
    materials: BTreeMap<String, MaterialRecord>,
}

pub fn build_router(state: ApiState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origin);
    Router::new()
        .route("/health", get(health))
        .route("/v1/users/register", post(register))
        .route("/v1/users/login", post(login))
        .route("/v1/users", get(list_users).delete(delete_user))
        .route("/v1/users/password", post(change_password))
        .route("/v1/users/email", post(change_email))
        .route("/v1/users/:id", get(get_user))
        .route("/v1/projects", post(create_project).get(list_projects))
        .route(
            "/v1/projects/:id",
            get(project_details)
                .patch(edit_project)
                .delete(delete_project),
        )
        .route(
            "/v1/projects/:id/materials",
            get(project_materials).post(update_materials),
        )
        .route("/v1/projects/:id/calculate", post(calculate))
        .route("/v1/projects/:id/charts/:kind", get(chart))
        .route("/v1/projects/:id/table", get(table))
        .route("/v1/projects/:id/export", get(export))
        .route("/v1/projects/:id/predict", post(predict))
        .route("/v1/leaderboard", get(leaderboard))
        .route("/v1/materials/defaults", get(default_materials))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn run_server(config: Config, bind: SocketAddr) -> Result<()> {
    let state = ApiState::from_config(config)?;
    info!(
        db = %state.db_path.display(),
        predictor = state.predictor.name(),
        "opening ledger"
    );
    // create the schema before the first request arrives
    SqliteStore::open(&state.db_path)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("REST API listening on http://{bind}");
    axum::serve(listener, app).await?;
    Ok(())
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match origin.parse::<HeaderValue>() {
        Ok(value) if origin != "*" => layer.allow_origin(value),
        _ => layer.allow_origin(Any),
    }
}

async fn health() -> Json<ApiResponse<HealthResponse>> {
    ok(HealthResponse { status: "ok" })
}

async fn register(
    State(state): State<ApiState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<RegisterResponse> {
    let store = open_store(&state)?;
    let (user, session) =
        accounts::register(&store, &request.name, &request.email, &request.password)?;
    Ok(ok(RegisterResponse { user, session }))
}

async fn login(
    State(state): State<ApiState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Session> {
    let store = open_store(&state)?;
    Ok(ok(accounts::login(&store, &request.name, &request.password)?))
}

async fn list_users(State(state): State<ApiState>, headers: HeaderMap) -> ApiResult<Vec<User>> {
    let store = open_store(&state)?;
    let actor = current_user(&store, &headers)?;
    Ok(ok(accounts::list_users(&store, &actor)?))
}

async fn get_user(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<User> {
    let store = open_store(&state)?;
    let actor = current_user(&store, &headers)?;
    Ok(ok(accounts::get_user(&store, &actor, &id)?))
}

async fn delete_user(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<DeleteUserRequest>,
) -> ApiResult<Deleted> {
    let store = open_store(&state)?;
    let actor = current_user(&store, &headers)?;
    accounts::delete_user(&store, &actor, &request.email)?;
    Ok(ok(Deleted { deleted: true }))
}

async fn change_password(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<ChangePasswordRequest>,
) -> ApiResult<Updated> {
    let store = open_store(&state)?;
    let user = current_user(&store, &headers)?;
    accounts::change_password(&store, &user, &request.old_password, &request.new_password)?;
    Ok(ok(Updated { updated: true }))
}

async fn change_email(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<ChangeEmailRequest>,
) -> ApiResult<Updated> {
    let store = open_store(&state)?;
    let user = current_user(&store, &headers)?;
    accounts::change_email(&store, &user, &request.password, &request.new_email)?;
    Ok(ok(Updated { updated: true }))
}

async fn create_project(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<NewProject>,
) -> ApiResult<ProjectDetails> {
    let store = open_store(&state)?;
    let user = current_user(&store, &headers)?;
    let project = Project::create(
        Uuid::new_v4().to_string(),
        user.id.clone(),
        request,
        &state.config.defaults,
    )?;
    if store
        .project_number_taken(&user.id, &project.number)
        .map_err(ApiError::internal)?
    {
        warn!(user_id = %user.id, number = %project.number, "duplicate project number");
        return Err(ApiError::conflict(
            "you already have a project with this number",
        ));
    }
    store.save_project(&project).map_err(ApiError::internal)?;
    info!(project_id = %project.id, user_id = %user.id, "project created");
    Ok(ok(project.details()))
}

async fn list_projects(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(query): Query<ProjectListQuery>,
) -> ApiResult<Vec<ProjectDetails>> {
    let store = open_store(&state)?;
    let user = current_user(&store, &headers)?;
    let owner = match query.user_id {
        Some(owner) if owner != user.id => {
            accounts::require_admin(&user)?;
            owner
        }
        _ => user.id.clone(),
    };
    let projects = store
        .projects_for_owner(&owner)
        .map_err(ApiError::internal)?;
    Ok(ok(projects.iter().map(Project::details).collect()))
}

async fn project_details(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<ProjectDetails> {
    let store = open_store(&state)?;
    let user = current_user(&store, &headers)?;
    let project = readable_project(&store, &user, &id)?;
    Ok(ok(project.details()))
}

async fn edit_project(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(request): Json<ProjectDetailsUpdate>,
) -> ApiResult<ProjectDetails> {
    let store = open_store(&state)?;
    let user = current_user(&store, &headers)?;
    let mut project = owned_project(&store, &user, &id)?;
    project.apply_details(request);
    store.save_project(&project).map_err(ApiError::internal)?;
    Ok(ok(project.details()))
}

async fn delete_project(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Deleted> {
    let store = open_store(&state)?;
    let user = current_user(&store, &headers)?;
    readable_project(&store, &user, &id)?;
    let deleted = store.delete_project(&id).map_err(ApiError::internal)?;
    info!(project_id = %id, user_id = %user.id, "project deleted");
    Ok(ok(Deleted { deleted }))
}

async fn project_materials(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<BTreeMap<String, MaterialRecord>> {
    let store = open_store(&state)?;
    let user = current_user(&store, &headers)?;
    Ok(ok(readable_project(&store, &user, &id)?.materials))
}

async fn update_materials(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(request): Json<MaterialsRequest>,
) -> ApiResult<BTreeMap<String, MaterialRecord>> {
    let store = open_store(&state)?;
    let user = current_user(&store, &headers)?;
    let mut project = owned_project(&store, &user, &id)?;
    project.upsert_materials(&request.materials, &state.config.defaults)?;
    store.save_project(&project).map_err(ApiError::internal)?;
    Ok(ok(project.materials))
}

async fn calculate(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(request): Json<CalculateRequest>,
) -> ApiResult<CalculateResponse> {
    let store = open_store(&state)?;
    let user = current_user(&store, &headers)?;
    let project = readable_project(&store, &user, &id)?;
    let category: Category = request.category.parse()?;
    let value = calculate_value(&project, category, request.material.as_deref())?;
    Ok(ok(CalculateResponse {
        category,
        material: request.material,
        value,
    }))
}

async fn chart(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((id, kind)): Path<(String, String)>,
) -> ApiResult<ChartPayload> {
    let kind: ChartKind = kind.parse().map_err(ApiError::bad_request)?;
    let store = open_store(&state)?;
    let user = current_user(&store, &headers)?;
    let project = readable_project(&store, &user, &id)?;
    Ok(ok(build_chart(&project, kind)?))
}

async fn table(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<TablePayload> {
    let store = open_store(&state)?;
    let user = current_user(&store, &headers)?;
    let project = readable_project(&store, &user, &id)?;
    Ok(ok(table_payload(&project)?))
}

async fn export(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> std::result::Result<Response, ApiError> {
    let store = open_store(&state)?;
    let user = current_user(&store, &headers)?;
    let project = readable_project(&store, &user, &id)?;
    let bytes = table_to_xlsx(&table_payload(&project)?).map_err(ApiError::internal)?;
    let disposition = format!("attachment; filename=\"{}.xlsx\"", export_stem(&project));
    Ok((
        [
            (CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

async fn predict(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(request): Json<PredictRequest>,
) -> ApiResult<PredictResponse> {
    if request.usage.trim().is_empty() || request.gfa <= 0.0 || request.floor <= 0.0 {
        return Err(ApiError::bad_request(
            "usage, gfa and floor are required fields",
        ));
    }
    let (user, split) = {
        let store = open_store(&state)?;
        let user = current_user(&store, &headers)?;
        owned_project(&store, &user, &id)?;
        let split = if request.use_my_data {
            let history = store
                .projects_for_owner(&user.id)
                .map_err(ApiError::internal)?;
            historical_split(&history)
        } else {
            industry_average_split()
        };
        (user, split)
    };

    let profile = BuildingProfile {
        usage: BuildingUsage::parse_lenient(&request.usage),
        gfa: request.gfa,
        volume: request.volume,
        floors: request.floor,
    };
    let total_waste = state.predictor.predict(&profile).await.map_err(|error| {
        warn!(project_id = %id, %error, "waste prediction failed");
        ApiError::internal(error)
    })?;

    let store = open_store(&state)?;
    let mut project = owned_project(&store, &user, &id)?;
    project.materials = forecast_materials(total_waste, &split, &state.config.defaults);
    store.save_project(&project).map_err(ApiError::internal)?;
    info!(project_id = %id, total_waste, "project materials replaced by forecast");
    Ok(ok(PredictResponse {
        total_waste,
        materials: project.materials,
    }))
}

async fn leaderboard(State(state): State<ApiState>) -> ApiResult<Vec<LeaderboardEntry>> {
    let store = open_store(&state)?;
    Ok(ok(load_leaderboard(&store).map_err(ApiError::internal)?))
}

async fn default_materials() -> Json<ApiResponse<Vec<&'static str>>> {
    ok(DEFAULT_MATERIALS.to_vec())
}

fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { ok: true, data })
}

fn open_store(state: &ApiState) -> std::result::Result<SqliteStore, ApiError> {
    SqliteStore::open(&state.db_path).map_err(ApiError::internal)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then_some(token)
}

fn current_user(store: &SqliteStore, headers: &HeaderMap) -> std::result::Result<User, ApiError> {
    let token = bearer_token(headers).ok_or(AccountError::Unauthenticated)?;
    Ok(accounts::authenticate(store, token)?)
}

fn find_project(store: &SqliteStore, id: &str) -> std::result::Result<Project, ApiError> {
    store
        .find_project(id)
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("project does not exist"))
}

/// The project if the user owns it or is an admin.
fn readable_project(
    store: &SqliteStore,
    user: &User,
    id: &str,
) -> std::result::Result<Project, ApiError> {
    let project = find_project(store, id)?;
    if project.owner_id != user.id && !user.is_admin() {
        warn!(project_id = %id, user_id = %user.id, "project access rejected");
        return Err(ApiError::unauthorized("project is not owned by you"));
    }
    Ok(project)
}

/// The project if the user owns it. Admins cannot edit other users' data.
fn owned_project(
    store: &SqliteStore,
    user: &User,
    id: &str,
) -> std::result::Result<Project, ApiError> {
    let project = find_project(store, id)?;
    if project.owner_id != user.id {
        warn!(project_id = %id, user_id = %user.id, "project edit rejected");
        return Err(ApiError::unauthorized("cannot edit a project not owned by you"));
    }
    Ok(project)
}

fn export_stem(project: &Project) -> String {
    let stem: String = project
        .name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if stem.trim_matches('_').is_empty() {
        "table_data".to_string()
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderMap;

    use super::*;

    #[test]
    fn bearer_token_requires_scheme_and_value() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc-123"));
        assert_eq!(bearer_token(&headers), Some("abc-123"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn account_errors_map_to_statuses() {
        let cases = [
            (AccountError::MissingFields, StatusCode::BAD_REQUEST),
            (AccountError::EmailTaken, StatusCode::CONFLICT),
            (AccountError::UnknownUser, StatusCode::NOT_FOUND),
            (AccountError::WrongPassword, StatusCode::UNAUTHORIZED),
            (AccountError::NotPermitted, StatusCode::FORBIDDEN),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status, status);
        }
        let calc = ApiError::from(CalcError::InvalidCategory("x".to_string()));
        assert_eq!(calc.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn export_file_name_is_sanitised() {
        let mut project = Project::create(
            "p",
            "u",
            NewProject {
                name: "Depot / Stage 2".to_string(),
                number: "1".to_string(),
                date: "2024-01-01".to_string(),
                ..NewProject::default()
            },
            &crate::project::MaterialDefaults::default(),
        )
        .unwrap();
        assert_eq!(export_stem(&project), "Depot___Stage_2");
        project.name = "///".to_string();
        assert_eq!(export_stem(&project), "table_data");
    }
}
