use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::export::export_csv;
use crate::filter::DateRange;
use crate::models::{
    parse_date, Bill, BillListResponse, BillQuery, CreateBillRequest, UpdateBillRequest,
};
use crate::reports::{build_report, summarize_bills, summarize_users, Report, ReportPeriod};
use crate::storage::BillStorage;
use crate::upload::{start_upload, UploadLimits, UploadRequest, UploadResult};
use crate::user_models::{
    CreateUserRequest, UpdateUserRequest, User, UserListResponse, UserQuery,
};
use crate::user_storage::UserStorage;

pub struct AppState {
    pub bills: BillStorage,
    pub users: UserStorage,
    pub upload_limits: UploadLimits,
}

pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.upload_limits.request_body_limit();

    Router::new()
        .route("/bills", get(list_bills).post(create_bill))
        .route("/bills/export", get(export_bills))
        .route(
            "/bills/:id",
            get(get_bill).put(update_bill).delete(delete_bill),
        )
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", get(get_user).put(update_user).delete(delete_user))
        .route("/uploads", post(commit_upload))
        .route("/uploads/preview", post(preview_upload))
        .route("/reports", get(get_report))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

async fn list_bills(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BillQuery>,
) -> AppResult<Json<BillListResponse>> {
    let criteria = query.into_criteria()?;
    let bills = state.bills.find_bills(&criteria).await?;
    let summary = summarize_bills(&bills);
    Ok(Json(BillListResponse { bills, summary }))
}

async fn create_bill(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateBillRequest>,
) -> AppResult<(StatusCode, Json<Bill>)> {
    let bill = payload.into_bill()?;
    let saved = state.bills.add_bill(bill).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

async fn get_bill(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<Bill>> {
    Ok(Json(state.bills.get_bill(&id).await?))
}

async fn update_bill(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateBillRequest>,
) -> AppResult<Json<Bill>> {
    Ok(Json(state.bills.update_bill(&id, payload).await?))
}

async fn delete_bill(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.bills.delete_bill(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn export_bills(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BillQuery>,
) -> AppResult<impl IntoResponse> {
    let criteria = query.into_criteria()?;
    let bills = state.bills.find_bills(&criteria).await?;
    let body = export_csv(&bills)?;
    tracing::info!(bills = bills.len(), "exported bills as csv");

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"bills.csv\""),
        ],
        body,
    ))
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<UserListResponse>> {
    let criteria = query.into_criteria()?;
    let users = state.users.find_users(&criteria).await?;
    let summary = summarize_users(&users);
    Ok(Json(UserListResponse { users, summary }))
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    let user = payload.into_user()?;
    let saved = state.users.create_user(user).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<User>> {
    Ok(Json(state.users.get_user(&id).await?))
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateUserRequest>,
) -> AppResult<Json<User>> {
    Ok(Json(state.users.update_user(&id, payload).await?))
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.users.delete_user(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn run_upload(limits: UploadLimits, request: UploadRequest) -> AppResult<UploadResult> {
    let files = request.into_files()?;
    let handle = start_upload(files, limits);
    // A dropped request cancels the ingestion task.
    let guard = handle.cancellation_token().drop_guard();
    let result = handle.join().await;
    guard.disarm();
    result
}

async fn preview_upload(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UploadRequest>,
) -> AppResult<Json<UploadResult>> {
    let result = run_upload(state.upload_limits, request).await?;
    Ok(Json(result))
}

async fn commit_upload(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UploadRequest>,
) -> AppResult<(StatusCode, Json<UploadResult>)> {
    let result = run_upload(state.upload_limits, request).await?;
    if !result.success {
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(result)));
    }

    state.bills.add_bills(result.bills.clone()).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

#[derive(Debug, Default, Deserialize)]
struct ReportQuery {
    period: Option<String>,
    from: Option<String>,
    to: Option<String>,
}

async fn get_report(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReportQuery>,
) -> AppResult<Json<Report>> {
    let period = match query.period {
        Some(period) => period.parse::<ReportPeriod>()?,
        None => ReportPeriod::default(),
    };
    let range = match (query.from, query.to) {
        (Some(from), Some(to)) => Some(DateRange::new(parse_date(&from)?, parse_date(&to)?)),
        (None, None) => None,
        _ => {
            return Err(AppError::Validation(
                "A date range needs both 'from' and 'to'".to_string(),
            ))
        }
    };

    let bills = state.bills.get_all_bills().await?;
    Ok(Json(build_report(&bills, period, range)))
}
