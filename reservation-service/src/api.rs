use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderValue, StatusCode},
    response::Json,
    routing::{get, patch, post},
    Router,
};
use serde::{Deserialize, Serialize};
use shared::*;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::error;
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::handlers::ReservationManager;

#[derive(Clone)]
pub struct AppState {
    pub reservations: ReservationManager,
    pub catalog: Catalog,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

/// Transport status for a booking failure. Unknown customers, staff, menus
/// and options referenced by a request body are reported as 400.
pub fn status_for(err: &BookingError) -> StatusCode {
    match err {
        BookingError::CustomerNotFound(_)
        | BookingError::StaffNotFound(_)
        | BookingError::MenuNotFound(_)
        | BookingError::OptionNotFound(_)
        | BookingError::InvalidDate { .. }
        | BookingError::DateRangeExceeded { .. } => StatusCode::BAD_REQUEST,
        _ => match err.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::BusinessRule => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

pub fn reject(err: BookingError) -> ApiError {
    let status = status_for(&err);
    let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = ?err, "request failed");
        "internal server error".to_string()
    } else {
        err.to_string()
    };
    (
        status,
        Json(ErrorResponse {
            error: err.code().to_string(),
            message,
        }),
    )
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| reject(BookingError::validation("body", rejection.body_text())))
}

fn path_id(raw: &str) -> Result<Uuid, ApiError> {
    parse_id("id", raw).map_err(reject)
}

fn optional<T>(
    value: &Option<String>,
    parse: impl FnOnce(&str) -> Result<T, BookingError>,
) -> Result<Option<T>, ApiError> {
    match value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => parse(raw).map(Some).map_err(reject),
        None => Ok(None),
    }
}

fn cors_layer(allowed_origins: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed_origins.trim() == "*" {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

pub fn create_router(state: AppState, allowed_origins: &str, request_timeout: Duration) -> Router {
    let api = Router::new()
        .route("/customers", get(list_customers).post(create_customer))
        .route(
            "/customers/:id",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
        .route("/staff", get(list_staff).post(create_staff))
        .route("/staff/:id", get(get_staff).delete(delete_staff))
        .route("/menus", get(list_menus).post(create_menu))
        .route("/menus/:id", axum::routing::delete(delete_menu))
        .route("/options", get(list_options).post(create_option))
        .route("/options/:id", axum::routing::delete(delete_option))
        .route("/shifts", get(list_shifts).post(create_shift))
        .route("/shifts/:id", axum::routing::delete(delete_shift))
        .route("/reservations", get(list_reservations).post(create_reservation))
        .route("/reservations/:id", get(get_reservation).put(update_reservation))
        .route("/reservations/:id/cancel", post(cancel_reservation))
        .route("/reservations/:id/status", patch(update_status))
        .route("/availability", get(get_availability));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(allowed_origins))
                .layer(TimeoutLayer::new(request_timeout)),
        )
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub service: &'static str,
}

pub async fn health_check() -> Json<Health> {
    Json(Health {
        status: "ok",
        service: "reservation-service",
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PageQuery {
    /// Unparseable values fall back to the defaults.
    fn request(&self) -> PageRequest {
        let number = |v: &Option<String>| v.as_deref().and_then(|v| v.trim().parse::<i64>().ok());
        PageRequest::new(number(&self.page), number(&self.limit))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListReservationsQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub status: Option<String>,
    pub staff_id: Option<String>,
    pub customer_id: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

impl ListReservationsQuery {
    fn page_request(&self) -> PageRequest {
        PageQuery {
            page: self.page.clone(),
            limit: self.limit.clone(),
        }
        .request()
    }

    pub fn filter(&self) -> Result<ReservationFilter, ApiError> {
        Ok(ReservationFilter {
            status: optional(&self.status, |v| v.parse::<ReservationStatus>())?,
            staff_id: optional(&self.staff_id, |v| parse_id("staff_id", v))?,
            customer_id: optional(&self.customer_id, |v| parse_id("customer_id", v))?,
            date_from: optional(&self.date_from, |v| parse_date("date_from", v))?,
            date_to: optional(&self.date_to, |v| parse_date("date_to", v))?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ShiftQuery {
    pub staff_id: Option<String>,
    pub date: Option<String>,
}

pub async fn list_reservations(
    State(state): State<AppState>,
    Query(query): Query<ListReservationsQuery>,
) -> ApiResult<Page<ReservationDetail>> {
    let filter = query.filter()?;
    state
        .reservations
        .list(filter, query.page_request())
        .await
        .map(Json)
        .map_err(reject)
}

pub async fn create_reservation(
    State(state): State<AppState>,
    payload: Result<Json<CreateReservationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ReservationDetail>), ApiError> {
    let request = body(payload)?;
    let detail = state.reservations.create(request).await.map_err(reject)?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn get_reservation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ReservationDetail> {
    let id = path_id(&id)?;
    state.reservations.get(id).await.map(Json).map_err(reject)
}

pub async fn update_reservation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateReservationRequest>, JsonRejection>,
) -> ApiResult<ReservationDetail> {
    let id = path_id(&id)?;
    let request = body(payload)?;
    state.reservations.update(id, request).await.map(Json).map_err(reject)
}

pub async fn cancel_reservation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Option<Json<CancelReservationRequest>>,
) -> ApiResult<ReservationDetail> {
    let id = path_id(&id)?;
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    state.reservations.cancel(id, request).await.map(Json).map_err(reject)
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> ApiResult<ReservationDetail> {
    let id = path_id(&id)?;
    let request = body(payload)?;
    state
        .reservations
        .change_status(id, request)
        .await
        .map(Json)
        .map_err(reject)
}

pub async fn get_availability(
    State(state): State<AppState>,
    Query(query): Query<AvailabilityQuery>,
) -> ApiResult<Vec<StaffAvailability>> {
    state.reservations.availability(query).await.map(Json).map_err(reject)
}

pub async fn list_customers(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Page<Customer>> {
    state
        .catalog
        .list_customers(query.request())
        .await
        .map(Json)
        .map_err(reject)
}

pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Customer> {
    let id = path_id(&id)?;
    state.catalog.get_customer(id).await.map(Json).map_err(reject)
}

pub async fn create_customer(
    State(state): State<AppState>,
    payload: Result<Json<CustomerInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Customer>), ApiError> {
    let input = body(payload)?;
    let customer = state.catalog.create_customer(input).await.map_err(reject)?;
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn update_customer(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<CustomerInput>, JsonRejection>,
) -> ApiResult<Customer> {
    let id = path_id(&id)?;
    let input = body(payload)?;
    state.catalog.update_customer(id, input).await.map(Json).map_err(reject)
}

pub async fn delete_customer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = path_id(&id)?;
    state.catalog.delete_customer(id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_staff(State(state): State<AppState>) -> ApiResult<Vec<Staff>> {
    state.catalog.list_staff().await.map(Json).map_err(reject)
}

pub async fn get_staff(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Staff> {
    let id = path_id(&id)?;
    state.catalog.get_staff(id).await.map(Json).map_err(reject)
}

pub async fn create_staff(
    State(state): State<AppState>,
    payload: Result<Json<StaffInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Staff>), ApiError> {
    let input = body(payload)?;
    let staff = state.catalog.create_staff(input).await.map_err(reject)?;
    Ok((StatusCode::CREATED, Json(staff)))
}

pub async fn delete_staff(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = path_id(&id)?;
    state.catalog.delete_staff(id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_menus(State(state): State<AppState>) -> ApiResult<Vec<Menu>> {
    state.catalog.list_menus().await.map(Json).map_err(reject)
}

pub async fn create_menu(
    State(state): State<AppState>,
    payload: Result<Json<ServiceItemInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Menu>), ApiError> {
    let input = body(payload)?;
    let menu = state.catalog.create_menu(input).await.map_err(reject)?;
    Ok((StatusCode::CREATED, Json(menu)))
}

pub async fn delete_menu(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = path_id(&id)?;
    state.catalog.delete_menu(id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_options(State(state): State<AppState>) -> ApiResult<Vec<MenuOption>> {
    state.catalog.list_options().await.map(Json).map_err(reject)
}

pub async fn create_option(
    State(state): State<AppState>,
    payload: Result<Json<ServiceItemInput>, JsonRejection>,
) -> Result<(StatusCode, Json<MenuOption>), ApiError> {
    let input = body(payload)?;
    let option = state.catalog.create_option(input).await.map_err(reject)?;
    Ok((StatusCode::CREATED, Json(option)))
}

pub async fn delete_option(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = path_id(&id)?;
    state.catalog.delete_option(id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_shifts(
    State(state): State<AppState>,
    Query(query): Query<ShiftQuery>,
) -> ApiResult<Vec<Shift>> {
    let staff_id = optional(&query.staff_id, |v| parse_id("staff_id", v))?;
    let date = optional(&query.date, |v| parse_date("date", v))?;
    state.catalog.list_shifts(staff_id, date).await.map(Json).map_err(reject)
}

pub async fn create_shift(
    State(state): State<AppState>,
    payload: Result<Json<ShiftInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Shift>), ApiError> {
    let input = body(payload)?;
    let shift = state.catalog.create_shift(input).await.map_err(reject)?;
    Ok((StatusCode::CREATED, Json(shift)))
}

pub async fn delete_shift(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = path_id(&id)?;
    state.catalog.delete_shift(id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn maps_errors_to_statuses() {
        let id = Uuid::new_v4();
        let day = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        let cases = [
            (BookingError::validation("date", "bad"), StatusCode::BAD_REQUEST),
            (BookingError::InvalidStaffId("x".to_string()), StatusCode::BAD_REQUEST),
            (BookingError::InvalidDate { date: day, earliest: day }, StatusCode::BAD_REQUEST),
            (BookingError::MenuNotFound(id), StatusCode::BAD_REQUEST),
            (BookingError::CustomerNotFound(id), StatusCode::BAD_REQUEST),
            (BookingError::ReservationNotFound(id), StatusCode::NOT_FOUND),
            (
                BookingError::EntityNotFound {
                    entity: "shift",
                    id,
                },
                StatusCode::NOT_FOUND,
            ),
            (
                BookingError::TimeSlotConflict {
                    staff_id: id,
                    conflicting_id: id,
                },
                StatusCode::CONFLICT,
            ),
            (
                BookingError::Duplicate {
                    field: "phone",
                    value: "0900".to_string(),
                },
                StatusCode::CONFLICT,
            ),
            (
                BookingError::ImmutableState(ReservationStatus::Completed),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (BookingError::AlreadyCancelled, StatusCode::UNPROCESSABLE_ENTITY),
            (
                BookingError::InvalidTransition {
                    from: ReservationStatus::Completed,
                    to: ReservationStatus::Pending,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                BookingError::from(diesel::result::Error::NotFound),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(status_for(&err), expected, "{}", err);
        }
    }

    #[test]
    fn rejection_carries_code_and_hides_internal_detail() {
        let (status, Json(body)) = reject(BookingError::AlreadyCancelled);
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.error, "ALREADY_CANCELLED");

        let (status, Json(body)) = reject(BookingError::internal(
            "load reservation",
            diesel::result::Error::NotFound,
        ));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "INTERNAL_ERROR");
        assert_eq!(body.message, "internal server error");
    }

    #[test]
    fn list_query_parses_filters_and_tolerates_bad_paging() {
        let query = ListReservationsQuery {
            page: Some("x".to_string()),
            limit: Some("500".to_string()),
            status: Some("confirmed".to_string()),
            date_from: Some("2030-01-01".to_string()),
            staff_id: Some(" ".to_string()),
            ..Default::default()
        };
        let filter = query.filter().unwrap();
        assert_eq!(filter.status, Some(ReservationStatus::Confirmed));
        assert_eq!(filter.staff_id, None);
        assert_eq!(query.page_request(), PageRequest::new(None, Some(100)));

        let bad = ListReservationsQuery {
            customer_id: Some("nope".to_string()),
            ..Default::default()
        };
        let (status, _) = bad.filter().unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
