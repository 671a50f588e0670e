//! Handler for the caller's own quota snapshot.

use axum::extract::State;
use axum::Json;
use webopt_core::quota::QuotaStatus;

use crate::error::AppResult;
use crate::middleware::caller::ResolvedCaller;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/quota
///
/// Anonymous callers get the daily window; subscribers and API-key holders
/// get their billing cycle including overage.
pub async fn get_status(
    State(state): State<AppState>,
    ResolvedCaller(caller): ResolvedCaller,
) -> AppResult<Json<DataResponse<QuotaStatus>>> {
    let status = state.orchestrator.ledger().status(&caller).await?;
    Ok(Json(DataResponse { data: status }))
}
