//! Expression evaluation endpoint.

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::auth::CurrentSession;
use crate::error::{ErrorResponse, ServerError};
use crate::state::AppState;

/// Request to evaluate an expression.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EvaluateRequest {
    /// Expression or template text.
    pub expression: String,
    /// Context data. For `orquesta`, the `__task_*` and `__current_item`
    /// keys describe the simulated task.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EvaluateResponse {
    #[schema(value_type = Object)]
    pub result: Value,
    pub query_type: String,
}

/// Evaluate an expression in the given query language.
#[utoipa::path(
    post,
    path = "/api/evaluate/{query_type}",
    params(
        ("query_type" = String, Path, description = "orquesta, yaql or jinja2"),
    ),
    request_body = EvaluateRequest,
    responses(
        (status = 200, description = "Evaluation result", body = EvaluateResponse),
        (status = 400, description = "Malformed body, or expression failed to parse or evaluate", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
    ),
    tag = "evaluate"
)]
pub async fn evaluate_handler(
    State(state): State<AppState>,
    Extension(_session): Extension<CurrentSession>,
    Path(query_type): Path<String>,
    WithRejection(Json(request), _): WithRejection<Json<EvaluateRequest>, ServerError>,
) -> Result<Json<EvaluateResponse>, ServerError> {
    let data = match request.data {
        Value::Null => Value::Object(Map::new()),
        data => data,
    };

    let result = state
        .evaluator
        .evaluate_str(&query_type, &request.expression, data)
        .map_err(|e| ServerError::evaluation(query_type.clone(), &e))?;

    Ok(Json(EvaluateResponse { result, query_type }))
}
