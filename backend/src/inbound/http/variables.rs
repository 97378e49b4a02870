//! User variable handlers.
//!
//! ```text
//! GET    /api/v1/user/variables
//! POST   /api/v1/user/variables        {"key":"network","value":"testnet"}
//! PUT    /api/v1/user/variables        {"variables":[{"key":"gas","value":9999,"type":"number"}]}
//! GET    /api/v1/user/variables/{key}
//! PUT    /api/v1/user/variables/{key}  {"value":true,"type":"boolean"}
//! DELETE /api/v1/user/variables/{key}
//! ```

use actix_web::{delete, get, post, put, web};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::domain::{Error, VariableFields, VariableView, VariableWrite};
use crate::inbound::http::ApiResult;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;

/// Body for `POST /user/variables` and one entry of a bulk update.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VariableInput {
    pub key: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub value: Option<Value>,
    /// `string` (default), `number`, `boolean`, or `json`.
    #[serde(rename = "type")]
    pub variable_type: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

impl VariableInput {
    fn fields(&self) -> VariableFields<'_> {
        VariableFields {
            value: self.value.as_ref(),
            kind: self.variable_type.as_deref(),
            description: self.description.as_deref(),
            is_public: self.is_public,
        }
    }

    fn to_write(&self, missing: &str) -> Result<VariableWrite, Error> {
        let key = self
            .key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| Error::invalid_request(missing))?;
        VariableWrite::parse(key, self.fields(), missing)
    }
}

/// Body for `PUT /user/variables/{key}`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VariableValueInput {
    #[schema(value_type = Option<Object>)]
    pub value: Option<Value>,
    #[serde(rename = "type")]
    pub variable_type: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

/// Body for the bulk `PUT /user/variables`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct BulkVariablesRequest {
    pub variables: Option<Vec<VariableInput>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VariableListResponse {
    pub variables: Vec<VariableView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VariableResponse {
    pub variable: VariableView,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkVariablesResponse {
    pub updated: usize,
    pub variables: Vec<VariableView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VariableDeleted {
    pub message: String,
}

/// Every variable of the signed-in user, ordered by key.
#[utoipa::path(
    get,
    path = "/api/v1/user/variables",
    responses(
        (status = 200, description = "Variables", body = VariableListResponse),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 404, description = "User not found", body = Error)
    ),
    tags = ["variables"],
    operation_id = "listVariables"
)]
#[get("/user/variables")]
pub async fn list_variables(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<web::Json<VariableListResponse>> {
    let user_id = session.require_user_id()?;
    let variables = state.variables.list(&user_id).await?;
    Ok(web::Json(VariableListResponse {
        variables: variables.iter().map(VariableView::from).collect(),
    }))
}

/// Create a variable or replace the value stored under its key.
#[utoipa::path(
    post,
    path = "/api/v1/user/variables",
    request_body = VariableInput,
    responses(
        (status = 200, description = "Stored variable", body = VariableResponse),
        (status = 400, description = "Missing key or value, or a value that does not fit its type", body = Error),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 404, description = "User not found", body = Error)
    ),
    tags = ["variables"],
    operation_id = "createVariable"
)]
#[post("/user/variables")]
pub async fn create_variable(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<VariableInput>,
) -> ApiResult<web::Json<VariableResponse>> {
    let user_id = session.require_user_id()?;
    let write = payload.to_write("Key and value are required")?;
    let variable = state.variables.put(&user_id, write).await?;
    Ok(web::Json(VariableResponse {
        variable: VariableView::from(&variable),
    }))
}

/// Write several variables at once.
///
/// Every entry is validated before any is stored.
#[utoipa::path(
    put,
    path = "/api/v1/user/variables",
    request_body = BulkVariablesRequest,
    responses(
        (status = 200, description = "Stored variables", body = BulkVariablesResponse),
        (status = 400, description = "Missing array or an invalid entry", body = Error),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 404, description = "User not found", body = Error)
    ),
    tags = ["variables"],
    operation_id = "updateVariables"
)]
#[put("/user/variables")]
pub async fn update_variables(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<BulkVariablesRequest>,
) -> ApiResult<web::Json<BulkVariablesResponse>> {
    let user_id = session.require_user_id()?;
    let inputs = payload
        .into_inner()
        .variables
        .ok_or_else(|| Error::invalid_request("Variables array is required"))?;
    let writes = inputs
        .iter()
        .map(|input| input.to_write("Key and value are required"))
        .collect::<Result<Vec<_>, _>>()?;
    let stored = state.variables.put_many(&user_id, writes).await?;
    Ok(web::Json(BulkVariablesResponse {
        updated: stored.len(),
        variables: stored.iter().map(VariableView::from).collect(),
    }))
}

/// One variable by key.
#[utoipa::path(
    get,
    path = "/api/v1/user/variables/{key}",
    params(("key" = String, Path, description = "Variable key")),
    responses(
        (status = 200, description = "Variable", body = VariableResponse),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 404, description = "Variable not found", body = Error)
    ),
    tags = ["variables"],
    operation_id = "getVariable"
)]
#[get("/user/variables/{key}")]
pub async fn get_variable(
    state: web::Data<HttpState>,
    session: SessionContext,
    key: web::Path<String>,
) -> ApiResult<web::Json<VariableResponse>> {
    let user_id = session.require_user_id()?;
    let variable = state.variables.get(&user_id, &key).await?;
    Ok(web::Json(VariableResponse {
        variable: VariableView::from(&variable),
    }))
}

/// Create or replace the variable at `key`.
#[utoipa::path(
    put,
    path = "/api/v1/user/variables/{key}",
    params(("key" = String, Path, description = "Variable key")),
    request_body = VariableValueInput,
    responses(
        (status = 200, description = "Stored variable", body = VariableResponse),
        (status = 400, description = "Missing value or a value that does not fit its type", body = Error),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 404, description = "User not found", body = Error)
    ),
    tags = ["variables"],
    operation_id = "putVariable"
)]
#[put("/user/variables/{key}")]
pub async fn put_variable(
    state: web::Data<HttpState>,
    session: SessionContext,
    key: web::Path<String>,
    payload: web::Json<VariableValueInput>,
) -> ApiResult<web::Json<VariableResponse>> {
    let user_id = session.require_user_id()?;
    let fields = VariableFields {
        value: payload.value.as_ref(),
        kind: payload.variable_type.as_deref(),
        description: payload.description.as_deref(),
        is_public: payload.is_public,
    };
    let write = VariableWrite::parse(&key, fields, "Value is required")?;
    let variable = state.variables.put(&user_id, write).await?;
    Ok(web::Json(VariableResponse {
        variable: VariableView::from(&variable),
    }))
}

/// Remove the variable at `key`.
#[utoipa::path(
    delete,
    path = "/api/v1/user/variables/{key}",
    params(("key" = String, Path, description = "Variable key")),
    responses(
        (status = 200, description = "Variable removed", body = VariableDeleted),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 404, description = "Variable not found", body = Error)
    ),
    tags = ["variables"],
    operation_id = "deleteVariable"
)]
#[delete("/user/variables/{key}")]
pub async fn delete_variable(
    state: web::Data<HttpState>,
    session: SessionContext,
    key: web::Path<String>,
) -> ApiResult<web::Json<VariableDeleted>> {
    let user_id = session.require_user_id()?;
    state.variables.delete(&user_id, &key).await?;
    Ok(web::Json(VariableDeleted {
        message: "Variable deleted successfully".to_owned(),
    }))
}

#[cfg(test)]
mod tests;
