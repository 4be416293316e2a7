use std::collections::HashSet;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::KickstartError;
use crate::models::*;
use crate::tree_edit::TreeEditOperation;

// ============================================================
// Error Handling
// ============================================================

/// Map a store error onto a status code.
///
/// Missing entities, unsaved references and constraint conflicts are the
/// caller's problem and are reported as is. Store failures were already
/// logged when they were wrapped; anything else is logged here. Both are
/// hidden behind a generic message.
fn api_error(e: KickstartError) -> (StatusCode, String) {
    match e {
        KickstartError::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
        KickstartError::Transient(_) => {
            tracing::warn!("Validation error: {}", e);
            (StatusCode::BAD_REQUEST, e.to_string())
        }
        _ if e.is_constraint_violation() => (
            StatusCode::CONFLICT,
            "Conflicts with an existing record".to_string(),
        ),
        KickstartError::DataAccess { .. } => internal_error(),
        e => {
            tracing::error!("Internal error: {}", e);
            internal_error()
        }
    }
}

fn internal_error() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

/// The API has no login; requests act as a service user of the org in the path.
fn api_user(org_id: i64) -> User {
    User::new("api", org_id)
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Trees
// ============================================================

pub async fn list_trees(
    State(state): State<AppState>,
    Path(org_id): Path<i64>,
) -> Result<Json<Vec<Tree>>, (StatusCode, String)> {
    state.db.lookup_trees_by_org(org_id).map(Json).map_err(api_error)
}

pub async fn get_tree(
    State(state): State<AppState>,
    Path((org_id, label)): Path<(i64, String)>,
) -> Result<Json<Tree>, (StatusCode, String)> {
    state
        .db
        .lookup_tree_by_label(&label, org_id)
        .map_err(api_error)?
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Tree not found".to_string()))
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateTreeInput {
    pub label: Option<String>,
    pub base_path: Option<String>,
    pub boot_image: Option<String>,
    /// Install type label, e.g. `rhel_5`.
    pub install_type: Option<String>,
    pub channel_id: Option<i64>,
}

pub async fn update_tree(
    State(state): State<AppState>,
    Path((org_id, label)): Path<(i64, String)>,
    Json(input): Json<UpdateTreeInput>,
) -> Result<Response, (StatusCode, String)> {
    let mut op = TreeEditOperation::for_label(&state.db, &label, api_user(org_id), &*state.sync)
        .map_err(api_error)?;
    match op.tree() {
        None => return Err((StatusCode::NOT_FOUND, "Tree not found".to_string())),
        // Vendor trees are shared by every org.
        Some(tree) if tree.org_id != Some(org_id) => {
            tracing::warn!(tree = %tree.label, org = org_id, "refusing edit of system tree");
            return Err((
                StatusCode::FORBIDDEN,
                "System trees cannot be edited".to_string(),
            ));
        }
        Some(_) => {}
    }

    if let Some(install_type) = &input.install_type {
        let install_type = state
            .db
            .lookup_install_type_by_label(install_type)
            .map_err(api_error)?
            .ok_or((
                StatusCode::BAD_REQUEST,
                format!("Unknown install type: {install_type}"),
            ))?;
        op.set_install_type(install_type).map_err(api_error)?;
    }
    if let Some(channel_id) = input.channel_id {
        let channel = state
            .db
            .lookup_channel(channel_id)
            .map_err(api_error)?
            .filter(|c| c.org_id.is_none() || c.org_id == Some(org_id))
            .ok_or((StatusCode::BAD_REQUEST, "Unknown channel".to_string()))?;
        op.set_channel(&channel).map_err(api_error)?;
    }
    if let Some(label) = input.label {
        op.set_label(label).map_err(api_error)?;
    }
    if let Some(base_path) = input.base_path {
        op.set_base_path(base_path).map_err(api_error)?;
    }
    if let Some(boot_image) = input.boot_image {
        op.set_boot_image(boot_image).map_err(api_error)?;
    }

    if let Some(invalid) = op.store().map_err(api_error)? {
        return Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({ "error": invalid.key })),
        )
            .into_response());
    }

    let tree = op
        .into_tree()
        .ok_or((StatusCode::NOT_FOUND, "Tree not found".to_string()))?;
    Ok(Json(tree).into_response())
}

// ============================================================
// Crypto keys and profiles
// ============================================================

pub async fn list_crypto_keys(
    State(state): State<AppState>,
    Path(org_id): Path<i64>,
) -> Result<Json<Vec<CryptoKey>>, (StatusCode, String)> {
    state.db.lookup_crypto_keys(org_id).map(Json).map_err(api_error)
}

#[derive(Debug, Deserialize)]
pub struct CommandNamesQuery {
    /// Include basic options as well as advanced ones.
    #[serde(default)]
    pub all: bool,
}

pub async fn list_command_names(
    State(state): State<AppState>,
    Path((org_id, id)): Path<(i64, i64)>,
    Query(query): Query<CommandNamesQuery>,
) -> Result<Json<Vec<CommandName>>, (StatusCode, String)> {
    let profile = state
        .db
        .lookup_profile_by_id_and_org(org_id, id)
        .map_err(api_error)?
        .ok_or((StatusCode::NOT_FOUND, "Profile not found".to_string()))?;

    let names = if query.all {
        state.db.lookup_all_command_names(&profile)
    } else {
        state.db.lookup_command_names(&profile)
    };
    names.map(Json).map_err(api_error)
}

// ============================================================
// Sessions
// ============================================================

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Session>, (StatusCode, String)> {
    state
        .db
        .lookup_session_by_id(id)
        .map_err(api_error)?
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Session not found".to_string()))
}

pub async fn fail_sessions(
    State(state): State<AppState>,
    Json(input): Json<FailSessionsInput>,
) -> Result<Json<FailSessionsResult>, (StatusCode, String)> {
    let action_ids: HashSet<i64> = input.action_ids.into_iter().collect();
    let server_ids: HashSet<i64> = input.server_ids.into_iter().collect();

    let failed = state
        .db
        .fail_kickstart_sessions(&action_ids, &server_ids)
        .map_err(api_error)?;
    tracing::info!(failed, "failed kickstart sessions for removed actions");
    Ok(Json(FailSessionsResult { failed }))
}

// ============================================================
// Reference data
// ============================================================

pub async fn list_install_types(
    State(state): State<AppState>,
) -> Result<Json<Vec<InstallType>>, (StatusCode, String)> {
    state.db.lookup_install_types().map(Json).map_err(api_error)
}

pub async fn list_virtualization_types(
    State(state): State<AppState>,
) -> Result<Json<Vec<VirtualizationType>>, (StatusCode, String)> {
    state
        .db
        .lookup_virtualization_types()
        .map(Json)
        .map_err(api_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_errors_to_status_codes() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let store_failure = conn
            .execute("DELETE FROM missing_table", [])
            .map_err(|e| KickstartError::data_access("remove", e))
            .unwrap_err();

        assert_eq!(
            api_error(KickstartError::not_found("tree")).0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            api_error(KickstartError::Transient("profile")).0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            api_error(store_failure),
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string()
            )
        );
    }
}
