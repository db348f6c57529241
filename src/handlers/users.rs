use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::AppState;

use super::AppError;

// ─── Domain types ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "viewer".into()
}

// ─── GET /api/users ──────────────────────────────────────────────

pub async fn list_users(State(state): State<Arc<AppState>>) -> Json<Vec<User>> {
    let mut users: Vec<User> = state.users.read().values().cloned().collect();
    users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Json(users)
}

// ─── GET /api/users/:id ──────────────────────────────────────────

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<User>, AppError> {
    state
        .users
        .read()
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("user '{id}' not found")))
}

// ─── POST /api/users ─────────────────────────────────────────────

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::BadRequest("name must not be empty".into()));
    }
    if !req.email.contains('@') {
        return Err(AppError::BadRequest(format!(
            "'{}' is not an email address",
            req.email
        )));
    }

    let user = User {
        id: format!("usr_{}", &uuid::Uuid::new_v4().simple().to_string()[..8]),
        name: req.name,
        email: req.email,
        role: req.role,
        created_at: chrono::Utc::now().to_rfc3339(),
    };

    state.users.write().insert(user.id.clone(), user.clone());
    tracing::info!(id = %user.id, "user created");

    Ok((StatusCode::CREATED, Json(user)))
}
