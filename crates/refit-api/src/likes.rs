use axum::{
    Extension, Json,
    extract::{Path, State, rejection::PathRejection},
};
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use refit_db::Database;
use refit_types::api::ToggleLikeResponse;

use crate::auth::{ensure_viewer, require_viewer};
use crate::error::ApiError;
use crate::middleware::Viewer;
use crate::state::{AppState, run_blocking};

/// Flip the viewer's like on a public result and return the new state with
/// a freshly counted total.
///
/// Two concurrent likes from the same viewer can both see "not liked"; the
/// loser's insert hits the `(user_id, result_id)` unique constraint and is
/// treated as already liked.
pub fn toggle_like(
    db: &Database,
    viewer: Option<&Viewer>,
    result_id: Uuid,
    now: DateTime<Utc>,
) -> Result<ToggleLikeResponse, ApiError> {
    let viewer = require_viewer(viewer)?;
    let result_id = result_id.to_string();

    let result = db.get_result(&result_id)?.ok_or(ApiError::NotFound)?;
    if !result.is_public {
        return Err(ApiError::Forbidden("Only public results can be liked"));
    }

    let liked = match db.find_like(&viewer.id, &result_id)? {
        Some(existing) => {
            db.delete_like(&existing.id)?;
            false
        }
        None => record_like(db, viewer, &result_id, now)?,
    };

    let likes_count = db.count_likes(&result_id)?;
    Ok(ToggleLikeResponse { liked, likes_count })
}

/// Insert the viewer's like. A like that is already there, typically from a
/// concurrent toggle that won the race, counts as success.
pub fn record_like(
    db: &Database,
    viewer: &Viewer,
    result_id: &str,
    now: DateTime<Utc>,
) -> Result<bool, ApiError> {
    ensure_viewer(db, viewer, now)?;
    let like_id = Uuid::new_v4().to_string();
    match db.insert_like(&like_id, &viewer.id, result_id, now).map_err(ApiError::from) {
        Ok(()) => Ok(true),
        Err(ApiError::Conflict) => {
            debug!("Duplicate like by {} on {} already recorded", viewer.id, result_id);
            Ok(true)
        }
        Err(e) => Err(e),
    }
}

pub async fn toggle(
    State(state): State<AppState>,
    result_id: Result<Path<Uuid>, PathRejection>,
    Extension(viewer): Extension<Option<Viewer>>,
) -> Result<Json<ToggleLikeResponse>, ApiError> {
    let Path(result_id) = result_id?;
    let response = run_blocking(&state, move |app| {
        toggle_like(app.db(), viewer.as_ref(), result_id, Utc::now())
    })
    .await?;
    Ok(Json(response))
}
