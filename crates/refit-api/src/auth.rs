use axum::{Extension, Json, extract::State};
use chrono::{DateTime, Utc};
use tracing::info;

use refit_db::Database;
use refit_types::models::User;

use crate::convert;
use crate::error::ApiError;
use crate::middleware::Viewer;
use crate::state::{AppState, run_blocking};

pub fn require_viewer(viewer: Option<&Viewer>) -> Result<&Viewer, ApiError> {
    viewer.ok_or(ApiError::Unauthenticated)
}

/// Store the viewer's profile from the identity provider, creating the user
/// on first sign-in and refreshing name, email and image afterwards.
pub fn sign_in(db: &Database, viewer: Option<&Viewer>, now: DateTime<Utc>) -> Result<User, ApiError> {
    let viewer = require_viewer(viewer)?;
    let row = db.upsert_user(
        &viewer.id,
        viewer.name.as_deref(),
        viewer.email.as_deref(),
        viewer.image.as_deref(),
        now,
    )?;
    Ok(convert::user(row))
}

/// Make sure rows that reference the viewer have a user to point at.
pub(crate) fn ensure_viewer(db: &Database, viewer: &Viewer, now: DateTime<Utc>) -> Result<(), ApiError> {
    db.ensure_user(
        &viewer.id,
        viewer.name.as_deref(),
        viewer.email.as_deref(),
        viewer.image.as_deref(),
        now,
    )?;
    Ok(())
}

pub async fn session(
    State(state): State<AppState>,
    Extension(viewer): Extension<Option<Viewer>>,
) -> Result<Json<User>, ApiError> {
    let user = run_blocking(&state, move |app| sign_in(app.db(), viewer.as_ref(), Utc::now())).await?;
    info!("Viewer {} signed in", user.id);
    Ok(Json(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::viewer;

    #[test]
    fn sign_in_creates_then_refreshes_the_user() {
        let db = Database::open_in_memory().unwrap();
        let mut ada = viewer("ada");
        let first = sign_in(&db, Some(&ada), Utc::now()).unwrap();
        assert_eq!(first.name.as_deref(), Some("ada"));

        ada.name = Some("Ada Lovelace".into());
        let second = sign_in(&db, Some(&ada), Utc::now()).unwrap();
        assert_eq!(second.name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(second.created_at, first.created_at);
    }

    #[test]
    fn sign_in_requires_a_viewer() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(sign_in(&db, None, Utc::now()), Err(ApiError::Unauthenticated)));
    }
}
