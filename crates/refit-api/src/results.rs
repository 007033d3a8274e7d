use axum::{
    Extension, Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use refit_db::Database;
use refit_db::models::ResultRow;
use refit_types::api::{AnnotatedResult, CreateResultRequest, UpdateResultRequest};
use refit_types::models::ResultRecord;

use crate::aggregate::annotate;
use crate::auth::{ensure_viewer, require_viewer};
use crate::convert::result_record;
use crate::error::ApiError;
use crate::middleware::Viewer;
use crate::state::{AppState, run_blocking};
use crate::validation::validate_result_fields;

pub fn create_result(
    db: &Database,
    viewer: Option<&Viewer>,
    req: &CreateResultRequest,
    now: DateTime<Utc>,
) -> Result<ResultRecord, ApiError> {
    let viewer = require_viewer(viewer)?;
    let title = validate_result_fields(&req.title, &req.content)?;

    ensure_viewer(db, viewer, now)?;
    let id = Uuid::new_v4().to_string();
    db.insert_result(&id, &viewer.id, title, &req.content, req.is_public, now)?;

    fetch(db, &id)
}

/// A single result as the viewer may see it. Private results of other owners
/// are reported exactly like missing ones.
pub fn get_result(db: &Database, viewer: Option<&Viewer>, id: Uuid) -> Result<AnnotatedResult, ApiError> {
    let viewer_id = viewer.map(|v| v.id.as_str());
    let row = db.get_result(&id.to_string())?.ok_or(ApiError::NotFound)?;
    if !row.is_public && viewer_id != Some(row.owner_id.as_str()) {
        return Err(ApiError::NotFound);
    }

    annotate(db, vec![row], viewer_id)?
        .pop()
        .ok_or(ApiError::NotFound)
}

pub fn update_result(
    db: &Database,
    viewer: Option<&Viewer>,
    id: Uuid,
    req: &UpdateResultRequest,
    now: DateTime<Utc>,
) -> Result<ResultRecord, ApiError> {
    let viewer = require_viewer(viewer)?;
    let title = validate_result_fields(&req.title, &req.content)?;
    let existing = owned(db, viewer, id)?;

    db.update_result(&existing.id, title, &req.content, req.is_public, now)?;
    fetch(db, &existing.id)
}

pub fn delete_result(db: &Database, viewer: Option<&Viewer>, id: Uuid) -> Result<(), ApiError> {
    let viewer = require_viewer(viewer)?;
    let existing = owned(db, viewer, id)?;

    if !db.delete_result(&existing.id)? {
        return Err(ApiError::NotFoundOrNoAccess);
    }
    Ok(())
}

pub fn toggle_visibility(
    db: &Database,
    viewer: Option<&Viewer>,
    id: Uuid,
    now: DateTime<Utc>,
) -> Result<ResultRecord, ApiError> {
    let viewer = require_viewer(viewer)?;
    let existing = owned(db, viewer, id)?;

    db.set_result_public(&existing.id, !existing.is_public, now)?;
    fetch(db, &existing.id)
}

pub fn toggle_favorite(
    db: &Database,
    viewer: Option<&Viewer>,
    id: Uuid,
    now: DateTime<Utc>,
) -> Result<ResultRecord, ApiError> {
    let viewer = require_viewer(viewer)?;
    let existing = owned(db, viewer, id)?;

    db.set_result_favorite(&existing.id, !existing.is_favorite, now)?;
    fetch(db, &existing.id)
}

/// Re-fetch scoped to the owner before any mutation.
fn owned(db: &Database, viewer: &Viewer, id: Uuid) -> Result<ResultRow, ApiError> {
    db.get_owned_result(&id.to_string(), &viewer.id)?
        .ok_or(ApiError::NotFoundOrNoAccess)
}

fn fetch(db: &Database, id: &str) -> Result<ResultRecord, ApiError> {
    db.get_result(id)?
        .and_then(result_record)
        .ok_or(ApiError::NotFoundOrNoAccess)
}

// -- Handlers --

pub async fn create(
    State(state): State<AppState>,
    Extension(viewer): Extension<Option<Viewer>>,
    payload: Result<Json<CreateResultRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let record = run_blocking(&state, move |app| {
        create_result(app.db(), viewer.as_ref(), &req, Utc::now())
    })
    .await?;
    info!("Result {} created by {}", record.id, record.owner_id);
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn show(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    Extension(viewer): Extension<Option<Viewer>>,
) -> Result<Json<AnnotatedResult>, ApiError> {
    let Path(id) = id?;
    let result = run_blocking(&state, move |app| get_result(app.db(), viewer.as_ref(), id)).await?;
    Ok(Json(result))
}

pub async fn update(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    Extension(viewer): Extension<Option<Viewer>>,
    payload: Result<Json<UpdateResultRequest>, JsonRejection>,
) -> Result<Json<ResultRecord>, ApiError> {
    let Path(id) = id?;
    let Json(req) = payload?;
    let record = run_blocking(&state, move |app| {
        update_result(app.db(), viewer.as_ref(), id, &req, Utc::now())
    })
    .await?;
    Ok(Json(record))
}

pub async fn remove(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    Extension(viewer): Extension<Option<Viewer>>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id?;
    run_blocking(&state, move |app| delete_result(app.db(), viewer.as_ref(), id)).await?;
    info!("Result {} deleted", id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn visibility(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    Extension(viewer): Extension<Option<Viewer>>,
) -> Result<Json<ResultRecord>, ApiError> {
    let Path(id) = id?;
    let record = run_blocking(&state, move |app| {
        toggle_visibility(app.db(), viewer.as_ref(), id, Utc::now())
    })
    .await?;
    Ok(Json(record))
}

pub async fn favorite(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    Extension(viewer): Extension<Option<Viewer>>,
) -> Result<Json<ResultRecord>, ApiError> {
    let Path(id) = id?;
    let record = run_blocking(&state, move |app| {
        toggle_favorite(app.db(), viewer.as_ref(), id, Utc::now())
    })
    .await?;
    Ok(Json(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, seed_like, seed_result, viewer};

    fn create_as(db: &Database, owner: &str, is_public: bool) -> ResultRecord {
        let req = CreateResultRequest {
            title: "  Hello  ".into(),
            content: "World".into(),
            is_public,
        };
        create_result(db, Some(&viewer(owner)), &req, at(0)).unwrap()
    }

    #[test]
    fn create_stores_trimmed_title_and_author() {
        let db = Database::open_in_memory().unwrap();
        let record = create_as(&db, "ada", false);
        assert_eq!(record.title, "Hello");
        assert_eq!(record.owner_id, "ada");
        assert!(!record.is_favorite);
        assert_eq!(record.author.map(|a| a.id).as_deref(), Some("ada"));
    }

    #[test]
    fn create_rejects_invalid_input_and_anonymous_callers() {
        let db = Database::open_in_memory().unwrap();
        let bad = CreateResultRequest {
            title: String::new(),
            content: "x".into(),
            is_public: true,
        };
        assert!(matches!(
            create_result(&db, Some(&viewer("ada")), &bad, at(0)),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            create_result(&db, None, &bad, at(0)),
            Err(ApiError::Unauthenticated)
        ));
    }

    #[test]
    fn private_result_is_hidden_from_other_viewers() {
        let db = Database::open_in_memory().unwrap();
        let record = create_as(&db, "owner", false);

        assert!(get_result(&db, Some(&viewer("owner")), record.id).is_ok());
        assert!(matches!(
            get_result(&db, Some(&viewer("someone")), record.id),
            Err(ApiError::NotFound)
        ));
        assert!(matches!(get_result(&db, None, record.id), Err(ApiError::NotFound)));
    }

    #[test]
    fn public_result_view_is_annotated() {
        let db = Database::open_in_memory().unwrap();
        let id = seed_result(&db, "owner", "post", true, at(0));
        seed_like(&db, "fan", id);

        let seen = get_result(&db, Some(&viewer("fan")), id).unwrap();
        assert_eq!(seen.likes_count, 1);
        assert!(seen.liked_by_me);
        let anon = get_result(&db, None, id).unwrap();
        assert!(!anon.liked_by_me);
    }

    #[test]
    fn non_owner_mutations_look_like_missing_records() {
        let db = Database::open_in_memory().unwrap();
        let record = create_as(&db, "owner", true);
        let intruder = viewer("intruder");
        let req = UpdateResultRequest {
            title: "pwned".into(),
            content: "pwned".into(),
            is_public: false,
        };

        let foreign = [
            update_result(&db, Some(&intruder), record.id, &req, at(1)).map(|_| ()),
            delete_result(&db, Some(&intruder), record.id),
            toggle_visibility(&db, Some(&intruder), record.id, at(1)).map(|_| ()),
            toggle_favorite(&db, Some(&intruder), record.id, at(1)).map(|_| ()),
        ];
        for outcome in foreign {
            assert!(matches!(outcome, Err(ApiError::NotFoundOrNoAccess)));
        }

        let missing = delete_result(&db, Some(&intruder), Uuid::new_v4());
        assert!(matches!(missing, Err(ApiError::NotFoundOrNoAccess)));

        let untouched = get_result(&db, None, record.id).unwrap();
        assert_eq!(untouched.result.title, "Hello");
    }

    #[test]
    fn owner_can_update_toggle_and_delete() {
        let db = Database::open_in_memory().unwrap();
        let record = create_as(&db, "owner", false);
        let owner = viewer("owner");

        let req = UpdateResultRequest {
            title: "Edited".into(),
            content: "New body".into(),
            is_public: false,
        };
        let updated = update_result(&db, Some(&owner), record.id, &req, at(5)).unwrap();
        assert_eq!(updated.title, "Edited");
        assert!(updated.updated_at > updated.created_at);

        assert!(toggle_visibility(&db, Some(&owner), record.id, at(6)).unwrap().is_public);
        assert!(!toggle_visibility(&db, Some(&owner), record.id, at(7)).unwrap().is_public);
        assert!(toggle_favorite(&db, Some(&owner), record.id, at(8)).unwrap().is_favorite);

        delete_result(&db, Some(&owner), record.id).unwrap();
        assert!(db.get_result(&record.id.to_string()).unwrap().is_none());
    }
}
