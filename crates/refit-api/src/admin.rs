//! Table browser over the known record kinds: summaries, paging, and typed
//! create, update and delete.

use axum::{
    Extension, Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use refit_db::tables::EntityRows;
use refit_db::{ConnectionRegistry, Database, EntityKind};
use refit_types::api::{
    DbTarget, NewLikeRecord, NewResultRecord, NewUserRecord, ResultPatch, TablePage, TablePagination,
    TableQuery, TableSummary, UserPatch,
};
use refit_types::models::ResultRecord;

use crate::auth::require_viewer;
use crate::convert;
use crate::error::ApiError;
use crate::middleware::Viewer;
use crate::state::{AppState, run_blocking};
use crate::validation::validate_result_fields;

pub const ITEMS_PER_PAGE: u32 = 20;

fn target(raw: Option<&str>) -> Result<DbTarget, ApiError> {
    Ok(raw.map(str::parse::<DbTarget>).transpose()?.unwrap_or_default())
}

pub fn table_summaries(
    databases: &ConnectionRegistry,
    viewer: Option<&Viewer>,
    db: Option<&str>,
) -> Result<Vec<TableSummary>, ApiError> {
    require_viewer(viewer)?;
    let target = target(db)?;
    let db = databases.get(target);

    EntityKind::ALL
        .into_iter()
        .map(|kind| {
            Ok(TableSummary {
                name: kind.name(),
                label: kind.label(),
                count: db.count_entities(kind)?,
            })
        })
        .collect()
}

pub fn browse_table(
    databases: &ConnectionRegistry,
    viewer: Option<&Viewer>,
    table: &str,
    query: &TableQuery,
) -> Result<TablePage, ApiError> {
    require_viewer(viewer)?;
    let kind: EntityKind = table.parse()?;
    let target = target(query.db.as_deref())?;
    if query.page == 0 {
        return Err(ApiError::Validation("page must be at least 1".into()));
    }
    let db = databases.get(target);

    let total = db.count_entities(kind)?;
    let offset = u64::from(query.page - 1) * u64::from(ITEMS_PER_PAGE);
    let data = match db.list_entities(kind, offset, u64::from(ITEMS_PER_PAGE))? {
        EntityRows::Users(rows) => to_values(rows.into_iter().map(convert::user))?,
        EntityRows::Results(rows) => to_values(rows.into_iter().filter_map(convert::result_record))?,
        EntityRows::Likes(rows) => to_values(rows.into_iter().filter_map(convert::like))?,
    };

    Ok(TablePage {
        data,
        pagination: TablePagination {
            page: query.page,
            total_pages: total.div_ceil(u64::from(ITEMS_PER_PAGE)),
            total_items: total,
            items_per_page: ITEMS_PER_PAGE,
        },
    })
}

/// Insert one record. The body is parsed into the shape of `table`; results
/// and likes get generated ids, users keep the id they were given.
pub fn create_record(
    databases: &ConnectionRegistry,
    viewer: Option<&Viewer>,
    table: &str,
    body: Value,
    db: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Value, ApiError> {
    let viewer = require_viewer(viewer)?;
    let kind: EntityKind = table.parse()?;
    let target = target(db)?;
    let db = databases.get(target);

    let created = match kind {
        EntityKind::Users => {
            let new: NewUserRecord = parse_body(body)?;
            if new.id.trim().is_empty() {
                return Err(ApiError::Validation("id is required".into()));
            }
            let row = db.insert_user(
                &new.id,
                new.name.as_deref(),
                new.email.as_deref(),
                new.image.as_deref(),
                now,
            )?;
            to_value(convert::user(row))?
        }
        EntityKind::Results => {
            let new: NewResultRecord = parse_body(body)?;
            let title = validate_result_fields(&new.title, &new.content)?;
            require_user(db, &new.owner_id)?;

            let id = Uuid::new_v4().to_string();
            db.insert_result(&id, &new.owner_id, title, &new.content, new.is_public, now)?;
            if new.is_favorite {
                db.set_result_favorite(&id, true, now)?;
            }
            to_value(fetch_result(db, &id)?)?
        }
        EntityKind::Likes => {
            let new: NewLikeRecord = parse_body(body)?;
            let result_id = new.result_id.to_string();
            require_user(db, &new.user_id)?;
            if db.get_result(&result_id)?.is_none() {
                return Err(ApiError::Validation(format!("unknown result: {}", result_id)));
            }

            db.insert_like(&Uuid::new_v4().to_string(), &new.user_id, &result_id, now)?;
            let like = db
                .find_like(&new.user_id, &result_id)?
                .and_then(convert::like)
                .ok_or(ApiError::NotFound)?;
            to_value(like)?
        }
    };

    info!("Admin {} created a {} record on {} database", viewer.id, kind.name(), target);
    Ok(created)
}

/// Patch one record. Fields absent from the body keep their stored value.
pub fn update_record(
    databases: &ConnectionRegistry,
    viewer: Option<&Viewer>,
    table: &str,
    id: &str,
    body: Value,
    db: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Value, ApiError> {
    let viewer = require_viewer(viewer)?;
    let kind: EntityKind = table.parse()?;
    let target = target(db)?;
    let db = databases.get(target);

    let updated = match kind {
        EntityKind::Users => {
            let patch: UserPatch = parse_body(body)?;
            let existing = db.get_user_by_id(id)?.ok_or(ApiError::NotFound)?;
            let name = patch.name.or(existing.name);
            let email = patch.email.or(existing.email);
            let image = patch.image.or(existing.image);

            db.update_user(id, name.as_deref(), email.as_deref(), image.as_deref())?;
            let row = db.get_user_by_id(id)?.ok_or(ApiError::NotFound)?;
            to_value(convert::user(row))?
        }
        EntityKind::Results => {
            let patch: ResultPatch = parse_body(body)?;
            let existing = db.get_result(id)?.ok_or(ApiError::NotFound)?;
            let title = patch.title.unwrap_or(existing.title);
            let content = patch.content.unwrap_or(existing.content);
            let title = validate_result_fields(&title, &content)?;

            db.update_result(id, title, &content, patch.is_public.unwrap_or(existing.is_public), now)?;
            if let Some(is_favorite) = patch.is_favorite {
                db.set_result_favorite(id, is_favorite, now)?;
            }
            to_value(fetch_result(db, id)?)?
        }
        EntityKind::Likes => {
            return Err(ApiError::Validation("likes have no editable fields".into()));
        }
    };

    warn!("Admin {} updated {} '{}' on {} database", viewer.id, kind.name(), id, target);
    Ok(updated)
}

pub fn delete_record(
    databases: &ConnectionRegistry,
    viewer: Option<&Viewer>,
    table: &str,
    id: &str,
    db: Option<&str>,
) -> Result<(), ApiError> {
    let viewer = require_viewer(viewer)?;
    let kind: EntityKind = table.parse()?;
    let target = target(db)?;

    if !databases.get(target).delete_entity(kind, id)? {
        return Err(ApiError::NotFound);
    }
    warn!("Admin {} deleted {} '{}' on {} database", viewer.id, kind.name(), id, target);
    Ok(())
}

fn parse_body<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|e| ApiError::Validation(e.to_string()))
}

fn require_user(db: &Database, id: &str) -> Result<(), ApiError> {
    match db.get_user_by_id(id)? {
        Some(_) => Ok(()),
        None => Err(ApiError::Validation(format!("unknown user: {}", id))),
    }
}

fn fetch_result(db: &Database, id: &str) -> Result<ResultRecord, ApiError> {
    db.get_result(id)?
        .and_then(convert::result_record)
        .ok_or(ApiError::NotFound)
}

fn to_value<T: Serialize>(item: T) -> Result<Value, ApiError> {
    serde_json::to_value(item).map_err(|e| ApiError::Upstream(e.into()))
}

fn to_values<T: Serialize>(items: impl Iterator<Item = T>) -> Result<Vec<Value>, ApiError> {
    items.map(to_value).collect()
}

// -- Handlers --

pub async fn tables(
    State(state): State<AppState>,
    Extension(viewer): Extension<Option<Viewer>>,
    query: Result<Query<TableQuery>, QueryRejection>,
) -> Result<Json<Vec<TableSummary>>, ApiError> {
    let Query(query) = query?;
    let summaries = run_blocking(&state, move |app| {
        table_summaries(&app.databases, viewer.as_ref(), query.db.as_deref())
    })
    .await?;
    Ok(Json(summaries))
}

pub async fn browse(
    State(state): State<AppState>,
    table: Result<Path<String>, PathRejection>,
    Extension(viewer): Extension<Option<Viewer>>,
    query: Result<Query<TableQuery>, QueryRejection>,
) -> Result<Json<TablePage>, ApiError> {
    let Path(table) = table?;
    let Query(query) = query?;
    let page = run_blocking(&state, move |app| {
        browse_table(&app.databases, viewer.as_ref(), &table, &query)
    })
    .await?;
    Ok(Json(page))
}

pub async fn create(
    State(state): State<AppState>,
    table: Result<Path<String>, PathRejection>,
    Extension(viewer): Extension<Option<Viewer>>,
    query: Result<Query<TableQuery>, QueryRejection>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(table) = table?;
    let Query(query) = query?;
    let Json(body) = payload?;
    let created = run_blocking(&state, move |app| {
        create_record(&app.databases, viewer.as_ref(), &table, body, query.db.as_deref(), Utc::now())
    })
    .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update(
    State(state): State<AppState>,
    path: Result<Path<(String, String)>, PathRejection>,
    Extension(viewer): Extension<Option<Viewer>>,
    query: Result<Query<TableQuery>, QueryRejection>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path((table, id)) = path?;
    let Query(query) = query?;
    let Json(body) = payload?;
    let updated = run_blocking(&state, move |app| {
        update_record(&app.databases, viewer.as_ref(), &table, &id, body, query.db.as_deref(), Utc::now())
    })
    .await?;
    Ok(Json(updated))
}

pub async fn remove(
    State(state): State<AppState>,
    path: Result<Path<(String, String)>, PathRejection>,
    Extension(viewer): Extension<Option<Viewer>>,
    query: Result<Query<TableQuery>, QueryRejection>,
) -> Result<StatusCode, ApiError> {
    let Path((table, id)) = path?;
    let Query(query) = query?;
    run_blocking(&state, move |app| {
        delete_record(&app.databases, viewer.as_ref(), &table, &id, query.db.as_deref())
    })
    .await?;
    info!("Admin delete completed");
    Ok(StatusCode::NO_CONTENT)
}
