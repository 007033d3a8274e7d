//! Ranked, access-filtered, paginated listings.
//!
//! `recent` pages in the store with a single LIMIT/OFFSET query. `popular`
//! ranks on a derived count, so it loads the whole eligible set together with
//! its like counts, sorts in memory and only then slices out the page. That
//! is O(N) in the eligible set on every request; there is no maintained
//! ranking.

use std::cmp::Ordering;

use axum::{
    Extension, Json,
    extract::{Query, State, rejection::QueryRejection},
};
use chrono::{DateTime, Duration, Utc};

use refit_db::{Database, Predicate};
use refit_types::api::{AnnotatedResult, HomeFeed, ListQuery, Page, Pagination, SortOrder};

use crate::aggregate::{annotate, counted, mark_liked_by_viewer};
use crate::error::ApiError;
use crate::middleware::Viewer;
use crate::state::{AppState, run_blocking};
use crate::validation::validate_window;

pub const FEED_LIMIT: usize = 20;
pub const FEED_RECENT_HOURS: i64 = 24;

pub fn list_results(
    db: &Database,
    viewer: Option<&Viewer>,
    query: &ListQuery,
) -> Result<Page<AnnotatedResult>, ApiError> {
    let (page, limit) = validate_window(query.page, query.limit)?;
    let viewer_id = viewer.map(|v| v.id.as_str());
    let predicate = Predicate::for_mode(query.mode, viewer_id)?.matching(query.search.as_deref());

    let (items, total) = match query.sort {
        SortOrder::Recent => {
            let total = db.count_results(&predicate)?;
            let rows = db.find_results(&predicate, Some((offset(page, limit), limit as u64)))?;
            (annotate(db, rows, viewer_id)?, total)
        }
        SortOrder::Popular => {
            let mut ranked = counted(db.find_results_with_like_counts(&predicate)?);
            let total = ranked.len() as u64;
            rank_by_popularity(&mut ranked);

            let mut items = slice_page(ranked, page, limit);
            if let Some(viewer_id) = viewer_id {
                mark_liked_by_viewer(db, viewer_id, &mut items)?;
            }
            (items, total)
        }
    };

    Ok(Page {
        items,
        pagination: pagination(page, limit, total),
    })
}

/// Landing-page feed: public results from the last day, and the most-liked
/// public results that have at least one like.
pub fn home_feed(db: &Database, viewer: Option<&Viewer>, now: DateTime<Utc>) -> Result<HomeFeed, ApiError> {
    let viewer_id = viewer.map(|v| v.id.as_str());

    let since = now - Duration::hours(FEED_RECENT_HOURS);
    let recent_rows = db.find_results(
        &Predicate::public().created_since(since),
        Some((0, FEED_LIMIT as u64)),
    )?;
    let recent = annotate(db, recent_rows, viewer_id)?;

    let mut popular = counted(db.find_results_with_like_counts(&Predicate::public())?);
    popular.retain(|item| item.likes_count > 0);
    rank_by_popularity(&mut popular);
    popular.truncate(FEED_LIMIT);
    if let Some(viewer_id) = viewer_id {
        mark_liked_by_viewer(db, viewer_id, &mut popular)?;
    }

    Ok(HomeFeed { recent, popular })
}

/// Most likes first, newer first among equals. The id is a last resort so
/// that pages never overlap or skip when counts and timestamps tie.
pub fn rank_by_popularity(items: &mut [AnnotatedResult]) {
    items.sort_by(popularity_order);
}

fn popularity_order(a: &AnnotatedResult, b: &AnnotatedResult) -> Ordering {
    b.likes_count
        .cmp(&a.likes_count)
        .then_with(|| b.result.created_at.cmp(&a.result.created_at))
        .then_with(|| b.result.id.cmp(&a.result.id))
}

pub fn slice_page<T>(items: Vec<T>, page: u32, limit: u32) -> Vec<T> {
    let skip = usize::try_from(offset(page, limit)).unwrap_or(usize::MAX);
    items.into_iter().skip(skip).take(limit as usize).collect()
}

pub fn pagination(page: u32, limit: u32, total: u64) -> Pagination {
    Pagination {
        page,
        limit,
        total,
        total_pages: total.div_ceil(u64::from(limit)),
    }
}

fn offset(page: u32, limit: u32) -> u64 {
    u64::from(page.saturating_sub(1)) * u64::from(limit)
}

pub async fn list(
    State(state): State<AppState>,
    Extension(viewer): Extension<Option<Viewer>>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Page<AnnotatedResult>>, ApiError> {
    let Query(query) = query?;
    let page = run_blocking(&state, move |app| list_results(app.db(), viewer.as_ref(), &query)).await?;
    Ok(Json(page))
}

pub async fn feed(
    State(state): State<AppState>,
    Extension(viewer): Extension<Option<Viewer>>,
) -> Result<Json<HomeFeed>, ApiError> {
    let feed = run_blocking(&state, move |app| home_feed(app.db(), viewer.as_ref(), Utc::now())).await?;
    Ok(Json(feed))
}
