//! Like counts and per-viewer like state for a batch of results.
//!
//! At most two queries per batch: one grouped count, and one membership
//! lookup when a viewer is known. The two reads are not in one transaction,
//! so a like landing between them can make a row read as liked with a count
//! that does not include it yet.

use refit_db::Database;
use refit_db::models::ResultRow;
use refit_types::api::AnnotatedResult;

use crate::convert::result_record;
use crate::error::ApiError;

/// Attach like counts. `liked_by_me` starts out false.
pub fn with_like_counts(db: &Database, rows: Vec<ResultRow>) -> Result<Vec<AnnotatedResult>, ApiError> {
    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let counts = db.count_likes_by_result(&ids)?;

    Ok(counted(rows.into_iter().map(|row| {
        let likes_count = counts.get(&row.id).copied().unwrap_or(0);
        (row, likes_count)
    })))
}

/// Rows that already carry their like count, e.g. from
/// `find_results_with_like_counts`.
pub fn counted(rows: impl IntoIterator<Item = (ResultRow, u64)>) -> Vec<AnnotatedResult> {
    rows.into_iter()
        .filter_map(|(row, likes_count)| {
            Some(AnnotatedResult {
                result: result_record(row)?,
                likes_count,
                liked_by_me: false,
            })
        })
        .collect()
}

/// Fill in `liked_by_me` for a signed-in viewer with one batched lookup.
pub fn mark_liked_by_viewer(
    db: &Database,
    viewer_id: &str,
    items: &mut [AnnotatedResult],
) -> Result<(), ApiError> {
    let ids: Vec<String> = items.iter().map(|i| i.result.id.to_string()).collect();
    let liked = db.liked_result_ids(viewer_id, &ids)?;

    for (item, id) in items.iter_mut().zip(&ids) {
        item.liked_by_me = liked.contains(id);
    }
    Ok(())
}

/// Counts plus, for a known viewer, like state. Anonymous requests get the
/// bare shape and never hit the likes-membership query.
pub fn annotate(
    db: &Database,
    rows: Vec<ResultRow>,
    viewer_id: Option<&str>,
) -> Result<Vec<AnnotatedResult>, ApiError> {
    let mut items = with_like_counts(db, rows)?;
    if let Some(viewer_id) = viewer_id {
        mark_liked_by_viewer(db, viewer_id, &mut items)?;
    }
    Ok(items)
}
