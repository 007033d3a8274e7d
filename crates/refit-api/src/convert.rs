//! Row -> API model conversion. Corrupt timestamps are logged and replaced
//! with defaults. Rows whose ids do not parse are logged and skipped, never
//! returned under a made-up identity.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use refit_db::models::{LikeRow, ResultRow, UserRow};
use refit_types::models::{AuthorSummary, Like, ResultRecord, User};

pub fn parse_timestamp(raw: &str, what: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's datetime('now') has no timezone; treat it as UTC.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}' on {}: {}", raw, what, e);
            DateTime::default()
        })
}

pub fn parse_id(raw: &str, what: &str) -> Option<Uuid> {
    match raw.parse() {
        Ok(id) => Some(id),
        Err(e) => {
            warn!("Skipping {} with corrupt id '{}': {}", what, raw, e);
            None
        }
    }
}

pub fn result_record(row: ResultRow) -> Option<ResultRecord> {
    let what = format!("result '{}'", row.id);
    let id = parse_id(&row.id, &what)?;
    let author = row.author_id.map(|id| AuthorSummary {
        id,
        name: row.author_name,
        image: row.author_image,
    });

    Some(ResultRecord {
        id,
        owner_id: row.owner_id,
        author,
        title: row.title,
        content: row.content,
        is_public: row.is_public,
        is_favorite: row.is_favorite,
        created_at: parse_timestamp(&row.created_at, &what),
        updated_at: parse_timestamp(&row.updated_at, &what),
    })
}

pub fn user(row: UserRow) -> User {
    let created_at = parse_timestamp(&row.created_at, &format!("user '{}'", row.id));
    User {
        id: row.id,
        name: row.name,
        email: row.email,
        image: row.image,
        created_at,
    }
}

pub fn like(row: LikeRow) -> Option<Like> {
    let what = format!("like '{}'", row.id);
    Some(Like {
        id: parse_id(&row.id, &what)?,
        user_id: row.user_id,
        result_id: parse_id(&row.result_id, &what)?,
        created_at: parse_timestamp(&row.created_at, &what),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_stored_and_sqlite_default_timestamps() {
        let expected = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(parse_timestamp("2026-03-04T05:06:07.000000Z", "t"), expected);
        assert_eq!(parse_timestamp("2026-03-04 05:06:07", "t"), expected);
        assert_eq!(parse_timestamp("garbage", "t"), DateTime::<Utc>::default());
    }

    #[test]
    fn rows_with_corrupt_ids_are_skipped() {
        let row = |id: &str| ResultRow {
            id: id.to_string(),
            owner_id: "owner".into(),
            author_id: None,
            author_name: None,
            author_image: None,
            title: "t".into(),
            content: "c".into(),
            is_public: true,
            is_favorite: false,
            created_at: "2026-03-04T05:06:07Z".into(),
            updated_at: "2026-03-04T05:06:07Z".into(),
        };

        assert!(result_record(row("not-a-uuid")).is_none());
        let id = Uuid::new_v4();
        assert_eq!(result_record(row(&id.to_string())).map(|r| r.id), Some(id));

        let like_row = LikeRow {
            id: Uuid::new_v4().to_string(),
            user_id: "fan".into(),
            result_id: "r1".into(),
            created_at: "2026-03-04T05:06:07Z".into(),
        };
        assert!(like(like_row).is_none());
    }
}
