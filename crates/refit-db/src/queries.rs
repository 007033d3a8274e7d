use std::collections::{HashMap, HashSet};

use crate::filter::Predicate;
use crate::models::{LikeRow, ResultRow, UserRow};
use crate::{Database, timestamp};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::types::{ToSql, Value};
use rusqlite::{Connection, Row};

/// Upper bound on ids bound into one `IN (...)` list. SQLite caps host
/// parameters at 32766.
const ID_BATCH: usize = 500;

pub(crate) const RESULT_COLUMNS: &str = "r.id, r.owner_id, u.id, u.name, u.image, r.title, r.content, \
     r.is_public, r.is_favorite, r.created_at, r.updated_at";

impl Database {
    // -- Users --

    /// Insert or refresh a user from the identity provider's profile.
    pub fn upsert_user(
        &self,
        id: &str,
        name: Option<&str>,
        email: Option<&str>,
        image: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<UserRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, email, image, created_at) VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    email = excluded.email,
                    image = excluded.image",
                rusqlite::params![id, name, email, image, timestamp(at)],
            )?;
            query_user_by_id(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("User vanished after upsert: {}", id))
        })
    }

    /// Create the user row if it does not exist yet; existing rows are left alone.
    pub fn ensure_user(
        &self,
        id: &str,
        name: Option<&str>,
        email: Option<&str>,
        image: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO users (id, name, email, image, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, name, email, image, timestamp(at)],
            )?;
            Ok(())
        })
    }

    /// Plain insert; an existing id fails with a unique violation.
    pub fn insert_user(
        &self,
        id: &str,
        name: Option<&str>,
        email: Option<&str>,
        image: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<UserRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, email, image, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, name, email, image, timestamp(at)],
            )?;
            query_user_by_id(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("User vanished after insert: {}", id))
        })
    }

    pub fn update_user(
        &self,
        id: &str,
        name: Option<&str>,
        email: Option<&str>,
        image: Option<&str>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET name = ?2, email = ?3, image = ?4 WHERE id = ?1",
                rusqlite::params![id, name, email, image],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    // -- Results --

    pub fn insert_result(
        &self,
        id: &str,
        owner_id: &str,
        title: &str,
        content: &str,
        is_public: bool,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let at = timestamp(at);
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO results (id, owner_id, title, content, is_public, is_favorite, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)",
                rusqlite::params![id, owner_id, title, content, is_public, at],
            )?;
            Ok(())
        })
    }

    pub fn get_result(&self, id: &str) -> Result<Option<ResultRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {RESULT_COLUMNS} FROM results r LEFT JOIN users u ON u.id = r.owner_id WHERE r.id = ?1"
            );
            conn.query_row(&sql, [id], result_from_row).optional()
        })
    }

    /// Fetch a result only if `owner_id` owns it. A miss does not say which
    /// of the two conditions failed.
    pub fn get_owned_result(&self, id: &str, owner_id: &str) -> Result<Option<ResultRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {RESULT_COLUMNS} FROM results r LEFT JOIN users u ON u.id = r.owner_id
                 WHERE r.id = ?1 AND r.owner_id = ?2"
            );
            conn.query_row(&sql, [id, owner_id], result_from_row).optional()
        })
    }

    pub fn update_result(
        &self,
        id: &str,
        title: &str,
        content: &str,
        is_public: bool,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE results SET title = ?2, content = ?3, is_public = ?4, updated_at = ?5 WHERE id = ?1",
                rusqlite::params![id, title, content, is_public, timestamp(at)],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn set_result_public(&self, id: &str, is_public: bool, at: DateTime<Utc>) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE results SET is_public = ?2, updated_at = ?3 WHERE id = ?1",
                rusqlite::params![id, is_public, timestamp(at)],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn set_result_favorite(&self, id: &str, is_favorite: bool, at: DateTime<Utc>) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE results SET is_favorite = ?2, updated_at = ?3 WHERE id = ?1",
                rusqlite::params![id, is_favorite, timestamp(at)],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_result(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM results WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    /// Results matching `predicate`, newest first. `window` is
    /// `(offset, limit)`; `None` materializes the whole eligible set.
    pub fn find_results(
        &self,
        predicate: &Predicate,
        window: Option<(u64, u64)>,
    ) -> Result<Vec<ResultRow>> {
        self.with_conn(|conn| {
            let mut sql = format!(
                "SELECT {RESULT_COLUMNS} FROM results r LEFT JOIN users u ON u.id = r.owner_id
                 WHERE {}
                 ORDER BY r.created_at DESC, r.id DESC",
                predicate.sql()
            );
            let mut params: Vec<Value> = predicate.params().to_vec();
            if let Some((offset, limit)) = window {
                sql.push_str(" LIMIT ? OFFSET ?");
                params.push(Value::Integer(clamp_i64(limit)));
                params.push(Value::Integer(clamp_i64(offset)));
            }

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), result_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Every result matching `predicate` with its like count, computed in the
    /// same query. Newest first; callers re-rank in memory.
    pub fn find_results_with_like_counts(&self, predicate: &Predicate) -> Result<Vec<(ResultRow, u64)>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {RESULT_COLUMNS}, COALESCE(lc.likes, 0)
                 FROM results r
                 LEFT JOIN users u ON u.id = r.owner_id
                 LEFT JOIN (SELECT result_id, COUNT(*) AS likes FROM likes GROUP BY result_id) lc
                    ON lc.result_id = r.id
                 WHERE {}
                 ORDER BY r.created_at DESC, r.id DESC",
                predicate.sql()
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(predicate.params().iter()), |row| {
                    let likes: i64 = row.get(11)?;
                    Ok((result_from_row(row)?, likes as u64))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_results(&self, predicate: &Predicate) -> Result<u64> {
        self.with_conn(|conn| {
            let sql = format!("SELECT COUNT(*) FROM results r WHERE {}", predicate.sql());
            let count: i64 = conn.query_row(
                &sql,
                rusqlite::params_from_iter(predicate.params().iter()),
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }

    // -- Likes --

    pub fn find_like(&self, user_id: &str, result_id: &str) -> Result<Option<LikeRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, user_id, result_id, created_at FROM likes WHERE user_id = ?1 AND result_id = ?2",
                [user_id, result_id],
                like_from_row,
            )
            .optional()
        })
    }

    /// Insert a like. A second like for the same `(user_id, result_id)`
    /// fails with a unique violation, see [`crate::is_unique_violation`].
    pub fn insert_like(
        &self,
        id: &str,
        user_id: &str,
        result_id: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO likes (id, user_id, result_id, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, user_id, result_id, timestamp(at)],
            )?;
            Ok(())
        })
    }

    pub fn delete_like(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM likes WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    pub fn count_likes(&self, result_id: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM likes WHERE result_id = ?1",
                [result_id],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }

    /// Like counts for a batch of results, one query per batch of ids.
    /// Results without likes are absent from the map.
    pub fn count_likes_by_result(&self, result_ids: &[String]) -> Result<HashMap<String, u64>> {
        let mut counts = HashMap::new();
        if result_ids.is_empty() {
            return Ok(counts);
        }

        self.with_conn(|conn| {
            for batch in result_ids.chunks(ID_BATCH) {
                let sql = format!(
                    "SELECT result_id, COUNT(*) FROM likes WHERE result_id IN ({}) GROUP BY result_id",
                    placeholders(1, batch.len())
                );

                let mut stmt = conn.prepare(&sql)?;
                let params: Vec<&dyn ToSql> = batch.iter().map(|id| id as &dyn ToSql).collect();

                let rows = stmt.query_map(params.as_slice(), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
                })?;
                for row in rows {
                    let (id, count) = row?;
                    counts.insert(id, count);
                }
            }
            Ok(counts)
        })
    }

    /// Which of `result_ids` the user has liked, one query per batch of ids.
    pub fn liked_result_ids(&self, user_id: &str, result_ids: &[String]) -> Result<HashSet<String>> {
        let mut liked = HashSet::new();
        if result_ids.is_empty() {
            return Ok(liked);
        }

        self.with_conn(|conn| {
            for batch in result_ids.chunks(ID_BATCH) {
                let sql = format!(
                    "SELECT result_id FROM likes WHERE user_id = ?1 AND result_id IN ({})",
                    placeholders(2, batch.len())
                );

                let mut stmt = conn.prepare(&sql)?;
                let mut params: Vec<&dyn ToSql> = Vec::with_capacity(batch.len() + 1);
                params.push(&user_id);
                params.extend(batch.iter().map(|id| id as &dyn ToSql));

                let rows = stmt.query_map(params.as_slice(), |row| row.get::<_, String>(0))?;
                for row in rows {
                    liked.insert(row?);
                }
            }
            Ok(liked)
        })
    }
}

pub(crate) fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    conn.query_row(
        "SELECT id, name, email, image, created_at FROM users WHERE id = ?1",
        [id],
        user_from_row,
    )
    .optional()
}

pub(crate) fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        image: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub(crate) fn result_from_row(row: &Row<'_>) -> rusqlite::Result<ResultRow> {
    Ok(ResultRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        author_id: row.get(2)?,
        author_name: row.get(3)?,
        author_image: row.get(4)?,
        title: row.get(5)?,
        content: row.get(6)?,
        is_public: row.get(7)?,
        is_favorite: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

pub(crate) fn like_from_row(row: &Row<'_>) -> rusqlite::Result<LikeRow> {
    Ok(LikeRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        result_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// `?first, ?first+1, ...` for `count` parameters.
fn placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

fn clamp_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
