//! Closed set of record kinds exposed by the admin table browser.
//!
//! Table names never come from the request: a user-supplied name is parsed
//! into an [`EntityKind`] and each kind maps to a fixed, typed query.

use std::str::FromStr;

use anyhow::Result;

use crate::Database;
use crate::models::{LikeRow, ResultRow, UserRow};
use crate::queries::{RESULT_COLUMNS, like_from_row, result_from_row, user_from_row};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Users,
    Results,
    Likes,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown table: {0}")]
pub struct UnknownEntity(pub String);

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [Self::Users, Self::Results, Self::Likes];

    pub fn name(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Results => "results",
            Self::Likes => "likes",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Users => "Users",
            Self::Results => "Results",
            Self::Likes => "Likes",
        }
    }
}

impl FromStr for EntityKind {
    type Err = UnknownEntity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| UnknownEntity(s.to_string()))
    }
}

/// One page of rows of a single kind, newest first.
pub enum EntityRows {
    Users(Vec<UserRow>),
    Results(Vec<ResultRow>),
    Likes(Vec<LikeRow>),
}

#[cfg(test)]
impl EntityRows {
    fn len(&self) -> usize {
        match self {
            Self::Users(rows) => rows.len(),
            Self::Results(rows) => rows.len(),
            Self::Likes(rows) => rows.len(),
        }
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Database {
    pub fn count_entities(&self, kind: EntityKind) -> Result<u64> {
        self.with_conn(|conn| {
            let sql = format!("SELECT COUNT(*) FROM {}", kind.name());
            let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
            Ok(count as u64)
        })
    }

    pub fn list_entities(&self, kind: EntityKind, offset: u64, limit: u64) -> Result<EntityRows> {
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        self.with_conn(|conn| {
            let rows = match kind {
                EntityKind::Users => {
                    let mut stmt = conn.prepare(
                        "SELECT id, name, email, image, created_at FROM users
                         ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2",
                    )?;
                    let rows = stmt
                        .query_map([limit, offset], user_from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    EntityRows::Users(rows)
                }
                EntityKind::Results => {
                    let sql = format!(
                        "SELECT {RESULT_COLUMNS} FROM results r LEFT JOIN users u ON u.id = r.owner_id
                         ORDER BY r.created_at DESC, r.id DESC LIMIT ?1 OFFSET ?2"
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt
                        .query_map([limit, offset], result_from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    EntityRows::Results(rows)
                }
                EntityKind::Likes => {
                    let mut stmt = conn.prepare(
                        "SELECT id, user_id, result_id, created_at FROM likes
                         ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2",
                    )?;
                    let rows = stmt
                        .query_map([limit, offset], like_from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    EntityRows::Likes(rows)
                }
            };
            Ok(rows)
        })
    }

    pub fn delete_entity(&self, kind: EntityKind, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let sql = format!("DELETE FROM {} WHERE id = ?1", kind.name());
            let changed = conn.execute(&sql, [id])?;
            Ok(changed > 0)
        })
    }
}
