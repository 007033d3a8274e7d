//! Visibility and ownership predicates over the `results` table.
//!
//! A [`Predicate`] is pure data: a conjunction of SQL fragments over the
//! `r` alias plus their bound parameters. Nothing here touches the database.

use chrono::{DateTime, Utc};
use refit_types::api::ListMode;
use rusqlite::types::Value;

use crate::{fold, timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("listing mode {0:?} requires a signed-in viewer")]
pub struct ViewerRequired(pub ListMode);

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    clauses: Vec<&'static str>,
    params: Vec<Value>,
}

impl Predicate {
    /// Results the viewer may list in `mode`. `Owned` and
    /// `FavoritesOfOwner` have no meaning without a viewer.
    pub fn for_mode(mode: ListMode, viewer_id: Option<&str>) -> Result<Self, ViewerRequired> {
        match (mode, viewer_id) {
            (ListMode::Public, _) => Ok(Self::public()),
            (ListMode::Owned, Some(viewer)) => Ok(Self::owned_by(viewer)),
            (ListMode::FavoritesOfOwner, Some(viewer)) => Ok(Self::owned_by(viewer).favorites()),
            (_, None) => Err(ViewerRequired(mode)),
        }
    }

    pub fn public() -> Self {
        Self {
            clauses: vec!["r.is_public = 1"],
            params: Vec::new(),
        }
    }

    pub fn owned_by(owner_id: &str) -> Self {
        Self {
            clauses: vec!["r.owner_id = ?"],
            params: vec![Value::Text(owner_id.to_string())],
        }
    }

    pub fn favorites(mut self) -> Self {
        self.clauses.push("r.is_favorite = 1");
        self
    }

    /// Case-insensitive substring match on title or content, folded with
    /// Unicode rules on both sides. Blank terms leave the predicate unchanged.
    pub fn matching(mut self, search: Option<&str>) -> Self {
        let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) else {
            return self;
        };

        let pattern = like_pattern(&fold(term));
        self.clauses
            .push("(fold(r.title) LIKE ? ESCAPE '\\' OR fold(r.content) LIKE ? ESCAPE '\\')");
        self.params.push(Value::Text(pattern.clone()));
        self.params.push(Value::Text(pattern));
        self
    }

    pub fn created_since(mut self, since: DateTime<Utc>) -> Self {
        self.clauses.push("r.created_at >= ?");
        self.params.push(Value::Text(timestamp(since)));
        self
    }

    /// The WHERE body, without the `WHERE` keyword.
    pub fn sql(&self) -> String {
        self.clauses.join(" AND ")
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }
}

/// `%`, `_` and `\` in the term are matched literally.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_mode_ignores_viewer() {
        let anon = Predicate::for_mode(ListMode::Public, None).unwrap();
        let signed_in = Predicate::for_mode(ListMode::Public, Some("u1")).unwrap();
        assert_eq!(anon, signed_in);
        assert_eq!(anon.sql(), "r.is_public = 1");
        assert!(anon.params().is_empty());
    }

    #[test]
    fn owner_modes_require_a_viewer() {
        assert_eq!(
            Predicate::for_mode(ListMode::Owned, None),
            Err(ViewerRequired(ListMode::Owned))
        );
        assert_eq!(
            Predicate::for_mode(ListMode::FavoritesOfOwner, None),
            Err(ViewerRequired(ListMode::FavoritesOfOwner))
        );
    }

    #[test]
    fn favorites_conjoin_owner_and_flag() {
        let p = Predicate::for_mode(ListMode::FavoritesOfOwner, Some("u1")).unwrap();
        assert_eq!(p.sql(), "r.owner_id = ? AND r.is_favorite = 1");
        assert_eq!(p.params(), &[Value::Text("u1".into())]);
    }

    #[test]
    fn search_binds_the_pattern_for_title_and_content() {
        let p = Predicate::public().matching(Some("  50%_OFF "));
        assert!(p.sql().ends_with("(fold(r.title) LIKE ? ESCAPE '\\' OR fold(r.content) LIKE ? ESCAPE '\\')"));
        assert_eq!(
            p.params(),
            &[
                Value::Text("%50\\%\\_off%".into()),
                Value::Text("%50\\%\\_off%".into())
            ]
        );
    }

    #[test]
    fn blank_search_is_ignored() {
        assert_eq!(Predicate::public().matching(Some("   ")), Predicate::public());
        assert_eq!(Predicate::public().matching(None), Predicate::public());
    }
}
