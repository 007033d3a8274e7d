//! Database row types, mapped directly from SQLite rows. Kept apart from the
//! refit-types API models so the DB layer stays independent.

#[derive(Debug)]
pub struct UserRow {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
    pub created_at: String,
}

pub struct ResultRow {
    pub id: String,
    pub owner_id: String,
    /// Joined from `users`; `None` when the owner row is missing.
    pub author_id: Option<String>,
    pub author_name: Option<String>,
    pub author_image: Option<String>,
    pub title: String,
    pub content: String,
    pub is_public: bool,
    pub is_favorite: bool,
    pub created_at: String,
    pub updated_at: String,
}

pub struct LikeRow {
    pub id: String,
    pub user_id: String,
    pub result_id: String,
    pub created_at: String,
}
