use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use refit_db::Database;

use crate::middleware::Viewer;

pub fn viewer(id: &str) -> Viewer {
    Viewer {
        id: id.to_string(),
        name: Some(id.to_string()),
        email: None,
        image: None,
    }
}

pub fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
}

/// Insert a result owned by `owner`, creating the owner if needed.
pub fn seed_result(db: &Database, owner: &str, title: &str, is_public: bool, created: DateTime<Utc>) -> Uuid {
    db.ensure_user(owner, Some(owner), None, None, at(0)).unwrap();
    let id = Uuid::new_v4();
    db.insert_result(&id.to_string(), owner, title, "content", is_public, created)
        .unwrap();
    id
}

pub fn seed_like(db: &Database, user: &str, result: Uuid) {
    db.ensure_user(user, Some(user), None, None, at(0)).unwrap();
    db.insert_like(&Uuid::new_v4().to_string(), user, &result.to_string(), at(0))
        .unwrap();
}
