use std::sync::Arc;

use tracing::error;

use refit_db::{ConnectionRegistry, Database};

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub databases: ConnectionRegistry,
    pub jwt_secret: String,
    pub admin_enabled: bool,
}

impl AppStateInner {
    pub fn db(&self) -> &Database {
        self.databases.primary()
    }
}

/// Run blocking SQLite work off the async runtime.
pub(crate) async fn run_blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppStateInner) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(state.as_ref()))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Upstream(anyhow::anyhow!("blocking task failed: {}", e))
        })?
}
