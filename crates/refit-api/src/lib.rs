pub mod admin;
pub mod aggregate;
pub mod auth;
pub mod convert;
pub mod error;
pub mod likes;
pub mod listing;
pub mod middleware;
pub mod results;
pub mod routes;
pub mod state;
pub mod validation;

#[cfg(test)]
mod test_support;

pub use error::ApiError;
pub use routes::router;
pub use state::{AppState, AppStateInner};
