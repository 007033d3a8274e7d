use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use refit_types::api::Claims;

use crate::error::ApiError;
use crate::state::AppState;

/// The signed-in requester, as vouched for by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
}

impl From<Claims> for Viewer {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            name: claims.name,
            email: claims.email,
            image: claims.picture,
        }
    }
}

/// Resolve the optional viewer from the Authorization header.
///
/// No header means an anonymous request and `None` is stored in the request
/// extensions. A header that is present but malformed or carries an invalid
/// token is rejected outright rather than downgraded to anonymous.
pub async fn resolve_viewer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let viewer = match req.headers().get(header::AUTHORIZATION) {
        None => None,
        Some(value) => {
            let token = value
                .to_str()
                .ok()
                .and_then(|v| v.strip_prefix("Bearer "))
                .ok_or(ApiError::Unauthenticated)?;
            Some(decode_viewer(token, &state.jwt_secret)?)
        }
    };

    req.extensions_mut().insert(viewer);
    Ok(next.run(req).await)
}

pub fn decode_viewer(token: &str, secret: &str) -> Result<Viewer, ApiError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthenticated)?;

    Ok(token_data.claims.into())
}
