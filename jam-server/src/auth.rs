use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::{header, request::Parts, StatusCode},
};
use jam_core::is_reserved_voter;
use serde::Deserialize;

/// The opaque identity of the caller, which is also their voter id.
///
/// Taken from `Authorization: Bearer <identity>`, or from the `identity` query
/// parameter for websocket upgrades, where browsers can't set headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity(pub String);

#[derive(Deserialize)]
struct IdentityQuery {
    identity: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|x| x.to_str().ok());

        if let Some(header) = header {
            return parse_bearer(header).map(Self);
        }

        let query = Query::<IdentityQuery>::try_from_uri(&parts.uri)
            .map_err(|_| (StatusCode::UNAUTHORIZED, "Missing authorization"))?;

        non_empty(&query.0.identity).map(Self)
    }
}

fn parse_bearer(header: &str) -> Result<String, (StatusCode, &'static str)> {
    let parts: Vec<_> = header.split_ascii_whitespace().collect();

    match parts.as_slice() {
        ["Bearer", identity] => non_empty(identity),
        _ => Err((StatusCode::BAD_REQUEST, "Authorization must be Bearer")),
    }
}

fn non_empty(identity: &str) -> Result<String, (StatusCode, &'static str)> {
    let identity = identity.trim();

    if identity.is_empty() || identity.len() > 128 {
        return Err((StatusCode::UNAUTHORIZED, "Identity is invalid"));
    }

    if is_reserved_voter(identity) {
        return Err((StatusCode::FORBIDDEN, "Identity is reserved"));
    }

    Ok(identity.to_string())
}
