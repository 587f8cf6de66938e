use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, HeaderMap};
use common_http_errors::ApiError;
use serde::{Deserialize, Serialize};
use tracing::Span;

use crate::roles::RoleSet;

pub const USER_ID_HEADER: &str = "X-User-ID";
pub const ROLES_HEADER: &str = "X-User-Roles";

/// Caller identity as verified and attached by the perimeter. Trusted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: String,
    pub roles: RoleSet,
}

impl Principal {
    pub fn new(user_id: impl Into<String>, roles: RoleSet) -> Self {
        Self { user_id: user_id.into(), roles }
    }
}

pub struct PrincipalExtractor(pub Principal);

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[async_trait]
impl<S> FromRequestParts<S> for PrincipalExtractor where S: Send + Sync {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let headers = &parts.headers;
        let user_id = header_str(headers, USER_ID_HEADER)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::bad_request("missing_user_id", "Missing X-User-ID header"))?
            .to_string();
        // Absent roles are not a malformed request; the policy denies them.
        let roles = RoleSet::parse(header_str(headers, ROLES_HEADER));

        Span::current().record("user_id", tracing::field::display(&user_id));

        Ok(PrincipalExtractor(Principal { user_id, roles }))
    }
}
