//! Working out which role a fresh login belongs to.
//!
//! Backend-issued claims win: a `role` or `is_staff`/`is_superuser` field in
//! the login response, then the same claims inside the access token's JWT
//! payload. Only when neither says anything does the username decide, with
//! the literal `admin` mapping to [`Role::Admin`]. That last step trusts the
//! client and should go once the backend always issues a role claim.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::{Map, Value};

use crate::session::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleSource {
    ResponseClaim,
    TokenClaim,
    UsernameFallback,
}

impl RoleSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleSource::ResponseClaim => "response_claim",
            RoleSource::TokenClaim => "token_claim",
            RoleSource::UsernameFallback => "username_fallback",
        }
    }
}

pub fn resolve_role(username: &str, login_body: &Map<String, Value>, access_token: &str) -> (Role, RoleSource) {
    if let Some(role) = role_from_claims(login_body) {
        return (role, RoleSource::ResponseClaim);
    }
    if let Some(role) = jwt_payload(access_token).as_ref().and_then(role_from_claims) {
        return (role, RoleSource::TokenClaim);
    }
    let role = if username == "admin" { Role::Admin } else { Role::User };
    (role, RoleSource::UsernameFallback)
}

fn role_from_claims(claims: &Map<String, Value>) -> Option<Role> {
    if let Some(role) = claims.get("role").and_then(Value::as_str).and_then(|r| r.parse().ok()) {
        return Some(role);
    }
    // Django-style flags, either flat or nested under "user".
    let scope = match claims.get("user") {
        Some(Value::Object(user)) => user,
        _ => claims,
    };
    let flag = |key: &str| scope.get(key).and_then(Value::as_bool);
    match (flag("is_staff"), flag("is_superuser")) {
        (Some(true), _) | (_, Some(true)) => Some(Role::Admin),
        (Some(false), _) => Some(Role::User),
        _ => None,
    }
}

/// Decode the middle segment of a JWT without checking its signature.
fn jwt_payload(token: &str) -> Option<Map<String, Value>> {
    let mut parts = token.split('.');
    let (_header, payload, _sig) = (parts.next()?, parts.next()?, parts.next()?);
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    match serde_json::from_slice::<Value>(&bytes).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
