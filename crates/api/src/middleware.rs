use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use navguard_core::{TenantId, UserId};

use crate::context::IdentityContext;

/// Header carrying the gateway-authenticated user id.
pub const USER_HEADER: &str = "x-auth-user";
/// Header carrying the active tenant id.
pub const TENANT_HEADER: &str = "x-auth-tenant";

/// Require gateway identity headers and expose them as an extension.
///
/// Token issuance and verification live in the external identity provider;
/// by the time a request reaches this service the gateway has already
/// authenticated it and stamped these headers.
pub async fn identity_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let identity = extract_identity(req.headers())?;
    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

fn extract_identity(headers: &HeaderMap) -> Result<IdentityContext, StatusCode> {
    let user_id: UserId = header_str(headers, USER_HEADER)?
        .parse()
        .map_err(|_| StatusCode::UNAUTHORIZED)?;
    let tenant_id: TenantId = header_str(headers, TENANT_HEADER)?
        .parse()
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    Ok(IdentityContext::new(user_id, tenant_id))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, StatusCode> {
    let value = headers
        .get(name)
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_str()
        .map_err(|_| StatusCode::UNAUTHORIZED)?
        .trim();

    if value.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(value)
}
