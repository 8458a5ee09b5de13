use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;

use navguard_access::{
    AccessEngine, AccessSession, AccessTarget, Decision, DenyReason, PermissionSet,
    PermissionStore, ResourceKey, Role, RoleRegistry, Route, SessionError, SessionSnapshot,
    SessionState,
};
use navguard_core::{TenantId, UserId};

use crate::context::IdentityContext;
use crate::middleware::identity_middleware;

/// Shared service state: the immutable engine plus the mutable stores and
/// the per-user session map.
pub struct AppState {
    engine: AccessEngine,
    store: Arc<dyn PermissionStore>,
    pub registry: RoleRegistry,
    sessions: Mutex<HashMap<(TenantId, UserId), AccessSession>>,
}

impl AppState {
    pub fn new(engine: AccessEngine, store: Arc<dyn PermissionStore>, registry: RoleRegistry) -> Self {
        Self {
            engine,
            store,
            registry,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn engine(&self) -> &AccessEngine {
        &self.engine
    }

    /// Session snapshot for the request identity, loading the permission
    /// set on first use (or after an invalidation).
    ///
    /// The in-process store load is synchronous, but the session still goes
    /// through the token dance so a superseded fetch can never land.
    fn ready_snapshot(&self, identity: IdentityContext) -> Result<SessionSnapshot, SessionError> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .entry((identity.tenant_id(), identity.user_id()))
            .or_insert_with(|| {
                AccessSession::new(
                    identity.user_id(),
                    identity.tenant_id(),
                    self.registry.role_of(identity.tenant_id(), identity.user_id()),
                )
            });

        if !matches!(session.state(), SessionState::Ready(_)) {
            let token = session.begin_load();
            let grants = self.store.list(identity.tenant_id(), identity.user_id());
            session.complete_load(token, PermissionSet::from_grants(&grants, Utc::now()));
        }

        session.snapshot()
    }

    /// Drop any live session for the user so the next request re-resolves
    /// role and permissions.
    fn evict_session(&self, tenant_id: TenantId, user_id: UserId) {
        let mut sessions = self.sessions.lock().unwrap();
        sessions.remove(&(tenant_id, user_id));
    }

    fn require_superadmin(&self, identity: IdentityContext) -> Result<(), StatusCode> {
        match self
            .registry
            .role_of(identity.tenant_id(), identity.user_id())
        {
            Some(Role::Superadmin) => Ok(()),
            _ => Err(StatusCode::FORBIDDEN),
        }
    }
}

/// Build the full router (same wiring in prod and tests).
pub fn build_app(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/resolve", get(resolve_path))
        .route("/decide", post(decide))
        .route(
            "/tenants/:tenant/users/:user/permissions/sync",
            post(sync_permissions),
        )
        .route("/tenants/:tenant/users/:user/role", post(assign_role))
        .layer(ServiceBuilder::new().layer(middleware::from_fn(identity_middleware)))
        .with_state(state);

    Router::new().route("/healthz", get(healthz)).merge(protected)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
struct ResolveQuery {
    path: String,
}

#[derive(Debug, Serialize)]
struct ResolveResponse {
    resource: Option<ResourceKey>,
}

async fn resolve_path(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ResolveQuery>,
) -> Json<ResolveResponse> {
    Json(ResolveResponse {
        resource: state.engine.resolve(&query.path).cloned(),
    })
}

#[derive(Debug, Deserialize)]
struct DecideRequest {
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    resource: Option<String>,
}

#[derive(Debug, Serialize)]
struct DecideResponse {
    decision: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<DenyReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect: Option<Route>,
}

async fn decide(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<IdentityContext>,
    Json(request): Json<DecideRequest>,
) -> Result<Json<DecideResponse>, StatusCode> {
    let resource_key = request.resource.map(ResourceKey::new);
    let target = match (&resource_key, &request.path) {
        (Some(key), _) => AccessTarget::Resource(key.clone()),
        (None, Some(path)) => AccessTarget::Path(path.as_str()),
        (None, None) => return Err(StatusCode::UNPROCESSABLE_ENTITY),
    };

    let snapshot = state
        .ready_snapshot(identity)
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    let response = match state.engine.decide(&snapshot, target) {
        Decision::Allow => DecideResponse {
            decision: "allow",
            reason: None,
            redirect: None,
        },
        Decision::Deny { reason } => DecideResponse {
            decision: "deny",
            reason: Some(reason),
            // Pending users are parked on a dedicated route; the other
            // deny reasons render in place.
            redirect: matches!(reason, DenyReason::PendingRole)
                .then(|| state.engine.pending_route().clone()),
        },
        Decision::Redirect { to } => DecideResponse {
            decision: "redirect",
            reason: None,
            redirect: Some(to),
        },
    };

    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct GrantBody {
    resource: String,
    allowed: bool,
}

async fn sync_permissions(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<IdentityContext>,
    Path((tenant_id, user_id)): Path<(TenantId, UserId)>,
    Json(grants): Json<Vec<GrantBody>>,
) -> Result<impl IntoResponse, StatusCode> {
    state.require_superadmin(identity)?;

    let mut replacement = Vec::with_capacity(grants.len());
    for grant in grants {
        let key = ResourceKey::new(grant.resource);
        if !state.engine.hierarchy().contains(&key) {
            return Err(StatusCode::UNPROCESSABLE_ENTITY);
        }
        replacement.push((key, grant.allowed));
    }

    let count = replacement.len();
    state.store.sync_all(tenant_id, user_id, replacement);

    // The affected session must not keep serving the stale snapshot.
    let mut sessions = state.sessions.lock().unwrap();
    if let Some(session) = sessions.get_mut(&(tenant_id, user_id)) {
        session.invalidate();
    }
    drop(sessions);

    tracing::info!(%tenant_id, %user_id, grants = count, "permission set replaced");

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct AssignRoleBody {
    role: Role,
}

async fn assign_role(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<IdentityContext>,
    Path((tenant_id, user_id)): Path<(TenantId, UserId)>,
    Json(body): Json<AssignRoleBody>,
) -> Result<impl IntoResponse, StatusCode> {
    state.require_superadmin(identity)?;

    state
        .registry
        .assign(tenant_id, user_id, body.role)
        .map_err(|_| StatusCode::UNPROCESSABLE_ENTITY)?;

    // Re-resolve role (and permissions) on the user's next request.
    state.evict_session(tenant_id, user_id);

    tracing::info!(%tenant_id, %user_id, role = %body.role, "role assigned");

    Ok(StatusCode::NO_CONTENT)
}
