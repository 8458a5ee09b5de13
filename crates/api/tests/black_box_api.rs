use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{json, Value};

use navguard_access::{AccessConfig, InMemoryPermissionStore, Role, RoleRegistry};
use navguard_api::app::{build_app, AppState};
use navguard_core::{TenantId, UserId};

const TEST_CONFIG: &str = r#"{
    "resources": [
        { "key": "page:home", "label": "Dashboard" },
        { "key": "page:parties", "label": "Parties", "parent": "page:home" },
        { "key": "page:ledger", "label": "Ledger", "parent": "page:home" },
        { "key": "page:sales", "label": "Sales", "parent": "page:home" }
    ],
    "routes": [
        { "path": "/", "resource": "page:home" },
        { "path": "/parties", "resource": "page:parties" },
        { "path": "/ledger", "resource": "page:ledger" },
        { "path": "/sales", "resource": "page:sales" }
    ],
    "root_patterns": ["/"],
    "allow_list": [
        { "resource": "page:sales", "roles": ["restricted"] }
    ],
    "landing_route": "/sales",
    "pending_route": "/pending"
}"#;

struct TestServer {
    base_url: String,
    state: Arc<AppState>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Build the app with the same router as prod, bound to an
        // ephemeral port.
        let engine = AccessConfig::from_json(TEST_CONFIG)
            .expect("test config parses")
            .build()
            .expect("test config builds");
        let state = Arc::new(AppState::new(
            engine,
            Arc::new(InMemoryPermissionStore::new()),
            RoleRegistry::new(),
        ));
        let app = build_app(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            state,
            handle,
        }
    }

    /// Register a superadmin (its tenant id is its own user id).
    fn superadmin(&self) -> UserId {
        let user = UserId::new();
        self.state
            .registry
            .assign(TenantId::owned_by(user), user, Role::Superadmin)
            .expect("superadmin registration");
        user
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

trait Identify {
    fn identify(self, user: UserId, tenant: TenantId) -> Self;
}

impl Identify for reqwest::RequestBuilder {
    fn identify(self, user: UserId, tenant: TenantId) -> Self {
        self.header("x-auth-user", user.to_string())
            .header("x-auth-tenant", tenant.to_string())
    }
}

async fn decide(srv: &TestServer, user: UserId, tenant: TenantId, body: Value) -> Value {
    let res = reqwest::Client::new()
        .post(format!("{}/decide", srv.base_url))
        .identify(user, tenant)
        .json(&body)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    res.json().await.unwrap()
}

#[tokio::test]
async fn identity_headers_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/resolve?path=/ledger", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(format!("{}/healthz", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn resolve_maps_paths_to_resource_keys() {
    let srv = TestServer::spawn().await;
    let (user, tenant) = (UserId::new(), TenantId::new());
    let client = reqwest::Client::new();

    let body: Value = client
        .get(format!("{}/resolve?path=/parties/7", srv.base_url))
        .identify(user, tenant)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({ "resource": "page:parties" }));

    let body: Value = client
        .get(format!("{}/resolve?path=/unmapped", srv.base_url))
        .identify(user, tenant)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({ "resource": null }));
}

#[tokio::test]
async fn unprovisioned_user_is_parked_on_pending_route() {
    let srv = TestServer::spawn().await;
    let (user, tenant) = (UserId::new(), TenantId::new());

    let body = decide(&srv, user, tenant, json!({ "path": "/ledger" })).await;

    assert_eq!(body["decision"], "deny");
    assert_eq!(body["reason"], "pending_role");
    assert_eq!(body["redirect"], "/pending");
}

#[tokio::test]
async fn superadmin_is_allowed_in_any_tenant() {
    let srv = TestServer::spawn().await;
    let superadmin = srv.superadmin();
    let foreign_tenant = TenantId::new();

    let body = decide(&srv, superadmin, foreign_tenant, json!({ "path": "/ledger" })).await;
    assert_eq!(body["decision"], "allow");

    let body = decide(&srv, superadmin, foreign_tenant, json!({ "path": "/unmapped" })).await;
    assert_eq!(body["decision"], "allow");
}

#[tokio::test]
async fn admin_lifecycle_from_contact_superadmin_to_allow() {
    let srv = TestServer::spawn().await;
    let superadmin = srv.superadmin();
    let (admin, tenant) = (UserId::new(), TenantId::new());
    let client = reqwest::Client::new();

    // Superadmin provisions the admin role over HTTP.
    let res = client
        .post(format!("{}/tenants/{}/users/{}/role", srv.base_url, tenant, admin))
        .identify(superadmin, TenantId::owned_by(superadmin))
        .json(&json!({ "role": "admin" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    // A fresh admin holds zero grants: a distinct outcome from an explicit
    // per-resource denial.
    let body = decide(&srv, admin, tenant, json!({ "path": "/ledger" })).await;
    assert_eq!(body["decision"], "deny");
    assert_eq!(body["reason"], "contact_superadmin");

    // Superadmin replaces the grant set...
    let res = client
        .post(format!(
            "{}/tenants/{}/users/{}/permissions/sync",
            srv.base_url, tenant, admin
        ))
        .identify(superadmin, TenantId::owned_by(superadmin))
        .json(&json!([{ "resource": "page:ledger", "allowed": true }]))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    // ...and the very next decision sees it (sync before decide is
    // visible to that decide).
    let body = decide(&srv, admin, tenant, json!({ "path": "/ledger" })).await;
    assert_eq!(body["decision"], "allow");

    // Ungranted resources now read as explicit denials.
    let body = decide(&srv, admin, tenant, json!({ "path": "/parties" })).await;
    assert_eq!(body["decision"], "deny");
    assert_eq!(body["reason"], "access_denied");

    // Unmapped areas stay role-gated only.
    let body = decide(&srv, admin, tenant, json!({ "path": "/unmapped" })).await;
    assert_eq!(body["decision"], "allow");
}

#[tokio::test]
async fn restricted_user_is_redirected_to_landing() {
    let srv = TestServer::spawn().await;
    let superadmin = srv.superadmin();
    let (sales, tenant) = (UserId::new(), TenantId::new());
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/tenants/{}/users/{}/role", srv.base_url, tenant, sales))
        .identify(superadmin, TenantId::owned_by(superadmin))
        .json(&json!({ "role": "restricted" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let body = decide(&srv, sales, tenant, json!({ "path": "/ledger" })).await;
    assert_eq!(body["decision"], "redirect");
    assert_eq!(body["redirect"], "/sales");

    let body = decide(&srv, sales, tenant, json!({ "path": "/sales" })).await;
    assert_eq!(body["decision"], "allow");
}

#[tokio::test]
async fn permission_sync_is_superadmin_only() {
    let srv = TestServer::spawn().await;
    let (admin, tenant) = (UserId::new(), TenantId::new());
    srv.state
        .registry
        .assign(tenant, admin, Role::Admin)
        .unwrap();

    let res = reqwest::Client::new()
        .post(format!(
            "{}/tenants/{}/users/{}/permissions/sync",
            srv.base_url, tenant, admin
        ))
        .identify(admin, tenant)
        .json(&json!([{ "resource": "page:ledger", "allowed": true }]))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn permission_sync_rejects_unknown_resources() {
    let srv = TestServer::spawn().await;
    let superadmin = srv.superadmin();
    let (admin, tenant) = (UserId::new(), TenantId::new());

    let res = reqwest::Client::new()
        .post(format!(
            "{}/tenants/{}/users/{}/permissions/sync",
            srv.base_url, tenant, admin
        ))
        .identify(superadmin, TenantId::owned_by(superadmin))
        .json(&json!([{ "resource": "page:bogus", "allowed": true }]))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
