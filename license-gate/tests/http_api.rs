//! HTTP surface: gate middleware, login flow and admin routes

mod common;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use http_body_util::BodyExt;
use license_gate::api::create_router;
use license_gate::auth::{Role, create_user, ensure_superadmin};
use serde_json::{Value, json};
use shared::util::now_millis;
use tower::ServiceExt;

const PASSWORD: &str = "password123";

async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

/// Log in and return the `session=<token>` cookie pair
async fn login(app: &Router, username: &str) -> String {
    let response = send(
        app,
        post_json(
            "/api/auth/login",
            None,
            json!({ "username": username, "password": PASSWORD }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(set_cookie.contains("HttpOnly"));
    set_cookie.split(';').next().unwrap().to_string()
}

struct Fixture {
    app: Router,
    root: String,
    tenant_id: i64,
    license_key: String,
    _alerts: tokio::sync::mpsc::Receiver<license_gate::alert::Alert>,
}

/// Superadmin logged in, one tenant created over the API, one cashier user
async fn fixture() -> Fixture {
    let (state, alerts) = common::app_state(10).await;
    ensure_superadmin(&state.db.pool, "root", PASSWORD, now_millis())
        .await
        .unwrap();
    let app = create_router(state.clone());
    let root = login(&app, "root").await;

    let response = send(
        &app,
        post_json("/api/admin/tenants", Some(&root), json!({ "name": "Loja" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let created = body_json(response).await;
    let tenant_id = created["tenant_id"].as_i64().unwrap();
    let license_key = created["license_key"].as_str().unwrap().to_string();

    create_user(
        &state.db.pool,
        "caixa",
        PASSWORD,
        Role::User,
        Some(tenant_id),
        now_millis(),
    )
    .await
    .unwrap();

    Fixture {
        app,
        root,
        tenant_id,
        license_key,
        _alerts: alerts,
    }
}

async fn activate(f: &Fixture, fingerprint: &str) -> Response<Body> {
    send(
        &f.app,
        post_json(
            "/api/license/activate",
            None,
            json!({ "license_key": f.license_key, "fingerprint": fingerprint }),
        ),
    )
    .await
}

#[tokio::test]
async fn test_public_routes_skip_the_gate() {
    let f = fixture().await;
    let response = send(&f.app, get("/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let response = send(&f.app, get("/login?error=no_tenant", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["error"], "no_tenant");

    let response = send(&f.app, get("/login?error=tenant_unavailable&code=3024", None)).await;
    let page = body_json(response).await;
    assert_eq!(page["code"], 3024);
    assert_eq!(page["message"], "Tenant is disabled");

    let page = body_json(send(&f.app, get("/login?code=4242", None)).await).await;
    assert!(page.get("code").is_none());
}

#[tokio::test]
async fn test_no_session_redirects_to_login() {
    let f = fixture().await;
    let response = send(&f.app, get("/api/me", None)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/login");
    assert!(!response.headers().contains_key(header::SET_COOKIE));

    // a forged token is dropped
    let response = send(&f.app, get("/api/me", Some("session=forged"))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(response.headers().contains_key(header::SET_COOKIE));
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let f = fixture().await;
    let response = send(
        &f.app,
        post_json(
            "/api/auth/login",
            None,
            json!({ "username": "caixa", "password": "not-the-password" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_superadmin_needs_no_fingerprint() {
    let f = fixture().await;
    let response = send(&f.app, get("/api/me", Some(&f.root))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["role"], "SUPER_ADMIN");
}

#[tokio::test]
async fn test_device_flow() {
    let f = fixture().await;
    let response = activate(&f, "till-1").await;
    assert_eq!(response.status(), StatusCode::OK);
    let activated = body_json(response).await;
    assert_eq!(activated["tenant_id"], f.tenant_id);
    assert_eq!(activated["redirect"], "/login");

    let session = login(&f.app, "caixa").await;

    let bound = format!("{session}; fp=till-1");
    let response = send(&f.app, get("/api/me", Some(&bound))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["username"], "caixa");

    let response = send(&f.app, get("/api/me", Some(&session))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], 3022);

    let stranger = format!("{session}; fp=till-9");
    let response = send(&f.app, get("/api/me", Some(&stranger))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(!response.headers().contains_key(header::SET_COOKIE));
    assert_eq!(body_json(response).await["code"], 3020);

    // plain users never reach the admin API
    let response = send(&f.app, get("/api/admin/devices", Some(&bound))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], 2003);
}

#[tokio::test]
async fn test_inactive_license_clears_session() {
    let f = fixture().await;
    activate(&f, "till-1").await;
    let session = login(&f.app, "caixa").await;

    let uri = format!("/api/admin/tenants/{}/license/toggle", f.tenant_id);
    let response = send(&f.app, post_json(&uri, Some(&f.root), json!({}))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["active"], false);

    let cookie = format!("{session}; fp=till-1");
    let response = send(&f.app, get("/api/me", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let cleared = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cleared.contains("Max-Age=0"));
    assert_eq!(body_json(response).await["code"], 3006);

    // activation is refused as well
    let response = activate(&f, "till-2").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_activation_errors() {
    let f = fixture().await;
    let response = send(
        &f.app,
        post_json(
            "/api/license/activate",
            None,
            json!({ "license_key": "nope", "fingerprint": "till-1" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], 3009);

    for fp in ["a", "b", "c"] {
        assert_eq!(activate(&f, fp).await.status(), StatusCode::OK);
    }
    let response = activate(&f, "d").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], 3007);
}

#[tokio::test]
async fn test_device_export_csv() {
    let f = fixture().await;
    activate(&f, "till-1").await;

    let uri = format!("/api/admin/devices/export?tenant_id={}", f.tenant_id);
    let response = send(&f.app, get(&uri, Some(&f.root))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/csv")
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let csv = String::from_utf8(bytes.to_vec()).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("id,tenant,fingerprint,status,created,expiry"));
    assert!(lines.next().unwrap().contains(",Loja,till-1,ACTIVE,"));
}

#[tokio::test]
async fn test_capacity_refusal_over_http() {
    let f = fixture().await;
    let response = send(&f.app, get("/api/admin/tenants/capacity", Some(&f.root))).await;
    let status = body_json(response).await;
    assert_eq!(status["total"], 1);
    assert_eq!(status["limit"], 10);

    for i in 2..=10 {
        let response = send(
            &f.app,
            post_json("/api/admin/tenants", Some(&f.root), json!({ "name": format!("Loja {i}") })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = send(
        &f.app,
        post_json("/api/admin/tenants", Some(&f.root), json!({ "name": "Loja 11" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], 3030);
}
