//! API integration tests
//!
//! Drives the real router over a temporary SQLite database

use anyhow::{anyhow, Result};
use axum::http::{header, HeaderValue, StatusCode};
use axum_test::{TestResponse, TestServer};
use sea_orm::Database;
use serde_json::{json, Value};
use sourcetrack::config::AppConfig;
use sourcetrack::database::connection::setup_database;
use sourcetrack::server::app::create_app;
use tempfile::NamedTempFile;

const PASSWORD: &str = "correct-horse-battery";

struct TestApp {
    server: TestServer,
    // Keeps the database file alive for the duration of the test
    _db_file: NamedTempFile,
}

async fn setup_test_server() -> Result<TestApp> {
    let temp_file = NamedTempFile::new()?;
    let db_url = format!("sqlite://{}?mode=rwc", temp_file.path().display());

    let db = Database::connect(&db_url).await?;
    setup_database(&db).await?;

    let config = AppConfig {
        bcrypt_cost: 4,
        login_max_attempts: 3,
        ..AppConfig::default()
    };
    let app = create_app(db, Some("*"), config).await?;
    let server = TestServer::new(app)?;

    Ok(TestApp {
        server,
        _db_file: temp_file,
    })
}

fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {}", token)).expect("valid header")
}

async fn register(server: &TestServer, email: &str) -> TestResponse {
    server
        .post("/api/v1/auth/register")
        .json(&json!({ "email": email, "password": PASSWORD, "firstName": "Test" }))
        .await
}

async fn login(server: &TestServer, email: &str) -> Result<String> {
    let response = server
        .post("/api/v1/auth/login")
        .json(&json!({ "email": email, "password": PASSWORD }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    body["sessionId"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("login response without sessionId"))
}

/// Registered, logged-in admin of a freshly onboarded company
async fn onboarded_admin(server: &TestServer, email: &str) -> Result<String> {
    register(server, email).await;
    let token = login(server, email).await?;
    let response = server
        .post("/api/v1/companies")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "name": "Acme Sourcing" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    Ok(token)
}

async fn create_project(server: &TestServer, token: &str) -> Value {
    let response = server
        .post("/api/v1/projects")
        .add_header(header::AUTHORIZATION, bearer(token))
        .json(&json!({
            "name": "Ceramic mug",
            "products": [{ "name": "Mug 350ml", "article": "MUG-350" }]
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json()
}

fn stage_named<'a>(project: &'a Value, name: &str) -> &'a Value {
    project["stages"]
        .as_array()
        .and_then(|stages| stages.iter().find(|s| s["name"] == name))
        .unwrap_or_else(|| panic!("stage {} missing", name))
}

#[tokio::test]
async fn test_health_endpoint() -> Result<()> {
    let app = setup_test_server().await?;

    let response = app.server.get("/health").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["service"], "sourcetrack");
    assert_eq!(body["status"], "healthy");
    assert!(body["version"].is_string());

    Ok(())
}

#[tokio::test]
async fn test_openapi_document_is_served() -> Result<()> {
    let app = setup_test_server().await?;

    let response = app.server.get("/api-docs/openapi.json").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert!(body["paths"]["/api/v1/stages/{id}"].is_object());

    Ok(())
}

#[tokio::test]
async fn test_login_sets_session_cookie() -> Result<()> {
    let app = setup_test_server().await?;
    let response = register(&app.server, "Ann@Example.com").await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let user: Value = response.json();
    assert_eq!(user["email"], "ann@example.com");
    assert!(user.get("passwordHash").is_none());

    let response = app
        .server
        .post("/api/v1/auth/login")
        .json(&json!({ "email": "ann@example.com", "password": PASSWORD }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("no session cookie"))?;
    assert!(cookie.starts_with("sid="));
    assert!(cookie.contains("HttpOnly"));

    let sid = cookie
        .split(';')
        .next()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("malformed cookie"))?;
    let me = app
        .server
        .get("/api/v1/auth/me")
        .add_header(header::COOKIE, HeaderValue::from_str(&sid)?)
        .await;
    assert_eq!(me.status_code(), StatusCode::OK);
    let me: Value = me.json();
    assert_eq!(me["email"], "ann@example.com");
    assert!(me["companyId"].is_null());

    Ok(())
}

#[tokio::test]
async fn test_logout_ends_the_session() -> Result<()> {
    let app = setup_test_server().await?;
    register(&app.server, "ann@example.com").await;
    let token = login(&app.server, "ann@example.com").await?;

    let response = app
        .server
        .post("/api/v1/auth/logout")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);

    let response = app
        .server
        .get("/api/v1/auth/me")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn test_requests_without_session_are_unauthorized() -> Result<()> {
    let app = setup_test_server().await?;

    let response = app.server.get("/api/v1/projects").await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["error"], "UNAUTHORIZED");

    Ok(())
}

#[tokio::test]
async fn test_repeated_bad_logins_lock_the_account() -> Result<()> {
    let app = setup_test_server().await?;
    register(&app.server, "ann@example.com").await;

    for _ in 0..3 {
        let response = app
            .server
            .post("/api/v1/auth/login")
            .json(&json!({ "email": "ann@example.com", "password": "wrong-password" }))
            .await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    }

    let response = app
        .server
        .post("/api/v1/auth/login")
        .json(&json!({ "email": "ann@example.com", "password": PASSWORD }))
        .await;
    assert_eq!(response.status_code(), StatusCode::TOO_MANY_REQUESTS);

    Ok(())
}

#[tokio::test]
async fn test_company_routes_require_onboarding() -> Result<()> {
    let app = setup_test_server().await?;
    register(&app.server, "ann@example.com").await;
    let token = login(&app.server, "ann@example.com").await?;

    let response = app
        .server
        .get("/api/v1/projects")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["error"], "NO_COMPANY");

    let response = app
        .server
        .post("/api/v1/companies")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "name": "Acme Sourcing" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let company: Value = response.json();
    assert_eq!(company["name"], "Acme Sourcing");
    assert_eq!(company["members"][0]["role"], "admin");

    let response = app
        .server
        .get("/api/v1/templates")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let templates: Value = response.json();
    assert_eq!(templates[0]["name"], "Render");
    assert_eq!(templates[0]["position"], 1);
    assert_eq!(templates[0]["kind"], "render");

    Ok(())
}

#[tokio::test]
async fn test_render_status_round_trip_is_logged_twice() -> Result<()> {
    let app = setup_test_server().await?;
    let token = onboarded_admin(&app.server, "ann@example.com").await?;
    let project = create_project(&app.server, &token).await;

    let render = stage_named(&project, "Render");
    assert_eq!(render["status"], "waiting");
    assert!(render["checklistData"].is_null());
    let stage_id = render["id"].as_i64().ok_or_else(|| anyhow!("stage id"))?;

    for status in ["completed", "waiting"] {
        let response = app
            .server
            .patch(&format!("/api/v1/stages/{}", stage_id))
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&json!({ "status": status }))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
    }

    // Same status again is not a transition
    app.server
        .patch(&format!("/api/v1/stages/{}", stage_id))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "status": "waiting" }))
        .await;

    let response = app
        .server
        .get(&format!("/api/v1/stages/{}/history", stage_id))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let history: Value = response.json();
    let rows = history["statusHistory"]
        .as_array()
        .ok_or_else(|| anyhow!("statusHistory missing"))?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["oldStatus"], "waiting");
    assert_eq!(rows[1]["newStatus"], "completed");
    assert_eq!(rows[0]["oldStatus"], "completed");
    assert_eq!(rows[0]["newStatus"], "waiting");
    assert_eq!(rows[0]["changedBy"]["email"], "ann@example.com");

    Ok(())
}

#[tokio::test]
async fn test_deadline_change_requires_reason() -> Result<()> {
    let app = setup_test_server().await?;
    let token = onboarded_admin(&app.server, "ann@example.com").await?;
    let project = create_project(&app.server, &token).await;
    let stage_id = stage_named(&project, "Render")["id"]
        .as_i64()
        .ok_or_else(|| anyhow!("stage id"))?;
    let path = format!("/api/v1/stages/{}/deadline", stage_id);

    let response = app
        .server
        .patch(&path)
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "deadline": "2026-03-01" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let response = app
        .server
        .patch(&path)
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "deadline": "2026-04-01", "reason": "   " }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "VALIDATION_FAILED");
    assert!(body["fields"]["reason"].is_string());

    let history: Value = app
        .server
        .get(&format!("/api/v1/stages/{}/history", stage_id))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await
        .json();
    let rows = history["deadlineHistory"]
        .as_array()
        .ok_or_else(|| anyhow!("deadlineHistory missing"))?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["reason"], "Initial deadline set");
    assert_eq!(rows[0]["newDeadline"], "2026-03-01");

    Ok(())
}

#[tokio::test]
async fn test_conditional_toggle_drives_status() -> Result<()> {
    let app = setup_test_server().await?;
    let token = onboarded_admin(&app.server, "ann@example.com").await?;
    let project = create_project(&app.server, &token).await;
    let stage_id = stage_named(&project, "3D Model")["id"]
        .as_i64()
        .ok_or_else(|| anyhow!("stage id"))?;

    let response = app
        .server
        .patch(&format!("/api/v1/stages/{}/conditional", stage_id))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "enabled": false }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let stage: Value = response.json();
    assert_eq!(stage["conditionalEnabled"], false);
    assert_eq!(stage["status"], "skip");

    Ok(())
}

#[tokio::test]
async fn test_add_stages_rejects_existing_templates() -> Result<()> {
    let app = setup_test_server().await?;
    let token = onboarded_admin(&app.server, "ann@example.com").await?;
    let project = create_project(&app.server, &token).await;
    let project_id = project["id"].as_i64().ok_or_else(|| anyhow!("project id"))?;
    let template_id = stage_named(&project, "Render")["templateId"].clone();

    let response = app
        .server
        .post(&format!("/api/v1/projects/{}/add-stages", project_id))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "templateIds": [template_id] }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let stage_count = project["stages"].as_array().map(Vec::len);
    let detail: Value = app
        .server
        .get(&format!("/api/v1/projects/{}", project_id))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await
        .json();
    assert_eq!(detail["stages"].as_array().map(Vec::len), stage_count);

    Ok(())
}

#[tokio::test]
async fn test_render_stage_only_accepts_images() -> Result<()> {
    let app = setup_test_server().await?;
    let token = onboarded_admin(&app.server, "ann@example.com").await?;
    let project = create_project(&app.server, &token).await;
    let stage_id = stage_named(&project, "Render")["id"]
        .as_i64()
        .ok_or_else(|| anyhow!("stage id"))?;
    let path = format!("/api/v1/stages/{}/files", stage_id);

    let response = app
        .server
        .post(&path)
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "fileName": "x.txt", "fileUrl": "/uploads/x.txt" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = app
        .server
        .post(&path)
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({
            "fileName": "x.png",
            "fileUrl": "https://cdn.example.com/uploads/x.png?sig=abc",
            "fileType": "image/png",
            "fileSize": 2048
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let file: Value = response.json();
    assert_eq!(file["fileUrl"], "/uploads/x.png");

    let files: Value = app
        .server
        .get(&path)
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await
        .json();
    assert_eq!(files.as_array().map(Vec::len), Some(1));

    Ok(())
}

#[tokio::test]
async fn test_other_tenants_cannot_see_projects() -> Result<()> {
    let app = setup_test_server().await?;
    let ann = onboarded_admin(&app.server, "ann@example.com").await?;
    let bob = onboarded_admin(&app.server, "bob@example.com").await?;
    let project = create_project(&app.server, &ann).await;
    let project_id = project["id"].as_i64().ok_or_else(|| anyhow!("project id"))?;

    let response = app
        .server
        .get(&format!("/api/v1/projects/{}", project_id))
        .add_header(header::AUTHORIZATION, bearer(&bob))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let listed: Value = app
        .server
        .get("/api/v1/projects")
        .add_header(header::AUTHORIZATION, bearer(&bob))
        .await
        .json();
    assert_eq!(listed.as_array().map(Vec::len), Some(0));

    Ok(())
}

#[tokio::test]
async fn test_malformed_json_is_a_validation_error() -> Result<()> {
    let app = setup_test_server().await?;
    let token = onboarded_admin(&app.server, "ann@example.com").await?;

    let response = app
        .server
        .post("/api/v1/projects")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .add_header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .bytes("{\"name\": ".into())
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "VALIDATION_FAILED");

    Ok(())
}

#[tokio::test]
async fn test_comments_and_tasks_appear_in_project_detail() -> Result<()> {
    let app = setup_test_server().await?;
    let token = onboarded_admin(&app.server, "ann@example.com").await?;
    let project = create_project(&app.server, &token).await;
    let project_id = project["id"].as_i64().ok_or_else(|| anyhow!("project id"))?;
    let stage_id = stage_named(&project, "Quotation")["id"]
        .as_i64()
        .ok_or_else(|| anyhow!("stage id"))?;

    let response = app
        .server
        .post("/api/v1/company/users")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "email": "bob@example.com", "password": PASSWORD }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let bob: Value = response.json();

    let response = app
        .server
        .post(&format!("/api/v1/stages/{}/comments", stage_id))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "content": format!("Quote is in, @[Bob]({})", bob["id"]) }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let comment: Value = response.json();
    assert_eq!(comment["mentions"], json!([bob["id"]]));

    let response = app
        .server
        .post(&format!("/api/v1/stages/{}/tasks", stage_id))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "assignedTo": bob["id"], "description": "Check the MOQ" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);

    let detail: Value = app
        .server
        .get(&format!("/api/v1/projects/{}", project_id))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await
        .json();
    let quotation = stage_named(&detail, "Quotation");
    assert_eq!(quotation["comments"].as_array().map(Vec::len), Some(1));
    assert_eq!(quotation["tasks"][0]["assignedToUser"]["email"], "bob@example.com");
    assert_eq!(quotation["tasks"][0]["status"], "pending");

    Ok(())
}
