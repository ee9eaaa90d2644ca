//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::NaiveDate;
use http_body_util::BodyExt;
use tally_core::db::{Clock, Database};
use tally_core::models::{NewEntry, PaymentAccount};
use tally_core::{ClassifierClient, MockClassifier};
use tower::ServiceExt;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
}

fn test_db() -> Database {
    Database::in_memory()
        .unwrap()
        .with_clock(Clock::Fixed(today()))
}

fn setup_test_app() -> Router {
    create_router(Dispatcher::new(test_db()), ServerConfig::default())
}

fn setup_app_with(db: Database, mock: Option<MockClassifier>, config: ServerConfig) -> Router {
    let mut dispatcher = Dispatcher::new(db);
    if let Some(mock) = mock {
        dispatcher = dispatcher.with_classifier(ClassifierClient::mock(mock));
    }
    create_router(dispatcher, config)
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get_body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

// ========== Health and Auth Tests ==========

#[tokio::test]
async fn test_health() {
    let app = setup_test_app();

    let response = app.oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["classifier"].is_null());
}

#[tokio::test]
async fn test_auth_required_when_keys_configured() {
    let config = ServerConfig {
        api_keys: vec!["secret-key".to_string()],
        ..Default::default()
    };
    let app = setup_app_with(test_db(), None, config);

    let response = app
        .clone()
        .oneshot(get("/api/users/alice/balance"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/users/alice/balance")
                .header("authorization", "Bearer wrong-key!")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/users/alice/balance")
                .header("authorization", "Bearer secret-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Health stays open
    let response = app.oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[test]
fn test_validate_api_key() {
    let keys = vec!["abc".to_string(), "longer-key".to_string()];
    assert!(validate_api_key("abc", &keys));
    assert!(validate_api_key("longer-key", &keys));
    assert!(!validate_api_key("abd", &keys));
    assert!(!validate_api_key("", &keys));
}

#[test]
fn test_server_config_from_settings() {
    let settings = ServerSettings {
        api_keys: vec![" k1 ".to_string(), "".to_string()],
        allowed_origins: vec!["http://localhost:5173".to_string()],
        ..Default::default()
    };
    let config = ServerConfig::from_settings(&settings);
    assert_eq!(config.api_keys, vec!["k1".to_string()]);
    assert!(config.requires_auth());
    assert!(!ServerConfig::default().requires_auth());
}

// ========== Error Mapping Tests ==========

#[test]
fn test_error_status_mapping() {
    use tally_core::Error;

    let cases = [
        (Error::Rejected("bad".into()), StatusCode::UNPROCESSABLE_ENTITY),
        (Error::InvalidIntent("huh".into()), StatusCode::BAD_REQUEST),
        (Error::Classifier("down".into()), StatusCode::SERVICE_UNAVAILABLE),
        (Error::NotFound("x".into()), StatusCode::NOT_FOUND),
        (Error::Config("oops".into()), StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (err, status) in cases {
        assert_eq!(AppError::from(err).status(), status);
    }
}

// ========== Entry API Tests ==========

#[tokio::test]
async fn test_create_and_read_entries() {
    let db = test_db();
    let app = setup_app_with(db.clone(), None, ServerConfig::default());

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/users/alice/entries",
            serde_json::json!({
                "kind": "expense",
                "amount": 150.0,
                "category": "food",
                "payment": {"method": "cash"}
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert!(json["id"].as_i64().unwrap() > 0);
    assert!(json["alert"].is_null());

    let response = app
        .clone()
        .oneshot(get("/api/users/alice/days/2024-03-15"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["total_expense"], 150.0);
    assert_eq!(json["expenses"].as_array().unwrap().len(), 1);

    let response = app
        .clone()
        .oneshot(get("/api/users/alice/balance"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["balance"], -150.0);

    // Another user sees nothing
    let response = app
        .clone()
        .oneshot(get("/api/users/bob/days/2024-03-15"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(get("/api/users/alice/days/yesterday"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_entry_rejects_zero_amount() {
    let app = setup_test_app();

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/users/alice/entries",
            serde_json::json!({"kind": "expense", "amount": 0.0, "category": "food"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = get_body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("positive"));
}

#[tokio::test]
async fn test_create_entry_reports_budget_alert() {
    let db = test_db();
    db.set_budget("alice", "food", 1000.0).unwrap();
    let app = setup_app_with(db, None, ServerConfig::default());

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/users/alice/entries",
            serde_json::json!({"kind": "expense", "amount": 900.0, "category": "food"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["alert"]["level"], "warning");
}

#[tokio::test]
async fn test_update_and_delete_entry() {
    let db = test_db();
    let id = db
        .save_entry_today("alice", &NewEntry::expense(60.0, "coffee", PaymentAccount::cash()))
        .unwrap();
    let app = setup_app_with(db.clone(), None, ServerConfig::default());

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/users/alice/entries/{}/amount", id),
            serde_json::json!({"amount": 65.0}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/users/alice/entries/{}/payment", id),
            serde_json::json!({"method": "creditCard", "sub_identifier": "Visa"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let entry = db.get_entry("alice", id).unwrap().unwrap();
    assert_eq!(entry.amount, 65.0);
    assert_eq!(entry.payment, PaymentAccount::credit_card("Visa"));

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/api/users/alice/entries/9999/amount",
            serde_json::json!({"amount": 1.0}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let delete = |uri: String| {
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    };
    let response = app
        .clone()
        .oneshot(delete(format!("/api/users/alice/entries/{}", id)))
        .await
        .unwrap();
    assert_eq!(get_body_json(response).await["deleted"], true);

    // Missing ids are a no-op
    let response = app
        .oneshot(delete(format!("/api/users/alice/entries/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(get_body_json(response).await["deleted"], false);
}

// ========== Transfer API Tests ==========

#[tokio::test]
async fn test_transfer_lifecycle() {
    let app = setup_test_app();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/users/alice/transfers",
            serde_json::json!({
                "from": [{"amount": 1000.0, "method": "bank", "sub_identifier": "BankA"}],
                "to": [{"amount": 1000.0, "method": "bank", "sub_identifier": "BankB"}],
                "description": "savings"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    let transfer_id = json["transfer_id"].as_i64().unwrap();
    assert_eq!(json["entry_ids"].as_array().unwrap().len(), 2);

    let response = app
        .clone()
        .oneshot(get("/api/users/alice/balance/methods"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    let accounts = json.as_array().unwrap();
    assert_eq!(accounts.len(), 2);
    assert_eq!(accounts[0]["net_balance"], -1000.0);
    assert_eq!(accounts[1]["net_balance"], 1000.0);

    let response = app
        .clone()
        .oneshot(get("/api/users/alice/balance"))
        .await
        .unwrap();
    assert_eq!(get_body_json(response).await["balance"], 0.0);

    let response = app
        .clone()
        .oneshot(get("/api/users/alice/transfers"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["description"], "savings");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/users/alice/transfers/{}", transfer_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(get_body_json(response).await["deleted"], true);

    let response = app
        .oneshot(get(&format!("/api/users/alice/transfers/{}", transfer_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unbalanced_transfer_rejected() {
    let app = setup_test_app();

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/users/alice/transfers",
            serde_json::json!({
                "from": [{"amount": 100.0, "method": "cash"}],
                "to": [{"amount": 90.0, "method": "bank", "sub_identifier": "SCB"}]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// ========== Budget API Tests ==========

#[tokio::test]
async fn test_budget_routes() {
    let db = test_db();
    db.save_entry_today("alice", &NewEntry::expense(4200.0, "food", PaymentAccount::cash()))
        .unwrap();
    let app = setup_app_with(db, None, ServerConfig::default());

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/api/users/alice/budgets",
            serde_json::json!({"category": "food", "amount": 5000.0}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(get_body_json(response).await["amount"], 5000.0);

    let response = app
        .clone()
        .oneshot(get("/api/users/alice/budgets/status"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json[0]["spent"], 4200.0);
    assert_eq!(json[0]["remaining"], 800.0);

    let response = app
        .clone()
        .oneshot(get("/api/users/alice/budgets/alert?category=food&amount=900"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["should_alert"], true);
    assert_eq!(json["level"], "over_budget");

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/api/users/alice/budgets",
            serde_json::json!({"category": "rent", "amount": -5.0}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/users/alice/budgets/food")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(get_body_json(response).await["deleted"], true);

    let response = app
        .oneshot(get("/api/users/alice/budgets"))
        .await
        .unwrap();
    assert!(get_body_json(response).await.as_array().unwrap().is_empty());
}

// ========== Query API Tests ==========

#[tokio::test]
async fn test_search_known_and_export() {
    let db = test_db();
    db.save_entry(
        "alice",
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        &NewEntry::expense(120.0, "food", PaymentAccount::bank("SCB")).with_description("Pad Thai"),
    )
    .unwrap();
    db.save_entry_today("alice", &NewEntry::income(500.0, "salary", PaymentAccount::bank("KBank")))
        .unwrap();
    let app = setup_app_with(db, None, ServerConfig::default());

    let response = app
        .clone()
        .oneshot(get("/api/users/alice/search?keyword=thai"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["description"], "Pad Thai");

    let response = app
        .clone()
        .oneshot(get("/api/users/alice/search/range?from=2024-03-10&to=2024-03-15"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["category"], "salary");

    let response = app
        .clone()
        .oneshot(get("/api/users/alice/search/range?from=march&to=2024-03-15"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(get("/api/users/alice/known"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["payment_methods"]["banks"], serde_json::json!(["KBank", "SCB"]));
    assert_eq!(json["categories"]["income"], serde_json::json!(["salary"]));

    let response = app
        .oneshot(get("/api/users/alice/export?days=30"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/csv; charset=utf-8"
    );
    let csv = get_body_text(response).await;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("date,type,category"));
    assert!(lines[1].contains("Pad Thai"));
}

#[tokio::test]
async fn test_query_defaults_follow_ledger_settings() {
    let db = test_db();
    for d in [1, 13, 14, 15] {
        db.save_entry(
            "alice",
            NaiveDate::from_ymd_opt(2024, 3, d).unwrap(),
            &NewEntry::expense(d as f64, "snack", PaymentAccount::cash()),
        )
        .unwrap();
    }
    let dispatcher = Dispatcher::new(db).with_settings(tally_core::LedgerConfig {
        search_limit: 1,
        range_limit: 2,
        export_days: 3,
        ..Default::default()
    });
    let app = create_router(dispatcher, ServerConfig::default());

    let response = app
        .clone()
        .oneshot(get("/api/users/alice/search?keyword=snack"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 1);

    let response = app
        .clone()
        .oneshot(get("/api/users/alice/search/range?from=2024-03-01&to=2024-03-15"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 2);
    assert_eq!(json[0]["amount"], 15.0);

    // An explicit limit still wins
    let response = app
        .clone()
        .oneshot(get("/api/users/alice/search/range?from=2024-03-01&to=2024-03-15&limit=10"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 4);

    let response = app
        .oneshot(get("/api/users/alice/export"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let csv = get_body_text(response).await;
    // Header plus the three entries inside the configured window
    assert_eq!(csv.lines().count(), 4);
}

// ========== Message API Tests ==========

#[tokio::test]
async fn test_post_intent() {
    let db = test_db();
    let app = setup_app_with(db.clone(), None, ServerConfig::default());

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/users/alice/intents",
            serde_json::json!({
                "action": "new",
                "transactions": [{"amount": 150, "type": "expense", "category": "food", "usetype": 0}]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["action"], "new");
    assert_eq!(json["outcome"]["kind"], "recorded");
    assert_eq!(db.get_balance_summary("alice").unwrap().total_expense, 150.0);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/users/alice/intents",
            serde_json::json!({"action": "levitate"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_post_message_with_mock_classifier() {
    let mock = MockClassifier::with_replies([
        r#"{"action":"transfer","transfer":{"from":[{"amount":1000,"usetype":2,"bankname":"BankA"}],"to":[{"amount":1000,"usetype":2,"bankname":"BankB"}]},"message":"Moved 1000"}"#,
    ]);
    let app = setup_app_with(test_db(), Some(mock.clone()), ServerConfig::default());

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/users/alice/messages",
            serde_json::json!({"text": "transfer 1000 from BankA to BankB"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["outcome"]["kind"], "transferred");
    assert_eq!(json["message"], "Moved 1000");
    assert_eq!(mock.requests().len(), 1);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/users/alice/messages",
            serde_json::json!({"text": "   "}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_post_message_classifier_down() {
    let mock = MockClassifier::new();
    mock.push_failure("connection refused");
    let app = setup_app_with(test_db(), Some(mock), ServerConfig::default());

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/users/alice/messages",
            serde_json::json!({"text": "coffee 60"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_post_message_without_classifier() {
    let app = setup_test_app();

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/users/alice/messages",
            serde_json::json!({"text": "coffee 60"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = get_body_json(response).await;
    assert_eq!(json["error"], "An internal error occurred");
}
