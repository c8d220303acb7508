mod common;

use actix_web::{App, http::StatusCode, test as actix_test};
use common::{closed_port_url, relay_state, start_mock_llm, test_config};
use query_relay_rs::rate_limit::RateLimiter;
use query_relay_rs::server::configure;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::time::Duration;

fn ask_from(addr: &str) -> actix_test::TestRequest {
    actix_test::TestRequest::post()
        .uri("/ask")
        .peer_addr(addr.parse::<SocketAddr>().unwrap())
        .set_json(json!({"user_query": "partners"}))
}

#[actix_web::test]
async fn test_eleventh_request_rejected_before_translation() {
    let llm = start_mock_llm(r#"{"views": [], "interpretation": "i", "suggestion": "s"}"#).await;
    let config = test_config(&llm.url, &closed_port_url());
    let state = relay_state(&config);
    let limiter = RateLimiter::new(10, Duration::from_secs(60));
    let app = actix_test::init_service(
        App::new()
            .app_data(state)
            .configure(|cfg| configure(cfg, limiter, config.max_payload_size)),
    )
    .await;

    for _ in 0..10 {
        let resp = actix_test::call_service(&app, ask_from("10.1.2.3:40000").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
    assert_eq!(llm.call_count(), 10);

    let resp = actix_test::call_service(&app, ask_from("10.1.2.3:40001").to_request()).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(resp.headers().contains_key("retry-after"));
    let body: Value = actix_test::read_body_json(resp).await;
    assert_eq!(body["error"], "Rate limit exceeded");
    assert_eq!(body["details"], "10 per 60 seconds");
    assert_eq!(llm.call_count(), 10);

    // Another client still has its own quota
    let resp = actix_test::call_service(&app, ask_from("10.9.9.9:40000").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(llm.call_count(), 11);
}

#[actix_web::test]
async fn test_health_is_not_rate_limited() {
    let config = test_config(&closed_port_url(), &closed_port_url());
    let state = relay_state(&config);
    let limiter = RateLimiter::new(1, Duration::from_secs(60));
    let app = actix_test::init_service(
        App::new()
            .app_data(state)
            .configure(|cfg| configure(cfg, limiter, config.max_payload_size)),
    )
    .await;

    for _ in 0..5 {
        let req = actix_test::TestRequest::get()
            .uri("/health")
            .peer_addr("10.1.2.3:40000".parse().unwrap())
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}

#[actix_web::test]
async fn test_quota_resets_after_window() {
    let llm = start_mock_llm(r#"{"views": []}"#).await;
    let config = test_config(&llm.url, &closed_port_url());
    let state = relay_state(&config);
    let limiter = RateLimiter::new(1, Duration::from_millis(200));
    let app = actix_test::init_service(
        App::new()
            .app_data(state)
            .configure(|cfg| configure(cfg, limiter, config.max_payload_size)),
    )
    .await;

    let resp = actix_test::call_service(&app, ask_from("10.1.2.3:40000").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = actix_test::call_service(&app, ask_from("10.1.2.3:40000").to_request()).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);

    tokio::time::sleep(Duration::from_millis(250)).await;
    let resp = actix_test::call_service(&app, ask_from("10.1.2.3:40000").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(llm.call_count(), 2);
}
