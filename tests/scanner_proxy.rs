mod common;

use std::time::Duration;

use common::{client, start_gateway, start_upstream, MockResponse};
use serde_json::json;
use tailor_gateway::config::StaticEnv;
use tailor_gateway::GatewayConfig;

const SCAN_PAGE: &str = concat!(
    "<!doctype html><html><head>",
    r#"<meta http-equiv="Content-Security-Policy" content="frame-ancestors 'none'">"#,
    r#"<script src="/static/scan.js"></script>"#,
    "</head><body><header>Scan</header></body></html>"
);

fn scanner_config(origin: &str) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.scanner.upstream_origin = origin.to_string();
    config
}

#[tokio::test]
async fn scan_page_is_rewritten_for_embedding() {
    let mut upstream = start_upstream(|_| {
        MockResponse::new(200, SCAN_PAGE)
            .with_header("Content-Type", "text/html")
            .with_header("Content-Security-Policy", "frame-ancestors 'none'")
    })
    .await;
    let gateway = start_gateway(scanner_config(&upstream.url()), StaticEnv::new()).await;

    let res = client()
        .get(gateway.url("/bodygram-proxy?token=tok%20en&org=acme"))
        .header("user-agent", "TestBrowser/1.0")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "text/html; charset=utf-8");
    assert_eq!(
        res.headers()["permissions-policy"],
        "camera=(self), microphone=(self)"
    );
    assert_eq!(res.headers()["x-content-type-options"], "nosniff");
    assert!(!res.headers().contains_key("content-security-policy"));

    let body = res.text().await.unwrap();
    assert!(!body.contains("Content-Security-Policy"));
    assert!(body.contains(&format!(
        r#"<head><base href="http://{}/"><script"#,
        upstream.addr
    )));
    assert!(body.contains("<header>Scan</header>"));

    let seen = upstream.next_request().await;
    assert_eq!(seen.target, "/en/acme/scan?token=tok%20en&system=metric");
    assert_eq!(seen.header("user-agent"), Some("TestBrowser/1.0"));
    assert!(seen.header("accept").unwrap().starts_with("text/html"));
}

#[tokio::test]
async fn api_alias_serves_the_same_page() {
    let upstream = start_upstream(|_| MockResponse::new(200, SCAN_PAGE)).await;
    let gateway = start_gateway(scanner_config(&upstream.url()), StaticEnv::new()).await;

    let res = client()
        .get(gateway.url("/api/bodygram-proxy?token=t&org=acme"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(upstream.hits(), 1);
}

#[tokio::test]
async fn missing_token_is_rejected_without_upstream_call() {
    let upstream = start_upstream(|_| MockResponse::new(200, SCAN_PAGE)).await;
    let gateway = start_gateway(scanner_config(&upstream.url()), StaticEnv::new()).await;

    for query in ["?org=acme", "?token=&org=acme", "?token=t", ""] {
        let res = client()
            .get(gateway.url(&format!("/bodygram-proxy{query}")))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 400, "query {query:?}");
        assert_eq!(res.text().await.unwrap(), "Missing token or org parameter");
    }
    assert_eq!(upstream.hits(), 0);
}

#[tokio::test]
async fn org_falls_back_to_environment() {
    let mut upstream = start_upstream(|_| MockResponse::new(200, SCAN_PAGE)).await;
    let env = StaticEnv::new().with("VITE_BODYGRAM_ORG_ID", "default-org");
    let gateway = start_gateway(scanner_config(&upstream.url()), env).await;

    let res = client()
        .get(gateway.url("/bodygram-proxy?token=t"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(
        upstream.next_request().await.target,
        "/en/default-org/scan?token=t&system=metric"
    );
}

#[tokio::test]
async fn upstream_failure_status_is_relayed() {
    let upstream = start_upstream(|_| MockResponse::new(404, "not here")).await;
    let gateway = start_gateway(scanner_config(&upstream.url()), StaticEnv::new()).await;

    let res = client()
        .get(gateway.url("/bodygram-proxy?token=t&org=acme"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
    assert_eq!(res.text().await.unwrap(), "Upstream fetch failed: 404");
}

#[tokio::test]
async fn unreachable_vendor_is_a_proxy_error() {
    let dead = common::closed_addr().await;
    let gateway = start_gateway(scanner_config(&format!("http://{dead}")), StaticEnv::new()).await;

    let res = client()
        .get(gateway.url("/bodygram-proxy?token=t&org=acme"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 500);
    assert_eq!(res.text().await.unwrap(), "Proxy error");
}

#[tokio::test]
async fn dot_segment_orgs_are_rejected() {
    let upstream = start_upstream(|_| MockResponse::new(200, SCAN_PAGE)).await;
    let gateway = start_gateway(scanner_config(&upstream.url()), StaticEnv::new()).await;

    for org in [".", "..", "%2e%2e"] {
        let res = client()
            .get(gateway.url(&format!("/bodygram-proxy?token=t&org={org}")))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 400, "org {org:?}");
        assert_eq!(res.text().await.unwrap(), "Invalid org parameter");
    }
    assert_eq!(upstream.hits(), 0);
}

#[tokio::test]
async fn scan_messages_require_a_trusted_origin() {
    let gateway = start_gateway(GatewayConfig::default(), StaticEnv::new()).await;
    let message = json!({ "type": 2, "payload": { "chest": 98.5 } });

    let res = client()
        .post(gateway.url("/scanner/events?token=scan-1"))
        .header("origin", "https://evil.example")
        .json(&message)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);

    let res = client()
        .post(gateway.url("/scanner/events?token=scan-1"))
        .json(&message)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);
}

#[tokio::test]
async fn scan_events_require_a_token() {
    let gateway = start_gateway(GatewayConfig::default(), StaticEnv::new()).await;

    let res = client()
        .post(gateway.url("/scanner/events"))
        .header("origin", "https://platform.bodygram.com")
        .json(&json!({ "type": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);

    let res = client()
        .get(gateway.url("/scanner/events?token="))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    assert_eq!(gateway.state.scan_events.active_scans(), 0);
}

#[tokio::test]
async fn trusted_scan_messages_reach_subscribers_of_that_scan() {
    let gateway = start_gateway(GatewayConfig::default(), StaticEnv::new()).await;
    let mut alice = gateway.state.scan_events.subscribe("scan-alice");
    let mut bob = gateway.state.scan_events.subscribe("scan-bob");

    let res = client()
        .post(gateway.url("/scanner/events?token=scan-alice"))
        .header("origin", "https://platform.bodygram.com")
        .json(&json!({ "type": 2, "payload": { "chest": 98.5, "userId": "alice" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 202);

    let event = tokio::time::timeout(Duration::from_secs(2), alice.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.name(), "scan_complete");
    assert!(
        tokio::time::timeout(Duration::from_millis(100), bob.next())
            .await
            .is_err(),
        "measurements reached another scan's subscriber"
    );

    let res = client()
        .post(gateway.url("/scanner/events?token=scan-alice"))
        .header("origin", "https://platform.bodygram.com")
        .json(&json!({ "type": 7 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 204);

    let res = client()
        .post(gateway.url("/scanner/events?token=scan-alice"))
        .header("origin", "https://platform.bodygram.com")
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
}

#[tokio::test]
async fn events_are_streamed_as_server_sent_events() {
    let gateway = start_gateway(GatewayConfig::default(), StaticEnv::new()).await;

    let mut stream = client()
        .get(gateway.url("/scanner/events?token=scan-1"))
        .send()
        .await
        .unwrap();
    assert_eq!(stream.status(), 200);
    assert!(stream.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    while gateway.state.scan_events.subscriber_count() == 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let res = client()
        .post(gateway.url("/scanner/events?token=scan-1"))
        .header("origin", "https://platform.bodygram.com")
        .json(&json!({ "type": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 202);

    let mut received = String::new();
    while !received.contains("\n\n") {
        let chunk = tokio::time::timeout(Duration::from_secs(2), stream.chunk())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        received.push_str(&String::from_utf8_lossy(&chunk));
    }
    assert!(received.contains("event: scanner_closed"));
    assert!(received.contains(r#"data: {"kind":"scanner_closed"}"#));
}

#[tokio::test]
async fn open_event_stream_does_not_block_shutdown() {
    let mut gateway = start_gateway(GatewayConfig::default(), StaticEnv::new()).await;

    let mut stream = client()
        .get(gateway.url("/scanner/events?token=scan-1"))
        .send()
        .await
        .unwrap();
    assert_eq!(stream.status(), 200);
    while gateway.state.scan_events.subscriber_count() == 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    gateway.shutdown.trigger();
    let stopped = tokio::time::timeout(Duration::from_secs(5), &mut gateway.server).await;
    assert!(matches!(stopped, Ok(Ok(Ok(())))), "server kept running: {stopped:?}");

    let end = tokio::time::timeout(Duration::from_secs(2), stream.chunk())
        .await
        .unwrap();
    assert!(matches!(end, Ok(None)), "stream still open: {end:?}");
    assert_eq!(gateway.state.scan_events.active_scans(), 0);
}
