// Drives the real WebDriver client against an in-process chromedriver stand-in.
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use warp::http::{Method, StatusCode};
use warp::hyper::body::Bytes;
use warp::path::FullPath;
use warp::Filter;

use meter_alert_bot::config::Thresholds;
use meter_alert_bot::models::VerdictStatus;
use meter_alert_bot::services::aggregator::FleetAggregator;
use meter_alert_bot::services::extractor::Extractor;
use meter_alert_bot::services::webdriver::WebDriverFactory;

const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const PORTAL_PAGE: &str = r#"
<html><body>
  <div class="summary">
    <p>Remaining Balance: <b>89.50 BDT</b></p>
    <p>Reading Time: 17 Aug 2025 09:00</p>
    <p>Last Recharge Amount: 1,000.00 BDT</p>
    <p>Last Recharge Date: 16 Aug 2025 14:30</p>
  </div>
  <script>window.balance = "9999 BDT";</script>
</body></html>
"#;

type Requests = Arc<Mutex<Vec<(String, Value)>>>;

fn element(id: &str) -> Value {
    let mut reference = serde_json::Map::new();
    reference.insert(ELEMENT_KEY.to_string(), Value::String(id.to_string()));
    Value::Object(reference)
}

fn respond(method: &Method, path: &str, body: &Value, login_form: bool) -> (StatusCode, Value) {
    let no_such_element = json!({ "error": "no such element", "message": "no such element" });
    match (method.as_str(), path) {
        ("POST", "/session") => (StatusCode::OK, json!({ "sessionId": "s1", "capabilities": {} })),
        ("POST", "/session/s1/element") => {
            if login_form && body["value"] == "input[placeholder*='Account']" {
                (StatusCode::OK, element("in1"))
            } else {
                (StatusCode::NOT_FOUND, no_such_element)
            }
        }
        ("POST", "/session/s1/elements") => {
            if login_form && body["value"] == "button.btn-primary" {
                (StatusCode::OK, json!([element("btn1")]))
            } else {
                (StatusCode::OK, json!([]))
            }
        }
        ("GET", "/session/s1/element/btn1/text") => (StatusCode::OK, json!("Login")),
        ("GET", "/session/s1/source") => (StatusCode::OK, json!(PORTAL_PAGE)),
        _ => (StatusCode::OK, Value::Null),
    }
}

fn fake_chromedriver(login_form: bool) -> (SocketAddr, Requests) {
    let requests: Requests = Arc::new(Mutex::new(Vec::new()));
    let log = requests.clone();
    let api = warp::method()
        .and(warp::path::full())
        .and(warp::body::bytes())
        .map(move |method: Method, path: FullPath, body: Bytes| {
            let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
            log.lock()
                .unwrap()
                .push((format!("{} {}", method, path.as_str()), body.clone()));
            let (status, value) = respond(&method, path.as_str(), &body, login_form);
            warp::reply::with_status(warp::reply::json(&json!({ "value": value })), status)
        });
    let (addr, server) = warp::serve(api).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    (addr, requests)
}

fn aggregator(addr: SocketAddr) -> FleetAggregator {
    FleetAggregator::new(
        Arc::new(WebDriverFactory::new(format!("http://{}/", addr), Duration::ZERO)),
        Extractor::default(),
        Thresholds::default(),
        "https://portal.test/login",
        HashMap::new(),
    )
}

fn paths(requests: &Requests) -> Vec<String> {
    requests.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
}

#[tokio::test]
async fn scrapes_portal_through_webdriver() {
    let (addr, requests) = fake_chromedriver(true);
    let report = aggregator(addr).run_cycle(&["37226784".to_string()]).await;

    let verdict = &report.verdicts[0];
    assert_eq!(verdict.status, VerdictStatus::Warning);
    assert_eq!(verdict.balance, Some(89.5));
    assert_eq!(verdict.recharge_amount, Some(1000.0));

    let seen = paths(&requests);
    assert_eq!(seen.first().map(String::as_str), Some("POST /session"));
    assert!(seen.contains(&"POST /session/s1/url".to_string()));
    assert!(seen.contains(&"POST /session/s1/element/in1/clear".to_string()));
    assert!(seen.contains(&"GET /session/s1/source".to_string()));
    assert_eq!(seen.last().map(String::as_str), Some("DELETE /session/s1"));

    let requests = requests.lock().unwrap();
    let typed = requests
        .iter()
        .find(|(p, _)| p == "POST /session/s1/element/in1/value")
        .map(|(_, body)| body["text"].clone());
    assert_eq!(typed, Some(json!("37226784")));

    let opened = requests
        .iter()
        .find(|(p, _)| p == "POST /session")
        .map(|(_, body)| body.clone())
        .unwrap();
    let args = &opened["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["args"];
    assert!(args.as_array().unwrap().contains(&json!("--headless")));

    let clicked = requests
        .iter()
        .filter(|(p, _)| p == "POST /session/s1/execute/sync")
        .any(|(_, body)| body["args"][0][ELEMENT_KEY] == "btn1");
    assert!(clicked);
}

#[tokio::test]
async fn missing_login_form_fails_account_and_closes_session() {
    let (addr, requests) = fake_chromedriver(false);
    let report = aggregator(addr).run_cycle(&["37226784".to_string()]).await;

    let verdict = &report.verdicts[0];
    assert_eq!(verdict.status, VerdictStatus::Failed);
    assert!(verdict.error.as_deref().unwrap().contains("No input field found"));
    assert_eq!(paths(&requests).last().map(String::as_str), Some("DELETE /session/s1"));
}

#[tokio::test]
async fn unreachable_driver_is_a_failed_account() {
    // Nothing listens on the port once the listener is dropped.
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let report = aggregator(addr).run_cycle(&["37226784".to_string()]).await;
    assert!(report.all_failed());
}
