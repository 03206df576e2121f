// src/services/webdriver.rs
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Client, Method};
use scraper::{Html, Selector};
use serde_json::{json, Value};
use std::time::Duration;

use super::browser::{BrowserSession, SessionFactory};
use crate::error::{MeterError, Result};

const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const CHROME_ARGS: [&str; 14] = [
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-blink-features=AutomationControlled",
    "--headless",
    "--disable-gpu",
    "--window-size=1920,1080",
    "--disable-extensions",
    "--disable-plugins",
    "--disable-images",
    "--ignore-ssl-errors=yes",
    "--ignore-certificate-errors",
    "--allow-running-insecure-content",
    "--disable-web-security",
    "--ignore-ssl-errors-spki-list",
];

const ACCOUNT_INPUT_SELECTORS: [&str; 4] = [
    "input[placeholder*='Account']",
    "input[placeholder*='Meter']",
    "input[type='text']",
    "input.form-control",
];

const LOGIN_BUTTON_SELECTORS: [&str; 5] = [
    "button.btn-primary",
    "button[type='button']",
    "button.btn",
    "button",
    "input[type='submit']",
];

const LOGIN_WORDS: [&str; 3] = ["login", "submit", "enter"];

const SKIPPED_TAGS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Opens headless Chrome sessions through a W3C WebDriver endpoint such as chromedriver.
#[derive(Clone)]
pub struct WebDriverFactory {
    client: Client,
    endpoint: String,
    page_load_wait: Duration,
}

impl WebDriverFactory {
    pub fn new(endpoint: impl Into<String>, page_load_wait: Duration) -> Self {
        WebDriverFactory {
            client: Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            page_load_wait,
        }
    }
}

#[async_trait]
impl SessionFactory for WebDriverFactory {
    async fn open(&self) -> Result<Box<dyn BrowserSession>> {
        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": {
                        "args": CHROME_ARGS,
                        "excludeSwitches": ["enable-automation"],
                        "useAutomationExtension": false
                    }
                }
            }
        });

        let value = send(
            &self.client,
            Method::POST,
            &format!("{}/session", self.endpoint),
            Some(capabilities),
        )
        .await?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| MeterError::session("WebDriver did not return a session id"))?;
        info!("Opened WebDriver session {}", session_id);

        let session = WebDriverSession {
            client: self.client.clone(),
            base: format!("{}/session/{}", self.endpoint, session_id),
            page_load_wait: self.page_load_wait,
        };
        if let Err(e) = session
            .execute("Object.defineProperty(navigator, 'webdriver', {get: () => undefined})", vec![])
            .await
        {
            warn!("Could not mask navigator.webdriver: {}", e);
        }
        Ok(Box::new(session))
    }
}

async fn send(client: &Client, method: Method, url: &str, body: Option<Value>) -> Result<Value> {
    debug!("WebDriver {} {}", method, url);
    let mut request = client.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }
    let response = request.send().await?;
    let status = response.status();
    let payload: Value = response.json().await?;
    let value = payload.get("value").cloned().unwrap_or(Value::Null);

    if !status.is_success() {
        let message = value
            .get("message")
            .or_else(|| value.get("error"))
            .and_then(Value::as_str)
            .unwrap_or("unknown WebDriver error")
            .to_string();
        return Err(MeterError::WebDriver {
            status: status.as_u16(),
            message,
        });
    }
    Ok(value)
}

fn element_ref(id: &str) -> Value {
    let mut reference = serde_json::Map::new();
    reference.insert(ELEMENT_KEY.to_string(), Value::String(id.to_string()));
    Value::Object(reference)
}

fn element_id(value: &Value) -> Option<String> {
    value.get(ELEMENT_KEY).and_then(Value::as_str).map(str::to_string)
}

pub struct WebDriverSession {
    client: Client,
    base: String,
    page_load_wait: Duration,
}

impl WebDriverSession {
    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        send(&self.client, method, &format!("{}{}", self.base, path), body).await
    }

    async fn find(&self, css: &str) -> Result<Option<String>> {
        let body = json!({ "using": "css selector", "value": css });
        match self.command(Method::POST, "/element", Some(body)).await {
            Ok(value) => Ok(element_id(&value)),
            Err(MeterError::WebDriver { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn find_all(&self, css: &str) -> Result<Vec<String>> {
        let body = json!({ "using": "css selector", "value": css });
        let value = self.command(Method::POST, "/elements", Some(body)).await?;
        Ok(value
            .as_array()
            .map(|items| items.iter().filter_map(element_id).collect())
            .unwrap_or_default())
    }

    async fn element_text(&self, element: &str) -> Result<String> {
        let value = self
            .command(Method::GET, &format!("/element/{}/text", element), None)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        let body = json!({ "script": script, "args": args });
        self.command(Method::POST, "/execute/sync", Some(body)).await
    }

    async fn find_account_input(&self) -> Result<Option<String>> {
        for selector in ACCOUNT_INPUT_SELECTORS {
            if let Some(element) = self.find(selector).await? {
                info!("Found input field with selector: {}", selector);
                return Ok(Some(element));
            }
        }
        info!("Trying to find any input field...");
        Ok(self.find_all("input").await?.into_iter().next())
    }

    async fn find_login_button(&self) -> Result<Option<String>> {
        for selector in LOGIN_BUTTON_SELECTORS {
            for element in self.find_all(selector).await? {
                let text = self.element_text(&element).await?.to_lowercase();
                if LOGIN_WORDS.iter().any(|word| text.contains(word)) {
                    info!("Found login button with text: {}", text);
                    return Ok(Some(element));
                }
            }
        }
        info!("Trying to find any button...");
        Ok(self.find_all("button").await?.into_iter().next())
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        info!("Navigating to {}", url);
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        tokio::time::sleep(self.page_load_wait).await;
        Ok(())
    }

    async fn submit_login(&mut self, account_id: &str) -> Result<()> {
        let input = self
            .find_account_input()
            .await?
            .ok_or_else(|| MeterError::session("No input field found on the page"))?;

        info!("Entering account number: {}", account_id);
        self.command(Method::POST, &format!("/element/{}/clear", input), Some(json!({})))
            .await?;
        self.command(
            Method::POST,
            &format!("/element/{}/value", input),
            Some(json!({ "text": account_id })),
        )
        .await?;

        let button = self
            .find_login_button()
            .await?
            .ok_or_else(|| MeterError::session("No login button found on the page"))?;
        self.execute("arguments[0].click();", vec![element_ref(&button)])
            .await?;
        tokio::time::sleep(self.page_load_wait).await;
        info!("Login attempt completed");
        Ok(())
    }

    async fn find_text(&mut self) -> Result<Vec<String>> {
        let source = self.command(Method::GET, "/source", None).await?;
        let html = source
            .as_str()
            .ok_or_else(|| MeterError::session("WebDriver returned no page source"))?;
        let snippets = collect_snippets(html)?;
        info!("Found {} text elements", snippets.len());
        Ok(snippets)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.command(Method::DELETE, "", None).await?;
        info!("Closed WebDriver session");
        Ok(())
    }
}

/// One snippet per element owning non-blank text of its own; the snippet is
/// the element's whole descendant text with whitespace collapsed.
pub fn collect_snippets(html: &str) -> Result<Vec<String>> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("body *")
        .map_err(|e| MeterError::session(format!("Invalid text selector: {:?}", e)))?;

    let snippets = document
        .select(&selector)
        .filter(|element| !SKIPPED_TAGS.contains(&element.value().name()))
        .filter(|element| {
            element.children().any(|child| {
                child
                    .value()
                    .as_text()
                    .map_or(false, |text| !text.trim().is_empty())
            })
        })
        .map(|element| {
            element
                .text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|text| !text.is_empty())
        .collect();
    Ok(snippets)
}
