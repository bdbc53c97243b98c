use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use super::{Document, RemoteBackend, Subscription, UPDATED_AT_FIELD};
use crate::config::RemoteConfig;
use crate::debug_log;
use crate::reqwest_simd_json::{RequestSimdJsonExt, ResponseSimdJsonExt};
use crate::session::{Identity, build_http_client};

/// Document store reached over HTTP. Each identity owns a single
/// `habit-data/current` document; writes are merges.
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
    poll_interval: Duration,
}

fn parse_json_error(error_body: &str) -> Option<String> {
    // The API returns errors in the format: {"error": "message"}
    let value = serde_json::from_str::<serde_json::Value>(error_body.trim()).ok()?;
    value.get("error")?.as_str().map(str::to_string)
}

fn describe_failure(status: u16, body: &str) -> String {
    let detail = parse_json_error(body);
    match status {
        400 => match detail {
            Some(msg) => format!("Bad request: {msg}"),
            None => "Bad request".to_string(),
        },
        401 => "Unauthorized".to_string(),
        403 => "Permission denied".to_string(),
        409 => "Conflict".to_string(),
        429 => "Rate limited".to_string(),
        500 => "Server error".to_string(),
        502 => "Bad gateway".to_string(),
        503 => "Service unavailable".to_string(),
        504 => "Gateway timeout".to_string(),
        _ => detail.unwrap_or_else(|| format!("Error {status}")),
    }
}

async fn fetch_document(
    client: &reqwest::Client,
    url: reqwest::Url,
    api_token: &str,
) -> Result<Option<Document>> {
    let response = client
        .get(url)
        .bearer_auth(api_token)
        .send()
        .await
        .context("Failed to reach document store")?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("{}", describe_failure(status.as_u16(), &body));
    }

    let document: Document = response.simd_json().await?;
    Ok(Some(document))
}

impl HttpRemote {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        Ok(Self {
            client: build_http_client(config.timeout_seconds)?,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            poll_interval: Duration::from_secs(config.poll_interval_secs.max(1)),
        })
    }

    #[cfg(test)]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// `{base}/api/users/{id}/habit-data/current`, with the id encoded as a
    /// single path segment.
    fn document_url(&self, identity: &Identity) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .with_context(|| format!("Invalid remote URL: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Remote URL cannot hold a path: {}", self.base_url))?
            .pop_if_empty()
            .extend(["api", "users", identity.as_str(), "habit-data", "current"]);
        Ok(url)
    }
}

#[async_trait]
impl RemoteBackend for HttpRemote {
    async fn get_document(&self, identity: &Identity) -> Result<Option<Document>> {
        fetch_document(&self.client, self.document_url(identity)?, &self.api_token).await
    }

    async fn set_document(&self, identity: &Identity, mut fields: Document) -> Result<()> {
        // The server replaces this sentinel with its own write time.
        fields.insert(
            UPDATED_AT_FIELD.to_string(),
            serde_json::json!({ "$serverTimestamp": true }),
        );

        let response = self
            .client
            .patch(self.document_url(identity)?)
            .bearer_auth(&self.api_token)
            .simd_json(&fields)?
            .send()
            .await
            .context("Failed to reach document store")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("{}", describe_failure(status.as_u16(), &body));
        }
        Ok(())
    }

    fn subscribe(&self, identity: &Identity) -> Result<Subscription> {
        let runtime = tokio::runtime::Handle::try_current()
            .context("Remote subscriptions need a tokio runtime")?;
        let (tx, rx) = mpsc::channel(16);
        let client = self.client.clone();
        let url = self.document_url(identity)?;
        let api_token = self.api_token.clone();
        let poll_interval = self.poll_interval;

        let task = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last_seen: Option<Document> = None;

            loop {
                ticker.tick().await;
                match fetch_document(&client, url.clone(), &api_token).await {
                    Ok(Some(document)) if last_seen.as_ref() != Some(&document) => {
                        last_seen = Some(document.clone());
                        if tx.send(document).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => debug_log::log("REMOTE", "POLL_FAILED", &format!("{e:#}")),
                }
            }
        });

        Ok(Subscription::new(rx, Some(task)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server;

    fn remote_for(url: &str) -> HttpRemote {
        let config = RemoteConfig {
            enabled: true,
            url: url.to_string(),
            api_token: "TOKEN".to_string(),
            poll_interval_secs: 1,
            timeout_seconds: 5,
        };
        HttpRemote::new(&config).expect("remote")
    }

    #[test]
    fn failure_descriptions() {
        assert_eq!(describe_failure(403, ""), "Permission denied");
        assert_eq!(
            describe_failure(400, r#"{"error":"habits must be a list"}"#),
            "Bad request: habits must be a list"
        );
        assert_eq!(describe_failure(418, r#"{"error":"teapot"}"#), "teapot");
        assert_eq!(describe_failure(418, "plain"), "Error 418");
    }

    #[tokio::test]
    async fn get_document_reads_existing_document() {
        let body = r#"{"habits":[],"habitLogs":{"2024-03-0-1":true},"currentMonth":2,"currentYear":2024,"updatedAt":"2024-03-01T00:00:00Z"}"#;
        let Some((url, seen)) = test_server::start(vec![("200 OK", body)]).await else {
            return;
        };

        let document = remote_for(&url)
            .get_document(&Identity::new("u1"))
            .await
            .expect("get")
            .expect("document exists");

        assert_eq!(document["currentMonth"], serde_json::json!(2));
        assert!(document.contains_key(UPDATED_AT_FIELD));
        let requests = seen.lock().clone();
        assert!(
            requests[0]
                .request_line
                .starts_with("GET /api/users/u1/habit-data/current")
        );
    }

    #[test]
    fn document_url_encodes_identity_as_one_segment() {
        let url = remote_for("http://localhost:9000")
            .document_url(&Identity::new("a/b?c"))
            .expect("url");
        assert_eq!(
            url.as_str(),
            "http://localhost:9000/api/users/a%2Fb%3Fc/habit-data/current"
        );

        let url = remote_for("https://example.com/base/")
            .document_url(&Identity::new("u1"))
            .expect("url");
        assert_eq!(
            url.as_str(),
            "https://example.com/base/api/users/u1/habit-data/current"
        );
    }

    #[tokio::test]
    async fn get_document_with_slash_in_identity_stays_in_one_document() {
        let Some((url, seen)) = test_server::start(vec![("404 Not Found", "{}")]).await else {
            return;
        };

        remote_for(&url)
            .get_document(&Identity::new("team/../admin"))
            .await
            .expect("get");

        let requests = seen.lock().clone();
        assert!(
            requests[0]
                .request_line
                .starts_with("GET /api/users/team%2F..%2Fadmin/habit-data/current")
        );
    }

    #[tokio::test]
    async fn get_document_missing_is_none() {
        let Some((url, _seen)) = test_server::start(vec![("404 Not Found", "{}")]).await else {
            return;
        };

        let document = remote_for(&url)
            .get_document(&Identity::new("u1"))
            .await
            .expect("get");
        assert!(document.is_none());
    }

    #[tokio::test]
    async fn set_document_patches_with_server_timestamp() {
        let Some((url, seen)) = test_server::start(vec![("200 OK", "{}")]).await else {
            return;
        };

        let mut fields = Document::new();
        fields.insert("currentMonth".into(), serde_json::json!(4));
        remote_for(&url)
            .set_document(&Identity::new("u1"), fields)
            .await
            .expect("set");

        let requests = seen.lock().clone();
        assert!(requests[0].request_line.starts_with("PATCH /api/users/u1/"));
        let body: serde_json::Value = serde_json::from_str(&requests[0].body).expect("json body");
        assert_eq!(body["currentMonth"], serde_json::json!(4));
        assert_eq!(body[UPDATED_AT_FIELD]["$serverTimestamp"], serde_json::json!(true));
    }

    #[tokio::test]
    async fn set_document_reports_permission_denied() {
        let Some((url, _seen)) = test_server::start(vec![("403 Forbidden", "{}")]).await else {
            return;
        };

        let err = remote_for(&url)
            .set_document(&Identity::new("u1"), Document::new())
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("Permission denied"));
    }

    #[tokio::test]
    async fn subscribe_pushes_only_changed_documents() {
        let first = r#"{"currentMonth":1,"currentYear":2024}"#;
        let second = r#"{"currentMonth":2,"currentYear":2024}"#;
        let Some((url, _seen)) = test_server::start(vec![
            ("200 OK", first),
            ("200 OK", first),
            ("200 OK", second),
        ])
        .await
        else {
            return;
        };

        let remote = remote_for(&url).with_poll_interval(Duration::from_millis(10));
        let mut subscription = remote.subscribe(&Identity::new("u1")).expect("subscribe");

        let pushed = subscription.next().await.expect("first push");
        assert_eq!(pushed["currentMonth"], serde_json::json!(1));
        let pushed = subscription.next().await.expect("second push");
        assert_eq!(pushed["currentMonth"], serde_json::json!(2));

        subscription.unsubscribe();
    }
}
