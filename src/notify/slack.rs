//! Slack incoming-webhook transport.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::routing::RenderedMessage;

use super::{MessageTransport, TransportError};

/// Per-request timeout for Slack posts.
pub const SLACK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct SlackMessage<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<&'a str>,
}

/// Posts messages to one Slack incoming webhook.
#[derive(Debug, Clone)]
pub struct SlackClient {
    http: reqwest::Client,
    url: String,
}

impl SlackClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    /// Posts `text`, overriding the webhook's default channel when `room` is
    /// non-empty.
    pub async fn send(&self, text: &str, room: Option<&str>) -> Result<(), TransportError> {
        let body = SlackMessage {
            text,
            channel: room.filter(|r| !r.is_empty()),
        };
        let response = self.http.post(&self.url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Every configured Slack webhook, by the name routes refer to it with.
#[derive(Debug, Clone, Default)]
pub struct SlackTransports {
    clients: BTreeMap<String, SlackClient>,
}

impl SlackTransports {
    /// Builds one client per `(name, url)` pair, all sharing a connection
    /// pool.
    pub fn from_urls<'a>(
        urls: impl IntoIterator<Item = (&'a String, &'a String)>,
    ) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder().timeout(SLACK_TIMEOUT).build()?;
        let clients = urls
            .into_iter()
            .map(|(name, url)| (name.clone(), SlackClient::new(http.clone(), url.clone())))
            .collect();
        Ok(Self { clients })
    }

    pub fn get(&self, name: &str) -> Option<&SlackClient> {
        self.clients.get(name)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl MessageTransport for SlackTransports {
    async fn deliver(&self, message: &RenderedMessage) -> Result<(), TransportError> {
        let client = self
            .get(&message.transport)
            .ok_or_else(|| TransportError::UnknownTransport(message.transport.clone()))?;
        client.send(&message.text, message.room.as_deref()).await?;
        debug!(transport = %message.transport, room = ?message.room, "slack message posted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transports(server: &MockServer) -> SlackTransports {
        let name = "eng".to_string();
        let url = format!("{}/hooks/eng", server.uri());
        SlackTransports::from_urls([(&name, &url)]).unwrap()
    }

    fn message(room: Option<&str>) -> RenderedMessage {
        RenderedMessage {
            text: "acme/widgets deployed".into(),
            room: room.map(String::from),
            transport: "eng".into(),
        }
    }

    #[tokio::test]
    async fn posts_text_and_channel() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/eng"))
            .and(body_json(serde_json::json!({
                "text": "acme/widgets deployed",
                "channel": "#deploys"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        transports(&server)
            .deliver(&message(Some("#deploys")))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn channel_is_omitted_without_room() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/eng"))
            .and(body_json(serde_json::json!({ "text": "acme/widgets deployed" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        transports(&server).deliver(&message(None)).await.unwrap();
    }

    #[tokio::test]
    async fn non_success_status_carries_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no_service"))
            .mount(&server)
            .await;

        let err = transports(&server).deliver(&message(None)).await.unwrap_err();
        match err {
            TransportError::Status { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "no_service");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unknown_transport_is_an_error() {
        let server = MockServer::start().await;
        let mut msg = message(None);
        msg.transport = "ops".into();

        let err = transports(&server).deliver(&msg).await.unwrap_err();
        assert!(matches!(err, TransportError::UnknownTransport(name) if name == "ops"));
    }
}
