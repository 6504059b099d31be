/// REST transport over the `/rest/*` endpoints
///
/// HTTP has no request streaming, so a session's frames are buffered until
/// writes-done and sent as one JSON request:
///
/// | session   | request               |
/// |-----------|-----------------------|
/// | insert    | `POST /rest/insert`   |
/// | update    | `PATCH /rest/update`  |
/// | remove    | `DELETE /rest/remove` |
/// | search    | `POST /rest/search`   |
/// | subscribe | `POST /rest/subscribe`|
///
/// The session semantics are unchanged: all-or-nothing mutations, one
/// terminal signal, results numbered across every submitted frame.
use crate::config::ClientConfig;
use crate::convert;
use crate::error::{SchemaError, SessionError};
use crate::request::{MutationKind, MutationRequest, SchemaSet, SearchRequest};
use crate::transport::{Exchange, Peer, Transport};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use rogue_core::AuthToken;
use serde_json::Value as JsonValue;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RestTransport {
    http: reqwest::Client,
    base: String,
    api_key: String,
    capacity: usize,
}

impl RestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, SessionError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| SessionError::InvalidConfig(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            http,
            base: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            capacity: config.channel_capacity,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/rest/{}", self.base, path)
    }
}

fn route(kind: MutationKind) -> (Method, &'static str) {
    match kind {
        MutationKind::Insert => (Method::POST, "insert"),
        MutationKind::Update => (Method::PATCH, "update"),
        MutationKind::Remove => (Method::DELETE, "remove"),
    }
}

fn request_error(e: reqwest::Error) -> SessionError {
    if e.is_timeout() {
        SessionError::Timeout(e.to_string())
    } else {
        SessionError::Transport(e.to_string())
    }
}

/// Read a response body, turning HTTP failures into session errors
async fn read_body(response: reqwest::Response) -> Result<String, SessionError> {
    let status = response.status();
    let body = response.text().await.map_err(request_error)?;
    if status.is_success() {
        return Ok(body);
    }
    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            Err(SessionError::Timeout(format!("HTTP {}: {}", status.as_u16(), body)))
        }
        _ => Err(SessionError::ServerRejected {
            code: status.as_u16().to_string(),
            message: body,
        }),
    }
}

#[async_trait]
impl Transport for RestTransport {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn open_mutation(
        &self,
        kind: MutationKind,
        token: &AuthToken,
    ) -> Result<Exchange<MutationRequest>, SessionError> {
        let (exchange, Peer { mut frames, responses }) = Exchange::<MutationRequest>::pair(self.capacity);
        let (method, path) = route(kind);
        let url = self.url(path);
        let http = self.http.clone();
        let api_key = self.api_key.clone();
        let token = token.clone();

        let task = tokio::spawn(async move {
            let mut messages = Vec::new();
            while let Some(frame) = frames.recv().await {
                messages.extend(frame.messages);
            }
            if messages.is_empty() {
                debug!(kind = %kind, "Nothing to send");
                return;
            }

            let body = convert::mutation_to_json(&messages, &api_key);
            let outcome = match http
                .request(method, &url)
                .bearer_auth(token.as_str())
                .json(&body)
                .send()
                .await
            {
                Ok(response) => read_body(response).await.map(|_| ()),
                Err(e) => Err(request_error(e)),
            };
            if let Err(err) = outcome {
                let _ = responses.send(Err(err)).await;
            }
        });

        Ok(exchange.with_abort(task.abort_handle()))
    }

    async fn open_search(&self, token: &AuthToken) -> Result<Exchange<SearchRequest>, SessionError> {
        let (exchange, Peer { mut frames, responses }) = Exchange::<SearchRequest>::pair(self.capacity);
        let url = self.url("search");
        let http = self.http.clone();
        let api_key = self.api_key.clone();
        let token = token.clone();

        let task = tokio::spawn(async move {
            let mut queries = Vec::new();
            while let Some(frame) = frames.recv().await {
                queries.extend(frame.queries);
            }
            if queries.is_empty() {
                return;
            }

            let body = convert::search_to_json(&queries, &api_key);
            let outcome = match http.post(&url).bearer_auth(token.as_str()).json(&body).send().await {
                Ok(response) => match read_body(response).await {
                    Ok(text) => serde_json::from_str::<JsonValue>(&text)
                        .map_err(|e| SessionError::Transport(format!("malformed search response: {}", e)))
                        .and_then(|json| convert::response_from_json(&json)),
                    Err(err) => Err(err),
                },
                Err(e) => Err(request_error(e)),
            };
            let _ = responses.send(outcome).await;
        });

        Ok(exchange.with_abort(task.abort_handle()))
    }

    async fn subscribe(&self, schemas: &SchemaSet, token: &AuthToken) -> Result<(), SchemaError> {
        let body = convert::subscribe_to_json(schemas.schemas(), &self.api_key);
        let response = self
            .http
            .post(self.url("subscribe"))
            .bearer_auth(token.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| SchemaError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SchemaError::Transport(e.to_string()))?;
        match status {
            s if s.is_success() => Ok(()),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Err(SchemaError::ValidationFailed(text)),
            s => Err(SchemaError::Transport(format!("HTTP {}: {}", s.as_u16(), text))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes() {
        assert_eq!(route(MutationKind::Insert), (Method::POST, "insert"));
        assert_eq!(route(MutationKind::Update), (Method::PATCH, "update"));
        assert_eq!(route(MutationKind::Remove), (Method::DELETE, "remove"));
    }

    #[test]
    fn test_url_ignores_trailing_slash() {
        let config = ClientConfig::new().with_endpoint("https://c-01.roguedb.dev/");
        let transport = RestTransport::new(&config).unwrap();
        assert_eq!(transport.url("search"), "https://c-01.roguedb.dev/rest/search");
    }
}
