/// gRPC transport over the `rogue.services.RogueDB` service
///
/// Each session is one bidirectional stream. The bearer token travels in
/// the `authorization` metadata of the call; frames carry only the API key.
use crate::config::ClientConfig;
use crate::convert;
use crate::error::{SchemaError, SessionError};
use crate::request::{MutationKind, MutationRequest, SchemaSet, SearchRequest};
use crate::transport::{Exchange, Inbound, Peer, Transport};
use async_trait::async_trait;
use futures::StreamExt;
use rogue_core::AuthToken;
use rogue_proto::{self as proto, MutationMethod, RogueDbClient};
use tokio::sync::mpsc;
use tonic::codec::Streaming;
use tonic::metadata::AsciiMetadataValue;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tracing::{debug, info};

const AUTHORIZATION: &str = "authorization";

#[derive(Debug, Clone)]
pub struct GrpcTransport {
    client: RogueDbClient<Channel>,
    api_key: String,
    capacity: usize,
}

impl GrpcTransport {
    /// Connect eagerly, failing if the endpoint is unreachable
    pub async fn connect(config: &ClientConfig) -> Result<Self, SessionError> {
        let channel = endpoint(config)?
            .connect()
            .await
            .map_err(|e| SessionError::Transport(format!("Failed to connect to {}: {}", config.endpoint, e)))?;
        info!(endpoint = %config.endpoint, "Connected over gRPC");
        Ok(Self::from_channel(channel, config))
    }

    /// Build a transport that connects on first use
    pub fn lazy(config: &ClientConfig) -> Result<Self, SessionError> {
        let channel = endpoint(config)?.connect_lazy();
        Ok(Self::from_channel(channel, config))
    }

    fn from_channel(channel: Channel, config: &ClientConfig) -> Self {
        Self {
            client: RogueDbClient::new(channel),
            api_key: config.api_key.clone(),
            capacity: config.channel_capacity,
        }
    }
}

fn endpoint(config: &ClientConfig) -> Result<Endpoint, SessionError> {
    let mut endpoint = Channel::from_shared(config.endpoint.clone())
        .map_err(|e| SessionError::InvalidConfig(format!("Invalid endpoint: {}", e)))?
        .connect_timeout(config.connect_timeout);

    if config.endpoint.starts_with("https://") {
        endpoint = endpoint
            .tls_config(ClientTlsConfig::new())
            .map_err(|e| SessionError::InvalidConfig(format!("TLS setup failed: {}", e)))?;
    }
    Ok(endpoint)
}

fn bearer(token: &AuthToken) -> Result<AsciiMetadataValue, String> {
    token
        .bearer()
        .parse::<AsciiMetadataValue>()
        .map_err(|e| format!("token is not valid metadata: {}", e))
}

/// Outbound frames as a stream that ends on writes-done
fn frames<F: Send + 'static>(frames: mpsc::Receiver<F>) -> impl futures::Stream<Item = F> + Send + 'static {
    futures::stream::unfold(frames, |mut frames| async move {
        frames.recv().await.map(|frame| (frame, frames))
    })
}

/// Copy server frames into the session until the stream ends
async fn forward(mut stream: Streaming<proto::Response>, responses: mpsc::Sender<Inbound>) {
    loop {
        match stream.message().await {
            Ok(Some(response)) => {
                if responses.send(Ok(convert::response_from_proto(response))).await.is_err() {
                    return;
                }
            }
            Ok(None) => return,
            Err(status) => {
                let _ = responses.send(Err(status.into())).await;
                return;
            }
        }
    }
}

#[async_trait]
impl Transport for GrpcTransport {
    fn name(&self) -> &'static str {
        "grpc"
    }

    async fn open_mutation(
        &self,
        kind: MutationKind,
        token: &AuthToken,
    ) -> Result<Exchange<MutationRequest>, SessionError> {
        let authorization = bearer(token).map_err(SessionError::InvalidConfig)?;
        let (exchange, Peer { frames: outbound, responses }) = Exchange::<MutationRequest>::pair(self.capacity);

        let api_key = self.api_key.clone();
        let stream = frames(outbound).map(move |frame| convert::mutation_to_proto(&frame, &api_key));
        let mut request = tonic::Request::new(stream);
        request.metadata_mut().insert(AUTHORIZATION, authorization);

        let mut client = self.client.clone();
        let method = MutationMethod::from(kind);
        let task = tokio::spawn(async move {
            match client.mutate(method, request).await {
                Ok(response) => forward(response.into_inner(), responses).await,
                Err(status) => {
                    let _ = responses.send(Err(status.into())).await;
                }
            }
        });
        debug!(method = method.as_str(), "Opened gRPC mutation stream");

        Ok(exchange.with_abort(task.abort_handle()))
    }

    async fn open_search(&self, token: &AuthToken) -> Result<Exchange<SearchRequest>, SessionError> {
        let authorization = bearer(token).map_err(SessionError::InvalidConfig)?;
        let (exchange, Peer { frames: outbound, responses }) = Exchange::<SearchRequest>::pair(self.capacity);

        let api_key = self.api_key.clone();
        let stream = frames(outbound).map(move |frame| convert::search_to_proto(&frame, &api_key));
        let mut request = tonic::Request::new(stream);
        request.metadata_mut().insert(AUTHORIZATION, authorization);

        let mut client = self.client.clone();
        let task = tokio::spawn(async move {
            match client.search(request).await {
                Ok(response) => forward(response.into_inner(), responses).await,
                Err(status) => {
                    let _ = responses.send(Err(status.into())).await;
                }
            }
        });
        debug!("Opened gRPC search stream");

        Ok(exchange.with_abort(task.abort_handle()))
    }

    async fn subscribe(&self, schemas: &SchemaSet, token: &AuthToken) -> Result<(), SchemaError> {
        let authorization = bearer(token).map_err(SchemaError::Transport)?;
        let mut request = tonic::Request::new(proto::Subscribe {
            api_key: self.api_key.clone(),
            schemas: schemas.schemas().to_vec(),
        });
        request.metadata_mut().insert(AUTHORIZATION, authorization);

        let mut client = self.client.clone();
        client.subscribe(request).await.map_err(SchemaError::from)?;
        Ok(())
    }
}
