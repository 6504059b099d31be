/// Client stub for the `rogue.services.RogueDB` service
use tonic::codegen::http::uri::PathAndQuery;
use tonic::codegen::*;

const SERVICE: &str = "rogue.services.RogueDB";

/// The three write streams exposed by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationMethod {
    Insert,
    Update,
    Remove,
}

impl MutationMethod {
    /// RPC method name as declared in the service
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationMethod::Insert => "insert",
            MutationMethod::Update => "update",
            MutationMethod::Remove => "remove",
        }
    }

    fn path(&self) -> PathAndQuery {
        match self {
            MutationMethod::Insert => PathAndQuery::from_static("/rogue.services.RogueDB/insert"),
            MutationMethod::Update => PathAndQuery::from_static("/rogue.services.RogueDB/update"),
            MutationMethod::Remove => PathAndQuery::from_static("/rogue.services.RogueDB/remove"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RogueDbClient<T> {
    inner: tonic::client::Grpc<T>,
}

impl RogueDbClient<tonic::transport::Channel> {
    /// Attempt to create a new client by connecting to a given endpoint.
    pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
    where
        D: TryInto<tonic::transport::Endpoint>,
        D::Error: Into<StdError>,
    {
        let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
        Ok(Self::new(conn))
    }
}

impl<T> RogueDbClient<T>
where
    T: tonic::client::GrpcService<tonic::body::BoxBody>,
    T::Error: Into<StdError>,
    T::ResponseBody: Body<Data = Bytes> + Send + 'static,
    <T::ResponseBody as Body>::Error: Into<StdError> + Send,
{
    pub fn new(inner: T) -> Self {
        let inner = tonic::client::Grpc::new(inner);
        Self { inner }
    }

    /// Limits the maximum size of a decoded message.
    pub fn max_decoding_message_size(mut self, limit: usize) -> Self {
        self.inner = self.inner.max_decoding_message_size(limit);
        self
    }

    async fn ready(&mut self) -> Result<(), tonic::Status> {
        self.inner.ready().await.map_err(|e| {
            tonic::Status::new(
                tonic::Code::Unknown,
                format!("Service was not ready: {}", e.into()),
            )
        })
    }

    /// Open one of the write streams
    pub async fn mutate(
        &mut self,
        method: MutationMethod,
        request: impl tonic::IntoStreamingRequest<Message = super::Mutation>,
    ) -> Result<tonic::Response<tonic::codec::Streaming<super::Response>>, tonic::Status> {
        self.ready().await?;
        let codec = tonic::codec::ProstCodec::default();
        let mut req = request.into_streaming_request();
        req.extensions_mut()
            .insert(GrpcMethod::new(SERVICE, method.as_str()));
        self.inner.streaming(req, method.path(), codec).await
    }

    pub async fn insert(
        &mut self,
        request: impl tonic::IntoStreamingRequest<Message = super::Mutation>,
    ) -> Result<tonic::Response<tonic::codec::Streaming<super::Response>>, tonic::Status> {
        self.mutate(MutationMethod::Insert, request).await
    }

    pub async fn update(
        &mut self,
        request: impl tonic::IntoStreamingRequest<Message = super::Mutation>,
    ) -> Result<tonic::Response<tonic::codec::Streaming<super::Response>>, tonic::Status> {
        self.mutate(MutationMethod::Update, request).await
    }

    pub async fn remove(
        &mut self,
        request: impl tonic::IntoStreamingRequest<Message = super::Mutation>,
    ) -> Result<tonic::Response<tonic::codec::Streaming<super::Response>>, tonic::Status> {
        self.mutate(MutationMethod::Remove, request).await
    }

    pub async fn search(
        &mut self,
        request: impl tonic::IntoStreamingRequest<Message = super::Search>,
    ) -> Result<tonic::Response<tonic::codec::Streaming<super::Response>>, tonic::Status> {
        self.ready().await?;
        let codec = tonic::codec::ProstCodec::default();
        let path = PathAndQuery::from_static("/rogue.services.RogueDB/search");
        let mut req = request.into_streaming_request();
        req.extensions_mut().insert(GrpcMethod::new(SERVICE, "search"));
        self.inner.streaming(req, path, codec).await
    }

    pub async fn subscribe(
        &mut self,
        request: impl tonic::IntoRequest<super::Subscribe>,
    ) -> Result<tonic::Response<super::Response>, tonic::Status> {
        self.ready().await?;
        let codec = tonic::codec::ProstCodec::default();
        let path = PathAndQuery::from_static("/rogue.services.RogueDB/subscribe");
        let mut req = request.into_request();
        req.extensions_mut().insert(GrpcMethod::new(SERVICE, "subscribe"));
        self.inner.unary(req, path, codec).await
    }
}
