use std::time::Duration;

/// Wire protocol used to reach the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    /// Bidirectional streaming gRPC
    #[default]
    Grpc,
    /// One JSON request per session under `/rest/*`
    Rest,
}

/// Client configuration for connection and session parameters
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL, e.g. `https://c-0123456789abcdef0123456789ab.roguedb.dev`
    pub endpoint: String,

    pub transport: TransportKind,

    /// Copied into the `api_key` field of every request (empty = omitted)
    pub api_key: String,

    /// Default completion timeout used by the one-shot helpers
    pub session_timeout: Duration,

    pub connect_timeout: Duration,

    /// Frames buffered between a session and its transport
    pub channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:50051".to_string(),
            transport: TransportKind::Grpc,
            api_key: String::new(),
            session_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            channel_capacity: 64,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    /// Use the REST endpoints instead of gRPC
    pub fn with_rest(self) -> Self {
        self.with_transport(TransportKind::Rest)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(format!(
                "endpoint must start with http:// or https://, got '{}'",
                self.endpoint
            ));
        }

        if self.session_timeout.is_zero() {
            return Err("session_timeout must be greater than 0".to_string());
        }

        if self.connect_timeout.is_zero() {
            return Err("connect_timeout must be greater than 0".to_string());
        }

        if self.channel_capacity == 0 {
            return Err("channel_capacity must be greater than 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.transport, TransportKind::Grpc);
        assert_eq!(config.session_timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.channel_capacity, 64);
        assert!(config.api_key.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = ClientConfig::new()
            .with_endpoint("https://c-example.roguedb.dev")
            .with_rest()
            .with_api_key("key")
            .with_session_timeout(Duration::from_secs(5))
            .with_channel_capacity(8);

        assert_eq!(config.endpoint, "https://c-example.roguedb.dev");
        assert_eq!(config.transport, TransportKind::Rest);
        assert_eq!(config.api_key, "key");
        assert_eq!(config.session_timeout, Duration::from_secs(5));
        assert_eq!(config.channel_capacity, 8);
    }

    #[test]
    fn test_validate_endpoint_scheme() {
        let config = ClientConfig::new().with_endpoint("c-example.roguedb.dev");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_values() {
        assert!(ClientConfig::new().with_channel_capacity(0).validate().is_err());
        assert!(ClientConfig::new()
            .with_session_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }
}
