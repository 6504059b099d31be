/// Protocol Buffers messages for the RogueDB gRPC API
///
/// Hand-maintained mirror of `proto/rogue/services/queries.proto`, kept in
/// the shape `tonic-build` would generate so no `protoc` is needed at build
/// time. Field tags must stay in sync with the `.proto` file.

pub mod rogue_db_client;

pub use rogue_db_client::{MutationMethod, RogueDbClient};

/// Protobuf package of every message in this crate
pub const PACKAGE: &str = "rogue.services";

/// Prefix used by `google.protobuf.Any` type URLs
pub const TYPE_URL_PREFIX: &str = "type.googleapis.com/";

/// Wire-compatible `google.protobuf.Any`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Any {
    #[prost(string, tag = "1")]
    pub type_url: ::prost::alloc::string::String,
    #[prost(bytes = "vec", tag = "2")]
    pub value: ::prost::alloc::vec::Vec<u8>,
}

impl Any {
    /// Fully-qualified message name behind the type URL
    ///
    /// Everything after the last `/` names the message, as in the protobuf
    /// runtime libraries.
    pub fn type_name(&self) -> &str {
        match self.type_url.rfind('/') {
            Some(pos) => &self.type_url[pos + 1..],
            None => &self.type_url,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum LogicalOperator {
    And = 0,
    Or = 1,
}

impl LogicalOperator {
    pub fn as_str_name(&self) -> &'static str {
        match self {
            LogicalOperator::And => "AND",
            LogicalOperator::Or => "OR",
        }
    }

    pub fn from_str_name(value: &str) -> Option<Self> {
        match value {
            "AND" => Some(Self::And),
            "OR" => Some(Self::Or),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ComparisonOperator {
    Greater = 0,
    GreaterEqual = 1,
    Lesser = 2,
    LesserEqual = 3,
    Equal = 4,
    NotEqual = 5,
}

impl ComparisonOperator {
    pub fn as_str_name(&self) -> &'static str {
        match self {
            ComparisonOperator::Greater => "GREATER",
            ComparisonOperator::GreaterEqual => "GREATER_EQUAL",
            ComparisonOperator::Lesser => "LESSER",
            ComparisonOperator::LesserEqual => "LESSER_EQUAL",
            ComparisonOperator::Equal => "EQUAL",
            ComparisonOperator::NotEqual => "NOT_EQUAL",
        }
    }

    pub fn from_str_name(value: &str) -> Option<Self> {
        match value {
            "GREATER" => Some(Self::Greater),
            "GREATER_EQUAL" => Some(Self::GreaterEqual),
            "LESSER" => Some(Self::Lesser),
            "LESSER_EQUAL" => Some(Self::LesserEqual),
            "EQUAL" => Some(Self::Equal),
            "NOT_EQUAL" => Some(Self::NotEqual),
            _ => None,
        }
    }
}

/// Body of the `insert`, `update` and `remove` streams
///
/// The three service messages share one layout, so a single type is used
/// for all of them and the RPC path carries the operation kind.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Mutation {
    #[prost(string, tag = "1")]
    pub api_key: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "2")]
    pub messages: ::prost::alloc::vec::Vec<Any>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Basic {
    #[prost(enumeration = "LogicalOperator", tag = "1")]
    pub logical_operator: i32,
    #[prost(enumeration = "ComparisonOperator", repeated, tag = "2")]
    pub comparisons: ::prost::alloc::vec::Vec<i32>,
    #[prost(message, repeated, tag = "3")]
    pub operands: ::prost::alloc::vec::Vec<Any>,
    #[prost(uint32, repeated, tag = "4")]
    pub fields: ::prost::alloc::vec::Vec<u32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Composite {
    #[prost(enumeration = "LogicalOperator", tag = "1")]
    pub logical_operator: i32,
    #[prost(message, repeated, tag = "2")]
    pub expressions: ::prost::alloc::vec::Vec<Expression>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Expression {
    #[prost(oneof = "expression::Kind", tags = "1, 2")]
    pub kind: ::core::option::Option<expression::Kind>,
}

/// Nested message and enum types in `Expression`.
pub mod expression {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Kind {
        #[prost(message, tag = "1")]
        Basic(super::Basic),
        #[prost(message, tag = "2")]
        Composite(super::Composite),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Search {
    #[prost(string, tag = "1")]
    pub api_key: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "2")]
    pub queries: ::prost::alloc::vec::Vec<Expression>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryResult {
    #[prost(message, repeated, tag = "1")]
    pub messages: ::prost::alloc::vec::Vec<Any>,
}

/// Server frame for every streaming call
///
/// `results` is keyed by zero-based query index; `finished` lists the
/// indices the server has finished processing.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Response {
    #[prost(map = "uint32, message", tag = "1")]
    pub results: ::std::collections::HashMap<u32, QueryResult>,
    #[prost(uint32, repeated, tag = "2")]
    pub finished: ::prost::alloc::vec::Vec<u32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Subscribe {
    #[prost(string, tag = "1")]
    pub api_key: ::prost::alloc::string::String,
    #[prost(string, repeated, tag = "2")]
    pub schemas: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}
