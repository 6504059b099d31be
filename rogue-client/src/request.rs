/// Transport-agnostic request frames
use rogue_core::{AuthToken, Expression, TypedOperand};
use rogue_proto::MutationMethod;
use std::fmt;

/// Server interpretation of a mutation session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// Create new records
    Insert,
    /// Merge set fields into existing records
    Update,
    /// Delete records matching the operand
    Remove,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        MutationMethod::from(*self).as_str()
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<MutationKind> for MutationMethod {
    fn from(kind: MutationKind) -> Self {
        match kind {
            MutationKind::Insert => MutationMethod::Insert,
            MutationKind::Update => MutationMethod::Update,
            MutationKind::Remove => MutationMethod::Remove,
        }
    }
}

/// One frame of a mutation session
///
/// The three kinds share a layout; only `kind` changes what the server does.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRequest {
    pub kind: MutationKind,
    pub token: AuthToken,
    pub messages: Vec<TypedOperand>,
}

/// One frame of a search session
///
/// Queries are numbered by the server in submission order across every
/// frame of the session.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub token: AuthToken,
    pub queries: Vec<Expression>,
}

/// Complete set of raw schema definitions, in submission order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaSet {
    schemas: Vec<String>,
}

impl SchemaSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, schema: impl Into<String>) -> Self {
        self.push(schema);
        self
    }

    pub fn push(&mut self, schema: impl Into<String>) {
        self.schemas.push(schema.into());
    }

    pub fn schemas(&self) -> &[String] {
        &self.schemas
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn into_inner(self) -> Vec<String> {
        self.schemas
    }
}

impl<S: Into<String>> FromIterator<S> for SchemaSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            schemas: iter.into_iter().map(Into::into).collect(),
        }
    }
}
