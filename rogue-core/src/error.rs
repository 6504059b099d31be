/// Local error types
///
/// Everything in this module is raised on the client before any request
/// reaches a transport.
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Failed to read credential file {path}: {source}")]
    IoFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed credential record: {0}")]
    MalformedRecord(String),

    #[error("Malformed private key: {0}")]
    MalformedKey(String),

    #[error("Credential record is missing field '{0}'")]
    MissingField(&'static str),

    #[error("Invalid credential policy: {0}")]
    InvalidPolicy(String),
}

impl CredentialError {
    /// Returns a stable error code for this error variant.
    pub fn code(&self) -> &'static str {
        match self {
            CredentialError::IoFailure { .. } => "CREDENTIAL_IO_FAILURE",
            CredentialError::MalformedRecord(_) => "CREDENTIAL_MALFORMED_RECORD",
            CredentialError::MalformedKey(_) => "CREDENTIAL_MALFORMED_KEY",
            CredentialError::MissingField(_) => "CREDENTIAL_MISSING_FIELD",
            CredentialError::InvalidPolicy(_) => "CREDENTIAL_INVALID_POLICY",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpressionError {
    #[error("Unbalanced expression: {operators} comparison operator(s) for {operands} operand(s)")]
    Unbalanced { operators: usize, operands: usize },

    #[error("Operand of type {type_name} sets field {field}, which is not among the selected fields {selected:?}")]
    FieldMismatch {
        type_name: String,
        field: u32,
        selected: Vec<u32>,
    },

    #[error("Operand type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Empty expression: {0}")]
    Empty(&'static str),
}

impl ExpressionError {
    /// Returns a stable error code for this error variant.
    pub fn code(&self) -> &'static str {
        match self {
            ExpressionError::Unbalanced { .. } => "EXPRESSION_UNBALANCED",
            ExpressionError::FieldMismatch { .. } => "EXPRESSION_FIELD_MISMATCH",
            ExpressionError::TypeMismatch { .. } => "EXPRESSION_TYPE_MISMATCH",
            ExpressionError::Empty(_) => "EXPRESSION_EMPTY",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperandError {
    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("Type {type_name} has no field {field}")]
    UnknownField { type_name: String, field: String },

    #[error("Field {field} of {type_name} expects {expected}, found {found}")]
    KindMismatch {
        type_name: String,
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Expected operand of type {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Operand of type {type_name} is missing field {field}")]
    MissingField { type_name: String, field: String },

    #[error("Failed to decode operand: {0}")]
    Decode(String),
}

impl OperandError {
    /// Returns a stable error code for this error variant.
    pub fn code(&self) -> &'static str {
        match self {
            OperandError::UnknownType(_) => "OPERAND_UNKNOWN_TYPE",
            OperandError::UnknownField { .. } => "OPERAND_UNKNOWN_FIELD",
            OperandError::KindMismatch { .. } => "OPERAND_KIND_MISMATCH",
            OperandError::TypeMismatch { .. } => "OPERAND_TYPE_MISMATCH",
            OperandError::MissingField { .. } => "OPERAND_MISSING_FIELD",
            OperandError::Decode(_) => "OPERAND_DECODE",
        }
    }
}

impl From<prost::DecodeError> for OperandError {
    fn from(err: prost::DecodeError) -> Self {
        OperandError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(
            CredentialError::MissingField("client_email").code(),
            "CREDENTIAL_MISSING_FIELD"
        );
        assert_eq!(
            ExpressionError::Unbalanced { operators: 2, operands: 1 }.code(),
            "EXPRESSION_UNBALANCED"
        );
        assert_eq!(
            OperandError::UnknownType("x.Y".to_string()).code(),
            "OPERAND_UNKNOWN_TYPE"
        );
    }

    #[test]
    fn test_io_failure_names_path() {
        let err = CredentialError::IoFailure {
            path: PathBuf::from("/missing/service_account.json"),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        assert!(err.to_string().contains("/missing/service_account.json"));
    }
}
