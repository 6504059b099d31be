/// Client-side building blocks for RogueDB
///
/// Nothing in this crate talks to the network. It covers:
/// - minting and renewing short-lived RS256 bearer tokens
/// - building validated query expression trees
/// - typed operands and their binary/JSON encodings

pub mod clock;
pub mod credential;
pub mod error;
pub mod expression;
pub mod operand;

pub use clock::{Clock, ManualClock, SystemClock};
pub use credential::{AuthToken, Claims, Credential, CredentialManager, CredentialPolicy, CredentialRecord};
pub use error::{CredentialError, ExpressionError, OperandError};
pub use expression::{
    BasicBuilder, BasicExpression, ComparisonOperator, ComparisonPair, CompositeBuilder, CompositeExpression,
    Expression, LogicalOperator, QueryMode,
};
pub use operand::{
    FieldDescriptor, FieldValue, Operand, OperandCodec, Scalar, ScalarKind, TypeDescriptor, TypedOperand, WireOperand,
};
