/// Query expression trees
///
/// An [`Expression`] is either a [`BasicExpression`] leaf, which pairs
/// comparison operators positionally with typed operands, or a
/// [`CompositeExpression`] combining child expressions under AND/OR.
///
/// Expressions are only produced by [`BasicBuilder`] and [`CompositeBuilder`],
/// which run every local check before handing out an immutable tree:
///
/// ```ignore
/// let low = TypedOperand::new("rogue.services.Test").with(1, "attribute1", 1i64);
/// let high = TypedOperand::new("rogue.services.Test").with(1, "attribute1", 10i64);
///
/// let query = Expression::basic(LogicalOperator::And)
///     .compare(ComparisonOperator::GreaterEqual, low)
///     .compare(ComparisonOperator::LesserEqual, high)
///     .build()?;
///
/// assert_eq!(query.mode(), QueryMode::Indexed);
/// ```
use crate::error::ExpressionError;
use crate::operand::TypedOperand;
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

impl LogicalOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOperator::And => "AND",
            LogicalOperator::Or => "OR",
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    Greater,
    GreaterEqual,
    Lesser,
    LesserEqual,
    Equal,
    NotEqual,
}

impl ComparisonOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOperator::Greater => "GREATER",
            ComparisonOperator::GreaterEqual => "GREATER_EQUAL",
            ComparisonOperator::Lesser => "LESSER",
            ComparisonOperator::LesserEqual => "LESSER_EQUAL",
            ComparisonOperator::Equal => "EQUAL",
            ComparisonOperator::NotEqual => "NOT_EQUAL",
        }
    }

    /// Whether `stored <op> operand` holds, given `stored.cmp(operand)`
    pub fn holds(&self, ordering: Ordering) -> bool {
        match self {
            ComparisonOperator::Greater => ordering == Ordering::Greater,
            ComparisonOperator::GreaterEqual => ordering != Ordering::Less,
            ComparisonOperator::Lesser => ordering == Ordering::Less,
            ComparisonOperator::LesserEqual => ordering != Ordering::Greater,
            ComparisonOperator::Equal => ordering == Ordering::Equal,
            ComparisonOperator::NotEqual => ordering != Ordering::Equal,
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<LogicalOperator> for rogue_proto::LogicalOperator {
    fn from(op: LogicalOperator) -> Self {
        match op {
            LogicalOperator::And => rogue_proto::LogicalOperator::And,
            LogicalOperator::Or => rogue_proto::LogicalOperator::Or,
        }
    }
}

impl From<ComparisonOperator> for rogue_proto::ComparisonOperator {
    fn from(op: ComparisonOperator) -> Self {
        match op {
            ComparisonOperator::Greater => rogue_proto::ComparisonOperator::Greater,
            ComparisonOperator::GreaterEqual => rogue_proto::ComparisonOperator::GreaterEqual,
            ComparisonOperator::Lesser => rogue_proto::ComparisonOperator::Lesser,
            ComparisonOperator::LesserEqual => rogue_proto::ComparisonOperator::LesserEqual,
            ComparisonOperator::Equal => rogue_proto::ComparisonOperator::Equal,
            ComparisonOperator::NotEqual => rogue_proto::ComparisonOperator::NotEqual,
        }
    }
}

/// How the server is expected to evaluate a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryMode {
    /// No field selectors; evaluated against the type's composite index
    Indexed,
    /// Explicit field selectors; evaluated by scanning
    Scan,
    /// Composite whose children do not agree
    Mixed,
}

/// One operator applied to one operand
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonPair {
    pub operator: ComparisonOperator,
    pub operand: TypedOperand,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BasicExpression {
    logical_operator: LogicalOperator,
    fields: Vec<u32>,
    comparisons: Vec<ComparisonPair>,
}

impl BasicExpression {
    pub fn logical_operator(&self) -> LogicalOperator {
        self.logical_operator
    }

    /// Field selectors; empty for an indexed query
    pub fn fields(&self) -> &[u32] {
        &self.fields
    }

    pub fn comparisons(&self) -> &[ComparisonPair] {
        &self.comparisons
    }

    /// The single type every operand belongs to
    pub fn type_name(&self) -> &str {
        // build() rejects empty comparison lists
        self.comparisons
            .first()
            .map(|pair| pair.operand.type_name())
            .unwrap_or_default()
    }

    pub fn is_indexed(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompositeExpression {
    logical_operator: LogicalOperator,
    children: Vec<Expression>,
}

impl CompositeExpression {
    pub fn logical_operator(&self) -> LogicalOperator {
        self.logical_operator
    }

    pub fn children(&self) -> &[Expression] {
        &self.children
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Basic(BasicExpression),
    Composite(CompositeExpression),
}

impl Expression {
    /// Start a leaf expression
    pub fn basic(logical_operator: LogicalOperator) -> BasicBuilder {
        BasicBuilder::new(logical_operator)
    }

    /// Start an internal node
    pub fn composite(logical_operator: LogicalOperator) -> CompositeBuilder {
        CompositeBuilder::new(logical_operator)
    }

    pub fn mode(&self) -> QueryMode {
        match self {
            Expression::Basic(basic) if basic.is_indexed() => QueryMode::Indexed,
            Expression::Basic(_) => QueryMode::Scan,
            Expression::Composite(composite) => {
                let mut modes = composite.children.iter().map(Expression::mode);
                let first = modes.next().unwrap_or(QueryMode::Indexed);
                if modes.all(|m| m == first) {
                    first
                } else {
                    QueryMode::Mixed
                }
            }
        }
    }

    /// Every operand in the tree, depth first
    pub fn operands(&self) -> impl Iterator<Item = &TypedOperand> {
        let mut out = Vec::new();
        self.collect_operands(&mut out);
        out.into_iter()
    }

    fn collect_operands<'a>(&'a self, out: &mut Vec<&'a TypedOperand>) {
        match self {
            Expression::Basic(basic) => out.extend(basic.comparisons.iter().map(|p| &p.operand)),
            Expression::Composite(composite) => {
                for child in &composite.children {
                    child.collect_operands(out);
                }
            }
        }
    }
}

/// Accumulates a [`BasicExpression`]
///
/// Operators and operands may be appended separately; they are paired by
/// position when the expression is built.
#[derive(Debug, Clone, Default)]
pub struct BasicBuilder {
    logical_operator: LogicalOperator,
    operators: Vec<ComparisonOperator>,
    operands: Vec<TypedOperand>,
    fields: Vec<u32>,
}

impl BasicBuilder {
    pub fn new(logical_operator: LogicalOperator) -> Self {
        Self {
            logical_operator,
            ..Default::default()
        }
    }

    /// Append an operator together with its operand
    pub fn compare(mut self, operator: ComparisonOperator, operand: TypedOperand) -> Self {
        self.operators.push(operator);
        self.operands.push(operand);
        self
    }

    pub fn operator(mut self, operator: ComparisonOperator) -> Self {
        self.operators.push(operator);
        self
    }

    pub fn operand(mut self, operand: TypedOperand) -> Self {
        self.operands.push(operand);
        self
    }

    /// Restrict evaluation to a field, turning the query into a scan
    ///
    /// Selectors form an ordered set; repeats are ignored.
    pub fn field(mut self, number: u32) -> Self {
        if !self.fields.contains(&number) {
            self.fields.push(number);
        }
        self
    }

    pub fn fields(self, numbers: impl IntoIterator<Item = u32>) -> Self {
        numbers.into_iter().fold(self, BasicBuilder::field)
    }

    pub fn build(self) -> Result<Expression, ExpressionError> {
        if self.operators.len() != self.operands.len() {
            return Err(ExpressionError::Unbalanced {
                operators: self.operators.len(),
                operands: self.operands.len(),
            });
        }
        if self.operators.is_empty() {
            return Err(ExpressionError::Empty("basic expression has no comparisons"));
        }

        let expected = self.operands[0].type_name();
        if let Some(other) = self.operands.iter().find(|o| o.type_name() != expected) {
            return Err(ExpressionError::TypeMismatch {
                expected: expected.to_string(),
                found: other.type_name().to_string(),
            });
        }

        if !self.fields.is_empty() {
            for operand in &self.operands {
                if let Some(field) = operand.field_numbers().find(|n| !self.fields.contains(n)) {
                    return Err(ExpressionError::FieldMismatch {
                        type_name: operand.type_name().to_string(),
                        field,
                        selected: self.fields.clone(),
                    });
                }
            }
        }

        let comparisons = self
            .operators
            .into_iter()
            .zip(self.operands)
            .map(|(operator, operand)| ComparisonPair { operator, operand })
            .collect();

        Ok(Expression::Basic(BasicExpression {
            logical_operator: self.logical_operator,
            fields: self.fields,
            comparisons,
        }))
    }
}

/// Accumulates a [`CompositeExpression`] from finished children
#[derive(Debug, Clone, Default)]
pub struct CompositeBuilder {
    logical_operator: LogicalOperator,
    children: Vec<Expression>,
}

impl CompositeBuilder {
    pub fn new(logical_operator: LogicalOperator) -> Self {
        Self {
            logical_operator,
            children: Vec::new(),
        }
    }

    pub fn child(mut self, expression: Expression) -> Self {
        self.children.push(expression);
        self
    }

    pub fn build(self) -> Result<Expression, ExpressionError> {
        if self.children.is_empty() {
            return Err(ExpressionError::Empty("composite expression has no children"));
        }
        Ok(Expression::Composite(CompositeExpression {
            logical_operator: self.logical_operator,
            children: self.children,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST: &str = "rogue.services.Test";

    fn test_operand(a1: i64, a2: i64, a3: bool) -> TypedOperand {
        TypedOperand::new(TEST)
            .with(1, "attribute1", a1)
            .with(2, "attribute2", a2)
            .with(3, "attribute3", a3)
    }

    fn range() -> BasicBuilder {
        Expression::basic(LogicalOperator::And)
            .compare(ComparisonOperator::GreaterEqual, test_operand(1, 1, true))
            .compare(ComparisonOperator::LesserEqual, test_operand(10, 10, true))
    }

    #[test]
    fn test_without_selectors_is_indexed() {
        let expr = range().build().unwrap();
        assert_eq!(expr.mode(), QueryMode::Indexed);

        let Expression::Basic(basic) = &expr else {
            panic!("expected basic expression");
        };
        assert_eq!(basic.comparisons().len(), 2);
        assert_eq!(basic.comparisons()[0].operator, ComparisonOperator::GreaterEqual);
        assert_eq!(basic.type_name(), TEST);
    }

    #[test]
    fn test_selectors_make_a_scan() {
        let low = TypedOperand::new(TEST).with(1, "attribute1", 1i64).with(2, "attribute2", 1i64);
        let high = TypedOperand::new(TEST).with(1, "attribute1", 10i64).with(2, "attribute2", 10i64);

        let expr = Expression::basic(LogicalOperator::And)
            .compare(ComparisonOperator::GreaterEqual, low)
            .compare(ComparisonOperator::LesserEqual, high)
            .fields([1, 2])
            .build()
            .unwrap();

        assert_eq!(expr.mode(), QueryMode::Scan);
    }

    #[test]
    fn test_operand_outside_selectors_fails() {
        let err = range().fields([1, 2]).build().unwrap_err();
        assert_eq!(
            err,
            ExpressionError::FieldMismatch {
                type_name: TEST.to_string(),
                field: 3,
                selected: vec![1, 2],
            }
        );
    }

    #[test]
    fn test_dangling_operator_is_unbalanced() {
        let err = range().operator(ComparisonOperator::Equal).build().unwrap_err();
        assert_eq!(err, ExpressionError::Unbalanced { operators: 3, operands: 2 });

        let err = Expression::basic(LogicalOperator::Or)
            .operand(test_operand(1, 1, true))
            .build()
            .unwrap_err();
        assert_eq!(err, ExpressionError::Unbalanced { operators: 0, operands: 1 });
    }

    #[test]
    fn test_separately_appended_pairs_by_position() {
        let expr = Expression::basic(LogicalOperator::Or)
            .operator(ComparisonOperator::Equal)
            .operator(ComparisonOperator::NotEqual)
            .operand(test_operand(1, 1, true))
            .operand(test_operand(2, 2, false))
            .build()
            .unwrap();

        let Expression::Basic(basic) = expr else {
            panic!("expected basic expression");
        };
        assert_eq!(basic.comparisons()[1].operator, ComparisonOperator::NotEqual);
        assert_eq!(basic.comparisons()[1].operand, test_operand(2, 2, false));
    }

    #[test]
    fn test_mixed_types_fail() {
        let other = TypedOperand::new("rogue.services.Other").with(1, "id", 1u64);
        let err = range().compare(ComparisonOperator::Equal, other).build().unwrap_err();
        assert!(matches!(err, ExpressionError::TypeMismatch { .. }));
    }

    #[test]
    fn test_empty_builders_fail() {
        assert!(matches!(
            Expression::basic(LogicalOperator::And).build(),
            Err(ExpressionError::Empty(_))
        ));
        assert!(matches!(
            Expression::composite(LogicalOperator::Or).build(),
            Err(ExpressionError::Empty(_))
        ));
    }

    #[test]
    fn test_duplicate_selectors_are_ignored() {
        let expr = Expression::basic(LogicalOperator::And)
            .compare(ComparisonOperator::Equal, TypedOperand::new(TEST).with(2, "attribute2", 4i64))
            .fields([2, 2, 1, 2])
            .build()
            .unwrap();

        let Expression::Basic(basic) = expr else {
            panic!("expected basic expression");
        };
        assert_eq!(basic.fields(), &[2, 1]);
    }

    #[test]
    fn test_composite_mode_and_operands() {
        let indexed = range().build().unwrap();
        let scan = Expression::basic(LogicalOperator::And)
            .compare(ComparisonOperator::Equal, TypedOperand::new(TEST).with(3, "attribute3", true))
            .field(3)
            .build()
            .unwrap();

        let same = Expression::composite(LogicalOperator::Or)
            .child(indexed.clone())
            .child(indexed.clone())
            .build()
            .unwrap();
        assert_eq!(same.mode(), QueryMode::Indexed);

        let mixed = Expression::composite(LogicalOperator::And)
            .child(indexed)
            .child(Expression::composite(LogicalOperator::Or).child(scan).build().unwrap())
            .build()
            .unwrap();
        assert_eq!(mixed.mode(), QueryMode::Mixed);
        assert_eq!(mixed.operands().count(), 3);
    }

    #[test]
    fn test_operator_semantics() {
        use Ordering::*;
        assert!(ComparisonOperator::GreaterEqual.holds(Equal));
        assert!(!ComparisonOperator::Greater.holds(Equal));
        assert!(ComparisonOperator::LesserEqual.holds(Less));
        assert!(ComparisonOperator::NotEqual.holds(Greater));
        assert!(!ComparisonOperator::Equal.holds(Less));
    }

    #[test]
    fn test_operators_map_onto_wire_enums() {
        assert_eq!(
            rogue_proto::ComparisonOperator::from(ComparisonOperator::LesserEqual),
            rogue_proto::ComparisonOperator::LesserEqual
        );
        assert_eq!(
            rogue_proto::LogicalOperator::from(LogicalOperator::Or),
            rogue_proto::LogicalOperator::Or
        );
    }
}
