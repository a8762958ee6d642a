//! Expression trees for target lists and scan qualifiers.
//!
//! Provides a fluent API for building expressions like `col("id").eq(lit(42))`.
//! Expressions are built against column names and bound to column indices
//! before evaluation.

use crate::types::ValueOps;
use crate::{QueryError, Result};
use common::tuple::{Schema, Type, Value};
use std::cmp::Ordering;

/// A scalar expression over the columns of one row.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Unresolved column name; `bind` turns it into `BoundColumn`.
    Column(String),
    /// Position in the relation schema.
    BoundColumn(usize),
    Literal(Value),
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
    UnaryOp {
        op: UnaryOperator,
        expr: Box<Expression>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    // Logical
    And,
    Or,
}

impl BinaryOperator {
    fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Add | BinaryOperator::Subtract | BinaryOperator::Multiply | BinaryOperator::Divide
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    IsNull,
    IsNotNull,
}

fn truth(value: bool) -> Value {
    Value::Integer(value as i32)
}

impl Expression {
    /// Binds column names to column indices based on a schema.
    pub fn bind(&self, schema: &Schema) -> Result<Expression> {
        match self {
            Expression::Column(name) => {
                let index = schema
                    .index_of(name)
                    .ok_or_else(|| QueryError::ColumnNotFound(name.clone()))?;
                Ok(Expression::BoundColumn(index))
            }
            Expression::BoundColumn(index) => {
                if *index >= schema.column_count() {
                    return Err(QueryError::ColumnNotFound(format!("#{}", index)));
                }
                Ok(self.clone())
            }
            Expression::Literal(_) => Ok(self.clone()),
            Expression::BinaryOp { left, op, right } => Ok(Expression::BinaryOp {
                left: Box::new(left.bind(schema)?),
                op: *op,
                right: Box::new(right.bind(schema)?),
            }),
            Expression::UnaryOp { op, expr } => Ok(Expression::UnaryOp {
                op: *op,
                expr: Box::new(expr.bind(schema)?),
            }),
        }
    }

    /// Marks every column this expression reads in `needed`.
    pub fn collect_columns(&self, needed: &mut [bool]) {
        match self {
            Expression::BoundColumn(index) => {
                if let Some(slot) = needed.get_mut(*index) {
                    *slot = true;
                }
            }
            Expression::Column(_) | Expression::Literal(_) => {}
            Expression::BinaryOp { left, right, .. } => {
                left.collect_columns(needed);
                right.collect_columns(needed);
            }
            Expression::UnaryOp { expr, .. } => expr.collect_columns(needed),
        }
    }

    /// The type of the values this expression produces. Comparisons and
    /// logical operators produce integer truth values.
    pub fn output_type(&self, schema: &Schema) -> Type {
        match self {
            Expression::BoundColumn(index) => schema
                .columns
                .get(*index)
                .map(|col| col.column_type)
                .unwrap_or(Type::Integer),
            Expression::Column(name) => schema
                .index_of(name)
                .map(|index| schema.columns[index].column_type)
                .unwrap_or(Type::Integer),
            Expression::Literal(Value::BigInt(_)) => Type::BigInt,
            Expression::Literal(Value::Varchar(s)) => Type::Varchar(s.len() as u32),
            Expression::Literal(_) => Type::Integer,
            Expression::BinaryOp { left, op, right } if op.is_arithmetic() => {
                match (left.output_type(schema), right.output_type(schema)) {
                    (Type::BigInt, _) | (_, Type::BigInt) => Type::BigInt,
                    _ => Type::Integer,
                }
            }
            Expression::BinaryOp { .. } | Expression::UnaryOp { .. } => Type::Integer,
        }
    }

    /// Computes the expression for one row. Column references must be bound.
    pub fn evaluate(&self, row: &[Value]) -> Result<Value> {
        match self {
            Expression::Column(name) => Err(QueryError::ExecutionError(format!(
                "column {} was never bound to a schema",
                name
            ))),
            Expression::BoundColumn(index) => row.get(*index).cloned().ok_or_else(|| {
                QueryError::ExecutionError(format!(
                    "row has {} values, no column #{}",
                    row.len(),
                    index
                ))
            }),
            Expression::Literal(value) => Ok(value.clone()),
            Expression::BinaryOp { left, op, right } => {
                apply_binary(*op, &left.evaluate(row)?, &right.evaluate(row)?)
            }
            Expression::UnaryOp { op, expr } => apply_unary(*op, &expr.evaluate(row)?),
        }
    }

    /// Evaluates the expression as a qualifier. Unknown (NULL) rejects the row.
    pub fn evaluate_predicate(&self, row: &[Value]) -> Result<bool> {
        Ok(self.evaluate(row)?.is_true())
    }

    fn binary(self, op: BinaryOperator, other: Expression) -> Expression {
        Expression::BinaryOp {
            left: Box::new(self),
            op,
            right: Box::new(other),
        }
    }

    fn unary(self, op: UnaryOperator) -> Expression {
        Expression::UnaryOp {
            op,
            expr: Box::new(self),
        }
    }

    pub fn eq(self, other: Expression) -> Expression {
        self.binary(BinaryOperator::Eq, other)
    }

    pub fn not_eq(self, other: Expression) -> Expression {
        self.binary(BinaryOperator::NotEq, other)
    }

    pub fn lt(self, other: Expression) -> Expression {
        self.binary(BinaryOperator::Lt, other)
    }

    pub fn lt_eq(self, other: Expression) -> Expression {
        self.binary(BinaryOperator::LtEq, other)
    }

    pub fn gt(self, other: Expression) -> Expression {
        self.binary(BinaryOperator::Gt, other)
    }

    pub fn gt_eq(self, other: Expression) -> Expression {
        self.binary(BinaryOperator::GtEq, other)
    }

    /// SQL `AND`: false beats unknown.
    pub fn and(self, other: Expression) -> Expression {
        self.binary(BinaryOperator::And, other)
    }

    /// SQL `OR`: true beats unknown.
    pub fn or(self, other: Expression) -> Expression {
        self.binary(BinaryOperator::Or, other)
    }

    pub fn add(self, other: Expression) -> Expression {
        self.binary(BinaryOperator::Add, other)
    }

    pub fn sub(self, other: Expression) -> Expression {
        self.binary(BinaryOperator::Subtract, other)
    }

    pub fn mul(self, other: Expression) -> Expression {
        self.binary(BinaryOperator::Multiply, other)
    }

    /// Division by zero is a type error rather than NULL.
    pub fn div(self, other: Expression) -> Expression {
        self.binary(BinaryOperator::Divide, other)
    }

    pub fn not(self) -> Expression {
        self.unary(UnaryOperator::Not)
    }

    pub fn is_null(self) -> Expression {
        self.unary(UnaryOperator::IsNull)
    }

    pub fn is_not_null(self) -> Expression {
        self.unary(UnaryOperator::IsNotNull)
    }
}

fn apply_binary(op: BinaryOperator, left: &Value, right: &Value) -> Result<Value> {
    use BinaryOperator::*;
    let compared = |accept: fn(Ordering) -> bool| match left.compare(right) {
        Some(ordering) => truth(accept(ordering)),
        None => Value::Null,
    };
    let arithmetic = |result: Option<Value>| {
        result.ok_or_else(|| {
            QueryError::TypeMismatch(format!("{:?} {:?} {:?} is undefined", left, op, right))
        })
    };
    match op {
        Add => arithmetic(left.add(right)),
        Subtract => arithmetic(left.subtract(right)),
        Multiply => arithmetic(left.multiply(right)),
        Divide => arithmetic(left.divide(right)),
        Eq => Ok(compared(|o| o == Ordering::Equal)),
        NotEq => Ok(compared(|o| o != Ordering::Equal)),
        Lt => Ok(compared(|o| o == Ordering::Less)),
        LtEq => Ok(compared(|o| o != Ordering::Greater)),
        Gt => Ok(compared(|o| o == Ordering::Greater)),
        GtEq => Ok(compared(|o| o != Ordering::Less)),
        And => {
            let is_false = |v: &Value| !v.is_null() && !v.is_true();
            if is_false(left) || is_false(right) {
                Ok(truth(false))
            } else if left.is_null() || right.is_null() {
                Ok(Value::Null)
            } else {
                Ok(truth(true))
            }
        }
        Or => {
            if left.is_true() || right.is_true() {
                Ok(truth(true))
            } else if left.is_null() || right.is_null() {
                Ok(Value::Null)
            } else {
                Ok(truth(false))
            }
        }
    }
}

fn apply_unary(op: UnaryOperator, value: &Value) -> Result<Value> {
    match (op, value) {
        (UnaryOperator::Not, Value::Null) => Ok(Value::Null),
        (UnaryOperator::Not, Value::Integer(_) | Value::BigInt(_)) => Ok(truth(!value.is_true())),
        (UnaryOperator::Not, _) => Err(QueryError::TypeMismatch(format!("NOT {:?}", value))),
        (UnaryOperator::IsNull, _) => Ok(truth(value.is_null())),
        (UnaryOperator::IsNotNull, _) => Ok(truth(!value.is_null())),
    }
}

pub fn col(name: &str) -> Expression {
    Expression::Column(name.to_string())
}

/// An `INTEGER` literal.
pub fn lit(value: i32) -> Expression {
    Expression::Literal(Value::Integer(value))
}

/// A `BIGINT` literal.
pub fn lit_big(value: i64) -> Expression {
    Expression::Literal(Value::BigInt(value))
}

pub fn lit_str(value: &str) -> Expression {
    Expression::Literal(Value::Varchar(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::tuple::Column;

    fn orders() -> Schema {
        Schema::new(vec![
            Column::new("order_id", Type::Integer),
            Column::new("region", Type::Varchar(16)),
            Column::new("amount", Type::BigInt),
        ])
    }

    #[test]
    fn test_bind_resolves_names() {
        let bound = col("amount").gt_eq(col("order_id")).bind(&orders()).unwrap();
        assert_eq!(
            bound,
            Expression::BoundColumn(2).gt_eq(Expression::BoundColumn(0))
        );

        assert!(matches!(col("customer").bind(&orders()), Err(QueryError::ColumnNotFound(_))));
        assert!(matches!(
            Expression::BoundColumn(3).bind(&orders()),
            Err(QueryError::ColumnNotFound(_))
        ));
        assert!(matches!(
            col("region").evaluate(&[]),
            Err(QueryError::ExecutionError(_))
        ));
    }

    #[test]
    fn test_comparisons_against_a_row() {
        let row = [Value::Integer(7), Value::Varchar("emea".to_string()), Value::Null];
        let schema = orders();
        let check = |expr: Expression| expr.bind(&schema).unwrap().evaluate(&row).unwrap();

        assert_eq!(check(col("order_id").eq(lit(7))), Value::Integer(1));
        assert_eq!(check(col("order_id").lt(lit(7))), Value::Integer(0));
        assert_eq!(check(col("region").not_eq(lit_str("apac"))), Value::Integer(1));
        // Anything compared with NULL is unknown.
        assert_eq!(check(col("amount").gt(lit_big(0))), Value::Null);
        assert!(!col("amount")
            .gt(lit_big(0))
            .bind(&schema)
            .unwrap()
            .evaluate_predicate(&row)
            .unwrap());
    }

    #[test]
    fn test_arithmetic_widens_and_checks() {
        let row = [Value::Integer(12), Value::Null, Value::BigInt(3)];

        let expr = Expression::BoundColumn(0).sub(lit(2));
        assert_eq!(expr.evaluate(&row).unwrap(), Value::Integer(10));

        let expr = Expression::BoundColumn(0).mul(Expression::BoundColumn(2));
        assert_eq!(expr.evaluate(&row).unwrap(), Value::BigInt(36));

        let expr = Expression::BoundColumn(2).div(lit(0));
        assert!(matches!(expr.evaluate(&row), Err(QueryError::TypeMismatch(_))));
        assert!(matches!(lit_str("x").not().evaluate(&row), Err(QueryError::TypeMismatch(_))));
    }

    #[test]
    fn test_three_valued_logic() {
        let row = [Value::Null];
        let unknown = || Expression::BoundColumn(0).gt(lit(1));
        let yes = || lit(1).eq(lit(1));
        let no = || lit(1).eq(lit(2));

        assert_eq!(unknown().and(no()).evaluate(&row).unwrap(), Value::Integer(0));
        assert_eq!(unknown().and(yes()).evaluate(&row).unwrap(), Value::Null);
        assert_eq!(unknown().or(yes()).evaluate(&row).unwrap(), Value::Integer(1));
        assert_eq!(unknown().or(no()).evaluate(&row).unwrap(), Value::Null);
        assert_eq!(unknown().not().evaluate(&row).unwrap(), Value::Null);
        assert_eq!(no().not().evaluate(&row).unwrap(), Value::Integer(1));
        assert_eq!(Expression::BoundColumn(0).is_null().evaluate(&row).unwrap(), Value::Integer(1));
        assert_eq!(
            Expression::BoundColumn(0).is_not_null().evaluate(&row).unwrap(),
            Value::Integer(0)
        );
    }

    #[test]
    fn test_collect_columns_walks_the_tree() {
        let expr = col("amount")
            .add(lit_big(1))
            .gt(col("order_id"))
            .and(lit(1).is_not_null())
            .bind(&orders())
            .unwrap();
        let mut needed = vec![false; 3];
        expr.collect_columns(&mut needed);
        assert_eq!(needed, vec![true, false, true]);

        // Unbound names mark nothing.
        let mut needed = vec![false; 3];
        col("region").collect_columns(&mut needed);
        assert_eq!(needed, vec![false; 3]);
    }

    #[test]
    fn test_output_type() {
        let schema = orders();
        assert_eq!(col("region").bind(&schema).unwrap().output_type(&schema), Type::Varchar(16));
        assert_eq!(col("order_id").add(col("amount")).output_type(&schema), Type::BigInt);
        assert_eq!(col("order_id").mul(lit(2)).output_type(&schema), Type::Integer);
        assert_eq!(col("order_id").gt(lit(3)).output_type(&schema), Type::Integer);
        assert_eq!(lit_str("abc").output_type(&schema), Type::Varchar(3));
    }
}
