//! Which columns a columnar scan has to read.

use crate::expression::Expression;

/// A per-column mask computed from the target list and the qualifiers of a
/// scan. At least one column is always needed; a scan that references no
/// column at all (`SELECT count(*)`) still reads column 0 to count rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnProjection {
    needed: Vec<bool>,
}

impl ColumnProjection {
    /// Marks the columns referenced by the bound `target_list` and then by the
    /// bound `quals`.
    pub fn for_scan(column_count: usize, target_list: &[Expression], quals: &[Expression]) -> Self {
        let mut needed = vec![false; column_count];
        get_needed_columns(target_list, &mut needed);
        get_needed_columns(quals, &mut needed);
        if !needed.iter().any(|n| *n) {
            if let Some(first) = needed.first_mut() {
                *first = true;
            }
        }
        Self { needed }
    }

    pub fn needed(&self) -> &[bool] {
        &self.needed
    }

    pub fn column_count(&self) -> usize {
        self.needed.len()
    }

    pub fn is_needed(&self, column: usize) -> bool {
        self.needed.get(column).copied().unwrap_or(false)
    }

    pub fn needed_count(&self) -> usize {
        self.needed.iter().filter(|n| **n).count()
    }
}

/// Marks every column referenced by `exprs` in `needed`.
pub fn get_needed_columns(exprs: &[Expression], needed: &mut [bool]) {
    for expr in exprs {
        expr.collect_columns(needed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::lit;

    #[test]
    fn test_target_list_column() {
        let projection = ColumnProjection::for_scan(5, &[Expression::BoundColumn(2)], &[]);
        assert_eq!(projection.needed(), &[false, false, true, false, false]);
        assert_eq!(projection.needed_count(), 1);
    }

    #[test]
    fn test_quals_add_columns() {
        let quals = [Expression::BoundColumn(4).gt(lit(3))];
        let projection = ColumnProjection::for_scan(5, &[Expression::BoundColumn(1)], &quals);
        assert_eq!(projection.needed(), &[false, true, false, false, true]);
    }

    #[test]
    fn test_no_references_need_column_zero() {
        let projection = ColumnProjection::for_scan(4, &[lit(1)], &[]);
        assert_eq!(projection.needed(), &[true, false, false, false]);
        assert!(projection.is_needed(0));
        assert!(!projection.is_needed(9));
    }
}
