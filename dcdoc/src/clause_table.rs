//! Flatten macOS clause trees into rows with one operator column per level.

use serde::Serialize;

use crate::model::{Clause, Property};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClauseRow {
    /// Operator columns; `-` where a level has nothing to show.
    pub cells: Vec<String>,
    pub property: Property,
}

/// Rows for `clauses`, whose operators occupy column `offset - 1`.
///
/// The operator is shown on every row of a level except the first row of
/// the table, so the column reads as "a, or b, or c". Rows of sub-clauses
/// follow their parent's own properties and leave the parent column as `-`.
pub fn generate_table_for_clauses(clauses: &[Clause], offset: usize) -> Vec<ClauseRow> {
    let offset = offset.max(1);
    let mut rows: Vec<ClauseRow> = Vec::new();
    for clause in clauses {
        for property in &clause.properties {
            let mut cells = vec!["-".to_string(); offset];
            cells[offset - 1] = if rows.is_empty() {
                String::new()
            } else {
                clause.clause_type.clone()
            };
            rows.push(ClauseRow {
                cells,
                property: property.clone(),
            });
        }
        rows.extend(generate_table_for_clauses(&clause.sub_clauses, offset + 1));
    }
    rows
}

/// Deepest level used by `rows`.
pub fn table_width(rows: &[ClauseRow]) -> usize {
    rows.iter().map(|row| row.cells.len()).max().unwrap_or(1)
}
