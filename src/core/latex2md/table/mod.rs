//! Table conversion: tabular-like environments to pipe tables.

mod parser;


pub use parser::{parse_preamble, parse_table_body, TableRow, TableSpec};

use paperdown_ir::{Atom, Document};

use super::markup::{line_breaks_as, math_spans};

/// Environments converted to pipe tables.
pub const TABLE_ENVIRONMENTS: &[&str] = &["tabular", "tabular*", "tabularx", "tabulary", "longtable"];

pub fn is_table_environment(name: &str) -> bool {
    TABLE_ENVIRONMENTS.contains(&name)
}

/// Parse a table environment body (everything between the begin and end markers).
pub fn parse_environment(env: &str, body: &str) -> TableSpec {
    let (columns, rows_start) = parse_preamble(env, body);
    parse_table_body(&body[rows_start..], columns)
}

/// Render a table: a blank line, then one line per row.
pub fn render_table(spec: &TableSpec, doc: &mut Document) -> String {
    let mut out = String::from("\n\n");
    for row in &spec.rows {
        match row {
            TableRow::Cells(cells) => {
                let cells: Vec<String> =
                    cells.iter().map(|cell| render_cell(cell, doc)).collect();
                out.push_str("| ");
                out.push_str(&cells.join(" | "));
                out.push_str(" |");
            }
            TableRow::Rule => out.push_str(&doc.insert(Atom::TableRule {
                columns: spec.columns,
            })),
        }
        out.push('\n');
    }
    log::trace!(
        "table with {} columns, {} rows, {} rules",
        spec.columns,
        spec.data_rows().count(),
        spec.rule_count()
    );
    out
}

/// A break left inside a cell (one nested in braces) becomes `<br>`, so a row
/// always stays on one line. Math is isolated first and keeps its `\\`.
fn render_cell(cell: &str, doc: &mut Document) -> String {
    let cell = math_spans(cell, doc);
    line_breaks_as(&cell, doc, Atom::markup("<br>"))
}
