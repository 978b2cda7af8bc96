//! Tabular body parser
//!
//! Splits a tabular body into rows and cells and works out where the single
//! header divider of the Markdown table goes.

use paperdown_ir::parse_placeholder;

use crate::core::latex2md::utils::{
    find_group_end, is_command_at, parse_command, read_group, split_top_level,
};

/// Rule commands that mark a full-width horizontal line
const RULE_COMMANDS: &[&str] = &["toprule", "midrule", "bottomrule", "hline"];

/// Partial rules and spacing commands that are dropped without effect.
/// Each entry is (name, leading parenthesized trim spec allowed, brace args)
const DROPPED_COMMANDS: &[(&str, bool, usize)] = &[
    ("cline", false, 1),
    ("cmidrule", true, 1),
    ("addlinespace", false, 0),
    ("morecmidrules", false, 0),
    ("endhead", false, 0),
    ("endfirsthead", false, 0),
    ("endfoot", false, 0),
    ("endlastfoot", false, 0),
];

/// One output line of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableRow {
    Cells(Vec<String>),
    /// The header/body divider.
    Rule,
}

/// A parsed table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub columns: usize,
    pub rows: Vec<TableRow>,
}

impl TableSpec {
    pub fn data_rows(&self) -> impl Iterator<Item = &Vec<String>> {
        self.rows.iter().filter_map(|row| match row {
            TableRow::Cells(cells) => Some(cells),
            TableRow::Rule => None,
        })
    }

    pub fn rule_count(&self) -> usize {
        self.rows.iter().filter(|r| **r == TableRow::Rule).count()
    }
}

/// Parser state for one table.
///
/// The rule template is consumed by the first rule marker. A marker seen
/// before any data row is deferred until the first row has been emitted, so
/// the divider always sits under a header row.
pub struct TableGridParser {
    columns: usize,
    rows: Vec<TableRow>,
    rule_consumed: bool,
    rule_pending: bool,
}

impl TableGridParser {
    pub fn new(columns: usize) -> Self {
        TableGridParser {
            columns,
            rows: Vec::new(),
            rule_consumed: false,
            rule_pending: false,
        }
    }

    /// Register a full horizontal rule.
    pub fn add_rule(&mut self) {
        if self.rule_consumed {
            return;
        }
        self.rule_consumed = true;
        if self.rows.is_empty() {
            self.rule_pending = true;
        } else {
            self.rows.push(TableRow::Rule);
        }
    }

    /// Add one row of cells; rows without any content are dropped.
    pub fn process_row(&mut self, cells: Vec<String>) {
        if cells.iter().all(|c| c.trim().is_empty()) {
            return;
        }
        self.rows.push(TableRow::Cells(cells));
        if self.rule_pending {
            self.rule_pending = false;
            self.rows.push(TableRow::Rule);
        }
    }

    pub fn finalize(self) -> TableSpec {
        TableSpec {
            columns: self.columns,
            rows: self.rows,
        }
    }
}

/// Split the body of a tabular-like environment (after the column
/// specification) into a [`TableSpec`].
pub fn parse_table_body(body: &str, columns: usize) -> TableSpec {
    let mut parser = TableGridParser::new(columns);
    for chunk in split_rows(body) {
        let (rules, rest) = take_rules(chunk);
        for _ in 0..rules {
            parser.add_rule();
        }
        let cells = split_top_level(&rest, b'&')
            .into_iter()
            .flat_map(expand_cell)
            .collect();
        parser.process_row(cells);
    }
    parser.finalize()
}

/// Split a body on top-level row separators: `\\` (with an optional
/// `[spacing]`) and `\tabularnewline`.
pub fn split_rows(body: &str) -> Vec<&str> {
    let bytes = body.as_bytes();
    let mut rows = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b'\\' if depth == 0 => {
                let sep_end = if bytes.get(i + 1) == Some(&b'\\') {
                    Some(i + 2)
                } else if is_command_at(body, i, "tabularnewline") {
                    Some(i + 15)
                } else {
                    None
                };
                if let Some(mut end) = sep_end {
                    rows.push(&body[start..i]);
                    if let Ok(Some((_, _, after))) = read_group(body, end, b'[') {
                        end = after;
                    }
                    start = end;
                    i = end;
                    continue;
                }
                i += 2;
                continue;
            }
            b'\\' => {
                i += 2;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    if start < body.len() {
        rows.push(&body[start..]);
    }
    rows
}

/// Remove rule and dropped commands from a row chunk, counting full rules.
fn take_rules(chunk: &str) -> (usize, String) {
    let bytes = chunk.as_bytes();
    let mut rules = 0usize;
    let mut out = String::with_capacity(chunk.len());
    let mut last = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            i += 1;
            continue;
        }
        if let Some(name) = RULE_COMMANDS.iter().find(|n| is_command_at(chunk, i, n)) {
            out.push_str(&chunk[last..i]);
            rules += 1;
            let mut end = i + 1 + name.len();
            // booktabs rules take an optional thickness
            if let Ok(Some((_, _, after))) = read_group(chunk, end, b'[') {
                end = after;
            }
            last = end;
            i = end;
            continue;
        }
        if let Some(end) = dropped_command_end(chunk, i) {
            out.push_str(&chunk[last..i]);
            last = end;
            i = end;
            continue;
        }
        i += 2;
    }
    out.push_str(&chunk[last.min(chunk.len())..]);
    (rules, out)
}

fn dropped_command_end(chunk: &str, pos: usize) -> Option<usize> {
    let (name, trim, nargs) = DROPPED_COMMANDS
        .iter()
        .find(|(name, _, _)| is_command_at(chunk, pos, name))?;
    let bytes = chunk.as_bytes();
    let mut end = pos + 1 + name.len();
    if let Ok(Some((_, _, after))) = read_group(chunk, end, b'[') {
        end = after;
    }
    if *trim && bytes.get(end) == Some(&b'(') {
        end = chunk[end..].find(')').map(|off| end + off + 1)?;
    }
    for _ in 0..*nargs {
        match read_group(chunk, end, b'{') {
            Ok(Some((_, _, after))) => end = after,
            _ => return None,
        }
    }
    Some(end)
}

/// One raw cell becomes one or more output cells.
fn expand_cell(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if let Ok(Some(m)) = parse_command(trimmed, 0, "multicolumn", 0, 3) {
        if trimmed[m.end..].trim().is_empty() {
            let span = m.arg(0).trim().parse::<usize>().unwrap_or(1).max(1);
            let mut cells = vec![clean_cell(m.arg(2))];
            cells.extend(std::iter::repeat(String::new()).take(span - 1));
            return cells;
        }
    }
    if let Ok(Some(m)) = parse_command(trimmed, 0, "multirow", 1, 3) {
        if trimmed[m.end..].trim().is_empty() {
            return vec![clean_cell(m.arg(2))];
        }
    }
    vec![clean_cell(trimmed)]
}

/// Cell text on one line.
fn clean_cell(cell: &str) -> String {
    cell.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip the arguments that precede the rows of a tabular-like environment
/// and count the columns of its specification.
///
/// Returns the column count and the offset where the rows start.
pub fn parse_preamble(env: &str, body: &str) -> (usize, usize) {
    let mut pos = 0usize;
    if let Ok(Some((_, _, after))) = read_group(body, pos, b'[') {
        pos = after;
    }
    if matches!(env, "tabular*" | "tabularx" | "tabulary") {
        if let Ok(Some((_, _, after))) = read_group(body, pos, b'{') {
            pos = after;
        }
    }
    match read_group(body, pos, b'{') {
        Ok(Some((s, e, after))) => (count_columns(&body[s..e]), after),
        _ => (0, pos),
    }
}

/// Number of columns declared by a column specification.
///
/// Alignment letters are counted at brace depth zero; brace groups (widths,
/// `@{}` and `>{}` decorations) are skipped and `*{n}{spec}` repeats `spec`.
pub fn count_columns(spec: &str) -> usize {
    let bytes = spec.as_bytes();
    let mut count = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        if spec.is_char_boundary(i) {
            if let Some((_, len)) = parse_placeholder(&spec[i..]) {
                i += len;
                continue;
            }
        }
        match bytes[i] {
            b'l' | b'c' | b'r' | b'X' => count += 1,
            b'p' | b'm' | b'b' => count += 1,
            b'*' => {
                if let Some((n, inner, end)) = repetition(spec, i + 1) {
                    count += n * count_columns(inner);
                    i = end;
                    continue;
                }
            }
            b'{' => {
                if let Some(close) = find_group_end(spec, i) {
                    i = close + 1;
                    continue;
                }
            }
            b'\\' => {
                i += 2;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    count
}

fn repetition(spec: &str, pos: usize) -> Option<(usize, &str, usize)> {
    let (s1, e1, after1) = read_group(spec, pos, b'{').ok()??;
    let n = spec[s1..e1].trim().parse::<usize>().ok()?;
    let (s2, e2, after2) = read_group(spec, after1, b'{').ok()??;
    Some((n, &spec[s2..e2], after2))
}
