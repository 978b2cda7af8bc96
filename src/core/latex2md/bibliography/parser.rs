//! Line-oriented BibTeX reader
//!
//! Records are read one line at a time: `@type{key,` opens a record, a line
//! starting with `}` closes it, and `name = value` lines add fields. A value
//! whose braces are still open at the end of its line continues on the next
//! lines until they balance.

use indexmap::IndexMap;
use serde::Serialize;

use crate::core::latex2md::{ConversionWarning, WarningKind};
use crate::data::symbols::decode_accents;

/// Entry types whose body is not a record.
const SKIPPED_TYPES: &[&str] = &["string", "preamble", "comment"];

/// Fields whose TeX accents are turned into Unicode.
const TEXT_FIELDS: &[&str] = &["author", "title", "editor", "booktitle"];

/// One bibliography record; fields keep their order in the file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BibEntry {
    pub entry_type: String,
    pub fields: IndexMap<String, String>,
}

impl BibEntry {
    pub fn new(entry_type: impl Into<String>) -> Self {
        Self {
            entry_type: entry_type.into(),
            fields: IndexMap::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Stand-in record for a key cited but found in no bibliography file.
    pub fn missing() -> Self {
        let mut entry = Self::new("missing");
        entry
            .fields
            .insert("error".to_string(), "missing from bibliography".to_string());
        entry
    }
}

/// Records by citation key, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BibDatabase {
    entries: IndexMap<String, BibEntry>,
}

impl BibDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&BibEntry> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BibEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Add the records of `other`. Keys already present are kept.
    pub fn merge(&mut self, other: BibDatabase) {
        for (key, entry) in other.entries {
            self.entries.entry(key).or_insert(entry);
        }
    }
}

enum State {
    Outside,
    Record(String),
    /// Inside `@string{...}` and friends, with the open brace depth.
    Skipping(i64),
}

/// Parse BibTeX source into a database, with warnings for lines that could
/// not be attributed to a record and for repeated keys (the later record wins).
pub fn parse_bibtex(text: &str) -> (BibDatabase, Vec<ConversionWarning>) {
    let mut db = BibDatabase::new();
    let mut warnings = Vec::new();
    let mut state = State::Outside;
    let mut lines = text.lines().enumerate();

    while let Some((idx, raw)) = lines.next() {
        let line = raw.trim();
        if let State::Skipping(depth) = state {
            let depth = depth + brace_balance(line);
            state = if depth > 0 {
                State::Skipping(depth)
            } else {
                State::Outside
            };
            continue;
        }
        if let Some(header) = line.strip_prefix('@') {
            let Some(open) = header.find(['{', '(']) else {
                warnings.push(parse_warning(idx, "entry without a body"));
                continue;
            };
            let entry_type = header[..open].trim().to_lowercase();
            if SKIPPED_TYPES.contains(&entry_type.as_str()) {
                let depth = brace_balance(line);
                state = if depth > 0 {
                    State::Skipping(depth)
                } else {
                    State::Outside
                };
                continue;
            }
            let body = &header[open + 1..];
            let key = body.split(',').next().unwrap_or("").trim();
            if key.is_empty() {
                warnings.push(parse_warning(idx, "record without a key"));
                state = State::Outside;
                continue;
            }
            if db.entries.contains_key(key) {
                warnings.push(
                    ConversionWarning::new(
                        WarningKind::DuplicateBibKey,
                        format!("key '{}' defined again on line {}; the later record is used", key, idx + 1),
                    )
                    .with_location(key.to_string()),
                );
            }
            db.entries.insert(key.to_string(), BibEntry::new(entry_type));
            state = State::Record(key.to_string());
            continue;
        }
        if line.starts_with('}') || line.starts_with(')') {
            state = State::Outside;
            continue;
        }
        let Some((name, value)) = line.split_once('=') else {
            continue;
        };
        let State::Record(ref key) = state else {
            warnings.push(parse_warning(idx, "field before any record"));
            continue;
        };

        let mut value = value.trim().to_string();
        let mut depth = brace_balance(&value);
        while depth > 0 || unclosed_quote(&value) {
            let Some((_, next)) = lines.next() else {
                warnings.push(parse_warning(idx, "field value never closed"));
                break;
            };
            let next = next.trim();
            depth += brace_balance(next);
            value.push(' ');
            value.push_str(next);
        }
        // `title = {x}}` closes the record on the field line
        let mut closes_record = false;
        while depth < 0 && value.ends_with('}') {
            value.pop();
            depth += 1;
            closes_record = true;
        }

        let name = name.trim().to_lowercase();
        let value = clean_value(&name, &value);
        if let Some(entry) = db.entries.get_mut(key) {
            entry.fields.insert(name, value);
        }
        if closes_record {
            state = State::Outside;
        }
    }

    (db, warnings)
}

fn parse_warning(idx: usize, message: &str) -> ConversionWarning {
    ConversionWarning::new(
        WarningKind::BibParse,
        format!("line {}: {}", idx + 1, message),
    )
}

/// Opened minus closed braces, ignoring escaped ones.
fn brace_balance(line: &str) -> i64 {
    let bytes = line.as_bytes();
    let mut balance = 0i64;
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'{' => balance += 1,
            b'}' => balance -= 1,
            _ => {}
        }
        i += 1;
    }
    balance
}

/// A `"`-delimited value still waiting for its closing quote.
fn unclosed_quote(value: &str) -> bool {
    value.starts_with('"') && value.matches('"').count() % 2 == 1
}

/// Strip delimiters and the trailing comma, decode accents in text fields,
/// and escape what Markdown or HTML would otherwise interpret.
fn clean_value(name: &str, raw: &str) -> String {
    let mut value = raw.trim();
    value = value.strip_suffix(',').unwrap_or(value).trim_end();
    if let Some(inner) = value.strip_prefix('{').and_then(|v| v.strip_suffix('}')) {
        value = inner;
    } else if let Some(inner) = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        value = inner;
    }
    let mut value = value.trim().to_string();
    if TEXT_FIELDS.contains(&name) {
        value = decode_accents(&value).replace(['{', '}'], "");
    }
    value
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\\', "\\\\")
}
