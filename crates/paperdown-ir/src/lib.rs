//! Semantic intermediate representation for document conversion.
//!
//! A [`Document`] is a text buffer plus an append-only arena of typed
//! [`Atom`]s. Passes that produce final markup store it as an atom and leave a
//! placeholder in the text; later passes only ever see the placeholder, so the
//! content behind it cannot be reinterpreted. Placeholders are built from two
//! reserved private-use code points which the preprocessor removes from the
//! input, so they never collide with document text.

use std::fmt;

/// Opens an atom placeholder.
pub const ATOM_OPEN: char = '\u{E000}';
/// Closes an atom placeholder.
pub const ATOM_CLOSE: char = '\u{E001}';

/// Returns true for characters that may not appear in document text.
pub fn is_reserved(ch: char) -> bool {
    ch == ATOM_OPEN || ch == ATOM_CLOSE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AtomId(pub usize);

impl fmt::Display for AtomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", ATOM_OPEN, self.0, ATOM_CLOSE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Atom {
    /// A character escaped in the source (`\%`, `\&`, `<`, ...).
    Escaped { source: String, rendered: String },
    LineBreak,
    ParagraphBreak,
    /// Inert HTML comment, rendered as `<!-- text -->`.
    Comment(String),
    /// Named anchor for a label declaration.
    Anchor(String),
    /// In-document link to `#target`.
    Link { text: String, target: String },
    InlineCode(String),
    CodeBlock(CodeBlock),
    /// Inline math span, body kept as written.
    Math(String),
    /// Display math block, body kept as written.
    DisplayMath(String),
    /// Header/body divider of a table.
    TableRule { columns: usize },
    /// Final markup emitted unchanged.
    Markup(String),
}

impl Atom {
    pub fn escaped(source: impl Into<String>, rendered: impl Into<String>) -> Self {
        Atom::Escaped {
            source: source.into(),
            rendered: rendered.into(),
        }
    }

    pub fn comment(text: impl Into<String>) -> Self {
        Atom::Comment(text.into())
    }

    pub fn markup(text: impl Into<String>) -> Self {
        Atom::Markup(text.into())
    }

    pub fn link(text: impl Into<String>, target: impl Into<String>) -> Self {
        Atom::Link {
            text: text.into(),
            target: target.into(),
        }
    }

    /// Block-level atoms start a Markdown block when they open a line.
    pub fn is_block_marker(&self) -> bool {
        matches!(self, Atom::Comment(_) | Atom::Markup(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub lang: Option<String>,
    pub body: String,
}

/// Working value threaded through the conversion passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    text: String,
    atoms: Vec<Atom>,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            atoms: Vec::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn atom(&self, id: AtomId) -> Option<&Atom> {
        self.atoms.get(id.0)
    }

    /// Store an atom and return the placeholder that refers to it.
    pub fn insert(&mut self, atom: Atom) -> String {
        let id = AtomId(self.atoms.len());
        self.atoms.push(atom);
        id.to_string()
    }

    /// Rebuild the document around a rewritten text buffer.
    pub fn with_text(self, text: String) -> Self {
        Self {
            text,
            atoms: self.atoms,
        }
    }

    pub fn into_parts(self) -> (String, Vec<Atom>) {
        (self.text, self.atoms)
    }

    pub fn segments(&self) -> Segments<'_> {
        Segments::new(&self.text)
    }

    /// Atom referenced by a placeholder at the start of `text`, if any.
    pub fn leading_atom(&self, text: &str) -> Option<&Atom> {
        parse_placeholder(text).and_then(|(id, _)| self.atom(id))
    }

    /// Undo escaping inside `text`: escaped atoms are replaced by the source
    /// characters they came from. Used for content taken literally, such as
    /// inline verbatim and URLs.
    pub fn source_of(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for segment in Segments::new(text) {
            match segment {
                Segment::Text(t) => out.push_str(t),
                Segment::Atom(id) => match self.atom(id) {
                    Some(Atom::Escaped { source, .. }) => out.push_str(source),
                    Some(Atom::LineBreak) => out.push_str("\\\\"),
                    _ => out.push_str(&id.to_string()),
                },
            }
        }
        out
    }
}

/// Parse a placeholder at the start of `text`, returning its id and byte length.
pub fn parse_placeholder(text: &str) -> Option<(AtomId, usize)> {
    let rest = text.strip_prefix(ATOM_OPEN)?;
    let end = rest.find(ATOM_CLOSE)?;
    let digits = &rest[..end];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let id = digits.parse().ok()?;
    Some((
        AtomId(id),
        ATOM_OPEN.len_utf8() + end + ATOM_CLOSE.len_utf8(),
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Atom(AtomId),
}

/// Splits a buffer into text runs and atom placeholders.
pub struct Segments<'a> {
    rest: &'a str,
}

impl<'a> Segments<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { rest: text }
    }
}

impl<'a> Iterator for Segments<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        if let Some((id, len)) = parse_placeholder(self.rest) {
            self.rest = &self.rest[len..];
            return Some(Segment::Atom(id));
        }
        // A stray ATOM_OPEN that does not form a placeholder is plain text.
        let skip = if self.rest.starts_with(ATOM_OPEN) {
            ATOM_OPEN.len_utf8()
        } else {
            0
        };
        let end = self.rest[skip..]
            .find(ATOM_OPEN)
            .map(|i| i + skip)
            .unwrap_or(self.rest.len());
        let (text, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(Segment::Text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_returns_parseable_placeholder() {
        let mut doc = Document::new("");
        let first = doc.insert(Atom::LineBreak);
        let second = doc.insert(Atom::comment("x"));
        assert_eq!(parse_placeholder(&first).map(|(id, _)| id), Some(AtomId(0)));
        let (id, len) = parse_placeholder(&second).unwrap();
        assert_eq!(id, AtomId(1));
        assert_eq!(len, second.len());
    }

    #[test]
    fn segments_split_text_and_atoms() {
        let mut doc = Document::new("");
        let p = doc.insert(Atom::LineBreak);
        let text = format!("a{}b", p);
        let segments: Vec<_> = Segments::new(&text).collect();
        assert_eq!(
            segments,
            vec![
                Segment::Text("a"),
                Segment::Atom(AtomId(0)),
                Segment::Text("b")
            ]
        );
    }

    #[test]
    fn malformed_placeholder_is_text() {
        let text = format!("{}x{}", ATOM_OPEN, ATOM_CLOSE);
        let segments: Vec<_> = Segments::new(&text).collect();
        assert_eq!(segments, vec![Segment::Text(&text)]);
    }

    #[test]
    fn source_of_restores_escapes() {
        let mut doc = Document::new("");
        let lt = doc.insert(Atom::escaped("<", "&lt;"));
        assert_eq!(doc.source_of(&format!("a{}b", lt)), "a<b");
    }
}
