//! Comment stripping and escaping of characters reserved in the output.

use paperdown_ir::{is_reserved, Atom, Document};

use super::context::PassContext;
use super::utils::{find_group_end, is_command_at};
use super::{ConversionWarning, WarningKind};
use crate::utils::error::ConversionResult;

/// Environments whose lines are copied without comment stripping or escaping.
pub(crate) const RAW_ENVIRONMENTS: &[&str] = &[
    "verbatim",
    "verbatim*",
    "Verbatim",
    "lstlisting",
    "minted",
];

pub fn run(doc: Document, ctx: &mut PassContext<'_>) -> ConversionResult<Document> {
    let (input, atoms) = doc.into_parts();
    debug_assert!(atoms.is_empty());

    let mut removed = 0usize;
    let cleaned: String = input
        .replace("\r\n", "\n")
        .chars()
        .filter(|&ch| {
            let reserved = is_reserved(ch);
            removed += reserved as usize;
            !reserved
        })
        .collect();
    if removed > 0 {
        ctx.warn(ConversionWarning::new(
            WarningKind::ReservedCharacter,
            format!("removed {} reserved private-use character(s) from the input", removed),
        ));
    }

    let mut doc = Document::new(String::new());
    let text = preprocess_text(&cleaned, &mut doc);
    Ok(doc.with_text(text))
}

/// Strip comments line by line and turn escaped characters into atoms.
fn preprocess_text(input: &str, doc: &mut Document) -> String {
    let mut out = String::with_capacity(input.len());
    let mut raw_env: Option<&'static str> = None;
    let mut lines = input.split('\n').peekable();
    while let Some(line) = lines.next() {
        let mut rest = line;
        let mut commented = false;
        while !rest.is_empty() {
            if let Some(env) = raw_env {
                let marker = format!("\\end{{{}}}", env);
                match rest.find(&marker) {
                    Some(idx) => {
                        let end = idx + marker.len();
                        out.push_str(&rest[..end]);
                        rest = &rest[end..];
                        raw_env = None;
                    }
                    None => {
                        out.push_str(rest);
                        rest = "";
                    }
                }
                continue;
            }
            let (consumed, state) = process_segment(rest, doc, &mut out);
            rest = &rest[consumed..];
            match state {
                SegmentEnd::Line => break,
                SegmentEnd::Comment => {
                    commented = true;
                    break;
                }
                SegmentEnd::RawEnvironment(env) => raw_env = Some(env),
            }
        }
        if lines.peek().is_some() && !commented {
            out.push('\n');
        }
    }
    out
}

enum SegmentEnd {
    Line,
    Comment,
    RawEnvironment(&'static str),
}

/// Process `line` up to its end, a comment, or the start of a raw
/// environment (whose begin marker is copied). Returns the bytes consumed.
fn process_segment(line: &str, doc: &mut Document, out: &mut String) -> (usize, SegmentEnd) {
    let bytes = line.as_bytes();
    let mut last = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                out.push_str(&line[last..i]);
                return (line.len(), SegmentEnd::Comment);
            }
            b'<' | b'>' => {
                out.push_str(&line[last..i]);
                let (src, entity) = if bytes[i] == b'<' { ("<", "&lt;") } else { (">", "&gt;") };
                out.push_str(&doc.insert(Atom::escaped(src, entity)));
                i += 1;
                last = i;
            }
            b'\\' => {
                let next = bytes.get(i + 1).copied();
                if next == Some(b'\\') {
                    i += 2;
                    continue;
                }
                if let Some(rendered) = next.and_then(escaped_rendering) {
                    out.push_str(&line[last..i]);
                    let source = &line[i..i + 2];
                    out.push_str(&doc.insert(Atom::escaped(source, rendered)));
                    i += 2;
                    last = i;
                    continue;
                }
                if let Some(end) = inline_verbatim_end(line, i) {
                    // copied untouched, isolated into inline code next
                    i = end;
                    continue;
                }
                if is_command_at(line, i, "begin") {
                    if let Some(env) = RAW_ENVIRONMENTS
                        .iter()
                        .copied()
                        .find(|env| line[i + 6..].starts_with(&format!("{{{}}}", env)))
                    {
                        let end = i + 6 + env.len() + 2;
                        out.push_str(&line[last..end]);
                        return (end, SegmentEnd::RawEnvironment(env));
                    }
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    out.push_str(&line[last..]);
    (line.len(), SegmentEnd::Line)
}

fn escaped_rendering(ch: u8) -> Option<&'static str> {
    match ch {
        b'%' => Some("%"),
        b'&' => Some("&"),
        b'$' => Some("$"),
        b'#' => Some("\\#"),
        b'_' => Some("\\_"),
        b'{' => Some("{"),
        b'}' => Some("}"),
        _ => None,
    }
}

/// End offset of a `\verb|...|` or `\lstinline` closed on the same line.
pub(crate) fn inline_verbatim_end(line: &str, pos: usize) -> Option<usize> {
    let name_len = if is_command_at(line, pos, "verb") {
        5
    } else if is_command_at(line, pos, "lstinline") {
        10
    } else {
        return None;
    };
    let bytes = line.as_bytes();
    let mut j = pos + name_len;
    if bytes.get(j) == Some(&b'*') {
        j += 1;
    }
    if bytes.get(j) == Some(&b'[') && name_len == 10 {
        j = find_group_end(line, j)? + 1;
    }
    let delim = *bytes.get(j)?;
    if delim == b'{' {
        return find_group_end(line, j).map(|close| close + 1);
    }
    if delim.is_ascii_alphabetic() || delim.is_ascii_whitespace() || !delim.is_ascii() {
        return None;
    }
    line[j + 1..].find(delim as char).map(|off| j + 1 + off + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperdown_markdown_backend::{render_document, MarkdownRenderOptions};
    use pretty_assertions::assert_eq;

    fn preprocess(input: &str) -> (String, Document) {
        let mut doc = Document::new(String::new());
        let text = preprocess_text(input, &mut doc);
        let doc = doc.with_text(text.clone());
        (text, doc)
    }

    fn rendered(input: &str) -> String {
        let (_, doc) = preprocess(input);
        render_document(&doc, &MarkdownRenderOptions::default())
    }

    #[test]
    fn comment_truncates_line_and_joins_next() {
        assert_eq!(rendered("foo% note\nbar\n"), "foobar\n");
        assert_eq!(rendered("a\n% whole line\nb"), "a\nb");
    }

    #[test]
    fn escaped_percent_survives() {
        assert_eq!(rendered("50\\% done % comment\nnext"), "50% done next");
    }

    #[test]
    fn line_break_before_comment() {
        let (text, _) = preprocess("a\\\\% c\nb");
        assert_eq!(text, "a\\\\b");
    }

    #[test]
    fn angle_brackets_become_entities() {
        assert_eq!(rendered("a < b > c"), "a &lt; b &gt; c");
    }

    #[test]
    fn escaped_ampersand_is_an_atom() {
        let (text, doc) = preprocess("R\\&D");
        assert!(!text.contains('&'));
        assert_eq!(render_document(&doc, &MarkdownRenderOptions::default()), "R&D");
    }

    #[test]
    fn verbatim_lines_are_untouched() {
        let input = "x % gone\n\\begin{verbatim}\n50% <b>\n\\end{verbatim} after % gone\n";
        let (text, _) = preprocess(input);
        assert_eq!(text, "x \\begin{verbatim}\n50% <b>\n\\end{verbatim} after ");
    }

    #[test]
    fn inline_verb_is_copied() {
        let (text, _) = preprocess("see \\verb|50%| here % c");
        assert_eq!(text, "see \\verb|50%| here ");
    }

    #[test]
    fn reserved_characters_are_removed() {
        let options = crate::core::latex2md::L2MOptions::default();
        let resolver = crate::utils::files::NoopFileResolver;
        let mut ctx = PassContext::new(&options, &resolver);
        let doc = run(Document::new("a\u{E000}1\u{E001}b"), &mut ctx).unwrap();
        assert_eq!(doc.text(), "a1b");
        assert_eq!(ctx.warnings()[0].kind, WarningKind::ReservedCharacter);
    }
}
