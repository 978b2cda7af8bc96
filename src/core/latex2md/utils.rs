//! Brace-aware scanning helpers shared by the conversion passes.
//!
//! All delimiters the scanners look for are ASCII, so scanning works on bytes
//! and every offset handed back is a valid char boundary.

use paperdown_ir::{Atom, Document, Segment, Segments};

/// A command invocation located by [`parse_command`]. Offsets are byte offsets
/// into the scanned text; `end` is one past the last consumed byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMatch {
    pub start: usize,
    pub end: usize,
    pub star: bool,
    pub optional: Vec<String>,
    pub args: Vec<String>,
}

impl CommandMatch {
    pub fn arg(&self, idx: usize) -> &str {
        self.args.get(idx).map(String::as_str).unwrap_or("")
    }
}

/// A group was opened but never closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unterminated;

/// True if `\name` starts at `pos` and is not the prefix of a longer command.
pub fn is_command_at(text: &str, pos: usize, name: &str) -> bool {
    let bytes = text.as_bytes();
    if bytes.get(pos) != Some(&b'\\') || !text[pos + 1..].starts_with(name) {
        return false;
    }
    let after = pos + 1 + name.len();
    let letter_name = name
        .as_bytes()
        .last()
        .map(|b| b.is_ascii_alphabetic())
        .unwrap_or(false);
    !(letter_name && bytes.get(after).map_or(false, |b| b.is_ascii_alphabetic()))
}

/// Name of the control word starting at `pos` (the backslash), if any.
pub fn command_name_at(text: &str, pos: usize) -> Option<&str> {
    let rest = text.get(pos..)?.strip_prefix('\\')?;
    let len = rest
        .bytes()
        .take_while(|b| b.is_ascii_alphabetic())
        .count();
    (len > 0).then(|| &rest[..len])
}

/// Skip the whitespace TeX allows between a command and its arguments:
/// spaces and tabs, and at most one line break.
pub fn skip_arg_space(text: &str, mut pos: usize) -> usize {
    let bytes = text.as_bytes();
    let mut newline_seen = false;
    while let Some(&b) = bytes.get(pos) {
        match b {
            b' ' | b'\t' | b'\r' => pos += 1,
            b'\n' if !newline_seen => {
                newline_seen = true;
                pos += 1;
            }
            _ => break,
        }
    }
    pos
}

/// Position of the delimiter closing the group opened at `open_pos`.
///
/// Braces nest; inside a bracket group braces are tracked too, so
/// `[a={]}]` closes at the last bracket. A backslash always escapes the next
/// byte, which keeps `\\}` from hiding a closing brace.
pub fn find_group_end(text: &str, open_pos: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let open = *bytes.get(open_pos)?;
    let close = match open {
        b'{' => b'}',
        b'[' => b']',
        _ => return None,
    };
    let mut depth = 0usize;
    let mut braces = 0usize;
    let mut i = open_pos;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\\' {
            i += 2;
            continue;
        }
        if open == b'[' {
            match b {
                b'{' => braces += 1,
                b'}' => braces = braces.saturating_sub(1),
                b'[' if braces == 0 => depth += 1,
                b']' if braces == 0 => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        } else if b == open {
            depth += 1;
        } else if b == close {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

/// Read a `{...}` or `[...]` group after optional argument whitespace.
///
/// Returns `(inner_start, inner_end, end)` where `end` is past the closing
/// delimiter, `Ok(None)` when no group of that kind follows.
pub fn read_group(
    text: &str,
    pos: usize,
    open: u8,
) -> Result<Option<(usize, usize, usize)>, Unterminated> {
    let p = skip_arg_space(text, pos);
    if text.as_bytes().get(p) != Some(&open) {
        return Ok(None);
    }
    match find_group_end(text, p) {
        Some(close) => Ok(Some((p + 1, close, close + 1))),
        None => Err(Unterminated),
    }
}

/// Parse `\name*[opt]...{arg}...` at `pos`.
///
/// Up to `optional_max` bracket groups are accepted before the `nargs`
/// mandatory brace groups. `Ok(None)` means the command is not at `pos` or a
/// mandatory group is missing.
pub fn parse_command(
    text: &str,
    pos: usize,
    name: &str,
    optional_max: usize,
    nargs: usize,
) -> Result<Option<CommandMatch>, Unterminated> {
    if !is_command_at(text, pos, name) {
        return Ok(None);
    }
    let mut p = pos + 1 + name.len();
    let star = text.as_bytes().get(p) == Some(&b'*');
    if star {
        p += 1;
    }
    let mut optional = Vec::new();
    while optional.len() < optional_max {
        match read_group(text, p, b'[')? {
            Some((s, e, end)) => {
                optional.push(text[s..e].to_string());
                p = end;
            }
            None => break,
        }
    }
    let mut args = Vec::with_capacity(nargs);
    for _ in 0..nargs {
        match read_group(text, p, b'{')? {
            Some((s, e, end)) => {
                args.push(text[s..e].to_string());
                p = end;
            }
            None => return Ok(None),
        }
    }
    Ok(Some(CommandMatch {
        start: pos,
        end: p,
        star,
        optional,
        args,
    }))
}

/// Rewrite every `\name` invocation in `text`.
///
/// Arguments are rewritten first, so nested invocations of the same command
/// are handled inside out. `render` returns the replacement, or `None` to keep
/// the invocation as written. Commands whose arguments never close are kept
/// and reported through `unterminated`.
pub fn rewrite_command<F>(
    text: &str,
    name: &str,
    optional_max: usize,
    nargs: usize,
    render: &mut F,
    unterminated: &mut usize,
) -> String
where
    F: FnMut(&CommandMatch) -> Option<String>,
{
    let needle = format!("\\{}", name);
    if !text.contains(&needle) {
        return text.to_string();
    }
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut last = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            i += 1;
            continue;
        }
        if bytes.get(i + 1) == Some(&b'\\') {
            i += 2;
            continue;
        }
        match parse_command(text, i, name, optional_max, nargs) {
            Ok(Some(mut m)) => {
                for arg in m.args.iter_mut() {
                    *arg = rewrite_command(arg, name, optional_max, nargs, render, unterminated);
                }
                for opt in m.optional.iter_mut() {
                    *opt = rewrite_command(opt, name, optional_max, nargs, render, unterminated);
                }
                if let Some(replacement) = render(&m) {
                    log::trace!("rewrote \\{} at byte {}", name, m.start);
                    out.push_str(&text[last..m.start]);
                    out.push_str(&replacement);
                    last = m.end;
                    i = m.end;
                    continue;
                }
            }
            Ok(None) => {}
            Err(Unterminated) => *unterminated += 1,
        }
        i += 1;
    }
    out.push_str(&text[last..]);
    out
}

/// Replace every occurrence of the control word `\name` (not its prefixes).
/// With `eat_spaces` the spaces and tabs after it go too, as TeX would do.
pub fn replace_command_word<F>(text: &str, name: &str, eat_spaces: bool, replacement: &mut F) -> String
where
    F: FnMut() -> String,
{
    let needle = format!("\\{}", name);
    if !text.contains(&needle) {
        return text.to_string();
    }
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut last = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] == b'\\' && bytes.get(i + 1) == Some(&b'\\') {
            i += 2;
            continue;
        }
        if is_command_at(text, i, name) {
            out.push_str(&text[last..i]);
            out.push_str(&replacement());
            let mut j = i + needle.len();
            while eat_spaces && bytes.get(j).map_or(false, |b| *b == b' ' || *b == b'\t') {
                j += 1;
            }
            last = j;
            i = j;
            continue;
        }
        i += 1;
    }
    out.push_str(&text[last..]);
    out
}

/// Split on `sep` at brace depth zero.
pub fn split_top_level(text: &str, sep: u8) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b if b == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&text[start.min(text.len())..]);
    parts
}

/// Comma-separated names from a command argument, trimmed, empties dropped.
pub fn split_names(arg: &str) -> Vec<String> {
    arg.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Math body as written: escapes go back to their LaTeX spelling, except
/// angle brackets, which stay entity-escaped for HTML output.
pub fn math_source(doc: &Document, text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for segment in Segments::new(text) {
        match segment {
            Segment::Text(t) => out.push_str(t),
            Segment::Atom(id) => match doc.atom(id) {
                Some(Atom::Escaped { source, .. }) if source != "<" && source != ">" => {
                    out.push_str(source)
                }
                Some(Atom::LineBreak) => out.push_str("\\\\"),
                _ => out.push_str(&id.to_string()),
            },
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_boundary_respects_letters() {
        assert!(is_command_at(r"\item x", 0, "item"));
        assert!(!is_command_at(r"\itemize", 0, "item"));
        assert!(is_command_at(r"\ex.", 0, "ex."));
        assert!(is_command_at(r"\section*{a}", 0, "section"));
    }

    #[test]
    fn group_end_handles_nesting() {
        let text = "{a{b}c}d";
        assert_eq!(find_group_end(text, 0), Some(6));
        assert_eq!(find_group_end("[x={]}]", 0), Some(6));
        assert_eq!(find_group_end("{open", 0), None);
    }

    #[test]
    fn parse_command_reads_optional_and_mandatory_args() {
        let text = r"\caption[short]{Long {nested} text} rest";
        let m = parse_command(text, 0, "caption", 1, 1).unwrap().unwrap();
        assert_eq!(m.optional, vec!["short"]);
        assert_eq!(m.arg(0), "Long {nested} text");
        assert_eq!(&text[m.end..], " rest");
    }

    #[test]
    fn parse_command_allows_single_newline_before_argument() {
        let m = parse_command("\\textbf\n{x}", 0, "textbf", 0, 1)
            .unwrap()
            .unwrap();
        assert_eq!(m.arg(0), "x");
        assert!(parse_command("\\textbf\n\n{x}", 0, "textbf", 0, 1)
            .unwrap()
            .is_none());
    }

    #[test]
    fn rewrite_handles_nested_same_command() {
        let mut unterminated = 0;
        let out = rewrite_command(
            r"\textbf{a \textbf{b} c}",
            "textbf",
            0,
            1,
            &mut |m| Some(format!("<{}>", m.arg(0))),
            &mut unterminated,
        );
        assert_eq!(out, "<a <b> c>");
        assert_eq!(unterminated, 0);
    }

    #[test]
    fn rewrite_reports_unterminated_argument() {
        let mut unterminated = 0;
        let out = rewrite_command(
            r"\emph{never closed",
            "emph",
            0,
            1,
            &mut |m| Some(m.arg(0).to_string()),
            &mut unterminated,
        );
        assert_eq!(out, r"\emph{never closed");
        assert_eq!(unterminated, 1);
    }

    #[test]
    fn rewrite_skips_escaped_backslash_pairs() {
        let mut n = 0;
        let out = rewrite_command(
            r"a\\emph{b}",
            "emph",
            0,
            1,
            &mut |m| Some(m.arg(0).to_string()),
            &mut n,
        );
        assert_eq!(out, r"a\\emph{b}");
    }

    #[test]
    fn split_top_level_ignores_nested_separators() {
        assert_eq!(split_top_level("a & {b & c} & d", b'&'), vec!["a ", " {b & c} ", " d"]);
    }

    #[test]
    fn math_source_keeps_entities_for_angle_brackets() {
        let mut doc = Document::new("");
        let lt = doc.insert(Atom::escaped("<", "&lt;"));
        let brace = doc.insert(Atom::escaped("\\{", "{"));
        let text = format!("a {} b {}x", lt, brace);
        assert_eq!(math_source(&doc, &text), format!("a {} b \\{{x", lt));
    }

    #[test]
    fn replace_word_eats_following_spaces() {
        let out = replace_command_word(r"\noindent Text \noindentx", "noindent", true, &mut String::new);
        assert_eq!(out, r"Text \noindentx");
        let out = replace_command_word(r"\today, \\today", "today", false, &mut || "D".to_string());
        assert_eq!(out, r"D, \\today");
    }
}
