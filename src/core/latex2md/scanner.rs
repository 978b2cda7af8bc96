//! Recursive-descent scanner for `\begin{name}` / `\end{name}` spans.
//!
//! Environments are matched by name and nesting depth, so a nested
//! environment of the same name closes at its own `\end`.

use super::utils::is_command_at;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Begin,
    End,
}

/// One `\begin{name}` or `\end{name}` marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvMarker {
    pub kind: MarkerKind,
    pub name: String,
    /// Offset of the backslash.
    pub start: usize,
    /// Offset past the closing brace of the name.
    pub end: usize,
}

/// Next begin or end marker at or after `from`.
pub fn next_marker(text: &str, from: usize) -> Option<EnvMarker> {
    let bytes = text.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            i += 1;
            continue;
        }
        if bytes.get(i + 1) == Some(&b'\\') {
            i += 2;
            continue;
        }
        let kind = if is_command_at(text, i, "begin") {
            Some((MarkerKind::Begin, i + 6))
        } else if is_command_at(text, i, "end") {
            Some((MarkerKind::End, i + 4))
        } else {
            None
        };
        if let Some((kind, after)) = kind {
            if let Some((name, end)) = marker_name(text, after) {
                return Some(EnvMarker {
                    kind,
                    name: name.to_string(),
                    start: i,
                    end,
                });
            }
        }
        i += 1;
    }
    None
}

fn marker_name(text: &str, pos: usize) -> Option<(&str, usize)> {
    let rest = text.get(pos..)?;
    let trimmed = rest.trim_start_matches([' ', '\t']);
    let open = pos + (rest.len() - trimmed.len());
    let inner = trimmed.strip_prefix('{')?;
    let close = inner.find('}')?;
    let name = inner[..close].trim();
    if name.is_empty() || name.contains(['{', '\\', '\n']) {
        return None;
    }
    Some((name, open + 1 + close + 1))
}

/// Find the `\end{name}` closing a `\begin{name}` whose body starts at
/// `body_start`. Returns the end marker.
pub fn find_matching_end(text: &str, name: &str, body_start: usize) -> Option<EnvMarker> {
    let mut depth = 1usize;
    let mut pos = body_start;
    while let Some(marker) = next_marker(text, pos) {
        pos = marker.end;
        if marker.name != name {
            continue;
        }
        match marker.kind {
            MarkerKind::Begin => depth += 1,
            MarkerKind::End => {
                depth -= 1;
                if depth == 0 {
                    return Some(marker);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_marker_names() {
        let text = r"x \begin{itemize} y \end {itemize}";
        let first = next_marker(text, 0).unwrap();
        assert_eq!(first.kind, MarkerKind::Begin);
        assert_eq!(first.name, "itemize");
        let second = next_marker(text, first.end).unwrap();
        assert_eq!(second.kind, MarkerKind::End);
        assert_eq!(second.end, text.len());
    }

    #[test]
    fn nested_same_name_environments_match_correctly() {
        let text = r"\begin{a}1\begin{a}2\end{a}3\end{a}tail";
        let begin = next_marker(text, 0).unwrap();
        let end = find_matching_end(text, "a", begin.end).unwrap();
        assert_eq!(&text[begin.end..end.start], r"1\begin{a}2\end{a}3");
        assert_eq!(&text[end.end..], "tail");
    }

    #[test]
    fn unclosed_environment_has_no_end() {
        let text = r"\begin{a} open \begin{a}x\end{a}";
        let begin = next_marker(text, 0).unwrap();
        assert!(find_matching_end(text, "a", begin.end).is_none());
    }

    #[test]
    fn starred_names_are_distinct() {
        let text = r"\begin{figure*}a\end{figure*}";
        let begin = next_marker(text, 0).unwrap();
        assert_eq!(begin.name, "figure*");
        assert!(find_matching_end(text, "figure", begin.end).is_none());
        assert!(find_matching_end(text, "figure*", begin.end).is_some());
    }
}
