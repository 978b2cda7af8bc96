//! Environment transforms: verbatim isolation, tables, lists and the static
//! table of generic block environments.

use paperdown_ir::{Atom, CodeBlock, Document};

use super::context::PassContext;
use super::preprocess::inline_verbatim_end;
use super::scanner::{find_matching_end, next_marker, MarkerKind};
use super::table;
use super::utils::{find_group_end, is_command_at, math_source, read_group};
use super::{ConversionWarning, WarningKind};
use crate::utils::error::ConversionResult;

// =============================================================================
// Verbatim isolation
// =============================================================================

/// Environments whose body becomes a fenced code block.
const CODE_ENVIRONMENTS: &[&str] = &[
    "verbatim",
    "verbatim*",
    "Verbatim",
    "lstlisting",
    "minted",
    "tikzpicture",
];

/// Turn code environments and inline verbatim into code atoms, so no later
/// pass sees their content.
pub fn isolate_verbatim(mut doc: Document, ctx: &mut PassContext<'_>) -> ConversionResult<Document> {
    let text = doc.text().to_string();
    let text = isolate_code_environments(&text, &mut doc, ctx);
    let text = isolate_inline_verbatim(&text, &mut doc);
    Ok(doc.with_text(text))
}

fn isolate_code_environments(text: &str, doc: &mut Document, ctx: &mut PassContext<'_>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pos = 0usize;
    let mut from = 0usize;
    while let Some(marker) = next_marker(text, from) {
        from = marker.end;
        let name = marker.name.as_str();
        if marker.kind != MarkerKind::Begin || !CODE_ENVIRONMENTS.contains(&name) {
            continue;
        }
        // code bodies do not nest: the first end marker closes them
        let end_marker = format!("\\end{{{}}}", name);
        let Some(end_off) = text[marker.end..].find(&end_marker) else {
            ctx.warn(
                ConversionWarning::new(
                    WarningKind::UnbalancedEnvironment,
                    "code environment is never closed; left as written",
                )
                .with_location(format!("\\begin{{{}}}", name)),
            );
            continue;
        };
        let body_end = marker.end + end_off;
        let (lang, body_start) = code_language(name, text, marker.end);
        let body = if name == "tikzpicture" {
            doc.source_of(&text[marker.start..body_end + end_marker.len()])
        } else {
            doc.source_of(&text[body_start..body_end])
        };
        out.push_str(&text[pos..marker.start]);
        out.push_str(&doc.insert(Atom::CodeBlock(CodeBlock { lang, body })));
        pos = body_end + end_marker.len();
        from = pos;
    }
    out.push_str(&text[pos..]);
    out
}

/// Language of a code environment and the offset where its body starts.
fn code_language(name: &str, text: &str, after_begin: usize) -> (Option<String>, usize) {
    match name {
        "tikzpicture" => (Some("latex".to_string()), after_begin),
        "lstlisting" | "Verbatim" => match bracket_on_same_line(text, after_begin) {
            Some((opts, end)) => {
                let lang = (name == "lstlisting").then(|| listing_language(opts)).flatten();
                (lang, end)
            }
            None => (None, after_begin),
        },
        "minted" => {
            let mut pos = after_begin;
            if let Some((_, end)) = bracket_on_same_line(text, pos) {
                pos = end;
            }
            match read_group(text, pos, b'{') {
                Ok(Some((s, e, end))) => (Some(text[s..e].trim().to_string()), end),
                _ => (None, pos),
            }
        }
        _ => (None, after_begin),
    }
}

fn bracket_on_same_line(text: &str, pos: usize) -> Option<(&str, usize)> {
    let rest = &text[pos..];
    let trimmed = rest.trim_start_matches([' ', '\t']);
    let open = pos + (rest.len() - trimmed.len());
    if !trimmed.starts_with('[') {
        return None;
    }
    let close = find_group_end(text, open)?;
    Some((&text[open + 1..close], close + 1))
}

/// `language=Python` (optionally `[dialect]Python` or braced) from listing options.
fn listing_language(options: &str) -> Option<String> {
    options.split(',').find_map(|opt| {
        let (key, value) = opt.split_once('=')?;
        if key.trim() != "language" {
            return None;
        }
        let value = value.trim().trim_matches(['{', '}']);
        let value = match value.find(']') {
            Some(idx) if value.starts_with('[') => &value[idx + 1..],
            _ => value,
        };
        let value = value.trim().to_lowercase();
        (!value.is_empty()).then_some(value)
    })
}

fn isolate_inline_verbatim(text: &str, doc: &mut Document) -> String {
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
        if let Some(end) = inline_verbatim_end(text, i) {
            if let Some(content) = inline_verbatim_content(text, i, end) {
                if !content.contains('\n') {
                    out.push_str(&text[last..i]);
                    let code = doc.source_of(content);
                    out.push_str(&doc.insert(Atom::InlineCode(code)));
                    last = end;
                    i = end;
                    continue;
                }
            }
        }
        i += 1;
    }
    out.push_str(&text[last..]);
    out
}

fn inline_verbatim_content(text: &str, start: usize, end: usize) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut j = start + if is_command_at(text, start, "verb") { 5 } else { 10 };
    if bytes.get(j) == Some(&b'*') {
        j += 1;
    }
    if bytes.get(j) == Some(&b'[') {
        j = find_group_end(text, j)? + 1;
    }
    // delimiter byte at j and at end - 1
    (j < end - 1).then(|| &text[j + 1..end - 1])
}

// =============================================================================
// Structural environments
// =============================================================================

/// How a generic environment treats its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyMode {
    /// Converted like the rest of the document
    Markup,
    /// Kept as written inside a display math block
    DisplayMath,
}

/// Replacement for a begin or end marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    /// Markdown text, converted by the later passes
    Text(&'static str),
    /// HTML emitted unchanged; `{0}`, `{1}` are replaced by arguments
    Html(&'static str),
    /// `<!-- text -->`; `{name}` is replaced by the environment name
    Comment(&'static str),
    Nothing,
}

struct GenericEnv {
    names: &'static [&'static str],
    /// Leading bracket argument accepted (and dropped unless used)
    optional: bool,
    /// Mandatory brace arguments consumed
    args: usize,
    open: Marker,
    close: Marker,
    mode: BodyMode,
}

const GENERIC_ENVIRONMENTS: &[GenericEnv] = &[
    GenericEnv {
        names: &["document"],
        optional: false,
        args: 0,
        open: Marker::Comment("begin document"),
        close: Marker::Comment("end document"),
        mode: BodyMode::Markup,
    },
    GenericEnv {
        names: &["abstract"],
        optional: false,
        args: 0,
        open: Marker::Text("\n**Abstract:**"),
        close: Marker::Comment("end abstract"),
        mode: BodyMode::Markup,
    },
    GenericEnv {
        names: &["figure", "figure*", "wrapfigure", "subfigure"],
        optional: true,
        args: 0,
        open: Marker::Text("\n**Figure:**"),
        close: Marker::Comment("end {name}"),
        mode: BodyMode::Markup,
    },
    GenericEnv {
        names: &["table", "table*", "wraptable"],
        optional: true,
        args: 0,
        open: Marker::Text("\n**Table:**"),
        close: Marker::Comment("end {name}"),
        mode: BodyMode::Markup,
    },
    GenericEnv {
        names: &["quote", "quotation", "verse"],
        optional: false,
        args: 0,
        open: Marker::Html("<blockquote>"),
        close: Marker::Html("</blockquote>"),
        mode: BodyMode::Markup,
    },
    GenericEnv {
        names: &["center"],
        optional: false,
        args: 0,
        open: Marker::Html("<div style='text-align: center'>"),
        close: Marker::Html("</div>"),
        mode: BodyMode::Markup,
    },
    GenericEnv {
        names: &["flushleft"],
        optional: false,
        args: 0,
        open: Marker::Html("<div style='text-align: left'>"),
        close: Marker::Html("</div>"),
        mode: BodyMode::Markup,
    },
    GenericEnv {
        names: &["flushright"],
        optional: false,
        args: 0,
        open: Marker::Html("<div style='text-align: right'>"),
        close: Marker::Html("</div>"),
        mode: BodyMode::Markup,
    },
    GenericEnv {
        names: &[
            "equation",
            "equation*",
            "align",
            "align*",
            "gather",
            "gather*",
            "multline",
            "multline*",
            "eqnarray",
            "eqnarray*",
            "displaymath",
            "math",
        ],
        optional: false,
        args: 0,
        open: Marker::Nothing,
        close: Marker::Nothing,
        mode: BodyMode::DisplayMath,
    },
    GenericEnv {
        names: &["multicols", "multicols*"],
        optional: false,
        args: 1,
        open: Marker::Html("<div style='column-count: {0}'>"),
        close: Marker::Html("</div>"),
        mode: BodyMode::Markup,
    },
    GenericEnv {
        names: &["minipage"],
        optional: true,
        args: 1,
        open: Marker::Html("<div>"),
        close: Marker::Html("</div>"),
        mode: BodyMode::Markup,
    },
    GenericEnv {
        names: &["tcolorbox"],
        optional: true,
        args: 0,
        open: Marker::Html("<div style='border: black solid 5px; background-color: gray'>"),
        close: Marker::Html("</div>"),
        mode: BodyMode::Markup,
    },
    GenericEnv {
        names: &["appendices"],
        optional: false,
        args: 0,
        open: Marker::Text("* * *\n\n# Appendix\n"),
        close: Marker::Nothing,
        mode: BodyMode::Markup,
    },
    GenericEnv {
        names: &[
            "tiny",
            "scriptsize",
            "footnotesize",
            "small",
            "normalsize",
            "large",
            "Large",
            "LARGE",
            "huge",
            "Huge",
        ],
        optional: false,
        args: 0,
        open: Marker::Comment("begin {name}"),
        close: Marker::Comment("end {name}"),
        mode: BodyMode::Markup,
    },
];

/// Theorem-like environments and their display titles.
const THEOREM_ENVIRONMENTS: &[(&str, &str)] = &[
    ("theorem", "Theorem"),
    ("lemma", "Lemma"),
    ("proposition", "Proposition"),
    ("corollary", "Corollary"),
    ("definition", "Definition"),
    ("example", "Example"),
    ("remark", "Remark"),
    ("claim", "Claim"),
    ("conjecture", "Conjecture"),
    ("observation", "Observation"),
    ("proof", "Proof"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Bullet,
    Numbered,
    Description,
    Inline,
}

fn list_kind(name: &str) -> Option<ListKind> {
    match name {
        "itemize" => Some(ListKind::Bullet),
        "enumerate" => Some(ListKind::Numbered),
        "description" => Some(ListKind::Description),
        "enumerate*" | "itemize*" | "description*" | "inparaenum" | "inparaitem" => {
            Some(ListKind::Inline)
        }
        _ => None,
    }
}

/// Transform every remaining environment, innermost content first.
pub fn run(mut doc: Document, ctx: &mut PassContext<'_>) -> ConversionResult<Document> {
    let text = doc.text().to_string();
    let text = transform(&text, &mut doc, ctx);
    Ok(doc.with_text(text))
}

fn transform(text: &str, doc: &mut Document, ctx: &mut PassContext<'_>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pos = 0usize;
    while let Some(marker) = next_marker(text, pos) {
        out.push_str(&text[pos..marker.start]);
        let literal = &text[marker.start..marker.end];
        match marker.kind {
            MarkerKind::End => {
                ctx.warn(
                    ConversionWarning::new(
                        WarningKind::UnbalancedEnvironment,
                        "end marker without a matching begin",
                    )
                    .with_location(literal.to_string()),
                );
                out.push_str(literal);
                pos = marker.end;
            }
            MarkerKind::Begin => match find_matching_end(text, &marker.name, marker.end) {
                Some(end) => {
                    let body = &text[marker.end..end.start];
                    let rendered = transform_environment(&marker.name, body, doc, ctx);
                    out.push_str(&rendered);
                    pos = end.end;
                }
                None => {
                    ctx.warn(
                        ConversionWarning::new(
                            WarningKind::UnbalancedEnvironment,
                            "begin marker without a matching end",
                        )
                        .with_location(literal.to_string()),
                    );
                    out.push_str(literal);
                    pos = marker.end;
                }
            },
        }
    }
    out.push_str(&text[pos..]);
    out
}

fn transform_environment(
    name: &str,
    body: &str,
    doc: &mut Document,
    ctx: &mut PassContext<'_>,
) -> String {
    log::trace!("environment {}", name);
    if table::is_table_environment(name) {
        let body = transform(body, doc, ctx);
        let spec = table::parse_environment(name, &body);
        return table::render_table(&spec, doc);
    }
    if let Some(kind) = list_kind(name) {
        let body = transform(body, doc, ctx);
        return replace_items(&body, kind);
    }
    if let Some(env) = GENERIC_ENVIRONMENTS.iter().find(|e| e.names.contains(&name)) {
        return transform_generic(env, name, body, doc, ctx);
    }
    if let Some((_, title)) = THEOREM_ENVIRONMENTS.iter().find(|(n, _)| {
        *n == name || name.strip_suffix('*') == Some(*n)
    }) {
        return transform_theorem(name, title, body, doc, ctx);
    }

    ctx.warn(
        ConversionWarning::new(
            WarningKind::UnknownEnvironment,
            if ctx.options.strip_unknown_environments {
                "no transform for this environment; replaced by comment markers"
            } else {
                "no transform for this environment; kept as written"
            },
        )
        .with_location(format!("\\begin{{{}}}", name)),
    );
    let inner = transform(body, doc, ctx);
    if ctx.options.strip_unknown_environments {
        let open = doc.insert(Atom::comment(format!("begin {}", name)));
        let close = doc.insert(Atom::comment(format!("end {}", name)));
        format!("{}{}{}", open, inner, close)
    } else {
        format!("\\begin{{{}}}{}\\end{{{}}}", name, inner, name)
    }
}

fn transform_generic(
    env: &GenericEnv,
    name: &str,
    body: &str,
    doc: &mut Document,
    ctx: &mut PassContext<'_>,
) -> String {
    let mut pos = 0usize;
    if env.optional {
        if let Ok(Some((_, _, end))) = read_group(body, pos, b'[') {
            pos = end;
        }
    }
    let mut args = Vec::with_capacity(env.args);
    for _ in 0..env.args {
        match read_group(body, pos, b'{') {
            Ok(Some((s, e, end))) => {
                args.push(body[s..e].trim().to_string());
                pos = end;
            }
            _ => break,
        }
    }
    let body = &body[pos..];
    let inner = match env.mode {
        BodyMode::Markup => transform(body, doc, ctx),
        BodyMode::DisplayMath => {
            let math = math_source(doc, body);
            doc.insert(Atom::DisplayMath(math))
        }
    };
    let open = render_marker(env.open, name, &args, doc);
    let close = render_marker(env.close, name, &args, doc);
    format!("{}{}{}", open, inner, close)
}

fn render_marker(marker: Marker, name: &str, args: &[String], doc: &mut Document) -> String {
    match marker {
        Marker::Text(text) => text.to_string(),
        Marker::Html(html) => {
            let mut html = html.to_string();
            for (i, arg) in args.iter().enumerate() {
                html = html.replace(&format!("{{{}}}", i), arg);
            }
            doc.insert(Atom::markup(html))
        }
        Marker::Comment(text) => doc.insert(Atom::comment(text.replace("{name}", name))),
        Marker::Nothing => String::new(),
    }
}

fn transform_theorem(
    name: &str,
    title: &str,
    body: &str,
    doc: &mut Document,
    ctx: &mut PassContext<'_>,
) -> String {
    let (note, body) = match read_group(body, 0, b'[') {
        Ok(Some((s, e, end))) => (Some(body[s..e].trim()), &body[end..]),
        _ => (None, body),
    };
    let heading = match note {
        Some(note) if !note.is_empty() => format!("\n**{} ({}).**", title, note),
        _ => format!("\n**{}.**", title),
    };
    let inner = transform(body, doc, ctx);
    let close = if title == "Proof" {
        " ∎".to_string()
    } else {
        doc.insert(Atom::comment(format!("end {}", name)))
    };
    format!("{}{}{}", heading, inner, close)
}

/// Replace this level's `\item` markers. Nested lists have already been
/// transformed, so every remaining `\item` belongs to this list.
fn replace_items(body: &str, kind: ListKind) -> String {
    let bytes = body.as_bytes();
    let mut out = String::with_capacity(body.len());
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
        if !is_command_at(body, i, "item") {
            i += 1;
            continue;
        }
        out.push_str(&body[last..i]);
        let mut end = i + 5;
        let mut term = None;
        if let Ok(Some((s, e, after))) = read_group(body, end, b'[') {
            term = Some(body[s..e].trim());
            end = after;
        }
        while bytes.get(end).map_or(false, |b| *b == b' ' || *b == b'\t') {
            end += 1;
        }
        let marker = match kind {
            ListKind::Bullet | ListKind::Description => "* ",
            ListKind::Numbered => "1. ",
            ListKind::Inline => " ",
        };
        out.push_str(marker);
        if let Some(term) = term.filter(|t| !t.is_empty()) {
            out.push_str(&format!("**{}** ", term));
        }
        last = end;
        i = end;
    }
    out.push_str(&body[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::latex2md::L2MOptions;
    use crate::utils::files::NoopFileResolver;
    use paperdown_markdown_backend::{render_document, MarkdownRenderOptions};
    use pretty_assertions::assert_eq;

    fn convert_with(input: &str, options: &L2MOptions) -> (String, Vec<ConversionWarning>) {
        let resolver = NoopFileResolver;
        let mut ctx = PassContext::new(options, &resolver);
        let doc = isolate_verbatim(Document::new(input), &mut ctx).unwrap();
        let doc = run(doc, &mut ctx).unwrap();
        let out = render_document(&doc, &MarkdownRenderOptions::default());
        (out, ctx.into_parts().1)
    }

    fn convert(input: &str) -> String {
        convert_with(input, &L2MOptions::default()).0
    }

    #[test]
    fn itemize_items_become_bullets() {
        let out = convert("\\begin{itemize}\n\\item one\n\\item two\n\\end{itemize}");
        assert_eq!(out, "\n* one\n* two\n");
    }

    #[test]
    fn nested_lists_keep_their_own_markers() {
        let input = "\\begin{enumerate}\n\\item a\n  \\begin{itemize}\n  \\item b\n  \\end{itemize}\n\\item c\n\\end{enumerate}";
        let out = convert(input);
        assert_eq!(out, "\n1. a\n  \n  * b\n  \n1. c\n");
    }

    #[test]
    fn description_terms_are_bold() {
        let out = convert("\\begin{description}\\item[Term] text\\end{description}");
        assert_eq!(out, "* **Term** text");
    }

    #[test]
    fn inline_enumeration_is_plain_text() {
        let out = convert("\\begin{enumerate*}\\item a \\item b\\end{enumerate*}");
        assert_eq!(out, " a  b");
    }

    #[test]
    fn verbatim_becomes_fenced_code() {
        let out = convert("x\n\\begin{verbatim}\na -- b\n\\end{verbatim}\ny");
        assert_eq!(out, "x\n\n```\na -- b\n```\n\ny");
    }

    #[test]
    fn listing_language_is_taken_from_options() {
        let out = convert("\\begin{lstlisting}[language=Python, caption=x]\nprint(1)\n\\end{lstlisting}");
        assert_eq!(out, "\n```python\nprint(1)\n```\n");
        let out = convert("\\begin{minted}{rust}\nfn main() {}\n\\end{minted}");
        assert_eq!(out, "\n```rust\nfn main() {}\n```\n");
    }

    #[test]
    fn inline_verb_becomes_code() {
        let out = convert("use \\verb|a_b| and \\lstinline{x}");
        assert_eq!(out, "use `a_b` and `x`");
    }

    #[test]
    fn display_math_keeps_body_raw() {
        let out = convert("\\begin{equation}\na + b\n\\end{equation}");
        assert_eq!(out, "\n<div class='math'>\na + b\n</div>\n");
    }

    #[test]
    fn generic_markers_follow_the_table() {
        let out = convert("\\begin{abstract}\nText.\n\\end{abstract}");
        assert_eq!(out, "\n**Abstract:**\nText.\n<!-- end abstract -->");
        let out = convert("\\begin{figure*}[t]x\\end{figure*}");
        assert_eq!(out, "\n**Figure:**x<!-- end figure* -->");
        let out = convert("\\begin{multicols}{2}x\\end{multicols}");
        assert_eq!(out, "<div style='column-count: 2'>x</div>");
    }

    #[test]
    fn theorem_with_note() {
        let out = convert("\\begin{lemma}[Key] Body.\\end{lemma}");
        assert_eq!(out, "\n**Lemma (Key).** Body.<!-- end lemma -->");
    }

    #[test]
    fn unknown_environment_becomes_comments() {
        let (out, warnings) = convert_with("\\begin{foo}x\\end{foo}", &L2MOptions::default());
        assert_eq!(out, "<!-- begin foo -->x<!-- end foo -->");
        assert_eq!(warnings[0].kind, WarningKind::UnknownEnvironment);

        let options = L2MOptions {
            strip_unknown_environments: false,
            ..L2MOptions::default()
        };
        let (out, _) = convert_with("\\begin{foo}x\\end{foo}", &options);
        assert_eq!(out, "\\begin{foo}x\\end{foo}");
    }

    #[test]
    fn unbalanced_markers_are_left_in_place() {
        let (out, warnings) = convert_with("\\begin{center} open", &L2MOptions::default());
        assert_eq!(out, "\\begin{center} open");
        assert_eq!(warnings[0].kind, WarningKind::UnbalancedEnvironment);
        let (_, warnings) = convert_with("stray \\end{quote}", &L2MOptions::default());
        assert_eq!(warnings[0].kind, WarningKind::UnbalancedEnvironment);
    }

    #[test]
    fn table_inside_table_float() {
        let out = convert("\\begin{table}\n\\begin{tabular}{ll}\na & b \\\\ \\hline\nc & d\n\\end{tabular}\n\\end{table}");
        assert_eq!(
            out,
            "\n**Table:**\n\n\n| a | b |\n| ---- | ---- |\n| c | d |\n\n<!-- end table -->"
        );
    }
}
