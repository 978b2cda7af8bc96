//! Inline markup: an ordered table of rewrite rules.
//!
//! Literal-argument commands run first so their arguments are never touched
//! by later rules, then single characters, then span commands (two-argument
//! commands before one-argument ones), document furniture, and finally the
//! symbol table.

use paperdown_ir::{Atom, Document};

use super::context::PassContext;
use super::utils::{
    command_name_at, find_group_end, math_source, replace_command_word, rewrite_command,
    CommandMatch,
};
use super::ConversionWarning;
use crate::data::symbols::{decode_accents, lookup_symbol};
use crate::utils::error::ConversionResult;

/// How a span command is rendered.
#[derive(Clone, Copy)]
enum Render {
    /// Text around the last argument.
    Wrap(&'static str, &'static str),
    /// HTML tags around the last argument; `{0}` in the opening tag is the
    /// first argument.
    Html(&'static str, &'static str),
    /// Inline code; the body is not rewritten by later passes.
    Code,
    /// Removed together with its arguments.
    Drop,
    Custom(fn(&CommandMatch, &mut Document) -> String),
}

struct SpanRule {
    name: &'static str,
    optional: usize,
    nargs: usize,
    render: Render,
}

const fn span(name: &'static str, optional: usize, nargs: usize, render: Render) -> SpanRule {
    SpanRule {
        name,
        optional,
        nargs,
        render,
    }
}

/// Span commands in application order. Two-argument commands come first.
const SPAN_RULES: &[SpanRule] = &[
    span("textcolor", 1, 2, Render::Html("<span style='color: {0}'>", "</span>")),
    span("colorbox", 1, 2, Render::Html("<span style='background-color: {0}'>", "</span>")),
    span("textbf", 0, 1, Render::Wrap("**", "**")),
    span("textit", 0, 1, Render::Wrap("*", "*")),
    span("textsl", 0, 1, Render::Wrap("*", "*")),
    span("emph", 0, 1, Render::Wrap("*", "*")),
    span("texttt", 0, 1, Render::Code),
    span("textsc", 0, 1, Render::Html("<span style='font-variant: small-caps'>", "</span>")),
    span("underline", 0, 1, Render::Html("<u>", "</u>")),
    span("uline", 0, 1, Render::Html("<u>", "</u>")),
    span("textsuperscript", 0, 1, Render::Html("<sup>", "</sup>")),
    span("textsubscript", 0, 1, Render::Html("<sub>", "</sub>")),
    span("textrm", 0, 1, Render::Wrap("", "")),
    span("textnormal", 0, 1, Render::Wrap("", "")),
    span("mbox", 0, 1, Render::Wrap("", "")),
    span("footnote", 1, 1, Render::Wrap(" (footnote: ", ")")),
    span("thanks", 0, 1, Render::Wrap(" (footnote: ", ")")),
    span("caption", 1, 1, Render::Wrap(" (Caption: ", ")")),
    span("section", 1, 1, Render::Wrap("## ", "")),
    span("subsection", 1, 1, Render::Wrap("### ", "")),
    span("subsubsection", 1, 1, Render::Wrap("#### ", "")),
    span("paragraph", 1, 1, Render::Wrap("**", "**")),
    span("gecfail", 0, 1, Render::Html("<span style='text-decoration-line: grammar-error'>", "</span>")),
    span("mispelt", 0, 1, Render::Html("<span style='text-decoration-line: spelling-error'>", "</span>")),
    span("aclanthologypostprintdoi", 0, 1, Render::Custom(acl_postprint)),
    span("springerpostprintdoi", 0, 1, Render::Custom(springer_postprint)),
    span("footnotepubrights", 0, 1, Render::Custom(pubrights_footnote)),
    span("vspace", 0, 1, Render::Drop),
    span("hspace", 0, 1, Render::Drop),
    span("addvspace", 0, 1, Render::Drop),
];

/// Layout commands without visible output.
const REMOVED_WORDS: &[&str] = &[
    "noindent", "newpage", "clearpage", "cleardoublepage", "pagebreak", "smallskip",
    "medskip", "bigskip", "hfill", "vfill", "protect", "footnotemark",
];

/// Declarations that change the font of the rest of a group; kept as comments.
const FONT_SWITCHES: &[&str] = &[
    "centering", "raggedright", "raggedleft", "tiny", "scriptsize", "footnotesize", "small",
    "normalsize", "large", "Large", "LARGE", "huge", "Huge", "bfseries", "itshape",
    "ttfamily", "scshape", "normalfont", "bf", "it", "tt", "sc", "rm", "sf", "em",
];

/// Example environments of linguistics packages, spelled as `\ex.` and friends.
const LINGUISTIC_MARKERS: &[(&str, &str)] = &[
    ("ex.", "**Linguistic examples:**\n\n"),
    ("exg.", "**Linguistic example group:**\n\n"),
    ("ag.", "a. "),
    ("b.", "b. "),
];

pub fn run(mut doc: Document, ctx: &mut PassContext<'_>) -> ConversionResult<Document> {
    let text = doc.text().to_string();
    let text = literal_arguments(&text, &mut doc, ctx);
    let text = math_spans(&text, &mut doc);
    let text = characters(&text, &mut doc);
    let text = spans(&text, &mut doc, ctx);
    let text = furniture(&text, &mut doc);
    let text = symbols(&text, &mut doc);
    Ok(doc.with_text(text))
}

/// Argument text taken literally: escapes lose their backslash.
fn literal(doc: &Document, text: &str) -> String {
    doc.source_of(text.trim()).replace('\\', "")
}

fn rewrite_warn<F>(
    text: &str,
    name: &str,
    optional: usize,
    nargs: usize,
    ctx: &mut PassContext<'_>,
    render: &mut F,
) -> String
where
    F: FnMut(&CommandMatch) -> Option<String>,
{
    let mut unterminated = 0usize;
    let out = rewrite_command(text, name, optional, nargs, render, &mut unterminated);
    if unterminated > 0 {
        ctx.warn(ConversionWarning::unterminated(name, unterminated));
    }
    out
}

// =============================================================================
// Literal arguments
// =============================================================================

fn literal_arguments(text: &str, doc: &mut Document, ctx: &mut PassContext<'_>) -> String {
    let text = rewrite_warn(text, "url", 0, 1, ctx, &mut |m| {
        let url = literal(doc, m.arg(0));
        Some(doc.insert(Atom::markup(format!("<{}>", url))))
    });
    let text = rewrite_warn(&text, "href", 0, 2, ctx, &mut |m| {
        let url = literal(doc, m.arg(0));
        let target = doc.insert(Atom::markup(format!("({})", url)));
        Some(format!("[{}]{}", m.arg(1).trim(), target))
    });
    rewrite_warn(&text, "includegraphics", 1, 1, ctx, &mut |m| {
        let path = literal(doc, m.arg(0));
        Some(doc.insert(Atom::markup(format!("![{}]({})", path, path))))
    })
}

/// `$...$` and `\(...\)` become inline math, `$$...$$` and `\[...\]` display
/// math. An unclosed delimiter is left as written.
pub(super) fn math_spans(text: &str, doc: &mut Document) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut last = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        let (open_len, close, display) = match (bytes[i], bytes.get(i + 1).copied()) {
            (b'\\', Some(b'\\')) => {
                i += 2;
                continue;
            }
            (b'\\', Some(b'(')) => (2, "\\)", false),
            (b'\\', Some(b'[')) => (2, "\\]", true),
            (b'$', Some(b'$')) => (2, "$$", true),
            (b'$', _) => (1, "$", false),
            _ => {
                i += 1;
                continue;
            }
        };
        let body_start = i + open_len;
        let Some(body_len) = find_unescaped(&text[body_start..], close) else {
            i = body_start;
            continue;
        };
        let body = math_source(doc, &text[body_start..body_start + body_len]);
        out.push_str(&text[last..i]);
        out.push_str(&doc.insert(if display {
            Atom::DisplayMath(body)
        } else {
            Atom::Math(body)
        }));
        i = body_start + body_len + close.len();
        last = i;
    }
    out.push_str(&text[last..]);
    out
}

/// Offset of `needle` in `text`, skipping backslash escapes.
fn find_unescaped(text: &str, needle: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        if text[i..].starts_with(needle) {
            return Some(i);
        }
        i += if bytes[i] == b'\\' { 2 } else { 1 };
    }
    None
}

// =============================================================================
// Characters
// =============================================================================

fn characters(text: &str, doc: &mut Document) -> String {
    let text = line_breaks(text, doc);
    let text = replace_command_word(&text, "newline", true, &mut || doc.insert(Atom::LineBreak));
    let text = replace_command_word(&text, "par", true, &mut || doc.insert(Atom::ParagraphBreak));
    // accents first: `\'e` must not turn into a closing quote
    let text = decode_accents(&text);
    text.replace("``", "“")
        .replace("''", "”")
        .replace('`', "‘")
        .replace('\'', "’")
        .replace('~', " ")
        .replace("\\ ", " ")
        .replace(".\\@", ".")
        .replace("\\@", "")
        .replace("\\,", " ")
        .replace("\\;", " ")
        .replace("\\!", "")
        .replace("\\-", "")
}

/// `\\`, `\\*` and `\\[len]` become line-break atoms.
fn line_breaks(text: &str, doc: &mut Document) -> String {
    line_breaks_as(text, doc, Atom::LineBreak)
}

/// Like [`line_breaks`], but each break becomes a copy of `atom`.
pub(super) fn line_breaks_as(text: &str, doc: &mut Document, atom: Atom) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut last = 0usize;
    let mut i = 0usize;
    while i + 1 < bytes.len() {
        if bytes[i] != b'\\' {
            i += 1;
            continue;
        }
        if bytes[i + 1] != b'\\' {
            i += 2;
            continue;
        }
        out.push_str(&text[last..i]);
        out.push_str(&doc.insert(atom.clone()));
        let mut end = i + 2;
        if bytes.get(end) == Some(&b'*') {
            end += 1;
        }
        if bytes.get(end) == Some(&b'[') {
            if let Some(close) = find_group_end(text, end) {
                end = close + 1;
            }
        }
        last = end;
        i = end;
    }
    out.push_str(&text[last..]);
    out
}

// =============================================================================
// Spans
// =============================================================================

fn spans(text: &str, doc: &mut Document, ctx: &mut PassContext<'_>) -> String {
    let mut text = text.to_string();
    for rule in SPAN_RULES {
        text = rewrite_warn(&text, rule.name, rule.optional, rule.nargs, ctx, &mut |m| {
            Some(render_span(rule.render, m, doc))
        });
    }
    text
}

fn render_span(render: Render, m: &CommandMatch, doc: &mut Document) -> String {
    let body = m.args.last().map(|b| b.trim()).unwrap_or("");
    match render {
        Render::Wrap(open, close) => format!("{}{}{}", open, body, close),
        Render::Html(open, close) => {
            let open = open.replace("{0}", &literal(doc, m.arg(0)));
            let open = doc.insert(Atom::markup(open));
            let close = doc.insert(Atom::markup(close));
            format!("{}{}{}", open, body, close)
        }
        Render::Code => doc.insert(Atom::InlineCode(body.to_string())),
        Render::Drop => String::new(),
        Render::Custom(f) => f(m, doc),
    }
}

fn acl_postprint(m: &CommandMatch, doc: &mut Document) -> String {
    let id = literal(doc, m.arg(0));
    doc.insert(Atom::markup(format!(
        "Publisher’s version available at [ACL Anthology identifier: {id}](https://aclanthology.org/{id}). \
         All modern ACL conferences are open access usually CC BY",
        id = id
    )))
}

fn springer_postprint(m: &CommandMatch, doc: &mut Document) -> String {
    let doi = literal(doc, m.arg(0));
    doc.insert(Atom::markup(format!(
        "Publisher’s version available at [Springer via doi: {doi}](https://dx.doi.org/{doi}). \
         For more information, see [Springers self archiving policy]\
         (http://www.springer.com/gp/open-access/authors-rights/self-archiving-policy/2124).",
        doi = doi
    )))
}

/// Rights statement of the title footnote, set apart in small print.
fn pubrights_footnote(m: &CommandMatch, doc: &mut Document) -> String {
    let gap = doc.insert(Atom::ParagraphBreak);
    let open = doc.insert(Atom::markup(
        "<span style='font-size:8pt'>(¹ Authors' archival version: ",
    ));
    let close = doc.insert(Atom::markup(")</span>"));
    format!("¹\n{}{}{}{}", gap, open, m.arg(0).trim(), close)
}

// =============================================================================
// Furniture and symbols
// =============================================================================

fn furniture(text: &str, doc: &mut Document) -> String {
    let mut text = replace_command_word(text, "appendix", true, &mut || {
        "* * *\n\n# Appendix\n".to_string()
    });
    for name in FONT_SWITCHES {
        text = replace_command_word(&text, name, true, &mut || doc.insert(Atom::comment(*name)));
    }
    for name in REMOVED_WORDS {
        text = replace_command_word(&text, name, true, &mut String::new);
    }
    for (marker, replacement) in LINGUISTIC_MARKERS {
        text = replace_command_word(&text, marker, false, &mut || replacement.to_string());
    }
    text
}

/// Named symbols become single characters; `\textbackslash` a literal backslash.
fn symbols(text: &str, doc: &mut Document) -> String {
    let text = replace_command_word(text, "textbackslash", false, &mut || {
        doc.insert(Atom::escaped("\\textbackslash", "\\"))
    });
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut last = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            i += 1;
            continue;
        }
        let Some(name) = command_name_at(&text, i) else {
            i += 2;
            continue;
        };
        let end = i + 1 + name.len();
        if let Some(symbol) = lookup_symbol(name) {
            log::trace!("symbol \\{} -> {}", name, symbol);
            out.push_str(&text[last..i]);
            out.push_str(symbol);
            last = end;
        }
        i = end;
    }
    out.push_str(&text[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::latex2md::{L2MOptions, WarningKind};
    use crate::utils::files::NoopFileResolver;
    use paperdown_markdown_backend::{render_document, MarkdownRenderOptions};
    use pretty_assertions::assert_eq;

    fn markup(input: &str) -> (String, Vec<ConversionWarning>) {
        let options = L2MOptions::default();
        let resolver = NoopFileResolver;
        let mut ctx = PassContext::new(&options, &resolver);
        let doc = run(Document::new(input), &mut ctx).unwrap();
        let out = render_document(&doc, &MarkdownRenderOptions::default());
        (out, ctx.into_parts().1)
    }

    fn convert(input: &str) -> String {
        markup(input).0
    }

    #[test]
    fn test_nested_emphasis() {
        assert_eq!(
            convert("\\textbf{a \\textit{b}} and \\emph{c}"),
            "**a *b*** and *c*"
        );
    }

    #[test]
    fn test_directional_quotes() {
        assert_eq!(
            convert("``quoted'' and `single' it's"),
            "“quoted” and ‘single’ it’s"
        );
    }

    #[test]
    fn test_links_and_images() {
        assert_eq!(
            convert("\\href{https://x.org/a\\_b}{the site} \\url{https://y.org/~me}"),
            "[the site](https://x.org/a_b) <https://y.org/~me>"
        );
        assert_eq!(
            convert("\\includegraphics[width=.5\\textwidth]{fig.png}"),
            "![fig.png](fig.png)"
        );
    }

    #[test]
    fn test_math_is_kept_raw() {
        assert_eq!(
            convert("Energy $E = mc^2$, \\(f'(x)\\) and $$a--b$$"),
            "Energy <span class='math'>E = mc^2</span>, <span class='math'>f'(x)</span> and \n<div class='math'>\na--b\n</div>\n"
        );
    }

    #[test]
    fn test_unclosed_dollar_is_literal() {
        assert_eq!(convert("costs 5$ only"), "costs 5$ only");
    }

    #[test]
    fn test_two_argument_spans() {
        assert_eq!(
            convert("\\textcolor{red}{warn} \\textsc{Name}"),
            "<span style='color: red'>warn</span> <span style='font-variant: small-caps'>Name</span>"
        );
    }

    #[test]
    fn test_sectioning() {
        assert_eq!(
            convert("\\section{Intro}\n\\subsection*{Deep}\n\\subsubsection[s]{Deeper}\n\\paragraph{Run-in}"),
            "## Intro\n### Deep\n#### Deeper\n**Run-in**"
        );
    }

    #[test]
    fn test_line_breaks() {
        assert_eq!(convert("a\\\\b\\\\[2pt]c\\newline d"), "a\nb\nc\nd");
    }

    #[test]
    fn test_texttt_body_is_code() {
        assert_eq!(convert("run \\texttt{make}"), "run `make`");
        assert_eq!(convert("\\texttt{a--b} and \\texttt{x{}y}"), "`a--b` and `x{}y`");
    }

    #[test]
    fn test_accents_and_symbols() {
        assert_eq!(convert("Erd\\H{o}s and G\\\"odel"), "Erdős and Gödel");
        assert_eq!(convert("\\alpha\\ldots \\textbackslash"), "α… \\");
        assert_eq!(convert("x \\in A \\cup B"), "x ∈ A ∪ B");
    }

    #[test]
    fn test_footnotes_and_captions() {
        assert_eq!(
            convert("x\\footnote{see} \\caption[s]{A cap}"),
            "x (footnote: see)  (Caption: A cap)"
        );
    }

    #[test]
    fn test_unterminated_span_is_kept() {
        let (out, warnings) = markup("\\textbf{open");
        assert_eq!(out, "\\textbf{open");
        assert_eq!(warnings[0].kind, WarningKind::UnterminatedArgument);
    }

    #[test]
    fn test_publication_notes() {
        assert_eq!(
            convert("T\\footnotepubrights{CC BY}"),
            "T¹\n\n\n<span style='font-size:8pt'>(¹ Authors' archival version: CC BY)</span>"
        );
        assert_eq!(
            convert("\\aclanthologypostprintdoi{2020.acl-main.1}"),
            "Publisher’s version available at [ACL Anthology identifier: 2020.acl-main.1](https://aclanthology.org/2020.acl-main.1). All modern ACL conferences are open access usually CC BY"
        );
    }

    #[test]
    fn test_furniture() {
        assert_eq!(
            convert("\\appendix\n{\\small text} \\centering\n\\noindent Hi\\vspace*{2mm}"),
            "* * *\n\n# Appendix\n\n{<!-- small -->text} <!-- centering -->\nHi"
        );
    }

    #[test]
    fn test_linguistic_examples() {
        assert_eq!(
            convert("\\ex. one \\exg. two \\ag. x \\b. y"),
            "**Linguistic examples:**\n\n one **Linguistic example group:**\n\n two a.  x b.  y"
        );
    }
}
