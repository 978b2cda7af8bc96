//! Final pass: whitespace cleanup on the text buffer, then atom rendering.

use lazy_static::lazy_static;
use paperdown_ir::{Document, Segment, Segments};
use paperdown_markdown_backend::{render_document, MarkdownRenderOptions};
use regex::Regex;

use super::context::PassContext;
use crate::utils::error::ConversionResult;

lazy_static! {
    /// Three or more line breaks, possibly with blank-looking lines between.
    static ref BLANK_RUN_RE: Regex = Regex::new(r"\n(?:[ \t]*\n){2,}").unwrap();
}

pub fn run(doc: Document, ctx: &mut PassContext<'_>) -> ConversionResult<Document> {
    let text = chomp_block_lines(doc.text(), &doc);
    let text = normalize_text_segments(&text);
    let text = BLANK_RUN_RE.replace_all(&text, "\n\n").into_owned();
    let doc = doc.with_text(text);

    let mut rendered = render_document(&doc, &MarkdownRenderOptions::default());
    if ctx.options.footer {
        rendered.push_str(&footer());
    }
    log::debug!(
        "rendered {} atoms into {} bytes",
        doc.atoms().len(),
        rendered.len()
    );
    Ok(Document::new(rendered))
}

/// Lines opening a Markdown block lose their indentation, so it is not read
/// as a code block. Bulleted lines keep theirs to preserve list nesting.
fn chomp_block_lines(text: &str, doc: &Document) -> String {
    text.split('\n')
        .map(|line| {
            let rest = line.trim_start_matches([' ', '\t']);
            if rest.len() < line.len() && starts_block(rest, doc) {
                rest
            } else {
                line
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn starts_block(rest: &str, doc: &Document) -> bool {
    if rest.starts_with("**") || rest.starts_with("(Caption") || rest.starts_with("![") {
        return true;
    }
    if let Some(atom) = doc.leading_atom(rest) {
        return atom.is_block_marker();
    }
    rest.chars()
        .next()
        .map_or(false, |c| c.is_alphanumeric() || c == '_')
}

/// Dashes and `{}` terminators, in text only. Atoms are passed through, so
/// table rules and comments keep their hyphens.
fn normalize_text_segments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for segment in Segments::new(text) {
        match segment {
            Segment::Text(t) => out.push_str(
                &t.replace("---", "—")
                    .replace("--", "–")
                    .replace("{}", ""),
            ),
            Segment::Atom(id) => out.push_str(&id.to_string()),
        }
    }
    out
}

fn footer() -> String {
    format!(
        "\n* * *\n\n<span style='font-size: 8pt'>Converted with paperdown v.{}</span>\n",
        env!("CARGO_PKG_VERSION")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::latex2md::L2MOptions;
    use crate::utils::files::NoopFileResolver;
    use paperdown_ir::Atom;
    use pretty_assertions::assert_eq;

    fn normalize(doc: Document, options: &L2MOptions) -> String {
        let resolver = NoopFileResolver;
        let mut ctx = PassContext::new(options, &resolver);
        run(doc, &mut ctx).unwrap().into_parts().0
    }

    #[test]
    fn dashes_skip_atoms() {
        let mut doc = Document::new("");
        let rule = doc.insert(Atom::TableRule { columns: 2 });
        let comment = doc.insert(Atom::comment("a -- b"));
        let doc = doc.with_text(format!("1990--2000 --- yes\n{}\n{}", rule, comment));
        assert_eq!(
            normalize(doc, &L2MOptions::fragment()),
            "1990–2000 — yes\n| ---- | ---- |\n<!-- a -- b -->"
        );
    }

    #[test]
    fn block_lines_are_chomped_but_bullets_keep_indentation() {
        let mut doc = Document::new("");
        let comment = doc.insert(Atom::comment("end figure"));
        let text = format!(
            "  **Figure:**\n    ![a](a)\n  (Caption: c)\n  {}\n  * nested\n  word{{}}\n\t1. item",
            comment
        );
        assert_eq!(
            normalize(doc.with_text(text), &L2MOptions::fragment()),
            "**Figure:**\n![a](a)\n(Caption: c)\n<!-- end figure -->\n  * nested\nword\n1. item"
        );
    }

    #[test]
    fn blank_runs_collapse() {
        let doc = Document::new("a\n\n\n\nb\n \n\t\nc");
        assert_eq!(normalize(doc, &L2MOptions::fragment()), "a\n\nb\n\nc");
    }

    #[test]
    fn code_blocks_keep_blank_lines() {
        let mut doc = Document::new("");
        let code = doc.insert(Atom::CodeBlock(paperdown_ir::CodeBlock {
            lang: None,
            body: "x\n\n\n\ny".to_string(),
        }));
        let doc = doc.with_text(code);
        assert_eq!(
            normalize(doc, &L2MOptions::fragment()),
            "\n```\nx\n\n\n\ny\n```\n"
        );
    }

    #[test]
    fn footer_names_tool_and_version() {
        let out = normalize(Document::new("x"), &L2MOptions::default());
        assert!(out.starts_with("x\n* * *\n\n<span style='font-size: 8pt'>Converted with paperdown v."));
        assert!(out.ends_with("</span>\n"));
    }
}
