//! IR to Markdown backend.

use paperdown_ir::{Atom, CodeBlock, Document, Segment, Segments};

#[derive(Debug, Clone)]
pub struct MarkdownRenderOptions {
    /// Cell text of a table header/body divider.
    pub rule_cell: String,
    /// CSS class of inline math spans.
    pub math_class: String,
    /// Prefix of the visible marker shown next to label anchors.
    pub anchor_marker: String,
}

impl Default for MarkdownRenderOptions {
    fn default() -> Self {
        Self {
            rule_cell: "----".to_string(),
            math_class: "math".to_string(),
            anchor_marker: "¶".to_string(),
        }
    }
}

/// Render the text buffer with every placeholder replaced by its atom.
pub fn render_document(doc: &Document, options: &MarkdownRenderOptions) -> String {
    render_text(doc, doc.text(), options)
}

/// Render `text`, resolving placeholders against the atoms of `doc`.
///
/// Atom payloads may hold placeholders of atoms created before them, so
/// resolution recurses; ids only ever point backwards, which bounds the depth.
pub fn render_text(doc: &Document, text: &str, options: &MarkdownRenderOptions) -> String {
    let mut out = String::with_capacity(text.len());
    for segment in Segments::new(text) {
        match segment {
            Segment::Text(t) => out.push_str(t),
            Segment::Atom(id) => {
                if let Some(atom) = doc.atom(id) {
                    out.push_str(&render_atom(doc, atom, options));
                }
            }
        }
    }
    out
}

pub fn render_atom(doc: &Document, atom: &Atom, options: &MarkdownRenderOptions) -> String {
    match atom {
        Atom::Escaped { rendered, .. } => rendered.clone(),
        Atom::LineBreak => "\n".to_string(),
        Atom::ParagraphBreak => "\n\n".to_string(),
        Atom::Comment(text) => format!("<!-- {} -->", render_text(doc, text, options)),
        Atom::Anchor(id) => format!(
            "<a id=\"{}\">({} {})</a>",
            escape_attr(id),
            options.anchor_marker,
            id
        ),
        Atom::Link { text, target } => format!(
            "[{}](#{})",
            render_text(doc, text, options),
            target
        ),
        Atom::InlineCode(code) => render_inline_code(&render_text(doc, code, options)),
        Atom::CodeBlock(block) => render_code_block(block),
        Atom::Math(body) => format!(
            "<span class='{}'>{}</span>",
            options.math_class,
            render_text(doc, body, options)
        ),
        Atom::DisplayMath(body) => format!(
            "\n<div class='{}'>\n{}\n</div>\n",
            options.math_class,
            render_text(doc, body.trim_matches('\n'), options)
        ),
        Atom::TableRule { columns } => render_table_rule(*columns, options),
        Atom::Markup(markup) => render_text(doc, markup, options),
    }
}

/// `|` followed by one rule cell per column.
pub fn render_table_rule(columns: usize, options: &MarkdownRenderOptions) -> String {
    let mut out = String::from("|");
    for _ in 0..columns {
        out.push(' ');
        out.push_str(&options.rule_cell);
        out.push_str(" |");
    }
    out
}

fn render_inline_code(code: &str) -> String {
    if code.contains('`') {
        format!("`` {} ``", code)
    } else {
        format!("`{}`", code)
    }
}

fn render_code_block(block: &CodeBlock) -> String {
    let fence = if block.body.contains("```") {
        "~~~~"
    } else {
        "```"
    };
    let body = block.body.trim_matches('\n');
    format!(
        "\n{}{}\n{}\n{}\n",
        fence,
        block.lang.as_deref().unwrap_or(""),
        body,
        fence
    )
}

fn escape_attr(value: &str) -> String {
    value.replace('"', "&quot;")
}
