//! Preamble and title block: declarations become inert comments, the title
//! block becomes Markdown.

use lazy_static::lazy_static;
use paperdown_ir::{Atom, Document};
use regex::{Captures, Regex};

use super::context::PassContext;
use super::utils::{
    command_name_at, find_group_end, is_command_at, parse_command, read_group,
    replace_command_word, split_names, CommandMatch,
};
use super::ConversionWarning;
use crate::utils::error::{ConversionError, ConversionResult};

lazy_static! {
    static ref DOCUMENTCLASS_RE: Regex =
        Regex::new(r"\\documentclass\s*(?:\[([^\]]*)\])?\s*\{([^}]*)\}").unwrap();
    static ref USEPACKAGE_RE: Regex =
        Regex::new(r"\\(?:usepackage|RequirePackage)\s*(?:\[[^\]]*\])?\s*\{([^}]*)\}").unwrap();
    static ref DEFINECOLOR_RE: Regex =
        Regex::new(r"\\definecolor\s*\{([^}]*)\}\s*\{([^}]*)\}\s*\{([^}]*)\}").unwrap();
}

/// Commands that define macros or environments. The definition is dropped.
const DEFINITION_COMMANDS: &[&str] = &[
    "newcommand",
    "renewcommand",
    "providecommand",
    "DeclareRobustCommand",
    "DeclareMathOperator",
    "newenvironment",
    "renewenvironment",
    "def",
    "gdef",
    "edef",
    "xdef",
];

pub fn run(mut doc: Document, ctx: &mut PassContext<'_>) -> ConversionResult<Document> {
    let text = doc.text().to_string();
    let text = extract_document_class(&text, ctx)?;
    let text = replace_packages(&text, &mut doc, ctx);
    let text = replace_definitions(&text, &mut doc, ctx);
    let text = replace_colors(&text, &mut doc);
    let text = replace_conditionals(&text, &mut doc);
    let text = extract_title(&text, &doc, ctx)?;
    let text = extract_authors(&text, &doc, ctx);
    let text = resolve_today(&text, ctx);
    let text = extract_date(&text, &doc, ctx);
    let text = replace_maketitle(&text, &mut doc);
    Ok(doc.with_text(text))
}

/// Validate and remove the single `\documentclass` declaration.
fn extract_document_class(text: &str, ctx: &mut PassContext<'_>) -> ConversionResult<String> {
    let found: Vec<Captures> = DOCUMENTCLASS_RE.captures_iter(text).collect();
    match found.len() {
        0 => return Err(ConversionError::missing("documentclass")),
        1 => {}
        n => return Err(ConversionError::duplicate("documentclass", n)),
    }
    let caps = &found[0];
    ctx.meta.document_class = Some(caps[2].trim().to_string());
    ctx.meta.class_options = caps.get(1).map(|m| split_names(m.as_str())).unwrap_or_default();
    log::debug!("document class {:?}", ctx.meta.document_class);
    Ok(DOCUMENTCLASS_RE.replace(text, "").into_owned())
}

fn replace_packages(text: &str, doc: &mut Document, ctx: &mut PassContext<'_>) -> String {
    USEPACKAGE_RE
        .replace_all(text, |caps: &Captures| {
            let names = split_names(&caps[1]);
            let comment = format!("usepackage: {}", names.join(", "));
            ctx.meta.packages.extend(names);
            doc.insert(Atom::comment(comment))
        })
        .into_owned()
}

/// Replace macro and environment definitions by `<!-- new command name -->`.
fn replace_definitions(text: &str, doc: &mut Document, ctx: &mut PassContext<'_>) -> String {
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
        let Some(command) = DEFINITION_COMMANDS
            .iter()
            .copied()
            .find(|c| is_command_at(text, i, c))
        else {
            i += 1;
            continue;
        };
        match definition_span(text, i, command) {
            Some((name, end)) => {
                out.push_str(&text[last..i]);
                let label = if command.ends_with("environment") {
                    format!("new environment {}", name)
                } else {
                    format!("new command {}", name)
                };
                out.push_str(&doc.insert(Atom::comment(label)));
                ctx.meta.macros.push(name);
                last = end;
                i = end;
            }
            None => {
                ctx.warn(ConversionWarning::unterminated(command, 1));
                i += 1;
            }
        }
    }
    out.push_str(&text[last..]);
    out
}

/// Name (without backslash) and end offset of the definition at `pos`.
fn definition_span(text: &str, pos: usize, command: &str) -> Option<(String, usize)> {
    let bytes = text.as_bytes();
    let mut p = pos + 1 + command.len();
    if bytes.get(p) == Some(&b'*') {
        p += 1;
    }
    let p_name = skip_spaces(text, p);
    // name: `{\name}` / `{name}` or a bare control sequence
    let (name, mut p) = if bytes.get(p_name) == Some(&b'{') {
        let close = find_group_end(text, p_name)?;
        (
            text[p_name + 1..close].trim().trim_start_matches('\\').to_string(),
            close + 1,
        )
    } else {
        let name = command_name_at(text, p_name)
            .map(str::to_string)
            .or_else(|| text.get(p_name + 1..p_name + 2).map(str::to_string))?;
        (name.clone(), p_name + 1 + name.len())
    };
    if command.ends_with("def") {
        // parameter text runs up to the body
        let open = p + text[p..].find('{')?;
        let close = find_group_end(text, open)?;
        return Some((name, close + 1));
    }
    // arity and default value
    for _ in 0..2 {
        match read_group(text, p, b'[') {
            Ok(Some((_, _, end))) => p = end,
            Ok(None) => break,
            Err(_) => return None,
        }
    }
    let bodies = if command.ends_with("environment") { 2 } else { 1 };
    for _ in 0..bodies {
        match read_group(text, p, b'{') {
            Ok(Some((_, _, end))) => p = end,
            _ => return None,
        }
    }
    Some((name, p))
}

fn skip_spaces(text: &str, mut pos: usize) -> usize {
    let bytes = text.as_bytes();
    while bytes.get(pos).map_or(false, |b| b.is_ascii_whitespace()) {
        pos += 1;
    }
    pos
}

fn replace_colors(text: &str, doc: &mut Document) -> String {
    DEFINECOLOR_RE
        .replace_all(text, |caps: &Captures| {
            doc.insert(Atom::comment(format!(
                "definecolor {} {} {}",
                caps[1].trim(),
                caps[2].trim(),
                caps[3].trim()
            )))
        })
        .into_owned()
}

/// Elide `\newif\ifX`, `\ifX`, `\else` and `\fi` to inert markers.
fn replace_conditionals(text: &str, doc: &mut Document) -> String {
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
        let Some(name) = command_name_at(text, i) else {
            i += 1;
            continue;
        };
        let mut end = i + 1 + name.len();
        let label = if name == "newif" {
            let p = skip_spaces(text, end);
            match command_name_at(text, p) {
                Some(flag) if flag.starts_with("if") => {
                    end = p + 1 + flag.len();
                    format!("newif {}", flag)
                }
                _ => name.to_string(),
            }
        } else if is_conditional(name) {
            name.to_string()
        } else {
            i = end;
            continue;
        };
        out.push_str(&text[last..i]);
        out.push_str(&doc.insert(Atom::comment(format!("conditional: {}", label))));
        last = end;
        i = end;
    }
    out.push_str(&text[last..]);
    out
}

fn is_conditional(name: &str) -> bool {
    match name {
        "else" | "fi" => true,
        "iff" => false,
        _ => name.starts_with("if"),
    }
}

/// Find every invocation of `\name{...}` (with an optional leading bracket
/// argument), reporting unterminated ones.
fn find_invocations(
    text: &str,
    name: &'static str,
    ctx: &mut PassContext<'_>,
) -> Vec<CommandMatch> {
    let bytes = text.as_bytes();
    let mut found = Vec::new();
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] == b'\\' && bytes.get(i + 1) == Some(&b'\\') {
            i += 2;
            continue;
        }
        match parse_command(text, i, name, 1, 1) {
            Ok(Some(m)) => {
                i = m.end;
                found.push(m);
                continue;
            }
            Ok(None) => {}
            Err(_) => ctx.warn(ConversionWarning::unterminated(name, 1)),
        }
        i += 1;
    }
    found
}

fn splice(text: &str, m: &CommandMatch, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len());
    out.push_str(&text[..m.start]);
    out.push_str(replacement);
    out.push_str(&text[m.end..]);
    out
}

/// Validate the single `\title` and turn it into a level-one heading.
fn extract_title(text: &str, doc: &Document, ctx: &mut PassContext<'_>) -> ConversionResult<String> {
    let found = find_invocations(text, "title", ctx);
    let m = match found.as_slice() {
        [] => return Err(ConversionError::missing("title")),
        [m] => m,
        more => return Err(ConversionError::duplicate("title", more.len())),
    };
    let title = fold_lines(&m.arg(0).replace("\\\\", " "));
    ctx.meta.title = Some(doc.source_of(&title));
    Ok(splice(text, m, &format!("# {}", title)))
}

fn fold_lines(text: &str) -> String {
    text.split('\n')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `\author{A \and B}` becomes `**Authors:** A` / `and` / `B`.
fn extract_authors(text: &str, doc: &Document, ctx: &mut PassContext<'_>) -> String {
    let mut text = text.to_string();
    let found = find_invocations(&text, "author", ctx);
    for m in found.iter().rev() {
        let authors = m.arg(0).trim();
        let rendered = strip_and(authors);
        let plain = doc.source_of(&fold_lines(&authors.replace("\\and", ",")));
        ctx.meta.authors = Some(match ctx.meta.authors.take() {
            Some(prev) => format!("{}; {}", plain, prev),
            None => plain,
        });
        text = splice(&text, m, &format!("**Authors:** {}", rendered));
    }
    text
}

fn strip_and(authors: &str) -> String {
    let marker = "\u{0}AND\u{0}";
    let mut out = String::new();
    let bytes = authors.as_bytes();
    let mut last = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        if is_command_at(authors, i, "and") {
            out.push_str(authors[last..i].trim_end());
            out.push_str(marker);
            last = skip_spaces(authors, i + 4);
            i = last;
            continue;
        }
        i += 1;
    }
    out.push_str(&authors[last..]);
    out.replace(marker, "\n\nand\n\n")
}

/// Replace `\today` by the conversion date, spelled the way LaTeX does.
fn resolve_today(text: &str, ctx: &mut PassContext<'_>) -> String {
    if !text.contains("\\today") {
        return text.to_string();
    }
    let date = ctx.options.today().format("%B %-d, %Y").to_string();
    replace_command_word(text, "today", false, &mut || date.clone())
}

fn extract_date(text: &str, doc: &Document, ctx: &mut PassContext<'_>) -> String {
    let mut text = text.to_string();
    let found = find_invocations(&text, "date", ctx);
    for m in found.iter().rev() {
        let date = fold_lines(m.arg(0));
        let replacement = if date.is_empty() {
            String::new()
        } else {
            ctx.meta.date = Some(doc.source_of(&date));
            format!("**Date:** {}", date)
        };
        text = splice(&text, m, &replacement);
    }
    text
}

fn replace_maketitle(text: &str, doc: &mut Document) -> String {
    replace_command_word(text, "maketitle", true, &mut || {
        doc.insert(Atom::comment("make title"))
    })
}
