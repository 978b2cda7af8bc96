//! Cross-references: `\label` declarations become anchors, reference commands
//! become links to them.

use fxhash::FxHashMap;
use lazy_static::lazy_static;
use paperdown_ir::{Atom, Document};
use regex::{Captures, Regex};

use super::context::PassContext;
use super::utils::{rewrite_command, split_names, CommandMatch};
use super::ConversionWarning;
use crate::utils::error::ConversionResult;

lazy_static! {
    static ref LABEL_RE: Regex = Regex::new(r"\\label\s*\{([^}]*)\}").unwrap();
}

/// Commands that refer to a label. All take one argument; `\cref` and
/// `\Cref` accept comma-separated lists.
const REFERENCE_COMMANDS: &[&str] = &[
    "ref", "eqref", "pageref", "autoref", "nameref", "cref", "Cref",
];

pub fn run(mut doc: Document, ctx: &mut PassContext<'_>) -> ConversionResult<Document> {
    let text = doc.text().to_string();
    let (text, labels) = collect_labels(&text, &mut doc, ctx);
    let text = resolve_references(&text, &labels, &mut doc, ctx);
    Ok(doc.with_text(text))
}

/// Label names appear escaped in the buffer (`fig\_a`); anchors use the bare name.
fn label_name(doc: &Document, raw: &str) -> String {
    doc.source_of(raw.trim()).replace('\\', "")
}

/// First pass: every declaration becomes an anchor. The first declaration of
/// a name is the one references resolve to.
fn collect_labels(
    text: &str,
    doc: &mut Document,
    ctx: &mut PassContext<'_>,
) -> (String, FxHashMap<String, usize>) {
    let mut labels: FxHashMap<String, usize> = FxHashMap::default();
    let mut duplicates = Vec::new();
    let text = LABEL_RE
        .replace_all(text, |caps: &Captures| {
            let name = label_name(doc, &caps[1]);
            if labels.contains_key(&name) {
                duplicates.push(name.clone());
            } else {
                labels.insert(name.clone(), labels.len());
            }
            doc.insert(Atom::Anchor(name))
        })
        .into_owned();
    for name in duplicates {
        ctx.warn(ConversionWarning::duplicate_label(&name));
    }
    let mut ordered: Vec<(&String, &usize)> = labels.iter().collect();
    ordered.sort_by_key(|(_, idx)| **idx);
    ctx.meta.labels = ordered.into_iter().map(|(name, _)| name.clone()).collect();
    log::debug!("{} labels declared", labels.len());
    (text, labels)
}

/// Second pass: references become `[(see: L)](#L)`, dangling or not.
fn resolve_references(
    text: &str,
    labels: &FxHashMap<String, usize>,
    doc: &mut Document,
    ctx: &mut PassContext<'_>,
) -> String {
    let mut text = text.to_string();
    for command in REFERENCE_COMMANDS {
        let mut undefined = Vec::new();
        let mut unterminated = 0usize;
        text = rewrite_command(
            &text,
            command,
            0,
            1,
            &mut |m: &CommandMatch| {
                let links: Vec<String> = split_names(m.arg(0))
                    .iter()
                    .map(|raw| {
                        let name = label_name(doc, raw);
                        if !labels.contains_key(&name) {
                            undefined.push(name.clone());
                        }
                        doc.insert(Atom::link(format!("(see: {})", name), name))
                    })
                    .collect();
                Some(links.join(", "))
            },
            &mut unterminated,
        );
        for name in undefined {
            ctx.warn(ConversionWarning::undefined_reference(command, &name));
        }
        if unterminated > 0 {
            ctx.warn(ConversionWarning::unterminated(command, unterminated));
        }
    }
    text
}
