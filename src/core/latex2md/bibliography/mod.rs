//! Bibliography resolution
//!
//! Reads the `.bib` files a document names, turns citation commands into
//! links and replaces the reference-list insertion point by the list of cited
//! records. Hand-written `thebibliography` lists are kept as anchored items.

mod parser;

pub use parser::{parse_bibtex, BibDatabase, BibEntry};

use fxhash::FxHashSet;
use indexmap::IndexMap;
use paperdown_ir::{Atom, Document};

use super::context::PassContext;
use super::utils::{command_name_at, parse_command, read_group, split_names, CommandMatch};
use super::{ConversionWarning, WarningKind};
use crate::utils::error::{ConversionError, ConversionResult};

/// Citation commands; all take up to two optional arguments and a key list.
const CITE_COMMANDS: &[&str] = &[
    "cite",
    "citep",
    "citet",
    "citealp",
    "citeauthor",
    "citeyear",
    "parencite",
    "textcite",
    "autocite",
];

/// A bibliography-related command found in the text.
#[derive(Debug)]
enum BibCommand {
    /// `\bibliography{a,b}`: sources and the list insertion point
    Bibliography(Vec<String>),
    /// `\addbibresource{a.bib}`
    Resource(Vec<String>),
    /// `\printbibliography`
    Print,
    Style(String),
    Cite { keys: Vec<String>, postnote: Option<String> },
    Nocite(Vec<String>),
    BibItem(String),
    BeginList,
    EndList,
}

#[derive(Debug)]
struct Found {
    start: usize,
    end: usize,
    command: BibCommand,
}

pub fn run(mut doc: Document, ctx: &mut PassContext<'_>) -> ConversionResult<Document> {
    let text = doc.text().to_string();
    let found = scan(&text, &doc, ctx);
    if found.is_empty() {
        return Ok(doc);
    }

    let db = load_sources(&found, ctx)?;
    let bibitems: FxHashSet<&str> = found
        .iter()
        .filter_map(|f| match &f.command {
            BibCommand::BibItem(key) => Some(key.as_str()),
            _ => None,
        })
        .collect();
    let cited = collect_citations(&found, &db, &bibitems, ctx);

    let mut out = String::with_capacity(text.len());
    let mut last = 0usize;
    let mut list_emitted = false;
    for f in &found {
        out.push_str(&text[last..f.start]);
        last = f.end;
        let replacement = match &f.command {
            BibCommand::Bibliography(_) | BibCommand::Print => {
                if list_emitted {
                    ctx.warn(
                        ConversionWarning::new(
                            WarningKind::ExtraBibliography,
                            "only the first reference list is rendered; this one is removed",
                        )
                        .with_location(text[f.start..f.end].to_string()),
                    );
                    String::new()
                } else {
                    list_emitted = true;
                    let list = render_reference_list(&cited, &db, ctx.options.bib_field_max_len);
                    doc.insert(Atom::markup(list))
                }
            }
            BibCommand::Resource(_) | BibCommand::Nocite(_) | BibCommand::EndList => String::new(),
            BibCommand::Style(style) => doc.insert(Atom::comment(format!("bib style: {}", style))),
            BibCommand::Cite { keys, postnote } => render_citation(keys, postnote.as_deref(), &mut doc),
            BibCommand::BibItem(key) => doc.insert(Atom::markup(format!(
                "\n* <a id=\"{}\">**{}**</a>: ",
                key, key
            ))),
            BibCommand::BeginList => doc.insert(Atom::markup("\n# References\n")),
        };
        out.push_str(&replacement);
    }
    out.push_str(&text[last..]);

    if !list_emitted && !cited.is_empty() && bibitems.is_empty() {
        log::debug!("{} keys cited but the document has no reference list", cited.len());
    }
    ctx.meta.cited_keys = cited.keys().cloned().collect();
    Ok(doc.with_text(out))
}

/// Citation keys as written, without escapes.
fn clean_keys(doc: &Document, arg: &str) -> Vec<String> {
    split_names(arg)
        .iter()
        .map(|key| doc.source_of(key).replace('\\', ""))
        .collect()
}

/// Every bibliography command in document order.
fn scan(text: &str, doc: &Document, ctx: &mut PassContext<'_>) -> Vec<Found> {
    let bytes = text.as_bytes();
    let mut found = Vec::new();
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
        let (optional_max, nargs) = match name {
            "bibliography" | "bibliographystyle" | "nocite" => (0, 1),
            "addbibresource" | "bibitem" => (1, 1),
            "printbibliography" => (1, 0),
            "begin" | "end" => (0, 1),
            _ if CITE_COMMANDS.contains(&name) => (2, 1),
            _ => {
                i += 1 + name.len();
                continue;
            }
        };
        let m = match parse_command(text, i, name, optional_max, nargs) {
            Ok(Some(m)) => m,
            Ok(None) => {
                i += 1 + name.len();
                continue;
            }
            Err(_) => {
                ctx.warn(ConversionWarning::unterminated(name, nargs));
                i += 1 + name.len();
                continue;
            }
        };
        let Some((command, end)) = classify(name, &m, text, doc) else {
            i = m.end;
            continue;
        };
        found.push(Found {
            start: i,
            end,
            command,
        });
        i = end;
    }
    found
}

fn classify(name: &str, m: &CommandMatch, text: &str, doc: &Document) -> Option<(BibCommand, usize)> {
    let command = match name {
        "bibliography" => BibCommand::Bibliography(split_names(m.arg(0))),
        "addbibresource" => BibCommand::Resource(split_names(m.arg(0))),
        "printbibliography" => BibCommand::Print,
        "bibliographystyle" => BibCommand::Style(m.arg(0).trim().to_string()),
        "nocite" => BibCommand::Nocite(clean_keys(doc, m.arg(0))),
        "bibitem" => BibCommand::BibItem(doc.source_of(m.arg(0).trim()).replace('\\', "")),
        "begin" if m.arg(0).trim() == "thebibliography" => {
            // widest-label argument
            let end = match read_group(text, m.end, b'{') {
                Ok(Some((_, _, end))) => end,
                _ => m.end,
            };
            return Some((BibCommand::BeginList, end));
        }
        "end" if m.arg(0).trim() == "thebibliography" => BibCommand::EndList,
        "begin" | "end" => return None,
        _ => BibCommand::Cite {
            keys: clean_keys(doc, m.arg(0)),
            postnote: m
                .optional
                .last()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
        },
    };
    Some((command, m.end))
}

/// Read and merge every named file; a record from an earlier file wins.
fn load_sources(found: &[Found], ctx: &mut PassContext<'_>) -> ConversionResult<BibDatabase> {
    let mut db = BibDatabase::new();
    for f in found {
        let names = match &f.command {
            BibCommand::Bibliography(names) | BibCommand::Resource(names) => names,
            _ => continue,
        };
        for name in names {
            let file = if name.ends_with(".bib") {
                name.clone()
            } else {
                format!("{}.bib", name)
            };
            let source = ctx
                .resolver
                .read_to_string(&file)
                .map_err(|source| ConversionError::Bibliography {
                    name: file.clone(),
                    source,
                })?;
            let (parsed, warnings) = parse_bibtex(&source);
            log::debug!("{}: {} records", file, parsed.len());
            for warning in warnings {
                ctx.warn(warning.with_location(file.clone()));
            }
            db.merge(parsed);
            ctx.meta.bibliography_files.push(file);
        }
    }
    Ok(db)
}

/// Keys in order of first citation; unresolved keys get a stand-in record.
/// Keys answered by a `\bibitem` are listed by the document itself.
fn collect_citations(
    found: &[Found],
    db: &BibDatabase,
    bibitems: &FxHashSet<&str>,
    ctx: &mut PassContext<'_>,
) -> IndexMap<String, BibEntry> {
    let mut keys: Vec<&str> = Vec::new();
    for f in found {
        match &f.command {
            BibCommand::Cite { keys: cited, .. } => keys.extend(cited.iter().map(String::as_str)),
            BibCommand::Nocite(nocite) if nocite.iter().any(|k| k == "*") => keys.extend(db.keys()),
            BibCommand::Nocite(nocite) => keys.extend(nocite.iter().map(String::as_str)),
            _ => {}
        }
    }

    let mut cited: IndexMap<String, BibEntry> = IndexMap::new();
    for key in keys {
        if cited.contains_key(key) || bibitems.contains(key) {
            continue;
        }
        let entry = match db.get(key) {
            Some(entry) => entry.clone(),
            None => {
                ctx.warn(ConversionWarning::missing_citation(key));
                BibEntry::missing()
            }
        };
        cited.insert(key.to_string(), entry);
    }
    cited
}

/// `(cites: [a](#a), [b](#b))`
fn render_citation(keys: &[String], postnote: Option<&str>, doc: &mut Document) -> String {
    let links: Vec<String> = keys
        .iter()
        .map(|key| doc.insert(Atom::link(key.clone(), key.clone())))
        .collect();
    match postnote {
        Some(note) => format!("(cites: {}, {})", links.join(", "), note),
        None => format!("(cites: {})", links.join(", ")),
    }
}

fn render_reference_list(cited: &IndexMap<String, BibEntry>, db: &BibDatabase, max_len: usize) -> String {
    let mut out = String::from("# References\n\n");
    for (key, entry) in cited {
        out.push_str(&format!("* <a id=\"{}\">**{}**</a>:\n", key, key));
        for (field, value) in &entry.fields {
            out.push_str(&format!("    * {}: {}\n", field, truncate(value, max_len)));
        }
    }
    log::trace!("reference list with {} of {} records", cited.len(), db.len());
    out
}

/// Cut `value` to `max` characters, marking the cut with `...`.
fn truncate(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &value[..idx]),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::latex2md::L2MOptions;
    use crate::utils::files::{MemoryFileResolver, NoopFileResolver};
    use crate::utils::FileResolver;
    use paperdown_markdown_backend::{render_document, MarkdownRenderOptions};
    use pretty_assertions::assert_eq;

    const REFS: &str = "@article{knuth,\n  author = {Donald Knuth},\n  year = {1984},\n}\n@book{lamport,\n  title = {LaTeX},\n}\n";

    fn resolve_with(
        input: &str,
        resolver: &dyn FileResolver,
    ) -> ConversionResult<(String, Vec<ConversionWarning>, Vec<String>)> {
        let options = L2MOptions::default();
        let mut ctx = PassContext::new(&options, resolver);
        let doc = run(Document::new(input), &mut ctx)?;
        let out = render_document(&doc, &MarkdownRenderOptions::default());
        let (meta, warnings) = ctx.into_parts();
        Ok((out, warnings, meta.cited_keys))
    }

    #[test]
    fn citations_link_and_list_in_citation_order() {
        let resolver = MemoryFileResolver::new().with_file("refs.bib", REFS);
        let (out, warnings, cited) = resolve_with(
            "See \\cite{lamport, knuth} and \\citep[p.~5]{knuth}.\n\\bibliographystyle{plain}\n\\bibliography{refs}\n",
            &resolver,
        )
        .unwrap();
        assert_eq!(
            out,
            "See (cites: [lamport](#lamport), [knuth](#knuth)) and (cites: [knuth](#knuth), p.~5).\n<!-- bib style: plain -->\n# References\n\n* <a id=\"lamport\">**lamport**</a>:\n    * title: LaTeX\n* <a id=\"knuth\">**knuth**</a>:\n    * author: Donald Knuth\n    * year: 1984\n\n"
        );
        assert!(warnings.is_empty());
        assert_eq!(cited, vec!["lamport", "knuth"]);
    }

    #[test]
    fn missing_key_gets_stand_in_record() {
        let resolver = MemoryFileResolver::new().with_file("refs.bib", REFS);
        let (out, warnings, _) =
            resolve_with("\\cite{nobody}\n\\bibliography{refs}", &resolver).unwrap();
        assert!(out.starts_with("(cites: [nobody](#nobody))"));
        assert!(out.contains("* <a id=\"nobody\">**nobody**</a>:\n    * error: missing from bibliography\n"));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::MissingCitation);
    }

    #[test]
    fn missing_bibliography_file_is_fatal() {
        let err = resolve_with("\\cite{a}\\bibliography{absent}", &NoopFileResolver).unwrap_err();
        assert!(matches!(err, ConversionError::Bibliography { ref name, .. } if name == "absent.bib"));
    }

    #[test]
    fn first_file_wins_across_files() {
        let resolver = MemoryFileResolver::new()
            .with_file("a.bib", "@misc{k,\n  note = {from a},\n}\n")
            .with_file("b.bib", "@misc{k,\n  note = {from b},\n}\n");
        let (out, _, _) = resolve_with("\\cite{k}\\bibliography{a,b}", &resolver).unwrap();
        assert!(out.contains("note: from a"));
        assert!(!out.contains("from b"));
    }

    #[test]
    fn biblatex_resources_and_nocite_star() {
        let resolver = MemoryFileResolver::new().with_file("refs.bib", REFS);
        let (out, warnings, cited) = resolve_with(
            "\\addbibresource{refs.bib}\\nocite{*}\\printbibliography[heading=none]\\printbibliography",
            &resolver,
        )
        .unwrap();
        assert!(out.starts_with("# References\n\n* <a id=\"knuth\">"));
        assert_eq!(cited, vec!["knuth", "lamport"]);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::ExtraBibliography);
    }

    #[test]
    fn long_values_are_truncated() {
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("abc", 3), "abc");
        assert_eq!(truncate("äöüß", 2), "äö...");
    }

    #[test]
    fn thebibliography_items_resolve_citations() {
        let (out, warnings, _) = resolve_with(
            "\\cite{k}\n\\begin{thebibliography}{9}\n\\bibitem{k} A. Author. Title.\n\\end{thebibliography}",
            &NoopFileResolver,
        )
        .unwrap();
        assert!(warnings.is_empty());
        assert_eq!(
            out,
            "(cites: [k](#k))\n\n# References\n\n\n* <a id=\"k\">**k**</a>:  A. Author. Title.\n"
        );
    }
}
