//! Integration tests for paperdown full document conversion

use chrono::NaiveDate;
use paperdown::{
    latex_to_markdown, latex_to_markdown_with_options, ConversionError, ConversionOutput,
    L2MOptions, MemoryFileResolver, NoopFileResolver, StdFileResolver, WarningKind,
};
use pretty_assertions::assert_eq;

fn paper(body: &str) -> String {
    format!(
        "\\documentclass[11pt]{{article}}\n\\usepackage{{amsmath}}\n\\title{{A Paper}}\n\\author{{Ann}}\n\\begin{{document}}\n\\maketitle\n{}\n\\end{{document}}\n",
        body
    )
}

fn fixed_options() -> L2MOptions {
    L2MOptions::reproducible(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
}

fn convert(body: &str) -> ConversionOutput {
    latex_to_markdown_with_options(&paper(body), &NoopFileResolver, fixed_options()).unwrap()
}

fn has_warning(output: &ConversionOutput, kind: WarningKind) -> bool {
    output.warnings.iter().any(|w| w.kind == kind)
}

// ============================================================================
// Declarations
// ============================================================================

mod declarations {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_document_class_is_fatal() {
        let input = "\\title{T}\n\\begin{document}\nHi\n\\end{document}\n";
        let err = latex_to_markdown(input, &NoopFileResolver).unwrap_err();
        assert!(matches!(
            err,
            ConversionError::MissingDeclaration {
                command: "documentclass"
            }
        ));
    }

    #[test]
    fn test_two_document_classes_are_fatal() {
        let input = format!("\\documentclass{{report}}\n{}", paper("Hi"));
        let err = latex_to_markdown(&input, &NoopFileResolver).unwrap_err();
        assert!(matches!(
            err,
            ConversionError::DuplicateDeclaration {
                command: "documentclass",
                count: 2
            }
        ));
    }

    #[test]
    fn test_missing_title_is_fatal() {
        let input = "\\documentclass{article}\n\\begin{document}\nHi\n\\end{document}\n";
        let err = latex_to_markdown(input, &NoopFileResolver).unwrap_err();
        assert!(matches!(
            err,
            ConversionError::MissingDeclaration { command: "title" }
        ));
    }

    #[test]
    fn test_metadata_is_collected() {
        let output = convert("Body.");
        assert_eq!(output.metadata.document_class.as_deref(), Some("article"));
        assert_eq!(output.metadata.class_options, vec!["11pt"]);
        assert_eq!(output.metadata.packages, vec!["amsmath"]);
        assert_eq!(output.metadata.title.as_deref(), Some("A Paper"));
        assert!(output.content.contains("# A Paper"));
        assert!(output.content.contains("<!-- usepackage: amsmath -->"));
    }
}

// ============================================================================
// Labels and references
// ============================================================================

mod references {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_one_label_one_reference() {
        let output = convert("\\section{Intro}\\label{sec:intro}\nAs in \\ref{sec:intro}.");
        assert_eq!(output.content.matches("<a id=\"sec:intro\">").count(), 1);
        assert_eq!(output.content.matches("](#sec:intro)").count(), 1);
        assert!(output.content.contains("[(see: sec:intro)](#sec:intro)"));
        assert!(!output.has_warnings());
    }

    #[test]
    fn test_undefined_reference_still_links() {
        let output = convert("See \\ref{fig:none}.");
        assert!(output.content.contains("(#fig:none)"));
        assert!(has_warning(&output, WarningKind::UndefinedReference));
        assert!(!output.content.contains("<a id=\"fig:none\">"));
    }

    #[test]
    fn test_duplicate_label_warns() {
        let output = convert("\\label{x} and \\label{x}. \\ref{x}");
        assert!(has_warning(&output, WarningKind::DuplicateLabel));
        assert_eq!(output.metadata.labels, vec!["x"]);
    }
}

// ============================================================================
// Tables
// ============================================================================

mod tables {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lcr_table_with_one_rule_and_two_rows() {
        let output = convert("\\begin{tabular}{lcr}\n\\hline\na & b & c \\\\\nd & e & f \\\\\n\\end{tabular}");
        let rule = "| ---- | ---- | ---- |";
        let table_lines: Vec<&str> = output
            .content
            .lines()
            .filter(|line| line.starts_with('|'))
            .collect();

        assert_eq!(table_lines.iter().filter(|line| **line == rule).count(), 1);
        let data: Vec<&&str> = table_lines.iter().filter(|line| **line != rule).collect();
        assert_eq!(data.len(), 2);
        for row in data {
            assert_eq!(row.matches(" | ").count(), 2, "row {:?}", row);
        }
    }

    #[test]
    fn test_braced_line_break_keeps_row_on_one_line() {
        let output = convert("\\begin{tabular}{ll}\na & \\textbf{x\\\\y} \\\\\n\\end{tabular}");
        let rows: Vec<&str> = output
            .content
            .lines()
            .filter(|line| line.starts_with('|'))
            .collect();

        assert_eq!(rows, vec!["| a | **x<br>y** |"]);
    }
}

// ============================================================================
// Bibliography
// ============================================================================

mod bibliography {
    use super::*;
    use pretty_assertions::assert_eq;

    const REFS: &str = "@article{knuth84,\n  author = {Donald E. Knuth},\n  title = {Literate Programming},\n  year = 1984,\n}\n";

    #[test]
    fn test_citation_links_to_reference_list() {
        let resolver = MemoryFileResolver::new().with_file("refs.bib", REFS);
        let input = paper("As shown \\cite{knuth84}.\n\\bibliography{refs}");
        let output = latex_to_markdown_with_options(&input, &resolver, fixed_options()).unwrap();

        assert!(output.content.contains("(cites: [knuth84](#knuth84))"));
        assert!(output.content.contains("<a id=\"knuth84\">**knuth84**</a>"));
        assert!(output.content.contains("title: Literate Programming"));
        assert_eq!(output.metadata.cited_keys, vec!["knuth84"]);
        assert_eq!(output.metadata.bibliography_files, vec!["refs.bib"]);
        assert!(!output.has_warnings());
    }

    #[test]
    fn test_missing_citation_is_listed_as_missing() {
        let resolver = MemoryFileResolver::new().with_file("refs.bib", REFS);
        let input = paper("See \\cite{ghost}.\n\\bibliography{refs}");
        let output = latex_to_markdown_with_options(&input, &resolver, fixed_options()).unwrap();

        assert!(output.content.contains("[ghost](#ghost)"));
        assert!(output.content.contains("<a id=\"ghost\">"));
        assert!(output.content.contains("missing"));
        assert!(has_warning(&output, WarningKind::MissingCitation));
    }

    #[test]
    fn test_missing_bibliography_file_is_fatal() {
        let input = paper("\\cite{a}\n\\bibliography{nowhere}");
        let err = latex_to_markdown(&input, &NoopFileResolver).unwrap_err();
        assert!(matches!(err, ConversionError::Bibliography { .. }));
    }

    #[test]
    fn test_bibliography_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let tex = dir.path().join("paper.tex");
        std::fs::write(&tex, paper("\\cite{knuth84}\n\\bibliography{refs}")).unwrap();
        std::fs::write(dir.path().join("refs.bib"), REFS).unwrap();

        let resolver = StdFileResolver::for_input_file(&tex);
        let input = std::fs::read_to_string(&tex).unwrap();
        let output = latex_to_markdown_with_options(&input, &resolver, fixed_options()).unwrap();
        assert!(output.content.contains("author: Donald E. Knuth"));
    }
}

// ============================================================================
// Whole-run properties
// ============================================================================

mod runs {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_identical_input_gives_identical_output() {
        let input = paper("\\date{\\today}\nText with \\emph{emphasis} and $x^2$.");
        let first = latex_to_markdown_with_options(&input, &NoopFileResolver, fixed_options())
            .unwrap()
            .content;
        let second = latex_to_markdown_with_options(&input, &NoopFileResolver, fixed_options())
            .unwrap()
            .content;
        assert_eq!(first, second);
        assert!(first.contains("March 1, 2024"));
    }

    #[test]
    fn test_footer_can_be_disabled() {
        let with_footer = convert("Body.");
        assert!(with_footer.content.contains("Converted with paperdown"));

        let options = L2MOptions {
            footer: false,
            ..fixed_options()
        };
        let output = latex_to_markdown_with_options(&paper("Body."), &NoopFileResolver, options)
            .unwrap();
        assert!(!output.content.contains("Converted with paperdown"));
    }

    #[test]
    fn test_report_serializes_without_content() {
        let output = convert("See \\ref{nowhere}.");
        let json = serde_json::to_value(&output).unwrap();
        assert!(json.get("content").is_none());
        assert_eq!(json["warnings"][0]["kind"], "undefined-reference");
        assert_eq!(json["metadata"]["document_class"], "article");
    }

    #[test]
    fn test_inline_code_is_not_normalized() {
        let output = convert("Use \\texttt{a--b} or \\texttt{x{}y}, not a--b.");
        assert!(output.content.contains("Use `a--b` or `x{}y`, not a–b."));
    }

    #[test]
    fn test_code_is_not_rewritten() {
        let output = convert("\\begin{verbatim}\n\\ref{x} -- \"q\"\n\\end{verbatim}");
        assert!(output.content.contains("```\n\\ref{x} -- \"q\"\n```"));
        assert!(!has_warning(&output, WarningKind::UndefinedReference));
    }
}
