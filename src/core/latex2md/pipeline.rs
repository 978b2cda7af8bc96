//! The fixed pass order of a conversion run.

use std::time::Instant;

use paperdown_ir::Document;

use super::context::PassContext;
use super::{bibliography, environment, header, labels, markup, normalize, preprocess};
use crate::utils::error::ConversionResult;

/// A pass takes the document and returns the rewritten one.
pub type Stage = fn(Document, &mut PassContext<'_>) -> ConversionResult<Document>;

/// Passes in execution order. Verbatim isolation runs right after
/// preprocessing so code content is never seen by any later pass.
const STAGES: &[(&str, Stage)] = &[
    ("preprocess", preprocess::run),
    ("verbatim", environment::isolate_verbatim),
    ("header", header::run),
    ("labels", labels::run),
    ("bibliography", bibliography::run),
    ("environments", environment::run),
    ("markup", markup::run),
    ("normalize", normalize::run),
];

/// Logs the duration of a stage when dropped. The clock is only read when
/// debug logging is on (`Instant` is unavailable on bare wasm32).
struct StageTimer<'a> {
    label: &'a str,
    start: Option<Instant>,
}

impl<'a> StageTimer<'a> {
    fn new(label: &'a str) -> Self {
        StageTimer {
            label,
            start: log::log_enabled!(log::Level::Debug).then(Instant::now),
        }
    }
}

impl<'a> Drop for StageTimer<'a> {
    fn drop(&mut self) {
        if let Some(start) = self.start {
            log::debug!(
                "stage {} finished in {:.3}ms",
                self.label,
                start.elapsed().as_secs_f64() * 1000.0
            );
        }
    }
}

/// Run all passes over `doc`.
pub fn run(mut doc: Document, ctx: &mut PassContext<'_>) -> ConversionResult<Document> {
    for (name, stage) in STAGES {
        let _timer = StageTimer::new(name);
        doc = stage(doc, ctx)?;
        log::trace!(
            "after {}: {} bytes, {} atoms",
            name,
            doc.text().len(),
            doc.atoms().len()
        );
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbatim_isolated_before_any_rewriting_pass() {
        let names: Vec<&str> = STAGES.iter().map(|(name, _)| *name).collect();
        assert_eq!(
            names,
            vec![
                "preprocess",
                "verbatim",
                "header",
                "labels",
                "bibliography",
                "environments",
                "markup",
                "normalize",
            ]
        );
    }
}
