//! Terminal rendering of session snapshots
//!
//! Thought text only ever grows, so each redraw prints just the new tail of
//! every source. A source whose placeholder is replaced by real text is
//! printed again from the start. A source that is running but still empty
//! gets one "Initializing..." line.

use std::collections::HashMap;
use std::io::Write;

use thoughtchain_core::{SessionSnapshot, SourceKey};

/// Shown once for a source that has no text yet
const EMPTY_SOURCE_TEXT: &str = "Initializing...";

/// Tracks what has already been printed per source
#[derive(Debug, Default)]
pub struct ThoughtPrinter {
    printed: HashMap<SourceKey, String>,
    completed: Vec<SourceKey>,
}

impl ThoughtPrinter {
    /// Create an empty printer
    pub fn new() -> Self {
        Self::default()
    }

    /// Write whatever changed since the last snapshot
    pub fn render(&mut self, snapshot: &SessionSnapshot, out: &mut impl Write) -> std::io::Result<()> {
        for item in &snapshot.items {
            if item.text.is_empty() && !self.printed.contains_key(&item.key) {
                writeln!(out, "[{}] {EMPTY_SOURCE_TEXT}", item.key)?;
            }
            let printed = self.printed.entry(item.key.clone()).or_default();

            if item.text != *printed {
                match item.text.strip_prefix(printed.as_str()) {
                    Some(tail) if !printed.is_empty() => {
                        writeln!(out, "[{}] ...{}", item.key, tail)?;
                    }
                    _ if !item.text.is_empty() => {
                        writeln!(out, "[{}] {}", item.key, item.text)?;
                    }
                    _ => {}
                }
                printed.clone_from(&item.text);
            }

            if item.completed && !self.completed.contains(&item.key) {
                writeln!(out, "[{}] (done)", item.key)?;
                self.completed.push(item.key.clone());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thoughtchain_core::{ChatStatus, Generation, SourceItem};

    fn snapshot(items: &[(&str, &str, bool)]) -> SessionSnapshot {
        SessionSnapshot {
            generation: Generation(1),
            status: ChatStatus::Processing,
            final_answer: String::new(),
            items: items
                .iter()
                .map(|(key, text, completed)| SourceItem {
                    key: SourceKey::from(*key),
                    text: (*text).to_string(),
                    completed: *completed,
                })
                .collect(),
            error: None,
        }
    }

    fn render(printer: &mut ThoughtPrinter, items: &[(&str, &str, bool)]) -> String {
        let mut out = Vec::new();
        printer.render(&snapshot(items), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_prints_only_growth() {
        let mut printer = ThoughtPrinter::new();
        assert_eq!(render(&mut printer, &[("Web", "Sear", false)]), "[Web] Sear\n");
        assert_eq!(render(&mut printer, &[("Web", "Searching", false)]), "[Web] ...ching\n");
        assert_eq!(render(&mut printer, &[("Web", "Searching", false)]), "");
    }

    #[test]
    fn test_placeholder_replacement_reprints() {
        let mut printer = ThoughtPrinter::new();
        render(&mut printer, &[("Math", "Thinking...", false)]);
        assert_eq!(render(&mut printer, &[("Math", "", false)]), "");
        assert_eq!(render(&mut printer, &[("Math", "4", false)]), "[Math] 4\n");
    }

    #[test]
    fn test_completion_printed_once() {
        let mut printer = ThoughtPrinter::new();
        assert_eq!(
            render(&mut printer, &[("Web", "x", true)]),
            "[Web] x\n[Web] (done)\n"
        );
        assert_eq!(render(&mut printer, &[("Web", "x", true)]), "");
    }

    #[test]
    fn test_empty_source_shows_initializing_once() {
        let mut printer = ThoughtPrinter::new();
        assert_eq!(
            render(&mut printer, &[("Web", "", false)]),
            "[Web] Initializing...\n"
        );
        assert_eq!(render(&mut printer, &[("Web", "", false)]), "");
        assert_eq!(render(&mut printer, &[("Web", "Found", false)]), "[Web] Found\n");
    }
}
