//! Plain-text build summary

use std::format;
use std::path::PathBuf;
use std::string::String;
use std::vec::Vec;

const LINE_WIDTH: usize = 60;

/// Summary of one pipeline run
#[derive(Debug, Clone, Default)]
pub struct BuildSummary {
    partitions: Option<String>,
    outputs: Vec<(String, PathBuf)>,
}

impl BuildSummary {
    /// Empty summary
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the pretty partition table
    pub fn set_partitions(&mut self, table: impl Into<String>) {
        self.partitions = Some(table.into());
    }

    /// Record a produced artifact
    pub fn add_output(&mut self, what: impl Into<String>, path: impl Into<PathBuf>) {
        self.outputs.push((what.into(), path.into()));
    }

    /// Artifacts recorded so far
    pub fn outputs(&self) -> impl Iterator<Item = (&str, &PathBuf)> {
        self.outputs.iter().map(|(what, path)| (what.as_str(), path))
    }

    /// Render the summary text
    pub fn render(&self) -> String {
        let rule = "-".repeat(LINE_WIDTH);
        let mut out = format!("{}\n{:-^w$}\n{}\n", rule, "  BUILD  SUMMARY  ", rule, w = LINE_WIDTH);

        if let Some(table) = &self.partitions {
            out.push_str(&format!("{:=^w$}\n", " Partitions Table ", w = LINE_WIDTH));
            out.push_str(table);
        }

        if !self.outputs.is_empty() {
            out.push_str(&format!("{:=^w$}\n", " Output Info ", w = LINE_WIDTH));
            let width = self.outputs.iter().map(|(w, _)| w.len()).max().unwrap_or(0);
            for (what, path) in &self.outputs {
                out.push_str(&format!("{:<width$} : {}\n", what, path.display(), width = width));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        let mut summary = BuildSummary::new();
        summary.set_partitions("table\n");
        summary.add_output("all-app", "build/package/all-app.bin");
        summary.add_output("bootloader", "build/package/bootloader.bin");

        let text = summary.render();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "-".repeat(60));
        assert_eq!(lines[1].len(), 60);
        assert!(lines[1].contains("  BUILD  SUMMARY  "));
        assert_eq!(lines[3].len(), 60);
        assert!(lines[3].contains(" Partitions Table "));
        assert_eq!(lines[4], "table");
        assert!(lines[5].contains(" Output Info "));
        assert_eq!(lines[6], "all-app    : build/package/all-app.bin");
        assert_eq!(summary.outputs().count(), 2);
    }

    #[test]
    fn test_render_empty() {
        let text = BuildSummary::new().render();
        assert_eq!(text.lines().count(), 3);
    }
}
