//! Consolidated text writer
//!
//! Emits one plain-text file per language group: a header block, a table
//! of contents, then every page in group order with its metadata and
//! body text.

use crate::aggregate::LanguageGroup;
use crate::output::traits::{OutputError, OutputResult, OutputWriter};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const RULE_HEAVY: &str =
    "================================================================================";
const RULE_MEDIUM: &str = "============================================================";
const RULE_LIGHT: &str = "------------------------------------------------------------";

/// Writes per-language consolidated `.txt` files
pub struct ConsolidatedTextWriter {
    base_url: String,
    generated_at: String,
}

impl ConsolidatedTextWriter {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Formats one language group as a consolidated document
    pub fn format_group(&self, group: &LanguageGroup) -> String {
        let mut lines: Vec<String> = Vec::new();

        lines.push(RULE_HEAVY.to_string());
        lines.push(format!(
            "CONSOLIDATED SITE CONTENT - {}",
            group.language.to_uppercase()
        ));
        lines.push(RULE_HEAVY.to_string());
        lines.push(format!("Generated on: {}", self.generated_at));
        lines.push(format!("Total pages: {}", group.pages.len()));
        lines.push(format!("Language: {}", group.language));
        lines.push(format!("Source: {}", self.base_url));
        lines.push(RULE_HEAVY.to_string());
        lines.push(String::new());

        lines.push("TABLE OF CONTENTS".to_string());
        lines.push("----------------------------------------".to_string());
        for (i, page) in group.pages.iter().enumerate() {
            lines.push(format!(
                "{:2}. {} ({}) [Score: {}]",
                i + 1,
                page_title(page),
                page.analysis.category,
                page.analysis.importance
            ));
        }
        lines.push(String::new());
        lines.push(RULE_HEAVY.to_string());
        lines.push(String::new());

        for (i, page) in group.pages.iter().enumerate() {
            lines.push(format!("PAGE {}: {}", i + 1, page_title(page).to_uppercase()));
            lines.push(RULE_MEDIUM.to_string());
            lines.push(format!("URL: {}", page.page.url));
            lines.push(format!("Category: {}", page.analysis.category));
            lines.push(format!("Original Language: {}", page.analysis.language));
            lines.push(format!(
                "Importance Score: {}/10",
                page.analysis.importance
            ));
            lines.push(format!("Keywords: {}", page.analysis.keywords.join(", ")));
            lines.push(format!("Summary: {}", page.analysis.summary));
            lines.push(format!("Fetched: {}", page.page.fetched_at));
            lines.push(RULE_LIGHT.to_string());
            lines.push(String::new());
            lines.push(page.page.text.clone());
            lines.push(String::new());
            lines.push(RULE_HEAVY.to_string());
            lines.push(String::new());
        }

        lines.join("\n")
    }
}

impl OutputWriter for ConsolidatedTextWriter {
    fn write_groups(
        &self,
        groups: &BTreeMap<String, LanguageGroup>,
        dir: &Path,
    ) -> OutputResult<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let mut written = Vec::new();
        for (language, group) in groups {
            if group.pages.is_empty() {
                continue;
            }

            let filename = format!("site_content_{}.txt", sanitize_language(language));
            let path = dir.join(filename);
            std::fs::write(&path, self.format_group(group)).map_err(|e| {
                OutputError::Write(format!("{}: {}", path.display(), e))
            })?;
            written.push(path);
        }

        Ok(written)
    }
}

fn page_title(page: &crate::analysis::AnalyzedPage) -> &str {
    page.page.title.as_deref().unwrap_or("Untitled")
}

/// Language tags come from a remote model; keep filenames safe
pub(crate) fn sanitize_language(language: &str) -> String {
    language
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}
