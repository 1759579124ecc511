//! Paginated document writer
//!
//! Emits one paginated plain-text document per language group: a title
//! page, a table of contents, then the page content flowed into
//! fixed-height pages with numbered footers.

use crate::aggregate::LanguageGroup;
use crate::output::text::sanitize_language;
use crate::output::traits::{OutputError, OutputResult, OutputWriter};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const DEFAULT_LINES_PER_PAGE: usize = 50;
const DEFAULT_LINE_WIDTH: usize = 80;

/// Writes per-language paginated documents
pub struct PaginatedDocumentWriter {
    base_url: String,
    generated_at: String,
    lines_per_page: usize,
    line_width: usize,
}

impl PaginatedDocumentWriter {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            lines_per_page: DEFAULT_LINES_PER_PAGE,
            line_width: DEFAULT_LINE_WIDTH,
        }
    }

    #[cfg(test)]
    fn with_page_size(mut self, lines_per_page: usize, line_width: usize) -> Self {
        self.lines_per_page = lines_per_page;
        self.line_width = line_width;
        self
    }

    /// Renders one language group as a paginated document
    pub fn format_group(&self, group: &LanguageGroup) -> String {
        let mut body: Vec<String> = Vec::new();

        // Title page content
        body.push(center("CONSOLIDATED SITE CONTENT", self.line_width));
        body.push(center(&group.language.to_uppercase(), self.line_width));
        body.push(String::new());
        body.push(center(&format!("Source: {}", self.base_url), self.line_width));
        body.push(center(
            &format!("Generated: {}", self.generated_at),
            self.line_width,
        ));
        body.push(center(
            &format!("Pages: {}", group.pages.len()),
            self.line_width,
        ));
        body.push(PAGE_BREAK.to_string());

        // Table of contents
        body.push("TABLE OF CONTENTS".to_string());
        body.push(String::new());
        for (i, page) in group.pages.iter().enumerate() {
            body.push(format!(
                "{:2}. {} ({}) [Score: {}]",
                i + 1,
                title_of(page),
                page.analysis.category,
                page.analysis.importance
            ));
        }
        body.push(PAGE_BREAK.to_string());

        // Page sections, each starting on a fresh page
        for (i, page) in group.pages.iter().enumerate() {
            body.push(format!("{}. {}", i + 1, title_of(page)));
            body.push(format!("URL: {}", page.page.url));
            body.push(format!(
                "Category: {} | Language: {} | Score: {}/10",
                page.analysis.category, page.analysis.language, page.analysis.importance
            ));
            if !page.analysis.summary.is_empty() {
                body.push(format!("Summary: {}", page.analysis.summary));
            }
            body.push(String::new());
            for paragraph in page.page.text.split('\n') {
                for line in wrap(paragraph, self.line_width) {
                    body.push(line);
                }
            }
            if i + 1 < group.pages.len() {
                body.push(PAGE_BREAK.to_string());
            }
        }

        self.paginate(&body)
    }

    /// Flows content lines into fixed-height pages with numbered footers
    fn paginate(&self, lines: &[String]) -> String {
        let mut pages: Vec<Vec<String>> = vec![Vec::new()];

        for line in lines {
            if line == PAGE_BREAK {
                pages.push(Vec::new());
                continue;
            }
            if pages
                .last()
                .map(|p| p.len() >= self.lines_per_page)
                .unwrap_or(false)
            {
                pages.push(Vec::new());
            }
            if let Some(page) = pages.last_mut() {
                page.push(line.clone());
            }
        }

        let total = pages.len();
        let mut out = String::new();
        for (number, page) in pages.iter().enumerate() {
            let mut content = page.join("\n");
            // Pad short pages so every footer lands at the same height
            let padding = self.lines_per_page.saturating_sub(page.len());
            content.push_str(&"\n".repeat(padding + 1));
            content.push_str(&center(
                &format!("- {} / {} -", number + 1, total),
                self.line_width,
            ));
            out.push_str(&content);
            if number + 1 < total {
                out.push_str("\n\x0c\n");
            }
        }
        out
    }
}

/// Marker for forced page breaks inside the rendered body
const PAGE_BREAK: &str = "\x0c";

impl OutputWriter for PaginatedDocumentWriter {
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

            let filename = format!("site_content_{}_paginated.txt", sanitize_language(language));
            let path = dir.join(filename);
            std::fs::write(&path, self.format_group(group)).map_err(|e| {
                OutputError::Write(format!("{}: {}", path.display(), e))
            })?;
            written.push(path);
        }

        Ok(written)
    }
}

fn title_of(page: &crate::analysis::AnalyzedPage) -> &str {
    page.page.title.as_deref().unwrap_or("Untitled")
}

fn center(text: &str, width: usize) -> String {
    if text.len() >= width {
        return text.to_string();
    }
    let pad = (width - text.len()) / 2;
    format!("{}{}", " ".repeat(pad), text)
}

/// Greedy word wrap
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
        } else if current.len() + 1 + word.len() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(current);
            current = word.to_string();
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
