//! Multilingual aggregator
//!
//! Groups analyzed pages by detected language and orders each group for
//! output. The grouping is rebuilt fully from the complete set of
//! analyzed pages every time; it is never incrementally mutated, so the
//! result is reproducible from the same page set regardless of
//! processing order.

use crate::analysis::{AnalyzedPage, MIXED_LANGUAGE, UNKNOWN_LANGUAGE};
use std::collections::BTreeMap;

/// One ordered, per-language output set
#[derive(Debug, Clone)]
pub struct LanguageGroup {
    /// The language tag this group collects
    pub language: String,

    /// Pages sorted by importance descending, ties broken by discovery
    /// order ascending
    pub pages: Vec<AnalyzedPage>,
}

/// Groups analyzed pages into per-language ordered sets
///
/// A page joins several groups only when the analysis explicitly lists
/// more than one language for it. A page tagged "mixed" without such a
/// list lands in the dedicated "mixed" group; it is never silently
/// dropped or merged into a single dominant language. Pages whose
/// analysis failed carry the "unknown" tag and group accordingly.
pub fn aggregate(pages: &[AnalyzedPage]) -> BTreeMap<String, LanguageGroup> {
    let mut buckets: BTreeMap<String, Vec<AnalyzedPage>> = BTreeMap::new();

    for page in pages {
        for language in group_membership(page) {
            buckets.entry(language).or_default().push(page.clone());
        }
    }

    buckets
        .into_iter()
        .map(|(language, mut pages)| {
            pages.sort_by(|a, b| {
                b.analysis
                    .importance
                    .cmp(&a.analysis.importance)
                    .then(a.page.discovery_order.cmp(&b.page.discovery_order))
            });
            (
                language.clone(),
                LanguageGroup { language, pages },
            )
        })
        .collect()
}

/// The language groups one page belongs to
fn group_membership(page: &AnalyzedPage) -> Vec<String> {
    let mut explicit: Vec<String> = page
        .analysis
        .languages
        .iter()
        .map(|l| normalize_tag(l))
        .filter(|l| l != MIXED_LANGUAGE)
        .collect();
    explicit.sort();
    explicit.dedup();

    if explicit.len() > 1 {
        return explicit;
    }

    vec![normalize_tag(&page.analysis.language)]
}

fn normalize_tag(tag: &str) -> String {
    let normalized = tag.trim().to_lowercase();
    if normalized.is_empty() {
        UNKNOWN_LANGUAGE.to_string()
    } else {
        normalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisResult;
    use crate::crawler::PageRecord;

    fn page_with(
        url: &str,
        order: u64,
        language: &str,
        languages: &[&str],
        importance: u8,
    ) -> AnalyzedPage {
        AnalyzedPage {
            page: PageRecord {
                url: url.to_string(),
                title: None,
                text: "text".to_string(),
                status: 200,
                fetched_at: "2024-01-01T00:00:00Z".to_string(),
                depth: 0,
                discovery_order: order,
            },
            analysis: AnalysisResult {
                language: language.to_string(),
                languages: languages.iter().map(|s| s.to_string()).collect(),
                category: "general".to_string(),
                summary: String::new(),
                keywords: vec![],
                importance,
            },
        }
    }

    #[test]
    fn test_group_by_single_language() {
        let pages = vec![
            page_with("https://example.com/a", 0, "english", &[], 5),
            page_with("https://example.com/b", 1, "french", &[], 5),
        ];

        let groups = aggregate(&pages);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups["english"].pages.len(), 1);
        assert_eq!(groups["french"].pages.len(), 1);
    }

    #[test]
    fn test_ordering_importance_then_discovery() {
        // Scores [3, 9, 9, 1] over discovery order [d1, d2, d3, d4]:
        // expected output order d2(9), d3(9), d1(3), d4(1)
        let pages = vec![
            page_with("https://example.com/d1", 1, "english", &[], 3),
            page_with("https://example.com/d2", 2, "english", &[], 9),
            page_with("https://example.com/d3", 3, "english", &[], 9),
            page_with("https://example.com/d4", 4, "english", &[], 1),
        ];

        let groups = aggregate(&pages);
        let ordered: Vec<&str> = groups["english"]
            .pages
            .iter()
            .map(|p| p.page.url.as_str())
            .collect();

        assert_eq!(
            ordered,
            vec![
                "https://example.com/d2",
                "https://example.com/d3",
                "https://example.com/d1",
                "https://example.com/d4",
            ]
        );
    }

    #[test]
    fn test_ordering_is_input_order_independent() {
        let mut pages = vec![
            page_with("https://example.com/d1", 1, "english", &[], 3),
            page_with("https://example.com/d2", 2, "english", &[], 9),
            page_with("https://example.com/d3", 3, "english", &[], 9),
            page_with("https://example.com/d4", 4, "english", &[], 1),
        ];

        let forward = aggregate(&pages);
        pages.reverse();
        let backward = aggregate(&pages);

        let order_of = |groups: &BTreeMap<String, LanguageGroup>| -> Vec<String> {
            groups["english"]
                .pages
                .iter()
                .map(|p| p.page.url.clone())
                .collect()
        };

        assert_eq!(order_of(&forward), order_of(&backward));
    }

    #[test]
    fn test_explicit_multi_language_joins_each_group() {
        let pages = vec![page_with(
            "https://example.com/bilingual",
            0,
            "mixed",
            &["english", "french"],
            5,
        )];

        let groups = aggregate(&pages);

        assert!(groups.contains_key("english"));
        assert!(groups.contains_key("french"));
        assert!(!groups.contains_key("mixed"));
        assert_eq!(groups["english"].pages[0].page.url, pages[0].page.url);
    }

    #[test]
    fn test_mixed_without_list_goes_to_mixed_group() {
        let pages = vec![page_with("https://example.com/mixed", 0, "mixed", &[], 5)];

        let groups = aggregate(&pages);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups["mixed"].pages.len(), 1);
    }

    #[test]
    fn test_single_entry_language_list_is_not_multi() {
        let pages = vec![page_with(
            "https://example.com/page",
            0,
            "portuguese",
            &["portuguese"],
            5,
        )];

        let groups = aggregate(&pages);

        assert_eq!(groups.len(), 1);
        assert!(groups.contains_key("portuguese"));
    }

    #[test]
    fn test_unanalyzed_page_in_unknown_bucket() {
        let mut page = page_with("https://example.com/broken", 0, "unknown", &[], 0);
        page.analysis = AnalysisResult::unanalyzed();

        let groups = aggregate(&[page]);

        assert_eq!(groups["unknown"].pages.len(), 1);
        assert_eq!(groups["unknown"].pages[0].analysis.importance, 0);
    }

    #[test]
    fn test_empty_input() {
        let groups = aggregate(&[]);
        assert!(groups.is_empty());
    }

    #[test]
    fn test_language_tags_normalized() {
        let pages = vec![
            page_with("https://example.com/a", 0, " English ", &[], 5),
            page_with("https://example.com/b", 1, "english", &[], 5),
        ];

        let groups = aggregate(&pages);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups["english"].pages.len(), 2);
    }
}
