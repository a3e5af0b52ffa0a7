//! Field extraction from registry result pages
//!
//! The result page has no stable structure: labels and values appear as bold
//! text followed by a div, as table cells, or as loose text. Extraction therefore
//! works on text rather than selectors:
//!
//! 1. For each field, try its candidate labels in order
//! 2. A label matches the first text node (document order) whose normalized
//!    text contains the normalized label
//! 3. The value is resolved by the strategies in `DEFAULT_STRATEGIES`
//! 4. If the identifier field is still missing, the first masked identifier
//!    anywhere in the page text is used
//!
//! Fields that cannot be resolved are left out of the record.

use crate::scrape::labels::{FieldSpec, FIELDS, IDENTIFIER_FIELD};
use crate::scrape::record::ExtractedRecord;
use crate::scrape::strategies::{LabelMatch, ValueStrategy, DEFAULT_STRATEGIES};
use crate::scrape::text::normalize_text;
use regex::Regex;
use scraper::{ElementRef, Html, Node};
use std::sync::OnceLock;

/// Masked identifier as printed on result pages
fn masked_identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\d{2}\.\d{3}\.\d{3}/\d{4}-\d{2}").expect("identifier pattern is valid")
    })
}

/// Extracts every known field from a result page
///
/// # Example
///
/// ```
/// use sintegra_queue::scrape::extract_record;
///
/// let html = "<div><b>Nome Empresarial</b><div>ACME LTDA</div></div>";
/// let record = extract_record(html);
/// assert_eq!(record.get("razao_social"), Some("ACME LTDA"));
/// assert!(!record.contains("nome_fantasia"));
/// ```
pub fn extract_record(html: &str) -> ExtractedRecord {
    extract_with(html, FIELDS, DEFAULT_STRATEGIES)
}

/// Extracts `fields` from a page using the given strategies in order
pub fn extract_with(
    html: &str,
    fields: &[FieldSpec],
    strategies: &[&dyn ValueStrategy],
) -> ExtractedRecord {
    let document = Html::parse_document(html);
    let mut record = ExtractedRecord::new();

    for field in fields {
        if let Some(value) = resolve_field(&document, field, strategies) {
            record.insert(field.name, value);
        }
    }

    let wants_identifier = fields.iter().any(|f| f.name == IDENTIFIER_FIELD);
    if wants_identifier && !record.contains(IDENTIFIER_FIELD) {
        if let Some(found) = find_masked_identifier(&document) {
            tracing::debug!("Identifier resolved from page text fallback");
            record.insert(IDENTIFIER_FIELD, found);
        }
    }

    record
}

/// Tries each label of a field until one yields a value
fn resolve_field(
    document: &Html,
    field: &FieldSpec,
    strategies: &[&dyn ValueStrategy],
) -> Option<String> {
    for label in field.labels {
        let Some(found) = find_label(document, label) else {
            continue;
        };

        for strategy in strategies {
            if let Some(value) = strategy.resolve(&found) {
                tracing::trace!(field = field.name, strategy = strategy.name(), "Field resolved");
                return Some(value);
            }
        }
    }
    None
}

/// Locates the first text node containing `label` (normalized comparison)
fn find_label<'a>(document: &'a Html, label: &str) -> Option<LabelMatch<'a>> {
    let wanted = normalize_text(label);
    if wanted.is_empty() {
        return None;
    }

    document.tree.root().descendants().find_map(|node| {
        let Node::Text(text) = node.value() else {
            return None;
        };
        let normalized = normalize_text(text);
        if !normalized.contains(&wanted) {
            return None;
        }
        let element = node.parent().and_then(ElementRef::wrap)?;
        Some(LabelMatch {
            element,
            label: wanted.clone(),
        })
    })
}

/// First masked identifier in the page text
fn find_masked_identifier(document: &Html) -> Option<String> {
    let text = document.root_element().text().collect::<Vec<_>>().join(" ");
    masked_identifier_pattern()
        .find(&text)
        .map(|m| m.as_str().to_string())
}
