//! Value resolution strategies
//!
//! Once a label is located on the page, its value is resolved by trying each
//! strategy in order and keeping the first non-empty answer. Each strategy is
//! independent so they can be exercised one at a time.

use crate::scrape::text::{clean_text, normalize_text};
use ego_tree::NodeRef;
use scraper::{ElementRef, Node};

/// A label found on the page
#[derive(Debug, Clone)]
pub struct LabelMatch<'a> {
    /// Element whose own text contains the label
    pub element: ElementRef<'a>,

    /// The candidate label, normalized
    pub label: String,
}

impl<'a> LabelMatch<'a> {
    /// True if `normalized` is just the label again rather than a value
    pub fn is_label(&self, normalized: &str) -> bool {
        normalized == self.label
    }
}

/// Cleaned text, or None when nothing is left
fn non_empty(raw: &str) -> Option<String> {
    let text = clean_text(raw);
    (!text.is_empty()).then_some(text)
}

/// One way of finding the value that belongs to a label
pub trait ValueStrategy: Sync {
    /// Short name for logs and tests
    fn name(&self) -> &'static str;

    /// Returns the value, or None to let the next strategy try
    fn resolve(&self, found: &LabelMatch<'_>) -> Option<String>;
}

/// The label element's next sibling element: `<b>CNPJ</b><div>value</div>`
#[derive(Debug, Clone, Copy, Default)]
pub struct NextSibling;

/// The second cell of the table row holding the label
#[derive(Debug, Clone, Copy, Default)]
pub struct TableRowCell;

/// The first text after the label, in document order, that is not the label
#[derive(Debug, Clone, Copy, Default)]
pub struct FollowingText;

/// Strategies in the order they are tried
pub static DEFAULT_STRATEGIES: &[&dyn ValueStrategy] = &[&NextSibling, &TableRowCell, &FollowingText];

impl ValueStrategy for NextSibling {
    fn name(&self) -> &'static str {
        "next_sibling"
    }

    fn resolve(&self, found: &LabelMatch<'_>) -> Option<String> {
        let sibling = found.element.next_siblings().find_map(ElementRef::wrap)?;
        non_empty(&element_text(sibling))
    }
}

impl ValueStrategy for TableRowCell {
    fn name(&self) -> &'static str {
        "table_row_cell"
    }

    fn resolve(&self, found: &LabelMatch<'_>) -> Option<String> {
        let row = found
            .element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "tr")?;

        let second_cell = row
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|cell| matches!(cell.value().name(), "td" | "th"))
            .nth(1)?;

        non_empty(&element_text(second_cell))
    }
}

impl ValueStrategy for FollowingText {
    fn name(&self) -> &'static str {
        "following_text"
    }

    fn resolve(&self, found: &LabelMatch<'_>) -> Option<String> {
        // Only this walk skips repeats of the label; the label's own text node comes first
        following_nodes(*found.element)
            .filter_map(node_text)
            .find(|text| !text.is_empty() && !found.is_label(&normalize_text(text)))
    }
}

/// Text of an element with its text nodes joined by spaces, whitespace collapsed
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

/// Text carried by a node; None for comments, doctypes and the like
fn node_text(node: NodeRef<'_, Node>) -> Option<String> {
    match node.value() {
        Node::Text(text) => Some(clean_text(text)),
        Node::Element(_) => ElementRef::wrap(node).map(element_text),
        _ => None,
    }
}

/// Every node after `start` in document order, starting with its own descendants
fn following_nodes<'a>(start: NodeRef<'a, Node>) -> impl Iterator<Item = NodeRef<'a, Node>> {
    let root = start.ancestors().last().unwrap_or(start);
    let start_id = start.id();
    root.descendants()
        .skip_while(move |node| node.id() != start_id)
        .skip(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn label_in<'a>(doc: &'a Html, selector: &str, label: &str) -> LabelMatch<'a> {
        let selector = Selector::parse(selector).unwrap();
        let element = doc.select(&selector).next().unwrap();
        LabelMatch {
            element,
            label: normalize_text(label),
        }
    }

    #[test]
    fn test_next_sibling() {
        let doc = Html::parse_document(
            "<div><b id='l'>Nome Fantasia</b>\n  <span> LOJA  CENTRAL </span></div>",
        );
        let found = label_in(&doc, "#l", "Nome Fantasia");
        assert_eq!(NextSibling.resolve(&found), Some("LOJA CENTRAL".to_string()));
    }

    #[test]
    fn test_next_sibling_missing() {
        let doc = Html::parse_document("<div><b id='l'>Nome Fantasia</b></div><p>Later</p>");
        let found = label_in(&doc, "#l", "Nome Fantasia");
        assert_eq!(NextSibling.resolve(&found), None);
    }

    #[test]
    fn test_table_row_cell() {
        let doc = Html::parse_document(
            "<table><tr><td><b id='l'>Regime de Apuração</b></td><td>NORMAL</td></tr></table>",
        );
        let found = label_in(&doc, "#l", "Regime de Apuração");
        assert_eq!(NextSibling.resolve(&found), None);
        assert_eq!(TableRowCell.resolve(&found), Some("NORMAL".to_string()));
    }

    #[test]
    fn test_table_row_cell_outside_table() {
        let doc = Html::parse_document("<div><b id='l'>Regime de Apuração</b></div>");
        let found = label_in(&doc, "#l", "Regime de Apuração");
        assert_eq!(TableRowCell.resolve(&found), None);
    }

    #[test]
    fn test_following_text_skips_label_repeats() {
        let doc = Html::parse_document(
            "<div><span><b id='l'>Observações</b></span></div>\
             <div>observacoes</div><div>  </div><div>Sem restrições</div>",
        );
        let found = label_in(&doc, "#l", "Observações");
        assert_eq!(NextSibling.resolve(&found), None);
        assert_eq!(TableRowCell.resolve(&found), None);
        assert_eq!(
            FollowingText.resolve(&found),
            Some("Sem restrições".to_string())
        );
    }

    #[test]
    fn test_sibling_and_cell_values_are_taken_as_is() {
        let doc = Html::parse_document(
            "<table><tr><td><b id='l'>Nome Fantasia</b><i>Nome Fantasia</i></td>\
             <td>nome fantasia</td></tr></table>",
        );
        let found = label_in(&doc, "#l", "Nome Fantasia");
        assert_eq!(NextSibling.resolve(&found), Some("Nome Fantasia".to_string()));
        assert_eq!(TableRowCell.resolve(&found), Some("nome fantasia".to_string()));
    }

    #[test]
    fn test_following_text_compares_against_label_only() {
        let doc = Html::parse_document(
            "<div><b id='l'>Data da Consulta</b></div><div>Data da Consulta: hoje</div>",
        );
        let found = label_in(&doc, "#l", "Data da Consulta");
        assert_eq!(
            FollowingText.resolve(&found),
            Some("Data da Consulta: hoje".to_string())
        );
    }

    #[test]
    fn test_strategy_order() {
        let names: Vec<_> = DEFAULT_STRATEGIES.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["next_sibling", "table_row_cell", "following_text"]);
    }
}
