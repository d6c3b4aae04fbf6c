//! XML utility functions for navigating the currency reference document.

use roxmltree::Node;

/// Get the tag name without namespace prefix.
///
/// # Examples
/// ```
/// use roxmltree::Document;
/// use imf_exchangerates::xml::get_tag_name;
///
/// let doc = Document::parse(r#"<CcyTbl><CcyNtry/></CcyTbl>"#).unwrap();
/// let entry = doc.root_element().first_element_child().unwrap();
/// assert_eq!(get_tag_name(entry), "CcyNtry");
/// ```
pub fn get_tag_name<'a>(node: Node<'a, '_>) -> &'a str {
    node.tag_name().name()
}

/// Find the first child element with the given tag name.
pub fn find_child<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && get_tag_name(*child) == tag)
}

/// Find all descendant elements with the given tag name, in document order.
pub fn find_descendants<'a, 'input>(
    node: Node<'a, 'input>,
    tag: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.descendants()
        .filter(move |n| n.is_element() && get_tag_name(*n) == tag)
}

/// Trimmed text of the first child with the given tag, if present and non-empty.
///
/// # Examples
/// ```
/// use roxmltree::Document;
/// use imf_exchangerates::xml::child_text;
///
/// let doc = Document::parse("<CcyNtry><Ccy> EUR </Ccy><CcyNbr/></CcyNtry>").unwrap();
/// let entry = doc.root_element();
/// assert_eq!(child_text(entry, "Ccy"), Some("EUR".to_string()));
/// assert_eq!(child_text(entry, "CcyNbr"), None);
/// assert_eq!(child_text(entry, "CtryNm"), None);
/// ```
pub fn child_text(node: Node<'_, '_>, tag: &str) -> Option<String> {
    find_child(node, tag)
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use roxmltree::Document;

    #[test]
    fn test_find_descendants_nested() {
        let xml = r#"<ISO_4217><CcyTbl><CcyNtry/><CcyNtry/></CcyTbl></ISO_4217>"#;
        let doc = Document::parse(xml).unwrap();
        assert_eq!(find_descendants(doc.root_element(), "CcyNtry").count(), 2);
    }

    #[test]
    fn test_find_child_ignores_grandchildren() {
        let xml = r#"<a><b><c/></b></a>"#;
        let doc = Document::parse(xml).unwrap();
        assert!(find_child(doc.root_element(), "b").is_some());
        assert!(find_child(doc.root_element(), "c").is_none());
    }
}
