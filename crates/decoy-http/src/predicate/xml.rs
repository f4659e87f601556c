//! XML body comparison and XPath evaluation.

use sxd_document::dom::{ChildOfElement, ChildOfRoot, Document, Element};
use sxd_document::parser;

/// Structural XML equality. Whitespace-only text, comments and processing
/// instructions are ignored; attributes compare as a set; child element order
/// is significant.
pub fn xml_matches(expected: &str, actual: &str, reasons: &mut Vec<String>) -> bool {
    let expected_package = match parser::parse(expected) {
        Ok(p) => p,
        Err(e) => {
            reasons.push(format!("expected XML is not well formed: {e:?}"));
            return false;
        }
    };
    let actual_package = match parser::parse(actual) {
        Ok(p) => p,
        Err(e) => {
            reasons.push(format!("XML is not well formed: {e:?}"));
            return false;
        }
    };

    match (
        root_element(&expected_package.as_document()),
        root_element(&actual_package.as_document()),
    ) {
        (Some(e), Some(a)) => compare_elements(e, a, "", reasons),
        _ => {
            reasons.push("document has no root element".to_string());
            false
        }
    }
}

pub(crate) fn root_element<'d>(document: &Document<'d>) -> Option<Element<'d>> {
    document.root().children().into_iter().find_map(|child| match child {
        ChildOfRoot::Element(e) => Some(e),
        _ => None,
    })
}

fn qualified(element: Element<'_>) -> String {
    match element.name().namespace_uri() {
        Some(ns) => format!("{{{ns}}}{}", element.name().local_part()),
        None => element.name().local_part().to_string(),
    }
}

fn child_elements(element: Element<'_>) -> Vec<Element<'_>> {
    element
        .children()
        .into_iter()
        .filter_map(|child| match child {
            ChildOfElement::Element(e) => Some(e),
            _ => None,
        })
        .collect()
}

/// Concatenated direct text content, trimmed.
pub(crate) fn text_content(element: Element<'_>) -> String {
    let mut text = String::new();
    for child in element.children() {
        if let ChildOfElement::Text(t) = child {
            text.push_str(t.text());
        }
    }
    text.trim().to_string()
}

fn compare_elements(
    expected: Element<'_>,
    actual: Element<'_>,
    parent_path: &str,
    reasons: &mut Vec<String>,
) -> bool {
    let path = format!("{parent_path}/{}", expected.name().local_part());
    if qualified(expected) != qualified(actual) {
        reasons.push(format!(
            "{path} expected element {} found {}",
            qualified(expected),
            qualified(actual)
        ));
        return false;
    }

    let mut ok = true;

    let mut expected_attributes: Vec<(String, String)> = expected
        .attributes()
        .iter()
        .map(|a| (a.name().local_part().to_string(), a.value().to_string()))
        .collect();
    let mut actual_attributes: Vec<(String, String)> = actual
        .attributes()
        .iter()
        .map(|a| (a.name().local_part().to_string(), a.value().to_string()))
        .collect();
    expected_attributes.sort();
    actual_attributes.sort();
    if expected_attributes != actual_attributes {
        reasons.push(format!(
            "{path} expected attributes {expected_attributes:?} found {actual_attributes:?}"
        ));
        ok = false;
    }

    let expected_text = text_content(expected);
    let actual_text = text_content(actual);
    if expected_text != actual_text {
        reasons.push(format!(
            "{path} expected text \"{expected_text}\" found \"{actual_text}\""
        ));
        ok = false;
    }

    let expected_children = child_elements(expected);
    let actual_children = child_elements(actual);
    if expected_children.len() != actual_children.len() {
        reasons.push(format!(
            "{path} expected {} child elements found {}",
            expected_children.len(),
            actual_children.len()
        ));
        return false;
    }
    for (e, a) in expected_children.into_iter().zip(actual_children) {
        ok &= compare_elements(e, a, &path, reasons);
    }
    ok
}

/// Whether `xpath` is a syntactically valid expression.
pub fn validate_xpath(xpath: &str) -> Result<(), String> {
    let package = parser::parse("<validate/>").map_err(|e| format!("{e:?}"))?;
    match sxd_xpath::evaluate_xpath(&package.as_document(), xpath) {
        Err(sxd_xpath::Error::Parsing(e)) => Err(format!("{e:?}")),
        _ => Ok(()),
    }
}

/// Evaluate `xpath` against `document` and convert the result to a boolean:
/// a non-empty node set, a non-empty string, a non-zero number or `true`.
pub fn xpath_matches(xpath: &str, document: &str, reasons: &mut Vec<String>) -> bool {
    use sxd_xpath::{evaluate_xpath, Value};

    let package = match parser::parse(document) {
        Ok(p) => p,
        Err(e) => {
            reasons.push(format!("XML is not well formed: {e:?}"));
            return false;
        }
    };
    let document = package.as_document();

    match evaluate_xpath(&document, xpath) {
        Ok(Value::Boolean(b)) => b,
        Ok(Value::Nodeset(nodes)) => nodes.size() > 0,
        Ok(Value::String(s)) => !s.is_empty(),
        Ok(Value::Number(n)) => n != 0.0 && !n.is_nan(),
        Err(e) => {
            reasons.push(format!("xpath {xpath} failed: {e:?}"));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(expected: &str, actual: &str) -> bool {
        xml_matches(expected, actual, &mut Vec::new())
    }

    #[test]
    fn test_xml_ignores_whitespace_and_attribute_order() {
        assert!(matches(
            r#"<order id="1" status="new"><item>a</item></order>"#,
            "<order status=\"new\" id=\"1\">\n  <item> a </item>\n</order>"
        ));
    }

    #[test]
    fn test_xml_detects_differences() {
        assert!(!matches("<a><b>1</b></a>", "<a><b>2</b></a>"));
        assert!(!matches("<a><b/></a>", "<a><b/><c/></a>"));
        assert!(!matches("<a x=\"1\"/>", "<a/>"));
        assert!(!matches("<a/>", "<a"));
    }

    #[test]
    fn test_xml_child_order_matters() {
        assert!(!matches("<a><b/><c/></a>", "<a><c/><b/></a>"));
    }

    #[test]
    fn test_xpath_results() {
        let doc = r#"<order><item price="5">a</item><item price="7">b</item></order>"#;
        let mut reasons = Vec::new();
        assert!(xpath_matches("/order/item[@price='7']", doc, &mut reasons));
        assert!(!xpath_matches("/order/item[@price='9']", doc, &mut reasons));
        assert!(xpath_matches("count(/order/item) = 2", doc, &mut reasons));
        assert!(!xpath_matches("/order", "not xml", &mut reasons));
    }

    #[test]
    fn test_validate_xpath() {
        assert!(validate_xpath("/order/item").is_ok());
        assert!(validate_xpath("/order/[").is_err());
    }
}
