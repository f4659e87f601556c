//! XML Schema validation for `XML_SCHEMA` bodies.
//!
//! Supports the parts of XSD that request bodies use in practice:
//!
//! - global `xs:element` declarations (the document root must match one)
//! - named and anonymous `xs:complexType` with `xs:sequence`, `xs:all`, `xs:choice`
//! - `minOccurs` / `maxOccurs` (including `unbounded`) on elements
//! - `xs:attribute` with `use="required"` and a simple type
//! - named and anonymous `xs:simpleType` restrictions with `xs:enumeration`,
//!   `xs:pattern`, `xs:minLength`, `xs:maxLength`
//! - built-in string, boolean, integer and decimal families and `xs:date`
//!
//! Element and type references resolve by local name; namespaces are not checked.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use sxd_document::dom::{ChildOfElement, Element};
use sxd_document::parser;

use super::xml::{root_element, text_content};

const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

static DATE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\d{4}-\d{2}-\d{2}(Z|[+-]\d{2}:\d{2})?$").expect("static regex"));

#[derive(Debug, Clone, PartialEq)]
enum BuiltIn {
    String,
    Boolean,
    Integer,
    NonNegativeInteger,
    PositiveInteger,
    Decimal,
    Date,
    Any,
}

impl BuiltIn {
    fn from_local_name(name: &str) -> Option<Self> {
        Some(match name {
            "string" | "normalizedString" | "token" | "anyURI" | "NMTOKEN" | "ID" | "IDREF" => {
                BuiltIn::String
            }
            "boolean" => BuiltIn::Boolean,
            "integer" | "int" | "long" | "short" | "byte" | "negativeInteger"
            | "nonPositiveInteger" => BuiltIn::Integer,
            "nonNegativeInteger" | "unsignedInt" | "unsignedLong" | "unsignedShort"
            | "unsignedByte" => BuiltIn::NonNegativeInteger,
            "positiveInteger" => BuiltIn::PositiveInteger,
            "decimal" | "double" | "float" => BuiltIn::Decimal,
            "date" => BuiltIn::Date,
            "anyType" | "anySimpleType" => BuiltIn::Any,
            _ => return None,
        })
    }

    fn accepts(&self, value: &str) -> bool {
        let value = value.trim();
        match self {
            BuiltIn::String | BuiltIn::Any => true,
            BuiltIn::Boolean => matches!(value, "true" | "false" | "1" | "0"),
            BuiltIn::Integer => value.parse::<i128>().is_ok(),
            BuiltIn::NonNegativeInteger => value.parse::<u128>().is_ok(),
            BuiltIn::PositiveInteger => value.parse::<u128>().is_ok_and(|v| v > 0),
            BuiltIn::Decimal => value.parse::<f64>().is_ok(),
            BuiltIn::Date => DATE_REGEX.is_match(value),
        }
    }
}

#[derive(Debug, Clone)]
struct SimpleType {
    base: BuiltIn,
    enumeration: Vec<String>,
    pattern: Option<Regex>,
    min_length: Option<usize>,
    max_length: Option<usize>,
}

impl SimpleType {
    fn of(base: BuiltIn) -> Self {
        Self {
            base,
            enumeration: Vec::new(),
            pattern: None,
            min_length: None,
            max_length: None,
        }
    }

    fn check(&self, value: &str) -> Result<(), String> {
        if !self.base.accepts(value) {
            return Err(format!("value \"{value}\" is not a valid {:?}", self.base));
        }
        if !self.enumeration.is_empty() && !self.enumeration.iter().any(|e| e == value) {
            return Err(format!(
                "value \"{value}\" is not one of {:?}",
                self.enumeration
            ));
        }
        if let Some(pattern) = &self.pattern {
            if !pattern.is_match(value) {
                return Err(format!(
                    "value \"{value}\" does not match pattern {}",
                    pattern.as_str()
                ));
            }
        }
        let length = value.chars().count();
        if self.min_length.is_some_and(|min| length < min) {
            return Err(format!("value \"{value}\" is shorter than the minimum length"));
        }
        if self.max_length.is_some_and(|max| length > max) {
            return Err(format!("value \"{value}\" is longer than the maximum length"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Compositor {
    Sequence,
    All,
    Choice,
}

#[derive(Debug, Clone)]
struct AttributeDecl {
    name: String,
    required: bool,
    type_: SimpleType,
}

#[derive(Debug, Clone)]
struct ComplexType {
    compositor: Compositor,
    children: Vec<ElementDecl>,
    attributes: Vec<AttributeDecl>,
    /// Text content type for `xs:simpleContent`
    text: Option<SimpleType>,
    mixed: bool,
}

#[derive(Debug, Clone)]
enum ContentType {
    Simple(SimpleType),
    Complex(Box<ComplexType>),
    /// Unresolved `type="..."` reference to a named complex type
    Named(String),
}

#[derive(Debug, Clone)]
struct ElementDecl {
    name: String,
    content: ContentType,
    min_occurs: usize,
    max_occurs: Option<usize>,
}

/// A compiled XML Schema subset.
#[derive(Debug, Clone)]
pub struct XmlSchemaValidator {
    roots: Vec<ElementDecl>,
    complex_types: HashMap<String, ComplexType>,
}

fn local(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

fn xs_children<'d>(element: Element<'d>, name: &str) -> Vec<Element<'d>> {
    element
        .children()
        .into_iter()
        .filter_map(|c| match c {
            ChildOfElement::Element(e) if e.name().local_part() == name => Some(e),
            _ => None,
        })
        .collect()
}

fn xs_child<'d>(element: Element<'d>, name: &str) -> Option<Element<'d>> {
    xs_children(element, name).into_iter().next()
}

struct SchemaParser {
    simple_types: HashMap<String, SimpleType>,
}

impl SchemaParser {
    fn resolve_simple(&self, type_name: &str) -> Option<SimpleType> {
        let name = local(type_name);
        BuiltIn::from_local_name(name)
            .map(SimpleType::of)
            .or_else(|| self.simple_types.get(name).cloned())
    }

    fn parse_simple_type(&self, element: Element<'_>) -> Result<SimpleType, String> {
        let Some(restriction) = xs_child(element, "restriction") else {
            return Ok(SimpleType::of(BuiltIn::String));
        };
        let base = restriction.attribute_value("base").unwrap_or("xs:string");
        let mut simple = self
            .resolve_simple(base)
            .ok_or_else(|| format!("unknown simple type {base}"))?;
        for facet in xs_children(restriction, "enumeration") {
            if let Some(v) = facet.attribute_value("value") {
                simple.enumeration.push(v.to_string());
            }
        }
        if let Some(pattern) =
            xs_child(restriction, "pattern").and_then(|p| p.attribute_value("value"))
        {
            simple.pattern = Some(
                Regex::new(&format!("^(?:{pattern})$"))
                    .map_err(|e| format!("invalid pattern {pattern}: {e}"))?,
            );
        }
        let number = |name: &str| {
            xs_child(restriction, name)
                .and_then(|f| f.attribute_value("value"))
                .and_then(|v| v.parse::<usize>().ok())
        };
        simple.min_length = number("minLength").or_else(|| number("length"));
        simple.max_length = number("maxLength").or_else(|| number("length"));
        Ok(simple)
    }

    fn parse_attribute(&self, element: Element<'_>) -> Result<AttributeDecl, String> {
        let name = element
            .attribute_value("name")
            .or_else(|| element.attribute_value("ref"))
            .ok_or("attribute without a name")?;
        let type_ = match element.attribute_value("type") {
            Some(t) => self
                .resolve_simple(t)
                .ok_or_else(|| format!("unknown attribute type {t}"))?,
            None => match xs_child(element, "simpleType") {
                Some(s) => self.parse_simple_type(s)?,
                None => SimpleType::of(BuiltIn::String),
            },
        };
        Ok(AttributeDecl {
            name: local(name).to_string(),
            required: element.attribute_value("use") == Some("required"),
            type_,
        })
    }

    fn parse_complex_type(&self, element: Element<'_>) -> Result<ComplexType, String> {
        let mut complex = ComplexType {
            compositor: Compositor::Sequence,
            children: Vec::new(),
            attributes: Vec::new(),
            text: None,
            mixed: element.attribute_value("mixed") == Some("true"),
        };

        let mut attribute_holder = element;
        if let Some(simple_content) = xs_child(element, "simpleContent") {
            if let Some(extension) = xs_child(simple_content, "extension")
                .or_else(|| xs_child(simple_content, "restriction"))
            {
                let base = extension.attribute_value("base").unwrap_or("xs:string");
                complex.text = Some(
                    self.resolve_simple(base)
                        .ok_or_else(|| format!("unknown simple type {base}"))?,
                );
                attribute_holder = extension;
            }
        }

        for (name, compositor) in [
            ("sequence", Compositor::Sequence),
            ("all", Compositor::All),
            ("choice", Compositor::Choice),
        ] {
            if let Some(group) = xs_child(element, name) {
                complex.compositor = compositor;
                for child in xs_children(group, "element") {
                    complex.children.push(self.parse_element(child)?);
                }
            }
        }

        for attribute in xs_children(attribute_holder, "attribute") {
            complex.attributes.push(self.parse_attribute(attribute)?);
        }
        Ok(complex)
    }

    fn parse_element(&self, element: Element<'_>) -> Result<ElementDecl, String> {
        let name = element
            .attribute_value("name")
            .or_else(|| element.attribute_value("ref"))
            .ok_or("element without a name")?;
        let min_occurs = element
            .attribute_value("minOccurs")
            .map(|v| v.parse::<usize>().map_err(|_| format!("invalid minOccurs {v}")))
            .transpose()?
            .unwrap_or(1);
        let max_occurs = match element.attribute_value("maxOccurs") {
            Some("unbounded") => None,
            Some(v) => Some(
                v.parse::<usize>()
                    .map_err(|_| format!("invalid maxOccurs {v}"))?,
            ),
            None => Some(1),
        };

        let content = if let Some(type_name) = element.attribute_value("type") {
            match self.resolve_simple(type_name) {
                Some(simple) => ContentType::Simple(simple),
                None => ContentType::Named(local(type_name).to_string()),
            }
        } else if let Some(complex) = xs_child(element, "complexType") {
            ContentType::Complex(Box::new(self.parse_complex_type(complex)?))
        } else if let Some(simple) = xs_child(element, "simpleType") {
            ContentType::Simple(self.parse_simple_type(simple)?)
        } else if element.attribute_value("ref").is_some() {
            ContentType::Named(format!("element:{}", local(name)))
        } else {
            ContentType::Simple(SimpleType::of(BuiltIn::Any))
        };

        Ok(ElementDecl {
            name: local(name).to_string(),
            content,
            min_occurs,
            max_occurs,
        })
    }
}

impl XmlSchemaValidator {
    pub fn compile(schema_text: &str) -> Result<Self, String> {
        let package = parser::parse(schema_text)
            .map_err(|e| format!("schema is not well formed XML: {e:?}"))?;
        let document = package.as_document();
        let schema = root_element(&document).ok_or("schema has no root element")?;
        if schema.name().local_part() != "schema" {
            return Err(format!(
                "expected a schema root element, found {}",
                schema.name().local_part()
            ));
        }

        let mut parser = SchemaParser {
            simple_types: HashMap::new(),
        };
        for simple in xs_children(schema, "simpleType") {
            if let Some(name) = simple.attribute_value("name") {
                let parsed = parser.parse_simple_type(simple)?;
                parser.simple_types.insert(name.to_string(), parsed);
            }
        }

        let mut complex_types = HashMap::new();
        for complex in xs_children(schema, "complexType") {
            if let Some(name) = complex.attribute_value("name") {
                complex_types.insert(name.to_string(), parser.parse_complex_type(complex)?);
            }
        }

        let mut roots = Vec::new();
        for element in xs_children(schema, "element") {
            roots.push(parser.parse_element(element)?);
        }
        if roots.is_empty() {
            return Err("schema declares no global elements".to_string());
        }

        Ok(Self {
            roots,
            complex_types,
        })
    }

    /// Validate `document`, returning every violation found.
    pub fn validate(&self, document: &str) -> Vec<String> {
        let package = match parser::parse(document) {
            Ok(p) => p,
            Err(e) => return vec![format!("XML is not well formed: {e:?}")],
        };
        let document = package.as_document();
        let Some(root) = root_element(&document) else {
            return vec!["document has no root element".to_string()];
        };
        let name = root.name().local_part();
        let Some(declaration) = self.roots.iter().find(|d| d.name == name) else {
            return vec![format!("root element {name} is not declared by the schema")];
        };
        let mut errors = Vec::new();
        self.validate_element(declaration, root, "", &mut errors);
        errors
    }

    fn validate_element(
        &self,
        declaration: &ElementDecl,
        element: Element<'_>,
        parent_path: &str,
        errors: &mut Vec<String>,
    ) {
        let path = format!("{parent_path}/{}", declaration.name);
        let mut content = &declaration.content;
        if let ContentType::Named(name) = content {
            if let Some(element_name) = name.strip_prefix("element:") {
                match self.roots.iter().find(|d| d.name == element_name) {
                    Some(referenced) => content = &referenced.content,
                    None => {
                        errors.push(format!("{path}: unknown element reference {element_name}"));
                        return;
                    }
                }
            }
        }
        match content {
            ContentType::Simple(simple) => {
                if let Err(e) = simple.check(&text_content(element)) {
                    errors.push(format!("{path}: {e}"));
                }
            }
            ContentType::Complex(complex) => self.validate_complex(complex, element, &path, errors),
            ContentType::Named(name) => match self.complex_types.get(name) {
                Some(complex) => self.validate_complex(complex, element, &path, errors),
                None => errors.push(format!("{path}: unknown type {name}")),
            },
        }
    }

    fn validate_complex(
        &self,
        complex: &ComplexType,
        element: Element<'_>,
        path: &str,
        errors: &mut Vec<String>,
    ) {
        for attribute in &complex.attributes {
            match element.attribute_value(attribute.name.as_str()) {
                Some(value) => {
                    if let Err(e) = attribute.type_.check(value) {
                        errors.push(format!("{path}/@{}: {e}", attribute.name));
                    }
                }
                None if attribute.required => {
                    errors.push(format!("{path}: missing required attribute {}", attribute.name));
                }
                None => {}
            }
        }
        for attribute in element.attributes() {
            if attribute.name().namespace_uri() == Some(XSI_NAMESPACE) {
                continue;
            }
            let name = attribute.name().local_part();
            if !complex.attributes.iter().any(|a| a.name == name) {
                errors.push(format!("{path}: unexpected attribute {name}"));
            }
        }

        let text = text_content(element);
        match &complex.text {
            Some(simple) => {
                if let Err(e) = simple.check(&text) {
                    errors.push(format!("{path}: {e}"));
                }
            }
            None if !complex.mixed && !text.is_empty() => {
                errors.push(format!("{path}: unexpected text content \"{text}\""));
            }
            None => {}
        }

        let children: Vec<Element<'_>> = element
            .children()
            .into_iter()
            .filter_map(|c| match c {
                ChildOfElement::Element(e) => Some(e),
                _ => None,
            })
            .collect();

        match complex.compositor {
            Compositor::Sequence => self.validate_sequence(complex, &children, path, errors),
            Compositor::All => self.validate_all(complex, &children, path, errors),
            Compositor::Choice => self.validate_choice(complex, &children, path, errors),
        }
    }

    fn validate_sequence(
        &self,
        complex: &ComplexType,
        children: &[Element<'_>],
        path: &str,
        errors: &mut Vec<String>,
    ) {
        let mut index = 0;
        for declaration in &complex.children {
            let mut count = 0;
            while index < children.len()
                && children[index].name().local_part() == declaration.name
                && declaration.max_occurs.is_none_or(|max| count < max)
            {
                self.validate_element(declaration, children[index], path, errors);
                index += 1;
                count += 1;
            }
            if count < declaration.min_occurs {
                errors.push(format!(
                    "{path}: expected at least {} {} element(s) found {count}",
                    declaration.min_occurs, declaration.name
                ));
            }
        }
        for extra in &children[index..] {
            errors.push(format!(
                "{path}: unexpected element {}",
                extra.name().local_part()
            ));
        }
    }

    fn validate_all(
        &self,
        complex: &ComplexType,
        children: &[Element<'_>],
        path: &str,
        errors: &mut Vec<String>,
    ) {
        for declaration in &complex.children {
            let matching: Vec<_> = children
                .iter()
                .filter(|c| c.name().local_part() == declaration.name)
                .collect();
            if matching.len() < declaration.min_occurs {
                errors.push(format!("{path}: missing element {}", declaration.name));
            }
            if declaration.max_occurs.is_some_and(|max| matching.len() > max) {
                errors.push(format!(
                    "{path}: too many {} elements ({})",
                    declaration.name,
                    matching.len()
                ));
            }
            for child in matching {
                self.validate_element(declaration, *child, path, errors);
            }
        }
        for child in children {
            let name = child.name().local_part();
            if !complex.children.iter().any(|d| d.name == name) {
                errors.push(format!("{path}: unexpected element {name}"));
            }
        }
    }

    fn validate_choice(
        &self,
        complex: &ComplexType,
        children: &[Element<'_>],
        path: &str,
        errors: &mut Vec<String>,
    ) {
        let Some(first) = children.first() else {
            if complex.children.iter().all(|d| d.min_occurs > 0) && !complex.children.is_empty() {
                errors.push(format!("{path}: expected one of the choice elements"));
            }
            return;
        };
        let name = first.name().local_part();
        let Some(declaration) = complex.children.iter().find(|d| d.name == name) else {
            errors.push(format!("{path}: unexpected element {name}"));
            return;
        };
        for child in children {
            if child.name().local_part() != declaration.name {
                errors.push(format!(
                    "{path}: unexpected element {} in choice",
                    child.name().local_part()
                ));
                continue;
            }
            self.validate_element(declaration, *child, path, errors);
        }
        if declaration
            .max_occurs
            .is_some_and(|max| children.len() > max)
        {
            errors.push(format!("{path}: too many {name} elements"));
        }
    }
}
