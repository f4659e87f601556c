//! Content types and charsets.
//!
//! Parsing lower-cases the type, subtype and parameter names. An unknown charset
//! parameter is kept for display but ignored when decoding.

use std::fmt;

/// Charsets understood when decoding and encoding bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Utf8,
    Iso8859_1,
    UsAscii,
}

/// Default HTTP charset when a content type names none.
pub const DEFAULT_HTTP_CHARSET: Charset = Charset::Iso8859_1;

impl Charset {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().trim_matches('"').to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Some(Charset::Utf8),
            "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" => Some(Charset::Iso8859_1),
            "us-ascii" | "ascii" => Some(Charset::UsAscii),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Charset::Utf8 => "utf-8",
            Charset::Iso8859_1 => "iso-8859-1",
            Charset::UsAscii => "us-ascii",
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Charset::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Charset::Iso8859_1 => bytes.iter().map(|&b| b as char).collect(),
            Charset::UsAscii => bytes
                .iter()
                .map(|&b| if b.is_ascii() { b as char } else { '\u{FFFD}' })
                .collect(),
        }
    }

    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            Charset::Utf8 => text.as_bytes().to_vec(),
            Charset::Iso8859_1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
            Charset::UsAscii => text
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                .collect(),
        }
    }
}

/// A parsed `type/subtype; name=value` content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    pub type_: String,
    pub subtype: String,
    parameters: Vec<(String, String)>,
    charset: Option<Charset>,
}

impl MediaType {
    pub fn new(type_: &str, subtype: &str) -> Self {
        Self {
            type_: type_.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
            parameters: Vec::new(),
            charset: None,
        }
    }

    pub fn application_json() -> Self {
        Self::new("application", "json")
    }

    pub fn application_xml() -> Self {
        Self::new("application", "xml")
    }

    pub fn text_plain() -> Self {
        Self::new("text", "plain")
    }

    pub fn form_urlencoded() -> Self {
        Self::new("application", "x-www-form-urlencoded")
    }

    pub fn octet_stream() -> Self {
        Self::new("application", "octet-stream")
    }

    /// Parse a content type header value. Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let mut parts = raw.split(';');
        let full_type = parts.next().unwrap_or_default().trim();
        let (type_, subtype) = match full_type.split_once('/') {
            Some((t, s)) => (t.trim(), s.trim()),
            None => (full_type, ""),
        };
        let mut media_type = Self::new(type_, subtype);
        for parameter in parts {
            if let Some((name, value)) = parameter.split_once('=') {
                let name = name.trim().to_ascii_lowercase();
                let value = value.trim().trim_matches('"').to_string();
                if name == "charset" {
                    media_type.charset = Charset::from_name(&value);
                }
                media_type.parameters.push((name, value));
            }
        }
        Some(media_type)
    }

    pub fn with_charset(mut self, charset: Charset) -> Self {
        self.parameters.retain(|(name, _)| name != "charset");
        self.parameters
            .push(("charset".to_string(), charset.name().to_string()));
        self.charset = Some(charset);
        self
    }

    /// Charset named by the `charset` parameter, when it is one we understand.
    pub fn charset(&self) -> Option<Charset> {
        self.charset
    }

    pub fn charset_or(&self, default: Charset) -> Charset {
        self.charset.unwrap_or(default)
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.parameters
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_json(&self) -> bool {
        self.subtype == "json" || self.subtype.ends_with("+json")
    }

    pub fn is_xml(&self) -> bool {
        self.subtype == "xml" || self.subtype.ends_with("+xml")
    }

    pub fn is_form_urlencoded(&self) -> bool {
        self.type_ == "application" && self.subtype == "x-www-form-urlencoded"
    }

    /// Whether bodies of this type are textual.
    pub fn is_string(&self) -> bool {
        self.type_ == "text"
            || self.is_json()
            || self.is_xml()
            || self.is_form_urlencoded()
            || self.subtype.contains("javascript")
    }

    /// Same type and subtype, treating `*` as a wildcard.
    pub fn is_compatible(&self, other: &MediaType) -> bool {
        let type_ok = self.type_ == "*" || other.type_ == "*" || self.type_ == other.type_;
        let subtype_ok =
            self.subtype == "*" || other.subtype == "*" || self.subtype == other.subtype;
        type_ok && subtype_ok
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.subtype.is_empty() {
            write!(f, "{}", self.type_)?;
        } else {
            write!(f, "{}/{}", self.type_, self.subtype)?;
        }
        for (name, value) in &self.parameters {
            write!(f, "; {name}={value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lowercases_and_reads_charset() {
        let media_type = MediaType::parse("Application/JSON; Charset=UTF-8").unwrap();
        assert_eq!(media_type.type_, "application");
        assert_eq!(media_type.subtype, "json");
        assert_eq!(media_type.charset(), Some(Charset::Utf8));
        assert!(media_type.is_json());
        assert_eq!(media_type.to_string(), "application/json; charset=UTF-8");
    }

    #[test]
    fn test_unknown_charset_is_ignored() {
        let media_type = MediaType::parse("text/plain; charset=klingon").unwrap();
        assert_eq!(media_type.charset(), None);
        assert_eq!(media_type.charset_or(DEFAULT_HTTP_CHARSET), Charset::Iso8859_1);
        assert_eq!(media_type.parameter("charset"), Some("klingon"));
    }

    #[test]
    fn test_blank_is_none() {
        assert!(MediaType::parse("   ").is_none());
    }

    #[test]
    fn test_type_families() {
        assert!(MediaType::parse("application/vnd.api+json").unwrap().is_json());
        assert!(MediaType::parse("text/xml").unwrap().is_xml());
        assert!(MediaType::parse("application/x-www-form-urlencoded")
            .unwrap()
            .is_string());
        assert!(!MediaType::octet_stream().is_string());
        assert!(MediaType::parse("*/*")
            .unwrap()
            .is_compatible(&MediaType::application_json()));
    }

    #[test]
    fn test_iso_8859_1_round_trip() {
        let bytes = Charset::Iso8859_1.encode("caf\u{e9}");
        assert_eq!(bytes, vec![b'c', b'a', b'f', 0xE9]);
        assert_eq!(Charset::Iso8859_1.decode(&bytes), "caf\u{e9}");
        assert_eq!(Charset::Iso8859_1.encode("\u{263A}"), vec![b'?']);
    }
}
