//! Validation System - Markup Well-Formedness
//!
//! Every document snapshot gets one independent, stateless pass.
//! A pass yields at most one diagnostic: the first problem the parser hits.

use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesRef, BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::diagnostics::{DiagnosticsLog, Severity};

/// Prefix of every diagnostic produced by a failed pass.
pub const SYNTAX_ERROR_PREFIX: &str = "Syntax Error: ";

const UNKNOWN_REASON: &str = "Unknown parsing error";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ValidationResult {
    Valid,
    Invalid(String),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ValidationResult::Valid => None,
            ValidationResult::Invalid(reason) => Some(reason),
        }
    }
}

/// Parser error text. Each message reads `<reason>: <detail>`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("mismatched tag: expected `</{expected}>` but found `</{found}>` near byte {position}")]
    MismatchedTag {
        expected: String,
        found: String,
        position: u64,
    },

    #[error("unexpected close tag: `</{0}>` has no open element")]
    UnexpectedCloseTag(String),

    #[error("unclosed tag: `<{0}>` is never closed")]
    UnclosedTag(String),

    #[error("no root element: the document contains no elements")]
    NoRootElement,

    #[error("junk after document element: {0}")]
    JunkAfterRoot(String),

    #[error("text outside root element: {0}")]
    TextOutsideRoot(String),

    #[error("invalid attribute: {0}")]
    InvalidAttribute(String),

    #[error("undefined entity: `&{0};`")]
    UndefinedEntity(String),

    #[error("XML declaration not at start of document: found after other content")]
    MisplacedDeclaration,

    #[error("invalid name: `{0}`")]
    InvalidName(String),

    #[error("unbound prefix: `{0}` has no namespace declaration in scope")]
    UnboundPrefix(String),

    #[error("invalid character: {0}")]
    InvalidCharacter(String),

    #[error("{0}")]
    Parser(String),
}

impl SyntaxError {
    /// Short human-readable reason: the error text up to its first `:`.
    pub fn reason(&self) -> String {
        let text = self.to_string();
        let head = text.split(':').next().unwrap_or_default().trim();
        if head.is_empty() {
            UNKNOWN_REASON.to_string()
        } else {
            head.to_string()
        }
    }
}

/// Stateless well-formedness checker for vector markup.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupValidator;

impl MarkupValidator {
    pub fn new() -> Self {
        Self
    }

    /// Run one pass and record a failure in `log`.
    ///
    /// Never fails: malformed input becomes `Invalid` plus a single
    /// error-severity entry. A valid pass leaves the log untouched.
    #[tracing::instrument(level = "debug", skip_all, fields(bytes = document.len()))]
    pub fn validate(&self, document: &str, log: &mut DiagnosticsLog) -> ValidationResult {
        match self.check(document) {
            Ok(()) => {
                tracing::debug!("document is well-formed");
                ValidationResult::Valid
            }
            Err(err) => {
                tracing::debug!(error = %err, "document is malformed");
                let reason = err.reason();
                log.append(Severity::Error, format!("{}{}", SYNTAX_ERROR_PREFIX, reason));
                ValidationResult::Invalid(reason)
            }
        }
    }

    /// Parse `document` without touching any log.
    pub fn check(&self, document: &str) -> Result<(), SyntaxError> {
        let mut reader = NsReader::from_str(document);
        // Nesting is tracked below so mismatches get our own wording.
        let config = reader.config_mut();
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
        config.check_comments = true;

        let mut open: Vec<String> = Vec::new();
        let mut seen_root = false;
        let mut root_closed = false;
        let mut first_event = true;

        loop {
            let (ns, event) = reader
                .read_resolved_event()
                .map_err(|e| SyntaxError::Parser(e.to_string()))?;
            let unknown_prefix = match ns {
                ResolveResult::Unknown(prefix) => Some(String::from_utf8_lossy(&prefix).into_owned()),
                _ => None,
            };

            match event {
                Event::Start(e) => {
                    let name = element_name(&e);
                    if root_closed {
                        return Err(SyntaxError::JunkAfterRoot(format!("second root element `<{}>`", name)));
                    }
                    check_element(&reader, &e, unknown_prefix)?;
                    seen_root = true;
                    open.push(name);
                }
                Event::Empty(e) => {
                    let name = element_name(&e);
                    if root_closed {
                        return Err(SyntaxError::JunkAfterRoot(format!("second root element `<{}/>`", name)));
                    }
                    check_element(&reader, &e, unknown_prefix)?;
                    seen_root = true;
                    if open.is_empty() {
                        root_closed = true;
                    }
                }
                Event::End(e) => {
                    let found = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    match open.pop() {
                        Some(expected) if expected == found => {
                            if open.is_empty() {
                                root_closed = true;
                            }
                        }
                        Some(expected) => {
                            return Err(SyntaxError::MismatchedTag {
                                expected,
                                found,
                                position: reader.buffer_position() as u64,
                            });
                        }
                        None => return Err(SyntaxError::UnexpectedCloseTag(found)),
                    }
                }
                Event::Text(text) => {
                    if open.is_empty() && !text.iter().all(u8::is_ascii_whitespace) {
                        return Err(stray_content(root_closed, "character data"));
                    }
                    check_chars(&text)?;
                }
                Event::CData(data) => {
                    if open.is_empty() {
                        return Err(stray_content(root_closed, "CDATA section"));
                    }
                    check_chars(&data)?;
                }
                Event::GeneralRef(entity) => {
                    if open.is_empty() {
                        return Err(stray_content(root_closed, "entity reference"));
                    }
                    check_reference(&entity)?;
                }
                Event::Decl(_) if !first_event => {
                    return Err(SyntaxError::MisplacedDeclaration);
                }
                Event::DocType(_) if seen_root => {
                    return Err(SyntaxError::JunkAfterRoot("doctype after the root element".to_string()));
                }
                Event::Eof => break,
                Event::Decl(_) | Event::DocType(_) | Event::PI(_) | Event::Comment(_) => {}
            }
            first_event = false;
        }

        if let Some(name) = open.pop() {
            return Err(SyntaxError::UnclosedTag(name));
        }
        if !seen_root {
            return Err(SyntaxError::NoRootElement);
        }
        Ok(())
    }
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

/// Names may not start with a digit, `-` or `.`.
fn check_name(name: &[u8]) -> Result<(), SyntaxError> {
    match name.first() {
        Some(b) if !b.is_ascii_digit() && !matches!(b, b'-' | b'.') => Ok(()),
        _ => Err(SyntaxError::InvalidName(String::from_utf8_lossy(name).into_owned())),
    }
}

/// Control characters other than tab, newline and carriage return are not XML.
fn check_chars(bytes: &[u8]) -> Result<(), SyntaxError> {
    match bytes.iter().find(|&&b| b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r')) {
        Some(b) => Err(SyntaxError::InvalidCharacter(format!("U+{:04X}", b))),
        None => Ok(()),
    }
}

/// Only the five predefined entities and character references resolve
/// without a DTD.
fn check_reference(entity: &BytesRef<'_>) -> Result<(), SyntaxError> {
    let name = String::from_utf8_lossy(entity).into_owned();
    if entity.is_char_ref() {
        return match entity.resolve_char_ref() {
            Ok(Some(ch)) if (ch as u32) < 0x20 && !matches!(ch, '\t' | '\n' | '\r') => {
                Err(SyntaxError::InvalidCharacter(format!("&{};", name)))
            }
            Ok(_) => Ok(()),
            Err(e) => Err(SyntaxError::InvalidCharacter(format!("&{};: {}", name, e))),
        };
    }
    match resolve_predefined_entity(&name) {
        Some(_) => Ok(()),
        None => Err(SyntaxError::UndefinedEntity(name)),
    }
}

fn check_element(
    reader: &NsReader<&[u8]>,
    e: &BytesStart<'_>,
    unknown_prefix: Option<String>,
) -> Result<(), SyntaxError> {
    check_name(e.name().as_ref())?;
    if let Some(prefix) = unknown_prefix {
        return Err(SyntaxError::UnboundPrefix(prefix));
    }

    for attr in e.attributes() {
        let attr = attr.map_err(|err| SyntaxError::InvalidAttribute(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        check_name(attr.key.as_ref())?;

        if let (ResolveResult::Unknown(prefix), _) = reader.resolve_attribute(attr.key) {
            return Err(SyntaxError::UnboundPrefix(String::from_utf8_lossy(&prefix).into_owned()));
        }
        if attr.value.contains(&b'<') {
            return Err(SyntaxError::InvalidAttribute(format!("`<` in the value of `{}`", key)));
        }
        check_chars(&attr.value)?;
        attr.decode_and_unescape_value(reader.decoder())
            .map_err(|err| SyntaxError::InvalidAttribute(format!("value of `{}`: {}", key, err)))?;
    }
    Ok(())
}

fn stray_content(root_closed: bool, what: &str) -> SyntaxError {
    if root_closed {
        SyntaxError::JunkAfterRoot(format!("{} after the root element", what))
    } else {
        SyntaxError::TextOutsideRoot(format!("{} before the root element", what))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reason_of(doc: &str) -> String {
        MarkupValidator::new().check(doc).unwrap_err().reason()
    }

    #[test]
    fn test_well_formed_documents_pass() {
        let validator = MarkupValidator::new();
        let docs = [
            r#"<svg xmlns="http://www.w3.org/2000/svg"/>"#,
            "<?xml version=\"1.0\"?>\n<!-- icon -->\n<svg><g><rect/></g></svg>\n",
            "<svg><text>a &amp; b</text><![CDATA[x < y]]></svg>",
        ];
        for doc in docs {
            assert_eq!(validator.check(doc), Ok(()), "{}", doc);
        }
    }

    #[test]
    fn test_mismatched_tag() {
        assert_eq!(reason_of("<svg><rect></svg>"), "mismatched tag");
    }

    #[test]
    fn test_unclosed_tag() {
        let err = MarkupValidator::new().check("<svg><rect>").unwrap_err();
        assert_eq!(err, SyntaxError::UnclosedTag("rect".to_string()));
        assert_eq!(err.reason(), "unclosed tag");
    }

    #[test]
    fn test_empty_and_comment_only_documents_have_no_root() {
        assert_eq!(reason_of(""), "no root element");
        assert_eq!(reason_of("  <!-- nothing -->  "), "no root element");
    }

    #[test]
    fn test_content_outside_root() {
        assert_eq!(reason_of("<svg/><svg/>"), "junk after document element");
        assert_eq!(reason_of("<svg></svg>trailing"), "junk after document element");
        assert_eq!(reason_of("leading<svg/>"), "text outside root element");
        assert_eq!(reason_of("</svg>"), "unexpected close tag");
        assert_eq!(reason_of("&amp;<svg/>"), "text outside root element");
        assert_eq!(reason_of("<svg/>&amp;"), "junk after document element");
        assert_eq!(reason_of("<svg/><!DOCTYPE svg>"), "junk after document element");
        assert_eq!(reason_of("<svg/><?xml version=\"1.0\"?>"), "XML declaration not at start of document");
        assert_eq!(reason_of(" <?xml version=\"1.0\"?><svg/>"), "XML declaration not at start of document");
    }

    #[test]
    fn test_entity_references() {
        let validator = MarkupValidator::new();
        assert_eq!(validator.check("<svg>&lt;&gt;&amp;&quot;&apos;&#65;&#x42;</svg>"), Ok(()));
        assert_eq!(
            validator.check("<svg>&foo;</svg>"),
            Err(SyntaxError::UndefinedEntity("foo".to_string()))
        );
        assert_eq!(reason_of("<svg>&#0;</svg>"), "invalid character");
        assert_eq!(reason_of("<svg a=\"&foo;\"/>"), "invalid attribute");
    }

    #[test]
    fn test_raw_angle_bracket_in_attribute_value() {
        assert_eq!(reason_of("<svg a=\"<\"/>"), "invalid attribute");
    }

    #[test]
    fn test_names_and_prefixes() {
        let validator = MarkupValidator::new();
        assert_eq!(reason_of("<1svg/>"), "invalid name");
        assert_eq!(validator.check("<foo:svg/>"), Err(SyntaxError::UnboundPrefix("foo".to_string())));
        assert_eq!(reason_of("<svg xlink:href=\"#a\"/>"), "unbound prefix");

        let bound = r##"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink"><use xlink:href="#a" xml:space="preserve"/></svg>"##;
        assert_eq!(validator.check(bound), Ok(()));
    }

    #[test]
    fn test_comments_and_control_characters() {
        assert!(MarkupValidator::new().check("<svg><!-- x -- y --></svg>").is_err());
        assert_eq!(reason_of("<svg>a\0b</svg>"), "invalid character");
        assert_eq!(MarkupValidator::new().check("<svg>\ta\r\nb</svg>"), Ok(()));
    }

    #[test]
    fn test_duplicate_attribute() {
        assert_eq!(reason_of(r#"<svg width="1" width="2"/>"#), "invalid attribute");
    }

    #[test]
    fn test_tokenizer_failures_still_yield_a_reason() {
        let reason = reason_of("<svg");
        assert!(!reason.is_empty());
        assert!(!reason.contains(':'));
    }

    #[test]
    fn test_valid_pass_does_not_touch_log() {
        let mut log = DiagnosticsLog::new();
        let result = MarkupValidator::new().validate("<svg/>", &mut log);
        assert!(result.is_valid());
        assert!(log.is_empty());
    }

    #[test]
    fn test_invalid_pass_appends_exactly_one_error() {
        let mut log = DiagnosticsLog::new();
        let result = MarkupValidator::new().validate("<svg><rect></svg>", &mut log);
        assert_eq!(result, ValidationResult::Invalid("mismatched tag".to_string()));
        assert_eq!(log.len(), 1);
        let entry = log.latest().unwrap();
        assert_eq!(entry.severity, Severity::Error);
        assert_eq!(entry.message, "Syntax Error: mismatched tag");
    }
}
