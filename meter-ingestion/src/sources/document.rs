use meter_client::domain::timestamp::parse_local;
use roxmltree::{Document, Node};
use time::PrimitiveDateTime;

use crate::error::{IngestError, Result};

/// Root element of a billing-register export.
pub const ESL_ROOT: &str = "ESLBillingData";
/// Marker contained in the root element of an interval-metering export.
/// Producers add namespace prefixes and version suffixes around it.
pub const SDAT_ROOT_MARKER: &str = "ValidatedMeteredData";

/// XML dialects this service understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlFormat {
    Esl,
    Sdat,
}

impl XmlFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Esl => "ESL",
            Self::Sdat => "SDAT",
        }
    }
}

/// Build a document from raw upload bytes. A leading byte-order mark is
/// ignored.
pub fn parse_document(bytes: &[u8]) -> Result<Document<'_>> {
    let text = std::str::from_utf8(bytes)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    Ok(Document::parse(text)?)
}

pub fn detect_format(doc: &Document) -> Result<XmlFormat> {
    classify_root(&qualified_name(doc.root_element()))
}

pub fn classify_root(root: &str) -> Result<XmlFormat> {
    if root == ESL_ROOT {
        Ok(XmlFormat::Esl)
    } else if root.contains(SDAT_ROOT_MARKER) {
        Ok(XmlFormat::Sdat)
    } else {
        Err(IngestError::FormatUnrecognized {
            root: root.to_string(),
        })
    }
}

/// Tag name as written in the document, `prefix:local` when prefixed.
pub fn qualified_name(node: Node) -> String {
    let name = node.tag_name();
    match name.namespace().and_then(|ns| node.lookup_prefix(ns)) {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}:{}", name.name()),
        _ => name.name().to_string(),
    }
}

/// Element descendants of `node` (excluding `node` itself) with the given
/// local name, in document order.
pub(crate) fn descendants_named<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.descendants()
        .skip(1)
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

pub(crate) fn first_descendant<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> Option<Node<'a, 'input>> {
    descendants_named(node, name).next()
}

/// Concatenated text of every text node below `node`.
pub(crate) fn text_content(node: Node) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

/// Text of the first descendant called `name`, or an empty string.
pub(crate) fn descendant_text(node: Node, name: &'static str) -> String {
    first_descendant(node, name)
        .map(text_content)
        .unwrap_or_default()
}

pub(crate) fn parse_decimal(field: &'static str, raw: &str) -> Result<f64> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|e| IngestError::malformed(field, raw, e))?;
    if !value.is_finite() {
        return Err(IngestError::malformed(field, raw, "value is not finite"));
    }
    Ok(value)
}

pub(crate) fn parse_integer(field: &'static str, raw: &str) -> Result<i64> {
    raw.trim()
        .parse()
        .map_err(|e| IngestError::malformed(field, raw, e))
}

pub(crate) fn parse_timestamp(field: &'static str, raw: &str) -> Result<PrimitiveDateTime> {
    parse_local(raw).map_err(|e| IngestError::malformed(field, raw, e))
}
