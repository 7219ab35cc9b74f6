//! Template rendering for file content
//!
//! Three template flavours cover what service configuration needs:
//!
//! - [`Template::Text`]: `{{ key }}` substitution, keys may be dotted paths
//!   into nested bindings
//! - [`Template::XmlConfiguration`]: Hadoop-style `<configuration>` blocks
//! - [`Template::Properties`]: sorted `key=value` files
//!
//! Rendering is deterministic and all-or-nothing: an error never yields
//! partial output.

use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;

/// Key/value bindings a template is rendered against
pub type Bindings = BTreeMap<String, Value>;

const GENERATED_HEADER: &str = "Generated by cluster-agent. Do not edit.";

/// A template and the way it turns bindings into bytes
#[derive(Debug, Clone, PartialEq)]
pub enum Template {
    /// Text with `{{ key }}` placeholders; `\{{` is a literal `{{`
    Text(String),
    /// Every binding becomes a `<property>`; `attributes` maps an attribute
    /// name (e.g. `final`) to per-property values
    XmlConfiguration {
        attributes: BTreeMap<String, BTreeMap<String, Value>>,
    },
    /// Every binding becomes a `key=value` line
    Properties,
}

impl Template {
    pub fn text(source: impl Into<String>) -> Self {
        Self::Text(source.into())
    }

    /// XML configuration block without property attributes
    pub fn xml() -> Self {
        Self::XmlConfiguration {
            attributes: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::XmlConfiguration { .. } => "xml",
            Self::Properties => "properties",
        }
    }
}

/// Render a template against its bindings
pub fn render(template: &Template, bindings: &Bindings) -> Result<Vec<u8>> {
    let rendered = match template {
        Template::Text(source) => render_text(source, bindings)?,
        Template::XmlConfiguration { attributes } => render_xml(bindings, attributes),
        Template::Properties => render_properties(bindings),
    };
    Ok(rendered.into_bytes())
}

/// Build bindings from a JSON object; anything else yields no bindings
pub fn bindings_from(value: &Value) -> Bindings {
    match value {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        _ => Bindings::new(),
    }
}

/// Substitute `{{ key }}` placeholders
pub fn render_text(source: &str, bindings: &Bindings) -> Result<String> {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(start) = rest.find("{{") {
        if rest[..start].ends_with('\\') {
            out.push_str(&rest[..start - 1]);
            out.push_str("{{");
            rest = &rest[start + 2..];
            continue;
        }
        out.push_str(&rest[..start]);

        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or_else(|| Error::Template {
            message: format!(
                "unterminated tag at byte {}",
                source.len() - rest.len() + start
            ),
        })?;
        let key = after[..end].trim();
        if key.is_empty() {
            return Err(Error::Template {
                message: "empty tag".to_string(),
            });
        }

        let value = lookup(bindings, key).ok_or_else(|| Error::MissingBinding {
            key: key.to_string(),
        })?;
        out.push_str(&value_to_text(value));
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Find a binding by exact key, then by dotted path into nested objects
fn lookup<'a>(bindings: &'a Bindings, key: &str) -> Option<&'a Value> {
    if let Some(value) = bindings.get(key) {
        return Some(value);
    }

    // Longest top-level prefix first, so keys containing dots still resolve
    let mut split = key.len();
    while let Some(dot) = key[..split].rfind('.') {
        if let Some(value) = bindings.get(&key[..dot]) {
            if let Some(found) = walk(value, &key[dot + 1..]) {
                return Some(found);
            }
        }
        split = dot;
    }
    None
}

fn walk<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let Value::Object(map) = value else {
        return None;
    };
    if let Some(found) = map.get(path) {
        return Some(found);
    }
    let (head, tail) = path.split_once('.')?;
    walk(map.get(head)?, tail)
}

/// Plain-text form of a binding value
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(value_to_text)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => value.to_string(),
    }
}

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Strings are escaped; booleans, numbers and null have a fixed form
fn xml_value(value: &Value) -> String {
    match value {
        Value::String(s) => xml_escape(s),
        other => xml_escape(&value_to_text(other)),
    }
}

fn render_xml(
    bindings: &Bindings,
    attributes: &BTreeMap<String, BTreeMap<String, Value>>,
) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(&format!("<!--{GENERATED_HEADER}-->\n"));
    out.push_str("<configuration>\n");
    for (name, value) in bindings {
        out.push_str("  <property>\n");
        out.push_str(&format!("    <name>{}</name>\n", xml_escape(name)));
        out.push_str(&format!("    <value>{}</value>\n", xml_value(value)));
        for (attribute, per_property) in attributes {
            if let Some(attr_value) = per_property.get(name) {
                out.push_str(&format!(
                    "    <{attribute}>{}</{attribute}>\n",
                    xml_value(attr_value)
                ));
            }
        }
        out.push_str("  </property>\n");
    }
    out.push_str("</configuration>\n");
    out
}

fn render_properties(bindings: &Bindings) -> String {
    let mut out = format!("# {GENERATED_HEADER}\n\n");
    for (key, value) in bindings {
        out.push_str(&format!("{key}={}\n", value_to_text(value)));
    }
    out
}
