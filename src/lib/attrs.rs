//! Typed attribute bags, the value type shared by inputs, cache keys and cache values.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(untagged)]
pub enum Attr {
    String(String),
    Int(u64),
    Bool(bool),
}

impl std::fmt::Display for Attr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Attr::String(s) => write!(f, "{s}"),
            Attr::Int(n) => write!(f, "{n}"),
            Attr::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for Attr {
    fn from(value: &str) -> Self {
        Attr::String(value.to_string())
    }
}

impl From<String> for Attr {
    fn from(value: String) -> Self {
        Attr::String(value)
    }
}

impl From<u64> for Attr {
    fn from(value: u64) -> Self {
        Attr::Int(value)
    }
}

impl From<bool> for Attr {
    fn from(value: bool) -> Self {
        Attr::Bool(value)
    }
}

/// An attribute bag. A BTree keeps iteration (and therefore serialisation) order stable.
pub type Attrs = BTreeMap<String, Attr>;

/// Build an [`Attrs`] from `name => value` pairs.
#[macro_export]
macro_rules! attrs {
    ($($name:expr => $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut attrs = $crate::Attrs::new();
        $(attrs.insert(($name).to_string(), $crate::Attr::from($value));)*
        attrs
    }};
}

pub fn maybe_get_str_attr<'a>(attrs: &'a Attrs, name: &str) -> Result<Option<&'a str>> {
    match attrs.get(name) {
        None => Ok(None),
        Some(Attr::String(s)) => Ok(Some(s)),
        Some(_) => Err(Error::WrongAttributeType {
            name: name.to_string(),
            expected: "string",
        }),
    }
}

pub fn get_str_attr<'a>(attrs: &'a Attrs, name: &str) -> Result<&'a str> {
    maybe_get_str_attr(attrs, name)?.ok_or_else(|| Error::MissingAttribute(name.to_string()))
}

pub fn maybe_get_int_attr(attrs: &Attrs, name: &str) -> Result<Option<u64>> {
    match attrs.get(name) {
        None => Ok(None),
        Some(Attr::Int(n)) => Ok(Some(*n)),
        Some(_) => Err(Error::WrongAttributeType {
            name: name.to_string(),
            expected: "integer",
        }),
    }
}

pub fn get_int_attr(attrs: &Attrs, name: &str) -> Result<u64> {
    maybe_get_int_attr(attrs, name)?.ok_or_else(|| Error::MissingAttribute(name.to_string()))
}

#[cfg(test)]
mod test_attrs {
    use super::*;

    #[test]
    fn typed_accessors() {
        let attrs = crate::attrs! {
            "owner" => "NixOS",
            "lastModified" => 1700000000u64,
        };
        assert_eq!(get_str_attr(&attrs, "owner").unwrap(), "NixOS");
        assert_eq!(maybe_get_str_attr(&attrs, "ref").unwrap(), None);
        assert_eq!(get_int_attr(&attrs, "lastModified").unwrap(), 1700000000);
        assert!(matches!(
            get_str_attr(&attrs, "repo"),
            Err(Error::MissingAttribute(name)) if name == "repo"
        ));
        assert!(matches!(
            get_int_attr(&attrs, "owner"),
            Err(Error::WrongAttributeType { name, expected: "integer" }) if name == "owner"
        ));
    }

    #[test]
    fn attrs_json_shape() {
        let attrs = crate::attrs! {
            "type" => "tree-archive",
            "rev" => "0123456789abcdef0123456789abcdef01234567",
            "lastModified" => 12u64,
            "shallow" => true,
        };
        let json = serde_json::to_string(&attrs).unwrap();
        assert_eq!(
            json,
            r#"{"lastModified":12,"rev":"0123456789abcdef0123456789abcdef01234567","shallow":true,"type":"tree-archive"}"#
        );
        let back: Attrs = serde_json::from_str(&json).unwrap();
        assert_eq!(back, attrs);
    }
}
