//! Path-based encoding of reference properties.
//!
//! ```text
//! s*rel*b            single-valued `rel` pointing at <base>/b
//! m*rel*b*/other/c   multi-valued `rel`; second target outside the base
//! ```
//!
//! The separator `*` cannot appear in property names or path segments, so
//! splitting is unambiguous.

use serde::{Deserialize, Serialize};

use crate::model::{names, path, Property};
use crate::{Error, Result};

const SEP: char = names::REFERENCE_SEPARATOR;

/// Whether the encoded property held one value or a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Arity {
    Single,
    Multi,
}

impl Arity {
    pub fn marker(&self) -> char {
        match self {
            Arity::Single => 's',
            Arity::Multi => 'm',
        }
    }

    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "s" => Some(Arity::Single),
            "m" => Some(Arity::Multi),
            _ => None,
        }
    }

    pub fn of(property: &Property) -> Self {
        if property.is_multi() { Arity::Multi } else { Arity::Single }
    }
}

/// Components of an encoded reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedReference {
    pub arity: Arity,
    pub property: String,
    pub paths: Vec<String>,
}

/// Encode target paths of `property`, relativizing those under `base_path`.
pub fn encode<S: AsRef<str>>(
    base_path: &str,
    arity: Arity,
    property: &str,
    targets: &[S],
) -> Result<String> {
    if property.is_empty() || property.contains(SEP) {
        return Err(Error::FormatError(format!("property name '{property}' cannot be encoded")));
    }
    if targets.is_empty() {
        return Err(Error::FormatError(format!("reference '{property}' has no targets")));
    }
    if arity == Arity::Single && targets.len() > 1 {
        return Err(Error::FormatError(format!(
            "single-valued reference '{property}' has {} targets",
            targets.len()
        )));
    }

    let mut encoded = String::new();
    encoded.push(arity.marker());
    encoded.push(SEP);
    encoded.push_str(property);
    for target in targets {
        let relative = path::relativize(base_path, target.as_ref());
        if relative.is_empty() || relative.contains(SEP) {
            return Err(Error::FormatError(format!("path '{}' cannot be encoded", target.as_ref())));
        }
        encoded.push(SEP);
        encoded.push_str(&relative);
    }
    Ok(encoded)
}

/// Inverse of [`encode`].
pub fn decode(encoded: &str) -> Result<DecodedReference> {
    let mut parts = encoded.split(SEP);
    let (Some(marker), Some(property)) = (parts.next(), parts.next()) else {
        return Err(Error::FormatError(format!("'{encoded}' has fewer than 3 segments")));
    };
    let paths: Vec<String> = parts.map(str::to_string).collect();
    if paths.is_empty() {
        return Err(Error::FormatError(format!("'{encoded}' has fewer than 3 segments")));
    }
    let arity = Arity::from_marker(marker)
        .ok_or_else(|| Error::FormatError(format!("unknown arity marker '{marker}' in '{encoded}'")))?;
    if property.is_empty() {
        return Err(Error::FormatError(format!("'{encoded}' has an empty property name")));
    }
    if paths.iter().any(String::is_empty) {
        return Err(Error::FormatError(format!("'{encoded}' contains an empty path")));
    }
    if arity == Arity::Single && paths.len() > 1 {
        return Err(Error::FormatError(format!(
            "single-valued reference '{property}' carries {} paths",
            paths.len()
        )));
    }
    Ok(DecodedReference {
        arity,
        property: property.to_string(),
        paths,
    })
}

/// Property name embedded in an encoded reference, without full validation.
pub fn property_name(encoded: &str) -> Option<&str> {
    encoded.split(SEP).nth(1).filter(|p| !p.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_encode_single_relative() {
        let encoded = encode("/a", Arity::Single, "rel", &["/a/b"]).unwrap();
        assert_eq!(encoded, "s*rel*b");
    }

    #[test]
    fn test_encode_multi_relative() {
        let encoded = encode("/a", Arity::Multi, "rel", &["/a/b", "/a/c"]).unwrap();
        assert_eq!(encoded, "m*rel*b*c");
    }

    #[test]
    fn test_encode_outside_base_stays_absolute() {
        let encoded = encode("/a", Arity::Multi, "rel", &["/a", "/x/y"]).unwrap();
        assert_eq!(encoded, "m*rel*.*/x/y");
    }

    #[test]
    fn test_encode_rejects_bad_input() {
        assert!(encode::<&str>("/a", Arity::Multi, "rel", &[]).is_err());
        assert!(encode("/a", Arity::Single, "rel", &["/a/b", "/a/c"]).is_err());
        assert!(encode("/a", Arity::Single, "re*l", &["/a/b"]).is_err());
        assert!(encode("/a", Arity::Single, "", &["/a/b"]).is_err());
    }

    #[test]
    fn test_decode() {
        let decoded = decode("m*rel*b*/x/c").unwrap();
        assert_eq!(decoded, DecodedReference {
            arity: Arity::Multi,
            property: "rel".into(),
            paths: vec!["b".into(), "/x/c".into()],
        });
    }

    #[test]
    fn test_decode_rejects_malformed() {
        for bad in ["", "s", "s*rel", "x*rel*b", "ss*rel*b", "s**b", "s*rel*", "s*rel*b*c"] {
            assert!(
                matches!(decode(bad), Err(Error::FormatError(_))),
                "expected FormatError for {bad:?}"
            );
        }
    }

    #[test]
    fn test_property_name() {
        assert_eq!(property_name("s*rel*b"), Some("rel"));
        assert_eq!(property_name("s"), None);
    }

    fn name_strategy() -> impl Strategy<Value = String> {
        "[a-z]{1,4}(:[a-zA-Z0-9_]{1,12})?"
    }

    fn path_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            prop::collection::vec("[a-z0-9_:]{1,8}", 1..4).prop_map(|s| s.join("/")),
            prop::collection::vec("[a-z0-9_:]{1,8}", 1..4).prop_map(|s| format!("/outside/{}", s.join("/"))),
        ]
    }

    proptest! {
        #[test]
        fn prop_roundtrip_multi(
            property in name_strategy(),
            paths in prop::collection::vec(path_strategy(), 1..6),
        ) {
            let encoded = encode("/base", Arity::Multi, &property, &paths).unwrap();
            let decoded = decode(&encoded).unwrap();
            prop_assert_eq!(decoded.arity, Arity::Multi);
            prop_assert_eq!(decoded.property, property);
            prop_assert_eq!(decoded.paths, paths);
        }

        #[test]
        fn prop_roundtrip_single(property in name_strategy(), target in path_strategy()) {
            let encoded = encode("/base", Arity::Single, &property, &[target.clone()]).unwrap();
            let decoded = decode(&encoded).unwrap();
            prop_assert_eq!(decoded.arity, Arity::Single);
            prop_assert_eq!(decoded.property, property);
            prop_assert_eq!(decoded.paths, vec![target]);
        }
    }
}
