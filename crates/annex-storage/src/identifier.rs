//! Resource identifiers for attachment directories.
//!
//! An identifier addresses a workspace, optionally narrowed to a collection,
//! a record inside it and one field of that record. Levels nest strictly:
//! a record id without a collection (or a field without a record id) is
//! rejected at construction time, so every identifier maps onto exactly one
//! directory.

use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};

/// Immutable `{workspace, collection, record_id, field}` tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceIdentifier {
    workspace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    collection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    record_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<String>,
}

impl ResourceIdentifier {
    /// Build a (possibly partial) identifier.
    ///
    /// Fails if a level is present while its parent is absent, or if any
    /// present segment is not a safe path segment.
    pub fn new(
        workspace: impl Into<String>,
        collection: Option<String>,
        record_id: Option<String>,
        field: Option<String>,
    ) -> Result<Self> {
        let workspace = workspace.into();
        validate_segment("workspace", &workspace)?;

        if record_id.is_some() && collection.is_none() {
            return Err(Error::InvalidIdentifier(
                "record id given without a collection".into(),
            ));
        }
        if field.is_some() && record_id.is_none() {
            return Err(Error::InvalidIdentifier(
                "field given without a record id".into(),
            ));
        }

        for (level, value) in [
            ("collection", &collection),
            ("record id", &record_id),
            ("field", &field),
        ] {
            if let Some(value) = value {
                validate_segment(level, value)?;
            }
        }

        Ok(Self {
            workspace,
            collection,
            record_id,
            field,
        })
    }

    /// Build a complete, field-level identifier.
    pub fn for_field(
        workspace: impl Into<String>,
        collection: impl Into<String>,
        record_id: impl Into<String>,
        field: impl Into<String>,
    ) -> Result<Self> {
        Self::new(
            workspace,
            Some(collection.into()),
            Some(record_id.into()),
            Some(field.into()),
        )
    }

    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    pub fn collection(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    pub fn record_id(&self) -> Option<&str> {
        self.record_id.as_deref()
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    /// True when all four levels are present.
    pub fn is_complete(&self) -> bool {
        self.field.is_some()
    }

    /// Present segments in nesting order, without any storage markers.
    pub fn segments(&self) -> Vec<&str> {
        let mut out = vec![self.workspace.as_str()];
        out.extend(
            [&self.collection, &self.record_id, &self.field]
                .into_iter()
                .map_while(|s| s.as_deref()),
        );
        out
    }
}

impl fmt::Display for ResourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments().join("/"))
    }
}

/// Check that a value can be used verbatim as one directory name and as one
/// link path segment.
pub fn validate_segment(level: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::InvalidIdentifier(format!("{} is empty", level)));
    }
    if value == "." || value == ".." {
        return Err(Error::InvalidIdentifier(format!(
            "{} may not be '{}'",
            level, value
        )));
    }
    if let Some(c) = value
        .chars()
        .find(|c| matches!(c, '/' | '\\' | '\0' | ',') || c.is_control())
    {
        return Err(Error::InvalidIdentifier(format!(
            "{} contains forbidden character {:?}",
            level, c
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_complete_identifier() {
        let id = ResourceIdentifier::for_field("ws1", "type1", "7", "photos").unwrap();
        assert!(id.is_complete());
        assert_eq!(id.to_string(), "ws1/type1/7/photos");
        assert_eq!(id.record_id(), Some("7"));
    }

    #[test]
    fn test_partial_identifier() {
        let id = ResourceIdentifier::new("ws1", Some("type1".into()), None, None).unwrap();
        assert!(!id.is_complete());
        assert_eq!(id.segments(), vec!["ws1", "type1"]);
    }

    #[test]
    fn test_skipped_level_rejected() {
        let err = ResourceIdentifier::new("ws1", None, Some("7".into()), None).unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(_)));

        let err =
            ResourceIdentifier::new("ws1", Some("t".into()), None, Some("photos".into()))
                .unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(_)));
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("..")]
    #[case("a/b")]
    #[case("a\\b")]
    #[case("a,b")]
    #[case("a\0b")]
    fn test_unsafe_segments_rejected(#[case] value: &str) {
        assert!(validate_segment("field", value).is_err());
        assert!(ResourceIdentifier::for_field("ws", "c", "1", value).is_err());
    }

    #[rstest]
    #[case("photos")]
    #[case("fid.7")]
    #[case("roads_2024")]
    #[case("été")]
    fn test_safe_segments_accepted(#[case] value: &str) {
        assert!(validate_segment("field", value).is_ok());
    }
}
