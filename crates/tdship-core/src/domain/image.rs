//! ImageTag - container image tags and retagging.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::SanitizeError;

/// Timestamp layout used for generated tags (e.g. `202601151258`).
pub const TIMESTAMP_TAG_FORMAT: &str = "%Y%m%d%H%M";

/// A non-empty image tag.
///
/// No format validation beyond non-emptiness is done; the registry is the
/// authority on what a valid tag looks like.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageTag(String);

impl ImageTag {
    /// Validate and wrap a tag.
    ///
    /// # Errors
    /// `SanitizeError::InvalidTag` if `tag` is empty.
    pub fn new(tag: impl Into<String>) -> Result<Self, SanitizeError> {
        let tag = tag.into();
        if tag.is_empty() {
            return Err(SanitizeError::InvalidTag(tag));
        }
        Ok(Self(tag))
    }

    /// Tag derived from a point in time, minute resolution, UTC.
    pub fn from_timestamp(at: DateTime<Utc>) -> Self {
        Self(at.format(TIMESTAMP_TAG_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ImageTag {
    type Err = SanitizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ImageTag {
    type Error = SanitizeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ImageTag> for String {
    fn from(tag: ImageTag) -> Self {
        tag.0
    }
}

/// Replace the tag of an image reference.
///
/// The repository reference is everything before the first `:` (the whole
/// string when there is no colon). Registry ports (`host:5000/repo`) are not
/// special-cased.
pub fn retag_image(image: &str, tag: &ImageTag) -> String {
    let repository = image.split_once(':').map_or(image, |(repository, _)| repository);
    format!("{repository}:{tag}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case::tagged("repo:oldtag", "repo:abc123")]
    #[case::untagged("repo", "repo:abc123")]
    #[case::registry_path("123456789012.dkr.ecr.eu-west-1.amazonaws.com/api:v1", "123456789012.dkr.ecr.eu-west-1.amazonaws.com/api:abc123")]
    #[case::empty_tag_suffix("repo:", "repo:abc123")]
    #[case::first_colon_wins("host:5000/repo:v1", "host:abc123")]
    fn retag_keeps_prefix_before_first_colon(#[case] image: &str, #[case] expected: &str) {
        let tag = ImageTag::new("abc123").unwrap();
        assert_eq!(retag_image(image, &tag), expected);
    }

    #[test]
    fn retag_is_idempotent() {
        let tag = ImageTag::new("9").unwrap();
        let once = retag_image("a:1", &tag);
        let twice = retag_image(&once, &tag);
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_tag_is_rejected() {
        let err = ImageTag::new("").unwrap_err();
        assert!(matches!(err, SanitizeError::InvalidTag(_)));
    }

    #[test]
    fn whitespace_tag_is_passed_through() {
        let tag = ImageTag::new(" ").unwrap();
        assert_eq!(tag.as_str(), " ");
    }

    #[test]
    fn timestamp_tag_uses_minute_resolution() {
        let at = Utc.with_ymd_and_hms(2026, 1, 15, 12, 58, 41).unwrap();
        assert_eq!(ImageTag::from_timestamp(at).as_str(), "202601151258");
    }

    #[test]
    fn deserialize_rejects_empty_tag() {
        let err = serde_json::from_str::<ImageTag>(r#""""#).unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }
}
