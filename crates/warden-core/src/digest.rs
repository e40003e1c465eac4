//! # Image Digests
//!
//! `ImageDigest` is the content-addressed identifier of an immutable image
//! version. The only accepted form is `sha256:` followed by exactly 64
//! lowercase hex characters; anything else is rejected at construction and
//! at deserialization.
//!
//! `CurrentDigest` describes what a running workload references: a digest,
//! a mutable tag (serialized as the `"tag-based"` sentinel), or nothing
//! usable (serialized as the empty string).

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Wire sentinel for a workload that references its image by tag.
pub const TAG_BASED: &str = "tag-based";

const SHA256_PREFIX: &str = "sha256:";
const SHA256_HEX_LEN: usize = 64;

/// A validated `sha256:<hex>` content digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageDigest(String);

impl ImageDigest {
    /// Parse and validate a digest string.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidDigest`] unless the input is
    /// `sha256:` followed by 64 lowercase hex characters.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let hex = s
            .strip_prefix(SHA256_PREFIX)
            .ok_or_else(|| ValidationError::InvalidDigest(s.to_string()))?;
        let well_formed = hex.len() == SHA256_HEX_LEN
            && hex
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !well_formed {
            return Err(ValidationError::InvalidDigest(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// The full `sha256:<hex>` form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The hex portion without the algorithm prefix.
    pub fn hex(&self) -> &str {
        &self.0[SHA256_PREFIX.len()..]
    }

    /// The algorithm label (always `sha256`).
    pub fn algorithm(&self) -> &'static str {
        "sha256"
    }
}

impl TryFrom<String> for ImageDigest {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ImageDigest> for String {
    fn from(d: ImageDigest) -> Self {
        d.0
    }
}

impl std::str::FromStr for ImageDigest {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for ImageDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a workload's matching container currently references.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CurrentDigest {
    /// Pinned by content digest.
    Digest(ImageDigest),
    /// Referenced by a mutable tag.
    TagBased,
    /// No usable reference (no match, or a malformed digest).
    #[default]
    Unknown,
}

impl CurrentDigest {
    /// The digest, if the workload is pinned by one.
    pub fn digest(&self) -> Option<&ImageDigest> {
        match self {
            Self::Digest(d) => Some(d),
            Self::TagBased | Self::Unknown => None,
        }
    }

    /// Wire form: the digest, `"tag-based"`, or `""`.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Digest(d) => d.as_str(),
            Self::TagBased => TAG_BASED,
            Self::Unknown => "",
        }
    }
}

impl TryFrom<String> for CurrentDigest {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "" => Ok(Self::Unknown),
            TAG_BASED => Ok(Self::TagBased),
            other => ImageDigest::parse(other).map(Self::Digest),
        }
    }
}

impl From<CurrentDigest> for String {
    fn from(c: CurrentDigest) -> Self {
        c.as_str().to_string()
    }
}

impl std::fmt::Display for CurrentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn digest_of(c: char) -> String {
        format!("sha256:{}", c.to_string().repeat(64))
    }

    #[test]
    fn accepts_well_formed_digest() {
        let d = ImageDigest::parse(&digest_of('a')).unwrap();
        assert_eq!(d.hex().len(), 64);
        assert_eq!(d.algorithm(), "sha256");
        assert_eq!(d.to_string(), digest_of('a'));
    }

    #[test]
    fn rejects_uppercase_hex() {
        assert!(ImageDigest::parse(&digest_of('A')).is_err());
    }

    #[test]
    fn rejects_wrong_algorithm_and_length() {
        assert!(ImageDigest::parse(&format!("sha512:{}", "a".repeat(64))).is_err());
        assert!(ImageDigest::parse("sha256:abc").is_err());
        assert!(ImageDigest::parse("").is_err());
    }

    #[test]
    fn current_digest_wire_form() {
        assert_eq!(CurrentDigest::TagBased.as_str(), "tag-based");
        assert_eq!(CurrentDigest::Unknown.as_str(), "");
        let json = serde_json::to_string(&CurrentDigest::TagBased).unwrap();
        assert_eq!(json, "\"tag-based\"");
        let back: CurrentDigest = serde_json::from_str("\"\"").unwrap();
        assert_eq!(back, CurrentDigest::Unknown);
    }

    #[test]
    fn current_digest_rejects_garbage() {
        assert!(serde_json::from_str::<CurrentDigest>("\"latest\"").is_err());
    }

    proptest! {
        #[test]
        fn any_lower_hex_of_len_64_is_valid(hex in "[0-9a-f]{64}") {
            let s = format!("sha256:{hex}");
            let d = ImageDigest::parse(&s).unwrap();
            prop_assert_eq!(d.as_str(), s.as_str());
        }

        #[test]
        fn equality_is_string_equality(a in "[0-9a-f]{64}", b in "[0-9a-f]{64}") {
            let da = ImageDigest::parse(&format!("sha256:{a}")).unwrap();
            let db = ImageDigest::parse(&format!("sha256:{b}")).unwrap();
            prop_assert_eq!(da == db, a == b);
        }
    }
}
