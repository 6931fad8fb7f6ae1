//! Git commit identifiers.

const SHA1_LEN: usize = 20;

/// A string could not be read as a SHA-1 commit hash.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a valid SHA-1 commit hash")]
pub struct InvalidRevision(pub String);

/// A git commit hash. Equality is by the raw 20 bytes, so the textual form it was parsed
/// from (upper/lower case, prefixed or not) does not matter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Revision([u8; SHA1_LEN]);

impl Revision {
    pub fn from_bytes(bytes: [u8; SHA1_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SHA1_LEN] {
        &self.0
    }

    /// Parse either a bare 40 character hex string or one carrying a `sha1:` prefix.
    pub fn parse_any<S: AsRef<str>>(s: S) -> Result<Self, InvalidRevision> {
        let s = s.as_ref();
        let digits = s.strip_prefix("sha1:").unwrap_or(s);
        if digits.len() != 2 * SHA1_LEN {
            return Err(InvalidRevision(s.to_string()));
        }
        let mut bytes = [0u8; SHA1_LEN];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| InvalidRevision(s.to_string()))?;
        Ok(Self(bytes))
    }

    /// Lowercase base-16 form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The form git itself prints and the hosting APIs accept.
    pub fn git_rev(&self) -> String {
        self.to_hex()
    }

    /// The abbreviated form used in log output.
    pub fn short(&self) -> String {
        self.to_hex()[..7].to_string()
    }
}

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.git_rev())
    }
}

impl std::fmt::Debug for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Revision({})", self.git_rev())
    }
}

impl std::str::FromStr for Revision {
    type Err = InvalidRevision;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_any(s)
    }
}

impl serde::Serialize for Revision {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.git_rev())
    }
}

impl<'de> serde::Deserialize<'de> for Revision {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse_any(&s).map_err(serde::de::Error::custom)
    }
}
