//! The [`Input`] value type: a validated attribute bag addressing a hosted repository.

use crate::attrs::{self, Attr, Attrs};
use crate::error::{Error, Result};
use crate::hash::Revision;

/// Attribute names an archive input may carry.
pub const ALLOWED_ATTRS: &[&str] = &[
    "type",
    "owner",
    "repo",
    "ref",
    "rev",
    "narHash",
    "lastModified",
    "host",
];

/// A (possibly partially specified) reference to a repository on a hosting provider.
///
/// Inputs are values: two inputs are equal exactly when their attributes are equal. The
/// only ways to change one are [`Input::apply_overrides`], which returns a new input, and
/// the fetch orchestrator, which works on its own copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Input {
    attrs: Attrs,
}

impl Input {
    /// Wrap attributes that have already been validated.
    pub(crate) fn new(attrs: Attrs) -> Self {
        Self { attrs }
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn into_attrs(self) -> Attrs {
        self.attrs
    }

    /// The provider discriminator, e.g. `github`.
    pub fn input_type(&self) -> Result<&str> {
        attrs::get_str_attr(&self.attrs, "type")
    }

    pub fn owner(&self) -> Result<&str> {
        attrs::get_str_attr(&self.attrs, "owner")
    }

    pub fn repo(&self) -> Result<&str> {
        attrs::get_str_attr(&self.attrs, "repo")
    }

    pub fn host(&self) -> Result<Option<&str>> {
        attrs::maybe_get_str_attr(&self.attrs, "host")
    }

    /// The branch or tag name, if any.
    pub fn get_ref(&self) -> Result<Option<&str>> {
        attrs::maybe_get_str_attr(&self.attrs, "ref")
    }

    /// The commit hash, if any.
    pub fn get_rev(&self) -> Result<Option<Revision>> {
        attrs::maybe_get_str_attr(&self.attrs, "rev")?
            .map(|rev| {
                Revision::parse_any(rev)
                    .map_err(|e| Error::bad_address(format!("invalid input attribute 'rev': {e}")))
            })
            .transpose()
    }

    pub fn last_modified(&self) -> Result<Option<u64>> {
        attrs::maybe_get_int_attr(&self.attrs, "lastModified")
    }

    /// Whether the input names exactly one commit.
    pub fn is_locked(&self) -> bool {
        matches!(self.get_rev(), Ok(Some(_)))
    }

    /// Whether the input carries everything a fetch would add, i.e. both `rev` and
    /// `lastModified`.
    pub fn has_all_info(&self) -> bool {
        self.is_locked() && matches!(self.last_modified(), Ok(Some(_)))
    }

    /// Return a copy of this input pointing at another branch/tag or commit. Setting one
    /// clears the other; asking for both is an error.
    pub fn apply_overrides(&self, git_ref: Option<&str>, rev: Option<Revision>) -> Result<Input> {
        if let (Some(git_ref), Some(rev)) = (git_ref, rev) {
            return Err(Error::bad_address(format!(
                "cannot apply both a commit hash ({rev}) and a branch/tag name ('{git_ref}') to input '{self}'"
            )));
        }
        let mut input = self.clone();
        if let Some(rev) = rev {
            input.set_rev(rev);
        }
        if let Some(git_ref) = git_ref {
            if !crate::url::is_valid_ref(git_ref) {
                return Err(Error::bad_address(format!(
                    "cannot apply invalid branch/tag name '{git_ref}' to input '{self}'"
                )));
            }
            input.set_ref(git_ref);
        }
        Ok(input)
    }

    pub(crate) fn set_ref(&mut self, git_ref: &str) {
        self.attrs.insert("ref".to_string(), Attr::from(git_ref));
        self.attrs.remove("rev");
    }

    pub(crate) fn set_rev(&mut self, rev: Revision) {
        self.attrs.insert("rev".to_string(), Attr::from(rev.git_rev()));
        self.attrs.remove("ref");
    }

    pub(crate) fn set_last_modified(&mut self, last_modified: u64) {
        self.attrs
            .insert("lastModified".to_string(), Attr::from(last_modified));
    }
}

impl std::fmt::Display for Input {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match crate::url::to_url(self) {
            Ok(url) => write!(f, "{url}"),
            Err(_) => write!(f, "{:?}", self.attrs),
        }
    }
}

#[cfg(test)]
mod test_input {
    use super::*;

    const REV: &str = "0123456789abcdef0123456789abcdef01234567";

    fn nixpkgs() -> Input {
        Input::new(crate::attrs! {
            "type" => "github",
            "owner" => "NixOS",
            "repo" => "nixpkgs",
            "ref" => "nixos-23.05",
        })
    }

    #[test]
    fn accessors() {
        let input = nixpkgs();
        assert_eq!(input.input_type().unwrap(), "github");
        assert_eq!(input.owner().unwrap(), "NixOS");
        assert_eq!(input.repo().unwrap(), "nixpkgs");
        assert_eq!(input.get_ref().unwrap(), Some("nixos-23.05"));
        assert_eq!(input.get_rev().unwrap(), None);
        assert_eq!(input.host().unwrap(), None);
        assert!(!input.is_locked());
    }

    #[test]
    fn has_all_info_needs_rev_and_last_modified() {
        let rev = Revision::parse_any(REV).unwrap();
        let mut input = nixpkgs();
        assert!(!input.has_all_info());
        input.set_rev(rev);
        assert!(input.is_locked());
        assert!(!input.has_all_info());
        input.set_last_modified(1686000000);
        assert!(input.has_all_info());
    }

    #[test]
    fn overriding_rev_clears_ref() {
        let rev = Revision::parse_any(REV).unwrap();
        let input = nixpkgs().apply_overrides(None, Some(rev)).unwrap();
        assert_eq!(input.get_ref().unwrap(), None);
        assert_eq!(input.get_rev().unwrap(), Some(rev));
    }

    #[test]
    fn overriding_ref_clears_rev() {
        let rev = Revision::parse_any(REV).unwrap();
        let locked = nixpkgs().apply_overrides(None, Some(rev)).unwrap();
        let input = locked.apply_overrides(Some("master"), None).unwrap();
        assert_eq!(input.get_ref().unwrap(), Some("master"));
        assert_eq!(input.get_rev().unwrap(), None);
        // The original is untouched.
        assert_eq!(locked.get_rev().unwrap(), Some(rev));
    }

    #[test]
    fn overriding_both_fails_naming_the_input() {
        let rev = Revision::parse_any(REV).unwrap();
        let err = nixpkgs()
            .apply_overrides(Some("master"), Some(rev))
            .unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, Error::BadAddress(_)));
        assert!(msg.contains(REV), "{msg}");
        assert!(msg.contains("'master'"), "{msg}");
        assert!(msg.contains("github:NixOS/nixpkgs/nixos-23.05"), "{msg}");
    }

    #[test]
    fn overriding_with_invalid_ref_fails() {
        let err = nixpkgs().apply_overrides(Some("a..b"), None).unwrap_err();
        assert!(matches!(err, Error::BadAddress(msg) if msg.contains("'a..b'")));
    }

    #[test]
    fn invalid_rev_attribute_is_reported() {
        let input = Input::new(crate::attrs! {
            "type" => "github",
            "owner" => "a",
            "repo" => "b",
            "rev" => "not-a-hash",
        });
        assert!(matches!(input.get_rev(), Err(Error::BadAddress(msg)) if msg.contains("not-a-hash")));
        assert!(!input.is_locked());
    }
}
