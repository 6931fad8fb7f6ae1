//! Conversion between [`Input`]s and their `<type>:<owner>/<repo>[/<ref-or-rev>]` URL form.

use std::sync::LazyLock;

use regex::Regex;

use crate::attrs::{self, Attr, Attrs};
use crate::error::{Error, Result};
use crate::hash::Revision;
use crate::input::{ALLOWED_ATTRS, Input};

static REV_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{40}$").expect("revision regex is valid"));

static REF_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9@][a-zA-Z0-9_./@+-]*$").expect("ref regex is valid"));

// Things `git check-ref-format` rejects that the character class above lets through.
static BAD_REF_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"//|/\.|\.\.|@\{|\.lock$|/$|\.$").expect("bad ref regex is valid")
});

static HOST_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9.-]+$").expect("host regex is valid"));

/// Whether `s` has the shape of a full commit hash.
pub fn is_rev(s: &str) -> bool {
    REV_REGEX.is_match(s)
}

/// Whether `s` is acceptable as a branch or tag name.
pub fn is_valid_ref(s: &str) -> bool {
    REF_REGEX.is_match(s) && !BAD_REF_REGEX.is_match(s)
}

/// Whether `s` is acceptable as an alternate instance host name.
pub fn is_valid_host(s: &str) -> bool {
    HOST_REGEX.is_match(s)
}

/// A URL split into the parts inputs care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUrl {
    pub url: String,
    pub scheme: String,
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl ParsedUrl {
    pub fn parse<S: AsRef<str>>(s: S) -> Result<Self> {
        let s = s.as_ref();
        let parsed = url::Url::parse(s)
            .map_err(|e| Error::bad_address(format!("'{s}' is not a valid URL: {e}")))?;
        Ok(Self {
            url: s.to_string(),
            scheme: parsed.scheme().to_string(),
            path: parsed.path().to_string(),
            query: parsed.query_pairs().into_owned().collect(),
        })
    }

    /// Non-empty `/`-separated path components.
    pub fn path_segments(&self) -> Vec<&str> {
        self.path.split('/').filter(|s| !s.is_empty()).collect()
    }
}

impl std::fmt::Display for ParsedUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.scheme, self.path)?;
        if !self.query.is_empty() {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(&self.query)
                .finish();
            write!(f, "?{query}")?;
        }
        Ok(())
    }
}

/// Build an input of type `input_type` from a URL. Returns `Ok(None)` when the URL's scheme
/// belongs to some other input type.
pub fn input_from_url(input_type: &str, url: &ParsedUrl) -> Result<Option<Input>> {
    if url.scheme != input_type {
        return Ok(None);
    }
    let raw = &url.url;
    let path = url.path_segments();

    let mut rev: Option<Revision> = None;
    let mut git_ref: Option<String> = None;
    let mut host: Option<String> = None;

    match path.len() {
        2 => {}
        3 => {
            let last = path[2];
            if is_rev(last) {
                rev = Some(Revision::parse_any(last).map_err(|e| {
                    Error::bad_address(format!("in URL '{raw}', {e}"))
                })?);
            } else if is_valid_ref(last) {
                git_ref = Some(last.to_string());
            } else {
                return Err(Error::bad_address(format!(
                    "in URL '{raw}', '{last}' is not a commit hash or branch/tag name"
                )));
            }
        }
        _ => return Err(Error::bad_address(format!("URL '{raw}' is invalid"))),
    }

    for (name, value) in &url.query {
        match name.as_str() {
            "rev" => {
                if rev.is_some() {
                    return Err(Error::bad_address(format!(
                        "URL '{raw}' contains multiple commit hashes"
                    )));
                }
                rev = Some(Revision::parse_any(value).map_err(|e| {
                    Error::bad_address(format!("in URL '{raw}', {e}"))
                })?);
            }
            "ref" => {
                if !is_valid_ref(value) {
                    return Err(Error::bad_address(format!(
                        "URL '{raw}' contains an invalid branch/tag name '{value}'"
                    )));
                }
                if git_ref.is_some() {
                    return Err(Error::bad_address(format!(
                        "URL '{raw}' contains multiple branch/tag names"
                    )));
                }
                git_ref = Some(value.clone());
            }
            "host" => {
                if !is_valid_host(value) {
                    return Err(Error::bad_address(format!(
                        "URL '{raw}' contains an invalid instance host '{value}'"
                    )));
                }
                if host.is_some() {
                    return Err(Error::bad_address(format!(
                        "URL '{raw}' contains multiple instance hosts"
                    )));
                }
                host = Some(value.clone());
            }
            _ => {
                return Err(Error::bad_address(format!(
                    "URL '{raw}' contains unsupported parameter '{name}'"
                )));
            }
        }
    }

    if let (Some(git_ref), Some(rev)) = (&git_ref, &rev) {
        return Err(Error::bad_address(format!(
            "URL '{raw}' contains both a commit hash and a branch/tag name {git_ref} {rev}"
        )));
    }

    let mut attrs = crate::attrs! {
        "type" => input_type,
        "owner" => path[0],
        "repo" => path[1],
    };
    if let Some(rev) = rev {
        attrs.insert("rev".to_string(), Attr::from(rev.git_rev()));
    }
    if let Some(git_ref) = git_ref {
        attrs.insert("ref".to_string(), Attr::from(git_ref));
    }
    if let Some(host) = host {
        attrs.insert("host".to_string(), Attr::from(host));
    }
    Ok(Some(Input::new(attrs)))
}

/// Validate a raw attribute bag as an input of type `input_type`. Returns `Ok(None)` when the
/// bag's `type` is some other input type.
pub fn input_from_attrs(input_type: &str, attrs: Attrs) -> Result<Option<Input>> {
    if attrs::maybe_get_str_attr(&attrs, "type").ok().flatten() != Some(input_type) {
        return Ok(None);
    }
    if let Some(name) = attrs.keys().find(|name| !ALLOWED_ATTRS.contains(&name.as_str())) {
        return Err(Error::UnsupportedAttribute(name.clone()));
    }
    attrs::get_str_attr(&attrs, "owner")?;
    attrs::get_str_attr(&attrs, "repo")?;

    let input = Input::new(attrs);
    if let (Some(git_ref), Some(rev)) = (input.get_ref()?, input.get_rev()?) {
        return Err(Error::bad_address(format!(
            "input attributes contain both a commit hash and a branch/tag name {git_ref} {rev}"
        )));
    }
    Ok(Some(input))
}

/// Render an input back into URL form. This is the inverse of [`input_from_url`].
pub fn to_url(input: &Input) -> Result<ParsedUrl> {
    let input_type = input.input_type()?;
    let owner = input.owner()?;
    let repo = input.repo()?;
    let git_ref = input.get_ref()?;
    let rev = attrs::maybe_get_str_attr(input.attrs(), "rev")?;

    let mut path = format!("{owner}/{repo}");
    let mut query = Vec::new();
    match (git_ref, rev) {
        (Some(git_ref), Some(rev)) => {
            return Err(Error::bad_address(format!(
                "input {owner}/{repo} has both a commit hash and a branch/tag name {git_ref} {rev}"
            )));
        }
        // A ref with a `/` would read back as extra path segments
        (Some(git_ref), None) if git_ref.contains('/') => {
            query.push(("ref".to_string(), git_ref.to_string()));
        }
        (Some(git_ref), None) => path = format!("{path}/{git_ref}"),
        (None, Some(rev)) => path = format!("{path}/{}", rev.to_ascii_lowercase()),
        (None, None) => {}
    }
    if let Some(host) = input.host()? {
        query.push(("host".to_string(), host.to_string()));
    }
    let mut url = ParsedUrl {
        url: String::new(),
        scheme: input_type.to_string(),
        path,
        query,
    };
    url.url = url.to_string();
    Ok(url)
}
