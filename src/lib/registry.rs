//! The set of input schemes a process understands, and the settings they share.

use std::path::Path;

use crate::attrs::{self, Attrs};
use crate::cache::Cache;
use crate::error::{Error, Result};
use crate::fetch::Tree;
use crate::input::Input;
use crate::provider::Provider;
use crate::settings::Settings;
use crate::store::Store;
use crate::url::ParsedUrl;

/// Routes URLs and attribute bags to the provider whose scheme or `type` they name.
///
/// Build one at startup and pass it to whatever resolves inputs.
#[derive(Debug, Clone)]
pub struct Registry {
    providers: Vec<Provider>,
    settings: Settings,
}

impl Registry {
    /// A registry with no providers.
    pub fn new(settings: Settings) -> Self {
        Self {
            providers: Vec::new(),
            settings,
        }
    }

    /// A registry with every built-in provider.
    pub fn with_default_providers(settings: Settings) -> Self {
        let mut registry = Self::new(settings);
        for provider in Provider::ALL {
            registry.register(*provider);
        }
        registry
    }

    /// Make `provider` available. Registering a provider twice has no effect.
    pub fn register(&mut self, provider: Provider) {
        if !self.providers.contains(&provider) {
            tracing::trace!("registering input scheme '{provider}'");
            self.providers.push(provider);
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    /// Parse `url` with whichever registered provider claims its scheme.
    pub fn input_from_url(&self, url: &str) -> Result<Input> {
        let parsed = ParsedUrl::parse(url)?;
        for provider in &self.providers {
            if let Some(input) = provider.input_from_url(&parsed)? {
                return Ok(input);
            }
        }
        Err(Error::UnsupportedScheme(parsed.scheme))
    }

    /// Validate `attrs` with whichever registered provider matches its `type`.
    pub fn input_from_attrs(&self, attrs: Attrs) -> Result<Input> {
        let input_type = attrs::get_str_attr(&attrs, "type")?.to_string();
        for provider in &self.providers {
            if provider.input_type() == input_type {
                return provider
                    .input_from_attrs(attrs)?
                    .ok_or(Error::UnsupportedScheme(input_type));
            }
        }
        Err(Error::UnsupportedScheme(input_type))
    }

    /// The registered provider responsible for `input`.
    pub fn provider_for(&self, input: &Input) -> Result<Provider> {
        let input_type = input.input_type()?;
        self.providers
            .iter()
            .find(|provider| provider.input_type() == input_type)
            .copied()
            .ok_or_else(|| Error::UnsupportedScheme(input_type.to_string()))
    }

    /// Fetch `input` with its provider; see [`Provider::fetch`].
    pub fn fetch(&self, store: &dyn Store, cache: &dyn Cache, input: &Input) -> Result<(Tree, Input)> {
        self.provider_for(input)?
            .fetch(&self.settings, store, cache, input)
    }

    /// Clone `input` over SSH with git into `dest`, bypassing the archive endpoints.
    pub fn clone_input<P: AsRef<Path>>(&self, input: &Input, dest: P) -> Result<()> {
        let request = self.provider_for(input)?.clone_request(input)?;
        tracing::info!("cloning {request} into {}", dest.as_ref().display());
        request.clone_into(dest)
    }
}

#[cfg(test)]
mod test_registry {
    use super::*;
    use crate::attrs;

    #[test]
    fn routes_by_scheme() {
        let registry = Registry::with_default_providers(Settings::default());
        let github = registry.input_from_url("github:a/b").unwrap();
        let gitlab = registry.input_from_url("gitlab:a/b").unwrap();
        assert_eq!(registry.provider_for(&github).unwrap(), Provider::GitHub);
        assert_eq!(registry.provider_for(&gitlab).unwrap(), Provider::GitLab);
    }

    #[test]
    fn unknown_scheme() {
        let registry = Registry::with_default_providers(Settings::default());
        let err = registry.input_from_url("sourcehut:a/b").unwrap_err();
        assert!(matches!(err, Error::UnsupportedScheme(s) if s == "sourcehut"));
    }

    #[test]
    fn only_registered_providers_are_used() {
        let mut registry = Registry::new(Settings::default());
        registry.register(Provider::GitLab);
        registry.register(Provider::GitLab);
        assert_eq!(registry.providers(), &[Provider::GitLab]);
        assert!(matches!(
            registry.input_from_url("github:a/b"),
            Err(Error::UnsupportedScheme(_))
        ));
        assert!(registry.input_from_url("gitlab:a/b").is_ok());
    }

    #[test]
    fn attrs_are_routed_and_validated() {
        let registry = Registry::with_default_providers(Settings::default());
        let input = registry
            .input_from_attrs(attrs! { "type" => "gitlab", "owner" => "o", "repo" => "r" })
            .unwrap();
        assert_eq!(input.to_string(), "gitlab:o/r");

        let err = registry
            .input_from_attrs(attrs! { "type" => "github", "owner" => "o", "repo" => "r", "url" => "x" })
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedAttribute(name) if name == "url"));

        let err = registry
            .input_from_attrs(attrs! { "type" => "tarball", "url" => "x" })
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedScheme(s) if s == "tarball"));

        let err = registry.input_from_attrs(attrs! { "owner" => "o" }).unwrap_err();
        assert!(matches!(err, Error::MissingAttribute(name) if name == "type"));
    }
}
