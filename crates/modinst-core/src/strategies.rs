//! Installation strategies for non-local module sources.
//!
//! A strategy turns a module request into a concrete package address and
//! version that the fetcher can materialize. Strategies are registered per
//! [`SourceKind`]; a kind with no registered strategy yields
//! [`SourceError::Unsupported`] instead of aborting the installation.

use std::collections::HashMap;
use std::fmt;

use semver::Version;
use thiserror::Error;

use crate::config::ModuleRequest;
use crate::registry::{ModuleRegistry, RegistryError, select_version};
use crate::source::{RegistryAddress, SourceKind};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("No installation strategy is configured for {0} module sources")]
    Unsupported(SourceKind),

    #[error("{0:?} is not a valid module registry address")]
    InvalidAddress(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// What to fetch for a module, and at which version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPackage {
    pub package_addr: String,
    pub version: Option<Version>,
}

pub trait Strategy {
    /// Resolve `req` to a fetchable package.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be resolved.
    fn resolve(&self, req: &ModuleRequest) -> Result<ResolvedPackage, SourceError>;
}

/// Resolves registry addresses through a [`ModuleRegistry`].
#[derive(Debug)]
pub struct RegistryStrategy<R> {
    registry: R,
}

impl<R: ModuleRegistry> RegistryStrategy<R> {
    pub fn new(registry: R) -> Self {
        Self { registry }
    }
}

impl<R: ModuleRegistry> Strategy for RegistryStrategy<R> {
    fn resolve(&self, req: &ModuleRequest) -> Result<ResolvedPackage, SourceError> {
        let addr = RegistryAddress::parse(&req.source_addr)
            .ok_or_else(|| SourceError::InvalidAddress(req.source_addr.clone()))?;

        let releases = self.registry.versions(&addr)?;
        let constraint = req.version.required.as_ref();
        let release = select_version(&releases, constraint).ok_or_else(|| {
            RegistryError::NoMatchingVersion {
                module: addr.to_string(),
                constraint: constraint
                    .map_or_else(|| "any stable release".to_string(), ToString::to_string),
            }
        })?;

        tracing::debug!(module = %addr, version = %release.version, "selected registry release");
        Ok(ResolvedPackage {
            package_addr: release.download_url.clone(),
            version: Some(release.version.clone()),
        })
    }
}

/// Uses the source address itself as the package address, unversioned.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectStrategy;

impl Strategy for DirectStrategy {
    fn resolve(&self, req: &ModuleRequest) -> Result<ResolvedPackage, SourceError> {
        Ok(ResolvedPackage {
            package_addr: req.source_addr.clone(),
            version: None,
        })
    }
}

/// Strategies keyed by the source kind they handle.
#[derive(Default)]
pub struct Strategies {
    by_kind: HashMap<SourceKind, Box<dyn Strategy>>,
}

impl fmt::Debug for Strategies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<String> = self.by_kind.keys().map(ToString::to_string).collect();
        kinds.sort();
        f.debug_struct("Strategies")
            .field("kinds", &kinds)
            .finish()
    }
}

impl Strategies {
    /// No strategies at all: every non-local source is unsupported.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `strategy` for `kind`, replacing any previous one.
    pub fn with(mut self, kind: SourceKind, strategy: impl Strategy + 'static) -> Self {
        self.register(kind, Box::new(strategy));
        self
    }

    pub fn register(&mut self, kind: SourceKind, strategy: Box<dyn Strategy>) {
        self.by_kind.insert(kind, strategy);
    }

    /// Resolve `req` with the strategy registered for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Unsupported`] if no strategy handles `kind`,
    /// otherwise whatever the strategy reports.
    pub fn resolve(
        &self,
        kind: SourceKind,
        req: &ModuleRequest,
    ) -> Result<ResolvedPackage, SourceError> {
        let strategy = self
            .by_kind
            .get(&kind)
            .ok_or(SourceError::Unsupported(kind))?;
        strategy.resolve(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VersionConstraint;
    use crate::registry::{IndexRegistry, RegistryRelease};
    use modinst_schema::{ModulePath, SourceRange};
    use semver::VersionReq;

    fn request(source: &str, constraint: Option<&str>) -> ModuleRequest {
        ModuleRequest {
            name: "vpc".to_string(),
            path: ModulePath::new(["vpc"]),
            parent_path: ModulePath::root(),
            source_addr: source.to_string(),
            version: VersionConstraint {
                required: constraint.map(|c| VersionReq::parse(c).unwrap()),
                decl_range: None,
            },
            call_range: SourceRange::new("module.toml", 1, 1),
            source_addr_range: SourceRange::new("module.toml", 2, 1),
        }
    }

    fn registry() -> IndexRegistry {
        let mut registry = IndexRegistry::new();
        for v in ["1.0.0", "1.5.0", "2.0.0"] {
            registry.insert(
                "acme/vpc/aws",
                RegistryRelease {
                    version: Version::parse(v).unwrap(),
                    download_url: format!("https://example.com/vpc-{v}.tgz"),
                },
            );
        }
        registry
    }

    #[test]
    fn test_unregistered_kind_is_unsupported() {
        let strategies = Strategies::new();
        let err = strategies
            .resolve(SourceKind::Remote, &request("https://x/y.tgz", None))
            .unwrap_err();
        assert!(matches!(err, SourceError::Unsupported(SourceKind::Remote)));
    }

    #[test]
    fn test_direct_strategy_passes_address_through() {
        let strategies = Strategies::new().with(SourceKind::Remote, DirectStrategy);
        let resolved = strategies
            .resolve(SourceKind::Remote, &request("https://x/y.tgz", None))
            .unwrap();
        assert_eq!(resolved.package_addr, "https://x/y.tgz");
        assert_eq!(resolved.version, None);
    }

    #[test]
    fn test_registry_strategy_picks_matching_release() {
        let strategy = RegistryStrategy::new(registry());
        let resolved = strategy
            .resolve(&request("acme/vpc/aws", Some("~1.0")))
            .unwrap();
        assert_eq!(resolved.version, Some(Version::new(1, 0, 0)));
        assert_eq!(resolved.package_addr, "https://example.com/vpc-1.0.0.tgz");

        let newest = strategy.resolve(&request("acme/vpc/aws", None)).unwrap();
        assert_eq!(newest.version, Some(Version::new(2, 0, 0)));
    }

    #[test]
    fn test_registry_strategy_reports_no_match() {
        let strategy = RegistryStrategy::new(registry());
        let err = strategy
            .resolve(&request("acme/vpc/aws", Some(">=3")))
            .unwrap_err();
        assert!(matches!(
            err,
            SourceError::Registry(RegistryError::NoMatchingVersion { .. })
        ));
    }
}
