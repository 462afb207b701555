//! Source address classification.
//!
//! The kind of a module's source address alone decides which installation
//! strategy runs. Classification is pure string inspection so it can be
//! tested without filesystem or network access.

use std::sync::LazyLock;

use regex::Regex;

/// The three families of module source addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// A path relative to the declaring module (`./x`, `../x`).
    Local,
    /// A `[host/]namespace/name/provider` module registry coordinate.
    Registry,
    /// Anything else: archive URLs, file paths, VCS locators.
    Remote,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Local => "local",
            Self::Registry => "registry",
            Self::Remote => "remote",
        };
        f.write_str(name)
    }
}

const LOCAL_PREFIXES: [&str; 4] = ["./", "../", ".\\", "..\\"];

static NAME_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9A-Za-z](?:[0-9A-Za-z_-]{0,62}[0-9A-Za-z])?$").expect("valid regex")
});

static PROVIDER_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-z]{1,64}$").expect("valid regex"));

/// Classify a source address.
pub fn classify(addr: &str) -> SourceKind {
    if is_local(addr) {
        SourceKind::Local
    } else if RegistryAddress::parse(addr).is_some() {
        SourceKind::Registry
    } else {
        SourceKind::Remote
    }
}

/// Whether `addr` is a path relative to the declaring module.
pub fn is_local(addr: &str) -> bool {
    LOCAL_PREFIXES.iter().any(|p| addr.starts_with(p))
}

/// A parsed module registry address.
///
/// # Example
///
/// ```
/// use modinst_core::source::RegistryAddress;
///
/// let addr = RegistryAddress::parse("acme/vpc/aws").unwrap();
/// assert_eq!(addr.namespace(), "acme");
/// assert_eq!(addr.name(), "vpc");
/// assert_eq!(addr.provider(), "aws");
/// assert_eq!(addr.host(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistryAddress {
    host: Option<String>,
    namespace: String,
    name: String,
    provider: String,
}

impl RegistryAddress {
    /// Parse `addr`, returning `None` if it is not a registry address.
    pub fn parse(addr: &str) -> Option<Self> {
        if addr.contains("://") || addr.contains("::") || is_local(addr) {
            return None;
        }

        let parts: Vec<&str> = addr.split('/').collect();
        let (host, rest) = match parts.as_slice() {
            [namespace, name, provider] => (None, [*namespace, *name, *provider]),
            [host, namespace, name, provider] => {
                if !is_hostname(host) {
                    return None;
                }
                (Some((*host).to_string()), [*namespace, *name, *provider])
            }
            _ => return None,
        };

        let [namespace, name, provider] = rest;
        if !NAME_PART.is_match(namespace)
            || !NAME_PART.is_match(name)
            || !PROVIDER_PART.is_match(provider)
        {
            return None;
        }

        Some(Self {
            host,
            namespace: namespace.to_string(),
            name: name.to_string(),
            provider: provider.to_string(),
        })
    }

    /// Registry host, if the address names one explicitly.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// The address without its host, as used for registry lookups.
    pub fn module_id(&self) -> String {
        format!("{}/{}/{}", self.namespace, self.name, self.provider)
    }
}

impl std::fmt::Display for RegistryAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(host) = &self.host {
            write!(f, "{host}/")?;
        }
        write!(f, "{}", self.module_id())
    }
}

fn is_hostname(s: &str) -> bool {
    s.contains('.')
        && s.split('.').all(|label| {
            !label.is_empty()
                && label
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == ':')
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_table() {
        let cases = [
            ("./child", SourceKind::Local),
            ("../shared/net", SourceKind::Local),
            (".\\win", SourceKind::Local),
            ("acme/vpc/aws", SourceKind::Registry),
            ("registry.example.com/acme/vpc/aws", SourceKind::Registry),
            ("localhost:8080/acme/vpc/aws", SourceKind::Remote),
            ("https://example.com/vpc.tar.gz", SourceKind::Remote),
            ("git::https://example.com/vpc.git", SourceKind::Remote),
            ("github.com/acme/vpc", SourceKind::Remote),
            ("acme/vpc/AWS", SourceKind::Remote),
            ("acme//aws", SourceKind::Remote),
            ("child", SourceKind::Remote),
            ("/abs/path/vpc.tgz", SourceKind::Remote),
            ("", SourceKind::Remote),
        ];

        for (addr, want) in cases {
            assert_eq!(classify(addr), want, "classify({addr:?})");
        }
    }

    #[test]
    fn test_registry_address_with_host() {
        let addr = RegistryAddress::parse("registry.example.com/acme/vpc/aws").unwrap();
        assert_eq!(addr.host(), Some("registry.example.com"));
        assert_eq!(addr.module_id(), "acme/vpc/aws");
        assert_eq!(addr.to_string(), "registry.example.com/acme/vpc/aws");
    }

    #[test]
    fn test_name_part_length_limit() {
        let long = "a".repeat(65);
        assert!(RegistryAddress::parse(&format!("{long}/vpc/aws")).is_none());
        let ok = "a".repeat(64);
        assert!(RegistryAddress::parse(&format!("{ok}/vpc/aws")).is_some());
    }
}
