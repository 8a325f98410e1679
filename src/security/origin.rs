//! Origin and sender allow-listing.
//!
//! Every check here is a pure predicate: it returns `false` and logs at `warn`
//! instead of erroring, so callers can drop untrusted input without branching on
//! error kinds.

use crate::protocol::channel::WindowId;
use tracing::warn;
use url::Url;

/// Hostnames accepted on any port for local development.
pub const DEFAULT_LOOPBACK_HOSTS: &[&str] = &["localhost", "127.0.0.1"];

/// Static allow-list: exact origins plus loopback hostnames.
///
/// Built once from configuration; there is no mutation API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedOrigins {
    exact: Vec<String>,
    loopback_hosts: Vec<String>,
}

impl AllowedOrigins {
    /// Build an allow-list. Entries that do not parse as an http(s) origin are
    /// skipped with a warning; config validation reports them separately.
    pub fn new<I, S>(origins: I, loopback_hosts: Vec<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut exact = Vec::new();
        for entry in origins {
            match normalize_origin(entry.as_ref()) {
                Some(origin) => {
                    if !exact.contains(&origin) {
                        exact.push(origin);
                    }
                }
                None => warn!(entry = entry.as_ref(), "ignoring unparsable allowed origin"),
            }
        }
        Self {
            exact,
            loopback_hosts: loopback_hosts
                .into_iter()
                .map(|h| h.to_ascii_lowercase())
                .collect(),
        }
    }

    /// Allow-list with the default loopback hosts.
    pub fn with_default_loopback<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(
            origins,
            DEFAULT_LOOPBACK_HOSTS.iter().map(|h| h.to_string()).collect(),
        )
    }

    pub fn contains_origin(&self, origin: &str) -> bool {
        self.exact.iter().any(|o| o == origin)
    }

    pub fn is_loopback_host(&self, host: &str) -> bool {
        self.loopback_hosts.iter().any(|h| h == host)
    }

    pub fn origins(&self) -> &[String] {
        &self.exact
    }
}

/// Parse `raw` as an absolute http(s) URL and return its serialized origin.
pub fn normalize_origin(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.host_str()?;
    Some(url.origin().ascii_serialization())
}

/// Decides whether script/document URLs and inbound message senders are trusted.
#[derive(Debug, Clone)]
pub struct OriginValidator {
    host_origin: Option<String>,
    allowed: AllowedOrigins,
}

impl OriginValidator {
    pub fn new(host_origin: Option<&str>, allowed: AllowedOrigins) -> Self {
        Self {
            host_origin: host_origin.and_then(normalize_origin),
            allowed,
        }
    }

    pub fn host_origin(&self) -> Option<&str> {
        self.host_origin.as_deref()
    }

    pub fn allowed(&self) -> &AllowedOrigins {
        &self.allowed
    }

    /// Whether a script or document URL may be loaded into the guest.
    pub fn is_allowed_url(&self, candidate: &str) -> bool {
        let allowed = self.check_url(candidate);
        if !allowed {
            warn!(url = candidate, "rejected resource url");
        }
        allowed
    }

    fn check_url(&self, candidate: &str) -> bool {
        if candidate.is_empty() {
            return false;
        }
        if is_root_relative(candidate) {
            return true;
        }
        if candidate.starts_with("//") {
            return false;
        }
        match Url::parse(candidate) {
            Ok(url) => self.check_parsed(&url),
            Err(_) => false,
        }
    }

    /// Resolve the origin a script URL will load from. Root-relative paths
    /// resolve to the host origin.
    pub fn resolve_script_origin(&self, script_url: &str) -> Option<String> {
        if is_root_relative(script_url) {
            return self.host_origin.clone();
        }
        normalize_origin(script_url)
    }

    /// Whether an inbound message came from the guest window this host created,
    /// at a trusted origin.
    pub fn is_trusted_sender(&self, origin: &str, sender: WindowId, expected: WindowId) -> bool {
        if sender != expected {
            warn!(
                origin,
                sender = sender.as_u64(),
                expected = expected.as_u64(),
                "rejected message from unexpected window"
            );
            return false;
        }
        let trusted = match Url::parse(origin) {
            Ok(url) => self.check_parsed(&url),
            Err(_) => false,
        };
        if !trusted {
            warn!(origin, "rejected message from untrusted origin");
        }
        trusted
    }

    fn check_parsed(&self, url: &Url) -> bool {
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }
        let Some(host) = url.host_str() else {
            return false;
        };
        let origin = url.origin().ascii_serialization();
        if self.host_origin.as_deref() == Some(origin.as_str()) {
            return true;
        }
        if self.allowed.is_loopback_host(host) {
            return true;
        }
        self.allowed.contains_origin(&origin)
    }
}

/// `/path` but not `//host` and not `/\host` (browsers treat both as network paths).
fn is_root_relative(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    chars.next() == Some('/') && !matches!(chars.next(), Some('/') | Some('\\'))
}
