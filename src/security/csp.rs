//! Content-Security-Policy generation for guest documents.

use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

/// Extra domains a widget declares it needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CspConfig {
    /// Origins added to `connect-src`.
    #[serde(default)]
    pub connect_domains: Vec<String>,

    /// Origins added to `img-src`, `font-src` and `media-src`.
    #[serde(default)]
    pub resource_domains: Vec<String>,
}

/// Build the policy string for a guest document.
///
/// `script_origin` is the origin the guest bundle loads from; it is granted
/// script, style and connect access. Nested frames and form submission are
/// always denied.
pub fn build_csp(config: Option<&CspConfig>, script_origin: Option<&str>) -> String {
    let script_origin = script_origin.and_then(sanitize_domain);
    let connect_extra = config
        .map(|c| sanitize_all(&c.connect_domains, "connect"))
        .unwrap_or_default();
    let resource_extra = config
        .map(|c| sanitize_all(&c.resource_domains, "resource"))
        .unwrap_or_default();

    let own: Vec<String> = script_origin.into_iter().collect();

    let script_src = directive("script-src", &["'self'"], &own, &[]);
    let style_src = directive("style-src", &["'self'", "'unsafe-inline'"], &own, &[]);
    let connect_src = directive("connect-src", &["'self'"], &own, &connect_extra);
    let resource = |name: &str| {
        directive(name, &["'self'", "data:", "blob:"], &own, &resource_extra)
    };

    [
        "default-src 'none'".to_string(),
        script_src,
        style_src,
        connect_src,
        resource("img-src"),
        resource("font-src"),
        resource("media-src"),
        "frame-src 'none'".to_string(),
        "form-action 'none'".to_string(),
        "object-src 'none'".to_string(),
        "base-uri 'none'".to_string(),
    ]
    .join("; ")
}

fn directive(name: &str, keywords: &[&str], own: &[String], extra: &[String]) -> String {
    let mut sources: Vec<&str> = keywords.to_vec();
    for source in own.iter().chain(extra.iter()) {
        if !sources.contains(&source.as_str()) {
            sources.push(source);
        }
    }
    format!("{} {}", name, sources.join(" "))
}

fn sanitize_all(domains: &[String], kind: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for raw in domains {
        match sanitize_domain(raw) {
            Some(origin) => {
                if !out.contains(&origin) {
                    out.push(origin);
                }
            }
            None => warn!(domain = %raw, kind, "dropping invalid csp domain"),
        }
    }
    out
}

/// Accept only an absolute http(s)/ws(s) origin, returned in serialized form.
pub fn sanitize_domain(raw: &str) -> Option<String> {
    if raw.is_empty()
        || raw
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '\'' | '"' | ',' | ';' | '*'))
    {
        return None;
    }
    let url = Url::parse(raw).ok()?;
    if !matches!(url.scheme(), "http" | "https" | "ws" | "wss") {
        return None;
    }
    let host = url.host_str()?;
    if !url.username().is_empty() || url.password().is_some() {
        return None;
    }
    if !matches!(url.path(), "" | "/") || url.query().is_some() || url.fragment().is_some() {
        return None;
    }
    let origin = match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    };
    Some(origin)
}
