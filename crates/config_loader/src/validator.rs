//! Write-path validation
//!
//! Rules:
//! - target must be `http://` or `https://`
//! - host is a domain name, a single-label hostname (`localhost`, `n8n`),
//!   or dotted IPv4; port/path optional
//! - no duplicate targets within one route
//! - at least one target per route
//!
//! The load path does not run these checks: hand-edited files are migrated
//! leniently, writes through the API are strict.

use std::collections::HashSet;

use contracts::ContractError;
use url::{Host, Url};

use crate::document::RawDocument;

/// Validate a single target URL
pub fn validate_target_url(conversation_id: &str, raw: &str) -> Result<(), ContractError> {
    let invalid = |reason: &str| ContractError::invalid_url(conversation_id, raw, reason);

    let lower = raw.to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return Err(invalid("scheme must be http:// or https://"));
    }
    if raw.chars().any(char::is_whitespace) {
        return Err(invalid("url must not contain whitespace"));
    }

    let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;

    match url.host() {
        Some(Host::Domain(domain)) => {
            if is_valid_domain(domain) {
                Ok(())
            } else {
                Err(invalid("host is not a valid domain name"))
            }
        }
        // The url crate normalizes shorthand like `http://1234` into IPv4;
        // only accept hosts that were written in dotted form.
        Some(Host::Ipv4(ip)) if authority(raw).starts_with(&ip.to_string()) => Ok(()),
        Some(Host::Ipv4(_)) => Err(invalid("IPv4 host must be written in dotted form")),
        Some(Host::Ipv6(_)) => Err(invalid("IPv6 hosts are not supported")),
        None => Err(invalid("missing host")),
    }
}

/// Validate the target list of one route
pub fn validate_targets(conversation_id: &str, urls: &[String]) -> Result<(), ContractError> {
    if conversation_id.trim().is_empty() {
        return Err(ContractError::config_invalid("conversation id cannot be empty"));
    }
    if urls.is_empty() {
        return Err(ContractError::EmptyTargets {
            conversation_id: conversation_id.to_string(),
        });
    }

    let mut seen = HashSet::new();
    for url in urls {
        validate_target_url(conversation_id, url)?;
        if !seen.insert(url.as_str()) {
            return Err(ContractError::duplicate_target(conversation_id, url));
        }
    }
    Ok(())
}

/// Validate every route of a document with the write-path rules
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(document: &RawDocument) -> Result<(), ContractError> {
    for (id, raw) in &document.routes {
        validate_targets(id, &raw.target_urls())?;
    }
    Ok(())
}

/// Host[:port] part of a URL that already passed the scheme check
fn authority(raw: &str) -> &str {
    let rest = raw.split_once("://").map(|(_, rest)| rest).unwrap_or(raw);
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..end];
    authority.rsplit_once('@').map(|(_, host)| host).unwrap_or(authority)
}

/// Labels of 1-63 alphanumerics/hyphens, no leading or trailing hyphen.
/// Multi-label names need an alphabetic TLD; a single label is a plain
/// hostname such as a compose service name.
fn is_valid_domain(domain: &str) -> bool {
    let domain = domain.strip_suffix('.').unwrap_or(domain);
    let labels: Vec<&str> = domain.split('.').collect();
    if domain.is_empty() || domain.len() > 253 {
        return false;
    }

    let label_ok = |label: &str| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    };

    let tld_ok = labels
        .last()
        .map(|tld| tld.len() >= 2 && (tld.chars().all(|c| c.is_ascii_alphabetic()) || tld.starts_with("xn--")))
        .unwrap_or(false);

    labels.iter().all(|l| label_ok(l)) && (labels.len() == 1 || tld_ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_common_targets() {
        for url in [
            "http://a.test/h1",
            "https://n8n.local/webhook/one",
            "http://localhost:5678/webhook/abc",
            "http://192.168.1.10:8080/hook",
            "https://hooks.example.com",
            "http://n8n:5678/webhook/x",
            "http://webhook-relay/hook",
        ] {
            assert!(validate_target_url("c", url).is_ok(), "rejected {url}");
        }
    }

    #[test]
    fn test_rejects_bad_targets() {
        for url in [
            "ftp://a.test/h1",
            "a.test/h1",
            "http://",
            "http://bad_host.test",
            "http://-a.test",
            "http://1234/h",
            "http://[::1]:80/",
            "http://a.test/with space",
            "http://-relay/hook",
            "http://a.123/h",
        ] {
            let err = validate_target_url("c", url).unwrap_err();
            assert!(matches!(err, ContractError::InvalidUrl { .. }), "accepted {url}");
        }
    }

    #[test]
    fn test_duplicate_target_rejected() {
        let urls = vec!["http://a.test/h1".to_string(), "http://a.test/h1".to_string()];
        let err = validate_targets("555@x", &urls).unwrap_err();
        assert!(matches!(err, ContractError::DuplicateTarget { .. }));
    }

    #[test]
    fn test_empty_targets_rejected() {
        let err = validate_targets("555@x", &[]).unwrap_err();
        assert!(matches!(err, ContractError::EmptyTargets { .. }));
    }

    #[test]
    fn test_validate_document_reports_first_error() {
        let document: RawDocument = serde_json::from_str(
            r#"{ "routes": { "555@x": ["http://a.test/h1", "http://a.test/h1"] } }"#,
        )
        .unwrap();
        let err = validate(&document).unwrap_err();
        assert!(err.to_string().contains("duplicate"), "got: {err}");
    }
}
