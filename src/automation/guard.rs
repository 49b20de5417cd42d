//! Target and payload checks applied before any simulated submission.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::error::{AppError, AppResult};

/// Longest value, in characters, forwarded to a form field.
pub const MAX_FIELD_VALUE_CHARS: usize = 1000;

static FIELD_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_\-\[\].]+$").expect("valid regex"));

/// Broker domains automation may target. A host matches when it equals an
/// entry or is a subdomain of one.
pub const DEFAULT_ALLOWED_DOMAINS: &[&str] = &[
    "acxiom.com",
    "addresses.com",
    "alliantinsight.com",
    "archives.com",
    "beenverified.com",
    "checkpeople.com",
    "chexsystems.com",
    "corelogic.com",
    "data-axle.com",
    "earlywarning.com",
    "epsilon.com",
    "equifax.com",
    "experian.com",
    "fastpeoplesearch.com",
    "instantcheckmate.com",
    "intelius.com",
    "lexisnexis.com",
    "liveramp.com",
    "lotame.com",
    "milliman.com",
    "mylife.com",
    "nuwber.com",
    "oracle.com",
    "peoplefinders.com",
    "peoplelooker.com",
    "pipl.com",
    "plaid.com",
    "publicrecordsnow.com",
    "quantcast.com",
    "radaris.com",
    "socialcatfish.com",
    "spokeo.com",
    "thatsthem.com",
    "transunion.com",
    "truepeoplesearch.com",
    "truthfinder.com",
    "usphonebook.com",
    "ussearch.com",
    "verisk.com",
    "whitepages.com",
];

pub fn default_allowed_domains() -> Vec<String> {
    DEFAULT_ALLOWED_DOMAINS.iter().map(|d| d.to_string()).collect()
}

/// `host` equals `domain` or is one of its subdomains.
pub fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Parse `raw` and make sure it is an http(s) URL on an allow-listed host.
pub fn check_url(raw: &str, allowed: &[String]) -> AppResult<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| AppError::Validation(format!("invalid URL '{raw}': {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::Validation(format!(
            "unsupported protocol '{}' in {raw}",
            url.scheme()
        )));
    }

    let host = url
        .host_str()
        .map(|h| h.trim_end_matches('.').to_ascii_lowercase())
        .ok_or_else(|| AppError::Validation(format!("URL has no host: {raw}")))?;

    if !allowed.iter().any(|domain| host_matches(&host, domain)) {
        return Err(AppError::Validation(format!(
            "domain '{host}' is not an allowed broker domain"
        )));
    }

    Ok(url)
}

/// Drop keys outside `[a-zA-Z0-9_\-\[\].]` and cap values at
/// [`MAX_FIELD_VALUE_CHARS`] characters.
pub fn sanitize_form_data(data: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    data.iter()
        .filter(|(key, _)| {
            let ok = FIELD_KEY_RE.is_match(key);
            if !ok {
                tracing::warn!("Dropping form field with disallowed key {key:?}");
            }
            ok
        })
        .map(|(key, value)| {
            let value = if value.chars().count() > MAX_FIELD_VALUE_CHARS {
                value.chars().take(MAX_FIELD_VALUE_CHARS).collect()
            } else {
                value.clone()
            };
            (key.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_matching() {
        assert!(host_matches("acxiom.com", "acxiom.com"));
        assert!(host_matches("isapps.acxiom.com", "acxiom.com"));
        assert!(!host_matches("notacxiom.com", "acxiom.com"));
        assert!(!host_matches("acxiom.com.evil.io", "acxiom.com"));
    }

    #[test]
    fn test_rejects_foreign_domain() {
        let allowed = default_allowed_domains();
        assert!(check_url("https://evil.example.com/x", &allowed).is_err());
        assert!(check_url("https://spokeo.com.evil.example.com/", &allowed).is_err());
        assert!(check_url("https://www.spokeo.com/optout", &allowed).is_ok());
    }

    #[test]
    fn test_rejects_non_http_schemes() {
        let allowed = default_allowed_domains();
        for raw in [
            "ftp://acxiom.com",
            "javascript:alert(1)",
            "file:///etc/passwd",
            "not a url",
        ] {
            assert!(
                matches!(check_url(raw, &allowed), Err(AppError::Validation(_))),
                "{raw} should be rejected"
            );
        }
        assert!(check_url("http://acxiom.com/optout", &allowed).is_ok());
    }

    #[test]
    fn test_host_is_case_insensitive() {
        let allowed = default_allowed_domains();
        assert!(check_url("https://WWW.Spokeo.COM/optout", &allowed).is_ok());
    }

    #[test]
    fn test_sanitize_drops_bad_keys_and_truncates() {
        let mut data = BTreeMap::new();
        data.insert("<script>".to_string(), "alert(1)".to_string());
        data.insert("user[email]".to_string(), "jane@gmail.com".to_string());
        data.insert("notes".to_string(), "x".repeat(1500));
        data.insert("short".to_string(), "ok".to_string());

        let clean = sanitize_form_data(&data);
        assert!(!clean.contains_key("<script>"));
        assert_eq!(clean["user[email]"], "jane@gmail.com");
        assert_eq!(clean["notes"].chars().count(), 1000);
        assert_eq!(clean["short"], "ok");
        assert_eq!(clean.len(), 3);
    }

    #[test]
    fn test_truncation_counts_characters() {
        let mut data = BTreeMap::new();
        data.insert("name".to_string(), "é".repeat(1200));
        let clean = sanitize_form_data(&data);
        assert_eq!(clean["name"].chars().count(), 1000);
    }
}
