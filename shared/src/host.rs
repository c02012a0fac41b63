//! Loopback / private-network host detection.
//!
//! Local Preview serves the scene from the creator's own machine, so the
//! catalyst the rewards service sees is `localhost` or a LAN address. Those
//! requests fail in ways that need a dedicated hint instead of the raw error.

use std::net::Ipv4Addr;

const CATALYST_NOT_FOUND_WINDOW: usize = 80;

/// Pulls the bare hostname out of anything URL-shaped: strips the scheme,
/// leading slashes, path/query/fragment, credentials and port.
#[must_use]
pub fn extract_hostname(url_like: &str) -> &str {
    let mut s = url_like.trim();

    if let Some(idx) = s.find("://") {
        let scheme = &s[..idx];
        let is_scheme = scheme
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'));
        if is_scheme {
            s = &s[idx + 3..];
        }
    }

    s = s.strip_prefix("//").unwrap_or(s);
    s = s.split(['/', '?', '#']).next().unwrap_or_default();

    if let Some(at) = s.rfind('@') {
        s = &s[at + 1..];
    }

    s.split(':').next().unwrap_or_default()
}

/// True for `localhost`, `0.0.0.0`, `127.*` and the RFC 1918 ranges
/// (10/8, 172.16/12, 192.168/16). Anything malformed is not local.
#[must_use]
pub fn is_local_hostname(host: &str) -> bool {
    let host = host.trim().to_ascii_lowercase();
    if host.is_empty() {
        return false;
    }

    if host == "localhost" || host.starts_with("127.") {
        return true;
    }

    host.parse::<Ipv4Addr>()
        .is_ok_and(|ip| ip.is_unspecified() || ip.is_private())
}

/// Whether a URL (or bare host) points at the local machine or LAN.
#[must_use]
pub fn is_local_url(url_like: &str) -> bool {
    is_local_hostname(extract_hostname(url_like))
}

/// Recognizes the rewards service rejecting a local catalyst, e.g.
/// `Catalyst "http://127.0.0.1:8000" not found`.
///
/// Only the first `catalyst "<url>"` occurrence followed by `not found` within
/// the same line is considered, and only a local host counts.
#[must_use]
pub fn contains_local_catalyst_not_found(input: &str) -> bool {
    let lower = input.to_ascii_lowercase();
    if !lower.contains("catalyst") || !lower.contains("not found") {
        return false;
    }

    let mut from = 0;
    while let Some(pos) = lower[from..].find("catalyst") {
        let start = from + pos;
        from = start + "catalyst".len();

        if let Some(url) = quoted_catalyst_url(input, &lower, from) {
            return is_local_url(url);
        }
    }

    false
}

/// Matches `\s+"([^"]+)".{0,80}?not found` starting at `after_keyword`.
fn quoted_catalyst_url<'a>(input: &'a str, lower: &str, after_keyword: usize) -> Option<&'a str> {
    let rest = &lower[after_keyword..];
    let trimmed = rest.trim_start();
    if trimmed.len() == rest.len() || !trimmed.starts_with('"') {
        return None;
    }

    let url_start = after_keyword + (rest.len() - trimmed.len()) + 1;
    let url_len = lower[url_start..].find('"')?;
    if url_len == 0 {
        return None;
    }
    let url_end = url_start + url_len;

    let tail = &lower[url_end + 1..];
    let gap = tail.find("not found")?;
    let between = &tail[..gap];
    if between.contains('\n') || between.chars().count() > CATALYST_NOT_FOUND_WINDOW {
        return None;
    }

    Some(&input[url_start..url_end])
}
