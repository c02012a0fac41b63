//! Turns raw failure text into something the panel can show.
//!
//! Raw server text never reaches the player directly. It either matches a
//! known case with fixed copy, reads as a short human message worth showing,
//! or is treated as opaque and collapsed to a three-line preview with the full
//! text behind "see details".

use serde::{Deserialize, Serialize};

use crate::host;
use crate::model::PrettyError;
use crate::text::{self, ELLIPSIS};

pub const LOCAL_PREVIEW_HINT: &str = "Rewards server rejected the request (400)\n\n\
If the campaign has \"Connected to Decentraland\" and/or \"Position inside Decentraland\" flags, \
it wont be claimable from Local Preview.\n\n\
Adjust the campaign flags to try testing after publishing.";

pub const OUT_OF_STOCK_COPY: &str =
    "<b>Out of stock</b>\n\n<i>Sorry, this reward is no longer available.</i>";
pub const ALREADY_CLAIMED_COPY: &str =
    "<b>Already claimed</b>\n\n<i>Looks like you already claimed this reward.</i>";
const USER_FACING_TITLE: &str = "<b>There is an error:</b>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineGeometry {
    pub chars_per_line: usize,
    pub max_lines: usize,
}

impl LineGeometry {
    pub const fn new(chars_per_line: usize, max_lines: usize) -> Self {
        Self {
            chars_per_line,
            max_lines,
        }
    }

    fn clamp(self, text: &str) -> String {
        text::clamp(text, self.chars_per_line, self.max_lines)
    }
}

/// Heuristics tuned to the current rewards service error format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenterConfig {
    /// Raw text longer than this (in chars) is treated as opaque.
    pub opaque_length_threshold: usize,
    /// Payload-dump markers; text from the first one on is moved to details.
    pub cut_markers: Vec<String>,
    /// Hosts that only appear in low-level request dumps.
    pub backend_host_markers: Vec<String>,
    /// Request field names that only appear in low-level dumps.
    pub internal_tokens: Vec<String>,
    pub preview: LineGeometry,
    pub details: LineGeometry,
    pub user_facing: LineGeometry,
}

impl Default for PresenterConfig {
    fn default() -> Self {
        let strings = |items: &[&str]| -> Vec<String> { items.iter().map(|s| (*s).to_string()).collect() };
        Self {
            opaque_length_threshold: 140,
            cut_markers: strings(&["RequestEnvelope:", "WebRequestType:", "CommonArguments:", "Headers:"]),
            backend_host_markers: strings(&["rewards.decentraland"]),
            internal_tokens: strings(&[
                "genericpostrequest",
                "requestenvelope",
                "x-identity",
                "campaign_key",
                "captcha_id",
                "beneficiary",
            ]),
            preview: LineGeometry::new(text::DEFAULT_MAX_TOKEN_LEN, 3),
            details: LineGeometry::new(56, 18),
            user_facing: LineGeometry::new(50, 12),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ErrorPresenter {
    config: PresenterConfig,
}

impl ErrorPresenter {
    pub fn new(config: PresenterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PresenterConfig {
        &self.config
    }

    /// `override_heuristics` skips straight to the generic preview.
    pub fn present(&self, raw: &str, override_heuristics: bool) -> PrettyError {
        if host::contains_local_catalyst_not_found(raw) {
            return self.truncate_for_details(LOCAL_PREVIEW_HINT);
        }
        if override_heuristics {
            return self.truncate_for_details(raw);
        }

        let core = strip_log_prefix(self.cut_payload_dump(raw).unwrap_or(raw));
        let lower = core.to_lowercase();

        if lower.contains("out of stock") {
            return PrettyError::with_details(OUT_OF_STOCK_COPY, self.config.details.clamp(core));
        }
        if lower.contains("already") && lower.contains("claim") {
            return PrettyError::with_details(ALREADY_CLAIMED_COPY, self.config.details.clamp(core));
        }

        if self.looks_opaque(raw, core) {
            return self.truncate_for_details(raw);
        }

        let wrapped = self.config.user_facing.clamp(core).replacen('_', " ", 1);
        PrettyError::plain(format!("{USER_FACING_TITLE}\n\n<i>{wrapped}</i>"))
    }

    /// Three-line preview; the full normalized text goes to details only if
    /// the preview lost something.
    pub fn truncate_for_details(&self, text: &str) -> PrettyError {
        let full = text::normalize(text);
        let preview = self.config.preview.clamp(&full);
        if preview.contains(ELLIPSIS) {
            PrettyError::with_details(preview, full)
        } else {
            PrettyError::plain(preview)
        }
    }

    /// Text before the first payload-dump marker, if any marker is present.
    fn cut_payload_dump<'a>(&self, raw: &'a str) -> Option<&'a str> {
        self.config
            .cut_markers
            .iter()
            .filter(|m| !m.is_empty())
            .find_map(|m| raw.find(m.as_str()))
            .map(|idx| raw[..idx].trim())
    }

    fn looks_opaque(&self, raw: &str, core: &str) -> bool {
        let lower = raw.to_lowercase();
        let core = core.trim_start();

        raw.chars().count() > self.config.opaque_length_threshold
            || self
                .config
                .backend_host_markers
                .iter()
                .any(|h| contains_backend_url(&lower, &h.to_lowercase()))
            || contains_exception_code(&lower)
            || self
                .config
                .internal_tokens
                .iter()
                .any(|t| lower.contains(&t.to_lowercase()))
            || core.starts_with('{')
            || core.starts_with('[')
    }
}

/// `http://<host>` or `https://<host>`.
fn contains_backend_url(lower: &str, host: &str) -> bool {
    !host.is_empty()
        && (lower.contains(&format!("http://{host}")) || lower.contains(&format!("https://{host}")))
}

/// Matches `exception\s*\(code\s*\d+\)`.
fn contains_exception_code(lower: &str) -> bool {
    lower.match_indices("exception").any(|(idx, word)| {
        let rest = lower[idx + word.len()..].trim_start();
        let Some(rest) = rest.strip_prefix('(') else {
            return false;
        };
        let Some(rest) = rest.strip_prefix("code") else {
            return false;
        };
        let rest = rest.trim_start();
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        digits > 0 && rest[digits..].starts_with(')')
    })
}

/// Drops one leading log prefix: an upper-case `[LEVEL]` tag and everything
/// up to the next `]` on the same line.
fn strip_log_prefix(core: &str) -> &str {
    let core = core.trim();
    let Some(after_open) = core.strip_prefix('[') else {
        return core;
    };
    let level_len = after_open.bytes().take_while(u8::is_ascii_uppercase).count();
    if level_len == 0 || !after_open[level_len..].starts_with(']') {
        return core;
    }

    let rest = &after_open[level_len + 1..];
    let line_end = rest.find('\n').unwrap_or(rest.len());
    match rest[..line_end].find(']') {
        Some(close) => rest[close + 1..].trim(),
        None => core,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn present(raw: &str) -> PrettyError {
        ErrorPresenter::default().present(raw, false)
    }

    mod local_preview_tests {
        use super::*;

        #[test]
        fn test_local_catalyst_gets_hint() {
            let out = present(r#"Catalyst "http://127.0.0.1:8000" not found"#);
            assert!(out.display.starts_with("Rewards server rejected the request (400)"));
            assert!(out.details.is_some());
        }

        #[test]
        fn test_public_catalyst_is_user_facing() {
            let out = present(r#"Catalyst "https://peer.example.org" not found"#);
            assert!(out.display.starts_with(USER_FACING_TITLE));
            assert!(out.details.is_none());
        }
    }

    mod truncation_tests {
        use super::*;

        #[test]
        fn test_short_override_has_no_details() {
            let out = ErrorPresenter::default().present("Error fetching reward server.\nInvalid response.", true);
            assert_eq!(out.display, "Error fetching reward server.\nInvalid response.");
            assert_eq!(out.details, None);
        }

        #[test]
        fn test_long_override_keeps_full_text() {
            let raw = "word ".repeat(60);
            let out = ErrorPresenter::default().present(&raw, true);
            let lines: Vec<&str> = out.display.split('\n').collect();
            assert!(lines.len() <= 3);
            assert!(lines.iter().all(|l| l.chars().count() <= 46));
            assert!(out.display.ends_with(ELLIPSIS));
            assert_eq!(out.details.as_deref(), Some(text::normalize(&raw).as_str()));
        }
    }

    mod known_case_tests {
        use super::*;

        #[test]
        fn test_out_of_stock() {
            let out = present("Reward is out of stock");
            assert_eq!(out.display, OUT_OF_STOCK_COPY);
            assert_eq!(out.details.as_deref(), Some("Reward is out of stock"));
        }

        #[test]
        fn test_already_claimed_after_cut() {
            let raw = "[ERROR] [10:00:00] You already claimed it RequestEnvelope: {\"campaign_key\":\"k\"}";
            let out = present(raw);
            assert_eq!(out.display, ALREADY_CLAIMED_COPY);
            assert_eq!(out.details.as_deref(), Some("You already claimed it"));
        }
    }

    mod opaque_tests {
        use super::*;

        #[test]
        fn test_long_text_is_opaque() {
            let raw = format!("Something went wrong {}", "x ".repeat(80));
            let out = present(&raw);
            assert!(!out.display.starts_with(USER_FACING_TITLE));
            assert!(out.details.is_some());
        }

        #[test]
        fn test_backend_url_is_opaque() {
            let out = present("POST https://rewards.decentraland.org/api failed");
            assert_eq!(out.display, "POST https://rewards.decentraland.org/api\nfailed");
            assert_eq!(out.details, None);
        }

        #[test]
        fn test_exception_code_is_opaque() {
            assert!(contains_exception_code("unityexception (code 400)"));
            assert!(contains_exception_code("exception(code12)"));
            assert!(!contains_exception_code("exception (code )"));
            assert!(!contains_exception_code("exception code 4"));
            assert!(!present("Exception (code 500)").display.starts_with(USER_FACING_TITLE));
        }

        #[test]
        fn test_internal_tokens_and_json_are_opaque() {
            assert!(!present("missing beneficiary").display.starts_with(USER_FACING_TITLE));
            assert_eq!(present(r#"{"weird":1}"#).display, r#"{"weird":1}"#);
            assert_eq!(present("[1, 2]").display, "[1, 2]");
        }
    }

    mod user_facing_tests {
        use super::*;

        #[test]
        fn test_wraps_and_replaces_first_underscore() {
            let out = present("invalid_campaign_state");
            assert_eq!(
                out.display,
                "<b>There is an error:</b>\n\n<i>invalid campaign_state</i>"
            );
            assert_eq!(out.details, None);
        }

        #[test]
        fn test_log_prefix_stripped() {
            let out = present("[WARN] [12:00] Try again later");
            assert_eq!(out.display, "<b>There is an error:</b>\n\n<i>Try again later</i>");
        }
    }

    mod helper_tests {
        use super::*;

        #[test]
        fn test_strip_log_prefix() {
            assert_eq!(strip_log_prefix("[ERROR] [t] [Error] boom"), "[Error] boom");
            assert_eq!(strip_log_prefix("[ERROR] boom"), "[ERROR] boom");
            assert_eq!(strip_log_prefix("[error] x] boom"), "[error] x] boom");
            assert_eq!(strip_log_prefix("plain"), "plain");
        }

        #[test]
        fn test_cut_marker_order() {
            let presenter = ErrorPresenter::default();
            assert_eq!(
                presenter.cut_payload_dump("a Headers: h RequestEnvelope: r"),
                Some("a Headers: h")
            );
            assert_eq!(presenter.cut_payload_dump("nothing"), None);
        }
    }
}
