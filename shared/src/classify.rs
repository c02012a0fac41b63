//! Maps a rewards-service body onto a closed set of verdicts.
//!
//! The service mixes structured `{ok, code, error, data}` envelopes with raw
//! text, so classification is substring-driven. Failure envelopes go through
//! [`FAILURE_RULES`] in order; the first match wins.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Success { image: String },
    OutOfStock,
    AlreadyClaimed,
    /// A challenge must be fetched before the claim can go through.
    CaptchaRequired,
    /// Campaign is switched off server-side; the caller decides why using its
    /// own date window.
    InactiveCampaign,
    /// Raw text for the error presenter.
    Error(String),
}

#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default)]
    ok: Option<Value>,
    #[serde(default)]
    code: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    data: Option<Value>,
}

/// A failure envelope reduced to its lowercase `code`/`error` text.
pub struct Failure<'a> {
    pub code: Option<&'a str>,
    pub error: Option<&'a str>,
    code_lower: String,
    error_lower: String,
}

impl Failure<'_> {
    fn code_has(&self, needle: &str) -> bool {
        self.code_lower.contains(needle)
    }

    fn error_has(&self, needle: &str) -> bool {
        self.error_lower.contains(needle)
    }
}

pub struct FailureRule {
    pub name: &'static str,
    pub matches: fn(&Failure<'_>) -> bool,
    pub verdict: fn() -> Verdict,
}

pub const INACTIVE_CAMPAIGN_CODES: [&str; 2] = ["campaign_key_uninitiated", "campaign_disabled"];
const INACTIVE_CODE_FRAGMENTS: [&str; 3] = ["uninitiated", "disabled", "finished"];

pub static FAILURE_RULES: &[FailureRule] = &[
    FailureRule {
        name: "captcha",
        matches: |f| f.code_has("captcha") || f.error_has("captcha"),
        verdict: || Verdict::CaptchaRequired,
    },
    FailureRule {
        name: "out_of_stock",
        matches: |f| f.code_has("out") && f.code_has("stock"),
        verdict: || Verdict::OutOfStock,
    },
    FailureRule {
        name: "already_claimed",
        matches: |f| f.code_has("already") && f.code_has("claim"),
        verdict: || Verdict::AlreadyClaimed,
    },
    FailureRule {
        name: "inactive_campaign",
        matches: |f| f.code.is_some_and(is_inactive_campaign_code),
        verdict: || Verdict::InactiveCampaign,
    },
];

#[must_use]
pub fn is_inactive_campaign_code(code: &str) -> bool {
    let lower = code.trim().to_lowercase();
    if lower.is_empty() {
        return false;
    }
    INACTIVE_CAMPAIGN_CODES.contains(&lower.as_str())
        || INACTIVE_CODE_FRAGMENTS.iter().any(|f| lower.contains(f))
}

/// Classifies a response body.
#[must_use]
pub fn classify(body: &str) -> Verdict {
    if body.to_lowercase().contains("captcha") {
        return Verdict::CaptchaRequired;
    }

    let Ok(envelope) = serde_json::from_str::<Envelope>(body) else {
        return Verdict::Error(body.to_string());
    };

    let ok = envelope.ok.as_ref().and_then(Value::as_bool);
    let error = envelope.error.as_ref().and_then(present_text);

    match ok {
        Some(false) => classify_failure(envelope.code.as_ref().and_then(present_text), error),
        Some(true) if error.is_none() => classify_success(envelope.data.as_ref()),
        _ => Verdict::Error(body.to_string()),
    }
}

fn classify_failure(code: Option<String>, error: Option<String>) -> Verdict {
    let failure = Failure {
        code_lower: code.as_deref().unwrap_or_default().to_lowercase(),
        error_lower: error.as_deref().unwrap_or_default().to_lowercase(),
        code: code.as_deref(),
        error: error.as_deref(),
    };

    if let Some(rule) = FAILURE_RULES.iter().find(|r| (r.matches)(&failure)) {
        tracing::debug!(rule = rule.name, "failure envelope matched");
        return (rule.verdict)();
    }

    let message = error.or(code).unwrap_or_else(|| "Invalid response".to_string());
    Verdict::Error(message)
}

/// Only the first element of an array `data` can carry a reward. Any other
/// shape has no first element and reads as out of stock.
fn classify_success(data: Option<&Value>) -> Verdict {
    match data {
        Some(Value::Array(items)) => match items.first() {
            None => Verdict::OutOfStock,
            Some(first) if is_falsy(first) => Verdict::OutOfStock,
            Some(first) => Verdict::Success {
                image: first
                    .get("image")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            },
        },
        _ => Verdict::OutOfStock,
    }
}

/// `null`, `""`, `false` and `0` carry no message.
fn present_text(value: &Value) -> Option<String> {
    if is_falsy(value) {
        return None;
    }
    match value {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Array(_) | Value::Object(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod failure_tests {
        use super::*;

        #[test]
        fn test_inactive_codes() {
            assert_eq!(
                classify(r#"{"ok":false,"code":"campaign_key_uninitiated"}"#),
                Verdict::InactiveCampaign
            );
            assert_eq!(
                classify(r#"{"ok":false,"code":"campaign_disabled"}"#),
                Verdict::InactiveCampaign
            );
            assert_eq!(
                classify(r#"{"ok":false,"code":"campaign_finished","error":"done"}"#),
                Verdict::InactiveCampaign
            );
        }

        #[test]
        fn test_stock_and_claimed_codes() {
            assert_eq!(classify(r#"{"ok":false,"code":"out_of_stock"}"#), Verdict::OutOfStock);
            assert_eq!(
                classify(r#"{"ok":false,"code":"reward_already_claimed"}"#),
                Verdict::AlreadyClaimed
            );
        }

        #[test]
        fn test_rule_order() {
            // "stock" and "claim" both appear; out-of-stock comes first.
            assert_eq!(
                classify(r#"{"ok":false,"code":"already_claimed_out_of_stock"}"#),
                Verdict::OutOfStock
            );
        }

        #[test]
        fn test_only_code_drives_stock_rule() {
            assert_eq!(
                classify(r#"{"ok":false,"code":"nope","error":"out of stock"}"#),
                Verdict::Error("out of stock".into())
            );
        }

        #[test]
        fn test_fallback_messages() {
            assert_eq!(
                classify(r#"{"ok":false,"code":"weird","error":"Something broke"}"#),
                Verdict::Error("Something broke".into())
            );
            assert_eq!(
                classify(r#"{"ok":false,"code":"weird"}"#),
                Verdict::Error("weird".into())
            );
            assert_eq!(
                classify(r#"{"ok":false,"error":""}"#),
                Verdict::Error("Invalid response".into())
            );
        }

        #[test]
        fn test_inactive_helper() {
            assert!(is_inactive_campaign_code("CAMPAIGN_DISABLED"));
            assert!(is_inactive_campaign_code("season_finished"));
            assert!(!is_inactive_campaign_code("active"));
            assert!(!is_inactive_campaign_code(""));
        }
    }

    mod success_tests {
        use super::*;

        #[test]
        fn test_success_with_image() {
            assert_eq!(
                classify(r#"{"ok":true,"data":[{"image":"x"}]}"#),
                Verdict::Success { image: "x".into() }
            );
        }

        #[test]
        fn test_success_without_image() {
            assert_eq!(
                classify(r#"{"ok":true,"data":[{"id":1}]}"#),
                Verdict::Success { image: String::new() }
            );
        }

        #[test]
        fn test_empty_data_is_out_of_stock() {
            assert_eq!(classify(r#"{"ok":true,"data":[]}"#), Verdict::OutOfStock);
            assert_eq!(classify(r#"{"ok":true}"#), Verdict::OutOfStock);
            assert_eq!(classify(r#"{"ok":true,"data":null}"#), Verdict::OutOfStock);
        }

        #[test]
        fn test_ok_with_error_is_unrecognized() {
            let body = r#"{"ok":true,"data":[{"image":"x"}],"error":"hm"}"#;
            assert_eq!(classify(body), Verdict::Error(body.into()));
        }
    }

    mod shape_tests {
        use super::*;

        #[test]
        fn test_captcha_substring_wins_before_parsing() {
            assert_eq!(classify("please solve the CAPTCHA"), Verdict::CaptchaRequired);
            assert_eq!(
                classify(r#"{"ok":true,"data":[{"image":"captcha.png"}]}"#),
                Verdict::CaptchaRequired
            );
        }

        #[test]
        fn test_unparseable_body() {
            assert_eq!(
                classify("<html>502 Bad Gateway</html>"),
                Verdict::Error("<html>502 Bad Gateway</html>".into())
            );
        }

        #[test]
        fn test_unknown_shapes() {
            for body in [r#"{"data":[]}"#, r#"{"ok":"yes"}"#, "[1,2]"] {
                assert_eq!(classify(body), Verdict::Error(body.into()), "{body}");
            }
        }

        #[test]
        fn test_non_array_data_is_out_of_stock() {
            for body in [
                r#"{"ok":true,"data":{"image":"x"}}"#,
                r#"{"ok":true,"data":"x"}"#,
                r#"{"ok":true,"data":7}"#,
                r#"{"ok":true,"data":null}"#,
            ] {
                assert_eq!(classify(body), Verdict::OutOfStock, "{body}");
            }
        }
    }
}
