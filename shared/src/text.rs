//! Text shaping for the dispenser panel.
//!
//! Server error payloads are arbitrary: long URLs, JSON dumps, stack traces.
//! Everything shown on the panel goes through [`normalize`] and [`clamp`] so it
//! fits a fixed number of fixed-width lines no matter what the server sent.

pub const DEFAULT_MAX_TOKEN_LEN: usize = 46;
pub const MIN_TOKEN_LEN: usize = 12;
pub const MIN_CHARS_PER_LINE: usize = 10;
pub const MIN_LINES: usize = 2;
pub const ELLIPSIS: char = '…';
pub const UNKNOWN_ERROR: &str = "Unknown error.";

/// Unifies newlines and tabs, trims, keeps at most one blank line between
/// paragraphs and hard-breaks tokens longer than [`DEFAULT_MAX_TOKEN_LEN`].
#[must_use]
pub fn normalize(text: &str) -> String {
    normalize_with_token_len(text, DEFAULT_MAX_TOKEN_LEN)
}

#[must_use]
pub fn normalize_with_token_len(text: &str, max_token_len: usize) -> String {
    let unified = text.replace("\r\n", "\n").replace('\t', " ");
    let trimmed_lines: Vec<&str> = unified.trim().split('\n').map(str::trim_end).collect();
    let compact = collapse_blank_runs(&trimmed_lines.join("\n"));
    hard_break_long_tokens(&compact, max_token_len)
}

/// Replaces every run of three or more newlines with exactly two.
fn collapse_blank_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newlines = 0usize;

    for ch in text.chars() {
        if ch == '\n' {
            newlines += 1;
            continue;
        }
        out.extend(std::iter::repeat('\n').take(newlines.min(2)));
        newlines = 0;
        out.push(ch);
    }
    out.extend(std::iter::repeat('\n').take(newlines.min(2)));

    out
}

/// Splits every whitespace-delimited token longer than `max_token_len` chars
/// into chunks joined by `\n`. Whitespace between tokens is preserved as-is.
#[must_use]
pub fn hard_break_long_tokens(text: &str, max_token_len: usize) -> String {
    let max_len = max_token_len.max(MIN_TOKEN_LEN);
    let mut out = String::with_capacity(text.len() + text.len() / max_len);
    let mut token: Vec<char> = Vec::new();

    for ch in text.chars() {
        if ch.is_whitespace() {
            flush_token(&mut out, &mut token, max_len);
            out.push(ch);
        } else {
            token.push(ch);
        }
    }
    flush_token(&mut out, &mut token, max_len);

    out
}

fn flush_token(out: &mut String, token: &mut Vec<char>, max_len: usize) {
    for (i, chunk) in token.chunks(max_len).enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.extend(chunk);
    }
    token.clear();
}

/// Greedy word-wrap into at most `max_lines` lines of at most
/// `max_chars_per_line` chars each.
///
/// Explicit newlines start new paragraphs; blank paragraphs are dropped.
/// When anything is left over after the last line, that line ends in
/// [`ELLIPSIS`]. Returns [`UNKNOWN_ERROR`] if nothing printable is left.
#[must_use]
pub fn clamp(text: &str, max_chars_per_line: usize, max_lines: usize) -> String {
    let max_chars = max_chars_per_line.max(MIN_CHARS_PER_LINE);
    let max_lines = max_lines.max(MIN_LINES);

    let unified = text.replace("\r\n", "\n").replace('\t', " ");
    let (mut lines, truncated) = wrap_paragraphs(unified.trim(), max_chars, max_lines);
    if lines.is_empty() {
        return UNKNOWN_ERROR.to_string();
    }

    if truncated {
        if let Some(last) = lines.last_mut() {
            *last = with_ellipsis(last, max_chars);
        }
    }
    lines.join("\n")
}

/// Wraps up to `max_lines` lines and reports whether any text was left over.
///
/// Wrapping runs one line past the limit: a line beyond `max_lines` exists
/// only if something did not fit.
fn wrap_paragraphs(text: &str, max_chars: usize, max_lines: usize) -> (Vec<String>, bool) {
    let limit = max_lines + 1;
    let mut lines: Vec<String> = Vec::new();

    let paragraphs = text.split('\n').map(str::trim).filter(|p| !p.is_empty());
    'paragraphs: for paragraph in paragraphs {
        let mut line = String::new();
        let mut line_len = 0usize;

        for word in paragraph.split_whitespace() {
            let word_len = word.chars().count();

            if word_len > max_chars {
                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                    if lines.len() >= limit {
                        break 'paragraphs;
                    }
                }

                let chars: Vec<char> = word.chars().collect();
                let mut rest = chars.as_slice();
                while rest.len() > max_chars {
                    let (head, tail) = rest.split_at(max_chars);
                    lines.push(head.iter().collect());
                    rest = tail;
                    if lines.len() >= limit {
                        break 'paragraphs;
                    }
                }
                line = rest.iter().collect();
                line_len = rest.len();
            } else if line.is_empty() {
                line.push_str(word);
                line_len = word_len;
            } else if line_len + 1 + word_len <= max_chars {
                line.push(' ');
                line.push_str(word);
                line_len += 1 + word_len;
            } else {
                lines.push(std::mem::replace(&mut line, word.to_string()));
                line_len = word_len;
            }

            if lines.len() >= limit {
                break 'paragraphs;
            }
        }

        if !line.is_empty() {
            lines.push(line);
        }
        if lines.len() >= limit {
            break;
        }
    }

    let truncated = lines.len() > max_lines;
    lines.truncate(max_lines);
    (lines, truncated)
}

fn with_ellipsis(line: &str, max_chars: usize) -> String {
    let base: String = if line.chars().count() > max_chars - 1 {
        line.chars().take(max_chars - 1).collect::<String>().trim_end().to_string()
    } else {
        line.to_string()
    };
    let base = base.trim_end_matches(['.', ',', ';', ':']);
    format!("{base}{ELLIPSIS}")
}

/// Splits text at its first blank line into a title and an optional body.
#[must_use]
pub fn split_title_and_body(text: &str) -> (String, Option<String>) {
    let normalized = normalize(text);
    let paragraphs: Vec<&str> = normalized
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    match paragraphs.split_first() {
        None => ("Error".to_string(), None),
        Some((title, [])) => ((*title).to_string(), None),
        Some((title, rest)) => ((*title).to_string(), Some(rest.join("\n\n"))),
    }
}
