//! Repair model-generated GraphQL before it is sent to Shopify.
//!
//! The generator is prompted to return a bare query, but it regularly wraps the
//! query in a Markdown code fence and writes search filters such as
//! `created_at:>=now-30d`, which the Admin API rejects. This module fixes those
//! two failure modes and nothing else: it does not validate GraphQL syntax.

use std::borrow::Cow;
use std::sync::LazyLock;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use regex::{NoExpand, Regex};

const FENCE: &str = "```";

/// Days covered by the `now-30d` shorthand.
pub const RELATIVE_WINDOW_DAYS: i64 = 30;

static OPENING_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```[a-zA-Z]*\s*").expect("Invalid regex"));

static CLOSING_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*```$").expect("Invalid regex"));

/// `:>= now-30d` with loose whitespace. A balanced quote pair is tried first,
/// then a lone opening quote, then the bare form. A trailing quote is never
/// consumed on its own so the closing quote of an enclosing `query:"..."`
/// argument survives.
const SHORTHAND_SUFFIX: &str =
    r#"\s*:\s*>=\s*(?:"now\s*-\s*30d"|'now\s*-\s*30d'|["']now\s*-\s*30d|now\s*-\s*30d)"#;

static SNAKE_CREATED_AT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("(?i)created_at{SHORTHAND_SUFFIX}")).expect("Invalid regex")
});

static CAMEL_CREATED_AT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("(?i)createdAt{SHORTHAND_SUFFIX}")).expect("Invalid regex")
});

/// Sanitize raw model output using the current time.
///
/// See [`sanitize_at`].
#[must_use]
pub fn sanitize(raw: &str) -> String {
    sanitize_at(raw, Utc::now())
}

/// Sanitize raw model output relative to `now`.
///
/// 1. Trims surrounding whitespace.
/// 2. Removes a Markdown code fence (with optional language tag) when the text
///    both starts and ends with one.
/// 3. Rewrites `created_at:>=now-30d` and `createdAt:>=now-30d` (any case,
///    optional quotes, loose whitespace) to an absolute ISO-8601 timestamp
///    thirty days before `now`.
///
/// Input with neither a fence nor a relative date comes back trimmed and
/// otherwise unchanged. The output is stable under a second pass.
///
/// # Examples
///
/// ```
/// use chatbi_core::sanitize;
///
/// assert_eq!(sanitize("```graphql\n{orders{id}}\n```"), "{orders{id}}");
/// ```
#[must_use]
pub fn sanitize_at(raw: &str, now: DateTime<Utc>) -> String {
    let unfenced = strip_code_fence(raw.trim());
    resolve_relative_dates(unfenced, now).into_owned()
}

/// Remove a surrounding code fence, requiring both the opening and closing
/// delimiter.
#[must_use]
pub fn strip_code_fence(text: &str) -> &str {
    if text.len() < 2 * FENCE.len() || !text.starts_with(FENCE) || !text.ends_with(FENCE) {
        return text;
    }

    let without_open = OPENING_FENCE_RE
        .find(text)
        .map_or(text, |m| &text[m.end()..]);
    let without_close = CLOSING_FENCE_RE
        .find(without_open)
        .map_or(without_open, |m| &without_open[..m.start()]);

    without_close.trim()
}

/// Replace the `now-30d` shorthand on creation-date filters with an absolute
/// timestamp. Both spellings share one timestamp per call.
#[must_use]
pub fn resolve_relative_dates(query: &str, now: DateTime<Utc>) -> Cow<'_, str> {
    if !SNAKE_CREATED_AT_RE.is_match(query) && !CAMEL_CREATED_AT_RE.is_match(query) {
        return Cow::Borrowed(query);
    }

    let since = window_start(now);
    let snake = format!("created_at:>={since}");
    let camel = format!("createdAt:>={since}");

    let replaced = SNAKE_CREATED_AT_RE.replace_all(query, NoExpand(&snake));
    let replaced = CAMEL_CREATED_AT_RE.replace_all(&replaced, NoExpand(&camel));
    Cow::Owned(replaced.into_owned())
}

/// Start of the relative window as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
fn window_start(now: DateTime<Utc>) -> String {
    (now - TimeDelta::days(RELATIVE_WINDOW_DAYS)).to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 15, 12, 30, 0)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn test_strips_fence_with_language_tag() {
        assert_eq!(sanitize("```graphql\n{orders{id}}\n```"), "{orders{id}}");
    }

    #[test]
    fn test_strips_fence_without_language_tag() {
        assert_eq!(sanitize("  ```\n{ shop { name } }\n```  "), "{ shop { name } }");
    }

    #[test]
    fn test_lone_opening_fence_is_kept() {
        let raw = "```graphql\n{orders{id}}";
        assert_eq!(sanitize(raw), raw);
    }

    #[test]
    fn test_plain_query_is_only_trimmed() {
        assert_eq!(sanitize("\n  { products(first: 5) { nodes { title } } }\n"), "{ products(first: 5) { nodes { title } } }");
    }

    #[test]
    fn test_rewrites_snake_case_shorthand() {
        let out = sanitize_at(r#"{orders(query:"created_at:>=now-30d"){id}}"#, fixed_now());
        assert_eq!(out, r#"{orders(query:"created_at:>=2026-09-15T12:30:00.000Z"){id}}"#);
    }

    #[test]
    fn test_rewrites_loose_whitespace_quotes_and_case() {
        let out = sanitize_at(
            r#"{orders(query: "CREATED_AT : >= 'now - 30d'") {id}}"#,
            fixed_now(),
        );
        assert_eq!(out, r#"{orders(query: "created_at:>=2026-09-15T12:30:00.000Z") {id}}"#);
    }

    #[test]
    fn test_rewrites_double_quoted_shorthand() {
        let out = sanitize_at(r#"created_at:>="now-30d""#, fixed_now());
        assert_eq!(out, "created_at:>=2026-09-15T12:30:00.000Z");
        assert_eq!(sanitize_at(&out, fixed_now()), out);
    }

    #[test]
    fn test_double_quoted_shorthand_inside_query_argument() {
        let out = sanitize_at(r#"{orders(query:"created_at:>="now-30d""){id}}"#, fixed_now());
        assert_eq!(out, r#"{orders(query:"created_at:>=2026-09-15T12:30:00.000Z"){id}}"#);
    }

    #[test]
    fn test_rewrites_lone_opening_quote() {
        assert_eq!(
            sanitize_at(r#"created_at:>="now-30d"#, fixed_now()),
            "created_at:>=2026-09-15T12:30:00.000Z"
        );
        assert_eq!(
            sanitize_at("createdAt:>='now-30d", fixed_now()),
            "createdAt:>=2026-09-15T12:30:00.000Z"
        );
    }

    #[test]
    fn test_trailing_quote_belongs_to_enclosing_argument() {
        let out = sanitize_at(r#"created_at:>=now-30d""#, fixed_now());
        assert_eq!(out, r#"created_at:>=2026-09-15T12:30:00.000Z""#);
    }

    #[test]
    fn test_rewrites_camel_case_shorthand() {
        let out = sanitize_at("createdAt:>=now-30d", fixed_now());
        assert_eq!(out, "createdAt:>=2026-09-15T12:30:00.000Z");
    }

    #[test]
    fn test_both_spellings_share_one_timestamp() {
        let out = sanitize_at(
            r#"{ a: orders(query:"created_at:>=now-30d") {id} b: customers(query:"createdAt:>=now-30d") {id} }"#,
            fixed_now(),
        );
        assert_eq!(out.matches("2026-09-15T12:30:00.000Z").count(), 2);
        assert!(!out.contains("now"));
    }

    #[test]
    fn test_other_windows_are_left_alone() {
        let raw = r#"{orders(query:"created_at:>=now-7d"){id}}"#;
        assert_eq!(sanitize_at(raw, fixed_now()), raw);
    }

    #[test]
    fn test_fenced_query_with_shorthand() {
        let out = sanitize_at(
            "```graphql\n{ orders(first: 50, query: \"created_at:>=now-30d\") { edges { node { id } } } }\n```",
            fixed_now(),
        );
        assert_eq!(
            out,
            "{ orders(first: 50, query: \"created_at:>=2026-09-15T12:30:00.000Z\") { edges { node { id } } } }"
        );
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let once = sanitize(r#"{orders(query:"created_at:>=now-30d"){id}}"#);
        assert!(!once.contains("now-30d"));
        assert_eq!(sanitize(&once), once);

        let fenced_once = sanitize("```graphql\n{orders{id}}\n```");
        assert_eq!(sanitize(&fenced_once), fenced_once);
    }

    #[test]
    fn test_resolve_relative_dates_borrows_when_unchanged() {
        assert!(matches!(
            resolve_relative_dates("{ shop { name } }", fixed_now()),
            Cow::Borrowed(_)
        ));
    }
}
