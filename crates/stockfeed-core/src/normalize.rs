//! The field normalizer — pure, total functions from raw text to typed
//! values.
//!
//! These functions never fail: malformed input maps to a documented
//! default (`None` for "unknown", `0` for "no reviews recorded") rather
//! than an error. Fallback policy per field:
//!
//! | field           | malformed / absent  |
//! |-----------------|---------------------|
//! | text fields     | `None`              |
//! | `price`         | `None` (not `0.0`)  |
//! | `reviews_count` | `0`                 |
//! | `avg_rating`    | `None`              |

use unicode_normalization::UnicodeNormalization;

use crate::record::{NormalizedRecord, RawRecord};

/// Normalize every field of `raw` in one pass.
pub fn normalize(raw: &RawRecord) -> NormalizedRecord {
  NormalizedRecord {
    product_id:    raw.product_id.as_deref().and_then(clean_text),
    name:          raw.name.as_deref().and_then(clean_text),
    category:      raw.category.as_deref().and_then(clean_text),
    company:       raw.company.as_deref().and_then(clean_text),
    description:   raw.description.as_deref().and_then(clean_text),
    price:         raw.price.as_deref().and_then(parse_price),
    url:           raw.url.as_deref().and_then(clean_text),
    reviews_count: raw.reviews_count.as_deref().map_or(0, parse_review_count),
    avg_rating:    raw.avg_rating.as_deref().and_then(parse_rating),
  }
}

// ─── Text ────────────────────────────────────────────────────────────────────

/// NFC-normalize, collapse internal whitespace runs to a single space, and
/// trim. Empty-after-clean yields `None`.
pub fn clean_text(raw: &str) -> Option<String> {
  let composed: String = raw.nfc().collect();
  let collapsed = composed.split_whitespace().collect::<Vec<_>>().join(" ");
  if collapsed.is_empty() { None } else { Some(collapsed) }
}

// ─── Price ───────────────────────────────────────────────────────────────────

/// Prices outside this window are treated as scrape noise.
const PRICE_MIN_EXCLUSIVE: f64 = 0.0;
const PRICE_MAX_EXCLUSIVE: f64 = 1_000_000.0;

/// Parse a raw price string to a value in whole currency units.
///
/// Currency symbols and thousands separators are stripped. A range
/// (`"$10.00 - $20.00"`) yields the arithmetic mean of its bounds. Results
/// are rounded to 2 decimal places. Unparsable text yields `None` — price
/// is "unknown", not "free".
pub fn parse_price(raw: &str) -> Option<f64> {
  let cleaned: String = raw
    .chars()
    .filter(|c| !matches!(c, '$' | '€' | '£' | ','))
    .collect();

  // A dash after symbol-stripping marks a price range; fall through to the
  // single-value path if either bound fails to parse.
  if let Some((low_text, high_text)) = cleaned.split_once('-')
    && let (Some(low), Some(high)) =
      (first_number(low_text), first_number(high_text))
  {
    return in_price_window(round2((low + high) / 2.0));
  }

  first_number(&cleaned).map(round2).and_then(in_price_window)
}

fn in_price_window(price: f64) -> Option<f64> {
  (price > PRICE_MIN_EXCLUSIVE && price < PRICE_MAX_EXCLUSIVE)
    .then_some(price)
}

// ─── Review count ────────────────────────────────────────────────────────────

/// Parse a raw review-count string to an integer.
///
/// Commas are dropped and a `K`/`M` suffix immediately after the number
/// multiplies it (`"1.2K"` → `1200`). Unparsable or absent text yields `0`:
/// no reviews recorded is a meaningful zero, distinct from price's
/// unknown-`None`.
pub fn parse_review_count(raw: &str) -> i64 {
  let cleaned = raw.replace(',', "");
  let Some((number, rest)) = first_number_with_rest(&cleaned) else {
    return 0;
  };
  let multiplier = match rest.chars().next() {
    Some('k' | 'K') => 1_000.0,
    Some('m' | 'M') => 1_000_000.0,
    _ => 1.0,
  };
  (number * multiplier) as i64
}

// ─── Rating ──────────────────────────────────────────────────────────────────

/// Parse a raw rating string to a value clamped into `[0, 5]`.
///
/// The leading numeric token is taken, so `"5.8 out of 5"` clamps to `5.0`
/// rather than being rejected. Unparsable text yields `None`.
pub fn parse_rating(raw: &str) -> Option<f64> {
  first_number(raw).map(|rating| round2(rating.clamp(0.0, 5.0)))
}

// ─── Numeric scanning ────────────────────────────────────────────────────────

/// The first run of digits/dots in `text`, parsed as `f64`.
fn first_number(text: &str) -> Option<f64> {
  first_number_with_rest(text).map(|(number, _)| number)
}

/// Like [`first_number`], but also returns the text following the token so
/// callers can inspect suffixes (`K`/`M` multipliers).
fn first_number_with_rest(text: &str) -> Option<(f64, &str)> {
  let start = text.find(|c: char| c.is_ascii_digit())?;
  let tail = &text[start..];
  let end = tail
    .find(|c: char| !c.is_ascii_digit() && c != '.')
    .unwrap_or(tail.len());
  let token = tail[..end].trim_end_matches('.');
  let number = token.parse().ok()?;
  Some((number, &tail[end..]))
}

fn round2(value: f64) -> f64 { (value * 100.0).round() / 100.0 }

// ─── Tests ───────────────────────────────────────────────────────────────────
