//! Platform text services: regex matching and splitting, number and date
//! formatting.
//!
//! Nothing here fails.  Each operation returns an [`Outcome`]: the best
//! result it could produce plus the [`Warnings`] raised on the way (a bad
//! pattern, an unparsable locale, an unknown rounding mode).
//!
//! Renders never call into these services.  Callers reach them through
//! [`Engine::text`](crate::engine::Engine::text) and bind the results into
//! the environment before rendering.  Compiled regexes are cached per
//! [`TextServices`] instance behind a [`parking_lot::RwLock`], so every
//! clone of the engine's handle shares one cache.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bitflags::bitflags;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use regex::Regex;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Warnings: u8 {
        const MALFORMED_PATTERN  = 0b001;
        const MALFORMED_LOCALE   = 0b010;
        const MALFORMED_ROUNDING = 0b100;
    }
}

/// A value plus the non-fatal warnings produced computing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<T> {
    pub value: T,
    pub warnings: Warnings,
}

impl<T> Outcome<T> {
    fn ok(value: T) -> Self {
        Self {
            value,
            warnings: Warnings::empty(),
        }
    }

    fn warn(value: T, warnings: Warnings) -> Self {
        Self { value, warnings }
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

// ── Rounding ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rounding {
    Up,
    Down,
    Ceiling,
    Floor,
    HalfUp,
    HalfDown,
    #[default]
    HalfEven,
}

impl FromStr for Rounding {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "UP" => Ok(Rounding::Up),
            "DOWN" => Ok(Rounding::Down),
            "CEILING" => Ok(Rounding::Ceiling),
            "FLOOR" => Ok(Rounding::Floor),
            "HALF_UP" => Ok(Rounding::HalfUp),
            "HALF_DOWN" => Ok(Rounding::HalfDown),
            "HALF_EVEN" => Ok(Rounding::HalfEven),
            _ => Err(()),
        }
    }
}

impl Rounding {
    /// Round `x` to an integral value.
    pub fn apply(self, x: f64) -> f64 {
        let tie = (x - x.trunc()).abs() == 0.5;
        match self {
            Rounding::Up => x.signum() * x.abs().ceil(),
            Rounding::Down => x.trunc(),
            Rounding::Ceiling => x.ceil(),
            Rounding::Floor => x.floor(),
            Rounding::HalfUp => x.round(),
            Rounding::HalfDown if tie => x.trunc(),
            Rounding::HalfDown => x.round(),
            Rounding::HalfEven if tie => {
                let f = x.floor();
                if f % 2.0 == 0.0 {
                    f
                } else {
                    f + 1.0
                }
            }
            Rounding::HalfEven => x.round(),
        }
    }
}

// ── Locale ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NumberSymbols {
    group: &'static str,
    decimal: char,
}

const EN: NumberSymbols = NumberSymbols {
    group: ",",
    decimal: '.',
};

/// Separators for a locale tag such as `en`, `de_DE` or `fr-CA`.
///
/// A tag that is not `language[_-]REGION` is malformed.  A well-formed tag
/// for a language without an entry uses English separators.
fn number_symbols(tag: &str) -> Option<NumberSymbols> {
    let mut parts = tag.split(['_', '-']);
    let lang = parts.next()?;
    let region = parts.next();
    if parts.next().is_some()
        || !(2..=3).contains(&lang.len())
        || !lang.chars().all(|c| c.is_ascii_alphabetic())
    {
        return None;
    }
    if let Some(r) = region {
        let alpha = r.len() == 2 && r.chars().all(|c| c.is_ascii_alphabetic());
        let numeric = r.len() == 3 && r.chars().all(|c| c.is_ascii_digit());
        if !alpha && !numeric {
            return None;
        }
    }
    Some(match lang.to_ascii_lowercase().as_str() {
        "de" | "es" | "it" | "pt" | "nl" | "da" | "id" => NumberSymbols {
            group: ".",
            decimal: ',',
        },
        "fr" => NumberSymbols {
            group: "\u{202f}",
            decimal: ',',
        },
        "ru" | "pl" | "cs" | "sv" | "fi" | "uk" => NumberSymbols {
            group: "\u{a0}",
            decimal: ',',
        },
        _ => EN,
    })
}

// ── TextServices ──────────────────────────────────────────────────────────────

/// Compiled-pattern cache plus the formatting operations.
#[derive(Default)]
pub struct TextServices {
    // Failed compilations are cached as `None`.
    patterns: RwLock<HashMap<String, Option<Arc<Regex>>>>,
}

impl fmt::Debug for TextServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextServices")
            .field("cached_patterns", &self.patterns.read().len())
            .finish()
    }
}

impl TextServices {
    pub fn new() -> Self {
        Self::default()
    }

    fn pattern(&self, src: &str) -> Option<Arc<Regex>> {
        if let Some(hit) = self.patterns.read().get(src) {
            return hit.clone();
        }
        let compiled = match Regex::new(src) {
            Ok(re) => Some(Arc::new(re)),
            Err(e) => {
                tracing::warn!(pattern = src, error = %e, "malformed pattern");
                None
            }
        };
        self.patterns
            .write()
            .entry(src.to_owned())
            .or_insert(compiled)
            .clone()
    }

    /// Number of distinct patterns seen so far.
    pub fn cached_patterns(&self) -> usize {
        self.patterns.read().len()
    }

    /// `true` if `pattern` matches anywhere in `text`.
    pub fn matches(&self, text: &str, pattern: &str) -> Outcome<bool> {
        match self.pattern(pattern) {
            Some(re) => Outcome::ok(re.is_match(text)),
            None => Outcome::warn(false, Warnings::MALFORMED_PATTERN),
        }
    }

    /// Split `text` on every match of `pattern`.  A malformed pattern
    /// leaves `text` whole.
    pub fn split(&self, text: &str, pattern: &str) -> Outcome<Vec<String>> {
        match self.pattern(pattern) {
            Some(re) => Outcome::ok(re.split(text).map(str::to_owned).collect()),
            None => Outcome::warn(vec![text.to_owned()], Warnings::MALFORMED_PATTERN),
        }
    }

    /// Replace every match; `$1`/`${name}` expand capture groups.
    pub fn replace_all(&self, text: &str, pattern: &str, replacement: &str) -> Outcome<String> {
        match self.pattern(pattern) {
            Some(re) => Outcome::ok(re.replace_all(text, replacement).into_owned()),
            None => Outcome::warn(text.to_owned(), Warnings::MALFORMED_PATTERN),
        }
    }

    /// Format `n` with exactly `fraction_digits` decimals, grouped by
    /// thousands, using the separators of `locale` and the named rounding
    /// mode.  An unknown rounding mode falls back to `HALF_EVEN`, a
    /// malformed locale to English separators.
    pub fn format_number(
        &self,
        n: f64,
        locale: &str,
        fraction_digits: u32,
        rounding: &str,
    ) -> Outcome<String> {
        let mut warnings = Warnings::empty();
        let symbols = number_symbols(locale).unwrap_or_else(|| {
            tracing::debug!(locale, "malformed locale");
            warnings |= Warnings::MALFORMED_LOCALE;
            EN
        });
        let rounding = rounding.parse::<Rounding>().unwrap_or_else(|()| {
            tracing::debug!(rounding, "unknown rounding mode");
            warnings |= Warnings::MALFORMED_ROUNDING;
            Rounding::default()
        });

        if !n.is_finite() {
            return Outcome::warn(n.to_string(), warnings);
        }

        let digits = fraction_digits.min(12);
        let scale = 10f64.powi(digits as i32);
        let scaled = rounding.apply(n * scale);
        let text = if scaled.is_finite() {
            format!("{:.0}", scaled.abs())
        } else {
            // Past ~1e296 every f64 is integral; the fraction is all zeros.
            format!("{:.0}{}", n.abs(), "0".repeat(digits as usize))
        };
        let negative = n < 0.0 && text.bytes().any(|b| b != b'0');

        let width = digits as usize + 1;
        let text = format!("{text:0>width$}");
        let (int_part, frac_part) = text.split_at(text.len() - digits as usize);

        let mut out = String::new();
        if negative {
            out.push('-');
        }
        out.push_str(&group_thousands(int_part, symbols.group));
        if digits > 0 {
            out.push(symbols.decimal);
            out.push_str(frac_part);
        }
        Outcome::warn(out, warnings)
    }

    /// Format a Unix timestamp in milliseconds (UTC) with a `strftime`
    /// pattern.  A malformed pattern falls back to RFC 3339.
    pub fn format_date(&self, epoch_millis: i64, pattern: &str) -> Outcome<String> {
        let when = DateTime::<Utc>::from_timestamp_millis(epoch_millis).unwrap_or_else(|| {
            tracing::warn!(epoch_millis, "timestamp out of range");
            DateTime::<Utc>::default()
        });
        let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
        if items.iter().any(|i| matches!(i, Item::Error)) {
            tracing::debug!(pattern, "malformed date pattern");
            return Outcome::warn(when.to_rfc3339(), Warnings::MALFORMED_PATTERN);
        }
        Outcome::ok(when.format_with_items(items.iter()).to_string())
    }
}

fn group_thousands(digits: &str, sep: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3 * sep.len());
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push_str(sep);
        }
        out.push(c);
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regex_operations() {
        let t = TextServices::new();
        assert_eq!(t.matches("hello world", r"wor\w+"), Outcome::ok(true));
        assert_eq!(t.split("a, b,c", r",\s*").value, vec!["a", "b", "c"]);
        assert_eq!(t.replace_all("x1y22", r"(\d+)", "<$1>").value, "x<1>y<22>");
    }

    #[test]
    fn malformed_pattern_degrades() {
        let t = TextServices::new();
        let m = t.matches("abc", "(");
        assert!(!m.value);
        assert_eq!(m.warnings, Warnings::MALFORMED_PATTERN);
        assert_eq!(t.split("abc", "(").value, vec!["abc"]);
        assert_eq!(t.replace_all("abc", "[", "x").value, "abc");
    }

    #[test]
    fn pattern_cache_reuses_compilations() {
        let t = TextServices::new();
        t.matches("a", "a+");
        t.matches("aa", "a+");
        t.matches("b", "(");
        t.matches("b", "(");
        assert_eq!(t.cached_patterns(), 2);
    }

    #[test]
    fn rounding_modes() {
        assert_eq!(Rounding::HalfEven.apply(2.5), 2.0);
        assert_eq!(Rounding::HalfEven.apply(3.5), 4.0);
        assert_eq!(Rounding::HalfUp.apply(2.5), 3.0);
        assert_eq!(Rounding::HalfDown.apply(2.5), 2.0);
        assert_eq!(Rounding::HalfDown.apply(-2.5), -2.0);
        assert_eq!(Rounding::Up.apply(2.1), 3.0);
        assert_eq!(Rounding::Up.apply(-2.1), -3.0);
        assert_eq!(Rounding::Down.apply(-2.9), -2.0);
        assert_eq!(Rounding::Ceiling.apply(-2.9), -2.0);
        assert_eq!(Rounding::Floor.apply(2.9), 2.0);
        assert_eq!("half-up".parse::<Rounding>(), Ok(Rounding::HalfUp));
        assert!("sideways".parse::<Rounding>().is_err());
    }

    #[test]
    fn number_grouping_by_locale() {
        let t = TextServices::new();
        assert_eq!(t.format_number(1234567.891, "en_US", 2, "HALF_EVEN").value, "1,234,567.89");
        assert_eq!(t.format_number(1234567.891, "de_DE", 2, "HALF_EVEN").value, "1.234.567,89");
        assert_eq!(t.format_number(999.0, "en", 0, "HALF_EVEN").value, "999");
        assert_eq!(t.format_number(-1000.0, "en", 1, "HALF_EVEN").value, "-1,000.0");
        assert_eq!(t.format_number(0.5, "en", 2, "HALF_EVEN").value, "0.50");
    }

    #[test]
    fn number_rounding_applies_at_scale() {
        let t = TextServices::new();
        assert_eq!(t.format_number(2.5, "en", 0, "HALF_EVEN").value, "2");
        assert_eq!(t.format_number(2.5, "en", 0, "HALF_UP").value, "3");
        assert_eq!(t.format_number(0.125, "en", 2, "HALF_DOWN").value, "0.12");
        assert_eq!(t.format_number(-0.001, "en", 2, "HALF_EVEN").value, "0.00");
    }

    #[test]
    fn number_too_large_to_scale_keeps_digits() {
        let t = TextServices::new();
        let o = t.format_number(1e300, "en", 12, "HALF_EVEN");
        assert!(o.is_clean());
        assert!(!o.value.contains("inf"), "{}", o.value);
        let (int_part, frac_part) = o.value.split_once('.').unwrap_or_default();
        assert_eq!(frac_part, "000000000000");
        assert_eq!(int_part.replace(',', "").len(), 301);
        assert!(int_part.starts_with("1,000,000,"), "{int_part}");

        let neg = t.format_number(-1e300, "de", 12, "UP").value;
        assert!(neg.starts_with("-1.000."), "{neg}");
        assert!(neg.ends_with(",000000000000"), "{neg}");
    }

    #[test]
    fn number_warnings() {
        let t = TextServices::new();
        let o = t.format_number(1.5, "not a locale", 0, "HALF_UP");
        assert_eq!(o.value, "2");
        assert_eq!(o.warnings, Warnings::MALFORMED_LOCALE);
        let o = t.format_number(2.5, "en", 0, "bogus");
        assert_eq!(o.value, "2");
        assert_eq!(o.warnings, Warnings::MALFORMED_ROUNDING);
        assert!(t.format_number(1.0, "xx", 0, "UP").is_clean());
    }

    #[test]
    fn date_formatting() {
        let t = TextServices::new();
        // 2021-03-04T05:06:07Z
        let ms = 1_614_834_367_000;
        assert_eq!(t.format_date(ms, "%Y-%m-%d %H:%M:%S").value, "2021-03-04 05:06:07");
        let o = t.format_date(ms, "%Q");
        assert_eq!(o.warnings, Warnings::MALFORMED_PATTERN);
        assert!(o.value.starts_with("2021-03-04T05:06:07"));
    }
}
