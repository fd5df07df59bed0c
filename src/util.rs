// Utility helpers for parsing and number formatting.
//
// All the forgiving CSV handling lives here so the normalizer and the
// analytical modules can work with typed values.
use num_format::{Locale, ToFormattedString};

/// Numeric cell of the housing sheet, or `None`.
///
/// Cells like `TBD` or `n/a` (any letters at all) are not numbers; `1,204`
/// is. Infinite and NaN results are dropped as well.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let s = s.replace(',', "");
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Largest unit count a single cell may hold; anything above is a typo.
pub const MAX_UNITS_PER_CELL: f64 = 1_000_000.0;

/// Completion years outside this range are typos, not history.
pub const PLAUSIBLE_YEARS: std::ops::RangeInclusive<i32> = 1800..=9999;

/// Unit counts are never unknown: missing, non-numeric, negative and
/// absurdly large values all count as zero. Fractional counts are
/// truncated.
pub fn parse_units(s: Option<&str>) -> u64 {
    match parse_f64_safe(s) {
        Some(v) if v > 0.0 && v <= MAX_UNITS_PER_CELL => v.trunc() as u64,
        _ => 0,
    }
}

/// Parse a completion year from the free-text move-in column.
///
/// Accepts `2024` and `2024.0` (spreadsheets like to write years as
/// floats) but rejects fractional values such as `2024.5` and anything
/// outside [`PLAUSIBLE_YEARS`].
pub fn parse_year(s: Option<&str>) -> Option<i32> {
    let v = parse_f64_safe(s)?;
    if v.fract() != 0.0
        || v < *PLAUSIBLE_YEARS.start() as f64
        || v > *PLAUSIBLE_YEARS.end() as f64
    {
        return None;
    }
    Some(v as i32)
}

/// Trimmed, non-empty text or `None`.
pub fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Percentages and projected unit counts for the report tables, e.g.
/// `1,234.5`.
pub fn format_number(n: f64, decimals: usize) -> String {
    let neg = n.is_sign_negative() && n != 0.0;
    let abs_n = n.abs();
    let s = format!("{:.*}", decimals, abs_n);
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

/// Project and row counts with thousands separators.
pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

/// Presentation-boundary conversion: truncate toward zero, then format
/// with thousands separators.
pub fn format_truncated(n: f64) -> String {
    format_int(n.trunc() as i64)
}
