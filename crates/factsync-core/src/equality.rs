//! Typed equality between staging and baseline values
//!
//! Values arrive as their text representation (or NULL). Comparing them as
//! raw strings would flag `1.0` vs `1` on a numeric column, or `true` vs `t`
//! on a boolean column, and trigger rebuilds for nothing.

use crate::schema::DeclaredType;

/// Tokens (lowercase) that normalize to `true` on a boolean column
pub const TRUTHY_TOKENS: &[&str] = &["true", "1", "t", "yes"];

/// Return true if the two values differ under the rules for `declared_type`
///
/// - NULL vs NULL is equal, NULL vs anything else differs
/// - booleans are normalized through [`TRUTHY_TOKENS`], case-insensitively
/// - numerics are compared as `f64`; if either side fails to parse,
///   the trimmed strings are compared instead
/// - everything else compares trimmed strings
pub fn values_differ(declared_type: DeclaredType, staging: Option<&str>, baseline: Option<&str>) -> bool {
    let (staging, baseline) = match (staging, baseline) {
        (None, None) => return false,
        (Some(s), Some(b)) => (s.trim(), b.trim()),
        _ => return true,
    };

    match declared_type {
        DeclaredType::Boolean => is_truthy(staging) != is_truthy(baseline),
        DeclaredType::Numeric => match (staging.parse::<f64>(), baseline.parse::<f64>()) {
            (Ok(s), Ok(b)) => s != b,
            _ => staging != baseline,
        },
        DeclaredType::Text | DeclaredType::Other => staging != baseline,
    }
}

fn is_truthy(value: &str) -> bool {
    let lowered = value.to_lowercase();
    TRUTHY_TOKENS.contains(&lowered.as_str())
}
