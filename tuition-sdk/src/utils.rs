//! Currency conversion and display helpers
//!
//! Amounts are kept in integer cents everywhere in the SDK. These helpers
//! convert to rands only at the edges: the upfront `tuitionAmount` field and
//! human-readable output.

/// Cents per rand
pub const MINOR_UNITS_PER_MAJOR: u64 = 100;

/// Convert cents to rands
///
/// # Examples
/// ```
/// use tuition_sdk::utils::minor_to_major;
///
/// assert_eq!(minor_to_major(110_000), 1100.0);
/// assert_eq!(minor_to_major(38_334), 383.34);
/// ```
#[must_use]
pub fn minor_to_major(minor_units: u64) -> f64 {
    minor_to_major_with(minor_units, MINOR_UNITS_PER_MAJOR)
}

/// Convert minor units to major units with an explicit divisor
#[must_use]
pub fn minor_to_major_with(minor_units: u64, divisor: u64) -> f64 {
    // Fee amounts stay far below f64's 52-bit mantissa
    #[allow(clippy::cast_precision_loss)]
    {
        minor_units as f64 / divisor.max(1) as f64
    }
}

/// Convert rands to cents, rounding to the nearest cent
///
/// Negative amounts clamp to zero.
///
/// # Examples
/// ```
/// use tuition_sdk::utils::major_to_minor;
///
/// assert_eq!(major_to_minor(1100.0), 110_000);
/// assert_eq!(major_to_minor(383.34), 38_334);
/// assert_eq!(major_to_minor(-5.0), 0);
/// ```
#[must_use]
pub fn major_to_minor(major_units: f64) -> u64 {
    #[allow(clippy::cast_precision_loss)]
    let result = major_units.max(0.0) * MINOR_UNITS_PER_MAJOR as f64;
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    {
        result.round().min(u64::MAX as f64) as u64
    }
}

/// Format cents as a rand amount, e.g. `R 2,300.00`
///
/// # Examples
/// ```
/// use tuition_sdk::utils::format_rands;
///
/// assert_eq!(format_rands(230_000), "R 2,300.00");
/// assert_eq!(format_rands(38_334), "R 383.34");
/// assert_eq!(format_rands(5), "R 0.05");
/// ```
#[must_use]
pub fn format_rands(minor_units: u64) -> String {
    format_rands_with(minor_units, MINOR_UNITS_PER_MAJOR)
}

/// Format minor units with an explicit divisor (1 means the amount has no cents)
#[must_use]
pub fn format_rands_with(minor_units: u64, divisor: u64) -> String {
    let divisor = divisor.max(1);
    let whole = minor_units.checked_div(divisor).unwrap_or(0);
    let cents = minor_units.checked_rem(divisor).unwrap_or(0);
    let grouped = group_thousands(whole);

    if divisor == 1 {
        return format!("R {grouped}");
    }
    let width = decimal_width(divisor);
    format!("R {grouped}.{cents:0width$}")
}

fn decimal_width(divisor: u64) -> usize {
    let mut width = 0usize;
    let mut rest = divisor;
    while rest > 1 {
        rest /= 10;
        width = width.saturating_add(1);
    }
    width
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len().saturating_add(digits.len() / 3));
    for (i, ch) in digits.chars().enumerate() {
        let remaining = digits.len().saturating_sub(i);
        if i > 0 && remaining % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
