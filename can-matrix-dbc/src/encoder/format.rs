//! Numeric formatting for DBC fields

/// Decimal places kept for non-integral values
pub const MAX_DECIMALS: usize = 3;

/// `10^MAX_DECIMALS`
const DECIMAL_SCALE: f64 = 1000.0;

/// Render a number the way DBC fields expect it
///
/// Integral values print without a fractional part (`8.0` -> `"8"`). Other
/// values are rounded half away from zero to three decimals, then trailing
/// zeros and a trailing decimal point are stripped (`0.100` -> `"0.1"`,
/// `0.0625` -> `"0.063"`, `1.0004` -> `"1"`).
pub fn format_number(value: f64) -> String {
    let text = if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        // Formatting alone would round exact ties to even
        let rounded = (value * DECIMAL_SCALE).round() / DECIMAL_SCALE;
        let fixed = format!("{:.*}", MAX_DECIMALS, rounded);
        fixed.trim_end_matches('0').trim_end_matches('.').to_string()
    };

    if text == "-0" {
        "0".to_string()
    } else {
        text
    }
}
