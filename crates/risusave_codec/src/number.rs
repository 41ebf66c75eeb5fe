//! Number formatting compatible with JavaScript's `Number.prototype.toString`.
//!
//! The structural hash of a non-32-bit number is taken over its decimal text,
//! so the text must match what a browser client produces for the same value.

/// Formats a float the way JavaScript's `String(number)` does.
///
/// Uses the shortest digit string that round-trips, plain notation for
/// magnitudes in `[1e-7, 1e21)` and exponent notation (`1.5e+21`, `1e-7`)
/// outside that range.
pub fn format_js_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let sign = if value < 0.0 { "-" } else { "" };
    // `{:e}` yields the shortest round-trip digits, e.g. "1.5e0" or "3e9".
    let scientific = format!("{:e}", value.abs());
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return value.to_string();
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return value.to_string();
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    format!("{sign}{}", place_point(&digits, exponent + 1))
}

/// Lays out `digits` with the decimal point after `n` digits.
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn place_point(digits: &str, n: i32) -> String {
    let k = digits.len() as i32;
    if k <= n && n <= 21 {
        format!("{digits}{}", "0".repeat((n - k) as usize))
    } else if 0 < n && n <= 21 {
        let (int_part, frac_part) = digits.split_at(n as usize);
        format!("{int_part}.{frac_part}")
    } else if -6 < n && n <= 0 {
        format!("0.{}{digits}", "0".repeat((-n) as usize))
    } else {
        let e = n - 1;
        let exp_sign = if e >= 0 { '+' } else { '-' };
        let (first, rest) = digits.split_at(1);
        if rest.is_empty() {
            format!("{first}e{exp_sign}{}", e.abs())
        } else {
            format!("{first}.{rest}e{exp_sign}{}", e.abs())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_print_without_fraction() {
        assert_eq!(format_js_number(1.0), "1");
        assert_eq!(format_js_number(-42.0), "-42");
        assert_eq!(format_js_number(3_000_000_000.0), "3000000000");
        assert_eq!(format_js_number(1e20), "100000000000000000000");
    }

    #[test]
    fn fractions() {
        assert_eq!(format_js_number(1.5), "1.5");
        assert_eq!(format_js_number(0.1), "0.1");
        assert_eq!(format_js_number(-0.000_001), "-0.000001");
        assert_eq!(format_js_number(123.456), "123.456");
    }

    #[test]
    fn exponent_forms() {
        assert_eq!(format_js_number(1e21), "1e+21");
        assert_eq!(format_js_number(1.5e21), "1.5e+21");
        assert_eq!(format_js_number(1e-7), "1e-7");
        assert_eq!(format_js_number(2.5e-8), "2.5e-8");
    }

    #[test]
    fn large_integers_lose_precision_like_doubles() {
        #[allow(clippy::cast_precision_loss)]
        let n = i64::MAX as f64;
        assert_eq!(format_js_number(n), "9223372036854776000");
    }

    #[test]
    fn special_values() {
        assert_eq!(format_js_number(f64::NAN), "NaN");
        assert_eq!(format_js_number(f64::INFINITY), "Infinity");
        assert_eq!(format_js_number(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(format_js_number(0.0), "0");
        assert_eq!(format_js_number(-0.0), "0");
    }
}
