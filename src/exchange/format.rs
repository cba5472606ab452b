/// Renders `value` rounded to `precision` decimals, with `,` between
/// thousands and without trailing fractional zeros.
pub fn format_amount(value: f64, precision: u8) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let fixed = format!("{:.*}", usize::from(precision), value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let frac = frac_part.trim_end_matches('0');
    let negative = value < 0.0 && (grouped != "0" || !frac.is_empty());

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&grouped);
    if !frac.is_empty() {
        out.push('.');
        out.push_str(frac);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groups_thousands() {
        assert_eq!(format_amount(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_amount(999.0, 2), "999");
        assert_eq!(format_amount(1000.0, 0), "1,000");
    }

    #[test]
    fn test_trims_trailing_zeros() {
        assert_eq!(format_amount(12.5, 8), "12.5");
        assert_eq!(format_amount(0.0, 8), "0");
    }

    #[test]
    fn test_rounds_to_precision() {
        assert_eq!(format_amount(0.126, 2), "0.13");
        assert_eq!(format_amount(2.0004, 3), "2");
    }

    #[test]
    fn test_negative_values() {
        assert_eq!(format_amount(-1500.25, 2), "-1,500.25");
        assert_eq!(format_amount(-0.0001, 2), "0");
    }
}
