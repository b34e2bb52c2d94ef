//! Frame decoders for the two sensor types.
//!
//! Both are pure functions of the received text. A frame that cannot be decoded
//! yields no sample; callers drop it and keep reading.

use crate::{ChannelError, CompositionSample, Result};

/// Digits needed for a complete analyser frame.
pub const COMPOSITION_DIGITS: usize = 23;

/// Decode an analyser frame, or `None` if it is partial or garbled.
pub fn decode_composition(raw: &str) -> Option<CompositionSample> {
    parse_composition(raw).ok()
}

/// Like [`decode_composition`] but reports why a frame was rejected.
///
/// Layout of the digit-only projection:
/// fat `[0..4]` / 100, snf `[4..8]` / 100, density `[8..13]` verbatim,
/// added water `[13..18]` / 1000, protein `[18..23]` / 1000.
pub fn parse_composition(raw: &str) -> Result<CompositionSample> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < COMPOSITION_DIGITS {
        return Err(ChannelError::MalformedFrame(format!(
            "expected {COMPOSITION_DIGITS} digits, got {}",
            digits.len()
        )));
    }
    let fat = scaled(&digits[0..4], 100.0)?;
    let snf = scaled(&digits[4..8], 100.0)?;
    let density = digits[8..13].to_string();
    let added_water = scaled(&digits[13..18], 1000.0)?;
    let protein = scaled(&digits[18..23], 1000.0)?;
    Ok(CompositionSample {
        fat,
        snf,
        density,
        added_water,
        protein,
        raw: raw.to_string(),
    })
}

/// Decode a flow meter line into liters, or `None` if it holds no number.
pub fn decode_quantity(raw: &str) -> Option<f64> {
    parse_quantity(raw).ok()
}

/// Like [`decode_quantity`] but reports why a line was rejected.
pub fn parse_quantity(raw: &str) -> Result<f64> {
    let numeric: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let mut value: f64 = numeric
        .parse()
        .map_err(|_| ChannelError::MalformedFrame(format!("no volume in {raw:?}")))?;
    // The meter drops the decimal point for values with one implied decimal
    if !raw.contains('.') && value >= 10.0 {
        value /= 10.0;
    }
    Ok(round2(value))
}

fn scaled(field: &str, divisor: f64) -> Result<f64> {
    let value: f64 = field
        .parse()
        .map_err(|_| ChannelError::MalformedFrame(format!("bad field {field:?}")))?;
    Ok(round2(value / divisor))
}

/// Round to two decimals, halves away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composition_offsets_and_divisors() {
        let sample = decode_composition("01234567890123456789012").unwrap();
        assert_eq!(sample.fat, 1.23);
        assert_eq!(sample.snf, 45.67);
        assert_eq!(sample.density, "89012");
        assert_eq!(sample.added_water, 34.57);
        assert_eq!(sample.protein, 89.01);
        assert_eq!(sample.raw, "01234567890123456789012");
    }

    #[test]
    fn test_composition_ignores_labels_and_punctuation() {
        let raw = "F:04.12 S:08.45 D:28.512 W:00.000 P:03.240\r\n";
        let sample = decode_composition(raw).unwrap();
        assert_eq!(sample.fat, 4.12);
        assert_eq!(sample.snf, 8.45);
        assert_eq!(sample.density, "28512");
        assert_eq!(sample.added_water, 0.0);
        assert_eq!(sample.protein, 3.24);
        assert_eq!(sample.raw, raw);
    }

    #[test]
    fn test_composition_uses_first_23_digits() {
        let sample = decode_composition("0412084528512000000324099999").unwrap();
        assert_eq!(sample.fat, 4.12);
        assert_eq!(sample.protein, 3.24);
    }

    #[test]
    fn test_short_composition_frame_is_no_sample() {
        assert!(decode_composition("0123456789012345678901").is_none());
        assert!(decode_composition("").is_none());
        assert!(decode_composition("-.- FAT SNF --").is_none());
        assert!(matches!(
            parse_composition("12345"),
            Err(ChannelError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_non_ascii_digits_are_not_counted() {
        // Arabic-Indic digits are not part of the device alphabet
        let raw = "٠١٢٣٤٥٦٧٨٩٠١٢٣٤٥٦٧٨٩٠١٢";
        assert!(decode_composition(raw).is_none());
    }

    #[test]
    fn test_quantity_without_point_is_scaled() {
        assert_eq!(decode_quantity("123"), Some(12.3));
        assert_eq!(decode_quantity("0125\r"), Some(12.5));
    }

    #[test]
    fn test_quantity_with_point_is_kept() {
        assert_eq!(decode_quantity("1.23"), Some(1.23));
        assert_eq!(decode_quantity("L: 15.456 \r"), Some(15.46));
    }

    #[test]
    fn test_quantity_small_values_are_not_scaled() {
        assert_eq!(decode_quantity("9"), Some(9.0));
        assert_eq!(decode_quantity("10"), Some(1.0));
    }

    #[test]
    fn test_quantity_garbage_is_no_sample() {
        assert_eq!(decode_quantity("abc"), None);
        assert_eq!(decode_quantity(""), None);
        assert_eq!(decode_quantity("1.2.3"), None);
        assert!(matches!(
            parse_quantity("--"),
            Err(ChannelError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_round2_halves_away_from_zero() {
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(-0.125), -0.13);
        assert_eq!(round2(2.0), 2.0);
    }
}
