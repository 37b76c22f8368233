use rust_decimal::Decimal;

/// The counter backend stores minor units (scale 2, matching the `dec(20,2)`
/// columns of the durable store) because Redis' atomic integer primitives
/// have no native fixed-point type.
pub const MINOR_UNIT_SCALE: u32 = 2;

/// Converts a `Decimal` amount into minor units for the Lua script.
/// Callers validate amounts to two fractional digits at the HTTP edge, so
/// rounding here should never be lossy on the happy path; it still rounds
/// defensively rather than losing money silently on unexpected input.
pub fn to_minor_units(amount: Decimal) -> i64 {
    let scaled = (amount * Decimal::from(100)).round_dp(0);
    scaled.to_string().parse().expect("scaled decimal fits in i64")
}

pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, MINOR_UNIT_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_minor_units() {
        let amount = Decimal::new(123456, 2); // 1234.56
        let minor = to_minor_units(amount);
        assert_eq!(minor, 123456);
        assert_eq!(from_minor_units(minor), amount);
    }

    #[test]
    fn handles_negative_amounts() {
        let amount = Decimal::new(-500, 2); // -5.00
        assert_eq!(to_minor_units(amount), -500);
    }
}
