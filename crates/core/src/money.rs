//! Integer money arithmetic.
//!
//! Amounts are in the smallest currency unit (cents). Rates are basis points
//! (1% = 100 bps). Results round half away from zero to the nearest cent and
//! never go below zero.

/// Amount in the smallest currency unit.
pub type Cents = u64;

/// Rate in hundredths of a percent.
pub type BasisPoints = i64;

const BPS_SCALE: i128 = 10_000;

/// `amount * (1 + bps / 10_000)`.
pub fn apply_markup_bps(amount: Cents, bps: BasisPoints) -> Cents {
    let numerator = i128::from(amount) * (BPS_SCALE + i128::from(bps));
    round_scaled(numerator)
}

/// `amount + delta`, floored at zero.
pub fn apply_fixed(amount: Cents, delta: i64) -> Cents {
    let value = i128::from(amount) + i128::from(delta);
    clamp_to_cents(value)
}

/// `amount * bps / 10_000` (e.g. the commission share of a sale).
pub fn share_of(amount: Cents, bps: BasisPoints) -> Cents {
    round_scaled(i128::from(amount) * i128::from(bps))
}

fn round_scaled(numerator: i128) -> Cents {
    if numerator <= 0 {
        return 0;
    }
    clamp_to_cents((numerator + BPS_SCALE / 2) / BPS_SCALE)
}

fn clamp_to_cents(value: i128) -> Cents {
    if value <= 0 {
        0
    } else {
        u64::try_from(value).unwrap_or(u64::MAX)
    }
}
