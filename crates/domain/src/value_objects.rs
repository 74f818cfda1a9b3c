//! Value objects shared by the cart, booking and catalog modules.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a catalog service.
    ServiceId
);

uuid_id!(
    /// Identifier of a charging type (a configured pricing mode).
    ChargingTypeId
);

/// Money amount represented in cents to avoid floating point issues.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Largest unit price taken from a catalog or a quote (10,000,000.00).
    /// Ten units of it still leave ample headroom for summing earnings.
    pub const MAX_PRICE: Money = Money(1_000_000_000);

    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Creates an amount from whole currency units.
    pub fn from_units(units: i64) -> Self {
        Self(units.saturating_mul(100))
    }

    pub fn zero() -> Self {
        Self(0)
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Multiplies by a quantity, saturating at the `i64` bounds.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money(self.0.saturating_mul(i64::from(quantity)))
    }

    pub fn checked_multiply(&self, quantity: u32) -> Option<Money> {
        self.0.checked_mul(i64::from(quantity)).map(Money)
    }

    pub fn checked_add(&self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    /// True for a positive amount no larger than [`Money::MAX_PRICE`].
    pub fn is_valid_price(&self) -> bool {
        self.is_positive() && *self <= Self::MAX_PRICE
    }

    /// Parses a price as catalogs store it: `"80.00"`, `"80,00"` or `"80"`.
    ///
    /// Anything unparseable, negative or above [`Money::MAX_PRICE`] is zero. A
    /// bad price is never an error; it just means "no price".
    pub fn parse_lenient(raw: &str) -> Money {
        let normalized = raw.trim().replace(',', ".");
        let (units, fraction) = match normalized.split_once('.') {
            Some((units, fraction)) => (units, fraction),
            None => (normalized.as_str(), ""),
        };

        if units.is_empty() && fraction.is_empty() {
            return Money::zero();
        }
        if !units.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
            || fraction.len() > 2
        {
            return Money::zero();
        }

        let units: i64 = if units.is_empty() {
            0
        } else {
            match units.parse() {
                Ok(units) => units,
                Err(_) => return Money::zero(),
            }
        };
        let cents: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().unwrap_or(0) * 10,
            _ => fraction.parse().unwrap_or(0),
        };

        units
            .checked_mul(100)
            .and_then(|c| c.checked_add(cents))
            .map(Money)
            .filter(|price| *price <= Self::MAX_PRICE)
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{sign}{}.{:02}", (self.0 / 100).abs(), (self.0 % 100).abs())
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

/// Line-item quantity, always within `[1, 10]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(u32);

impl Quantity {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 10;

    /// Clamps any requested value into range instead of rejecting it, so a
    /// burst of clicks past either end settles on the bound.
    pub fn clamped(requested: i64) -> Self {
        Self(requested.clamp(i64::from(Self::MIN), i64::from(Self::MAX)) as u32)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self(Self::MIN)
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_display_uses_two_decimals() {
        assert_eq!(Money::from_cents(8000).to_string(), "80.00");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-1234).to_string(), "-12.34");
    }

    #[test]
    fn parse_lenient_accepts_catalog_formats() {
        assert_eq!(Money::parse_lenient("80.00"), Money::from_cents(8000));
        assert_eq!(Money::parse_lenient("80,5"), Money::from_cents(8050));
        assert_eq!(Money::parse_lenient(" 80 "), Money::from_units(80));
        assert_eq!(Money::parse_lenient(".99"), Money::from_cents(99));
    }

    #[test]
    fn parse_lenient_treats_garbage_as_zero() {
        for raw in [
            "",
            "abc",
            "-5.00",
            "1.234",
            "12.3.4",
            "R$ 10",
            "99999999999999999999",
            "92233720368547758.00",
            "10000000.01",
        ] {
            assert!(Money::parse_lenient(raw).is_zero(), "{raw:?} should be zero");
        }
    }

    #[test]
    fn parse_lenient_accepts_the_price_cap() {
        assert_eq!(Money::parse_lenient("10000000,00"), Money::MAX_PRICE);
        assert!(Money::MAX_PRICE.is_valid_price());
        assert!(!Money::from_cents(Money::MAX_PRICE.cents() + 1).is_valid_price());
        assert!(!Money::zero().is_valid_price());
    }

    #[test]
    fn money_arithmetic() {
        let unit = Money::from_cents(8000);
        assert_eq!(unit.multiply(2), Money::from_cents(16000));
        assert_eq!(unit + unit, Money::from_cents(16000));
        assert_eq!(unit.checked_multiply(2), Some(Money::from_cents(16000)));
    }

    #[test]
    fn money_arithmetic_never_wraps() {
        let huge = Money::from_cents(i64::MAX / 2 + 1);
        assert_eq!(huge.multiply(2), Money::from_cents(i64::MAX));
        assert_eq!(huge + huge, Money::from_cents(i64::MAX));
        assert_eq!(huge.checked_multiply(2), None);
        assert_eq!(huge.checked_add(huge), None);

        let mut sum = huge;
        sum += huge;
        assert_eq!(sum, Money::from_cents(i64::MAX));

        // Ten units of the largest price is nowhere near the bound
        assert!(Money::MAX_PRICE.checked_multiply(Quantity::MAX).is_some());
    }

    #[test]
    fn quantity_is_clamped_not_rejected() {
        assert_eq!(Quantity::clamped(0).get(), 1);
        assert_eq!(Quantity::clamped(-7).get(), 1);
        assert_eq!(Quantity::clamped(4).get(), 4);
        assert_eq!(Quantity::clamped(11).get(), 10);
        assert_eq!(Quantity::clamped(i64::MAX).get(), 10);
    }

    #[test]
    fn quantity_stays_in_range_for_any_request() {
        for requested in -50..=50 {
            let q = Quantity::clamped(requested).get();
            assert!((Quantity::MIN..=Quantity::MAX).contains(&q));
        }
    }
}
