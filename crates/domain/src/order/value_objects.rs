//! Value objects for the order domain.

use common::ProductId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Human-facing order reference, `ORD-` followed by eight upper-case hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Generates a fresh order number from a random UUID.
    pub fn generate() -> Self {
        let uuid = Uuid::new_v4().simple().to_string();
        Self(format!("ORD-{}", uuid[..8].to_uppercase()))
    }

    /// Wraps an existing order number.
    pub fn new(number: impl Into<String>) -> Self {
        Self(number.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Money amount represented in cents to avoid floating point issues.
///
/// On the wire it is a decimal number with two fractional digits
/// (`25.0` for 2500 cents), matching what the product service returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money {
    /// Amount in cents (e.g., 1000 = $10.00)
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Converts a decimal amount, rounding to the nearest cent.
    pub fn from_decimal(amount: f64) -> Self {
        Self {
            cents: (amount * 100.0).round() as i64,
        }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the amount as a decimal number.
    pub fn as_decimal(&self) -> f64 {
        self.cents as f64 / 100.0
    }

    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Multiplies by a quantity, saturating at the bounds of the cent range.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money {
            cents: self.cents.saturating_mul(i64::from(quantity)),
        }
    }

    /// Multiplies by a quantity, returning `None` on overflow.
    pub fn checked_multiply(&self, quantity: u32) -> Option<Money> {
        self.cents
            .checked_mul(i64::from(quantity))
            .map(Money::from_cents)
    }

    /// Adds two amounts, returning `None` on overflow.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.cents.checked_add(other.cents).map(Money::from_cents)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents.saturating_add(rhs.cents),
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.cents = self.cents.saturating_add(rhs.cents);
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_decimal())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = f64::deserialize(deserializer)?;
        if !amount.is_finite() {
            return Err(serde::de::Error::custom("amount must be a finite number"));
        }
        if amount < 0.0 {
            return Err(serde::de::Error::custom("amount must not be negative"));
        }
        // i64::MAX as f64 rounds up to 2^63, so equality is already out of range.
        if amount * 100.0 >= i64::MAX as f64 {
            return Err(serde::de::Error::custom("amount is too large"));
        }
        Ok(Money::from_decimal(amount))
    }
}

/// A priced line of an order.
///
/// Name and unit price are snapshots taken when the order was priced
/// and are never re-derived from the product service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub subtotal: Money,
}

impl OrderItem {
    /// Creates an item, computing the subtotal from price and quantity.
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            product_id,
            product_name: product_name.into(),
            quantity,
            unit_price,
            subtotal: unit_price.multiply(quantity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_number_has_expected_shape() {
        let number = OrderNumber::generate();
        let s = number.as_str();
        assert_eq!(s.len(), 12);
        assert!(s.starts_with("ORD-"));
        assert!(
            s[4..]
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
        );
    }

    #[test]
    fn order_numbers_differ() {
        assert_ne!(OrderNumber::generate(), OrderNumber::generate());
    }

    #[test]
    fn money_display() {
        assert_eq!(Money::from_cents(2500).to_string(), "25.00");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-1234).to_string(), "-12.34");
    }

    #[test]
    fn money_from_decimal_rounds_to_cents() {
        assert_eq!(Money::from_decimal(10.0).cents(), 1000);
        assert_eq!(Money::from_decimal(19.99).cents(), 1999);
        assert_eq!(Money::from_decimal(0.125).cents(), 13);
    }

    #[test]
    fn money_wire_format_is_decimal() {
        assert_eq!(serde_json::to_string(&Money::from_cents(2500)).unwrap(), "25.0");
        let parsed: Money = serde_json::from_str("5").unwrap();
        assert_eq!(parsed, Money::from_cents(500));
    }

    #[test]
    fn money_sums() {
        let total: Money = [Money::from_cents(2000), Money::from_cents(500)]
            .into_iter()
            .sum();
        assert_eq!(total, Money::from_cents(2500));
    }

    #[test]
    fn money_rejects_negative_and_oversized_amounts() {
        assert!(serde_json::from_str::<Money>("-1.5").is_err());
        assert!(serde_json::from_str::<Money>("1e17").is_err());
        assert_eq!(serde_json::from_str::<Money>("0").unwrap(), Money::zero());
    }

    #[test]
    fn checked_arithmetic_reports_overflow() {
        let huge = Money::from_cents(i64::MAX / 2 + 1);
        assert_eq!(huge.checked_multiply(2), None);
        assert_eq!(huge.checked_add(huge), None);
        assert_eq!(
            Money::from_cents(1050).checked_multiply(3),
            Some(Money::from_cents(3150))
        );
        assert_eq!(huge.multiply(2), Money::from_cents(i64::MAX));
        assert_eq!(huge + huge, Money::from_cents(i64::MAX));
    }

    #[test]
    fn item_subtotal_is_price_times_quantity() {
        let item = OrderItem::new(ProductId::new(1), "Widget", 3, Money::from_cents(1050));
        assert_eq!(item.subtotal, Money::from_cents(3150));
    }
}
