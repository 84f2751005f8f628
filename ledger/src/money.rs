//! # Money — Fixed-Point Amounts & Currencies
//!
//! Every amount in the ledger is an integer count of a currency's smallest
//! unit (cents, satoshi). `value = 100` in USD means $1.00. The `Currency`
//! determines the scale; the arithmetic never divides and never touches
//! floating point, so a million small transactions drift by exactly zero.
//!
//! Parsing and rendering of decimal strings (`"100.00"`) happens only at the
//! edges — API boundaries and display. Inside the core it's integers all the
//! way down.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors arising from currency parsing or amount arithmetic.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    /// The currency code is not in the supported set.
    #[error("unsupported currency: {0}")]
    UnsupportedCurrency(String),

    /// The decimal string could not be parsed as a non-negative amount.
    #[error("invalid amount {input:?}: {reason}")]
    InvalidAmount {
        /// The offending input string.
        input: String,
        /// What specifically was wrong with it.
        reason: String,
    },

    /// Arithmetic overflow — the result would exceed `u64::MAX` minor units.
    #[error("amount overflow in {currency} arithmetic")]
    Overflow {
        /// The currency being operated on.
        currency: Currency,
    },

    /// Two amounts in different currencies were combined.
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch {
        /// Currency of the left operand.
        left: Currency,
        /// Currency of the right operand.
        right: Currency,
    },
}

// ---------------------------------------------------------------------------
// Currency
// ---------------------------------------------------------------------------

/// The closed set of currencies the ledger accepts.
///
/// Fiat codes are ISO 4217; crypto assets use their conventional tickers.
/// Anything outside this set fails wallet creation with an unsupported-
/// currency error — there is deliberately no escape hatch for arbitrary
/// tickers, because every currency here needs a defined minor-unit scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    /// United States Dollar (smallest unit: cent, 10^-2).
    USD,
    /// Euro (smallest unit: cent, 10^-2).
    EUR,
    /// Kenyan Shilling (smallest unit: cent, 10^-2).
    KES,
    /// Nigerian Naira (smallest unit: kobo, 10^-2).
    NGN,
    /// USD Coin stablecoin (smallest unit: 10^-6).
    USDC,
    /// Bitcoin (smallest unit: satoshi, 10^-8).
    BTC,
}

impl Currency {
    /// All supported currencies, in display order.
    pub const ALL: [Currency; 6] = [
        Currency::USD,
        Currency::EUR,
        Currency::KES,
        Currency::NGN,
        Currency::USDC,
        Currency::BTC,
    ];

    /// Returns the number of fractional decimal digits for this currency.
    ///
    /// This is the fixed-point scale: one whole unit equals
    /// `10^decimals()` minor units.
    pub fn decimals(&self) -> u32 {
        match self {
            Currency::USD | Currency::EUR | Currency::KES | Currency::NGN => 2,
            Currency::USDC => 6,
            Currency::BTC => 8,
        }
    }

    /// Returns the canonical uppercase code for this currency.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::KES => "KES",
            Currency::NGN => "NGN",
            Currency::USDC => "USDC",
            Currency::BTC => "BTC",
        }
    }

    /// Number of minor units in one whole unit (`10^decimals`).
    pub fn minor_per_unit(&self) -> u64 {
        10u64.pow(self.decimals())
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = MoneyError;

    /// Parses a currency code, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::USD),
            "EUR" => Ok(Currency::EUR),
            "KES" => Ok(Currency::KES),
            "NGN" => Ok(Currency::NGN),
            "USDC" => Ok(Currency::USDC),
            "BTC" => Ok(Currency::BTC),
            other => Err(MoneyError::UnsupportedCurrency(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

/// A monetary amount in the smallest indivisible unit of its currency.
///
/// `minor` is always an integer. For USD, `minor = 10_050` means $100.50.
/// For BTC, `minor = 100_000_000` means 1 BTC. Amounts are unsigned — the
/// ledger models direction through transaction kinds, never through signs.
///
/// # Examples
///
/// ```
/// use vela_ledger::money::{Amount, Currency};
///
/// let price = Amount::parse("100.50", Currency::USD).unwrap();
/// assert_eq!(price.minor(), 10_050);
/// assert_eq!(price.to_string(), "100.50 USD");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount {
    /// Value in minor units of `currency`.
    minor: u64,
    /// The currency denomination.
    currency: Currency,
}

impl Amount {
    /// Creates an amount directly from minor units.
    pub fn from_minor(minor: u64, currency: Currency) -> Self {
        Self { minor, currency }
    }

    /// The zero amount in the given currency.
    pub fn zero(currency: Currency) -> Self {
        Self { minor: 0, currency }
    }

    /// Parses a non-negative decimal string into an amount.
    ///
    /// Accepts `"100"`, `"100.5"`, and `"100.50"`. Rejects negative values,
    /// empty input, malformed digits, more fractional digits than the
    /// currency's scale, and values that overflow `u64` minor units.
    pub fn parse(input: &str, currency: Currency) -> Result<Self, MoneyError> {
        let invalid = |reason: &str| MoneyError::InvalidAmount {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty input"));
        }
        if trimmed.starts_with('-') {
            return Err(invalid("amounts cannot be negative"));
        }

        let (whole_str, frac_str) = match trimmed.split_once('.') {
            Some((w, f)) => (w, f),
            None => (trimmed, ""),
        };

        if whole_str.is_empty() && frac_str.is_empty() {
            return Err(invalid("no digits"));
        }
        if !whole_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("non-digit characters in whole part"));
        }
        if !frac_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("non-digit characters in fractional part"));
        }

        let decimals = currency.decimals() as usize;
        if frac_str.len() > decimals {
            return Err(invalid("more fractional digits than the currency allows"));
        }

        let whole: u64 = if whole_str.is_empty() {
            0
        } else {
            whole_str.parse().map_err(|_| invalid("whole part overflow"))?
        };

        // Right-pad the fractional part to the currency scale: "5" in USD
        // means 50 cents, not 5.
        let mut frac: u64 = 0;
        if !frac_str.is_empty() {
            frac = frac_str.parse().map_err(|_| invalid("fractional part overflow"))?;
            frac *= 10u64.pow((decimals - frac_str.len()) as u32);
        }

        let minor = whole
            .checked_mul(currency.minor_per_unit())
            .and_then(|w| w.checked_add(frac))
            .ok_or(MoneyError::Overflow { currency })?;

        Ok(Self { minor, currency })
    }

    /// Value in minor units.
    pub fn minor(&self) -> u64 {
        self.minor
    }

    /// The currency denomination.
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Returns `true` if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.minor == 0
    }

    /// Checked addition. Fails on currency mismatch or overflow.
    pub fn checked_add(&self, other: &Amount) -> Result<Amount, MoneyError> {
        self.require_same_currency(other)?;
        let minor = self
            .minor
            .checked_add(other.minor)
            .ok_or(MoneyError::Overflow {
                currency: self.currency,
            })?;
        Ok(Amount {
            minor,
            currency: self.currency,
        })
    }

    /// Checked subtraction. Fails on currency mismatch or underflow
    /// (amounts are unsigned; there is no negative money here).
    pub fn checked_sub(&self, other: &Amount) -> Result<Amount, MoneyError> {
        self.require_same_currency(other)?;
        let minor = self
            .minor
            .checked_sub(other.minor)
            .ok_or(MoneyError::Overflow {
                currency: self.currency,
            })?;
        Ok(Amount {
            minor,
            currency: self.currency,
        })
    }

    /// Renders the amount as a decimal string without the currency code,
    /// e.g. `10_050` USD minor units become `"100.50"`.
    pub fn to_decimal_string(&self) -> String {
        let decimals = self.currency.decimals();
        if decimals == 0 {
            return self.minor.to_string();
        }
        let divisor = self.currency.minor_per_unit();
        let whole = self.minor / divisor;
        let frac = self.minor % divisor;
        format!("{}.{:0>width$}", whole, frac, width = decimals as usize)
    }

    fn require_same_currency(&self, other: &Amount) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                left: self.currency,
                right: other.currency,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.to_decimal_string(), self.currency)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
