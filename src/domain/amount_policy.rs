use {
    super::money::{Currency, MoneyAmount},
    std::collections::HashMap,
    thiserror::Error,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmountBounds {
    pub min: MoneyAmount,
    pub max: MoneyAmount,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountRejection {
    #[error("{amount} {currency} is below the minimum of {min}")]
    BelowMinimum {
        amount: MoneyAmount,
        currency: Currency,
        min: MoneyAmount,
    },

    #[error("{amount} {currency} is above the maximum of {max}")]
    AboveMaximum {
        amount: MoneyAmount,
        currency: Currency,
        max: MoneyAmount,
    },

    #[error("no amount bounds configured for {0}")]
    UnsupportedCurrency(Currency),
}

/// Per-currency [min, max] bounds, inclusive on both ends.
#[derive(Debug, Clone)]
pub struct AmountPolicy {
    bounds: HashMap<Currency, AmountBounds>,
}

impl AmountPolicy {
    pub fn new() -> Self {
        Self {
            bounds: HashMap::new(),
        }
    }

    pub fn with_bounds(mut self, currency: Currency, min: MoneyAmount, max: MoneyAmount) -> Self {
        self.bounds.insert(currency, AmountBounds { min, max });
        self
    }

    pub fn bounds(&self, currency: Currency) -> Option<AmountBounds> {
        self.bounds.get(&currency).copied()
    }

    pub fn validate(&self, amount: MoneyAmount, currency: Currency) -> Result<(), AmountRejection> {
        let bounds = self
            .bounds
            .get(&currency)
            .ok_or(AmountRejection::UnsupportedCurrency(currency))?;

        if amount < bounds.min {
            return Err(AmountRejection::BelowMinimum {
                amount,
                currency,
                min: bounds.min,
            });
        }
        if amount > bounds.max {
            return Err(AmountRejection::AboveMaximum {
                amount,
                currency,
                max: bounds.max,
            });
        }
        Ok(())
    }
}

impl Default for AmountPolicy {
    /// COP 1.500 to 20.000.000 and USD 1 to 10.000, in minor units.
    fn default() -> Self {
        Self::new()
            .with_bounds(
                Currency::Cop,
                MoneyAmount::from_u32(150_000),
                MoneyAmount::from_u32(2_000_000_000),
            )
            .with_bounds(
                Currency::Usd,
                MoneyAmount::from_u32(100),
                MoneyAmount::from_u32(1_000_000),
            )
    }
}
