use super::{Listing, RateSnapshot};

/// Whether a computed payment is rounded to whole currency units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    Whole,
    Exact,
}

/// Accepts either a fraction (0.06) or a whole-number percent (6.0)
fn as_fraction(value: f64) -> f64 {
    if value > 1.0 {
        value / 100.0
    } else {
        value
    }
}

/// Amortized monthly payment on `principal` less the down payment.
///
/// `apr` and `down` each accept a fraction or a whole-number percent.
pub fn mortgage_monthly(principal: f64, apr: f64, down: f64, years: u32, rounding: Rounding) -> f64 {
    let financed = principal - principal * as_fraction(down);
    let n = f64::from(years * 12);
    let r = as_fraction(apr) / 12.0;

    let monthly = if r == 0.0 {
        financed / n
    } else {
        let growth = (1.0 + r).powf(n);
        financed * r * growth / (growth - 1.0)
    };

    match rounding {
        Rounding::Whole => monthly.round(),
        Rounding::Exact => monthly,
    }
}

/// Financing assumptions applied to every listing in a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MortgageTerms {
    pub rates: RateSnapshot,
    /// Down payment, fraction or percent
    pub down_payment: f64,
    pub rounding: Rounding,
}

impl Default for MortgageTerms {
    fn default() -> Self {
        Self {
            rates: RateSnapshot::default(),
            down_payment: 20.0,
            rounding: Rounding::Whole,
        }
    }
}

impl MortgageTerms {
    pub fn new(rates: RateSnapshot) -> Self {
        Self {
            rates,
            ..Self::default()
        }
    }
}

impl Listing {
    /// Populate the derived payment and cost fields.
    ///
    /// A bed count below one is treated as one occupant.
    pub fn calculate(&mut self, terms: &MortgageTerms) {
        let (down, rounding) = (terms.down_payment, terms.rounding);
        self.monthly_15 = mortgage_monthly(self.price, terms.rates.rate_15, down, 15, rounding);
        self.monthly_20 = mortgage_monthly(self.price, terms.rates.rate_20, down, 20, rounding);
        self.monthly_30 = mortgage_monthly(self.price, terms.rates.rate_30, down, 30, rounding);
        self.total = self.monthly_30 + self.hoa + self.land_lease;
        self.per_person = self.total / self.bed.max(1) as f64;
    }
}
