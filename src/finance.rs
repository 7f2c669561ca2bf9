//! General functions related to finance.
use crate::units::{Dimensionless, Money};

/// Calculates the capital recovery factor (CRF) for a given lifetime and discount rate.
///
/// The CRF is the fraction of a principal which must be paid each year for a fixed annuity to
/// fully amortise it over `lifetime` years.
pub fn capital_recovery_factor(lifetime: u32, discount_rate: Dimensionless) -> Dimensionless {
    if lifetime == 0 {
        return Dimensionless(0.0);
    }
    if discount_rate == Dimensionless(0.0) {
        return Dimensionless(1.0) / Dimensionless(lifetime as f64);
    }
    let factor = (Dimensionless(1.0) + discount_rate).powi(lifetime as i32);
    (discount_rate * factor) / (factor - Dimensionless(1.0))
}

/// The fixed yearly payment which amortises `principal` over `term` years at `rate`
pub fn annuity_payment(principal: Money, term: u32, rate: Dimensionless) -> Money {
    principal * capital_recovery_factor(term, rate)
}

/// The total paid on top of `principal` when it is repaid as an annuity over `term` years.
///
/// This is the cost of the money itself (interest on a loan, or the return demanded on equity),
/// i.e. the sum of all annuity payments net of the principal.
pub fn annuity_interest(principal: Money, term: u32, rate: Dimensionless) -> Money {
    if term == 0 {
        return Money(0.0);
    }

    annuity_payment(principal, term, rate) * Dimensionless(term as f64) - principal
}
