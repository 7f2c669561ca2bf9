//! The physical limits of a battery bank.
use crate::units::{Dimensionless, Energy, Power};
use anyhow::{Result, ensure};

/// The limits of a battery bank, aggregated over all of its units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryConfig {
    /// Total usable energy capacity
    pub capacity: Energy,
    /// Maximum rate of charge or of discharge
    pub power: Power,
    /// Fraction of charged energy which can later be recovered. The remainder is lost when
    /// charging.
    pub efficiency: Dimensionless,
}

impl BatteryConfig {
    /// Create a new [`BatteryConfig`], checking its values are physically meaningful
    pub fn new(capacity: Energy, power: Power, efficiency: Dimensionless) -> Result<Self> {
        ensure!(
            capacity.is_finite() && capacity >= Energy(0.0),
            "Battery capacity must be a finite, non-negative number, but got {capacity}"
        );
        ensure!(
            power.is_finite() && power >= Power(0.0),
            "Battery power must be a finite, non-negative number, but got {power}"
        );
        ensure!(
            efficiency.value() > 0.0 && efficiency.value() <= 1.0,
            "Battery efficiency must be in the range (0, 1], but got {efficiency}"
        );

        Ok(Self {
            capacity,
            power,
            efficiency,
        })
    }
}
