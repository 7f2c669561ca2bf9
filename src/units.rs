//! This module defines various unit types and their conversions.
//!
//! Energy is always in kWh and power in kW. Because the simulation steps in whole hours, an
//! hourly energy flow in kWh is numerically equal to the average power in kW over that hour.
use float_cmp::{ApproxEq, F64Margin};
use serde::{Deserialize, Serialize};

macro_rules! unit_struct {
    ($name:ident) => {
        /// Represents a type of quantity.
        #[derive(
            Debug,
            Default,
            Clone,
            Copy,
            PartialEq,
            PartialOrd,
            Serialize,
            Deserialize,
            derive_more::Add,
            derive_more::Sub,
            derive_more::AddAssign,
            derive_more::SubAssign,
            derive_more::Sum,
            derive_more::Display,
        )]
        pub struct $name(pub f64);

        impl $name {
            /// Create a new instance of the unit type from an f64 value.
            pub const fn new(val: f64) -> Self {
                Self(val)
            }

            /// Returns the value of the unit type as an f64.
            pub const fn value(self) -> f64 {
                self.0
            }

            /// Whether the underlying value is finite
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }

            /// The larger of two values
            pub fn max(self, other: Self) -> Self {
                Self(self.0.max(other.0))
            }

            /// The smaller of two values
            pub fn min(self, other: Self) -> Self {
                Self(self.0.min(other.0))
            }
        }

        impl std::ops::Neg for $name {
            type Output = $name;
            fn neg(self) -> $name {
                $name(-self.0)
            }
        }

        impl std::ops::Mul<Dimensionless> for $name {
            type Output = $name;
            fn mul(self, rhs: Dimensionless) -> $name {
                $name(self.0 * rhs.0)
            }
        }

        impl std::ops::Mul<$name> for Dimensionless {
            type Output = $name;
            fn mul(self, rhs: $name) -> $name {
                $name(self.0 * rhs.0)
            }
        }

        impl std::ops::Div<Dimensionless> for $name {
            type Output = $name;
            fn div(self, rhs: Dimensionless) -> $name {
                $name(self.0 / rhs.0)
            }
        }

        impl std::ops::Div<$name> for $name {
            type Output = Dimensionless;
            fn div(self, rhs: $name) -> Dimensionless {
                Dimensionless(self.0 / rhs.0)
            }
        }

        impl ApproxEq for $name {
            type Margin = F64Margin;

            fn approx_eq<T: Into<Self::Margin>>(self, other: Self, margin: T) -> bool {
                self.0.approx_eq(other.0, margin)
            }
        }
    };
}

macro_rules! impl_mul {
    ($Lhs:ty, $Rhs:ty, $Out:ty) => {
        impl std::ops::Mul<$Rhs> for $Lhs {
            type Output = $Out;
            fn mul(self, rhs: $Rhs) -> $Out {
                <$Out>::new(self.0 * rhs.0)
            }
        }
        impl std::ops::Mul<$Lhs> for $Rhs {
            type Output = $Out;
            fn mul(self, lhs: $Lhs) -> $Out {
                <$Out>::new(self.0 * lhs.0)
            }
        }
    };
}

/// Represents a dimensionless quantity (a ratio, factor or rate).
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    PartialOrd,
    Serialize,
    Deserialize,
    derive_more::Add,
    derive_more::Sub,
    derive_more::Display,
)]
pub struct Dimensionless(pub f64);

impl Dimensionless {
    /// Create a new dimensionless value
    pub const fn new(val: f64) -> Self {
        Self(val)
    }

    /// Returns the value as an f64.
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Whether the underlying value is finite
    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }

    /// Raise to an integer power
    pub fn powi(self, rhs: i32) -> Self {
        Self(self.0.powi(rhs))
    }
}

impl std::ops::Mul for Dimensionless {
    type Output = Dimensionless;

    fn mul(self, rhs: Dimensionless) -> Self::Output {
        Dimensionless(self.0 * rhs.0)
    }
}

impl std::ops::Div for Dimensionless {
    type Output = Dimensionless;

    fn div(self, rhs: Dimensionless) -> Self::Output {
        Dimensionless(self.0 / rhs.0)
    }
}

impl From<f64> for Dimensionless {
    fn from(val: f64) -> Self {
        Self(val)
    }
}

impl ApproxEq for Dimensionless {
    type Margin = F64Margin;

    fn approx_eq<T: Into<Self::Margin>>(self, other: Self, margin: T) -> bool {
        self.0.approx_eq(other.0, margin)
    }
}

// Base quantities
unit_struct!(Money);
unit_struct!(Energy);
unit_struct!(Power);

// Derived quantities
unit_struct!(MoneyPerEnergy);
unit_struct!(MoneyPerPower);

// Multiplication rules
impl_mul!(MoneyPerEnergy, Energy, Money);
impl_mul!(MoneyPerPower, Power, Money);
