use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Div, Mul, Neg, Sub},
};

use serde::{Deserialize, Serialize};

macro_rules! Quantity {
    ($name: ident) => {
        #[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
        pub struct $name(f64);

        impl From<f64> for $name {
            fn from(value: f64) -> Self {
                $name(value)
            }
        }

        impl From<$name> for f64 {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl Add for $name {
            type Output = $name;

            fn add(self, rhs: Self) -> Self::Output {
                $name(self.0 + rhs.0)
            }
        }

        impl Sum for $name {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                iter.fold($name(0.0), |a, b| a + b)
            }
        }

        impl Sub for $name {
            type Output = $name;

            fn sub(self, rhs: Self) -> Self::Output {
                $name(self.0 - rhs.0)
            }
        }

        impl Neg for $name {
            type Output = $name;

            fn neg(self) -> Self::Output {
                $name(-self.0)
            }
        }

        impl Div for $name {
            type Output = f64;

            fn div(self, rhs: Self) -> Self::Output {
                self.0 / rhs.0
            }
        }

        impl Div<f64> for $name {
            type Output = $name;

            fn div(self, rhs: f64) -> Self::Output {
                $name(self.0 / rhs)
            }
        }

        impl Mul<f64> for $name {
            type Output = $name;

            fn mul(self, rhs: f64) -> Self::Output {
                $name(self.0 * rhs)
            }
        }

        impl Mul<$name> for f64 {
            type Output = $name;

            fn mul(self, rhs: $name) -> Self::Output {
                $name(self * rhs.0)
            }
        }

        impl $name {
            pub const fn inner(self) -> f64 {
                self.0
            }

            #[inline]
            pub fn map<F>(self, f: F) -> Self
            where
                F: FnOnce(f64) -> f64,
            {
                Self(f(self.0))
            }

            pub fn min(self, other: Self) -> Self {
                Self(self.0.min(other.0))
            }

            pub fn max(self, other: Self) -> Self {
                Self(self.0.max(other.0))
            }

            pub fn clamp(self, min: Self, max: Self) -> Self {
                Self(self.0.clamp(min.0, max.0))
            }

            pub fn abs(self) -> Self {
                Self(self.0.abs())
            }

            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }
        }
    };
}

Quantity!(Length);
pub const METRES: Length = Length::from_metres(1.0);
pub const KM: Length = Length::from_metres(1000.0);
impl Length {
    pub const fn from_metres(n: f64) -> Self {
        Length(n)
    }

    pub fn metres(self) -> f64 {
        self.0
    }

    pub fn km(self) -> f64 {
        self.0 / 1000.0
    }
}

Quantity!(Frequency);
impl Frequency {
    #[allow(non_snake_case)]
    pub const fn from_MHz(n: f64) -> Self {
        Frequency(n)
    }

    #[allow(non_snake_case)]
    pub const fn from_GHz(n: f64) -> Self {
        Frequency(n * 1000.0)
    }

    #[allow(non_snake_case)]
    pub fn MHz(self) -> f64 {
        self.0
    }
}

// Relative gain or loss in dB.
Quantity!(Db);
impl Db {
    pub const ZERO: Db = Db(0.0);

    pub const fn from_db(n: f64) -> Self {
        Db(n)
    }

    pub fn db(self) -> f64 {
        self.0
    }
}

// Absolute power. Stored directly as dBm, with no dBW offset, so
// `power + gain - loss` is the same float expression as the untyped one.
Quantity!(Dbm);
impl Dbm {
    pub const fn from_dbm(n: f64) -> Self {
        Dbm(n)
    }

    pub fn dbm(self) -> f64 {
        self.0
    }
}

impl Add<Db> for Dbm {
    type Output = Dbm;

    fn add(self, rhs: Db) -> Self::Output {
        Dbm(self.0 + rhs.0)
    }
}

impl Sub<Db> for Dbm {
    type Output = Dbm;

    fn sub(self, rhs: Db) -> Self::Output {
        Dbm(self.0 - rhs.0)
    }
}
