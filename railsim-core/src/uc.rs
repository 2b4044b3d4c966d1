//! Unit constants for building quantities by multiplication, e.g. `3.0 * uc::MPS`

use crate::si;
use std::marker::PhantomData;
use uom::si::Quantity;

macro_rules! unit_const {
    ($($name:ident: $ty:ty = $value:expr;)*) => {
        $(
            pub const $name: $ty = Quantity {
                dimension: PhantomData,
                units: PhantomData,
                value: $value,
            };
        )*
    };
}

unit_const! {
    M: si::Length = 1.0;
    KM: si::Length = 1.0e3;
    MM: si::Length = 1.0e-3;
    S: si::Time = 1.0;
    MIN: si::Time = 60.0;
    HR: si::Time = 3600.0;
    MS: si::Time = 1.0e-3;
    MPS: si::Velocity = 1.0;
    KPH: si::Velocity = 1.0 / 3.6;
    MPS2: si::Acceleration = 1.0;
    N: si::Force = 1.0;
    KN: si::Force = 1.0e3;
    KG: si::Mass = 1.0;
    TONNE: si::Mass = 1.0e3;
    J: si::Energy = 1.0;
    W: si::Power = 1.0;
    M2: si::Area = 1.0;
    R: si::Ratio = 1.0;
    SPM: si::InverseVelocity = 1.0;
}

/// Standard gravitational acceleration
pub const ACC_GRAV: si::Acceleration = Quantity {
    dimension: PhantomData,
    units: PhantomData,
    value: 9.81,
};

/// Air density at sea level and 15 °C
pub fn rho_air() -> si::MassDensity {
    1.225 * KG / (M * M * M)
}
