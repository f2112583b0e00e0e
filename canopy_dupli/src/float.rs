// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scalar float functions that `core` lacks, from `std` or `libm`.

macro_rules! unary {
    ($($name:ident => $libm:ident),* $(,)?) => {
        $(
            #[cfg(feature = "std")]
            #[inline]
            pub(crate) fn $name(x: f32) -> f32 {
                f32::$name(x)
            }

            #[cfg(not(feature = "std"))]
            #[inline]
            pub(crate) fn $name(x: f32) -> f32 {
                libm::$libm(x)
            }
        )*
    };
}

unary! {
    abs => fabsf,
    acos => acosf,
    cos => cosf,
    sin => sinf,
    sqrt => sqrtf,
}

#[cfg(feature = "std")]
#[inline]
pub(crate) fn atan2(y: f32, x: f32) -> f32 {
    y.atan2(x)
}

#[cfg(not(feature = "std"))]
#[inline]
pub(crate) fn atan2(y: f32, x: f32) -> f32 {
    libm::atan2f(y, x)
}
