//! Strict identity used by `to_be`
//!
//! Primitives compare by value, shared pointers by address. Types that have
//! no meaningful identity (vectors, maps, plain structs) do not implement
//! [`Identical`] and must be compared with `to_equal` instead.

use std::rc::Rc;
use std::sync::Arc;

/// Strict identity comparison, without any conversion between types
pub trait Identical {
    fn is_identical(&self, other: &Self) -> bool;
}

macro_rules! identical_by_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Identical for $ty {
                fn is_identical(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

// Floats keep IEEE semantics: NaN is never identical, 0.0 and -0.0 are.
identical_by_value!(
    bool, char, (), i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
    String,
);

impl Identical for &str {
    fn is_identical(&self, other: &Self) -> bool {
        self == other
    }
}

impl<T: Identical> Identical for Option<T> {
    fn is_identical(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.is_identical(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: ?Sized> Identical for Rc<T> {
    fn is_identical(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }
}

impl<T: ?Sized> Identical for Arc<T> {
    fn is_identical(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}
