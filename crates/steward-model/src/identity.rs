//! Equality and hashing by primary-key columns.

use std::hash::{Hash, Hasher};

use crate::column::Model;

/// Returns `true` when `a` and `b` hold equal values in every identity column.
///
/// Non-identity columns are ignored. A model without identity columns treats
/// all of its instances as equal. Values are compared with
/// [`crate::Value::is_identical`], so a NaN key still equals itself.
pub fn identity_eq<M: Model>(a: &M, b: &M) -> bool {
    M::table()
        .identity_columns()
        .all(|col| match (a.value(col.name), b.value(col.name)) {
            (Some(x), Some(y)) => x.is_identical(&y),
            (None, None) => true,
            _ => false,
        })
}

/// Feeds the identity-column values of `m` into `state`, in column order.
pub fn identity_hash<M: Model, H: Hasher>(m: &M, state: &mut H) {
    for col in M::table().identity_columns() {
        m.value(col.name).hash(state);
    }
}

/// Implements `PartialEq`, `Eq` and `Hash` for model types by identity columns.
///
/// ```rust,ignore
/// steward_model::identity_eq!(User, Membership);
/// ```
///
/// The hash is only stable while identity values are not mutated.
#[macro_export]
macro_rules! identity_eq {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl ::core::cmp::PartialEq for $ty {
                fn eq(&self, other: &Self) -> bool {
                    $crate::identity_eq(self, other)
                }
            }

            impl ::core::cmp::Eq for $ty {}

            impl ::core::hash::Hash for $ty {
                fn hash<H: ::core::hash::Hasher>(&self, state: &mut H) {
                    $crate::identity_hash(self, state)
                }
            }
        )+
    };
}
