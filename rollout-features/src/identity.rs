//! Identity contract for users evaluated against features.

use std::borrow::Cow;

/// Anything that can be targeted by a feature.
///
/// The identifier is compared byte-for-byte as a string, so the user `42`
/// and the user `"42"` are the same user. It also feeds the percentage
/// hash, which means it must be stable across processes and restarts.
pub trait RolloutUser: Send + Sync {
    /// Stable identifier of this user.
    fn rollout_identifier(&self) -> Cow<'_, str>;
}

impl RolloutUser for str {
    fn rollout_identifier(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl RolloutUser for String {
    fn rollout_identifier(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}

impl<T: RolloutUser + ?Sized> RolloutUser for &T {
    fn rollout_identifier(&self) -> Cow<'_, str> {
        (**self).rollout_identifier()
    }
}

macro_rules! impl_integer_user {
    ($($ty:ty),* $(,)?) => {
        $(
            impl RolloutUser for $ty {
                fn rollout_identifier(&self) -> Cow<'_, str> {
                    Cow::Owned(self.to_string())
                }
            }
        )*
    };
}

impl_integer_user!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize);
