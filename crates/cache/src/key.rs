//! Key coercion.
//!
//! Every key is turned into its string form before it touches storage, so
//! `4` and `"4"` address the same entry. A key that is "missing" (empty
//! string, numeric zero, `false`, `None`) is rejected before coercion;
//! the string `"0"` is a perfectly good key while the integer `0` is not.
//! Floats at or above `1e21` or below `1e-6` in magnitude use exponent form
//! (`1e+21`, `1.5e-7`) and infinities read `Infinity` / `-Infinity`.

use std::fmt::Display;

/// String-conversion capability required of cache keys.
pub trait CacheKey {
    /// The storage key, or `None` when the key counts as missing.
    fn cache_key(&self) -> Option<String>;
}

impl CacheKey for str {
    fn cache_key(&self) -> Option<String> {
        if self.is_empty() { None } else { Some(self.to_owned()) }
    }
}

impl CacheKey for String {
    fn cache_key(&self) -> Option<String> {
        self.as_str().cache_key()
    }
}

impl<K: CacheKey + ?Sized> CacheKey for &K {
    fn cache_key(&self) -> Option<String> {
        (**self).cache_key()
    }
}

impl<K: CacheKey> CacheKey for Option<K> {
    fn cache_key(&self) -> Option<String> {
        self.as_ref().and_then(CacheKey::cache_key)
    }
}

macro_rules! int_keys {
    ($($t:ty),*) => {$(
        impl CacheKey for $t {
            fn cache_key(&self) -> Option<String> {
                if *self == 0 { None } else { Some(self.to_string()) }
            }
        }
    )*};
}

int_keys!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

macro_rules! float_keys {
    ($($t:ty),*) => {$(
        impl CacheKey for $t {
            fn cache_key(&self) -> Option<String> {
                if *self == 0.0 || self.is_nan() {
                    return None;
                }
                let magnitude = f64::from(self.abs());
                Some(if self.is_infinite() {
                    if *self > 0.0 { "Infinity".to_owned() } else { "-Infinity".to_owned() }
                } else if magnitude >= 1e21 || magnitude < 1e-6 {
                    exponent_form(format!("{:e}", self))
                } else {
                    self.to_string()
                })
            }
        }
    )*};
}

float_keys!(f32, f64);

/// `1e21` -> `1e+21`; negative exponents are already signed.
fn exponent_form(mut s: String) -> String {
    if let Some(at) = s.find('e') {
        if !s[at + 1..].starts_with('-') {
            s.insert(at + 1, '+');
        }
    }
    s
}

impl CacheKey for bool {
    fn cache_key(&self) -> Option<String> {
        if *self { Some("true".to_owned()) } else { None }
    }
}

impl CacheKey for char {
    fn cache_key(&self) -> Option<String> {
        Some(self.to_string())
    }
}

/// Adapter for caller types whose `Display` output is the key.
///
/// The wrapped value is never considered missing, even if it renders empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayKey<T>(pub T);

impl<T: Display> CacheKey for DisplayKey<T> {
    fn cache_key(&self) -> Option<String> {
        Some(self.0.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl Display for Named {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.0)
        }
    }

    #[test]
    fn strings_coerce_to_themselves() {
        assert_eq!("demo".cache_key().as_deref(), Some("demo"));
        assert_eq!(String::from("demo 2").cache_key().as_deref(), Some("demo 2"));
        assert_eq!("demo@3!".cache_key().as_deref(), Some("demo@3!"));
        assert_eq!("0".cache_key().as_deref(), Some("0"));
    }

    #[test]
    fn numbers_coerce_like_their_string_form() {
        assert_eq!(4i32.cache_key().as_deref(), Some("4"));
        assert_eq!(4u64.cache_key().as_deref(), Some("4"));
        assert_eq!((-7i16).cache_key().as_deref(), Some("-7"));
        assert_eq!(4.0f64.cache_key().as_deref(), Some("4"));
        assert_eq!(2.5f32.cache_key().as_deref(), Some("2.5"));
    }

    #[test]
    fn extreme_floats_use_exponent_and_infinity_forms() {
        assert_eq!(f64::INFINITY.cache_key().as_deref(), Some("Infinity"));
        assert_eq!(f64::NEG_INFINITY.cache_key().as_deref(), Some("-Infinity"));
        assert_eq!(f32::INFINITY.cache_key().as_deref(), Some("Infinity"));
        assert_eq!(1e21f64.cache_key().as_deref(), Some("1e+21"));
        assert_eq!((-2.5e22f64).cache_key().as_deref(), Some("-2.5e+22"));
        assert_eq!(1.5e-7f64.cache_key().as_deref(), Some("1.5e-7"));
        assert_eq!(1e20f64.cache_key().as_deref(), Some("100000000000000000000"));
        assert_eq!(0.000001f64.cache_key().as_deref(), Some("0.000001"));
    }

    #[test]
    fn falsy_keys_are_missing() {
        assert_eq!("".cache_key(), None);
        assert_eq!(0i32.cache_key(), None);
        assert_eq!(0usize.cache_key(), None);
        assert_eq!(0.0f64.cache_key(), None);
        assert_eq!(f64::NAN.cache_key(), None);
        assert_eq!(false.cache_key(), None);
        assert_eq!(None::<&str>.cache_key(), None);
    }

    #[test]
    fn wrappers_and_references() {
        assert_eq!(true.cache_key().as_deref(), Some("true"));
        assert_eq!('x'.cache_key().as_deref(), Some("x"));
        assert_eq!(Some("demo").cache_key().as_deref(), Some("demo"));
        assert_eq!((&&"demo").cache_key().as_deref(), Some("demo"));
        assert_eq!(DisplayKey(Named("demo4")).cache_key().as_deref(), Some("demo4"));
        assert_eq!(DisplayKey(Named("")).cache_key().as_deref(), Some(""));
    }
}
