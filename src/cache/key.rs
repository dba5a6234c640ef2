// Cache keys - ordered tuples of value-compared key parts

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::identity::InstanceId;
use crate::window::PadType;

/// One component of a cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPart {
    Instance(InstanceId),
    Int(i64),
    /// IEEE bits of a float, with -0.0 folded into 0.0
    Float(u64),
    Pad(PadType),
    /// Hash of an extractor/processor configuration
    Signature(u64),
    Text(String),
}

impl KeyPart {
    pub fn float(value: f64) -> Self {
        let value = if value == 0.0 { 0.0 } else { value };
        KeyPart::Float(value.to_bits())
    }
}

impl From<InstanceId> for KeyPart {
    fn from(id: InstanceId) -> Self {
        KeyPart::Instance(id)
    }
}

impl From<i64> for KeyPart {
    fn from(value: i64) -> Self {
        KeyPart::Int(value)
    }
}

impl From<usize> for KeyPart {
    fn from(value: usize) -> Self {
        KeyPart::Int(value as i64)
    }
}

impl From<f64> for KeyPart {
    fn from(value: f64) -> Self {
        KeyPart::float(value)
    }
}

impl From<PadType> for KeyPart {
    fn from(pad: PadType) -> Self {
        KeyPart::Pad(pad)
    }
}

impl From<&str> for KeyPart {
    fn from(text: &str) -> Self {
        KeyPart::Text(text.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(text: String) -> Self {
        KeyPart::Text(text)
    }
}

/// Ordered tuple of key parts; equal tuples address the same entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(Vec<KeyPart>);

impl CacheKey {
    pub fn new(parts: Vec<KeyPart>) -> Self {
        CacheKey(parts)
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    pub(crate) fn hash_value(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match part {
                KeyPart::Instance(id) => write!(f, "{}", id)?,
                KeyPart::Int(v) => write!(f, "{}", v)?,
                KeyPart::Float(bits) => write!(f, "{}", f64::from_bits(*bits))?,
                KeyPart::Pad(pad) => write!(f, "{:?}", pad)?,
                KeyPart::Signature(sig) => write!(f, "sig:{:016x}", sig)?,
                KeyPart::Text(text) => write!(f, "{:?}", text)?,
            }
        }
        write!(f, ")")
    }
}

/// Build a [`CacheKey`] from values convertible into [`KeyPart`]s.
///
/// ```
/// use signal_windows::cache_key;
/// use signal_windows::identity::InstanceId;
///
/// let id = InstanceId::next();
/// let key = cache_key!(id, 0usize, 50usize);
/// assert_eq!(key.parts().len(), 3);
/// ```
#[macro_export]
macro_rules! cache_key {
    ($($part:expr),+ $(,)?) => {
        $crate::cache::CacheKey::new(vec![$($crate::cache::KeyPart::from($part)),+])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_tuples_are_equal_keys() {
        let id = InstanceId::next();
        assert_eq!(cache_key!(id, 1usize, 2usize), cache_key!(id, 1usize, 2usize));
        assert_ne!(cache_key!(id, 1usize, 2usize), cache_key!(id, 2usize, 1usize));
        assert_ne!(
            cache_key!(id, 1usize, 2usize),
            cache_key!(InstanceId::next(), 1usize, 2usize)
        );
    }

    #[test]
    fn test_float_and_pad_shape() {
        let id = InstanceId::next();
        let a = cache_key!(id, 2000.0, PadType::ZeroPad);
        let b = cache_key!(id, 2000.0, PadType::DuplicatePad);
        assert_ne!(a, b);
        assert_eq!(a, cache_key!(id, 2000.0, PadType::ZeroPad));
    }

    #[test]
    fn test_negative_zero_folds() {
        assert_eq!(KeyPart::float(-0.0), KeyPart::float(0.0));
    }

    #[test]
    fn test_int_and_float_parts_differ() {
        assert_ne!(KeyPart::from(1usize), KeyPart::from(1.0));
    }

    #[test]
    fn test_display() {
        let key = CacheKey::new(vec![KeyPart::Int(3), KeyPart::Text("x".into())]);
        assert_eq!(key.to_string(), "(3, \"x\")");
    }
}
