// Vector - immutable numeric sequence used as independent data
//
// A vector is either an explicit list of values (e.g. timestamps or FFT bin
// frequencies) or a regular sequence described by origin, delta and length.
// Regular vectors are expanded lazily and the expansion is memoized.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

#[derive(Clone)]
enum Repr {
    Explicit(Arc<[f64]>),
    Regular {
        origin: f64,
        delta: f64,
        len: usize,
        expanded: Arc<OnceCell<Arc<[f64]>>>,
    },
}

/// Immutable numeric sequence
#[derive(Clone)]
pub struct Vector {
    repr: Repr,
}

impl Vector {
    pub fn explicit(values: Vec<f64>) -> Self {
        Self {
            repr: Repr::Explicit(values.into()),
        }
    }

    /// `origin, origin + delta, origin + 2*delta, ...` with `len` entries
    pub fn regular(origin: f64, delta: f64, len: usize) -> Self {
        Self {
            repr: Repr::Regular {
                origin,
                delta,
                len,
                expanded: Arc::new(OnceCell::new()),
            },
        }
    }

    pub fn len(&self) -> usize {
        match &self.repr {
            Repr::Explicit(values) => values.len(),
            Repr::Regular { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_regular(&self) -> bool {
        matches!(self.repr, Repr::Regular { .. })
    }

    pub fn origin(&self) -> Option<f64> {
        match &self.repr {
            Repr::Regular { origin, .. } => Some(*origin),
            Repr::Explicit(_) => None,
        }
    }

    pub fn delta(&self) -> Option<f64> {
        match &self.repr {
            Repr::Regular { delta, .. } => Some(*delta),
            Repr::Explicit(_) => None,
        }
    }

    /// All values; regular vectors are expanded on first access.
    pub fn values(&self) -> &[f64] {
        match &self.repr {
            Repr::Explicit(values) => &values[..],
            Repr::Regular {
                origin,
                delta,
                len,
                expanded,
            } => {
                let expanded = expanded.get_or_init(|| {
                    (0..*len)
                        .map(|i| origin + delta * i as f64)
                        .collect::<Vec<_>>()
                        .into()
                });
                &expanded[..]
            }
        }
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        if index >= self.len() {
            return None;
        }
        match &self.repr {
            Repr::Explicit(values) => Some(values[index]),
            Repr::Regular { origin, delta, .. } => Some(origin + delta * index as f64),
        }
    }

    /// Sub-range `[start, end)`; `None` when the range is inverted or too long.
    pub fn slice(&self, start: usize, end: usize) -> Option<Vector> {
        if start > end || end > self.len() {
            return None;
        }
        let sliced = match &self.repr {
            Repr::Explicit(values) => Vector::explicit(values[start..end].to_vec()),
            Repr::Regular { origin, delta, .. } => {
                Vector::regular(origin + delta * start as f64, *delta, end - start)
            }
        };
        Some(sliced)
    }
}

impl PartialEq for Vector {
    fn eq(&self, other: &Self) -> bool {
        match (&self.repr, &other.repr) {
            (
                Repr::Regular {
                    origin: o1,
                    delta: d1,
                    len: l1,
                    ..
                },
                Repr::Regular {
                    origin: o2,
                    delta: d2,
                    len: l2,
                    ..
                },
            ) => o1 == o2 && d1 == d2 && l1 == l2,
            _ => self.values() == other.values(),
        }
    }
}

impl fmt::Debug for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Explicit(values) => f.debug_tuple("Vector::Explicit").field(&values.len()).finish(),
            Repr::Regular {
                origin, delta, len, ..
            } => f
                .debug_struct("Vector::Regular")
                .field("origin", origin)
                .field("delta", delta)
                .field("len", len)
                .finish(),
        }
    }
}

impl From<Vec<f64>> for Vector {
    fn from(values: Vec<f64>) -> Self {
        Vector::explicit(values)
    }
}
