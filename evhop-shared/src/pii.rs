use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wraps a guest's phone number or e-mail so log macros only ever see the tail.
///
/// Serialization is transparent: API payloads and backend requests still need the real value.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Masked<T>(pub T);

const VISIBLE_TAIL: usize = 3;

fn mask(raw: &str) -> String {
    let count = raw.chars().count();
    if count <= VISIBLE_TAIL {
        return "*".repeat(count);
    }
    let tail: String = raw.chars().skip(count - VISIBLE_TAIL).collect();
    format!("{}{}", "*".repeat(count - VISIBLE_TAIL), tail)
}

impl<T: fmt::Display> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Masked({})", mask(&self.0.to_string()))
    }
}

impl<T: fmt::Display> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&mask(&self.0.to_string()))
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}
