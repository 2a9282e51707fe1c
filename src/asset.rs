use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{collections::HashSet, fmt, sync::Mutex};

/// A currency code such as `BTC` or `USDT`.
///
/// Codes are interned, which keeps `Asset` (and every symbol built from it)
/// `Copy`. Codes are stored upper case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Asset(&'static str);

impl Asset {
    // Leaks one allocation per distinct code, never more.
    pub fn new<R: AsRef<str>>(code: R) -> Self {
        static CODES: Lazy<Mutex<HashSet<&'static str>>> =
            Lazy::new(|| Mutex::new(HashSet::new()));

        let code = code.as_ref().trim().to_ascii_uppercase();
        let mut codes = CODES.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match codes.get(code.as_str()) {
            Some(interned) => Asset(interned),
            None => {
                let leaked: &'static str = Box::leak(code.into_boxed_str());
                codes.insert(leaked);
                Asset(leaked)
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl Serialize for Asset {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0)
    }
}

impl<'de> Deserialize<'de> for Asset {
    #[inline]
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Asset::new)
    }
}
