use crate::base::fetcherror::FetchError;
use http::HeaderValue;
use std::collections::{BTreeMap, HashMap};
use std::iter::FusedIterator;

/// Validate a header name against the token grammar and lowercase it.
pub fn normalize_name(name: &str) -> Result<String, FetchError> {
    if name.is_empty() || !name.bytes().all(is_token_byte) {
        return Err(FetchError::InvalidHeaderName {
            name: name.to_string(),
        });
    }
    Ok(name.to_ascii_lowercase())
}

/// Validate a header value. Values are stored as given.
pub fn normalize_value(name: &str, value: &str) -> Result<String, FetchError> {
    HeaderValue::from_str(value).map_err(|_| FetchError::InvalidHeaderValue {
        name: name.to_string(),
    })?;
    Ok(value.to_string())
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"-#$%&'*+.^_`|~".contains(&b)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    /// Normalized lowercase key.
    key: String,
    /// Casing last supplied by the caller, used on the wire.
    name: String,
    value: String,
}

/// Case-insensitive header multi-map.
///
/// Entries keep the insertion order of their first-seen key. Repeated
/// `append` calls join values with `,`. The original casing of each name is
/// remembered so headers can be replayed onto a transport unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<Entry>,
}

impl Headers {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Build headers from any supported initializer.
    pub fn from_init(init: impl Into<HeadersInit>) -> Result<Self, FetchError> {
        let mut headers = Headers::new();

        match init.into() {
            HeadersInit::Headers(source) => {
                for entry in source.entries {
                    headers.append(&entry.name, &entry.value)?;
                }
            }
            HeadersInit::Sequence(pairs) => {
                for pair in pairs {
                    if pair.len() < 2 {
                        return Err(FetchError::InvalidHeaderValue {
                            name: pair.first().cloned().unwrap_or_default(),
                        });
                    }
                    headers.append(&pair[0], &pair[1])?;
                }
            }
            HeadersInit::Record(pairs) => {
                for (name, value) in pairs {
                    headers.append(&name, &value)?;
                }
            }
        }

        Ok(headers)
    }

    pub fn append(&mut self, name: &str, value: &str) -> Result<(), FetchError> {
        let key = normalize_name(name)?;
        let value = normalize_value(name, value)?;

        if let Some(entry) = self.entries.iter_mut().find(|e| e.key == key) {
            entry.name = name.to_string();
            if entry.value.is_empty() {
                entry.value = value;
            } else {
                entry.value.push(',');
                entry.value.push_str(&value);
            }
        } else {
            self.entries.push(Entry {
                key,
                name: name.to_string(),
                value,
            });
        }
        Ok(())
    }

    /// Overwrite any existing value. Position of an existing key is kept.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), FetchError> {
        let key = normalize_name(name)?;
        let value = normalize_value(name, value)?;

        if let Some(entry) = self.entries.iter_mut().find(|e| e.key == key) {
            entry.name = name.to_string();
            entry.value = value;
        } else {
            self.entries.push(Entry {
                key,
                name: name.to_string(),
                value,
            });
        }
        Ok(())
    }

    /// Remove a header. Absent or invalid names are a no-op.
    pub fn delete(&mut self, name: &str) {
        if let Ok(key) = normalize_name(name) {
            self.entries.retain(|e| e.key != key);
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let key = normalize_name(name).ok()?;
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Calls `f(value, name)` for every entry, name lowercased.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&str, &str),
    {
        for entry in &self.entries {
            f(&entry.value, &entry.key);
        }
    }

    pub fn keys(&self) -> HeadersIter<String> {
        HeadersIter::new(self.entries.iter().map(|e| e.key.clone()).collect())
    }

    pub fn values(&self) -> HeadersIter<String> {
        HeadersIter::new(self.entries.iter().map(|e| e.value.clone()).collect())
    }

    pub fn entries(&self) -> HeadersIter<(String, String)> {
        HeadersIter::new(
            self.entries
                .iter()
                .map(|e| (e.key.clone(), e.value.clone()))
                .collect(),
        )
    }

    /// Entries with the caller's original name casing, for the wire.
    pub fn wire_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|e| (e.name.as_str(), e.value.as_str()))
    }

    /// The original casing recorded for `name`.
    pub fn original_name(&self, name: &str) -> Option<&str> {
        let key = normalize_name(name).ok()?;
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Single-pass iterator over a snapshot of header entries.
///
/// Taken at call time; later mutation of the `Headers` is not observed and
/// once exhausted it keeps returning `None`.
#[derive(Debug, Clone)]
pub struct HeadersIter<T> {
    items: std::vec::IntoIter<T>,
}

impl<T> HeadersIter<T> {
    fn new(items: Vec<T>) -> Self {
        Self {
            items: items.into_iter(),
        }
    }
}

impl<T> Iterator for HeadersIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.items.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

impl<T> ExactSizeIterator for HeadersIter<T> {}

impl<T> FusedIterator for HeadersIter<T> {}

/// The shapes a `Headers` can be built from.
#[derive(Debug, Clone)]
pub enum HeadersInit {
    /// Copy of another `Headers`.
    Headers(Headers),
    /// Sequence of `[name, value]` pairs; shorter pairs are rejected.
    Sequence(Vec<Vec<String>>),
    /// Plain name to value mapping.
    Record(Vec<(String, String)>),
}

impl From<Headers> for HeadersInit {
    fn from(h: Headers) -> Self {
        HeadersInit::Headers(h)
    }
}

impl From<&Headers> for HeadersInit {
    fn from(h: &Headers) -> Self {
        HeadersInit::Headers(h.clone())
    }
}

impl From<Vec<Vec<String>>> for HeadersInit {
    fn from(v: Vec<Vec<String>>) -> Self {
        HeadersInit::Sequence(v)
    }
}

impl<K, V> From<Vec<(K, V)>> for HeadersInit
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(v: Vec<(K, V)>) -> Self {
        HeadersInit::Record(v.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for HeadersInit
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(v: [(K, V); N]) -> Self {
        HeadersInit::Record(v.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K, V> From<BTreeMap<K, V>> for HeadersInit
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(m: BTreeMap<K, V>) -> Self {
        HeadersInit::Record(m.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K, V> From<HashMap<K, V>> for HeadersInit
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(m: HashMap<K, V>) -> Self {
        HeadersInit::Record(m.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl TryFrom<HeadersInit> for Headers {
    type Error = FetchError;

    fn try_from(init: HeadersInit) -> Result<Self, Self::Error> {
        Headers::from_init(init)
    }
}
