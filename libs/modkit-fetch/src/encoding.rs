//! URL, query-string and credential encoding helpers used by [`HttpRequest`].
//!
//! [`HttpRequest`]: crate::HttpRequest

use base64::{Engine as _, engine::general_purpose};
use std::fmt;
use url::form_urlencoded;

/// Append `path` to `url` with exactly one `/` between them.
///
/// A trailing slash on `url` and a leading slash on `path` are coalesced; a
/// separator is inserted when neither side has one.
#[must_use]
pub fn concat_path(url: &str, path: &str) -> String {
    match (url.ends_with('/'), path.strip_prefix('/')) {
        (true, Some(rest)) => format!("{url}{rest}"),
        (true, None) | (false, Some(_)) => format!("{url}{path}"),
        (false, None) => format!("{url}/{path}"),
    }
}

/// `Basic` credentials for the `Authorization` header.
#[must_use]
pub fn basic_credentials(username: &str, password: &str) -> String {
    let encoded = general_purpose::STANDARD.encode(format!("{username}:{password}"));
    format!("Basic {encoded}")
}

/// Values accepted by [`HttpRequest::param`].
///
/// A single string sets one value, a sequence sets a repeated parameter in
/// the given order, and `None` removes the key.
///
/// [`HttpRequest::param`]: crate::HttpRequest::param
pub trait IntoParamValues {
    /// `None` clears the parameter; `Some` replaces all of its values.
    fn into_param_values(self) -> Option<Vec<String>>;
}

impl IntoParamValues for &str {
    fn into_param_values(self) -> Option<Vec<String>> {
        Some(vec![self.to_owned()])
    }
}

impl IntoParamValues for String {
    fn into_param_values(self) -> Option<Vec<String>> {
        Some(vec![self])
    }
}

impl IntoParamValues for &String {
    fn into_param_values(self) -> Option<Vec<String>> {
        Some(vec![self.clone()])
    }
}

impl IntoParamValues for Vec<String> {
    fn into_param_values(self) -> Option<Vec<String>> {
        Some(self)
    }
}

impl IntoParamValues for Vec<&str> {
    fn into_param_values(self) -> Option<Vec<String>> {
        Some(self.into_iter().map(str::to_owned).collect())
    }
}

impl IntoParamValues for &[&str] {
    fn into_param_values(self) -> Option<Vec<String>> {
        Some(self.iter().map(|v| (*v).to_owned()).collect())
    }
}

impl<const N: usize> IntoParamValues for [&str; N] {
    fn into_param_values(self) -> Option<Vec<String>> {
        Some(self.iter().map(|v| (*v).to_owned()).collect())
    }
}

impl<T: IntoParamValues> IntoParamValues for Option<T> {
    fn into_param_values(self) -> Option<Vec<String>> {
        self.and_then(IntoParamValues::into_param_values)
    }
}

/// Flattened, ordered parameter pairs of a request.
///
/// Each key appears once per value. `Display` renders the
/// `application/x-www-form-urlencoded` serialization (space as `+`, reserved
/// characters percent-escaped), usable both as a query string and as a form
/// body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchParams {
    pairs: Vec<(String, String)>,
}

impl SearchParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one `key=value` pair after the existing ones.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    #[must_use]
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// First value recorded for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All values recorded for `key`, in order.
    #[must_use]
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

impl fmt::Display for SearchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.pairs)
            .finish();
        f.write_str(&encoded)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SearchParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
