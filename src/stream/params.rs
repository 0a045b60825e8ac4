//! Query parameters forwarded to the stream endpoint.

use std::collections::BTreeMap;

use url::Url;

/// Multi-valued query parameters, kept in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParameters {
    values: BTreeMap<String, Vec<String>>,
}

impl QueryParameters {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a query string such as `tweet.fields=created_at&expansions=author_id`.
    ///
    /// Repeated keys accumulate values in order. Pairs with an empty value are
    /// dropped. A leading `?` is accepted.
    #[must_use]
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut parameters = Self::new();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if value.is_empty() {
                continue;
            }
            parameters.insert(key.into_owned(), value.into_owned());
        }
        parameters
    }

    /// Adds one value for `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.entry(key.into()).or_default().push(value.into());
    }

    /// Returns the values for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.values.get(key).map(Vec::as_slice)
    }

    /// Returns `true` if no parameters are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over every `(key, value)` pair.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .flat_map(|(key, values)| values.iter().map(move |v| (key.as_str(), v.as_str())))
    }

    /// Appends the parameters to `url`'s query string.
    pub(crate) fn apply_to(&self, url: &mut Url) {
        if self.is_empty() {
            return;
        }
        let mut query = url.query_pairs_mut();
        for (key, value) in self.pairs() {
            query.append_pair(key, value);
        }
    }
}

impl<K, V> FromIterator<(K, V)> for QueryParameters
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut parameters = Self::new();
        for (key, value) in iter {
            parameters.insert(key, value);
        }
        parameters
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_values() {
        let params = QueryParameters::parse("tweet.fields=created_at&expansions=author_id");
        assert_eq!(params.get("tweet.fields").unwrap(), ["created_at"]);
        assert_eq!(params.get("expansions").unwrap(), ["author_id"]);
    }

    #[test]
    fn test_parse_repeated_keys_accumulate() {
        let params = QueryParameters::parse("a=1&b=2&a=3");
        assert_eq!(params.get("a").unwrap(), ["1", "3"]);
    }

    #[test]
    fn test_parse_decodes_and_drops_blank_values() {
        let params = QueryParameters::parse("?fields=id%2Ctext&empty=&flag");
        assert_eq!(params.get("fields").unwrap(), ["id,text"]);
        assert!(params.get("empty").is_none());
        assert!(params.get("flag").is_none());
    }

    #[test]
    fn test_parse_empty_string() {
        assert!(QueryParameters::parse("").is_empty());
    }

    #[test]
    fn test_apply_to_appends_encoded_pairs() {
        let params: QueryParameters = [("tweet.fields", "id,text"), ("b", "x y")].into_iter().collect();
        let mut url = Url::parse("https://api.example.com/stream").unwrap();
        params.apply_to(&mut url);
        assert_eq!(
            url.as_str(),
            "https://api.example.com/stream?b=x+y&tweet.fields=id%2Ctext"
        );
    }

    #[test]
    fn test_apply_to_empty_leaves_url_untouched() {
        let mut url = Url::parse("https://api.example.com/stream").unwrap();
        QueryParameters::new().apply_to(&mut url);
        assert_eq!(url.as_str(), "https://api.example.com/stream");
    }
}
