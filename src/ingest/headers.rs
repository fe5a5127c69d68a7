//! Header capture for stored events.

use std::collections::BTreeMap;

use axum::http::HeaderMap;

/// Flatten request headers into a name → value map.
///
/// Names are kept as the HTTP stack delivers them. Values that are not
/// valid UTF-8 are decoded lossily rather than dropped. When a header
/// repeats, the last occurrence wins.
pub fn capture_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut captured = BTreeMap::new();
    for (name, value) in headers {
        captured.insert(
            name.as_str().to_string(),
            String::from_utf8_lossy(value.as_bytes()).into_owned(),
        );
    }
    captured
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn captures_all_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json".parse().unwrap());
        headers.insert("x-github-event", "push".parse().unwrap());

        let captured = capture_headers(&headers);

        assert_eq!(captured.len(), 2);
        assert_eq!(captured["content-type"], "application/json");
        assert_eq!(captured["x-github-event"], "push");
    }

    #[test]
    fn last_repeated_value_wins() {
        let mut headers = HeaderMap::new();
        headers.append("x-forwarded-for", "10.0.0.1".parse().unwrap());
        headers.append("x-forwarded-for", "10.0.0.2".parse().unwrap());

        let captured = capture_headers(&headers);

        assert_eq!(captured["x-forwarded-for"], "10.0.0.2");
    }

    #[test]
    fn non_utf8_values_are_kept_lossily() {
        let mut headers = HeaderMap::new();
        headers.insert("x-bin", HeaderValue::from_bytes(b"ab\xffcd").unwrap());

        let captured = capture_headers(&headers);

        assert_eq!(captured["x-bin"], "ab\u{fffd}cd");
    }
}
