use std::collections::HashMap;

/// Parse a raw query string into a key/value map.
///
/// Pairs split on `&`, then on the first `=`. Keys and values are
/// form-decoded, so an encoded `&` or `=` stays inside its value. A key
/// without `=` maps to an empty string, and a repeated key keeps its last value.
pub fn context_params(query: Option<&str>) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let Some(query) = query else {
        return params;
    };

    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode(key);
        if key.is_empty() {
            continue;
        }
        params.insert(key, decode(value));
    }
    params
}

fn decode(raw: &str) -> String {
    url::form_urlencoded::parse(format!("x={}", raw).as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_pairs() {
        let params = context_params(Some("page=2&limit=20"));
        assert_eq!(params["page"], "2");
        assert_eq!(params["limit"], "20");
    }

    #[test]
    fn last_value_wins() {
        let params = context_params(Some("sort=name&sort=rent%20desc"));
        assert_eq!(params["sort"], "rent desc");
    }

    #[test]
    fn missing_equals_maps_to_empty() {
        let params = context_params(Some("verified&page=1"));
        assert_eq!(params["verified"], "");
        assert_eq!(params["page"], "1");
    }

    #[test]
    fn decodes_encoded_separators() {
        let params = context_params(Some("q=a%26b%3Dc&name=Block+A"));
        assert_eq!(params["q"], "a&b=c");
        assert_eq!(params["name"], "Block A");
    }

    #[test]
    fn value_may_contain_equals() {
        let params = context_params(Some("expr=a=b"));
        assert_eq!(params["expr"], "a=b");
    }

    #[test]
    fn empty_input() {
        assert!(context_params(None).is_empty());
        assert!(context_params(Some("")).is_empty());
        assert!(context_params(Some("&&=x")).is_empty());
    }
}
