/// Decode one form/query component: `+` is a space, then percent-decoding.
fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => String::from_utf8_lossy(&urlencoding::decode_binary(spaced.as_bytes()))
            .into_owned(),
    }
}

/// Parse URL-encoded form data into ordered key-value pairs.
///
/// Repeated keys are kept in order. Pairs with an empty value are dropped,
/// as are fragments without an `=`.
pub fn parse_qsl(data: &str) -> Vec<(String, String)> {
    data.split('&')
        .filter_map(|pair| pair.split_once('='))
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| (decode_component(key), decode_component(value)))
        .collect()
}

/// Parse URL-encoded form data into pairs sorted by key, then value.
///
/// Two bodies carrying the same pairs in a different order parse to equal vectors.
pub fn parse_form_data(data: &str) -> Vec<(String, String)> {
    let mut pairs = parse_qsl(data);
    pairs.sort();
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_qsl_keeps_order_and_repeats() {
        let pairs = parse_qsl("b=2&a=1&b=3");
        assert_eq!(
            pairs,
            vec![
                ("b".to_string(), "2".to_string()),
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_qsl_decodes_components() {
        let pairs = parse_qsl("full+name=Jane%20Doe&city=S%C3%A3o+Paulo");
        assert_eq!(pairs[0], ("full name".to_string(), "Jane Doe".to_string()));
        assert_eq!(pairs[1], ("city".to_string(), "São Paulo".to_string()));
    }

    #[test]
    fn test_parse_qsl_drops_blank_values() {
        assert!(parse_qsl("empty=&flag").is_empty());
        assert!(parse_qsl("").is_empty());
    }

    #[test]
    fn test_parse_form_data_is_order_independent() {
        assert_eq!(parse_form_data("a=1&b=2"), parse_form_data("b=2&a=1"));
        assert_ne!(parse_form_data("a=1&b=2"), parse_form_data("a=1"));
    }
}
