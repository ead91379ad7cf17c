use crate::form_data::parse_qsl;
use crate::serializable::ParamValue;
use std::collections::HashMap;

/// True when the string carries characters outside of ASCII
pub fn has_unicode(s: &str) -> bool {
    !s.is_ascii()
}

/// Split `scheme://netloc/rest` into its three parts.
///
/// Strings without a scheme separator come back with an empty scheme and netloc.
fn split_authority(url: &str) -> (&str, &str, &str) {
    match url.find("://") {
        Some(scheme_end) => {
            let after_scheme = &url[scheme_end + 3..];
            let netloc_len = after_scheme
                .find(['/', '?', '#'])
                .unwrap_or(after_scheme.len());
            (
                &url[..scheme_end + 3],
                &after_scheme[..netloc_len],
                &after_scheme[netloc_len..],
            )
        }
        None => ("", "", url),
    }
}

/// Normalize a URL containing non-ASCII characters.
///
/// Host labels are converted to punycode, every other non-ASCII character is
/// percent-encoded. ASCII-only URLs are returned unchanged.
pub fn clean_unicode(url: &str) -> String {
    if !has_unicode(url) {
        return url.to_string();
    }

    let (scheme, netloc, rest) = split_authority(url);

    let netloc = if has_unicode(netloc) {
        let (userinfo, hostport) = match netloc.rsplit_once('@') {
            Some((userinfo, hostport)) => (Some(userinfo), hostport),
            None => (None, netloc),
        };
        let (host, port) = match hostport.rsplit_once(':') {
            Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => (host, Some(port)),
            _ => (hostport, None),
        };

        let labels: Vec<String> = host
            .split('.')
            .map(|label| {
                if has_unicode(label) {
                    let ascii = url::quirks::domain_to_ascii(label);
                    if ascii.is_empty() {
                        label.to_string()
                    } else {
                        ascii
                    }
                } else {
                    label.to_string()
                }
            })
            .collect();

        let mut cleaned = String::new();
        if let Some(userinfo) = userinfo {
            cleaned.push_str(userinfo);
            cleaned.push('@');
        }
        cleaned.push_str(&labels.join("."));
        if let Some(port) = port {
            cleaned.push(':');
            cleaned.push_str(port);
        }
        cleaned
    } else {
        netloc.to_string()
    };

    let mut out = String::with_capacity(url.len() * 2);
    for c in scheme.chars().chain(netloc.chars()).chain(rest.chars()) {
        if c.is_ascii() {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            out.push_str(&urlencoding::encode(c.encode_utf8(&mut buf)));
        }
    }
    out
}

/// Give a URL the path `/` when it has none, e.g. `http://example.com`.
pub fn ensure_default_path(url: &str) -> String {
    let (scheme, netloc, rest) = split_authority(url);
    if scheme.is_empty() || rest.starts_with('/') {
        return url.to_string();
    }
    format!("{scheme}{netloc}/{rest}")
}

/// The URL a logged request is compared against in `assert_call_count`.
pub fn comparison_url(url: &str) -> String {
    let cleaned = clean_unicode(&ensure_default_path(url));
    match url::Url::parse(&cleaned) {
        Ok(parsed) => parsed.to_string(),
        Err(_) => cleaned,
    }
}

/// The query string of a URL, without the leading `?` and any fragment.
pub fn query_of(url: &str) -> &str {
    match url.split_once('?') {
        Some((_, query)) => query.split('#').next().unwrap_or(""),
        None => "",
    }
}

/// Collapse the query parameters of a URL into a params map.
///
/// Runs of consecutive pairs sharing a key become one entry: a single value
/// when the run has one element, otherwise the ordered list of values. A key
/// that appears again after a different key starts a new run which replaces
/// the earlier entry.
pub fn parse_request_params(url: &str) -> HashMap<String, ParamValue> {
    let mut runs: Vec<(String, Vec<String>)> = Vec::new();

    for (key, value) in parse_qsl(query_of(url)) {
        match runs.last_mut() {
            Some((run_key, values)) if *run_key == key => values.push(value),
            _ => runs.push((key, vec![value])),
        }
    }

    runs.into_iter()
        .map(|(key, values)| (key, ParamValue::from_values(values)))
        .collect()
}
