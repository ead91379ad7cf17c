use crate::utils::parse_request_params;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use http_client::{Error, Request};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A query parameter after collapsing: one value, or the ordered list of
/// values of a run of identical keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Single(String),
    Multiple(Vec<String>),
}

impl ParamValue {
    pub fn from_values(mut values: Vec<String>) -> Self {
        if values.len() == 1 {
            ParamValue::Single(values.remove(0))
        } else {
            ParamValue::Multiple(values)
        }
    }

    pub fn as_single(&self) -> Option<&str> {
        match self {
            ParamValue::Single(value) => Some(value),
            ParamValue::Multiple(_) => None,
        }
    }

    pub fn values(&self) -> Vec<&str> {
        match self {
            ParamValue::Single(value) => vec![value.as_str()],
            ParamValue::Multiple(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

/// Parsed query params attached to an intercepted request's extensions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams(pub HashMap<String, ParamValue>);

/// Snapshot of an intercepted request, as seen by matchers and callbacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockRequest {
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, Vec<String>>,
    #[serde(with = "body_encoding")]
    pub body: Option<Vec<u8>>,
    pub params: HashMap<String, ParamValue>,
}

impl MockRequest {
    /// Snapshot `req`, leaving its body intact and its params slot populated.
    pub async fn from_request(req: &mut Request) -> Result<Self, Error> {
        let body_bytes = req
            .take_body()
            .into_bytes()
            .await
            .map_err(|e| Error::from_str(500, format!("Failed to read request body: {e}")))?;
        req.set_body(body_bytes.clone());

        let mut headers = HashMap::new();
        for (name, values) in req.iter() {
            let header_values: Vec<String> =
                values.iter().map(|v| v.as_str().to_string()).collect();
            headers.insert(name.as_str().to_string(), header_values);
        }

        let url = req.url().to_string();
        let params = parse_request_params(&url);
        req.ext_mut().insert(RequestParams(params.clone()));

        Ok(Self {
            method: req.method().to_string(),
            url,
            headers,
            body: if body_bytes.is_empty() {
                None
            } else {
                Some(body_bytes)
            },
            params,
        })
    }

    pub fn body_text(&self) -> Option<&str> {
        self.body
            .as_deref()
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    /// First value of a header, looked up case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .and_then(|(_, values)| values.first())
            .map(String::as_str)
    }
}

/// What a dispatched mock handed back, as recorded in the call log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableResponse {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    /// Absent for streaming responses, whose body is left unread.
    #[serde(with = "body_encoding")]
    pub body: Option<Vec<u8>>,
}

impl SerializableResponse {
    pub fn body_text(&self) -> Option<&str> {
        self.body
            .as_deref()
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
    }
}

/// Either side of a recorded call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallOutcome {
    Response(SerializableResponse),
    Error { status: u16, message: String },
}

impl CallOutcome {
    pub fn from_error(error: &Error) -> Self {
        CallOutcome::Error {
            status: error.status().into(),
            message: error.to_string(),
        }
    }

    pub fn response(&self) -> Option<&SerializableResponse> {
        match self {
            CallOutcome::Response(response) => Some(response),
            CallOutcome::Error { .. } => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CallOutcome::Error { .. })
    }
}

/// Bodies serialize as text when they are valid UTF-8, otherwise as base64.
mod body_encoding {
    use super::*;
    use serde::{Deserializer, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum BodyRepr {
        Text(String),
        Binary { body_base64: String },
    }

    pub fn serialize<S: Serializer>(body: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        let repr = body.as_ref().map(|bytes| match std::str::from_utf8(bytes) {
            Ok(text) => BodyRepr::Text(text.to_string()),
            Err(_) => BodyRepr::Binary {
                body_base64: STANDARD.encode(bytes),
            },
        });
        repr.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let repr = Option::<BodyRepr>::deserialize(d)?;
        match repr {
            None => Ok(None),
            Some(BodyRepr::Text(text)) => Ok(Some(text.into_bytes())),
            Some(BodyRepr::Binary { body_base64 }) => STANDARD
                .decode(body_base64)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_body_serializes_as_base64() {
        let response = SerializableResponse {
            status: 200,
            reason: "OK".to_string(),
            headers: vec![],
            body: Some(vec![0xff, 0x00, 0xfe]),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["body"]["body_base64"], "/wD+");

        let back: SerializableResponse = serde_json::from_value(json).unwrap();
        assert_eq!(back.body, Some(vec![0xff, 0x00, 0xfe]));
    }

    #[test]
    fn test_text_body_serializes_as_string() {
        let outcome = CallOutcome::Response(SerializableResponse {
            status: 201,
            reason: "Created".to_string(),
            headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
            body: Some(b"done".to_vec()),
        });
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["kind"], "response");
        assert_eq!(json["body"], "done");
    }

    #[test]
    fn test_param_value_accessors() {
        let single = ParamValue::from_values(vec!["1".to_string()]);
        assert_eq!(single.as_single(), Some("1"));

        let multiple = ParamValue::from_values(vec!["1".to_string(), "2".to_string()]);
        assert_eq!(multiple.as_single(), None);
        assert_eq!(multiple.values(), vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_from_request_fills_params_slot_and_keeps_body() {
        let mut req = Request::new(
            http_types::Method::Post,
            http_types::Url::parse("http://example.com/?a=1&a=2&b=3").unwrap(),
        );
        req.set_body("payload");

        let snapshot = MockRequest::from_request(&mut req).await.unwrap();
        assert_eq!(snapshot.body_text(), Some("payload"));

        let params = req.ext().get::<RequestParams>().unwrap();
        assert_eq!(params.0, snapshot.params);
        assert_eq!(params.0.get("b"), Some(&ParamValue::Single("3".to_string())));
        assert_eq!(req.body_string().await.unwrap(), "payload");
    }
}
