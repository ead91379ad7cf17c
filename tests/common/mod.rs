use async_trait::async_trait;
use http_client::{Error, HttpClient, Request, Response};
use http_client_responses::{MockTransport, RequestParams};
use http_types::{Method, Url};
use std::sync::{Arc, Mutex};

/// Stands in for the real network: answers every request with `real:<url>`.
#[derive(Debug, Clone, Default)]
pub struct StubNetwork {
    pub seen: Arc<Mutex<Vec<(String, Option<RequestParams>)>>>,
}

impl StubNetwork {
    pub fn urls(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }
}

#[async_trait]
impl HttpClient for StubNetwork {
    async fn send(&self, req: Request) -> Result<Response, Error> {
        let url = req.url().to_string();
        let params = req.ext().get::<RequestParams>().cloned();
        self.seen.lock().unwrap().push((url.clone(), params));

        let mut response = Response::new(200);
        response.set_body(format!("real:{url}"));
        Ok(response)
    }
}

pub fn request(method: Method, url: &str) -> Request {
    Request::new(method, Url::parse(url).unwrap())
}

pub async fn send(client: &MockTransport, method: Method, url: &str) -> Result<Response, Error> {
    client.send(request(method, url)).await
}

pub async fn get_text(client: &MockTransport, url: &str) -> Result<String, Error> {
    let mut response = send(client, Method::Get, url).await?;
    response.body_string().await
}

pub fn header_values(response: &Response, name: &str) -> Vec<String> {
    response
        .header(name)
        .map(|values| values.iter().map(|v| v.as_str().to_string()).collect())
        .unwrap_or_default()
}
