//! HTTP implementation of [`IndexTransport`].

use async_trait::async_trait;
use log::debug;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder};

use crate::config::TransportConfig;
use crate::error::Result;
use crate::transport::{DeleteQuery, IndexTransport, Outcome};

const JSON: &str = "application/json";
const NDJSON: &str = "application/x-ndjson";

/// Index store client over HTTP.
///
/// Every request carries the configured timeout; a request that runs past it
/// fails with a transport error like any other network fault.
///
/// # Example
///
/// ```no_run
/// use termsync::config::TransportConfig;
/// use termsync::transport::IndexTransport;
/// use termsync::transport::http::HttpIndexClient;
///
/// # async fn example() -> termsync::error::Result<()> {
/// let client = HttpIndexClient::new(&TransportConfig::new("http://localhost:9200"))?;
/// if !client.index_exists("concepts").await? {
///     client.create_index("concepts", b"{}").await?;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpIndexClient {
    base_url: String,
    http: Client,
}

impl HttpIndexClient {
    /// Create a client for the store at `config.url`.
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self::with_client(&config.url, http))
    }

    /// Create a client reusing an existing reqwest client.
    pub fn with_client(base_url: &str, http: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{}", self.base_url, path))
    }

    /// Send a request and capture status and body, whatever the status.
    async fn execute(&self, request: RequestBuilder) -> Result<Outcome> {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!("index store answered {status}: {body}");
        Ok(Outcome { status, body })
    }
}

fn index_path(index: &str) -> String {
    format!("/{}", urlencoding::encode(index))
}

#[async_trait]
impl IndexTransport for HttpIndexClient {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        let outcome = self.execute(self.request(Method::HEAD, &index_path(index))).await?;
        Ok(outcome.status != 404)
    }

    async fn create_index(&self, index: &str, settings: &[u8]) -> Result<bool> {
        let request = self
            .request(Method::PUT, &index_path(index))
            .query(&[("pretty", "true")])
            .header(CONTENT_TYPE, JSON)
            .body(settings.to_vec());
        Ok(self.execute(request).await?.success())
    }

    async fn delete_index(&self, index: &str) -> Result<bool> {
        let outcome = self.execute(self.request(Method::DELETE, &index_path(index))).await?;
        Ok(outcome.success())
    }

    async fn put_mapping(&self, index: &str, mapping: &[u8]) -> Result<bool> {
        let request = self
            .request(Method::PUT, &format!("{}/_mappings", index_path(index)))
            .query(&[("pretty", "true")])
            .header(CONTENT_TYPE, JSON)
            .body(mapping.to_vec());
        Ok(self.execute(request).await?.success())
    }

    async fn bulk(&self, payload: Vec<u8>, wait_for_refresh: bool) -> Result<Outcome> {
        let mut request = self
            .request(Method::POST, "/_bulk")
            .query(&[("pretty", "true")])
            .header(CONTENT_TYPE, NDJSON);
        if wait_for_refresh {
            request = request.query(&[("refresh", "wait_for")]);
        }
        self.execute(request.body(payload)).await
    }

    async fn delete_by_query(&self, index: &str, query: &DeleteQuery) -> Result<bool> {
        let request = self
            .request(Method::POST, &format!("{}/_delete_by_query", index_path(index)))
            .header(CONTENT_TYPE, JSON)
            .body(query.to_body());
        Ok(self.execute(request).await?.success())
    }

    async fn search(&self, index: &str, query: &[u8]) -> Result<Outcome> {
        let request = self
            .request(Method::GET, &format!("{}/_search", index_path(index)))
            .header(CONTENT_TYPE, JSON)
            .body(query.to_vec());
        self.execute(request).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn client(server: &MockServer) -> HttpIndexClient {
        HttpIndexClient::new(&TransportConfig::new(server.uri())).unwrap()
    }

    #[tokio::test]
    async fn test_index_exists_treats_404_as_missing() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/concepts"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/vocabularies"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client(&server).await;
        assert!(client.index_exists("concepts").await.unwrap());
        assert!(!client.index_exists("vocabularies").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_existing_index_reports_false() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/concepts"))
            .and(query_param("pretty", "true"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_string(r#"{"error":{"type":"resource_already_exists_exception"}}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server).await;
        assert!(!client.create_index("concepts", b"{}").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_mapping_path() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/concepts/_mappings"))
            .and(body_string(r#"{"properties":{}}"#))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"acknowledged":true}"#))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server).await;
        assert!(client.put_mapping("concepts", br#"{"properties":{}}"#).await.unwrap());
    }

    #[tokio::test]
    async fn test_bulk_refresh_parameter() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .and(query_param("refresh", "wait_for"))
            .and(header("content-type", NDJSON))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"errors":false,"items":[]}"#))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .respond_with(ResponseTemplate::new(500).set_body_string("no refresh requested"))
            .mount(&server)
            .await;

        let client = client(&server).await;
        let outcome = client.bulk(b"{}\n".to_vec(), true).await.unwrap();
        assert!(outcome.success());

        let outcome = client.bulk(b"{}\n".to_vec(), false).await.unwrap();
        assert!(!outcome.success());
        assert_eq!(outcome.status, 500);
        assert_eq!(outcome.body, "no refresh requested");
    }

    #[tokio::test]
    async fn test_delete_by_query_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/concepts/_delete_by_query"))
            .and(body_string(r#"{"query":{"match":{"vocabulary.id":"v1"}}}"#))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"deleted":3}"#))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server).await;
        let query = DeleteQuery::matching("vocabulary.id", "v1");
        assert!(client.delete_by_query("concepts", &query).await.unwrap());
    }

    #[tokio::test]
    async fn test_search_failure_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing/_search"))
            .respond_with(
                ResponseTemplate::new(404).set_body_string(r#"{"error":{"type":"index_not_found_exception"},"status":404}"#),
            )
            .mount(&server)
            .await;

        let client = client(&server).await;
        let outcome = client.search("missing", br#"{"query":{"match_all":{}}}"#).await.unwrap();
        assert!(!outcome.success());
        assert_eq!(outcome.json().unwrap()["status"], 404);
    }

    #[tokio::test]
    async fn test_timeout_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let config = TransportConfig::new(server.uri()).with_timeout(Duration::from_secs(1));
        let client = HttpIndexClient::new(&config).unwrap();
        let err = client.index_exists("concepts").await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let client = HttpIndexClient::new(&TransportConfig::new("http://127.0.0.1:1")).unwrap();
        let err = client.delete_index("concepts").await.unwrap_err();
        assert!(err.is_transport());
    }
}
