//! HTTP client for the ACR catalog API.

use std::time::Duration;

use acrops_core::RegistryEndpoint;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, LINK, RETRY_AFTER};
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use crate::catalog::{parse_next_link, PageCursor, RepositoryLister, RepositoryPage, RepositoryPager};
use crate::config::RegistryConfig;
use crate::credential::Credential;
use crate::error::RegistryError;

const CATALOG_PATH: &str = "/acr/v1/_catalog";

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    #[serde(default)]
    repositories: Option<Vec<String>>,
}

/// Catalog client for Azure Container Registry.
#[derive(Debug, Clone)]
pub struct HttpRegistryClient {
    config: RegistryConfig,
    http: reqwest::Client,
}

impl HttpRegistryClient {
    /// Creates a new registry client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS material cannot be loaded or the HTTP
    /// client cannot be created.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use acrops_registry::{HttpRegistryClient, RegistryConfig};
    ///
    /// let client = HttpRegistryClient::new(RegistryConfig::default().with_page_size(50))?;
    /// assert_eq!(client.config().page_size, 50);
    /// # Ok::<(), acrops_registry::RegistryError>(())
    /// ```
    pub fn new(config: RegistryConfig) -> Result<Self, RegistryError> {
        let http = Self::build_http_client(&config)?;
        Ok(Self { config, http })
    }

    /// Returns the registry configuration.
    #[must_use]
    pub const fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Returns the underlying HTTP client, shared with token exchange.
    #[must_use]
    pub const fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Lists every repository in the registry, honoring the configured page limit.
    ///
    /// # Errors
    ///
    /// Returns the first page failure, or [`RegistryError::Truncated`].
    pub async fn list_repositories(
        &self,
        endpoint: &RegistryEndpoint,
        credential: &Credential,
    ) -> Result<Vec<String>, RegistryError> {
        RepositoryPager::new(self, endpoint, credential, self.config.max_pages)
            .collect_all()
            .await
    }

    /// Resolves the URL of the first page, or of the page `cursor` points at.
    ///
    /// A cursor may only lead back to the same origin as `endpoint`; the
    /// credential is never sent anywhere else.
    fn catalog_url(
        &self,
        endpoint: &RegistryEndpoint,
        cursor: Option<&PageCursor>,
    ) -> Result<Url, RegistryError> {
        let reference = cursor.map_or(CATALOG_PATH, PageCursor::as_str);
        let mut url = endpoint
            .join(reference)
            .map_err(|_| RegistryError::InvalidUrl {
                url: format!("{endpoint}{reference}"),
            })?;
        if url.origin() != endpoint.url().origin() {
            return Err(RegistryError::ForeignPageLink {
                url: url.to_string(),
                registry: endpoint.to_string(),
            });
        }
        if cursor.is_none() {
            url.query_pairs_mut()
                .append_pair("n", &self.config.page_size.to_string());
        }
        Ok(url)
    }

    /// Builds the HTTP client with TLS configuration.
    fn build_http_client(config: &RegistryConfig) -> Result<reqwest::Client, RegistryError> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent);

        if let Some(ref tls) = config.tls {
            if tls.insecure_skip_verify {
                tracing::warn!("TLS certificate verification is disabled for registry requests");
                builder = builder.danger_accept_invalid_certs(true);
            }

            if let Some(ref ca_cert) = tls.ca_cert {
                let cert_pem = std::fs::read(ca_cert).map_err(|e| RegistryError::IoError {
                    path: ca_cert.clone(),
                    source: e,
                })?;
                let cert = reqwest::Certificate::from_pem(&cert_pem).map_err(|e| {
                    RegistryError::TlsConfig {
                        message: format!("Invalid CA certificate: {e}"),
                    }
                })?;
                builder = builder.add_root_certificate(cert);
            }
        }

        builder.build().map_err(|e| RegistryError::TlsConfig {
            message: format!("Cannot build HTTP client: {e}"),
        })
    }
}

#[async_trait]
impl RepositoryLister for HttpRegistryClient {
    async fn list_page(
        &self,
        endpoint: &RegistryEndpoint,
        credential: &Credential,
        cursor: Option<&PageCursor>,
    ) -> Result<RepositoryPage, RegistryError> {
        let url = self.catalog_url(endpoint, cursor)?;

        let mut request = self.http.get(url).header(ACCEPT, "application/json");
        if let Some(value) = credential.authorization()? {
            request = request.header(AUTHORIZATION, value);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after(response.headers(), Utc::now());
            let message = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    RegistryError::AuthenticationFailed {
                        status: status.as_u16(),
                        message,
                    }
                }
                StatusCode::TOO_MANY_REQUESTS => RegistryError::RateLimited { retry_after },
                _ => RegistryError::HttpError {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        let next = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_next_link);
        let body: CatalogResponse = response.json().await?;
        let names = body.repositories.unwrap_or_default();

        for name in &names {
            tracing::debug!(endpoint = %endpoint, repository = %name, "Found repository");
        }

        Ok(RepositoryPage { names, next })
    }
}

/// Reads `Retry-After` as either delay seconds or an HTTP date.
fn retry_after(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?;
    (at.with_timezone(&Utc) - now).to_std().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use reqwest::header::HeaderValue;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(page_size: u32) -> HttpRegistryClient {
        HttpRegistryClient::new(RegistryConfig::default().with_page_size(page_size)).unwrap()
    }

    fn registry(server: &MockServer) -> RegistryEndpoint {
        RegistryEndpoint::parse(&server.uri()).unwrap()
    }

    #[test]
    fn test_insecure_client_builds() {
        let config = RegistryConfig::default().with_tls(crate::TlsConfig::new().insecure());
        assert!(HttpRegistryClient::new(config).is_ok());
    }

    #[test]
    fn test_missing_ca_cert_is_io_error() {
        let config = RegistryConfig::default()
            .with_tls(crate::TlsConfig::new().with_ca_cert("/nonexistent/acrops-ca.pem"));
        assert!(matches!(
            HttpRegistryClient::new(config),
            Err(RegistryError::IoError { .. })
        ));
    }

    #[test]
    fn test_catalog_url() {
        let client = client(2);
        let endpoint = RegistryEndpoint::parse("https://myregistry.azurecr.io").unwrap();

        let first = client.catalog_url(&endpoint, None).unwrap();
        assert_eq!(
            first.as_str(),
            "https://myregistry.azurecr.io/acr/v1/_catalog?n=2"
        );

        let cursor = PageCursor::new("/acr/v1/_catalog?last=app-b&n=2");
        let next = client.catalog_url(&endpoint, Some(&cursor)).unwrap();
        assert_eq!(
            next.as_str(),
            "https://myregistry.azurecr.io/acr/v1/_catalog?last=app-b&n=2"
        );

        let absolute = PageCursor::new("https://myregistry.azurecr.io/acr/v1/_catalog?last=x");
        assert!(client.catalog_url(&endpoint, Some(&absolute)).is_ok());
    }

    #[test]
    fn test_catalog_url_rejects_other_origins() {
        let client = client(2);
        let endpoint = RegistryEndpoint::parse("https://myregistry.azurecr.io").unwrap();

        for target in [
            "https://evil.example/acr/v1/_catalog",
            "//evil.example/acr/v1/_catalog",
            "http://myregistry.azurecr.io/acr/v1/_catalog",
            "https://myregistry.azurecr.io:8443/acr/v1/_catalog",
        ] {
            let err = client
                .catalog_url(&endpoint, Some(&PageCursor::new(target)))
                .unwrap_err();
            assert!(
                matches!(err, RegistryError::ForeignPageLink { .. }),
                "{target} was accepted"
            );
        }
    }

    #[test]
    fn test_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("30"));
        assert_eq!(retry_after(&headers, Utc::now()), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_retry_after_http_date() {
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 0).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(retry_after(&headers, now), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_retry_after_missing_or_past() {
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 8, 0, 0).unwrap();
        assert_eq!(retry_after(&HeaderMap::new(), now), None);

        let mut headers = HeaderMap::new();
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(retry_after(&headers, now), None);
    }

    #[tokio::test]
    async fn test_list_repositories_follows_link_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/acr/v1/_catalog"))
            .and(query_param("n", "2"))
            .and(query_param_is_missing("last"))
            .and(header("authorization", "Bearer token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "repositories": ["app-a", "app-b"] }))
                    .insert_header("link", r#"</acr/v1/_catalog?last=app-b&n=2>; rel="next""#),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/acr/v1/_catalog"))
            .and(query_param("last", "app-b"))
            .and(header("authorization", "Bearer token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "repositories": ["app-c"] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let names = client(2)
            .list_repositories(&registry(&server), &Credential::bearer("token"))
            .await
            .unwrap();
        assert_eq!(names, vec!["app-a", "app-b", "app-c"]);
    }

    #[tokio::test]
    async fn test_list_repositories_refuses_cross_origin_link() {
        let registry_server = MockServer::start().await;
        let other_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/acr/v1/_catalog"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "repositories": ["app-a"] }))
                    .insert_header(
                        "link",
                        format!(r#"<{}/harvest>; rel="next""#, other_server.uri()).as_str(),
                    ),
            )
            .expect(1)
            .mount(&registry_server)
            .await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "repositories": ["stolen"] })),
            )
            .expect(0)
            .mount(&other_server)
            .await;

        let err = client(100)
            .list_repositories(&registry(&registry_server), &Credential::bearer("secret-token"))
            .await
            .unwrap_err();

        assert!(matches!(err, RegistryError::ForeignPageLink { .. }));
        assert!(other_server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_page_empty_registry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/acr/v1/_catalog"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let page = client(100)
            .list_page(&registry(&server), &Credential::Anonymous, None)
            .await
            .unwrap();
        assert!(page.names.is_empty());
        assert!(page.next.is_none());

        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn test_list_page_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "12"))
            .mount(&server)
            .await;

        let err = client(100)
            .list_page(&registry(&server), &Credential::Anonymous, None)
            .await
            .unwrap_err();
        assert_eq!(err.retry_after(), Some(Duration::from_secs(12)));
    }

    #[tokio::test]
    async fn test_list_page_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "errors": [] })))
            .mount(&server)
            .await;

        let err = client(100)
            .list_page(&registry(&server), &Credential::Anonymous, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::AuthenticationFailed { status: 401, .. }
        ));
    }

    #[tokio::test]
    async fn test_list_page_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .mount(&server)
            .await;

        let err = client(100)
            .list_page(&registry(&server), &Credential::Anonymous, None)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
    }
}
