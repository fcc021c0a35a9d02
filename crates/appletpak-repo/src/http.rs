//! HTTP repository
//!
//! Talks to a package server over a small REST surface:
//! - `GET  {base}/pak?{query}&_count={n}&_offset={n}` search, JSON `AppletInfo` list
//! - `GET  {base}/pak/{id}[/{version}]` raw package bytes
//! - `PUT  {base}/pak` raw package bytes, JSON `AppletInfo` reply
//!
//! The total number of search matches is read from `X-Total-Count`.

use async_trait::async_trait;
use reqwest::{Method, StatusCode, header};
use std::collections::BTreeMap;
use url::Url;

use appletpak_core::{AppletInfo, Package};

use crate::backend::RepositoryBackend;
use crate::config::HttpSettings;
use crate::credentials::{Credentials, ResolvedCredentials};
use crate::error::{RepoError, RestClientError, Result, ServerError};
use crate::query::AppletQuery;
use crate::resolve::resolve_version;

/// Header carrying the total number of search matches
pub const TOTAL_COUNT_HEADER: &str = "X-Total-Count";

/// Page size used when listing versions for client-side resolution
const RESOLVE_PAGE_SIZE: usize = 1000;

struct Connection {
    base: Url,
    client: reqwest::Client,
    credentials: Option<ResolvedCredentials>,
}

/// Repository backed by a package server
#[derive(Default)]
pub struct HttpRepository {
    location: Option<String>,
    connection: Option<Connection>,
}

impl std::fmt::Debug for HttpRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRepository")
            .field("location", &self.location)
            .finish()
    }
}

impl HttpRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn connection(&self) -> Result<&Connection> {
        self.connection.as_ref().ok_or(RepoError::NotInitialized)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> Result<(reqwest::Response, Method, Url)> {
        let conn = self.connection()?;

        let mut request = conn.client.request(method.clone(), url.clone());
        if let Some(creds) = &conn.credentials {
            request = request.basic_auth(&creds.username, Some(&creds.password));
        }
        if let Some(body) = body {
            request = request
                .header(header::CONTENT_TYPE, "application/octet-stream")
                .body(body);
        }

        tracing::debug!(%method, %url, "sending request");
        match request.send().await {
            Ok(response) => Ok((response, method, url)),
            Err(e) => Err(rest_error(&method, &url, None, None, e.to_string())),
        }
    }

    /// Fetch one package; `None` on 404
    async fn fetch(&self, id: &str, version: Option<&str>) -> Result<Option<Package>> {
        let mut segments = vec!["pak", id];
        segments.extend(version);
        let url = endpoint(&self.connection()?.base, &segments);

        let (response, method, url) = self.send(Method::GET, url, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(&method, &url, response).await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| rest_error(&method, &url, None, None, e.to_string()))?;
        Ok(Some(Package::from_bytes(&bytes)?))
    }
}

/// `base` with `segments` appended as path segments
fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

fn rest_error(method: &Method, url: &Url, status: Option<u16>, server: Option<ServerError>, message: String) -> RepoError {
    RepoError::Rest(RestClientError {
        verb: method.to_string(),
        uri: url.to_string(),
        status,
        server,
        message,
    })
}

/// Turn a non-2xx response into an error, parsing the server error body
async fn check_status(method: &Method, url: &Url, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let server = serde_json::from_str::<ServerError>(&body).ok();
    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        body
    };
    Err(rest_error(method, url, Some(status.as_u16()), server, message))
}

/// Read a JSON body, reporting failures against the request
async fn read_json<T: serde::de::DeserializeOwned>(method: &Method, url: &Url, response: reqwest::Response) -> Result<T> {
    let status = response.status().as_u16();
    response
        .json()
        .await
        .map_err(|e| rest_error(method, url, Some(status), None, e.to_string()))
}

#[async_trait]
impl RepositoryBackend for HttpRepository {
    fn schemes(&self) -> &'static [&'static str] {
        &["http", "https"]
    }

    fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    async fn initialize(&mut self, location: &str, settings: &BTreeMap<String, String>) -> Result<()> {
        if self.connection.is_some() {
            return Err(RepoError::AlreadyInitialized {
                location: location.to_string(),
            });
        }

        let base = Url::parse(location).map_err(|e| RepoError::InvalidRepositoryUrl {
            url: location.to_string(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(RepoError::InvalidRepositoryUrl {
                url: location.to_string(),
                reason: "URL cannot be used as a base".to_string(),
            });
        }

        let settings = HttpSettings::from_settings(settings)?;
        let mut builder = reqwest::Client::builder();
        if let Some(proxy) = &settings.proxy {
            let proxy = reqwest::Proxy::all(proxy).map_err(|e| RepoError::InvalidConfig {
                message: format!("invalid proxy '{}': {}", proxy, e),
            })?;
            builder = builder.proxy(proxy);
        }
        let client = builder.build().map_err(|e| RepoError::InvalidConfig {
            message: e.to_string(),
        })?;

        let credentials = Credentials::from_settings(&settings)
            .map(|c| c.resolve())
            .transpose()?;

        self.connection = Some(Connection {
            base,
            client,
            credentials,
        });
        self.location = Some(location.to_string());
        Ok(())
    }

    async fn get(&self, id: &str, version: Option<&str>, exact: bool) -> Result<Option<Package>> {
        let Some(requested) = version else {
            return self.fetch(id, None).await;
        };

        if let Some(package) = self.fetch(id, Some(requested)).await? {
            return Ok(Some(package));
        }
        if exact {
            return Ok(None);
        }

        let (entries, _) = self
            .find(&AppletQuery::by_id(id), 0, RESOLVE_PAGE_SIZE)
            .await?;
        match resolve_version(&entries, id, Some(requested), false) {
            Some(info) => self.fetch(id, Some(&info.version)).await,
            None => Ok(None),
        }
    }

    async fn find(&self, query: &AppletQuery, offset: usize, count: usize) -> Result<(Vec<AppletInfo>, usize)> {
        let mut url = endpoint(&self.connection()?.base, &["pak"]);
        url.query_pairs_mut()
            .extend_pairs(query.to_query_pairs())
            .append_pair("_count", &count.to_string())
            .append_pair("_offset", &offset.to_string());

        let (response, method, url) = self.send(Method::GET, url, None).await?;
        let response = check_status(&method, &url, response).await?;

        let total = response
            .headers()
            .get(TOTAL_COUNT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<usize>().ok());
        let entries: Vec<AppletInfo> = read_json(&method, &url, response).await?;
        let total = total.unwrap_or(entries.len());
        Ok((entries, total))
    }

    async fn put(&self, package: &Package) -> Result<AppletInfo> {
        if package.meta.id.trim().is_empty() || package.meta.version.trim().is_empty() {
            return Err(RepoError::InvalidPackage {
                message: "package id and version are required".to_string(),
            });
        }

        let url = endpoint(&self.connection()?.base, &["pak"]);
        let body = package.to_bytes()?;
        let (response, method, url) = self.send(Method::PUT, url, Some(body)).await?;
        let response = check_status(&method, &url, response).await?;

        let info: AppletInfo = read_json(&method, &url, response).await?;
        tracing::info!(id = %info.id, version = %info.version, %url, "published package");
        Ok(info)
    }
}
