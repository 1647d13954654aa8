use crate::error::{MarketError, Result};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Thin JSON/bytes fetcher shared by the constant tables, IPFS reads and the pinning client.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    http: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self::with_http_client(
            Client::builder().timeout(timeout).build()?,
        ))
    }

    /// Use an existing reqwest client (useful for custom TLS or middleware).
    pub fn with_http_client(http: Client) -> Self {
        Self { http }
    }

    pub fn client(&self) -> &Client {
        &self.http
    }

    pub async fn get_json<T>(&self, url: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = Url::parse(url)?;
        debug!(%url, "GET json");
        let response = self.http.get(url).send().await?;
        Self::map_response(response).await
    }

    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let url = Url::parse(url)?;
        debug!(%url, "GET bytes");
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(Self::map_api_error(response).await);
        }
        Ok(response.bytes().await?.to_vec())
    }

    pub(crate) async fn map_response<T>(response: Response) -> Result<T>
    where
        T: DeserializeOwned,
    {
        if !response.status().is_success() {
            return Err(Self::map_api_error(response).await);
        }
        Ok(response.json::<T>().await?)
    }

    pub(crate) async fn map_api_error(response: Response) -> MarketError {
        let status = response.status().as_u16();
        let bytes = response.bytes().await.unwrap_or_default();
        MarketError::server_error(status, String::from_utf8_lossy(&bytes).to_string())
    }
}

/// Join `name` onto a directory-style base URL, adding the trailing slash the base may lack.
pub(crate) fn join_base(base: &str, name: &str) -> Result<Url> {
    let mut url =
        Url::parse(base).map_err(|_| MarketError::InvalidBaseUrl(base.to_string()))?;
    if !url.path().ends_with('/') {
        let mut path = url.path().trim_end_matches('/').to_owned();
        path.push('/');
        url.set_path(&path);
    }
    Ok(url.join(name)?)
}
