//! Remote font backend: a css2-style stylesheet service plus a CDN that hosts
//! the binaries the stylesheet points at.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::try_join_all;
use regex::Regex;
use reqwest::Client;
use url::{form_urlencoded, Url};

use super::{FontAsset, FontRequest, FontResolver};
use crate::{Error, RenderConfig, Result};

/// Fetches fonts from a stylesheet service such as Google Fonts.
///
/// Every call fetches afresh; wrap it in a [`super::CachingResolver`] to
/// reuse binaries across requests.
pub struct RemoteFontResolver {
    client: Client,
    stylesheet_base: Url,
    binary_url: Regex,
    timeout: Duration,
}

impl RemoteFontResolver {
    pub fn new(config: &RenderConfig) -> Result<Self> {
        let stylesheet_base = Url::parse(&config.stylesheet_base).map_err(|e| {
            Error::ConfigError(format!("bad stylesheet base {}: {}", config.stylesheet_base, e))
        })?;
        let host = config.font_binary_host.trim_end_matches('/');
        let binary_url = Regex::new(&format!(r"url\(({}[^)]+)\)", regex::escape(host)))
            .map_err(|e| Error::ConfigError(format!("bad font binary host {}: {}", host, e)))?;
        let timeout = Duration::from_millis(config.font_timeout_ms);
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            stylesheet_base,
            binary_url,
            timeout,
        })
    }

    /// Stylesheet URL for a request; the weight is snapped first and the
    /// family is form-encoded so it cannot add query parameters.
    pub fn stylesheet_url(&self, request: &FontRequest) -> String {
        let family: String = form_urlencoded::byte_serialize(request.family.trim().as_bytes()).collect();
        let mut url = self.stylesheet_base.clone();
        url.set_query(Some(&format!(
            "family={}:ital,wght@{},{}&display=swap",
            family,
            u8::from(request.style.is_italic()),
            request.snapped_weight()
        )));
        url.to_string()
    }

    /// First binary URL on the configured host referenced by `css`.
    pub fn extract_binary_url<'a>(&self, css: &'a str) -> Option<&'a str> {
        self.binary_url
            .captures(css)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }

    async fn fetch_one(&self, request: &FontRequest) -> Result<FontAsset> {
        match tokio::time::timeout(self.timeout, self.fetch_uncapped(request)).await {
            Ok(res) => res,
            Err(_) => Err(not_found(
                request,
                format!("timed out after {}ms", self.timeout.as_millis()),
            )),
        }
    }

    async fn fetch_uncapped(&self, request: &FontRequest) -> Result<FontAsset> {
        let css_url = self.stylesheet_url(request);
        log::debug!("fetching font stylesheet {}", css_url);
        let response = self.client.get(&css_url).send().await?;
        if !response.status().is_success() {
            // the service answers 400 for families it does not know
            return Err(not_found(
                request,
                format!("stylesheet request returned {}", response.status()),
            ));
        }
        let css = response.text().await?;

        let Some(binary_url) = self.extract_binary_url(&css) else {
            return Err(not_found(request, "stylesheet lists no font binary".to_string()));
        };

        log::debug!("fetching font binary {}", binary_url);
        let bytes = self
            .client
            .get(binary_url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        Ok(FontAsset::new(
            request.family.clone(),
            bytes.to_vec(),
            request.weight,
            request.style,
        ))
    }
}

fn not_found(request: &FontRequest, reason: String) -> Error {
    Error::FontNotFoundError {
        family: request.family.clone(),
        weight: request.snapped_weight(),
        style: request.style,
        reason,
    }
}

#[async_trait]
impl FontResolver for RemoteFontResolver {
    async fn resolve(&self, requests: &[FontRequest]) -> Result<Vec<FontAsset>> {
        try_join_all(requests.iter().map(|r| self.fetch_one(r))).await
    }
}
