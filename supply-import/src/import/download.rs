//! Remote document downloads
//!
//! Source URLs in the spreadsheet point at PDFs hosted by schools or
//! publishers. They are fetched server-side and uploaded like any other
//! document.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::api::StoreError;
use crate::api::client::{status_error, transport_error};

pub const DEFAULT_FILE_NAME: &str = "documento.pdf";

#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, StoreError>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build download client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, StoreError> {
        let operation = format!("download {}", url);
        log::debug!("Downloading {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(e, &operation))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body, &operation));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(e, &operation))?;
        Ok(bytes.to_vec())
    }
}

/// Last path segment of a URL, percent-decoded, with a `.pdf` extension
pub fn file_name_from_url(url: &str) -> String {
    let path = url
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('/');
    let path = path.split_once("://").map(|(_, rest)| rest).unwrap_or(path);
    let Some((_, segment)) = path.rsplit_once('/') else {
        return DEFAULT_FILE_NAME.to_string();
    };

    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    let decoded = decoded.trim();
    if decoded.is_empty() {
        return DEFAULT_FILE_NAME.to_string();
    }
    if decoded.to_ascii_lowercase().ends_with(".pdf") {
        decoded.to_string()
    } else {
        format!("{}.pdf", decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url("https://colegio.cl/listas/Lista%205%C2%B0%20B%C3%A1sico.pdf?v=2"),
            "Lista 5° Básico.pdf"
        );
        assert_eq!(file_name_from_url("https://colegio.cl/descargar/1234"), "1234.pdf");
        assert_eq!(file_name_from_url("https://colegio.cl/"), DEFAULT_FILE_NAME);
        assert_eq!(file_name_from_url("https://colegio.cl"), DEFAULT_FILE_NAME);
    }
}
