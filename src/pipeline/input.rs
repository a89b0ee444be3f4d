//! Branding resolution: local path, http(s) URL, or `data:` URI → image bytes.
//!
//! The bytes are returned undecoded. Decoding happens during rasterisation so
//! that a bad image surfaces as a render failure for the record being
//! exported, not as a start-up error.

use crate::error::{InvoiceError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::PathBuf;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

pub fn is_data_uri(input: &str) -> bool {
    input.starts_with("data:")
}

/// Resolve a branding source to raw image bytes.
pub async fn resolve_branding(source: &str, timeout_secs: u64) -> Result<Vec<u8>> {
    if is_data_uri(source) {
        decode_data_uri(source)
    } else if is_url(source) {
        download_url(source, timeout_secs).await
    } else {
        read_local(source).await
    }
}

/// Decode a base64 `data:` URI such as `data:image/png;base64,iVBOR...`.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>> {
    let invalid = |detail: &str| InvoiceError::InvalidInput {
        detail: format!("branding data URI {detail}"),
    };
    let rest = uri.strip_prefix("data:").ok_or_else(|| invalid("must start with 'data:'"))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| invalid("has no ',' separator"))?;
    if !meta.ends_with(";base64") {
        return Err(invalid("must be base64-encoded"));
    }
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|e| invalid(&format!("is not valid base64: {e}")))
}

async fn read_local(path_str: &str) -> Result<Vec<u8>> {
    let path = PathBuf::from(path_str);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            debug!("Read branding image {} ({} bytes)", path.display(), bytes.len());
            Ok(bytes)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(InvoiceError::BrandingNotFound { path })
        }
        Err(e) => Err(InvoiceError::InvalidInput {
            detail: format!("cannot read branding image '{}': {e}", path.display()),
        }),
    }
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>> {
    info!("Downloading branding image from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| InvoiceError::BrandingDownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let classify = |e: reqwest::Error| {
        if e.is_timeout() {
            InvoiceError::BrandingDownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            InvoiceError::BrandingDownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(classify)?;
    if !response.status().is_success() {
        return Err(InvoiceError::BrandingDownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(classify)?;
    info!("Downloaded branding image: {} bytes", bytes.len());
    Ok(bytes.to_vec())
}
