use anyhow::{Context, Result};
use reqwest::{RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Extension trait to send simd-json encoded bodies with reqwest
pub trait RequestSimdJsonExt: Sized {
    fn simd_json<T>(self, json: &T) -> Result<Self>
    where
        T: Serialize + ?Sized;
}

/// Extension trait to decode reqwest response bodies with simd-json
pub trait ResponseSimdJsonExt {
    async fn simd_json<T>(self) -> Result<T>
    where
        T: DeserializeOwned;
}

impl RequestSimdJsonExt for RequestBuilder {
    fn simd_json<T>(self, json: &T) -> Result<Self>
    where
        T: Serialize + ?Sized,
    {
        let body = simd_json::to_vec(json).context("Failed to encode request body")?;

        Ok(self
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body))
    }
}

impl ResponseSimdJsonExt for Response {
    async fn simd_json<T>(self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let mut bytes = self
            .bytes()
            .await
            .context("Failed to read response body")?
            .to_vec();
        simd_json::from_slice(&mut bytes).context("Failed to parse response body")
    }
}
