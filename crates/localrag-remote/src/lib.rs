//! HTTP clients for hosted capabilities: OpenAI-compatible chat and
//! embeddings, and a Cohere-compatible rerank endpoint.

use anyhow::{anyhow, Context, Result};

pub mod cohere;
pub mod openai;

pub use cohere::CohereJudge;
pub use openai::{OpenAiEmbedder, OpenAiGenerator};

/// Read an API key from the named environment variable.
pub fn api_key(env_name: &str) -> Result<String> {
    let key = std::env::var(env_name).with_context(|| format!("{env_name} is not set"))?;
    if key.trim().is_empty() {
        return Err(anyhow!("{env_name} is empty"));
    }
    Ok(key)
}

pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

/// POST `body` as JSON with a bearer token; non-2xx responses become errors
/// carrying the response body.
pub(crate) async fn post_json<B: serde::Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    body: &B,
) -> Result<serde_json::Value> {
    let response = client
        .post(url)
        .bearer_auth(api_key)
        .json(body)
        .send()
        .await
        .with_context(|| format!("POST {url}"))?;
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(anyhow!("POST {url} returned {status}: {text}"));
    }
    Ok(response.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        assert_eq!(endpoint("https://api.example.com/v1/", "embeddings"), "https://api.example.com/v1/embeddings");
        assert_eq!(endpoint("http://localhost:8080", "rerank"), "http://localhost:8080/rerank");
    }

    #[test]
    fn missing_key_is_an_error() {
        assert!(api_key("LOCALRAG_TEST_KEY_THAT_IS_NEVER_SET").is_err());
    }
}
