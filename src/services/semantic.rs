use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

use crate::models::{BuyerProfile, Priorities};

/// Errors that can occur when calling the semantic weighting service
#[derive(Debug, Error)]
pub enum SemanticError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Unauthorized: invalid API key")]
    Unauthorized,

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Semantic analysis timed out after {0:?}")]
    Timeout(Duration),
}

/// Best-effort collaborator that reads a profile and suggests per-dimension
/// weight adjustments.
///
/// Keys are free-form dimension names ("economy", "safety", ...), values are
/// deltas expected in -1.0..=1.0.
#[async_trait]
pub trait SemanticAnalyzer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn analyze(&self, profile: &BuyerProfile) -> Result<HashMap<String, f64>, SemanticError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest<'a> {
    primary_usage: &'static str,
    family_size: u8,
    priorities: &'a Priorities,
    income_band: Option<&'static str>,
    budget_min: f64,
    budget_max: f64,
}

/// HTTP client for the semantic weighting service
///
/// `POST {endpoint}` with the relevant profile fields, expecting
/// `{"adjustments": {"<dimension>": <delta>, ...}}`.
pub struct HttpSemanticAnalyzer {
    endpoint: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpSemanticAnalyzer {
    pub fn new(
        endpoint: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SemanticError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            endpoint,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl SemanticAnalyzer for HttpSemanticAnalyzer {
    fn name(&self) -> &'static str {
        "http_semantic"
    }

    async fn analyze(&self, profile: &BuyerProfile) -> Result<HashMap<String, f64>, SemanticError> {
        let body = AnalyzeRequest {
            primary_usage: profile.usage_label(),
            family_size: profile.family_size,
            priorities: &profile.priorities,
            income_band: profile.income_band.map(|b| b.as_str()),
            budget_min: profile.budget_min,
            budget_max: profile.budget_max,
        };

        tracing::debug!("Requesting semantic weights from: {}", self.endpoint);

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(SemanticError::Unauthorized)
            }
            status if !status.is_success() => {
                return Err(SemanticError::ApiError(format!(
                    "Failed to analyze profile: {}",
                    status
                )));
            }
            _ => {}
        }

        let json: Value = response.json().await?;

        let adjustments = json
            .get("adjustments")
            .and_then(|a| a.as_object())
            .ok_or_else(|| SemanticError::InvalidResponse("Missing adjustments object".into()))?;

        // Skip entries that aren't usable numbers instead of failing the whole map
        Ok(adjustments
            .iter()
            .filter_map(|(name, delta)| {
                delta
                    .as_f64()
                    .filter(|d| d.is_finite())
                    .map(|d| (name.to_lowercase(), d))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Usage;

    fn family_profile() -> BuyerProfile {
        let mut profile = BuyerProfile::with_budget(50_000.0, 80_000.0);
        profile.primary_usage = Some(Usage::Family);
        profile.family_size = 4;
        profile
    }

    #[tokio::test]
    async fn test_analyze_parses_adjustments() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/analyze")
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"adjustments": {"Safety": 0.4, "economy": -0.2, "bogus": "x"}}"#)
            .create_async()
            .await;

        let analyzer = HttpSemanticAnalyzer::new(
            format!("{}/analyze", server.url()),
            Some("secret".to_string()),
            Duration::from_secs(2),
        )
        .unwrap();

        let adjustments = analyzer.analyze(&family_profile()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(adjustments.len(), 2);
        assert_eq!(adjustments.get("safety"), Some(&0.4));
        assert_eq!(adjustments.get("economy"), Some(&-0.2));
    }

    #[tokio::test]
    async fn test_analyze_reports_api_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/analyze")
            .with_status(503)
            .create_async()
            .await;

        let analyzer =
            HttpSemanticAnalyzer::new(
                format!("{}/analyze", server.url()),
                None,
                Duration::from_secs(2),
            )
            .unwrap();

        let result = analyzer.analyze(&family_profile()).await;
        assert!(matches!(result, Err(SemanticError::ApiError(_))));
    }

    #[tokio::test]
    async fn test_analyze_rejects_missing_adjustments() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/analyze")
            .with_status(200)
            .with_body(r#"{"weights": {}}"#)
            .create_async()
            .await;

        let analyzer =
            HttpSemanticAnalyzer::new(
                format!("{}/analyze", server.url()),
                None,
                Duration::from_secs(2),
            )
            .unwrap();

        let result = analyzer.analyze(&family_profile()).await;
        assert!(matches!(result, Err(SemanticError::InvalidResponse(_))));
    }
}
