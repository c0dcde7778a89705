use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

use crate::models::domain::{BuyerProfile, Vehicle};

/// Ranking request as handed over by the request layer
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RankRequest {
    #[validate(nested)]
    pub profile: BuyerProfile,
    #[serde(default)]
    pub catalog: Vec<Vehicle>,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: usize,
}

fn default_limit() -> usize {
    10
}

impl RankRequest {
    /// Validate the request and every catalog entry
    pub fn validate_all(&self) -> Result<(), ValidationErrors> {
        self.validate()?;
        for vehicle in &self.catalog {
            vehicle.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_request_defaults() {
        let json = r#"{"profile": {"budgetMin": 40000, "budgetMax": 60000}}"#;
        let request: RankRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.limit, 10);
        assert!(request.catalog.is_empty());
        assert!(request.validate_all().is_ok());
    }

    #[test]
    fn test_rank_request_rejects_zero_limit() {
        let json = r#"{"profile": {"budgetMin": 40000, "budgetMax": 60000}, "limit": 0}"#;
        let request: RankRequest = serde_json::from_str(json).unwrap();

        assert!(request.validate_all().is_err());
    }
}
