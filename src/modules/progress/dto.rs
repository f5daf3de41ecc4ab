use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use super::model::ProgressUpdate;

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProgressRequest {
    #[validate(range(min = 0.0, message = "position_seconds must not be negative"))]
    pub position_seconds: Option<f64>,
    pub viewed: Option<bool>,
}

impl From<UpdateProgressRequest> for ProgressUpdate {
    fn from(req: UpdateProgressRequest) -> Self {
        Self {
            position_seconds: req.position_seconds,
            viewed: req.viewed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_negative_positions() {
        let req = UpdateProgressRequest {
            position_seconds: Some(-1.0),
            viewed: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn accepts_partial_updates() {
        let req: UpdateProgressRequest = serde_json::from_str(r#"{"viewed": true}"#).unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(
            ProgressUpdate::from(req),
            ProgressUpdate {
                position_seconds: None,
                viewed: Some(true)
            }
        );
    }
}
