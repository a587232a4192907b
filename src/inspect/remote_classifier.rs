use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::InspectorError;
use crate::field::field_model::{FieldDetail, FieldOverride, lenient_field_details};
use crate::inspect::collaborators::Classifier;

// ============================================================================
// Remote classifier (HTTP)
// ============================================================================

/// Classifier reached over HTTP. Any service that answers the inspect
/// contract can stand in for the built-in heuristics, e.g. a model-backed one.
pub struct RemoteClassifier {
    pub endpoint: String,
    client: reqwest::Client,
}

impl Default for RemoteClassifier {
    fn default() -> Self {
        Self::new("http://localhost:8787/inspect")
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InspectRequest<'a> {
    tab_id: u64,
    changes: &'a [FieldOverride],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InspectResponse {
    #[serde(default, deserialize_with = "lenient_field_details")]
    field_details: Vec<FieldDetail>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordsRequest<'a> {
    tab_id: u64,
    records: &'a [Value],
}

impl RemoteClassifier {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn records_endpoint(&self) -> String {
        format!("{}/records", self.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl Classifier for RemoteClassifier {
    async fn inspect(
        &self,
        tab_id: u64,
        changes: &[FieldOverride],
    ) -> Result<Vec<FieldDetail>, InspectorError> {
        let request = InspectRequest { tab_id, changes };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| InspectorError::Classifier(format!("POST {}: {}", self.endpoint, e)))?;

        let response = response
            .error_for_status()
            .map_err(|e| InspectorError::Classifier(e.to_string()))?;

        let body: InspectResponse = response
            .json()
            .await
            .map_err(|e| InspectorError::Classifier(format!("invalid inspect response: {}", e)))?;

        debug!(tab_id, fields = body.field_details.len(), "remote classifier answered");
        Ok(body.field_details)
    }

    async fn set_test_records(&self, tab_id: u64, records: &[Value]) -> Result<(), InspectorError> {
        let url = self.records_endpoint();
        self.client
            .post(&url)
            .json(&RecordsRequest { tab_id, records })
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| InspectorError::Classifier(format!("POST {}: {}", url, e)))?;
        Ok(())
    }
}
