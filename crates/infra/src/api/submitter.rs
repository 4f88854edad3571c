//! Batch update submitter

use std::sync::Arc;

use async_trait::async_trait;
use fieldsync_core::BatchSubmitter;
use fieldsync_domain::{Batch, Result, SyncError, SyncResult, SyncTarget};
use reqwest::Method;
use serde_json::{Map, Value};
use tracing::instrument;

use super::client::ApiClient;

/// POSTs one batch per call to the target's write endpoint.
pub struct UpdateSubmitter {
    api: Arc<ApiClient>,
}

impl UpdateSubmitter {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }
}

/// `{ <tenant>: <value>, <records_key>: [...] }`
pub fn request_body(target: &SyncTarget, batch: &Batch) -> Result<Value> {
    let records = serde_json::to_value(batch.entities())
        .map_err(|err| SyncError::Internal(format!("batch {} is not serializable: {err}", batch.index())))?;

    let mut body = Map::new();
    body.insert(target.tenant.name.clone(), Value::String(target.tenant.value.clone()));
    body.insert(target.write.records_key.clone(), records);
    Ok(Value::Object(body))
}

#[async_trait]
impl BatchSubmitter for UpdateSubmitter {
    #[instrument(skip(self, target, batch), fields(batch = batch.index(), records = batch.len()))]
    async fn submit(&self, target: &SyncTarget, batch: &Batch) -> Result<SyncResult> {
        let body = request_body(target, batch)?;
        let url = &target.write.url;

        match self
            .api
            .execute(url, &target.scopes, |http| http.request(Method::POST, url).json(&body))
            .await
        {
            Ok(delivery) => Ok(SyncResult::submitted(batch, delivery.status.as_u16(), delivery.attempts)),
            Err(failure) => {
                let attempts = failure.attempts;
                let error = SyncError::from(failure);
                if error.is_fatal() {
                    return Err(error);
                }
                Ok(SyncResult::failed(batch, error.status(), attempts, error.category(), error.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use fieldsync_domain::Entity;
    use serde_json::json;

    use super::*;

    #[test]
    fn body_carries_tenant_and_only_this_batch() {
        let target = SyncTarget::user_attributes("https://api.example.test", "group-9");
        let entities = vec![
            Entity::from_json(json!({"external_id": "a", "plan": "pro"}), "external_id").unwrap(),
            Entity::from_json(json!({"external_id": "b", "plan": "pro"}), "external_id").unwrap(),
        ];
        let batch = Batch::new(3, entities, 50).unwrap();

        let body = request_body(&target, &batch).unwrap();

        assert_eq!(body["app_group_id"], "group-9");
        assert_eq!(body["attributes"].as_array().unwrap().len(), 2);
        assert_eq!(body["attributes"][1], json!({"external_id": "b", "plan": "pro"}));
    }
}
