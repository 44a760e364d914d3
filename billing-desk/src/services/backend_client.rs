//! Client for the billing REST backend.
//!
//! Every response passes through `billing_core::normalize` before it leaves
//! this module, so callers only ever see strict model types.

use crate::config::BackendSettings;
use crate::error::AppError;
use base64::{engine::general_purpose, Engine as _};
use billing_core::models::{BankDetails, CreditBill, Customer, DebitNote, PermissionRequest};
use billing_core::normalize;
use billing_core::observability::TraceContextExt;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;

/// Collections exposed under `/api`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    CreditBills,
    DebitNotes,
    Customers,
    BankDetails,
    PermissionRequests,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::CreditBills => "creditbills",
            Resource::DebitNotes => "debitnotes",
            Resource::Customers => "customers",
            Resource::BankDetails => "bankdetails",
            Resource::PermissionRequests => "permissionrequests",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "creditbills" => Some(Resource::CreditBills),
            "debitnotes" => Some(Resource::DebitNotes),
            "customers" => Some(Resource::Customers),
            "bankdetails" => Some(Resource::BankDetails),
            "permissionrequests" => Some(Resource::PermissionRequests),
            _ => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Resource::CreditBills => "Credit bill",
            Resource::DebitNotes => "Debit note",
            Resource::Customers => "Customer",
            Resource::BankDetails => "Bank details",
            Resource::PermissionRequests => "Permission request",
        }
    }
}

pub struct BackendClient {
    client: Client,
    settings: BackendSettings,
}

impl BackendClient {
    pub fn new(settings: BackendSettings) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build backend client: {}", e)))?;

        Ok(Self { client, settings })
    }

    pub fn base_url(&self) -> &str {
        &self.settings.base_url
    }

    fn url(&self, resource: Resource, id: Option<&str>) -> String {
        let base = self.settings.base_url.trim_end_matches('/');
        match id {
            Some(id) => format!("{}/api/{}/{}", base, resource.as_str(), id),
            None => format!("{}/api/{}", base, resource.as_str()),
        }
    }

    // Raw verbs. Bodies come back as JSON for the caller to normalize.

    pub async fn list(
        &self,
        token: &str,
        resource: Resource,
        query: &[(&str, &str)],
    ) -> Result<Value, AppError> {
        let url = self.url(resource, None);
        self.send(self.client.get(&url).query(query), token, resource).await
    }

    pub async fn get(&self, token: &str, resource: Resource, id: &str) -> Result<Value, AppError> {
        let url = self.url(resource, Some(id));
        self.send(self.client.get(&url), token, resource).await
    }

    pub async fn create<B: Serialize + ?Sized>(
        &self,
        token: &str,
        resource: Resource,
        body: &B,
    ) -> Result<Value, AppError> {
        let url = self.url(resource, None);
        self.send(self.client.post(&url).json(body), token, resource).await
    }

    pub async fn update<B: Serialize + ?Sized>(
        &self,
        token: &str,
        resource: Resource,
        id: &str,
        body: &B,
    ) -> Result<Value, AppError> {
        let url = self.url(resource, Some(id));
        self.send(self.client.put(&url).json(body), token, resource).await
    }

    pub async fn delete(&self, token: &str, resource: Resource, id: &str) -> Result<(), AppError> {
        let url = self.url(resource, Some(id));
        self.send(self.client.delete(&url), token, resource).await?;
        Ok(())
    }

    async fn send(
        &self,
        request: RequestBuilder,
        token: &str,
        resource: Resource,
    ) -> Result<Value, AppError> {
        let response = request
            .bearer_auth(token)
            .with_trace_context()
            .send()
            .await
            .map_err(|e| {
                tracing::error!(resource = resource.as_str(), "Backend request failed: {}", e);
                if e.is_timeout() {
                    AppError::Timeout {
                        operation: "Backend request",
                        seconds: self.settings.request_timeout_secs,
                    }
                } else {
                    AppError::Upstream(e.to_string())
                }
            })?;

        read_json(response, resource).await
    }

    // Typed operations.

    pub async fn credit_bills(&self, token: &str) -> Result<Vec<CreditBill>, AppError> {
        let value = self.list(token, Resource::CreditBills, &[]).await?;
        Ok(normalize::list(&value, "creditBills", normalize::credit_bill)?)
    }

    pub async fn credit_bill(&self, token: &str, id: &str) -> Result<CreditBill, AppError> {
        let value = self.get(token, Resource::CreditBills, id).await?;
        Ok(normalize::credit_bill(&value)?)
    }

    /// Stored debit notes of one credit bill. The backend filter is a hint;
    /// the result is filtered again here by exact id.
    pub async fn debit_notes_for(
        &self,
        token: &str,
        credit_bill_id: &str,
    ) -> Result<Vec<DebitNote>, AppError> {
        let value = self
            .list(token, Resource::DebitNotes, &[("creditBillId", credit_bill_id)])
            .await?;
        let notes = normalize::list(&value, "debitNotes", normalize::debit_note)?;
        Ok(notes
            .into_iter()
            .filter(|n| n.credit_bill_id == credit_bill_id)
            .collect())
    }

    pub async fn debit_note(&self, token: &str, id: &str) -> Result<DebitNote, AppError> {
        let value = self.get(token, Resource::DebitNotes, id).await?;
        Ok(normalize::debit_note(&value)?)
    }

    pub async fn customers(&self, token: &str) -> Result<Vec<Customer>, AppError> {
        let value = self.list(token, Resource::Customers, &[]).await?;
        Ok(normalize::list(&value, "customers", normalize::customer)?)
    }

    pub async fn customer(&self, token: &str, id: &str) -> Result<Customer, AppError> {
        let value = self.get(token, Resource::Customers, id).await?;
        Ok(normalize::customer(&value)?)
    }

    /// The company's primary bank account, if one is on file.
    pub async fn bank_details(&self, token: &str) -> Result<Option<BankDetails>, AppError> {
        match self.list(token, Resource::BankDetails, &[]).await {
            Ok(value) => match normalize::bank_details(&value) {
                Ok(bank) => Ok(Some(bank)),
                Err(e) => {
                    tracing::warn!("Bank details unusable, printing without them: {}", e);
                    Ok(None)
                }
            },
            Err(AppError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn permission_requests(&self, token: &str) -> Result<Vec<PermissionRequest>, AppError> {
        let value = self.list(token, Resource::PermissionRequests, &[]).await?;
        Ok(normalize::list(&value, "permissionRequests", normalize::permission_request)?)
    }

    /// The backend's print rendition of a stored debit note.
    ///
    /// Accepts either a raw `application/pdf` body or JSON carrying the file
    /// base64-encoded under `pdf`/`data`.
    pub async fn print_pdf(&self, token: &str, debit_note_id: &str) -> Result<Vec<u8>, AppError> {
        let url = format!("{}/print", self.url(Resource::DebitNotes, Some(debit_note_id)));
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .with_trace_context()
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch print PDF from {}: {}", url, e);
                AppError::Upstream(e.to_string())
            })?;

        let is_pdf = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("application/pdf"))
            .unwrap_or(false);

        if is_pdf && response.status().is_success() {
            return Ok(response.bytes().await?.to_vec());
        }

        let value = read_json(response, Resource::DebitNotes).await?;
        let encoded = ["pdf", "data", "file"]
            .iter()
            .find_map(|k| normalize::unwrap_envelope(&value).get(*k).and_then(Value::as_str))
            .ok_or_else(|| AppError::Upstream("Print response carried no PDF".to_string()))?;

        // Data URLs are accepted as well as bare base64.
        let encoded = encoded.rsplit(',').next().unwrap_or(encoded);
        general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| AppError::Upstream(format!("Print PDF is not valid base64: {}", e)))
    }
}

async fn read_json(response: Response, resource: Resource) -> Result<Value, AppError> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if status.is_success() {
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        return serde_json::from_str(&body)
            .map_err(|e| AppError::Upstream(format!("Invalid JSON from backend: {}", e)));
    }

    let message = error_message(&body).unwrap_or_else(|| status.to_string());
    tracing::warn!(
        resource = resource.as_str(),
        status = %status,
        message = %message,
        "Backend returned an error"
    );

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Unauthorized(message),
        StatusCode::NOT_FOUND => AppError::NotFound(resource.label().to_string()),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY | StatusCode::CONFLICT => {
            AppError::Validation(vec![message])
        }
        _ => AppError::Upstream(format!("{} {}: {}", resource.as_str(), status, message)),
    })
}

fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "error", "detail"]
        .iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_names_round_trip() {
        for resource in [
            Resource::CreditBills,
            Resource::DebitNotes,
            Resource::Customers,
            Resource::BankDetails,
            Resource::PermissionRequests,
        ] {
            assert_eq!(Resource::from_string(resource.as_str()), Some(resource));
        }
        assert_eq!(Resource::from_string("invoices"), None);
    }

    #[test]
    fn error_message_prefers_message_field() {
        assert_eq!(
            error_message(r#"{"message":"GSTIN already registered","code":409}"#).as_deref(),
            Some("GSTIN already registered")
        );
        assert_eq!(error_message("<html>Bad gateway</html>"), None);
    }

    #[test]
    fn urls_are_built_under_api() {
        let client = BackendClient::new(BackendSettings {
            base_url: "http://backend:5000/".to_string(),
            request_timeout_secs: 5,
        })
        .unwrap();
        assert_eq!(
            client.url(Resource::DebitNotes, Some("dn-1")),
            "http://backend:5000/api/debitnotes/dn-1"
        );
        assert_eq!(client.url(Resource::Customers, None), "http://backend:5000/api/customers");
    }
}
