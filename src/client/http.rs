//! HTTP implementation of the verification client

use alta_types::{DuplicateCheckResponse, PositionDto, TaxIdLookupResponse};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::{DuplicateCheck, Position, TaxIdLookup, VerificationClient};
use crate::config::AltaConfig;
use crate::error::TransportError;
use crate::field::FieldKey;
use crate::submission::{classify_response, Submission, SubmissionOutcome};

const DUPLICATE_PATH: &str = "api/verificar-duplicado";
const TAX_ID_PATH: &str = "api/verificar-rfc";
const POSITIONS_PATH: &str = "puestos";
const SUBMIT_PATH: &str = "alta-colaborador";

/// Verification client backed by the onboarding backend
#[derive(Debug, Clone)]
pub struct HttpVerificationClient {
    http: Client,
    base_url: Url,
}

impl HttpVerificationClient {
    /// Create a client for `base_url` (scheme, host, port and an optional
    /// path prefix)
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let mut base_url =
            Url::parse(base_url).map_err(|e| TransportError::Url(format!("{}: {}", base_url, e)))?;

        // Relative joins must land under the prefix, not replace its last segment.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request {
                endpoint: base_url.to_string(),
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { http, base_url })
    }

    pub fn from_config(config: &AltaConfig) -> Result<Self, TransportError> {
        Self::new(&config.base_url, config.http_timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        self.base_url
            .join(path)
            .map_err(|e| TransportError::Url(format!("{}: {}", path, e)))
    }

    /// GET a JSON document
    async fn get<T: DeserializeOwned>(&self, url: Url, endpoint: &str) -> Result<T, TransportError> {
        let response = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| request_error(endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(endpoint, status = status.as_u16(), "Backend returned an error status");
            return Err(TransportError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| request_error(endpoint, e))?;

        serde_json::from_str(&text).map_err(|e| {
            warn!(endpoint, error = %e, "Undecodable backend response");
            TransportError::Decode {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            }
        })
    }

    fn multipart(submission: &Submission) -> Result<Form, TransportError> {
        let mut form = Form::new();
        for (name, value) in submission.fields() {
            form = form.text(name.clone(), value.clone());
        }
        for document in submission.attachments() {
            let part = Part::bytes(document.bytes.clone())
                .file_name(document.file_name.clone())
                .mime_str(&document.content_type)
                .map_err(|e| request_error(SUBMIT_PATH, e))?;
            form = form
                .text("documentos_nombres[]", document.name.clone())
                .part("documentos_archivos[]", part);
        }
        Ok(form)
    }
}

fn request_error(endpoint: &str, e: reqwest::Error) -> TransportError {
    let message = if e.is_timeout() {
        format!("timed out: {}", e)
    } else {
        e.to_string()
    };
    warn!(endpoint, error = %message, "Backend request failed");
    TransportError::Request {
        endpoint: endpoint.to_string(),
        message,
    }
}

fn backend_error(endpoint: &str, message: String) -> TransportError {
    warn!(endpoint, error = %message, "Backend reported an error");
    TransportError::Backend {
        endpoint: endpoint.to_string(),
        message,
    }
}

#[async_trait]
impl VerificationClient for HttpVerificationClient {
    async fn check_duplicate(
        &self,
        field: FieldKey,
        value: &str,
    ) -> Result<DuplicateCheck, TransportError> {
        let mut url = self.endpoint(DUPLICATE_PATH)?;
        url.query_pairs_mut()
            .append_pair("campo", field.wire_name())
            .append_pair("valor", value);

        debug!(field = ?field, "Checking duplicate");
        match self.get::<DuplicateCheckResponse>(url, DUPLICATE_PATH).await? {
            DuplicateCheckResponse::Error { error } => Err(backend_error(DUPLICATE_PATH, error)),
            DuplicateCheckResponse::Answer { duplicate } => Ok(DuplicateCheck {
                field,
                value: value.to_string(),
                duplicate,
            }),
        }
    }

    async fn check_tax_id(&self, tax_id: &str) -> Result<TaxIdLookup, TransportError> {
        let mut url = self.endpoint(TAX_ID_PATH)?;
        url.query_pairs_mut().append_pair("rfc", tax_id);

        debug!("Looking up RFC");
        match self.get::<TaxIdLookupResponse>(url, TAX_ID_PATH).await? {
            TaxIdLookupResponse::Error { error } => Err(backend_error(TAX_ID_PATH, error)),
            TaxIdLookupResponse::Answer {
                exists,
                collaborator,
            } => Ok(TaxIdLookup {
                value: tax_id.to_string(),
                exists,
                existing: if exists { collaborator } else { None },
            }),
        }
    }

    async fn list_positions(&self, area_id: u32) -> Result<Vec<Position>, TransportError> {
        let url = self.endpoint(&format!("{}/{}", POSITIONS_PATH, area_id))?;
        let positions: Vec<PositionDto> = self.get(url, POSITIONS_PATH).await?;
        debug!(area_id, count = positions.len(), "Loaded positions");
        Ok(positions.into_iter().map(Position::from).collect())
    }

    async fn submit(&self, submission: &Submission) -> Result<SubmissionOutcome, TransportError> {
        let url = self.endpoint(SUBMIT_PATH)?;
        let form = Self::multipart(submission)?;

        info!(
            fields = submission.fields().len(),
            attachments = submission.attachments().len(),
            "Submitting onboarding form"
        );
        let response = self
            .http
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| request_error(SUBMIT_PATH, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Submission failed");
            return Err(TransportError::Status {
                endpoint: SUBMIT_PATH.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| request_error(SUBMIT_PATH, e))?;
        let outcome = classify_response(&body);
        info!(accepted = outcome.is_accepted(), "Submission answered");
        Ok(outcome)
    }
}
