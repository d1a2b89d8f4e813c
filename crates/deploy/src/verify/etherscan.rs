//! Etherscan v1 contract verification API.
//!
//! The same API is served by bscscan and polygonscan.

use std::time::Duration;

use anyhow::Context;
use backon::{ConstantBuilder, Retryable};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{VerificationOutcome, VerificationRequest, VerificationService, VerifyError};
use crate::network::{ExplorerConfig, Secret};

const SOURCE_FORMAT: &str = "solidity-standard-json-input";

/// Polling and retry behaviour of [`EtherscanVerifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierSettings {
    /// Delay between submission retries and between status checks.
    #[serde(with = "crate::config::duration_secs")]
    pub poll_interval: Duration,
    /// Submission attempts while the explorer has not indexed the bytecode yet.
    pub submit_attempts: usize,
    /// Status checks before giving up on a pending verification.
    pub status_checks: usize,
    /// HTTP request timeout.
    #[serde(with = "crate::config::duration_secs")]
    pub request_timeout: Duration,
}

impl Default for VerifierSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            submit_attempts: 12,
            status_checks: 60,
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: serde_json::Value,
}

impl ApiResponse {
    fn ok(&self) -> bool {
        self.status == "1"
    }

    fn result_text(&self) -> String {
        match &self.result {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => self.message.clone(),
            other => other.to_string(),
        }
    }
}

enum Submission {
    Guid(String),
    AlreadyVerified,
}

/// [`VerificationService`] for Etherscan-compatible explorers.
#[derive(Debug, Clone)]
pub struct EtherscanVerifier {
    client: reqwest::Client,
    api_url: Url,
    api_key: Secret,
    settings: VerifierSettings,
}

impl EtherscanVerifier {
    pub fn new(api_url: Url, api_key: Secret, settings: VerifierSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_url,
            api_key,
            settings,
        })
    }

    /// Build a verifier for an explorer, if it has an API key.
    pub fn for_explorer(
        explorer: &ExplorerConfig,
        settings: VerifierSettings,
    ) -> anyhow::Result<Option<Self>> {
        match &explorer.api_key {
            Some(key) => Self::new(explorer.api_url.clone(), key.clone(), settings).map(Some),
            None => Ok(None),
        }
    }

    fn backoff(&self, attempts: usize) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(self.settings.poll_interval)
            .with_max_times(attempts.saturating_sub(1))
    }

    async fn submit(&self, request: &VerificationRequest) -> Result<Submission, VerifyError> {
        let source = serde_json::to_string(&request.input)
            .context("Failed to serialize compiler input")
            .map_err(VerifyError::Transport)?;
        let address = request.address.to_checksum(None);
        let constructor_args = hex::encode(&request.constructor_args);

        let form = [
            ("apikey", self.api_key.expose()),
            ("module", "contract"),
            ("action", "verifysourcecode"),
            ("contractaddress", address.as_str()),
            ("sourceCode", source.as_str()),
            ("codeformat", SOURCE_FORMAT),
            ("contractname", request.contract_name.as_str()),
            ("compilerversion", request.compiler_version.as_str()),
            ("constructorArguements", constructor_args.as_str()),
        ];

        let response: ApiResponse = self
            .client
            .post(self.api_url.clone())
            .form(&form)
            .send()
            .await
            .context("Failed to send verification request")
            .map_err(VerifyError::Transport)?
            .json()
            .await
            .context("Failed to parse verification response")
            .map_err(VerifyError::Transport)?;

        let result = response.result_text();
        if response.ok() {
            return Ok(Submission::Guid(result));
        }

        let lowered = result.to_lowercase();
        if lowered.contains("already verified") {
            Ok(Submission::AlreadyVerified)
        } else if lowered.contains("unable to locate contractcode") {
            Err(VerifyError::NotIndexed(result))
        } else {
            Err(VerifyError::Api(result))
        }
    }

    async fn check_status(&self, guid: &str) -> Result<VerificationOutcome, VerifyError> {
        let response: ApiResponse = self
            .client
            .get(self.api_url.clone())
            .query(&[
                ("apikey", self.api_key.expose()),
                ("module", "contract"),
                ("action", "checkverifystatus"),
                ("guid", guid),
            ])
            .send()
            .await
            .context("Failed to send verification status request")
            .map_err(VerifyError::Transport)?
            .json()
            .await
            .context("Failed to parse verification status response")
            .map_err(VerifyError::Transport)?;

        let result = response.result_text();
        let lowered = result.to_lowercase();

        if lowered.contains("pending in queue") {
            Err(VerifyError::StillPending(result))
        } else if lowered.contains("already verified") {
            Ok(VerificationOutcome::AlreadyVerified)
        } else if lowered.contains("pass - verified") {
            Ok(VerificationOutcome::Verified)
        } else if lowered.starts_with("fail") {
            Err(VerifyError::Rejected(result))
        } else if response.ok() {
            Ok(VerificationOutcome::Verified)
        } else {
            Err(VerifyError::Api(result))
        }
    }
}

impl VerificationService for EtherscanVerifier {
    async fn verify(
        &self,
        request: &VerificationRequest,
    ) -> Result<VerificationOutcome, VerifyError> {
        tracing::info!(
            address = %request.address,
            contract = %request.contract_name,
            compiler = %request.compiler_version,
            explorer = %self.api_url,
            "Submitting source for verification"
        );

        let submission = (|| self.submit(request))
            .retry(self.backoff(self.settings.submit_attempts))
            .when(|e| matches!(e, VerifyError::NotIndexed(_)))
            .notify(|e, delay| {
                tracing::debug!(
                    error = %e,
                    delay = ?delay,
                    "Explorer has not indexed the contract yet, retrying"
                );
            })
            .await?;

        let guid = match submission {
            Submission::Guid(guid) => guid,
            Submission::AlreadyVerified => return Ok(VerificationOutcome::AlreadyVerified),
        };
        tracing::debug!(guid = %guid, "Verification submitted");

        (|| self.check_status(&guid))
            .retry(self.backoff(self.settings.status_checks))
            .when(|e| matches!(e, VerifyError::StillPending(_)))
            .notify(|_, delay| {
                tracing::trace!(guid = %guid, delay = ?delay, "Verification pending");
            })
            .await
    }
}
