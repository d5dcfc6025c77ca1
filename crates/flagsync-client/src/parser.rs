//! Configuration payload parsing
//!
//! Turns a raw fetch result into a validated [`Configuration`] snapshot:
//! envelope split, signature verification, ownership check, structural
//! decode into typed wire structs, and mapping onto the model. `parse` is a
//! total function; every failure becomes a single error notification and
//! `None`, never a panic.

use crate::fetch::{FetchResult, FetchSource};
use crate::settings::SdkSettings;
use crate::signature::SignatureVerifier;
use chrono::{DateTime, Utc};
use flagsync_core::{
    Configuration, ConfigurationFetchedInvoker, Experiment, FetcherError, TargetGroup,
};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Signed envelope wrapping CDN/API/embedded payloads
#[derive(Debug, Deserialize)]
struct Envelope {
    /// Inner configuration document, as the exact string that was signed
    data: String,
    #[serde(rename = "signature_v0")]
    signature: String,
    #[serde(rename = "signed_date", default)]
    signed_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    application: Option<String>,
    #[serde(default)]
    experiments: Vec<RawExperiment>,
    #[serde(rename = "targetGroups", default)]
    target_groups: Vec<RawTargetGroup>,
}

#[derive(Debug, Deserialize)]
struct RawExperiment {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    #[serde(default)]
    archived: bool,
    #[serde(rename = "deploymentConfiguration", default)]
    deployment_configuration: Option<RawDeploymentConfiguration>,
    #[serde(rename = "featureFlags", default)]
    feature_flags: Vec<RawFeatureFlag>,
    #[serde(default)]
    labels: BTreeSet<String>,
    #[serde(rename = "stickinessProperty", default)]
    stickiness_property: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDeploymentConfiguration {
    condition: String,
}

#[derive(Debug, Deserialize)]
struct RawFeatureFlag {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawTargetGroup {
    #[serde(rename = "_id")]
    id: String,
    condition: String,
}

impl From<RawExperiment> for Experiment {
    fn from(raw: RawExperiment) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            condition: raw
                .deployment_configuration
                .map(|d| d.condition)
                .unwrap_or_default(),
            archived: raw.archived,
            flags: raw.feature_flags.into_iter().map(|f| f.name).collect(),
            labels: raw.labels,
            stickiness_property: raw.stickiness_property,
        }
    }
}

impl From<RawTargetGroup> for TargetGroup {
    fn from(raw: RawTargetGroup) -> Self {
        Self {
            id: raw.id,
            condition: raw.condition,
        }
    }
}

/// Validating parser from raw fetch results to configuration snapshots
pub struct ConfigurationParser {
    verifier: Arc<dyn SignatureVerifier>,
    invoker: Arc<ConfigurationFetchedInvoker>,
}

impl fmt::Debug for ConfigurationParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationParser").finish()
    }
}

impl ConfigurationParser {
    /// Create a parser using `verifier` for envelope authentication
    #[must_use]
    pub fn new(
        verifier: Arc<dyn SignatureVerifier>,
        invoker: Arc<ConfigurationFetchedInvoker>,
    ) -> Self {
        Self { verifier, invoker }
    }

    /// Parse and validate a fetch result
    ///
    /// On any failure the matching [`FetcherError`] is announced through the
    /// invoker exactly once and `None` is returned; the caller keeps the
    /// previous snapshot.
    #[must_use]
    pub fn parse(&self, fetch_result: &FetchResult, settings: &SdkSettings) -> Option<Configuration> {
        match self.try_parse(fetch_result, settings) {
            Ok(configuration) => Some(configuration),
            Err(error) => {
                warn!(%error, source = %fetch_result.source, "configuration parse failed");
                self.invoker.invoke_error(error);
                None
            }
        }
    }

    fn try_parse(
        &self,
        fetch_result: &FetchResult,
        settings: &SdkSettings,
    ) -> Result<Configuration, FetcherError> {
        // Roxy serves the plain inner document with no envelope; everything
        // else is signed and owned by an application key.
        let verified = fetch_result.source != FetchSource::Roxy;

        let (document, signed_at) = if verified {
            let envelope: Envelope = serde_json::from_str(&fetch_result.body)
                .map_err(|_| FetcherError::CorruptPayload)?;

            if !self.verifier.verify(envelope.data.as_bytes(), &envelope.signature) {
                debug!(
                    payload = %envelope.data,
                    signature = %envelope.signature,
                    "configuration signature rejected"
                );
                return Err(FetcherError::SignatureVerification);
            }

            (envelope.data, parse_signed_date(envelope.signed_date.as_deref()))
        } else {
            (fetch_result.body.clone(), None)
        };

        let raw: RawDocument =
            serde_json::from_str(&document).map_err(|_| FetcherError::CorruptPayload)?;

        if verified && raw.application.as_deref() != Some(settings.api_key.as_str()) {
            return Err(FetcherError::MismatchAppKey);
        }

        Ok(Configuration::new(
            raw.experiments.into_iter().map(Experiment::from).collect(),
            raw.target_groups
                .into_iter()
                .map(TargetGroup::from)
                .collect(),
            signed_at,
        ))
    }
}

fn parse_signed_date(signed_date: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = signed_date?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(date) => Some(date.with_timezone(&Utc)),
        Err(e) => {
            warn!(signed_date = raw, error = %e, "unparsable signed date, dropping it");
            None
        }
    }
}
