use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::worker::{EvaluationJob, EvaluationQueue};
use crate::domain::entities::sample::{NewSample, Sample};
use crate::domain::ports::store::{EnclosureDirectory, SampleStore, StoreError};

/// Relative humidity bounds, in %RH.
const HUMIDITY_RANGE: std::ops::RangeInclusive<f64> = 0.0..=100.0;

/// Sample payload as submitted by a sensor gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestRequest {
    pub enclosure_id: i64,
    pub temperature: f64,
    pub humidity: f64,
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("invalid sample: {0}")]
    Invalid(String),
    #[error("unknown enclosure: {0}")]
    UnknownEnclosure(i64),
    #[error("enclosure lookup failed: {0}")]
    Lookup(#[source] StoreError),
    #[error("failed to persist sample: {0}")]
    Persistence(#[source] StoreError),
}

/// Entry point of the pipeline: validate → persist → hand off for evaluation.
///
/// Success is defined by persistence. Whatever happens to the sample after
/// it is stored is invisible to the caller.
pub struct IngestService {
    enclosures: Arc<dyn EnclosureDirectory>,
    samples: Arc<dyn SampleStore>,
    queue: EvaluationQueue,
}

impl IngestService {
    #[must_use]
    pub fn new(
        enclosures: Arc<dyn EnclosureDirectory>,
        samples: Arc<dyn SampleStore>,
        queue: EvaluationQueue,
    ) -> Self {
        Self {
            enclosures,
            samples,
            queue,
        }
    }

    /// Accept one reading.
    ///
    /// # Errors
    ///
    /// Returns `IngestError::Invalid` or `IngestError::UnknownEnclosure` for
    /// rejected payloads (nothing is stored), and `IngestError::Lookup` or
    /// `IngestError::Persistence` when the store is unavailable.
    pub async fn ingest(&self, request: IngestRequest) -> Result<Sample, IngestError> {
        validate(&request)?;

        let enclosure = self
            .enclosures
            .get_enclosure(request.enclosure_id)
            .map_err(IngestError::Lookup)?
            .ok_or(IngestError::UnknownEnclosure(request.enclosure_id))?;

        let sample = self
            .samples
            .insert_sample(&NewSample::now(
                enclosure.id,
                request.temperature,
                request.humidity,
            ))
            .map_err(IngestError::Persistence)?;

        tracing::debug!(
            sample_id = sample.id,
            enclosure_id = enclosure.id,
            temperature = sample.temperature,
            humidity = sample.humidity,
            "sample recorded"
        );

        if let Err(e) = self
            .queue
            .submit(EvaluationJob {
                sample: sample.clone(),
                enclosure,
            })
            .await
        {
            tracing::error!("{e}");
        }

        Ok(sample)
    }
}

fn validate(request: &IngestRequest) -> Result<(), IngestError> {
    if !request.temperature.is_finite() {
        return Err(IngestError::Invalid("temperature must be a finite number".into()));
    }
    if !request.humidity.is_finite() || !HUMIDITY_RANGE.contains(&request.humidity) {
        return Err(IngestError::Invalid(format!(
            "humidity must be between {} and {} %RH",
            HUMIDITY_RANGE.start(),
            HUMIDITY_RANGE.end()
        )));
    }
    Ok(())
}
