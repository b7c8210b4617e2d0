//! Time-series source with a tiered fallback ladder
//!
//! A batch is fetched with one strategy at a time, in ladder order, stopping
//! at the first strategy under which every non-blank site succeeds:
//!
//! 1. `Daily30d` - 30-day daily means ending today (UTC)
//! 2. `Instantaneous` - latest instantaneous value
//! 3. `Canned` - embedded placeholder document, never fails
//!
//! The whole batch shares one fallback decision: one failing site moves every
//! site to the next rung. Within a rung, sites are fetched concurrently (bounded)
//! and each request carries its own timeout, so a slow or failing site does
//! not hold up the others' requests.
//!
//! Blank site ids keep their slot as `None` so results stay index-aligned
//! with the input.

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::error::DetectError;
use crate::models::DataOrigin;
use crate::types::{RawDocument, TimeSeriesProvider};
use std::sync::Arc;

const CANNED_DOCUMENT: &str = include_str!("canned_discharge.json");

/// Ladder used for dataset preprocessing
pub const FULL_LADDER: [DataOrigin; 3] = [
    DataOrigin::Daily30d,
    DataOrigin::Instantaneous,
    DataOrigin::Canned,
];

/// Ladder used for single-site detection, which needs the latest value
///
/// No canned rung: the placeholder belongs to a fixed gauge, so substituting
/// it would report another site's reading under the requested id.
pub const LATEST_LADDER: [DataOrigin; 1] = [DataOrigin::Instantaneous];

/// The placeholder document substituted when every provider request fails
pub fn canned_document() -> RawDocument {
    RawDocument::new(CANNED_DOCUMENT.trim_end().as_bytes().to_vec())
}

/// One document slot per requested site, plus the rung that produced them
#[derive(Debug, Clone)]
pub struct SourcedBatch {
    pub documents: Vec<Option<RawDocument>>,
    pub origin: DataOrigin,
}

/// Fetches raw documents for a batch of sites
pub struct TimeSeriesSource {
    provider: Arc<dyn TimeSeriesProvider>,
    max_concurrency: usize,
}

impl TimeSeriesSource {
    pub fn new(provider: Arc<dyn TimeSeriesProvider>, max_concurrency: usize) -> Self {
        Self {
            provider,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Fetch with the full daily → instantaneous → canned ladder
    pub async fn fetch_batch(
        &self,
        site_ids: &[String],
        parameter_code: &str,
    ) -> Result<SourcedBatch, DetectError> {
        self.fetch_batch_with(site_ids, parameter_code, &FULL_LADDER)
            .await
    }

    /// Fetch with an explicit ladder
    ///
    /// # Errors
    /// - `Configuration` if `site_ids` is empty
    /// - `ProviderFetch` if every rung failed (only possible without `Canned`)
    pub async fn fetch_batch_with(
        &self,
        site_ids: &[String],
        parameter_code: &str,
        ladder: &[DataOrigin],
    ) -> Result<SourcedBatch, DetectError> {
        if site_ids.is_empty() {
            return Err(DetectError::Configuration(
                "at least one site id is required".to_string(),
            ));
        }

        let mut last_error = None;

        for &strategy in ladder {
            match self.attempt(strategy, site_ids, parameter_code).await {
                Ok(documents) => {
                    if strategy.is_canned() {
                        warn!(
                            sites = ?site_ids,
                            parameter = parameter_code,
                            "All provider requests failed, substituting canned placeholder document"
                        );
                    } else {
                        info!(
                            sites = site_ids.len(),
                            origin = %strategy,
                            "Fetched time series batch"
                        );
                    }
                    return Ok(SourcedBatch {
                        documents,
                        origin: strategy,
                    });
                }
                Err(e) => {
                    warn!(origin = %strategy, error = %e, "Fetch strategy failed for batch");
                    last_error = Some(e);
                }
            }
        }

        Err(DetectError::ProviderFetch(
            last_error.unwrap_or_else(|| "no fetch strategy configured".to_string()),
        ))
    }

    async fn attempt(
        &self,
        strategy: DataOrigin,
        site_ids: &[String],
        parameter_code: &str,
    ) -> Result<Vec<Option<RawDocument>>, String> {
        let Some(granularity) = strategy.granularity() else {
            return Ok(site_ids
                .iter()
                .map(|site| (!site.trim().is_empty()).then(canned_document))
                .collect());
        };

        let results: Vec<Result<Option<RawDocument>, String>> =
            stream::iter(site_ids.iter().cloned().enumerate())
                .map(|(index, site_id)| {
                    let provider = Arc::clone(&self.provider);
                    let parameter_code = parameter_code.to_string();
                    async move {
                        let site_id = site_id.trim();
                        if site_id.is_empty() {
                            debug!(index, "Blank site id, leaving slot empty");
                            return Ok(None);
                        }

                        debug!(site_id, %granularity, "Fetching time series");
                        match provider
                            .fetch_series(site_id, &parameter_code, granularity)
                            .await
                        {
                            Ok(document) => Ok(Some(document)),
                            Err(e) => {
                                warn!(site_id, %granularity, error = %e, "Time series request failed");
                                Err(format!("{} ({}): {}", site_id, granularity, e))
                            }
                        }
                    }
                })
                .buffered(self.max_concurrency)
                .collect()
                .await;

        results.into_iter().collect()
    }
}
