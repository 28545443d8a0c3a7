//! Batch indicator report as a DataFrame.

use chrono::NaiveDate;
use fizz_core::{CvmCode, FizzError, IndicatorKind, Result};
use futures::future::join_all;
use polars::prelude::*;
use tracing::{debug, instrument};

use crate::engine::IndicatorEngine;

/// Status of a report row whose indicator was computed.
pub const STATUS_OK: &str = "ok";

impl IndicatorEngine {
    /// Computes every indicator in `kinds` for every company in `cvm_codes`.
    ///
    /// All pairs are evaluated concurrently. The frame has one row per pair,
    /// companies in the given order and indicators in the given order within
    /// each company, with columns:
    ///
    /// - `cvm_code` (u32)
    /// - `indicator` (str): indicator name, e.g. `"roe"`
    /// - `value` (f64, null on failure)
    /// - `status` (str): `"ok"` or the error code of the failure
    /// - `partial` (bool)
    /// - `low_confidence` (bool)
    ///
    /// # Errors
    /// A [`FizzError::StoreUnavailable`] from any pair aborts the whole report;
    /// every other failure is reported in its row.
    #[instrument(skip(self, cvm_codes, kinds), fields(companies = cvm_codes.len(), indicators = kinds.len()))]
    pub async fn report(
        &self,
        cvm_codes: &[CvmCode],
        kinds: &[IndicatorKind],
        as_of: Option<NaiveDate>,
    ) -> Result<DataFrame> {
        let pairs: Vec<(CvmCode, IndicatorKind)> = cvm_codes
            .iter()
            .flat_map(|code| kinds.iter().map(move |kind| (*code, *kind)))
            .collect();

        let outcomes = join_all(
            pairs
                .iter()
                .map(|(code, kind)| self.compute(*kind, *code, as_of)),
        )
        .await;

        let mut codes = Vec::with_capacity(pairs.len());
        let mut names = Vec::with_capacity(pairs.len());
        let mut values: Vec<Option<f64>> = Vec::with_capacity(pairs.len());
        let mut statuses = Vec::with_capacity(pairs.len());
        let mut partial = Vec::with_capacity(pairs.len());
        let mut low_confidence = Vec::with_capacity(pairs.len());

        for ((code, kind), outcome) in pairs.iter().zip(outcomes) {
            codes.push(code.get());
            names.push(kind.name());
            match outcome {
                Ok(result) => {
                    values.push(Some(result.value));
                    statuses.push(STATUS_OK);
                    partial.push(result.partial);
                    low_confidence.push(result.low_confidence);
                }
                Err(e @ FizzError::StoreUnavailable(_)) => return Err(e),
                Err(e) => {
                    values.push(None);
                    statuses.push(e.code());
                    partial.push(false);
                    low_confidence.push(false);
                }
            }
        }

        let df = DataFrame::new(vec![
            Column::new("cvm_code".into(), codes),
            Column::new("indicator".into(), names),
            Column::new("value".into(), values),
            Column::new("status".into(), statuses),
            Column::new("partial".into(), partial),
            Column::new("low_confidence".into(), low_confidence),
        ])
        .map_err(|e| FizzError::Parse(format!("Failed to build report: {}", e)))?;

        debug!(rows = df.height(), "Built indicator report");
        Ok(df)
    }
}
