//! Client for the Hugging Face datasets-server rows API.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Deserialize;

use super::sampling::RawReview;
use crate::error::{Result, SentimentError};
use crate::sentiment::ReviewRecord;

pub const DATASETS_SERVER_URL: &str = "https://datasets-server.huggingface.co";

/// Largest `length` the rows endpoint accepts
pub const MAX_PAGE_LENGTH: usize = 100;

#[derive(Debug, Deserialize)]
pub(crate) struct RowsPage {
    pub rows: Vec<RowEntry>,
    pub num_rows_total: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RowEntry {
    pub row_idx: usize,
    pub row: RawReview,
    /// Columns the server shortened to fit its response size limit
    #[serde(default)]
    pub truncated_cells: Vec<String>,
}

/// A public corpus served by the datasets-server, e.g. `stanfordnlp/imdb`.
#[derive(Debug, Clone)]
pub struct HubDataset {
    client: reqwest::Client,
    base_url: String,
    dataset: String,
    config: String,
}

impl HubDataset {
    pub fn new(dataset: impl Into<String>, config: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DATASETS_SERVER_URL.to_string(),
            dataset: dataset.into(),
            config: config.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn config(&self) -> &str {
        &self.config
    }

    async fn fetch_page(&self, split: &str, offset: usize, length: usize) -> Result<RowsPage> {
        let offset = offset.to_string();
        let length = length.to_string();
        log::debug!("GET rows {}/{} split={} offset={} length={}", self.dataset, self.config, split, offset, length);

        let response = self
            .client
            .get(format!("{}/rows", self.base_url))
            .query(&[
                ("dataset", self.dataset.as_str()),
                ("config", self.config.as_str()),
                ("split", split),
                ("offset", offset.as_str()),
                ("length", length.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json::<RowsPage>().await?)
    }

    /// Total number of rows in `split`.
    pub async fn num_rows(&self, split: &str) -> Result<usize> {
        Ok(self.fetch_page(split, 0, 1).await?.num_rows_total)
    }

    /// Fetches the rows at `indices`, returned in the same order.
    ///
    /// Only the pages that contain a requested index are downloaded.
    pub async fn fetch_rows(&self, split: &str, indices: &[usize]) -> Result<Vec<ReviewRecord>> {
        let wanted: HashSet<usize> = indices.iter().copied().collect();
        let pages: BTreeSet<usize> = indices.iter().map(|i| i / MAX_PAGE_LENGTH).collect();
        log::info!(
            "Fetching {} rows of {}/{} split '{}' ({} pages)",
            indices.len(),
            self.dataset,
            self.config,
            split,
            pages.len()
        );

        let mut rows: HashMap<usize, ReviewRecord> = HashMap::with_capacity(indices.len());
        for page in pages {
            let fetched = self.fetch_page(split, page * MAX_PAGE_LENGTH, MAX_PAGE_LENGTH).await?;
            collect_rows(fetched, &wanted, &mut rows)?;
        }

        indices
            .iter()
            .map(|idx| {
                rows.get(idx).cloned().ok_or_else(|| {
                    SentimentError::DatasetError(format!("Row {} missing from split '{}'", idx, split))
                })
            })
            .collect()
    }
}

fn collect_rows(
    page: RowsPage,
    wanted: &HashSet<usize>,
    rows: &mut HashMap<usize, ReviewRecord>,
) -> Result<()> {
    for entry in page.rows {
        if !wanted.contains(&entry.row_idx) {
            continue;
        }
        if entry.truncated_cells.iter().any(|cell| cell == "text") {
            return Err(SentimentError::DatasetError(format!(
                "Row {} was served with a truncated review text",
                entry.row_idx
            )));
        }
        rows.insert(entry.row_idx, entry.row.into_record()?);
    }
    Ok(())
}
