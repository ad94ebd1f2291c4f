//! Dataset loader: draws seeded, fixed-size train/test samples of labeled
//! reviews from a public corpus or a local copy of one.

mod hub;
mod sampling;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model_manager::default_cache_root;
use crate::sentiment::ReviewRecord;

pub use hub::{HubDataset, DATASETS_SERVER_URL, MAX_PAGE_LENGTH};
pub use sampling::{read_jsonl, shuffled_selection, write_jsonl, RawReview};
use sampling::write_atomic;

pub const DEFAULT_DATASET: &str = "stanfordnlp/imdb";
pub const DEFAULT_CONFIG: &str = "plain_text";

/// Where reviews come from
#[derive(Debug, Clone)]
pub enum DatasetSource {
    Hub(HubDataset),
    /// A directory with one `<split>.jsonl` file per split
    Local { dir: PathBuf },
}

impl DatasetSource {
    pub fn hub(dataset: impl Into<String>, config: impl Into<String>) -> Self {
        DatasetSource::Hub(HubDataset::new(dataset, config))
    }

    pub fn local(dir: impl Into<PathBuf>) -> Self {
        DatasetSource::Local { dir: dir.into() }
    }

    /// Identifier used to key cached samples
    pub fn id(&self) -> String {
        match self {
            DatasetSource::Hub(hub) => format!("hub-{}-{}", hub.dataset(), hub.config()),
            DatasetSource::Local { dir } => format!("local-{}", dir.display()),
        }
    }

    /// Seeded random sample of `n` reviews from `split`: the split is
    /// shuffled with `seed` and the first `n` rows are kept.
    pub async fn sample(&self, split: &str, n: usize, seed: u64) -> Result<Vec<ReviewRecord>> {
        match self {
            DatasetSource::Hub(hub) => {
                let total = hub.num_rows(split).await?;
                let indices = shuffled_selection(total, n, seed);
                hub.fetch_rows(split, &indices).await
            }
            DatasetSource::Local { dir } => {
                let rows = read_jsonl(&dir.join(format!("{}.jsonl", split)))?;
                Ok(shuffled_selection(rows.len(), n, seed)
                    .into_iter()
                    .map(|i| rows[i].clone())
                    .collect())
            }
        }
    }
}

impl Default for DatasetSource {
    fn default() -> Self {
        DatasetSource::hub(DEFAULT_DATASET, DEFAULT_CONFIG)
    }
}

/// How many reviews to draw for each split and with which seed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleConfig {
    pub train_split: String,
    pub test_split: String,
    pub train_size: usize,
    pub test_size: usize,
    pub seed: u64,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            train_split: "train".to_string(),
            test_split: "test".to_string(),
            train_size: 3000,
            test_size: 300,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatasetSamples {
    pub train: Vec<ReviewRecord>,
    pub test: Vec<ReviewRecord>,
}

/// On-disk cache of drawn samples, one JSON-lines file per
/// (source, split, size, seed).
///
/// Each sample file has a manifest recording how many reviews it holds. The
/// manifest is written last, and a sample whose manifest is missing or
/// disagrees with the file is treated as absent.
#[derive(Debug, Clone)]
pub struct SampleCache {
    dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SampleManifest {
    source: String,
    split: String,
    seed: u64,
    requested: usize,
    /// Fewer than `requested` when the split itself is smaller
    count: usize,
}

impl SampleCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn default_location() -> Self {
        Self::new(default_cache_root().join("datasets"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, source_id: &str, split: &str, n: usize, seed: u64) -> PathBuf {
        let source: String = source_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}-{}-n{}-seed{}.jsonl", source, split, n, seed))
    }

    fn manifest_path(sample_path: &Path) -> PathBuf {
        sample_path.with_extension("manifest.json")
    }

    pub fn load(&self, source_id: &str, split: &str, n: usize, seed: u64) -> Result<Option<Vec<ReviewRecord>>> {
        let path = self.path_for(source_id, split, n, seed);
        let manifest_path = Self::manifest_path(&path);
        if !path.exists() || !manifest_path.exists() {
            return Ok(None);
        }

        let manifest: SampleManifest = match serde_json::from_str(&fs::read_to_string(&manifest_path)?) {
            Ok(manifest) => manifest,
            Err(e) => {
                log::warn!("Ignoring unreadable cache manifest {:?}: {}", manifest_path, e);
                return Ok(None);
            }
        };
        let records = match read_jsonl(&path) {
            Ok(records) => records,
            Err(e) => {
                log::warn!("Ignoring unreadable cached sample {:?}: {}", path, e);
                return Ok(None);
            }
        };
        if manifest.requested != n || manifest.count > n || records.len() != manifest.count {
            log::warn!(
                "Cached sample {:?} holds {} reviews, manifest expects {} of {}; refetching",
                path,
                records.len(),
                manifest.count,
                n
            );
            return Ok(None);
        }

        log::info!("Using cached sample {:?}", path);
        Ok(Some(records))
    }

    pub fn store(&self, source_id: &str, split: &str, n: usize, seed: u64, records: &[ReviewRecord]) -> Result<()> {
        let path = self.path_for(source_id, split, n, seed);
        write_jsonl(&path, records)?;

        let manifest = SampleManifest {
            source: source_id.to_string(),
            split: split.to_string(),
            seed,
            requested: n,
            count: records.len(),
        };
        write_atomic(&Self::manifest_path(&path), |writer| {
            serde_json::to_writer_pretty(&mut *writer, &manifest)?;
            Ok(())
        })?;
        log::info!("Cached {} reviews at {:?}", records.len(), path);
        Ok(())
    }
}

async fn sample_split(
    source: &DatasetSource,
    split: &str,
    n: usize,
    seed: u64,
    cache: Option<&SampleCache>,
) -> Result<Vec<ReviewRecord>> {
    let source_id = source.id();
    if let Some(cache) = cache {
        if let Some(records) = cache.load(&source_id, split, n, seed)? {
            return Ok(records);
        }
    }

    let records = source.sample(split, n, seed).await?;
    if let Some(cache) = cache {
        cache.store(&source_id, split, n, seed, &records)?;
    }
    Ok(records)
}

/// Draws the train and test samples described by `config`.
pub async fn load_samples(
    source: &DatasetSource,
    config: &SampleConfig,
    cache: Option<&SampleCache>,
) -> Result<DatasetSamples> {
    let train = sample_split(source, &config.train_split, config.train_size, config.seed, cache).await?;
    let test = sample_split(source, &config.test_split, config.test_size, config.seed, cache).await?;
    log::info!(
        "Sampled {} train / {} test reviews from {} (seed {})",
        train.len(),
        test.len(),
        source.id(),
        config.seed
    );
    Ok(DatasetSamples { train, test })
}
