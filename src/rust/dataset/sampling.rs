use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SentimentError};
use crate::sentiment::{ReviewRecord, Sentiment};

/// A review row as stored by the corpus: integer label, 0 = negative, 1 = positive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawReview {
    pub text: String,
    pub label: i64,
}

impl RawReview {
    pub fn into_record(self) -> Result<ReviewRecord> {
        Ok(ReviewRecord {
            label: Sentiment::from_label_id(self.label)?,
            text: self.text,
        })
    }
}

impl From<&ReviewRecord> for RawReview {
    fn from(record: &ReviewRecord) -> Self {
        Self {
            text: record.text.clone(),
            label: record.label.class_index() as i64,
        }
    }
}

/// Shuffles `0..num_rows` with a ChaCha8 RNG seeded by `seed` and keeps the
/// first `n` indices, in shuffled order. Asking for more rows than exist
/// returns the whole range shuffled.
pub fn shuffled_selection(num_rows: usize, n: usize, seed: u64) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..num_rows).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    indices.truncate(n);
    indices
}

/// Reads `{"text": .., "label": 0|1}` lines. Blank lines are skipped.
pub fn read_jsonl(path: &Path) -> Result<Vec<ReviewRecord>> {
    let file = fs::File::open(path).map_err(|e| {
        SentimentError::DatasetError(format!("Failed to open {:?}: {}", path, e))
    })?;

    let mut records = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let raw: RawReview = serde_json::from_str(&line).map_err(|e| {
            SentimentError::DatasetError(format!("{:?} line {}: {}", path, line_no + 1, e))
        })?;
        records.push(raw.into_record()?);
    }
    Ok(records)
}

/// Writes records as JSON lines. The file is written next to `path` and
/// renamed into place, so readers never observe a partial file.
pub fn write_jsonl(path: &Path, records: &[ReviewRecord]) -> Result<()> {
    write_atomic(path, |writer| {
        for record in records {
            serde_json::to_writer(&mut *writer, &RawReview::from(record))?;
            writer.write_all(b"\n")?;
        }
        Ok(())
    })
}

pub(crate) fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&mut fs::File>) -> Result<()>,
{
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write(&mut writer)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_is_reproducible() {
        let a = shuffled_selection(1000, 50, 42);
        let b = shuffled_selection(1000, 50, 42);
        let c = shuffled_selection(1000, 50, 43);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 50);
        assert!(a.iter().all(|&i| i < 1000));

        let mut unique = a.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), 50);
    }

    #[test]
    fn test_selection_larger_than_split() {
        let mut all = shuffled_selection(5, 10, 1);
        all.sort_unstable();
        assert_eq!(all, vec![0, 1, 2, 3, 4]);
        assert!(shuffled_selection(0, 3, 1).is_empty());
    }

    #[test]
    fn test_jsonl_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("train.jsonl");
        let records = vec![
            ReviewRecord::new("loved it", Sentiment::Positive),
            ReviewRecord::new("line\nbreak \"quoted\"", Sentiment::Negative),
        ];
        write_jsonl(&path, &records).unwrap();
        assert_eq!(read_jsonl(&path).unwrap(), records);
    }

    #[test]
    fn test_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.jsonl");
        fs::write(&path, "partial line without newline").unwrap();

        let records = vec![ReviewRecord::new("fine", Sentiment::Positive)];
        write_jsonl(&path, &records).unwrap();
        assert_eq!(read_jsonl(&path).unwrap(), records);
        // Only the target file remains in the directory
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_jsonl_rejects_unknown_label() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        fs::write(&path, "{\"text\":\"ok\",\"label\":1}\n\n{\"text\":\"??\",\"label\":7}\n").unwrap();
        assert!(matches!(read_jsonl(&path), Err(SentimentError::DatasetError(_))));
    }
}
