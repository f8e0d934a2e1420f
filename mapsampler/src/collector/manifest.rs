//! The CSV dataset written at the end of a run.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::error::CollectorError;
use super::labels::SampleRecord;

/// Ordered sample records of one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    dataset_id: String,
    columns: Vec<String>,
    records: Vec<SampleRecord>,
}

impl Manifest {
    pub fn new(dataset_id: impl Into<String>, label_columns: &[&str]) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            columns: label_columns.iter().map(|c| c.to_string()).collect(),
            records: Vec::new(),
        }
    }

    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    /// `id` followed by the label columns.
    pub fn header(&self) -> Vec<&str> {
        std::iter::once("id")
            .chain(self.columns.iter().map(String::as_str))
            .collect()
    }

    pub fn push(&mut self, record: SampleRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[SampleRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `<dataset_id>.csv`
    pub fn file_name(&self) -> String {
        format!("{}.csv", self.dataset_id)
    }

    /// Drops records whose image is not in `dir`. Returns how many were dropped.
    pub async fn retain_existing(&mut self, dir: &Path) -> usize {
        let before = self.records.len();
        let mut kept = Vec::with_capacity(before);
        for record in self.records.drain(..) {
            let path = dir.join(&record.image_file_name);
            if tokio::fs::metadata(&path).await.is_ok_and(|meta| meta.is_file()) {
                kept.push(record);
            }
        }
        self.records = kept;
        let dropped = before - self.records.len();
        if dropped > 0 {
            debug!(dropped, "Dropped manifest records without an image");
        }
        dropped
    }

    /// Writes `dir/<dataset_id>.csv` and returns its path.
    pub fn write_csv(&self, dir: &Path) -> Result<PathBuf, CollectorError> {
        let path = dir.join(self.file_name());
        let manifest_error = |source| CollectorError::Manifest {
            path: path.clone(),
            source,
        };

        let mut writer = csv::Writer::from_path(&path).map_err(manifest_error)?;
        writer.write_record(self.header()).map_err(manifest_error)?;
        for record in &self.records {
            let row = std::iter::once(record.id.as_str()).chain(record.labels.iter().map(String::as_str));
            writer.write_record(row).map_err(manifest_error)?;
        }
        writer.flush().map_err(|e| manifest_error(e.into()))?;

        info!(path = %path.display(), records = self.records.len(), "Manifest written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn record(file: &str, hard: bool) -> SampleRecord {
        SampleRecord::for_image(file, vec![hard.to_string()])
    }

    #[test]
    fn test_header_and_file_name() {
        let manifest = Manifest::new("runways", &["hard"]);
        assert_eq!(manifest.header(), vec!["id", "hard"]);
        assert_eq!(manifest.file_name(), "runways.csv");
        assert!(manifest.is_empty());
    }

    #[tokio::test]
    async fn test_retain_existing() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("1_0.png"), b"png").unwrap();

        let mut manifest = Manifest::new("runways", &["hard"]);
        manifest.push(record("1_0.png", true));
        manifest.push(record("2_0.png", false));

        assert_eq!(manifest.retain_existing(temp.path()).await, 1);
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest.records()[0].image_file_name, "1_0.png");
    }

    #[test]
    fn test_write_csv() {
        let temp = TempDir::new().unwrap();
        let mut manifest = Manifest::new("runways", &["hard"]);
        manifest.push(record("42_0.png", true));
        manifest.push(record("7_0.png", false));

        let path = manifest.write_csv(temp.path()).unwrap();

        assert_eq!(path, temp.path().join("runways.csv"));
        assert_eq!(
            fs::read_to_string(path).unwrap(),
            "id,hard\n42_0.png,true\n7_0.png,false\n"
        );
    }

    #[test]
    fn test_write_csv_quotes_fields() {
        let temp = TempDir::new().unwrap();
        let mut manifest = Manifest::new("odd", &["label"]);
        manifest.push(SampleRecord::for_image("a_0.png", vec!["x,y".to_string()]));

        let path = manifest.write_csv(temp.path()).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "id,label\na_0.png,\"x,y\"\n");
    }

    #[test]
    fn test_write_into_missing_dir_fails() {
        let temp = TempDir::new().unwrap();
        let manifest = Manifest::new("runways", &["hard"]);
        let result = manifest.write_csv(&temp.path().join("missing"));
        assert!(matches!(result, Err(CollectorError::Manifest { .. })));
    }
}
