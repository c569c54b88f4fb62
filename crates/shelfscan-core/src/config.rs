use std::path::{Path, PathBuf};

pub const DEFAULT_SCAN_BATCH_SIZE: usize = 50;
pub const DEFAULT_EXPORT_PAGE_SIZE: usize = 50;
pub const DEFAULT_REFERENCE_CHANNEL_CAPACITY: usize = 64;

/// Sizing knobs shared by the pipelines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Scans per bulk insert during ingestion.
    pub scan_batch_size: usize,
    /// Comparison rows read per page during export.
    pub export_page_size: usize,
    /// Reference rows buffered between the CSV reader and the comparison engine.
    pub reference_channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scan_batch_size: DEFAULT_SCAN_BATCH_SIZE,
            export_page_size: DEFAULT_EXPORT_PAGE_SIZE,
            reference_channel_capacity: DEFAULT_REFERENCE_CHANNEL_CAPACITY,
        }
    }
}

impl PipelineConfig {
    /// Clamps every size to at least one.
    pub fn normalized(self) -> Self {
        Self {
            scan_batch_size: self.scan_batch_size.max(1),
            export_page_size: self.export_page_size.max(1),
            reference_channel_capacity: self.reference_channel_capacity.max(1),
        }
    }
}

/// Where uploaded artifacts and exports live on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    pub scans_dir: PathBuf,
    pub references_dir: PathBuf,
    pub exports_dir: PathBuf,
}

impl StorageLayout {
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            scans_dir: root.join("bulk-uploaded-scans"),
            references_dir: root.join("comparison-files"),
            exports_dir: root.join("exported-reports"),
        }
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self::under(".")
    }
}
