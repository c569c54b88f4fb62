use serde::{Deserialize, Serialize};

/// One element of a robot scan dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEntry {
    pub name: String,
    pub scanned: bool,
    pub occupied: bool,
    #[serde(default)]
    pub detected_barcodes: Vec<String>,
}

/// One data row of the operator's reference inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceRow {
    pub location: String,
    pub expected_barcode: Option<String>,
    pub line: u64,
}

impl ReferenceRow {
    pub fn new(location: impl Into<String>, item: &str, line: u64) -> Self {
        let expected_barcode = if item.is_empty() {
            None
        } else {
            Some(item.to_string())
        };
        Self {
            location: location.into(),
            expected_barcode,
            line,
        }
    }

    /// Blank item cells yield an empty list, anything else a single entry.
    pub fn expected_barcodes(&self) -> Vec<String> {
        self.expected_barcode.iter().cloned().collect()
    }
}
