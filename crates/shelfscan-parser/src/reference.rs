use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};

use crate::errors::ParserError;
use crate::model::ReferenceRow;

const LOCATION_COLUMN: &str = "location";
const ITEM_COLUMN: &str = "item";

/// Row-at-a-time reader over a reference inventory CSV.
///
/// The header is read and validated on construction; iteration yields data
/// rows until end of file. Rows must have as many columns as the header.
pub struct ReferenceReader<R: Read> {
    records: csv::Reader<R>,
    record: StringRecord,
}

impl ReferenceReader<File> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ParserError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ParserError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file)
    }
}

impl<R: Read> ReferenceReader<R> {
    pub fn from_reader(reader: R) -> Result<Self, ParserError> {
        let mut records = ReaderBuilder::new().has_headers(false).from_reader(reader);

        let mut header = StringRecord::new();
        if !records.read_record(&mut header)? {
            return Err(ParserError::MissingHeader);
        }
        validate_header(&header)?;

        Ok(Self {
            records,
            record: StringRecord::new(),
        })
    }

    fn read_row(&mut self) -> Result<Option<ReferenceRow>, ParserError> {
        if !self.records.read_record(&mut self.record)? {
            return Ok(None);
        }

        let line = self
            .record
            .position()
            .map(|position| position.line())
            .unwrap_or_default();
        let location = self
            .record
            .get(0)
            .ok_or(ParserError::MissingColumn { line, column: 0 })?;
        let item = self
            .record
            .get(1)
            .ok_or(ParserError::MissingColumn { line, column: 1 })?;

        Ok(Some(ReferenceRow::new(location, item, line)))
    }
}

impl<R: Read> Iterator for ReferenceReader<R> {
    type Item = Result<ReferenceRow, ParserError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_row().transpose()
    }
}

/// Columns 0 and 1 must be `location` and `item`, ignoring case. Further
/// columns are allowed and ignored.
pub fn validate_header(header: &StringRecord) -> Result<(), ParserError> {
    let matches = |index: usize, expected: &str| {
        header
            .get(index)
            .is_some_and(|column| column.eq_ignore_ascii_case(expected))
    };

    if matches(0, LOCATION_COLUMN) && matches(1, ITEM_COLUMN) {
        Ok(())
    } else {
        Err(ParserError::InvalidHeader {
            found: header.iter().map(str::to_string).collect(),
        })
    }
}
