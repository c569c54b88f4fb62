use tokio::io::BufReader;

use crate::errors::ParserError;
use crate::json_array::JsonArrayReader;
use crate::model::ScanEntry;
use crate::reference::ReferenceReader;

async fn read_all(document: &str, capacity: usize) -> Result<Vec<ScanEntry>, ParserError> {
    let mut reader = JsonArrayReader::new(BufReader::with_capacity(capacity, document.as_bytes()));
    reader.open().await?;
    let mut entries = Vec::new();
    while reader.has_next().await? {
        entries.push(reader.next_element().await?);
    }
    reader.close().await?;
    Ok(entries)
}

const TWO_SCANS: &str = r#"[
  {"name": "A-01", "scanned": true, "occupied": true, "detected_barcodes": ["B1"]},
  {"name": "A-02", "scanned": true, "occupied": false, "detected_barcodes": []}
]"#;

#[tokio::test]
async fn reads_array_elements_in_order() {
    let entries = read_all(TWO_SCANS, 8 * 1024).await.expect("read scans");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].name, "A-01");
    assert_eq!(entries[0].detected_barcodes, vec!["B1".to_string()]);
    assert!(!entries[1].occupied);
}

#[tokio::test]
async fn reads_across_tiny_buffer_boundaries() {
    let entries = read_all(TWO_SCANS, 3).await.expect("read scans with small buffer");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].name, "A-02");
}

#[tokio::test]
async fn brackets_and_commas_inside_strings_do_not_split_elements() {
    let document = r#"[{"name":"R[1],\"x\"}","scanned":false,"occupied":true,"detected_barcodes":["a,b]"]}]"#;
    let entries = read_all(document, 4).await.expect("read tricky strings");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "R[1],\"x\"}");
    assert_eq!(entries[0].detected_barcodes, vec!["a,b]".to_string()]);
}

#[tokio::test]
async fn empty_array_has_no_elements() {
    let entries = read_all("  [ ]  ", 16).await.expect("read empty array");
    assert!(entries.is_empty());
}

#[tokio::test]
async fn missing_barcodes_default_to_empty() {
    let entries = read_all(r#"[{"name":"L","scanned":true,"occupied":false}]"#, 64)
        .await
        .expect("read entry without barcodes");
    assert!(entries[0].detected_barcodes.is_empty());
}

#[tokio::test]
async fn object_document_is_rejected_at_open() {
    let mut reader = JsonArrayReader::new(BufReader::new(&b"{\"name\":\"L\"}"[..]));
    let err = reader.open().await.expect_err("object is not an array");
    assert!(matches!(
        err,
        ParserError::UnexpectedToken { expected: "[", found: '{', offset: 0 }
    ));
}

#[tokio::test]
async fn malformed_element_reports_its_index() {
    let document = r#"[{"name":"L1","scanned":true,"occupied":true},{"name":7}]"#;
    let err = read_all(document, 64).await.expect_err("second element is invalid");
    assert!(matches!(err, ParserError::Element { index: 1, .. }));
}

#[tokio::test]
async fn trailing_comma_is_rejected() {
    let document = r#"[{"name":"L1","scanned":true,"occupied":true},]"#;
    let err = read_all(document, 64).await.expect_err("trailing comma");
    assert!(matches!(err, ParserError::Element { index: 1, .. }));
}

#[tokio::test]
async fn missing_closing_bracket_fails_only_at_close() {
    let document = r#"[{"name":"L1","scanned":true,"occupied":true}"#;
    let mut reader = JsonArrayReader::new(BufReader::new(document.as_bytes()));
    reader.open().await.expect("open");
    assert!(reader.has_next().await.expect("has next"));
    let entry: ScanEntry = reader.next_element().await.expect("first element");
    assert_eq!(entry.name, "L1");
    assert!(!reader.has_next().await.expect("end of input"));
    let err = reader.close().await.expect_err("no closing bracket");
    assert!(matches!(err, ParserError::UnexpectedEof { expected: "]", .. }));
    assert_eq!(reader.elements_read(), 1);
}

#[test]
fn reference_reader_accepts_case_insensitive_header() {
    let csv = "LOCATION,Item\nA-01,B1\nA-02,\n";
    let rows: Vec<_> = ReferenceReader::from_reader(csv.as_bytes())
        .expect("valid header")
        .collect::<Result<_, _>>()
        .expect("valid rows");

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].location, "A-01");
    assert_eq!(rows[0].expected_barcodes(), vec!["B1".to_string()]);
    assert_eq!(rows[1].expected_barcode, None);
    assert!(rows[1].expected_barcodes().is_empty());
}

#[test]
fn reference_reader_ignores_extra_header_columns() {
    let csv = "location,item,notes\nA-01,B1,top shelf\n";
    let rows: Vec<_> = ReferenceReader::from_reader(csv.as_bytes())
        .expect("extra columns allowed")
        .collect::<Result<_, _>>()
        .expect("valid rows");
    assert_eq!(rows[0].expected_barcode.as_deref(), Some("B1"));
}

#[test]
fn reference_reader_rejects_wrong_header() {
    let err = ReferenceReader::from_reader("item,location\nB1,A-01\n".as_bytes())
        .err()
        .expect("swapped header must fail");
    match err {
        ParserError::InvalidHeader { found } => assert_eq!(found, vec!["item", "location"]),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn reference_reader_rejects_single_column_header() {
    let err = ReferenceReader::from_reader("location\nA-01\n".as_bytes())
        .err()
        .expect("single column header must fail");
    assert!(matches!(err, ParserError::InvalidHeader { .. }));
}

#[test]
fn reference_reader_rejects_empty_file() {
    let err = ReferenceReader::from_reader("".as_bytes())
        .err()
        .expect("empty file has no header");
    assert!(matches!(err, ParserError::MissingHeader));
}

#[test]
fn reference_reader_stops_on_ragged_row() {
    let csv = "location,item\nA-01,B1\nA-02,B2,extra\nA-03,B3\n";
    let mut reader = ReferenceReader::from_reader(csv.as_bytes()).expect("valid header");

    let first = reader.next().expect("first row").expect("first row parses");
    assert_eq!(first.location, "A-01");
    assert_eq!(first.line, 2);

    let second = reader.next().expect("second row present");
    let err = second.expect_err("ragged row");
    assert!(matches!(err, ParserError::Csv(_)));
    assert!(!err.is_io());
}
