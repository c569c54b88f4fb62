pub mod errors;
pub mod json_array;
pub mod model;
pub mod reference;

pub use errors::ParserError;
pub use json_array::JsonArrayReader;
pub use model::{ReferenceRow, ScanEntry};
pub use reference::{validate_header, ReferenceReader};

#[cfg(test)]
mod tests;
