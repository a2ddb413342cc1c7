//! Spreadsheet extractor
//!
//! Turns the spreadsheet XML export into an ordered list of [`Control`]s.
//!
//! Document shape: `rowsItem` elements at any depth, each holding a `row`
//! with `c` cells; a cell's display value sits in a nested `item` -> `content`
//! chain. The first `rowsItem` is the header row. Element names may be bound
//! to any of the known 1C namespaces or to none at all.

mod header;
mod xml;

pub use header::HeaderMapping;
pub use xml::{XmlElement, CORE_NAMESPACES, SPREADSHEET_NAMESPACES};

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::control::{Control, ControlBuilder};
use crate::error::{IndexError, Result};

/// Extract controls from an XML export on disk
pub fn extract(source_path: impl AsRef<Path>) -> Result<Vec<Control>> {
    let path = source_path.as_ref();
    if !path.exists() {
        return Err(IndexError::not_found(path.display().to_string()));
    }

    let file = File::open(path)?;
    let root = xml::parse(BufReader::new(file))?;
    let controls = extract_document(&root);

    log::info!("Extracted {} controls from {}", controls.len(), path.display());
    Ok(controls)
}

/// Extract controls from an XML export held in memory
pub fn extract_str(source: &str) -> Result<Vec<Control>> {
    let root = xml::parse(source.as_bytes())?;
    Ok(extract_document(&root))
}

fn extract_document(root: &XmlElement) -> Vec<Control> {
    let rows = root.find_descendants("rowsItem", &SPREADSHEET_NAMESPACES);
    let Some((header_row, data_rows)) = rows.split_first() else {
        log::debug!("No rowsItem elements found, nothing to extract");
        return Vec::new();
    };

    let mapping = header_mapping(header_row);
    if mapping.mapped_count() == 0 {
        log::warn!("Header row maps no known columns");
    }
    for (column, header) in mapping.unknown_headers() {
        log::debug!("Ignoring unknown header {:?} in column {}", header, column);
    }

    let mut controls = Vec::new();
    for (index, row) in data_rows.iter().enumerate() {
        match extract_row(row, &mapping) {
            Some(control) => controls.push(control),
            None => log::debug!("Skipping blank data row {}", index + 1),
        }
    }
    controls
}

fn row_cells<'a>(row_item: &'a XmlElement) -> Vec<&'a XmlElement> {
    row_item
        .find_child("row", &SPREADSHEET_NAMESPACES)
        .map(|row| row.find_children("c", &SPREADSHEET_NAMESPACES))
        .unwrap_or_default()
}

fn header_mapping(header_row: &XmlElement) -> HeaderMapping {
    HeaderMapping::from_headers(row_cells(header_row).into_iter().map(cell_text))
}

fn extract_row(row_item: &XmlElement, mapping: &HeaderMapping) -> Option<Control> {
    let builder = row_cells(row_item)
        .into_iter()
        .enumerate()
        .filter_map(|(column, cell)| mapping.field_at(column).map(|field| (field, cell)))
        .fold(ControlBuilder::new(), |builder, (field, cell)| {
            builder.set(field, cell_text(cell))
        });

    builder.build().ok()
}

/// Display value of a cell: `item` (any depth) -> `content`, trimmed.
/// Missing pieces give an empty string.
fn cell_text(cell: &XmlElement) -> String {
    cell.find_descendant("item", &CORE_NAMESPACES)
        .and_then(|item| item.find_child("content", &CORE_NAMESPACES))
        .map(|content| content.text.trim().to_string())
        .unwrap_or_default()
}
