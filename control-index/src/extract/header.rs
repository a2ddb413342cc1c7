//! Positional header mapping
//!
//! Built once from the header row. Column index decides the field for every
//! data row; header text is never re-read per row.

use crate::control::ControlField;

/// Column index -> field mapping derived from the header row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMapping {
    headers: Vec<String>,
    fields: Vec<Option<ControlField>>,
}

impl HeaderMapping {
    /// Build from header cell texts in column order.
    ///
    /// Empty cells keep their column slot but map to nothing. Unknown header
    /// names are preserved positionally and map to nothing.
    pub fn from_headers<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let headers: Vec<String> = headers.into_iter().map(Into::into).collect();
        let fields = headers
            .iter()
            .map(|h| {
                if h.is_empty() {
                    None
                } else {
                    ControlField::from_header(h)
                }
            })
            .collect();
        Self { headers, fields }
    }

    /// Field for a column, if the column is mapped
    pub fn field_at(&self, column: usize) -> Option<ControlField> {
        self.fields.get(column).copied().flatten()
    }

    /// Raw header text for a column
    pub fn header_at(&self, column: usize) -> Option<&str> {
        self.headers
            .get(column)
            .map(String::as_str)
            .filter(|h| !h.is_empty())
    }

    /// Number of header columns, mapped or not
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Number of columns that map to a field
    pub fn mapped_count(&self) -> usize {
        self.fields.iter().filter(|f| f.is_some()).count()
    }

    /// Non-empty headers that are not in the known header table
    pub fn unknown_headers(&self) -> Vec<(usize, &str)> {
        self.headers
            .iter()
            .enumerate()
            .filter(|(i, h)| !h.is_empty() && self.fields[*i].is_none())
            .map(|(i, h)| (i, h.as_str()))
            .collect()
    }
}
