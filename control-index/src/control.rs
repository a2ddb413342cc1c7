//! Control record types and builders
//!
//! A [`Control`] is one row of the spreadsheet export: a validation rule with
//! its identifier, descriptive text, yes/no flags and regulator cross-references.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator used between URI references in the `uri` field
pub const URI_SEPARATOR: char = ';';

/// Localized "yes" token used by the flag columns
pub const YES: &str = "да";

/// Localized "no" token used by the flag columns
pub const NO: &str = "нет";

/// Canonical fields of a control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlField {
    Uri,
    Identifier,
    Name,
    Algorithm,
    VerificationUri,
    CorrectionAvailable,
    Description,
    Required,
    Approval,
    TableCode,
    BasedOnCbrRequirement,
    CbrCheckDescription,
    Comment,
    CbrApprovalCode,
    Taxonomy,
    Market,
}

impl ControlField {
    /// All fields in metadata order
    pub const ALL: [ControlField; 16] = [
        ControlField::Uri,
        ControlField::Identifier,
        ControlField::Name,
        ControlField::Algorithm,
        ControlField::VerificationUri,
        ControlField::CorrectionAvailable,
        ControlField::Description,
        ControlField::Required,
        ControlField::Approval,
        ControlField::TableCode,
        ControlField::BasedOnCbrRequirement,
        ControlField::CbrCheckDescription,
        ControlField::Comment,
        ControlField::CbrApprovalCode,
        ControlField::Taxonomy,
        ControlField::Market,
    ];

    /// Canonical snake_case name, used as the metadata key
    pub fn canonical_name(self) -> &'static str {
        match self {
            Self::Uri => "uri",
            Self::Identifier => "identifier",
            Self::Name => "name",
            Self::Algorithm => "algorithm",
            Self::VerificationUri => "verification_uri",
            Self::CorrectionAvailable => "correction_available",
            Self::Description => "description",
            Self::Required => "required",
            Self::Approval => "approval",
            Self::TableCode => "table_code",
            Self::BasedOnCbrRequirement => "based_on_cbr_requirement",
            Self::CbrCheckDescription => "cbr_check_description",
            Self::Comment => "comment",
            Self::CbrApprovalCode => "cbr_approval_code",
            Self::Taxonomy => "taxonomy",
            Self::Market => "market",
        }
    }

    /// Column header text of the export format.
    ///
    /// Matched verbatim. `Комменатрий` and `Таксомномия` are misspelled in the
    /// export itself and must stay that way.
    pub fn header(self) -> &'static str {
        match self {
            Self::Uri => "Uri",
            Self::Identifier => "Идентификатор",
            Self::Name => "Наименование",
            Self::Algorithm => "Алгоритм",
            Self::VerificationUri => "Сверочный Uri",
            Self::CorrectionAvailable => "ДоступноИсправление",
            Self::Description => "Описание",
            Self::Required => "Обязательный",
            Self::Approval => "Утверждение",
            Self::TableCode => "КодТаблицы",
            Self::BasedOnCbrRequirement => "НаОснованииТребованияЦБ",
            Self::CbrCheckDescription => "ОписаниеПроверкиПоДаннымЦБ",
            Self::Comment => "Комменатрий",
            Self::CbrApprovalCode => "КодУтвержденияЦБ",
            Self::Taxonomy => "Таксомномия",
            Self::Market => "Рынок",
        }
    }

    /// Resolve a header cell to a field (case-sensitive)
    pub fn from_header(header: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.header() == header)
    }

    /// Resolve a metadata key to a field
    pub fn from_canonical_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.canonical_name() == name)
    }
}

impl fmt::Display for ControlField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// Labelled fields that make up the embedding text, in order
const EMBEDDING_LABELS: [(ControlField, &str); 6] = [
    (ControlField::Identifier, "Идентификатор"),
    (ControlField::Name, "Наименование"),
    (ControlField::Description, "Описание"),
    (ControlField::Algorithm, "Алгоритм"),
    (ControlField::CbrCheckDescription, "Описание проверки ЦБ"),
    (ControlField::Comment, "Комментарий"),
];

/// One control extracted from the spreadsheet export.
///
/// Immutable once built. Every field defaults to an empty string; a control
/// always has a non-empty identifier or name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Control {
    uri: String,
    identifier: String,
    name: String,
    algorithm: String,
    verification_uri: String,
    correction_available: String,
    description: String,
    required: String,
    approval: String,
    table_code: String,
    based_on_cbr_requirement: String,
    cbr_check_description: String,
    comment: String,
    cbr_approval_code: String,
    taxonomy: String,
    market: String,
}

impl Control {
    fn blank() -> Self {
        Self {
            uri: String::new(),
            identifier: String::new(),
            name: String::new(),
            algorithm: String::new(),
            verification_uri: String::new(),
            correction_available: String::new(),
            description: String::new(),
            required: String::new(),
            approval: String::new(),
            table_code: String::new(),
            based_on_cbr_requirement: String::new(),
            cbr_check_description: String::new(),
            comment: String::new(),
            cbr_approval_code: String::new(),
            taxonomy: String::new(),
            market: String::new(),
        }
    }

    /// Create a new builder for Control
    pub fn builder() -> ControlBuilder {
        ControlBuilder::new()
    }

    /// Value of a field by tag
    pub fn get(&self, field: ControlField) -> &str {
        match field {
            ControlField::Uri => &self.uri,
            ControlField::Identifier => &self.identifier,
            ControlField::Name => &self.name,
            ControlField::Algorithm => &self.algorithm,
            ControlField::VerificationUri => &self.verification_uri,
            ControlField::CorrectionAvailable => &self.correction_available,
            ControlField::Description => &self.description,
            ControlField::Required => &self.required,
            ControlField::Approval => &self.approval,
            ControlField::TableCode => &self.table_code,
            ControlField::BasedOnCbrRequirement => &self.based_on_cbr_requirement,
            ControlField::CbrCheckDescription => &self.cbr_check_description,
            ControlField::Comment => &self.comment,
            ControlField::CbrApprovalCode => &self.cbr_approval_code,
            ControlField::Taxonomy => &self.taxonomy,
            ControlField::Market => &self.market,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn verification_uri(&self) -> &str {
        &self.verification_uri
    }

    pub fn correction_available(&self) -> &str {
        &self.correction_available
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn required(&self) -> &str {
        &self.required
    }

    pub fn approval(&self) -> &str {
        &self.approval
    }

    pub fn table_code(&self) -> &str {
        &self.table_code
    }

    pub fn based_on_cbr_requirement(&self) -> &str {
        &self.based_on_cbr_requirement
    }

    pub fn cbr_check_description(&self) -> &str {
        &self.cbr_check_description
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn cbr_approval_code(&self) -> &str {
        &self.cbr_approval_code
    }

    pub fn taxonomy(&self) -> &str {
        &self.taxonomy
    }

    pub fn market(&self) -> &str {
        &self.market
    }

    /// URI references split on `;`, trimmed, empty parts dropped
    pub fn uri_list(&self) -> Vec<&str> {
        self.uri
            .split(URI_SEPARATOR)
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .collect()
    }

    pub fn is_required(&self) -> Option<bool> {
        parse_flag(&self.required)
    }

    pub fn is_correction_available(&self) -> Option<bool> {
        parse_flag(&self.correction_available)
    }

    pub fn is_approved(&self) -> Option<bool> {
        parse_flag(&self.approval)
    }

    /// Composite text used for the embedding: labelled non-empty fields,
    /// newline-joined
    pub fn embedding_text(&self) -> String {
        EMBEDDING_LABELS
            .iter()
            .filter_map(|(field, label)| {
                let value = self.get(*field);
                (!value.is_empty()).then(|| format!("{}: {}", label, value))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Flat field map, keyed by canonical name, with every field present
    pub fn to_metadata(&self) -> BTreeMap<String, String> {
        ControlField::ALL
            .into_iter()
            .map(|f| (f.canonical_name().to_string(), self.get(f).to_string()))
            .collect()
    }

    /// Rebuild a control from a metadata map. Unknown keys are ignored.
    pub fn from_metadata(
        metadata: &BTreeMap<String, String>,
    ) -> Result<Self, ControlBuilderError> {
        metadata
            .iter()
            .filter_map(|(k, v)| ControlField::from_canonical_name(k).map(|f| (f, v)))
            .fold(Control::builder(), |b, (f, v)| b.set(f, v.clone()))
            .build()
    }
}

/// Interpret a localized yes/no token
pub fn parse_flag(value: &str) -> Option<bool> {
    let value = value.trim().to_lowercase();
    if value == YES {
        Some(true)
    } else if value == NO {
        Some(false)
    } else {
        None
    }
}

/// Find the first control with the given identifier
pub fn find_by_identifier<'a>(controls: &'a [Control], identifier: &str) -> Option<&'a Control> {
    controls.iter().find(|c| c.identifier == identifier)
}

/// Builder for Control with fluent API
#[derive(Debug, Clone)]
pub struct ControlBuilder {
    control: Control,
}

impl Default for ControlBuilder {
    fn default() -> Self {
        Self {
            control: Control::blank(),
        }
    }
}

impl ControlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field by tag; a later value for the same field wins
    pub fn set(mut self, field: ControlField, value: impl Into<String>) -> Self {
        let value = value.into();
        let slot = match field {
            ControlField::Uri => &mut self.control.uri,
            ControlField::Identifier => &mut self.control.identifier,
            ControlField::Name => &mut self.control.name,
            ControlField::Algorithm => &mut self.control.algorithm,
            ControlField::VerificationUri => &mut self.control.verification_uri,
            ControlField::CorrectionAvailable => &mut self.control.correction_available,
            ControlField::Description => &mut self.control.description,
            ControlField::Required => &mut self.control.required,
            ControlField::Approval => &mut self.control.approval,
            ControlField::TableCode => &mut self.control.table_code,
            ControlField::BasedOnCbrRequirement => &mut self.control.based_on_cbr_requirement,
            ControlField::CbrCheckDescription => &mut self.control.cbr_check_description,
            ControlField::Comment => &mut self.control.comment,
            ControlField::CbrApprovalCode => &mut self.control.cbr_approval_code,
            ControlField::Taxonomy => &mut self.control.taxonomy,
            ControlField::Market => &mut self.control.market,
        };
        *slot = value;
        self
    }

    pub fn identifier(self, value: impl Into<String>) -> Self {
        self.set(ControlField::Identifier, value)
    }

    pub fn name(self, value: impl Into<String>) -> Self {
        self.set(ControlField::Name, value)
    }

    pub fn uri(self, value: impl Into<String>) -> Self {
        self.set(ControlField::Uri, value)
    }

    pub fn description(self, value: impl Into<String>) -> Self {
        self.set(ControlField::Description, value)
    }

    pub fn algorithm(self, value: impl Into<String>) -> Self {
        self.set(ControlField::Algorithm, value)
    }

    /// True when the control would be materialized
    pub fn has_identity(&self) -> bool {
        !self.control.identifier.is_empty() || !self.control.name.is_empty()
    }

    /// Build the Control
    pub fn build(self) -> Result<Control, ControlBuilderError> {
        if !self.has_identity() {
            return Err(ControlBuilderError::MissingIdentity);
        }
        Ok(self.control)
    }
}

/// Errors that can occur when building a Control
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ControlBuilderError {
    #[error("Control needs a non-empty identifier or name")]
    MissingIdentity,
}
