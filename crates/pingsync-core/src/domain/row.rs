//! InputRow: one decoded CSV record
//!
//! Rows are keyed by [`RowField`], the closed set of recognised column names.
//! Unknown columns never reach an `InputRow`.

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

/// Recognised CSV column names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RowField {
    Username,
    Email,
    FirstName,
    LastName,
    PopulationId,
    MiddleName,
    Prefix,
    Suffix,
    FormattedName,
    Title,
    PreferredLanguage,
    Locale,
    Timezone,
    ExternalId,
    Type,
    Active,
    Nickname,
    Password,
    PrimaryPhone,
    MobilePhone,
    StreetAddress,
    CountryCode,
    Locality,
    Region,
    PostalCode,
}

impl RowField {
    /// Fields every `import` / `upsert` row must carry
    pub const REQUIRED: [RowField; 5] = [
        RowField::Username,
        RowField::Email,
        RowField::FirstName,
        RowField::LastName,
        RowField::PopulationId,
    ];

    pub const ALL: [RowField; 25] = [
        RowField::Username,
        RowField::Email,
        RowField::FirstName,
        RowField::LastName,
        RowField::PopulationId,
        RowField::MiddleName,
        RowField::Prefix,
        RowField::Suffix,
        RowField::FormattedName,
        RowField::Title,
        RowField::PreferredLanguage,
        RowField::Locale,
        RowField::Timezone,
        RowField::ExternalId,
        RowField::Type,
        RowField::Active,
        RowField::Nickname,
        RowField::Password,
        RowField::PrimaryPhone,
        RowField::MobilePhone,
        RowField::StreetAddress,
        RowField::CountryCode,
        RowField::Locality,
        RowField::Region,
        RowField::PostalCode,
    ];

    /// Column header as it appears in the CSV
    pub fn header(&self) -> &'static str {
        match self {
            RowField::Username => "username",
            RowField::Email => "email",
            RowField::FirstName => "firstName",
            RowField::LastName => "lastName",
            RowField::PopulationId => "populationId",
            RowField::MiddleName => "middleName",
            RowField::Prefix => "prefix",
            RowField::Suffix => "suffix",
            RowField::FormattedName => "formattedName",
            RowField::Title => "title",
            RowField::PreferredLanguage => "preferredLanguage",
            RowField::Locale => "locale",
            RowField::Timezone => "timezone",
            RowField::ExternalId => "externalId",
            RowField::Type => "type",
            RowField::Active => "active",
            RowField::Nickname => "nickname",
            RowField::Password => "password",
            RowField::PrimaryPhone => "primaryPhone",
            RowField::MobilePhone => "mobilePhone",
            RowField::StreetAddress => "streetAddress",
            RowField::CountryCode => "countryCode",
            RowField::Locality => "locality",
            RowField::Region => "region",
            RowField::PostalCode => "postalCode",
        }
    }

    /// Look up a column header; `None` for unknown columns
    pub fn from_header(header: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.header() == header)
    }
}

impl Display for RowField {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

/// One CSV record, numbered from 1 for the first data row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputRow {
    number: usize,
    values: HashMap<RowField, String>,
}

impl InputRow {
    pub fn new(number: usize) -> Self {
        Self {
            number,
            values: HashMap::new(),
        }
    }

    /// Builder-style setter; the value is trimmed and blank values are dropped.
    #[must_use]
    pub fn with(mut self, field: RowField, value: &str) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: RowField, value: &str) {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.values.remove(&field);
        } else {
            self.values.insert(field, trimmed.to_string());
        }
    }

    pub fn number(&self) -> usize {
        self.number
    }

    /// Non-blank value of `field`
    pub fn get(&self, field: RowField) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    pub fn username(&self) -> Option<&str> {
        self.get(RowField::Username)
    }

    /// Identifies the row in error details: username, else email, else empty.
    pub fn label(&self) -> &str {
        self.username()
            .or_else(|| self.get(RowField::Email))
            .unwrap_or("")
    }

    /// Required fields that are absent or blank, in declaration order
    pub fn missing_required(&self) -> Vec<RowField> {
        RowField::REQUIRED
            .iter()
            .copied()
            .filter(|f| self.get(*f).is_none())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
