//! Wire-side user shapes: what we send and what the directory returns.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::newtypes::RecordId;
use super::row::{InputRow, RowField};

/// Attributes sent to the directory when creating or updating a user.
///
/// Built from an [`InputRow`]; every blank field is absent from the JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population: Option<PopulationRef>,
    #[serde(skip_serializing_if = "NameAttributes::is_empty")]
    pub name: NameAttributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub phone_numbers: Vec<PhoneNumber>,
    #[serde(skip_serializing_if = "AddressAttributes::is_empty")]
    pub address: AddressAttributes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationRef {
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NameAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub middle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
}

impl NameAttributes {
    pub fn is_empty(&self) -> bool {
        self.given.is_none()
            && self.family.is_none()
            && self.middle.is_none()
            && self.prefix.is_none()
            && self.suffix.is_none()
            && self.formatted.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumber {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
}

impl AddressAttributes {
    pub fn is_empty(&self) -> bool {
        self.street_address.is_none()
            && self.country.is_none()
            && self.locality.is_none()
            && self.region.is_none()
            && self.postal_code.is_none()
    }
}

impl UserAttributes {
    /// Map a CSV row to the directory's user shape
    pub fn from_row(row: &InputRow) -> Self {
        let text = |field: RowField| row.get(field).map(str::to_string);

        let mut phone_numbers = Vec::new();
        if let Some(value) = text(RowField::PrimaryPhone) {
            phone_numbers.push(PhoneNumber {
                kind: "primary".to_string(),
                value,
            });
        }
        if let Some(value) = text(RowField::MobilePhone) {
            phone_numbers.push(PhoneNumber {
                kind: "mobile".to_string(),
                value,
            });
        }

        Self {
            username: text(RowField::Username),
            email: text(RowField::Email),
            population: text(RowField::PopulationId).map(|id| PopulationRef { id }),
            name: NameAttributes {
                given: text(RowField::FirstName),
                family: text(RowField::LastName),
                middle: text(RowField::MiddleName),
                prefix: text(RowField::Prefix),
                suffix: text(RowField::Suffix),
                formatted: text(RowField::FormattedName),
            },
            title: text(RowField::Title),
            preferred_language: text(RowField::PreferredLanguage),
            locale: text(RowField::Locale),
            timezone: text(RowField::Timezone),
            external_id: text(RowField::ExternalId),
            user_type: text(RowField::Type),
            active: row
                .get(RowField::Active)
                .map(|v| v.eq_ignore_ascii_case("true")),
            nickname: text(RowField::Nickname),
            password: text(RowField::Password),
            phone_numbers,
            address: AddressAttributes {
                street_address: text(RowField::StreetAddress),
                country: text(RowField::CountryCode),
                locality: text(RowField::Locality),
                region: text(RowField::Region),
                postal_code: text(RowField::PostalCode),
            },
        }
    }

    /// JSON object form, as sent on the wire
    pub fn to_json_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// A user as returned by a directory lookup.
///
/// Only `id` is interpreted; everything else is kept as raw JSON for diffing.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RemoteRecord {
    pub id: RecordId,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// Summary of an identity environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentDetails {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type", default)]
    pub environment_type: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}
