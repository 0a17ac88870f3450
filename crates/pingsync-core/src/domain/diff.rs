//! AttributeDiffer
//!
//! Computes the minimal patch between the attributes a CSV row asks for and
//! the record the directory currently holds. Which wire fields may appear in
//! the patch is controlled by an [`AttributeAllowlist`]; whether unchanged
//! values are sent is controlled by [`AttributeMode`].

use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde_json::{Map, Value};

use super::errors::DomainError;

// ============================================================================
// AttributeMode
// ============================================================================

/// How modify-mode decides which allowed fields go into the patch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AttributeMode {
    /// Send every allowed field present in the row
    #[default]
    All,
    /// Send only allowed fields whose value differs from the remote record
    ChangedOnly,
}

impl FromStr for AttributeMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "all" => Ok(AttributeMode::All),
            "changed-only" | "changed" => Ok(AttributeMode::ChangedOnly),
            other => Err(DomainError::ValidationFailed(format!(
                "modifyMode must be 'all' or 'changed-only', got '{other}'"
            ))),
        }
    }
}

impl Display for AttributeMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AttributeMode::All => f.write_str("all"),
            AttributeMode::ChangedOnly => f.write_str("changed-only"),
        }
    }
}

// ============================================================================
// AllowedAttribute / AttributeAllowlist
// ============================================================================

/// Logical attribute names a modify job may be restricted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AllowedAttribute {
    FirstName,
    LastName,
    Email,
    Username,
    Password,
    Population,
    Active,
    Title,
    Phone,
    Address,
    Locale,
    Timezone,
    ExternalId,
    Type,
    Nickname,
}

impl AllowedAttribute {
    const ALL: [AllowedAttribute; 15] = [
        AllowedAttribute::FirstName,
        AllowedAttribute::LastName,
        AllowedAttribute::Email,
        AllowedAttribute::Username,
        AllowedAttribute::Password,
        AllowedAttribute::Population,
        AllowedAttribute::Active,
        AllowedAttribute::Title,
        AllowedAttribute::Phone,
        AllowedAttribute::Address,
        AllowedAttribute::Locale,
        AllowedAttribute::Timezone,
        AllowedAttribute::ExternalId,
        AllowedAttribute::Type,
        AllowedAttribute::Nickname,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AllowedAttribute::FirstName => "firstName",
            AllowedAttribute::LastName => "lastName",
            AllowedAttribute::Email => "email",
            AllowedAttribute::Username => "username",
            AllowedAttribute::Password => "password",
            AllowedAttribute::Population => "population",
            AllowedAttribute::Active => "active",
            AllowedAttribute::Title => "title",
            AllowedAttribute::Phone => "phone",
            AllowedAttribute::Address => "address",
            AllowedAttribute::Locale => "locale",
            AllowedAttribute::Timezone => "timezone",
            AllowedAttribute::ExternalId => "externalId",
            AllowedAttribute::Type => "type",
            AllowedAttribute::Nickname => "nickname",
        }
    }

    /// Wire key and, for nested attributes, the sub-key.
    ///
    /// A `None` sub-key on an object-valued key admits every sub-key.
    pub fn wire_path(&self) -> (&'static str, Option<&'static str>) {
        match self {
            AllowedAttribute::FirstName => ("name", Some("given")),
            AllowedAttribute::LastName => ("name", Some("family")),
            AllowedAttribute::Email => ("email", None),
            AllowedAttribute::Username => ("username", None),
            AllowedAttribute::Password => ("password", None),
            AllowedAttribute::Population => ("population", Some("id")),
            AllowedAttribute::Active => ("active", None),
            AllowedAttribute::Title => ("title", None),
            AllowedAttribute::Phone => ("phoneNumbers", None),
            AllowedAttribute::Address => ("address", None),
            AllowedAttribute::Locale => ("locale", None),
            AllowedAttribute::Timezone => ("timezone", None),
            AllowedAttribute::ExternalId => ("externalId", None),
            AllowedAttribute::Type => ("type", None),
            AllowedAttribute::Nickname => ("nickname", None),
        }
    }
}

impl FromStr for AllowedAttribute {
    type Err = DomainError;

    /// Accepts the plain name (`firstName`) or the form checkbox id (`modAttrFirstName`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|attr| {
                let name = attr.name().as_bytes();
                s.as_bytes() == name
                    || s.strip_prefix("modAttr").is_some_and(|rest| {
                        let rest = rest.as_bytes();
                        rest.len() == name.len()
                            && rest[0].eq_ignore_ascii_case(&name[0])
                            && rest[1..] == name[1..]
                    })
            })
            .ok_or_else(|| DomainError::UnknownAttribute(s.to_string()))
    }
}

impl Display for AllowedAttribute {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of attributes a modify job may touch. Empty means unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeAllowlist {
    entries: BTreeSet<AllowedAttribute>,
}

impl AttributeAllowlist {
    /// Unrestricted allowlist
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Parse a list of names, rejecting any that is not recognised
    pub fn parse<I, S>(names: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = names
            .into_iter()
            .map(|n| n.as_ref().parse::<AllowedAttribute>())
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(Self { entries })
    }

    pub fn is_unrestricted(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AllowedAttribute> {
        self.entries.iter()
    }

    /// Whether the wire field `key` (or `key.sub`) may be patched
    pub fn allows(&self, key: &str, sub: Option<&str>) -> bool {
        if self.entries.is_empty() {
            return true;
        }
        self.entries.iter().any(|attr| match attr.wire_path() {
            (k, None) => k == key,
            (k, Some(s)) => k == key && sub == Some(s),
        })
    }
}

impl FromIterator<AllowedAttribute> for AttributeAllowlist {
    fn from_iter<T: IntoIterator<Item = AllowedAttribute>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

// ============================================================================
// compute_update
// ============================================================================

/// Build the partial update for one record.
///
/// Object-valued fields are diffed per sub-key and dropped when no sub-key
/// qualifies. Arrays and scalars are compared as whole values. `remote` is
/// only consulted in [`AttributeMode::ChangedOnly`].
pub fn compute_update(
    desired: &Map<String, Value>,
    remote: &Map<String, Value>,
    allowlist: &AttributeAllowlist,
    mode: AttributeMode,
) -> Map<String, Value> {
    let mut patch = Map::new();

    for (key, value) in desired {
        match value {
            Value::Object(fields) => {
                let current = remote.get(key);
                let mut nested = Map::new();
                for (sub, sub_value) in fields {
                    if !allowlist.allows(key, Some(sub)) {
                        continue;
                    }
                    let unchanged = mode == AttributeMode::ChangedOnly
                        && current.and_then(|c| c.get(sub)) == Some(sub_value);
                    if !unchanged {
                        nested.insert(sub.clone(), sub_value.clone());
                    }
                }
                if !nested.is_empty() {
                    patch.insert(key.clone(), Value::Object(nested));
                }
            }
            _ => {
                if !allowlist.allows(key, None) {
                    continue;
                }
                let unchanged =
                    mode == AttributeMode::ChangedOnly && remote.get(key) == Some(value);
                if !unchanged {
                    patch.insert(key.clone(), value.clone());
                }
            }
        }
    }

    patch
}
