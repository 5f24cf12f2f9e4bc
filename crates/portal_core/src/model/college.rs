//! College record with its embedded scholarship catalog.

use super::{require, ModelError};
use crate::store::Document;
use log::warn;
use serde::{Deserialize, Serialize};

const ENTITY: &str = "college";
const SCHOLARSHIP_ENTITY: &str = "scholarship";
const LABEL_MAX_CHARS: usize = 20;
const LABEL_KEEP_CHARS: usize = 18;

/// College as stored in the `colleges` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct College {
    /// Store document id.
    pub id: String,
    /// Email domain that identifies the college.
    pub domain: String,
    /// Display name (`cname`).
    pub name: String,
    pub scholarships: Vec<Scholarship>,
}

/// Scholarship embedded in a college document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scholarship {
    /// Unique within one college.
    pub name: String,
    pub provider: String,
    pub description: String,
}

#[derive(Deserialize)]
struct CollegeBody {
    domain: Option<String>,
    cname: Option<String>,
    scholarships: Option<Vec<ScholarshipBody>>,
}

#[derive(Deserialize)]
struct ScholarshipBody {
    name: Option<String>,
    provider: Option<String>,
    description: Option<String>,
}

impl College {
    /// Decodes one `colleges` document.
    ///
    /// Catalog entries without a `name` are skipped; the college still decodes.
    ///
    /// # Errors
    /// - `MissingField` when `domain` or `cname` is absent.
    /// - `InvalidShape` when a present field has the wrong JSON type.
    pub fn from_document(document: &Document) -> Result<Self, ModelError> {
        let body: CollegeBody =
            serde_json::from_value(document.data.clone()).map_err(|err| {
                ModelError::InvalidShape {
                    entity: ENTITY,
                    message: err.to_string(),
                }
            })?;

        let scholarships = body
            .scholarships
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .filter_map(|(position, entry)| {
                match require(entry.name, SCHOLARSHIP_ENTITY, "name") {
                    Ok(name) => Some(Scholarship {
                        name,
                        provider: entry.provider.unwrap_or_default(),
                        description: entry.description.unwrap_or_default(),
                    }),
                    Err(err) => {
                        warn!(
                            "event=college_decode module=model status=skipped position={} error={}",
                            position, err
                        );
                        None
                    }
                }
            })
            .collect();

        Ok(Self {
            id: document.id.clone(),
            domain: require(body.domain, ENTITY, "domain")?,
            name: require(body.cname, ENTITY, "cname")?,
            scholarships,
        })
    }
}

impl Scholarship {
    pub fn new(
        name: impl Into<String>,
        provider: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            provider: provider.into(),
            description: description.into(),
        }
    }

    /// Short label for collapsed list headers.
    ///
    /// Names of 20 or more characters keep their first 18 characters plus `...`.
    pub fn display_label(&self) -> String {
        if self.name.chars().count() < LABEL_MAX_CHARS {
            return self.name.clone();
        }
        let mut label = self.name.chars().take(LABEL_KEEP_CHARS).collect::<String>();
        label.push_str("...");
        label
    }
}
