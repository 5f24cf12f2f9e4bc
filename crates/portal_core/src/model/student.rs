//! Student record.
//!
//! # Responsibility
//! - Decode `students` documents into a typed record.
//! - Provide the small derived fields profile/roster screens show.
//!
//! # Invariants
//! - `id` is always the store document id, never a body field.
//! - `scholarships` keeps store order and may contain names unknown to the
//!   owning college.

use super::{require, ModelError};
use crate::store::Document;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const ENTITY: &str = "student";

/// Student as stored in the `students` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Student {
    /// Store document id.
    pub id: String,
    /// Display name (`sname`).
    pub name: String,
    /// Institutional email; the local part is the college id.
    pub email: String,
    pub mobile: Option<String>,
    /// Raw `dd/mm/yyyy` date of birth (`DOB`).
    pub dob: Option<String>,
    /// Profile image reference (`imgURL`).
    pub image_url: Option<String>,
    /// Key into the `colleges` collection (`cdomain`).
    pub college_domain: String,
    /// Names of enrolled scholarships.
    pub scholarships: Vec<String>,
    pub verified: bool,
    /// Verification time in epoch milliseconds (`verifiedOn`).
    pub verified_on: Option<i64>,
    /// Attendance counter (`totalAtt`).
    pub total_attendance: u32,
}

#[derive(Deserialize)]
struct StudentBody {
    sname: Option<String>,
    email: Option<String>,
    mobile: Option<TextOrNumber>,
    #[serde(rename = "DOB")]
    dob: Option<String>,
    #[serde(rename = "imgURL")]
    image_url: Option<String>,
    cdomain: Option<String>,
    scholarships: Option<Vec<String>>,
    verified: Option<bool>,
    #[serde(rename = "verifiedOn")]
    verified_on: Option<StoreTimestamp>,
    #[serde(rename = "totalAtt")]
    total_attendance: Option<u32>,
}

/// Mobile numbers show up both as strings and as bare numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrNumber {
    Text(String),
    Number(serde_json::Number),
}

impl TextOrNumber {
    fn into_text(self) -> String {
        match self {
            Self::Text(value) => value,
            Self::Number(value) => value.to_string(),
        }
    }
}

/// Timestamps arrive as epoch millis or as exported `{seconds, nanoseconds}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoreTimestamp {
    Millis(i64),
    Parts {
        #[serde(alias = "_seconds")]
        seconds: i64,
        #[serde(default, alias = "_nanoseconds")]
        nanoseconds: i64,
    },
}

impl StoreTimestamp {
    fn epoch_ms(&self) -> i64 {
        match self {
            Self::Millis(value) => *value,
            Self::Parts {
                seconds,
                nanoseconds,
            } => seconds
                .saturating_mul(1000)
                .saturating_add(nanoseconds / 1_000_000),
        }
    }
}

impl Student {
    /// Decodes one `students` document.
    ///
    /// # Errors
    /// - `MissingField` when `sname`, `email` or `cdomain` is absent or blank.
    /// - `InvalidShape` when a present field has the wrong JSON type.
    pub fn from_document(document: &Document) -> Result<Self, ModelError> {
        let body: StudentBody =
            serde_json::from_value(document.data.clone()).map_err(|err| {
                ModelError::InvalidShape {
                    entity: ENTITY,
                    message: err.to_string(),
                }
            })?;

        Ok(Self {
            id: document.id.clone(),
            name: require(body.sname, ENTITY, "sname")?,
            email: require(body.email, ENTITY, "email")?,
            mobile: body.mobile.map(TextOrNumber::into_text),
            dob: body.dob,
            image_url: body.image_url.filter(|url| !url.trim().is_empty()),
            college_domain: require(body.cdomain, ENTITY, "cdomain")?,
            scholarships: body.scholarships.unwrap_or_default(),
            verified: body.verified.unwrap_or(false),
            verified_on: body.verified_on.as_ref().map(StoreTimestamp::epoch_ms),
            total_attendance: body.total_attendance.unwrap_or(0),
        })
    }

    /// Institutional id: the email local part.
    pub fn college_id(&self) -> &str {
        self.email.split('@').next().unwrap_or_default()
    }

    /// Parses `dob` as `dd/mm/yyyy`.
    ///
    /// Returns `None` when the field is absent or not a valid calendar date.
    pub fn date_of_birth(&self) -> Option<NaiveDate> {
        let raw = self.dob.as_deref()?;
        NaiveDate::parse_from_str(raw.trim(), "%d/%m/%Y").ok()
    }

    /// Whether the student lists `scholarship` by exact name.
    pub fn has_scholarship(&self, scholarship: &str) -> bool {
        self.scholarships.iter().any(|name| name == scholarship)
    }
}

#[cfg(test)]
mod tests {
    use super::Student;
    use crate::model::ModelError;
    use crate::store::Document;
    use chrono::NaiveDate;
    use serde_json::json;

    fn student_doc(data: serde_json::Value) -> Document {
        Document::new("s1", data)
    }

    #[test]
    fn decodes_full_document() {
        let doc = student_doc(json!({
            "sname": "Ada",
            "email": "21cs001@x.edu",
            "mobile": 9876543210_u64,
            "DOB": "09/03/2002",
            "imgURL": "https://img/ada.png",
            "cdomain": "x.edu",
            "scholarships": ["Merit"],
            "verified": true,
            "verifiedOn": { "seconds": 1_700_000_000, "nanoseconds": 5_000_000 },
            "totalAtt": 42
        }));

        let student = Student::from_document(&doc).unwrap();
        assert_eq!(student.id, "s1");
        assert_eq!(student.mobile.as_deref(), Some("9876543210"));
        assert_eq!(student.college_id(), "21cs001");
        assert_eq!(student.verified_on, Some(1_700_000_000_005));
        assert_eq!(student.total_attendance, 42);
        assert_eq!(
            student.date_of_birth(),
            NaiveDate::from_ymd_opt(2002, 3, 9)
        );
    }

    #[test]
    fn defaults_optional_fields() {
        let doc = student_doc(json!({
            "sname": "Ada",
            "email": "ada@x.edu",
            "cdomain": "x.edu"
        }));

        let student = Student::from_document(&doc).unwrap();
        assert!(student.scholarships.is_empty());
        assert!(!student.verified);
        assert_eq!(student.verified_on, None);
        assert_eq!(student.total_attendance, 0);
        assert_eq!(student.date_of_birth(), None);
    }

    #[test]
    fn rejects_missing_required_field() {
        let doc = student_doc(json!({ "sname": "Ada", "email": "ada@x.edu" }));
        let err = Student::from_document(&doc).unwrap_err();
        assert_eq!(
            err,
            ModelError::MissingField {
                entity: "student",
                field: "cdomain"
            }
        );
    }

    #[test]
    fn rejects_wrong_field_type() {
        let doc = student_doc(json!({
            "sname": "Ada",
            "email": "ada@x.edu",
            "cdomain": "x.edu",
            "scholarships": "Merit"
        }));
        assert!(matches!(
            Student::from_document(&doc),
            Err(ModelError::InvalidShape { .. })
        ));
    }

    #[test]
    fn malformed_dob_is_none() {
        let doc = student_doc(json!({
            "sname": "Ada",
            "email": "ada@x.edu",
            "cdomain": "x.edu",
            "DOB": "31/02/2002"
        }));
        assert_eq!(Student::from_document(&doc).unwrap().date_of_birth(), None);
    }

    #[test]
    fn dob_accepts_padded_day_first_dates_only() {
        let decode = |dob: &str| {
            Student::from_document(&student_doc(json!({
                "sname": "Ada",
                "email": "ada@x.edu",
                "cdomain": "x.edu",
                "DOB": dob
            })))
            .unwrap()
            .date_of_birth()
        };
        assert_eq!(decode(" 05/11/2001 "), NaiveDate::from_ymd_opt(2001, 11, 5));
        assert_eq!(decode("2001-11-05"), None);
        assert_eq!(decode("05/11/2001/7"), None);
    }

    #[test]
    fn oversized_timestamp_saturates_instead_of_overflowing() {
        let doc = student_doc(json!({
            "sname": "Ada",
            "email": "ada@x.edu",
            "cdomain": "x.edu",
            "verifiedOn": { "seconds": i64::MAX, "nanoseconds": 999_999_999 }
        }));
        assert_eq!(Student::from_document(&doc).unwrap().verified_on, Some(i64::MAX));
    }
}
