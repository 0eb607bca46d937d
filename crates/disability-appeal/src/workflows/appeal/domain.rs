use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Store-assigned identifier for a persisted appeal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppealId(pub String);

impl AppealId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }
}

impl fmt::Display for AppealId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

static LAST_RECORD_MICROS: AtomicI64 = AtomicI64::new(0);

/// Submission instant at microsecond precision, strictly increasing within the process.
pub fn record_timestamp() -> DateTime<Utc> {
    let now = Utc::now().timestamp_micros();
    let previous = LAST_RECORD_MICROS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or(now);
    let micros = now.max(previous + 1);
    DateTime::<Utc>::from_timestamp_micros(micros).unwrap_or_else(Utc::now)
}

/// Raw intake payload as posted by the appeal form. Every field is lenient here so
/// that missing or blank values surface as validation failures instead of decode errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppealSubmission {
    pub name: Option<String>,
    pub ssn: Option<String>,
    pub medical_appointments: Option<Vec<MedicalAppointment>>,
    pub condition_changes: Option<ConditionChangesInput>,
    pub activity_limitations: Option<ActivityLimitationsInput>,
    pub emergency_contact: Option<EmergencyContactInput>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConditionChangesInput {
    pub has_changes: Option<bool>,
    pub description: Option<String>,
    #[serde(deserialize_with = "deserialize_optional_date")]
    pub when_changed: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ActivityLimitationsInput {
    pub has_limitations: Option<bool>,
    pub examples: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmergencyContactInput {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub relationship: Option<String>,
}

/// One treating provider listed on the appeal. Every detail is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MedicalAppointment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub office_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medical_conditions_treated: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fax: Option<String>,
    #[serde(
        deserialize_with = "deserialize_optional_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub date_of_last_appointment: Option<DateTime<Utc>>,
    #[serde(
        deserialize_with = "deserialize_optional_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub date_of_next_appointment: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_new_doctor: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_doctor_seen_previously: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_family_doctor: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_specialist: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialist_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub testing_ordered: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub testing_type: Option<String>,
    #[serde(
        deserialize_with = "deserialize_optional_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub testing_when: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub testing_facility: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConditionChanges {
    pub has_changes: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        deserialize_with = "deserialize_optional_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub when_changed: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ActivityLimitations {
    pub has_limitations: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub examples: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
    pub relationship: String,
}

/// A submission that passed every intake precondition and is ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAppeal {
    pub name: String,
    pub ssn: String,
    pub medical_appointments: Vec<MedicalAppointment>,
    pub condition_changes: ConditionChanges,
    pub activity_limitations: ActivityLimitations,
    pub emergency_contact: EmergencyContact,
}

impl NewAppeal {
    pub fn into_record(self, id: AppealId, timestamp: DateTime<Utc>) -> AppealRecord {
        AppealRecord {
            id,
            name: self.name,
            ssn: self.ssn,
            medical_appointments: self.medical_appointments,
            condition_changes: self.condition_changes,
            activity_limitations: self.activity_limitations,
            emergency_contact: self.emergency_contact,
            timestamp,
        }
    }
}

/// The persisted appeal. Never mutated after the repository hands it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppealRecord {
    pub id: AppealId,
    pub name: String,
    pub ssn: String,
    pub medical_appointments: Vec<MedicalAppointment>,
    pub condition_changes: ConditionChanges,
    pub activity_limitations: ActivityLimitations,
    pub emergency_contact: EmergencyContact,
    pub timestamp: DateTime<Utc>,
}

impl AppealRecord {
    /// Attachment name used when the rendered appeal is mailed out.
    pub fn attachment_name(&self) -> String {
        format!("disability_appeal_{}.pdf", self.id)
    }
}

const LOCAL_DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Accepts RFC 3339 instants, offset-less local date-times and bare `YYYY-MM-DD`
/// dates. Anything without an offset is read as UTC.
pub fn parse_iso_date(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(instant.with_timezone(&Utc));
    }
    if let Some(local) = LOCAL_DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
    {
        return Some(local.and_utc());
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
}

fn deserialize_optional_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => parse_iso_date(&value).map(Some).ok_or_else(|| {
            serde::de::Error::custom(format!("'{value}' is not an ISO-8601 date"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn parses_bare_dates_and_instants() {
        assert_eq!(
            parse_iso_date("2025-03-14"),
            Some(Utc.with_ymd_and_hms(2025, 3, 14, 0, 0, 0).unwrap())
        );
        assert_eq!(
            parse_iso_date("2025-03-14T09:30:00-05:00"),
            Some(Utc.with_ymd_and_hms(2025, 3, 14, 14, 30, 0).unwrap())
        );
        assert_eq!(
            parse_iso_date("2025-03-04T10:30:00"),
            Some(Utc.with_ymd_and_hms(2025, 3, 4, 10, 30, 0).unwrap())
        );
        assert_eq!(
            parse_iso_date("2025-03-04T10:30"),
            Some(Utc.with_ymd_and_hms(2025, 3, 4, 10, 30, 0).unwrap())
        );
        assert_eq!(parse_iso_date("March 14"), None);
        assert_eq!(parse_iso_date("2025-03-04T25:00"), None);
    }

    #[test]
    fn appointment_accepts_local_date_times() {
        let appointment = serde_json::from_value::<MedicalAppointment>(json!({
            "dateOfLastAppointment": "2025-03-04T10:30:00",
            "dateOfNextAppointment": "2025-04-01T09:15",
        }))
        .expect("local date-times decode");
        assert_eq!(
            appointment.date_of_next_appointment,
            Some(Utc.with_ymd_and_hms(2025, 4, 1, 9, 15, 0).unwrap())
        );
    }

    #[test]
    fn appointment_rejects_malformed_dates() {
        let result = serde_json::from_value::<MedicalAppointment>(json!({
            "doctorName": "Dr. Patel",
            "dateOfLastAppointment": "last tuesday",
        }));
        assert!(result.is_err());
    }

    #[test]
    fn appointment_omits_absent_fields_when_serialized() {
        let appointment = MedicalAppointment {
            doctor_name: Some("Dr. Patel".to_string()),
            is_specialist: Some(false),
            ..MedicalAppointment::default()
        };
        let value = serde_json::to_value(&appointment).expect("serializes");
        assert_eq!(value, json!({ "doctorName": "Dr. Patel", "isSpecialist": false }));
    }

    #[test]
    fn record_timestamps_strictly_increase() {
        let stamps: Vec<_> = (0..64).map(|_| record_timestamp()).collect();
        assert!(stamps.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn attachment_name_uses_record_id() {
        let record = NewAppeal {
            name: "Jordan Reyes".to_string(),
            ssn: "1234".to_string(),
            medical_appointments: Vec::new(),
            condition_changes: ConditionChanges::default(),
            activity_limitations: ActivityLimitations::default(),
            emergency_contact: EmergencyContact::default(),
        }
        .into_record(AppealId("abc123".to_string()), Utc::now());
        assert_eq!(record.attachment_name(), "disability_appeal_abc123.pdf");
    }
}
