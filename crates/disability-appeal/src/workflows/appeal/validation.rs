use std::fmt;

use serde::Serialize;

use super::domain::{
    ActivityLimitations, ActivityLimitationsInput, AppealSubmission, ConditionChanges,
    ConditionChangesInput, EmergencyContact, EmergencyContactInput, MedicalAppointment, NewAppeal,
};

/// A single failed intake rule, keyed by the JSON path of the offending field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub path: String,
    pub msg: String,
}

impl FieldViolation {
    pub fn new(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            msg: msg.into(),
        }
    }
}

/// Every rule the submission broke. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    pub errors: Vec<FieldViolation>,
}

impl ValidationErrors {
    pub fn single(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldViolation::new(path, msg)],
        }
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.errors.iter().any(|violation| violation.path == path)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "submission rejected:")?;
        for (index, violation) in self.errors.iter().enumerate() {
            let separator = if index == 0 { " " } else { "; " };
            write!(f, "{separator}{} ({})", violation.msg, violation.path)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Checks every intake precondition and produces the trimmed, persistable appeal.
///
/// All violations are collected so the form can highlight every bad field at once.
pub fn validate_submission(submission: AppealSubmission) -> Result<NewAppeal, ValidationErrors> {
    let AppealSubmission {
        name,
        ssn,
        medical_appointments,
        condition_changes,
        activity_limitations,
        emergency_contact,
    } = submission;

    let mut errors = Vec::new();

    let name = trimmed(name);
    if name.chars().count() < 2 {
        errors.push(FieldViolation::new(
            "name",
            "Name must be at least 2 characters",
        ));
    }

    let ssn = trimmed(ssn);
    if ssn.len() != 4 || !ssn.chars().all(|c| c.is_ascii_digit()) {
        errors.push(FieldViolation::new("ssn", "SSN must be 4 digits"));
    }

    let medical_appointments = match medical_appointments {
        Some(appointments) => appointments.into_iter().map(tidy_appointment).collect(),
        None => {
            errors.push(FieldViolation::new(
                "medicalAppointments",
                "medicalAppointments must be an array",
            ));
            Vec::new()
        }
    };

    let condition_changes = check_condition_changes(condition_changes, &mut errors);
    let activity_limitations = check_activity_limitations(activity_limitations, &mut errors);
    let emergency_contact = check_emergency_contact(emergency_contact, &mut errors);

    if !errors.is_empty() {
        return Err(ValidationErrors { errors });
    }

    Ok(NewAppeal {
        name,
        ssn,
        medical_appointments,
        condition_changes,
        activity_limitations,
        emergency_contact,
    })
}

fn check_condition_changes(
    input: Option<ConditionChangesInput>,
    errors: &mut Vec<FieldViolation>,
) -> ConditionChanges {
    let input = input.unwrap_or_default();
    let description = optional_text(input.description);

    let has_changes = match input.has_changes {
        Some(flag) => flag,
        None => {
            errors.push(FieldViolation::new(
                "conditionChanges.hasChanges",
                "hasChanges must be a boolean",
            ));
            false
        }
    };

    if has_changes && description.is_none() {
        errors.push(FieldViolation::new(
            "conditionChanges.description",
            "Description is required when changes exist",
        ));
    }

    ConditionChanges {
        has_changes,
        description,
        when_changed: input.when_changed,
    }
}

fn check_activity_limitations(
    input: Option<ActivityLimitationsInput>,
    errors: &mut Vec<FieldViolation>,
) -> ActivityLimitations {
    let input = input.unwrap_or_default();
    let examples = optional_text(input.examples);

    let has_limitations = match input.has_limitations {
        Some(flag) => flag,
        None => {
            errors.push(FieldViolation::new(
                "activityLimitations.hasLimitations",
                "hasLimitations must be a boolean",
            ));
            false
        }
    };

    if has_limitations && examples.is_none() {
        errors.push(FieldViolation::new(
            "activityLimitations.examples",
            "Examples are required when limitations exist",
        ));
    }

    ActivityLimitations {
        has_limitations,
        examples,
    }
}

fn check_emergency_contact(
    input: Option<EmergencyContactInput>,
    errors: &mut Vec<FieldViolation>,
) -> EmergencyContact {
    let input = input.unwrap_or_default();
    let contact = EmergencyContact {
        name: trimmed(input.name),
        phone: trimmed(input.phone),
        relationship: trimmed(input.relationship),
    };

    for (path, value, label) in [
        ("emergencyContact.name", &contact.name, "name"),
        ("emergencyContact.phone", &contact.phone, "phone"),
        (
            "emergencyContact.relationship",
            &contact.relationship,
            "relationship",
        ),
    ] {
        if value.is_empty() {
            errors.push(FieldViolation::new(
                path,
                format!("Emergency contact {label} is required"),
            ));
        }
    }

    contact
}

fn tidy_appointment(appointment: MedicalAppointment) -> MedicalAppointment {
    MedicalAppointment {
        doctor_name: optional_text(appointment.doctor_name),
        office_name: optional_text(appointment.office_name),
        address: optional_text(appointment.address),
        medical_conditions_treated: optional_text(appointment.medical_conditions_treated),
        phone: optional_text(appointment.phone),
        fax: optional_text(appointment.fax),
        specialist_type: optional_text(appointment.specialist_type),
        testing_type: optional_text(appointment.testing_type),
        testing_facility: optional_text(appointment.testing_facility),
        ..appointment
    }
}

fn trimmed(value: Option<String>) -> String {
    value.map(|text| text.trim().to_string()).unwrap_or_default()
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}
