use serde::{Deserialize, Serialize};

use crate::workflows::appeal::domain::{
    ActivityLimitations, AppealRecord, ConditionChanges, EmergencyContact, MedicalAppointment,
};

/// Rendering-ready projection of an appeal: exactly the fields the template reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TemplateData {
    pub name: String,
    pub ssn: String,
    pub medical_appointments: Vec<MedicalAppointment>,
    pub condition_changes: ConditionChanges,
    pub activity_limitations: ActivityLimitations,
    pub emergency_contact: EmergencyContact,
}

impl TemplateData {
    pub fn from_record(record: &AppealRecord) -> Self {
        Self {
            name: record.name.clone(),
            ssn: record.ssn.clone(),
            medical_appointments: record.medical_appointments.clone(),
            condition_changes: record.condition_changes.clone(),
            activity_limitations: record.activity_limitations.clone(),
            emergency_contact: record.emergency_contact.clone(),
        }
    }
}
