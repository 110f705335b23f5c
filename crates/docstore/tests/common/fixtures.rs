//! Resource fixtures.

use serde_json::{Value, json};

use helios_docstore::Resource;

/// A patient with one official name.
pub fn patient(id: &str, family: &str) -> Resource {
    Resource::new(
        "Patient",
        json!({
            "resourceType": "Patient",
            "id": id,
            "name": [{"use": "official", "family": family, "given": ["Alex"]}],
            "gender": "unknown",
            "active": true
        }),
    )
}

/// A patient without an id.
pub fn anonymous_patient(family: &str) -> Resource {
    Resource::new(
        "Patient",
        json!({
            "resourceType": "Patient",
            "name": [{"family": family}]
        }),
    )
}

/// An observation about `patient_id`.
pub fn observation(id: &str, patient_id: &str, status: &str) -> Resource {
    Resource::new(
        "Observation",
        json!({
            "resourceType": "Observation",
            "id": id,
            "status": status,
            "code": {"coding": [{"system": "http://loinc.org", "code": "8867-4"}]},
            "subject": {"reference": format!("Patient/{patient_id}")}
        }),
    )
}

/// A batch bundle holding the given resource documents.
pub fn batch_bundle(id: &str, entries: Vec<Value>) -> Resource {
    let entries: Vec<Value> = entries
        .into_iter()
        .map(|resource| json!({"resource": resource}))
        .collect();
    Resource::new(
        "Bundle",
        json!({
            "resourceType": "Bundle",
            "id": id,
            "type": "batch",
            "entry": entries
        }),
    )
}

/// A patient whose serialized form is larger than `bytes`.
pub fn oversized_patient(id: &str, bytes: usize) -> Resource {
    Resource::new(
        "Patient",
        json!({
            "resourceType": "Patient",
            "id": id,
            "text": {"status": "generated", "div": "x".repeat(bytes)}
        }),
    )
}
