//! Resource type registry.
//!
//! Maps resource type names to descriptors. The registry is populated at
//! startup and then shared read-only; documents are parsed by looking up
//! their `resourceType` here rather than by resolving types dynamically.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{StorageResult, ValidationError};
use crate::types::Resource;

/// Resource types defined by FHIR R4.
const R4_RESOURCE_TYPES: &[&str] = &[
    "Account",
    "ActivityDefinition",
    "AdverseEvent",
    "AllergyIntolerance",
    "Appointment",
    "AppointmentResponse",
    "AuditEvent",
    "Basic",
    "Binary",
    "BiologicallyDerivedProduct",
    "BodyStructure",
    "Bundle",
    "CapabilityStatement",
    "CarePlan",
    "CareTeam",
    "CatalogEntry",
    "ChargeItem",
    "ChargeItemDefinition",
    "Claim",
    "ClaimResponse",
    "ClinicalImpression",
    "CodeSystem",
    "Communication",
    "CommunicationRequest",
    "CompartmentDefinition",
    "Composition",
    "ConceptMap",
    "Condition",
    "Consent",
    "Contract",
    "Coverage",
    "CoverageEligibilityRequest",
    "CoverageEligibilityResponse",
    "DetectedIssue",
    "Device",
    "DeviceDefinition",
    "DeviceMetric",
    "DeviceRequest",
    "DeviceUseStatement",
    "DiagnosticReport",
    "DocumentManifest",
    "DocumentReference",
    "EffectEvidenceSynthesis",
    "Encounter",
    "Endpoint",
    "EnrollmentRequest",
    "EnrollmentResponse",
    "EpisodeOfCare",
    "EventDefinition",
    "Evidence",
    "EvidenceVariable",
    "ExampleScenario",
    "ExplanationOfBenefit",
    "FamilyMemberHistory",
    "Flag",
    "Goal",
    "GraphDefinition",
    "Group",
    "GuidanceResponse",
    "HealthcareService",
    "ImagingStudy",
    "Immunization",
    "ImmunizationEvaluation",
    "ImmunizationRecommendation",
    "ImplementationGuide",
    "InsurancePlan",
    "Invoice",
    "Library",
    "Linkage",
    "List",
    "Location",
    "Measure",
    "MeasureReport",
    "Media",
    "Medication",
    "MedicationAdministration",
    "MedicationDispense",
    "MedicationKnowledge",
    "MedicationRequest",
    "MedicationStatement",
    "MedicinalProduct",
    "MedicinalProductAuthorization",
    "MedicinalProductContraindication",
    "MedicinalProductIndication",
    "MedicinalProductIngredient",
    "MedicinalProductInteraction",
    "MedicinalProductManufactured",
    "MedicinalProductPackaged",
    "MedicinalProductPharmaceutical",
    "MedicinalProductUndesirableEffect",
    "MessageDefinition",
    "MessageHeader",
    "MolecularSequence",
    "NamingSystem",
    "NutritionOrder",
    "Observation",
    "ObservationDefinition",
    "OperationDefinition",
    "OperationOutcome",
    "Organization",
    "OrganizationAffiliation",
    "Parameters",
    "Patient",
    "PaymentNotice",
    "PaymentReconciliation",
    "Person",
    "PlanDefinition",
    "Practitioner",
    "PractitionerRole",
    "Procedure",
    "Provenance",
    "Questionnaire",
    "QuestionnaireResponse",
    "RelatedPerson",
    "RequestGroup",
    "ResearchDefinition",
    "ResearchElementDefinition",
    "ResearchStudy",
    "ResearchSubject",
    "RiskAssessment",
    "RiskEvidenceSynthesis",
    "Schedule",
    "SearchParameter",
    "ServiceRequest",
    "Slot",
    "Specimen",
    "SpecimenDefinition",
    "StructureDefinition",
    "StructureMap",
    "Subscription",
    "Substance",
    "SubstanceNucleicAcid",
    "SubstancePolymer",
    "SubstanceProtein",
    "SubstanceReferenceInformation",
    "SubstanceSourceMaterial",
    "SubstanceSpecification",
    "SupplyDelivery",
    "SupplyRequest",
    "Task",
    "TerminologyCapabilities",
    "TestReport",
    "TestScript",
    "ValueSet",
    "VerificationResult",
    "VisionPrescription",
];

/// How the store treats a resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// An ordinary resource.
    Domain,
    /// A container whose entries may be decomposed (e.g. `Bundle`).
    Container,
}

/// Describes a registered resource type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTypeDescriptor {
    name: String,
    kind: ResourceKind,
}

impl ResourceTypeDescriptor {
    /// Creates a descriptor for an ordinary resource type.
    pub fn domain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ResourceKind::Domain,
        }
    }

    /// Creates a descriptor for a container type.
    pub fn container(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ResourceKind::Container,
        }
    }

    /// Returns the type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the kind.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }
}

/// Registry of known resource types.
#[derive(Debug, Clone, Default)]
pub struct ResourceTypeRegistry {
    types: HashMap<String, ResourceTypeDescriptor>,
}

impl ResourceTypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every FHIR R4 resource type.
    pub fn r4() -> Self {
        let mut registry = Self::new();
        for name in R4_RESOURCE_TYPES {
            let descriptor = if *name == "Bundle" {
                ResourceTypeDescriptor::container(*name)
            } else {
                ResourceTypeDescriptor::domain(*name)
            };
            registry.register(descriptor);
        }
        registry
    }

    /// Adds or replaces a descriptor.
    pub fn register(&mut self, descriptor: ResourceTypeDescriptor) {
        self.types.insert(descriptor.name.clone(), descriptor);
    }

    /// Looks up a descriptor by type name.
    pub fn get(&self, resource_type: &str) -> Option<&ResourceTypeDescriptor> {
        self.types.get(resource_type)
    }

    /// Returns true if the type is registered.
    pub fn contains(&self, resource_type: &str) -> bool {
        self.types.contains_key(resource_type)
    }

    /// Returns the number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true if no types are registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Returns the descriptor for `resource_type` or an unsupported-type error.
    pub fn require(&self, resource_type: &str) -> StorageResult<&ResourceTypeDescriptor> {
        self.get(resource_type).ok_or_else(|| {
            ValidationError::UnsupportedResourceType {
                resource_type: resource_type.to_string(),
            }
            .into()
        })
    }

    /// Parses a document into a [`Resource`] of a registered type.
    pub fn parse_document(&self, document: Value) -> StorageResult<Resource> {
        let resource = Resource::from_document(document)?;
        self.require(resource.resource_type())?;
        Ok(resource)
    }

    /// Parses serialized bytes, checking the type matches `expected_type`.
    pub fn parse_slice(&self, expected_type: &str, bytes: &[u8]) -> StorageResult<Resource> {
        let document: Value = serde_json::from_slice(bytes)?;
        let resource = self.parse_document(document)?;
        if resource.resource_type() != expected_type {
            return Err(ValidationError::InvalidResource {
                message: format!(
                    "expected resourceType {}, found {}",
                    expected_type,
                    resource.resource_type()
                ),
            }
            .into());
        }
        Ok(resource)
    }
}
