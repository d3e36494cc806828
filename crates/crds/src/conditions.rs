//! Cluster API style status conditions
//!
//! Conditions follow the Cluster API `v1beta1` shape. `set_condition` only
//! moves `lastTransitionTime` when the status actually flips, so a status
//! rebuilt from unchanged inputs compares equal to the persisted one.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// KairosConfig condition types
pub const READY_CONDITION: &str = "Ready";
pub const BOOTSTRAP_READY_CONDITION: &str = "BootstrapReady";
pub const DATA_SECRET_AVAILABLE_CONDITION: &str = "DataSecretAvailable";

// KairosConfig condition reasons
pub const WAITING_FOR_CLUSTER_INFRASTRUCTURE_REASON: &str = "WaitingForClusterInfrastructure";
pub const WAITING_FOR_CONTROL_PLANE_INITIALIZATION_REASON: &str = "WaitingForControlPlaneInitialization";
pub const WAITING_FOR_CONTROL_PLANE_ENDPOINT_REASON: &str = "WaitingForControlPlaneEndpoint";
pub const BOOTSTRAP_DATA_SECRET_GENERATION_FAILED_REASON: &str = "BootstrapDataSecretGenerationFailed";
pub const BOOTSTRAP_DATA_SECRET_AVAILABLE_REASON: &str = "BootstrapDataSecretAvailable";
pub const BOOTSTRAP_SUCCEEDED_REASON: &str = "BootstrapSucceeded";
pub const BOOTSTRAP_FAILED_REASON: &str = "BootstrapFailed";

// KairosControlPlane condition types
pub const AVAILABLE_CONDITION: &str = "Available";
pub const MACHINES_CREATED_CONDITION: &str = "MachinesCreated";
pub const RESIZED_CONDITION: &str = "Resized";

// KairosControlPlane condition reasons
pub const WAITING_FOR_MACHINES_REASON: &str = "WaitingForMachines";
pub const WAITING_FOR_MACHINES_READY_REASON: &str = "WaitingForMachinesReady";
pub const MACHINE_CREATION_FAILED_REASON: &str = "MachineCreationFailed";
pub const SCALING_UP_REASON: &str = "ScalingUp";
pub const SCALING_DOWN_REASON: &str = "ScalingDown";

/// Status of a condition
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

/// Severity of a `False` condition
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionSeverity {
    Error,
    Warning,
    Info,
}

/// A single observation of an object's state
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type (e.g., "Ready", "Available")
    #[serde(rename = "type")]
    pub r#type: String,

    /// True, False or Unknown
    pub status: ConditionStatus,

    /// Severity, only meaningful when status is False
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<ConditionSeverity>,

    /// Last time the status flipped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,

    /// CamelCase reason for the last transition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Condition {
    /// A `True` condition of the given type
    pub fn true_condition(condition_type: &str) -> Self {
        Self {
            r#type: condition_type.to_string(),
            status: ConditionStatus::True,
            severity: None,
            last_transition_time: None,
            reason: None,
            message: None,
        }
    }

    /// A `False` condition with a reason, severity and message
    pub fn false_condition(
        condition_type: &str,
        reason: &str,
        severity: ConditionSeverity,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        Self {
            r#type: condition_type.to_string(),
            status: ConditionStatus::False,
            severity: Some(severity),
            last_transition_time: None,
            reason: Some(reason.to_string()),
            message: (!message.is_empty()).then_some(message),
        }
    }

    /// Attach a reason to a `True` condition
    #[must_use]
    pub fn with_reason(mut self, reason: &str) -> Self {
        self.reason = Some(reason.to_string());
        self
    }

    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }
}

/// Insert or replace a condition by type
///
/// The transition time is carried over from the existing condition when the
/// status did not change, and stamped with the current time otherwise.
pub fn set_condition(conditions: &mut Vec<Condition>, mut condition: Condition) {
    match conditions.iter_mut().find(|c| c.r#type == condition.r#type) {
        Some(existing) => {
            condition.last_transition_time = if existing.status == condition.status {
                existing.last_transition_time
            } else {
                Some(Utc::now())
            };
            *existing = condition;
        }
        None => {
            condition.last_transition_time = Some(Utc::now());
            conditions.push(condition);
        }
    }
}

/// Find a condition by type
pub fn find_condition<'a>(conditions: &'a [Condition], condition_type: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Whether the condition of the given type exists and is `True`
pub fn is_condition_true(conditions: &[Condition], condition_type: &str) -> bool {
    find_condition(conditions, condition_type).is_some_and(Condition::is_true)
}
