use serde::{Deserialize, Serialize};

use crate::store::StoreError;

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = StoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(StoreError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(VerificationStatus {
    Pending => "pending",
    Verified => "verified",
    Declined => "declined",
});

str_enum!(ConfirmationStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    Missed => "missed",
    Failed => "failed",
});

str_enum!(MessageDirection {
    Inbound => "inbound",
    Outbound => "outbound",
});

str_enum!(EscalationReason {
    EmergencyDetection => "emergency_detection",
    LowConfidence => "low_confidence",
    ComplexInquiry => "complex_inquiry",
    Other => "other",
});

str_enum!(NotificationPriority {
    Emergency => "emergency",
    High => "high",
    Medium => "medium",
    Low => "low",
});

str_enum!(NotificationStatus {
    Pending => "pending",
    Assigned => "assigned",
    Responded => "responded",
    Resolved => "resolved",
    Dismissed => "dismissed",
});

str_enum!(InteractionType {
    Verification => "verification",
    ReminderConfirmation => "reminder_confirmation",
    GeneralInquiry => "general_inquiry",
    Unclassified => "unclassified",
});

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn verification_status_round_trip() {
        for status in [
            VerificationStatus::Pending,
            VerificationStatus::Verified,
            VerificationStatus::Declined,
        ] {
            assert_eq!(VerificationStatus::from_str(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn unknown_value_is_rejected() {
        let err = NotificationPriority::from_str("urgent").unwrap_err();
        match err {
            StoreError::InvalidEnum { field, value } => {
                assert_eq!(field, "NotificationPriority");
                assert_eq!(value, "urgent");
            }
            other => panic!("Expected InvalidEnum, got {other}"),
        }
    }

    #[test]
    fn escalation_reason_wire_values() {
        assert_eq!(EscalationReason::EmergencyDetection.as_str(), "emergency_detection");
        assert_eq!(EscalationReason::LowConfidence.as_str(), "low_confidence");
        assert_eq!(EscalationReason::ComplexInquiry.as_str(), "complex_inquiry");
    }
}
