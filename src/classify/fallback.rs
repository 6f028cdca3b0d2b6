//! Deterministic keyword classifiers.
//!
//! Used whenever the model-backed service fails; same output types as the
//! service so handlers do not care which path produced the result.
//! Indonesian primary, English secondary. The tables are versioned so an
//! odd classification in production can be traced to the table that made it.

use std::sync::LazyLock;

use regex::Regex;

use super::{
    ConfirmationClassification, ConfirmationReply, InquiryClassification,
    VerificationClassification, VerificationReply,
};
use crate::policy::RequestedDataType;

/// Bumped whenever a keyword table changes.
pub const KEYWORD_RULES_VERSION: &str = "2026-07-r2";

const KEYWORD_CONFIDENCE: f32 = 0.8;
const INQUIRY_CONFIDENCE: f32 = 0.5;

fn rx(pattern: &str) -> Regex {
    Regex::new(pattern).expect("Invalid keyword regex pattern")
}

// Negatives are checked before affirmatives: "tidak" must never read as
// agreement because some longer phrase also contains an affirmative word.
static NEGATIVE: LazyLock<Regex> = LazyLock::new(|| {
    rx(r"(?i)\b(?:tidak|tak|nggak|gak|enggak|menolak|bukan|no)\b")
});
static AFFIRMATIVE: LazyLock<Regex> = LazyLock::new(|| {
    rx(r"(?i)\b(?:ya|iya|yaa|betul|benar|ok|oke|baik|setuju|bersedia|siap|yes|sure)\b")
});

static CONFIRMED: LazyLock<Regex> = LazyLock::new(|| {
    rx(r"(?i)\b(?:sudah|udah|selesai|sdh|done|already|taken)\b")
});
static MISSED: LazyLock<Regex> = LazyLock::new(|| {
    rx(r"(?i)\b(?:belum|blm|lupa|terlewat|kelewatan|missed|forgot)\b")
});
static HELP: LazyLock<Regex> = LazyLock::new(|| {
    rx(r"(?i)\b(?:tolong|bantuan|bantu|bingung|help|confused)\b")
});

struct InquiryRule {
    regex: Regex,
    data_type: RequestedDataType,
    topic: &'static str,
}

static INQUIRY_RULES: LazyLock<Vec<InquiryRule>> = LazyLock::new(|| {
    vec![
        InquiryRule {
            regex: rx(r"(?i)\b(?:jadwal|kapan\s+minum|schedule)\b"),
            data_type: RequestedDataType::MedicationSchedule,
            topic: "medication schedule",
        },
        InquiryRule {
            regex: rx(r"(?i)\b(?:kepatuhan|patuh|compliance|adherence)\b"),
            data_type: RequestedDataType::MedicationCompliance,
            topic: "medication compliance",
        },
        InquiryRule {
            regex: rx(r"(?i)\b(?:obat|dosis|efek\s+samping|medication|dose)\b"),
            data_type: RequestedDataType::MedicationInfo,
            topic: "medication",
        },
        InquiryRule {
            regex: rx(r"(?i)\b(?:catatan|riwayat|notes?|history)\b"),
            data_type: RequestedDataType::HealthNotes,
            topic: "health notes",
        },
        InquiryRule {
            regex: rx(r"(?i)\b(?:pengingat|ingatkan|reminders?)\b"),
            data_type: RequestedDataType::Reminder,
            topic: "reminders",
        },
    ]
});

/// Keyword classification of a verification reply.
pub fn classify_verification(message: &str) -> VerificationClassification {
    let (reply, confidence) = if NEGATIVE.is_match(message) {
        (VerificationReply::No, KEYWORD_CONFIDENCE)
    } else if AFFIRMATIVE.is_match(message) {
        (VerificationReply::Yes, KEYWORD_CONFIDENCE)
    } else {
        (VerificationReply::Uncertain, 0.0)
    };
    VerificationClassification {
        reply,
        confidence,
        needs_human_help: false,
    }
}

/// Keyword classification of a reminder-confirmation reply.
pub fn classify_confirmation(message: &str) -> ConfirmationClassification {
    let (reply, confidence) = if HELP.is_match(message) {
        (ConfirmationReply::HelpNeeded, KEYWORD_CONFIDENCE)
    } else if MISSED.is_match(message) {
        // "belum sempat minum obat" must win over the trailing mention of
        // having taken it yesterday, so missed is checked first.
        (ConfirmationReply::Missed, KEYWORD_CONFIDENCE)
    } else if CONFIRMED.is_match(message) {
        (ConfirmationReply::Confirmed, KEYWORD_CONFIDENCE)
    } else {
        (ConfirmationReply::Unrecognized, 0.0)
    };
    ConfirmationClassification { reply, confidence }
}

/// Keyword classification of a general inquiry.
pub fn classify_inquiry(message: &str) -> InquiryClassification {
    let needs_human_help = HELP.is_match(message);
    for rule in INQUIRY_RULES.iter() {
        if rule.regex.is_match(message) {
            return InquiryClassification {
                topic: Some(rule.topic.to_string()),
                data_type: Some(rule.data_type),
                needs_human_help,
                follow_up_required: false,
                confidence: INQUIRY_CONFIDENCE,
            };
        }
    }
    InquiryClassification {
        topic: None,
        data_type: Some(RequestedDataType::General),
        needs_human_help,
        follow_up_required: false,
        confidence: if needs_human_help { INQUIRY_CONFIDENCE } else { 0.0 },
    }
}
