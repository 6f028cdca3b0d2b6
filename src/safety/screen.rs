//! The emergency screen itself.

use super::keywords::{scan_emergency, EMERGENCY_RULES_VERSION};

/// Result of screening one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenResult {
    pub is_emergency: bool,
    /// 0.0–1.0; the strongest matched rule, nudged up by corroborating hits.
    pub confidence: f32,
    /// Descriptions of the matched rules, safe to log and persist.
    pub indicators: Vec<String>,
    pub escalation_required: bool,
}

impl ScreenResult {
    fn clean() -> Self {
        Self {
            is_emergency: false,
            confidence: 0.0,
            indicators: Vec::new(),
            escalation_required: false,
        }
    }
}

/// Screen a message for life-threatening content.
pub fn screen_message(message: &str) -> ScreenResult {
    let matches = scan_emergency(message);
    if matches.is_empty() {
        return ScreenResult::clean();
    }

    let strongest = matches
        .iter()
        .map(|m| m.weight)
        .fold(0.0_f32, f32::max);
    let corroboration = 0.05 * (matches.len().saturating_sub(1)) as f32;
    let confidence = (strongest + corroboration).clamp(0.0, 1.0);

    let indicators: Vec<String> = matches.iter().map(|m| m.description.to_string()).collect();

    tracing::warn!(
        indicator_count = indicators.len(),
        confidence,
        rules_version = EMERGENCY_RULES_VERSION,
        "Emergency screen: positive"
    );

    ScreenResult {
        is_emergency: true,
        confidence,
        indicators,
        escalation_required: true,
    }
}
