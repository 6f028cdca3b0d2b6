//! Emergency indicator rule tables.
//!
//! Indonesian is the primary patient language, English secondary. Rules are
//! compiled once and versioned so staff can correlate an escalation with
//! the table that produced it.

use std::sync::LazyLock;

use regex::Regex;

/// Bumped whenever a rule is added, removed, or reweighted.
pub const EMERGENCY_RULES_VERSION: &str = "2026-07-r3";

/// A compiled pattern with its severity weight.
struct EmergencyPattern {
    regex: Regex,
    weight: f32,
    description: &'static str,
}

/// One rule hit inside a message.
#[derive(Debug, Clone, PartialEq)]
pub struct EmergencyMatch {
    pub description: &'static str,
    pub weight: f32,
    pub offset: usize,
    pub length: usize,
}

fn pattern(regex_str: &str, weight: f32, description: &'static str) -> EmergencyPattern {
    EmergencyPattern {
        regex: Regex::new(regex_str).expect("Invalid emergency regex pattern"),
        weight,
        description,
    }
}

static EMERGENCY_PATTERNS: LazyLock<Vec<EmergencyPattern>> = LazyLock::new(|| {
    vec![
        // ── Indonesian ───────────────────────────────────
        pattern(
            r"(?i)\b(?:tidak|tak|nggak|gak)\s+bisa\s+(?:bernapas|nafas|napas)\b",
            1.0,
            "Breathing difficulty: 'tidak bisa bernapas'",
        ),
        pattern(
            r"(?i)\bsesak\s+(?:napas|nafas)\b",
            0.9,
            "Breathing difficulty: 'sesak napas'",
        ),
        pattern(
            r"(?i)\b(?:nyeri|sakit)\s+dada\b",
            0.9,
            "Chest pain: 'nyeri dada'",
        ),
        pattern(
            r"(?i)\bserangan\s+jantung\b",
            1.0,
            "Cardiac event: 'serangan jantung'",
        ),
        pattern(
            r"(?i)\b(?:pingsan|tidak\s+sadarkan\s+diri|hilang\s+kesadaran)\b",
            0.9,
            "Loss of consciousness: 'pingsan'",
        ),
        pattern(r"(?i)\bkejang\b", 0.9, "Seizure: 'kejang'"),
        pattern(
            r"(?i)\b(?:pendarahan|perdarahan)\s+(?:hebat|banyak|terus)\b",
            0.9,
            "Severe bleeding: 'pendarahan hebat'",
        ),
        pattern(
            r"(?i)\bbunuh\s+diri\b|\bmengakhiri\s+hidup\b|\btidak\s+ingin\s+hidup\b",
            1.0,
            "Self-harm intent: 'bunuh diri'",
        ),
        pattern(
            r"(?i)\boverdosis\b|\bminum\s+obat\s+(?:terlalu\s+)?banyak\s+sekaligus\b",
            1.0,
            "Overdose: 'overdosis'",
        ),
        pattern(r"(?i)\bstroke\b", 0.9, "Stroke: 'stroke'"),
        pattern(
            r"(?i)\bdarurat\b|\btolong\s+(?:cepat|segera)\b",
            0.7,
            "Urgency plea: 'darurat' / 'tolong cepat'",
        ),
        pattern(
            r"(?i)\bmuntah\s+darah\b|\bbatuk\s+darah\b",
            0.9,
            "Hemorrhage sign: 'muntah darah'",
        ),
        // ── English ──────────────────────────────────────
        pattern(
            r"(?i)\bcan(?:no|')t\s+breathe?\b|\bcannot\s+breathe?\b",
            1.0,
            "Breathing difficulty: 'can't breathe'",
        ),
        pattern(r"(?i)\bchest\s+pain\b", 0.9, "Chest pain"),
        pattern(r"(?i)\bheart\s+attack\b", 1.0, "Cardiac event: 'heart attack'"),
        pattern(
            r"(?i)\b(?:unconscious|passed\s+out|fainted)\b",
            0.9,
            "Loss of consciousness",
        ),
        pattern(r"(?i)\bseizure\b", 0.9, "Seizure"),
        pattern(
            r"(?i)\b(?:severe|heavy)\s+bleeding\b|\bbleeding\s+(?:a\s+lot|heavily|won't\s+stop)\b",
            0.9,
            "Severe bleeding",
        ),
        pattern(
            r"(?i)\b(?:suicide|kill\s+myself|end\s+my\s+life|want\s+to\s+die)\b",
            1.0,
            "Self-harm intent",
        ),
        pattern(r"(?i)\boverdose\b", 1.0, "Overdose"),
        pattern(r"(?i)\bemergency\b", 0.7, "Urgency plea: 'emergency'"),
    ]
});

/// Scan a message against the emergency rule tables.
pub fn scan_emergency(text: &str) -> Vec<EmergencyMatch> {
    let mut matches = Vec::new();
    for ep in EMERGENCY_PATTERNS.iter() {
        for mat in ep.regex.find_iter(text) {
            matches.push(EmergencyMatch {
                description: ep.description,
                weight: ep.weight,
                offset: mat.start(),
                length: mat.len(),
            });
        }
    }
    deduplicate_matches(&mut matches);
    matches
}

/// Remove overlapping matches, keeping the more specific (longer) one.
fn deduplicate_matches(matches: &mut Vec<EmergencyMatch>) {
    matches.sort_by_key(|m| (m.offset, std::cmp::Reverse(m.length)));
    let mut i = 0;
    while i < matches.len() {
        let mut j = i + 1;
        while j < matches.len() {
            let i_end = matches[i].offset + matches[i].length;
            let j_end = matches[j].offset + matches[j].length;
            if matches[j].offset >= matches[i].offset && j_end <= i_end {
                matches.remove(j);
            } else {
                j += 1;
            }
        }
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Indonesian indicators ────────────────────────────

    #[test]
    fn detects_breathing_difficulty_id() {
        assert!(!scan_emergency("Saya tidak bisa bernapas sejak tadi malam").is_empty());
        assert!(!scan_emergency("sesak napas terus bu").is_empty());
    }

    #[test]
    fn detects_chest_pain_id() {
        let matches = scan_emergency("nyeri dada sebelah kiri, menjalar ke lengan");
        assert!(!matches.is_empty());
        assert!(matches[0].weight >= 0.9);
    }

    #[test]
    fn detects_self_harm_id() {
        let matches = scan_emergency("saya ingin bunuh diri saja");
        assert!(matches.iter().any(|m| m.weight >= 1.0));
    }

    #[test]
    fn detects_overdose_id() {
        assert!(!scan_emergency("tadi saya minum obat terlalu banyak sekaligus").is_empty());
    }

    #[test]
    fn detects_loss_of_consciousness_id() {
        assert!(!scan_emergency("ibu saya pingsan barusan").is_empty());
    }

    #[test]
    fn detects_urgency_plea_id() {
        let matches = scan_emergency("tolong cepat datang, ini darurat");
        assert!(matches.len() >= 2);
    }

    // ── English indicators ───────────────────────────────

    #[test]
    fn detects_cant_breathe_en() {
        assert!(!scan_emergency("I can't breathe properly").is_empty());
        assert!(!scan_emergency("cannot breathe since this morning").is_empty());
    }

    #[test]
    fn detects_heart_attack_en() {
        let matches = scan_emergency("I think I'm having a heart attack");
        assert!(matches.iter().any(|m| m.weight >= 1.0));
    }

    #[test]
    fn detects_suicide_en() {
        assert!(!scan_emergency("I want to kill myself").is_empty());
    }

    // ── Clean pass ───────────────────────────────────────

    #[test]
    fn routine_messages_are_clean() {
        for text in [
            "sudah minum obat pagi ini",
            "ya, saya bersedia",
            "kapan jadwal kontrol berikutnya?",
            "terima kasih atas pengingatnya",
            "I already took my medication today",
        ] {
            assert!(scan_emergency(text).is_empty(), "False positive on: {text}");
        }
    }

    #[test]
    fn case_insensitive() {
        assert!(!scan_emergency("NYERI DADA").is_empty());
        assert!(!scan_emergency("Serangan Jantung").is_empty());
    }

    #[test]
    fn overlapping_matches_deduplicated() {
        let mut matches = vec![
            EmergencyMatch {
                description: "outer",
                weight: 1.0,
                offset: 0,
                length: 20,
            },
            EmergencyMatch {
                description: "inner",
                weight: 0.9,
                offset: 5,
                length: 5,
            },
        ];
        deduplicate_matches(&mut matches);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].description, "outer");
    }

    #[test]
    fn rules_version_is_set() {
        assert!(!EMERGENCY_RULES_VERSION.is_empty());
    }
}
