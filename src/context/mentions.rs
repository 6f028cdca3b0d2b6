//! Derived mention scanning over recent inbound messages.
//!
//! These are coarse lexical hits used to enrich the context snapshot, not
//! a clinical signal. Indonesian terms first, common English equivalents
//! where patients mix languages.

use std::sync::LazyLock;

use regex::Regex;

struct MentionTerm {
    /// Canonical term reported in the snapshot.
    term: &'static str,
    regex: Regex,
}

fn term(canonical: &'static str, regex_str: &str) -> MentionTerm {
    MentionTerm {
        term: canonical,
        regex: Regex::new(regex_str).expect("Invalid mention regex pattern"),
    }
}

static SYMPTOM_TERMS: LazyLock<Vec<MentionTerm>> = LazyLock::new(|| {
    vec![
        term("pusing", r"(?i)\bpusing\b"),
        term("mual", r"(?i)\bmual\b"),
        term("muntah", r"(?i)\bmuntah\b"),
        term("demam", r"(?i)\b(?:demam|panas\s+tinggi|fever)\b"),
        term("lemas", r"(?i)\b(?:lemas|lelah|capek\s+sekali)\b"),
        term("batuk", r"(?i)\b(?:batuk|cough)\b"),
        term("nyeri", r"(?i)\b(?:nyeri|sakit|pain)\b"),
        term("gatal", r"(?i)\b(?:gatal|ruam|itchy|rash)\b"),
        term("bengkak", r"(?i)\b(?:bengkak|swelling|swollen)\b"),
        term("diare", r"(?i)\b(?:diare|mencret|diarrhea)\b"),
        term("sulit tidur", r"(?i)\b(?:sulit\s+tidur|tidak\s+bisa\s+tidur|insomnia)\b"),
    ]
});

static MEDICATION_TERMS: LazyLock<Vec<MentionTerm>> = LazyLock::new(|| {
    vec![
        term("obat", r"(?i)\bobat(?:nya)?\b"),
        term("dosis", r"(?i)\b(?:dosis|dose)\b"),
        term("resep", r"(?i)\b(?:resep|prescription)\b"),
        term("tablet", r"(?i)\b(?:tablet|pil|kapsul|pill|capsule)\b"),
        term("insulin", r"(?i)\binsulin\b"),
        term("suntik", r"(?i)\b(?:suntik|injeksi|injection)\b"),
        term("efek samping", r"(?i)\b(?:efek\s+samping|side\s+effects?)\b"),
    ]
});

fn scan(terms: &[MentionTerm], messages: &[&str]) -> Vec<String> {
    let mut found = Vec::new();
    for mt in terms {
        if messages.iter().any(|body| mt.regex.is_match(body)) {
            found.push(mt.term.to_string());
        }
    }
    found
}

/// Symptom terms appearing in any of the given message bodies.
pub fn symptom_mentions(messages: &[&str]) -> Vec<String> {
    scan(&SYMPTOM_TERMS, messages)
}

/// Medication terms appearing in any of the given message bodies.
pub fn medication_mentions(messages: &[&str]) -> Vec<String> {
    scan(&MEDICATION_TERMS, messages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_symptoms_across_messages() {
        let messages = ["kepala saya pusing", "dan agak mual juga"];
        let found = symptom_mentions(&messages);
        assert!(found.contains(&"pusing".to_string()));
        assert!(found.contains(&"mual".to_string()));
    }

    #[test]
    fn canonical_term_reported_for_variants() {
        let found = symptom_mentions(&["badan panas tinggi sejak kemarin"]);
        assert_eq!(found, vec!["demam".to_string()]);
    }

    #[test]
    fn medication_terms_include_side_effects() {
        let found = medication_mentions(&["apakah obatnya ada efek samping?"]);
        assert!(found.contains(&"obat".to_string()));
        assert!(found.contains(&"efek samping".to_string()));
    }

    #[test]
    fn each_term_reported_once() {
        let found = symptom_mentions(&["pusing", "masih pusing", "pusing sekali"]);
        assert_eq!(found.iter().filter(|t| *t == "pusing").count(), 1);
    }

    #[test]
    fn clean_messages_yield_nothing() {
        assert!(symptom_mentions(&["terima kasih bu"]).is_empty());
        assert!(medication_mentions(&["sampai jumpa besok"]).is_empty());
    }
}
