//! Deterministic guest-party name generation using curated word lists.
//!
//! All generation is deterministic (same RNG sequence = same names).

use crate::rng::RandomSource;

/// Deterministic name generator for visiting groups.
pub struct NameGenerator;

impl NameGenerator {
    /// Generate a party name in one of four shapes:
    /// family, solo traveller, interest group, or adventure crew.
    pub fn generate_group_name(rng: &mut dyn RandomSource) -> String {
        match rng.next_u64_below(4) {
            0 => format!("The {} Family", Self::pick(rng, Self::surnames())),
            1 => {
                let first = Self::pick(rng, Self::first_names());
                format!("{} {first}", Self::pick(rng, Self::traveller_kinds()))
            }
            2 => format!("{} Travelers", Self::pick(rng, Self::interests())),
            _ => format!(
                "{} {}",
                Self::pick(rng, Self::crew_themes()),
                Self::pick(rng, Self::crew_nouns())
            ),
        }
    }

    fn pick(rng: &mut dyn RandomSource, list: &'static [&'static str]) -> &'static str {
        list[rng.next_u64_below(list.len() as u64) as usize]
    }

    fn surnames() -> &'static [&'static str] {
        &[
            "Miller", "Johnson", "Okafor", "Nguyen", "Schmidt", "Rossi", "Tanaka",
            "Silva", "Dubois", "Kowalski", "Haddad", "Larsen", "Murphy", "Chen",
            "Fernández", "Petrov", "Andersson", "Kim", "Moreau", "Brennan",
        ]
    }

    fn first_names() -> &'static [&'static str] {
        &[
            "Ben", "Lucía", "Omar", "Freya", "Kenji", "Priya", "Tomás", "Ingrid",
            "Malik", "Sofía", "Jonas", "Aiko", "Rafael", "Chloe", "Dmitri", "Zara",
        ]
    }

    fn traveller_kinds() -> &'static [&'static str] {
        &["Backpacker", "Photographer", "Surfer", "Birdwatcher", "Volunteer"]
    }

    fn interests() -> &'static [&'static str] {
        &[
            "Gourmet", "Birdwatching", "Honeymoon", "Yoga Retreat", "Sloth-Spotting",
            "Retired", "Student", "Wellness",
        ]
    }

    fn crew_themes() -> &'static [&'static str] {
        &["Adventure", "Canopy", "Volcano", "Rainforest", "Rapids", "Sunset"]
    }

    fn crew_nouns() -> &'static [&'static str] {
        &["Squad", "Club", "Crew", "Collective"]
    }
}
