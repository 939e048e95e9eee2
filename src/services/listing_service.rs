use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::Result;
use crate::models::profile::{CandidateProfile, TalentTier};
use crate::services::profile_store::ProfileStore;

const SYNONYMS: [(&str, &str); 2] = [
    ("ai", "artificial intelligence"),
    ("ml", "machine learning"),
];

/// Recruiter-side predicates. Everything is AND-ed except keyword subterms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TalentFilter {
    pub keyword: Option<String>,
    pub location: Option<String>,
    pub min_years_experience: Option<i32>,
    pub max_monthly_rate_gbp: Option<i32>,
    pub availability: Option<String>,
    pub tiers: Vec<TalentTier>,
}

fn lowered(value: &Option<String>) -> String {
    value.as_deref().unwrap_or_default().to_lowercase()
}

fn has_token(haystack: &str, token: &str) -> bool {
    haystack
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word == token)
}

/// Substring match plus the fixed ai/ml expansions in both directions.
fn keyword_matches(keywords: &str, term: &str) -> bool {
    if keywords.contains(term) {
        return true;
    }
    SYNONYMS.iter().any(|(short, long)| {
        (term == *short && keywords.contains(long)) || (term == *long && has_token(keywords, short))
    })
}

impl TalentFilter {
    pub fn matches(&self, profile: &CandidateProfile) -> bool {
        self.matches_keyword(profile)
            && self.matches_location(profile)
            && self.matches_experience(profile)
            && self.matches_rate(profile)
            && self.matches_availability(profile)
            && self.matches_tier(profile)
    }

    fn matches_keyword(&self, profile: &CandidateProfile) -> bool {
        let term = lowered(&self.keyword);
        let term = term.trim();
        if term.is_empty() {
            return true;
        }
        if lowered(&profile.full_name).contains(term) || lowered(&profile.headline).contains(term) {
            return true;
        }

        let keywords = format!(
            "{} {}",
            profile.cv_skills.join(" ").to_lowercase(),
            lowered(&profile.tech_stack)
        );
        let keywords = keywords.trim();

        if term.contains(" & ") {
            return term
                .split(" & ")
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .any(|sub| keyword_matches(keywords, sub));
        }
        keyword_matches(keywords, term)
    }

    fn matches_location(&self, profile: &CandidateProfile) -> bool {
        let location = lowered(&self.location);
        let location = location.trim();
        location.is_empty() || lowered(&profile.country).contains(location)
    }

    fn matches_experience(&self, profile: &CandidateProfile) -> bool {
        match self.min_years_experience {
            None => true,
            Some(min) => profile.years_of_experience.map_or(false, |y| y >= min),
        }
    }

    fn matches_rate(&self, profile: &CandidateProfile) -> bool {
        match self.max_monthly_rate_gbp {
            None => true,
            Some(max) => profile.expected_monthly_rate_gbp.map_or(false, |r| r <= max),
        }
    }

    fn matches_availability(&self, profile: &CandidateProfile) -> bool {
        let wanted = lowered(&self.availability);
        let wanted = wanted.trim();
        if wanted.is_empty() || wanted == "all" {
            return true;
        }
        lowered(&profile.availability) == wanted
    }

    fn matches_tier(&self, profile: &CandidateProfile) -> bool {
        self.tiers.is_empty()
            || profile
                .talent_tier
                .map_or(false, |tier| self.tiers.contains(&tier))
    }
}

/// Highest weighted score first; unscored profiles last.
fn by_score_desc(a: &CandidateProfile, b: &CandidateProfile) -> Ordering {
    match (a.weighted_total_score, b.weighted_total_score) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn filter_profiles(
    profiles: Vec<CandidateProfile>,
    filter: &TalentFilter,
) -> Vec<CandidateProfile> {
    let mut matching: Vec<_> = profiles.into_iter().filter(|p| filter.matches(p)).collect();
    matching.sort_by(by_score_desc);
    matching
}

#[derive(Clone)]
pub struct ListingService {
    store: Arc<dyn ProfileStore>,
}

impl ListingService {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }

    pub async fn search(&self, filter: &TalentFilter) -> Result<Vec<CandidateProfile>> {
        let profiles = self.store.list().await?;
        Ok(filter_profiles(profiles, filter))
    }
}
