use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::profile::{CandidateProfile, TalentTier};
use crate::services::listing_service::TalentFilter;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TalentListQuery {
    pub search: Option<String>,
    pub location: Option<String>,
    pub min_experience: Option<i32>,
    pub max_rate: Option<i32>,
    pub availability: Option<String>,
    /// Comma-separated tiers.
    pub tier: Option<String>,
    pub limit: Option<usize>,
}

impl TalentListQuery {
    pub fn to_filter(&self) -> Result<TalentFilter> {
        let tiers = self
            .tier
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| t.parse::<TalentTier>().map_err(Error::BadRequest))
            .collect::<Result<Vec<_>>>()?;

        Ok(TalentFilter {
            keyword: self.search.clone(),
            location: self.location.clone(),
            min_years_experience: self.min_experience,
            max_monthly_rate_gbp: self.max_rate,
            availability: self.availability.clone(),
            tiers,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TalentCard {
    pub id: String,
    pub full_name: Option<String>,
    pub headline: Option<String>,
    pub country: Option<String>,
    pub years_of_experience: Option<i32>,
    pub skills: Vec<String>,
    pub expected_monthly_rate_gbp: Option<i32>,
    pub availability: Option<String>,
    pub weighted_total_score: Option<i32>,
    pub talent_tier: Option<TalentTier>,
}

impl From<CandidateProfile> for TalentCard {
    fn from(p: CandidateProfile) -> Self {
        Self {
            skills: p.skills(),
            id: p.id,
            full_name: p.full_name,
            headline: p.headline,
            country: p.country,
            years_of_experience: p.years_of_experience,
            expected_monthly_rate_gbp: p.expected_monthly_rate_gbp,
            availability: p.availability,
            weighted_total_score: p.weighted_total_score,
            talent_tier: p.talent_tier,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TalentListResponse {
    pub items: Vec<TalentCard>,
    pub total: usize,
}
