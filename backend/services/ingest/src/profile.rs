use jobfeed_config::ListingMode;

/// Where synchronized listings are stored and how their terms are shaped.
///
/// Resolved once at startup from [`ListingMode`] and handed to the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingProfile {
    pub mode: ListingMode,
    /// Collection the records are written to.
    pub listing_type: &'static str,
    /// Taxonomy the employment type is filed under, when the collection has one.
    pub type_taxonomy: Option<&'static str>,
}

impl ListingProfile {
    pub fn for_mode(mode: ListingMode) -> Self {
        match mode {
            ListingMode::Standalone => Self {
                mode,
                listing_type: "bullhornjoblisting",
                type_taxonomy: None,
            },
            ListingMode::JobBoard => Self {
                mode,
                listing_type: "job_listing",
                type_taxonomy: Some("job_listing_type"),
            },
        }
    }

    /// Employment type as stored: verbatim for the standalone collection, a slug term
    /// for collections that file it under a taxonomy.
    pub fn employment_type_term(&self, raw: &str) -> String {
        if self.type_taxonomy.is_none() {
            return raw.to_string();
        }
        raw.split(|c: char| !c.is_alphanumeric())
            .filter(|part| !part.is_empty())
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join("-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standalone_writes_to_own_collection() {
        let profile = ListingProfile::for_mode(ListingMode::Standalone);
        assert_eq!(profile.listing_type, "bullhornjoblisting");
        assert_eq!(profile.employment_type_term("Contract To Hire"), "Contract To Hire");
    }

    #[test]
    fn job_board_uses_slug_terms() {
        let profile = ListingProfile::for_mode(ListingMode::JobBoard);
        assert_eq!(profile.listing_type, "job_listing");
        assert_eq!(profile.employment_type_term("Contract To Hire"), "contract-to-hire");
        assert_eq!(profile.employment_type_term("Full-Time / Permanent"), "full-time-permanent");
    }
}
