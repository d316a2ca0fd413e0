//! Classification code table
//!
//! The code depends on the product and on which rule period the line's
//! validity start falls in. The 2024 rule change moved barnepensjon to a new
//! code; omstillingsstønad only exists under the new rules.

use chrono::{Datelike, NaiveDate};
use utbetaling_core::SakType;

/// First year of the 2024 rule period (starts 1 January)
pub const REGELVERK_2024_FRA_AAR: i32 = 2024;

/// Barnepensjon, rule period before 2024
pub const BARNEPENSJON_FOER_2024: &str = "BARNEPEFØR2024-OPTP";
/// Barnepensjon, rule period from 2024
pub const BARNEPENSJON: &str = "BARNEPENSJON-OPTP";
/// Omstillingsstønad
pub const OMSTILLINGSSTOENAD: &str = "OMSTILLINGOR";

/// Rule period a line falls in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regelverk {
    /// Start before 1 January 2024
    Foer2024,
    /// Start on or after 1 January 2024
    Fra2024,
}

impl Regelverk {
    /// Rule period for a validity start
    pub fn for_dato(fra: NaiveDate) -> Self {
        if fra.year() < REGELVERK_2024_FRA_AAR {
            Regelverk::Foer2024
        } else {
            Regelverk::Fra2024
        }
    }
}

/// `kodeKlassifik` for a line of `sak_type` starting on `fra`
pub fn klassifikasjonskode(sak_type: SakType, fra: NaiveDate) -> &'static str {
    match (sak_type, Regelverk::for_dato(fra)) {
        (SakType::Barnepensjon, Regelverk::Foer2024) => BARNEPENSJON_FOER_2024,
        (SakType::Barnepensjon, Regelverk::Fra2024) => BARNEPENSJON,
        (SakType::Omstillingsstoenad, _) => OMSTILLINGSSTOENAD,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dato(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_barnepensjon_follows_rule_period() {
        assert_eq!(
            klassifikasjonskode(SakType::Barnepensjon, dato(2023, 6, 1)),
            BARNEPENSJON_FOER_2024
        );
        assert_eq!(
            klassifikasjonskode(SakType::Barnepensjon, dato(2024, 3, 1)),
            BARNEPENSJON
        );
    }

    #[test]
    fn test_cutoff_boundary() {
        assert_eq!(
            klassifikasjonskode(SakType::Barnepensjon, dato(2023, 12, 31)),
            BARNEPENSJON_FOER_2024
        );
        assert_eq!(
            klassifikasjonskode(SakType::Barnepensjon, dato(2024, 1, 1)),
            BARNEPENSJON
        );
    }

    #[test]
    fn test_omstillingsstoenad_has_single_code() {
        for fra in [dato(2023, 1, 1), dato(2024, 1, 1), dato(2030, 5, 1)] {
            assert_eq!(
                klassifikasjonskode(SakType::Omstillingsstoenad, fra),
                OMSTILLINGSSTOENAD
            );
        }
    }
}
