//! Utbetalingsstatus and the best-status projection
//!
//! Status is never stored. It is reduced from the hendelse log: the most
//! favorable status present wins, and an empty log is `MOTTATT`.
//!
//! Best-wins (rather than most-recent-wins) is a confirmed contract with the
//! receipt consumers and must not be changed without product clarification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Receipt status of a dispatched oppdrag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Utbetalingsstatus {
    /// Accepted
    Godkjent,
    /// Accepted with warnings
    GodkjentMedFeil,
    /// Rejected on functional grounds
    Avvist,
    /// Rejected on technical grounds
    Feilet,
    /// Sent, no receipt yet
    Sendt,
    /// Created, not yet sent
    Mottatt,
}

impl Utbetalingsstatus {
    /// All statuses, best first
    pub const ALLE: [Utbetalingsstatus; 6] = [
        Utbetalingsstatus::Godkjent,
        Utbetalingsstatus::GodkjentMedFeil,
        Utbetalingsstatus::Avvist,
        Utbetalingsstatus::Feilet,
        Utbetalingsstatus::Sendt,
        Utbetalingsstatus::Mottatt,
    ];

    /// Rank in the reduction order, 0 is the best outcome
    pub fn rang(&self) -> u8 {
        match self {
            Utbetalingsstatus::Godkjent => 0,
            Utbetalingsstatus::GodkjentMedFeil => 1,
            Utbetalingsstatus::Avvist => 2,
            Utbetalingsstatus::Feilet => 3,
            Utbetalingsstatus::Sendt => 4,
            Utbetalingsstatus::Mottatt => 5,
        }
    }

    /// Reduce a set of statuses to the best one, `MOTTATT` if empty
    pub fn beste<I>(statuser: I) -> Utbetalingsstatus
    where
        I: IntoIterator<Item = Utbetalingsstatus>,
    {
        statuser
            .into_iter()
            .min_by_key(Utbetalingsstatus::rang)
            .unwrap_or(Utbetalingsstatus::Mottatt)
    }

    /// Name as persisted and logged
    pub fn as_str(&self) -> &'static str {
        match self {
            Utbetalingsstatus::Godkjent => "GODKJENT",
            Utbetalingsstatus::GodkjentMedFeil => "GODKJENT_MED_FEIL",
            Utbetalingsstatus::Avvist => "AVVIST",
            Utbetalingsstatus::Feilet => "FEILET",
            Utbetalingsstatus::Sendt => "SENDT",
            Utbetalingsstatus::Mottatt => "MOTTATT",
        }
    }

    /// Business outcome reported by the accounting system
    pub fn er_kvittert(&self) -> bool {
        !matches!(self, Utbetalingsstatus::Sendt | Utbetalingsstatus::Mottatt)
    }
}

impl fmt::Display for Utbetalingsstatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_mottatt() {
        assert_eq!(Utbetalingsstatus::beste([]), Utbetalingsstatus::Mottatt);
    }

    #[test]
    fn test_all_statuses_reduce_to_godkjent() {
        assert_eq!(
            Utbetalingsstatus::beste(Utbetalingsstatus::ALLE),
            Utbetalingsstatus::Godkjent
        );
    }

    #[test]
    fn test_earlier_success_masks_later_failure() {
        let statuser = [
            Utbetalingsstatus::Sendt,
            Utbetalingsstatus::GodkjentMedFeil,
            Utbetalingsstatus::Feilet,
        ];
        assert_eq!(
            Utbetalingsstatus::beste(statuser),
            Utbetalingsstatus::GodkjentMedFeil
        );
    }

    #[test]
    fn test_rank_follows_declaration_order() {
        for (i, status) in Utbetalingsstatus::ALLE.iter().enumerate() {
            assert_eq!(status.rang() as usize, i);
        }
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Utbetalingsstatus::GodkjentMedFeil).unwrap();
        assert_eq!(json, "\"GODKJENT_MED_FEIL\"");
        assert_eq!(Utbetalingsstatus::GodkjentMedFeil.to_string(), "GODKJENT_MED_FEIL");
    }

    #[test]
    fn test_er_kvittert() {
        assert!(Utbetalingsstatus::Avvist.er_kvittert());
        assert!(!Utbetalingsstatus::Sendt.er_kvittert());
        assert!(!Utbetalingsstatus::Mottatt.er_kvittert());
    }
}
