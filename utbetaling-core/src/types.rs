//! Core types for the utbetaling aggregate
//!
//! All persisted types round-trip through serde_json, which is the row
//! format used by both store implementations.

use crate::status::Utbetalingsstatus;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Raw value
            pub fn value(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Case identifier, also used as `fagsystemId` on the wire
    SakId
);
numeric_id!(
    /// Approved decision identifier
    VedtakId
);
numeric_id!(
    /// Payment line identifier (`delytelseId` on the wire)
    ///
    /// Assigned monotonically, so a line created earlier has a smaller id.
    UtbetalingslinjeId
);

/// Utbetaling identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UtbetalingId(pub Uuid);

impl UtbetalingId {
    /// New time-ordered id
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for UtbetalingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UtbetalingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Behandling identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BehandlingId(pub Uuid);

impl BehandlingId {
    /// Max length of the reference accepted by the accounting system
    pub const OPPDRAG_REF_LENGTH: usize = 30;

    /// Wire-safe reference: dashes removed, truncated to 30 characters
    pub fn to_oppdrag_ref(&self) -> String {
        self.0
            .simple()
            .to_string()
            .chars()
            .take(Self::OPPDRAG_REF_LENGTH)
            .collect()
    }
}

impl fmt::Display for BehandlingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pension product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SakType {
    /// Children's survivor pension
    Barnepensjon,
    /// Adjustment allowance for surviving spouses
    Omstillingsstoenad,
}

impl SakType {
    /// All product types
    pub const ALLE: [SakType; 2] = [SakType::Barnepensjon, SakType::Omstillingsstoenad];

    /// `kodeFagomraade` used by the accounting system
    pub fn fagomraade(&self) -> &'static str {
        match self {
            SakType::Barnepensjon => "BARNEPE",
            SakType::Omstillingsstoenad => "OMSTILL",
        }
    }

    /// Stable single-byte tag used in storage keys
    pub fn tag(&self) -> u8 {
        match self {
            SakType::Barnepensjon => 1,
            SakType::Omstillingsstoenad => 2,
        }
    }
}

impl fmt::Display for SakType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fagomraade())
    }
}

/// Immutable ordering timestamp assigned once when an Utbetaling is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Avstemmingsnokkel(DateTime<Utc>);

impl Avstemmingsnokkel {
    /// Wire format, microsecond precision
    pub const WIRE_FORMAT: &'static str = "%Y-%m-%d-%H.%M.%S%.6f";

    /// Assign a new key from the current time
    pub fn now() -> Self {
        Self::from(Utc::now())
    }

    /// Underlying timestamp
    pub fn tidspunkt(&self) -> DateTime<Utc> {
        self.0
    }

    /// Format for `nokkelAvstemming` / `nokkelFom` / `nokkelTom`
    pub fn to_wire(&self) -> String {
        self.0.format(Self::WIRE_FORMAT).to_string()
    }
}

impl From<DateTime<Utc>> for Avstemmingsnokkel {
    fn from(tidspunkt: DateTime<Utc>) -> Self {
        // Truncated to the precision carried on the wire
        let micros = tidspunkt.timestamp_micros();
        Self(DateTime::from_timestamp_micros(micros).unwrap_or(tidspunkt))
    }
}

/// Validity period, open-ended when `til` is absent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Periode {
    /// First day
    pub fra: NaiveDate,
    /// Last day (inclusive)
    pub til: Option<NaiveDate>,
}

impl Periode {
    /// Create period
    pub fn new(fra: NaiveDate, til: Option<NaiveDate>) -> Self {
        Self { fra, til }
    }

    /// Check if the period covers a date
    pub fn inneholder(&self, dato: NaiveDate) -> bool {
        dato >= self.fra && self.til.map_or(true, |til| dato <= til)
    }
}

/// Kind of payment line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UtbetalingslinjeType {
    /// Ongoing payment
    Utbetaling,
    /// Termination of earlier payment
    Opphoer,
}

/// Payment-run timing flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Kjoereplan {
    /// Pay with the next parameterised run
    MedParameter,
    /// Pay with the next regular monthly run
    NesteRegulaere,
}

impl Kjoereplan {
    /// `brukKjoreplan` value
    pub fn as_wire(&self) -> &'static str {
        match self {
            Kjoereplan::MedParameter => "J",
            Kjoereplan::NesteRegulaere => "N",
        }
    }
}

/// Payment line, belongs to exactly one Utbetaling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utbetalingslinje {
    /// Line id
    pub id: UtbetalingslinjeId,
    /// Kind
    #[serde(rename = "type")]
    pub linje_type: UtbetalingslinjeType,
    /// Owning Utbetaling
    pub utbetaling_id: UtbetalingId,
    /// Owning sak
    pub sak_id: SakId,
    /// Earlier line this one supersedes
    pub erstatter_id: Option<UtbetalingslinjeId>,
    /// Validity
    pub periode: Periode,
    /// Monthly amount, absent for terminations
    pub beloep: Option<Decimal>,
    /// Classification code (`kodeKlassifik`)
    pub klassifikasjonskode: String,
    /// Payment-run timing
    pub kjoereplan: Kjoereplan,
    /// Created
    pub opprettet: DateTime<Utc>,
}

/// Receipt event, append-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utbetalingshendelse {
    /// Event id
    pub id: Uuid,
    /// Utbetaling it belongs to
    pub utbetaling_id: UtbetalingId,
    /// Status carried by the event
    pub status: Utbetalingsstatus,
    /// Raw receipt payload
    pub payload: Option<String>,
    /// Timestamp
    pub tidspunkt: DateTime<Utc>,
}

impl Utbetalingshendelse {
    /// New event stamped now
    pub fn new(utbetaling_id: UtbetalingId, status: Utbetalingsstatus, payload: Option<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            utbetaling_id,
            status,
            payload,
            tidspunkt: Utc::now(),
        }
    }

    /// Same receipt replayed: status and payload match
    pub fn er_samme_kvittering(&self, other: &Utbetalingshendelse) -> bool {
        self.utbetaling_id == other.utbetaling_id
            && self.status == other.status
            && self.payload == other.payload
    }
}

/// Sak part of the vedtak snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VedtakSak {
    /// Sak id
    pub id: SakId,
    /// Recipient identifier
    pub ident: String,
    /// Product
    pub sak_type: SakType,
}

/// Kind of behandling that produced the vedtak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BehandlingType {
    /// First decision on the sak
    Foerstegangsbehandling,
    /// Amendment
    Revurdering,
    /// Mass regulation run
    Regulering,
}

/// Behandling part of the vedtak snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Behandling {
    /// Behandling id
    pub id: BehandlingId,
    /// Kind
    #[serde(rename = "type")]
    pub behandling_type: BehandlingType,
}

/// Payment period as decided
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utbetalingsperiode {
    /// Line id assigned upstream
    pub id: UtbetalingslinjeId,
    /// Validity
    pub periode: Periode,
    /// Monthly amount, absent for terminations
    #[serde(default, deserialize_with = "beloep_tall_eller_tekst")]
    pub beloep: Option<Decimal>,
    /// Kind
    #[serde(rename = "type")]
    pub periode_type: UtbetalingslinjeType,
}

/// Vedtak producers send amounts as JSON numbers; stored rows carry strings
fn beloep_tall_eller_tekst<'de, D>(deserializer: D) -> std::result::Result<Option<Decimal>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Tall {
        Tekst(String),
        Heltall(i64),
        Flyt(f64),
    }

    match Option::<Tall>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Tall::Tekst(tekst)) => tekst
            .trim()
            .parse::<Decimal>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        Some(Tall::Heltall(n)) => Ok(Some(Decimal::from(n))),
        Some(Tall::Flyt(f)) => Decimal::try_from(f)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Who made the decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VedtakFattet {
    /// Case handler
    pub ansvarlig: String,
    /// Case handler unit
    pub ansvarlig_enhet: String,
}

/// Who attested the decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attestasjon {
    /// Attestant
    pub attestant: String,
    /// Attestant unit
    pub attesterende_enhet: String,
}

/// Immutable snapshot of the approved decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vedtak {
    /// Vedtak id
    pub vedtak_id: VedtakId,
    /// Sak
    pub sak: VedtakSak,
    /// Behandling
    pub behandling: Behandling,
    /// Decided payment periods
    pub utbetalingsperioder: Vec<Utbetalingsperiode>,
    /// Decision maker
    pub vedtak_fattet: VedtakFattet,
    /// Attestation
    pub attestasjon: Attestasjon,
}

impl Vedtak {
    /// Regulation runs are flagged on the oppdrag lines
    pub fn er_regulering(&self) -> bool {
        self.behandling.behandling_type == BehandlingType::Regulering
    }
}

/// Aggregate root: one dispatched payment instruction for one vedtak
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utbetaling {
    /// Id
    pub id: UtbetalingId,
    /// Sak
    pub sak_id: SakId,
    /// Product
    pub sak_type: SakType,
    /// Behandling
    pub behandling_id: BehandlingId,
    /// Truncated behandling reference used on the wire
    pub behandling_id_til_oppdrag: String,
    /// Vedtak
    pub vedtak_id: VedtakId,
    /// Created
    pub opprettet: DateTime<Utc>,
    /// Ordering key for reconciliation, never changed after creation
    pub avstemmingsnokkel: Avstemmingsnokkel,
    /// Recipient identifier
    pub stoenadsmottaker: String,
    /// Case handler
    pub saksbehandler: String,
    /// Case handler unit
    pub saksbehandler_enhet: String,
    /// Attestant
    pub attestant: String,
    /// Attestant unit
    pub attestant_enhet: String,
    /// Decision snapshot
    pub vedtak: Vedtak,
    /// Generated wire payload, recorded once
    pub oppdrag: Option<String>,
    /// Ordered payment lines
    pub utbetalingslinjer: Vec<Utbetalingslinje>,
    /// Append-only receipt log
    pub utbetalingshendelser: Vec<Utbetalingshendelse>,
}

impl Utbetaling {
    /// Effective status: best status in the hendelse log, `MOTTATT` when empty
    pub fn status(&self) -> Utbetalingsstatus {
        Utbetalingsstatus::beste(self.utbetalingshendelser.iter().map(|h| h.status))
    }

    /// Sum of line amounts
    pub fn total_beloep(&self) -> Decimal {
        self.utbetalingslinjer
            .iter()
            .filter_map(|linje| linje.beloep)
            .sum()
    }

    /// Most recent hendelse carrying the effective status
    pub fn hendelse_for_status(&self) -> Option<&Utbetalingshendelse> {
        let status = self.status();
        self.utbetalingshendelser
            .iter()
            .rev()
            .find(|h| h.status == status)
    }
}

/// Persisted output of one interface reconciliation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grensesnittavstemming {
    /// Run id
    pub id: Uuid,
    /// Product reconciled
    pub sak_type: SakType,
    /// Window start (inclusive)
    pub fra_og_med: DateTime<Utc>,
    /// Window end (exclusive)
    pub til: DateTime<Utc>,
    /// Created
    pub opprettet: DateTime<Utc>,
    /// Utbetalinger included
    pub antall_oppdrag: usize,
    /// Emitted batch messages
    pub avstemmingsdata: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_periode_amount_accepts_number_or_string() {
        let periode = |beloep: &str| {
            serde_json::from_str::<Utbetalingsperiode>(&format!(
                r#"{{"id":1,"periode":{{"fra":"2024-01-01","til":null}},"beloep":{},"type":"UTBETALING"}}"#,
                beloep
            ))
            .unwrap()
            .beloep
        };

        assert_eq!(periode("1000"), Some(Decimal::new(1000, 0)));
        assert_eq!(periode("1234.5"), Some(Decimal::new(12345, 1)));
        assert_eq!(periode("\"1234.50\""), Some(Decimal::new(123450, 2)));
        assert_eq!(periode("null"), None);

        let uten = serde_json::from_str::<Utbetalingsperiode>(
            r#"{"id":2,"periode":{"fra":"2024-01-01","til":null},"type":"OPPHOER"}"#,
        )
        .unwrap();
        assert_eq!(uten.beloep, None);

        let lagret = serde_json::to_string(&uten).unwrap();
        assert_eq!(serde_json::from_str::<Utbetalingsperiode>(&lagret).unwrap(), uten);
    }

    #[test]
    fn test_behandling_ref_is_wire_safe() {
        let id = BehandlingId(Uuid::parse_str("f3a1c7d2-5b4e-4c9a-8d21-0e6f7a9b3c45").unwrap());
        let reference = id.to_oppdrag_ref();

        assert_eq!(reference.len(), 30);
        assert!(!reference.contains('-'));
        assert!("f3a1c7d25b4e4c9a8d210e6f7a9b3c45".starts_with(&reference));
    }

    #[test]
    fn test_avstemmingsnokkel_wire_format() {
        let tidspunkt = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 15).unwrap();
        let nokkel = Avstemmingsnokkel::from(tidspunkt);
        assert_eq!(nokkel.to_wire(), "2024-03-01-09.30.15.000000");
    }

    #[test]
    fn test_avstemmingsnokkel_ordering() {
        let tidlig = Avstemmingsnokkel::from(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let sen = Avstemmingsnokkel::from(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
        assert!(tidlig < sen);
    }

    #[test]
    fn test_periode_inneholder() {
        let fra = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let til = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();

        let lukket = Periode::new(fra, Some(til));
        assert!(lukket.inneholder(fra));
        assert!(lukket.inneholder(til));
        assert!(!lukket.inneholder(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()));

        let aapen = Periode::new(fra, None);
        assert!(aapen.inneholder(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()));
        assert!(!aapen.inneholder(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()));
    }

    #[test]
    fn test_hendelse_replay_detection() {
        let utbetaling_id = UtbetalingId::new();
        let a = Utbetalingshendelse::new(utbetaling_id, Utbetalingsstatus::Godkjent, Some("<x/>".into()));
        let b = Utbetalingshendelse::new(utbetaling_id, Utbetalingsstatus::Godkjent, Some("<x/>".into()));
        let c = Utbetalingshendelse::new(utbetaling_id, Utbetalingsstatus::Avvist, Some("<x/>".into()));

        assert_ne!(a.id, b.id);
        assert!(a.er_samme_kvittering(&b));
        assert!(!a.er_samme_kvittering(&c));
    }
}
