//! Oppdrag wire model
//!
//! Mirrors the logical shape of the accounting system's `oppdrag` document.
//! Element names follow the external schema; values are kept as plain
//! strings, dates and decimals so the model round-trips through XML
//! without loss.
//!
//! ```xml
//! <oppdrag xmlns="http://www.trygdeetaten.no/skjema/oppdrag">
//!   <oppdrag-110>
//!     <kodeAksjon>1</kodeAksjon>
//!     <kodeEndring>NY</kodeEndring>
//!     <kodeFagomraade>BARNEPE</kodeFagomraade>
//!     <fagsystemId>1234</fagsystemId>
//!     ...
//!     <avstemming-115>...</avstemming-115>
//!     <oppdrags-enhet-120>...</oppdrags-enhet-120>
//!     <oppdrags-linje-150>...</oppdrags-linje-150>
//!   </oppdrag-110>
//! </oppdrag>
//! ```

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// `kodeEndring` for the first oppdrag on a sak
pub const KODE_ENDRING_NY: &str = "NY";
/// `kodeEndring` for later oppdrag on a sak
pub const KODE_ENDRING_ENDR: &str = "ENDR";
/// `kodeStatusLinje` for termination lines
pub const KODE_STATUS_OPPHOER: &str = "OPPH";
/// `typeEnhet` for the responsible unit
pub const ENHET_BOSTED: &str = "BOS";
/// `typeEnhet` for the processing unit
pub const ENHET_BEHANDLENDE: &str = "BEH";
/// Processing unit for all survivor-pension oppdrag
pub const BEHANDLENDE_ENHET: &str = "4819";

/// Root document, sent as-is and echoed back with `mmel` as the kvittering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "oppdrag")]
pub struct Oppdrag {
    /// Result block, only present on kvitteringer
    #[serde(rename = "mmel", skip_serializing_if = "Option::is_none", default)]
    pub mmel: Option<Mmel>,

    /// Oppdrag header and lines
    #[serde(rename = "oppdrag-110")]
    pub oppdrag110: Oppdrag110,
}

/// Result block added by the accounting system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mmel {
    /// Outcome code (00, 04, 08, 12)
    pub alvorlighetsgrad: String,

    /// Message code
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub kode_melding: Option<String>,

    /// Message text
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub beskr_melding: Option<String>,
}

/// Oppdrag header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Oppdrag110 {
    /// Always "1"
    pub kode_aksjon: String,
    /// NY or ENDR
    pub kode_endring: String,
    /// BARNEPE or OMSTILL
    pub kode_fagomraade: String,
    /// Sak id
    pub fagsystem_id: String,
    /// Payment frequency
    pub utbet_frekvens: String,
    /// Recipient
    pub oppdrag_gjelder_id: String,
    /// Recipient valid from
    pub dato_oppdrag_gjelder_fom: NaiveDate,
    /// Case handler
    pub saksbeh_id: String,

    /// Reconciliation key block
    #[serde(rename = "avstemming-115")]
    pub avstemming115: Avstemming115,

    /// Responsible units
    #[serde(rename = "oppdrags-enhet-120", default)]
    pub oppdrags_enhet120: Vec<OppdragsEnhet120>,

    /// Payment lines
    #[serde(rename = "oppdrags-linje-150", default)]
    pub oppdrags_linje150: Vec<OppdragsLinje150>,
}

/// Reconciliation key block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Avstemming115 {
    /// Sending component (fagområde)
    pub kode_komponent: String,
    /// Avstemmingsnøkkel
    pub nokkel_avstemming: String,
    /// Message timestamp
    pub tidspkt_melding: String,
}

/// Unit block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OppdragsEnhet120 {
    /// BOS or BEH
    pub type_enhet: String,
    /// Unit number
    pub enhet: String,
    /// Valid from
    pub dato_enhet_fom: NaiveDate,
}

/// Payment line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OppdragsLinje150 {
    /// Always NY, corrections are expressed through the ref fields
    pub kode_endring_linje: String,

    /// OPPH on termination lines
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub kode_status_linje: Option<String>,

    /// Termination effective from
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dato_status_fom: Option<NaiveDate>,

    /// Vedtak id
    pub vedtak_id: String,
    /// Line id
    pub delytelse_id: String,
    /// Classification code
    pub kode_klassifik: String,
    /// Valid from
    pub dato_vedtak_fom: NaiveDate,

    /// Valid to (inclusive)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dato_vedtak_tom: Option<NaiveDate>,

    /// Monthly amount
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sats: Option<Decimal>,

    /// T (tillegg)
    pub fradrag_tillegg: String,
    /// MND
    pub type_sats: String,
    /// J or N
    pub bruk_kjoreplan: String,
    /// Case handler
    pub saksbeh_id: String,
    /// Payee
    pub utbetales_til_id: String,
    /// Behandling reference
    pub henvisning: String,

    /// Attestant
    #[serde(rename = "attestant-180", default)]
    pub attestant180: Vec<Attestant180>,

    /// Sak of the superseded line
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ref_fagsystem_id: Option<String>,

    /// Superseded line
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ref_delytelse_id: Option<String>,
}

/// Attestant block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attestant180 {
    /// Attestant id
    pub attestant_id: String,
}
