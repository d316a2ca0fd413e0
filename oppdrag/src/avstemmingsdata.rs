//! Reconciliation batch wire models
//!
//! Two document types go to the accounting system's reconciliation queues:
//!
//! - `avstemmingsdata` for grensesnittavstemming (interface reconciliation),
//!   a START / DATA.. / AVSL sequence where only the first DATA carries
//!   `total`, `periode` and `grunnlag`
//! - `sendAsynkronKonsistensavstemmingsdata` for konsistensavstemming, a
//!   snapshot of every active oppdrag followed by a `totaldata` block

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// `aksjonType` opening a batch
pub const AKSJON_START: &str = "START";
/// `aksjonType` carrying data
pub const AKSJON_DATA: &str = "DATA";
/// `aksjonType` closing a batch
pub const AKSJON_AVSLUTT: &str = "AVSL";

/// `kildeType` for data delivered by the sending system
pub const KILDE_AVLEVERT: &str = "AVLEV";
/// `avstemmingType` for interface reconciliation
pub const AVSTEMMING_GRENSESNITT: &str = "GRSN";
/// `avstemmingType` for consistency reconciliation
pub const AVSTEMMING_KONSISTENS: &str = "KONV";
/// Receiving component
pub const MOTTAKENDE_KOMPONENT: &str = "OS";

/// `detaljType` for GODKJENT_MED_FEIL
pub const DETALJ_VARSEL: &str = "VARS";
/// `detaljType` for AVVIST
pub const DETALJ_AVVIST: &str = "AVVI";
/// `detaljType` for missing receipts
pub const DETALJ_MANGLER: &str = "MANG";

/// `fortegn` for positive amounts
pub const FORTEGN_TILLEGG: &str = "T";
/// `fortegn` for negative amounts
pub const FORTEGN_FRADRAG: &str = "F";

/// Sign marker for an amount
pub fn fortegn(beloep: Decimal) -> &'static str {
    if beloep.is_sign_negative() && !beloep.is_zero() {
        FORTEGN_FRADRAG
    } else {
        FORTEGN_TILLEGG
    }
}

/// One grensesnittavstemming message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "avstemmingsdata")]
pub struct Avstemmingsdata {
    /// Batch header, present on every message
    pub aksjon: Aksjonsdata,

    /// Batch totals, first DATA only
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub total: Option<Totaldata>,

    /// Reconciled period, first DATA only
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub periode: Option<Periodedata>,

    /// Per-bucket totals, first DATA only
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub grunnlag: Option<Grunnlagsdata>,

    /// Detail records
    #[serde(default)]
    pub detalj: Vec<Detaljdata>,
}

/// Batch header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aksjonsdata {
    /// START, DATA or AVSL
    pub aksjon_type: String,
    /// AVLEV
    pub kilde_type: String,
    /// GRSN
    pub avstemming_type: String,
    /// Sending component (fagområde)
    pub kilde_komponent_kode: String,
    /// OS
    pub mottakende_komponent_kode: String,
    /// Fagområde
    pub underkomponent_kode: String,
    /// First avstemmingsnøkkel in the batch
    pub nokkel_fom: String,
    /// Last avstemmingsnøkkel in the batch
    pub nokkel_tom: String,
    /// Batch id, shared by all messages of one batch
    pub avleverende_avstemming_id: String,
    /// Sending user
    pub bruker_id: String,
}

/// Batch totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Totaldata {
    /// Number of oppdrag
    pub total_antall: u32,
    /// Sum of amounts
    pub total_belop: Decimal,
    /// T or F
    pub fortegn: String,
}

/// Reconciled period, hour granularity (`yyyyMMddHH`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Periodedata {
    /// First hour
    pub dato_avstemt_fom: String,
    /// Last hour
    pub dato_avstemt_tom: String,
}

/// Per-bucket totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grunnlagsdata {
    /// GODKJENT count
    pub godkjent_antall: u32,
    /// GODKJENT amount
    pub godkjent_belop: Decimal,
    /// GODKJENT sign
    pub godkjent_fortegn: String,
    /// GODKJENT_MED_FEIL count
    pub varsel_antall: u32,
    /// GODKJENT_MED_FEIL amount
    pub varsel_belop: Decimal,
    /// GODKJENT_MED_FEIL sign
    pub varsel_fortegn: String,
    /// AVVIST count
    pub avvist_antall: u32,
    /// AVVIST amount
    pub avvist_belop: Decimal,
    /// AVVIST sign
    pub avvist_fortegn: String,
    /// Missing receipt count
    pub mangler_antall: u32,
    /// Missing receipt amount
    pub mangler_belop: Decimal,
    /// Missing receipt sign
    pub mangler_fortegn: String,
}

/// Detail record for an oppdrag that is not cleanly approved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detaljdata {
    /// VARS, AVVI or MANG
    pub detalj_type: String,
    /// Recipient
    pub offnr: String,
    /// Sak id
    pub avleverende_transaksjon_nokkel: String,

    /// Receipt message code
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub melding_kode: Option<String>,

    /// Receipt outcome code
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub alvorlighetsgrad: Option<String>,

    /// Receipt message text
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tekst_melding: Option<String>,

    /// Avstemmingsnøkkel of the oppdrag
    pub tidspunkt: String,
}

/// Konsistensavstemming envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "sendAsynkronKonsistensavstemmingsdata")]
pub struct SendKonsistensavstemmingsdata {
    /// Payload
    pub konsistensavstemmingsdata: Konsistensdata,
}

/// One konsistensavstemming message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Konsistensdata {
    /// Batch header
    pub aksjonsdata: Konsistensaksjon,

    /// Active oppdrag, one per DATA message
    #[serde(default)]
    pub oppdragsdata_liste: Vec<Oppdragsdata>,

    /// Batch totals, last DATA message only
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub totaldata: Option<Totaldata>,
}

/// Konsistensavstemming header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Konsistensaksjon {
    /// START, DATA or AVSL
    pub aksjon_type: String,
    /// AVLEV
    pub kilde_type: String,
    /// KONV
    pub avstemming_type: String,
    /// Sending component
    pub avleverende_komponent_kode: String,
    /// OS
    pub mottakende_komponent_kode: String,
    /// Fagområde
    pub underkomponent_kode: String,
    /// Snapshot time (`yyyy-MM-dd-HH.mm.ss.ffffff`)
    pub tidspunkt_avstemming_tom: String,
    /// Batch id
    pub avleverende_avstemming_id: String,
    /// Sending user
    pub bruker_id: String,
}

/// Active oppdrag in a konsistensavstemming
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Oppdragsdata {
    /// Fagområde
    pub fagomrade_kode: String,
    /// Sak id
    pub fagsystem_id: String,
    /// MND
    pub utbetalingsfrekvens: String,
    /// Recipient
    pub oppdrag_gjelder_id: String,
    /// Recipient valid from
    pub oppdrag_gjelder_fom: NaiveDate,
    /// Case handler
    pub saksbehandler_id: String,

    /// Units
    #[serde(default)]
    pub oppdragsenhet_liste: Vec<Enhet>,

    /// Lines paying at the snapshot time
    #[serde(default)]
    pub oppdragslinje_liste: Vec<Oppdragslinje>,
}

/// Unit in a konsistensavstemming
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enhet {
    /// BOS or BEH
    pub enhet_type: String,
    /// Unit number
    pub enhet: String,
    /// Valid from
    pub enhet_fom: NaiveDate,
}

/// Line in a konsistensavstemming
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Oppdragslinje {
    /// Vedtak id
    pub vedtak_id: String,
    /// Line id
    pub delytelse_id: String,
    /// Classification code
    pub klassifikasjons_kode: String,
    /// Valid from
    pub vedtak_periode_fom: NaiveDate,

    /// Valid to (inclusive)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub vedtak_periode_tom: Option<NaiveDate>,

    /// Monthly amount
    pub sats: Decimal,
    /// MND
    pub satstype_kode: String,
    /// T
    pub fradrag_tillegg: String,
    /// J or N
    pub bruk_kjoreplan: String,
    /// Payee
    pub utbetales_til_id: String,

    /// Superseded line
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ref_delytelse_id: Option<String>,

    /// Sak of the superseded line
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ref_fagsystem_id: Option<String>,

    /// Attestants
    #[serde(default)]
    pub attestant_liste: Vec<Attestant>,
}

/// Attestant in a konsistensavstemming
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attestant {
    /// Attestant id
    pub attestant_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fortegn() {
        assert_eq!(fortegn(Decimal::new(100, 0)), FORTEGN_TILLEGG);
        assert_eq!(fortegn(Decimal::ZERO), FORTEGN_TILLEGG);
        assert_eq!(fortegn(Decimal::new(-1, 0)), FORTEGN_FRADRAG);
    }
}
