//! Kvittering interpretation
//!
//! A kvittering is the dispatched oppdrag echoed back with an `mmel` block.
//! The outcome code maps onto [`Utbetalingsstatus`]:
//!
//! | alvorlighetsgrad | status |
//! |---|---|
//! | 00 | GODKJENT |
//! | 04 | GODKJENT_MED_FEIL |
//! | 08 | AVVIST |
//! | 12 | FEILET |

use crate::{
    error::{Error, Result},
    model::Oppdrag,
    xml::decode_oppdrag,
};
use utbetaling_core::{Utbetalingsstatus, VedtakId};

/// Parsed receipt
#[derive(Debug, Clone, PartialEq)]
pub struct Kvittering {
    /// Vedtak of the first line, identifies the Utbetaling
    pub vedtak_id: VedtakId,
    /// Outcome
    pub status: Utbetalingsstatus,
    /// Raw outcome code
    pub alvorlighetsgrad: String,
    /// Message code
    pub kode_melding: Option<String>,
    /// Message text
    pub beskr_melding: Option<String>,
    /// Decoded document
    pub oppdrag: Oppdrag,
}

impl Kvittering {
    /// Decode and interpret a receipt payload
    pub fn fra_xml(xml: &str) -> Result<Self> {
        Self::fra_oppdrag(decode_oppdrag(xml)?)
    }

    /// Interpret a decoded receipt
    pub fn fra_oppdrag(oppdrag: Oppdrag) -> Result<Self> {
        let mmel = oppdrag
            .mmel
            .clone()
            .ok_or_else(|| Error::Decode("Kvittering has no mmel block".to_string()))?;
        let status = status_for(&mmel.alvorlighetsgrad)?;
        let vedtak_id = vedtak_id(&oppdrag)?;

        Ok(Self {
            vedtak_id,
            status,
            alvorlighetsgrad: mmel.alvorlighetsgrad,
            kode_melding: mmel.kode_melding,
            beskr_melding: mmel.beskr_melding,
            oppdrag,
        })
    }
}

/// Map an outcome code to a status
pub fn status_for(alvorlighetsgrad: &str) -> Result<Utbetalingsstatus> {
    match alvorlighetsgrad.trim() {
        "00" => Ok(Utbetalingsstatus::Godkjent),
        "04" => Ok(Utbetalingsstatus::GodkjentMedFeil),
        "08" => Ok(Utbetalingsstatus::Avvist),
        "12" => Ok(Utbetalingsstatus::Feilet),
        other => Err(Error::UnknownAlvorlighetsgrad(other.to_string())),
    }
}

/// Vedtak id carried on the first line
pub fn vedtak_id(oppdrag: &Oppdrag) -> Result<VedtakId> {
    let linje = oppdrag
        .oppdrag110
        .oppdrags_linje150
        .first()
        .ok_or_else(|| Error::Decode("Oppdrag has no lines".to_string()))?;

    linje
        .vedtak_id
        .trim()
        .parse::<i64>()
        .map(VedtakId)
        .map_err(|e| Error::Decode(format!("Invalid vedtakId {}: {}", linje.vedtak_id, e)))
}
