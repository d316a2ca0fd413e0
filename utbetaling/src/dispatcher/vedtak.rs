//! Vedtak intake
//!
//! Turns an attested vedtak into a dispatched oppdrag:
//!
//! 1. Build the Utbetaling, chaining its first line to the sak's latest line
//! 2. Map and encode the oppdrag; structural errors stop here, before
//!    anything is persisted or sent
//! 3. Persist the Utbetaling and its payload
//! 4. Send with retry, then record `SENDT`
//!
//! Replaying a vedtak that already has a sent Utbetaling is a no-op. If the
//! earlier attempt stored the Utbetaling but never got the oppdrag onto the
//! queue, the replay sends the stored payload.

use crate::{dispatcher::sender::OppdragSender, Result};
use async_trait::async_trait;
use chrono::Utc;
use message_bus::{Message, MessageHandler};
use std::sync::Arc;
use tracing::{error, info};
use utbetaling_core::{
    Avstemmingsnokkel, Kjoereplan, UtbetalingStore, Utbetaling, UtbetalingId, Utbetalingshendelse,
    Utbetalingslinje, UtbetalingslinjeId, Utbetalingsstatus, Vedtak,
};

/// Dispatches oppdrag for attested vedtak
#[derive(Clone)]
pub struct VedtakMottaker {
    store: Arc<dyn UtbetalingStore>,
    sender: OppdragSender,
}

impl std::fmt::Debug for VedtakMottaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VedtakMottaker")
            .field("sender", &self.sender)
            .finish_non_exhaustive()
    }
}

impl VedtakMottaker {
    /// Create intake
    pub fn new(store: Arc<dyn UtbetalingStore>, sender: OppdragSender) -> Self {
        Self { store, sender }
    }

    /// Dispatch the oppdrag for `vedtak`
    pub async fn behandle(&self, vedtak: Vedtak) -> Result<Utbetaling> {
        if let Some(eksisterende) = self.store.get_by_vedtak_id(vedtak.vedtak_id).await? {
            // No hendelse at all: stored, but the send never went through
            if eksisterende.utbetalingshendelser.is_empty() {
                info!(
                    vedtak_id = %vedtak.vedtak_id,
                    utbetaling_id = %eksisterende.id,
                    "Vedtak replayed before its oppdrag was sent, resending"
                );
                return self.resend(eksisterende.id).await;
            }
            info!(vedtak_id = %vedtak.vedtak_id, utbetaling_id = %eksisterende.id, "Vedtak already dispatched");
            return Ok(eksisterende);
        }

        let sak_linjer = self.store.linjer_for_sak(vedtak.sak.id).await?;
        let er_foerste = sak_linjer.is_empty();
        let forrige = sak_linjer.iter().map(|l| l.id).max();

        let utbetaling = bygg_utbetaling(vedtak, forrige);
        let oppdrag = oppdrag::to_oppdrag(&utbetaling, er_foerste, utbetaling.vedtak.er_regulering())?;
        let xml = oppdrag::xml::encode_oppdrag(&oppdrag)?;

        let utbetaling = match self.store.create(utbetaling).await {
            Ok(utbetaling) => utbetaling,
            Err(utbetaling_core::Error::DuplicateVedtak(vedtak_id)) => {
                info!(vedtak_id = %vedtak_id, "Concurrent dispatch of vedtak, keeping existing");
                return self
                    .store
                    .get_by_vedtak_id(vedtak_id)
                    .await?
                    .ok_or_else(|| utbetaling_core::Error::UtbetalingNotFound(vedtak_id.to_string()).into());
            }
            Err(e) => return Err(e.into()),
        };
        self.store.set_oppdrag(utbetaling.id, xml.clone()).await?;

        info!(
            utbetaling_id = %utbetaling.id,
            sak_id = %utbetaling.sak_id,
            vedtak_id = %utbetaling.vedtak_id,
            linjer = utbetaling.utbetalingslinjer.len(),
            kode_endring = %oppdrag.oppdrag110.kode_endring,
            "Utbetaling created"
        );

        self.send_og_registrer(utbetaling.id, &xml).await
    }

    /// Send the stored payload again
    ///
    /// The payload is re-derived from the aggregate if it was never stored.
    pub async fn resend(&self, utbetaling_id: UtbetalingId) -> Result<Utbetaling> {
        let utbetaling = self
            .store
            .get(utbetaling_id)
            .await?
            .ok_or_else(|| utbetaling_core::Error::UtbetalingNotFound(utbetaling_id.to_string()))?;

        let xml = match &utbetaling.oppdrag {
            Some(xml) => xml.clone(),
            None => {
                let sak_linjer = self.store.linjer_for_sak(utbetaling.sak_id).await?;
                let er_foerste = sak_linjer.iter().all(|l| l.utbetaling_id == utbetaling.id);
                let oppdrag =
                    oppdrag::to_oppdrag(&utbetaling, er_foerste, utbetaling.vedtak.er_regulering())?;
                let xml = oppdrag::xml::encode_oppdrag(&oppdrag)?;
                self.store.set_oppdrag(utbetaling.id, xml.clone()).await?;
                xml
            }
        };

        info!(utbetaling_id = %utbetaling.id, "Resending oppdrag");
        self.send_og_registrer(utbetaling.id, &xml).await
    }

    async fn send_og_registrer(&self, utbetaling_id: UtbetalingId, xml: &str) -> Result<Utbetaling> {
        let correlation_id = self
            .sender
            .send_with_retry(xml, self.sender.priority())
            .await?;

        let hendelse = Utbetalingshendelse::new(utbetaling_id, Utbetalingsstatus::Sendt, None);
        let utbetaling = self.store.append_hendelse(utbetaling_id, hendelse).await?;
        info!(
            utbetaling_id = %utbetaling_id,
            correlation_id = %correlation_id,
            status = %utbetaling.status(),
            "Oppdrag sent"
        );
        Ok(utbetaling)
    }
}

/// Build the aggregate for a vedtak
///
/// Lines follow the vedtak's periods in id order. The first line replaces
/// `forrige` (the sak's latest line), each later line replaces the one
/// before it.
pub fn bygg_utbetaling(vedtak: Vedtak, forrige: Option<UtbetalingslinjeId>) -> Utbetaling {
    let id = UtbetalingId::new();
    let opprettet = Utc::now();
    let sak_type = vedtak.sak.sak_type;
    let kjoereplan = if vedtak.er_regulering() {
        Kjoereplan::MedParameter
    } else {
        Kjoereplan::NesteRegulaere
    };

    let mut perioder = vedtak.utbetalingsperioder.clone();
    perioder.sort_by_key(|p| p.id);

    let mut erstatter = forrige;
    let utbetalingslinjer = perioder
        .into_iter()
        .map(|periode| {
            let linje = Utbetalingslinje {
                id: periode.id,
                linje_type: periode.periode_type,
                utbetaling_id: id,
                sak_id: vedtak.sak.id,
                erstatter_id: erstatter,
                periode: periode.periode,
                beloep: periode.beloep,
                klassifikasjonskode: oppdrag::klassifikasjonskode(sak_type, periode.periode.fra)
                    .to_string(),
                kjoereplan,
                opprettet,
            };
            erstatter = Some(periode.id);
            linje
        })
        .collect();

    Utbetaling {
        id,
        sak_id: vedtak.sak.id,
        sak_type,
        behandling_id: vedtak.behandling.id,
        behandling_id_til_oppdrag: vedtak.behandling.id.to_oppdrag_ref(),
        vedtak_id: vedtak.vedtak_id,
        opprettet,
        avstemmingsnokkel: Avstemmingsnokkel::from(opprettet),
        stoenadsmottaker: vedtak.sak.ident.clone(),
        saksbehandler: vedtak.vedtak_fattet.ansvarlig.clone(),
        saksbehandler_enhet: vedtak.vedtak_fattet.ansvarlig_enhet.clone(),
        attestant: vedtak.attestasjon.attestant.clone(),
        attestant_enhet: vedtak.attestasjon.attesterende_enhet.clone(),
        vedtak,
        oppdrag: None,
        utbetalingslinjer,
        utbetalingshendelser: vec![],
    }
}

#[async_trait]
impl MessageHandler for VedtakMottaker {
    async fn handle(&self, message: Message) -> message_bus::Result<()> {
        let vedtak: Vedtak = message.parse_json()?;
        let vedtak_id = vedtak.vedtak_id;

        match self.behandle(vedtak).await {
            Ok(_) => Ok(()),
            Err(e) => {
                error!(vedtak_id = %vedtak_id, error = %e, transient = e.is_transient(), "Dispatch failed");
                Err(message_bus::Error::Handler(e.to_string()))
            }
        }
    }
}
