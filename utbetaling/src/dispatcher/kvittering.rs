//! Kvittering receiver
//!
//! Long-lived consumer of the reply queue. Receipts may arrive late, out of
//! order or more than once; each one is appended as a hendelse and the
//! store's replay check keeps the log free of duplicates. A payload that
//! cannot be decoded or matched is logged as a data-integrity incident and
//! skipped so the queue keeps moving.

use crate::{
    metrics::{KVITTERING_REJECTED_TOTAL, KVITTERING_TOTAL},
    Result,
};
use async_trait::async_trait;
use message_bus::{Message, MessageHandler};
use oppdrag::Kvittering;
use std::sync::Arc;
use tracing::{error, info};
use utbetaling_core::{Utbetalingshendelse, Utbetalingsstatus, UtbetalingStore};

/// Applies kvitteringer to the store
#[derive(Clone)]
pub struct KvitteringMottaker {
    store: Arc<dyn UtbetalingStore>,
}

impl std::fmt::Debug for KvitteringMottaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvitteringMottaker").finish_non_exhaustive()
    }
}

impl KvitteringMottaker {
    /// Create receiver
    pub fn new(store: Arc<dyn UtbetalingStore>) -> Self {
        Self { store }
    }

    /// Apply one receipt payload
    ///
    /// Returns the effective status after the receipt, or `None` when the
    /// payload was skipped. Only store failures are returned as errors.
    pub async fn motta(&self, xml: &str) -> Result<Option<Utbetalingsstatus>> {
        let kvittering = match Kvittering::fra_xml(xml) {
            Ok(kvittering) => kvittering,
            Err(e) => {
                KVITTERING_REJECTED_TOTAL.with_label_values(&["decode"]).inc();
                error!(data_integrity = true, error = %e, payload = %xml, "Unreadable kvittering skipped");
                return Ok(None);
            }
        };

        let Some(utbetaling) = self.store.get_by_vedtak_id(kvittering.vedtak_id).await? else {
            KVITTERING_REJECTED_TOTAL.with_label_values(&["unmatched"]).inc();
            error!(
                data_integrity = true,
                vedtak_id = %kvittering.vedtak_id,
                "Kvittering for unknown utbetaling skipped"
            );
            return Ok(None);
        };

        let hendelse = Utbetalingshendelse::new(
            utbetaling.id,
            kvittering.status,
            Some(xml.to_string()),
        );
        let oppdatert = self.store.append_hendelse(utbetaling.id, hendelse).await?;
        let status = self.store.status(&oppdatert);

        KVITTERING_TOTAL
            .with_label_values(&[kvittering.status.as_str()])
            .inc();
        info!(
            utbetaling_id = %utbetaling.id,
            vedtak_id = %kvittering.vedtak_id,
            kvittering = %kvittering.status,
            kode_melding = ?kvittering.kode_melding,
            status = %status,
            "Kvittering recorded"
        );

        Ok(Some(status))
    }
}

#[async_trait]
impl MessageHandler for KvitteringMottaker {
    async fn handle(&self, message: Message) -> message_bus::Result<()> {
        let xml = match message.text() {
            Ok(xml) => xml,
            Err(e) => {
                KVITTERING_REJECTED_TOTAL.with_label_values(&["decode"]).inc();
                error!(data_integrity = true, message_id = %message.id, error = %e, "Non-text kvittering skipped");
                return Ok(());
            }
        };

        self.motta(xml)
            .await
            .map(|_| ())
            .map_err(|e| message_bus::Error::Handler(e.to_string()))
    }
}
