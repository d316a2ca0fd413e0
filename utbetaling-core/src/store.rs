//! Utbetaling store contract and in-memory implementation
//!
//! Every mutation runs inside one write section, so concurrent receipt
//! processing can never observe or produce a partial write.

use crate::{
    error::{Error, Result},
    linjer::LinjeArena,
    status::Utbetalingsstatus,
    types::*,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Persistence port for the Utbetaling aggregate
#[async_trait]
pub trait UtbetalingStore: Send + Sync {
    /// Persist a new Utbetaling
    ///
    /// Fails with [`Error::DuplicateVedtak`] if one exists for the vedtak, and
    /// with [`Error::InvalidErstatter`] if a line references a line that is
    /// not an earlier line of the same sak.
    async fn create(&self, utbetaling: Utbetaling) -> Result<Utbetaling>;

    /// Append a receipt event, ignoring replays of an identical receipt
    async fn append_hendelse(
        &self,
        utbetaling_id: UtbetalingId,
        hendelse: Utbetalingshendelse,
    ) -> Result<Utbetaling>;

    /// Record the generated oppdrag payload (write-once)
    async fn set_oppdrag(&self, utbetaling_id: UtbetalingId, oppdrag: String) -> Result<()>;

    /// Lookup by id
    async fn get(&self, utbetaling_id: UtbetalingId) -> Result<Option<Utbetaling>>;

    /// Lookup by vedtak
    async fn get_by_vedtak_id(&self, vedtak_id: VedtakId) -> Result<Option<Utbetaling>>;

    /// Lookup by behandling
    async fn get_by_behandling_id(&self, behandling_id: BehandlingId) -> Result<Option<Utbetaling>>;

    /// All lines of a sak, in creation order
    async fn linjer_for_sak(&self, sak_id: SakId) -> Result<Vec<Utbetalingslinje>>;

    /// Utbetalinger with avstemmingsnøkkel in `[fra_og_med, til)`, ordered by nøkkel
    async fn hent_for_avstemming(
        &self,
        fra_og_med: DateTime<Utc>,
        til: DateTime<Utc>,
    ) -> Result<Vec<Utbetaling>>;

    /// Latest Utbetaling of a sak by avstemmingsnøkkel
    async fn active_for(&self, sak_id: SakId) -> Result<Option<Utbetaling>>;

    /// All saker with at least one Utbetaling
    async fn saker(&self) -> Result<Vec<SakId>>;

    /// Persist the output of an interface reconciliation run
    async fn lagre_grensesnittavstemming(&self, avstemming: Grensesnittavstemming) -> Result<()>;

    /// Latest interface reconciliation run for a product
    async fn siste_grensesnittavstemming(
        &self,
        sak_type: SakType,
    ) -> Result<Option<Grensesnittavstemming>>;

    /// Derived status of an Utbetaling
    fn status(&self, utbetaling: &Utbetaling) -> Utbetalingsstatus {
        utbetaling.status()
    }
}

#[derive(Debug, Default)]
struct Inner {
    utbetalinger: HashMap<UtbetalingId, Utbetaling>,
    per_vedtak: HashMap<VedtakId, UtbetalingId>,
    linjer: HashMap<SakId, LinjeArena>,
    avstemminger: Vec<Grensesnittavstemming>,
}

/// In-memory store, used by tests and single-process runs
#[derive(Debug, Clone, Default)]
pub struct InMemoryUtbetalingStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryUtbetalingStore {
    /// Create empty store
    pub fn new() -> Self {
        Self::default()
    }
}

/// Append `hendelse` unless an identical receipt is already logged
pub(crate) fn append_idempotent(utbetaling: &mut Utbetaling, hendelse: Utbetalingshendelse) -> bool {
    if utbetaling
        .utbetalingshendelser
        .iter()
        .any(|h| h.er_samme_kvittering(&hendelse))
    {
        tracing::debug!(
            utbetaling_id = %utbetaling.id,
            status = %hendelse.status,
            "Replayed receipt ignored"
        );
        return false;
    }
    utbetaling.utbetalingshendelser.push(hendelse);
    true
}

/// Write-once check for the oppdrag payload; `true` if a write is needed
pub(crate) fn oppdrag_trenger_skriving(utbetaling: &Utbetaling, oppdrag: &str) -> Result<bool> {
    match utbetaling.oppdrag.as_deref() {
        None => Ok(true),
        Some(eksisterende) if eksisterende == oppdrag => Ok(false),
        Some(_) => Err(Error::OppdragConflict(utbetaling.id)),
    }
}

#[async_trait]
impl UtbetalingStore for InMemoryUtbetalingStore {
    async fn create(&self, utbetaling: Utbetaling) -> Result<Utbetaling> {
        let mut inner = self.inner.write().await;

        if inner.per_vedtak.contains_key(&utbetaling.vedtak_id) {
            return Err(Error::DuplicateVedtak(utbetaling.vedtak_id));
        }

        if let Some(arena) = inner.linjer.get(&utbetaling.sak_id) {
            arena.valider_nye(utbetaling.sak_id, utbetaling.id, &utbetaling.utbetalingslinjer)?;
        } else {
            LinjeArena::default().valider_nye(
                utbetaling.sak_id,
                utbetaling.id,
                &utbetaling.utbetalingslinjer,
            )?;
        }
        inner
            .linjer
            .entry(utbetaling.sak_id)
            .or_default()
            .legg_til(utbetaling.utbetalingslinjer.iter().cloned());

        inner.per_vedtak.insert(utbetaling.vedtak_id, utbetaling.id);
        inner.utbetalinger.insert(utbetaling.id, utbetaling.clone());

        tracing::debug!(
            utbetaling_id = %utbetaling.id,
            sak_id = %utbetaling.sak_id,
            vedtak_id = %utbetaling.vedtak_id,
            "Utbetaling created"
        );

        Ok(utbetaling)
    }

    async fn append_hendelse(
        &self,
        utbetaling_id: UtbetalingId,
        hendelse: Utbetalingshendelse,
    ) -> Result<Utbetaling> {
        let mut inner = self.inner.write().await;
        let utbetaling = inner
            .utbetalinger
            .get_mut(&utbetaling_id)
            .ok_or_else(|| Error::UtbetalingNotFound(utbetaling_id.to_string()))?;

        append_idempotent(utbetaling, hendelse);
        Ok(utbetaling.clone())
    }

    async fn set_oppdrag(&self, utbetaling_id: UtbetalingId, oppdrag: String) -> Result<()> {
        let mut inner = self.inner.write().await;
        let utbetaling = inner
            .utbetalinger
            .get_mut(&utbetaling_id)
            .ok_or_else(|| Error::UtbetalingNotFound(utbetaling_id.to_string()))?;

        if oppdrag_trenger_skriving(utbetaling, &oppdrag)? {
            utbetaling.oppdrag = Some(oppdrag);
        }
        Ok(())
    }

    async fn get(&self, utbetaling_id: UtbetalingId) -> Result<Option<Utbetaling>> {
        Ok(self.inner.read().await.utbetalinger.get(&utbetaling_id).cloned())
    }

    async fn get_by_vedtak_id(&self, vedtak_id: VedtakId) -> Result<Option<Utbetaling>> {
        let inner = self.inner.read().await;
        Ok(inner
            .per_vedtak
            .get(&vedtak_id)
            .and_then(|id| inner.utbetalinger.get(id))
            .cloned())
    }

    async fn get_by_behandling_id(&self, behandling_id: BehandlingId) -> Result<Option<Utbetaling>> {
        let inner = self.inner.read().await;
        Ok(inner
            .utbetalinger
            .values()
            .find(|u| u.behandling_id == behandling_id)
            .cloned())
    }

    async fn linjer_for_sak(&self, sak_id: SakId) -> Result<Vec<Utbetalingslinje>> {
        let inner = self.inner.read().await;
        Ok(inner
            .linjer
            .get(&sak_id)
            .map(|arena| arena.alle().cloned().collect())
            .unwrap_or_default())
    }

    async fn hent_for_avstemming(
        &self,
        fra_og_med: DateTime<Utc>,
        til: DateTime<Utc>,
    ) -> Result<Vec<Utbetaling>> {
        let inner = self.inner.read().await;
        let mut utbetalinger: Vec<Utbetaling> = inner
            .utbetalinger
            .values()
            .filter(|u| {
                let tidspunkt = u.avstemmingsnokkel.tidspunkt();
                tidspunkt >= fra_og_med && tidspunkt < til
            })
            .cloned()
            .collect();
        utbetalinger.sort_by_key(|u| u.avstemmingsnokkel);
        Ok(utbetalinger)
    }

    async fn active_for(&self, sak_id: SakId) -> Result<Option<Utbetaling>> {
        let inner = self.inner.read().await;
        Ok(inner
            .utbetalinger
            .values()
            .filter(|u| u.sak_id == sak_id)
            .max_by_key(|u| u.avstemmingsnokkel)
            .cloned())
    }

    async fn saker(&self) -> Result<Vec<SakId>> {
        let inner = self.inner.read().await;
        let mut saker: Vec<SakId> = inner.utbetalinger.values().map(|u| u.sak_id).collect();
        saker.sort();
        saker.dedup();
        Ok(saker)
    }

    async fn lagre_grensesnittavstemming(&self, avstemming: Grensesnittavstemming) -> Result<()> {
        self.inner.write().await.avstemminger.push(avstemming);
        Ok(())
    }

    async fn siste_grensesnittavstemming(
        &self,
        sak_type: SakType,
    ) -> Result<Option<Grensesnittavstemming>> {
        let inner = self.inner.read().await;
        Ok(inner
            .avstemminger
            .iter()
            .filter(|a| a.sak_type == sak_type)
            .max_by_key(|a| a.til)
            .cloned())
    }
}

#[cfg(test)]
pub(crate) mod testdata {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    pub fn utbetaling(
        sak_id: i64,
        vedtak_id: i64,
        linje_ider: &[(i64, Option<i64>)],
        nokkel: DateTime<Utc>,
    ) -> Utbetaling {
        let id = UtbetalingId::new();
        let behandling_id = BehandlingId(Uuid::new_v4());
        let fra = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let utbetalingslinjer = linje_ider
            .iter()
            .map(|(linje_id, erstatter)| Utbetalingslinje {
                id: UtbetalingslinjeId(*linje_id),
                linje_type: UtbetalingslinjeType::Utbetaling,
                utbetaling_id: id,
                sak_id: SakId(sak_id),
                erstatter_id: erstatter.map(UtbetalingslinjeId),
                periode: Periode::new(fra, None),
                beloep: Some(Decimal::new(3000, 0)),
                klassifikasjonskode: "BARNEPENSJON-OPTP".to_string(),
                kjoereplan: Kjoereplan::NesteRegulaere,
                opprettet: nokkel,
            })
            .collect();

        Utbetaling {
            id,
            sak_id: SakId(sak_id),
            sak_type: SakType::Barnepensjon,
            behandling_id,
            behandling_id_til_oppdrag: behandling_id.to_oppdrag_ref(),
            vedtak_id: VedtakId(vedtak_id),
            opprettet: nokkel,
            avstemmingsnokkel: Avstemmingsnokkel::from(nokkel),
            stoenadsmottaker: "12345678901".to_string(),
            saksbehandler: "Z991122".to_string(),
            saksbehandler_enhet: "4862".to_string(),
            attestant: "Z993344".to_string(),
            attestant_enhet: "4862".to_string(),
            vedtak: Vedtak {
                vedtak_id: VedtakId(vedtak_id),
                sak: VedtakSak {
                    id: SakId(sak_id),
                    ident: "12345678901".to_string(),
                    sak_type: SakType::Barnepensjon,
                },
                behandling: Behandling {
                    id: behandling_id,
                    behandling_type: BehandlingType::Foerstegangsbehandling,
                },
                utbetalingsperioder: vec![],
                vedtak_fattet: VedtakFattet {
                    ansvarlig: "Z991122".to_string(),
                    ansvarlig_enhet: "4862".to_string(),
                },
                attestasjon: Attestasjon {
                    attestant: "Z993344".to_string(),
                    attesterende_enhet: "4862".to_string(),
                },
            },
            oppdrag: None,
            utbetalingslinjer,
            utbetalingshendelser: vec![],
        }
    }
}
