//! Grensesnittavstemming (interface reconciliation)
//!
//! Reports every Utbetaling whose avstemmingsnøkkel falls in `[fra_og_med, til)`
//! as one batch per product: `START`, one or more `DATA`, `AVSL`. Detail
//! records are chunked by the configured size; only the first `DATA`
//! carries totals, grunnlag and periode. An empty window produces no
//! messages at all.
//!
//! Windows are contiguous: each run starts where the previous run for the
//! same product ended.

use crate::{
    config::AvstemmingConfig,
    metrics::{AVSTEMMING_DURATION, AVSTEMMING_RUNS_TOTAL},
    scheduler::ScheduledJob,
    Result,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Europe::Oslo;
use message_bus::{Message, Publisher};
use oppdrag::avstemmingsdata::*;
use oppdrag::Kvittering;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use utbetaling_core::{
    Grensesnittavstemming, SakType, Utbetaling, UtbetalingStore, Utbetalingsstatus,
};
use uuid::Uuid;

const JOB: &str = "grensesnittavstemming";

/// Totals bucket of a status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    /// GODKJENT
    Godkjent,
    /// GODKJENT_MED_FEIL
    Varsel,
    /// AVVIST and FEILET
    Avvist,
    /// No receipt yet
    Mangler,
}

impl Bucket {
    /// Bucket for an effective status
    pub fn for_status(status: Utbetalingsstatus) -> Self {
        match status {
            Utbetalingsstatus::Godkjent => Bucket::Godkjent,
            Utbetalingsstatus::GodkjentMedFeil => Bucket::Varsel,
            Utbetalingsstatus::Avvist | Utbetalingsstatus::Feilet => Bucket::Avvist,
            Utbetalingsstatus::Sendt | Utbetalingsstatus::Mottatt => Bucket::Mangler,
        }
    }

    /// `detaljType`, none for approved oppdrag
    pub fn detalj_type(&self) -> Option<&'static str> {
        match self {
            Bucket::Godkjent => None,
            Bucket::Varsel => Some(DETALJ_VARSEL),
            Bucket::Avvist => Some(DETALJ_AVVIST),
            Bucket::Mangler => Some(DETALJ_MANGLER),
        }
    }
}

/// Hour-granular period bound in Norwegian local time
pub fn periode_grense(tidspunkt: DateTime<Utc>) -> String {
    tidspunkt.with_timezone(&Oslo).format("%Y%m%d%H").to_string()
}

/// Aggregate totals over the included Utbetalinger
pub fn grunnlag(utbetalinger: &[Utbetaling]) -> Grunnlagsdata {
    let mut antall = [0u32; 4];
    let mut beloep = [Decimal::ZERO; 4];

    for utbetaling in utbetalinger {
        let i = match Bucket::for_status(utbetaling.status()) {
            Bucket::Godkjent => 0,
            Bucket::Varsel => 1,
            Bucket::Avvist => 2,
            Bucket::Mangler => 3,
        };
        antall[i] += 1;
        beloep[i] += utbetaling.total_beloep();
    }

    Grunnlagsdata {
        godkjent_antall: antall[0],
        godkjent_belop: beloep[0],
        godkjent_fortegn: fortegn(beloep[0]).to_string(),
        varsel_antall: antall[1],
        varsel_belop: beloep[1],
        varsel_fortegn: fortegn(beloep[1]).to_string(),
        avvist_antall: antall[2],
        avvist_belop: beloep[2],
        avvist_fortegn: fortegn(beloep[2]).to_string(),
        mangler_antall: antall[3],
        mangler_belop: beloep[3],
        mangler_fortegn: fortegn(beloep[3]).to_string(),
    }
}

fn detalj(utbetaling: &Utbetaling) -> Option<Detaljdata> {
    let detalj_type = Bucket::for_status(utbetaling.status()).detalj_type()?;
    let kvittering = utbetaling
        .hendelse_for_status()
        .and_then(|h| h.payload.as_deref())
        .and_then(|xml| Kvittering::fra_xml(xml).ok());

    Some(Detaljdata {
        detalj_type: detalj_type.to_string(),
        offnr: utbetaling.stoenadsmottaker.clone(),
        avleverende_transaksjon_nokkel: utbetaling.sak_id.to_string(),
        melding_kode: kvittering.as_ref().and_then(|k| k.kode_melding.clone()),
        alvorlighetsgrad: kvittering.as_ref().map(|k| k.alvorlighetsgrad.clone()),
        tekst_melding: kvittering.and_then(|k| k.beskr_melding),
        tidspunkt: utbetaling.avstemmingsnokkel.to_wire(),
    })
}

/// Build the message sequence for one product's window
///
/// `utbetalinger` must be ordered by avstemmingsnøkkel.
pub fn opprett_avstemmingsmeldinger(
    sak_type: SakType,
    utbetalinger: &[Utbetaling],
    avstemming_id: Uuid,
    config: &AvstemmingConfig,
) -> Vec<Avstemmingsdata> {
    let (Some(foerste), Some(siste)) = (utbetalinger.first(), utbetalinger.last()) else {
        return vec![];
    };

    let aksjon = |aksjon_type: &str| Aksjonsdata {
        aksjon_type: aksjon_type.to_string(),
        kilde_type: KILDE_AVLEVERT.to_string(),
        avstemming_type: AVSTEMMING_GRENSESNITT.to_string(),
        kilde_komponent_kode: config.kilde_komponent.clone(),
        mottakende_komponent_kode: MOTTAKENDE_KOMPONENT.to_string(),
        underkomponent_kode: sak_type.fagomraade().to_string(),
        nokkel_fom: foerste.avstemmingsnokkel.to_wire(),
        nokkel_tom: siste.avstemmingsnokkel.to_wire(),
        avleverende_avstemming_id: avstemming_id.simple().to_string(),
        bruker_id: config.bruker_id.clone(),
    };
    let tom = |aksjon_type: &str| Avstemmingsdata {
        aksjon: aksjon(aksjon_type),
        total: None,
        periode: None,
        grunnlag: None,
        detalj: vec![],
    };

    let total_belop: Decimal = utbetalinger.iter().map(Utbetaling::total_beloep).sum();
    let mut data = tom(AKSJON_DATA);
    data.total = Some(Totaldata {
        total_antall: utbetalinger.len() as u32,
        total_belop,
        fortegn: fortegn(total_belop).to_string(),
    });
    data.periode = Some(Periodedata {
        dato_avstemt_fom: periode_grense(foerste.avstemmingsnokkel.tidspunkt()),
        dato_avstemt_tom: periode_grense(siste.avstemmingsnokkel.tidspunkt()),
    });
    data.grunnlag = Some(grunnlag(utbetalinger));

    let detaljer: Vec<Detaljdata> = utbetalinger.iter().filter_map(detalj).collect();
    let mut chunks = detaljer.chunks(config.chunk_size.max(1));

    let mut meldinger = vec![tom(AKSJON_START)];
    data.detalj = chunks.next().map(|chunk| chunk.to_vec()).unwrap_or_default();
    meldinger.push(data);
    meldinger.extend(chunks.map(|chunk| Avstemmingsdata {
        detalj: chunk.to_vec(),
        ..tom(AKSJON_DATA)
    }));
    meldinger.push(tom(AKSJON_AVSLUTT));
    meldinger
}

/// Scheduled grensesnittavstemming
pub struct Grensesnittavstemmer {
    store: Arc<dyn UtbetalingStore>,
    publisher: Publisher,
    queue: String,
    config: AvstemmingConfig,
}

impl std::fmt::Debug for Grensesnittavstemmer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grensesnittavstemmer")
            .field("queue", &self.queue)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Grensesnittavstemmer {
    /// Create job
    pub fn new(
        store: Arc<dyn UtbetalingStore>,
        publisher: Publisher,
        queue: impl Into<String>,
        config: AvstemmingConfig,
    ) -> Self {
        Self {
            store,
            publisher,
            queue: queue.into(),
            config,
        }
    }

    /// Reconcile every product up to `til`
    pub async fn kjoer(&self, til: DateTime<Utc>) -> Result<Vec<Grensesnittavstemming>> {
        let mut resultat = Vec::with_capacity(SakType::ALLE.len());
        for sak_type in SakType::ALLE {
            resultat.push(self.avstem(sak_type, til).await?);
        }
        Ok(resultat)
    }

    /// Reconcile one product from the end of its previous window up to `til`
    pub async fn avstem(&self, sak_type: SakType, til: DateTime<Utc>) -> Result<Grensesnittavstemming> {
        let fra_og_med = self
            .store
            .siste_grensesnittavstemming(sak_type)
            .await?
            .map(|forrige| forrige.til)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        let utbetalinger: Vec<Utbetaling> = self
            .store
            .hent_for_avstemming(fra_og_med, til)
            .await?
            .into_iter()
            .filter(|u| u.sak_type == sak_type)
            .collect();

        let id = Uuid::now_v7();
        let meldinger = opprett_avstemmingsmeldinger(sak_type, &utbetalinger, id, &self.config);

        let mut avstemmingsdata = Vec::with_capacity(meldinger.len());
        for melding in &meldinger {
            let xml = oppdrag::xml::encode_avstemmingsdata(melding)?;
            self.publisher
                .publish(Message::new(self.queue.clone(), xml.clone()))
                .await?;
            avstemmingsdata.push(xml);
        }

        let avstemming = Grensesnittavstemming {
            id,
            sak_type,
            fra_og_med,
            til,
            opprettet: Utc::now(),
            antall_oppdrag: utbetalinger.len(),
            avstemmingsdata,
        };
        self.store.lagre_grensesnittavstemming(avstemming.clone()).await?;

        if let Some(grunnlag) = meldinger.get(1).and_then(|m| m.grunnlag.as_ref()) {
            if grunnlag.avvist_antall + grunnlag.mangler_antall > 0 {
                warn!(
                    sak_type = %sak_type,
                    avvist = grunnlag.avvist_antall,
                    mangler = grunnlag.mangler_antall,
                    "Grensesnittavstemming has unsettled oppdrag"
                );
            }
        }
        info!(
            sak_type = %sak_type,
            fra_og_med = %fra_og_med,
            til = %til,
            antall_oppdrag = avstemming.antall_oppdrag,
            meldinger = meldinger.len(),
            "Grensesnittavstemming done"
        );
        Ok(avstemming)
    }
}

#[async_trait]
impl ScheduledJob for Grensesnittavstemmer {
    fn name(&self) -> &str {
        JOB
    }

    async fn run(&self) -> Result<()> {
        let start = Instant::now();
        let result = self.kjoer(Utc::now()).await;
        AVSTEMMING_DURATION
            .with_label_values(&[JOB])
            .observe(start.elapsed().as_secs_f64());
        AVSTEMMING_RUNS_TOTAL
            .with_label_values(&[JOB, if result.is_ok() { "success" } else { "error" }])
            .inc();
        result.map(|_| ())
    }
}
