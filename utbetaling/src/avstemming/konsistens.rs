//! Konsistensavstemming (consistency reconciliation)
//!
//! For every sak of a product, the lines paying on the reconciliation date
//! are reported to the accounting system as one batch (`START`, one `DATA`
//! per oppdrag, a `DATA` with totals, `AVSL`). When an [`OppdragsLedger`]
//! is configured the same lines are compared against the ledger's reported
//! state. Divergences are returned and logged for manual review; nothing is
//! corrected.

use crate::{
    config::AvstemmingConfig,
    metrics::{AVSTEMMING_DURATION, AVSTEMMING_RUNS_TOTAL, AVVIK_TOTAL},
    scheduler::ScheduledJob,
    Error, Result,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Europe::Oslo;
use message_bus::{Message, Publisher};
use oppdrag::avstemmingsdata::*;
use oppdrag::model::{BEHANDLENDE_ENHET, ENHET_BEHANDLENDE, ENHET_BOSTED};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use utbetaling_core::linjer::LinjeArena;
use utbetaling_core::{
    Avstemmingsnokkel, SakId, SakType, Utbetaling, UtbetalingId, UtbetalingStore,
    Utbetalingslinje, UtbetalingslinjeId, Utbetalingsstatus,
};
use uuid::Uuid;

const JOB: &str = "konsistensavstemming";

/// A line as the external ledger reports it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerLinje {
    /// `delytelseId`
    pub delytelse_id: UtbetalingslinjeId,
    /// Classification code
    pub klassifikasjonskode: String,
    /// Monthly amount
    pub beloep: Decimal,
}

/// Port to the external ledger's view of a sak
#[async_trait]
pub trait OppdragsLedger: Send + Sync {
    /// Lines the ledger pays on `dato` for `sak_id`
    async fn loepende_linjer(
        &self,
        sak_type: SakType,
        sak_id: SakId,
        dato: NaiveDate,
    ) -> Result<Vec<LedgerLinje>>;
}

/// Ledger queried over HTTP
///
/// `GET {base_url}/oppdrag/{fagområde}/{sak_id}/linjer?dato=YYYY-MM-DD`
/// returns a JSON array of [`LedgerLinje`]; 404 means nothing is paying.
#[derive(Debug, Clone)]
pub struct HttpOppdragsLedger {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOppdragsLedger {
    /// Create client
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Ledger client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl OppdragsLedger for HttpOppdragsLedger {
    async fn loepende_linjer(
        &self,
        sak_type: SakType,
        sak_id: SakId,
        dato: NaiveDate,
    ) -> Result<Vec<LedgerLinje>> {
        let url = format!(
            "{}/oppdrag/{}/{}/linjer",
            self.base_url,
            sak_type.fagomraade(),
            sak_id
        );
        let response = self
            .client
            .get(&url)
            .query(&[("dato", dato.format("%Y-%m-%d").to_string())])
            .send()
            .await
            .map_err(|e| Error::Ledger(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(vec![]);
        }
        if !response.status().is_success() {
            return Err(Error::Ledger(format!("{} returned {}", url, response.status())));
        }
        response
            .json()
            .await
            .map_err(|e| Error::Ledger(format!("Invalid ledger response: {}", e)))
    }
}

/// Divergence between the active Utbetaling and the ledger
#[derive(Debug, Clone, PartialEq)]
pub enum Avvik {
    /// Paying here, unknown to the ledger
    ManglerIOppdrag {
        /// Sak
        sak_id: SakId,
        /// Line
        linje_id: UtbetalingslinjeId,
    },
    /// Paying in the ledger, not here
    UkjentIOppdrag {
        /// Sak
        sak_id: SakId,
        /// Line
        linje_id: UtbetalingslinjeId,
    },
    /// Amounts differ
    BeloepAvvik {
        /// Sak
        sak_id: SakId,
        /// Line
        linje_id: UtbetalingslinjeId,
        /// Our amount
        forventet: Decimal,
        /// Ledger amount
        faktisk: Decimal,
    },
    /// Classification codes differ
    KlassifikasjonAvvik {
        /// Sak
        sak_id: SakId,
        /// Line
        linje_id: UtbetalingslinjeId,
        /// Our code
        forventet: String,
        /// Ledger code
        faktisk: String,
    },
}

impl Avvik {
    /// Metric label
    pub fn kind(&self) -> &'static str {
        match self {
            Avvik::ManglerIOppdrag { .. } => "mangler_i_oppdrag",
            Avvik::UkjentIOppdrag { .. } => "ukjent_i_oppdrag",
            Avvik::BeloepAvvik { .. } => "beloep",
            Avvik::KlassifikasjonAvvik { .. } => "klassifikasjon",
        }
    }
}

/// Compare our paying lines for a sak against the ledger's
pub fn sammenlign(sak_id: SakId, forventet: &[&Utbetalingslinje], faktisk: &[LedgerLinje]) -> Vec<Avvik> {
    let ledger: BTreeMap<UtbetalingslinjeId, &LedgerLinje> =
        faktisk.iter().map(|l| (l.delytelse_id, l)).collect();
    let mut avvik = Vec::new();

    for linje in forventet {
        let Some(ledger_linje) = ledger.get(&linje.id) else {
            avvik.push(Avvik::ManglerIOppdrag { sak_id, linje_id: linje.id });
            continue;
        };
        let beloep = linje.beloep.unwrap_or_default();
        if beloep != ledger_linje.beloep {
            avvik.push(Avvik::BeloepAvvik {
                sak_id,
                linje_id: linje.id,
                forventet: beloep,
                faktisk: ledger_linje.beloep,
            });
        }
        if linje.klassifikasjonskode != ledger_linje.klassifikasjonskode {
            avvik.push(Avvik::KlassifikasjonAvvik {
                sak_id,
                linje_id: linje.id,
                forventet: linje.klassifikasjonskode.clone(),
                faktisk: ledger_linje.klassifikasjonskode.clone(),
            });
        }
    }

    for ledger_linje in faktisk {
        if !forventet.iter().any(|l| l.id == ledger_linje.delytelse_id) {
            avvik.push(Avvik::UkjentIOppdrag {
                sak_id,
                linje_id: ledger_linje.delytelse_id,
            });
        }
    }

    avvik
}

/// Output of one run
#[derive(Debug, Clone)]
pub struct Konsistensavstemming {
    /// Run id
    pub id: Uuid,
    /// Product
    pub sak_type: SakType,
    /// Reconciliation date
    pub dato: NaiveDate,
    /// Oppdrag reported
    pub antall_oppdrag: usize,
    /// Emitted batch messages
    pub meldinger: Vec<String>,
    /// Divergences found
    pub avvik: Vec<Avvik>,
}

/// State of one sak of the product; `linjer` is empty when nothing pays
#[derive(Debug, Clone)]
struct AktivtOppdrag {
    aktiv: Utbetaling,
    linjer: Vec<Utbetalingslinje>,
    eiere: HashMap<UtbetalingId, Utbetaling>,
}

/// Scheduled konsistensavstemming
pub struct Konsistensavstemmer {
    store: Arc<dyn UtbetalingStore>,
    publisher: Publisher,
    queue: String,
    ledger: Option<Arc<dyn OppdragsLedger>>,
    config: AvstemmingConfig,
}

impl std::fmt::Debug for Konsistensavstemmer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Konsistensavstemmer")
            .field("queue", &self.queue)
            .field("ledger", &self.ledger.is_some())
            .finish_non_exhaustive()
    }
}

impl Konsistensavstemmer {
    /// Create job
    pub fn new(
        store: Arc<dyn UtbetalingStore>,
        publisher: Publisher,
        queue: impl Into<String>,
        ledger: Option<Arc<dyn OppdragsLedger>>,
        config: AvstemmingConfig,
    ) -> Self {
        Self {
            store,
            publisher,
            queue: queue.into(),
            ledger,
            config,
        }
    }

    /// Reconcile every product as of `tidspunkt`
    pub async fn kjoer(&self, tidspunkt: DateTime<Utc>) -> Result<Vec<Konsistensavstemming>> {
        let mut resultat = Vec::with_capacity(SakType::ALLE.len());
        for sak_type in SakType::ALLE {
            resultat.push(self.avstem(sak_type, tidspunkt).await?);
        }
        Ok(resultat)
    }

    /// Reconcile one product as of `tidspunkt`
    pub async fn avstem(&self, sak_type: SakType, tidspunkt: DateTime<Utc>) -> Result<Konsistensavstemming> {
        let dato = tidspunkt.with_timezone(&Oslo).date_naive();
        let id = Uuid::now_v7();

        let mut saker = Vec::new();
        for sak_id in self.store.saker().await? {
            if let Some(aktivt) = self.aktivt_oppdrag(sak_id, sak_type, dato).await? {
                saker.push(aktivt);
            }
        }

        // Every sak is compared, also those where nothing should pay any more
        let mut avvik = Vec::new();
        if let Some(ledger) = &self.ledger {
            for aktivt in &saker {
                let faktisk = ledger
                    .loepende_linjer(sak_type, aktivt.aktiv.sak_id, dato)
                    .await?;
                let forventet: Vec<&Utbetalingslinje> = aktivt.linjer.iter().collect();
                avvik.extend(sammenlign(aktivt.aktiv.sak_id, &forventet, &faktisk));
            }
        }
        let oppdrag: Vec<AktivtOppdrag> = saker.into_iter().filter(|s| !s.linjer.is_empty()).collect();

        for a in &avvik {
            AVVIK_TOTAL.with_label_values(&[a.kind()]).inc();
            warn!(sak_type = %sak_type, avvik = ?a, "Konsistensavstemming found divergence");
        }

        let meldinger = self.meldinger(sak_type, tidspunkt, id, &oppdrag);
        let mut xml = Vec::with_capacity(meldinger.len());
        for melding in &meldinger {
            let encoded = oppdrag::xml::encode_konsistensdata(melding)?;
            self.publisher
                .publish(Message::new(self.queue.clone(), encoded.clone()))
                .await?;
            xml.push(encoded);
        }

        info!(
            sak_type = %sak_type,
            dato = %dato,
            antall_oppdrag = oppdrag.len(),
            avvik = avvik.len(),
            "Konsistensavstemming done"
        );

        Ok(Konsistensavstemming {
            id,
            sak_type,
            dato,
            antall_oppdrag: oppdrag.len(),
            meldinger: xml,
            avvik,
        })
    }

    async fn aktivt_oppdrag(
        &self,
        sak_id: SakId,
        sak_type: SakType,
        dato: NaiveDate,
    ) -> Result<Option<AktivtOppdrag>> {
        let Some(aktiv) = self.store.active_for(sak_id).await? else {
            return Ok(None);
        };
        if aktiv.sak_type != sak_type {
            return Ok(None);
        }

        let arena = LinjeArena::from_linjer(self.store.linjer_for_sak(sak_id).await?);
        let mut eiere = HashMap::new();
        for linje in arena.alle() {
            if !eiere.contains_key(&linje.utbetaling_id) {
                if let Some(eier) = self.store.get(linje.utbetaling_id).await? {
                    eiere.insert(eier.id, eier);
                }
            }
        }

        let linjer = arena
            .loepende_blant(dato, |id| {
                eiere.get(&id).is_some_and(|eier: &Utbetaling| {
                    matches!(
                        eier.status(),
                        Utbetalingsstatus::Godkjent | Utbetalingsstatus::GodkjentMedFeil
                    )
                })
            })
            .into_iter()
            .cloned()
            .collect();

        Ok(Some(AktivtOppdrag { aktiv, linjer, eiere }))
    }

    fn meldinger(
        &self,
        sak_type: SakType,
        tidspunkt: DateTime<Utc>,
        id: Uuid,
        oppdrag: &[AktivtOppdrag],
    ) -> Vec<Konsistensdata> {
        let aksjon = |aksjon_type: &str| Konsistensaksjon {
            aksjon_type: aksjon_type.to_string(),
            kilde_type: KILDE_AVLEVERT.to_string(),
            avstemming_type: AVSTEMMING_KONSISTENS.to_string(),
            avleverende_komponent_kode: self.config.kilde_komponent.clone(),
            mottakende_komponent_kode: MOTTAKENDE_KOMPONENT.to_string(),
            underkomponent_kode: sak_type.fagomraade().to_string(),
            tidspunkt_avstemming_tom: Avstemmingsnokkel::from(tidspunkt).to_wire(),
            avleverende_avstemming_id: id.simple().to_string(),
            bruker_id: self.config.bruker_id.clone(),
        };
        let melding = |aksjon_type: &str| Konsistensdata {
            aksjonsdata: aksjon(aksjon_type),
            oppdragsdata_liste: vec![],
            totaldata: None,
        };

        let mut meldinger = vec![melding(AKSJON_START)];
        let mut total_belop = Decimal::ZERO;
        for aktivt in oppdrag {
            let data = oppdragsdata(sak_type, aktivt);
            total_belop += data.oppdragslinje_liste.iter().map(|l| l.sats).sum::<Decimal>();
            meldinger.push(Konsistensdata {
                oppdragsdata_liste: vec![data],
                ..melding(AKSJON_DATA)
            });
        }
        meldinger.push(Konsistensdata {
            totaldata: Some(Totaldata {
                total_antall: oppdrag.len() as u32,
                total_belop,
                fortegn: fortegn(total_belop).to_string(),
            }),
            ..melding(AKSJON_DATA)
        });
        meldinger.push(melding(AKSJON_AVSLUTT));
        meldinger
    }
}

fn oppdragsdata(sak_type: SakType, aktivt: &AktivtOppdrag) -> Oppdragsdata {
    let aktiv = &aktivt.aktiv;
    let gjelder_fom = oppdrag::mapper::gjelder_fom();

    Oppdragsdata {
        fagomrade_kode: sak_type.fagomraade().to_string(),
        fagsystem_id: aktiv.sak_id.to_string(),
        utbetalingsfrekvens: "MND".to_string(),
        oppdrag_gjelder_id: aktiv.stoenadsmottaker.clone(),
        oppdrag_gjelder_fom: gjelder_fom,
        saksbehandler_id: aktiv.saksbehandler.clone(),
        oppdragsenhet_liste: vec![
            Enhet {
                enhet_type: ENHET_BOSTED.to_string(),
                enhet: aktiv.saksbehandler_enhet.clone(),
                enhet_fom: gjelder_fom,
            },
            Enhet {
                enhet_type: ENHET_BEHANDLENDE.to_string(),
                enhet: BEHANDLENDE_ENHET.to_string(),
                enhet_fom: gjelder_fom,
            },
        ],
        oppdragslinje_liste: aktivt
            .linjer
            .iter()
            .map(|linje| {
                let eier = aktivt.eiere.get(&linje.utbetaling_id);
                Oppdragslinje {
                    vedtak_id: eier.map(|e| e.vedtak_id.to_string()).unwrap_or_default(),
                    delytelse_id: linje.id.to_string(),
                    klassifikasjons_kode: linje.klassifikasjonskode.clone(),
                    vedtak_periode_fom: linje.periode.fra,
                    vedtak_periode_tom: linje.periode.til,
                    sats: linje.beloep.unwrap_or_default(),
                    satstype_kode: "MND".to_string(),
                    fradrag_tillegg: FORTEGN_TILLEGG.to_string(),
                    bruk_kjoreplan: linje.kjoereplan.as_wire().to_string(),
                    utbetales_til_id: aktiv.stoenadsmottaker.clone(),
                    ref_delytelse_id: linje.erstatter_id.map(|id| id.to_string()),
                    ref_fagsystem_id: linje.erstatter_id.map(|_| aktiv.sak_id.to_string()),
                    attestant_liste: vec![Attestant {
                        attestant_id: eier
                            .map(|e| e.attestant.clone())
                            .unwrap_or_else(|| aktiv.attestant.clone()),
                    }],
                }
            })
            .collect(),
    }
}

#[async_trait]
impl ScheduledJob for Konsistensavstemmer {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdata;
    use chrono::TimeZone;
    use message_bus::{InMemoryTransport, PublisherConfig};
    use parking_lot::Mutex;
    use utbetaling_core::{BehandlingType, InMemoryUtbetalingStore, Utbetalingshendelse};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct FastLedger {
        linjer: Mutex<HashMap<SakId, Vec<LedgerLinje>>>,
    }

    #[async_trait]
    impl OppdragsLedger for FastLedger {
        async fn loepende_linjer(&self, _: SakType, sak_id: SakId, _: NaiveDate) -> Result<Vec<LedgerLinje>> {
            Ok(self.linjer.lock().get(&sak_id).cloned().unwrap_or_default())
        }
    }

    fn tidspunkt() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
    }

    fn ledger_linje(id: i64, beloep: i64, kode: &str) -> LedgerLinje {
        LedgerLinje {
            delytelse_id: UtbetalingslinjeId(id),
            klassifikasjonskode: kode.to_string(),
            beloep: Decimal::new(beloep, 0),
        }
    }

    async fn med_godkjent(store: &InMemoryUtbetalingStore, vedtak_id: i64, sak_id: i64) -> Utbetaling {
        let utbetaling = testdata::utbetaling(
            vedtak_id,
            sak_id,
            SakType::Barnepensjon,
            Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap(),
            &[],
        );
        let id = utbetaling.id;
        store.create(utbetaling).await.unwrap();
        store
            .append_hendelse(id, Utbetalingshendelse::new(id, Utbetalingsstatus::Godkjent, None))
            .await
            .unwrap()
    }

    /// Revurdering on `sak_id` replacing line 10 from March with line 20
    async fn med_etterfoelger(
        store: &InMemoryUtbetalingStore,
        sak_id: i64,
        beloep: Option<i64>,
        status: Utbetalingsstatus,
    ) -> Utbetaling {
        let vedtak = testdata::vedtak(
            2,
            sak_id,
            BehandlingType::Revurdering,
            &[(20, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), beloep)],
        );
        let utbetaling = crate::dispatcher::bygg_utbetaling(vedtak, Some(UtbetalingslinjeId(10)));
        let id = utbetaling.id;
        store.create(utbetaling).await.unwrap();
        store
            .append_hendelse(id, Utbetalingshendelse::new(id, status, None))
            .await
            .unwrap()
    }

    fn avstemmer(
        store: Arc<InMemoryUtbetalingStore>,
        transport: &InMemoryTransport,
        ledger: Option<Arc<dyn OppdragsLedger>>,
    ) -> Konsistensavstemmer {
        let publisher = Publisher::new(Arc::new(transport.clone()), PublisherConfig::default());
        Konsistensavstemmer::new(store, publisher, "konsistens", ledger, AvstemmingConfig::default())
    }

    #[test]
    fn test_sammenlign_finds_every_kind() {
        let store_linjer: Vec<Utbetalingslinje> = [(1, 1000), (2, 2000), (3, 3000)]
            .iter()
            .map(|(id, beloep)| {
                let mut u = testdata::utbetaling(*id, 9, SakType::Barnepensjon, tidspunkt(), &[]);
                let mut linje = u.utbetalingslinjer.remove(0);
                linje.id = UtbetalingslinjeId(*id);
                linje.beloep = Some(Decimal::new(*beloep, 0));
                linje
            })
            .collect();
        let forventet: Vec<&Utbetalingslinje> = store_linjer.iter().collect();
        let faktisk = vec![
            ledger_linje(2, 2500, "BARNEPENSJON-OPTP"),
            ledger_linje(3, 3000, "OMSTILLINGOR"),
            ledger_linje(4, 100, "BARNEPENSJON-OPTP"),
        ];

        let avvik = sammenlign(SakId(9), &forventet, &faktisk);
        let kinds: Vec<_> = avvik.iter().map(Avvik::kind).collect();
        assert_eq!(
            kinds,
            vec!["mangler_i_oppdrag", "beloep", "klassifikasjon", "ukjent_i_oppdrag"]
        );
    }

    #[tokio::test]
    async fn test_batch_shape() {
        let store = Arc::new(InMemoryUtbetalingStore::new());
        med_godkjent(&store, 1, 100).await;
        med_godkjent(&store, 2, 200).await;
        // Never receipted, not reported
        store
            .create(testdata::utbetaling(3, 300, SakType::Barnepensjon, tidspunkt(), &[]))
            .await
            .unwrap();

        let transport = InMemoryTransport::new();
        let resultat = avstemmer(store, &transport, None)
            .avstem(SakType::Barnepensjon, tidspunkt())
            .await
            .unwrap();

        assert_eq!(resultat.antall_oppdrag, 2);
        assert!(resultat.avvik.is_empty());

        let meldinger: Vec<Konsistensdata> = transport
            .published_to("konsistens")
            .iter()
            .map(|m| oppdrag::xml::decode_konsistensdata(m.text().unwrap()).unwrap())
            .collect();
        let aksjoner: Vec<_> = meldinger
            .iter()
            .map(|m| m.aksjonsdata.aksjon_type.as_str())
            .collect();
        assert_eq!(aksjoner, vec!["START", "DATA", "DATA", "DATA", "AVSL"]);
        assert_eq!(meldinger[1].oppdragsdata_liste[0].fagsystem_id, "100");
        assert_eq!(meldinger[1].oppdragsdata_liste[0].oppdragslinje_liste[0].vedtak_id, "1");

        let total = meldinger[3].totaldata.as_ref().unwrap();
        assert_eq!(total.total_antall, 2);
        assert_eq!(total.total_belop, Decimal::new(2000, 0));
    }

    #[tokio::test]
    async fn test_divergence_is_reported_not_corrected() {
        let store = Arc::new(InMemoryUtbetalingStore::new());
        let godkjent = med_godkjent(&store, 1, 100).await;
        let linje_id = godkjent.utbetalingslinjer[0].id;

        let ledger = Arc::new(FastLedger::default());
        ledger
            .linjer
            .lock()
            .insert(SakId(100), vec![ledger_linje(linje_id.0, 900, "BARNEPENSJON-OPTP")]);

        let transport = InMemoryTransport::new();
        let resultat = avstemmer(store.clone(), &transport, Some(ledger))
            .avstem(SakType::Barnepensjon, tidspunkt())
            .await
            .unwrap();

        assert_eq!(
            resultat.avvik,
            vec![Avvik::BeloepAvvik {
                sak_id: SakId(100),
                linje_id,
                forventet: Decimal::new(1000, 0),
                faktisk: Decimal::new(900, 0),
            }]
        );
        let uendret = store.get(godkjent.id).await.unwrap().unwrap();
        assert_eq!(uendret, godkjent);
    }

    #[tokio::test]
    async fn test_rejected_correction_leaves_earlier_line_paying() {
        let store = Arc::new(InMemoryUtbetalingStore::new());
        med_godkjent(&store, 1, 100).await;
        med_etterfoelger(&store, 100, Some(1200), Utbetalingsstatus::Avvist).await;

        let ledger = Arc::new(FastLedger::default());
        ledger
            .linjer
            .lock()
            .insert(SakId(100), vec![ledger_linje(10, 900, "BARNEPENSJON-OPTP")]);

        let transport = InMemoryTransport::new();
        let resultat = avstemmer(store, &transport, Some(ledger))
            .avstem(SakType::Barnepensjon, tidspunkt())
            .await
            .unwrap();

        assert_eq!(resultat.antall_oppdrag, 1);
        assert_eq!(
            resultat.avvik,
            vec![Avvik::BeloepAvvik {
                sak_id: SakId(100),
                linje_id: UtbetalingslinjeId(10),
                forventet: Decimal::new(1000, 0),
                faktisk: Decimal::new(900, 0),
            }]
        );

        let data = oppdrag::xml::decode_konsistensdata(transport.published_to("konsistens")[1].text().unwrap())
            .unwrap();
        assert_eq!(data.oppdragsdata_liste[0].oppdragslinje_liste[0].delytelse_id, "10");
    }

    #[tokio::test]
    async fn test_ledger_paying_after_opphoer_is_reported() {
        let store = Arc::new(InMemoryUtbetalingStore::new());
        med_godkjent(&store, 1, 100).await;
        med_etterfoelger(&store, 100, None, Utbetalingsstatus::Godkjent).await;

        let ledger = Arc::new(FastLedger::default());
        ledger
            .linjer
            .lock()
            .insert(SakId(100), vec![ledger_linje(10, 1000, "BARNEPENSJON-OPTP")]);

        let transport = InMemoryTransport::new();
        let resultat = avstemmer(store, &transport, Some(ledger))
            .avstem(SakType::Barnepensjon, tidspunkt())
            .await
            .unwrap();

        assert_eq!(resultat.antall_oppdrag, 0);
        assert_eq!(
            resultat.avvik,
            vec![Avvik::UkjentIOppdrag {
                sak_id: SakId(100),
                linje_id: UtbetalingslinjeId(10),
            }]
        );
    }

    #[tokio::test]
    async fn test_http_ledger() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oppdrag/BARNEPE/100/linjer"))
            .and(query_param("dato", "2024-06-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "delytelseId": 1000, "klassifikasjonskode": "BARNEPENSJON-OPTP", "beloep": "1000" }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/oppdrag/BARNEPE/200/linjer"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/oppdrag/BARNEPE/300/linjer"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let ledger = HttpOppdragsLedger::new(server.uri(), Duration::from_secs(2)).unwrap();
        let dato = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        let linjer = ledger
            .loepende_linjer(SakType::Barnepensjon, SakId(100), dato)
            .await
            .unwrap();
        assert_eq!(linjer, vec![ledger_linje(1000, 1000, "BARNEPENSJON-OPTP")]);

        assert!(ledger
            .loepende_linjer(SakType::Barnepensjon, SakId(200), dato)
            .await
            .unwrap()
            .is_empty());
        assert!(matches!(
            ledger.loepende_linjer(SakType::Barnepensjon, SakId(300), dato).await,
            Err(Error::Ledger(_))
        ));
    }
}
