//! Property-based tests for the oppdrag mapper and codec
//!
//! - Round-trip: decode(encode(x)) == x for mapped oppdrag, including
//!   identifiers and receipt texts with whitespace and markup characters
//! - Determinism: mapping the same aggregate twice gives identical XML
//! - Chain references: every ref field points at an earlier line

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use oppdrag::{model::Mmel, to_oppdrag, xml};
use proptest::prelude::*;
use rust_decimal::Decimal;
use utbetaling_core::*;
use uuid::Uuid;

/// Strategy for one line: amount in øre, months after 2022-01, opphør flag
fn linje_strategy() -> impl Strategy<Value = (i64, u32, bool, bool)> {
    (1i64..5_000_000i64, 0u32..48u32, any::<bool>(), any::<bool>())
}

/// Free text with edge whitespace and characters that need escaping
fn tekst_strategy() -> impl Strategy<Value = String> {
    "[ \t\na-zA-Z0-9ø<>&'\"]{0,12}"
}

/// Identifiers and receipt text: (saksbehandler, mottaker, attestant, melding)
fn fritekst_strategy() -> impl Strategy<Value = (String, String, String, String)> {
    (tekst_strategy(), tekst_strategy(), tekst_strategy(), "[ \na-z<&]{1,12}")
}

fn sak_type_strategy() -> impl Strategy<Value = SakType> {
    prop_oneof![Just(SakType::Barnepensjon), Just(SakType::Omstillingsstoenad)]
}

fn build(sak_type: SakType, linjer: &[(i64, u32, bool, bool)], sekunder: i64) -> Utbetaling {
    let id = UtbetalingId(Uuid::from_u128(42));
    let behandling_id = BehandlingId(Uuid::from_u128(4242));
    let tidspunkt = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(sekunder);
    let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();

    let utbetalingslinjer = linjer
        .iter()
        .enumerate()
        .map(|(i, (oere, maaneder, opphoer, med_erstatter))| {
            let fra = start.checked_add_months(chrono::Months::new(*maaneder)).unwrap();
            let linje_id = 100 + i as i64;
            Utbetalingslinje {
                id: UtbetalingslinjeId(linje_id),
                linje_type: if *opphoer {
                    UtbetalingslinjeType::Opphoer
                } else {
                    UtbetalingslinjeType::Utbetaling
                },
                utbetaling_id: id,
                sak_id: SakId(9),
                erstatter_id: (*med_erstatter).then_some(UtbetalingslinjeId(linje_id - 1)),
                periode: Periode::new(fra, None),
                beloep: (!*opphoer).then(|| Decimal::new(*oere, 2)),
                klassifikasjonskode: oppdrag::klassifikasjonskode(sak_type, fra).to_string(),
                kjoereplan: Kjoereplan::NesteRegulaere,
                opprettet: tidspunkt,
            }
        })
        .collect();

    Utbetaling {
        id,
        sak_id: SakId(9),
        sak_type,
        behandling_id,
        behandling_id_til_oppdrag: behandling_id.to_oppdrag_ref(),
        vedtak_id: VedtakId(3),
        opprettet: tidspunkt,
        avstemmingsnokkel: Avstemmingsnokkel::from(tidspunkt),
        stoenadsmottaker: "01020312345".to_string(),
        saksbehandler: "Z1".to_string(),
        saksbehandler_enhet: "4862".to_string(),
        attestant: "Z2".to_string(),
        attestant_enhet: "4862".to_string(),
        vedtak: Vedtak {
            vedtak_id: VedtakId(3),
            sak: VedtakSak {
                id: SakId(9),
                ident: "01020312345".to_string(),
                sak_type,
            },
            behandling: Behandling {
                id: behandling_id,
                behandling_type: BehandlingType::Revurdering,
            },
            utbetalingsperioder: vec![],
            vedtak_fattet: VedtakFattet {
                ansvarlig: "Z1".to_string(),
                ansvarlig_enhet: "4862".to_string(),
            },
            attestasjon: Attestasjon {
                attestant: "Z2".to_string(),
                attesterende_enhet: "4862".to_string(),
            },
        },
        oppdrag: None,
        utbetalingslinjer,
        utbetalingshendelser: vec![],
    }
}

proptest! {
    #[test]
    fn prop_free_text_round_trips(
        linjer in prop::collection::vec(linje_strategy(), 1..3),
        (saksbehandler, mottaker, attestant, melding) in fritekst_strategy(),
    ) {
        let mut utbetaling = build(SakType::Barnepensjon, &linjer, 0);
        utbetaling.saksbehandler = saksbehandler;
        utbetaling.stoenadsmottaker = mottaker;
        utbetaling.attestant = attestant;

        let mut oppdrag = to_oppdrag(&utbetaling, true, false).unwrap();
        oppdrag.mmel = Some(Mmel {
            alvorlighetsgrad: "04".to_string(),
            kode_melding: Some("B110008F".to_string()),
            beskr_melding: Some(melding),
        });

        let encoded = xml::encode_oppdrag(&oppdrag).unwrap();
        prop_assert_eq!(xml::decode_oppdrag(&encoded).unwrap(), oppdrag);
    }

    #[test]
    fn prop_mapped_oppdrag_round_trips(
        sak_type in sak_type_strategy(),
        linjer in prop::collection::vec(linje_strategy(), 1..6),
        sekunder in 0i64..10_000_000i64,
        foerste in any::<bool>(),
        regulering in any::<bool>(),
    ) {
        let utbetaling = build(sak_type, &linjer, sekunder);
        let oppdrag = to_oppdrag(&utbetaling, foerste, regulering).unwrap();

        let encoded = xml::encode_oppdrag(&oppdrag).unwrap();
        prop_assert_eq!(xml::decode_oppdrag(&encoded).unwrap(), oppdrag.clone());

        let igjen = xml::encode_oppdrag(&to_oppdrag(&utbetaling, foerste, regulering).unwrap()).unwrap();
        prop_assert_eq!(encoded, igjen);

        for linje in &oppdrag.oppdrag110.oppdrags_linje150 {
            if let Some(referanse) = &linje.ref_delytelse_id {
                let referanse: i64 = referanse.parse().unwrap();
                let egen: i64 = linje.delytelse_id.parse().unwrap();
                prop_assert!(referanse < egen);
            }
        }
    }
}
