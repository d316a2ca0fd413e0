//! Fixtures shared by unit tests

use chrono::{DateTime, NaiveDate, Utc};
use oppdrag::{model::Mmel, Oppdrag};
use rust_decimal::Decimal;
use utbetaling_core::*;
use uuid::Uuid;

/// Vedtak on `sak_id` with periods `(linje_id, fra, beløp)`; no beløp means opphør
pub fn vedtak(
    vedtak_id: i64,
    sak_id: i64,
    behandling_type: BehandlingType,
    perioder: &[(i64, NaiveDate, Option<i64>)],
) -> Vedtak {
    Vedtak {
        vedtak_id: VedtakId(vedtak_id),
        sak: VedtakSak {
            id: SakId(sak_id),
            ident: "12345678901".to_string(),
            sak_type: SakType::Barnepensjon,
        },
        behandling: Behandling {
            id: BehandlingId(Uuid::new_v4()),
            behandling_type,
        },
        utbetalingsperioder: perioder
            .iter()
            .map(|(id, fra, beloep)| Utbetalingsperiode {
                id: UtbetalingslinjeId(*id),
                periode: Periode::new(*fra, None),
                beloep: beloep.map(|b| Decimal::new(b, 0)),
                periode_type: if beloep.is_some() {
                    UtbetalingslinjeType::Utbetaling
                } else {
                    UtbetalingslinjeType::Opphoer
                },
            })
            .collect(),
        vedtak_fattet: VedtakFattet {
            ansvarlig: "Z991122".to_string(),
            ansvarlig_enhet: "4862".to_string(),
        },
        attestasjon: Attestasjon {
            attestant: "Z993344".to_string(),
            attesterende_enhet: "4862".to_string(),
        },
    }
}

/// Utbetaling for `vedtak_id` with one 1000 kr line (id `vedtak_id * 10`)
/// and one hendelse per status in `statuser`
pub fn utbetaling(
    vedtak_id: i64,
    sak_id: i64,
    sak_type: SakType,
    nokkel: DateTime<Utc>,
    statuser: &[Utbetalingsstatus],
) -> Utbetaling {
    let mut vedtak = vedtak(
        vedtak_id,
        sak_id,
        BehandlingType::Foerstegangsbehandling,
        &[(
            vedtak_id * 10,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            Some(1000),
        )],
    );
    vedtak.sak.sak_type = sak_type;

    let mut utbetaling = crate::dispatcher::bygg_utbetaling(vedtak, None);
    utbetaling.opprettet = nokkel;
    utbetaling.avstemmingsnokkel = Avstemmingsnokkel::from(nokkel);
    utbetaling.utbetalingshendelser = statuser
        .iter()
        .map(|status| Utbetalingshendelse::new(utbetaling.id, *status, None))
        .collect();
    utbetaling
}

/// Oppdrag for a simple first utbetaling
pub fn oppdrag() -> Oppdrag {
    let utbetaling = utbetaling(
        77,
        1001,
        SakType::Barnepensjon,
        chrono::TimeZone::with_ymd_and_hms(&Utc, 2024, 2, 1, 10, 0, 0).unwrap(),
        &[],
    );
    oppdrag::to_oppdrag(&utbetaling, true, false).unwrap()
}

/// Kvittering for `utbetaling` with outcome code `alvorlighetsgrad`
pub fn kvittering_xml(utbetaling: &Utbetaling, alvorlighetsgrad: &str) -> String {
    let mut oppdrag = oppdrag::to_oppdrag(utbetaling, true, false).unwrap();
    oppdrag.mmel = Some(Mmel {
        alvorlighetsgrad: alvorlighetsgrad.to_string(),
        kode_melding: Some("B110008F".to_string()),
        beskr_melding: Some("Oppdraget finnes fra før".to_string()),
    });
    oppdrag::xml::encode_oppdrag(&oppdrag).unwrap()
}
