//! Oppdrag Mapper
//!
//! Pure function from the Utbetaling aggregate to the wire model. Nothing is
//! read from the clock or the environment, so a resend after a crash yields
//! the same document as the original send.

use crate::{
    error::{Error, Result},
    model::*,
};
use chrono::NaiveDate;
use utbetaling_core::{Utbetaling, Utbetalingslinje, UtbetalingslinjeType};

const KODE_AKSJON: &str = "1";
const UTBET_FREKVENS: &str = "MND";
const TYPE_SATS: &str = "MND";
const FRADRAG_TILLEGG: &str = "T";
const BRUK_KJOREPLAN_REGULERING: &str = "J";

/// Fixed "valid since" date used for recipient and unit blocks
pub fn gjelder_fom() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Build the oppdrag for `utbetaling`
///
/// `er_foerste_utbetaling_paa_sak` selects `kodeEndring` NY over ENDR.
/// `er_regulering` forces `brukKjoreplan=J` on every line so a mass
/// regulation is paid with the parameterised run.
///
/// Fails with [`Error::Mapping`] if a line's `erstatter_id` is not an earlier
/// line or a payment line lacks an amount.
pub fn to_oppdrag(
    utbetaling: &Utbetaling,
    er_foerste_utbetaling_paa_sak: bool,
    er_regulering: bool,
) -> Result<Oppdrag> {
    let linjer = utbetaling
        .utbetalingslinjer
        .iter()
        .map(|linje| to_oppdragslinje(utbetaling, linje, er_regulering))
        .collect::<Result<Vec<_>>>()?;

    if linjer.is_empty() {
        return Err(Error::Mapping(format!(
            "Utbetaling {} has no lines",
            utbetaling.id
        )));
    }

    let nokkel = utbetaling.avstemmingsnokkel.to_wire();

    Ok(Oppdrag {
        mmel: None,
        oppdrag110: Oppdrag110 {
            kode_aksjon: KODE_AKSJON.to_string(),
            kode_endring: if er_foerste_utbetaling_paa_sak {
                KODE_ENDRING_NY
            } else {
                KODE_ENDRING_ENDR
            }
            .to_string(),
            kode_fagomraade: utbetaling.sak_type.fagomraade().to_string(),
            fagsystem_id: utbetaling.sak_id.to_string(),
            utbet_frekvens: UTBET_FREKVENS.to_string(),
            oppdrag_gjelder_id: utbetaling.stoenadsmottaker.clone(),
            dato_oppdrag_gjelder_fom: gjelder_fom(),
            saksbeh_id: utbetaling.saksbehandler.clone(),
            avstemming115: Avstemming115 {
                kode_komponent: utbetaling.sak_type.fagomraade().to_string(),
                nokkel_avstemming: nokkel.clone(),
                tidspkt_melding: nokkel,
            },
            oppdrags_enhet120: vec![
                OppdragsEnhet120 {
                    type_enhet: ENHET_BOSTED.to_string(),
                    enhet: utbetaling.saksbehandler_enhet.clone(),
                    dato_enhet_fom: gjelder_fom(),
                },
                OppdragsEnhet120 {
                    type_enhet: ENHET_BEHANDLENDE.to_string(),
                    enhet: BEHANDLENDE_ENHET.to_string(),
                    dato_enhet_fom: gjelder_fom(),
                },
            ],
            oppdrags_linje150: linjer,
        },
    })
}

fn to_oppdragslinje(
    utbetaling: &Utbetaling,
    linje: &Utbetalingslinje,
    er_regulering: bool,
) -> Result<OppdragsLinje150> {
    if let Some(erstatter) = linje.erstatter_id {
        if erstatter >= linje.id {
            return Err(Error::Mapping(format!(
                "Line {} replaces line {} which is not an earlier line",
                linje.id, erstatter
            )));
        }
    }

    let opphoer = linje.linje_type == UtbetalingslinjeType::Opphoer;
    if !opphoer && linje.beloep.is_none() {
        return Err(Error::Mapping(format!("Line {} has no amount", linje.id)));
    }

    let bruk_kjoreplan = if er_regulering {
        BRUK_KJOREPLAN_REGULERING
    } else {
        linje.kjoereplan.as_wire()
    };

    Ok(OppdragsLinje150 {
        kode_endring_linje: KODE_ENDRING_NY.to_string(),
        kode_status_linje: opphoer.then(|| KODE_STATUS_OPPHOER.to_string()),
        dato_status_fom: opphoer.then_some(linje.periode.fra),
        vedtak_id: utbetaling.vedtak_id.to_string(),
        delytelse_id: linje.id.to_string(),
        kode_klassifik: linje.klassifikasjonskode.clone(),
        dato_vedtak_fom: linje.periode.fra,
        dato_vedtak_tom: linje.periode.til,
        sats: linje.beloep,
        fradrag_tillegg: FRADRAG_TILLEGG.to_string(),
        type_sats: TYPE_SATS.to_string(),
        bruk_kjoreplan: bruk_kjoreplan.to_string(),
        saksbeh_id: utbetaling.saksbehandler.clone(),
        utbetales_til_id: utbetaling.stoenadsmottaker.clone(),
        henvisning: utbetaling.behandling_id_til_oppdrag.clone(),
        attestant180: vec![Attestant180 {
            attestant_id: utbetaling.attestant.clone(),
        }],
        ref_fagsystem_id: linje.erstatter_id.map(|_| utbetaling.sak_id.to_string()),
        ref_delytelse_id: linje.erstatter_id.map(|id| id.to_string()),
    })
}

#[cfg(test)]
pub(crate) mod testdata {
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;
    use utbetaling_core::*;
    use uuid::Uuid;

    pub fn utbetaling(linjer: Vec<(i64, Option<i64>, UtbetalingslinjeType, NaiveDate)>) -> Utbetaling {
        let id = UtbetalingId(Uuid::from_u128(0x0190_0000_0000_7000_8000_0000_0000_0001));
        let behandling_id = BehandlingId(Uuid::from_u128(0xf3a1_c7d2_5b4e_4c9a_8d21_0e6f_7a9b_3c45));
        let tidspunkt = Utc.with_ymd_and_hms(2024, 2, 1, 10, 15, 30).unwrap();

        let utbetalingslinjer = linjer
            .into_iter()
            .map(|(linje_id, erstatter, linje_type, fra)| Utbetalingslinje {
                id: UtbetalingslinjeId(linje_id),
                linje_type,
                utbetaling_id: id,
                sak_id: SakId(1001),
                erstatter_id: erstatter.map(UtbetalingslinjeId),
                periode: Periode::new(fra, None),
                beloep: match linje_type {
                    UtbetalingslinjeType::Utbetaling => Some(Decimal::new(3716, 0)),
                    UtbetalingslinjeType::Opphoer => None,
                },
                klassifikasjonskode: crate::klassifikasjon::klassifikasjonskode(
                    SakType::Barnepensjon,
                    fra,
                )
                .to_string(),
                kjoereplan: Kjoereplan::NesteRegulaere,
                opprettet: tidspunkt,
            })
            .collect();

        Utbetaling {
            id,
            sak_id: SakId(1001),
            sak_type: SakType::Barnepensjon,
            behandling_id,
            behandling_id_til_oppdrag: behandling_id.to_oppdrag_ref(),
            vedtak_id: VedtakId(77),
            opprettet: tidspunkt,
            avstemmingsnokkel: Avstemmingsnokkel::from(tidspunkt),
            stoenadsmottaker: "12345678901".to_string(),
            saksbehandler: "Z991122".to_string(),
            saksbehandler_enhet: "4862".to_string(),
            attestant: "Z993344".to_string(),
            attestant_enhet: "4862".to_string(),
            vedtak: Vedtak {
                vedtak_id: VedtakId(77),
                sak: VedtakSak {
                    id: SakId(1001),
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

#[cfg(test)]
mod tests {
    use super::testdata::utbetaling;
    use super::*;
    use crate::klassifikasjon::{BARNEPENSJON, BARNEPENSJON_FOER_2024};
    use rust_decimal::Decimal;

    fn dato(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_header_for_first_utbetaling() {
        let u = utbetaling(vec![(1, None, UtbetalingslinjeType::Utbetaling, dato(2024, 1, 1))]);
        let oppdrag = to_oppdrag(&u, true, false).unwrap();
        let header = &oppdrag.oppdrag110;

        assert_eq!(header.kode_endring, "NY");
        assert_eq!(header.kode_fagomraade, "BARNEPE");
        assert_eq!(header.fagsystem_id, "1001");
        assert_eq!(header.utbet_frekvens, "MND");
        assert_eq!(header.oppdrag_gjelder_id, "12345678901");
        assert_eq!(header.avstemming115.nokkel_avstemming, "2024-02-01-10.15.30.000000");
        assert_eq!(header.oppdrags_enhet120.len(), 2);
        assert_eq!(header.oppdrags_enhet120[0].enhet, "4862");
        assert_eq!(header.oppdrags_enhet120[1].enhet, BEHANDLENDE_ENHET);
        assert!(oppdrag.mmel.is_none());
    }

    #[test]
    fn test_later_utbetaling_is_endr() {
        let u = utbetaling(vec![(2, Some(1), UtbetalingslinjeType::Utbetaling, dato(2024, 5, 1))]);
        let oppdrag = to_oppdrag(&u, false, false).unwrap();
        assert_eq!(oppdrag.oppdrag110.kode_endring, "ENDR");
    }

    #[test]
    fn test_line_mapping() {
        let u = utbetaling(vec![
            (3, None, UtbetalingslinjeType::Utbetaling, dato(2023, 9, 1)),
            (4, Some(3), UtbetalingslinjeType::Utbetaling, dato(2024, 1, 1)),
        ]);
        let oppdrag = to_oppdrag(&u, true, false).unwrap();
        let linjer = &oppdrag.oppdrag110.oppdrags_linje150;

        assert_eq!(linjer.len(), 2);
        assert_eq!(linjer[0].vedtak_id, "77");
        assert_eq!(linjer[0].delytelse_id, "3");
        assert_eq!(linjer[0].kode_klassifik, BARNEPENSJON_FOER_2024);
        assert_eq!(linjer[0].sats, Some(Decimal::new(3716, 0)));
        assert_eq!(linjer[0].bruk_kjoreplan, "N");
        assert_eq!(linjer[0].attestant180[0].attestant_id, "Z993344");
        assert_eq!(linjer[0].henvisning.len(), 30);
        assert!(linjer[0].ref_delytelse_id.is_none());

        assert_eq!(linjer[1].kode_klassifik, BARNEPENSJON);
        assert_eq!(linjer[1].ref_fagsystem_id.as_deref(), Some("1001"));
        assert_eq!(linjer[1].ref_delytelse_id.as_deref(), Some("3"));
    }

    #[test]
    fn test_opphoer_line() {
        let u = utbetaling(vec![(9, Some(8), UtbetalingslinjeType::Opphoer, dato(2024, 7, 1))]);
        let oppdrag = to_oppdrag(&u, false, false).unwrap();
        let linje = &oppdrag.oppdrag110.oppdrags_linje150[0];

        assert_eq!(linje.kode_status_linje.as_deref(), Some("OPPH"));
        assert_eq!(linje.dato_status_fom, Some(dato(2024, 7, 1)));
        assert!(linje.sats.is_none());
    }

    #[test]
    fn test_regulering_forces_kjoreplan() {
        let u = utbetaling(vec![(5, Some(4), UtbetalingslinjeType::Utbetaling, dato(2024, 5, 1))]);
        let oppdrag = to_oppdrag(&u, false, true).unwrap();
        assert_eq!(oppdrag.oppdrag110.oppdrags_linje150[0].bruk_kjoreplan, "J");
    }

    #[test]
    fn test_forward_erstatter_is_fatal() {
        let u = utbetaling(vec![(5, Some(6), UtbetalingslinjeType::Utbetaling, dato(2024, 5, 1))]);
        assert!(matches!(to_oppdrag(&u, false, false), Err(Error::Mapping(_))));
    }

    #[test]
    fn test_missing_amount_is_fatal() {
        let mut u = utbetaling(vec![(5, None, UtbetalingslinjeType::Utbetaling, dato(2024, 5, 1))]);
        u.utbetalingslinjer[0].beloep = None;
        assert!(matches!(to_oppdrag(&u, true, false), Err(Error::Mapping(_))));
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let u = utbetaling(vec![
            (1, None, UtbetalingslinjeType::Utbetaling, dato(2024, 1, 1)),
            (2, Some(1), UtbetalingslinjeType::Opphoer, dato(2024, 6, 1)),
        ]);
        let a = crate::xml::encode_oppdrag(&to_oppdrag(&u, true, false).unwrap()).unwrap();
        let b = crate::xml::encode_oppdrag(&to_oppdrag(&u.clone(), true, false).unwrap()).unwrap();
        assert_eq!(a, b);
    }
}
