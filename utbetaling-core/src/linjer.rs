//! Append-only line table per sak
//!
//! Corrections are a directed acyclic linkage: a line may name the earlier
//! line it supersedes through `erstatter_id`. Links are plain ids into the
//! table, never in-memory pointers, so a chain can be rebuilt from storage
//! after a restart. Because a line can only reference a line with a smaller
//! id, cycles are impossible.

use crate::{
    error::{Error, Result},
    types::{SakId, UtbetalingId, Utbetalingslinje, UtbetalingslinjeId, UtbetalingslinjeType},
};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Line table for one sak
#[derive(Debug, Clone, Default)]
pub struct LinjeArena {
    linjer: BTreeMap<UtbetalingslinjeId, Utbetalingslinje>,
}

impl LinjeArena {
    /// Build from stored lines
    pub fn from_linjer(linjer: impl IntoIterator<Item = Utbetalingslinje>) -> Self {
        Self {
            linjer: linjer.into_iter().map(|l| (l.id, l)).collect(),
        }
    }

    /// Number of lines
    pub fn len(&self) -> usize {
        self.linjer.len()
    }

    /// Empty table
    pub fn is_empty(&self) -> bool {
        self.linjer.is_empty()
    }

    /// Lookup by id
    pub fn get(&self, id: UtbetalingslinjeId) -> Option<&Utbetalingslinje> {
        self.linjer.get(&id)
    }

    /// Most recently created line
    pub fn siste(&self) -> Option<&Utbetalingslinje> {
        self.linjer.values().next_back()
    }

    /// All lines in creation order
    pub fn alle(&self) -> impl Iterator<Item = &Utbetalingslinje> {
        self.linjer.values()
    }

    /// Validate lines about to be appended for one Utbetaling
    ///
    /// Each line must be new, belong to `sak_id` and `utbetaling_id`, and any
    /// `erstatter_id` must point at an existing line of the sak or an earlier
    /// line in the same batch, with a smaller id.
    pub fn valider_nye(
        &self,
        sak_id: SakId,
        utbetaling_id: UtbetalingId,
        nye: &[Utbetalingslinje],
    ) -> Result<()> {
        let mut sett: BTreeMap<UtbetalingslinjeId, SakId> =
            self.linjer.iter().map(|(id, l)| (*id, l.sak_id)).collect();

        for linje in nye {
            if linje.sak_id != sak_id || linje.utbetaling_id != utbetaling_id {
                return Err(Error::ForeignLinje(linje.id));
            }
            if sett.contains_key(&linje.id) {
                return Err(Error::DuplicateLinje(linje.id));
            }
            if let Some(erstatter) = linje.erstatter_id {
                let gyldig = erstatter < linje.id
                    && sett.get(&erstatter).is_some_and(|sak| *sak == sak_id);
                if !gyldig {
                    return Err(Error::InvalidErstatter {
                        linje: linje.id,
                        erstatter,
                    });
                }
            }
            sett.insert(linje.id, linje.sak_id);
        }

        Ok(())
    }

    /// Append validated lines
    pub fn legg_til(&mut self, nye: impl IntoIterator<Item = Utbetalingslinje>) {
        for linje in nye {
            self.linjer.insert(linje.id, linje);
        }
    }

    /// Correction chain from `id` back to the first line, newest first
    pub fn kjede(&self, id: UtbetalingslinjeId) -> Vec<UtbetalingslinjeId> {
        let mut kjede = Vec::new();
        let mut neste = Some(id);
        while let Some(current) = neste {
            match self.linjer.get(&current) {
                Some(linje) => {
                    kjede.push(current);
                    neste = linje.erstatter_id;
                }
                None => break,
            }
        }
        kjede
    }

    /// Lines paying on `dato`
    ///
    /// A later line takes over from its own start date, so a line pays on a
    /// date it covers unless a line created after it (payment or opphør)
    /// starts on or before that date.
    pub fn loepende(&self, dato: NaiveDate) -> Vec<&Utbetalingslinje> {
        self.loepende_blant(dato, |_| true)
    }

    /// Lines paying on `dato`, counting only lines of Utbetalinger for
    /// which `gjelder` holds
    ///
    /// Lines of other Utbetalinger neither pay nor take over, so a rejected
    /// correction leaves the line it would have replaced paying.
    pub fn loepende_blant<F>(&self, dato: NaiveDate, gjelder: F) -> Vec<&Utbetalingslinje>
    where
        F: Fn(UtbetalingId) -> bool,
    {
        self.linjer
            .values()
            .filter(|l| gjelder(l.utbetaling_id))
            .filter(|l| l.linje_type == UtbetalingslinjeType::Utbetaling)
            .filter(|l| l.periode.inneholder(dato))
            .filter(|l| !self.overtatt(l, dato, &gjelder))
            .collect()
    }

    fn overtatt<F>(&self, linje: &Utbetalingslinje, dato: NaiveDate, gjelder: &F) -> bool
    where
        F: Fn(UtbetalingId) -> bool,
    {
        self.linjer
            .range(linje.id..)
            .skip(1)
            .any(|(_, senere)| gjelder(senere.utbetaling_id) && senere.periode.fra <= dato)
    }
}
