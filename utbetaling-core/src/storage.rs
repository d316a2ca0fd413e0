//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `utbetalinger` - Utbetaling rows without hendelser (key: utbetaling_id)
//! - `hendelser` - Append-only receipt log (key: utbetaling_id || hendelse_id)
//! - `linjer` - Line arena (key: sak_id || linje_id)
//! - `indices` - Secondary indices (vedtak, behandling, nøkkel, sak)
//! - `avstemming` - Grensesnittavstemming runs (key: sak_type || til || id)
//!
//! Signed ids and timestamps are encoded with the sign bit flipped so that
//! big-endian byte order matches numeric order.
//!
//! RocksDB calls block, so every [`UtbetalingStore`] operation runs on the
//! blocking pool through [`tokio::task::spawn_blocking`].

use crate::{
    error::{Error, Result},
    linjer::LinjeArena,
    store::{append_idempotent, oppdrag_trenger_skriving, UtbetalingStore},
    types::*,
    Config,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB,
};
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_UTBETALINGER: &str = "utbetalinger";
const CF_HENDELSER: &str = "hendelser";
const CF_LINJER: &str = "linjer";
const CF_INDICES: &str = "indices";
const CF_AVSTEMMING: &str = "avstemming";

const IDX_VEDTAK: &[u8] = b"v|";
const IDX_BEHANDLING: &[u8] = b"b|";
const IDX_NOKKEL: &[u8] = b"n|";
const IDX_SAK: &[u8] = b"s|";

/// RocksDB-backed [`UtbetalingStore`]
///
/// Clones share the database handle and the write lock.
#[derive(Clone)]
pub struct RocksDbUtbetalingStore {
    db: Arc<DB>,
    // Serialises read-modify-write sequences, never held across an await
    write_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for RocksDbUtbetalingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksDbUtbetalingStore")
            .field("path", &self.db.path())
            .finish()
    }
}

impl RocksDbUtbetalingStore {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_UTBETALINGER, Self::cf_options_rows()),
            ColumnFamilyDescriptor::new(CF_HENDELSER, Self::cf_options_log()),
            ColumnFamilyDescriptor::new(CF_LINJER, Self::cf_options_log()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
            ColumnFamilyDescriptor::new(CF_AVSTEMMING, Self::cf_options_log()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, "Opened utbetaling store");

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf_options_rows() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_log() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // Key helpers

    fn ordered_i64(value: i64) -> [u8; 8] {
        ((value as u64) ^ (1 << 63)).to_be_bytes()
    }

    fn ordered_time(tidspunkt: DateTime<Utc>) -> [u8; 8] {
        Self::ordered_i64(tidspunkt.timestamp_micros())
    }

    fn key_vedtak(vedtak_id: VedtakId) -> Vec<u8> {
        [IDX_VEDTAK, Self::ordered_i64(vedtak_id.value()).as_slice()].concat()
    }

    fn key_behandling(behandling_id: BehandlingId) -> Vec<u8> {
        [IDX_BEHANDLING, behandling_id.0.as_bytes().as_slice()].concat()
    }

    fn key_nokkel(utbetaling: &Utbetaling) -> Vec<u8> {
        [
            IDX_NOKKEL,
            Self::ordered_time(utbetaling.avstemmingsnokkel.tidspunkt()).as_slice(),
            utbetaling.id.0.as_bytes().as_slice(),
        ]
        .concat()
    }

    fn key_sak(utbetaling: &Utbetaling) -> Vec<u8> {
        [
            IDX_SAK,
            Self::ordered_i64(utbetaling.sak_id.value()).as_slice(),
            Self::ordered_time(utbetaling.avstemmingsnokkel.tidspunkt()).as_slice(),
            utbetaling.id.0.as_bytes().as_slice(),
        ]
        .concat()
    }

    fn key_linje(linje: &Utbetalingslinje) -> Vec<u8> {
        [
            Self::ordered_i64(linje.sak_id.value()),
            Self::ordered_i64(linje.id.value()),
        ]
        .concat()
    }

    fn key_hendelse(hendelse: &Utbetalingshendelse) -> Vec<u8> {
        [hendelse.utbetaling_id.0.as_bytes().as_slice(), hendelse.id.as_bytes().as_slice()].concat()
    }

    fn key_avstemming(avstemming: &Grensesnittavstemming) -> Vec<u8> {
        [
            [avstemming.sak_type.tag()].as_slice(),
            Self::ordered_time(avstemming.til).as_slice(),
            avstemming.id.as_bytes().as_slice(),
        ]
        .concat()
    }

    fn uuid_suffix(key: &[u8]) -> Result<Uuid> {
        let start = key
            .len()
            .checked_sub(16)
            .ok_or_else(|| Error::Storage("Index key too short".to_string()))?;
        Uuid::from_slice(&key[start..]).map_err(|e| Error::Storage(e.to_string()))
    }

    /// Keys and values under `prefix`, in key order
    fn scan_prefix(&self, cf: &ColumnFamily, prefix: &[u8]) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>> {
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));

        let mut rows = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            rows.push((key, value));
        }
        Ok(rows)
    }

    // Row operations

    fn load(&self, utbetaling_id: UtbetalingId) -> Result<Option<Utbetaling>> {
        let cf = self.cf_handle(CF_UTBETALINGER)?;
        let Some(value) = self.db.get_cf(cf, utbetaling_id.0.as_bytes())? else {
            return Ok(None);
        };

        let mut utbetaling: Utbetaling = serde_json::from_slice(&value)?;

        let cf_hendelser = self.cf_handle(CF_HENDELSER)?;
        utbetaling.utbetalingshendelser = self
            .scan_prefix(cf_hendelser, utbetaling_id.0.as_bytes())?
            .iter()
            .map(|(_, value)| serde_json::from_slice::<Utbetalingshendelse>(value))
            .collect::<std::result::Result<_, _>>()?;

        Ok(Some(utbetaling))
    }

    fn load_via_index(&self, key: &[u8]) -> Result<Option<Utbetaling>> {
        let cf = self.cf_handle(CF_INDICES)?;
        match self.db.get_cf(cf, key)? {
            Some(value) => {
                let id = Uuid::from_slice(&value).map_err(|e| Error::Storage(e.to_string()))?;
                self.load(UtbetalingId(id))
            }
            None => Ok(None),
        }
    }

    fn arena_for_sak(&self, sak_id: SakId) -> Result<LinjeArena> {
        let cf = self.cf_handle(CF_LINJER)?;
        let linjer = self
            .scan_prefix(cf, &Self::ordered_i64(sak_id.value()))?
            .iter()
            .map(|(_, value)| serde_json::from_slice::<Utbetalingslinje>(value))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(LinjeArena::from_linjer(linjer))
    }

    fn create_sync(&self, utbetaling: Utbetaling) -> Result<Utbetaling> {
        let _guard = self.write_lock.lock();

        let cf_indices = self.cf_handle(CF_INDICES)?;
        let vedtak_key = Self::key_vedtak(utbetaling.vedtak_id);
        if self.db.get_cf(cf_indices, &vedtak_key)?.is_some() {
            return Err(Error::DuplicateVedtak(utbetaling.vedtak_id));
        }

        self.arena_for_sak(utbetaling.sak_id)?.valider_nye(
            utbetaling.sak_id,
            utbetaling.id,
            &utbetaling.utbetalingslinjer,
        )?;

        let mut batch = WriteBatch::default();

        // 1. Row, hendelser live in their own column family
        let mut row = utbetaling.clone();
        let hendelser = std::mem::take(&mut row.utbetalingshendelser);
        let cf_rows = self.cf_handle(CF_UTBETALINGER)?;
        batch.put_cf(cf_rows, utbetaling.id.0.as_bytes(), serde_json::to_vec(&row)?);

        let cf_hendelser = self.cf_handle(CF_HENDELSER)?;
        for hendelse in &hendelser {
            batch.put_cf(cf_hendelser, Self::key_hendelse(hendelse), serde_json::to_vec(hendelse)?);
        }

        // 2. Lines
        let cf_linjer = self.cf_handle(CF_LINJER)?;
        for linje in &utbetaling.utbetalingslinjer {
            batch.put_cf(cf_linjer, Self::key_linje(linje), serde_json::to_vec(linje)?);
        }

        // 3. Indices
        let id_bytes = utbetaling.id.0.as_bytes();
        batch.put_cf(cf_indices, &vedtak_key, id_bytes);
        batch.put_cf(cf_indices, Self::key_behandling(utbetaling.behandling_id), id_bytes);
        batch.put_cf(cf_indices, Self::key_nokkel(&utbetaling), b"");
        batch.put_cf(cf_indices, Self::key_sak(&utbetaling), b"");

        self.db.write(batch)?;

        tracing::debug!(
            utbetaling_id = %utbetaling.id,
            sak_id = %utbetaling.sak_id,
            vedtak_id = %utbetaling.vedtak_id,
            "Utbetaling persisted"
        );

        Ok(utbetaling)
    }

    fn append_hendelse_sync(
        &self,
        utbetaling_id: UtbetalingId,
        hendelse: Utbetalingshendelse,
    ) -> Result<Utbetaling> {
        let _guard = self.write_lock.lock();

        let mut utbetaling = self
            .load(utbetaling_id)?
            .ok_or_else(|| Error::UtbetalingNotFound(utbetaling_id.to_string()))?;

        let key = Self::key_hendelse(&hendelse);
        let value = serde_json::to_vec(&hendelse)?;
        if append_idempotent(&mut utbetaling, hendelse) {
            let cf = self.cf_handle(CF_HENDELSER)?;
            self.db.put_cf(cf, key, value)?;
        }

        Ok(utbetaling)
    }

    fn set_oppdrag_sync(&self, utbetaling_id: UtbetalingId, oppdrag: String) -> Result<()> {
        let _guard = self.write_lock.lock();

        let mut utbetaling = self
            .load(utbetaling_id)?
            .ok_or_else(|| Error::UtbetalingNotFound(utbetaling_id.to_string()))?;

        if oppdrag_trenger_skriving(&utbetaling, &oppdrag)? {
            utbetaling.oppdrag = Some(oppdrag);
            utbetaling.utbetalingshendelser.clear();
            let cf = self.cf_handle(CF_UTBETALINGER)?;
            self.db
                .put_cf(cf, utbetaling_id.0.as_bytes(), serde_json::to_vec(&utbetaling)?)?;
        }
        Ok(())
    }

    fn hent_for_avstemming_sync(
        &self,
        fra_og_med: DateTime<Utc>,
        til: DateTime<Utc>,
    ) -> Result<Vec<Utbetaling>> {
        let cf = self.cf_handle(CF_INDICES)?;
        let start = [IDX_NOKKEL, Self::ordered_time(fra_og_med).as_slice()].concat();
        let slutt = [IDX_NOKKEL, Self::ordered_time(til).as_slice()].concat();

        let mut utbetalinger = Vec::new();
        for item in self
            .db
            .iterator_cf(cf, IteratorMode::From(&start, Direction::Forward))
        {
            let (key, _) = item?;
            if !key.starts_with(IDX_NOKKEL) || key[..slutt.len()] >= slutt[..] {
                break;
            }
            if let Some(utbetaling) = self.load(UtbetalingId(Self::uuid_suffix(&key)?))? {
                utbetalinger.push(utbetaling);
            }
        }
        Ok(utbetalinger)
    }

    fn active_for_sync(&self, sak_id: SakId) -> Result<Option<Utbetaling>> {
        let cf = self.cf_handle(CF_INDICES)?;
        let prefix = [IDX_SAK, Self::ordered_i64(sak_id.value()).as_slice()].concat();
        match self.scan_prefix(cf, &prefix)?.last() {
            Some((key, _)) => self.load(UtbetalingId(Self::uuid_suffix(key)?)),
            None => Ok(None),
        }
    }

    fn saker_sync(&self) -> Result<Vec<SakId>> {
        let cf = self.cf_handle(CF_INDICES)?;
        let mut saker: Vec<SakId> = Vec::new();
        for (key, _) in self.scan_prefix(cf, IDX_SAK)? {
            let raw: [u8; 8] = key
                .get(IDX_SAK.len()..IDX_SAK.len() + 8)
                .and_then(|b| b.try_into().ok())
                .ok_or_else(|| Error::Storage("Malformed sak index key".to_string()))?;
            let sak_id = SakId((u64::from_be_bytes(raw) ^ (1 << 63)) as i64);
            if saker.last() != Some(&sak_id) {
                saker.push(sak_id);
            }
        }
        Ok(saker)
    }

    fn siste_grensesnittavstemming_sync(
        &self,
        sak_type: SakType,
    ) -> Result<Option<Grensesnittavstemming>> {
        let cf = self.cf_handle(CF_AVSTEMMING)?;
        match self.scan_prefix(cf, &[sak_type.tag()])?.last() {
            Some((_, value)) => Ok(Some(serde_json::from_slice(value)?)),
            None => Ok(None),
        }
    }

    /// Close database (graceful shutdown)
    /// Run `f` against this store on the blocking pool
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Self) -> Result<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| Error::Storage(format!("Storage task failed: {}", e)))?
    }

    fn lagre_grensesnittavstemming_sync(&self, avstemming: &Grensesnittavstemming) -> Result<()> {
        let cf = self.cf_handle(CF_AVSTEMMING)?;
        self.db.put_cf(
            cf,
            Self::key_avstemming(avstemming),
            serde_json::to_vec(avstemming)?,
        )?;
        Ok(())
    }

    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("Utbetaling store closed");
        Ok(())
    }
}

#[async_trait]
impl UtbetalingStore for RocksDbUtbetalingStore {
    async fn create(&self, utbetaling: Utbetaling) -> Result<Utbetaling> {
        self.blocking(move |store| store.create_sync(utbetaling)).await
    }

    async fn append_hendelse(
        &self,
        utbetaling_id: UtbetalingId,
        hendelse: Utbetalingshendelse,
    ) -> Result<Utbetaling> {
        self.blocking(move |store| store.append_hendelse_sync(utbetaling_id, hendelse))
            .await
    }

    async fn set_oppdrag(&self, utbetaling_id: UtbetalingId, oppdrag: String) -> Result<()> {
        self.blocking(move |store| store.set_oppdrag_sync(utbetaling_id, oppdrag))
            .await
    }

    async fn get(&self, utbetaling_id: UtbetalingId) -> Result<Option<Utbetaling>> {
        self.blocking(move |store| store.load(utbetaling_id)).await
    }

    async fn get_by_vedtak_id(&self, vedtak_id: VedtakId) -> Result<Option<Utbetaling>> {
        self.blocking(move |store| store.load_via_index(&Self::key_vedtak(vedtak_id)))
            .await
    }

    async fn get_by_behandling_id(&self, behandling_id: BehandlingId) -> Result<Option<Utbetaling>> {
        self.blocking(move |store| store.load_via_index(&Self::key_behandling(behandling_id)))
            .await
    }

    async fn linjer_for_sak(&self, sak_id: SakId) -> Result<Vec<Utbetalingslinje>> {
        self.blocking(move |store| Ok(store.arena_for_sak(sak_id)?.alle().cloned().collect()))
            .await
    }

    async fn hent_for_avstemming(
        &self,
        fra_og_med: DateTime<Utc>,
        til: DateTime<Utc>,
    ) -> Result<Vec<Utbetaling>> {
        self.blocking(move |store| store.hent_for_avstemming_sync(fra_og_med, til))
            .await
    }

    async fn active_for(&self, sak_id: SakId) -> Result<Option<Utbetaling>> {
        self.blocking(move |store| store.active_for_sync(sak_id)).await
    }

    async fn saker(&self) -> Result<Vec<SakId>> {
        self.blocking(|store| store.saker_sync()).await
    }

    async fn lagre_grensesnittavstemming(&self, avstemming: Grensesnittavstemming) -> Result<()> {
        self.blocking(move |store| store.lagre_grensesnittavstemming_sync(&avstemming))
            .await
    }

    async fn siste_grensesnittavstemming(
        &self,
        sak_type: SakType,
    ) -> Result<Option<Grensesnittavstemming>> {
        self.blocking(move |store| store.siste_grensesnittavstemming_sync(sak_type))
            .await
    }
}
