//! Flat-file storage backend: one CSV file per table
//!
//! Every operation reads the whole table, applies the change and rewrites
//! the file through a temporary file and a rename. Operations are
//! serialized by a single async mutex per storage instance.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::models::{Consultation, Cpn, CpnStatut, Patiente, Rappel, User, Vaccination};
use super::errors::RepositoryError;
use super::storage::{CpnFilter, Storage, StorageBackend};

/// A record type stored in its own CSV file
pub trait CsvRecord: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static {
    /// File stem of the table, `<table>.csv`
    const TABLE: &'static str;

    fn id(&self) -> i64;
    fn set_id(&mut self, id: i64);
}

macro_rules! csv_record {
    ($($ty:ty => $table:literal),+ $(,)?) => {$(
        impl CsvRecord for $ty {
            const TABLE: &'static str = $table;

            fn id(&self) -> i64 {
                self.id
            }

            fn set_id(&mut self, id: i64) {
                self.id = id;
            }
        }
    )+};
}

csv_record!(
    User => "users",
    Patiente => "patientes",
    Cpn => "cpn",
    Consultation => "consultations",
    Vaccination => "vaccinations",
    Rappel => "rappels",
);

/// Header row of a record type, taken from its serde field names
fn header_of<T: CsvRecord>() -> Result<StringRecord, RepositoryError> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.serialize(T::default())?;
    let data = writer
        .into_inner()
        .map_err(|e| RepositoryError::Io(e.into_error()))?;
    Ok(ReaderBuilder::new().from_reader(data.as_slice()).headers()?.clone())
}

/// CSV implementation of [`Storage`]
pub struct CsvStorage {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl CsvStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    /// Directory holding the table files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of<T: CsvRecord>(&self) -> PathBuf {
        self.dir.join(format!("{}.csv", T::TABLE))
    }

    fn ensure_file<T: CsvRecord>(&self) -> Result<(), RepositoryError> {
        let path = self.path_of::<T>();
        let missing = match fs::metadata(&path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => return Err(e.into()),
        };
        if missing {
            debug!("Creating {} with header row", path.display());
            self.write_all::<T>(&[])?;
        }
        Ok(())
    }

    fn read_all<T: CsvRecord>(&self) -> Result<Vec<T>, RepositoryError> {
        let path = self.path_of::<T>();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = ReaderBuilder::new().has_headers(true).from_path(&path)?;
        let rows = reader.deserialize().collect::<Result<Vec<T>, _>>()?;
        Ok(rows)
    }

    fn write_all<T: CsvRecord>(&self, rows: &[T]) -> Result<(), RepositoryError> {
        let path = self.path_of::<T>();
        let tmp = path.with_extension("csv.tmp");
        {
            let mut writer = WriterBuilder::new().has_headers(false).from_path(&tmp)?;
            writer.write_record(&header_of::<T>()?)?;
            for row in rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn insert<T: CsvRecord>(&self, mut record: T) -> Result<T, RepositoryError> {
        let mut rows = self.read_all::<T>()?;
        let next_id = rows.iter().map(|r| r.id()).max().unwrap_or(0) + 1;
        record.set_id(next_id);
        rows.push(record.clone());
        self.write_all(&rows)?;
        debug!("Inserted {} row id={}", T::TABLE, next_id);
        Ok(record)
    }

    fn find<T: CsvRecord>(&self, id: i64) -> Result<Option<T>, RepositoryError> {
        Ok(self.read_all::<T>()?.into_iter().find(|r| r.id() == id))
    }

    fn replace<T: CsvRecord>(&self, record: T) -> Result<T, RepositoryError> {
        let mut rows = self.read_all::<T>()?;
        let slot = rows
            .iter_mut()
            .find(|r| r.id() == record.id())
            .ok_or_else(|| RepositoryError::not_found(T::TABLE, record.id()))?;
        *slot = record.clone();
        self.write_all(&rows)?;
        Ok(record)
    }

    /// Apply `change` to row `id`; the file is rewritten only when it returns true
    fn update_where<T: CsvRecord>(&self, id: i64, change: impl FnOnce(&mut T) -> bool) -> Result<bool, RepositoryError> {
        let mut rows = self.read_all::<T>()?;
        let changed = match rows.iter_mut().find(|r| r.id() == id) {
            Some(row) => change(row),
            None => false,
        };
        if changed {
            self.write_all(&rows)?;
        }
        Ok(changed)
    }

    fn retain<T: CsvRecord>(&self, keep: impl Fn(&T) -> bool) -> Result<usize, RepositoryError> {
        let rows = self.read_all::<T>()?;
        let before = rows.len();
        let kept: Vec<T> = rows.into_iter().filter(|r| keep(r)).collect();
        let removed = before - kept.len();
        if removed > 0 {
            self.write_all(&kept)?;
        }
        Ok(removed)
    }

    fn check_sync_code(&self, patiente: &Patiente) -> Result<(), RepositoryError> {
        if let Some(code) = &patiente.sync_code {
            let taken = self
                .read_all::<Patiente>()?
                .iter()
                .any(|p| p.id != patiente.id && p.sync_code.as_deref() == Some(code.as_str()));
            if taken {
                return Err(RepositoryError::Conflict("sync code already in use".to_string()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for CsvStorage {
    fn backend(&self) -> StorageBackend {
        StorageBackend::Csv
    }

    async fn ensure_schema(&self) -> Result<(), RepositoryError> {
        let _guard = self.lock.lock().await;
        fs::create_dir_all(&self.dir)?;
        self.ensure_file::<User>()?;
        self.ensure_file::<Patiente>()?;
        self.ensure_file::<Cpn>()?;
        self.ensure_file::<Consultation>()?;
        self.ensure_file::<Vaccination>()?;
        self.ensure_file::<Rappel>()?;
        info!("CSV storage ready in {}", self.dir.display());
        Ok(())
    }

    async fn create_user(&self, user: User) -> Result<User, RepositoryError> {
        let _guard = self.lock.lock().await;
        if self.read_all::<User>()?.iter().any(|u| u.telephone == user.telephone) {
            return Err(RepositoryError::Conflict(format!(
                "telephone {} is already registered",
                user.telephone
            )));
        }
        self.insert(user)
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, RepositoryError> {
        let _guard = self.lock.lock().await;
        self.find(id)
    }

    async fn find_user_by_telephone(&self, telephone: &str) -> Result<Option<User>, RepositoryError> {
        let _guard = self.lock.lock().await;
        Ok(self
            .read_all::<User>()?
            .into_iter()
            .find(|u| u.telephone == telephone))
    }

    async fn delete_user(&self, id: i64) -> Result<bool, RepositoryError> {
        let _guard = self.lock.lock().await;
        Ok(self.retain::<User>(|u| u.id != id)? > 0)
    }

    async fn create_patiente(&self, patiente: Patiente) -> Result<Patiente, RepositoryError> {
        let _guard = self.lock.lock().await;
        self.check_sync_code(&patiente)?;
        self.insert(patiente)
    }

    async fn get_patiente(&self, id: i64) -> Result<Option<Patiente>, RepositoryError> {
        let _guard = self.lock.lock().await;
        self.find(id)
    }

    async fn list_patientes(&self) -> Result<Vec<Patiente>, RepositoryError> {
        let _guard = self.lock.lock().await;
        self.read_all()
    }

    async fn update_patiente(&self, patiente: Patiente) -> Result<Patiente, RepositoryError> {
        let _guard = self.lock.lock().await;
        self.check_sync_code(&patiente)?;
        self.replace(patiente)
    }

    async fn delete_patiente(&self, id: i64) -> Result<bool, RepositoryError> {
        let _guard = self.lock.lock().await;
        debug!("Deleting patiente {} and dependent rows", id);
        self.retain::<Rappel>(|r| r.patiente_id != id)?;
        self.retain::<Consultation>(|c| c.patiente_id != id)?;
        self.retain::<Vaccination>(|v| v.patiente_id != id)?;
        self.retain::<Cpn>(|c| c.patiente_id != id)?;
        Ok(self.retain::<Patiente>(|p| p.id != id)? > 0)
    }

    async fn find_patiente_by_sync_code(&self, code: &str) -> Result<Option<Patiente>, RepositoryError> {
        let _guard = self.lock.lock().await;
        Ok(self
            .read_all::<Patiente>()?
            .into_iter()
            .find(|p| p.sync_code.as_deref() == Some(code)))
    }

    async fn find_patiente_by_user(&self, user_id: i64) -> Result<Option<Patiente>, RepositoryError> {
        let _guard = self.lock.lock().await;
        Ok(self
            .read_all::<Patiente>()?
            .into_iter()
            .find(|p| p.user_id == Some(user_id)))
    }

    async fn create_cpn(&self, cpn: Cpn) -> Result<Cpn, RepositoryError> {
        let _guard = self.lock.lock().await;
        self.insert(cpn)
    }

    async fn get_cpn(&self, id: i64) -> Result<Option<Cpn>, RepositoryError> {
        let _guard = self.lock.lock().await;
        self.find(id)
    }

    async fn list_cpn(&self, filter: &CpnFilter) -> Result<Vec<Cpn>, RepositoryError> {
        let _guard = self.lock.lock().await;
        let mut rows: Vec<Cpn> = self
            .read_all::<Cpn>()?
            .into_iter()
            .filter(|c| filter.matches(c))
            .collect();
        rows.sort_by(|a, b| a.date_rdv.cmp(&b.date_rdv).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn update_cpn(&self, cpn: Cpn) -> Result<Cpn, RepositoryError> {
        let _guard = self.lock.lock().await;
        self.replace(cpn)
    }

    async fn claim_cpn_reminder(&self, id: i64) -> Result<bool, RepositoryError> {
        let _guard = self.lock.lock().await;
        self.update_where::<Cpn>(id, |cpn| {
            if cpn.rappel_envoye || cpn.statut != CpnStatut::Planifie {
                return false;
            }
            cpn.rappel_envoye = true;
            true
        })
    }

    async fn mark_cpn_missed(&self, id: i64, before: DateTime<Utc>) -> Result<bool, RepositoryError> {
        let _guard = self.lock.lock().await;
        self.update_where::<Cpn>(id, |cpn| {
            if cpn.statut != CpnStatut::Planifie || cpn.date_rdv >= before {
                return false;
            }
            cpn.statut = CpnStatut::Manquee;
            true
        })
    }

    async fn create_consultation(&self, consultation: Consultation) -> Result<Consultation, RepositoryError> {
        let _guard = self.lock.lock().await;
        self.insert(consultation)
    }

    async fn get_consultation(&self, id: i64) -> Result<Option<Consultation>, RepositoryError> {
        let _guard = self.lock.lock().await;
        self.find(id)
    }

    async fn list_consultations(&self, patiente_id: Option<i64>) -> Result<Vec<Consultation>, RepositoryError> {
        let _guard = self.lock.lock().await;
        Ok(self
            .read_all::<Consultation>()?
            .into_iter()
            .filter(|c| patiente_id.map_or(true, |id| c.patiente_id == id))
            .collect())
    }

    async fn create_vaccination(&self, vaccination: Vaccination) -> Result<Vaccination, RepositoryError> {
        let _guard = self.lock.lock().await;
        self.insert(vaccination)
    }

    async fn get_vaccination(&self, id: i64) -> Result<Option<Vaccination>, RepositoryError> {
        let _guard = self.lock.lock().await;
        self.find(id)
    }

    async fn list_vaccinations(&self, patiente_id: Option<i64>) -> Result<Vec<Vaccination>, RepositoryError> {
        let _guard = self.lock.lock().await;
        Ok(self
            .read_all::<Vaccination>()?
            .into_iter()
            .filter(|v| patiente_id.map_or(true, |id| v.patiente_id == id))
            .collect())
    }

    async fn create_rappel(&self, rappel: Rappel) -> Result<Rappel, RepositoryError> {
        let _guard = self.lock.lock().await;
        self.insert(rappel)
    }

    async fn list_rappels(&self, cpn_id: Option<i64>) -> Result<Vec<Rappel>, RepositoryError> {
        let _guard = self.lock.lock().await;
        Ok(self
            .read_all::<Rappel>()?
            .into_iter()
            .filter(|r| cpn_id.map_or(true, |id| r.cpn_id == id))
            .collect())
    }
}
