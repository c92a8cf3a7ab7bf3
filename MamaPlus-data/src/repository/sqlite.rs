//! Relational storage backend on top of the pooled SQLite connection

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{named_params, params, OptionalExtension, Row};
use tracing::{debug, info};

use crate::database::{run_sqlite_migrations, DatabasePool};
use crate::models::{
    Consultation, Cpn, CpnStatut, Patiente, Rappel, RappelCanal, RappelStatut, Role, User,
    Vaccination,
};
use super::errors::RepositoryError;
use super::storage::{CpnFilter, Storage, StorageBackend};

// Enumerations are stored as their lowercase labels.
macro_rules! text_column {
    ($($ty:ty),+ $(,)?) => {$(
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    )+};
}

text_column!(Role, CpnStatut, RappelCanal, RappelStatut);

const CPN_COLUMNS: &str = "id, patiente_id, numero_cpn, date_rdv, semaine_grossesse, statut, lieu, notes, rappel_envoye, created_at";
const CONSULTATION_COLUMNS: &str = "id, patiente_id, cpn_id, date_consultation, poids, tension_arterielle_systolique, tension_arterielle_diastolique, hauteur_uterine, notes, created_at";
const VACCINATION_COLUMNS: &str = "id, patiente_id, type_vaccin, date_vaccination, dose, site_injection, lot, notes, created_at";
const RAPPEL_COLUMNS: &str = "id, cpn_id, patiente_id, canal, message, statut, date_programmee, date_envoi, created_at";

/// SQLite implementation of [`Storage`]
#[derive(Clone)]
pub struct SqliteStorage {
    pool: DatabasePool,
}

impl SqliteStorage {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        telephone: row.get("telephone")?,
        password_hash: row.get("password_hash")?,
        role: row.get("role")?,
        nom: row.get("nom")?,
        prenom: row.get("prenom")?,
        email: row.get("email")?,
        created_at: row.get("created_at")?,
    })
}

fn patiente_from_row(row: &Row<'_>) -> rusqlite::Result<Patiente> {
    Ok(Patiente {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        nom: row.get("nom")?,
        prenom: row.get("prenom")?,
        telephone: row.get("telephone")?,
        age: row.get("age")?,
        gestite: row.get("gestite")?,
        parite: row.get("parite")?,
        niveau_instruction: row.get("niveau_instruction")?,
        langue_preferee: row.get("langue_preferee")?,
        distance_centre: row.get("distance_centre")?,
        moyen_transport: row.get("moyen_transport")?,
        adresse: row.get("adresse")?,
        ville: row.get("ville")?,
        antecedents_medicaux: row.get("antecedents_medicaux")?,
        antecedents_obstetricaux: row.get("antecedents_obstetricaux")?,
        allergies: row.get("allergies")?,
        telephone_urgence: row.get("telephone_urgence")?,
        nom_contact_urgence: row.get("nom_contact_urgence")?,
        date_dernieres_regles: row.get("date_dernieres_regles")?,
        date_accouchement_prevue: row.get("date_accouchement_prevue")?,
        sync_code: row.get("sync_code")?,
        sync_code_expires_at: row.get("sync_code_expires_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn cpn_from_row(row: &Row<'_>) -> rusqlite::Result<Cpn> {
    Ok(Cpn {
        id: row.get("id")?,
        patiente_id: row.get("patiente_id")?,
        numero_cpn: row.get("numero_cpn")?,
        date_rdv: row.get("date_rdv")?,
        semaine_grossesse: row.get("semaine_grossesse")?,
        statut: row.get("statut")?,
        lieu: row.get("lieu")?,
        notes: row.get("notes")?,
        rappel_envoye: row.get("rappel_envoye")?,
        created_at: row.get("created_at")?,
    })
}

fn consultation_from_row(row: &Row<'_>) -> rusqlite::Result<Consultation> {
    Ok(Consultation {
        id: row.get("id")?,
        patiente_id: row.get("patiente_id")?,
        cpn_id: row.get("cpn_id")?,
        date_consultation: row.get("date_consultation")?,
        poids: row.get("poids")?,
        tension_arterielle_systolique: row.get("tension_arterielle_systolique")?,
        tension_arterielle_diastolique: row.get("tension_arterielle_diastolique")?,
        hauteur_uterine: row.get("hauteur_uterine")?,
        notes: row.get("notes")?,
        created_at: row.get("created_at")?,
    })
}

fn vaccination_from_row(row: &Row<'_>) -> rusqlite::Result<Vaccination> {
    Ok(Vaccination {
        id: row.get("id")?,
        patiente_id: row.get("patiente_id")?,
        type_vaccin: row.get("type_vaccin")?,
        date_vaccination: row.get("date_vaccination")?,
        dose: row.get("dose")?,
        site_injection: row.get("site_injection")?,
        lot: row.get("lot")?,
        notes: row.get("notes")?,
        created_at: row.get("created_at")?,
    })
}

fn rappel_from_row(row: &Row<'_>) -> rusqlite::Result<Rappel> {
    Ok(Rappel {
        id: row.get("id")?,
        cpn_id: row.get("cpn_id")?,
        patiente_id: row.get("patiente_id")?,
        canal: row.get("canal")?,
        message: row.get("message")?,
        statut: row.get("statut")?,
        date_programmee: row.get("date_programmee")?,
        date_envoi: row.get("date_envoi")?,
        created_at: row.get("created_at")?,
    })
}

/// Map unique-constraint failures to `Conflict`, everything else stays a SQLite error
fn map_unique(err: rusqlite::Error, what: &str) -> RepositoryError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            RepositoryError::Conflict(what.to_string())
        }
        _ => RepositoryError::Sqlite(err),
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    fn backend(&self) -> StorageBackend {
        StorageBackend::Sqlite
    }

    async fn ensure_schema(&self) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        run_sqlite_migrations(&conn)?;
        info!("SQLite schema ready");
        Ok(())
    }

    async fn create_user(&self, mut user: User) -> Result<User, RepositoryError> {
        debug!("Storing user in database: telephone={}", user.telephone);
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO users (telephone, password_hash, role, nom, prenom, email, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user.telephone,
                user.password_hash,
                user.role,
                user.nom,
                user.prenom,
                user.email,
                user.created_at,
            ],
        )
        .map_err(|e| map_unique(e, &format!("telephone {} is already registered", user.telephone)))?;

        user.id = conn.last_insert_rowid();
        Ok(user)
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, RepositoryError> {
        let conn = self.pool.get()?;
        let user = conn
            .query_row("SELECT * FROM users WHERE id = ?1", [id], user_from_row)
            .optional()?;
        Ok(user)
    }

    async fn find_user_by_telephone(&self, telephone: &str) -> Result<Option<User>, RepositoryError> {
        let conn = self.pool.get()?;
        let user = conn
            .query_row("SELECT * FROM users WHERE telephone = ?1", [telephone], user_from_row)
            .optional()?;
        Ok(user)
    }

    async fn delete_user(&self, id: i64) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let removed = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
        Ok(removed > 0)
    }

    async fn create_patiente(&self, mut patiente: Patiente) -> Result<Patiente, RepositoryError> {
        debug!("Storing patiente in database");
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO patientes (
                user_id, nom, prenom, telephone, age, gestite, parite, niveau_instruction,
                langue_preferee, distance_centre, moyen_transport, adresse, ville,
                antecedents_medicaux, antecedents_obstetricaux, allergies, telephone_urgence,
                nom_contact_urgence, date_dernieres_regles, date_accouchement_prevue,
                sync_code, sync_code_expires_at, created_at, updated_at
            ) VALUES (
                :user_id, :nom, :prenom, :telephone, :age, :gestite, :parite, :niveau_instruction,
                :langue_preferee, :distance_centre, :moyen_transport, :adresse, :ville,
                :antecedents_medicaux, :antecedents_obstetricaux, :allergies, :telephone_urgence,
                :nom_contact_urgence, :date_dernieres_regles, :date_accouchement_prevue,
                :sync_code, :sync_code_expires_at, :created_at, :updated_at
            )",
            named_params! {
                ":user_id": patiente.user_id,
                ":nom": patiente.nom,
                ":prenom": patiente.prenom,
                ":telephone": patiente.telephone,
                ":age": patiente.age,
                ":gestite": patiente.gestite,
                ":parite": patiente.parite,
                ":niveau_instruction": patiente.niveau_instruction,
                ":langue_preferee": patiente.langue_preferee,
                ":distance_centre": patiente.distance_centre,
                ":moyen_transport": patiente.moyen_transport,
                ":adresse": patiente.adresse,
                ":ville": patiente.ville,
                ":antecedents_medicaux": patiente.antecedents_medicaux,
                ":antecedents_obstetricaux": patiente.antecedents_obstetricaux,
                ":allergies": patiente.allergies,
                ":telephone_urgence": patiente.telephone_urgence,
                ":nom_contact_urgence": patiente.nom_contact_urgence,
                ":date_dernieres_regles": patiente.date_dernieres_regles,
                ":date_accouchement_prevue": patiente.date_accouchement_prevue,
                ":sync_code": patiente.sync_code,
                ":sync_code_expires_at": patiente.sync_code_expires_at,
                ":created_at": patiente.created_at,
                ":updated_at": patiente.updated_at,
            },
        )
        .map_err(|e| map_unique(e, "sync code already in use"))?;

        patiente.id = conn.last_insert_rowid();
        Ok(patiente)
    }

    async fn get_patiente(&self, id: i64) -> Result<Option<Patiente>, RepositoryError> {
        let conn = self.pool.get()?;
        let patiente = conn
            .query_row("SELECT * FROM patientes WHERE id = ?1", [id], patiente_from_row)
            .optional()?;
        Ok(patiente)
    }

    async fn list_patientes(&self) -> Result<Vec<Patiente>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT * FROM patientes ORDER BY id")?;
        let rows = stmt.query_map([], patiente_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn update_patiente(&self, patiente: Patiente) -> Result<Patiente, RepositoryError> {
        let conn = self.pool.get()?;
        let changed = conn
            .execute(
                "UPDATE patientes SET
                    user_id = :user_id, nom = :nom, prenom = :prenom, telephone = :telephone,
                    age = :age, gestite = :gestite, parite = :parite,
                    niveau_instruction = :niveau_instruction, langue_preferee = :langue_preferee,
                    distance_centre = :distance_centre, moyen_transport = :moyen_transport,
                    adresse = :adresse, ville = :ville, antecedents_medicaux = :antecedents_medicaux,
                    antecedents_obstetricaux = :antecedents_obstetricaux, allergies = :allergies,
                    telephone_urgence = :telephone_urgence, nom_contact_urgence = :nom_contact_urgence,
                    date_dernieres_regles = :date_dernieres_regles,
                    date_accouchement_prevue = :date_accouchement_prevue,
                    sync_code = :sync_code, sync_code_expires_at = :sync_code_expires_at,
                    updated_at = :updated_at
                 WHERE id = :id",
                named_params! {
                    ":id": patiente.id,
                    ":user_id": patiente.user_id,
                    ":nom": patiente.nom,
                    ":prenom": patiente.prenom,
                    ":telephone": patiente.telephone,
                    ":age": patiente.age,
                    ":gestite": patiente.gestite,
                    ":parite": patiente.parite,
                    ":niveau_instruction": patiente.niveau_instruction,
                    ":langue_preferee": patiente.langue_preferee,
                    ":distance_centre": patiente.distance_centre,
                    ":moyen_transport": patiente.moyen_transport,
                    ":adresse": patiente.adresse,
                    ":ville": patiente.ville,
                    ":antecedents_medicaux": patiente.antecedents_medicaux,
                    ":antecedents_obstetricaux": patiente.antecedents_obstetricaux,
                    ":allergies": patiente.allergies,
                    ":telephone_urgence": patiente.telephone_urgence,
                    ":nom_contact_urgence": patiente.nom_contact_urgence,
                    ":date_dernieres_regles": patiente.date_dernieres_regles,
                    ":date_accouchement_prevue": patiente.date_accouchement_prevue,
                    ":sync_code": patiente.sync_code,
                    ":sync_code_expires_at": patiente.sync_code_expires_at,
                    ":updated_at": patiente.updated_at,
                },
            )
            .map_err(|e| map_unique(e, "sync code already in use"))?;

        if changed == 0 {
            return Err(RepositoryError::not_found("patiente", patiente.id));
        }
        Ok(patiente)
    }

    async fn delete_patiente(&self, id: i64) -> Result<bool, RepositoryError> {
        debug!("Deleting patiente {} and dependent records", id);
        let mut conn = self.pool.get()?;
        // Explicit cascade keeps the result independent of the foreign_keys pragma.
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM rappels WHERE patiente_id = ?1", [id])?;
        tx.execute("DELETE FROM consultations WHERE patiente_id = ?1", [id])?;
        tx.execute("DELETE FROM vaccinations WHERE patiente_id = ?1", [id])?;
        tx.execute("DELETE FROM cpn WHERE patiente_id = ?1", [id])?;
        let deleted = tx.execute("DELETE FROM patientes WHERE id = ?1", [id])?;
        tx.commit()?;
        Ok(deleted > 0)
    }

    async fn find_patiente_by_sync_code(&self, code: &str) -> Result<Option<Patiente>, RepositoryError> {
        let conn = self.pool.get()?;
        let patiente = conn
            .query_row("SELECT * FROM patientes WHERE sync_code = ?1", [code], patiente_from_row)
            .optional()?;
        Ok(patiente)
    }

    async fn find_patiente_by_user(&self, user_id: i64) -> Result<Option<Patiente>, RepositoryError> {
        let conn = self.pool.get()?;
        let patiente = conn
            .query_row(
                "SELECT * FROM patientes WHERE user_id = ?1 ORDER BY id LIMIT 1",
                [user_id],
                patiente_from_row,
            )
            .optional()?;
        Ok(patiente)
    }

    async fn create_cpn(&self, mut cpn: Cpn) -> Result<Cpn, RepositoryError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO cpn (patiente_id, numero_cpn, date_rdv, semaine_grossesse, statut, lieu, notes, rappel_envoye, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                cpn.patiente_id,
                cpn.numero_cpn,
                cpn.date_rdv,
                cpn.semaine_grossesse,
                cpn.statut,
                cpn.lieu,
                cpn.notes,
                cpn.rappel_envoye,
                cpn.created_at,
            ],
        )?;
        cpn.id = conn.last_insert_rowid();
        Ok(cpn)
    }

    async fn get_cpn(&self, id: i64) -> Result<Option<Cpn>, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!("SELECT {} FROM cpn WHERE id = ?1", CPN_COLUMNS);
        Ok(conn.query_row(&sql, [id], cpn_from_row).optional()?)
    }

    async fn list_cpn(&self, filter: &CpnFilter) -> Result<Vec<Cpn>, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT {} FROM cpn
             WHERE (?1 IS NULL OR patiente_id = ?1) AND (?2 IS NULL OR statut = ?2)
             ORDER BY date_rdv, id",
            CPN_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![filter.patiente_id, filter.statut], cpn_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn update_cpn(&self, cpn: Cpn) -> Result<Cpn, RepositoryError> {
        let conn = self.pool.get()?;
        let changed = conn.execute(
            "UPDATE cpn SET numero_cpn = ?2, date_rdv = ?3, semaine_grossesse = ?4, statut = ?5,
                lieu = ?6, notes = ?7, rappel_envoye = ?8
             WHERE id = ?1",
            params![
                cpn.id,
                cpn.numero_cpn,
                cpn.date_rdv,
                cpn.semaine_grossesse,
                cpn.statut,
                cpn.lieu,
                cpn.notes,
                cpn.rappel_envoye,
            ],
        )?;
        if changed == 0 {
            return Err(RepositoryError::not_found("cpn", cpn.id));
        }
        Ok(cpn)
    }

    async fn claim_cpn_reminder(&self, id: i64) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let changed = conn.execute(
            "UPDATE cpn SET rappel_envoye = 1 WHERE id = ?1 AND rappel_envoye = 0 AND statut = ?2",
            params![id, CpnStatut::Planifie],
        )?;
        Ok(changed > 0)
    }

    async fn mark_cpn_missed(&self, id: i64, before: DateTime<Utc>) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let changed = conn.execute(
            "UPDATE cpn SET statut = ?2 WHERE id = ?1 AND statut = ?3 AND date_rdv < ?4",
            params![id, CpnStatut::Manquee, CpnStatut::Planifie, before],
        )?;
        Ok(changed > 0)
    }

    async fn create_consultation(&self, mut consultation: Consultation) -> Result<Consultation, RepositoryError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO consultations (patiente_id, cpn_id, date_consultation, poids,
                tension_arterielle_systolique, tension_arterielle_diastolique, hauteur_uterine, notes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                consultation.patiente_id,
                consultation.cpn_id,
                consultation.date_consultation,
                consultation.poids,
                consultation.tension_arterielle_systolique,
                consultation.tension_arterielle_diastolique,
                consultation.hauteur_uterine,
                consultation.notes,
                consultation.created_at,
            ],
        )?;
        consultation.id = conn.last_insert_rowid();
        Ok(consultation)
    }

    async fn get_consultation(&self, id: i64) -> Result<Option<Consultation>, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!("SELECT {} FROM consultations WHERE id = ?1", CONSULTATION_COLUMNS);
        Ok(conn.query_row(&sql, [id], consultation_from_row).optional()?)
    }

    async fn list_consultations(&self, patiente_id: Option<i64>) -> Result<Vec<Consultation>, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT {} FROM consultations WHERE (?1 IS NULL OR patiente_id = ?1) ORDER BY id",
            CONSULTATION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([patiente_id], consultation_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn create_vaccination(&self, mut vaccination: Vaccination) -> Result<Vaccination, RepositoryError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO vaccinations (patiente_id, type_vaccin, date_vaccination, dose, site_injection, lot, notes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                vaccination.patiente_id,
                vaccination.type_vaccin,
                vaccination.date_vaccination,
                vaccination.dose,
                vaccination.site_injection,
                vaccination.lot,
                vaccination.notes,
                vaccination.created_at,
            ],
        )?;
        vaccination.id = conn.last_insert_rowid();
        Ok(vaccination)
    }

    async fn get_vaccination(&self, id: i64) -> Result<Option<Vaccination>, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!("SELECT {} FROM vaccinations WHERE id = ?1", VACCINATION_COLUMNS);
        Ok(conn.query_row(&sql, [id], vaccination_from_row).optional()?)
    }

    async fn list_vaccinations(&self, patiente_id: Option<i64>) -> Result<Vec<Vaccination>, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT {} FROM vaccinations WHERE (?1 IS NULL OR patiente_id = ?1) ORDER BY id",
            VACCINATION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([patiente_id], vaccination_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn create_rappel(&self, mut rappel: Rappel) -> Result<Rappel, RepositoryError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO rappels (cpn_id, patiente_id, canal, message, statut, date_programmee, date_envoi, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                rappel.cpn_id,
                rappel.patiente_id,
                rappel.canal,
                rappel.message,
                rappel.statut,
                rappel.date_programmee,
                rappel.date_envoi,
                rappel.created_at,
            ],
        )?;
        rappel.id = conn.last_insert_rowid();
        Ok(rappel)
    }

    async fn list_rappels(&self, cpn_id: Option<i64>) -> Result<Vec<Rappel>, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT {} FROM rappels WHERE (?1 IS NULL OR cpn_id = ?1) ORDER BY id",
            RAPPEL_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([cpn_id], rappel_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
