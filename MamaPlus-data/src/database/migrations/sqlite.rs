use rusqlite::Connection;
use tracing::{debug, info};

use crate::database::DatabaseError;

/// Tables in creation order; children reference parents declared before them
const TABLES: &[(&str, &str)] = &[
    (
        "users",
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            telephone TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL,
            nom TEXT,
            prenom TEXT,
            email TEXT,
            created_at TEXT NOT NULL
        )",
    ),
    (
        "patientes",
        "CREATE TABLE IF NOT EXISTS patientes (
            id INTEGER PRIMARY KEY,
            user_id INTEGER REFERENCES users (id) ON DELETE SET NULL,
            nom TEXT,
            prenom TEXT,
            telephone TEXT,
            age INTEGER NOT NULL,
            gestite INTEGER NOT NULL DEFAULT 1,
            parite INTEGER NOT NULL DEFAULT 0,
            niveau_instruction TEXT,
            langue_preferee TEXT NOT NULL DEFAULT 'fr',
            distance_centre REAL,
            moyen_transport TEXT,
            adresse TEXT,
            ville TEXT,
            antecedents_medicaux TEXT,
            antecedents_obstetricaux TEXT,
            allergies TEXT,
            telephone_urgence TEXT,
            nom_contact_urgence TEXT,
            date_dernieres_regles TEXT,
            date_accouchement_prevue TEXT,
            sync_code TEXT UNIQUE,
            sync_code_expires_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    ),
    (
        "cpn",
        "CREATE TABLE IF NOT EXISTS cpn (
            id INTEGER PRIMARY KEY,
            patiente_id INTEGER NOT NULL REFERENCES patientes (id) ON DELETE CASCADE,
            numero_cpn INTEGER NOT NULL,
            date_rdv TEXT NOT NULL,
            semaine_grossesse INTEGER,
            statut TEXT NOT NULL,
            lieu TEXT,
            notes TEXT,
            rappel_envoye INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
    ),
    (
        "consultations",
        "CREATE TABLE IF NOT EXISTS consultations (
            id INTEGER PRIMARY KEY,
            patiente_id INTEGER NOT NULL REFERENCES patientes (id) ON DELETE CASCADE,
            cpn_id INTEGER REFERENCES cpn (id) ON DELETE SET NULL,
            date_consultation TEXT NOT NULL,
            poids REAL,
            tension_arterielle_systolique INTEGER,
            tension_arterielle_diastolique INTEGER,
            hauteur_uterine REAL,
            notes TEXT,
            created_at TEXT NOT NULL
        )",
    ),
    (
        "vaccinations",
        "CREATE TABLE IF NOT EXISTS vaccinations (
            id INTEGER PRIMARY KEY,
            patiente_id INTEGER NOT NULL REFERENCES patientes (id) ON DELETE CASCADE,
            type_vaccin TEXT NOT NULL,
            date_vaccination TEXT NOT NULL,
            dose TEXT,
            site_injection TEXT,
            lot TEXT,
            notes TEXT,
            created_at TEXT NOT NULL
        )",
    ),
    (
        "rappels",
        "CREATE TABLE IF NOT EXISTS rappels (
            id INTEGER PRIMARY KEY,
            cpn_id INTEGER NOT NULL REFERENCES cpn (id) ON DELETE CASCADE,
            patiente_id INTEGER NOT NULL REFERENCES patientes (id) ON DELETE CASCADE,
            canal TEXT NOT NULL,
            message TEXT NOT NULL,
            statut TEXT NOT NULL,
            date_programmee TEXT NOT NULL,
            date_envoi TEXT,
            created_at TEXT NOT NULL
        )",
    ),
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_cpn_patiente ON cpn (patiente_id)",
    "CREATE INDEX IF NOT EXISTS idx_cpn_statut_date ON cpn (statut, date_rdv)",
    "CREATE INDEX IF NOT EXISTS idx_consultations_patiente ON consultations (patiente_id)",
    "CREATE INDEX IF NOT EXISTS idx_vaccinations_patiente ON vaccinations (patiente_id)",
    "CREATE INDEX IF NOT EXISTS idx_rappels_cpn ON rappels (cpn_id)",
];

/// Run SQLite migrations
///
/// Every statement is create-if-absent, so running this on an existing
/// database is a no-op.
pub fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    info!("Running SQLite migrations");

    for (table, ddl) in TABLES {
        debug!("Creating {} table if not exists", table);
        conn.execute(ddl, [])
            .map_err(|e| DatabaseError::MigrationError(format!("table {}: {}", table, e)))?;
    }

    for ddl in INDEXES {
        conn.execute(ddl, [])
            .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;
    }

    info!("SQLite migrations completed successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<String>, _>>()
            .unwrap()
    }

    #[test]
    fn test_migrations_create_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let names = table_names(&conn);
        for (table, _) in TABLES {
            assert!(names.iter().any(|n| n == table), "missing table {}", table);
        }
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn.execute(
            "INSERT INTO users (telephone, password_hash, role, created_at)
             VALUES ('770000000', 'x', 'admin', '2024-01-01T00:00:00Z')",
            [],
        )
        .unwrap();

        run_migrations(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
