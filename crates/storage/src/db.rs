use std::path::Path;

use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, QueryBuilder, Sqlite};

use billmap_core::{
    BillingRecord, Client, ClientId, Money, RecordDraft, RecordFilter, RecordStore,
    RecordWithSite, SettingsStore, Site, SiteDirectory, SiteId, UpsertOutcome,
};

pub type DbPool = Pool<Sqlite>;

/// SQLite-backed implementation of the record store, the settings store and
/// the site-directory mirror, all over one pool.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    /// Opens (creating if missing) the database at `path` and applies
    /// migrations.
    pub async fn open(path: &Path) -> Result<SqliteStore, sqlx::Error> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        configure(&pool).await?;
        run_migrations(&pool).await?;

        Ok(SqliteStore { pool })
    }

    /// A throwaway in-memory database, fully migrated. Test use.
    pub async fn open_in_memory() -> Result<SqliteStore, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        configure(&pool).await?;
        run_migrations(&pool).await?;

        Ok(SqliteStore { pool })
    }

    /// Replaces the mirrored site directory wholesale. Nothing here owns a
    /// site; mappings in `billing_records` just point into the mirror.
    pub async fn replace_sites(&self, sites: &[Site]) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM sites").execute(&mut *tx).await?;
        for site in sites {
            sqlx::query("INSERT INTO sites (id, name, url, client_id) VALUES (?, ?, ?, ?)")
                .bind(site.id.0)
                .bind(&site.name)
                .bind(&site.url)
                .bind(site.client_id.0)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await
    }

    /// Replaces the mirrored client list wholesale.
    pub async fn replace_clients(&self, clients: &[Client]) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM clients").execute(&mut *tx).await?;
        for client in clients {
            sqlx::query("INSERT INTO clients (id, name) VALUES (?, ?)")
                .bind(client.id.0)
                .bind(&client.name)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await
    }
}

async fn configure(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(pool)
        .await?;
    sqlx::query("PRAGMA cache_size = -32000")
        .execute(pool)
        .await?;

    Ok(())
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS billing_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            template_name TEXT NOT NULL UNIQUE,
            client_name TEXT NOT NULL DEFAULT '',
            previous_date TEXT NOT NULL,
            next_date TEXT NOT NULL,
            amount_cents INTEGER NOT NULL DEFAULT 0,
            site_id INTEGER NOT NULL DEFAULT 0,
            last_imported INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_billing_records_site_id ON billing_records (site_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sites (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            url TEXT NOT NULL,
            client_id INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS clients (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

type RecordRow = (i64, String, String, NaiveDate, NaiveDate, i64, i64, i64);

fn record_from_row(row: RecordRow) -> BillingRecord {
    BillingRecord {
        id: row.0,
        template_name: row.1,
        client_name: row.2,
        previous_date: row.3,
        next_date: row.4,
        amount: Money::from_cents(row.5),
        site_id: SiteId(row.6),
        last_imported: row.7,
    }
}

impl RecordStore for SqliteStore {
    type Error = sqlx::Error;

    async fn find_by_template(
        &self,
        template_name: &str,
    ) -> Result<Option<BillingRecord>, sqlx::Error> {
        let row = sqlx::query_as::<_, RecordRow>(
            "SELECT id, template_name, client_name, previous_date, next_date, amount_cents, site_id, last_imported
             FROM billing_records WHERE template_name = ?",
        )
        .bind(template_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(record_from_row))
    }

    async fn insert(&self, draft: &RecordDraft) -> Result<i64, sqlx::Error> {
        let row = sqlx::query_as::<_, (i64,)>(
            "INSERT INTO billing_records
                 (template_name, client_name, previous_date, next_date, amount_cents, site_id, last_imported)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(&draft.template_name)
        .bind(&draft.client_name)
        .bind(draft.previous_date)
        .bind(draft.next_date)
        .bind(draft.amount.to_cents())
        .bind(draft.site_id.0)
        .bind(draft.last_imported)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    async fn upsert(&self, draft: &RecordDraft) -> Result<UpsertOutcome, sqlx::Error> {
        // The row is only touched when something actually differs, so the
        // affected-row count doubles as change detection. SQLite counts
        // matched rows otherwise, unlike the MySQL-style semantics callers
        // expect.
        let result = sqlx::query(
            "UPDATE billing_records
             SET client_name = ?, previous_date = ?, next_date = ?,
                 amount_cents = ?, site_id = ?, last_imported = ?
             WHERE template_name = ?
               AND (client_name IS NOT ? OR previous_date IS NOT ? OR next_date IS NOT ?
                    OR amount_cents IS NOT ? OR site_id IS NOT ? OR last_imported IS NOT ?)",
        )
        .bind(&draft.client_name)
        .bind(draft.previous_date)
        .bind(draft.next_date)
        .bind(draft.amount.to_cents())
        .bind(draft.site_id.0)
        .bind(draft.last_imported)
        .bind(&draft.template_name)
        .bind(&draft.client_name)
        .bind(draft.previous_date)
        .bind(draft.next_date)
        .bind(draft.amount.to_cents())
        .bind(draft.site_id.0)
        .bind(draft.last_imported)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            Ok(UpsertOutcome::Changed)
        } else {
            Ok(UpsertOutcome::Unchanged)
        }
    }

    async fn delete_templates_not_in(&self, keep: &[String]) -> Result<u64, sqlx::Error> {
        // An empty keep set means the import processed nothing; deleting on
        // that basis would wipe the table.
        if keep.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; keep.len()].join(", ");
        let sql =
            format!("DELETE FROM billing_records WHERE template_name NOT IN ({placeholders})");

        let mut query = sqlx::query(&sql);
        for template_name in keep {
            query = query.bind(template_name);
        }

        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn query(&self, filter: &RecordFilter) -> Result<Vec<RecordWithSite>, sqlx::Error> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT rec.id, rec.template_name, rec.client_name, rec.previous_date, rec.next_date,
                    rec.amount_cents, rec.site_id, rec.last_imported,
                    site.name, site.url, site.client_id
             FROM billing_records rec
             LEFT JOIN sites site ON rec.site_id = site.id
             WHERE 1 = 1",
        );

        if let Some(client_name) = &filter.client_name {
            builder.push(" AND rec.client_name = ").push_bind(client_name);
        }
        if let Some(site_id) = filter.site_id {
            builder.push(" AND rec.site_id = ").push_bind(site_id.0);
        }
        if let Some(is_mapped) = filter.is_mapped {
            builder.push(if is_mapped {
                " AND rec.site_id > 0"
            } else {
                " AND rec.site_id = 0"
            });
        }
        if let Some(client_id) = filter.client_id {
            builder.push(" AND site.client_id = ").push_bind(client_id.0);
        }
        builder.push(" ORDER BY rec.client_name ASC");

        type JoinedRow = (
            i64,
            String,
            String,
            NaiveDate,
            NaiveDate,
            i64,
            i64,
            i64,
            Option<String>,
            Option<String>,
            Option<i64>,
        );
        let rows: Vec<JoinedRow> = builder.build_query_as().fetch_all(&self.pool).await?;

        Ok(rows
            .into_iter()
            .map(|row| RecordWithSite {
                record: record_from_row((
                    row.0, row.1, row.2, row.3, row.4, row.5, row.6, row.7,
                )),
                site_name: row.8,
                site_url: row.9,
                site_client_id: row.10.map(ClientId),
            })
            .collect())
    }

    async fn set_site_mapping(&self, record_id: i64, site_id: SiteId) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("UPDATE billing_records SET site_id = ? WHERE id = ? AND site_id IS NOT ?")
                .bind(site_id.0)
                .bind(record_id)
                .bind(site_id.0)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }

    async fn mapped_site_ids(&self) -> Result<Vec<SiteId>, sqlx::Error> {
        let rows = sqlx::query_as::<_, (i64,)>(
            "SELECT DISTINCT site_id FROM billing_records WHERE site_id > 0 ORDER BY site_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| SiteId(row.0)).collect())
    }

    async fn client_names(&self) -> Result<Vec<String>, sqlx::Error> {
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT DISTINCT client_name FROM billing_records ORDER BY client_name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| row.0).collect())
    }

    async fn clear_all(&self) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM billing_records")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

impl SettingsStore for SqliteStore {
    type Error = sqlx::Error;

    async fn get_setting(&self, key: &str) -> Result<Option<String>, sqlx::Error> {
        let row = sqlx::query_as::<_, (String,)>("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.0))
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl SiteDirectory for SqliteStore {
    type Error = sqlx::Error;

    async fn sites(&self) -> Result<Vec<Site>, sqlx::Error> {
        // Stable id order; the import mapper's containment pass depends on
        // a consistent ordering between runs.
        let rows = sqlx::query_as::<_, (i64, String, String, i64)>(
            "SELECT id, name, url, client_id FROM sites ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Site {
                id: SiteId(row.0),
                name: row.1,
                url: row.2,
                client_id: ClientId(row.3),
            })
            .collect())
    }

    async fn clients(&self) -> Result<Vec<Client>, sqlx::Error> {
        let rows =
            sqlx::query_as::<_, (i64, String)>("SELECT id, name FROM clients ORDER BY name ASC")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|row| Client {
                id: ClientId(row.0),
                name: row.1,
            })
            .collect())
    }
}
