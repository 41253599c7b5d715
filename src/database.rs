use crate::error::{AppError, Result};
use crate::models::Record;
use crate::remote::RemoteStore;

/// [`RemoteStore`] backed by libsql: a hosted database over the network, or a
/// local database file during development.
#[derive(Debug)]
pub struct DB {
    conn: libsql::Connection,
}

impl DB {
    /// Connect to `url` and make sure the schema exists.
    ///
    /// `libsql://`, `http://` and `https://` URLs open a remote connection
    /// authenticated with `auth_token`; anything else is a local file path.
    pub async fn connect(url: &str, auth_token: &str) -> Result<Self> {
        let db = if is_remote_url(url) {
            tracing::info!(url, "Connecting to remote database");
            libsql::Builder::new_remote(url.to_string(), auth_token.to_string())
                .build()
                .await?
        } else {
            tracing::info!(path = url, "Opening local database file");
            libsql::Builder::new_local(url).build().await?
        };
        let conn = db.connect()?;

        let db_instance = Self { conn };
        db_instance.initialize_schema().await?;

        Ok(db_instance)
    }

    async fn initialize_schema(&self) -> Result<()> {
        let schema = include_str!("../schema.sql");
        self.conn.execute_batch(schema).await?;
        Ok(())
    }
}

fn is_remote_url(url: &str) -> bool {
    ["libsql://", "http://", "https://", "wss://", "ws://"]
        .iter()
        .any(|scheme| url.starts_with(scheme))
}

fn select_all_sql<E: Record>() -> String {
    format!(
        "SELECT {} FROM {} ORDER BY timestamp DESC",
        E::COLUMNS.join(", "),
        E::KIND.table()
    )
}

fn upsert_sql<E: Record>() -> String {
    let placeholders = vec!["?"; E::COLUMNS.len()].join(", ");
    format!(
        "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
        E::KIND.table(),
        E::COLUMNS.join(", "),
        placeholders
    )
}

impl RemoteStore for DB {
    async fn fetch_all<E: Record>(&self) -> Result<Vec<E>> {
        let mut rows = self.conn.query(&select_all_sql::<E>(), ()).await?;
        let mut entries = Vec::new();

        while let Some(row) = rows.next().await? {
            let columns = (0..E::COLUMNS.len())
                .map(|i| row.get::<String>(i as i32))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            entries.push(E::from_columns(columns)?);
        }
        Ok(entries)
    }

    async fn upsert<E: Record>(&self, entry: &E) -> Result<()> {
        self.conn
            .execute(
                &upsert_sql::<E>(),
                libsql::params_from_iter(entry.to_columns()),
            )
            .await?;
        Ok(())
    }

    async fn delete<E: Record>(&self, id: &str) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE id = ?", E::KIND.table());
        self.conn.execute(&sql, [id.to_string()]).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.conn
            .query("SELECT 1", ())
            .await?
            .next()
            .await?
            .ok_or(AppError::Database(libsql::Error::QueryReturnedNoRows))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExpenseEntry, IncomeEntry, PaymentMethod, VehicleSize};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    async fn temp_db(dir: &tempfile::TempDir) -> DB {
        let path = dir.path().join("carwash.db");
        DB::connect(path.to_str().unwrap(), "").await.unwrap()
    }

    fn expense(id: &str, hour: u32) -> ExpenseEntry {
        ExpenseEntry {
            id: id.to_string(),
            amount: dec!(12.30),
            note: "Shampoo".to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 2, 1, hour, 0, 0).unwrap(),
        }
    }

    #[test]
    fn only_network_urls_are_remote() {
        assert!(is_remote_url("libsql://carwash.turso.io"));
        assert!(is_remote_url("https://db.example.com"));
        assert!(!is_remote_url("carwash.db"));
    }

    #[test]
    fn upsert_sql_lists_every_column() {
        assert_eq!(
            upsert_sql::<ExpenseEntry>(),
            "INSERT OR REPLACE INTO expenses (id, amount, note, timestamp) VALUES (?, ?, ?, ?)"
        );
    }

    #[tokio::test]
    async fn fetch_all_returns_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let db = temp_db(&dir).await;

        db.upsert(&expense("early", 8)).await.unwrap();
        db.upsert(&expense("late", 18)).await.unwrap();
        db.upsert(&expense("noon", 12)).await.unwrap();

        let ids: Vec<String> = db
            .fetch_all::<ExpenseEntry>()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["late", "noon", "early"]);
    }

    #[tokio::test]
    async fn upsert_replaces_and_delete_removes() {
        let dir = tempfile::tempdir().unwrap();
        let db = temp_db(&dir).await;
        let mut wash = IncomeEntry {
            id: "w1".to_string(),
            service_type: "Simple".to_string(),
            vehicle_size: VehicleSize::Medium,
            amount: dec!(40),
            payment_method: PaymentMethod::Pix,
            timestamp: Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap(),
        };

        db.upsert(&wash).await.unwrap();
        wash.amount = dec!(45.50);
        db.upsert(&wash).await.unwrap();

        assert_eq!(db.fetch_all::<IncomeEntry>().await.unwrap(), vec![wash]);

        db.delete::<IncomeEntry>("w1").await.unwrap();
        assert!(db.fetch_all::<IncomeEntry>().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ping_succeeds_on_open_connection() {
        let dir = tempfile::tempdir().unwrap();
        temp_db(&dir).await.ping().await.unwrap();
    }
}
