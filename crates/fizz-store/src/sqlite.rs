//! SQLite-based store implementation.

use async_trait::async_trait;
use chrono::NaiveDate;
use fizz_core::{
    BalanceEntry, BalanceStore, Company, CompanyDirectory, CvmCode, EntryQuery, FizzError, Page,
    PageRequest, PriceSource, Quote, Result, StatementType,
};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, instrument};

/// Maps a database failure to the error class callers may retry.
fn unavailable(e: impl std::fmt::Display) -> FizzError {
    FizzError::StoreUnavailable(e.to_string())
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| FizzError::Parse(format!("Invalid date {:?}: {}", s, e)))
}

fn page_bound(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Raw `balance` row before statement and date parsing.
type BalanceRow = (
    u32,
    Option<String>,
    Option<String>,
    String,
    String,
    String,
    String,
    Option<f64>,
);

fn balance_from_row(row: BalanceRow) -> Result<BalanceEntry> {
    let (cvm_code, cnpj, company_name, statement, category, subcategory, period_end, value) = row;
    Ok(BalanceEntry {
        cvm_code: CvmCode::new(cvm_code),
        cnpj,
        company_name,
        statement: statement.parse::<StatementType>()?,
        category,
        subcategory,
        period_end: parse_date(&period_end)?,
        value,
    })
}

fn read_balance_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BalanceRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

/// SQLite-backed balance store, company directory and price source.
///
/// The primary key of the `balance` table is the uniqueness slot of an entry,
/// so writes use `INSERT OR REPLACE` and a re-filing overwrites the old value.
/// All access goes through one connection guarded by a mutex.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or schema creation fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(unavailable)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create an in-memory store.
    ///
    /// Useful for testing; data is lost when the store is dropped.
    ///
    /// # Errors
    /// Returns an error if schema creation fails.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(unavailable)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(unavailable)
    }

    /// Initialize the database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS company (
                cvm_code INTEGER PRIMARY KEY,
                cnpj TEXT NOT NULL,
                legal_name TEXT NOT NULL,
                data_json TEXT NOT NULL
            )",
            [],
        )
        .map_err(unavailable)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS balance (
                cvm_code INTEGER NOT NULL,
                cnpj TEXT,
                company_name TEXT,
                statement TEXT NOT NULL,
                category TEXT NOT NULL,
                subcategory TEXT NOT NULL,
                period_end TEXT NOT NULL,
                value REAL,
                PRIMARY KEY (cvm_code, statement, category, subcategory, period_end)
            )",
            [],
        )
        .map_err(unavailable)?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_balance_code_period
             ON balance(cvm_code, period_end)",
            [],
        )
        .map_err(unavailable)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS quote (
                cvm_code INTEGER NOT NULL,
                quoted_on TEXT NOT NULL,
                price REAL NOT NULL,
                shares_outstanding REAL NOT NULL,
                PRIMARY KEY (cvm_code, quoted_on)
            )",
            [],
        )
        .map_err(unavailable)?;

        debug!("SQLite store schema initialized");
        Ok(())
    }

    /// Inserts or replaces balance entries in one transaction.
    ///
    /// Returns the number of rows written.
    ///
    /// # Errors
    /// Returns [`FizzError::StoreUnavailable`] if the write fails.
    #[instrument(skip(self, entries), fields(count = entries.len()))]
    pub fn upsert_entries(&self, entries: &[BalanceEntry]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction().map_err(unavailable)?;

        for entry in entries {
            tx.execute(
                "INSERT OR REPLACE INTO balance
                 (cvm_code, cnpj, company_name, statement, category, subcategory, period_end, value)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    entry.cvm_code.get(),
                    entry.cnpj,
                    entry.company_name,
                    entry.statement.code(),
                    entry.category,
                    entry.subcategory,
                    entry.period_end.to_string(),
                    entry.value
                ],
            )
            .map_err(unavailable)?;
        }

        tx.commit().map_err(unavailable)?;
        debug!("Stored {} balance entries", entries.len());
        Ok(entries.len())
    }

    /// Inserts or replaces a company.
    ///
    /// # Errors
    /// Returns an error if the company cannot be serialized or written.
    pub fn upsert_company(&self, company: &Company) -> Result<()> {
        let data_json =
            serde_json::to_string(company).map_err(|e| FizzError::Parse(e.to_string()))?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO company (cvm_code, cnpj, legal_name, data_json)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                company.cvm_code.get(),
                company.cnpj,
                company.legal_name,
                data_json
            ],
        )
        .map_err(unavailable)?;
        Ok(())
    }

    /// Inserts or replaces the quote of a company for one date.
    ///
    /// # Errors
    /// Returns [`FizzError::StoreUnavailable`] if the write fails.
    pub fn upsert_quote(&self, quote: &Quote) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO quote (cvm_code, quoted_on, price, shares_outstanding)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                quote.cvm_code.get(),
                quote.quoted_on.to_string(),
                quote.price,
                quote.shares_outstanding
            ],
        )
        .map_err(unavailable)?;
        Ok(())
    }
}

#[async_trait]
impl BalanceStore for SqliteStore {
    #[instrument(skip(self), fields(cvm_code = %query.cvm_code))]
    async fn find_entries(&self, query: &EntryQuery) -> Result<Vec<BalanceEntry>> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare(
                "SELECT cvm_code, cnpj, company_name, statement, category, subcategory, period_end, value
                 FROM balance
                 WHERE cvm_code = ?1
                   AND (?2 IS NULL OR statement = ?2)
                   AND (?3 IS NULL OR category = ?3)
                   AND (?4 IS NULL OR subcategory = ?4)
                   AND (?5 IS NULL OR period_end >= ?5)
                   AND (?6 IS NULL OR period_end <= ?6)
                 ORDER BY period_end ASC, statement ASC, category ASC, subcategory ASC",
            )
            .map_err(unavailable)?;

        let rows = stmt
            .query_map(
                params![
                    query.cvm_code.get(),
                    query.statement.map(|s| s.code()),
                    query.category,
                    query.subcategory,
                    query.period.start.map(|d| d.to_string()),
                    query.period.end.map(|d| d.to_string())
                ],
                read_balance_row,
            )
            .map_err(unavailable)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(balance_from_row(row.map_err(unavailable)?)?);
        }

        debug!("Found {} balance entries", entries.len());
        Ok(entries)
    }

    async fn list_entries(&self, request: PageRequest) -> Result<Page<BalanceEntry>> {
        let conn = self.lock()?;

        let total: i64 = conn
            .query_row("SELECT COUNT(*) FROM balance", [], |row| row.get(0))
            .map_err(unavailable)?;

        let mut stmt = conn
            .prepare(
                "SELECT cvm_code, cnpj, company_name, statement, category, subcategory, period_end, value
                 FROM balance
                 ORDER BY cvm_code ASC, statement ASC, period_end ASC, category ASC, subcategory ASC
                 LIMIT ?1 OFFSET ?2",
            )
            .map_err(unavailable)?;

        let rows = stmt
            .query_map(
                params![page_bound(request.size), page_bound(request.offset())],
                read_balance_row,
            )
            .map_err(unavailable)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(balance_from_row(row.map_err(unavailable)?)?);
        }

        Ok(Page {
            items,
            request,
            total: usize::try_from(total).unwrap_or_default(),
        })
    }
}

#[async_trait]
impl CompanyDirectory for SqliteStore {
    #[instrument(skip(self), fields(cvm_code = %cvm_code))]
    async fn find_company(&self, cvm_code: CvmCode) -> Result<Option<Company>> {
        let conn = self.lock()?;

        let result = conn
            .query_row(
                "SELECT data_json FROM company WHERE cvm_code = ?1",
                params![cvm_code.get()],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(unavailable)?;

        match result {
            Some(json) => {
                let company: Company =
                    serde_json::from_str(&json).map_err(|e| FizzError::Parse(e.to_string()))?;
                Ok(Some(company))
            }
            None => {
                debug!("Company not in directory");
                Ok(None)
            }
        }
    }

    async fn list_companies(&self, request: PageRequest) -> Result<Page<Company>> {
        let conn = self.lock()?;

        let total: i64 = conn
            .query_row("SELECT COUNT(*) FROM company", [], |row| row.get(0))
            .map_err(unavailable)?;

        let mut stmt = conn
            .prepare(
                "SELECT data_json FROM company
                 ORDER BY cvm_code ASC
                 LIMIT ?1 OFFSET ?2",
            )
            .map_err(unavailable)?;

        let rows = stmt
            .query_map(
                params![page_bound(request.size), page_bound(request.offset())],
                |row| row.get::<_, String>(0),
            )
            .map_err(unavailable)?;

        let mut items = Vec::new();
        for row in rows {
            let json = row.map_err(unavailable)?;
            items.push(serde_json::from_str(&json).map_err(|e| FizzError::Parse(e.to_string()))?);
        }

        Ok(Page {
            items,
            request,
            total: usize::try_from(total).unwrap_or_default(),
        })
    }
}

#[async_trait]
impl PriceSource for SqliteStore {
    #[instrument(skip(self), fields(cvm_code = %cvm_code))]
    async fn latest_quote(
        &self,
        cvm_code: CvmCode,
        as_of: Option<NaiveDate>,
    ) -> Result<Option<Quote>> {
        let conn = self.lock()?;

        let row = conn
            .query_row(
                "SELECT quoted_on, price, shares_outstanding FROM quote
                 WHERE cvm_code = ?1 AND (?2 IS NULL OR quoted_on <= ?2)
                 ORDER BY quoted_on DESC
                 LIMIT 1",
                params![cvm_code.get(), as_of.map(|d| d.to_string())],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, f64>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(unavailable)?;

        row.map(|(quoted_on, price, shares)| {
            Ok(Quote::new(cvm_code, price, shares, parse_date(&quoted_on)?))
        })
        .transpose()
    }
}
