use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, params, params_from_iter};

use crate::documents::PlayerDocument;
use crate::player::{PlayerId, PlayerRecord};
use crate::store::{PlayerFilter, PlayerStore};

const CACHE_DIR: &str = "transferiq";
const DB_FILE: &str = "players.sqlite";

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(CACHE_DIR));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(DB_FILE))
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS players (
            id TEXT PRIMARY KEY,
            name TEXT NULL,
            team TEXT NOT NULL,
            age INTEGER NULL,
            photo TEXT NULL,
            sentiment_score REAL NULL,
            stats_json TEXT NULL,
            predictions_json TEXT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_players_team ON players(team);
        CREATE INDEX IF NOT EXISTS idx_players_name ON players(name);

        CREATE TABLE IF NOT EXISTS cleanup_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            dry_run INTEGER NOT NULL,
            phases TEXT NOT NULL,
            players_removed INTEGER NOT NULL,
            final_count INTEGER NULL,
            error TEXT NULL
        );
        "#,
    )
    .context("create sqlite schema")?;
    ensure_players_column(conn, "predictions_json", "TEXT NULL")?;
    Ok(())
}

// Databases created before a column existed get it added in place.
fn ensure_players_column(conn: &Connection, column: &str, decl: &str) -> Result<()> {
    let present: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM pragma_table_info('players') WHERE name = ?1",
            params![column],
            |row| row.get(0),
        )
        .context("inspect players table")?;
    if !present {
        conn.execute_batch(&format!("ALTER TABLE players ADD COLUMN {column} {decl};"))
            .with_context(|| format!("add players.{column}"))?;
    }
    Ok(())
}

/// Sqlite-backed player store. Team and age predicates run in SQL, name
/// patterns are applied on the decoded rows.
#[derive(Debug)]
pub struct SqlitePlayerStore {
    conn: Connection,
}

impl SqlitePlayerStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn =
            Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, err)| err)
            .context("close sqlite db")
    }

    pub fn upsert_documents(&mut self, docs: &[PlayerDocument]) -> Result<usize> {
        let tx = self.conn.transaction().context("begin import transaction")?;
        let now = Utc::now().to_rfc3339();
        for doc in docs {
            let stats_json = doc
                .stats
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .context("serialize player stats")?;
            let predictions_json = doc
                .predictions
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .context("serialize player predictions")?;
            tx.execute(
                r#"
                INSERT INTO players (
                    id, name, team, age, photo, sentiment_score, stats_json, predictions_json, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    team = excluded.team,
                    age = excluded.age,
                    photo = excluded.photo,
                    sentiment_score = excluded.sentiment_score,
                    stats_json = excluded.stats_json,
                    predictions_json = excluded.predictions_json,
                    updated_at = excluded.updated_at
                "#,
                params![
                    doc.record.id.as_str(),
                    doc.record.name,
                    doc.record.team,
                    doc.record.age,
                    doc.photo,
                    doc.sentiment_score,
                    stats_json,
                    predictions_json,
                    now,
                ],
            )
            .context("upsert player")?;
        }
        tx.commit().context("commit import transaction")?;
        Ok(docs.len())
    }

    pub fn insert_records(&mut self, records: &[PlayerRecord]) -> Result<usize> {
        let docs = records
            .iter()
            .map(|record| PlayerDocument {
                record: record.clone(),
                photo: None,
                sentiment_score: None,
                stats: None,
                predictions: None,
            })
            .collect::<Vec<_>>();
        self.upsert_documents(&docs)
    }

    pub fn begin_run(&self, dry_run: bool, phases: &str) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO cleanup_runs(started_at, finished_at, dry_run, phases, players_removed, final_count, error)
                 VALUES (?1, NULL, ?2, ?3, 0, NULL, NULL)",
                params![Utc::now().to_rfc3339(), bool_to_i64(dry_run), phases],
            )
            .context("insert cleanup run")?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn finish_run(
        &self,
        run_id: i64,
        players_removed: usize,
        final_count: Option<usize>,
        error: Option<&str>,
    ) -> Result<()> {
        self.conn
            .execute(
                "UPDATE cleanup_runs
                 SET finished_at = ?1, players_removed = ?2, final_count = ?3, error = ?4
                 WHERE run_id = ?5",
                params![
                    Utc::now().to_rfc3339(),
                    players_removed as i64,
                    final_count.map(|n| n as i64),
                    error,
                    run_id
                ],
            )
            .context("update cleanup run")?;
        Ok(())
    }

    pub fn last_run(&self) -> Result<Option<CleanupRunRow>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT run_id, dry_run, phases, players_removed, final_count, error, finished_at
                 FROM cleanup_runs ORDER BY run_id DESC LIMIT 1",
            )
            .context("prepare last run query")?;
        let mut rows = stmt
            .query_map([], |row| {
                Ok(CleanupRunRow {
                    run_id: row.get(0)?,
                    dry_run: row.get::<_, i64>(1)? != 0,
                    phases: row.get(2)?,
                    players_removed: row.get::<_, i64>(3)? as usize,
                    final_count: row.get::<_, Option<i64>>(4)?.map(|n| n as usize),
                    error: row.get(5)?,
                    finished: row.get::<_, Option<String>>(6)?.is_some(),
                })
            })
            .context("query last run")?;
        rows.next().transpose().context("decode cleanup run row")
    }

    fn sql_where(filter: &PlayerFilter) -> (String, Vec<SqlValue>) {
        let mut clauses = Vec::new();
        let mut values = Vec::new();
        if let Some(team) = &filter.team {
            values.push(SqlValue::Text(team.clone()));
            clauses.push(format!("team = ?{}", values.len()));
        }
        if let Some((min, max)) = filter.age_range {
            values.push(SqlValue::Integer(min));
            values.push(SqlValue::Integer(max));
            clauses.push(format!(
                "COALESCE(age, 0) BETWEEN ?{} AND ?{}",
                values.len() - 1,
                values.len()
            ));
        }
        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), values)
        }
    }

    fn needs_row_filter(filter: &PlayerFilter) -> bool {
        filter.name_pattern.is_some() || filter.name_not.is_some() || filter.invalid_name
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleanupRunRow {
    pub run_id: i64,
    pub dry_run: bool,
    pub phases: String,
    pub players_removed: usize,
    pub final_count: Option<usize>,
    pub error: Option<String>,
    pub finished: bool,
}

impl PlayerStore for SqlitePlayerStore {
    fn find(&self, filter: &PlayerFilter) -> Result<Vec<PlayerRecord>> {
        let (where_sql, values) = Self::sql_where(filter);
        let sql = format!("SELECT id, name, team, age FROM players{where_sql} ORDER BY rowid ASC");
        let mut stmt = self.conn.prepare(&sql).context("prepare find players")?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                Ok(PlayerRecord {
                    id: PlayerId::new(row.get::<_, String>(0)?),
                    name: row.get(1)?,
                    team: row.get(2)?,
                    age: row.get(3)?,
                })
            })
            .context("query find players")?;

        let mut out = Vec::new();
        for row in rows {
            let player = row.context("decode player row")?;
            // sqlite has no REGEXP and TRIM only strips spaces.
            if filter.matches(&player) {
                out.push(player);
            }
        }
        Ok(out)
    }

    fn delete_by_id(&mut self, id: &PlayerId) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM players WHERE id = ?1", params![id.as_str()])
            .with_context(|| format!("delete player {id}"))?;
        Ok(changed > 0)
    }

    fn delete_many(&mut self, filter: &PlayerFilter) -> Result<usize> {
        let ids = self
            .find(filter)?
            .into_iter()
            .map(|p| p.id)
            .collect::<Vec<_>>();
        let tx = self.conn.transaction().context("begin delete transaction")?;
        let mut removed = 0usize;
        for id in &ids {
            removed += tx
                .execute("DELETE FROM players WHERE id = ?1", params![id.as_str()])
                .with_context(|| format!("delete player {id}"))?;
        }
        tx.commit().context("commit delete transaction")?;
        Ok(removed)
    }

    fn count(&self, filter: &PlayerFilter) -> Result<usize> {
        if Self::needs_row_filter(filter) {
            return Ok(self.find(filter)?.len());
        }
        let (where_sql, values) = Self::sql_where(filter);
        let sql = format!("SELECT COUNT(*) FROM players{where_sql}");
        let count = self
            .conn
            .query_row(&sql, params_from_iter(values.iter()), |row| {
                row.get::<_, i64>(0)
            })
            .context("count players")?;
        Ok(count as usize)
    }
}

fn bool_to_i64(v: bool) -> i64 {
    if v { 1 } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> SqlitePlayerStore {
        let mut store = SqlitePlayerStore::open_in_memory().unwrap();
        store
            .insert_records(&[
                PlayerRecord::new("a", "Joao Silva", "X", Some(24)),
                PlayerRecord::new("b", "J. Silva", "X", Some(24)),
                PlayerRecord::new("c", "Luka Modric", "Y", None),
                PlayerRecord::new("d", " ", "Y", Some(38)),
            ])
            .unwrap();
        store
    }

    #[test]
    fn find_keeps_insert_order_and_pushes_team_age_into_sql() {
        let store = seeded();
        let all = store.find(&PlayerFilter::all()).unwrap();
        let ids = all.iter().map(|p| p.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);

        let x = store
            .find(&PlayerFilter::all().in_team("X").aged_between(23, 25))
            .unwrap();
        assert_eq!(x.len(), 2);

        let no_age = store.find(&PlayerFilter::all().aged_between(0, 0)).unwrap();
        assert_eq!(no_age.len(), 1);
        assert_eq!(no_age[0].id.as_str(), "c");
    }

    #[test]
    fn count_with_and_without_row_filter() {
        let store = seeded();
        assert_eq!(store.count(&PlayerFilter::all()).unwrap(), 4);
        assert_eq!(store.count(&PlayerFilter::invalid_names()).unwrap(), 1);
        let abbreviated =
            PlayerFilter::with_regex(crate::player::abbreviated_name_pattern().clone());
        assert_eq!(store.count(&abbreviated).unwrap(), 1);
    }

    #[test]
    fn deletes_report_changes() {
        let mut store = seeded();
        assert!(store.delete_by_id(&PlayerId::new("a")).unwrap());
        assert!(!store.delete_by_id(&PlayerId::new("a")).unwrap());
        assert_eq!(store.delete_many(&PlayerFilter::invalid_names()).unwrap(), 1);
        assert_eq!(store.count(&PlayerFilter::all()).unwrap(), 2);
    }

    #[test]
    fn import_keeps_predictions_json() {
        let mut store = SqlitePlayerStore::open_in_memory().unwrap();
        let docs = crate::documents::parse_player_documents_json(
            r#"[{"_id": "p1", "name": "Bukayo Saka", "team": "Arsenal",
                 "predictions": [{"season": "2025", "value": 95.0}]}]"#,
        )
        .unwrap();
        store.upsert_documents(&docs).unwrap();
        let raw: Option<String> = store
            .conn
            .query_row(
                "SELECT predictions_json FROM players WHERE id = 'p1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw.unwrap()).unwrap();
        assert_eq!(value[0]["season"], "2025");
    }

    #[test]
    fn schema_upgrade_adds_predictions_column() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE players (id TEXT PRIMARY KEY, name TEXT NULL, team TEXT NOT NULL,
             age INTEGER NULL, photo TEXT NULL, sentiment_score REAL NULL,
             stats_json TEXT NULL, updated_at TEXT NOT NULL);",
        )
        .unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        let mut store = SqlitePlayerStore { conn };
        store
            .insert_records(&[PlayerRecord::new("a", "Pedri", "Barcelona", Some(22))])
            .unwrap();
        assert_eq!(store.count(&PlayerFilter::all()).unwrap(), 1);
    }

    #[test]
    fn cleanup_runs_are_recorded() {
        let store = seeded();
        let run_id = store.begin_run(true, "1,2,3,4").unwrap();
        let open = store.last_run().unwrap().unwrap();
        assert_eq!(open.run_id, run_id);
        assert!(!open.finished);

        store.finish_run(run_id, 2, Some(4), None).unwrap();
        let done = store.last_run().unwrap().unwrap();
        assert!(done.finished);
        assert!(done.dry_run);
        assert_eq!(done.players_removed, 2);
        assert_eq!(done.final_count, Some(4));
        assert_eq!(done.error, None);
    }
}
