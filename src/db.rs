use std::path::Path;

use anyhow::Result;
use rusqlite::Connection;

use crate::parser::classify::SummaryRecord;
use crate::report::RunReport;

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- One row per gazette issue, keyed like the extracted file name
        CREATE TABLE IF NOT EXISTS summaries (
            date_publication TEXT PRIMARY KEY,
            title            TEXT NOT NULL,
            nb_decrets       INTEGER NOT NULL,
            decrets          TEXT NOT NULL,
            nb_arretes       INTEGER NOT NULL,
            arretes          TEXT NOT NULL,
            nb_circulaires   INTEGER NOT NULL,
            circulaires      TEXT NOT NULL,
            nb_autres        INTEGER NOT NULL,
            autres           TEXT NOT NULL,
            run_id           TEXT NOT NULL,
            created_at       TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS run_failures (
            id         INTEGER PRIMARY KEY,
            run_id     TEXT NOT NULL,
            stage      TEXT NOT NULL,
            item       TEXT NOT NULL,
            reason     TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_failures_run ON run_failures(run_id);
        ",
    )?;
    Ok(())
}

// ── Summaries ──

pub fn save_summaries(conn: &Connection, run_id: &str, records: &[SummaryRecord]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO summaries
             (date_publication, title, nb_decrets, decrets, nb_arretes, arretes,
              nb_circulaires, circulaires, nb_autres, autres, run_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )?;
        for r in records {
            stmt.execute(rusqlite::params![
                r.date_publication,
                r.title,
                r.nb_decrets,
                serde_json::to_string(&r.decrets)?,
                r.nb_arretes,
                serde_json::to_string(&r.arretes)?,
                r.nb_circulaires,
                serde_json::to_string(&r.circulaires)?,
                r.nb_autres,
                serde_json::to_string(&r.autres)?,
                run_id,
            ])?;
        }
    }
    tx.commit()?;
    Ok(records.len())
}

pub fn save_failures(conn: &Connection, report: &RunReport) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO run_failures (run_id, stage, item, reason) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for f in report.failures() {
            stmt.execute(rusqlite::params![report.run_id(), f.stage.as_str(), f.item, f.reason])?;
        }
    }
    tx.commit()?;
    Ok(())
}

// ── Overview ──

pub struct OverviewRow {
    pub date_publication: String,
    pub title: String,
    pub nb_decrets: i64,
    pub nb_arretes: i64,
    pub nb_circulaires: i64,
    pub nb_autres: i64,
}

pub fn fetch_overview(conn: &Connection, limit: usize) -> Result<Vec<OverviewRow>> {
    let mut stmt = conn.prepare(
        "SELECT date_publication, title, nb_decrets, nb_arretes, nb_circulaires, nb_autres
         FROM summaries
         ORDER BY date_publication DESC
         LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([limit as i64], |row| {
            Ok(OverviewRow {
                date_publication: row.get(0)?,
                title: row.get(1)?,
                nb_decrets: row.get(2)?,
                nb_arretes: row.get(3)?,
                nb_circulaires: row.get(4)?,
                nb_autres: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Reload a stored record, category lists included.
pub fn fetch_summary(conn: &Connection, date_publication: &str) -> Result<Option<SummaryRecord>> {
    let mut stmt = conn.prepare(
        "SELECT title, date_publication, nb_decrets, decrets, nb_arretes, arretes,
                nb_circulaires, circulaires, nb_autres, autres
         FROM summaries WHERE date_publication = ?1",
    )?;
    let mut rows = stmt.query([date_publication])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };
    let list = |idx: usize| -> Result<Vec<String>> {
        let raw: String = row.get(idx)?;
        Ok(serde_json::from_str(&raw)?)
    };
    Ok(Some(SummaryRecord {
        title: row.get(0)?,
        date_publication: row.get(1)?,
        nb_decrets: row.get(2)?,
        decrets: list(3)?,
        nb_arretes: row.get(4)?,
        arretes: list(5)?,
        nb_circulaires: row.get(6)?,
        circulaires: list(7)?,
        nb_autres: row.get(8)?,
        autres: list(9)?,
    }))
}

// ── Stats ──

pub struct Stats {
    pub summaries: usize,
    pub decrets: usize,
    pub arretes: usize,
    pub circulaires: usize,
    pub autres: usize,
    pub first_date: Option<String>,
    pub last_date: Option<String>,
    pub failures: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let (summaries, decrets, arretes, circulaires, autres, first_date, last_date) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(nb_decrets),0), COALESCE(SUM(nb_arretes),0),
                COALESCE(SUM(nb_circulaires),0), COALESCE(SUM(nb_autres),0),
                MIN(date_publication), MAX(date_publication)
         FROM summaries",
        [],
        |r| {
            Ok((
                r.get(0)?,
                r.get(1)?,
                r.get(2)?,
                r.get(3)?,
                r.get(4)?,
                r.get(5)?,
                r.get(6)?,
            ))
        },
    )?;
    let failures: usize = conn.query_row("SELECT COUNT(*) FROM run_failures", [], |r| r.get(0))?;
    Ok(Stats {
        summaries,
        decrets,
        arretes,
        circulaires,
        autres,
        first_date,
        last_date,
        failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Stage;

    fn memory() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn record(date: &str, title: &str) -> SummaryRecord {
        SummaryRecord {
            title: title.into(),
            date_publication: date.into(),
            nb_decrets: 1,
            decrets: vec!["Décret n°1".into()],
            nb_arretes: 1,
            arretes: vec!["Arrêté n°2".into()],
            nb_autres: 1,
            autres: vec!["Note interne n°3".into()],
            ..Default::default()
        }
    }

    #[test]
    fn summary_round_trip() {
        let conn = memory();
        let r = record("2024-07-16", "JORF du 16 juillet 2024");
        save_summaries(&conn, "run-1", std::slice::from_ref(&r)).unwrap();
        assert_eq!(fetch_summary(&conn, "2024-07-16").unwrap(), Some(r));
        assert_eq!(fetch_summary(&conn, "2024-07-17").unwrap(), None);
    }

    #[test]
    fn same_date_replaces_previous_row() {
        let conn = memory();
        save_summaries(&conn, "run-1", &[record("2024-07-16", "old")]).unwrap();
        save_summaries(&conn, "run-2", &[record("2024-07-16", "new")]).unwrap();

        let rows = fetch_overview(&conn, 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "new");
    }

    #[test]
    fn overview_is_newest_first_and_limited() {
        let conn = memory();
        let records = [
            record("2024-07-16", "a"),
            record("2024-07-18", "c"),
            record("2024-07-17", "b"),
        ];
        save_summaries(&conn, "run-1", &records).unwrap();

        let rows = fetch_overview(&conn, 2).unwrap();
        let dates: Vec<&str> = rows.iter().map(|r| r.date_publication.as_str()).collect();
        assert_eq!(dates, ["2024-07-18", "2024-07-17"]);
        assert_eq!(rows[0].nb_decrets, 1);
        assert_eq!(rows[0].nb_circulaires, 0);
    }

    #[test]
    fn stats_and_failures() {
        let conn = memory();
        let empty = get_stats(&conn).unwrap();
        assert_eq!(empty.summaries, 0);
        assert_eq!(empty.first_date, None);

        save_summaries(&conn, "run-1", &[record("2024-07-16", "a"), record("2024-07-17", "b")]).unwrap();
        let mut report = RunReport::new("run-1".into());
        report.failed(Stage::Download, "https://example.org/JORF_1.tar.gz", "timed out");
        save_failures(&conn, &report).unwrap();

        let s = get_stats(&conn).unwrap();
        assert_eq!(s.summaries, 2);
        assert_eq!(s.decrets, 2);
        assert_eq!(s.circulaires, 0);
        assert_eq!(s.first_date.as_deref(), Some("2024-07-16"));
        assert_eq!(s.last_date.as_deref(), Some("2024-07-17"));
        assert_eq!(s.failures, 1);
    }
}
