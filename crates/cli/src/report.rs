//! Report rendering for `volmon audit`: bordered tables, CSV export of
//! absent volumes, JSON dump, and the plain-text notification body.

use std::io::Write;
use std::path::Path;

use volmon_recon::{ReconRow, Reconciliation};

use crate::exit_codes::EXIT_OUTPUT;
use crate::util::{display_width, pad_right};
use crate::CliError;

pub(crate) const COLUMNS: [&str; 9] = [
    "ID",
    "ACCOUNT_ID",
    "NAME",
    "UUID",
    "PATH",
    "POOL_ID",
    "TEMPLATE_ID",
    "INSTANCE_ID",
    "REMOVED",
];

/// Cells wider than this are cut with "..". The CSV and JSON outputs keep
/// full values.
const MAX_CELL_WIDTH: usize = 64;

const NULL: &str = "None";

fn opt_text(v: Option<&str>) -> String {
    v.map(str::to_string).unwrap_or_else(|| NULL.to_string())
}

fn opt_id(v: Option<u64>) -> String {
    v.map(|n| n.to_string()).unwrap_or_else(|| NULL.to_string())
}

/// The nine report columns for one row.
pub(crate) fn row_cells(row: &ReconRow) -> [String; 9] {
    let v = &row.volume;
    [
        v.id.to_string(),
        row.account_label(),
        opt_text(v.name.as_deref()),
        opt_text(v.uuid.as_deref()),
        opt_text(v.path.as_deref()),
        opt_id(v.pool_id),
        opt_id(v.template_id),
        opt_id(v.instance_id),
        v.removed
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| NULL.to_string()),
    ]
}

// ── Tables ──────────────────────────────────────────────────────────

/// Bordered table with a header row; an empty row set still renders the
/// header.
pub(crate) fn render_table(rows: &[ReconRow]) -> String {
    let cells: Vec<[String; 9]> = rows.iter().map(row_cells).collect();

    let mut widths: Vec<usize> = COLUMNS.iter().map(|c| display_width(c)).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(display_width(cell).min(MAX_CELL_WIDTH));
        }
    }

    let border = {
        let mut s = String::from("+");
        for w in &widths {
            s.push_str(&"-".repeat(w + 2));
            s.push('+');
        }
        s
    };
    let mut out = String::new();
    out.push_str(&border);
    out.push('\n');
    out.push_str(&table_line(COLUMNS.iter(), &widths));
    out.push('\n');
    out.push_str(&border);
    out.push('\n');
    for row in &cells {
        out.push_str(&table_line(row.iter(), &widths));
        out.push('\n');
    }
    if !cells.is_empty() {
        out.push_str(&border);
        out.push('\n');
    }
    out
}

fn table_line<S: AsRef<str>>(values: impl Iterator<Item = S>, widths: &[usize]) -> String {
    let mut s = String::from("|");
    for (value, w) in values.zip(widths) {
        s.push(' ');
        s.push_str(&pad_right(value.as_ref(), *w));
        s.push_str(" |");
    }
    s
}

// ── Files ───────────────────────────────────────────────────────────

fn output_err(path: &Path, e: impl std::fmt::Display) -> CliError {
    CliError {
        code: EXIT_OUTPUT,
        message: format!("cannot write {}: {}", path.display(), e),
        hint: None,
    }
}

/// Absent rows as CSV with the report columns. `-` writes to stdout.
pub(crate) fn write_absent_csv(path: &Path, rows: &[ReconRow]) -> Result<(), CliError> {
    let writer: Box<dyn Write> = if path.as_os_str() == "-" {
        Box::new(std::io::BufWriter::new(std::io::stdout().lock()))
    } else {
        let f = std::fs::File::create(path).map_err(|e| output_err(path, e))?;
        Box::new(std::io::BufWriter::new(f))
    };

    let mut csv_writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    // Always write header, even with zero rows
    let header = COLUMNS.iter().copied().chain(["ACCOUNT_NAME"]);
    csv_writer.write_record(header).map_err(|e| output_err(path, e))?;
    for row in rows {
        let mut cells = row_cells(row);
        // Account column keeps the bare id in CSV; the name gets its own column.
        cells[1] = row.volume.account_id.to_string();
        let mut record: Vec<String> = cells.into_iter().collect();
        record.push(row.entity_name.clone());
        csv_writer.write_record(&record).map_err(|e| output_err(path, e))?;
    }
    csv_writer.flush().map_err(|e| output_err(path, e))
}

pub(crate) fn to_json(recon: &Reconciliation) -> Result<String, CliError> {
    serde_json::to_string_pretty(recon).map_err(|e| CliError {
        code: EXIT_OUTPUT,
        message: format!("JSON serialization error: {e}"),
        hint: None,
    })
}

pub(crate) fn write_json(path: &Path, json: &str) -> Result<(), CliError> {
    std::fs::write(path, json).map_err(|e| output_err(path, e))
}

// ── Summary text ────────────────────────────────────────────────────

/// Per-account progress line, uncolored.
pub(crate) fn absent_line(entity_name: &str, absent: usize) -> String {
    format!("Total volumes absent for account {} => {}", entity_name, absent)
}

/// Totals block shared by the terminal footer and the email body.
pub(crate) fn totals_text(recon: &Reconciliation) -> String {
    let s = &recon.summary;
    let mut out = format!(
        "{} account(s), {} volume(s) checked, {} absent",
        s.entities.len(),
        s.total_examined,
        s.total_absent,
    );
    if s.total_failed_checks > 0 {
        out.push_str(&format!(", {} check(s) failed", s.total_failed_checks));
    }
    if s.skipped_entities > 0 {
        out.push_str(&format!(", {} account(s) skipped", s.skipped_entities));
    }
    out
}

/// Notification body: accounts with absent volumes, totals, absent table.
pub(crate) fn email_body(region: &str, recon: &Reconciliation) -> String {
    let mut body = format!("Volume audit for region '{}' at {}\n\n", region, recon.meta.run_at);
    for entity in recon.summary.entities_with_absent() {
        body.push_str(&absent_line(&entity.entity_name, entity.absent));
        body.push('\n');
    }
    body.push('\n');
    body.push_str(&totals_text(recon));
    body.push_str("\n\n");
    body.push_str(&render_table(&recon.absent_rows));
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use volmon_recon::{
        EntitySummary, RunMeta, RunSummary, ScopingEntity, Verdict, VolumeRecord,
    };

    fn entity() -> ScopingEntity {
        ScopingEntity { id: 101, name: "web".into(), description: None }
    }

    fn row(id: u64, verdict: Verdict) -> ReconRow {
        ReconRow::new(
            &entity(),
            VolumeRecord {
                id,
                account_id: 101,
                name: Some(format!("vol-{id}")),
                uuid: Some(format!("u-{id}")),
                path: Some(format!("p{id}")),
                pool_id: Some(1),
                template_id: None,
                instance_id: Some(7),
                removed: None,
            },
            verdict,
        )
    }

    fn recon(rows: Vec<ReconRow>) -> Reconciliation {
        let absent_rows: Vec<ReconRow> =
            rows.iter().filter(|r| r.verdict.is_absent()).cloned().collect();
        let mut summary = RunSummary::default();
        summary.record(EntitySummary {
            entity_id: 101,
            entity_name: "web".into(),
            examined: rows.len(),
            absent: absent_rows.len(),
            failed_checks: 0,
        });
        Reconciliation {
            meta: RunMeta {
                engine_version: "test".into(),
                run_at: "2026-10-19T00:00:00+00:00".into(),
                account_filter: None,
            },
            summary,
            all_rows: rows,
            absent_rows,
            check_failures: vec![],
            entity_failures: vec![],
        }
    }

    #[test]
    fn cells_use_account_label_and_none() {
        let cells = row_cells(&row(10, Verdict::Present));
        assert_eq!(cells[0], "10");
        assert_eq!(cells[1], "101(web)");
        assert_eq!(cells[6], "None");
        assert_eq!(cells[8], "None");
    }

    #[test]
    fn table_is_aligned() {
        let table = render_table(&[row(10, Verdict::Present), row(1234, Verdict::Absent)]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[1].starts_with("| ID   | ACCOUNT_ID |"));
        assert!(lines[3].starts_with("| 10   | 101(web)   |"));
        let width = display_width(lines[0]);
        assert!(lines.iter().all(|l| display_width(l) == width));
    }

    #[test]
    fn empty_table_has_header_only() {
        let table = render_table(&[]);
        assert_eq!(table.lines().count(), 3);
        assert!(table.contains("INSTANCE_ID"));
    }

    #[test]
    fn csv_has_header_and_absent_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.csv");
        write_absent_csv(&path, &[row(11, Verdict::Absent)]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "ID,ACCOUNT_ID,NAME,UUID,PATH,POOL_ID,TEMPLATE_ID,INSTANCE_ID,REMOVED,ACCOUNT_NAME"
        );
        assert_eq!(lines[1], "11,101,vol-11,u-11,p11,1,None,7,None,web");
    }

    #[test]
    fn csv_to_missing_dir_is_output_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_absent_csv(&dir.path().join("no/such/dir.csv"), &[]).unwrap_err();
        assert_eq!(err.code, EXIT_OUTPUT);
    }

    #[test]
    fn email_body_lists_absent_accounts() {
        let r = recon(vec![row(10, Verdict::Present), row(11, Verdict::Absent)]);
        let body = email_body("lab", &r);
        assert!(body.contains("Total volumes absent for account web => 1"));
        assert!(body.contains("1 account(s), 2 volume(s) checked, 1 absent"));
        assert!(body.contains("u-11"));
        assert!(!body.contains("u-10"));
    }

    #[test]
    fn totals_mention_failures_only_when_present() {
        let mut r = recon(vec![row(10, Verdict::Present)]);
        assert!(!totals_text(&r).contains("failed"));
        r.summary.total_failed_checks = 2;
        r.summary.skipped_entities = 1;
        let t = totals_text(&r);
        assert!(t.contains("2 check(s) failed"));
        assert!(t.contains("1 account(s) skipped"));
    }
}
