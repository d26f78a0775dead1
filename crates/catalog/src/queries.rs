//! SQL shared by every catalog backend.
//!
//! Placeholders are `?`, which both MySQL and SQLite accept. Table names are
//! unqualified: the MySQL connection selects the catalog database, a SQLite
//! replica holds the tables in `main`.

const SCOPING_ENTITIES_BASE: &str = "\
SELECT DISTINCT pa.project_account_id, p.name, p.display_text
FROM project_account AS pa
JOIN projects AS p ON pa.project_id = p.id";

const SCOPING_ENTITIES_FILTER: &str = "\nWHERE pa.project_account_id = ?";

const SCOPING_ENTITIES_ORDER: &str = "\nORDER BY pa.project_account_id";

/// Live volumes of one account. One `?`: the account id.
pub const VOLUMES_BY_ACCOUNT: &str = "\
SELECT v.id, v.account_id, v.name, v.uuid, v.path, v.pool_id,
       v.template_id, v.instance_id, v.removed
FROM volumes AS v
WHERE v.account_id = ?
  AND (v.path IS NOT NULL OR v.state IN ('Allocated'))
  AND v.display_volume = 1
  AND v.removed IS NULL
ORDER BY v.id";

/// Project accounts with project metadata. With `filtered`, one `?`: the
/// project account id.
pub fn scoping_entities(filtered: bool) -> String {
    let mut sql = String::from(SCOPING_ENTITIES_BASE);
    if filtered {
        sql.push_str(SCOPING_ENTITIES_FILTER);
    }
    sql.push_str(SCOPING_ENTITIES_ORDER);
    sql
}

/// The slice of the catalog schema the queries above read. Enough to build a
/// SQLite replica from an export of the live catalog.
pub const REPLICA_SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY,
    name TEXT,
    display_text TEXT
);
CREATE TABLE IF NOT EXISTS project_account (
    id INTEGER PRIMARY KEY,
    account_id INTEGER NOT NULL,
    project_id INTEGER NOT NULL,
    project_account_id INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS volumes (
    id INTEGER PRIMARY KEY,
    account_id INTEGER NOT NULL,
    name TEXT,
    uuid TEXT,
    path TEXT,
    pool_id INTEGER,
    template_id INTEGER,
    instance_id INTEGER,
    state TEXT,
    display_volume INTEGER NOT NULL DEFAULT 1,
    removed TEXT
);";
