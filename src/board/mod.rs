//! Local agile board database.
//!
//! Engineers are assigned to work items (stories and defects), each assignment
//! carrying a workflow status. The board UI renders one column per status.

pub mod diff;

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Context;
use rusqlite::{params, Connection, OpenFlags};
use serde::{Deserialize, Serialize};

pub use diff::{DiffReport, EXPECTED_STATUSES};

/// One row of the `assignments://all` resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: i64,
    pub engineer: String,
    pub work_item: String,
    pub status: String,
}

const SCHEMA: &str = r#"
CREATE TABLE engineers (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    role TEXT CHECK(role IN ('Developer', 'QA')) NOT NULL
);

CREATE TABLE work_items (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    type TEXT CHECK(type IN ('Story', 'Defect')) NOT NULL
);

CREATE TABLE assignments (
    id INTEGER PRIMARY KEY,
    engineer_id INTEGER,
    work_item_id INTEGER,
    status TEXT CHECK(status IN ('Developing', 'Under Review', 'Testing', 'Done', 'Ready for QA')) NOT NULL,
    FOREIGN KEY (engineer_id) REFERENCES engineers(id),
    FOREIGN KEY (work_item_id) REFERENCES work_items(id)
);
"#;

const ENGINEERS: [(i64, &str, &str); 4] = [
    (1, "Alice Smith", "Developer"),
    (2, "Bob Johnson", "QA"),
    (3, "Charlie Liu", "Developer"),
    (4, "Diana Patel", "QA"),
];

const WORK_ITEMS: [(i64, &str, &str); 4] = [
    (1, "Implement login form", "Story"),
    (2, "Fix logout bug", "Defect"),
    (3, "Add forgot password flow", "Story"),
    (4, "Incorrect error message on reset", "Defect"),
];

// The last row uses a status the board UI has no column for.
const ASSIGNMENTS: [(i64, i64, i64, &str); 9] = [
    (1, 1, 1, "Developing"),
    (2, 2, 1, "Testing"),
    (3, 3, 2, "Under Review"),
    (4, 4, 2, "Done"),
    (5, 1, 3, "Under Review"),
    (6, 2, 3, "Testing"),
    (7, 3, 4, "Developing"),
    (8, 4, 4, "Testing"),
    (9, 1, 4, "Ready for QA"),
];

/// Recreate the board database at `path` and seed it.
pub fn init_db(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to remove old database {}", path.display()))?;
    }

    let mut conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    conn.execute_batch(SCHEMA)?;

    let tx = conn.transaction()?;
    for (id, name, role) in ENGINEERS {
        tx.execute("INSERT INTO engineers VALUES (?1, ?2, ?3)", params![id, name, role])?;
    }
    for (id, title, kind) in WORK_ITEMS {
        tx.execute("INSERT INTO work_items VALUES (?1, ?2, ?3)", params![id, title, kind])?;
    }
    for (id, engineer_id, work_item_id, status) in ASSIGNMENTS {
        tx.execute(
            "INSERT INTO assignments VALUES (?1, ?2, ?3, ?4)",
            params![id, engineer_id, work_item_id, status],
        )?;
    }
    tx.commit()?;

    tracing::info!(
        "Board database created at {} ({} assignments)",
        path.display(),
        ASSIGNMENTS.len()
    );
    Ok(())
}

/// Open an existing board database without write access.
pub fn open_read_only(path: &Path) -> anyhow::Result<Connection> {
    Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("Failed to open board database {}", path.display()))
}

pub fn load_assignments(conn: &Connection) -> anyhow::Result<Vec<Assignment>> {
    let mut stmt = conn.prepare(
        "SELECT a.id, e.name AS engineer, w.title AS work_item, a.status
         FROM assignments a
         JOIN engineers e ON a.engineer_id = e.id
         JOIN work_items w ON a.work_item_id = w.id
         ORDER BY a.id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(Assignment {
            id: row.get(0)?,
            engineer: row.get(1)?,
            work_item: row.get(2)?,
            status: row.get(3)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

pub fn distinct_statuses(conn: &Connection) -> anyhow::Result<BTreeSet<String>> {
    let mut stmt = conn.prepare("SELECT DISTINCT status FROM assignments")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    rows.collect::<Result<BTreeSet<_>, _>>().map_err(Into::into)
}
