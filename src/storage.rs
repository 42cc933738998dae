//! Storage layer for CraftChain: JSONL documents + SQLite cache.
//!
//! `items.jsonl` holds whole item documents (edges and contributions
//! embedded), last line per id wins. `activity.jsonl` is the append-only craft
//! ledger. The SQLite database is a query cache rebuilt from both files
//! whenever their line counts drift from what the cache last saw.

use crate::graph_store::GraphStore;
use crate::types::{ActivityKind, ActivityRecord, Contribution, DependencyEdge, Item};
use chrono::{DateTime, SecondsFormat, Utc};
use eyre::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Storage directory name.
pub const STORE_DIR: &str = ".craftchain";

/// JSONL file for item documents.
const ITEMS_FILE: &str = "items.jsonl";

/// JSONL file for the activity ledger.
const ACTIVITY_FILE: &str = "activity.jsonl";

/// SQLite database file.
const DB_FILE: &str = "craftchain.db";

const ITEM_COLUMNS: &str = "id, project_id, name, required_qty, completed_qty, created_at, updated_at";

/// Storage handle for reading/writing craftchain data.
pub struct Storage {
    root: PathBuf,
    db: Connection,
}

impl Storage {
    /// Initialize storage in the given directory.
    pub fn init(root: &Path) -> Result<Self> {
        let store_dir = root.join(STORE_DIR);
        fs::create_dir_all(&store_dir).context("Failed to create .craftchain directory")?;

        let items_path = store_dir.join(ITEMS_FILE);
        let activity_path = store_dir.join(ACTIVITY_FILE);

        if !items_path.exists() {
            File::create(&items_path).context("Failed to create items.jsonl")?;
        }
        if !activity_path.exists() {
            File::create(&activity_path).context("Failed to create activity.jsonl")?;
        }

        let db_path = store_dir.join(DB_FILE);
        let db = Connection::open(&db_path).context("Failed to open SQLite database")?;

        let mut storage = Self {
            root: root.to_path_buf(),
            db,
        };

        storage.init_schema()?;
        storage.rebuild_from_jsonl()?;

        Ok(storage)
    }

    /// Open existing storage.
    pub fn open(root: &Path) -> Result<Self> {
        let store_dir = root.join(STORE_DIR);
        if !store_dir.exists() {
            eyre::bail!("No .craftchain directory found. Run 'craft init' first.");
        }

        let db_path = store_dir.join(DB_FILE);
        let db = Connection::open(&db_path).context("Failed to open SQLite database")?;

        let mut storage = Self {
            root: root.to_path_buf(),
            db,
        };

        storage.init_schema()?;

        if storage.needs_rebuild()? {
            log::info!("SQLite cache out of date, rebuilding from JSONL");
            storage.rebuild_from_jsonl()?;
        }

        Ok(storage)
    }

    /// Root directory this storage lives under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.root.join(STORE_DIR).join(name)
    }

    /// Initialize SQLite schema.
    fn init_schema(&self) -> Result<()> {
        self.db
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS items (
                    id TEXT PRIMARY KEY,
                    project_id TEXT NOT NULL,
                    name TEXT NOT NULL,
                    required_qty INTEGER NOT NULL,
                    completed_qty INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_items_project_name ON items(project_id, name);

                CREATE TABLE IF NOT EXISTS dependencies (
                    item_id TEXT NOT NULL REFERENCES items(id) ON DELETE CASCADE,
                    position INTEGER NOT NULL,
                    dependency_id TEXT NOT NULL,
                    qty INTEGER NOT NULL,
                    PRIMARY KEY (item_id, position)
                );
                CREATE INDEX IF NOT EXISTS idx_dependencies_target ON dependencies(dependency_id);

                CREATE TABLE IF NOT EXISTS contributions (
                    item_id TEXT NOT NULL REFERENCES items(id) ON DELETE CASCADE,
                    position INTEGER NOT NULL,
                    id TEXT NOT NULL,
                    user_id TEXT NOT NULL,
                    qty INTEGER NOT NULL,
                    created_at TEXT NOT NULL,
                    PRIMARY KEY (item_id, position)
                );

                CREATE TABLE IF NOT EXISTS activity (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    project_id TEXT NOT NULL,
                    item_id TEXT NOT NULL,
                    quantity INTEGER NOT NULL,
                    kind TEXT NOT NULL CHECK (kind IN ('crafted', 'resource')),
                    created_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_activity_project ON activity(project_id, created_at);

                CREATE TABLE IF NOT EXISTS meta (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );
                INSERT OR IGNORE INTO meta (key, value) VALUES ('jsonl_items_lines', '0');
                INSERT OR IGNORE INTO meta (key, value) VALUES ('jsonl_activity_lines', '0');
            "#,
            )
            .context("Failed to initialize schema")?;

        Ok(())
    }

    fn stored_line_count(&self, key: &str) -> Result<usize> {
        let value: Option<String> = self
            .db
            .query_row("SELECT value FROM meta WHERE key = ?", params![key], |row| row.get(0))
            .optional()?;
        Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    /// Check if SQLite needs to be rebuilt from JSONL.
    fn needs_rebuild(&self) -> Result<bool> {
        let items_lines = count_lines(&self.file_path(ITEMS_FILE))?;
        let activity_lines = count_lines(&self.file_path(ACTIVITY_FILE))?;

        Ok(items_lines != self.stored_line_count("jsonl_items_lines")?
            || activity_lines != self.stored_line_count("jsonl_activity_lines")?)
    }

    /// Rebuild SQLite cache from JSONL files.
    pub fn rebuild_from_jsonl(&mut self) -> Result<()> {
        let items_path = self.file_path(ITEMS_FILE);
        let activity_path = self.file_path(ACTIVITY_FILE);

        // Last occurrence wins, first occurrence fixes the order
        let mut order: Vec<String> = Vec::new();
        let mut items: HashMap<String, Item> = HashMap::new();
        let items_line_count = read_jsonl::<Item>(&items_path, |item| {
            if !items.contains_key(&item.id) {
                order.push(item.id.clone());
            }
            items.insert(item.id.clone(), item);
        })?;

        let mut records: Vec<ActivityRecord> = Vec::new();
        let activity_line_count = read_jsonl::<ActivityRecord>(&activity_path, |record| records.push(record))?;

        let tx = self.db.transaction()?;
        tx.execute_batch(
            r#"
            DELETE FROM contributions;
            DELETE FROM dependencies;
            DELETE FROM items;
            DELETE FROM activity;
        "#,
        )
        .context("Failed to clear tables")?;

        for id in &order {
            if let Some(item) = items.get(id) {
                Self::insert_item_to_db(&tx, item)?;
            }
        }
        for record in &records {
            Self::insert_activity_to_db(&tx, record)?;
        }

        tx.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES ('jsonl_items_lines', ?)",
            params![items_line_count.to_string()],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES ('jsonl_activity_lines', ?)",
            params![activity_line_count.to_string()],
        )?;
        tx.commit().context("Failed to commit cache rebuild")?;

        log::debug!(
            "Rebuilt cache: {} items, {} activity records",
            order.len(),
            records.len()
        );
        Ok(())
    }

    /// Insert or replace an item and its embedded lists in SQLite.
    fn insert_item_to_db(conn: &Connection, item: &Item) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO items (id, project_id, name, required_qty, completed_qty, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                project_id = excluded.project_id,
                name = excluded.name,
                required_qty = excluded.required_qty,
                completed_qty = excluded.completed_qty,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at
            "#,
            params![
                item.id,
                item.project_id,
                item.name,
                item.required_qty,
                item.completed_qty,
                fmt_ts(&item.created_at),
                fmt_ts(&item.updated_at),
            ],
        )?;

        conn.execute("DELETE FROM dependencies WHERE item_id = ?", params![item.id])?;
        for (position, edge) in item.dependencies.iter().enumerate() {
            conn.execute(
                "INSERT INTO dependencies (item_id, position, dependency_id, qty) VALUES (?, ?, ?, ?)",
                params![item.id, position as i64, edge.item_id, edge.qty],
            )?;
        }

        conn.execute("DELETE FROM contributions WHERE item_id = ?", params![item.id])?;
        for (position, c) in item.contributions.iter().enumerate() {
            conn.execute(
                r#"
                INSERT INTO contributions (item_id, position, id, user_id, qty, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
                params![item.id, position as i64, c.id, c.user_id, c.qty, fmt_ts(&c.created_at)],
            )?;
        }

        Ok(())
    }

    fn insert_activity_to_db(conn: &Connection, record: &ActivityRecord) -> Result<()> {
        conn.execute(
            r#"
            INSERT OR REPLACE INTO activity (id, user_id, project_id, item_id, quantity, kind, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                record.id,
                record.user_id,
                record.project_id,
                record.item_id,
                record.quantity,
                record.kind.as_str(),
                fmt_ts(&record.created_at),
            ],
        )?;
        Ok(())
    }

    /// Append serialized lines to a JSONL file and bump its line counter.
    fn append_lines(&self, file: &str, meta_key: &str, lines: &[String]) -> Result<()> {
        let path = self.file_path(file);
        let mut handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open {} for append", file))?;

        let mut buf = String::new();
        for line in lines {
            buf.push_str(line);
            buf.push('\n');
        }
        handle
            .write_all(buf.as_bytes())
            .with_context(|| format!("Failed to write to {}", file))?;
        handle.sync_all().with_context(|| format!("Failed to sync {}", file))?;

        self.db.execute(
            "UPDATE meta SET value = CAST(CAST(value AS INTEGER) + ? AS TEXT) WHERE key = ?",
            params![lines.len() as i64, meta_key],
        )?;
        Ok(())
    }

    fn load_item(&self, row_item: Option<Item>) -> Result<Option<Item>> {
        let Some(mut item) = row_item else {
            return Ok(None);
        };

        let mut dep_stmt = self
            .db
            .prepare("SELECT dependency_id, qty FROM dependencies WHERE item_id = ? ORDER BY position")?;
        item.dependencies = dep_stmt
            .query_map(params![item.id], |row| {
                Ok(DependencyEdge {
                    item_id: row.get(0)?,
                    qty: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut contrib_stmt = self.db.prepare(
            "SELECT id, user_id, qty, created_at FROM contributions WHERE item_id = ? ORDER BY position",
        )?;
        item.contributions = contrib_stmt
            .query_map(params![item.id], |row| {
                let created_at: String = row.get(3)?;
                Ok(Contribution {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    qty: row.get(2)?,
                    created_at: parse_ts(&created_at),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Some(item))
    }

    /// Number of distinct items in the cache.
    pub fn count_items(&self) -> Result<usize> {
        let count: i64 = self.db.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Convert a database row to an Item (lists filled separately).
    fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<Item> {
        let created_at: String = row.get(5)?;
        let updated_at: String = row.get(6)?;

        Ok(Item {
            id: row.get(0)?,
            project_id: row.get(1)?,
            name: row.get(2)?,
            required_qty: row.get(3)?,
            completed_qty: row.get(4)?,
            dependencies: vec![],
            contributions: vec![],
            created_at: parse_ts(&created_at),
            updated_at: parse_ts(&updated_at),
        })
    }

    fn row_to_activity(row: &rusqlite::Row) -> rusqlite::Result<ActivityRecord> {
        let kind: String = row.get(5)?;
        let created_at: String = row.get(6)?;

        Ok(ActivityRecord {
            id: row.get(0)?,
            user_id: row.get(1)?,
            project_id: row.get(2)?,
            item_id: row.get(3)?,
            quantity: row.get(4)?,
            kind: ActivityKind::parse(&kind).unwrap_or(ActivityKind::Crafted),
            created_at: parse_ts(&created_at),
        })
    }
}

impl GraphStore for Storage {
    fn find_by_id(&self, id: &str) -> Result<Option<Item>> {
        let sql = format!("SELECT {} FROM items WHERE id = ?", ITEM_COLUMNS);
        let item = self
            .db
            .query_row(&sql, params![id], Self::row_to_item)
            .optional()?;
        self.load_item(item)
    }

    fn find_by_name(&self, project_id: &str, name: &str) -> Result<Option<Item>> {
        let sql = format!(
            "SELECT {} FROM items WHERE project_id = ? AND name = ? ORDER BY created_at ASC, rowid ASC LIMIT 1",
            ITEM_COLUMNS
        );
        let item = self
            .db
            .query_row(&sql, params![project_id, name], Self::row_to_item)
            .optional()?;
        self.load_item(item)
    }

    fn save(&mut self, item: &Item) -> Result<()> {
        let json = serde_json::to_string(item).context("Failed to serialize item")?;
        self.append_lines(ITEMS_FILE, "jsonl_items_lines", &[json])?;

        let tx = self.db.transaction()?;
        Self::insert_item_to_db(&tx, item)?;
        tx.commit().context("Failed to update item cache")?;

        log::debug!("Saved item {} ({})", item.id, item.name);
        Ok(())
    }

    fn insert_many(&mut self, items: &[Item]) -> Result<()> {
        let mut batch_ids = HashSet::new();
        for item in items {
            if !batch_ids.insert(item.id.as_str()) {
                eyre::bail!("duplicate item id: {}", item.id);
            }
            let exists: i64 = self
                .db
                .query_row("SELECT COUNT(*) FROM items WHERE id = ?", params![item.id], |row| row.get(0))?;
            if exists > 0 {
                eyre::bail!("duplicate item id: {}", item.id);
            }
        }

        let lines = items
            .iter()
            .map(serde_json::to_string)
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to serialize items")?;
        self.append_lines(ITEMS_FILE, "jsonl_items_lines", &lines)?;

        let tx = self.db.transaction()?;
        for item in items {
            Self::insert_item_to_db(&tx, item)?;
        }
        tx.commit().context("Failed to update item cache")?;

        log::debug!("Inserted {} items", items.len());
        Ok(())
    }

    fn items_in_project(&self, project_id: &str) -> Result<Vec<Item>> {
        let sql = format!(
            "SELECT {} FROM items WHERE project_id = ? ORDER BY created_at ASC, rowid ASC",
            ITEM_COLUMNS
        );
        let mut stmt = self.db.prepare(&sql)?;
        let rows: Vec<Item> = stmt
            .query_map(params![project_id], Self::row_to_item)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(item) = self.load_item(Some(row))? {
                items.push(item);
            }
        }
        Ok(items)
    }

    fn record_activity(&mut self, record: &ActivityRecord) -> Result<()> {
        let json = serde_json::to_string(record).context("Failed to serialize activity record")?;
        self.append_lines(ACTIVITY_FILE, "jsonl_activity_lines", &[json])?;
        Self::insert_activity_to_db(&self.db, record)
    }

    fn recent_activity(&self, project_id: &str, limit: usize) -> Result<Vec<ActivityRecord>> {
        let mut stmt = self.db.prepare(
            r#"
            SELECT id, user_id, project_id, item_id, quantity, kind, created_at
            FROM activity
            WHERE project_id = ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#,
        )?;

        let records = stmt
            .query_map(params![project_id, limit as i64], Self::row_to_activity)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Read every parseable record of a JSONL file, returning the line count.
fn read_jsonl<T: serde::de::DeserializeOwned>(path: &Path, mut sink: impl FnMut(T)) -> Result<usize> {
    let mut line_count = 0;
    if !path.exists() {
        return Ok(0);
    }

    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    for line in BufReader::new(file).lines() {
        line_count += 1;
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                log::warn!("Failed to read line {} of {}: {}", line_count, path.display(), e);
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<T>(&line) {
            Ok(value) => sink(value),
            Err(e) => {
                log::warn!("Failed to parse line {} of {}: {}", line_count, path.display(), e);
            }
        }
    }

    Ok(line_count)
}

/// Count lines in a file.
fn count_lines(path: &Path) -> Result<usize> {
    if !path.exists() {
        return Ok(0);
    }
    let file = File::open(path).context("Failed to open file for line count")?;
    let reader = BufReader::new(file);
    Ok(reader.lines().count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_storage() -> (TempDir, Storage) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::init(temp_dir.path()).unwrap();
        (temp_dir, storage)
    }

    fn make_item(id: &str, name: &str) -> Item {
        let now = Utc::now();
        Item {
            id: id.to_string(),
            project_id: "pr-forge".to_string(),
            name: name.to_string(),
            required_qty: 4,
            completed_qty: 1,
            dependencies: vec![],
            contributions: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_init_creates_files() {
        let temp_dir = TempDir::new().unwrap();
        let _storage = Storage::init(temp_dir.path()).unwrap();

        assert!(temp_dir.path().join(STORE_DIR).exists());
        assert!(temp_dir.path().join(STORE_DIR).join(ITEMS_FILE).exists());
        assert!(temp_dir.path().join(STORE_DIR).join(ACTIVITY_FILE).exists());
        assert!(temp_dir.path().join(STORE_DIR).join(DB_FILE).exists());
    }

    #[test]
    fn test_open_without_init_fails() {
        let temp_dir = TempDir::new().unwrap();
        assert!(Storage::open(temp_dir.path()).is_err());
    }

    #[test]
    fn test_save_and_find_preserves_embedded_order() {
        let (_temp_dir, mut storage) = setup_test_storage();

        let mut item = make_item("it-sword00001", "Sword");
        item.dependencies = vec![
            DependencyEdge::new("it-hilt000001", 1),
            DependencyEdge::new("it-blade00001", 2),
        ];
        item.contributions = vec![Contribution {
            id: "ct-0000000001".to_string(),
            user_id: "alice".to_string(),
            qty: 3,
            created_at: Utc::now(),
        }];
        storage.save(&item).unwrap();

        let loaded = storage.find_by_id("it-sword00001").unwrap().unwrap();
        assert_eq!(loaded.dependencies, item.dependencies);
        assert_eq!(loaded.contributions.len(), 1);
        assert_eq!(loaded.contributions[0].qty, 3);
        assert_eq!(loaded.completed_qty, 1);

        let by_name = storage.find_by_name("pr-forge", "Sword").unwrap().unwrap();
        assert_eq!(by_name.id, "it-sword00001");
        assert!(storage.find_by_name("pr-other", "Sword").unwrap().is_none());
    }

    #[test]
    fn test_save_replaces_lists() {
        let (_temp_dir, mut storage) = setup_test_storage();

        let mut item = make_item("it-sword00001", "Sword");
        item.dependencies = vec![DependencyEdge::new("it-a", 1), DependencyEdge::new("it-b", 1)];
        storage.save(&item).unwrap();

        item.dependencies.truncate(1);
        storage.save(&item).unwrap();

        let loaded = storage.find_by_id(&item.id).unwrap().unwrap();
        assert_eq!(loaded.dependencies.len(), 1);
        assert_eq!(storage.count_items().unwrap(), 1);
    }

    #[test]
    fn test_insert_many_rejects_existing_id() {
        let (_temp_dir, mut storage) = setup_test_storage();
        storage.save(&make_item("it-a", "A")).unwrap();

        let result = storage.insert_many(&[make_item("it-b", "B"), make_item("it-a", "A2")]);
        assert!(result.is_err());
        assert!(storage.find_by_id("it-b").unwrap().is_none());
    }

    #[test]
    fn test_insert_many_rejects_repeated_id_in_batch() {
        let (_temp_dir, mut storage) = setup_test_storage();

        let result = storage.insert_many(&[make_item("it-a", "A"), make_item("it-a", "A2")]);
        assert!(result.unwrap_err().to_string().contains("it-a"));
        assert_eq!(storage.count_items().unwrap(), 0);
    }

    #[test]
    fn test_unreadable_cache_row_is_an_error() {
        let (_temp_dir, mut storage) = setup_test_storage();
        let mut item = make_item("it-sword00001", "Sword");
        item.dependencies = vec![DependencyEdge::new("it-hilt000001", 1)];
        storage.save(&item).unwrap();

        storage
            .db
            .execute("UPDATE dependencies SET qty = 'x' WHERE item_id = ?", params![item.id])
            .unwrap();

        assert!(storage.find_by_id(&item.id).is_err());
        assert!(storage.items_in_project("pr-forge").is_err());
    }

    #[test]
    fn test_reopen_rebuilds_from_jsonl() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut storage = Storage::init(temp_dir.path()).unwrap();
            storage
                .insert_many(&[make_item("it-a", "Plank"), make_item("it-b", "Nail")])
                .unwrap();
            storage
                .record_activity(&ActivityRecord {
                    id: "ac-0000000001".to_string(),
                    user_id: "alice".to_string(),
                    project_id: "pr-forge".to_string(),
                    item_id: "it-a".to_string(),
                    quantity: 2,
                    kind: ActivityKind::Crafted,
                    created_at: Utc::now(),
                })
                .unwrap();
        }

        // Drop the cache entirely; JSONL is the source of truth
        fs::remove_file(temp_dir.path().join(STORE_DIR).join(DB_FILE)).unwrap();

        let storage = Storage::open(temp_dir.path()).unwrap();
        assert_eq!(storage.count_items().unwrap(), 2);
        assert_eq!(storage.recent_activity("pr-forge", 20).unwrap().len(), 1);
    }

    #[test]
    fn test_rebuild_skips_corrupt_lines() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut storage = Storage::init(temp_dir.path()).unwrap();
            storage.save(&make_item("it-a", "Plank")).unwrap();
        }

        let items_path = temp_dir.path().join(STORE_DIR).join(ITEMS_FILE);
        let mut file = OpenOptions::new().append(true).open(&items_path).unwrap();
        writeln!(file, "{{not json").unwrap();

        let storage = Storage::open(temp_dir.path()).unwrap();
        assert_eq!(storage.count_items().unwrap(), 1);
    }

    #[test]
    fn test_recent_activity_order_and_limit() {
        let (_temp_dir, mut storage) = setup_test_storage();
        let base = Utc::now();

        for i in 0..4 {
            storage
                .record_activity(&ActivityRecord {
                    id: format!("ac-000000000{}", i),
                    user_id: "bob".to_string(),
                    project_id: "pr-forge".to_string(),
                    item_id: "it-a".to_string(),
                    quantity: i + 1,
                    kind: ActivityKind::Crafted,
                    created_at: base + chrono::Duration::milliseconds(i),
                })
                .unwrap();
        }

        let recent = storage.recent_activity("pr-forge", 3).unwrap();
        let quantities: Vec<i64> = recent.iter().map(|r| r.quantity).collect();
        assert_eq!(quantities, vec![4, 3, 2]);
        assert!(storage.recent_activity("pr-none", 3).unwrap().is_empty());
    }
}
