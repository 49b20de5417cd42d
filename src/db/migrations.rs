use rusqlite::Connection;

const MIGRATIONS: &[&str] = &[
    // Migration 1: Initial schema
    "CREATE TABLE IF NOT EXISTS brokers (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        opt_out_url TEXT,
        category TEXT NOT NULL,
        opt_out_method TEXT NOT NULL,
        data_types TEXT NOT NULL DEFAULT '[]',
        difficulty TEXT NOT NULL,
        response_time TEXT,
        regions TEXT NOT NULL DEFAULT '[]',
        laws TEXT NOT NULL DEFAULT '[]',
        premium INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS removal_requests (
        id TEXT PRIMARY KEY,
        broker_name TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        email TEXT NOT NULL,
        response TEXT,
        metadata TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_requests_status ON removal_requests(status);

    CREATE TABLE IF NOT EXISTS registry_meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );",
];

pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS _migrations (version INTEGER PRIMARY KEY)")?;

    let applied: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |row| row.get(0),
    )?;

    for (version, sql) in (1i64..).zip(MIGRATIONS.iter()).skip(applied as usize) {
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)?;
        tx.execute("INSERT INTO _migrations (version) VALUES (?1)", [version])?;
        tx.commit()?;
        tracing::info!("Applied migration {version}");
    }

    Ok(())
}
