use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (users, requests, items)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                email       TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                password    TEXT NOT NULL,
                picture     TEXT,
                is_driver   INTEGER NOT NULL DEFAULT 0,
                role        TEXT NOT NULL DEFAULT 'user',
                created_at  TEXT NOT NULL
            );

            CREATE TABLE requests (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                sender_email    TEXT NOT NULL REFERENCES users(email) ON DELETE CASCADE,
                driver_email    TEXT REFERENCES users(email) ON DELETE SET NULL,
                pickup          TEXT NOT NULL,
                dropoff         TEXT NOT NULL,
                description     TEXT,
                status          TEXT NOT NULL DEFAULT 'draft',
                scheduled_at    TEXT,
                alternate_date  TEXT,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_requests_sender ON requests(sender_email);
            CREATE INDEX idx_requests_driver ON requests(driver_email);
            CREATE INDEX idx_requests_status ON requests(status);

            CREATE TABLE items (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                request_id  INTEGER NOT NULL REFERENCES requests(id) ON DELETE CASCADE,
                name        TEXT NOT NULL,
                item_type   TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                price       REAL NOT NULL CHECK (price >= 0),
                image       TEXT,
                width       REAL NOT NULL,
                height      REAL NOT NULL,
                depth       REAL NOT NULL,
                weight      REAL NOT NULL
            );

            CREATE INDEX idx_items_request ON items(request_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
