use crate::models::{ItemRow, NewItem, NewRequest, RequestRow, UserRow};
use crate::Database;
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

const USER_COLUMNS: &str = "email, name, password, picture, is_driver, role, created_at";
const REQUEST_COLUMNS: &str = "id, sender_email, driver_email, pickup, dropoff, description, status, scheduled_at, alternate_date, created_at";
const ITEM_COLUMNS: &str =
    "id, request_id, name, item_type, description, price, image, width, height, depth, weight";

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        email: &str,
        name: &str,
        password_hash: &str,
        is_driver: bool,
        role: &str,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (email, name, password, is_driver, role, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![email, name, password_hash, is_driver, role, created_at],
            )?;
            Ok(())
        })
    }

    pub fn get_user(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, email))
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users ORDER BY created_at, email"
            ))?;
            let rows = stmt
                .query_map([], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns false if no such user exists.
    pub fn update_user(
        &self,
        email: &str,
        name: Option<&str>,
        is_driver: Option<bool>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users
                 SET name = COALESCE(?2, name), is_driver = COALESCE(?3, is_driver)
                 WHERE email = ?1",
                params![email, name, is_driver],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Requests --

    pub fn get_request(&self, id: i64) -> Result<Option<RequestRow>> {
        self.with_conn(|conn| query_request(conn, id))
    }

    pub fn list_requests(&self) -> Result<Vec<RequestRow>> {
        self.with_conn(|conn| query_requests(conn, "1 = 1", params![]))
    }

    pub fn list_requests_by_sender(&self, email: &str) -> Result<Vec<RequestRow>> {
        self.with_conn(|conn| query_requests(conn, "sender_email = ?1", params![email]))
    }

    pub fn list_requests_by_driver(&self, email: &str) -> Result<Vec<RequestRow>> {
        self.with_conn(|conn| query_requests(conn, "driver_email = ?1", params![email]))
    }

    /// Pending requests that no driver has taken yet.
    pub fn list_open_requests(&self) -> Result<Vec<RequestRow>> {
        self.with_conn(|conn| {
            query_requests(
                conn,
                "status = 'pending' AND driver_email IS NULL",
                params![],
            )
        })
    }

    // -- Items --

    pub fn get_item(&self, id: i64) -> Result<Option<ItemRow>> {
        self.with_conn(|conn| query_item(conn, id))
    }

    pub fn list_items_by_request(&self, request_id: i64) -> Result<Vec<ItemRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ITEM_COLUMNS} FROM items WHERE request_id = ?1 ORDER BY id"
            ))?;
            let rows = stmt
                .query_map([request_id], item_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

// Connection-level queries. These run either on a pooled connection or
// inside `Database::with_tx`, where `Transaction` derefs to `Connection`.

pub fn query_user(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            [email],
            user_from_row,
        )
        .optional()?;
    Ok(row)
}

pub fn set_user_picture(conn: &Connection, email: &str, picture: Option<&str>) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE users SET picture = ?2 WHERE email = ?1",
        params![email, picture],
    )?;
    Ok(changed > 0)
}

/// Deletes the user. Requests they sent cascade away with their items;
/// requests they drive keep existing with the driver cleared.
pub fn delete_user(conn: &Connection, email: &str) -> Result<bool> {
    let changed = conn.execute("DELETE FROM users WHERE email = ?1", [email])?;
    Ok(changed > 0)
}

pub fn insert_request(conn: &Connection, req: &NewRequest<'_>) -> Result<i64> {
    conn.execute(
        "INSERT INTO requests (sender_email, pickup, dropoff, description, status, scheduled_at, alternate_date, created_at)
         VALUES (?1, ?2, ?3, ?4, 'draft', ?5, ?6, ?7)",
        params![
            req.sender_email,
            req.pickup,
            req.dropoff,
            req.description,
            req.scheduled_at,
            req.alternate_date,
            req.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn query_request(conn: &Connection, id: i64) -> Result<Option<RequestRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {REQUEST_COLUMNS} FROM requests WHERE id = ?1"),
            [id],
            request_from_row,
        )
        .optional()?;
    Ok(row)
}

fn query_requests(
    conn: &Connection,
    filter: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<RequestRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REQUEST_COLUMNS} FROM requests WHERE {filter} ORDER BY id DESC"
    ))?;
    let rows = stmt
        .query_map(params, request_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn update_request_fields(
    conn: &Connection,
    id: i64,
    pickup: &str,
    dropoff: &str,
    description: Option<&str>,
    scheduled_at: Option<&str>,
    alternate_date: Option<&str>,
) -> Result<()> {
    conn.execute(
        "UPDATE requests
         SET pickup = ?2, dropoff = ?3, description = ?4, scheduled_at = ?5, alternate_date = ?6
         WHERE id = ?1",
        params![id, pickup, dropoff, description, scheduled_at, alternate_date],
    )?;
    Ok(())
}

/// Write a new status and driver. Guarded on the status the caller just read
/// so the write is a no-op if the row moved underneath it.
pub fn set_request_status(
    conn: &Connection,
    id: i64,
    expected: &str,
    status: &str,
    driver_email: Option<&str>,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE requests SET status = ?3, driver_email = ?4 WHERE id = ?1 AND status = ?2",
        params![id, expected, status, driver_email],
    )?;
    Ok(changed > 0)
}

pub fn delete_request(conn: &Connection, id: i64) -> Result<bool> {
    let changed = conn.execute("DELETE FROM requests WHERE id = ?1", [id])?;
    Ok(changed > 0)
}

pub fn count_items(conn: &Connection, request_id: i64) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM items WHERE request_id = ?1",
        [request_id],
        |r| r.get(0),
    )?;
    Ok(count as u64)
}

/// Image keys referenced by the items of one request.
pub fn item_images_for_request(conn: &Connection, request_id: i64) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT image FROM items WHERE request_id = ?1 AND image IS NOT NULL")?;
    let keys = stmt
        .query_map([request_id], |r| r.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(keys)
}

/// Image keys referenced by items of every request the user sent.
pub fn item_images_for_sender(conn: &Connection, email: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT i.image FROM items i
         JOIN requests r ON r.id = i.request_id
         WHERE r.sender_email = ?1 AND i.image IS NOT NULL",
    )?;
    let keys = stmt
        .query_map([email], |r| r.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(keys)
}

pub fn insert_item(conn: &Connection, request_id: i64, item: &NewItem<'_>) -> Result<i64> {
    conn.execute(
        "INSERT INTO items (request_id, name, item_type, description, price, image, width, height, depth, weight)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            request_id,
            item.name,
            item.item_type,
            item.description,
            item.price,
            item.image,
            item.width,
            item.height,
            item.depth,
            item.weight,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn query_item(conn: &Connection, id: i64) -> Result<Option<ItemRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1"),
            [id],
            item_from_row,
        )
        .optional()?;
    Ok(row)
}

pub fn update_item(conn: &Connection, id: i64, item: &NewItem<'_>) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE items
         SET name = ?2, item_type = ?3, description = ?4, price = ?5, image = ?6,
             width = ?7, height = ?8, depth = ?9, weight = ?10
         WHERE id = ?1",
        params![
            id,
            item.name,
            item.item_type,
            item.description,
            item.price,
            item.image,
            item.width,
            item.height,
            item.depth,
            item.weight,
        ],
    )?;
    Ok(changed > 0)
}

pub fn delete_item(conn: &Connection, id: i64) -> Result<bool> {
    let changed = conn.execute("DELETE FROM items WHERE id = ?1", [id])?;
    Ok(changed > 0)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        email: row.get(0)?,
        name: row.get(1)?,
        password: row.get(2)?,
        picture: row.get(3)?,
        is_driver: row.get(4)?,
        role: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn request_from_row(row: &Row<'_>) -> rusqlite::Result<RequestRow> {
    Ok(RequestRow {
        id: row.get(0)?,
        sender_email: row.get(1)?,
        driver_email: row.get(2)?,
        pickup: row.get(3)?,
        dropoff: row.get(4)?,
        description: row.get(5)?,
        status: row.get(6)?,
        scheduled_at: row.get(7)?,
        alternate_date: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<ItemRow> {
    Ok(ItemRow {
        id: row.get(0)?,
        request_id: row.get(1)?,
        name: row.get(2)?,
        item_type: row.get(3)?,
        description: row.get(4)?,
        price: row.get(5)?,
        image: row.get(6)?,
        width: row.get(7)?,
        height: row.get(8)?,
        depth: row.get(9)?,
        weight: row.get(10)?,
    })
}
