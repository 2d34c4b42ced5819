//! Database row types. These map directly to SQLite rows and are kept
//! distinct from the swopp-types API models so the DB layer stays independent.

pub struct UserRow {
    pub email: String,
    pub name: String,
    pub password: String,
    pub picture: Option<String>,
    pub is_driver: bool,
    pub role: String,
    pub created_at: String,
}

pub struct RequestRow {
    pub id: i64,
    pub sender_email: String,
    pub driver_email: Option<String>,
    pub pickup: String,
    pub dropoff: String,
    pub description: Option<String>,
    pub status: String,
    pub scheduled_at: Option<String>,
    pub alternate_date: Option<String>,
    pub created_at: String,
}

pub struct ItemRow {
    pub id: i64,
    pub request_id: i64,
    pub name: String,
    pub item_type: String,
    pub description: String,
    pub price: f64,
    pub image: Option<String>,
    pub width: f64,
    pub height: f64,
    pub depth: f64,
    pub weight: f64,
}

/// Column values for an item insert or update.
pub struct NewItem<'a> {
    pub name: &'a str,
    pub item_type: &'a str,
    pub description: &'a str,
    pub price: f64,
    pub image: Option<&'a str>,
    pub width: f64,
    pub height: f64,
    pub depth: f64,
    pub weight: f64,
}

/// Column values for a request insert.
pub struct NewRequest<'a> {
    pub sender_email: &'a str,
    pub pickup: &'a str,
    pub dropoff: &'a str,
    pub description: Option<&'a str>,
    pub scheduled_at: Option<&'a str>,
    pub alternate_date: Option<&'a str>,
    pub created_at: &'a str,
}
