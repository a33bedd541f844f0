//! Contact records. Read-only to the core; display fields are copied into
//! queue metadata at enqueue time.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    /// E.164-formatted phone number.
    pub phone: String,
    pub name: Option<String>,
    pub email: Option<String>,
}
