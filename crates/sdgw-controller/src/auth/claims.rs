//! JWT claims structure for API sessions.

use serde::{Deserialize, Serialize};

/// Claims embedded in issued bearer tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Username the token was issued to.
    pub username: String,
    /// Expiration (unix timestamp).
    pub exp: i64,
}
