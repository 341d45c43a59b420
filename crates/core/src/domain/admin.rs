use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::identity::Identity;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminRecord {
    pub identity: Identity,
    pub granted_at: DateTime<Utc>,
}
