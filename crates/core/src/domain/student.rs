use serde::{Deserialize, Serialize};

use crate::domain::identity::{Identity, PublicId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub identity: Identity,
    pub given_name: String,
    pub family_name: String,
    pub public_id: PublicId,
}

impl StudentRecord {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.given_name, self.family_name)
    }
}
