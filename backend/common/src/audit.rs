use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bookkeeping columns every entity table carries. Rows are soft-deleted:
/// queries filter on `deleted = FALSE` themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Audit {
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted: bool,
}

impl Audit {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            modified_at: now,
            deleted: false,
        }
    }

    pub fn touch(&mut self) {
        self.modified_at = Utc::now();
    }
}

impl Default for Audit {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_keeps_creation_time() {
        let mut audit = Audit::new();
        let before = audit.modified_at;

        audit.touch();

        assert!(!audit.deleted);
        assert!(audit.modified_at >= before);
        assert_eq!(audit.created_at, before);
    }
}
