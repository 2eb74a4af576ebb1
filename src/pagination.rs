use serde::Deserialize;

const MAX_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
        }
    }
}

impl Pagination {
    /// Clamps to `1..=100` and a non-negative offset.
    pub fn bounds(self) -> (i64, i64) {
        (self.limit.clamp(1, MAX_LIMIT), self.offset.max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_clamped() {
        assert_eq!(Pagination::default().bounds(), (20, 0));
        assert_eq!(Pagination { limit: 0, offset: -5 }.bounds(), (1, 0));
        assert_eq!(Pagination { limit: 10_000, offset: 40 }.bounds(), (100, 40));
    }

    #[test]
    fn missing_query_fields_use_defaults() {
        let p: Pagination = serde_json::from_str("{}").unwrap();
        assert_eq!(p.bounds(), (20, 0));
        let p: Pagination = serde_json::from_str(r#"{"limit": 5}"#).unwrap();
        assert_eq!(p.bounds(), (5, 0));
    }
}
