use serde::Serialize;

/// `{"detail": "..."}` acknowledgement body.
#[derive(Debug, Serialize)]
pub struct DetailResponse {
    pub detail: &'static str,
}

impl DetailResponse {
    pub const fn new(detail: &'static str) -> Self {
        Self { detail }
    }
}
