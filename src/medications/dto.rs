use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Body of a toggle: the state the caller currently sees.
#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub taken: bool,
}
