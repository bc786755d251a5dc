use serde::{Deserialize, Serialize};

/// Ordered up and down statements produced by the synthesizer.
///
/// Statements carry their own terminator; comment lines carry none.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DdlScript {
    pub up_sql: Vec<String>,
    pub down_sql: Vec<String>,
}

impl DdlScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.up_sql.is_empty() && self.down_sql.is_empty()
    }

    pub fn add_up(&mut self, sql: impl Into<String>) {
        self.up_sql.push(sql.into());
    }

    pub fn add_down(&mut self, sql: impl Into<String>) {
        self.down_sql.push(sql.into());
    }

    pub fn merge(&mut self, other: DdlScript) {
        self.up_sql.extend(other.up_sql);
        self.down_sql.extend(other.down_sql);
    }

    pub fn up_script(&self) -> String {
        self.up_sql.join("\n\n")
    }

    pub fn down_script(&self) -> String {
        self.down_sql.join("\n\n")
    }
}
