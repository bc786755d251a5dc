use serde::{Deserialize, Serialize};

use super::{DdlScript, DdlSynthesizer, manual_intervention};

/// How dependent objects are treated when a table is dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropMode {
    /// Fail if anything still depends on the table
    #[default]
    Restrict,
    /// Remove dependent objects along with the table
    Cascade,
    /// Drop referencing foreign keys first, then the table
    DetachThenDrop,
}

impl DdlSynthesizer {
    /// The down half is always a comment: a dropped table cannot be rebuilt
    /// from its name alone.
    pub fn drop_table_migration(
        &self,
        schema: Option<&str>,
        table: &str,
        mode: DropMode,
    ) -> DdlScript {
        let table_name = self.qualified_name(schema, table);
        let mut script = DdlScript::new();
        match mode {
            DropMode::Restrict => script.add_up(format!("DROP TABLE {};", table_name)),
            DropMode::Cascade => script.add_up(format!("DROP TABLE {} CASCADE;", table_name)),
            DropMode::DetachThenDrop => {
                // Constraint names of referencing tables are not part of the request.
                script.add_up(format!(
                    "-- Drop foreign keys referencing {} before running this statement",
                    table_name
                ));
                script.add_up(format!("DROP TABLE {};", table_name));
            }
        }
        script.add_down(manual_intervention(&format!("dropping table {}", table_name)));
        script
    }
}
