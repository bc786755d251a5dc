//! Foreign-key aware table ordering

use std::collections::{BTreeSet, HashMap};

use sqlbridge_core::SchemaMap;

/// Result of ordering one schema's tables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableOrder {
    /// Every table exactly once; referenced tables first where possible
    pub order: Vec<String>,
    /// Tables caught in a foreign-key cycle, appended alphabetically at the
    /// end of `order`
    pub unresolved: Vec<String>,
}

impl TableOrder {
    pub fn has_cycle(&self) -> bool {
        !self.unresolved.is_empty()
    }
}

/// Order tables so every in-schema foreign-key target precedes its
/// referrers. Ties break alphabetically.
pub fn order(schema: &str, tables: &SchemaMap) -> Vec<String> {
    order_with_diagnostics(schema, tables).order
}

/// Like [`order`], also reporting the tables a cycle left unresolved.
pub fn order_with_diagnostics(schema: &str, tables: &SchemaMap) -> TableOrder {
    // Distinct in-schema targets per table; self references and tables
    // outside the map do not constrain the order.
    let mut in_degree: HashMap<&str, usize> = HashMap::with_capacity(tables.len());
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for (table, metadata) in tables {
        let targets: BTreeSet<&str> = metadata
            .foreign_keys
            .iter()
            .filter(|fk| fk.target_schema.is_empty() || fk.target_schema == schema)
            .map(|fk| fk.target_table.as_str())
            .filter(|target| *target != table.as_str() && tables.contains_key(*target))
            .collect();
        in_degree.insert(table.as_str(), targets.len());
        for target in targets {
            dependents.entry(target).or_default().push(table.as_str());
        }
    }

    let mut ready: Vec<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(table, _)| *table)
        .collect();
    ready.sort_unstable();

    let mut ordered = Vec::with_capacity(tables.len());
    while !ready.is_empty() {
        let table = ready.remove(0);
        ordered.push(table.to_string());
        for dependent in dependents.get(table).into_iter().flatten() {
            let Some(degree) = in_degree.get_mut(dependent) else {
                continue;
            };
            *degree -= 1;
            if *degree == 0 {
                let position = ready.binary_search(dependent).unwrap_or_else(|p| p);
                ready.insert(position, *dependent);
            }
        }
    }

    let mut unresolved: Vec<String> = in_degree
        .into_iter()
        .filter(|(_, degree)| *degree > 0)
        .map(|(table, _)| table.to_string())
        .collect();
    unresolved.sort_unstable();

    if !unresolved.is_empty() {
        tracing::warn!(
            schema = %schema,
            tables = ?unresolved,
            "Foreign-key cycle detected; appending tables alphabetically"
        );
        ordered.extend(unresolved.iter().cloned());
    }

    TableOrder {
        order: ordered,
        unresolved,
    }
}
