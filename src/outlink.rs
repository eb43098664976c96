/// The index sub-stage an outlink column is being resolved for. Each stage
/// joins a different set of archive tables, so a configured column is only
/// usable where its table has an alias in the stage query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Taxa,
    Synonyms,
    BareNames,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Taxon,
    Synonym,
    Name,
}

/// A validated `table.column` selector naming the archive column that
/// supplies outlink ids for a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlinkColumn {
    pub table: Table,
    pub column: String,
}

impl OutlinkColumn {
    /// Parses a `table.column` selector. The table must be one of the three
    /// archive tables the index queries touch and the column a plain
    /// lowercase identifier.
    pub fn parse(selector: &str) -> Option<OutlinkColumn> {
        let (table, column) = selector.split_once('.')?;

        let table = match table {
            "taxon" => Table::Taxon,
            "synonym" => Table::Synonym,
            "name" => Table::Name,
            _ => return None,
        };

        if column.is_empty() || !column.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
            return None;
        }

        Some(OutlinkColumn {
            table,
            column: column.to_string(),
        })
    }

    /// The SQL alias of the selector's table within a sub-stage query, or
    /// None when the table is not joinable there. Illegal combinations
    /// collapse to an empty outlink rather than an error.
    pub fn alias(&self, stage: Stage) -> Option<&'static str> {
        match (stage, self.table) {
            (Stage::Taxa, Table::Taxon) => Some("t"),
            (Stage::Taxa, Table::Name) => Some("n"),
            (Stage::Taxa, Table::Synonym) => None,

            (Stage::Synonyms, Table::Taxon) => Some("t"),
            (Stage::Synonyms, Table::Synonym) => Some("s"),
            (Stage::Synonyms, Table::Name) => Some("n"),

            (Stage::BareNames, Table::Name) => Some("name"),
            (Stage::BareNames, _) => None,
        }
    }

    /// The select expression for a sub-stage query, e.g. `t.col__id`.
    pub fn select_expr(&self, stage: Stage) -> Option<String> {
        self.alias(stage).map(|alias| format!("{alias}.{}", self.column))
    }

    /// Alternative-id columns hold `namespace:value` lists and only the
    /// `gnoutlink` namespace feeds the outlink; every other column is used
    /// verbatim.
    pub fn extract(&self, raw: &str) -> String {
        if self.column == "col__alternative_id" {
            gnoutlink_value(raw)
        }
        else {
            raw.trim().to_string()
        }
    }
}

/// Picks the value with the exact `gnoutlink` namespace out of a
/// comma-separated `ns:val` list, or empty when none is present.
pub fn gnoutlink_value(raw: &str) -> String {
    for pair in raw.split(',') {
        if let Some((namespace, value)) = pair.trim().split_once(':') {
            if namespace == "gnoutlink" {
                return value.to_string();
            }
        }
    }
    String::new()
}
