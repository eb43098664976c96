use chrono::{DateTime, Utc};
use diesel::prelude::*;
use once_cell::sync::Lazy;
use uuid::Uuid;

use crate::schema;

/// The fixed globalnames namespace: UUID v5 of `globalnames.org` under the
/// DNS namespace. Every name and vernacular string id is derived from it,
/// which is what makes identities stable across sources and across runs.
static GLOBALNAMES_NAMESPACE: Lazy<Uuid> = Lazy::new(|| Uuid::new_v5(&Uuid::NAMESPACE_DNS, b"globalnames.org"));

pub fn string_uuid(value: &str) -> Uuid {
    Uuid::new_v5(&GLOBALNAMES_NAMESPACE, value.as_bytes())
}

/// A deduplicated name string. The id is the UUID v5 of the string under
/// the globalnames namespace, so the same string maps to the same row from
/// every source.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::name_strings)]
pub struct NameString {
    pub id: Uuid,
    pub name: String,
}

/// One record of one source pointing at a name string, with its resolved
/// classification. Three origins share this shape: accepted taxa, synonyms,
/// and bare names.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::name_string_indices, treat_none_as_default_value = false)]
pub struct NameStringIndex {
    pub data_source_id: i32,
    pub record_id: String,
    pub name_string_id: Uuid,
    pub outlink_id: String,
    pub global_id: String,
    pub name_id: String,
    pub local_id: String,
    pub code_id: i16,
    pub rank: String,
    pub taxonomic_status: String,
    pub accepted_record_id: String,
    pub classification: String,
    pub classification_ids: String,
    pub classification_ranks: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::vernacular_strings)]
pub struct VernacularString {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::vernacular_string_indices, treat_none_as_default_value = false)]
pub struct VernacularStringIndex {
    pub data_source_id: i32,
    pub record_id: String,
    pub vernacular_string_id: Uuid,
    pub language: String,
    pub lang_code: String,
    pub locality: String,
    pub country_code: String,
    pub preferred: bool,
}

/// The per-source metadata row: catalog descriptor merged with archive
/// metadata and the warehouse record counts.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::data_sources)]
pub struct DataSource {
    pub id: i32,
    pub title: String,
    pub title_short: String,
    pub description: String,
    pub data_source_type: String,
    pub version: String,
    pub revision_date: String,
    pub doi: String,
    pub home_url: String,
    pub data_url: String,
    pub outlink_url: String,
    pub is_outlink_ready: bool,
    pub is_curated: bool,
    pub is_auto_curated: bool,
    pub has_classification: bool,
    pub record_count: i64,
    pub vernacular_record_count: i64,
    pub updated_at: DateTime<Utc>,
}

/// Nomenclatural code encoding shared by the warehouse and the verifier.
pub fn code_id(code: &str) -> i16 {
    match code.trim().to_lowercase().as_str() {
        "zoological" => 1,
        "botanical" => 2,
        "bacterial" => 3,
        "virus" => 4,
        _ => 0,
    }
}
