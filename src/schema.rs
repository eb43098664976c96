diesel::table! {
    name_strings (id) {
        id -> Uuid,
        name -> Text,
    }
}

diesel::table! {
    name_string_indices (data_source_id, record_id) {
        data_source_id -> Int4,
        record_id -> Text,
        name_string_id -> Uuid,
        outlink_id -> Text,
        global_id -> Text,
        name_id -> Text,
        local_id -> Text,
        code_id -> Int2,
        rank -> Text,
        taxonomic_status -> Text,
        accepted_record_id -> Text,
        classification -> Text,
        classification_ids -> Text,
        classification_ranks -> Text,
    }
}

diesel::table! {
    vernacular_strings (id) {
        id -> Uuid,
        name -> Text,
    }
}

diesel::table! {
    vernacular_string_indices (data_source_id, record_id, vernacular_string_id) {
        data_source_id -> Int4,
        record_id -> Text,
        vernacular_string_id -> Uuid,
        language -> Text,
        lang_code -> Text,
        locality -> Text,
        country_code -> Text,
        preferred -> Bool,
    }
}

diesel::table! {
    data_sources (id) {
        id -> Int4,
        title -> Text,
        title_short -> Text,
        description -> Text,
        data_source_type -> Text,
        version -> Text,
        revision_date -> Text,
        doi -> Text,
        home_url -> Text,
        data_url -> Text,
        outlink_url -> Text,
        is_outlink_ready -> Bool,
        is_curated -> Bool,
        is_auto_curated -> Bool,
        has_classification -> Bool,
        record_count -> Int8,
        vernacular_record_count -> Int8,
        updated_at -> Timestamptz,
    }
}
