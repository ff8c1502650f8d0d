/// Schema DDL for the project-isolated property graph.
///
/// Every entity table carries a `project_id` field and a composite
/// unique index keyed on it. Record ids are derived deterministically
/// from the same key (see `ids::*`), so a `store_parsed_code` re-run
/// upserts by id rather than racing the unique index — the index
/// exists to catch the one case that matters: pre-isolation legacy
/// rows sharing a key with no `project_id` at all, which trigger the
/// delete-legacy-then-retry recovery path in `store.rs`.
pub const NODE_AND_EDGE_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS file SCHEMALESS;
DEFINE FIELD IF NOT EXISTS project_id ON TABLE file TYPE string;
DEFINE FIELD IF NOT EXISTS path ON TABLE file TYPE string;
DEFINE FIELD IF NOT EXISTS name ON TABLE file TYPE string;
DEFINE FIELD IF NOT EXISTS language ON TABLE file TYPE string DEFAULT 'c';
DEFINE FIELD IF NOT EXISTS size ON TABLE file TYPE number DEFAULT 0;
DEFINE FIELD IF NOT EXISTS last_modified ON TABLE file TYPE datetime;
DEFINE FIELD IF NOT EXISTS last_updated ON TABLE file TYPE datetime DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_file_unique ON TABLE file COLUMNS project_id, path UNIQUE;
DEFINE INDEX IF NOT EXISTS idx_file_name ON TABLE file COLUMNS name;

DEFINE TABLE IF NOT EXISTS function SCHEMALESS;
DEFINE FIELD IF NOT EXISTS project_id ON TABLE function TYPE string;
DEFINE FIELD IF NOT EXISTS name ON TABLE function TYPE string;
DEFINE FIELD IF NOT EXISTS file_path ON TABLE function TYPE string;
DEFINE FIELD IF NOT EXISTS start_line ON TABLE function TYPE number;
DEFINE FIELD IF NOT EXISTS end_line ON TABLE function TYPE number;
DEFINE FIELD IF NOT EXISTS docstring ON TABLE function TYPE option<string>;
DEFINE FIELD IF NOT EXISTS parameters ON TABLE function TYPE array<string> DEFAULT [];
DEFINE FIELD IF NOT EXISTS return_type ON TABLE function TYPE string DEFAULT 'void';
DEFINE FIELD IF NOT EXISTS code ON TABLE function TYPE option<string>;
DEFINE FIELD IF NOT EXISTS last_updated ON TABLE function TYPE datetime DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_function_unique ON TABLE function COLUMNS project_id, name, file_path UNIQUE;
DEFINE INDEX IF NOT EXISTS idx_function_name ON TABLE function COLUMNS name;

DEFINE TABLE IF NOT EXISTS module SCHEMALESS;
DEFINE FIELD IF NOT EXISTS project_id ON TABLE module TYPE string;
DEFINE FIELD IF NOT EXISTS name ON TABLE module TYPE string;
DEFINE INDEX IF NOT EXISTS idx_module_unique ON TABLE module COLUMNS project_id, name UNIQUE;

DEFINE TABLE IF NOT EXISTS calls SCHEMALESS TYPE RELATION FROM function TO function;
DEFINE FIELD IF NOT EXISTS project_id ON TABLE calls TYPE string;
DEFINE FIELD IF NOT EXISTS call_type ON TABLE calls TYPE string;
DEFINE FIELD IF NOT EXISTS line_number ON TABLE calls TYPE number;
DEFINE FIELD IF NOT EXISTS context ON TABLE calls TYPE option<string>;
DEFINE FIELD IF NOT EXISTS last_updated ON TABLE calls TYPE datetime DEFAULT time::now();

DEFINE TABLE IF NOT EXISTS depends_on SCHEMALESS;
DEFINE FIELD IF NOT EXISTS in ON TABLE depends_on TYPE record;
DEFINE FIELD IF NOT EXISTS out ON TABLE depends_on TYPE record;
DEFINE FIELD IF NOT EXISTS project_id ON TABLE depends_on TYPE string;
DEFINE FIELD IF NOT EXISTS dependency_type ON TABLE depends_on TYPE string DEFAULT 'include';
DEFINE FIELD IF NOT EXISTS is_system ON TABLE depends_on TYPE option<bool>;
DEFINE FIELD IF NOT EXISTS line_number ON TABLE depends_on TYPE option<number>;
DEFINE FIELD IF NOT EXISTS file_count ON TABLE depends_on TYPE option<number>;
DEFINE FIELD IF NOT EXISTS strength ON TABLE depends_on TYPE option<float>;
DEFINE FIELD IF NOT EXISTS is_circular ON TABLE depends_on TYPE option<bool>;
DEFINE FIELD IF NOT EXISTS scope ON TABLE depends_on TYPE string;

DEFINE TABLE IF NOT EXISTS contains SCHEMALESS TYPE RELATION FROM file TO function;
DEFINE FIELD IF NOT EXISTS project_id ON TABLE contains TYPE string;

DEFINE TABLE IF NOT EXISTS belongs_to SCHEMALESS TYPE RELATION FROM file TO module;
DEFINE FIELD IF NOT EXISTS project_id ON TABLE belongs_to TYPE string;
"#;

/// Legacy (pre-project-isolation) index names this crate used to define
/// on `file`/`function`/`module` before `project_id` joined the key.
/// Dropped unconditionally at init time: pre-existing non-isolated
/// constraints should never survive a schema init.
pub const LEGACY_INDEXES: &[(&str, &str)] = &[
    ("file", "idx_file_path_only"),
    ("function", "idx_function_name_file_only"),
    ("module", "idx_module_name_only"),
];

pub fn drop_legacy_indexes_statement() -> String {
    LEGACY_INDEXES
        .iter()
        .map(|(table, index)| format!("REMOVE INDEX IF EXISTS {index} ON TABLE {table};"))
        .collect::<Vec<_>>()
        .join("\n")
}
