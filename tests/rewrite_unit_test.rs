//! Rewrite pipeline tests using the public stage types.

use sql_cleaner::metadata::{TableInfo, TableMetadata};
use sql_cleaner::reassembler::{Unit, UnitKind, UnitMeta};
use sql_cleaner::rewrite::{
    CreateTableAugment, DdlSanitize, DropSuppress, Pipeline, PipelineState, TimeZoneNormalize,
};
use sql_cleaner::warnings::CleanWarning;
use std::sync::Arc;

const STATEMENT: UnitMeta = UnitMeta {
    kind: UnitKind::Statement,
    at_line_start: true,
};

fn full_pipeline(metadata: TableMetadata, default_schema: Option<&str>) -> Pipeline {
    let state = PipelineState::new(Arc::new(metadata), default_schema.map(String::from));
    Pipeline::new(state)
        .with_stage(CreateTableAugment::new())
        .with_stage(TimeZoneNormalize::new())
        .with_stage(DropSuppress::new())
        .with_stage(DdlSanitize::new())
}

fn run(pipeline: &mut Pipeline, statements: &[&str]) -> String {
    statements
        .iter()
        .map(|text| {
            pipeline
                .process(Unit {
                    text,
                    meta: STATEMENT,
                })
                .into_owned()
        })
        .collect()
}

fn innodb(collation: &str) -> TableInfo {
    TableInfo {
        engine: Some("InnoDB".to_string()),
        row_format: None,
        collation: Some(collation.to_string()),
    }
}

#[test]
fn test_stage_order() {
    let pipeline = full_pipeline(TableMetadata::new(), None);
    assert_eq!(
        pipeline.stage_names(),
        vec!["create-table", "time-zone", "drop", "ddl-sanitize"]
    );
}

#[test]
fn test_view_placeholder_seen_before_drop_is_removed() {
    let mut meta = TableMetadata::new();
    meta.insert("shop", "v", innodb("utf8mb4_bin"));
    meta.insert("shop", "t", innodb("utf8mb4_bin"));
    let mut pipeline = full_pipeline(meta, None);

    let out = run(
        &mut pipeline,
        &[
            "USE `shop`;\n",
            "DROP VIEW IF EXISTS `v`;\n",
            "CREATE TABLE `v` (\n  `id` tinyint NOT NULL\n) ENGINE=MyISAM;\n",
            "CREATE TABLE `t` (\n  `id` int NOT NULL AUTO_INCREMENT\n) AUTO_INCREMENT=9;\n",
        ],
    );

    assert_eq!(
        out,
        "USE `shop`;\n\
         CREATE TABLE `v` (\n  `id` tinyint NOT NULL\n) ENGINE=MyISAM;\n\
         CREATE TABLE `t` (\n  `id` int NOT NULL AUTO_INCREMENT\n) AUTO_INCREMENT=0 ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_bin;\n"
    );

    let state = pipeline.into_state();
    assert_eq!(state.stats.tables_augmented, 1);
    assert_eq!(state.stats.drops_suppressed, 1);
    assert_eq!(state.stats.values_sanitized, 1);
    assert_eq!(state.current_schema.as_deref(), Some("shop"));
}

#[test]
fn test_use_switches_lookup_schema() {
    let mut meta = TableMetadata::new();
    meta.insert("a", "t", innodb("latin1_swedish_ci"));
    meta.insert("b", "t", innodb("utf8mb4_general_ci"));
    let mut pipeline = full_pipeline(meta, Some("a"));

    let out = run(
        &mut pipeline,
        &["CREATE TABLE t (x int);\n", "USE b;\n", "CREATE TABLE t (x int);\n"],
    );
    assert_eq!(
        out,
        "CREATE TABLE t (x int) ENGINE=InnoDB DEFAULT CHARSET=latin1 COLLATE=latin1_swedish_ci;\n\
         USE b;\n\
         CREATE TABLE t (x int) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_general_ci;\n"
    );
}

#[test]
fn test_ambiguous_table_warns() {
    let mut meta = TableMetadata::new();
    meta.insert("a", "t", innodb("utf8mb4_bin"));
    meta.insert("b", "t", innodb("utf8mb4_bin"));
    let mut pipeline = full_pipeline(meta, None);

    let input = "CREATE TABLE `t` (x int);\n";
    assert_eq!(run(&mut pipeline, &[input]), input);
    assert_eq!(
        pipeline.state().warnings.warnings(),
        &[CleanWarning::AmbiguousTable {
            table: "t".to_string(),
            candidates: 2,
        }]
    );
}

#[test]
fn test_augmented_statement_is_stable() {
    let mut meta = TableMetadata::new();
    meta.insert("db", "t", innodb("utf8mb4_unicode_ci"));

    let input = "CREATE TABLE `t` (`id` int\n) ENGINE=InnoDB;\n";
    let once = run(&mut full_pipeline(meta.clone(), Some("db")), &[input]);
    let twice = run(&mut full_pipeline(meta, Some("db")), &[once.as_str()]);
    assert_eq!(once, twice);
}
