//! Aggregation tables loaded from definition files, materialized per unit
//! and rendered to DDL and their populating SELECT.

use std::fs;

use etl_dbentity::prelude::*;
use serde_json::json;

fn unit_variables(unit: &str) -> VariableMap {
    VariableMap::from([
        ("AGGREGATION_UNIT".to_string(), unit.to_string()),
        ("SOURCE_SCHEMA".to_string(), "modw".to_string()),
    ])
}

/// Writes the definition and its macro into a temporary directory.
fn write_definition(dir: &tempfile::TempDir) -> std::path::PathBuf {
    fs::create_dir_all(dir.path().join("macros")).unwrap();
    fs::write(
        dir.path().join("macros/wallclock.sql"),
        "-- wall time in hours\nSUM(${column}) / 3600.0",
    )
    .unwrap();

    let definition = json!({
        "table_definition": {
            "name": "jobfact_by_",
            "schema": "modw_aggregates",
            "engine": "InnoDB",
            "columns": [
                ["${AGGREGATION_UNIT}_id", "int(10) unsigned", "not null"],
                ["resource_id", "int(11)", "not null"],
                ["job_count", "int(11)", "not null", 0],
                ["wallclock_hours", "decimal(18,4)", "null"]
            ],
            "indexes": [
                {"name": "PRIMARY", "columns": ["${AGGREGATION_UNIT}_id", "resource_id"]}
            ]
        },
        "source_query": {
            "records": {
                "${AGGREGATION_UNIT}_id": "p.id",
                "resource_id": "jf.resource_id",
                "job_count": "COUNT(*)",
                "wallclock_hours": "${wallclock}"
            },
            "joins": [
                {"name": "jobfact", "schema": "${SOURCE_SCHEMA}", "alias": "jf"},
                {"name": "${AGGREGATION_UNIT}s", "schema": "${SOURCE_SCHEMA}", "alias": "p",
                 "on": "jf.end_ts BETWEEN p.start_ts AND p.end_ts"}
            ],
            "groupby": ["p.id", "jf.resource_id"],
            "macros": [
                {"name": "wallclock", "file": "wallclock.sql", "args": {"column": "jf.wallduration"}}
            ],
            "overseer_restrictions": {
                "last_modified": "jf.last_modified >= ${VALUE}"
            }
        }
    });
    let path = dir.path().join("jobfact_by.json");
    fs::write(&path, serde_json::to_string_pretty(&definition).unwrap()).unwrap();
    path
}

fn load(dir: &tempfile::TempDir) -> AggregationTable {
    let path = write_definition(dir);
    let options = ModelOptions::new().with_macro_dir(dir.path().join("macros"));
    AggregationTable::from_file(&path, &options).unwrap()
}

#[test]
fn test_unit_materializes_table() {
    let dir = tempfile::tempdir().unwrap();
    let mut agg = load(&dir);
    assert!(matches!(agg.create_sql(true), Err(DbEntityError::AggregationUnitNotSet(_))));

    agg.set_aggregation_unit("month").unwrap();
    let month = agg.copy_and_apply_variables(&unit_variables("month")).unwrap();
    month.verify().unwrap();

    assert_eq!(
        month.create_sql(true).unwrap(),
        vec![
            "CREATE TABLE IF NOT EXISTS `modw_aggregates`.`jobfact_by_month` (\n  \
             `month_id` int(10) unsigned NOT NULL,\n  \
             `resource_id` int(11) NOT NULL,\n  \
             `job_count` int(11) NOT NULL DEFAULT 0,\n  \
             `wallclock_hours` decimal(18,4) NULL,\n  \
             PRIMARY KEY (`month_id`, `resource_id`)\n\
             ) ENGINE = InnoDB;"
                .to_string()
        ]
    );
}

#[test]
fn test_select_for_unit() {
    let dir = tempfile::tempdir().unwrap();
    let mut agg = load(&dir);
    agg.set_aggregation_unit("day").unwrap();
    let day = agg.copy_and_apply_variables(&unit_variables("day")).unwrap();

    let mut query = day.query().unwrap().clone();
    let values = VariableMap::from([("last_modified".to_string(), "'2024-06-01'".to_string())]);
    assert_eq!(query.apply_overseer_restrictions(&values).unwrap(), 1);

    assert_eq!(
        query.select_sql(true).unwrap(),
        "SELECT\n\
         p.id AS day_id,\n\
         jf.resource_id AS resource_id,\n\
         COUNT(*) AS job_count,\n\
         SUM(jf.wallduration) / 3600.0 AS wallclock_hours\n\
         FROM `modw`.`jobfact` AS jf\n\
         JOIN `modw`.`days` AS p ON jf.end_ts BETWEEN p.start_ts AND p.end_ts\n\
         WHERE jf.last_modified >= '2024-06-01'\n\
         GROUP BY p.id, jf.resource_id"
    );
}

#[test]
fn test_existing_unit_table_is_reconciled() {
    let dir = tempfile::tempdir().unwrap();
    let mut agg = load(&dir);
    agg.set_aggregation_unit("year").unwrap();
    let year = agg.copy_and_apply_variables(&unit_variables("year")).unwrap();

    let current = Table::from_json(
        &json!({
            "name": "jobfact_by_year",
            "schema": "modw_aggregates",
            "engine": "InnoDB",
            "columns": [
                ["year_id", "int(10) unsigned", "not null"],
                ["resource_id", "int(11)", "not null"],
                ["job_count", "int(11)", "not null", "0"]
            ],
            "indexes": [{"name": "PRIMARY", "columns": ["year_id"]}]
        }),
        &ModelOptions::default(),
    )
    .unwrap();

    assert_eq!(
        year.table().unwrap().create_sql(false).unwrap().len(),
        1,
        "no triggers declared"
    );
    assert_eq!(
        current.alter_sql(year.table().unwrap(), true),
        vec![
            "ALTER TABLE `modw_aggregates`.`jobfact_by_year`\n\
             ADD COLUMN `wallclock_hours` decimal(18,4) NULL,\n\
             DROP PRIMARY KEY,\n\
             ADD PRIMARY KEY (`year_id`, `resource_id`);"
                .to_string()
        ]
    );
}

#[test]
fn test_missing_macro_file_fails_at_parse() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_definition(&dir);
    let options = ModelOptions::new().with_macro_dir(dir.path());
    let err = AggregationTable::from_file(&path, &options).unwrap_err();
    assert!(matches!(err, DbEntityError::Macro { ref name, .. } if name == "wallclock"));
    assert!(err.is_configuration());
}
