//! SQL statement builders
//!
//! Values are always bound as parameters. Identifiers (schema, table and
//! column names) come from configuration and introspection and are quoted,
//! never taken from row data.

use factsync_core::{find_column, ColumnDescriptor, ID_COLUMN};

use crate::adapter::TimestampColumns;

/// Alias of the bigint record id in staging scans
pub const RECORD_ID_ALIAS: &str = "__record_id";

/// Alias of the baseline-presence flag in staging scans
pub const IS_NEW_ALIAS: &str = "__is_new_record";

/// Alias of the timestamp heuristic in staging scans
pub const HINT_ALIAS: &str = "__timestamp_hint";

/// Number of leading synthetic columns in a staging scan
pub const STAGING_PREFIX_COLUMNS: usize = 3;

/// Quote an identifier, doubling embedded quotes
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// `"schema"."table"`
pub fn qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// Column introspection query; `$1` is the schema, `$2` the table
pub fn describe_columns_query() -> &'static str {
    r#"
        SELECT
            column_name::text,
            data_type::text,
            ordinal_position::int,
            is_nullable::text,
            udt_name::text
        FROM information_schema.columns
        WHERE table_schema = $1
          AND table_name = $2
        ORDER BY ordinal_position
    "#
}

/// Every staging row left-joined to the baseline on id
///
/// Result layout: record id (bigint), is-new flag (bool), timestamp hint
/// (text or NULL), then each column of `columns` as text, in order.
pub fn staging_scan(
    staging_schema: &str,
    baseline_schema: &str,
    table: &str,
    columns: &[ColumnDescriptor],
    timestamps: &TimestampColumns,
) -> String {
    let id = quote_ident(ID_COLUMN);
    let created = find_column(columns, &timestamps.created).map(|c| quote_ident(&c.name));
    let updated = find_column(columns, &timestamps.updated).map(|c| quote_ident(&c.name));

    let hint = match (&created, &updated) {
        (Some(created), Some(updated)) => format!(
            "CASE WHEN s.{} = s.{} THEN 'INSERT' ELSE 'UPDATE' END",
            created, updated
        ),
        _ => "NULL::text".to_string(),
    };

    let mut select = vec![
        format!("s.{}::bigint AS {}", id, quote_ident(RECORD_ID_ALIAS)),
        format!("(b.{} IS NULL) AS {}", id, quote_ident(IS_NEW_ALIAS)),
        format!("{} AS {}", hint, quote_ident(HINT_ALIAS)),
    ];
    select.extend(columns.iter().map(|c| {
        let name = quote_ident(&c.name);
        format!("s.{}::text AS {}", name, name)
    }));

    let order = match &updated {
        Some(updated) => format!("s.{} DESC", updated),
        None => format!("s.{} DESC", id),
    };

    format!(
        "SELECT {} FROM {} s LEFT JOIN {} b ON s.{} = b.{} ORDER BY {}",
        select.join(", "),
        qualified(staging_schema, table),
        qualified(baseline_schema, table),
        id,
        id,
        order
    )
}

/// One baseline row by id (`$1`, bigint), each column as text
pub fn baseline_row(baseline_schema: &str, table: &str, columns: &[ColumnDescriptor]) -> String {
    let select: Vec<String> = columns
        .iter()
        .map(|c| {
            let name = quote_ident(&c.name);
            format!("{}::text AS {}", name, name)
        })
        .collect();

    format!(
        "SELECT {} FROM {} WHERE {} = $1::bigint",
        select.join(", "),
        qualified(baseline_schema, table),
        quote_ident(ID_COLUMN)
    )
}

/// Cast a text parameter back to the column's type
fn typed_param(index: usize, column: &ColumnDescriptor) -> String {
    format!("CAST(${}::text AS {})", index, quote_ident(&column.sql_type))
}

/// Insert-or-overwrite of one row
///
/// Parameters are every column of `columns`, in order, as text.
pub fn upsert(baseline_schema: &str, table: &str, columns: &[ColumnDescriptor]) -> String {
    let names: Vec<String> = columns.iter().map(|c| quote_ident(&c.name)).collect();
    let values: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| typed_param(i + 1, c))
        .collect();
    let assignments: Vec<String> = columns
        .iter()
        .filter(|c| c.name != ID_COLUMN)
        .map(|c| {
            let name = quote_ident(&c.name);
            format!("{} = EXCLUDED.{}", name, name)
        })
        .collect();

    let on_conflict = if assignments.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", assignments.join(", "))
    };

    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) {}",
        qualified(baseline_schema, table),
        names.join(", "),
        values.join(", "),
        quote_ident(ID_COLUMN),
        on_conflict
    )
}

/// Update of every non-id column by id
///
/// Parameters are the non-id columns of `columns`, in order, as text,
/// followed by the id as bigint. `None` when there is nothing to set.
pub fn update(baseline_schema: &str, table: &str, columns: &[ColumnDescriptor]) -> Option<String> {
    let targets: Vec<&ColumnDescriptor> = columns.iter().filter(|c| c.name != ID_COLUMN).collect();
    if targets.is_empty() {
        return None;
    }

    let assignments: Vec<String> = targets
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = {}", quote_ident(&c.name), typed_param(i + 1, c)))
        .collect();

    Some(format!(
        "UPDATE {} SET {} WHERE {} = ${}::bigint",
        qualified(baseline_schema, table),
        assignments.join(", "),
        quote_ident(ID_COLUMN),
        targets.len() + 1
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("id", "integer", 1).with_sql_type("int4"),
            ColumnDescriptor::new("email", "character varying", 2).with_sql_type("varchar"),
            ColumnDescriptor::new("created_at", "timestamp without time zone", 3).with_sql_type("timestamp"),
            ColumnDescriptor::new("updated_at", "timestamp without time zone", 4).with_sql_type("timestamp"),
        ]
    }

    #[test]
    fn identifier_quoting() {
        assert_eq!(quote_ident("email"), "\"email\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(qualified("staging", "companies"), "\"staging\".\"companies\"");
    }

    #[test]
    fn staging_scan_with_timestamps() {
        let sql = staging_scan("staging", "public", "companies", &columns(), &TimestampColumns::default());

        assert!(sql.starts_with("SELECT s.\"id\"::bigint AS \"__record_id\", (b.\"id\" IS NULL) AS \"__is_new_record\""));
        assert!(sql.contains("CASE WHEN s.\"created_at\" = s.\"updated_at\" THEN 'INSERT' ELSE 'UPDATE' END"));
        assert!(sql.contains("s.\"email\"::text AS \"email\""));
        assert!(sql.contains("FROM \"staging\".\"companies\" s LEFT JOIN \"public\".\"companies\" b ON s.\"id\" = b.\"id\""));
        assert!(sql.ends_with("ORDER BY s.\"updated_at\" DESC"));
    }

    #[test]
    fn staging_scan_without_timestamps() {
        let cols: Vec<ColumnDescriptor> = columns().into_iter().take(2).collect();
        let sql = staging_scan("staging", "public", "tags", &cols, &TimestampColumns::default());

        assert!(sql.contains("NULL::text AS \"__timestamp_hint\""));
        assert!(sql.ends_with("ORDER BY s.\"id\" DESC"));
    }

    #[test]
    fn baseline_row_binds_id() {
        let sql = baseline_row("public", "companies", &columns());
        assert!(sql.starts_with("SELECT \"id\"::text AS \"id\", \"email\"::text AS \"email\""));
        assert!(sql.ends_with("FROM \"public\".\"companies\" WHERE \"id\" = $1::bigint"));
    }

    #[test]
    fn upsert_overwrites_non_id_columns() {
        let sql = upsert("public", "companies", &columns());

        assert!(sql.starts_with("INSERT INTO \"public\".\"companies\" (\"id\", \"email\", \"created_at\", \"updated_at\")"));
        assert!(sql.contains("VALUES (CAST($1::text AS \"int4\"), CAST($2::text AS \"varchar\")"));
        assert!(sql.contains("ON CONFLICT (\"id\") DO UPDATE SET \"email\" = EXCLUDED.\"email\""));
        assert!(!sql.contains("\"id\" = EXCLUDED.\"id\""));
    }

    #[test]
    fn upsert_with_only_id_does_nothing_on_conflict() {
        let cols: Vec<ColumnDescriptor> = columns().into_iter().take(1).collect();
        assert!(upsert("public", "t", &cols).ends_with("ON CONFLICT (\"id\") DO NOTHING"));
    }

    #[test]
    fn update_sets_non_id_columns() {
        let sql = update("public", "companies", &columns()).unwrap();

        assert!(sql.starts_with("UPDATE \"public\".\"companies\" SET \"email\" = CAST($1::text AS \"varchar\")"));
        assert!(sql.ends_with("WHERE \"id\" = $4::bigint"));

        let only_id: Vec<ColumnDescriptor> = columns().into_iter().take(1).collect();
        assert!(update("public", "companies", &only_id).is_none());
    }
}
