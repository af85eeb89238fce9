//! Row decoders.
//!
//! A [`RowDecoder`] turns one backend row into a caller value. Any
//! `Fn(&Row) -> Result<T, E>` is a decoder; [`DelimitedRowDecoder`] renders
//! rows as `|`-joined text lines, optionally driven by a declared schema
//! whose column types decide how each value is checked and rendered.

use std::fmt::Display;

use sqlx::postgres::PgRow;
use sqlx::{Column as _, Row};

use crate::error::ConnectorError;

pub const DELIMITER: &str = "|";

/// Rendering used for SQL NULL.
pub const NULL_TEXT: &str = "null";

pub trait RowDecoder<R> {
    type Output;

    fn decode(&self, row: &R) -> Result<Self::Output, String>;
}

impl<R, T, E, F> RowDecoder<R> for F
where
    F: Fn(&R) -> Result<T, E>,
    E: Display,
{
    type Output = T;

    fn decode(&self, row: &R) -> Result<T, String> {
        self(row).map_err(|e| e.to_string())
    }
}

/// Column access by position or label, with every value read as text.
pub trait TextColumns {
    fn column_count(&self) -> usize;

    fn index_of(&self, label: &str) -> Option<usize>;

    fn text_at(&self, index: usize) -> Result<Option<String>, String>;
}

impl TextColumns for PgRow {
    fn column_count(&self) -> usize {
        self.len()
    }

    fn index_of(&self, label: &str) -> Option<usize> {
        self.columns()
            .iter()
            .position(|c| c.name().eq_ignore_ascii_case(label))
    }

    // Simple-protocol results are text-format, so any column decodes as a string.
    fn text_at(&self, index: usize) -> Result<Option<String>, String> {
        self.try_get_unchecked::<Option<String>, _>(index)
            .map_err(|e| e.to_string())
    }
}

/// A `label type` pair from a declared schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaColumn {
    pub label: String,
    pub sql_type: String,
}

impl SchemaColumn {
    pub fn kind(&self) -> ColumnKind {
        ColumnKind::from_sql_type(&self.sql_type)
    }
}

/// How a declared column type is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Int,
    Float,
    Double,
    Bool,
    Date,
    Text,
    /// Unrecognized types pass through as the server sent them.
    Other,
}

impl ColumnKind {
    /// Classify a lowercased type such as `varchar(20)` or `double precision`.
    pub fn from_sql_type(sql_type: &str) -> Self {
        let base = sql_type.split('(').next().unwrap_or_default().trim();
        match base {
            "int" | "integer" | "int2" | "int4" | "int8" | "smallint" | "bigint" | "serial"
            | "bigserial" => ColumnKind::Int,
            "float" | "float4" | "real" => ColumnKind::Float,
            "float8" | "double" | "double precision" => ColumnKind::Double,
            "bool" | "boolean" => ColumnKind::Bool,
            "date" => ColumnKind::Date,
            t if t.contains("char") || t.contains("text") => ColumnKind::Text,
            _ => ColumnKind::Other,
        }
    }

    /// Check a non-null text value against this kind and render it.
    pub fn render(self, text: &str) -> Result<String, String> {
        let value = text.trim();
        match self {
            ColumnKind::Int => value.parse::<i64>().map(|v| v.to_string()).map_err(|e| e.to_string()),
            ColumnKind::Float => value.parse::<f32>().map(|v| v.to_string()).map_err(|e| e.to_string()),
            ColumnKind::Double => value.parse::<f64>().map(|v| v.to_string()).map_err(|e| e.to_string()),
            ColumnKind::Bool => match value.to_ascii_lowercase().as_str() {
                "t" | "true" => Ok("true".to_string()),
                "f" | "false" => Ok("false".to_string()),
                other => Err(format!("'{}' is not a boolean", other)),
            },
            ColumnKind::Date | ColumnKind::Text | ColumnKind::Other => Ok(text.to_string()),
        }
    }
}

/// Parse `"id int, name varchar(20)"` into labelled columns. Labels and
/// types are lowercased.
pub fn parse_schema(schema: &str) -> Result<Vec<SchemaColumn>, ConnectorError> {
    schema
        .split(',')
        .map(|descriptor| {
            let mut parts = descriptor.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some(label), Some(_)) => {
                    let sql_type = descriptor
                        .trim()
                        .strip_prefix(label)
                        .unwrap_or_default()
                        .trim()
                        .to_lowercase();
                    Ok(SchemaColumn {
                        label: label.to_lowercase(),
                        sql_type,
                    })
                }
                _ => Err(ConnectorError::Config(format!(
                    "schema entry '{}' must be '<name> <type>'",
                    descriptor.trim()
                ))),
            }
        })
        .collect()
}

/// Join already-extracted values into one delimited line.
pub fn render_delimited(values: &[Option<String>]) -> String {
    values
        .iter()
        .map(|v| v.as_deref().unwrap_or(NULL_TEXT))
        .collect::<Vec<_>>()
        .join(DELIMITER)
}

/// Renders each row as a `|`-delimited text line.
///
/// Without a schema every column of the row is emitted in result order.
/// With one, the named columns are emitted in schema order and each value
/// is rendered by its declared type. A row missing a named column, or
/// holding a value its type cannot parse, fails to decode.
#[derive(Debug, Clone, Default)]
pub struct DelimitedRowDecoder {
    columns: Option<Vec<SchemaColumn>>,
}

impl DelimitedRowDecoder {
    pub fn positional() -> Self {
        Self { columns: None }
    }

    pub fn from_schema(schema: &str) -> Result<Self, ConnectorError> {
        Ok(Self {
            columns: Some(parse_schema(schema)?),
        })
    }

    pub fn columns(&self) -> Option<&[SchemaColumn]> {
        self.columns.as_deref()
    }
}

impl<R: TextColumns> RowDecoder<R> for DelimitedRowDecoder {
    type Output = String;

    fn decode(&self, row: &R) -> Result<String, String> {
        let values = match &self.columns {
            None => (0..row.column_count())
                .map(|i| row.text_at(i))
                .collect::<Result<Vec<_>, _>>()?,
            Some(columns) => columns
                .iter()
                .map(|c| {
                    let index = row
                        .index_of(&c.label)
                        .ok_or_else(|| format!("column '{}' not in result", c.label))?;
                    match row.text_at(index)? {
                        Some(text) => c.kind().render(&text).map(Some).map_err(|e| {
                            format!("column '{}' of type {}: {}", c.label, c.sql_type, e)
                        }),
                        None => Ok(None),
                    }
                })
                .collect::<Result<Vec<_>, _>>()?,
        };
        Ok(render_delimited(&values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(Vec<(&'static str, Option<&'static str>)>);

    impl TextColumns for Named {
        fn column_count(&self) -> usize {
            self.0.len()
        }

        fn index_of(&self, label: &str) -> Option<usize> {
            self.0.iter().position(|(n, _)| *n == label)
        }

        fn text_at(&self, index: usize) -> Result<Option<String>, String> {
            self.0
                .get(index)
                .map(|(_, v)| v.map(str::to_string))
                .ok_or_else(|| format!("no column {}", index))
        }
    }

    #[test]
    fn parses_schema_descriptors() {
        let cols = parse_schema("ID int,  Name   varchar(20) , score DOUBLE PRECISION").unwrap();
        assert_eq!(cols.len(), 3);
        assert_eq!(cols[0], SchemaColumn { label: "id".into(), sql_type: "int".into() });
        assert_eq!(cols[1].label, "name");
        assert_eq!(cols[1].sql_type, "varchar(20)");
        assert_eq!(cols[2].sql_type, "double precision");
    }

    #[test]
    fn schema_entry_without_type_is_rejected() {
        assert!(matches!(parse_schema("id int, name"), Err(ConnectorError::Config(_))));
    }

    #[test]
    fn positional_renders_every_column_with_nulls() {
        let row = Named(vec![("id", Some("7")), ("name", None), ("city", Some("oslo"))]);
        let line = DelimitedRowDecoder::positional().decode(&row).unwrap();
        assert_eq!(line, "7|null|oslo");
    }

    #[test]
    fn schema_selects_and_orders_columns() {
        let row = Named(vec![("id", Some("7")), ("name", Some("ada")), ("extra", Some("x"))]);
        let decoder = DelimitedRowDecoder::from_schema("name varchar, id int").unwrap();
        assert_eq!(decoder.decode(&row).unwrap(), "ada|7");
    }

    #[test]
    fn schema_column_missing_from_row_fails() {
        let row = Named(vec![("id", Some("7"))]);
        let decoder = DelimitedRowDecoder::from_schema("id int, name varchar").unwrap();
        let err = decoder.decode(&row).unwrap_err();
        assert!(err.contains("name"));
    }

    #[test]
    fn declared_types_classify_columns() {
        let kinds: Vec<ColumnKind> = parse_schema(
            "a int, b bigint, c real, d double precision, e varchar(20), f text, g date, h boolean, i numeric(10,2)",
        )
        .unwrap()
        .iter()
        .map(SchemaColumn::kind)
        .collect();
        assert_eq!(
            kinds,
            vec![
                ColumnKind::Int,
                ColumnKind::Int,
                ColumnKind::Float,
                ColumnKind::Double,
                ColumnKind::Text,
                ColumnKind::Text,
                ColumnKind::Date,
                ColumnKind::Bool,
                ColumnKind::Other,
            ]
        );
    }

    #[test]
    fn values_are_rendered_by_declared_type() {
        let row = Named(vec![
            ("id", Some("007")),
            ("score", Some("2.50")),
            ("active", Some("t")),
            ("day", Some("2024-03-01")),
            ("note", None),
            ("total", Some("10.00")),
        ]);
        let decoder = DelimitedRowDecoder::from_schema(
            "id int, score double precision, active bool, day date, note text, total numeric(10,2)",
        )
        .unwrap();
        assert_eq!(decoder.decode(&row).unwrap(), "7|2.5|true|2024-03-01|null|10.00");
    }

    #[test]
    fn value_not_matching_declared_type_fails() {
        let row = Named(vec![("id", Some("seven"))]);
        let decoder = DelimitedRowDecoder::from_schema("id integer").unwrap();
        let err = decoder.decode(&row).unwrap_err();
        assert!(err.contains("column 'id' of type integer"), "{err}");
    }

    #[test]
    fn closures_are_decoders() {
        let decoder = |row: &i64| -> Result<i64, String> {
            if *row < 0 {
                Err(format!("negative value {}", row))
            } else {
                Ok(row * 2)
            }
        };
        assert_eq!(decoder.decode(&21).unwrap(), 42);
        assert_eq!(decoder.decode(&-1).unwrap_err(), "negative value -1");
    }
}
