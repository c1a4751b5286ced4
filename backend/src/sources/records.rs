//! Record sources: the match warehouse (Postgres) and CSV exports of it.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::{Number, Value};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Column, Row, TypeInfo};
use std::path::PathBuf;

use super::RecordSource;
use crate::compare::TIMESTAMP_FORMAT;
use crate::error::{SourceError, SourceResult};
use crate::models::{FlatRecord, FlatRecordSet};
use crate::parser;

/// One row per roster entry, match columns joined onto each.
///
/// The match id is bound as `$1`.
pub const MATCH_ROSTER_QUERY: &str = r#"
SELECT M.*,
       S.START_DATE, S.END_DATE, S.NAME AS SEASON_NAME,
       L.GENDER, L.AREA_ID, L.NAME AS LEAGUE_NAME,
       MTP.PLAYER_ID, MTP.GOALS, MTP.OWN_GOALS, MTP.RED_CARDS, MTP.SHIRT_NUMBER,
       MTP.YELLOW_CARDS, MTP.MINUTES_PLAYED, MTP.STARTING, MTP.POSITION_1,
       CASE WHEN MTP.TEAM_ID = M.HOME_TEAM_ID THEN 1 ELSE 0 END AS IS_HOME,
       TH.NAME AS HOME_TEAM_NAME,
       TA.NAME AS AWAY_TEAM_NAME
FROM MATCHES M
JOIN MATCH_TEAM_PLAYERS MTP ON M.MATCH_ID = MTP.MATCH_ID
JOIN SEASONS S ON M.SEASON_ID = S.SEASON_ID
JOIN LEAGUES L ON M.LEAGUE_ID = L.LEAGUE_ID
JOIN TEAMS TH ON M.HOME_TEAM_ID = TH.TEAM_ID
JOIN TEAMS TA ON M.AWAY_TEAM_ID = TA.TEAM_ID
WHERE M.MATCH_ID = $1
"#;

/// Reads joined match rows from Postgres.
///
/// Column names are upper-cased (Postgres folds unquoted identifiers to
/// lower case) so they line up with the mapping tables. `M.*` may carry
/// columns without a scalar mapping (NUMERIC, UUID, INTERVAL...); those are
/// dropped unless a mapping reads them.
#[derive(Debug, Clone)]
pub struct PgRecordSource {
    pool: PgPool,
    mapped: Vec<String>,
}

impl PgRecordSource {
    /// Connect with the driver's default pool settings.
    pub async fn connect(url: &str) -> SourceResult<Self> {
        let pool = PgPool::connect(url)
            .await
            .map_err(|e| SourceError::Database(e.to_string()))?;
        Ok(Self::new(pool))
    }

    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            mapped: Vec::new(),
        }
    }

    /// Columns the mapping tables read; see [`MappingConfig::source_fields`].
    ///
    /// [`MappingConfig::source_fields`]: crate::mapping::MappingConfig::source_fields
    pub fn with_mapped_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mapped = columns.into_iter().map(Into::into).collect();
        self
    }
}

impl RecordSource for PgRecordSource {
    async fn fetch_records(&self, match_id: i64) -> SourceResult<FlatRecordSet> {
        let rows = sqlx::query(MATCH_ROSTER_QUERY)
            .bind(match_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SourceError::Database(e.to_string()))?;

        let records = rows
            .iter()
            .map(|row| decode_row(row, &self.mapped))
            .collect::<SourceResult<Vec<_>>>()?;
        FlatRecordSet::from_rows(records).ok_or(SourceError::NoRecords(match_id))
    }
}

/// Postgres column types with a scalar mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Bool,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Text,
    Timestamp,
    TimestampTz,
    Date,
    Json,
}

impl ColumnKind {
    fn from_type_name(type_name: &str) -> Option<Self> {
        let kind = match type_name {
            "BOOL" => ColumnKind::Bool,
            "INT2" => ColumnKind::Int2,
            "INT4" => ColumnKind::Int4,
            "INT8" => ColumnKind::Int8,
            "FLOAT4" => ColumnKind::Float4,
            "FLOAT8" => ColumnKind::Float8,
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" => ColumnKind::Text,
            "TIMESTAMP" => ColumnKind::Timestamp,
            "TIMESTAMPTZ" => ColumnKind::TimestampTz,
            "DATE" => ColumnKind::Date,
            "JSON" | "JSONB" => ColumnKind::Json,
            _ => return None,
        };
        Some(kind)
    }
}

/// How to read one result column: `None` skips it.
///
/// A column without a scalar mapping is only an error when a mapping reads it.
fn column_kind(column: &str, type_name: &str, mapped: &[String]) -> SourceResult<Option<ColumnKind>> {
    match ColumnKind::from_type_name(type_name) {
        Some(kind) => Ok(Some(kind)),
        None if mapped.iter().any(|m| m == column) => Err(SourceError::UnsupportedColumn {
            column: column.to_string(),
            type_name: type_name.to_string(),
        }),
        None => Ok(None),
    }
}

fn decode_row(row: &PgRow, mapped: &[String]) -> SourceResult<FlatRecord> {
    row.columns()
        .iter()
        .filter_map(|column| {
            let name = column.name().to_uppercase();
            match column_kind(&name, column.type_info().name(), mapped) {
                Ok(Some(kind)) => Some(decode_column(row, column.ordinal(), &name, kind).map(|v| (name, v))),
                Ok(None) => None,
                Err(e) => Some(Err(e)),
            }
        })
        .collect()
}

/// Decode one column into a scalar.
fn decode_column(row: &PgRow, index: usize, name: &str, kind: ColumnKind) -> SourceResult<Value> {
    let db_err = |e: sqlx::Error| SourceError::Database(format!("column '{}': {}", name, e));

    let value = match kind {
        ColumnKind::Bool => row.try_get::<Option<bool>, _>(index).map_err(db_err)?.map(Value::Bool),
        ColumnKind::Int2 => row.try_get::<Option<i16>, _>(index).map_err(db_err)?.map(Value::from),
        ColumnKind::Int4 => row.try_get::<Option<i32>, _>(index).map_err(db_err)?.map(Value::from),
        ColumnKind::Int8 => row.try_get::<Option<i64>, _>(index).map_err(db_err)?.map(Value::from),
        ColumnKind::Float4 => row
            .try_get::<Option<f32>, _>(index)
            .map_err(db_err)?
            .and_then(|f| Number::from_f64(f64::from(f)))
            .map(Value::Number),
        ColumnKind::Float8 => row
            .try_get::<Option<f64>, _>(index)
            .map_err(db_err)?
            .and_then(Number::from_f64)
            .map(Value::Number),
        ColumnKind::Text => row
            .try_get::<Option<String>, _>(index)
            .map_err(db_err)?
            .map(Value::String),
        ColumnKind::Timestamp => row
            .try_get::<Option<NaiveDateTime>, _>(index)
            .map_err(db_err)?
            .map(|dt| Value::String(dt.format(TIMESTAMP_FORMAT).to_string())),
        ColumnKind::TimestampTz => row
            .try_get::<Option<DateTime<Utc>>, _>(index)
            .map_err(db_err)?
            .map(timestamptz_value),
        ColumnKind::Date => row
            .try_get::<Option<NaiveDate>, _>(index)
            .map_err(db_err)?
            .map(|d| Value::String(d.and_time(NaiveTime::MIN).format(TIMESTAMP_FORMAT).to_string())),
        ColumnKind::Json => row.try_get::<Option<Value>, _>(index).map_err(db_err)?,
    };

    Ok(value.unwrap_or(Value::Null))
}

/// TIMESTAMPTZ values are reported in UTC, like offset strings in documents.
fn timestamptz_value(dt: DateTime<Utc>) -> Value {
    Value::String(dt.naive_utc().format(TIMESTAMP_FORMAT).to_string())
}

/// Reads `{dir}/{match_id}.csv` exports of the same query.
#[derive(Debug, Clone)]
pub struct CsvRecordSource {
    dir: PathBuf,
    mapped: Vec<String>,
}

impl CsvRecordSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            mapped: Vec::new(),
        }
    }

    /// Columns every export must carry.
    pub fn with_mapped_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mapped = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn path_for(&self, match_id: i64) -> PathBuf {
        self.dir.join(format!("{}.csv", match_id))
    }
}

/// Parse one export file into a record set.
///
/// Every column in `mapped` must be present; all absent ones are reported
/// together.
pub fn load_records(bytes: &[u8], match_id: i64, mapped: &[String]) -> SourceResult<FlatRecordSet> {
    let parsed = parser::parse_bytes_auto(bytes)?;

    let missing: Vec<String> = mapped
        .iter()
        .filter(|column| !parsed.headers.contains(column))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(SourceError::MissingColumns { match_id, columns: missing });
    }

    FlatRecordSet::from_rows(parsed.records).ok_or(SourceError::NoRecords(match_id))
}

impl RecordSource for CsvRecordSource {
    async fn fetch_records(&self, match_id: i64) -> SourceResult<FlatRecordSet> {
        let path = self.path_for(match_id);
        let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SourceError::NotFound(path.display().to_string()),
            _ => SourceError::Io(e),
        })?;
        load_records(&bytes, match_id, &self.mapped)
    }
}
