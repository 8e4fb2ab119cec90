//! CSV codec for the master table and roster snapshots.
//!
//! Both files share the person columns `ID, Name, Group, Role,
//! ParticipationCount, Notes`; further master-table columns are carried
//! through untouched. Roster snapshots append `ServiceCategory`,
//! `ServiceDate` and `PreferredGroup` to every row. Indonesian headers
//! (`Nama`, `Lingkungan`, `Peran`, `Partisipasi`) are accepted on read.

use bytes::Bytes;
use chrono::NaiveDate;
use csv_async::{AsyncReaderBuilder, AsyncWriter, StringRecord, Trim};
use futures::StreamExt;

use crate::errors::AppError;
use crate::models::{
    file_name_of, parse_category, parse_service_date, MasterTable, Person, Role, Roster,
    ServiceCategory,
};

pub const COLUMN_ID: &str = "ID";
pub const COLUMN_NAME: &str = "Name";
pub const COLUMN_GROUP: &str = "Group";
pub const COLUMN_ROLE: &str = "Role";
pub const COLUMN_COUNT: &str = "ParticipationCount";
pub const COLUMN_NOTES: &str = "Notes";
pub const COLUMN_CATEGORY: &str = "ServiceCategory";
pub const COLUMN_DATE: &str = "ServiceDate";
pub const COLUMN_PREFERRED_GROUP: &str = "PreferredGroup";

const PERSON_COLUMNS: [&str; 6] = [
    COLUMN_ID,
    COLUMN_NAME,
    COLUMN_GROUP,
    COLUMN_ROLE,
    COLUMN_COUNT,
    COLUMN_NOTES,
];

const SNAPSHOT_COLUMNS: [&str; 3] = [COLUMN_CATEGORY, COLUMN_DATE, COLUMN_PREFERRED_GROUP];

const DATE_FORMAT: &str = "%Y-%m-%d";

fn canonical(header: &str) -> &str {
    match header {
        "Nama" => COLUMN_NAME,
        "Lingkungan" => COLUMN_GROUP,
        "Peran" => COLUMN_ROLE,
        "Partisipasi" => COLUMN_COUNT,
        other => other,
    }
}

/// Column positions of one file.
struct Layout {
    id: Option<usize>,
    name: usize,
    group: usize,
    role: usize,
    count: Option<usize>,
    notes: Option<usize>,
    category: Option<usize>,
    date: Option<usize>,
    preferred_group: Option<usize>,
    extras: Vec<(String, usize)>,
}

impl Layout {
    fn from_headers(headers: &StringRecord, snapshot: bool) -> Result<Self, AppError> {
        let names: Vec<&str> = headers.iter().map(|h| canonical(h.trim())).collect();
        let find = |column: &str| names.iter().position(|name| *name == column);
        let required = |column: &str| {
            find(column).ok_or_else(|| {
                AppError::MalformedRecord(format!("Missing required column {}", column))
            })
        };

        let extras = names
            .iter()
            .enumerate()
            .filter(|(_, name)| !name.is_empty() && !PERSON_COLUMNS.contains(*name))
            .filter(|(_, name)| !snapshot || !SNAPSHOT_COLUMNS.contains(*name))
            .map(|(index, name)| (name.to_string(), index))
            .collect();

        Ok(Self {
            id: find(COLUMN_ID),
            name: required(COLUMN_NAME)?,
            group: required(COLUMN_GROUP)?,
            role: required(COLUMN_ROLE)?,
            count: find(COLUMN_COUNT),
            notes: find(COLUMN_NOTES),
            category: find(COLUMN_CATEGORY).filter(|_| snapshot),
            date: find(COLUMN_DATE).filter(|_| snapshot),
            preferred_group: find(COLUMN_PREFERRED_GROUP).filter(|_| snapshot),
            extras,
        })
    }
}

fn field(record: &StringRecord, index: Option<usize>) -> Option<&str> {
    index
        .and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Parse a participation count; blank means zero, integral floats are accepted.
fn parse_count(raw: Option<&str>, line: usize) -> Result<u32, AppError> {
    let Some(raw) = raw else {
        return Ok(0);
    };
    if let Ok(count) = raw.parse::<u32>() {
        return Ok(count);
    }
    match raw.parse::<f64>() {
        Ok(value)
            if value.is_finite()
                && value >= 0.0
                && value.fract() == 0.0
                && value <= f64::from(u32::MAX) =>
        {
            Ok(value as u32)
        }
        _ => Err(AppError::MalformedRecord(format!(
            "Line {}: invalid participation count {:?}",
            line, raw
        ))),
    }
}

fn parse_person(
    layout: &Layout,
    record: &StringRecord,
    line: usize,
    generate_missing_id: bool,
) -> Result<Person, AppError> {
    let required = |index: usize, column: &str| {
        field(record, Some(index)).map(str::to_string).ok_or_else(|| {
            AppError::MalformedRecord(format!("Line {}: {} is empty", line, column))
        })
    };

    let id = match field(record, layout.id) {
        Some(id) => id.to_string(),
        None if generate_missing_id => uuid::Uuid::new_v4().to_string(),
        None => {
            return Err(AppError::MalformedRecord(format!(
                "Line {}: {} is empty",
                line, COLUMN_ID
            )))
        }
    };

    let extra = layout
        .extras
        .iter()
        .filter_map(|(column, index)| {
            record
                .get(*index)
                .map(|value| (column.clone(), value.to_string()))
        })
        .collect();

    Ok(Person {
        id,
        name: required(layout.name, COLUMN_NAME)?,
        group: required(layout.group, COLUMN_GROUP)?,
        role: Role::from_label(&required(layout.role, COLUMN_ROLE)?),
        participation_count: parse_count(field(record, layout.count), line)?,
        notes: field(record, layout.notes).map(str::to_string),
        extra,
    })
}

async fn read_records(bytes: &[u8]) -> Result<(StringRecord, Vec<StringRecord>), AppError> {
    let mut reader = AsyncReaderBuilder::new()
        .trim(Trim::All)
        .create_reader(bytes);
    let headers = reader.headers().await?.clone();

    let mut rows = Vec::new();
    let mut records = reader.records();
    while let Some(record) = records.next().await {
        rows.push(record?);
    }
    Ok((headers, rows))
}

async fn write_records<I>(header: &[String], rows: I) -> Result<Bytes, AppError>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut buffer = Vec::new();
    {
        let mut writer = AsyncWriter::from_writer(&mut buffer);
        writer
            .write_record(header)
            .await
            .map_err(|e| AppError::Internal(format!("CSV write error: {}", e)))?;
        for row in rows {
            writer
                .write_record(&row)
                .await
                .map_err(|e| AppError::Internal(format!("CSV write error: {}", e)))?;
        }
        writer
            .flush()
            .await
            .map_err(|e| AppError::Internal(format!("CSV flush error: {}", e)))?;
    }
    Ok(Bytes::from(buffer))
}

fn person_fields(person: &Person, extra_columns: &[String]) -> Vec<String> {
    let mut fields = vec![
        person.id.clone(),
        person.name.clone(),
        person.group.clone(),
        person.role.as_str().to_string(),
        person.participation_count.to_string(),
        person.notes.clone().unwrap_or_default(),
    ];
    fields.extend(
        extra_columns
            .iter()
            .map(|column| person.extra.get(column).cloned().unwrap_or_default()),
    );
    fields
}

fn header_with(extra_columns: &[String], trailing: &[&str]) -> Vec<String> {
    PERSON_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(extra_columns.iter().cloned())
        .chain(trailing.iter().map(|c| c.to_string()))
        .collect()
}

/// Parse the master table. Rows without an ID receive a fresh one.
pub async fn decode_table(bytes: &[u8]) -> Result<MasterTable, AppError> {
    let (headers, records) = read_records(bytes).await?;
    let layout = Layout::from_headers(&headers, false)?;

    let people = records
        .iter()
        .enumerate()
        .map(|(index, record)| parse_person(&layout, record, index + 2, true))
        .collect::<Result<Vec<_>, _>>()?;
    let extra_columns = layout.extras.into_iter().map(|(name, _)| name).collect();

    MasterTable::new(extra_columns, people)
}

/// Serialize the master table.
pub async fn encode_table(table: &MasterTable) -> Result<Bytes, AppError> {
    let header = header_with(&table.extra_columns, &[]);
    let rows = table
        .people
        .iter()
        .map(|person| person_fields(person, &table.extra_columns))
        .collect::<Vec<_>>();
    write_records(&header, rows).await
}

/// Parse a roster snapshot stored under `key`.
///
/// Snapshots without the service columns take category and date from the key.
pub async fn decode_roster(key: &str, bytes: &[u8]) -> Result<Roster, AppError> {
    let (headers, records) = read_records(bytes).await?;
    let layout = Layout::from_headers(&headers, true)?;

    let members = records
        .iter()
        .enumerate()
        .map(|(index, record)| parse_person(&layout, record, index + 2, false))
        .collect::<Result<Vec<_>, _>>()?;

    let first = records.first();
    let stored = |index: Option<usize>| first.and_then(|record| field(record, index));

    let category = match stored(layout.category) {
        Some(label) => ServiceCategory::from_label(label).ok_or_else(|| {
            AppError::MalformedRecord(format!("Unknown service category {:?}", label))
        })?,
        None => parse_category(file_name_of(key)).ok_or_else(|| {
            AppError::MalformedRecord(format!("No service category for roster {}", key))
        })?,
    };

    let service_date = match stored(layout.date) {
        Some(raw) => NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| {
            AppError::MalformedRecord(format!("Invalid service date {:?}: {}", raw, e))
        })?,
        None => parse_service_date(file_name_of(key)).map_err(|e| {
            AppError::MalformedRecord(format!("No service date for roster {}: {}", key, e.message()))
        })?,
    };

    Ok(Roster {
        key: key.to_string(),
        category,
        service_date,
        preferred_group: stored(layout.preferred_group).map(str::to_string),
        members,
    })
}

/// Serialize a roster snapshot.
pub async fn encode_roster(roster: &Roster) -> Result<Bytes, AppError> {
    let mut extra_columns: Vec<String> = Vec::new();
    for member in &roster.members {
        for column in member.extra.keys() {
            if !extra_columns.contains(column) {
                extra_columns.push(column.clone());
            }
        }
    }

    let header = header_with(&extra_columns, &SNAPSHOT_COLUMNS);
    let category = roster.category.label().to_string();
    let date = roster.service_date.format(DATE_FORMAT).to_string();
    let preferred_group = roster.preferred_group.clone().unwrap_or_default();
    let rows = roster.members.iter().map(|member| {
        let mut fields = person_fields(member, &extra_columns);
        fields.extend([category.clone(), date.clone(), preferred_group.clone()]);
        fields
    }).collect::<Vec<_>>();
    write_records(&header, rows).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    const SPREADSHEET_DATA: &str = "\
ID,Nama,Lingkungan,Peran,Partisipasi,Notes,Telepon
0,Agnes,Santa Maria,Misdinar,3,,0812
1,Benediktus,Santo Yosef,Misdinar,0,kursi roda,
2,Caecilia,Santa Maria,Organis,2.0,,0813
";

    #[tokio::test]
    async fn test_decode_indonesian_headers() {
        let table = decode_table(SPREADSHEET_DATA.as_bytes()).await.unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.extra_columns, vec!["Telepon"]);
        let agnes = table.get("0").unwrap();
        assert_eq!(agnes.name, "Agnes");
        assert_eq!(agnes.group, "Santa Maria");
        assert_eq!(agnes.role, Role::Server);
        assert_eq!(agnes.participation_count, 3);
        assert!(agnes.notes.is_none());
        assert_eq!(agnes.extra.get("Telepon").map(String::as_str), Some("0812"));
        assert!(table.get("1").unwrap().is_special_needs());
        assert_eq!(table.get("2").unwrap().participation_count, 2);
        assert_eq!(table.get("2").unwrap().role, Role::Organist);
    }

    #[tokio::test]
    async fn test_table_round_trip_keeps_ids_counts_and_extras() {
        let table = decode_table(SPREADSHEET_DATA.as_bytes()).await.unwrap();
        let encoded = encode_table(&table).await.unwrap();
        let text = std::str::from_utf8(&encoded).unwrap();
        assert!(text.starts_with("ID,Name,Group,Role,ParticipationCount,Notes,Telepon\n"));

        let decoded = decode_table(&encoded).await.unwrap();
        assert_eq!(decoded, table);
    }

    #[tokio::test]
    async fn test_missing_ids_are_generated() {
        let data = "Name,Group,Role\nAgnes,Santa Maria,Misdinar\nBene,Santo Yosef,Organis\n";
        let table = decode_table(data.as_bytes()).await.unwrap();
        assert_eq!(table.len(), 2);
        assert!(!table.people[0].id.is_empty());
        assert_ne!(table.people[0].id, table.people[1].id);
        assert_eq!(table.people[0].participation_count, 0);
    }

    #[tokio::test]
    async fn test_malformed_rows_fail_the_whole_load() {
        let cases = [
            "ID,Name,Group\n1,Agnes,Maria\n",
            "ID,Name,Group,Role,ParticipationCount\n1,Agnes,Maria,Misdinar,-1\n",
            "ID,Name,Group,Role,ParticipationCount\n1,Agnes,Maria,Misdinar,banyak\n",
            "ID,Name,Group,Role,ParticipationCount\n1,Agnes,Maria,Misdinar,1.5\n",
            "ID,Name,Group,Role\n1,Agnes,Maria,Misdinar\n1,Bene,Yosef,Misdinar\n",
            "ID,Name,Group,Role\n1,,Maria,Misdinar\n",
            "ID,Name,Group,Role\n1,Agnes,Maria\n",
        ];
        for data in cases {
            let result = decode_table(data.as_bytes()).await;
            assert!(
                matches!(result, Err(AppError::MalformedRecord(_))),
                "expected malformed record for {:?}",
                data
            );
        }
    }

    #[tokio::test]
    async fn test_roster_snapshot_stores_date_inside() {
        let member = Person {
            id: "7".to_string(),
            name: "Agnes".to_string(),
            group: "Santa Maria".to_string(),
            role: Role::Server,
            participation_count: 2,
            notes: Some("kursi roda".to_string()),
            extra: BTreeMap::new(),
        };
        let date = NaiveDate::from_ymd_opt(2025, 3, 8).unwrap();
        let roster = Roster::new(
            ServiceCategory::SabtuSore,
            date,
            Some("Santa Maria".to_string()),
            vec![member],
        );

        let encoded = encode_roster(&roster).await.unwrap();
        let text = std::str::from_utf8(&encoded).unwrap();
        assert!(text.contains("Sabtu Sore,2025-03-08,Santa Maria"));

        // the stored columns win over the key
        let decoded = decode_roster("rosters/renamed.csv", &encoded).await.unwrap();
        assert_eq!(decoded.category, ServiceCategory::SabtuSore);
        assert_eq!(decoded.service_date, date);
        assert_eq!(decoded.preferred_group.as_deref(), Some("Santa Maria"));
        assert_eq!(decoded.members, roster.members);
    }

    #[tokio::test]
    async fn test_legacy_roster_takes_metadata_from_key() {
        let data = "ID,Nama,Lingkungan,Peran,Partisipasi,Notes\n3,Agnes,Santa Maria,Misdinar,1,\n";
        let key = "rosters/misdinar_Jalan Salib_Friday, 07 March 2025.csv";
        let roster = decode_roster(key, data.as_bytes()).await.unwrap();

        assert_eq!(roster.key, key);
        assert_eq!(roster.category, ServiceCategory::JalanSalib);
        assert_eq!(
            roster.service_date,
            NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()
        );
        assert_eq!(roster.member_ids(), vec!["3"]);
    }

    #[tokio::test]
    async fn test_roster_members_need_ids() {
        let data = "ID,Name,Group,Role\n,Agnes,Santa Maria,Misdinar\n";
        let key = "rosters/misdinar_Jalan Salib_Friday, 07 March 2025.csv";
        let result = decode_roster(key, data.as_bytes()).await;
        assert!(matches!(result, Err(AppError::MalformedRecord(_))));
    }
}
