//! Legacy CSV import/export
//!
//! Field teams kept their records in `ubicaciones_aguilas.csv` with the header
//! `id,lat,lon,tipo,comentario` and Spanish kind labels. Import accepts that
//! layout as well as the full export layout written by [`export_csv`].

use crate::observation::validate_coordinates;
use crate::{Error, Observation, ObservationKind, Result};
use csv::StringRecord;
use std::path::Path;
use tracing::warn;

/// Header written by [`export_csv`]
pub const EXPORT_HEADER: [&str; 7] = ["id", "lat", "lon", "kind", "comment", "score", "validation_reason"];

/// Result of reading a CSV file
#[derive(Debug, Default)]
pub struct CsvImport {
    /// Rows that parsed and validated
    pub observations: Vec<Observation>,
    /// Rows skipped, as `(line number, reason)`
    pub skipped: Vec<(u64, String)>,
}

/// Column positions resolved from the header row
struct Columns {
    id: usize,
    lat: usize,
    lon: usize,
    kind: usize,
    comment: Option<usize>,
    score: Option<usize>,
    reason: Option<usize>,
}

impl Columns {
    fn from_header(header: &StringRecord) -> Result<Self> {
        let find = |names: &[&str]| {
            header
                .iter()
                .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
        };
        let require = |names: &[&str]| {
            find(names).ok_or_else(|| {
                Error::InvalidInput(format!("CSV header is missing column '{}'", names[0]))
            })
        };

        Ok(Self {
            id: require(&["id"])?,
            lat: require(&["lat"])?,
            lon: require(&["lon"])?,
            kind: require(&["kind", "tipo"])?,
            comment: find(&["comment", "comentario"]),
            score: find(&["score"]),
            reason: find(&["validation_reason"]),
        })
    }
}

/// Read observations from a legacy or exported CSV file
///
/// Invalid rows (bad numbers, out-of-range coordinates, unknown kind) are
/// skipped with a warning rather than aborting the whole import.
pub fn import_csv(path: &Path) -> Result<CsvImport> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let columns = Columns::from_header(reader.headers()?)?;

    let mut import = CsvImport::default();
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                warn!(line, error = %e, "Skipping unreadable CSV row");
                import.skipped.push((line, e.to_string()));
                continue;
            }
        };
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        match parse_row(&record, &columns) {
            Ok(obs) => import.observations.push(obs),
            Err(e) => {
                warn!(line, error = %e, "Skipping CSV row");
                import.skipped.push((line, e.to_string()));
            }
        }
    }

    Ok(import)
}

fn parse_row(record: &StringRecord, columns: &Columns) -> Result<Observation> {
    let field = |idx: usize| record.get(idx).map(str::trim).unwrap_or("");
    let optional = |idx: Option<usize>| idx.map(field).filter(|v| !v.is_empty());

    let id: i64 = field(columns.id)
        .parse()
        .map_err(|_| Error::InvalidInput(format!("Bad id '{}'", field(columns.id))))?;
    let lat: f64 = field(columns.lat)
        .parse()
        .map_err(|_| Error::InvalidInput(format!("Bad latitude '{}'", field(columns.lat))))?;
    let lon: f64 = field(columns.lon)
        .parse()
        .map_err(|_| Error::InvalidInput(format!("Bad longitude '{}'", field(columns.lon))))?;
    validate_coordinates(lat, lon)?;
    let kind: ObservationKind = field(columns.kind).parse()?;

    let mut obs = Observation::new(id, lat, lon, kind, optional(columns.comment).unwrap_or(""))?;
    obs.score = match optional(columns.score) {
        Some(s) => Some(
            s.parse()
                .map_err(|_| Error::InvalidInput(format!("Bad score '{}'", s)))?,
        ),
        None => None,
    };
    obs.validation_reason = optional(columns.reason).map(str::to_string);

    Ok(obs)
}

/// Write observations with the full column set
pub fn export_csv(path: &Path, observations: &[Observation]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(EXPORT_HEADER)?;

    for obs in observations {
        writer.write_record([
            obs.id.to_string(),
            obs.lat.to_string(),
            obs.lon.to_string(),
            obs.kind.as_str().to_string(),
            obs.comment.clone(),
            obs.score.map(|s| s.to_string()).unwrap_or_default(),
            obs.validation_reason.clone().unwrap_or_default(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}
