// core/src/sheets.rs
use std::io::Read;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use ureq::Agent;

use crate::error::SourceError;
use crate::metrics::Metrics;
use crate::source::{QueryDescriptor, RecordProvider};
use crate::types::RawRecord;

/// Rad slik den kommer fra arket (Strava → Zapier → Google Sheets).
/// Tallkolonner som ikke lar seg lese blir None i stedet for å felle hele arket.
#[derive(Debug, Deserialize)]
struct SheetRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Activity")]
    activity: String,
    #[serde(rename = "Distance", deserialize_with = "csv::invalid_option")]
    distance: Option<f64>,
    #[serde(rename = "Speed", deserialize_with = "csv::invalid_option")]
    speed: Option<f64>,
    #[serde(rename = "Avg_HR", deserialize_with = "csv::invalid_option")]
    avg_hr: Option<f64>,
}

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Tolerant datoparser for det arket faktisk inneholder.
pub fn parse_sheet_date(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for f in DATE_TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, f) {
            return Some(dt);
        }
    }
    for f in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, f) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

fn heart_rate(v: Option<f64>) -> Option<u32> {
    match v {
        Some(x) if x.is_finite() && x > 0.0 => Some(x.round() as u32),
        _ => None,
    }
}

/// Leser CSV-eksport med header `Date, Activity, Distance, Speed, Avg_HR`.
///
/// Helt tomme rader, rader uten dato/distanse/fart og rader med ugyldig UTF-8
/// hoppes over (telles i `metrics`). Manglende kolonne eller ødelagt CSV gir
/// `QueryError`; lesefeil fra strømmen gir `SourceUnavailable`.
pub fn parse_csv_records<R: Read>(
    reader: R,
    metrics: &Metrics,
) -> Result<Vec<RawRecord>, SourceError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut out = Vec::new();
    for (i, row) in rdr.deserialize::<SheetRow>().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => match e.kind() {
                // brudd midt i nedlastingen er nett-feil, ikke avvist spørring
                csv::ErrorKind::Io(io) => {
                    return Err(SourceError::SourceUnavailable(format!(
                        "sheet download failed at row {}: {io}",
                        i + 2
                    )));
                }
                csv::ErrorKind::Utf8 { .. } => {
                    metrics.rows_skipped_total().inc();
                    log::warn!("skipping sheet row {}: {e}", i + 2);
                    continue;
                }
                _ => return Err(SourceError::QueryError(format!("sheet row {}: {e}", i + 2))),
            },
        };

        if row.date.is_empty() && row.activity.is_empty() && row.distance.is_none() {
            continue; // tom rad nederst i arket
        }

        let (Some(date), Some(distance), Some(speed)) =
            (parse_sheet_date(&row.date), row.distance, row.speed)
        else {
            metrics.rows_skipped_total().inc();
            log::warn!(
                "skipping sheet row {}: date={:?} distance={:?} speed={:?}",
                i + 2,
                row.date,
                row.distance,
                row.speed
            );
            continue;
        };

        out.push(RawRecord {
            date,
            activity_type: row.activity,
            distance,
            speed,
            avg_heart_rate: heart_rate(row.avg_hr),
        });
    }
    Ok(out)
}

/// Trekk ut ark-URL fra `SELECT * FROM "<url>"` eller bruk strengen direkte.
fn sheet_url_of(query: &QueryDescriptor) -> &str {
    let q = query.as_str().trim();
    let upper = q.to_ascii_uppercase();
    if upper.starts_with("SELECT") {
        if let Some(from) = upper.find(" FROM ") {
            let rest = q[from + " FROM ".len()..].trim();
            return rest.trim_matches('"');
        }
    }
    q
}

/// Oversett spørring til CSV-eksport-URL.
/// `https://docs.google.com/spreadsheets/d/<id>/edit#gid=<gid>` →
/// `https://docs.google.com/spreadsheets/d/<id>/export?format=csv&gid=<gid>`.
/// Andre http(s)-URLer antas å peke direkte på CSV.
pub fn export_url(query: &QueryDescriptor) -> Result<String, SourceError> {
    let url = sheet_url_of(query);
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(SourceError::QueryError(format!("not a sheet url: {url:?}")));
    }

    const MARKER: &str = "/spreadsheets/d/";
    let Some(pos) = url.find(MARKER) else {
        return Ok(url.to_string());
    };
    let after = &url[pos + MARKER.len()..];
    let id: &str = after.split(['/', '?', '#']).next().unwrap_or_default();
    if id.is_empty() {
        return Err(SourceError::QueryError(format!("sheet url without document id: {url:?}")));
    }
    let gid = url
        .split(['#', '?', '&'])
        .find_map(|part| part.strip_prefix("gid="))
        .unwrap_or("0");

    Ok(format!("{}{MARKER}{id}/export?format=csv&gid={gid}", &url[..pos]))
}

/// Google Sheets-klient – enkel blocking-versjon (ureq)
pub struct SheetsClient {
    agent: Agent,
    bearer_token: Option<String>,
    metrics: Metrics,
}

impl SheetsClient {
    pub fn new(timeout: Duration, metrics: Metrics) -> Self {
        // ureq bruker rustls når "tls" er aktivert
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { agent, bearer_token: None, metrics }
    }

    /// Opak credential, sendes uendret som `Authorization: Bearer`.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

fn map_http_error(url: &str, err: ureq::Error) -> SourceError {
    match err {
        ureq::Error::Status(code @ (400 | 404 | 410), _) => {
            SourceError::QueryError(format!("{url} returned HTTP {code}"))
        }
        ureq::Error::Status(code, _) => {
            SourceError::SourceUnavailable(format!("{url} returned HTTP {code}"))
        }
        ureq::Error::Transport(t) => SourceError::SourceUnavailable(t.to_string()),
    }
}

/// Privat ark uten tilgang gir ofte 200 med innloggingsside i stedet for CSV.
fn ensure_not_html(url: &str, content_type: &str) -> Result<(), SourceError> {
    if content_type.to_ascii_lowercase().contains("html") {
        return Err(SourceError::SourceUnavailable(format!(
            "{url} returned an HTML page, sheet is not shared or credentials were rejected"
        )));
    }
    Ok(())
}

impl RecordProvider for SheetsClient {
    fn fetch(&self, query: &QueryDescriptor) -> Result<Vec<RawRecord>, SourceError> {
        let url = export_url(query)?;

        let mut req = self.agent.get(&url);
        if let Some(token) = &self.bearer_token {
            req = req.set("Authorization", &format!("Bearer {token}"));
        }
        let resp = req.call().map_err(|e| map_http_error(&url, e))?;

        ensure_not_html(&url, resp.content_type())?;
        let records = parse_csv_records(resp.into_reader(), &self.metrics)?;
        log::info!("[Sheets] {} rows from {}", records.len(), url);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_url_from_edit_link() {
        let q = QueryDescriptor::new("https://docs.google.com/spreadsheets/d/abc123/edit#gid=42");
        assert_eq!(
            export_url(&q).unwrap(),
            "https://docs.google.com/spreadsheets/d/abc123/export?format=csv&gid=42"
        );
    }

    #[test]
    fn export_url_from_select_descriptor() {
        let q = QueryDescriptor::select_all("https://docs.google.com/spreadsheets/d/xyz/edit?usp=sharing");
        assert_eq!(
            export_url(&q).unwrap(),
            "https://docs.google.com/spreadsheets/d/xyz/export?format=csv&gid=0"
        );
    }

    #[test]
    fn plain_csv_url_passes_through() {
        let q = QueryDescriptor::new("https://example.org/runs.csv");
        assert_eq!(export_url(&q).unwrap(), "https://example.org/runs.csv");
    }

    #[test]
    fn non_url_descriptor_is_query_error() {
        let err = export_url(&QueryDescriptor::new("runs")).unwrap_err();
        assert!(matches!(err, SourceError::QueryError(_)));
    }

    fn status(code: u16) -> SourceError {
        let resp = ureq::Response::new(code, "status", "").unwrap();
        map_http_error("https://sheet", ureq::Error::Status(code, resp))
    }

    #[test]
    fn rejected_requests_are_query_errors() {
        for code in [400, 404, 410] {
            assert!(matches!(status(code), SourceError::QueryError(_)), "HTTP {code}");
        }
    }

    #[test]
    fn auth_and_server_failures_are_unavailable() {
        for code in [401, 403, 429, 500, 502, 503] {
            let err = status(code);
            assert!(err.is_transient(), "HTTP {code} gave {err:?}");
        }
    }

    #[test]
    fn refused_connection_is_unavailable() {
        // ingen lytter på discard-porten lokalt
        let err = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(2))
            .build()
            .get("http://127.0.0.1:9/")
            .call()
            .unwrap_err();
        assert!(matches!(err, ureq::Error::Transport(_)));
        assert!(map_http_error("http://127.0.0.1:9/", err).is_transient());
    }

    #[test]
    fn html_login_page_is_unavailable() {
        let err = ensure_not_html("https://sheet", "text/html; charset=utf-8").unwrap_err();
        assert!(err.is_transient());
        assert!(ensure_not_html("https://sheet", "text/csv").is_ok());
        assert!(ensure_not_html("https://sheet", "text/plain").is_ok());
    }

    #[test]
    fn date_formats() {
        let midnight = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(parse_sheet_date("2022-01-03"), Some(midnight));
        assert_eq!(parse_sheet_date("1/3/2022"), Some(midnight));
        assert_eq!(parse_sheet_date("2022-01-03T00:00:00Z"), Some(midnight));
        assert_eq!(
            parse_sheet_date("2022-01-03 07:15:00"),
            NaiveDate::from_ymd_opt(2022, 1, 3).unwrap().and_hms_opt(7, 15, 0)
        );
        assert_eq!(parse_sheet_date("yesterday"), None);
        assert_eq!(parse_sheet_date(""), None);
    }
}
