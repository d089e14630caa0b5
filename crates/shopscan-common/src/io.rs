/// CSV input and output.
///
/// Inputs carry the URL in a fixed column and optionally a prior label and a prior score.
/// Outputs are written once, at the end of a run.
use std::io::{Read, Write};
use std::path::Path;

use tracing::warn;

use crate::error::CommonError;
use crate::model::{Label, ScoreResult, UrlRecord};

/// Where the interesting columns live in an input file (zero-based).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputLayout {
    pub url_column: usize,
    pub label_column: Option<usize>,
    pub score_column: Option<usize>,
    pub has_header: bool,
}

impl Default for InputLayout {
    fn default() -> Self {
        Self {
            url_column: 0,
            label_column: None,
            score_column: None,
            has_header: true,
        }
    }
}

/// Row selection applied while reading.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Keep only rows whose prior label equals this one.
    pub only_label: Option<Label>,
    /// Keep at most this many rows (after label filtering).
    pub limit: Option<usize>,
}

pub fn read_records(
    path: &Path,
    layout: &InputLayout,
    filter: &RecordFilter,
) -> Result<Vec<UrlRecord>, CommonError> {
    let file = std::fs::File::open(path)?;
    parse_records(file, layout, filter)
}

pub fn parse_records<R: Read>(
    reader: R,
    layout: &InputLayout,
    filter: &RecordFilter,
) -> Result<Vec<UrlRecord>, CommonError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(layout.has_header)
        .flexible(true)
        .from_reader(reader);

    let mut records = Vec::new();
    for (row_number, row) in csv_reader.records().enumerate() {
        if filter.limit.is_some_and(|limit| records.len() >= limit) {
            break;
        }
        let row = row?;

        let url = row.get(layout.url_column).map(str::trim).unwrap_or("");
        if url.is_empty() {
            warn!(row = row_number + 1, column = layout.url_column, "row has no url, skipping");
            continue;
        }

        let prior_label = layout
            .label_column
            .and_then(|col| row.get(col))
            .and_then(Label::parse_cell);
        if let Some(wanted) = filter.only_label {
            if prior_label != Some(wanted) {
                continue;
            }
        }

        let prior_score = layout
            .score_column
            .and_then(|col| row.get(col))
            .and_then(|cell| cell.trim().parse::<f64>().ok())
            .filter(|score| (0.0..=100.0).contains(score));

        records.push(UrlRecord {
            index: records.len(),
            url: url.to_string(),
            prior_label,
            prior_score,
        });
    }

    Ok(records)
}

pub const SCORE_HEADER: [&str; 3] = ["URL", "Probability (%)", "E-commerce Indicator"];

/// Write `URL, score, indicator` rows. Failed fetches write -99 in both numeric columns.
pub fn write_scores<W: Write>(
    writer: W,
    results: &[ScoreResult],
    threshold: f64,
) -> Result<(), CommonError> {
    let rows = results.iter().map(|r| {
        vec![
            r.url.clone(),
            format_score(r.score_or_sentinel()),
            label_cell(r.updated_label(threshold)),
        ]
    });
    write_rows(writer, &SCORE_HEADER, rows)
}

/// Write a single `URL` column.
pub fn write_url_list<W: Write, S: AsRef<str>>(writer: W, urls: &[S]) -> Result<(), CommonError> {
    write_rows(writer, &["URL"], urls.iter().map(|u| vec![u.as_ref().to_string()]))
}

pub fn write_rows<W, I>(writer: W, header: &[&str], rows: I) -> Result<(), CommonError>
where
    W: Write,
    I: IntoIterator<Item = Vec<String>>,
{
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(header)?;
    for row in rows {
        csv_writer.write_record(&row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Create (or truncate) `path` and hand back a buffered writer.
pub fn create_output(path: &Path) -> Result<std::io::BufWriter<std::fs::File>, CommonError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(std::io::BufWriter::new(std::fs::File::create(path)?))
}

pub fn format_score(score: f64) -> String {
    if score.fract() == 0.0 {
        format!("{score:.0}")
    } else {
        format!("{score:.2}")
    }
}

pub fn label_cell(label: Option<Label>) -> String {
    label.map(|l| l.code().to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Outcome;

    const INPUT: &str = "\
name,url,ecommerce,score
Hotel Post,https://www.hotel-post.at,1,
Friseur Anna,https://friseur-anna.at,0,12.5
,,1,
Autohaus,  https://autohaus.at  ,1.0,40
Bad Row,https://bad.at,maybe,250
";

    fn layout() -> InputLayout {
        InputLayout {
            url_column: 1,
            label_column: Some(2),
            score_column: Some(3),
            has_header: true,
        }
    }

    #[test]
    fn reads_urls_labels_and_scores() {
        let records = parse_records(INPUT.as_bytes(), &layout(), &RecordFilter::default()).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].url, "https://www.hotel-post.at");
        assert_eq!(records[0].prior_label, Some(Label::Ecommerce));
        assert_eq!(records[0].prior_score, None);
        assert_eq!(records[1].prior_score, Some(12.5));
        assert_eq!(records[2].url, "https://autohaus.at");
        assert_eq!(records[2].index, 2);
        assert_eq!(records[3].prior_label, None);
        assert_eq!(records[3].prior_score, None);
    }

    #[test]
    fn filters_by_label_then_limits() {
        let filter = RecordFilter {
            only_label: Some(Label::Ecommerce),
            limit: Some(1),
        };
        let records = parse_records(INPUT.as_bytes(), &layout(), &filter).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url, "https://www.hotel-post.at");

        let filter = RecordFilter {
            only_label: Some(Label::Ecommerce),
            limit: None,
        };
        let records = parse_records(INPUT.as_bytes(), &layout(), &filter).unwrap();
        let urls: Vec<&str> = records.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["https://www.hotel-post.at", "https://autohaus.at"]);
        assert_eq!(records[1].index, 1);
    }

    #[test]
    fn headerless_single_column() {
        let layout = InputLayout {
            has_header: false,
            ..InputLayout::default()
        };
        let records =
            parse_records("https://a.de\nhttps://b.de\n".as_bytes(), &layout, &RecordFilter::default())
                .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].url, "https://b.de");
    }

    #[test]
    fn writes_scores_with_sentinel() {
        let ok = UrlRecord::new(0, "https://shop.de").with_label(Some(Label::NotEcommerce));
        let failed = UrlRecord::new(1, "https://down.de");
        let results = vec![
            ScoreResult::new(&ok, Outcome::Scored(33.3333)),
            ScoreResult::new(
                &failed,
                Outcome::FetchFailed {
                    error: "timeout".to_string(),
                },
            ),
        ];
        let mut out = Vec::new();
        write_scores(&mut out, &results, 20.0).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "URL,Probability (%),E-commerce Indicator\nhttps://shop.de,33.33,1\nhttps://down.de,-99,-99\n"
        );
    }

    #[test]
    fn writes_url_list() {
        let mut out = Vec::new();
        write_url_list(&mut out, &["https://a.nl", "https://b.nl"]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "URL\nhttps://a.nl\nhttps://b.nl\n");
    }

    #[test]
    fn score_formatting() {
        assert_eq!(format_score(30.0), "30");
        assert_eq!(format_score(-99.0), "-99");
        assert_eq!(format_score(12.346), "12.35");
    }
}
