use super::literal::{parse_literal, parse_number_token};

pub const TOTAL_TIME_MARKER: &str = "total time =";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum ExtractionError {
    MarkerMissing { marker: String },
    PayloadMissing { marker: String },
    Unparsable { marker: String, reason: String },
}

impl ExtractionError {
    pub(super) fn detail(&self) -> String {
        match self {
            Self::MarkerMissing { marker } => format!("missing output field '{marker}'"),
            Self::PayloadMissing { marker } => {
                format!("output field '{marker}' has no value on the following line")
            }
            Self::Unparsable { marker, reason } => {
                format!("output field '{marker}' could not be parsed: {reason}")
            }
        }
    }

    fn unparsable(marker: &str, reason: impl Into<String>) -> Self {
        Self::Unparsable {
            marker: marker.to_string(),
            reason: reason.into(),
        }
    }
}

fn is_separator_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= 3 && trimmed.chars().all(|ch| ch == '-' || ch == '=')
}

fn bracket_balance(text: &str) -> i64 {
    text.chars().fold(0, |depth, ch| match ch {
        '[' => depth + 1,
        ']' => depth - 1,
        _ => depth,
    })
}

/// Text of the bracketed payload that follows `marker`.
///
/// The payload starts on the remainder of the marker line when that opens a
/// list, otherwise on the next non-empty line, so trailing annotations such as
/// units are skipped. Continuation lines are joined
/// until brackets balance; a blank or separator line ends the search.
pub(super) fn payload_after_marker(content: &str, marker: &str) -> Result<String, ExtractionError> {
    let start = content
        .find(marker)
        .ok_or_else(|| ExtractionError::MarkerMissing {
            marker: marker.to_string(),
        })?;
    let after_marker = &content[start + marker.len()..];
    let (same_line, following) = after_marker
        .split_once('\n')
        .unwrap_or((after_marker, ""));

    let mut lines = std::iter::once(same_line)
        .filter(|line| line.trim_start().starts_with('['))
        .chain(following.lines().skip_while(|line| line.trim().is_empty()));

    let first = lines
        .next()
        .filter(|line| !is_separator_line(line) && line.trim_start().starts_with('['))
        .ok_or_else(|| ExtractionError::PayloadMissing {
            marker: marker.to_string(),
        })?;

    let mut payload = first.trim().to_string();
    let mut depth = bracket_balance(&payload);
    while depth > 0 {
        let Some(line) = lines.next() else {
            return Err(ExtractionError::unparsable(marker, "list is not closed"));
        };
        if line.trim().is_empty() || is_separator_line(line) {
            return Err(ExtractionError::unparsable(marker, "list is not closed"));
        }
        payload.push(' ');
        payload.push_str(line.trim());
        depth = bracket_balance(&payload);
    }

    Ok(payload)
}

pub(super) fn extract_vector(content: &str, marker: &str) -> Result<Vec<f64>, ExtractionError> {
    let payload = payload_after_marker(content, marker)?;
    let value =
        parse_literal(&payload).map_err(|error| ExtractionError::unparsable(marker, error.to_string()))?;
    value
        .as_vector()
        .ok_or_else(|| ExtractionError::unparsable(marker, "expected a flat list of numbers"))
}

/// Value text after the first `total time =`, trimmed.
pub(super) fn extract_total_time(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let (_, value) = line.split_once(TOTAL_TIME_MARKER)?;
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// First `[a b; c d]` span at or after `marker` (or the whole log when the
/// marker is absent). Rows split on `;`, entries on whitespace or commas.
pub(super) fn extract_semicolon_matrix(
    content: &str,
    marker: &str,
) -> Result<Vec<Vec<f64>>, ExtractionError> {
    let search_from = content
        .find(marker)
        .map_or(0, |position| position + marker.len());
    let region = &content[search_from..];

    let open = region.find('[').ok_or_else(|| ExtractionError::MarkerMissing {
        marker: "correlator matrix".to_string(),
    })?;
    let close = region[open..]
        .find(']')
        .map(|offset| open + offset)
        .ok_or_else(|| ExtractionError::unparsable(marker, "matrix is not closed with ']'"))?;

    parse_semicolon_rows(&region[open + 1..close]).map_err(|reason| ExtractionError::unparsable(marker, reason))
}

pub(super) fn parse_semicolon_rows(inner: &str) -> Result<Vec<Vec<f64>>, String> {
    if inner.contains('[') {
        return Err("nested brackets inside matrix".to_string());
    }
    if inner.trim().is_empty() {
        return Err("matrix is empty".to_string());
    }

    let mut rows = Vec::new();
    for (index, row) in inner.split(';').enumerate() {
        let entries = row
            .split(|ch: char| ch.is_whitespace() || ch == ',')
            .filter(|token| !token.is_empty())
            .map(|token| parse_number_token(token).map_err(|error| format!("row {index}: {error}")))
            .collect::<Result<Vec<_>, _>>()?;
        if entries.is_empty() {
            return Err(format!("row {index} is empty"));
        }
        rows.push(entries);
    }

    let width = rows[0].len();
    if let Some((index, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != width) {
        return Err(format!(
            "row {index} has {} entries, expected {width}",
            row.len()
        ));
    }
    Ok(rows)
}
