//! Manifest parsing.
//!
//! A manifest lists one target directory per line as
//! `<directory><sep><date/time><sep><option>`. Parsing is all-or-nothing: a
//! single malformed line rejects the whole manifest so callers never act on a
//! partial batch.
use crate::error::ManifestError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::OnceLock;

/// One positional component of a manifest date/time.
///
/// Purely numeric tokens become integers; anything else is kept verbatim so
/// downstream consumers see exactly what the manifest contained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimestampPart {
    Number(i64),
    Text(String),
}

impl TimestampPart {
    fn from_token(token: &str) -> Self {
        if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(value) = token.parse() {
                return TimestampPart::Number(value);
            }
        }
        TimestampPart::Text(token.to_string())
    }
}

impl fmt::Display for TimestampPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampPart::Number(value) => write!(f, "{value}"),
            TimestampPart::Text(value) => write!(f, "{value:?}"),
        }
    }
}

/// Date/time of a target, split positionally on `/`, `:` and whitespace.
///
/// No field count is enforced; `YYYY/MM/DD HH:MM:SS` yields six parts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp {
    parts: Vec<TimestampPart>,
}

impl Timestamp {
    pub fn parse(raw: &str) -> Self {
        let parts = timestamp_separators()
            .split(raw.trim())
            .filter(|token| !token.is_empty())
            .map(TimestampPart::from_token)
            .collect();
        Self { parts }
    }

    pub fn parts(&self) -> &[TimestampPart] {
        &self.parts
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (idx, part) in self.parts.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{part}")?;
        }
        f.write_str("]")
    }
}

fn timestamp_separators() -> &'static Regex {
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();
    SEPARATORS.get_or_init(|| Regex::new(r"[/:\s]+").expect("regex for timestamp separators"))
}

/// A single requested analysis directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobTarget {
    pub directory_name: String,
    pub timestamp: Timestamp,
    pub option_code: i64,
}

/// Targets in manifest order; the order drives dispatch and reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirectoryManifest {
    targets: Vec<JobTarget>,
}

impl DirectoryManifest {
    pub fn targets(&self) -> &[JobTarget] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn directories(&self) -> Vec<String> {
        self.targets
            .iter()
            .map(|target| target.directory_name.clone())
            .collect()
    }

    pub fn timestamps(&self) -> Vec<Timestamp> {
        self.targets
            .iter()
            .map(|target| target.timestamp.clone())
            .collect()
    }

    pub fn options(&self) -> Vec<i64> {
        self.targets.iter().map(|target| target.option_code).collect()
    }
}

/// Read and parse a manifest file.
pub fn parse_manifest(path: &Path, separator: char) -> Result<DirectoryManifest, ManifestError> {
    let text = fs::read_to_string(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => ManifestError::Missing {
            path: path.to_path_buf(),
        },
        _ => ManifestError::Read {
            path: path.to_path_buf(),
            source,
        },
    })?;
    let manifest = parse_manifest_str(&text, separator)?;
    if manifest.is_empty() {
        return Err(ManifestError::Empty {
            path: path.to_path_buf(),
        });
    }
    tracing::debug!(
        path = %path.display(),
        targets = manifest.len(),
        "manifest parsed"
    );
    Ok(manifest)
}

/// Parse manifest text. Every line must hold exactly three fields; only the
/// final newline may end the text, so a blank line is malformed.
pub fn parse_manifest_str(text: &str, separator: char) -> Result<DirectoryManifest, ManifestError> {
    let mut targets = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        targets.push(parse_line(idx + 1, line, separator)?);
    }
    Ok(DirectoryManifest { targets })
}

fn parse_line(line_no: usize, line: &str, separator: char) -> Result<JobTarget, ManifestError> {
    let fields: Vec<&str> = line.split(separator).collect();
    let [name, datetime, option] = fields.as_slice() else {
        return Err(ManifestError::FieldCount {
            line: line_no,
            separator,
            found: fields.len(),
        });
    };
    let option_code = option
        .trim()
        .parse::<i64>()
        .map_err(|_| ManifestError::InvalidOption {
            line: line_no,
            value: option.to_string(),
        })?;
    Ok(JobTarget {
        directory_name: name.to_string(),
        timestamp: Timestamp::parse(datetime),
        option_code,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(value: i64) -> TimestampPart {
        TimestampPart::Number(value)
    }

    #[test]
    fn parses_single_line_into_aligned_columns() {
        let manifest = parse_manifest_str("A;2022/05/01 12:00:00;1", ';').expect("parse");
        assert_eq!(manifest.directories(), vec!["A".to_string()]);
        assert_eq!(
            manifest.timestamps()[0].parts(),
            &[n(2022), n(5), n(1), n(12), n(0), n(0)]
        );
        assert_eq!(manifest.options(), vec![1]);
    }

    #[test]
    fn keeps_manifest_order_across_columns() {
        let text = "meteor2|2022/05/02 18:00:00|2\nmeteor1|2022/05/01 12:00:00|7\n";
        let manifest = parse_manifest_str(text, '|').expect("parse");
        assert_eq!(manifest.directories(), vec!["meteor2", "meteor1"]);
        assert_eq!(manifest.options(), vec![2, 7]);
        assert_eq!(
            manifest.timestamps()[1].parts(),
            &[n(2022), n(5), n(1), n(12), n(0), n(0)]
        );
        assert_eq!(manifest.len(), 2);
    }

    #[test]
    fn passes_non_numeric_timestamp_tokens_through() {
        let manifest = parse_manifest_str("B;2022/May/01 12:00:00.5;3", ';').expect("parse");
        let timestamp = &manifest.targets()[0].timestamp;
        assert_eq!(timestamp.parts()[1], TimestampPart::Text("May".to_string()));
        assert_eq!(timestamp.parts()[5], TimestampPart::Text("00.5".to_string()));
        assert_eq!(timestamp.to_string(), "[2022, \"May\", 1, 12, 0, \"00.5\"]");
    }

    #[test]
    fn rejects_non_integer_option() {
        let err = parse_manifest_str("A;2022/05/01 12:00:00;one", ';').unwrap_err();
        assert!(matches!(err, ManifestError::InvalidOption { line: 1, .. }));
    }

    #[test]
    fn option_tolerates_whitespace_and_sign() {
        let manifest = parse_manifest_str("A;2022/05/01;  -4 ", ';').expect("parse");
        assert_eq!(manifest.options(), vec![-4]);
    }

    #[test]
    fn rejects_lines_without_three_fields() {
        let err = parse_manifest_str("A;2022/05/01 12:00:00\n", ';').unwrap_err();
        assert!(matches!(err, ManifestError::FieldCount { found: 2, .. }));

        let err = parse_manifest_str("A;1;2\nB;x;1;extra", ';').unwrap_err();
        assert!(matches!(err, ManifestError::FieldCount { line: 2, found: 4, .. }));
    }

    #[test]
    fn empty_text_parses_to_nothing() {
        let manifest = parse_manifest_str("", ';').expect("parse");
        assert!(manifest.is_empty());
        let manifest = parse_manifest_str("A;2022/05/01;1\n", ';').expect("parse");
        assert_eq!(manifest.len(), 1);
    }

    #[test]
    fn blank_line_between_targets_rejects_the_manifest() {
        let text = "A;2022/05/01 12:00:00;1\n\nB;2022/05/02 12:00:00;2\n";
        let err = parse_manifest_str(text, ';').unwrap_err();
        assert!(matches!(err, ManifestError::FieldCount { line: 2, found: 1, .. }));

        let err = parse_manifest_str("A;2022/05/01;1\n   \n", ';').unwrap_err();
        assert!(matches!(err, ManifestError::FieldCount { line: 2, found: 1, .. }));
    }

    #[test]
    fn empty_or_missing_file_is_an_error_not_zero_targets() {
        let dir = tempfile::tempdir().expect("tempdir");
        let empty = dir.path().join("meteors.txt");
        std::fs::write(&empty, "").expect("write manifest");
        assert!(matches!(
            parse_manifest(&empty, ';'),
            Err(ManifestError::Empty { .. })
        ));

        let missing = dir.path().join("absent.txt");
        assert!(matches!(
            parse_manifest(&missing, ';'),
            Err(ManifestError::Missing { .. })
        ));
        assert!(matches!(
            parse_manifest(Path::new(""), ';'),
            Err(ManifestError::Missing { .. } | ManifestError::Read { .. })
        ));
    }

    #[test]
    fn timestamp_serializes_as_mixed_list() {
        let timestamp = Timestamp::parse("2022/05/xx");
        let json = serde_json::to_string(&timestamp).expect("serialize");
        assert_eq!(json, r#"[2022,5,"xx"]"#);
    }
}
