use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PidParseError {
    #[error("missing `{0}` marker")]
    MissingMarker(&'static str),
    #[error("field `{field}` is not an integer: `{value}`")]
    BadInteger { field: &'static str, value: String },
    #[error("pid file must hold exactly one line")]
    NotOneLine,
}

/// parsed contents of a job's pid file
///
/// the line format `group=<g> idx=<i> hostname=<h> pid=<p>` is written by the
/// job itself immediately on startup and is the only record that allows
/// killing it from another machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidRecord {
    pub group: String,
    pub idx: usize,
    pub hostname: String,
    pub pid: i32,
}

// the four literal markers act as separators, values cannot contain them
fn split_marker<'a>(
    input: &'a str,
    marker: &'static str,
) -> Result<(&'a str, &'a str), PidParseError> {
    input
        .rsplit_once(marker)
        .map(|(rest, value)| (rest, value.trim()))
        .ok_or(PidParseError::MissingMarker(marker))
}

impl FromStr for PidRecord {
    type Err = PidParseError;

    /// parse right to left so values may contain spaces but not markers
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if line.is_empty() || line.lines().count() != 1 {
            return Err(PidParseError::NotOneLine);
        }

        let (rest, pid) = split_marker(line, "pid=")?;
        let (rest, hostname) = split_marker(rest, "hostname=")?;
        let (rest, idx) = split_marker(rest, "idx=")?;
        let (_, group) = split_marker(rest, "group=")?;

        Ok(Self {
            group: group.to_string(),
            idx: idx.parse().map_err(|_| PidParseError::BadInteger {
                field: "idx",
                value: idx.to_string(),
            })?,
            hostname: hostname.to_string(),
            pid: pid.parse().map_err(|_| PidParseError::BadInteger {
                field: "pid",
                value: pid.to_string(),
            })?,
        })
    }
}
