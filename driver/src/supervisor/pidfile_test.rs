use crate::supervisor::pidfile::{PidParseError, PidRecord};

#[test]
fn parses_the_writer_line_format() {
    let record: PidRecord = "group=daq_writer idx=3 hostname=drp-srv-001 pid=41927"
        .parse()
        .unwrap();

    assert_eq!(
        record,
        PidRecord {
            group: String::from("daq_writer"),
            idx: 3,
            hostname: String::from("drp-srv-001"),
            pid: 41927,
        }
    );
}

#[test]
fn tolerates_surrounding_whitespace() {
    let record: PidRecord = "  group=g idx=0 hostname=h pid=1\n".parse().unwrap();

    assert_eq!(record.group, "g");
    assert_eq!(record.pid, 1);
}

#[test]
fn missing_marker_is_reported() {
    let result: Result<PidRecord, _> = "group=g idx=0 hostname=h".parse();

    assert_eq!(result, Err(PidParseError::MissingMarker("pid=")));
}

#[test]
fn non_numeric_pid_is_reported() {
    let result: Result<PidRecord, _> = "group=g idx=0 hostname=h pid=abc".parse();

    assert_eq!(
        result,
        Err(PidParseError::BadInteger {
            field: "pid",
            value: String::from("abc"),
        })
    );
}

#[test]
fn multi_line_files_are_rejected() {
    let result: Result<PidRecord, _> =
        "group=g idx=0 hostname=h pid=1\ngroup=g idx=1 hostname=h pid=2".parse();

    assert_eq!(result, Err(PidParseError::NotOneLine));

    let empty: Result<PidRecord, _> = "".parse::<PidRecord>();
    assert_eq!(empty, Err(PidParseError::NotOneLine));
}
