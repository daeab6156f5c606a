//! `Range` header interpretation. Only a single `bytes=start-end` range is
//! served; anything else is unsatisfiable.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// No `Range` header: send the whole file.
    Full,
    /// Inclusive bounds, already checked against the file size.
    Partial { start: u64, end: u64 },
    Unsatisfiable,
}

pub fn parse_range(header: Option<&str>, size: u64) -> ByteRange {
    let Some(value) = header else {
        return ByteRange::Full;
    };
    let Some((start, end)) = value
        .trim()
        .strip_prefix("bytes=")
        .and_then(|spec| spec.split_once('-'))
    else {
        return ByteRange::Unsatisfiable;
    };

    let Ok(start) = start.trim().parse::<u64>() else {
        return ByteRange::Unsatisfiable;
    };
    let end = match end.trim() {
        "" => match size.checked_sub(1) {
            Some(last) => last,
            None => return ByteRange::Unsatisfiable,
        },
        explicit => match explicit.parse::<u64>() {
            Ok(end) => end,
            Err(_) => return ByteRange::Unsatisfiable,
        },
    };

    if start > end || end >= size {
        return ByteRange::Unsatisfiable;
    }
    ByteRange::Partial { start, end }
}
