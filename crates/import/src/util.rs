use chrono::NaiveDate;

/// Formats tried in order when parsing the date columns of a billing export.
/// The US month-first reading wins for ambiguous slash dates. `%y` sits
/// before `%Y` because chrono's `%Y` happily parses a two-digit year as an
/// ancient one.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%y",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%Y/%m/%d",
    "%m-%d-%Y",
    "%d-%m-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
];

/// Date written into a record when its source field does not parse. Imports
/// have always degraded unparseable dates to the unix epoch instead of
/// rejecting the row.
pub(crate) fn fallback_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()
}

/// Best-effort parse over [`DATE_FORMATS`]; anything unparseable collapses
/// to [`fallback_date`] rather than failing the row.
pub(crate) fn parse_date_lenient(raw: &str) -> NaiveDate {
    let raw = raw.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date;
        }
    }
    fallback_date()
}

/// Lossily decodes a CSV field and trims surrounding whitespace. Absent
/// fields read as empty.
pub(crate) fn clean_field(field: Option<&[u8]>) -> String {
    String::from_utf8_lossy(field.unwrap_or_default())
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parse_date_iso() {
        assert_eq!(parse_date_lenient("2024-01-15"), date(2024, 1, 15));
    }

    #[test]
    fn parse_date_us_slash() {
        assert_eq!(parse_date_lenient("01/15/2024"), date(2024, 1, 15));
    }

    #[test]
    fn parse_date_day_first_when_month_invalid() {
        assert_eq!(parse_date_lenient("25/01/2024"), date(2024, 1, 25));
    }

    #[test]
    fn parse_date_two_digit_year() {
        assert_eq!(parse_date_lenient("01/15/24"), date(2024, 1, 15));
    }

    #[test]
    fn parse_date_month_name() {
        assert_eq!(parse_date_lenient("January 15, 2024"), date(2024, 1, 15));
        assert_eq!(parse_date_lenient("Jan 15, 2024"), date(2024, 1, 15));
    }

    #[test]
    fn parse_date_garbage_falls_back_to_epoch() {
        assert_eq!(parse_date_lenient("not-a-date"), date(1970, 1, 1));
        assert_eq!(parse_date_lenient(""), date(1970, 1, 1));
    }

    #[test]
    fn clean_field_trims_and_decodes() {
        assert_eq!(clean_field(Some(b"  Acme Corp  ")), "Acme Corp");
        assert_eq!(clean_field(None), "");
    }

    #[test]
    fn clean_field_tolerates_invalid_utf8() {
        assert_eq!(clean_field(Some(b" Acme\xff ")), "Acme\u{fffd}");
    }
}
