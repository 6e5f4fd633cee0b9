use chrono::{DateTime, NaiveDateTime, Utc};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn format_amz_date(dt: &DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

pub fn format_amz_day(dt: &DateTime<Utc>) -> String {
    dt.format("%Y%m%d").to_string()
}

/// Parses the `Last-Modified` header format (`Wed, 21 Oct 2015 07:28:00 GMT`).
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%a, %d %b %Y %H:%M:%S GMT")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// Parses the ISO-8601 timestamps used in S3 XML documents.
pub fn parse_iso8601(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_timestamps() {
        let header = parse_http_date("Wed, 21 Oct 2015 07:28:00 GMT").unwrap();
        let xml = parse_iso8601("2015-10-21T07:28:00.000Z").unwrap();
        assert_eq!(header, xml);
        assert_eq!(format_amz_date(&header), "20151021T072800Z");
        assert_eq!(format_amz_day(&header), "20151021");
    }
}
