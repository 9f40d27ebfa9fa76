use std::collections::BTreeMap;

use chrono::{FixedOffset, NaiveDate, SecondsFormat, TimeZone};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::CollisionPolicy;
use crate::backend::{BackendError, DocumentInfo};

/// Field name → value mapping returned by the JSON operation.
pub type ResultMap = BTreeMap<String, String>;

pub const CREATED_KEY: &str = "created";
pub const MODIFIED_KEY: &str = "modified";
pub const DEFAULT_CONTENT_KEY: &str = "content";

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("document already released")]
    Released,
    #[error("failed to read document info: {0}")]
    Backend(#[source] BackendError),
    #[error("content key `{key}` collides with a metadata field")]
    KeyCollision { key: String },
}

/// Merge document info and extracted text into a [`ResultMap`].
///
/// `created` and `modified` are always present (empty when the document has
/// no such date). Custom info entries never overwrite those two or the
/// content key; how such a collision is handled depends on `policy`.
pub fn assemble(
    info: &DocumentInfo,
    content: String,
    content_key: &str,
    policy: CollisionPolicy,
) -> Result<ResultMap, MetadataError> {
    let mut result = ResultMap::new();
    result.insert(
        CREATED_KEY.to_string(),
        info.creation_date.as_deref().map(format_pdf_date).unwrap_or_default(),
    );
    result.insert(
        MODIFIED_KEY.to_string(),
        info.modification_date
            .as_deref()
            .map(format_pdf_date)
            .unwrap_or_default(),
    );

    if result.contains_key(content_key) {
        reject_or_warn(content_key, policy)?;
    }

    for (key, value) in &info.entries {
        if key == content_key {
            reject_or_warn(key, policy)?;
            continue;
        }
        if key == CREATED_KEY || key == MODIFIED_KEY {
            tracing::debug!(key = %key, "info entry shadows a date field, skipped");
            continue;
        }
        result.insert(key.clone(), value.clone());
    }

    result.insert(content_key.to_string(), content);
    Ok(result)
}

fn reject_or_warn(key: &str, policy: CollisionPolicy) -> Result<(), MetadataError> {
    match policy {
        CollisionPolicy::Reject => Err(MetadataError::KeyCollision {
            key: key.to_string(),
        }),
        CollisionPolicy::ContentWins => {
            tracing::warn!(key, "metadata field replaced by extracted content");
            Ok(())
        }
    }
}

static PDF_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:D:)?(\d{4})(\d{2})?(\d{2})?(\d{2})?(\d{2})?(\d{2})?(?:(Z)|([+\-])(\d{2})'?(?:(\d{2})'?)?)?\s*$",
    )
    .unwrap()
});

/// Convert a PDF date string (`D:YYYYMMDDHHmmSSOHH'mm'`) to ISO 8601.
///
/// Omitted trailing fields default to their minimum; a missing offset is
/// taken as UTC. Strings that are not PDF dates are returned unchanged.
pub fn format_pdf_date(raw: &str) -> String {
    parse_pdf_date(raw.trim())
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, false))
        .unwrap_or_else(|| raw.trim().to_string())
}

fn parse_pdf_date(raw: &str) -> Option<chrono::DateTime<FixedOffset>> {
    let caps = PDF_DATE.captures(raw)?;
    let num = |i: usize, default: u32| -> Option<u32> {
        match caps.get(i) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(default),
        }
    };

    let year: i32 = caps.get(1)?.as_str().parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, num(2, 1)?, num(3, 1)?)?;
    let time = date.and_hms_opt(num(4, 0)?, num(5, 0)?, num(6, 0)?)?;

    let offset_secs = if caps.get(7).is_some() || caps.get(8).is_none() {
        0
    } else {
        let sign = if &caps[8] == "-" { -1 } else { 1 };
        let seconds = (num(9, 0)? * 3600 + num(10, 0)? * 60) as i32;
        sign * seconds
    };
    let offset = FixedOffset::east_opt(offset_secs)?;
    offset.from_local_datetime(&time).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> DocumentInfo {
        DocumentInfo {
            creation_date: Some("D:20211026084745+02'00'".into()),
            modification_date: Some("D:20211027".into()),
            entries: vec![
                ("Title".into(), "Gesetzentwurf".into()),
                ("Producer".into(), "pdfTeX".into()),
            ],
        }
    }

    #[test]
    fn formats_full_date_with_offset() {
        assert_eq!(
            format_pdf_date("D:20211026084745+02'00'"),
            "2021-10-26T08:47:45+02:00"
        );
        assert_eq!(
            format_pdf_date("D:19991231235959-05'30"),
            "1999-12-31T23:59:59-05:30"
        );
    }

    #[test]
    fn formats_utc_and_partial_dates() {
        assert_eq!(format_pdf_date("D:20200102030405Z"), "2020-01-02T03:04:05+00:00");
        assert_eq!(format_pdf_date("D:2020"), "2020-01-01T00:00:00+00:00");
        assert_eq!(format_pdf_date("20200615"), "2020-06-15T00:00:00+00:00");
    }

    #[test]
    fn unparseable_date_passes_through() {
        assert_eq!(format_pdf_date("last tuesday"), "last tuesday");
        assert_eq!(format_pdf_date("D:20201345"), "D:20201345");
    }

    #[test]
    fn trailing_garbage_passes_through() {
        assert_eq!(format_pdf_date("2020abc"), "2020abc");
        assert_eq!(format_pdf_date("D:20201231 junk"), "D:20201231 junk");
        assert_eq!(format_pdf_date("D:20201231Z "), "2020-12-31T00:00:00+00:00");
    }

    #[test]
    fn assembles_dates_entries_and_content() {
        let map = assemble(&info(), "text".into(), "content", CollisionPolicy::Reject).unwrap();
        assert_eq!(map["created"], "2021-10-26T08:47:45+02:00");
        assert_eq!(map["modified"], "2021-10-27T00:00:00+00:00");
        assert_eq!(map["Title"], "Gesetzentwurf");
        assert_eq!(map["Producer"], "pdfTeX");
        assert_eq!(map["content"], "text");
        assert_eq!(map.len(), 5);
    }

    #[test]
    fn missing_dates_are_empty() {
        let map = assemble(
            &DocumentInfo::default(),
            "body".into(),
            "content",
            CollisionPolicy::ContentWins,
        )
        .unwrap();
        assert_eq!(map["created"], "");
        assert_eq!(map["modified"], "");
        assert_eq!(map["content"], "body");
    }

    #[test]
    fn custom_content_key() {
        let map = assemble(&info(), "text".into(), "fulltext", CollisionPolicy::Reject).unwrap();
        assert_eq!(map["fulltext"], "text");
        assert!(!map.contains_key("content"));
    }

    #[test]
    fn collision_rejected_or_content_wins() {
        let mut info = info();
        info.entries.push(("content".into(), "from metadata".into()));

        let err = assemble(&info, "text".into(), "content", CollisionPolicy::Reject).unwrap_err();
        assert!(matches!(err, MetadataError::KeyCollision { key } if key == "content"));

        let map = assemble(&info, "text".into(), "content", CollisionPolicy::ContentWins).unwrap();
        assert_eq!(map["content"], "text");
    }

    #[test]
    fn content_key_may_not_shadow_dates_silently() {
        let err = assemble(&info(), "text".into(), "created", CollisionPolicy::Reject).unwrap_err();
        assert!(matches!(err, MetadataError::KeyCollision { .. }));

        let map = assemble(&info(), "text".into(), "created", CollisionPolicy::ContentWins).unwrap();
        assert_eq!(map["created"], "text");
    }

    #[test]
    fn entries_never_override_dates() {
        let mut info = info();
        info.entries.push(("created".into(), "bogus".into()));
        let map = assemble(&info, "t".into(), "content", CollisionPolicy::Reject).unwrap();
        assert_eq!(map["created"], "2021-10-26T08:47:45+02:00");
    }
}
