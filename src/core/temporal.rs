use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};

/// Today's calendar date in the local timezone.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Anchor a calendar date at local noon so formatting never crosses a day boundary.
pub fn at_local_noon(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default())
}

/// Human label stored with a plan, e.g. "Sunday, 18 Oct".
pub fn day_label(date: NaiveDate) -> String {
    at_local_noon(date).format("%A, %-d %b").to_string()
}

/// Short numeric date used in lists, e.g. "18/10/2026".
pub fn short_date(date: NaiveDate) -> String {
    at_local_noon(date).format("%d/%m/%Y").to_string()
}

/// Parse a `YYYY-MM-DD` date, also accepting the relative words `today` and `tomorrow`.
pub fn parse_date(s: &str, today: NaiveDate) -> Option<NaiveDate> {
    match s.trim().to_lowercase().as_str() {
        "" => None,
        "today" => Some(today),
        "tomorrow" => today.succ_opt(),
        "yesterday" => today.pred_opt(),
        other => NaiveDate::parse_from_str(other, "%Y-%m-%d").ok(),
    }
}

/// The `count` days starting at `today`, for the planning date picker.
pub fn upcoming_days(today: NaiveDate, count: usize) -> Vec<NaiveDate> {
    today.iter_days().take(count).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn day_label_uses_weekday_and_month() {
        assert_eq!(day_label(d(2026, 10, 18)), "Sunday, 18 Oct");
    }

    #[test]
    fn noon_anchor_keeps_date() {
        let date = d(2026, 1, 1);
        assert_eq!(at_local_noon(date).date(), date);
    }

    #[test]
    fn parse_relative_words() {
        let today = d(2026, 10, 18);
        assert_eq!(parse_date("today", today), Some(today));
        assert_eq!(parse_date("Tomorrow", today), Some(d(2026, 10, 19)));
        assert_eq!(parse_date("2026-12-01", today), Some(d(2026, 12, 1)));
        assert_eq!(parse_date("12/01", today), None);
        assert_eq!(parse_date("  ", today), None);
    }

    #[test]
    fn week_picker_starts_today() {
        let days = upcoming_days(d(2026, 12, 29), 7);
        assert_eq!(days.len(), 7);
        assert_eq!(days[0], d(2026, 12, 29));
        assert_eq!(days[6], d(2027, 1, 4));
    }
}
