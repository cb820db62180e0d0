//! Cell value conversion

use calamine::Data;
use chrono::{Days, NaiveDate};

/// Text form of a cell: whole numbers without a trailing `.0`, dates as
/// `YYYY-MM-DD`, errors and empty cells as an empty string
pub fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| dt.as_f64().to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(_) | Data::Empty => String::new(),
    }
}

/// Convert an Excel serial day number (1900 date system) to a date.
/// Serial 60 is Excel's nonexistent 1900-02-29 and has no date.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let days = serial.trunc() as u64;
    let epoch = match days {
        ..60 => NaiveDate::from_ymd_opt(1899, 12, 31)?,
        60 => return None,
        _ => NaiveDate::from_ymd_opt(1899, 12, 30)?,
    };
    epoch.checked_add_days(Days::new(days))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_lose_trailing_zero() {
        assert_eq!(cell_to_string(&Data::Float(12345.0)), "12345");
        assert_eq!(cell_to_string(&Data::Float(2.5)), "2.5");
        assert_eq!(cell_to_string(&Data::Int(7)), "7");
        assert_eq!(cell_to_string(&Data::String("  Lenguaje ".into())), "Lenguaje");
        assert_eq!(cell_to_string(&Data::Empty), "");
    }

    #[test]
    fn test_serial_dates() {
        assert_eq!(
            excel_serial_to_date(46023.0),
            NaiveDate::from_ymd_opt(2026, 1, 1)
        );
        assert_eq!(
            excel_serial_to_date(45658.75),
            NaiveDate::from_ymd_opt(2025, 1, 1)
        );
        assert_eq!(excel_serial_to_date(0.0), None);
    }

    #[test]
    fn test_serial_dates_around_phantom_leap_day() {
        assert_eq!(excel_serial_to_date(1.0), NaiveDate::from_ymd_opt(1900, 1, 1));
        assert_eq!(excel_serial_to_date(59.0), NaiveDate::from_ymd_opt(1900, 2, 28));
        assert_eq!(excel_serial_to_date(60.0), None);
        assert_eq!(excel_serial_to_date(61.0), NaiveDate::from_ymd_opt(1900, 3, 1));
    }
}
