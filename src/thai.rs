// Thai-locale text used on the album labels and the rendered page.

use chrono::{Datelike, NaiveDate};

/// Offset from the Gregorian year to the Buddhist Era year.
pub const BUDDHIST_ERA_OFFSET: i32 = 543;

pub const MONTH_NAMES: [&str; 12] = [
    "มกราคม",
    "กุมภาพันธ์",
    "มีนาคม",
    "เมษายน",
    "พฤษภาคม",
    "มิถุนายน",
    "กรกฎาคม",
    "สิงหาคม",
    "กันยายน",
    "ตุลาคม",
    "พฤศจิกายน",
    "ธันวาคม",
];

pub const ROW_CAPTION: &str = "แถว";
pub const PAGE_CAPTION: &str = "หน้า";
pub const TEACHER_CAPTION: &str = "ภาพกับคุณครู";
pub const ACTIVITY_CAPTION: &str = "ภาพกิจกรรม";

/// `day monthName yearBE`, e.g. `15 มกราคม 2567`.
pub fn format_thai_date(date: NaiveDate) -> String {
    format!(
        "{} {} {}",
        date.day(),
        MONTH_NAMES[date.month0() as usize],
        date.year() + BUDDHIST_ERA_OFFSET
    )
}
