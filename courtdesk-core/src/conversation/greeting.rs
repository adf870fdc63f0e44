//! Time-of-day greeting that opens the language prompt.

use chrono::{Datelike, Local, NaiveDateTime, Timelike};

fn part_of_day(hour: u32) -> &'static str {
    match hour {
        5..=11 => "Good Morning",
        12..=16 => "Good Afternoon",
        17..=20 => "Good Evening",
        _ => "Good Night",
    }
}

fn ordinal_suffix(day: u32) -> &'static str {
    if (11..=13).contains(&(day % 100)) {
        return "th";
    }
    match day % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

/// "Good Evening, today is Friday, 3rd October 2025, and the current time is 6:05."
pub fn greeting_at(now: NaiveDateTime) -> String {
    let day = now.day();
    let hour12 = match now.hour() % 12 {
        0 => 12,
        h => h,
    };
    format!(
        "{}, today is {}, {}{} {} {}, and the current time is {}:{:02}.",
        part_of_day(now.hour()),
        now.format("%A"),
        day,
        ordinal_suffix(day),
        now.format("%B"),
        now.year(),
        hour12,
        now.minute()
    )
}

pub fn greeting() -> String {
    greeting_at(Local::now().naive_local())
}
