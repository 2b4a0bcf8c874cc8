// src/utils/log.rs

//! Console output for CLI runs.
//!
//! Headers, steps and summaries go to stdout with a timestamp prefix.
//! Library code logs through the `log` macros instead.

use std::str::FromStr;
use std::sync::OnceLock;

use chrono::Local;
use log::LevelFilter;

static CONSOLE_LEVEL: OnceLock<LevelFilter> = OnceLock::new();

/// Set the console level once; later calls are ignored. Unknown names mean `info`.
pub fn init(level: &str) {
    let filter = LevelFilter::from_str(level).unwrap_or(LevelFilter::Info);
    let _ = CONSOLE_LEVEL.set(filter);
}

fn enabled() -> bool {
    CONSOLE_LEVEL.get().copied().unwrap_or(LevelFilter::Info) >= LevelFilter::Info
}

fn line(message: &str) -> String {
    format!("[{}] {}", Local::now().format("%Y-%m-%d %H:%M:%S"), message)
}

fn emit(message: &str) {
    if enabled() {
        println!("{}", line(message));
    }
}

/// `[STEP n/total] message`
pub fn step(step_num: usize, total: usize, message: &str) {
    emit(&format!("[STEP {}/{}] {}", step_num, total, message));
}

pub fn header(title: &str) {
    let border = "═".repeat(60);
    emit(&border);
    emit(&format!("  {}", title));
    emit(&border);
}

pub fn sub_item(message: &str) {
    emit(&format!("    {}", message));
}

/// Titled block of `key: value` lines, aligned on the longest key.
pub fn summary(title: &str, items: &[(&str, String)]) {
    if !enabled() {
        return;
    }
    println!();
    emit(&format!("[SUMMARY] {}", title));
    let width = items.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    for (key, value) in items {
        emit(&format!("    {:<width$}  {}", key, value, width = width));
    }
}
