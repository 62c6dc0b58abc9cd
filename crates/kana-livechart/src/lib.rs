//! kana-livechart: LiveChart.me schedule source.
//!
//! Scrapes the full-layout schedule page and exposes it as an
//! [`kana_reminders::EventSource`].

pub mod client;
pub mod error;
pub mod parse;

pub use client::LiveChartClient;
pub use error::{LiveChartError, Result};
pub use parse::{parse_day, parse_schedule};
