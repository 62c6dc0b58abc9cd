//! LiveChart schedule HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use kana_config::LiveChartConfig;
use kana_reminders::{EventSource, ReminderError};
use kana_types::Event;

use crate::error::{LiveChartError, Result};
use crate::parse::{parse_day, parse_schedule};

const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(5);
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Fetches and reads the full-layout schedule page.
pub struct LiveChartClient {
    client: Client,
    schedule_url: String,
    max_retries: u32,
}

impl LiveChartClient {
    pub fn new(config: &LiveChartConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self {
            client,
            schedule_url: config.schedule_url.clone(),
            max_retries: config.max_retries,
        })
    }

    /// GET the schedule page, backing off on 429 as instructed by `Retry-After`.
    pub async fn fetch_page(&self) -> Result<String> {
        let mut attempt = 0;
        loop {
            let resp = self.client.get(&self.schedule_url).send().await?;
            let status = resp.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let wait = retry_after(resp.headers());
                if attempt >= self.max_retries {
                    return Err(LiveChartError::RateLimited {
                        retry_after_secs: wait.as_secs(),
                    });
                }
                attempt += 1;
                warn!(
                    attempt,
                    wait_secs = wait.as_secs(),
                    "LiveChart rate limited, backing off"
                );
                tokio::time::sleep(wait).await;
                continue;
            }
            if status != StatusCode::OK {
                return Err(LiveChartError::Status(status.as_u16()));
            }

            let body = resp.text().await?;
            debug!(bytes = body.len(), "Fetched schedule page");
            return Ok(body);
        }
    }

    /// Events for the day `offset` days from today, sorted by premiere.
    pub async fn fetch_day(&self, offset: u32, ignore_old: bool) -> Result<Vec<Event>> {
        let html = self.fetch_page().await?;
        let mut events = parse_day(&html, offset as usize)?;
        if ignore_old {
            let now = Utc::now();
            events.retain(|e| e.is_upcoming(now));
        }
        Ok(events)
    }

    /// Every day on the schedule page from a single request, today first.
    pub async fn fetch_schedule(&self, ignore_old: bool) -> Result<Vec<Vec<Event>>> {
        let html = self.fetch_page().await?;
        let mut days = parse_schedule(&html)?;
        if ignore_old {
            let now = Utc::now();
            for day in &mut days {
                day.retain(|e| e.is_upcoming(now));
            }
        }
        Ok(days)
    }
}

#[async_trait]
impl EventSource for LiveChartClient {
    async fn fetch_events_for_day(
        &self,
        offset: u32,
        ignore_old: bool,
    ) -> kana_reminders::Result<Vec<Event>> {
        self.fetch_day(offset, ignore_old)
            .await
            .map_err(ReminderError::source_unavailable)
    }

    async fn fetch_all_days(
        &self,
        ignore_old: bool,
    ) -> kana_reminders::Result<Option<Vec<Vec<Event>>>> {
        self.fetch_schedule(ignore_old)
            .await
            .map(Some)
            .map_err(ReminderError::source_unavailable)
    }

    async fn close(&self) {
        info!("LiveChart session closed");
    }
}

/// Seconds from `Retry-After`, capped. Dates and garbage fall back to a default.
fn retry_after(headers: &HeaderMap) -> Duration {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(DEFAULT_RETRY_AFTER, Duration::from_secs)
        .min(MAX_RETRY_AFTER)
}
