use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use rusqlite::Connection;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::db;
use crate::parser::package::ExtractionPayload;
use crate::settings::Settings;

pub const DEFAULT_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent";

const TOP_K: u32 = 40;
const TOP_P: f64 = 0.95;
const SAFETY_CATEGORIES: &[&str] = &[
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];
const SAFETY_THRESHOLD: &str = "BLOCK_MEDIUM_AND_ABOVE";

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("No API key configured")]
    MissingApiKey,
    #[error("Unable to extract content from page")]
    EmptyContent,
    #[error("Daily usage limit exceeded ({limit} requests). Please try again tomorrow.")]
    QuotaExceeded { limit: u32 },
    #[error("API request failed ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Invalid API response format")]
    InvalidResponse,
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Usage counter unavailable: {0}")]
    Storage(#[from] rusqlite::Error),
}

/// Spaces consecutive requests at least `delay` apart. `last` is wall-clock
/// time so it can be shared with other runs through the store.
#[derive(Debug)]
pub struct RateLimiter {
    delay: Duration,
    last: Option<DateTime<Utc>>,
}

impl RateLimiter {
    pub fn new(delay: Duration) -> Self {
        RateLimiter { delay, last: None }
    }

    /// Account for a request started elsewhere. The latest one wins.
    pub fn observe(&mut self, at: DateTime<Utc>) {
        self.last = Some(self.last.map_or(at, |last| last.max(at)));
    }

    /// How long a request made at `now` still has to wait.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        let last = self.last?;
        // a last request in the future (clock stepped back) counts as just made
        let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
        self.delay.checked_sub(elapsed).filter(|d| !d.is_zero())
    }

    /// Sleep out the remaining delay and return the start of this request.
    pub async fn wait(&mut self) -> DateTime<Utc> {
        if let Some(pause) = self.remaining(Utc::now()) {
            debug!("Rate limited, sleeping {:?}", pause);
            tokio::time::sleep(pause).await;
        }
        let now = Utc::now();
        self.last = Some(now);
        now
    }
}

/// Per-day request counter backed by the usage table.
pub struct DailyQuota<'a> {
    conn: &'a Connection,
    limit: u32,
}

impl<'a> DailyQuota<'a> {
    pub fn new(conn: &'a Connection, limit: u32) -> Self {
        DailyQuota { conn, limit }
    }

    /// Today's usage so far, or `QuotaExceeded` when the limit is reached.
    pub fn check(&self, day: &str) -> Result<u32, AnalysisError> {
        let usage = db::get_usage(self.conn, day)?;
        if usage >= self.limit {
            return Err(AnalysisError::QuotaExceeded { limit: self.limit });
        }
        Ok(usage)
    }

    pub fn record(&self, day: &str) -> Result<u32, AnalysisError> {
        Ok(db::increment_usage(self.conn, day)?)
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub text: String,
    /// Requests used today, this one included.
    pub usage: u32,
}

pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    temperature: f64,
    max_output_tokens: u32,
    limiter: RateLimiter,
}

impl GeminiClient {
    pub fn new(settings: &Settings, api_key: &str) -> Result<Self, AnalysisError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(AnalysisError::MissingApiKey);
        }
        Ok(GeminiClient {
            http: reqwest::Client::new(),
            endpoint: settings.endpoint.clone(),
            api_key: api_key.to_string(),
            temperature: settings.temperature,
            max_output_tokens: settings.max_output_tokens,
            limiter: RateLimiter::new(Duration::from_millis(settings.rate_limit_ms)),
        })
    }

    /// Rate limit, check the quota, call the model, then count the request.
    pub async fn analyze(
        &mut self,
        payload: &ExtractionPayload,
        quota: &DailyQuota<'_>,
        day: &str,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        if payload.content.is_empty() {
            return Err(AnalysisError::EmptyContent);
        }

        self.pace(quota.conn).await?;
        let usage = quota.check(day)?;
        debug!(usage, day, "Quota check passed");

        let text = self.generate(&build_prompt(payload)).await?;
        let usage = quota.record(day)?;
        info!(usage, chars = text.len(), "Analysis complete");

        Ok(AnalysisOutcome { text, usage })
    }

    /// Wait out the delay since the last request of any run, then record this one.
    async fn pace(&mut self, conn: &Connection) -> Result<(), AnalysisError> {
        if let Some(last) = db::last_request_at(conn)? {
            self.limiter.observe(last);
        }
        let started = self.limiter.wait().await;
        db::set_last_request_at(conn, started)?;
        Ok(())
    }

    async fn generate(&self, prompt: &str) -> Result<String, AnalysisError> {
        let body = request_body(prompt, self.temperature, self.max_output_tokens);
        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;
        if !status.is_success() {
            let message = api_error_message(&raw, status);
            warn!(status = status.as_u16(), "API request failed: {}", message);
            return Err(AnalysisError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let data: Value = serde_json::from_str(&raw).map_err(|_| AnalysisError::InvalidResponse)?;
        extract_text(&data)
    }
}

pub fn request_body(prompt: &str, temperature: f64, max_output_tokens: u32) -> Value {
    let safety: Vec<Value> = SAFETY_CATEGORIES
        .iter()
        .map(|c| json!({ "category": c, "threshold": SAFETY_THRESHOLD }))
        .collect();
    json!({
        "contents": [{ "parts": [{ "text": prompt }] }],
        "generationConfig": {
            "temperature": temperature,
            "topK": TOP_K,
            "topP": TOP_P,
            "maxOutputTokens": max_output_tokens,
        },
        "safetySettings": safety,
    })
}

/// Text of the first candidate's first part.
pub fn extract_text(data: &Value) -> Result<String, AnalysisError> {
    data.pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(AnalysisError::InvalidResponse)
}

/// `error.message` from an error body, else the status reason.
pub fn api_error_message(raw: &str, status: StatusCode) -> String {
    serde_json::from_str::<Value>(raw)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        })
}

pub fn build_prompt(payload: &ExtractionPayload) -> String {
    format!(
        "You are a legal document analyzer. Please analyze the following Terms of Service, \
Privacy Policy, or legal document and provide a comprehensive analysis in the following \
structured format:

**EXECUTIVE SUMMARY:**
[Provide a 2-3 sentence overview of what this document is and its main purpose]

**DOCUMENT TYPE:**
[Identify the type of legal document - Terms of Service, Privacy Policy, etc.]

**KEY POINTS:**
[List 4-6 main points or clauses that users should be aware of]

**PRIVACY CONCERNS:**
[Highlight any significant privacy-related issues or data collection practices]

**USER OBLIGATIONS:**
[Summarize what users are required to do or not do]

**CONCERNING CLAUSES:**
[Identify any clauses that might be problematic or heavily favor the company]

**RISK ASSESSMENT:**
[Provide a risk level (Low/Medium/High) and explain the reasoning]

**NOTABLE FEATURES:**
[Any unusual or noteworthy aspects of this document]

**RECOMMENDATIONS:**
[Brief advice for users considering this service]

Please make your analysis clear, concise, and accessible to non-lawyers. Focus on practical \
implications for users.

DOCUMENT TO ANALYZE:
---
{}
---

Title: {}
URL: {}
Analysis Date: {}",
        payload.content, payload.title, payload.url, payload.extracted_at
    )
}
