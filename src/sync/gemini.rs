use std::time::Duration;

use serde::Deserialize;

use crate::config::DaybookConfig;
use crate::core::area::LifeArea;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// A goal proposed from free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalSuggestion {
    pub title: String,
    pub description: Option<String>,
    pub area: LifeArea,
}

/// One schedule slot proposed from free text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SlotSuggestion {
    pub time: String,
    pub task: String,
}

#[derive(Debug, Deserialize)]
struct RawGoal {
    title: String,
    description: Option<String>,
    area: String,
}

/// Text-to-structure assist. Best effort: every failure is `None`.
#[allow(async_fn_in_trait)]
pub trait Assist {
    async fn suggest_goal(&self, text: &str) -> Option<GoalSuggestion>;
    async fn suggest_schedule(&self, text: &str) -> Option<Vec<SlotSuggestion>>;
}

/// Assist backed by the Gemini `generateContent` endpoint.
pub struct GeminiAssist {
    api_key: Option<String>,
    model: String,
    http: reqwest::Client,
}

impl GeminiAssist {
    pub fn new(config: &DaybookConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            api_key: config.gemini_api_key.clone().filter(|k| !k.trim().is_empty()),
            model: config.gemini_model.clone(),
            http,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(
        &self,
        api_key: &str,
        prompt: String,
        schema: serde_json::Value,
    ) -> Result<String, String> {
        let body = serde_json::json!({
            "contents": [
                { "role": "user", "parts": [ { "text": prompt } ] }
            ],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": schema
            }
        });

        let url = format!("{}/{}:generateContent", API_BASE, self.model);
        let resp = self
            .http
            .post(&url)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("API request failed: {}", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(format!("API error {}: {}", status, text));
        }

        let api_resp: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| format!("Failed to parse API response: {}", e))?;

        response_text(&api_resp)
            .map(str::to_string)
            .ok_or_else(|| "No text in API response".to_string())
    }
}

/// Text of the first part of the first candidate.
fn response_text(api_resp: &serde_json::Value) -> Option<&str> {
    api_resp["candidates"]
        .as_array()
        .and_then(|arr| arr.first())
        .and_then(|c| c["content"]["parts"].as_array())
        .and_then(|parts| parts.first())
        .and_then(|part| part["text"].as_str())
}

fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

fn parse_goal(text: &str) -> Result<GoalSuggestion, String> {
    let raw: RawGoal = serde_json::from_str(strip_fences(text))
        .map_err(|e| format!("Failed to parse goal: {}, raw: {}", e, text))?;
    if raw.title.trim().is_empty() {
        return Err("Suggested goal has an empty title".to_string());
    }
    let area = LifeArea::parse(&raw.area).ok_or_else(|| format!("Unknown area: {}", raw.area))?;
    Ok(GoalSuggestion {
        title: raw.title.trim().to_string(),
        description: raw.description.filter(|d| !d.trim().is_empty()),
        area,
    })
}

fn parse_schedule(text: &str) -> Result<Vec<SlotSuggestion>, String> {
    let slots: Vec<SlotSuggestion> = serde_json::from_str(strip_fences(text))
        .map_err(|e| format!("Failed to parse schedule: {}, raw: {}", e, text))?;
    Ok(slots
        .into_iter()
        .filter(|s| !s.time.trim().is_empty() && !s.task.trim().is_empty())
        .collect())
}

fn goal_schema() -> serde_json::Value {
    let areas: Vec<&str> = LifeArea::ALL.iter().map(|a| a.as_wire()).collect();
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING" },
            "description": { "type": "STRING" },
            "area": { "type": "STRING", "enum": areas }
        },
        "required": ["title", "area"]
    })
}

fn schedule_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "time": { "type": "STRING" },
                "task": { "type": "STRING" }
            },
            "required": ["time", "task"]
        }
    })
}

impl Assist for GeminiAssist {
    async fn suggest_goal(&self, text: &str) -> Option<GoalSuggestion> {
        let api_key = self.api_key.as_deref()?;
        let prompt = format!(
            "Turn this planning thought into one clear, concise goal. Text: \"{}\"",
            text
        );
        let result = match self.generate(api_key, prompt, goal_schema()).await {
            Ok(raw) => parse_goal(&raw),
            Err(e) => Err(e),
        };
        match result {
            Ok(goal) => Some(goal),
            Err(e) => {
                log::warn!("Goal suggestion failed: {}", e);
                None
            }
        }
    }

    async fn suggest_schedule(&self, text: &str) -> Option<Vec<SlotSuggestion>> {
        let api_key = self.api_key.as_deref()?;
        let prompt = format!(
            "Turn this text into a daily schedule. Return a list of objects with 'time' \
             (HH:MM, 24-hour) and 'task' (a short description). Text: \"{}\"",
            text
        );
        let result = match self.generate(api_key, prompt, schedule_schema()).await {
            Ok(raw) => parse_schedule(&raw),
            Err(e) => Err(e),
        };
        match result {
            Ok(slots) => Some(slots),
            Err(e) => {
                log::warn!("Schedule suggestion failed: {}", e);
                None
            }
        }
    }
}
