//! The routing engine (C6): selects one or more specialists for a task.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::agent::{Agent, ExecuteOverrides};
use crate::error::{Error, Result};

use super::specialist::SpecialistDescriptor;

/// One routing decision: a chosen specialist, why, and how confident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// The chosen specialist's id.
    pub specialist_id: String,
    /// Human-readable justification.
    pub reason: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
}

/// A user-supplied router, consulted before the built-in keyword/supervisor
/// fallback chain.
pub type CustomRouter = Arc<dyn Fn(&str, &[SpecialistDescriptor]) -> RoutingDecision + Send + Sync>;

#[derive(Deserialize)]
struct RawDecision {
    #[serde(rename = "specialistId")]
    specialist_id: String,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Select one or more specialists for `task`.
///
/// Precedence: a configured [`CustomRouter`], then keyword matching with
/// priority tie-break, then a supervisor-LLM JSON decision, then the first
/// registered specialist as a last resort. Only an empty specialist list
/// (which swarm construction itself should already reject) raises
/// [`Error::RoutingFailed`].
pub async fn route(
    task: &str,
    specialists: &[SpecialistDescriptor],
    custom_router: Option<&CustomRouter>,
    supervisor: &Agent,
) -> Result<Vec<RoutingDecision>> {
    if specialists.is_empty() {
        return Err(Error::RoutingFailed("swarm has no registered specialists".to_string()));
    }

    if let Some(router) = custom_router {
        return Ok(vec![router(task, specialists)]);
    }

    if let Some(decisions) = keyword_match(task, specialists) {
        return Ok(decisions);
    }

    if let Some(decisions) = supervisor_route(task, specialists, supervisor).await {
        if !decisions.is_empty() {
            return Ok(decisions);
        }
    }

    let first = &specialists[0];
    Ok(vec![RoutingDecision {
        specialist_id: first.id.clone(),
        reason: "fallback".to_string(),
        confidence: 0.3,
    }])
}

fn keyword_match(task: &str, specialists: &[SpecialistDescriptor]) -> Option<Vec<RoutingDecision>> {
    let lower_task = task.to_lowercase();
    let mut matched: Vec<&SpecialistDescriptor> = specialists
        .iter()
        .filter(|s| {
            s.keywords
                .as_ref()
                .is_some_and(|kws| kws.iter().any(|kw| lower_task.contains(&kw.to_lowercase())))
        })
        .collect();

    if matched.is_empty() {
        return None;
    }

    matched.sort_by(|a, b| b.priority_or_default().cmp(&a.priority_or_default()));

    Some(
        matched
            .into_iter()
            .map(|s| RoutingDecision {
                specialist_id: s.id.clone(),
                reason: format!(
                    "matched keywords: {}",
                    s.keywords.as_ref().map(|k| k.join(", ")).unwrap_or_default()
                ),
                confidence: 0.8,
            })
            .collect(),
    )
}

async fn supervisor_route(
    task: &str,
    specialists: &[SpecialistDescriptor],
    supervisor: &Agent,
) -> Option<Vec<RoutingDecision>> {
    let prompt = build_routing_prompt(task, specialists);
    let result = supervisor.execute(prompt, ExecuteOverrides::none()).await.ok()?;
    let value = first_json_value(&result.response)?;

    let raw: Vec<RawDecision> = if value.is_array() {
        serde_json::from_value(value).ok()?
    } else {
        vec![serde_json::from_value(value).ok()?]
    };

    let known_ids: std::collections::HashSet<&str> = specialists.iter().map(|s| s.id.as_str()).collect();

    Some(
        raw.into_iter()
            .filter(|d| known_ids.contains(d.specialist_id.as_str()))
            .map(|d| RoutingDecision {
                specialist_id: d.specialist_id,
                reason: d.reason,
                confidence: d.confidence.unwrap_or(0.5).clamp(0.0, 1.0),
            })
            .collect(),
    )
}

fn build_routing_prompt(task: &str, specialists: &[SpecialistDescriptor]) -> String {
    let mut roster = String::new();
    for s in specialists {
        let keywords = s.keywords.as_ref().map(|k| k.join(", ")).unwrap_or_default();
        roster.push_str(&format!("- id: {}, specialization: {}, keywords: [{}]\n", s.id, s.specialization, keywords));
    }
    format!(
        "You are routing a task to one or more specialist agents.\n\nSpecialists:\n{roster}\n\
         Task: {task}\n\n\
         Respond with a JSON object or array of objects of the shape \
         {{\"specialistId\": string, \"reason\": string, \"confidence\": number}}."
    )
}

/// Parse the first complete JSON value appearing anywhere in `text`,
/// ignoring any trailing content (the supervisor's response is often
/// wrapped in explanatory prose).
fn first_json_value(text: &str) -> Option<serde_json::Value> {
    let start = text.find(['{', '['])?;
    let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<serde_json::Value>();
    stream.next()?.ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_json_value_skips_leading_prose() {
        let text = r#"Sure thing! {"specialistId": "code", "reason": "matches", "confidence": 0.9} thanks."#;
        let value = first_json_value(text).unwrap();
        assert_eq!(value["specialistId"], "code");
    }

    #[test]
    fn first_json_value_returns_none_without_json() {
        assert!(first_json_value("no json here").is_none());
    }
}
