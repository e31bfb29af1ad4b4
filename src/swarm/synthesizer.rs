//! The synthesizer (C8): turns a set of specialist outcomes into one
//! response.

use std::sync::Arc;

use crate::agent::{Agent, ExecuteOverrides};

use super::specialist::SpecialistOutcome;

/// A user-supplied synthesis function, consulted instead of the supervisor
/// LLM when more than one specialist ran.
pub type CustomSynthesizer = Arc<dyn Fn(&[SpecialistOutcome]) -> String + Send + Sync>;

/// Produce the swarm's final response from its specialists' outcomes.
///
/// A single successful outcome is passed through verbatim — no supervisor
/// call is made. A single failed outcome is reported as a `(failed:
/// ...)` message rather than its empty response string. With more than
/// one outcome, a configured [`CustomSynthesizer`] runs if present;
/// otherwise the supervisor agent is asked to merge the outcomes,
/// falling back to a raw concatenation if that call itself fails.
pub async fn synthesize(
    task: &str,
    outcomes: &[SpecialistOutcome],
    custom: Option<&CustomSynthesizer>,
    supervisor: &Agent,
) -> String {
    if outcomes.len() == 1 {
        let outcome = &outcomes[0];
        if outcome.success {
            return outcome.response.clone();
        }
        return format!("(failed: {})", outcome.error.as_ref().map_or_else(|| "unknown error".to_string(), |e| e.message.clone()));
    }

    if let Some(synthesizer) = custom {
        return synthesizer(outcomes);
    }

    let prompt = build_synthesis_prompt(task, outcomes);
    match supervisor.execute(prompt, ExecuteOverrides::none()).await {
        Ok(result) => result.response,
        Err(_) => raw_concat(outcomes),
    }
}

fn build_synthesis_prompt(task: &str, outcomes: &[SpecialistOutcome]) -> String {
    let mut body = String::new();
    for outcome in outcomes {
        let contribution = if outcome.success {
            outcome.response.clone()
        } else {
            format!("(failed: {})", outcome.error.as_ref().map_or_else(|| "unknown error".to_string(), |e| e.message.clone()))
        };
        body.push_str(&format!("## {}\n{}\n\n", outcome.specialization, contribution));
    }
    format!(
        "You are synthesizing the results of several specialist agents into one answer.\n\n\
         Original task: {task}\n\n\
         Specialist contributions:\n{body}\
         Write a single coherent response that integrates these contributions."
    )
}

fn raw_concat(outcomes: &[SpecialistOutcome]) -> String {
    outcomes
        .iter()
        .map(|o| {
            if o.success {
                format!("[{}] {}", o.specialization, o.response)
            } else {
                format!("[{}] (failed: {})", o.specialization, o.error.as_ref().map_or_else(|| "unknown error".to_string(), |e| e.message.clone()))
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentBuilder, TerminalError};
    use crate::chat::{ChatProvider, ChatRequest, ChatResponse};
    use crate::error::Result;
    use crate::trace::TraceRecorder;
    use async_trait::async_trait;

    struct Echoer;

    #[async_trait]
    impl ChatProvider for Echoer {
        async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse> {
            Ok(ChatResponse::text("synthesized"))
        }

        fn provider_name(&self) -> &'static str {
            "echoer"
        }

        fn default_model(&self) -> &str {
            "echoer-model"
        }
    }

    fn outcome(id: &str, response: &str, success: bool) -> SpecialistOutcome {
        SpecialistOutcome {
            specialist_id: id.to_string(),
            specialization: format!("{id} specialist"),
            response: response.to_string(),
            trace: TraceRecorder::new().finish(),
            success,
            error: if success {
                None
            } else {
                Some(TerminalError { message: "boom".to_string(), step: 1, cause: None })
            },
            duration_ms: 1,
        }
    }

    #[tokio::test]
    async fn single_outcome_passes_through_verbatim() {
        let supervisor = AgentBuilder::new("sup", "supervisor").provider(Echoer).build().unwrap();
        let outcomes = vec![outcome("a", "the answer", true)];
        let response = synthesize("task", &outcomes, None, &supervisor).await;
        assert_eq!(response, "the answer");
    }

    #[tokio::test]
    async fn single_failed_outcome_reports_failure_not_blank_response() {
        let supervisor = AgentBuilder::new("sup", "supervisor").provider(Echoer).build().unwrap();
        let outcomes = vec![outcome("a", "", false)];
        let response = synthesize("task", &outcomes, None, &supervisor).await;
        assert_eq!(response, "(failed: boom)");
    }

    #[tokio::test]
    async fn multi_outcome_uses_supervisor() {
        let supervisor = AgentBuilder::new("sup", "supervisor").provider(Echoer).build().unwrap();
        let outcomes = vec![outcome("a", "first", true), outcome("b", "second", true)];
        let response = synthesize("task", &outcomes, None, &supervisor).await;
        assert_eq!(response, "synthesized");
    }

    #[tokio::test]
    async fn custom_synthesizer_takes_precedence() {
        let supervisor = AgentBuilder::new("sup", "supervisor").provider(Echoer).build().unwrap();
        let outcomes = vec![outcome("a", "first", true), outcome("b", "second", true)];
        let custom: CustomSynthesizer = Arc::new(|outcomes| format!("custom:{}", outcomes.len()));
        let response = synthesize("task", &outcomes, Some(&custom), &supervisor).await;
        assert_eq!(response, "custom:2");
    }
}
