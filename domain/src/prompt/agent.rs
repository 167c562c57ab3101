//! Prompt templates for the council agents

use crate::agent::{AgentMessage, AgentOutput, AgentType, MessageContext};

/// Prefix of the role line in every system prompt. Gateways and fixtures
/// can key on `Role: <agent_type>`.
pub const ROLE_MARKER: &str = "Role: ";

const RESPONSE_FORMAT: &str = r#"Respond with a single JSON object in a ```json block:

```json
{
  "response": "what you would say to the user",
  "confidence": 0.0,
  "reasoning": "why",
  "key_insights": ["..."],
  "recommendations": ["... for the care team"],
  "escalation_needed": false,
  "risk_level": "none | low | moderate | high | crisis"
}
```"#;

/// Templates for generating agent prompts
pub struct AgentPromptTemplate;

impl AgentPromptTemplate {
    /// System context for an agent kind.
    pub fn system(agent_type: AgentType) -> String {
        let duties = match agent_type {
            AgentType::Intake => {
                "You gather the user's presenting concern, history and goals. Ask gentle, \
open questions and reflect back what you hear."
            }
            AgentType::CrisisSafety => {
                "You assess immediate risk of harm to self or others. Be direct about safety, \
name crisis resources when risk is high, and set escalation_needed to true for high or \
crisis risk."
            }
            AgentType::CulturalAdaptation => {
                "You adapt the care team's response to the user's cultural background, \
language and values. Point out assumptions that may not fit."
            }
            AgentType::ProgressTracking => {
                "You relate this conversation to the user's goals and earlier sessions, and \
note progress or setbacks."
            }
            AgentType::Coordination => {
                "You look across the care team's views and propose concrete, prioritized next \
steps."
            }
        };

        format!(
            "You are the {name} agent on a mental-health support care team.\n{marker}{role}\n\n\
{duties}\n\nYou are not a replacement for a clinician. Never diagnose.\n\n{format}",
            name = agent_type.display_name(),
            marker = ROLE_MARKER,
            role = agent_type.as_str(),
            duties = duties,
            format = RESPONSE_FORMAT,
        )
    }

    /// User prompt for one analysis.
    pub fn analysis(agent_type: AgentType, message: &AgentMessage, context: &MessageContext) -> String {
        let mut prompt = format!("User message:\n{}\n", message.content.trim());

        if let Some(task) = &context.task {
            prompt.push_str(&format!("\nYour task this turn: {}\n", task));
        }
        if let Some(cultural) = &context.cultural_context {
            prompt.push_str(&format!("\nCultural context: {}\n", cultural));
        }
        if context.turn > 1 {
            prompt.push_str(&format!("\nThis is turn {} of the session.\n", context.turn));
        }

        Self::push_outputs(&mut prompt, "Earlier responses from the team", &context.previous_responses);
        Self::push_outputs(
            &mut prompt,
            "First-round views from every team member (revise yours if needed)",
            &context.peer_outputs,
        );

        if !context.shared.is_empty() {
            let shared = serde_json::Value::Object(context.shared.clone());
            prompt.push_str(&format!("\nShared case data:\n{}\n", shared));
        }

        if agent_type == AgentType::CrisisSafety {
            prompt.push_str("\nAssess risk first. When unsure, err toward safety.\n");
        }

        prompt
    }

    /// Prompt used when a handoff delivers context to the receiving agent.
    pub fn handoff(from: AgentType, reason: &str) -> String {
        format!(
            "The {} agent is handing this case to you.\nReason: {}\n\
Acknowledge the transferred context and summarize what you will focus on.",
            from.display_name(),
            reason
        )
    }

    fn push_outputs(prompt: &mut String, heading: &str, outputs: &[AgentOutput]) {
        if outputs.is_empty() {
            return;
        }
        prompt.push_str(&format!("\n{}:\n", heading));
        for output in outputs {
            prompt.push_str(&format!(
                "- {} (confidence {:.2}): {}\n",
                output.agent_type.display_name(),
                output.confidence,
                output.content.trim()
            ));
        }
    }
}
