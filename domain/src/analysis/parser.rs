//! Structured analysis parsing from generation output.
//!
//! Agents ask the generation capability for a JSON object. The output is
//! untrusted: it may be wrapped in prose, fenced, partially typed, or not
//! JSON at all. [`parse_analysis`] extracts the object, validates every
//! field on its own, and substitutes an explicit default for anything
//! missing or mistyped. Every substitution is recorded, and any
//! substitution marks the result `low_confidence`.
//!
//! Expected schema:
//! ```json
//! {
//!   "response": "string",
//!   "confidence": 0.0,
//!   "reasoning": "string",
//!   "key_insights": ["string"],
//!   "recommendations": ["string"],
//!   "escalation_needed": false,
//!   "risk_level": "none | low | moderate | high | crisis"
//! }
//! ```

use crate::crisis::RiskTier;
use serde::Serialize;
use serde_json::Value;

/// Confidence used when the field is absent or unusable.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Parsed and validated analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentAnalysis {
    pub response: String,
    pub confidence: f64,
    pub reasoning: String,
    pub key_insights: Vec<String>,
    pub recommendations: Vec<String>,
    pub escalation_needed: bool,
    pub risk_tier: RiskTier,
    /// Names of fields that fell back to their default
    pub defaulted_fields: Vec<&'static str>,
    /// True when any field was defaulted
    pub low_confidence: bool,
    /// Why no JSON object could be used at all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_failure: Option<String>,
}

impl AgentAnalysis {
    /// All-default analysis for text that contained no usable object.
    fn unparsed(text: &str, reason: impl Into<String>) -> Self {
        Self {
            response: text.trim().to_string(),
            confidence: DEFAULT_CONFIDENCE,
            reasoning: String::new(),
            key_insights: Vec::new(),
            recommendations: Vec::new(),
            escalation_needed: false,
            risk_tier: RiskTier::None,
            defaulted_fields: FIELDS.to_vec(),
            low_confidence: true,
            parse_failure: Some(reason.into()),
        }
    }

    /// Whether a specific field was defaulted.
    pub fn is_defaulted(&self, field: &str) -> bool {
        self.defaulted_fields.contains(&field)
    }
}

const FIELDS: [&str; 7] = [
    "response",
    "confidence",
    "reasoning",
    "key_insights",
    "recommendations",
    "escalation_needed",
    "risk_level",
];

/// Parse generation output into an [`AgentAnalysis`].
///
/// Never fails: text without a JSON object yields an all-default analysis
/// whose `response` is the raw text and whose `parse_failure` says why.
pub fn parse_analysis(text: &str) -> AgentAnalysis {
    match extract_json_object(text) {
        Some(Value::Object(map)) => analysis_from_json(&Value::Object(map), text),
        Some(_) => AgentAnalysis::unparsed(text, "top-level JSON value is not an object"),
        None => AgentAnalysis::unparsed(text, "no JSON object found in output"),
    }
}

/// Validate a JSON object field by field.
pub fn analysis_from_json(json: &Value, raw_text: &str) -> AgentAnalysis {
    let mut defaulted = Vec::new();

    let response = match json.get("response").and_then(non_empty_str) {
        Some(s) => s,
        None => {
            defaulted.push("response");
            fallback_response(raw_text)
        }
    };

    let confidence = match json.get("confidence").and_then(coerce_confidence) {
        Some(c) => c,
        None => {
            defaulted.push("confidence");
            DEFAULT_CONFIDENCE
        }
    };

    let reasoning = match json.get("reasoning").and_then(|v| v.as_str()) {
        Some(s) => s.trim().to_string(),
        None => {
            defaulted.push("reasoning");
            String::new()
        }
    };

    let key_insights = string_list(json.get("key_insights")).unwrap_or_else(|| {
        defaulted.push("key_insights");
        Vec::new()
    });

    let recommendations = string_list(json.get("recommendations")).unwrap_or_else(|| {
        defaulted.push("recommendations");
        Vec::new()
    });

    let escalation_needed = match json.get("escalation_needed").and_then(coerce_bool) {
        Some(b) => b,
        None => {
            defaulted.push("escalation_needed");
            false
        }
    };

    let risk_tier = match json
        .get("risk_level")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<RiskTier>().ok())
    {
        Some(tier) => tier,
        None => {
            defaulted.push("risk_level");
            RiskTier::None
        }
    };

    let low_confidence = !defaulted.is_empty();
    AgentAnalysis {
        response,
        confidence,
        reasoning,
        key_insights,
        recommendations,
        escalation_needed,
        risk_tier,
        defaulted_fields: defaulted,
        low_confidence,
        parse_failure: None,
    }
}

/// Locate a JSON value in free text.
///
/// Order: ```json fenced block, any fenced block, the whole text, then the
/// span from the first `{` to the last `}`.
fn extract_json_object(text: &str) -> Option<Value> {
    for block in fenced_blocks(text) {
        if let Ok(value) = serde_json::from_str::<Value>(&block) {
            return Some(value);
        }
    }

    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&trimmed[start..=end]).ok()
}

/// Contents of fenced code blocks, ```json blocks first.
fn fenced_blocks(text: &str) -> Vec<String> {
    let mut tagged = Vec::new();
    let mut untagged = Vec::new();
    let mut current: Option<(bool, String)> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        match current.take() {
            None => {
                if let Some(tag) = trimmed.strip_prefix("```") {
                    current = Some((tag.trim().eq_ignore_ascii_case("json"), String::new()));
                }
            }
            Some((is_json, block)) => {
                if trimmed == "```" {
                    if is_json {
                        tagged.push(block);
                    } else {
                        untagged.push(block);
                    }
                } else {
                    let mut block = block;
                    block.push_str(line);
                    block.push('\n');
                    current = Some((is_json, block));
                }
            }
        }
    }

    tagged.extend(untagged);
    tagged
}

fn non_empty_str(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Numbers in (1, 100] are read as a percentage, everything else is
/// clamped to [0, 1]. Numeric strings are accepted.
fn coerce_confidence(value: &Value) -> Option<f64> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !raw.is_finite() {
        return None;
    }
    let normalized = if raw > 1.0 && raw <= 100.0 {
        raw / 100.0
    } else {
        raw
    };
    Some(normalized.clamp(0.0, 1.0))
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Arrays keep their non-empty string elements; a lone string becomes a
/// one-element list. Other shapes are rejected.
fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    match value? {
        Value::Array(items) => Some(items.iter().filter_map(non_empty_str).collect()),
        Value::String(s) if !s.trim().is_empty() => Some(vec![s.trim().to_string()]),
        _ => None,
    }
}

/// The raw text minus any fenced blocks, used when `response` is missing.
/// Empty when the text was nothing but the object itself.
fn fallback_response(raw_text: &str) -> String {
    let mut out = Vec::new();
    let mut in_fence = false;
    for line in raw_text.lines() {
        if line.trim().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if !in_fence {
            out.push(line);
        }
    }
    let prose = out.join("\n").trim().to_string();
    if prose.starts_with('{') { String::new() } else { prose }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_complete_fenced_object() {
        let text = r#"
Here is my analysis:

```json
{
  "response": "It sounds like the week has been heavy.",
  "confidence": 0.82,
  "reasoning": "User reports sleep loss and isolation",
  "key_insights": ["sleep disruption", "withdrawal from friends"],
  "recommendations": ["explore support network"],
  "escalation_needed": false,
  "risk_level": "moderate"
}
```
"#;
        let analysis = parse_analysis(text);
        assert_eq!(analysis.response, "It sounds like the week has been heavy.");
        assert!((analysis.confidence - 0.82).abs() < 1e-9);
        assert_eq!(analysis.key_insights.len(), 2);
        assert_eq!(analysis.risk_tier, RiskTier::Moderate);
        assert!(!analysis.low_confidence);
        assert!(analysis.defaulted_fields.is_empty());
        assert!(analysis.parse_failure.is_none());
    }

    #[test]
    fn test_plain_text_defaults_everything() {
        let analysis = parse_analysis("I hear you. That sounds hard.");
        assert_eq!(analysis.response, "I hear you. That sounds hard.");
        assert_eq!(analysis.confidence, DEFAULT_CONFIDENCE);
        assert!(analysis.low_confidence);
        assert!(analysis.parse_failure.is_some());
        assert_eq!(analysis.defaulted_fields.len(), FIELDS.len());
    }

    #[test]
    fn test_mistyped_fields_are_defaulted_individually() {
        let text = r#"{"response": "ok", "confidence": "high", "key_insights": 7,
                       "recommendations": ["a", 3, "", "b"], "escalation_needed": "yes",
                       "risk_level": "purple", "reasoning": "r"}"#;
        let analysis = parse_analysis(text);
        assert_eq!(analysis.response, "ok");
        assert_eq!(analysis.confidence, DEFAULT_CONFIDENCE);
        assert!(analysis.is_defaulted("confidence"));
        assert!(analysis.is_defaulted("key_insights"));
        assert!(analysis.is_defaulted("risk_level"));
        assert!(!analysis.is_defaulted("recommendations"));
        assert_eq!(analysis.recommendations, vec!["a".to_string(), "b".to_string()]);
        assert!(analysis.escalation_needed);
        assert!(analysis.low_confidence);
    }

    #[test]
    fn test_confidence_percentage_and_string() {
        let analysis = parse_analysis(r#"{"confidence": 85}"#);
        assert!((analysis.confidence - 0.85).abs() < 1e-9);
        let analysis = parse_analysis(r#"{"confidence": "70%"}"#);
        assert!((analysis.confidence - 0.70).abs() < 1e-9);
        let analysis = parse_analysis(r#"{"confidence": 250}"#);
        assert_eq!(analysis.confidence, 1.0);
        let analysis = parse_analysis(r#"{"confidence": -1}"#);
        assert_eq!(analysis.confidence, 0.0);
        assert!(!analysis.is_defaulted("confidence"));
    }

    #[test]
    fn test_object_embedded_in_prose() {
        let text = "Sure! {\"response\": \"hello\", \"risk_level\": \"critical\"} Hope that helps.";
        let analysis = parse_analysis(text);
        assert_eq!(analysis.response, "hello");
        assert_eq!(analysis.risk_tier, RiskTier::Crisis);
        assert!(analysis.parse_failure.is_none());
    }

    #[test]
    fn test_missing_response_uses_prose_outside_fence() {
        let text = "Some framing text.\n```json\n{\"confidence\": 0.4}\n```";
        let analysis = parse_analysis(text);
        assert_eq!(analysis.response, "Some framing text.");
        assert!(analysis.is_defaulted("response"));
    }

    #[test]
    fn test_non_object_json_is_rejected() {
        let analysis = parse_analysis("[1, 2, 3]");
        assert!(analysis.parse_failure.is_some());
        assert!(analysis.low_confidence);
    }

    #[test]
    fn test_single_string_insight_is_accepted() {
        let analysis = parse_analysis(r#"{"key_insights": "grief after a move"}"#);
        assert_eq!(analysis.key_insights, vec!["grief after a move".to_string()]);
    }
}
