//! Prompt rendering and reply decoding for text-based oracles.

use crate::error::OracleError;
use crate::instruction::InstructionSet;
use crate::oracle::{OracleContext, OracleRequest};
use serde::Serialize;
use triad_core::{Judgment, Stage};

/// Output field contract for a stage
#[must_use]
pub const fn field_contract(stage: Stage) -> &'static str {
    match stage {
        Stage::Initial => {
            "Respond with a single JSON object with exactly these fields:\n\
             - \"probability\": number in [0, 1], the probability that the error is present\n\
             - \"reason\": string, explanation pointing to concrete words, phrases or structures\n\
             - \"confidence\": number in [0, 100], how confident you are that the error is present"
        }
        Stage::Critique => {
            "Respond with a single JSON object with exactly these fields:\n\
             - \"reEvaluatedProb\": number in [0, 1], your re-evaluated probability\n\
             - \"thoughtsOnStage1\": string, your view of the previous agent's evaluation\n\
             - \"reason\": string, concrete evidence for agreeing or disagreeing\n\
             - \"reEvaluatedConfidence\": number in [0, 100], your confidence in the verdict"
        }
        Stage::Verification => {
            "Respond with a single JSON object with exactly these fields:\n\
             - \"consistencyScore\": number in [0, 100], how consistent the prior agents are\n\
             - \"errorsExists\": \"YES\" or \"NO\", whether the flagged errors really exist\n\
             - \"existanceReasoning\": string, brief explanation of the verification"
        }
    }
}

/// System message: criteria followed by the stage's field contract
#[must_use]
pub fn render_system(instruction: &InstructionSet, stage: Stage) -> String {
    format!("{}\n\n{}", instruction.criteria, field_contract(stage))
}

fn to_json<T: Serialize>(value: &T) -> Result<String, OracleError> {
    serde_json::to_string_pretty(value).map_err(|e| OracleError::InvalidOutput {
        message: format!("cannot encode context: {}", e),
    })
}

/// User message: the triple and, depending on stage, prior evaluations
///
/// # Errors
///
/// Returns `OracleError::InvalidOutput` if a context record cannot be encoded
pub fn render_user(request: &OracleRequest) -> Result<String, OracleError> {
    let triple = &request.triple;
    let mut text = format!(
        "SOURCE SENTENCE: {}\n\nMACHINE TRANSLATED SENTENCE: {}\n\nREFERENCE SENTENCE: {}",
        triple.source, triple.machine_translation, triple.reference
    );

    match &request.context {
        OracleContext::Initial => {}
        OracleContext::Critique { parent } => {
            text.push_str("\n\nPREVIOUS AGENT EVALUATIONS: ");
            text.push_str(&to_json(parent)?);
        }
        OracleContext::Verification { parent, siblings } => {
            text.push_str("\n\nSUPER CATEGORY AGENT EVALUATIONS: ");
            text.push_str(&to_json(parent)?);
            let named: Vec<serde_json::Value> = siblings
                .iter()
                .map(|(sub, judgment)| {
                    serde_json::to_value(judgment)
                        .map(|record| serde_json::json!({ sub.as_str(): record }))
                })
                .collect::<Result<_, _>>()
                .map_err(|e| OracleError::InvalidOutput {
                    message: format!("cannot encode context: {}", e),
                })?;
            text.push_str("\n\nSUB CATEGORY AGENTS EVALUATIONS: ");
            text.push_str(&to_json(&named)?);
        }
    }

    Ok(text)
}

/// Extract the JSON object from a model reply
///
/// Tolerates Markdown code fences and prose around the object.
fn extract_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
}

/// Decode a raw reply into the record shape of `stage`
///
/// # Errors
///
/// Returns `OracleError::InvalidOutput` if no JSON object is found or it
/// lacks the stage's fields
pub fn decode_judgment(stage: Stage, raw: &str) -> Result<Judgment, OracleError> {
    let body = extract_object(raw).ok_or_else(|| OracleError::InvalidOutput {
        message: format!(
            "no JSON object in reply: {}",
            raw.chars().take(200).collect::<String>()
        ),
    })?;
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| OracleError::InvalidOutput {
            message: format!("JSON parse error: {}", e),
        })?;
    Ok(Judgment::from_value(stage, value)?)
}
