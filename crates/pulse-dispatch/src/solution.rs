//! Solution generation prompt and response parsing.

use pulse_core::error::{PulseError, Result};
use pulse_core::types::{Item, Solution};
use serde::Deserialize;
use serde_json::Value;

const DEFAULT_TIME: &str = "O(N)";
const DEFAULT_SPACE: &str = "O(1)";

pub fn solution_prompt(item: &Item, language: &str) -> String {
    format!(
        "Provide an optimal solution for the following problem in {language}.\n\n\
         Problem: {title}\n\
         {statement}\n\n\
         Constraints:\n{constraints}\n\n\
         Return a JSON object with these keys:\n\
         \"approach\": a short explanation of the idea,\n\
         \"code\": the complete {language} solution,\n\
         \"complexity\": {{\"time\": \"...\", \"space\": \"...\"}}.",
        title = item.title,
        statement = item.statement,
        constraints = item.constraints,
    )
}

#[derive(Debug, Default, Deserialize)]
struct RawComplexity {
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    space: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSolution {
    #[serde(default, alias = "explanation")]
    approach: Option<String>,
    #[serde(default, alias = "code_snippet", alias = "solution")]
    code: Option<String>,
    #[serde(default)]
    complexity: Option<RawComplexity>,
    #[serde(default)]
    time_complexity: Option<String>,
    #[serde(default)]
    space_complexity: Option<String>,
}

/// Turn a generated JSON object into a `Solution`. Missing complexity
/// figures fall back to O(N) / O(1); missing approach or code is an error.
pub fn parse_solution(value: &Value) -> Result<Solution> {
    let raw: RawSolution = serde_json::from_value(value.clone())
        .map_err(|e| PulseError::GenerationUnavailable(format!("malformed solution: {e}")))?;

    let approach = non_empty(raw.approach)
        .ok_or_else(|| PulseError::GenerationUnavailable("solution has no approach".into()))?;
    let code = non_empty(raw.code)
        .ok_or_else(|| PulseError::GenerationUnavailable("solution has no code".into()))?;

    let complexity = raw.complexity.unwrap_or_default();
    let time_complexity = non_empty(complexity.time)
        .or(non_empty(raw.time_complexity))
        .unwrap_or_else(|| DEFAULT_TIME.into());
    let space_complexity = non_empty(complexity.space)
        .or(non_empty(raw.space_complexity))
        .unwrap_or_else(|| DEFAULT_SPACE.into());

    Ok(Solution {
        approach,
        code,
        time_complexity,
        space_complexity,
    })
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
