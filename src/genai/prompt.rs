//! Prompt templates and response parsing for the LLM collaborator.

use super::ObjectKind;

pub const RESULT_START: &str = "<result>";
pub const RESULT_END: &str = "</result>";
pub const SYNTHETIC_START: &str = "<synthetic_examples>";
pub const SYNTHETIC_END: &str = "</synthetic_examples>";
pub const ORIGINAL_START: &str = "<original_examples>";
pub const ORIGINAL_END: &str = "</original_examples>";

/// Prompt asking for a short description of a table or column, grounded
/// only in `context`.
pub fn description_prompt(kind: ObjectKind, name: &str, parent: &str, context: &str) -> String {
    let (subject, target, scope) = match kind {
        ObjectKind::Column => (
            "column",
            format!("Column Name: {name} in Table: {parent}"),
            format!("the target column '{name}' within the table '{parent}'"),
        ),
        ObjectKind::Table => (
            "table",
            format!("Table: {name}"),
            format!("the target table '{name}'"),
        ),
    };

    format!(
        "Your task is to generate a brief and concise description for a database {subject} \
based ONLY on the provided knowledge context.

********** Knowledge Context **********
{context}
********** End Knowledge Context **********

**Instructions:**
1. Analyze the Knowledge Context carefully.
2. Determine if the context provides any relevant information SPECIFICALLY about {scope}.
3. If relevant information is found, generate a concise description (max 50 words) summarizing \
that information. Output ONLY the description text within {RESULT_START}{RESULT_END} tags.
4. If NO relevant information about THIS SPECIFIC {subject} is found in the context, output empty \
{RESULT_START}{RESULT_END} tags. Do NOT invent descriptions or use general knowledge.

Target: {target}

Begin analysis and provide description if applicable:
"
    )
}

/// Prompt asking whether sampled values look like PII and, if so, for
/// synthetic replacements of the same shape.
pub fn synthetic_examples_prompt(
    column: &str,
    table: &str,
    data_type: &str,
    examples: &[String],
) -> String {
    let count = examples.len();
    let values = examples.join(", ");
    format!(
        "You are an expert in data privacy and database metadata. Analyze the following database \
column and its example values for Personally Identifiable Information (PII).

**Column Information:**
- Column Name: {column}
- Table Name: {table}
- Data Type: {data_type}
- Original Example Values: [{values}]

**Instructions:**
1. **Analyze for PII:** Based ONLY on the column name, data type, and example values, determine \
if this column is LIKELY to contain PII (e.g., names, emails, phones, addresses, specific IDs). \
Be conservative; if unsure, assume it's NOT PII.
2. **Decision & Output:**
- **If LIKELY PII:** Generate {count} synthetic, plausible-looking example values that match the \
likely *pattern* and *data type* ({data_type}) of the original data but are clearly fake. Output \
these values as a comma-separated list enclosed ONLY in {SYNTHETIC_START}...{SYNTHETIC_END} tags.
- **If NOT LIKELY PII (or unsure):** Return the original example values provided. Output these \
values as a comma-separated list enclosed ONLY in {ORIGINAL_START}...{ORIGINAL_END} tags.

**Example Output (Synthetic):** {SYNTHETIC_START}user1@example.com, user2@example.net, user3@example.org{SYNTHETIC_END}
**Example Output (Original):** {ORIGINAL_START}Active, Inactive, Pending{ORIGINAL_END}

Provide your output based on the analysis:
"
    )
}

/// Trimmed text between the first `start` and the following `end`.
pub fn extract_content_between<'a>(text: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = text.find(start)? + start.len();
    let len = text[from..].find(end)?;
    Some(text[from..from + len].trim())
}

/// Split a comma-separated list, dropping empty entries.
pub fn parse_comma_separated(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(String::from)
        .collect()
}

/// Interpret a PII-analysis response.
///
/// Returns the synthetic values and `true` when the model flagged PII and
/// produced at least one replacement; the originals and `false` otherwise.
pub fn parse_synthetic_response(response: &str, originals: &[String]) -> (Vec<String>, bool) {
    if let Some(content) = extract_content_between(response, SYNTHETIC_START, SYNTHETIC_END) {
        let synthetic = parse_comma_separated(content);
        if !synthetic.is_empty() {
            return (synthetic, true);
        }
    }
    (originals.to_vec(), false)
}
