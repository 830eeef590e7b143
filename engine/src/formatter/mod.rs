//! Response Formatter
//!
//! Renders a result bundle into user-facing text. This is a pure transform:
//! every number in the answer comes from the bundle, caveats about truncated
//! or failed steps always come first, and the same bundle always renders to
//! the same text. No model is consulted at format time.

use crate::executor::{ResultBundle, StepOutcome, StepStatus};
use crate::locale::Strings;
use sdk::types::Answer;

/// 1 TIA = 1,000,000 utia.
const UTIA_PER_TIA: f64 = 1_000_000.0;

/// Row fields holding utia amounts, displayed in TIA when large enough.
const AMOUNT_FIELDS: &[&str] = &["amount", "tokens", "bonded_tokens", "not_bonded_tokens"];

/// Display at most this many rows; the row count line discloses the rest.
const MAX_DISPLAY_ROWS: usize = 10;

/// Render an executed plan into an answer.
pub fn format(bundle: &ResultBundle, locale: &str) -> Answer {
    let mut sections = Vec::new();

    if bundle.iter().any(|(_, o)| o.truncated) {
        sections.push(Strings::truncated_caveat(locale).to_string());
    }
    if bundle
        .iter()
        .any(|(_, o)| o.status != StepStatus::Succeeded)
    {
        sections.push(Strings::failed_caveat(locale).to_string());
    }

    match bundle.last() {
        Some(outcome) if !outcome.rows.is_empty() => {
            sections.push(render_outcome(outcome, locale));
        }
        _ => sections.push(Strings::no_data(locale).to_string()),
    }

    Answer {
        text: sections.join("\n\n"),
        locale: locale.to_string(),
        partial: bundle.is_partial(),
    }
}

/// Answer for a request that never reached execution.
pub fn planning_failure(err: &sdk::EngineError, locale: &str) -> Answer {
    let text = match err {
        sdk::EngineError::AllProvidersExhausted | sdk::EngineError::LlmProvider(_) => {
            Strings::service_unavailable(locale)
        }
        _ => Strings::could_not_understand(locale),
    };
    Answer {
        text: text.to_string(),
        locale: locale.to_string(),
        partial: false,
    }
}

fn render_outcome(outcome: &StepOutcome, locale: &str) -> String {
    // Scalar reducers materialize as one synthetic row; render those as a
    // single sentence rather than a table.
    if outcome.rows.len() == 1 {
        if let Some(line) = render_scalar(&outcome.rows[0]) {
            return line;
        }
    }

    let mut lines: Vec<String> = outcome
        .rows
        .iter()
        .take(MAX_DISPLAY_ROWS)
        .map(render_row)
        .collect();

    if outcome.rows.len() > 1 {
        lines.push(format!(
            "({} {})",
            outcome.rows.len(),
            Strings::rows_label(locale)
        ));
    }

    lines.join("\n")
}

/// Recognize the synthetic rows produced by scalar reducers.
fn render_scalar(row: &serde_json::Value) -> Option<String> {
    let obj = row.as_object()?;

    if let Some(count) = obj.get("count").and_then(serde_json::Value::as_u64) {
        if let Some(distinct) = obj.get("distinct").and_then(serde_json::Value::as_array) {
            let shown: Vec<String> = distinct
                .iter()
                .take(MAX_DISPLAY_ROWS)
                .map(render_value)
                .collect();
            return Some(format!("{} distinct: {}", count, shown.join(", ")));
        }
        if obj.len() == 1 {
            return Some(format!("count: {count}"));
        }
    }

    if let Some(sum) = obj.get("sum") {
        return Some(format!("sum: {}", render_reduced(sum, obj)));
    }
    for key in ["min", "max"] {
        if let Some(value) = obj.get(key) {
            if obj.keys().all(|k| k == key || k == "field") {
                return Some(format!("{key}: {}", render_reduced(value, obj)));
            }
        }
    }

    None
}

/// Render a reduced value. The synthetic row names the field it was reduced
/// over; only known amount fields are shown in TIA, everything else verbatim.
fn render_reduced(
    value: &serde_json::Value,
    row: &serde_json::Map<String, serde_json::Value>,
) -> String {
    let is_amount = row
        .get("field")
        .and_then(serde_json::Value::as_str)
        .is_some_and(is_amount_path);
    if is_amount {
        render_amount(value)
    } else {
        render_value(value)
    }
}

fn render_row(row: &serde_json::Value) -> String {
    match row.as_object() {
        Some(obj) => {
            let parts: Vec<String> = obj
                .iter()
                .map(|(key, value)| {
                    if is_amount_field(key) {
                        format!("{}: {}", key, render_amount(value))
                    } else {
                        format!("{}: {}", key, render_value(value))
                    }
                })
                .collect();
            parts.join(", ")
        }
        None => render_value(row),
    }
}

fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(_) | serde_json::Value::Array(_) => value.to_string(),
        other => other.to_string(),
    }
}

fn is_amount_field(key: &str) -> bool {
    AMOUNT_FIELDS.contains(&key)
}

/// Whether a dot-path ends in an amount field (e.g. `balance.amount`).
fn is_amount_path(path: &str) -> bool {
    is_amount_field(path.rsplit('.').next().unwrap_or(path))
}

/// Render a utia amount in TIA when it is at least one TIA, otherwise
/// verbatim. Accepts numbers and decimal strings.
fn render_amount(value: &serde_json::Value) -> String {
    let Some(utia) = crate::paginate::coerce_number(value) else {
        return render_value(value);
    };
    if utia.abs() < UTIA_PER_TIA {
        return render_value(value);
    }
    let tia = utia / UTIA_PER_TIA;
    let rendered = format!("{tia:.6}");
    let rendered = rendered.trim_end_matches('0').trim_end_matches('.');
    format!("{rendered} TIA")
}
