use anyhow::Context;
use serde::Serialize;

use crate::domain::entities::enclosure::Enclosure;
use crate::domain::ports::store::{EnclosureDirectory, RuleStore};
use crate::domain::rules::firing_rules;
use crate::presentation::cli::formatters::preview_fmt::print_preview;

/// What a reading would trigger, computed without side effects.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationPreview {
    pub enclosure: Enclosure,
    pub temperature: f64,
    pub rules_checked: usize,
    pub firing: Vec<FiringRule>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FiringRule {
    pub rule_id: i64,
    pub condition: String,
}

/// Evaluate `temperature` against the rules of an enclosure.
///
/// # Errors
///
/// Returns an error if the enclosure is unknown or the store cannot be read.
pub fn preview<S>(store: &S, enclosure_id: i64, temperature: f64) -> anyhow::Result<EvaluationPreview>
where
    S: EnclosureDirectory + RuleStore + ?Sized,
{
    let enclosure = store
        .get_enclosure(enclosure_id)
        .context("Failed to read enclosure")?
        .with_context(|| format!("Unknown enclosure: {enclosure_id}"))?;
    let rules = store
        .rules_for(enclosure.id)
        .context("Failed to read threshold rules")?;

    let firing = firing_rules(temperature, &rules)
        .into_iter()
        .map(|rule| FiringRule {
            rule_id: rule.id,
            condition: rule.describe(),
        })
        .collect();

    Ok(EvaluationPreview {
        enclosure,
        temperature,
        rules_checked: rules.len(),
        firing,
    })
}

/// # Errors
///
/// Returns an error if the preview cannot be computed or serialized.
pub fn run_evaluate<S>(store: &S, enclosure_id: i64, temperature: f64, json: bool) -> anyhow::Result<()>
where
    S: EnclosureDirectory + RuleStore + ?Sized,
{
    let result = preview(store, enclosure_id, temperature)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_preview(&result);
    }
    Ok(())
}
