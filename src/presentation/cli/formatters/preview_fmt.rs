use colored::Colorize;

use crate::presentation::cli::commands::evaluate::EvaluationPreview;

/// Strips ANSI/OSC escape sequences from a string to prevent terminal injection.
fn sanitize_terminal(input: &str) -> String {
    input.chars().filter(|c| *c != '\x1b').collect()
}

#[must_use]
pub fn render_preview(preview: &EvaluationPreview) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {} ({})",
        "Enclosure".bold(),
        sanitize_terminal(&preview.enclosure.name).cyan(),
        sanitize_terminal(&preview.enclosure.location).dimmed()
    ));
    lines.push(format!(
        "  Reading: {:.2} °C against {} rule(s)",
        preview.temperature, preview.rules_checked
    ));

    if preview.firing.is_empty() {
        lines.push(format!("  {}", "No rule would fire".green().bold()));
    } else {
        for rule in &preview.firing {
            lines.push(format!(
                "  {} rule #{}: {}",
                " ALARM ".on_red().white().bold(),
                rule.rule_id,
                rule.condition.yellow()
            ));
        }
    }
    lines.join("\n")
}

pub fn print_preview(preview: &EvaluationPreview) {
    println!();
    println!("{}", render_preview(preview));
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use colored::control;

    use crate::domain::entities::enclosure::Enclosure;
    use crate::presentation::cli::commands::evaluate::FiringRule;

    fn make_preview(firing: Vec<FiringRule>) -> EvaluationPreview {
        EvaluationPreview {
            enclosure: Enclosure {
                id: 1,
                name: "Rack A".to_string(),
                location: "Room 1".to_string(),
            },
            temperature: 31.5,
            rules_checked: 2,
            firing,
        }
    }

    #[test]
    fn sanitize_strips_escape() {
        assert_eq!(sanitize_terminal("Rack\x1b[31m A"), "Rack[31m A");
    }

    #[test]
    fn render_quiet_reading() {
        control::set_override(false);
        let text = render_preview(&make_preview(vec![]));
        assert!(text.contains("Rack A"));
        assert!(text.contains("31.50"));
        assert!(text.contains("No rule would fire"));
    }

    #[test]
    fn render_firing_rules() {
        control::set_override(false);
        let text = render_preview(&make_preview(vec![FiringRule {
            rule_id: 4,
            condition: "temperature > 30.00".to_string(),
        }]));
        assert!(text.contains("rule #4"));
        assert!(text.contains("temperature > 30.00"));
        assert!(!text.contains("No rule would fire"));
    }
}
