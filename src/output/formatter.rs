use std::io::IsTerminal;
use owo_colors::OwoColorize;
use terminal_size::{Width, terminal_size};

use crate::property::Property;
use crate::ranking::RankedProperty;
use crate::rescore::RescoreReport;
use crate::scoring::{Criterion, Profile, ProfileScore, ScoreBreakdown, WeightVector};

/// Check if stdout is a TTY (for auto-detecting color support)
pub fn should_use_colors() -> bool {
    std::io::stdout().is_terminal()
}

/// Format a score with two decimals ("72.45")
pub fn format_score(score: f64) -> String {
    format!("{:.2}", score)
}

/// Get terminal width, defaulting to None for pipes (unlimited)
fn get_terminal_width() -> Option<usize> {
    terminal_size().map(|(Width(w), _)| w as usize)
}

/// Truncate title to fit available width, accounting for Unicode
fn truncate_title(title: &str, max_width: usize) -> String {
    let chars: Vec<char> = title.chars().collect();
    if chars.len() <= max_width {
        title.to_string()
    } else if max_width > 3 {
        format!("{}...", chars[..max_width - 3].iter().collect::<String>())
    } else {
        chars[..max_width].iter().collect()
    }
}

fn location_of(property: &Property) -> String {
    property
        .municipality
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or("-")
        .to_string()
}

/// Format ranked properties as a table: Index, Score, Id, Title, Municipality
/// No headers. Index column fits "999.", score column fits "100.00".
pub fn format_scored_table(ranked: &[RankedProperty], use_colors: bool) -> String {
    if ranked.is_empty() {
        return "No scored properties found.".to_string();
    }

    let term_width = get_terminal_width();
    let index_width = 4;
    let score_width = 6;
    let separator = "  ";

    ranked
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            let index_str = format!("{:>3}.", idx + 1);
            let score_padded = format!("{:>width$}", format_score(entry.score), width = score_width);
            let id_str = format!("#{}", entry.property.id);
            let location = location_of(entry.property);

            let full_title = entry.property.display_title();
            let fixed_width = index_width
                + 1
                + score_width
                + separator.len() * 3
                + id_str.len()
                + location.chars().count();
            let title = match term_width {
                Some(width) if width > fixed_width + 10 => truncate_title(&full_title, width - fixed_width),
                Some(_) => truncate_title(&full_title, 20),
                None => full_title,
            };

            if use_colors {
                format!(
                    "{} {}{}{}{}{}{}{}",
                    index_str.dimmed(),
                    score_padded.bold(),
                    separator,
                    id_str.dimmed(),
                    separator,
                    title,
                    separator,
                    location.cyan()
                )
            } else {
                format!(
                    "{} {}{}{}{}{}{}{}",
                    index_str, score_padded, separator, id_str, separator, title, separator, location
                )
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format ranked properties as tab-separated values for scripting
/// Columns: id, score, investment, lifestyle, combined, title (no headers, no colors)
pub fn format_tsv(ranked: &[RankedProperty]) -> String {
    ranked
        .iter()
        .map(|entry| {
            let (investment, lifestyle, total) = entry
                .property
                .scores
                .as_ref()
                .map(|s| (s.score_investment, s.score_lifestyle, s.score_total))
                .unwrap_or_default();
            format!(
                "{}\t{}\t{}\t{}\t{}\t{}",
                entry.property.id,
                format_score(entry.score),
                format_score(investment),
                format_score(lifestyle),
                format_score(total),
                entry.property.display_title()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_profile_section(name: &str, score: &ProfileScore, use_colors: bool) -> Vec<String> {
    let header = format!("{} score: {}", name, format_score(score.score));
    let mut lines = vec![if use_colors { header.bold().to_string() } else { header }];
    if score.weights_used.is_empty() {
        lines.push("  (no criterion with data)".to_string());
        return lines;
    }
    for (criterion, weight) in score.weights_used.iter() {
        let contribution = score.contributions.get(&criterion).copied().unwrap_or(0.0);
        lines.push(format!(
            "  {:<26} weight {:>5.1}%  +{}",
            criterion.label(),
            weight * 100.0,
            format_score(contribution)
        ));
    }
    lines
}

fn format_subscores(breakdown: &ScoreBreakdown, use_colors: bool) -> Vec<String> {
    Criterion::ALL
        .into_iter()
        .map(|criterion| {
            let value = breakdown.subscores.get(&criterion).and_then(|s| s.value());
            match value {
                Some(v) => format!("  {:<26} {:>6}", criterion.label(), format_score(v)),
                None if use_colors => format!("  {:<26} {:>6}", criterion.label(), "n/a".dimmed()),
                None => format!("  {:<26} {:>6}", criterion.label(), "n/a"),
            }
        })
        .collect()
}

/// Multi-line detail of one property: published scores, sub-scores and
/// the weights and contributions behind each profile score.
pub fn format_breakdown(property: &Property, use_colors: bool) -> String {
    let title = property.display_title();
    let mut lines = vec![if use_colors { title.bold().to_string() } else { title }];
    lines.push(format!("  Id: {}", property.id));
    lines.push(format!("  Municipality: {}", location_of(property)));
    if let Some(ref url) = property.url {
        lines.push(format!("  URL: {}", if use_colors { url.underline().to_string() } else { url.clone() }));
    }

    let Some(ref scores) = property.scores else {
        lines.push("  Not scored yet.".to_string());
        return lines.join("\n");
    };

    lines.push(format!(
        "  Scores: investment {} | lifestyle {} | combined {}",
        format_score(scores.score_investment),
        format_score(scores.score_lifestyle),
        format_score(scores.score_total)
    ));
    lines.push(format!("  Scored at: {}", scores.scored_at.format("%Y-%m-%d %H:%M UTC")));

    let Some(ref breakdown) = scores.breakdown else {
        lines.push("  Scoring failed; scores recorded as zero.".to_string());
        return lines.join("\n");
    };

    lines.push(String::new());
    lines.push("Sub-scores".to_string());
    lines.extend(format_subscores(breakdown, use_colors));
    lines.push(String::new());
    lines.extend(format_profile_section("Investment", &breakdown.investment, use_colors));
    lines.push(String::new());
    lines.extend(format_profile_section("Lifestyle", &breakdown.lifestyle, use_colors));
    lines.push(String::new());
    lines.push(format!(
        "Combined = {:.0}% investment + {:.0}% lifestyle = {}",
        breakdown.combined_mix.investment * 100.0,
        breakdown.combined_mix.lifestyle * 100.0,
        format_score(breakdown.combined_score)
    ));

    lines.join("\n")
}

/// Format the weight vector of a profile, one criterion per line
pub fn format_weights(profile: Profile, weights: &WeightVector, persisted: bool, use_colors: bool) -> String {
    let source = if persisted { "saved" } else { "defaults" };
    let header = format!("{} weights ({})", profile, source);
    let mut lines = vec![if use_colors { header.bold().to_string() } else { header }];
    for (criterion, weight) in weights.iter() {
        lines.push(format!("  {:<26} {:.4}", criterion.name(), weight));
    }
    lines.push(format!("  {:<26} {:.4}", "total", weights.total()));
    lines.join("\n")
}

/// One-line summary of a rescore run
pub fn format_report(report: &RescoreReport) -> String {
    let mut summary = format!(
        "Scored {}/{} properties in {} batch(es)",
        report.scored, report.total, report.batches_committed
    );
    if !report.failed.is_empty() {
        let ids: Vec<String> = report.failed.iter().map(|(id, _)| format!("#{}", id)).collect();
        summary.push_str(&format!("; {} failed ({})", report.failed.len(), ids.join(", ")));
    }
    if report.cancelled {
        summary.push_str("; cancelled");
    }
    if let Some(ref e) = report.commit_error {
        summary.push_str(&format!("; not saved: {}", e));
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{PropertyAttributes, PropertyScores};
    use crate::scoring::{CombinedMix, SubScore, SubScores};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn sample_property() -> Property {
        let mut property = Property::new(42, PropertyAttributes::default());
        property.title = Some("Parcela en Nerja".to_string());
        property.municipality = Some("Nerja".to_string());
        property.scores = Some(PropertyScores {
            score_investment: 61.234,
            score_lifestyle: 70.0,
            score_total: 67.12,
            scored_at: Utc::now(),
            breakdown: None,
        });
        property
    }

    fn ranked(property: &Property, score: f64) -> RankedProperty<'_> {
        RankedProperty { property, score }
    }

    #[test]
    fn test_format_score_two_decimals() {
        assert_eq!(format_score(0.0), "0.00");
        assert_eq!(format_score(72.456), "72.46");
        assert_eq!(format_score(100.0), "100.00");
    }

    #[test]
    fn test_truncate_title_long() {
        assert_eq!(truncate_title("This is a very long title", 15), "This is a ve...");
    }

    #[test]
    fn test_truncate_title_unicode() {
        assert_eq!(truncate_title("Parcela rústica", 20), "Parcela rústica");
        assert_eq!(truncate_title("Parcela rústica grande", 10), "Parcela...");
    }

    #[test]
    fn test_truncate_title_very_narrow() {
        assert_eq!(truncate_title("Hello world", 3), "Hel");
    }

    #[test]
    fn test_format_scored_table_empty() {
        assert_eq!(format_scored_table(&[], false), "No scored properties found.");
    }

    #[test]
    fn test_format_scored_table_rows() {
        let first = sample_property();
        let mut second = sample_property();
        second.id = 7;
        second.title = None;
        second.municipality = None;

        let result = format_scored_table(&[ranked(&first, 67.12), ranked(&second, 12.5)], false);
        let lines: Vec<&str> = result.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("  1."));
        assert!(lines[0].contains(" 67.12"));
        assert!(lines[0].contains("#42"));
        assert!(lines[0].contains("Parcela en Nerja"));
        assert!(lines[0].ends_with("Nerja"));
        assert!(lines[1].starts_with("  2."));
        assert!(lines[1].contains("Property #7"));
        assert!(lines[1].ends_with("-"));
    }

    #[test]
    fn test_format_tsv() {
        let property = sample_property();
        assert_eq!(format_tsv(&[]), "");
        assert_eq!(
            format_tsv(&[ranked(&property, 61.234)]),
            "42\t61.23\t61.23\t70.00\t67.12\tParcela en Nerja"
        );
    }

    #[test]
    fn test_format_breakdown_unscored() {
        let mut property = sample_property();
        property.scores = None;
        let result = format_breakdown(&property, false);
        assert!(result.contains("Id: 42"));
        assert!(result.contains("Not scored yet."));
    }

    #[test]
    fn test_format_breakdown_failed_scoring() {
        let result = format_breakdown(&sample_property(), false);
        assert!(result.contains("combined 67.12"));
        assert!(result.contains("Scoring failed"));
    }

    #[test]
    fn test_format_breakdown_full() {
        let mut property = sample_property();
        let mut subscores: SubScores = Criterion::ALL.into_iter().map(|c| (c, SubScore::NoData)).collect();
        subscores.insert(Criterion::LegalStatus, SubScore::Score(100.0));

        let mut weights = WeightVector::new();
        weights.insert(Criterion::LegalStatus, 1.0);
        let profile = ProfileScore {
            score: 100.0,
            weights_used: weights,
            contributions: BTreeMap::from([(Criterion::LegalStatus, 100.0)]),
        };
        let empty = ProfileScore {
            score: 0.0,
            weights_used: WeightVector::new(),
            contributions: BTreeMap::new(),
        };
        if let Some(scores) = property.scores.as_mut() {
            scores.breakdown = Some(ScoreBreakdown {
                subscores,
                investment: profile,
                lifestyle: empty,
                combined_mix: CombinedMix::default(),
                combined_score: 32.0,
                scored_at: Utc::now(),
            });
        }

        let result = format_breakdown(&property, false);
        assert!(result.contains("Sub-scores"));
        assert!(result.contains("n/a"));
        assert!(result.contains("weight 100.0%  +100.00"));
        assert!(result.contains("(no criterion with data)"));
        assert!(result.contains("Combined = 32% investment + 68% lifestyle = 32.00"));
    }

    #[test]
    fn test_format_weights() {
        let mut weights = WeightVector::new();
        weights.insert(Criterion::Transport, 0.25);
        weights.insert(Criterion::Environment, 0.75);
        let result = format_weights(Profile::Lifestyle, &weights, true, false);
        assert!(result.starts_with("lifestyle weights (saved)"));
        assert!(result.contains("transport"));
        assert!(result.contains("0.7500"));
        assert!(result.contains("1.0000"));
    }

    #[test]
    fn test_format_report() {
        let report = RescoreReport {
            total: 3,
            scored: 2,
            failed: vec![(9, "boom".to_string())],
            batches_committed: 1,
            cancelled: false,
            commit_error: None,
        };
        assert_eq!(format_report(&report), "Scored 2/3 properties in 1 batch(es); 1 failed (#9)");
    }
}
