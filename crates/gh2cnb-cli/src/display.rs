use colored::*;
use gh2cnb_core::graph::DependencyGraph;
use gh2cnb_core::migration::template::Stage;
use gh2cnb_core::Conversion;
use similar::{ChangeTag, TextDiff};
use std::path::Path;

/// Print conversion warnings to stderr so stdout stays valid YAML.
pub fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        eprintln!(" {} {}", "WARNING".yellow().bold(), warning);
    }
}

/// Print a conversion plan: branch, trigger keys, instances and templates.
pub fn print_plan(file: &Path, conversion: &Conversion) {
    println!();
    println!(
        "{}",
        format!(
            " gh2cnb v{} — Planning {}",
            env!("CARGO_PKG_VERSION"),
            file.display()
        )
        .bold()
    );
    println!();

    println!(" {}", "Pipeline Structure".bold().underline());
    println!(
        " {} {} jobs, {} pipeline instances",
        "|-".dimmed(),
        conversion.converted_jobs,
        conversion.instance_count()
    );
    println!(
        " {} Default branch: {}",
        "|-".dimmed(),
        conversion.default_branch.cyan()
    );
    println!();

    println!(" {}", "Templates".bold().underline());
    for (name, template) in &conversion.templates {
        let image = template
            .docker
            .as_ref()
            .map(|d| d.image.as_str())
            .unwrap_or("per instance");
        let barriers = template
            .stages
            .iter()
            .filter(|s| s.sync_key().is_some())
            .count();
        println!(
            " {} {} ({}, {} stages, {} barriers)",
            "|-".dimmed(),
            name.bold(),
            image,
            template.stages.len(),
            barriers
        );
        for stage in &template.stages {
            let label = match stage {
                Stage::Sync { .. } => stage.name().magenta().to_string(),
                Stage::Script { .. } => stage.name().to_string(),
            };
            println!("   {} {}", "|".dimmed(), label);
        }
    }
    println!();

    println!(" {}", "Triggers".bold().underline());
    for (branch, triggers) in &conversion.branches {
        println!(" {} {}", "|-".dimmed(), branch.cyan());
        if triggers.is_empty() {
            println!("   {} {}", "|".dimmed(), "no supported triggers".dimmed());
        }
        for (key, instances) in triggers {
            println!(
                "   {} {} ({} instances)",
                "|-".dimmed(),
                key.to_string().green(),
                instances.len()
            );
            for instance in instances {
                let image = instance
                    .overrides
                    .docker
                    .as_ref()
                    .map(|d| format!(" [{}]", d.image))
                    .unwrap_or_default();
                println!(
                    "     {} {} <- {}{}",
                    "|".dimmed(),
                    instance.name,
                    instance.alias.dimmed(),
                    image
                );
            }
        }
    }
    println!();

    if conversion.warnings.is_empty() {
        println!(
            " {} Every job converted without manual follow-up.",
            "OK".green().bold()
        );
    } else {
        println!(" {}", "Warnings".bold().underline());
        for warning in &conversion.warnings {
            println!(" {} {}", "|-".dimmed(), warning.yellow());
        }
    }
    println!();
}

/// Print the job dependency graph as text.
pub fn print_graph(file: &Path, graph: &DependencyGraph) {
    println!();
    println!(
        "{}",
        format!(" gh2cnb — Job graph for {}", file.display()).bold()
    );
    println!(
        " {} {} jobs, {} dependencies",
        "|-".dimmed(),
        graph.job_count(),
        graph.edge_count()
    );
    println!();
    for line in graph.to_text().lines() {
        println!("   {}", line);
    }

    for dropped in graph.dropped() {
        println!(
            " {} '{}' needs unknown job '{}'",
            "WARNING".yellow().bold(),
            dropped.job,
            dropped.reference
        );
    }
    for cycle in graph.cycles() {
        println!(
            " {} dependency cycle: {}",
            "ERROR".red().bold(),
            cycle.join(" -> ")
        );
    }
    println!();
}

/// Print a diff between an existing CNB file and freshly converted output.
///
/// Returns whether the two differ.
pub fn print_diff(existing: &str, converted: &str, filename: &str) -> bool {
    println!();
    println!("{}", format!(" gh2cnb — Diff for {}", filename).bold());
    println!();

    let diff = TextDiff::from_lines(existing, converted);
    let mut has_changes = false;

    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Delete => {
                has_changes = true;
                print!("{}", format!("- {}", change).red());
            }
            ChangeTag::Insert => {
                has_changes = true;
                print!("{}", format!("+ {}", change).green());
            }
            ChangeTag::Equal => {}
        }
    }

    if !has_changes {
        println!(" {}", "Up to date — no changes.".green());
    }
    println!();
    has_changes
}
