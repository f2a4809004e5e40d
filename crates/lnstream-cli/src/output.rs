//! Terminal output formatting.

use colored::Colorize;
use lnstream_graph::{GraphCounts, ImportReport};

/// Print an import summary.
pub fn print_report(title: &str, report: &ImportReport) {
    println!();
    println!("{}", title.green().bold());
    println!("  Nodes written:   {}", report.nodes_written);
    println!("  Edges written:   {}", report.edges_written);

    if report.records_skipped > 0 {
        println!("  Records skipped: {}", report.records_skipped.to_string().yellow());
    }
    if !report.is_clean() {
        println!(
            "  Failed writes:   {}",
            (report.nodes_failed + report.edges_failed).to_string().red()
        );
        for failure in &report.index_failures {
            println!("  {} index {}: {}", "!".red(), failure.index, failure.error);
        }
        if let Some(err) = &report.last_error {
            println!("  Last error:      {}", err.dimmed());
        }
    }
}

/// Print what the store holds now.
pub fn print_counts(counts: &GraphCounts) {
    println!(
        "  {} {} nodes, {} directed edges",
        "Store:".bold(),
        counts.nodes.to_string().cyan(),
        counts.relationships.to_string().cyan()
    );
}
