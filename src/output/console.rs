use crate::models::FileReport;
use std::fmt::{self, Write};

const RULE_WIDTH: usize = 60;

/// Write a report as the human-readable console summary
pub fn render_console<W: Write>(out: &mut W, report: &FileReport) -> fmt::Result {
    let rule = "=".repeat(RULE_WIDTH);
    writeln!(out, "\n{}\nAnalysis Results for file: {}\n{}", rule, report.file_name, rule)?;

    writeln!(out, "\nSuccessfully created S3 buckets:\n")?;
    for bucket in &report.created_buckets {
        writeln!(out, "{}", bucket)?;
    }

    writeln!(out, "\nSuccessfully created EC2 instances:\n")?;
    for instance in &report.created_instances {
        writeln!(out, "{}", instance)?;
    }

    writeln!(out, "\nUser agents created by Kali:\n")?;
    for agent in &report.suspicious_user_agents {
        writeln!(out, "{}", agent)?;
    }

    writeln!(out, "\nTop 5 API Actions:\n")?;
    for entry in &report.top_actions {
        writeln!(out, "{}: {} times", entry.action, entry.count)?;
    }

    writeln!(out, "\nRoot account operations found:\n")?;
    for entry in &report.root_actions {
        writeln!(out, "{}: {} times", entry.action, entry.count)?;
    }

    Ok(())
}
