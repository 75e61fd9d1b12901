use crate::audit::FileAudit;
use crate::model::{AuditReport, Finding};
use anyhow::Result;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct FindingRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Installed")]
    installed: String,
    #[tabled(rename = "Patched")]
    patched: String,
    #[tabled(rename = "Vulnerable Dependency")]
    dependency_of: String,
    #[tabled(rename = "Advisory URL")]
    advisory: String,
}

impl From<&Finding> for FindingRow {
    fn from(finding: &Finding) -> Self {
        let dependency_of = if finding.dependency_of.is_empty() {
            "-".to_string()
        } else {
            finding.dependency_path()
        };

        FindingRow {
            name: finding.name.clone(),
            installed: finding.version.clone(),
            patched: finding.advisory.patched_versions.clone(),
            dependency_of,
            advisory: finding.advisory.link().to_string(),
        }
    }
}

pub fn print_cli_table(audits: &[FileAudit]) -> Result<()> {
    for audit in audits {
        println!();
        match &audit.outcome {
            Ok(report) => println!("{}", render_report(report)),
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    println!();
    print_summary(audits);
    Ok(())
}

fn render_report(report: &AuditReport) -> String {
    if report.is_clean() {
        return format!("{}: No vulnerable modules found", report.file.display());
    }

    format!(
        "results for: {}\n\n{}\nknown vulnerable modules found",
        report.file.display(),
        render_table(report)
    )
}

fn render_table(report: &AuditReport) -> String {
    let mut findings: Vec<&Finding> = report.findings.iter().collect();
    findings.sort_by(|a, b| {
        (&a.name, &a.version, &a.dependency_of).cmp(&(&b.name, &b.version, &b.dependency_of))
    });

    let rows: Vec<FindingRow> = findings.into_iter().map(FindingRow::from).collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

fn print_summary(audits: &[FileAudit]) {
    let vulnerable: usize = audits
        .iter()
        .filter_map(|a| a.outcome.as_ref().ok())
        .map(|r| r.findings.len())
        .sum();
    let failed = audits.iter().filter(|a| a.outcome.is_err()).count();

    println!("Summary:");
    println!("  Files audited: {}", audits.len() - failed);
    if failed > 0 {
        println!("  Files that could not be loaded: {}", failed);
    }
    println!("  Vulnerable packages: {}", vulnerable);
}
