use crate::audit::FileAudit;
use crate::model::AuditReport;
use anyhow::Result;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
#[serde(untagged)]
enum JsonOutcome<'a> {
    Report(&'a AuditReport),
    Error { file: &'a Path, error: String },
}

pub fn generate_json_string(audits: &[FileAudit]) -> Result<String> {
    let entries: Vec<JsonOutcome> = audits
        .iter()
        .map(|audit| match &audit.outcome {
            Ok(report) => JsonOutcome::Report(report),
            Err(e) => JsonOutcome::Error {
                file: &audit.file,
                error: e.to_string(),
            },
        })
        .collect();

    Ok(serde_json::to_string_pretty(&entries)?)
}

pub fn print_json(audits: &[FileAudit]) -> Result<()> {
    println!("{}", generate_json_string(audits)?);
    Ok(())
}
