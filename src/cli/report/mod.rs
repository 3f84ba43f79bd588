pub mod text;

use crate::cli::{open_source, FilterArgs, OutputArgs, SourceArgs};
use crate::error::Result;
use crate::session::Session;
use crate::settings::load_settings;

pub fn run(
    source: &SourceArgs,
    filter: &FilterArgs,
    limit: Option<usize>,
    output: &OutputArgs,
) -> Result<()> {
    let settings = load_settings();
    let filter = filter.to_filter()?;
    let (file, sheet) = open_source(&source.file, source.sheet.as_deref(), &settings)?;

    let mut session = Session::new();
    session.load(&file, &sheet)?;
    let report = session.report(&filter)?;

    let body = if output.json {
        serde_json::to_string_pretty(&report)?
    } else {
        text::format_report(&report, limit.unwrap_or(settings.detail_limit))
    };
    println!("{body}");
    Ok(())
}

pub fn policy(source: &SourceArgs, filter: &FilterArgs, output: &OutputArgs) -> Result<()> {
    let settings = load_settings();
    let filter = filter.to_filter()?;
    let (file, sheet) = open_source(&source.file, source.sheet.as_deref(), &settings)?;

    let mut session = Session::new();
    session.load(&file, &sheet)?;
    let report = session.report(&filter)?;

    let body = if output.json {
        let payload = serde_json::json!({
            "source": report.source,
            "sheet": report.sheet,
            "filter": report.filter,
            "date_range": report.date_range,
            "warnings": report.warnings,
            "policy": report.policy,
        });
        serde_json::to_string_pretty(&payload)?
    } else {
        text::format_policy_report(&report)
    };
    println!("{body}");
    Ok(())
}
