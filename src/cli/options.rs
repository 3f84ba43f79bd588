use crate::cli::report::text::format_options;
use crate::cli::{open_source, SourceArgs};
use crate::error::Result;
use crate::filters::{self, Filter};
use crate::session::Session;
use crate::settings::load_settings;

pub fn run(
    source: &SourceArgs,
    sector: Option<String>,
    responsible: Option<String>,
    json: bool,
) -> Result<()> {
    let settings = load_settings();
    let (file, sheet) = open_source(&source.file, source.sheet.as_deref(), &settings)?;

    let mut session = Session::new();
    let ledger = session.load(&file, &sheet)?;
    let filter = Filter {
        sector,
        responsible,
        ..Default::default()
    };
    let opts = filters::options(&ledger, &filter);

    if json {
        println!("{}", serde_json::to_string_pretty(&opts)?);
    } else {
        println!("{}", format_options(&opts));
    }
    Ok(())
}
