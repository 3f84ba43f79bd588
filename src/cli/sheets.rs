use std::path::Path;

use crate::cli::report::text::format_sheets;
use crate::error::Result;
use crate::sheet::{sheet_names, SourceFile};

pub fn run(file: &Path) -> Result<()> {
    let source = SourceFile::read(file)?;
    let names = sheet_names(&source)?;
    println!("{}", format_sheets(&names));
    Ok(())
}
