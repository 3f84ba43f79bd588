use crate::cli::ConfigCommands;
use crate::error::Result;
use crate::settings::{load_settings, save_settings, set_value, settings_path};

pub fn run(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            let settings = load_settings();
            println!("{}", serde_json::to_string_pretty(&settings)?);
            println!("({})", settings_path().display());
        }
        ConfigCommands::Set { key, value } => {
            let mut settings = load_settings();
            set_value(&mut settings, &key, &value)?;
            save_settings(&settings)?;
            println!("Set {key}.");
        }
    }
    Ok(())
}
