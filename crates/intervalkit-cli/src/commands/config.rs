use clap::Subcommand;
use intervalkit_core::Config;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one value (e.g. "poll_interval_ms", "signals.flash")
    Get { key: String },
    /// Change one value; out-of-range numbers are clamped
    Set { key: String, value: String },
    /// Print the effective configuration as JSON
    List,
    /// Print where the configuration file lives
    Path,
    /// Overwrite the file with defaults
    Reset,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Get { key } => {
            let value = Config::load()?
                .get(&key)
                .ok_or_else(|| format!("unknown key: {key}"))?;
            println!("{value}");
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            // Echo what was stored, which differs from the input when clamped.
            if let Some(stored) = config.get(&key) {
                println!("{key} = {stored}");
            }
        }
        ConfigAction::List => {
            println!("{}", serde_json::to_string_pretty(&Config::load()?)?);
        }
        ConfigAction::Path => println!("{}", Config::path()?.display()),
        ConfigAction::Reset => {
            Config::default().save()?;
            println!("config reset to defaults");
        }
    }
    Ok(())
}
