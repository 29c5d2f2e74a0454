//! Init command handler

use crate::config::Config;

pub fn cmd_init() -> anyhow::Result<()> {
    if Config::create_default_if_missing()? {
        println!("Created config.toml with default settings.");
        println!("Set JWT_SECRET and ADMIN_PASSWORD before running in production.");
    } else {
        println!("config.toml already exists; leaving it unchanged.");
    }
    Ok(())
}
