//! Check-config command handler

use crate::config::Config;

pub fn cmd_check_config(config: &Config) -> anyhow::Result<()> {
    println!("Environment:     {}", config.general.environment);
    println!("Database:        {}", config.general.database_path);
    println!("Port:            {}", config.server.port);
    println!(
        "OTP:             {} digits, valid {} minutes",
        config.otp.length, config.otp.expires_in_minutes
    );
    println!("Session:         {} hours", config.session.expires_in_hours);
    println!(
        "Email:           {}",
        if config.email.enabled {
            format!("{}:{}", config.email.host, config.email.port)
        } else {
            "disabled (messages are logged, not sent)".to_string()
        }
    );

    let insecure = config.insecure_defaults();
    if !insecure.is_empty() {
        println!();
        println!("Insecure settings:");
        for problem in &insecure {
            println!("  - {problem}");
        }
    }

    config.validate()?;

    println!();
    println!("Configuration OK");
    Ok(())
}
