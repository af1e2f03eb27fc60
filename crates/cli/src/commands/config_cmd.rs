//! `intake config` — Configuration management commands.

use intake_config::AppConfig;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let warnings = warnings(&config);
            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Request ids: {}-<actor>-<timestamp>-<seq>", config.request_id_prefix);
            println!(
                "   Gate:        {} ms cooldown, lockout after {} warnings",
                config.gate.cooldown_ms, config.gate.lockout_threshold
            );
            match config.sessions.idle_ttl() {
                Some(ttl) => println!("   Sessions:    reset after {}s idle", ttl.as_secs()),
                None => println!("   Sessions:    kept until restart"),
            }
            println!("   Types:       {}", config.application_types.len());
            println!(
                "   Telegram:    {}",
                if config.telegram.enabled { "enabled" } else { "disabled" }
            );
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

/// Settings that load fine but are probably a mistake.
fn warnings(config: &AppConfig) -> Vec<&'static str> {
    let mut warnings = Vec::new();

    if config.telegram.enabled && config.telegram.bot_token.is_none() {
        warnings.push("Telegram enabled without a bot token (set INTAKE_TELEGRAM_TOKEN)");
    }

    if config.gate.cooldown_ms > 60_000 {
        warnings.push("Gate cooldown above one minute will make the chat feel frozen");
    }

    if let Some(ttl) = config.sessions.idle_ttl() {
        if ttl < config.sessions.sweep_interval() {
            warnings.push("Session idle TTL is shorter than the sweep interval");
        }
    }

    if config.validation.country_code.is_empty() {
        warnings.push("No country code set; any international number is accepted");
    }

    warnings
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_is_valid() {
        let path = AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains("config.toml"));
    }

    #[test]
    fn defaults_have_no_warnings() {
        assert!(warnings(&AppConfig::default()).is_empty());
    }

    #[test]
    fn flags_telegram_without_token() {
        let mut config = AppConfig::default();
        config.telegram.enabled = true;
        assert_eq!(warnings(&config).len(), 1);

        config.sessions.idle_ttl_secs = 5;
        config.sessions.sweep_interval_secs = 60;
        assert_eq!(warnings(&config).len(), 2);
    }
}
