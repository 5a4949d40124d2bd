//! `monadic config`: Configuration management commands.

use monadic_config::AppConfig;

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{}", config.redacted().to_toml()?);
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", AppConfig::config_path().display());
    Ok(())
}

pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let path = AppConfig::config_path();
    if path.exists() {
        println!("   Config already exists at {}", path.display());
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, AppConfig::default_toml())?;

    let data_dir = AppConfig::default().data_dir;
    std::fs::create_dir_all(&data_dir)?;

    println!("   ✅ Wrote {}", path.display());
    println!("   ✅ Data directory {}", data_dir.display());
    Ok(())
}
