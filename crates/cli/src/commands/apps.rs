//! `monadic apps`: List configured apps.

use monadic_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("📋 Apps ({})", config.apps.len());
    println!();
    for (name, app) in &config.apps {
        println!("  {name}");
        println!("    {} — {}", app.display_name, app.description);
        println!("    vendor: {}  model: {}", app.vendor, app.model);
        if !app.tools.is_empty() {
            let tools: Vec<&str> = app.tools.iter().map(|t| t.name.as_str()).collect();
            println!("    tools:  {}", tools.join(", "));
        }
        println!();
    }
    Ok(())
}
