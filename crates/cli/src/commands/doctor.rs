//! `monadic doctor`: Diagnose configuration and keys.

use monadic_config::AppConfig;
use monadic_core::ConfigSource;
use std::collections::BTreeSet;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Monadic Chat Doctor — System Diagnostics");
    println!("==========================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_path();
    if config_path.exists() {
        println!("  ✅ Config file found at {}", config_path.display());
    } else {
        println!("  ⚠️  No config file — using built-in apps (run `monadic config init`)");
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid ({} apps)", config.apps.len());
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!();
            println!("  ⚠️  1 issue found. See above for details.");
            return Ok(());
        }
    };

    // Only vendors some app uses need a key.
    let vendors: BTreeSet<&str> = config.apps.values().map(|a| a.vendor.as_str()).collect();
    for vendor in vendors {
        let Some(key_name) = monadic_providers::router::api_key_name(vendor) else {
            continue;
        };
        let present = config.lookup(key_name).is_some_and(|k| !k.trim().is_empty());
        if present {
            println!("  ✅ {key_name} set ({vendor})");
        } else {
            println!("  ⚠️  {key_name} missing — {vendor} apps will fail");
            issues += 1;
        }
    }

    if config.data_dir.is_dir() {
        println!("  ✅ Data directory {}", config.data_dir.display());
    } else {
        println!(
            "  ⚠️  Data directory {} missing — fetch_text_from_file will fail",
            config.data_dir.display()
        );
        issues += 1;
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
