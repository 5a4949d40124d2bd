//! `monadic chat`: Single-message or interactive chat with one app.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use monadic_agent::{StreamingToolCallSession, TurnOutcome, build_app_session};
use monadic_config::AppConfig;
use monadic_core::{ConfigSource, ImageAttachment, Role, Session, StreamEvent};
use monadic_providers::{ReqwestTransport, TransportTimeouts};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

pub async fn run(
    app: &str,
    message: Option<String>,
    image: Option<PathBuf>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let transport = ReqwestTransport::new(TransportTimeouts {
        connect: config.defaults.connect_timeout(),
        read: config.defaults.read_timeout(),
        write: config.defaults.write_timeout(),
    })?;
    let registry = monadic_tools::default_registry(&config.data_dir);
    let keys: Arc<dyn ConfigSource> = Arc::new(config.clone());
    let (engine, mut session) =
        build_app_session(&config, app, &registry, Arc::new(transport), keys)?;

    info!(app, vendor = %engine.vendor(), tools = engine.tools().len(), "Chat ready");

    let image = image.as_deref().map(load_image).transpose()?;

    if let Some(msg) = message {
        session.set_message(msg, image);
        let outcome = send(&engine, &mut session, json).await;
        if let TurnOutcome::Failed(e) = outcome {
            return Err(e.into());
        }
        return Ok(());
    }

    let settings = config.app(app)?;
    println!();
    println!("  {} ({})", settings.display_name, app);
    println!("  Vendor:  {}", settings.vendor);
    println!("  Model:   {}", session.parameters.model);
    if !session.parameters.tools.is_empty() {
        let names: Vec<&str> = session.parameters.tools.iter().map(|t| t.name.as_str()).collect();
        println!("  Tools:   {}", names.join(", "));
    }
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut image = image;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        session.set_message(line, image.take());
        println!();
        send(&engine, &mut session, json).await;
        println!();
    }

    println!();
    Ok(())
}

/// Run one user turn, printing events as they arrive.
///
/// The reply is added to the history only when the turn completes.
async fn send(engine: &StreamingToolCallSession, session: &mut Session, json: bool) -> TurnOutcome {
    let sink = move |event: StreamEvent| print_event(&event, json);
    let outcome = engine.send_turn(session, Role::User, 0, &sink).await;
    if let TurnOutcome::Completed { text, .. } = &outcome {
        session.push_assistant(text.clone());
    }
    outcome
}

fn print_event(event: &StreamEvent, json: bool) {
    if json {
        if let Ok(line) = serde_json::to_string(event) {
            println!("{line}");
        }
        return;
    }

    match event {
        StreamEvent::Fragment { content } => {
            print!("{content}");
            let _ = std::io::stdout().flush();
        }
        StreamEvent::Wait { content } => eprintln!("\n  [{}]", strip_tags(content)),
        StreamEvent::Message { .. } => println!(),
        StreamEvent::Error { content } => eprintln!("\n  [Error] {content}"),
        StreamEvent::User { .. } => {}
    }
}

/// Drop HTML tags from a status string meant for a browser.
fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for ch in s.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.trim().to_string()
}

/// Read an image file into a data-URL attachment.
fn load_image(path: &Path) -> Result<ImageAttachment, Box<dyn std::error::Error>> {
    let mime_type = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => return Err(format!("unsupported image type: {}", path.display()).into()),
    };

    let bytes = std::fs::read(path).map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    Ok(ImageAttachment {
        mime_type: mime_type.to_string(),
        data: format!("data:{mime_type};base64,{}", STANDARD.encode(bytes)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_text_loses_markup() {
        assert_eq!(
            strip_tags(monadic_core::event::CALLING_FUNCTIONS),
            "CALLING FUNCTIONS"
        );
    }

    #[test]
    fn image_becomes_data_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dot.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();

        let image = load_image(&path).unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, "data:image/png;base64,iVBORw==");
        assert_eq!(image.base64_payload(), "iVBORw==");
    }

    #[test]
    fn unknown_image_type_rejected() {
        assert!(load_image(Path::new("notes.txt")).is_err());
    }
}
