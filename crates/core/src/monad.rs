//! Monadic mode.
//!
//! In a monadic app every user message travels as a JSON object
//! `{"message": ..., "context": ...}` and the model is prompted to answer in
//! the same shape. The context carried between turns is whatever the model
//! returned last.

use serde_json::{Map, Value, json};

/// Wrap a user message with the current context.
pub fn unit(message: &str, context: &Value) -> String {
    json!({ "message": message, "context": context }).to_string()
}

/// Parse a monad. Text that is not a JSON object becomes the message of a
/// monad carrying `context`.
pub fn unwrap(monad: &str, context: &Value) -> Map<String, Value> {
    match serde_json::from_str::<Value>(monad) {
        Ok(Value::Object(obj)) if obj.contains_key("message") => obj,
        _ => {
            let mut obj = Map::new();
            obj.insert("message".into(), Value::String(monad.to_string()));
            obj.insert("context".into(), context.clone());
            obj
        }
    }
}

/// Unwrap a reply, adopt its context, and render it as pretty JSON.
pub fn map(monad: &str, context: &mut Value) -> String {
    let obj = unwrap(monad, context);
    if let Some(next) = obj.get("context") {
        *context = next.clone();
    }
    serde_json::to_string_pretty(&Value::Object(obj)).unwrap_or_else(|_| monad.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_wraps_message_and_context() {
        let wrapped = unit("Hello", &json!({"topic": "greeting"}));
        let value: Value = serde_json::from_str(&wrapped).unwrap();
        assert_eq!(value["message"], "Hello");
        assert_eq!(value["context"]["topic"], "greeting");
    }

    #[test]
    fn map_adopts_reply_context() {
        let mut context = json!({});
        let reply = r#"{"message":"Hi!","context":{"turns":1}}"#;
        let rendered = map(reply, &mut context);
        assert_eq!(context, json!({"turns": 1}));
        let value: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["message"], "Hi!");
        assert!(rendered.contains('\n'));
    }

    #[test]
    fn plain_reply_keeps_context() {
        let mut context = json!({"turns": 3});
        let rendered = map("just text", &mut context);
        assert_eq!(context, json!({"turns": 3}));
        let value: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["message"], "just text");
        assert_eq!(value["context"]["turns"], 3);
    }

    #[test]
    fn json_without_message_is_wrapped() {
        let obj = unwrap("[1,2]", &json!(null));
        assert_eq!(obj["message"], "[1,2]");
    }
}
