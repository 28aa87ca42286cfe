use serde::{ Serialize, Deserialize };

use crate::background::menus::MenuEntry;
use crate::models::chat::ChatContext;

/// Messages a page sends to the coordinator.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "action")]
pub enum ClientMessage {
    #[serde(rename = "reloadConfig")]
    ReloadConfig,
    #[serde(rename = "chat", rename_all = "camelCase")] Chat {
        #[serde(default)]
        request_id: Option<String>,
        message: String,
        #[serde(default)]
        context: ChatContext,
    },
    #[serde(rename = "resetChatContext")]
    ResetChatContext,
    #[serde(rename = "text_selected")] TextSelected {
        text: String,
        #[serde(default)]
        url: String,
    },
    #[serde(rename = "menuClicked", rename_all = "camelCase")] MenuClicked {
        menu_item_id: String,
        #[serde(default)]
        selection_text: Option<String>,
    },
    #[serde(rename = "promptAnswer", rename_all = "camelCase")] PromptAnswer {
        request_id: String,
        #[serde(default)]
        text: Option<String>,
    },
}

/// Messages the coordinator pushes to a page.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "action")]
pub enum ServerMessage {
    #[serde(rename = "menus")] Menus {
        entries: Vec<MenuEntry>,
    },
    #[serde(rename = "showChatWindow", rename_all = "camelCase")] ShowChatWindow {
        model: String,
        initial_message: String,
        overlay_enabled: bool,
    },
    #[serde(rename = "appendChatResponse", rename_all = "camelCase")] AppendChatResponse {
        response_text: String,
    },
    #[serde(rename = "appendChatError")] AppendChatError {
        message: String,
    },
    #[serde(rename = "chatResponse", rename_all = "camelCase")] ChatResponse {
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    #[serde(rename = "alert")] Alert {
        message: String,
    },
    #[serde(rename = "prompt", rename_all = "camelCase")] Prompt {
        request_id: String,
        message: String,
    },
    #[serde(rename = "configReloaded")] ConfigReloaded {
        success: bool,
    },
    #[serde(rename = "error")] Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_chat_request_with_context() {
        let raw = json!({
            "action": "chat",
            "requestId": "r1",
            "message": "shorter please",
            "context": { "originalText": "Summarize\n\nlong text", "resultText": "" }
        });
        let parsed: ClientMessage = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed, ClientMessage::Chat {
            request_id: Some("r1".into()),
            message: "shorter please".into(),
            context: ChatContext {
                original_text: "Summarize\n\nlong text".into(),
                result_text: String::new(),
            },
        });
    }

    #[test]
    fn parses_text_selected_with_snake_case_action() {
        let raw = json!({ "action": "text_selected", "text": "hi", "url": "https://a.test" });
        let parsed: ClientMessage = serde_json::from_value(raw).unwrap();
        assert!(matches!(parsed, ClientMessage::TextSelected { ref text, .. } if text == "hi"));
    }

    #[test]
    fn unit_actions_need_only_the_tag() {
        let parsed: ClientMessage = serde_json::from_str(r#"{"action":"resetChatContext"}"#).unwrap();
        assert_eq!(parsed, ClientMessage::ResetChatContext);
    }

    #[test]
    fn chat_response_omits_absent_fields() {
        let msg = ServerMessage::ChatResponse {
            request_id: None,
            message: Some("ok".into()),
            error: None,
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({ "action": "chatResponse", "message": "ok" })
        );
    }

    #[test]
    fn append_response_uses_camel_case_field() {
        let msg = ServerMessage::AppendChatResponse { response_text: "Bonjour".into() };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({ "action": "appendChatResponse", "responseText": "Bonjour" })
        );
    }
}
