use super::{ BubbleKind, ChatWidget };

const TITLE: &str = "GPT Helper";
const TYPING: &str = "...";

/// Plain-text rendering of the panel for terminal hosts.
pub fn render(widget: &ChatWidget) -> String {
    if !widget.state().is_open() {
        return widget.notice().map(|n| format!("{}\n", n)).unwrap_or_default();
    }

    let mut out = String::new();
    if widget.model().is_empty() {
        out.push_str(&format!("== {} ==\n", TITLE));
    } else {
        out.push_str(&format!("== {} ({}) ==\n", TITLE, widget.model()));
    }

    for bubble in widget.bubbles() {
        out.push_str(&format!("[{}] {}:\n", bubble.time, speaker(bubble.kind)));
        for line in bubble.text.lines() {
            out.push_str("  ");
            out.push_str(line);
            out.push('\n');
        }
    }

    if widget.is_typing() {
        out.push_str(TYPING);
        out.push('\n');
    }
    if let Some(notice) = widget.notice() {
        out.push_str(&format!("({})\n", notice));
    }
    out
}

/// Only the newest bubble, for hosts that print incrementally.
pub fn render_last(widget: &ChatWidget) -> Option<String> {
    let bubble = widget.bubbles().last()?;
    Some(format!("[{}] {}: {}", bubble.time, speaker(bubble.kind), bubble.text))
}

fn speaker(kind: BubbleKind) -> &'static str {
    match kind {
        BubbleKind::User => "You",
        BubbleKind::Assistant => "Assistant",
        BubbleKind::Error => "!",
    }
}
