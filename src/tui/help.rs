use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

fn keybind(key: &'static str, pad: usize, what: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(key, Style::default().fg(Color::Magenta)),
        Span::raw(" ".repeat(pad)),
        Span::raw(what),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let p = Paragraph::new(vec![
        Line::from("Keybinds:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("q", Style::default().fg(Color::Magenta)),
            Span::raw(" / "),
            Span::styled("Ctrl-C", Style::default().fg(Color::Magenta)),
            Span::raw("  Quit"),
        ]),
        keybind("r", 11, "Refresh state from the server"),
        keybind("n", 11, "Start a new session from any step"),
        keybind("tab", 9, "Switch tabs"),
        keybind("?", 11, "Show this help"),
        Line::from(""),
        Line::from("Upload:"),
        keybind("s", 11, "Enter scene image path"),
        keybind("p", 11, "Enter person image path"),
        keybind("enter", 7, "Upload the typed path (esc cancels)"),
        keybind("d", 11, "Detect human figures (needs both images)"),
        Line::from(""),
        Line::from("Detection and matching:"),
        keybind("c", 11, "Confirm detected figures"),
        keybind("a", 11, "Accept the current match"),
        keybind("x", 11, "Reject and check the next candidate"),
        keybind("e", 11, "Save the annotated image"),
        Line::from(""),
        Line::from("Processing:"),
        keybind("b", 11, "Blur the matched person"),
        keybind("k", 11, "Cover the matched person with a sticker"),
        keybind("s", 11, "Save the processed image"),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
