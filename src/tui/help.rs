use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

fn key_line(key: &'static str, pad: &'static str, action: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(key, Style::default().fg(Color::Magenta)),
        Span::raw(pad),
        Span::raw(action),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let p = Paragraph::new(vec![
        Line::from("Keybinds:"),
        key_line("q / Ctrl-C", "   ", "Quit"),
        key_line("Tab", "          ", "Switch tab"),
        key_line("Up / Down", "    ", "Select form field"),
        key_line("Enter", "        ", "Edit text field / toggle value"),
        key_line("Left / Right", " ", "Adjust value (RPM ±10, process, toggles)"),
        key_line("Esc", "          ", "Leave text editing"),
        key_line("r", "            ", "Run crew"),
        key_line("x", "            ", "Cancel running crew"),
        key_line("s", "            ", "Save post to the configured path"),
        key_line("e", "            ", "Export timestamped copy to CWD"),
        key_line("c", "            ", "Copy post to clipboard"),
        key_line("PgUp / PgDn", "  ", "Scroll preview"),
        Line::from(""),
        Line::from("The crew needs OPENAI_API_KEY, from the secrets file,"),
        Line::from(".env, or the environment."),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
