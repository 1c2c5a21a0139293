use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::backend::TestBackend;
use ratatui::Terminal;
use yuletide_core::persona::builtin_personas;
use yuletide_core::tui_types::{SessionSnapshot, SessionStatus, UiCommand};
use yuletide_core::{Role, TranscriptEntry};
use yuletide_tui::app::{App, AppAction, Tab};
use yuletide_tui::ui;

fn buffer_text(buf: &ratatui::buffer::Buffer) -> String {
    let area = buf.area();
    let mut text = String::new();
    for y in area.y..area.y + area.height {
        for x in area.x..area.x + area.width {
            text.push_str(buf.cell((x, y)).map(|c| c.symbol()).unwrap_or(" "));
        }
        text.push('\n');
    }
    text
}

fn make_app() -> App {
    let logs = Arc::new(Mutex::new(VecDeque::new()));
    logs.lock()
        .unwrap()
        .push_back("12:00:00  INFO yuletide: startup".to_string());
    App::new(builtin_personas(), "yuletide_core", logs)
}

#[test]
fn test_full_draw_cycle() {
    let backend = TestBackend::new(80, 24);
    let mut terminal = Terminal::new(backend).unwrap();
    let mut app = make_app();
    app.update_state(SessionSnapshot {
        status: SessionStatus::Active,
        persona: Some("YULETIDE Core".into()),
        transcript: vec![TranscriptEntry::new(Role::Model, "Systems nominal")],
        scheduled_buffers: 1,
        ..Default::default()
    });

    // Draw all 3 tabs without panics
    for tab in &[Tab::Live, Tab::Personas, Tab::Logs] {
        app.tab = *tab;
        terminal.draw(|frame| ui::draw(frame, &app)).unwrap();
    }
}

#[test]
fn test_start_stop_round_trip_through_snapshots() {
    let backend = TestBackend::new(80, 24);
    let mut terminal = Terminal::new(backend).unwrap();
    let mut app = make_app();

    let start = app.handle_key(KeyEvent::new(KeyCode::Char(' '), KeyModifiers::NONE));
    assert_eq!(
        start,
        AppAction::Command(UiCommand::StartSession {
            persona_id: "yuletide_core".into()
        })
    );

    // Snapshot arrives over the watch channel
    app.update_state(SessionSnapshot {
        status: SessionStatus::Connecting,
        persona: Some("YULETIDE Core".into()),
        ..Default::default()
    });
    terminal.draw(|frame| ui::draw(frame, &app)).unwrap();
    let text = buffer_text(terminal.backend().buffer());
    assert!(text.contains("[CONNECTING]"), "expected connecting:\n{}", text);

    let stop = app.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));
    assert_eq!(stop, AppAction::Command(UiCommand::StopSession));
}

#[test]
fn test_streamed_transcript_redraws() {
    let backend = TestBackend::new(80, 24);
    let mut terminal = Terminal::new(backend).unwrap();
    let mut app = make_app();

    let mut entry = TranscriptEntry::new(Role::Model, "Hello ");
    app.update_state(SessionSnapshot {
        status: SessionStatus::Active,
        transcript: vec![entry.clone()],
        ..Default::default()
    });
    terminal.draw(|frame| ui::draw(frame, &app)).unwrap();
    let text = buffer_text(terminal.backend().buffer());
    assert!(!text.contains("Hello world"));

    entry.text.push_str("world");
    entry.is_complete = true;
    app.update_state(SessionSnapshot {
        status: SessionStatus::Active,
        transcript: vec![entry],
        ..Default::default()
    });
    terminal.draw(|frame| ui::draw(frame, &app)).unwrap();
    let text = buffer_text(terminal.backend().buffer());
    assert!(text.contains("YULETIDE Core: Hello world"), "expected merged line:\n{}", text);
}

#[test]
fn test_remote_close_notice_rendered() {
    let backend = TestBackend::new(80, 24);
    let mut terminal = Terminal::new(backend).unwrap();
    let mut app = make_app();
    app.update_state(SessionSnapshot {
        notice: Some("session closed by remote endpoint: session over".into()),
        ..Default::default()
    });
    terminal.draw(|frame| ui::draw(frame, &app)).unwrap();
    let text = buffer_text(terminal.backend().buffer());
    assert!(text.contains("session closed by remote endpoint"), "missing notice:\n{}", text);
}
