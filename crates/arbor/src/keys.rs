//! Key dispatch
//!
//! Tuple matches on `(modifiers, code)`. The picker overlay and the
//! `g` prefix swallow keys before the main table sees them.

use crate::app::App;
use arbor_view::{CollapseOption, ExpandOption};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Routes one key event
pub async fn handle_key(app: &mut App, key: KeyEvent) {
    if app.picker_open() {
        handle_picker_key(app, key);
        return;
    }
    if app.take_goto() {
        handle_goto_key(app, key);
        return;
    }

    match (key.modifiers, key.code) {
        (KeyModifiers::CONTROL, KeyCode::Char('c')) | (KeyModifiers::NONE, KeyCode::Char('q')) => {
            app.quit();
        }
        (KeyModifiers::NONE, KeyCode::Char('j') | KeyCode::Down) => {
            app.engine().move_cursor(1);
        }
        (KeyModifiers::NONE, KeyCode::Char('k') | KeyCode::Up) => {
            app.engine().move_cursor(-1);
        }
        (KeyModifiers::NONE, KeyCode::Enter | KeyCode::Char('o')) => {
            app.toggle_cursor().await;
        }
        (KeyModifiers::NONE, KeyCode::Char('l') | KeyCode::Right) => {
            app.expand_cursor(ExpandOption::Plain).await;
        }
        (KeyModifiers::NONE, KeyCode::Char('h') | KeyCode::Left) => {
            app.collapse_cursor(CollapseOption::Plain).await;
        }
        (KeyModifiers::SHIFT, KeyCode::Char('L')) => {
            app.expand_cursor(ExpandOption::Recursive).await;
        }
        (KeyModifiers::SHIFT, KeyCode::Char('H')) => {
            app.collapse_cursor(CollapseOption::Recursive).await;
        }
        (KeyModifiers::SHIFT, KeyCode::Char('E')) => {
            app.expand_cursor(ExpandOption::Compact).await;
        }
        (KeyModifiers::SHIFT, KeyCode::Char('R')) => {
            app.reload().await;
        }
        (KeyModifiers::NONE, KeyCode::Char('.')) => {
            app.toggle_hidden().await;
        }
        (KeyModifiers::NONE, KeyCode::Char(' ')) => {
            app.toggle_selection().await;
        }
        (KeyModifiers::NONE, KeyCode::Char('c')) => {
            app.clip_copy().await;
        }
        (KeyModifiers::NONE, KeyCode::Char('x')) => {
            app.clip_cut().await;
        }
        (KeyModifiers::NONE, KeyCode::Char('p')) => {
            app.clip_clear().await;
        }
        (KeyModifiers::NONE, KeyCode::Char('g')) => {
            app.arm_goto();
        }
        (KeyModifiers::SHIFT, KeyCode::Char('C')) => {
            app.open_picker();
        }
        _ => {}
    }
}

/// Keys following the `g` prefix
fn handle_goto_key(app: &mut App, key: KeyEvent) {
    match (key.modifiers, key.code) {
        (KeyModifiers::NONE, KeyCode::Char('g')) => {
            app.engine().set_cursor_line(0);
        }
        (KeyModifiers::NONE, KeyCode::Char('n')) => {
            app.next_git_mark();
        }
        (KeyModifiers::NONE, KeyCode::Char('p')) => {
            app.prev_git_mark();
        }
        _ => {}
    }
}

/// Keys while the commit picker overlay is open
fn handle_picker_key(app: &mut App, key: KeyEvent) {
    match (key.modifiers, key.code) {
        (_, KeyCode::Esc) | (KeyModifiers::NONE, KeyCode::Char('q')) => {
            app.close_picker();
        }
        (KeyModifiers::NONE, KeyCode::Char('j') | KeyCode::Down) => {
            if let Some(picker) = app.picker_mut() {
                picker.move_down();
            }
        }
        (KeyModifiers::NONE, KeyCode::Char('k') | KeyCode::Up) => {
            if let Some(picker) = app.picker_mut() {
                picker.move_up();
            }
        }
        (KeyModifiers::NONE, KeyCode::Enter) => {
            app.pick_commit();
        }
        _ => {}
    }
}
