// Terminal host for a reader session: pages and status lines on stdout

use reader_sync::{
    ControlState, Focus, Key, ProgressEvent, ProgressNotifier, ReaderControls, ReaderInput,
    RenderedPage, PageSurface, SyncWriteError,
};

pub struct TerminalView;

impl PageSurface for TerminalView {
    fn present(&self, page: &RenderedPage) {
        println!("\n──── page {} ────", page.page);
        println!("{}", page.content);
    }
}

impl ReaderControls for TerminalView {
    fn set_controls(&self, state: ControlState) {
        if state.busy {
            return;
        }
        let mark = |enabled: bool| if enabled { ' ' } else { 'x' };
        println!(
            "[{}] prev (p)   [{}] next (n)   g <page>, home, end, q",
            mark(state.prev_enabled),
            mark(state.next_enabled)
        );
    }

    fn show_progress(&self, event: &ProgressEvent) {
        match event.total_pages {
            Some(total) => println!("page {} of {} ({}%)", event.current_page, total, event.percent),
            None => println!("page {}", event.current_page),
        }
    }

    fn show_notice(&self, message: &str) {
        println!("! {}", message);
    }
}

/// Reports progress changes to the log.
pub struct LogNotifier;

impl ProgressNotifier for LogNotifier {
    fn progress_changed(&self, event: &ProgressEvent) {
        tracing::debug!(
            document_id = %event.document_id,
            page = event.current_page,
            total_pages = ?event.total_pages,
            percent = event.percent,
            "progress changed"
        );
    }

    fn sync_failed(&self, error: &SyncWriteError) {
        tracing::warn!(%error, "progress sync is failing");
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Input(ReaderInput),
    Quit,
    Unknown(String),
}

pub fn parse_command(line: &str) -> Option<Command> {
    let mut parts = line.split_whitespace();
    let head = parts.next()?.to_ascii_lowercase();
    let key = |key| Command::Input(ReaderInput::Key { key, focus: Focus::Reader });
    let command = match head.as_str() {
        "n" | "next" => Command::Input(ReaderInput::Next),
        "p" | "prev" => Command::Input(ReaderInput::Prev),
        "home" => key(Key::Home),
        "end" => key(Key::End),
        "q" | "quit" => Command::Quit,
        "g" | "go" => match parts.next().and_then(|p| p.parse::<u32>().ok()) {
            Some(page) => Command::Input(ReaderInput::GoTo(page)),
            None => Command::Unknown(line.trim().to_string()),
        },
        _ => Command::Unknown(line.trim().to_string()),
    };
    Some(command)
}
