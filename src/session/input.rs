// Input events delivered to a reader session

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavRequest {
    Prev,
    Next,
    First,
    Last,
    GoTo(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    PageUp,
    PageDown,
    Space,
    Home,
    End,
    Char(char),
}

/// Where keyboard focus was when a key was pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    /// Inside the reader region.
    Reader,
    /// Nothing in particular, e.g. the page body.
    Neutral,
    /// A text field or other editable control.
    TextInput,
    /// Some other interactive region of the host.
    Elsewhere,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderInput {
    Prev,
    Next,
    GoTo(u32),
    Key { key: Key, focus: Focus },
}

impl ReaderInput {
    /// The navigation this input asks for, if any.
    pub fn request(&self) -> Option<NavRequest> {
        match *self {
            ReaderInput::Prev => Some(NavRequest::Prev),
            ReaderInput::Next => Some(NavRequest::Next),
            ReaderInput::GoTo(page) => Some(NavRequest::GoTo(page)),
            ReaderInput::Key { key, focus } => {
                if !matches!(focus, Focus::Reader | Focus::Neutral) {
                    return None;
                }
                match key {
                    Key::ArrowLeft | Key::PageUp => Some(NavRequest::Prev),
                    Key::ArrowRight | Key::PageDown | Key::Space => Some(NavRequest::Next),
                    Key::Home => Some(NavRequest::First),
                    Key::End => Some(NavRequest::Last),
                    Key::Char(_) => None,
                }
            }
        }
    }
}
