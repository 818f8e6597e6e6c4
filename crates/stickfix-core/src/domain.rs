use std::fmt;

/// Telegram chat id of a participant (numeric).
///
/// Sole key into both the user store and the conversation state table. A
/// registered user has no attributes beyond this id: the store row is the
/// registration fact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
