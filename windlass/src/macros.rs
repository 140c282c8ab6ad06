/// Creates a single chat [`Message`](crate::Message) from a role shorthand.
///
/// ```rust
/// use windlass::{Role, wl_msg};
///
/// let message = wl_msg!(assistant => "Done.");
/// assert_eq!(message.role, Role::Assistant);
/// assert_eq!(message.content, "Done.");
/// ```
#[macro_export]
macro_rules! wl_msg {
    (system => $content:expr $(,)?) => {
        $crate::Message::system($content)
    };
    (user => $content:expr $(,)?) => {
        $crate::Message::user($content)
    };
    (assistant => $content:expr $(,)?) => {
        $crate::Message::assistant($content)
    };
    ($role:ident => $content:expr $(,)?) => {
        compile_error!("unsupported role: use system, user, or assistant");
    };
}

/// Creates a `Vec<Message>` from role/content pairs.
///
/// ```rust
/// use windlass::{Role, wl_messages};
///
/// let messages = wl_messages![
///     system => "You are concise.",
///     user => "List the files here.",
/// ];
///
/// assert_eq!(messages.len(), 2);
/// assert_eq!(messages[0].role, Role::System);
/// assert_eq!(messages[1].role, Role::User);
/// ```
#[macro_export]
macro_rules! wl_messages {
    () => {
        Vec::<$crate::Message>::new()
    };
    ($($role:ident => $content:expr),+ $(,)?) => {
        vec![$($crate::wl_msg!($role => $content)),+]
    };
}

/// Creates a [`ChatSession`](crate::ChatSession), optionally with a system prompt.
///
/// ```rust
/// use windlass::wl_session;
///
/// let session = wl_session!("repl-1", "llama3.2", "Be concise.");
/// assert_eq!(session.model, "llama3.2");
/// assert_eq!(session.system_prompt.as_deref(), Some("Be concise."));
/// ```
#[macro_export]
macro_rules! wl_session {
    ($session_id:expr, $model:expr $(,)?) => {
        $crate::ChatSession::new($session_id, $model)
    };
    ($session_id:expr, $model:expr, $system_prompt:expr $(,)?) => {
        $crate::ChatSession::new($session_id, $model).with_system_prompt($system_prompt)
    };
}
