/// HTTP middleware
///
/// Bearer authentication lives in `taskhub_shared::auth::middleware` next
/// to the token logic it depends on.

pub mod security;
