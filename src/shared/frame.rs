/**
 * Wire Protocol Frames
 *
 * This module defines the text protocol spoken over the persistent
 * connection. Every frame is `<token>\n<body>`; inbound frames parse into
 * the closed `Command` type exactly once at the boundary, outbound pushes
 * encode from the closed `Push` type. The router never touches raw strings.
 */
use crate::shared::error::SharedError;
use crate::shared::user::Peer;
use uuid::Uuid;

/// An inbound client command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `msg` - send a text message to the current viewed peer
    Send { body: String },
    /// `change-page` - switch the viewed peer
    ChangePage { peer: Peer },
    /// `delete-msg` - delete a previously sent message
    DeleteMessage { id: Uuid },
    /// `top` - load messages older than the given millisecond cursor
    LoadOlder { before: i64 },
    /// `ping` - liveness probe
    Ping,
}

impl Command {
    /// Parse one inbound frame
    ///
    /// The token is everything before the first newline, the body the rest.
    /// Unknown tokens and malformed bodies are frame errors; the caller logs
    /// them and keeps the connection open.
    pub fn parse(payload: &str) -> Result<Self, SharedError> {
        let (token, body) = match payload.split_once('\n') {
            Some((token, body)) => (token, body),
            None => (payload, ""),
        };
        match token {
            "msg" => Ok(Command::Send {
                body: body.to_string(),
            }),
            "change-page" => Ok(Command::ChangePage {
                peer: Peer::from_username(body),
            }),
            "delete-msg" => {
                let id = Uuid::parse_str(body.trim())
                    .map_err(|e| SharedError::frame(format!("bad message id: {e}")))?;
                Ok(Command::DeleteMessage { id })
            }
            "top" => {
                let before = body
                    .trim()
                    .parse::<i64>()
                    .map_err(|e| SharedError::frame(format!("bad cursor: {e}")))?;
                Ok(Command::LoadOlder { before })
            }
            "ping" => Ok(Command::Ping),
            other => Err(SharedError::frame(format!("unsupported command: {other:?}"))),
        }
    }
}

/// An outbound server push
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Push {
    /// `users` - refreshed user list fragment
    Users(String),
    /// `msg` - one newly routed message fragment
    Msg(String),
    /// `page` - full history page after a peer switch
    Page(String),
    /// `load` - older-history page
    Load(String),
    /// `checkForLoadingMore` - another page may be available
    CheckForLoadingMore,
    /// `delete-msg` - a message the client rendered was deleted
    DeleteMsg(Uuid),
    /// `pong` - liveness reply
    Pong,
    /// `redirect` - forced navigation for unauthenticated or evicted sockets
    Redirect(String),
}

impl Push {
    /// Encode the push as a wire frame
    pub fn encode(&self) -> String {
        match self {
            Push::Users(fragment) => format!("users\n{fragment}"),
            Push::Msg(fragment) => format!("msg\n{fragment}"),
            Push::Page(fragment) => format!("page\n{fragment}"),
            Push::Load(fragment) => format!("load\n{fragment}"),
            Push::CheckForLoadingMore => "checkForLoadingMore\n".to_string(),
            Push::DeleteMsg(id) => format!("delete-msg\n{id}"),
            Push::Pong => "pong\n".to_string(),
            Push::Redirect(path) => format!("redirect\n{path}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_msg() {
        let cmd = Command::parse("msg\nhello\nworld").unwrap();
        assert_eq!(
            cmd,
            Command::Send {
                body: "hello\nworld".to_string()
            }
        );
    }

    #[test]
    fn test_parse_change_page() {
        let cmd = Command::parse("change-page\nAlice").unwrap();
        assert_eq!(
            cmd,
            Command::ChangePage {
                peer: Peer::User("alice".to_string())
            }
        );
        let cmd = Command::parse("change-page\nbroadcast").unwrap();
        assert_eq!(cmd, Command::ChangePage { peer: Peer::Broadcast });
    }

    #[test]
    fn test_parse_delete_msg() {
        let id = Uuid::new_v4();
        let cmd = Command::parse(&format!("delete-msg\n{id}")).unwrap();
        assert_eq!(cmd, Command::DeleteMessage { id });
        assert!(Command::parse("delete-msg\nnot-a-uuid").is_err());
    }

    #[test]
    fn test_parse_top() {
        let cmd = Command::parse("top\n1700000000000").unwrap();
        assert_eq!(
            cmd,
            Command::LoadOlder {
                before: 1_700_000_000_000
            }
        );
        assert!(Command::parse("top\nsoon").is_err());
    }

    #[test]
    fn test_parse_ping_without_body() {
        assert_eq!(Command::parse("ping\n").unwrap(), Command::Ping);
        assert_eq!(Command::parse("ping").unwrap(), Command::Ping);
    }

    #[test]
    fn test_parse_unknown_token() {
        assert!(Command::parse("shout\nhello").is_err());
        assert!(Command::parse("").is_err());
    }

    #[test]
    fn test_encode_pushes() {
        assert_eq!(Push::Users("frag".into()).encode(), "users\nfrag");
        assert_eq!(Push::Pong.encode(), "pong\n");
        assert_eq!(Push::CheckForLoadingMore.encode(), "checkForLoadingMore\n");
        assert_eq!(Push::Redirect("/".into()).encode(), "redirect\n/");
        let id = Uuid::new_v4();
        assert_eq!(Push::DeleteMsg(id).encode(), format!("delete-msg\n{id}"));
    }

    proptest! {
        #[test]
        fn parse_never_panics(payload in ".*") {
            let _ = Command::parse(&payload);
        }

        #[test]
        fn msg_bodies_roundtrip(body in any::<String>()) {
            let parsed = Command::parse(&format!("msg\n{body}")).unwrap();
            prop_assert_eq!(parsed, Command::Send { body });
        }
    }
}
