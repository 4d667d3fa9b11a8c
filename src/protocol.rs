// Wire protocol: inbound request parsing and outbound framing
//
// Requests are one UTF-8 line each on the shared inbound channel,
// `|`-separated with no escaping. The first field is a numeric type
// code; the remaining fields depend on the code.

/// Field separator for requests and for the online-list reply.
pub const SEPARATOR: char = '|';

/// Reply written to a user's channel on successful login.
pub const LOGIN_OK: &str = "1";

/// Reply for a login with unknown or wrong credentials.
pub const LOGIN_INCORRECT: &str = "Login incorrect";

/// Reply for a login attempt while the registry is at capacity.
pub const SERVER_FULL: &str = "Server is full";

/// Reply for a login attempt for a username that is already online.
pub const ALREADY_LOGGED_IN: &str = "User already logged in";

/// Sentinel instructing a client's listener to terminate and clean up.
pub const LOGOUT_SENTINEL: &str = "Logged out.";

/// Printable notice preceding the sentinel at server shutdown.
pub const SERVER_TERMINATED: &str = "Server terminated";

/// One parsed request from the inbound channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `1|username|password`
    Login { username: String, password: String },
    /// `2|replyChannel` — the requester created `replyChannel` and
    /// will read exactly one line from it.
    ListOnline { reply: String },
    /// `3|from|to|body` — `body` is everything after the third
    /// separator, verbatim.
    SendMessage {
        from: String,
        to: String,
        body: String,
    },
    /// `4|username`
    Logout { username: String },
    /// Anything that failed to parse; the router logs and drops it.
    Malformed { reason: String },
}

impl Command {
    /// Parse one inbound line. Never fails: unparseable input becomes
    /// [`Command::Malformed`].
    pub fn parse(line: &str) -> Self {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.is_empty() {
            return Self::Malformed {
                reason: "empty line".to_string(),
            };
        }

        let Some((code, rest)) = line.split_once(SEPARATOR) else {
            return Self::Malformed {
                reason: format!("missing separator: {:?}", line),
            };
        };

        match code {
            "1" => match rest.split_once(SEPARATOR) {
                // Password is the remainder; a password containing the
                // separator cannot be expressed on the wire.
                Some((username, password)) if !password.contains(SEPARATOR) => Self::Login {
                    username: username.to_string(),
                    password: password.to_string(),
                },
                _ => Self::Malformed {
                    reason: format!("bad login request: {:?}", line),
                },
            },
            "2" => {
                if rest.is_empty() || rest.contains(SEPARATOR) {
                    Self::Malformed {
                        reason: format!("bad list request: {:?}", line),
                    }
                } else {
                    Self::ListOnline {
                        reply: rest.to_string(),
                    }
                }
            }
            "3" => {
                let Some((from, rest)) = rest.split_once(SEPARATOR) else {
                    return Self::Malformed {
                        reason: format!("bad message request: {:?}", line),
                    };
                };
                // Everything after the third separator is the body,
                // embedded whitespace included.
                let Some((to, body)) = rest.split_once(SEPARATOR) else {
                    return Self::Malformed {
                        reason: format!("bad message request: {:?}", line),
                    };
                };
                Self::SendMessage {
                    from: from.to_string(),
                    to: to.to_string(),
                    body: body.to_string(),
                }
            }
            "4" => {
                if rest.is_empty() || rest.contains(SEPARATOR) {
                    Self::Malformed {
                        reason: format!("bad logout request: {:?}", line),
                    }
                } else {
                    Self::Logout {
                        username: rest.to_string(),
                    }
                }
            }
            other => Self::Malformed {
                reason: format!("unknown request code: {:?}", other),
            },
        }
    }
}

/// Frame a login request line.
pub fn login_request(username: &str, password: &str) -> String {
    format!("1{SEPARATOR}{username}{SEPARATOR}{password}")
}

/// Frame an online-list request line.
pub fn list_request(reply: &str) -> String {
    format!("2{SEPARATOR}{reply}")
}

/// Frame a directed-message request line.
pub fn message_request(from: &str, to: &str, body: &str) -> String {
    format!("3{SEPARATOR}{from}{SEPARATOR}{to}{SEPARATOR}{body}")
}

/// Frame a logout request line.
pub fn logout_request(username: &str) -> String {
    format!("4{SEPARATOR}{username}")
}

/// Frame the online-list reply: each name prefixed `- `, pipe-joined.
/// Clients re-split on the separator for display.
pub fn list_reply(usernames: &[String]) -> String {
    usernames
        .iter()
        .map(|name| format!("- {name}"))
        .collect::<Vec<_>>()
        .join(&SEPARATOR.to_string())
}

/// Frame a delivered message line.
pub fn delivered_message(from: &str, body: &str) -> String {
    format!("{from} -> {body}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_login() {
        assert_eq!(
            Command::parse("1|alice|secret\n"),
            Command::Login {
                username: "alice".to_string(),
                password: "secret".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(
            Command::parse("2|reply-42"),
            Command::ListOnline {
                reply: "reply-42".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_message_preserves_body() {
        // Body keeps embedded whitespace, it is never truncated at a
        // word boundary.
        assert_eq!(
            Command::parse("3|alice|bob|hello there, bob\n"),
            Command::SendMessage {
                from: "alice".to_string(),
                to: "bob".to_string(),
                body: "hello there, bob".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_message_empty_body() {
        assert_eq!(
            Command::parse("3|alice|bob|"),
            Command::SendMessage {
                from: "alice".to_string(),
                to: "bob".to_string(),
                body: String::new(),
            }
        );
    }

    #[test]
    fn test_parse_logout() {
        assert_eq!(
            Command::parse("4|alice"),
            Command::Logout {
                username: "alice".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_strips_crlf() {
        assert_eq!(
            Command::parse("4|alice\r\n"),
            Command::Logout {
                username: "alice".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(Command::parse(""), Command::Malformed { .. }));
        assert!(matches!(Command::parse("garbage"), Command::Malformed { .. }));
        assert!(matches!(
            Command::parse("9|garbage"),
            Command::Malformed { .. }
        ));
        assert!(matches!(Command::parse("1|alice"), Command::Malformed { .. }));
        assert!(matches!(Command::parse("2|"), Command::Malformed { .. }));
        assert!(matches!(Command::parse("3|alice"), Command::Malformed { .. }));
        assert!(matches!(Command::parse("4|"), Command::Malformed { .. }));
    }

    #[test]
    fn test_list_reply_framing() {
        let names = vec!["alice".to_string(), "bob".to_string()];
        assert_eq!(list_reply(&names), "- alice|- bob");
        assert_eq!(list_reply(&[]), "");
    }

    #[test]
    fn test_delivered_message_framing() {
        assert_eq!(delivered_message("alice", "hi"), "alice -> hi");
    }

    #[test]
    fn test_request_framing_round_trip() {
        assert_eq!(
            Command::parse(&message_request("alice", "bob", "see | you")),
            Command::SendMessage {
                from: "alice".to_string(),
                to: "bob".to_string(),
                body: "see | you".to_string(),
            }
        );
    }
}
