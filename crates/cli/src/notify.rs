//! Plain SMTP notification for audits that found absent volumes.
//!
//! Speaks just enough SMTP to hand one text message to a local relay:
//! EHLO (falling back to HELO), MAIL FROM, RCPT TO, DATA, QUIT. No TLS and
//! no AUTH; the relay is expected to be trusted.

use std::fmt;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::debug;
use volmon_config::RunSettings;

#[derive(Debug)]
pub enum NotifyError {
    /// Relay unreachable
    Connect(String),
    /// Relay answered a command with an unexpected code
    Rejected { command: &'static str, reply: String },
    /// Connection broke mid-conversation
    Io(String),
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyError::Connect(msg) => write!(f, "cannot reach mail relay: {}", msg),
            NotifyError::Rejected { command, reply } => {
                write!(f, "mail relay rejected {}: {}", command, reply)
            }
            NotifyError::Io(msg) => write!(f, "mail relay connection error: {}", msg),
        }
    }
}

impl std::error::Error for NotifyError {}

impl From<std::io::Error> for NotifyError {
    fn from(e: std::io::Error) -> Self {
        NotifyError::Io(e.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct SmtpNotifier {
    pub host: String,
    pub port: u16,
    pub from: String,
    pub timeout: Duration,
}

impl SmtpNotifier {
    pub fn from_settings(settings: &RunSettings) -> Self {
        Self {
            host: settings.smtp_host.clone(),
            port: settings.smtp_port,
            from: settings.mail_from.clone(),
            timeout: Duration::from_secs(settings.timeout_secs.max(1)),
        }
    }

    pub fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| NotifyError::Connect(format!("{}:{}: {}", self.host, self.port, e)))?
            .next()
            .ok_or_else(|| NotifyError::Connect(format!("{}:{}: no address", self.host, self.port)))?;

        let stream = TcpStream::connect_timeout(&addr, self.timeout)
            .map_err(|e| NotifyError::Connect(format!("{}: {}", addr, e)))?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;

        let mut session = SmtpSession {
            reader: BufReader::new(stream.try_clone()?),
            writer: stream,
        };

        session.expect("greeting", &[220])?;

        let helo_name = "volmon.localdomain";
        session.command(&format!("EHLO {}", helo_name))?;
        if session.reply()?.0 != 250 {
            session.command(&format!("HELO {}", helo_name))?;
            session.expect("HELO", &[250])?;
        }

        session.command(&format!("MAIL FROM:<{}>", self.from))?;
        session.expect("MAIL FROM", &[250])?;
        session.command(&format!("RCPT TO:<{}>", to))?;
        session.expect("RCPT TO", &[250, 251])?;
        session.command("DATA")?;
        session.expect("DATA", &[354])?;

        let message = format_message(&self.from, to, subject, body);
        session.writer.write_all(message.as_bytes())?;
        session.writer.write_all(b".\r\n")?;
        session.writer.flush()?;
        session.expect("message", &[250])?;

        // The message is accepted; a failed QUIT changes nothing.
        if session.command("QUIT").is_ok() {
            let _ = session.reply();
        }
        debug!("notification sent to {}", to);
        Ok(())
    }
}

struct SmtpSession {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl SmtpSession {
    fn command(&mut self, line: &str) -> Result<(), NotifyError> {
        debug!("smtp > {}", line);
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\r\n")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Read one (possibly multi-line) reply: code plus the last line's text.
    fn reply(&mut self) -> Result<(u16, String), NotifyError> {
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                return Err(NotifyError::Io("connection closed by relay".to_string()));
            }
            let line = line.trim_end();
            debug!("smtp < {}", line);
            let code = line
                .get(..3)
                .and_then(|c| c.parse::<u16>().ok())
                .ok_or_else(|| NotifyError::Io(format!("malformed reply: {}", line)))?;
            // "250-..." continues, "250 ..." ends
            if line.as_bytes().get(3) != Some(&b'-') {
                return Ok((code, line.to_string()));
            }
        }
    }

    fn expect(&mut self, command: &'static str, codes: &[u16]) -> Result<(), NotifyError> {
        let (code, text) = self.reply()?;
        if codes.contains(&code) {
            Ok(())
        } else {
            Err(NotifyError::Rejected { command, reply: text })
        }
    }
}

/// Headers plus body with CRLF line endings and leading dots doubled.
fn format_message(from: &str, to: &str, subject: &str, body: &str) -> String {
    let mut msg = String::new();
    msg.push_str(&format!("From: {}\r\n", from));
    msg.push_str(&format!("To: {}\r\n", to));
    msg.push_str(&format!("Subject: {}\r\n", subject));
    msg.push_str(&format!("Date: {}\r\n", chrono::Utc::now().to_rfc2822()));
    msg.push_str("MIME-Version: 1.0\r\n");
    msg.push_str("Content-Type: text/plain; charset=utf-8\r\n");
    msg.push_str("\r\n");
    for line in body.lines() {
        if line.starts_with('.') {
            msg.push('.');
        }
        msg.push_str(line);
        msg.push_str("\r\n");
    }
    msg
}

pub fn subject(region: &str, absent: usize) -> String {
    format!("[volmon] {}: {} absent volume(s)", region, absent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    /// One-shot fake relay. Replies to each command per `script` and returns
    /// every line the client sent.
    fn fake_relay(rcpt_reply: &'static str) -> (u16, thread::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut out = stream;
            let mut seen = Vec::new();
            out.write_all(b"220 relay ready\r\n").unwrap();
            let mut in_data = false;
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap() == 0 {
                    break;
                }
                let line = line.trim_end_matches("\r\n").to_string();
                seen.push(line.clone());
                if in_data {
                    if line == "." {
                        in_data = false;
                        out.write_all(b"250 queued\r\n").unwrap();
                    }
                    continue;
                }
                let reply: &str = if line.starts_with("EHLO") {
                    "250-relay\r\n250 8BITMIME\r\n"
                } else if line.starts_with("MAIL") {
                    "250 ok\r\n"
                } else if line.starts_with("RCPT") {
                    rcpt_reply
                } else if line == "DATA" {
                    in_data = true;
                    "354 go ahead\r\n"
                } else if line == "QUIT" {
                    out.write_all(b"221 bye\r\n").unwrap();
                    break;
                } else {
                    "500 what\r\n"
                };
                out.write_all(reply.as_bytes()).unwrap();
            }
            seen
        });
        (port, handle)
    }

    fn notifier(port: u16) -> SmtpNotifier {
        SmtpNotifier {
            host: "127.0.0.1".into(),
            port,
            from: "volmon@localhost".into(),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn delivers_message() {
        let (port, relay) = fake_relay("250 ok\r\n");
        notifier(port)
            .send("ops@example.com", &subject("lab", 2), "line one\n.hidden\n")
            .unwrap();

        let seen = relay.join().unwrap();
        assert!(seen[0].starts_with("EHLO "));
        assert_eq!(seen[1], "MAIL FROM:<volmon@localhost>");
        assert_eq!(seen[2], "RCPT TO:<ops@example.com>");
        assert_eq!(seen[3], "DATA");
        assert!(seen.contains(&"Subject: [volmon] lab: 2 absent volume(s)".to_string()));
        assert!(seen.contains(&"line one".to_string()));
        // dot-stuffed
        assert!(seen.contains(&"..hidden".to_string()));
        assert_eq!(seen.last().map(String::as_str), Some("QUIT"));
    }

    #[test]
    fn rejected_recipient_is_an_error() {
        let (port, relay) = fake_relay("550 no such user\r\n");
        let err = notifier(port).send("nobody@example.com", "s", "b").unwrap_err();
        assert!(matches!(err, NotifyError::Rejected { command: "RCPT TO", .. }), "{err:?}");
        assert!(err.to_string().contains("550 no such user"));
        drop(relay);
    }

    #[test]
    fn unreachable_relay_is_connect_error() {
        // Bind then drop to get a port nothing listens on.
        let port = {
            let l = TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let err = notifier(port).send("a@b", "s", "b").unwrap_err();
        assert!(matches!(err, NotifyError::Connect(_)), "{err:?}");
    }

    #[test]
    fn message_uses_crlf() {
        let msg = format_message("f@x", "t@x", "subj", "a\nb");
        assert!(msg.contains("Subject: subj\r\n"));
        assert!(msg.ends_with("\r\na\r\nb\r\n"));
    }
}
