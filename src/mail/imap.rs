//! Minimal blocking IMAP client for subject-filtered answer scans.
//!
//! Speaks just enough IMAP4rev1 for the scan: authenticate, select a folder,
//! `UID SEARCH SUBJECT`, `UID FETCH (INTERNALDATE RFC822)` and `UID MOVE`.
//! Generic over the transport so tests can drive it with scripted buffers.
//! Run it inside `spawn_blocking` from async code.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use chrono::{DateTime, FixedOffset};
use base64::engine::general_purpose::STANDARD as BASE64;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use crate::answers::types::Message;
use crate::config::ImapConfig;
use crate::error::MailError;
use crate::mail::MailSource;
use crate::mail::parse::parse_message;

/// TLS stream used for real servers.
pub type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// `date-time` from RFC 3501, day possibly space-padded.
const INTERNALDATE_FORMAT: &str = "%d-%b-%Y %H:%M:%S %z";

/// Resolved credentials for the session.
pub enum Login {
    /// `LOGIN user password`.
    Password(SecretString),
    /// `AUTHENTICATE XOAUTH2` with an OAuth access token.
    Bearer(SecretString),
}

/// Lines and literals returned by one tagged command.
#[derive(Debug, Default)]
struct Response {
    lines: Vec<String>,
    literals: Vec<Vec<u8>>,
}

/// An authenticated IMAP session with a selected folder.
pub struct ImapMailbox<S: Read + Write> {
    stream: BufReader<S>,
    next_tag: u32,
    processed_folder: Option<String>,
}

impl ImapMailbox<TlsStream> {
    /// Connect over TLS, authenticate, select the scan folder and make sure
    /// the processed folder exists.
    pub fn open(
        config: &ImapConfig,
        login: &Login,
        processed_folder: Option<&str>,
    ) -> Result<Self, MailError> {
        let stream = connect_tls(&config.host, config.port)?;
        let mut mailbox = Self::new(stream)?;

        match login {
            Login::Password(password) => mailbox.login(&config.email_address, password)?,
            Login::Bearer(token) => mailbox.authenticate_xoauth2(&config.email_address, token)?,
        }
        info!(
            user = %config.email_address,
            host = %config.host,
            "Logged in to mailbox"
        );

        mailbox.select(&config.folder)?;
        if let Some(folder) = processed_folder {
            mailbox.ensure_folder(folder);
            mailbox.processed_folder = Some(folder.to_string());
        }
        Ok(mailbox)
    }
}

impl<S: Read + Write> ImapMailbox<S> {
    /// Wrap an established stream and consume the server greeting.
    pub fn new(stream: S) -> Result<Self, MailError> {
        let mut mailbox = Self {
            stream: BufReader::new(stream),
            next_tag: 1,
            processed_folder: None,
        };
        let greeting = mailbox.read_line()?;
        if !(greeting.starts_with("* OK") || greeting.starts_with("* PREAUTH")) {
            return Err(MailError::Protocol(format!(
                "unexpected greeting: {}",
                greeting.trim_end()
            )));
        }
        Ok(mailbox)
    }

    /// Move messages to `folder` on [`MailSource::mark_processed`].
    pub fn with_processed_folder(mut self, folder: impl Into<String>) -> Self {
        self.processed_folder = Some(folder.into());
        self
    }

    pub fn login(&mut self, user: &str, password: &SecretString) -> Result<(), MailError> {
        let cmd = format!("LOGIN {} {}", quote(user), quote(password.expose_secret()));
        self.command("LOGIN", &cmd)
            .map(|_| ())
            .map_err(into_auth_error)
    }

    pub fn authenticate_xoauth2(&mut self, user: &str, token: &SecretString) -> Result<(), MailError> {
        let cmd = format!("AUTHENTICATE XOAUTH2 {}", xoauth2_payload(user, token));
        self.command("AUTHENTICATE", &cmd)
            .map(|_| ())
            .map_err(into_auth_error)
    }

    pub fn select(&mut self, folder: &str) -> Result<(), MailError> {
        self.command("SELECT", &format!("SELECT {}", quote(folder)))?;
        debug!(folder, "Selected folder");
        Ok(())
    }

    /// Create `folder`; an existing folder makes the server answer NO, which is fine.
    pub fn ensure_folder(&mut self, folder: &str) {
        match self.command("CREATE", &format!("CREATE {}", quote(folder))) {
            Ok(_) => info!(folder, "Created processed folder"),
            Err(MailError::Command { .. }) => debug!(folder, "Processed folder already present"),
            Err(e) => warn!(folder, error = %e, "Could not create processed folder"),
        }
    }

    /// UIDs of messages whose subject contains `subject`.
    pub fn search_subject(&mut self, subject: &str) -> Result<Vec<String>, MailError> {
        let cmd = if subject.is_ascii() {
            format!("UID SEARCH SUBJECT {}", quote(subject))
        } else {
            format!("UID SEARCH CHARSET UTF-8 SUBJECT {}", quote(subject))
        };
        let response = self.command("UID SEARCH", &cmd)?;

        let uids = response
            .lines
            .iter()
            .filter_map(|line| line.strip_prefix("* SEARCH"))
            .flat_map(|rest| rest.split_whitespace())
            .map(str::to_string)
            .collect();
        Ok(uids)
    }

    /// Raw RFC 822 bytes of message `uid` and the server's `INTERNALDATE`.
    pub fn fetch_raw(
        &mut self,
        uid: &str,
    ) -> Result<(Vec<u8>, Option<DateTime<FixedOffset>>), MailError> {
        let response =
            self.command("UID FETCH", &format!("UID FETCH {uid} (INTERNALDATE RFC822)"))?;
        let received = response.lines.iter().find_map(|line| internal_date(line));
        let raw = response
            .literals
            .into_iter()
            .next()
            .ok_or_else(|| MailError::Fetch {
                id: uid.to_string(),
                reason: "server returned no message body".into(),
            })?;
        Ok((raw, received))
    }

    pub fn move_to(&mut self, uid: &str, folder: &str) -> Result<(), MailError> {
        self.command("UID MOVE", &format!("UID MOVE {uid} {}", quote(folder)))?;
        Ok(())
    }

    /// End the session. Errors are irrelevant at this point.
    pub fn logout(&mut self) {
        if let Err(e) = self.command("LOGOUT", "LOGOUT") {
            debug!(error = %e, "LOGOUT did not complete cleanly");
        }
    }

    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }

    // ── Wire helpers ────────────────────────────────────────────────

    fn read_line(&mut self) -> Result<String, MailError> {
        let mut buf = Vec::new();
        if self.stream.read_until(b'\n', &mut buf)? == 0 {
            return Err(MailError::ConnectionClosed);
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Send one tagged command and collect everything up to its completion.
    ///
    /// `label` names the command in errors so credentials never end up in logs.
    fn command(&mut self, label: &str, cmd: &str) -> Result<Response, MailError> {
        let tag = format!("A{}", self.next_tag);
        self.next_tag += 1;

        let stream = self.stream.get_mut();
        stream.write_all(format!("{tag} {cmd}\r\n").as_bytes())?;
        stream.flush()?;

        let mut response = Response::default();
        loop {
            let line = self.read_line()?;

            if let Some(status) = line.strip_prefix(&tag).and_then(|l| l.strip_prefix(' ')) {
                if status.starts_with("OK") {
                    return Ok(response);
                }
                return Err(MailError::Command {
                    command: label.to_string(),
                    response: status.trim_end().to_string(),
                });
            }

            if line.starts_with('+') {
                // Continuation request; only seen on a failed SASL exchange.
                // An empty reply lets the server finish with a tagged NO.
                let stream = self.stream.get_mut();
                stream.write_all(b"\r\n")?;
                stream.flush()?;
                continue;
            }

            if let Some(len) = literal_len(&line) {
                let mut literal = vec![0u8; len];
                self.stream.read_exact(&mut literal)?;
                response.literals.push(literal);
            }
            response.lines.push(line);
        }
    }
}

impl<S: Read + Write> MailSource for ImapMailbox<S> {
    fn list(&mut self, subject: &str) -> Result<Vec<String>, MailError> {
        let uids = self.search_subject(subject)?;
        info!(count = uids.len(), subject, "Found messages with matching subject");
        Ok(uids)
    }

    fn fetch(&mut self, id: &str) -> Result<Message, MailError> {
        let (raw, received) = self.fetch_raw(id)?;
        parse_message(id, &raw, received)
    }

    fn mark_processed(&mut self, id: &str) -> Result<(), MailError> {
        let Some(folder) = self.processed_folder.clone() else {
            return Ok(());
        };
        self.move_to(id, &folder)?;
        debug!(uid = id, folder = %folder, "Moved message to processed folder");
        Ok(())
    }
}

/// TCP + rustls with the webpki root store.
fn connect_tls(host: &str, port: u16) -> Result<TlsStream, MailError> {
    let tcp = TcpStream::connect((host, port))?;
    tcp.set_read_timeout(Some(READ_TIMEOUT))?;

    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = Arc::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth(),
    );
    let server_name = rustls_pki_types::ServerName::try_from(host.to_string())
        .map_err(|e| MailError::Tls(format!("invalid server name {host}: {e}")))?;
    let conn = rustls::ClientConnection::new(tls_config, server_name)
        .map_err(|e| MailError::Tls(e.to_string()))?;
    Ok(rustls::StreamOwned::new(conn, tcp))
}

/// SASL XOAUTH2 initial response, base64 encoded.
fn xoauth2_payload(user: &str, token: &SecretString) -> String {
    let raw = format!("user={user}\x01auth=Bearer {}\x01\x01", token.expose_secret());
    BASE64.encode(raw)
}

/// `INTERNALDATE "17-Jul-1996 02:44:25 -0700"` from a FETCH response line.
fn internal_date(line: &str) -> Option<DateTime<FixedOffset>> {
    let start = line.find("INTERNALDATE \"")? + "INTERNALDATE \"".len();
    let rest = &line[start..];
    let value = &rest[..rest.find('"')?];
    DateTime::parse_from_str(value.trim(), INTERNALDATE_FORMAT).ok()
}

/// IMAP quoted string.
fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// Length of a `{N}` literal announced at the end of a response line.
fn literal_len(line: &str) -> Option<usize> {
    let head = line.trim_end().strip_suffix('}')?;
    let open = head.rfind('{')?;
    head[open + 1..].parse().ok()
}

fn into_auth_error(err: MailError) -> MailError {
    match err {
        MailError::Command { response, .. } => MailError::AuthFailed { reason: response },
        other => other,
    }
}
