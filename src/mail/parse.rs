//! RFC 822 → [`Message`] conversion.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use mail_parser::{MessageParser, MimeHeaders};

use crate::answers::types::Message;
use crate::error::MailError;

/// Parse a raw RFC 822 message fetched under `id`.
///
/// The `Date` header is the ordering timestamp; `fallback` (the server's
/// arrival time) is used when it is missing or invalid. With neither the
/// message is rejected as [`MailError::Undated`].
pub fn parse_message(
    id: &str,
    raw: &[u8],
    fallback: Option<DateTime<FixedOffset>>,
) -> Result<Message, MailError> {
    let parsed = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| MailError::Fetch {
            id: id.to_string(),
            reason: "not a parsable RFC 822 message".into(),
        })?;

    let (sender_name, sender_address) = extract_sender(&parsed);
    let received_at = parsed
        .date()
        .and_then(to_fixed_offset)
        .or(fallback)
        .ok_or_else(|| MailError::Undated { id: id.to_string() })?;

    Ok(Message {
        id: id.to_string(),
        sender_name,
        sender_address,
        received_at,
        body: extract_text(&parsed),
    })
}

/// Display name and address of the first `From` mailbox.
fn extract_sender(parsed: &mail_parser::Message) -> (String, String) {
    parsed
        .from()
        .and_then(|addr| addr.first())
        .map(|a| {
            (
                a.name().unwrap_or_default().trim().to_string(),
                a.address().unwrap_or_default().trim().to_string(),
            )
        })
        .unwrap_or_default()
}

/// Readable text of the message: plain part, else stripped HTML, else a
/// textual attachment, else empty.
fn extract_text(parsed: &mail_parser::Message) -> String {
    if let Some(text) = parsed.body_text(0) {
        return text.to_string();
    }
    if let Some(html) = parsed.body_html(0) {
        return strip_html(html.as_ref());
    }
    for part in parsed.attachments() {
        let part: &mail_parser::MessagePart = part;
        if let Some(ct) = MimeHeaders::content_type(part)
            && ct.ctype() == "text"
            && let Ok(text) = std::str::from_utf8(part.contents())
        {
            return text.to_string();
        }
    }
    String::new()
}

/// Keep the header's own UTC offset so the display date matches what the
/// sender's client showed.
fn to_fixed_offset(d: &mail_parser::DateTime) -> Option<DateTime<FixedOffset>> {
    let sign = if d.tz_before_gmt { -1 } else { 1 };
    let offset_secs = sign * (i32::from(d.tz_hour) * 3600 + i32::from(d.tz_minute) * 60);
    let offset = FixedOffset::east_opt(offset_secs)?;

    let naive = NaiveDate::from_ymd_opt(i32::from(d.year), u32::from(d.month), u32::from(d.day))?
        .and_hms_opt(u32::from(d.hour), u32::from(d.minute), u32::from(d.second))?;
    offset.from_local_datetime(&naive).single()
}

/// Strip HTML tags from content (basic).
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                result.push(' ');
            }
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: &str = "From: \"Alice Example\" <Alice@Example.com>\r\n\
        To: survey@example.com\r\n\
        Subject: Offsite RSVP\r\n\
        Date: Mon, 1 Jan 2024 12:00:00 +0200\r\n\
        Message-ID: <abc@example.com>\r\n\
        Content-Type: text/plain; charset=utf-8\r\n\
        \r\n\
        Will you attend? Yes!\r\n";

    #[test]
    fn parses_sender_date_and_body() {
        let msg = parse_message("42", PLAIN.as_bytes(), None).unwrap();

        assert_eq!(msg.id, "42");
        assert_eq!(msg.sender_name, "Alice Example");
        assert_eq!(msg.sender_address, "Alice@Example.com");
        assert_eq!(
            msg.received_at,
            DateTime::parse_from_rfc3339("2024-01-01T12:00:00+02:00").unwrap()
        );
        assert_eq!(msg.received_at.offset().local_minus_utc(), 7200);
        assert!(msg.body.contains("Will you attend? Yes!"));
    }

    #[test]
    fn negative_offset_preserved() {
        let raw = PLAIN.replace("+0200", "-0530");
        let msg = parse_message("1", raw.as_bytes(), None).unwrap();
        assert_eq!(msg.received_at.offset().local_minus_utc(), -(5 * 3600 + 30 * 60));
    }

    #[test]
    fn html_only_body_is_readable() {
        let raw = "From: bob@example.com\r\n\
            Subject: Offsite RSVP\r\n\
            Date: Tue, 2 Jan 2024 09:00:00 +0000\r\n\
            Content-Type: text/html; charset=utf-8\r\n\
            \r\n\
            <html><body><p>Will you attend?</p><p><b>No</b></p></body></html>\r\n";
        let msg = parse_message("2", raw.as_bytes(), None).unwrap();

        assert_eq!(msg.sender_name, "");
        assert_eq!(msg.sender_address, "bob@example.com");
        assert!(msg.body.contains("Will you attend?"));
        assert!(msg.body.contains("No"));
    }

    #[test]
    fn date_header_beats_fallback() {
        let arrival = DateTime::parse_from_rfc3339("2024-06-01T00:00:00Z").unwrap();
        let msg = parse_message("3", PLAIN.as_bytes(), Some(arrival)).unwrap();
        assert_eq!(
            msg.received_at,
            DateTime::parse_from_rfc3339("2024-01-01T12:00:00+02:00").unwrap()
        );
    }

    #[test]
    fn missing_date_uses_fallback() {
        let raw = "From: a@x.com\r\nSubject: x\r\n\r\nDo you agree? yes";
        let arrival = DateTime::parse_from_rfc3339("2024-06-01T08:15:00+02:00").unwrap();

        let msg = parse_message("4", raw.as_bytes(), Some(arrival)).unwrap();
        assert_eq!(msg.received_at, arrival);
    }

    #[test]
    fn missing_date_without_fallback_is_undated() {
        let raw = "From: a@x.com\r\nSubject: x\r\n\r\nDo you agree? yes";
        let err = parse_message("5", raw.as_bytes(), None).unwrap_err();
        assert!(matches!(err, MailError::Undated { ref id } if id == "5"));
    }

    // ── HTML stripping tests ────────────────────────────────────────

    #[test]
    fn strip_html_basic() {
        assert_eq!(strip_html("<p>Hello</p>"), "Hello");
    }

    #[test]
    fn strip_html_separates_block_content() {
        assert_eq!(strip_html("<p>Attend?</p><p>yes</p>"), "Attend? yes");
    }

    #[test]
    fn strip_html_with_attributes() {
        assert_eq!(strip_html(r#"<a href="https://example.com">Link</a>"#), "Link");
    }

    #[test]
    fn strip_html_plain_text_passthrough() {
        assert_eq!(strip_html("No HTML here"), "No HTML here");
    }
}
