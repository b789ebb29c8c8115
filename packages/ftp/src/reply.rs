//! Control channel replies and the listings carried on the data channel.

use std::net::Ipv4Addr;

use chrono::{DateTime, NaiveDateTime, Utc};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use unifs_core::{DirEntry, Metadata};

use crate::FtpError;

/// A complete, possibly multi-line, server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    /// Text of every line, codes stripped, joined with `\n`.
    pub message: String,
}

impl Reply {
    pub fn is_positive(&self) -> bool {
        (100..400).contains(&self.code)
    }
}

fn split_line(line: &str) -> Option<(u16, char, &str)> {
    let code = line.get(..3)?.parse().ok()?;
    let mut rest = line[3..].chars();
    let separator = rest.next().unwrap_or(' ');
    Some((code, separator, rest.as_str()))
}

/// Read one reply from the control channel.
///
/// `123-first` opens a multi-line reply that runs until a line starting
/// with `123 `.
pub async fn read_reply<R>(reader: &mut R) -> Result<Reply, FtpError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Err(FtpError::protocol("connection closed"));
    }
    let first = line.trim_end_matches(['\r', '\n']).to_string();
    let (code, separator, text) =
        split_line(&first).ok_or_else(|| FtpError::protocol(format!("bad reply {:?}", first)))?;

    let mut message = text.to_string();
    if separator == '-' {
        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                return Err(FtpError::protocol("connection closed inside a reply"));
            }
            let current = line.trim_end_matches(['\r', '\n']);
            match split_line(current) {
                Some((c, ' ', text)) if c == code => {
                    message.push('\n');
                    message.push_str(text);
                    break;
                }
                _ => {
                    message.push('\n');
                    message.push_str(current.trim_start());
                }
            }
        }
    }

    tracing::trace!(code, message = %message, "ftp reply");
    Ok(Reply { code, message })
}

/// Port announced in a `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)` reply.
///
/// The announced address is returned too, though servers behind NAT often
/// announce one that is unreachable.
pub fn parse_pasv(message: &str) -> Result<(Ipv4Addr, u16), FtpError> {
    let bad = || FtpError::protocol(format!("bad PASV reply {:?}", message));

    let start = message.find('(').ok_or_else(bad)?;
    let end = message[start..].find(')').ok_or_else(bad)? + start;
    let numbers: Vec<u8> = message[start + 1..end]
        .split(',')
        .map(|n| n.trim().parse::<u8>())
        .collect::<Result<_, _>>()
        .map_err(|_| bad())?;
    match numbers.as_slice() {
        [a, b, c, d, p1, p2] => Ok((
            Ipv4Addr::new(*a, *b, *c, *d),
            (u16::from(*p1) << 8) | u16::from(*p2),
        )),
        _ => Err(bad()),
    }
}

/// `YYYYMMDDHHMMSS[.fff]`, the time format of `MDTM` and MLSD `modify`.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let whole = value.split('.').next()?;
    NaiveDateTime::parse_from_str(whole, "%Y%m%d%H%M%S")
        .ok()
        .map(|t| t.and_utc())
}

/// One MLSD line: `fact=value;fact=value; name`.
///
/// The `.` and `..` entries (`type=cdir` / `type=pdir`) yield `None`.
pub fn parse_mlsd_line(line: &str) -> Option<DirEntry> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (facts, name) = line.split_once(' ')?;
    if name.is_empty() {
        return None;
    }

    let mut kind = None;
    let mut size = 0;
    let mut modified = None;
    for fact in facts.split(';').filter(|f| !f.is_empty()) {
        let Some((key, value)) = fact.split_once('=') else {
            continue;
        };
        match key.to_ascii_lowercase().as_str() {
            "type" => kind = Some(value.to_ascii_lowercase()),
            "size" => size = value.parse().unwrap_or(0),
            "modify" => modified = parse_timestamp(value),
            _ => {}
        }
    }

    let metadata = match kind.as_deref() {
        Some("cdir") | Some("pdir") => return None,
        Some("dir") => Metadata::directory(modified),
        _ => Metadata::file(size, modified),
    };
    Some(DirEntry {
        name: name.to_string(),
        metadata,
    })
}
