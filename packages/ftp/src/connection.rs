//! One logged-in FTP session: the control channel plus passive data
//! connections opened per transfer.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use unifs_core::DirEntry;

use crate::reply::{parse_mlsd_line, parse_pasv, parse_timestamp, read_reply, Reply};
use crate::stream::{FtpStream, Tls};
use crate::{FtpConfig, FtpError};

pub struct Connection {
    control: BufReader<FtpStream>,
    /// Set once `PROT P` is accepted; data channels are wrapped too.
    tls: Option<Tls>,
    /// Data connections go to the control peer, whatever PASV announces.
    peer: IpAddr,
}

impl Connection {
    /// Connect, upgrade to TLS when configured, log in and switch to binary
    /// mode, all within the configured timeout.
    pub async fn open(config: &FtpConfig) -> Result<Self, FtpError> {
        let address = config.address();
        tracing::debug!(address = %address, tls = config.tls, user = %config.username, "ftp connect");

        tokio::time::timeout(config.timeout, Self::handshake(config, &address))
            .await
            .map_err(|_| FtpError::ConnectTimeout {
                address: address.clone(),
            })?
    }

    async fn handshake(config: &FtpConfig, address: &str) -> Result<Self, FtpError> {
        let tcp = TcpStream::connect(address).await?;
        let peer = tcp.peer_addr()?.ip();
        let mut conn = Self {
            control: BufReader::new(FtpStream::Plain(tcp)),
            tls: None,
            peer,
        };
        conn.expect_reply("greeting", &[220]).await?;

        if config.tls {
            let tls = Tls::new(&config.host)?;
            conn.expect("AUTH TLS", &[234]).await?;
            conn = conn.upgrade(tls).await?;
            conn.expect("PBSZ 0", &[200]).await?;
            conn.expect("PROT P", &[200]).await?;
        }

        let user = conn.command(&format!("USER {}", config.username)).await?;
        match user.code {
            230 => {}
            331 | 332 => {
                conn.expect(&format!("PASS {}", config.password), &[230, 202])
                    .await?;
            }
            code => {
                return Err(FtpError::Reply {
                    command: "USER".to_string(),
                    code,
                    message: user.message,
                })
            }
        }

        conn.expect("TYPE I", &[200]).await?;
        Ok(conn)
    }

    async fn upgrade(self, tls: Tls) -> Result<Self, FtpError> {
        let control = match self.control.into_inner() {
            FtpStream::Plain(tcp) => tls.wrap(tcp).await?,
            already => already,
        };
        Ok(Self {
            control: BufReader::new(control),
            tls: Some(tls),
            peer: self.peer,
        })
    }

    /// Send one command and read its reply, whatever the code.
    pub async fn command(&mut self, command: &str) -> Result<Reply, FtpError> {
        tracing::trace!(command = shown(command), "ftp command");
        let stream = self.control.get_mut();
        stream.write_all(command.as_bytes()).await?;
        stream.write_all(b"\r\n").await?;
        stream.flush().await?;
        read_reply(&mut self.control).await
    }

    /// Send one command and require one of `codes`.
    pub async fn expect(&mut self, command: &str, codes: &[u16]) -> Result<Reply, FtpError> {
        let reply = self.command(command).await?;
        check(command, reply, codes)
    }

    async fn expect_reply(&mut self, what: &str, codes: &[u16]) -> Result<Reply, FtpError> {
        let reply = read_reply(&mut self.control).await?;
        check(what, reply, codes)
    }

    /// Open a passive data connection, then issue `command` on it.
    async fn start_transfer(&mut self, command: &str) -> Result<FtpStream, FtpError> {
        let reply = self.expect("PASV", &[227]).await?;
        let (_, port) = parse_pasv(&reply.message)?;
        let tcp = TcpStream::connect((self.peer, port)).await?;

        self.expect(command, &[125, 150]).await?;
        // The server starts TLS on the data channel only after the
        // preliminary reply.
        match &self.tls {
            Some(tls) => tls.wrap(tcp).await,
            None => Ok(FtpStream::Plain(tcp)),
        }
    }

    async fn finish_transfer(&mut self, command: &str) -> Result<(), FtpError> {
        self.expect_reply(command, &[226, 250]).await?;
        Ok(())
    }

    pub async fn retrieve(&mut self, path: &str) -> Result<Vec<u8>, FtpError> {
        let command = format!("RETR {}", path);
        let mut data = self.start_transfer(&command).await?;
        let mut buf = Vec::new();
        data.read_to_end(&mut buf).await?;
        drop(data);
        self.finish_transfer(&command).await?;
        Ok(buf)
    }

    pub async fn store(&mut self, path: &str, contents: &[u8]) -> Result<(), FtpError> {
        let command = format!("STOR {}", path);
        let mut data = self.start_transfer(&command).await?;
        data.write_all(contents).await?;
        data.shutdown().await?;
        drop(data);
        self.finish_transfer(&command).await
    }

    pub async fn list(&mut self, path: &str) -> Result<Vec<DirEntry>, FtpError> {
        let command = format!("MLSD {}", path);
        let mut data = self.start_transfer(&command).await?;
        let mut listing = String::new();
        data.read_to_string(&mut listing).await?;
        drop(data);
        self.finish_transfer(&command).await?;
        Ok(listing.lines().filter_map(parse_mlsd_line).collect())
    }

    /// Size of a file, `None` when the server refuses (missing or a
    /// directory).
    pub async fn size(&mut self, path: &str) -> Result<Option<u64>, FtpError> {
        let reply = self.command(&format!("SIZE {}", path)).await?;
        match reply.code {
            213 => reply
                .message
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| FtpError::protocol(format!("bad SIZE reply {:?}", reply.message))),
            550 => Ok(None),
            code => Err(FtpError::Reply {
                command: format!("SIZE {}", path),
                code,
                message: reply.message,
            }),
        }
    }

    pub async fn modified(&mut self, path: &str) -> Result<Option<DateTime<Utc>>, FtpError> {
        let reply = self.command(&format!("MDTM {}", path)).await?;
        Ok(match reply.code {
            213 => parse_timestamp(reply.message.trim()),
            _ => None,
        })
    }

    pub async fn is_dir(&mut self, path: &str) -> Result<bool, FtpError> {
        let reply = self.command(&format!("CWD {}", path)).await?;
        match reply.code {
            200..=299 => Ok(true),
            550 => Ok(false),
            code => Err(FtpError::Reply {
                command: format!("CWD {}", path),
                code,
                message: reply.message,
            }),
        }
    }

    pub async fn make_dir(&mut self, path: &str) -> Result<(), FtpError> {
        self.expect(&format!("MKD {}", path), &[257]).await?;
        Ok(())
    }

    pub async fn delete_file(&mut self, path: &str) -> Result<(), FtpError> {
        self.expect(&format!("DELE {}", path), &[250]).await?;
        Ok(())
    }

    pub async fn remove_dir(&mut self, path: &str) -> Result<(), FtpError> {
        self.expect(&format!("RMD {}", path), &[250]).await?;
        Ok(())
    }

    pub async fn rename(&mut self, from: &str, to: &str) -> Result<(), FtpError> {
        self.expect(&format!("RNFR {}", from), &[350]).await?;
        self.expect(&format!("RNTO {}", to), &[250]).await?;
        Ok(())
    }
}

fn check(command: &str, reply: Reply, codes: &[u16]) -> Result<Reply, FtpError> {
    if codes.contains(&reply.code) {
        Ok(reply)
    } else {
        Err(FtpError::Reply {
            command: shown(command).to_string(),
            code: reply.code,
            message: reply.message,
        })
    }
}

/// Command text safe for logs and errors.
fn shown(command: &str) -> &str {
    if command.starts_with("PASS ") {
        "PASS ***"
    } else {
        command
    }
}
