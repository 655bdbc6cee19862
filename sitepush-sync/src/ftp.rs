//! Minimal FTP client implementing [`RemoteStore`].
//!
//! Covers the handful of RFC 959 commands a push needs: `USER`/`PASS`,
//! `PWD`, `CWD`, `MKD`, `TYPE I`, `PASV` + `STOR`, `DELE` and `QUIT`.
//! Every socket carries the site's timeout, so a stalled transfer surfaces
//! as a failed `put` instead of hanging the run.
//!
//! A timed-out command leaves its reply in flight. The store then counts as
//! desynced: before the next command it waits once for the stale reply and,
//! failing that, reconnects and restores login, `TYPE I` and the working
//! directory. Later commands never read an earlier command's reply.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::net::{IpAddr, Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use crate::store::{ConnectOptions, Connector, RemoteStore};

/// One server reply: code plus the text of its final line.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Reply {
    code: u16,
    text: String,
}

impl Reply {
    fn is(&self, codes: &[u16]) -> bool {
        codes.contains(&self.code)
    }
}

fn protocol_err(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

/// Open TCP connection to `host:port`, trying each resolved address.
fn dial(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_read_timeout(Some(timeout))?;
                stream.set_write_timeout(Some(timeout))?;
                return Ok(stream);
            }
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| protocol_err(format!("{host} did not resolve"))))
}

// ---------------------------------------------------------------------------
// FtpStore
// ---------------------------------------------------------------------------

/// An FTP control connection.
pub struct FtpStore {
    host: String,
    port: u16,
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    /// Control peer; data connections go here, whatever PASV advertises.
    peer: IpAddr,
    timeout: Duration,
    /// A reply may still be in flight on the control connection.
    desynced: bool,
    /// Session state replayed after a reconnect.
    login: Option<(String, String)>,
    binary: bool,
    cwd: Vec<String>,
}

impl std::fmt::Debug for FtpStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FtpStore").field("host", &self.host).finish()
    }
}

impl FtpStore {
    /// Connect and consume the `220` greeting.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> io::Result<Self> {
        let stream = dial(host, port, timeout)?;
        let peer = stream.peer_addr()?.ip();
        let writer = stream.try_clone()?;
        let mut store = FtpStore {
            host: host.to_string(),
            port,
            reader: BufReader::new(stream),
            writer,
            peer,
            timeout,
            desynced: false,
            login: None,
            binary: false,
            cwd: Vec::new(),
        };
        store.greet()?;
        Ok(store)
    }

    fn greet(&mut self) -> io::Result<()> {
        let greeting = self.read_reply()?;
        if !greeting.is(&[220]) {
            return Err(protocol_err(format!(
                "unexpected greeting {} {}",
                greeting.code, greeting.text
            )));
        }
        Ok(())
    }

    /// Bring the control connection back in step before a new command.
    fn resync(&mut self) -> io::Result<()> {
        if !self.desynced {
            return Ok(());
        }
        if let Ok(late) = self.read_reply() {
            tracing::debug!("ftp< {} {} (late reply)", late.code, late.text);
            self.desynced = false;
            return Ok(());
        }
        tracing::warn!("ftp {}: control connection out of step, reconnecting", self.host);
        let reconnected = self.reconnect();
        // A half-restored session is no better; try again on the next command.
        self.desynced = reconnected.is_err();
        reconnected
    }

    fn reconnect(&mut self) -> io::Result<()> {
        let stream = dial(&self.host, self.port, self.timeout)?;
        let _ = self.send("QUIT");
        self.peer = stream.peer_addr()?.ip();
        self.writer = stream.try_clone()?;
        self.reader = BufReader::new(stream);
        self.desynced = false;
        self.greet()?;

        if let Some((user, password)) = self.login.clone() {
            if !self.log_in(&user, &password)? {
                return Err(protocol_err("login rejected after reconnect"));
            }
        }
        if self.binary && !self.command("TYPE I")?.is(&[200]) {
            return Err(protocol_err("TYPE I rejected after reconnect"));
        }
        for dir in self.cwd.clone() {
            if !self.command(&format!("CWD {dir}"))?.is(&[250]) {
                return Err(protocol_err(format!("cannot return to {dir} after reconnect")));
            }
        }
        Ok(())
    }

    fn log_in(&mut self, user: &str, password: &str) -> io::Result<bool> {
        let reply = self.command(&format!("USER {user}"))?;
        if reply.is(&[230]) {
            return Ok(true);
        }
        if !reply.is(&[331]) {
            return Ok(false);
        }
        Ok(self.command(&format!("PASS {password}"))?.is(&[230, 202]))
    }

    fn read_reply(&mut self) -> io::Result<Reply> {
        let first = self.read_line()?;
        let code = parse_code(&first)?;
        if first.as_bytes().get(3) != Some(&b'-') {
            return Ok(Reply {
                code,
                text: first.get(4..).unwrap_or("").to_string(),
            });
        }
        // Multi-line: runs until a line starting with the same code and a space.
        let terminator = format!("{code} ");
        loop {
            let line = self.read_line()?;
            if line.starts_with(&terminator) {
                return Ok(Reply {
                    code,
                    text: line[4..].to_string(),
                });
            }
        }
    }

    fn read_line(&mut self) -> io::Result<String> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "control connection closed",
            ));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn send(&mut self, command: &str) -> io::Result<()> {
        self.writer.write_all(command.as_bytes())?;
        self.writer.write_all(b"\r\n")?;
        self.writer.flush()
    }

    fn command(&mut self, command: &str) -> io::Result<Reply> {
        self.resync()?;
        if command.starts_with("PASS ") {
            tracing::debug!("ftp> PASS ****");
        } else {
            tracing::debug!("ftp> {command}");
        }
        let reply = self.send(command).and_then(|()| self.read_reply());
        if reply.is_err() {
            self.desynced = true;
        }
        let reply = reply?;
        tracing::debug!("ftp< {} {}", reply.code, reply.text);
        Ok(reply)
    }

    /// `command` and check the reply code, mapping I/O failure to `false`.
    fn expect(&mut self, command: &str, codes: &[u16]) -> bool {
        match self.command(command) {
            Ok(reply) => reply.is(codes),
            Err(err) => {
                tracing::warn!("ftp {}: {err}", self.host);
                false
            }
        }
    }

    fn store_file(&mut self, local: &Path, remote: &str) -> io::Result<bool> {
        let mut file = File::open(local)?;

        let pasv = self.command("PASV")?;
        if !pasv.is(&[227]) {
            return Ok(false);
        }
        let advertised = parse_pasv(&pasv.text)?;
        // Servers behind NAT advertise private addresses; keep only the port.
        let addr = SocketAddr::new(self.peer, advertised.port());
        if advertised.ip() != self.peer {
            tracing::debug!("ftp {}: PASV advertised {advertised}, using {addr}", self.host);
        }
        let mut data = TcpStream::connect_timeout(&addr, self.timeout)?;
        data.set_write_timeout(Some(self.timeout))?;

        let started = self.command(&format!("STOR {remote}"))?;
        if !started.is(&[125, 150]) {
            return Ok(false);
        }
        // From here the server owes a completion reply.
        let finished = send_data(&mut file, data).and_then(|()| self.read_reply());
        match finished {
            Ok(reply) => {
                tracing::debug!("ftp< {} {}", reply.code, reply.text);
                Ok(reply.is(&[226, 250]))
            }
            Err(err) => {
                self.desynced = true;
                Err(err)
            }
        }
    }
}

fn send_data(file: &mut File, mut data: TcpStream) -> io::Result<()> {
    io::copy(file, &mut data)?;
    data.flush()?;
    data.shutdown(Shutdown::Write)
}

impl RemoteStore for FtpStore {
    fn authenticate(&mut self, user: &str, password: &str) -> bool {
        match self.log_in(user, password) {
            Ok(true) => {
                self.login = Some((user.to_string(), password.to_string()));
                true
            }
            Ok(false) => false,
            Err(err) => {
                tracing::warn!("ftp {}: {err}", self.host);
                false
            }
        }
    }

    fn change_directory(&mut self, path: &str) -> bool {
        if !self.expect(&format!("CWD {path}"), &[250]) {
            return false;
        }
        if path.starts_with('/') {
            self.cwd.clear();
        }
        self.cwd.push(path.to_string());
        true
    }

    fn current_directory(&mut self) -> Option<String> {
        match self.command("PWD") {
            Ok(reply) if reply.is(&[257]) => parse_quoted_path(&reply.text),
            Ok(_) => None,
            Err(err) => {
                tracing::warn!("ftp {}: {err}", self.host);
                None
            }
        }
    }

    fn make_directory(&mut self, path: &str) -> bool {
        self.expect(&format!("MKD {path}"), &[257])
    }

    fn set_binary_mode(&mut self) -> bool {
        self.binary = self.expect("TYPE I", &[200]);
        self.binary
    }

    fn put(&mut self, local: &Path, remote: &str) -> bool {
        match self.store_file(local, remote) {
            Ok(stored) => stored,
            Err(err) => {
                tracing::warn!("ftp {}: STOR {remote}: {err}", self.host);
                false
            }
        }
    }

    fn delete(&mut self, remote: &str) -> bool {
        self.expect(&format!("DELE {remote}"), &[250])
    }
}

impl Drop for FtpStore {
    fn drop(&mut self) {
        let _ = self.send("QUIT");
    }
}

/// Opens [`FtpStore`] sessions; the port comes from [`ConnectOptions`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FtpConnector;

impl Connector for FtpConnector {
    fn connect(&self, host: &str, options: &ConnectOptions) -> Option<Box<dyn RemoteStore>> {
        let port = options
            .port
            .unwrap_or(sitepush_core::types::DEFAULT_FTP_PORT);
        match FtpStore::connect(host, port, options.timeout) {
            Ok(store) => Some(Box::new(store)),
            Err(err) => {
                tracing::warn!("ftp connect to {host}:{port} failed: {err}");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Reply parsing
// ---------------------------------------------------------------------------

fn parse_code(line: &str) -> io::Result<u16> {
    line.get(..3)
        .filter(|code| code.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|code| code.parse().ok())
        .ok_or_else(|| protocol_err(format!("malformed reply: {line:?}")))
}

/// `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)` → socket address.
fn parse_pasv(text: &str) -> io::Result<SocketAddr> {
    let malformed = || protocol_err(format!("malformed PASV reply: {text:?}"));
    let open = text.find('(').ok_or_else(malformed)?;
    let close = text[open..].find(')').ok_or_else(malformed)? + open;
    let numbers = text[open + 1..close]
        .split(',')
        .map(|n| n.trim().parse::<u8>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| malformed())?;
    let &[h1, h2, h3, h4, p1, p2] = numbers.as_slice() else {
        return Err(malformed());
    };
    let port = u16::from(p1) << 8 | u16::from(p2);
    Ok(SocketAddr::from(([h1, h2, h3, h4], port)))
}

/// `"/htdocs" is current directory` → `/htdocs`; doubled quotes unescape.
fn parse_quoted_path(text: &str) -> Option<String> {
    let rest = text.strip_prefix('"')?;
    let mut path = String::new();
    let mut chars = rest.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '"' {
            if chars.peek() == Some(&'"') {
                chars.next();
                path.push('"');
            } else {
                return Some(path);
            }
        } else {
            path.push(c);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pasv_reply_decodes_address() {
        let addr = parse_pasv("Entering Passive Mode (127,0,0,1,195,80).").unwrap();
        assert_eq!(addr, SocketAddr::from(([127, 0, 0, 1], 195 * 256 + 80)));
        assert!(parse_pasv("Entering Passive Mode").is_err());
        assert!(parse_pasv("(1,2,3)").is_err());
        assert!(parse_pasv("(1,2,3,4,5,300)").is_err());
    }

    #[test]
    fn pwd_path_is_unquoted() {
        assert_eq!(
            parse_quoted_path("\"/htdocs\" is the current directory").as_deref(),
            Some("/htdocs")
        );
        assert_eq!(
            parse_quoted_path("\"/say \"\"hi\"\"\" ok").as_deref(),
            Some("/say \"hi\"")
        );
        assert_eq!(parse_quoted_path("/no/quotes"), None);
    }

    #[test]
    fn reply_code_must_be_three_digits() {
        assert_eq!(parse_code("230 Logged in").unwrap(), 230);
        assert!(parse_code("OK").is_err());
        assert!(parse_code("2x0 nope").is_err());
    }
}
