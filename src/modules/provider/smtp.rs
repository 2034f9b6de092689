// Copyright © 2025 mailblast.dev
// Licensed under MailBlast License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::borrow::Cow;
use std::time::Duration;

use mail_send::mail_builder::headers::address::Address;
use mail_send::mail_builder::MessageBuilder;
use mail_send::smtp::message::IntoMessage;
use mail_send::smtp::tls::build_tls_connector;
use mail_send::{Credentials, SmtpClient, SmtpClientBuilder};
use poem_openapi::Object;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::TlsConnector;

use crate::modules::account::entity::{Encryption, SendingAccount, SmtpConfig};
use crate::modules::error::code::ErrorCode;
use crate::modules::error::MailBlastResult;
use crate::modules::job::entity::PreparedJob;
use crate::{base64_encode, raise_error, utc_now};

pub enum MailBlastSmtpClient {
    Plain(SmtpClient<TcpStream>),
    Tls(SmtpClient<TlsStream<TcpStream>>),
}

impl MailBlastSmtpClient {
    async fn send_email<'x>(&mut self, message: impl IntoMessage<'x>) -> MailBlastResult<()> {
        match self {
            MailBlastSmtpClient::Plain(smtp_client) => smtp_client
                .send(message)
                .await
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::SmtpCommandFailed)),
            MailBlastSmtpClient::Tls(smtp_client) => smtp_client
                .send(message)
                .await
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::SmtpCommandFailed)),
        }
    }
}

async fn connect(config: &SmtpConfig) -> MailBlastResult<MailBlastSmtpClient> {
    let credentials = Credentials::new(config.username.clone(), config.password.clone());
    let builder = SmtpClientBuilder::new(config.host.clone(), config.port)
        .credentials(credentials)
        .timeout(Duration::from_secs(30));

    let client = match config.encryption {
        Encryption::Ssl => {
            let client = builder
                .implicit_tls(true)
                .connect()
                .await
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::SmtpConnectionFailed))?;
            MailBlastSmtpClient::Tls(client)
        }
        Encryption::StartTls => {
            let client = builder
                .implicit_tls(false)
                .connect()
                .await
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::SmtpConnectionFailed))?;
            MailBlastSmtpClient::Tls(client)
        }
        Encryption::None => {
            let client = builder
                .connect_plain()
                .await
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::SmtpConnectionFailed))?;
            MailBlastSmtpClient::Plain(client)
        }
    };

    Ok(client)
}

pub async fn send_email(
    account: &SendingAccount,
    config: &SmtpConfig,
    job: &PreparedJob,
) -> MailBlastResult<()> {
    let from = Address::new_address(
        job.from_name.as_deref().map(Cow::Borrowed),
        Cow::Borrowed(account.email.as_str()),
    );
    let to = Address::new_address(None::<&str>, Cow::Borrowed(job.recipient.as_str()));
    let mut builder = MessageBuilder::new()
        .from(from)
        .to(to)
        .subject(job.subject.clone())
        .message_id(generate_message_id());
    if let Some(text) = &job.text {
        builder = builder.text_body(text.clone());
    }
    if let Some(html) = &job.html {
        builder = builder.html_body(html.clone());
    }
    let message = builder.into_message().map_err(|e| {
        raise_error!(
            format!("Failed to build message: {}", e),
            ErrorCode::InternalError
        )
    })?;

    let mut client = connect(config).await?;
    client.send_email(message).await
}

pub fn generate_message_id() -> String {
    let random_bytes: [u8; 16] = rand::rng().random();
    let random_id = hex::encode(random_bytes);
    let timestamp_millis = utc_now!();
    format!("<{}.{}@mailblast>", timestamp_millis, random_id)
}

/// Result of an SMTP connection probe: the same success/failure shape as a
/// send, plus the command/response transcript for operator troubleshooting.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize, Object)]
pub struct SmtpProbeReport {
    pub success: bool,
    pub error: Option<String>,
    /// Dialog lines, `C:` for client commands and `S:` for server replies.
    /// The password is never included.
    pub transcript: Vec<String>,
}

/// Performs the full greeting/EHLO/STARTTLS/AUTH handshake without sending
/// any mail. Every request and reply is recorded, so a failing account can be
/// diagnosed from the report alone.
pub async fn probe(config: &SmtpConfig) -> SmtpProbeReport {
    let mut transcript = Vec::new();
    let outcome = tokio::time::timeout(
        Duration::from_secs(30),
        probe_dialog(config, &mut transcript),
    )
    .await;

    match outcome {
        Ok(Ok(())) => SmtpProbeReport {
            success: true,
            error: None,
            transcript,
        },
        Ok(Err(error)) => SmtpProbeReport {
            success: false,
            error: Some(error.to_string()),
            transcript,
        },
        Err(_) => SmtpProbeReport {
            success: false,
            error: Some("SMTP probe timed out after 30s".into()),
            transcript,
        },
    }
}

enum ProbeStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl ProbeStream {
    async fn write_line(&mut self, line: &str) -> MailBlastResult<()> {
        let data = format!("{line}\r\n");
        let result = match self {
            ProbeStream::Plain(stream) => stream.write_all(data.as_bytes()).await,
            ProbeStream::Tls(stream) => stream.write_all(data.as_bytes()).await,
        };
        result.map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::SmtpCommandFailed))
    }

    /// Reads one SMTP reply, which may span several `ddd-` continuation
    /// lines, up to and including the final `ddd ` line.
    async fn read_reply(&mut self) -> MailBlastResult<String> {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let read = match self {
                ProbeStream::Plain(stream) => stream.read(&mut chunk).await,
                ProbeStream::Tls(stream) => stream.read(&mut chunk).await,
            }
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::SmtpCommandFailed))?;
            if read == 0 {
                return Err(raise_error!(
                    "SMTP server closed the connection mid-reply.".into(),
                    ErrorCode::SmtpConnectionFailed
                ));
            }
            buffer.extend_from_slice(&chunk[..read]);
            if reply_is_complete(&buffer) {
                break;
            }
        }
        Ok(String::from_utf8_lossy(&buffer).trim_end().to_string())
    }

    async fn into_tls(self, connector: &TlsConnector, host: &str) -> MailBlastResult<ProbeStream> {
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InvalidParameter))?;
        match self {
            ProbeStream::Plain(stream) => {
                let tls = connector.connect(server_name, stream).await.map_err(|e| {
                    raise_error!(format!("{:#?}", e), ErrorCode::SmtpConnectionFailed)
                })?;
                Ok(ProbeStream::Tls(Box::new(tls)))
            }
            ProbeStream::Tls(_) => Ok(self),
        }
    }
}

fn reply_is_complete(buffer: &[u8]) -> bool {
    if !buffer.ends_with(b"\r\n") {
        return false;
    }
    let text = String::from_utf8_lossy(buffer);
    match text.trim_end().lines().last() {
        // Final reply line is "ddd text" (or a bare "ddd"); continuation
        // lines are "ddd-text".
        Some(line) => {
            (line.len() == 3 && line.bytes().all(|b| b.is_ascii_digit()))
                || (line.len() >= 4 && line.as_bytes()[3] == b' ')
        }
        None => false,
    }
}

fn reply_code(reply: &str) -> MailBlastResult<u16> {
    reply
        .lines()
        .last()
        .and_then(|line| line.get(..3))
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| {
            raise_error!(
                format!("Unparseable SMTP reply: {}", reply),
                ErrorCode::SmtpCommandFailed
            )
        })
}

fn expect_class(reply: &str, classes: &[u16]) -> MailBlastResult<()> {
    let code = reply_code(reply)?;
    if classes.contains(&(code / 100)) {
        Ok(())
    } else {
        Err(raise_error!(
            format!("SMTP server rejected the command: {}", reply),
            ErrorCode::SmtpCommandFailed
        ))
    }
}

async fn probe_dialog(config: &SmtpConfig, transcript: &mut Vec<String>) -> MailBlastResult<()> {
    let address = format!("{}:{}", config.host, config.port);
    transcript.push(format!("C: CONNECT {}", address));
    let tcp = TcpStream::connect(&address)
        .await
        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::SmtpConnectionFailed))?;

    let connector = build_tls_connector(false);
    let mut stream = match config.encryption {
        Encryption::Ssl => {
            transcript.push("C: <TLS handshake>".into());
            ProbeStream::Plain(tcp).into_tls(&connector, &config.host).await?
        }
        _ => ProbeStream::Plain(tcp),
    };

    let greeting = stream.read_reply().await?;
    transcript.push(format!("S: {}", greeting));
    expect_class(&greeting, &[2])?;

    let local_host = gethostname::gethostname()
        .to_str()
        .unwrap_or("[127.0.0.1]")
        .to_string();
    let ehlo = format!("EHLO {}", local_host);
    transcript.push(format!("C: {}", ehlo));
    stream.write_line(&ehlo).await?;
    let mut capabilities = stream.read_reply().await?;
    transcript.push(format!("S: {}", capabilities));
    expect_class(&capabilities, &[2])?;

    if config.encryption == Encryption::StartTls {
        if !capabilities.to_ascii_uppercase().contains("STARTTLS") {
            return Err(raise_error!(
                "SMTP server does not advertise STARTTLS.".into(),
                ErrorCode::SmtpConnectionFailed
            ));
        }
        transcript.push("C: STARTTLS".into());
        stream.write_line("STARTTLS").await?;
        let reply = stream.read_reply().await?;
        transcript.push(format!("S: {}", reply));
        expect_class(&reply, &[2])?;

        transcript.push("C: <TLS handshake>".into());
        stream = stream.into_tls(&connector, &config.host).await?;

        transcript.push(format!("C: {}", ehlo));
        stream.write_line(&ehlo).await?;
        capabilities = stream.read_reply().await?;
        transcript.push(format!("S: {}", capabilities));
        expect_class(&capabilities, &[2])?;
    }

    if !config.username.is_empty() {
        transcript.push("C: AUTH LOGIN".into());
        stream.write_line("AUTH LOGIN").await?;
        let reply = stream.read_reply().await?;
        transcript.push(format!("S: {}", reply));
        expect_class(&reply, &[3])?;

        let username = base64_encode!(config.username.as_bytes());
        transcript.push(format!("C: {}", username));
        stream.write_line(&username).await?;
        let reply = stream.read_reply().await?;
        transcript.push(format!("S: {}", reply));
        expect_class(&reply, &[3])?;

        transcript.push("C: ********".into());
        stream
            .write_line(&base64_encode!(config.password.as_bytes()))
            .await?;
        let reply = stream.read_reply().await?;
        transcript.push(format!("S: {}", reply));
        expect_class(&reply, &[2])?;
    }

    transcript.push("C: QUIT".into());
    stream.write_line("QUIT").await?;
    if let Ok(reply) = stream.read_reply().await {
        transcript.push(format!("S: {}", reply));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_ids_are_unique_and_addressed() {
        let a = generate_message_id();
        let b = generate_message_id();
        assert_ne!(a, b);
        assert!(a.starts_with('<') && a.ends_with("@mailblast>"));
    }

    #[test]
    fn multiline_replies_complete_only_on_the_final_line() {
        assert!(!reply_is_complete(b"250-PIPELINING\r\n"));
        assert!(!reply_is_complete(b"250-PIPELINING\r\n250-STARTTLS\r\n"));
        assert!(reply_is_complete(b"250-PIPELINING\r\n250 OK\r\n"));
        assert!(reply_is_complete(b"220 smtp.example.com ready\r\n"));
        assert!(!reply_is_complete(b"220 smtp.example.com ready"));
    }

    #[test]
    fn reply_codes_parse_from_the_final_line() {
        assert_eq!(reply_code("250-STARTTLS\r\n250 OK").unwrap(), 250);
        assert_eq!(reply_code("535 5.7.8 Authentication failed").unwrap(), 535);
        assert!(reply_code("garbage").is_err());
        assert!(expect_class("235 2.7.0 Accepted", &[2]).is_ok());
        assert!(expect_class("535 5.7.8 Denied", &[2, 3]).is_err());
    }
}
