//! Command-line and environment configuration for the collector.
//! Flags win over `SYSWATCH_*` variables, which win over defaults.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use url::Url;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_DB: &str = "syswatch.db";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Serve,
    /// Create the schema, then exit.
    Migrate,
}

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub command: Command,
    pub bind: IpAddr,
    pub port: u16,
    pub db_path: PathBuf,
    pub public_url: Url,
}

impl CollectorConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArgsError {
    #[error("{0}")]
    Help(String),
    #[error("{0}\n{1}")]
    Invalid(String, String),
}

pub fn usage(prog: &str) -> String {
    format!(
        "Usage: {prog} [serve|migrate] [--port PORT|-p PORT] [--bind ADDR] [--db PATH] [--public-url URL]"
    )
}

pub fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<CollectorConfig, ArgsError> {
    parse_args_with_env(args, |k| std::env::var(k).ok())
}

pub fn parse_args_with_env<I, F>(args: I, env: F) -> Result<CollectorConfig, ArgsError>
where
    I: IntoIterator<Item = String>,
    F: Fn(&str) -> Option<String>,
{
    let mut it = args.into_iter();
    let prog = it.next().unwrap_or_else(|| "syswatch_collector".into());
    let invalid = |msg: String| ArgsError::Invalid(msg, usage(&prog));

    let mut command: Option<Command> = None;
    let mut port = env("SYSWATCH_PORT");
    let mut bind = env("SYSWATCH_BIND");
    let mut db = env("SYSWATCH_DB");
    let mut public_url = env("SYSWATCH_PUBLIC_URL");

    while let Some(arg) = it.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((f, v)) if f.starts_with("--") => (f.to_string(), Some(v.to_string())),
            _ => (arg.clone(), None),
        };
        let mut value = |name: &str| -> Result<String, ArgsError> {
            inline
                .clone()
                .or_else(|| it.next())
                .ok_or_else(|| invalid(format!("{name} needs a value")))
        };
        match flag.as_str() {
            "-h" | "--help" => return Err(ArgsError::Help(usage(&prog))),
            "--port" | "-p" => port = Some(value("--port")?),
            "--bind" => bind = Some(value("--bind")?),
            "--db" => db = Some(value("--db")?),
            "--public-url" => public_url = Some(value("--public-url")?),
            "serve" if command.is_none() => command = Some(Command::Serve),
            "migrate" if command.is_none() => command = Some(Command::Migrate),
            _ => return Err(invalid(format!("Unexpected argument: {arg}"))),
        }
    }

    let port = match port {
        Some(p) => p
            .parse::<u16>()
            .map_err(|_| invalid(format!("invalid port: {p}")))?,
        None => DEFAULT_PORT,
    };
    let bind = match bind {
        Some(b) => b
            .parse::<IpAddr>()
            .map_err(|_| invalid(format!("invalid bind address: {b}")))?,
        None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
    };
    let public_url = public_url.unwrap_or_else(|| format!("http://127.0.0.1:{port}"));
    let public_url = Url::parse(&public_url)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .ok_or_else(|| invalid(format!("invalid public URL: {public_url}")))?;

    Ok(CollectorConfig {
        command: command.unwrap_or(Command::Serve),
        bind,
        port,
        db_path: PathBuf::from(db.unwrap_or_else(|| DEFAULT_DB.into())),
        public_url,
    })
}
