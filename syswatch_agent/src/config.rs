//! Agent configuration from flags and `SYSWATCH_*` environment variables.
//! Flags win over the environment, which wins over defaults.

use reqwest::Url;
use std::path::PathBuf;
use std::time::Duration;

use crate::identity::default_identity_path;
use crate::ping::{DEFAULT_PING_HOST, DEFAULT_PING_TIMEOUT};
use crate::transport::DEFAULT_TIMEOUT;

pub const DEFAULT_SERVER: &str = "http://127.0.0.1:8000/api/agent/metrics";
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub server: Url,
    pub interval: Duration,
    pub identity_path: PathBuf,
    pub ping_host: String,
    pub ping_timeout: Duration,
    pub request_timeout: Duration,
    /// Run a single iteration and exit.
    pub once: bool,
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
        "Usage: {prog} [--server URL|-s URL] [--interval SECS|-i SECS] [--identity PATH] \
         [--ping-host HOST] [--timeout SECS] [--once] [http://HOST:PORT/api/agent/metrics]"
    )
}

pub fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<AgentConfig, ArgsError> {
    parse_args_with_env(args, |k| std::env::var(k).ok())
}

pub fn parse_args_with_env<I, F>(args: I, env: F) -> Result<AgentConfig, ArgsError>
where
    I: IntoIterator<Item = String>,
    F: Fn(&str) -> Option<String>,
{
    let mut it = args.into_iter();
    let prog = it.next().unwrap_or_else(|| "syswatch_agent".into());
    let invalid = |msg: String| ArgsError::Invalid(msg, usage(&prog));

    let mut server = env("SYSWATCH_SERVER");
    let mut interval = env("SYSWATCH_INTERVAL");
    let mut identity = env("SYSWATCH_IDENTITY");
    let mut ping_host = env("SYSWATCH_PING_HOST");
    let mut timeout = env("SYSWATCH_TIMEOUT");
    let ping_timeout_ms = env("SYSWATCH_PING_TIMEOUT_MS");
    let mut once = false;
    let mut positional: Option<String> = None;

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
            "--server" | "-s" => server = Some(value("--server")?),
            "--interval" | "-i" => interval = Some(value("--interval")?),
            "--identity" => identity = Some(value("--identity")?),
            "--ping-host" => ping_host = Some(value("--ping-host")?),
            "--timeout" => timeout = Some(value("--timeout")?),
            "--once" => once = true,
            _ if !arg.starts_with('-') && positional.is_none() => positional = Some(arg),
            _ => return Err(invalid(format!("Unexpected argument: {arg}"))),
        }
    }

    let server = positional
        .or(server)
        .unwrap_or_else(|| DEFAULT_SERVER.to_string());
    let server = Url::parse(&server)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .ok_or_else(|| invalid(format!("invalid server URL: {server}")))?;

    let secs = |raw: Option<String>, name: &str, default: Duration| match raw {
        Some(s) => s
            .parse::<u64>()
            .ok()
            .filter(|n| *n >= 1)
            .map(Duration::from_secs)
            .ok_or_else(|| invalid(format!("{name} must be a whole number of seconds >= 1: {s}"))),
        None => Ok(default),
    };
    let interval = secs(interval, "--interval", DEFAULT_INTERVAL)?;
    let request_timeout = secs(timeout, "--timeout", DEFAULT_TIMEOUT)?;
    let ping_timeout = ping_timeout_ms
        .and_then(|ms| ms.parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_PING_TIMEOUT);

    Ok(AgentConfig {
        server,
        interval,
        identity_path: identity
            .map(PathBuf::from)
            .unwrap_or_else(default_identity_path),
        ping_host: ping_host.unwrap_or_else(|| DEFAULT_PING_HOST.to_string()),
        ping_timeout,
        request_timeout,
        once,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn parse(args: &[&str], env: &[(&str, &str)]) -> Result<AgentConfig, ArgsError> {
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut argv = vec!["syswatch_agent".to_string()];
        argv.extend(args.iter().map(|s| s.to_string()));
        parse_args_with_env(argv, |k| env.get(k).cloned())
    }

    #[test]
    fn defaults() {
        let c = parse(&[], &[]).unwrap();
        assert_eq!(c.server.as_str(), DEFAULT_SERVER);
        assert_eq!(c.interval, DEFAULT_INTERVAL);
        assert_eq!(c.request_timeout, DEFAULT_TIMEOUT);
        assert_eq!(c.ping_host, DEFAULT_PING_HOST);
        assert_eq!(c.ping_timeout, DEFAULT_PING_TIMEOUT);
        assert!(c.identity_path.ends_with("syswatch/syswatch_id.json"));
        assert!(!c.once);
    }

    #[test]
    fn server_positional_long_and_assign() {
        let u = "http://collector:8000/api/agent/metrics";
        assert_eq!(parse(&[u], &[]).unwrap().server.as_str(), u);
        assert_eq!(parse(&["--server", u], &[]).unwrap().server.as_str(), u);
        assert_eq!(parse(&["-s", u], &[]).unwrap().server.as_str(), u);
        assert_eq!(
            parse(&[&format!("--server={u}")], &[]).unwrap().server.as_str(),
            u
        );
        assert!(parse(&["ws://collector/ws"], &[]).is_err());
        assert!(parse(&[u, u], &[]).is_err());
    }

    #[test]
    fn env_fallbacks_and_overrides() {
        let env = [
            ("SYSWATCH_INTERVAL", "30"),
            ("SYSWATCH_IDENTITY", "/tmp/id.json"),
            ("SYSWATCH_PING_TIMEOUT_MS", "250"),
        ];
        let c = parse(&[], &env).unwrap();
        assert_eq!(c.interval, Duration::from_secs(30));
        assert_eq!(c.identity_path, PathBuf::from("/tmp/id.json"));
        assert_eq!(c.ping_timeout, Duration::from_millis(250));
        let c = parse(&["-i", "2", "--identity", "here.json", "--once"], &env).unwrap();
        assert_eq!(c.interval, Duration::from_secs(2));
        assert_eq!(c.identity_path, PathBuf::from("here.json"));
        assert!(c.once);
    }

    #[test]
    fn rejects_zero_or_garbage_durations() {
        assert!(parse(&["--interval", "0"], &[]).is_err());
        assert!(parse(&["--timeout", "soon"], &[]).is_err());
        assert!(parse(&["--interval"], &[]).is_err());
    }

    #[test]
    fn help() {
        assert!(matches!(parse(&["-h"], &[]), Err(ArgsError::Help(_))));
    }
}
