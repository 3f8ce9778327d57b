use backoffice::config::{AppConfig, AuthConfig, PushConfig};
use backoffice::types::identity::Role;
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use time::Duration;

const DEFAULT_SESSION_TTL: &str = "7d";
const DEFAULT_PUSH_TIMEOUT: &str = "10s";

#[allow(clippy::large_enum_variant)]
pub(crate) enum RunOutcome {
    Serve {
        addr: SocketAddr,
        config: AppConfig,
    },
    Exit(i32),
}

pub(crate) fn run() -> RunOutcome {
    let cli = Cli::parse();
    match cli.command {
        Some(Command::Init(args)) => return RunOutcome::Exit(run_init(args)),
        Some(Command::SessionKey) => return RunOutcome::Exit(run_session_key()),
        Some(Command::AddAdmin(args)) => return RunOutcome::Exit(run_add_admin(args)),
        None => {}
    }

    match resolve_config(&cli) {
        Ok(config) => RunOutcome::Serve {
            addr: cli.bind,
            config,
        },
        Err(err) => {
            eprintln!("error: {err}");
            RunOutcome::Exit(2)
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "backoffice",
    version,
    about = "Agency back-office: admin sessions, leads, portfolio and push alerts"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    #[arg(long, env = "BACKOFFICE_DATA_DIR")]
    data_dir: Option<PathBuf>,
    #[arg(long, env = "BACKOFFICE_BIND", default_value = "127.0.0.1:3000")]
    bind: SocketAddr,
    #[arg(long, default_value = "Backoffice")]
    app_name: String,
    #[arg(long, env = "BACKOFFICE_SESSION_KEY")]
    session_key: Option<String>,
    #[arg(long, env = "BACKOFFICE_SESSION_TTL")]
    session_ttl: Option<String>,
    #[arg(long, env = "BACKOFFICE_COOKIE_SECURE")]
    cookie_secure: bool,
    #[arg(long, env = "BACKOFFICE_NO_SESSION_REVOCATION")]
    no_session_revocation: bool,
    #[arg(long, env = "BACKOFFICE_VAPID_PRIVATE_KEY")]
    vapid_private_key: Option<String>,
    #[arg(long, env = "BACKOFFICE_VAPID_PUBLIC_KEY")]
    vapid_public_key: Option<String>,
    #[arg(long, env = "BACKOFFICE_VAPID_SUBJECT")]
    vapid_subject: Option<String>,
    #[arg(long, env = "BACKOFFICE_PUSH_TIMEOUT")]
    push_timeout: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate VAPID credentials for push notifications.
    Init(InitArgs),
    /// Generate a session signing key.
    SessionKey,
    /// Provision an administrator account.
    AddAdmin(AddAdminArgs),
}

#[derive(Args, Debug)]
struct InitArgs {
    #[arg(long)]
    subject: Option<String>,
}

#[derive(Args, Debug)]
struct AddAdminArgs {
    #[arg(long, env = "BACKOFFICE_DATA_DIR")]
    data_dir: PathBuf,
    #[arg(long)]
    email: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    role: Role,
    #[arg(long, env = "BACKOFFICE_ADMIN_SECRET", hide_env_values = true)]
    secret: String,
}

fn run_init(args: InitArgs) -> i32 {
    let credentials = match backoffice::generate_vapid_credentials() {
        Ok(credentials) => credentials,
        Err(err) => {
            eprintln!("failed to generate VAPID credentials: {err}");
            return 1;
        }
    };
    let (subject, show_subject_note) = match args.subject {
        Some(subject) => (subject, false),
        None => ("mailto:you@example.com".to_string(), true),
    };

    println!("VAPID credentials generated.");
    println!();
    println!("BACKOFFICE_VAPID_PRIVATE_KEY=\"{}\"", credentials.private_key);
    println!("BACKOFFICE_VAPID_PUBLIC_KEY=\"{}\"", credentials.public_key);
    println!("BACKOFFICE_VAPID_SUBJECT=\"{subject}\"");
    if show_subject_note {
        println!();
        println!("Note: replace BACKOFFICE_VAPID_SUBJECT with a contact URI you control.");
    }
    0
}

fn run_session_key() -> i32 {
    let key = match backoffice::auth::generate_session_key() {
        Ok(key) => key,
        Err(err) => {
            eprintln!("failed to generate session key: {err}");
            return 1;
        }
    };
    println!("{key}");
    0
}

fn run_add_admin(args: AddAdminArgs) -> i32 {
    if let Err(err) = std::fs::create_dir_all(&args.data_dir) {
        eprintln!(
            "failed to create data directory {}: {err}",
            args.data_dir.display()
        );
        return 1;
    }
    let path = args
        .data_dir
        .join(backoffice::auth::credentials::ADMINS_FILE);
    match backoffice::auth::credentials::provision_admin(
        &path,
        &args.email,
        &args.name,
        args.role,
        &args.secret,
    ) {
        Ok(identity) => {
            println!(
                "Added {} <{}> ({:?}) with id {}",
                identity.name, identity.email, identity.role, identity.id
            );
            0
        }
        Err(err) => {
            eprintln!("failed to add administrator: {err}");
            1
        }
    }
}

fn resolve_config(cli: &Cli) -> Result<AppConfig, String> {
    let data_dir = cli
        .data_dir
        .clone()
        .ok_or("--data-dir is required unless using a subcommand")?;
    Ok(AppConfig {
        data_dir,
        app_name: cli.app_name.clone(),
        auth: resolve_auth_config(cli)?,
        push: resolve_push_config(cli)?,
    })
}

fn resolve_auth_config(cli: &Cli) -> Result<AuthConfig, String> {
    let key = cli
        .session_key
        .as_deref()
        .map(str::trim)
        .ok_or("--session-key is required; generate one with `backoffice session-key`")?;
    if key.is_empty() {
        return Err("session key cannot be empty".to_string());
    }

    let session_ttl = parse_duration(
        "session ttl",
        cli.session_ttl.as_deref().unwrap_or(DEFAULT_SESSION_TTL),
    )?;

    Ok(AuthConfig {
        key: key.to_string(),
        session_ttl,
        cookie_secure: cli.cookie_secure,
        revocation: !cli.no_session_revocation,
    })
}

fn resolve_push_config(cli: &Cli) -> Result<PushConfig, String> {
    let timeout = parse_duration(
        "push timeout",
        cli.push_timeout.as_deref().unwrap_or(DEFAULT_PUSH_TIMEOUT),
    )?;
    let timeout = std::time::Duration::try_from(timeout)
        .map_err(|_| "push timeout is out of range".to_string())?;

    Ok(PushConfig {
        vapid_private_key: cli.vapid_private_key.clone(),
        vapid_public_key: cli.vapid_public_key.clone(),
        vapid_subject: cli.vapid_subject.clone(),
        timeout,
    })
}

/// Parses `<number>[s|m|h|d]`; a bare number means seconds.
fn parse_duration(label: &str, raw: &str) -> Result<Duration, String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(format!("{label} cannot be empty"));
    }

    let (amount, unit) = match value.chars().last() {
        Some(ch) if ch.is_ascii_alphabetic() => {
            (&value[..value.len() - 1], ch.to_ascii_lowercase())
        }
        _ => (value, 's'),
    };

    let amount: i64 = amount
        .parse()
        .map_err(|_| format!("invalid {label} '{value}'; expected <number>[s|m|h|d]"))?;

    if amount <= 0 {
        return Err(format!("{label} must be greater than 0"));
    }

    let unit_secs: i64 = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        _ => {
            return Err(format!(
                "invalid {label} '{value}'; expected <number>[s|m|h|d]"
            ));
        }
    };
    amount
        .checked_mul(unit_secs)
        .map(Duration::seconds)
        .ok_or_else(|| format!("{label} '{value}' is too large"))
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    fn base_cli() -> Cli {
        Cli {
            command: None,
            data_dir: Some(PathBuf::from("/var/lib/backoffice")),
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            app_name: "Backoffice".to_string(),
            session_key: Some("base64-key".to_string()),
            session_ttl: None,
            cookie_secure: false,
            no_session_revocation: false,
            vapid_private_key: None,
            vapid_public_key: None,
            vapid_subject: None,
            push_timeout: None,
        }
    }

    #[test]
    fn parse_duration__should_parse_seconds_when_unit_missing() {
        // When
        let duration = parse_duration("session ttl", "30").expect("parse ttl");

        // Then
        assert_eq!(duration, Duration::seconds(30));
    }

    #[test]
    fn parse_duration__should_parse_units() {
        // When
        let duration = parse_duration("session ttl", "15m").expect("parse ttl");

        // Then
        assert_eq!(duration, Duration::minutes(15));
    }

    #[test]
    fn parse_duration__should_reject_invalid_values() {
        // Then
        assert!(parse_duration("session ttl", "").is_err());
        assert!(parse_duration("session ttl", "0").is_err());
        assert!(parse_duration("session ttl", "abc").is_err());
        assert!(parse_duration("session ttl", "3w").is_err());
    }

    #[test]
    fn parse_duration__should_reject_overflowing_amounts() {
        // When
        let result = parse_duration("session ttl", "999999999999999d");

        // Then
        assert!(result.is_err());
        assert_eq!(
            parse_duration("session ttl", "2d").expect("parse ttl"),
            Duration::days(2)
        );
    }

    #[test]
    fn resolve_config__should_require_data_dir_and_session_key() {
        // Given
        let mut without_dir = base_cli();
        without_dir.data_dir = None;
        let mut without_key = base_cli();
        without_key.session_key = Some("   ".to_string());

        // Then
        assert!(resolve_config(&without_dir).is_err());
        assert!(resolve_config(&without_key).is_err());
    }

    #[test]
    fn resolve_config__should_apply_defaults() {
        // When
        let config = resolve_config(&base_cli()).expect("resolve config");

        // Then
        assert_eq!(config.auth.key, "base64-key");
        assert_eq!(config.auth.session_ttl, Duration::days(7));
        assert!(config.auth.revocation);
        assert!(!config.auth.cookie_secure);
        assert_eq!(config.push.timeout, std::time::Duration::from_secs(10));
        assert!(config.push.vapid_private_key.is_none());
    }

    #[test]
    fn resolve_config__should_disable_revocation_when_requested() {
        // Given
        let mut cli = base_cli();
        cli.no_session_revocation = true;
        cli.push_timeout = Some("3s".to_string());

        // When
        let config = resolve_config(&cli).expect("resolve config");

        // Then
        assert!(!config.auth.revocation);
        assert_eq!(config.push.timeout, std::time::Duration::from_secs(3));
    }

    #[test]
    fn cli__should_parse_add_admin_subcommand() {
        // When
        let cli = Cli::try_parse_from([
            "backoffice",
            "add-admin",
            "--data-dir",
            "/tmp/data",
            "--email",
            "ada@studio.example",
            "--name",
            "Ada",
            "--role",
            "editor",
            "--secret",
            "correct horse",
        ])
        .expect("parse cli");

        // Then
        match cli.command {
            Some(Command::AddAdmin(args)) => {
                assert_eq!(args.role, Role::Editor);
                assert_eq!(args.email, "ada@studio.example");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
