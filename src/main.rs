use std::process::ExitCode;

use mail_answers::config::Config;
use mail_answers::error::{Error, MailError};
use mail_answers::ledger::{SaveOutcome, load_snapshot, save_snapshot};
use mail_answers::mail::ImapMailbox;
use mail_answers::mail::oauth::resolve_login;
use mail_answers::scan::{ScanResult, Scanner};

#[tokio::main]
async fn main() -> ExitCode {
    // Install rustls crypto provider before any TLS usage
    let _ = rustls::crypto::ring::default_provider().install_default();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("  Required: TARGET_SUBJECT, SEARCH_QUESTION, OUTPUT_CSV_FILE, IMAP_SERVER, EMAIL_ADDRESS");
            eprintln!("  Credentials: TENANT_ID + CLIENT_ID + CLIENT_SECRET, or EMAIL_PASSWORD");
            return ExitCode::FAILURE;
        }
    };

    eprintln!("📬 mail-answers v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Mailbox: {} @ {}:{}", config.imap.email_address, config.imap.host, config.imap.port);
    eprintln!("   Subject: {}", config.scan.subject_filter);
    eprintln!("   Snapshot: {}", config.scan.snapshot_path.display());

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Run failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), Error> {
    let Config { scan, imap } = config;
    let snapshot_path = scan.snapshot_path.clone();

    let store = load_snapshot(&snapshot_path);
    tracing::info!(records = store.len(), "Loaded existing records");

    // No session means no scan and no write
    let http = reqwest::Client::new();
    let login = resolve_login(&http, &imap.auth).await?;

    let scanner = Scanner::new(scan);
    let ScanResult {
        store,
        changed,
        report,
    } = tokio::task::spawn_blocking(move || -> Result<ScanResult, MailError> {
        let processed = scanner.config().processed_folder.clone();
        let mut mailbox = ImapMailbox::open(&imap, &login, processed.as_deref())?;
        let result = scanner.run(&mut mailbox, store);
        mailbox.logout();
        Ok(result)
    })
    .await
    .map_err(|e| Error::Task(e.to_string()))??;

    report.log_summary();

    match save_snapshot(&store, &snapshot_path, changed)? {
        SaveOutcome::Skipped => eprintln!("   No new or updated answers."),
        SaveOutcome::Written { backup } => {
            eprintln!("   Saved {} records to {}", store.len(), snapshot_path.display());
            if let Some(backup) = backup {
                eprintln!("   Previous snapshot kept as {}", backup.display());
            }
        }
    }
    Ok(())
}
