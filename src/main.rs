/*!
 * desktopflow CLI
 */

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use desktopflow::{
    cli_progress::PageSpinner,
    cli_style::{self, print_error, section_header},
    config::{LogLevel, OwnerLabel, ReportConfig, SortOrder},
    core::{run_report, CancellationFlag, RecordSource, ReportOptions},
    error::{ErrorCategory, FlowError, Result, EXIT_SUCCESS},
    logging,
    output::OutputWriter,
    protocol::dataverse::{CredentialInputs, Credentials, DataverseClient},
    protocol::ServiceEndpoint,
};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "desktopflow")]
#[command(version, about = "Report Power Automate desktop flows by payload size", long_about = None)]
struct Cli {
    /// Path to config file (overrides the default location)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, value_enum, global = true)]
    log_level: Option<LogLevelArg>,

    /// Write logs as JSON to this file instead of stderr
    #[arg(long, global = true, value_name = "FILE")]
    log: Option<PathBuf>,

    /// Verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output report rows as JSON Lines (one JSON object per line)
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List desktop flows with their payload size
    List(ListArgs),

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Environment URL, e.g. https://contoso.crm.dynamics.com
    #[arg(long, value_name = "URI")]
    service_uri: Option<String>,

    /// Skip flows whose payload is smaller than this many bytes
    #[arg(long, value_name = "BYTES")]
    min_size: Option<u64>,

    /// CSV output file [default: desktopflow.csv]
    #[arg(long, value_name = "FILE")]
    path: Option<PathBuf>,

    /// Do not write the CSV file
    #[arg(long)]
    no_csv: bool,

    /// Records per page [default: 10]
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    page_size: Option<u32>,

    /// Sort direction by size [default: desc]
    #[arg(long, value_enum)]
    sort: Option<SortArg>,

    /// Owner column shown for each flow [default: email]
    #[arg(long, value_enum)]
    owner_label: Option<OwnerLabelArg>,

    /// Leave out the last-modified date
    #[arg(long)]
    no_modified_date: bool,

    /// Fail if the listing needs more than this many pages
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    max_pages: Option<u32>,

    /// HTTP timeout in seconds [default: 120]
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Pre-acquired bearer token
    #[arg(long, env = "DATAVERSE_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Entra ID tenant for the client-credentials grant
    #[arg(long)]
    tenant_id: Option<String>,

    /// Application (client) id for the client-credentials grant
    #[arg(long)]
    client_id: Option<String>,

    /// Client secret for the client-credentials grant
    #[arg(long, env = "DATAVERSE_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    /// Token authority host [default: https://login.microsoftonline.com]
    #[arg(long, value_name = "URL")]
    authority_host: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum SortArg {
    Asc,
    Desc,
}

impl From<SortArg> for SortOrder {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Asc => SortOrder::Ascending,
            SortArg::Desc => SortOrder::Descending,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OwnerLabelArg {
    Email,
    Name,
}

impl From<OwnerLabelArg> for OwnerLabel {
    fn from(arg: OwnerLabelArg) -> Self {
        match arg {
            OwnerLabelArg::Email => OwnerLabel::Email,
            OwnerLabelArg::Name => OwnerLabel::Name,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

impl Cli {
    /// Global flags that override the config file
    fn apply_globals(&self, config: &mut ReportConfig) {
        if let Some(level) = self.log_level {
            config.log_level = level.into();
        }
        if let Some(ref log) = self.log {
            config.log_file = Some(log.clone());
        }
        config.verbose |= self.verbose;
    }
}

impl ListArgs {
    /// Flags given on the command line win over the config file
    fn apply(&self, config: &mut ReportConfig) {
        if let Some(ref uri) = self.service_uri {
            config.service_uri = Some(uri.clone());
        }
        if let Some(min_size) = self.min_size {
            config.min_size = min_size;
        }
        if let Some(ref path) = self.path {
            config.output_path = path.clone();
        }
        if self.no_csv {
            config.write_csv = false;
        }
        if let Some(page_size) = self.page_size {
            config.page_size = page_size;
        }
        if let Some(sort) = self.sort {
            config.sort_order = sort.into();
        }
        if let Some(label) = self.owner_label {
            config.owner_label = label.into();
        }
        if self.no_modified_date {
            config.include_modified = false;
        }
        if self.max_pages.is_some() {
            config.max_pages = self.max_pages;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(ref tenant) = self.tenant_id {
            config.tenant_id = Some(tenant.clone());
        }
        if let Some(ref client) = self.client_id {
            config.client_id = Some(client.clone());
        }
        if let Some(ref host) = self.authority_host {
            config.authority_host = host.clone();
        }
    }

    fn credential_inputs(&self, config: &ReportConfig) -> CredentialInputs {
        CredentialInputs {
            access_token: self.access_token.clone(),
            tenant_id: config.tenant_id.clone(),
            client_id: config.client_id.clone(),
            client_secret: self.client_secret.clone(),
            authority_host: config.authority_host.clone(),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let output = OutputWriter::new(cli.json);

    let code = match run(&cli, &output) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            report_error(&output, &e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run(cli: &Cli, output: &OutputWriter) -> Result<()> {
    match &cli.command {
        Commands::Completions { shell } => {
            use clap::CommandFactory;
            use clap_complete::generate;
            let mut cmd = Cli::command();
            generate(*shell, &mut cmd, "desktopflow", &mut io::stdout());
            Ok(())
        }
        Commands::List(args) => {
            let mut config = ReportConfig::load(cli.config.as_deref())?;
            cli.apply_globals(&mut config);
            args.apply(&mut config);
            config.validate()?;

            if let Err(e) = logging::init_logging(&config) {
                cli_style::print_warning(&format!("Failed to initialize logging: {}", e));
            }

            let credentials = Credentials::resolve(args.credential_inputs(&config))?;
            handle_list(&config, &credentials, output)
        }
    }
}

fn handle_list(config: &ReportConfig, credentials: &Credentials, output: &OutputWriter) -> Result<()> {
    let uri = config.service_uri.as_deref().unwrap_or_default();
    let endpoint = ServiceEndpoint::from_uri(uri, &config.api_version)?;
    let options = ReportOptions::from(config);
    let timeout = Duration::from_secs(config.timeout_secs);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| FlowError::Other(format!("Failed to start async runtime: {}", e)))?;

    let summary = runtime.block_on(async {
        let client = DataverseClient::connect(endpoint, credentials, timeout).await?;

        let cancel = CancellationFlag::new();
        let watcher = cancel.clone();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling the listing");
                watcher.cancel();
            }
        });

        if !output.is_json() {
            section_header(client.organization_name());
        }
        let spinner = PageSpinner::new(!output.is_json());
        let result = run_report(&client, &options, cancel, &spinner).await;
        drop(spinner);
        interrupt.abort();
        result
    })?;

    info!(
        rows = summary.rows.len(),
        pages = summary.pages_fetched,
        "report complete"
    );

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    output.write_rows(&mut handle, &summary.rows)?;

    if output.is_json() {
        output.summary(&summary);
    } else {
        cli_style::print_summary(&summary);
        if let Some(path) = &summary.csv_path {
            cli_style::print_success(&format!("CSV report written to {}", path.display()));
        }
    }
    Ok(())
}

fn report_error(output: &OutputWriter, err: &FlowError) {
    if output.is_json() {
        output.error(&err.to_string());
    } else {
        print_error(&err.to_string(), error_hint(err));
    }
}

fn error_hint(err: &FlowError) -> Option<&'static str> {
    match err.category() {
        ErrorCategory::Configuration => Some("Run `desktopflow list --help` for the available options"),
        ErrorCategory::Security => {
            Some("Check --access-token, or --tenant-id, --client-id and --client-secret")
        }
        ErrorCategory::Integrity => {
            Some("The owning user has no value in the selected column; try --owner-label name")
        }
        ErrorCategory::Interrupted => Some("Rows from completed pages are already in the CSV file"),
        ErrorCategory::Network | ErrorCategory::IoError | ErrorCategory::Unknown => None,
    }
}
