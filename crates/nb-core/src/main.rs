//! node-bench - CIS Kubernetes node benchmark auditor
//!
//! The main entry point for nb-core, handling:
//! - Configuration resolution and overrides
//! - Running benchmark sections against the local node
//! - Listing benchmark items
//! - Report rendering and exit codes

use clap::error::ErrorKind;
use clap::{Args, Parser, Subcommand};
use nb_common::OutputFormat;
use nb_core::bench::{Focus, MissingProcessPolicy, Registry, Runner};
use nb_core::benchmarks::{node_registry, Family};
use nb_core::bounded::IoBounds;
use nb_core::config::{load_config, ConfigError, ConfigOptions, NodeBenchConfig, ResolvedConfig};
use nb_core::exit_codes::ExitCode;
use nb_core::log_event;
use nb_core::logging::{
    event_names, generate_run_id, get_host_id, init_logging, LogConfig, LogContext, LogFormat,
    LogLevel,
    Stage,
};
use nb_core::output::{render_catalog, render_error, render_report};
use nb_core::predicate::Principals;
use nb_core::process::default_locator;
use regex::Regex;
use std::path::PathBuf;

/// CIS Kubernetes node benchmark auditor
#[derive(Parser)]
#[command(name = "node-bench")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Path to a config file (overrides NODE_BENCH_CONFIG and the XDG config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Bound on each process-table or filesystem call (milliseconds)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// What to report when a target process is not running
    #[arg(long, global = true, value_enum)]
    missing_process: Option<MissingProcessPolicy>,

    /// Comma-separated item id sections to run, e.g. 2.2.5,2.2.6
    #[arg(long, global = true)]
    focus: Option<String>,

    /// Regular expression over "[id] title"; only matching items run
    #[arg(long, global = true)]
    focus_regex: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run CIS benchmark sections
    Cis(CisArgs),

    /// List benchmark items without running them
    List,

    /// Configuration management
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
struct CisArgs {
    #[command(subcommand)]
    target: CisTarget,
}

#[derive(Subcommand, Debug)]
enum CisTarget {
    /// Run the worker node benchmarks
    Node(NodeArgs),
}

#[derive(Args, Debug)]
struct NodeArgs {
    #[command(subcommand)]
    family: Option<NodeFamily>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum NodeFamily {
    /// Run the kubelet specific benchmarks
    Kubelet,
    /// Run the kube-proxy specific benchmarks
    Proxy,
    /// Run the configuration file benchmarks
    Files,
}

impl From<NodeFamily> for Family {
    fn from(family: NodeFamily) -> Self {
        match family {
            NodeFamily::Kubelet => Family::Kubelet,
            NodeFamily::Proxy => Family::Proxy,
            NodeFamily::Files => Family::Files,
        }
    }
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp
                | ErrorKind::DisplayVersion
                | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => ExitCode::Clean,
                _ => ExitCode::ArgsError,
            };
            let _ = err.print();
            std::process::exit(code.as_i32());
        }
    };

    let level = LogLevel::from_verbosity(cli.global.verbose, cli.global.quiet);
    let log_format = (cli.global.format == OutputFormat::Jsonl).then_some(LogFormat::Jsonl);
    init_logging(&LogConfig::from_env(level, log_format));
    let ctx = LogContext::new(generate_run_id(), get_host_id());

    let exit_code = match &cli.command {
        Commands::Cis(args) => match &args.target {
            CisTarget::Node(node) => {
                let family = node.family.map(Family::from).unwrap_or(Family::Node);
                run_node(&cli.global, &ctx, family)
            }
        },
        Commands::List => run_list(&cli.global),
        Commands::Config(args) => match args.action {
            ConfigAction::Show => run_config_show(&cli.global, &ctx),
        },
    };

    std::process::exit(exit_code.as_i32());
}

fn run_node(global: &GlobalOpts, ctx: &LogContext, family: Family) -> ExitCode {
    let resolved = match resolve_config(global, ctx) {
        Ok(resolved) => resolved,
        Err(code) => return code,
    };
    let config = resolved.config;

    let focus = match build_focus(global, family) {
        Ok(focus) => focus,
        Err(message) => return output_args_error(global, &message),
    };
    let registry = match build_registry(global, &config) {
        Ok(registry) => registry,
        Err(code) => return code,
    };

    let bounds = IoBounds::new(config.timeout());
    let runner = Runner::new(
        default_locator(&config.host.proc_root, bounds),
        Principals::new(&config.host.passwd, &config.host.group, bounds),
        bounds,
    )
    .with_policy(config.missing_process)
    .with_process_names(config.processes.clone())
    .with_log_context(ctx.clone());

    let report = runner.run(&registry, &focus);

    match render_report(&report, global.format) {
        Ok(text) => print_text(&text),
        Err(e) => return output_internal_error(global, ctx, &nb_common::Error::Json(e)),
    }
    log_event!(
        ctx,
        DEBUG,
        event_names::REPORT_WRITTEN,
        Stage::Report,
        "report written",
        format = display(global.format),
        items = report.items.len() as u64
    );

    ExitCode::from_report(&report)
}

fn run_list(global: &GlobalOpts) -> ExitCode {
    let focus = match build_focus(global, Family::Node) {
        Ok(focus) => focus,
        Err(message) => return output_args_error(global, &message),
    };
    // Listing never touches the host, so defaults are enough when no
    // config file resolves.
    let config = load_config(&ConfigOptions {
        config_path: global.config.clone(),
    })
    .map(|resolved| resolved.config)
    .unwrap_or_default();

    let registry = match build_registry(global, &config) {
        Ok(registry) => registry,
        Err(code) => return code,
    };

    match render_catalog(registry.focused(&focus), global.format) {
        Ok(text) => {
            print_text(&text);
            ExitCode::Clean
        }
        Err(e) => {
            eprintln!("{}", render_error(&nb_common::Error::Json(e), global.format));
            ExitCode::InternalError
        }
    }
}

fn run_config_show(global: &GlobalOpts, ctx: &LogContext) -> ExitCode {
    let resolved = match resolve_config(global, ctx) {
        Ok(resolved) => resolved,
        Err(code) => return code,
    };

    match global.format {
        OutputFormat::Exitcode => {}
        OutputFormat::Json | OutputFormat::Jsonl => {
            let body = serde_json::json!({
                "schema_version": nb_common::SCHEMA_VERSION,
                "source": resolved.source.to_string(),
                "path": resolved.source.path(),
                "config": resolved.config,
            });
            let text = if global.format == OutputFormat::Json {
                serde_json::to_string_pretty(&body)
            } else {
                serde_json::to_string(&body)
            };
            match text {
                Ok(text) => println!("{}", text),
                Err(e) => return output_internal_error(global, ctx, &nb_common::Error::Json(e)),
            }
        }
        OutputFormat::Md | OutputFormat::Summary => match resolved.config.to_toml() {
            Ok(text) => {
                println!("# source: {}", resolved.source);
                print!("{}", text);
            }
            Err(e) => {
                let err = nb_common::Error::Config(e.to_string());
                return output_internal_error(global, ctx, &err);
            }
        },
    }
    ExitCode::Clean
}

/// Load configuration and apply command-line overrides.
fn resolve_config(global: &GlobalOpts, ctx: &LogContext) -> Result<ResolvedConfig, ExitCode> {
    let options = ConfigOptions {
        config_path: global.config.clone(),
    };
    let mut resolved = match load_config(&options) {
        Ok(resolved) => resolved,
        Err(e) => return Err(output_config_error(global, ctx, e)),
    };

    if let Some(timeout) = global.timeout {
        resolved.config.timeout_ms = timeout;
    }
    if let Some(policy) = global.missing_process {
        resolved.config.missing_process = policy;
    }
    if let Err(e) = resolved.config.validate() {
        return Err(output_args_error(global, &e.to_string()));
    }

    match resolved.source.path() {
        Some(path) => log_event!(
            ctx,
            INFO,
            event_names::CONFIG_LOADED,
            Stage::Init,
            "configuration loaded",
            path = display(path.display())
        ),
        None => log_event!(
            ctx,
            DEBUG,
            event_names::CONFIG_DEFAULT_USED,
            Stage::Init,
            "using built-in configuration"
        ),
    }
    Ok(resolved)
}

/// Family sections, unless `--focus` names its own; then `--focus-regex`.
fn build_focus(global: &GlobalOpts, family: Family) -> Result<Focus, String> {
    let mut focus = match &global.focus {
        Some(list) => Focus::sections(Focus::parse_sections(list)?),
        None => family.focus(),
    };
    if let Some(pattern) = &global.focus_regex {
        let re = Regex::new(pattern).map_err(|e| format!("invalid --focus-regex: {}", e))?;
        focus = focus.with_pattern(re);
    }
    Ok(focus)
}

fn build_registry(global: &GlobalOpts, config: &NodeBenchConfig) -> Result<Registry, ExitCode> {
    node_registry(&config.paths).map_err(|e| {
        let err = nb_common::Error::InvalidConfig(e.to_string());
        eprintln!("{}", render_error(&err, global.format));
        ExitCode::InternalError
    })
}

fn print_text(text: &str) {
    if text.is_empty() {
        return;
    }
    if text.ends_with('\n') {
        print!("{}", text);
    } else {
        println!("{}", text);
    }
}

/// Output a config error in the appropriate format.
fn output_config_error(global: &GlobalOpts, ctx: &LogContext, error: ConfigError) -> ExitCode {
    log_event!(
        ctx,
        ERROR,
        event_names::CONFIG_ERROR,
        Stage::Init,
        "configuration error",
        error = display(&error)
    );
    let err: nb_common::Error = error.into();
    let text = render_error(&err, global.format);
    if !text.is_empty() {
        eprintln!("{}", text);
    }
    ExitCode::ConfigError
}

fn output_args_error(global: &GlobalOpts, message: &str) -> ExitCode {
    if global.format != OutputFormat::Exitcode {
        eprintln!("error: {}", message);
    }
    ExitCode::ArgsError
}

fn output_internal_error(global: &GlobalOpts, ctx: &LogContext, err: &nb_common::Error) -> ExitCode {
    log_event!(
        ctx,
        ERROR,
        event_names::INTERNAL_ERROR,
        Stage::Report,
        "internal error",
        error = display(err)
    );
    let text = render_error(err, global.format);
    if !text.is_empty() {
        eprintln!("{}", text);
    }
    ExitCode::InternalError
}
