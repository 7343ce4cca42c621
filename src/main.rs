use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tokio_stream::StreamExt;
use tonic::transport::Channel;
use tracing_subscriber::EnvFilter;

use nomad_status::config::{ClientConfig, NomadServer, RetryPolicy, ServerConfig};
use nomad_status::grpc::status_service::status_from_proto;
use nomad_status::grpc::GrpcServer;
use nomad_status::nomad::{load_job_payload, HttpSchedulerClient, SchedulerClient};
use nomad_status::proto::cluster_status_client::ClusterStatusClient;
use nomad_status::proto::HostsRequest;
use nomad_status::shutdown::install_shutdown_handler;
use nomad_status::status::StatusAggregator;

#[derive(Parser, Debug)]
#[command(name = "nomad-status")]
#[command(version)]
#[command(about = "Inspect Nomad hosts and jobs, and stream per-host job status over gRPC")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the gRPC status server
    Server(ServerArgs),

    /// Print hosts, jobs or per-host job status straight from Nomad
    Show(ShowArgs),

    /// Stream per-host job status from a running status server
    Status(StatusArgs),

    /// Node management commands
    Node {
        #[command(flatten)]
        nomad: NomadArgs,

        #[command(subcommand)]
        command: NodeCommands,
    },

    /// Job management commands
    Job {
        #[command(flatten)]
        nomad: NomadArgs,

        #[command(subcommand)]
        command: JobCommands,
    },
}

// =============================================================================
// Shared Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct NomadArgs {
    /// Nomad HTTP API address (host:port)
    #[arg(long, short = 'n', env = "NOMAD_ADDR", default_value = "127.0.0.1:4646")]
    nomad: NomadServer,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "5")]
    timeout_secs: u64,

    /// Attempts per request on connection failures (1 disables retries)
    #[arg(long, default_value = "4")]
    attempts: u32,

    /// Output format
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

impl NomadArgs {
    fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.nomad.clone())
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_retry(RetryPolicy {
                max_attempts: self.attempts,
                ..RetryPolicy::default()
            })
    }

    fn client(&self) -> Result<HttpSchedulerClient, Box<dyn std::error::Error>> {
        Ok(HttpSchedulerClient::new(&self.client_config())?)
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

// =============================================================================
// Server / Show / Status Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct ServerArgs {
    #[command(flatten)]
    nomad: NomadArgs,

    /// Port to listen on for gRPC
    #[arg(long, default_value = "10000")]
    port: u16,

    /// Job resolved when a request does not name one
    #[arg(long, default_value = "clarify")]
    job: String,

    /// Allocation lookups in flight per request
    #[arg(long, default_value = "8")]
    concurrency: usize,
}

#[derive(Parser, Debug)]
struct ShowArgs {
    #[command(flatten)]
    nomad: NomadArgs,

    /// Show the status of the hosts
    #[arg(long)]
    hosts: bool,

    /// Show the status of the jobs
    #[arg(long)]
    jobs: bool,

    /// Resolve the deployment status of this job on every host
    #[arg(long, value_name = "JOB")]
    status: Option<String>,

    /// Allocation lookups in flight when resolving --status
    #[arg(long, default_value = "8")]
    concurrency: usize,
}

#[derive(Parser, Debug)]
struct StatusArgs {
    /// Status server address
    #[arg(long, short = 'a', default_value = "http://127.0.0.1:10000")]
    addr: String,

    /// Job to resolve (defaults to the server's job)
    #[arg(long)]
    job: Option<String>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

// =============================================================================
// Node / Job Commands
// =============================================================================

#[derive(clap::Subcommand, Debug)]
enum NodeCommands {
    /// Enable (or with --disable, lift) drain on a node
    Drain {
        /// Node name, or node ID with --by-id
        node: String,

        /// Treat NODE as a Nomad node ID instead of a name
        #[arg(long)]
        by_id: bool,

        /// Disable drain instead of enabling it
        #[arg(long)]
        disable: bool,
    },
}

#[derive(clap::Subcommand, Debug)]
enum JobCommands {
    /// Register a job from a JSON job file
    Submit {
        /// Path to the JSON job definition
        path: PathBuf,
    },
    /// Stop (deregister) a job
    Stop {
        /// Job name
        name: String,
    },
    /// List the task groups a job runs on a node
    Services {
        /// Job name
        job: String,
        /// Node name
        node: String,
    },
}

// =============================================================================
// JSON Output Types
// =============================================================================

#[derive(Serialize)]
struct HostOutput {
    id: String,
    name: String,
    drain: bool,
}

#[derive(Serialize)]
struct JobOutput {
    name: String,
    priority: i64,
    status: String,
    running: i64,
}

#[derive(Serialize)]
struct HostStatusOutput {
    hostname: String,
    status: Option<String>,
    error: Option<String>,
}

#[derive(Serialize)]
struct ControlOutput {
    action: String,
    target: String,
    http_status: u16,
}

#[derive(Serialize)]
struct ServicesOutput {
    job: String,
    node: String,
    active: bool,
    services: Vec<String>,
}

// =============================================================================
// Helper Functions
// =============================================================================

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_host_statuses(
    statuses: &[HostStatusOutput],
    output: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        OutputFormat::Json => print_json(&statuses)?,
        OutputFormat::Table => {
            if statuses.is_empty() {
                println!("No hosts found.");
                return Ok(());
            }
            println!("{:<30} STATUS", "HOST");
            println!("{}", "-".repeat(45));
            for entry in statuses {
                match (&entry.status, &entry.error) {
                    (_, Some(error)) => println!("{:<30} ERROR ({})", entry.hostname, error),
                    (Some(status), None) => println!("{:<30} {}", entry.hostname, status),
                    (None, None) => println!("{:<30} UNKNOWN", entry.hostname),
                }
            }
        }
    }
    Ok(())
}

fn print_control(
    output: &OutputFormat,
    action: &str,
    target: &str,
    http_status: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        OutputFormat::Json => print_json(&ControlOutput {
            action: action.to_string(),
            target: target.to_string(),
            http_status,
        }),
        OutputFormat::Table => {
            println!("{} {}: HTTP {}", action, target, http_status);
            Ok(())
        }
    }
}

/// Control-path failures end the process with a non-zero exit code.
fn exit_on_error<T>(action: &str, result: nomad_status::error::Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            eprintln!("Error: {} failed: {}", action, e);
            std::process::exit(1);
        }
    }
}

// =============================================================================
// Command Handlers
// =============================================================================

async fn run_server(args: ServerArgs) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let listen_addr: SocketAddr = format!("0.0.0.0:{}", args.port).parse()?;
    let config = ServerConfig::new(listen_addr, args.nomad.client_config())
        .with_default_job(args.job)
        .with_concurrency(args.concurrency);

    tracing::info!(
        listen_addr = %config.listen_addr,
        nomad = %config.client.nomad,
        timeout_ms = config.client.timeout.as_millis() as u64,
        max_attempts = config.client.retry.max_attempts,
        concurrency = config.concurrency,
        "Starting nomad-status server"
    );

    let shutdown = install_shutdown_handler()?;
    let server = GrpcServer::new(&config)?;
    server.run(shutdown).await?;

    tracing::info!("Status server stopped");
    Ok(())
}

async fn handle_show(args: ShowArgs) -> Result<(), Box<dyn std::error::Error>> {
    if !args.hosts && !args.jobs && args.status.is_none() {
        eprintln!("Error: nothing to show");
        eprintln!("Hint: pass --hosts, --jobs and/or --status <JOB>");
        std::process::exit(1);
    }

    let client = Arc::new(args.nomad.client()?);
    let output = &args.nomad.output;

    if args.hosts {
        let hosts: Vec<HostOutput> = client
            .list_hosts()
            .await?
            .into_iter()
            .map(|h| HostOutput {
                id: h.id,
                name: h.name,
                drain: h.draining,
            })
            .collect();

        match output {
            OutputFormat::Json => print_json(&hosts)?,
            OutputFormat::Table => {
                println!("{:<38} {:<30} DRAIN", "ID", "NAME");
                println!("{}", "-".repeat(76));
                for host in &hosts {
                    println!("{:<38} {:<30} {}", host.id, host.name, host.drain);
                }
            }
        }
    }

    if args.jobs {
        let jobs: Vec<JobOutput> = client
            .list_jobs()
            .await?
            .into_iter()
            .map(|j| JobOutput {
                running: j.running(),
                name: j.name,
                priority: j.priority,
                status: j.status,
            })
            .collect();

        match output {
            OutputFormat::Json => print_json(&jobs)?,
            OutputFormat::Table => {
                println!("{:<30} {:<9} {:<10} RUNNING", "NAME", "PRIORITY", "STATUS");
                println!("{}", "-".repeat(60));
                for job in &jobs {
                    println!(
                        "{:<30} {:<9} {:<10} {}",
                        job.name, job.priority, job.status, job.running
                    );
                }
            }
        }
    }

    if let Some(job) = args.status {
        let aggregator = StatusAggregator::new(client, args.concurrency);
        let statuses: Vec<HostStatusOutput> = aggregator
            .resolve_all_collected(&job)
            .await?
            .into_iter()
            .map(|report| HostStatusOutput {
                status: report.status().map(|s| s.to_string()),
                error: report.error().map(|e| e.to_string()),
                hostname: report.hostname,
            })
            .collect();
        print_host_statuses(&statuses, output)?;
    }

    Ok(())
}

async fn handle_status(args: StatusArgs) -> Result<(), Box<dyn std::error::Error>> {
    let channel = Channel::from_shared(args.addr.clone())?.connect().await?;
    let mut client = ClusterStatusClient::new(channel);

    let mut stream = client
        .list_hosts(HostsRequest {
            job_name: args.job.unwrap_or_default(),
        })
        .await?
        .into_inner();

    let mut statuses = Vec::new();
    while let Some(result) = stream.next().await {
        match result {
            Ok(reply) => {
                let error = (!reply.error.is_empty()).then_some(reply.error);
                let status = if error.is_some() {
                    None
                } else {
                    status_from_proto(reply.status).map(|s| s.to_string())
                };
                statuses.push(HostStatusOutput {
                    hostname: reply.hostname,
                    status,
                    error,
                });
            }
            Err(e) => {
                eprintln!("Stream error: {}", e);
                break;
            }
        }
    }

    print_host_statuses(&statuses, &args.output)
}

async fn handle_node(
    nomad: NomadArgs,
    command: NodeCommands,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = nomad.client()?;

    match command {
        NodeCommands::Drain {
            node,
            by_id,
            disable,
        } => {
            let node_id = if by_id {
                node.clone()
            } else {
                exit_on_error("node lookup", client.find_host(&node).await).id
            };
            let enable = !disable;
            let status = exit_on_error("drain", client.set_drain(&node_id, enable).await);
            let action = if enable { "drain" } else { "undrain" };
            print_control(&nomad.output, action, &node, status)?;
        }
    }
    Ok(())
}

async fn handle_job(nomad: NomadArgs, command: JobCommands) -> Result<(), Box<dyn std::error::Error>> {
    let client = nomad.client()?;

    match command {
        JobCommands::Submit { path } => {
            let payload = exit_on_error("job submission", load_job_payload(&path).await);
            let status = exit_on_error("job submission", client.submit_job(payload).await);
            print_control(&nomad.output, "submit", &path.display().to_string(), status)?;
        }
        JobCommands::Stop { name } => {
            let status = exit_on_error("job stop", client.stop_job(&name).await);
            print_control(&nomad.output, "stop", &name, status)?;
        }
        JobCommands::Services { job, node } => {
            let found_job = client.find_job(&job).await?;
            let host = client.find_host(&node).await?;
            let services = client.services(&found_job, &host).await?;
            let active = client.is_active(&found_job, &host).await?;

            match nomad.output {
                OutputFormat::Json => print_json(&ServicesOutput {
                    job,
                    node,
                    active,
                    services,
                })?,
                OutputFormat::Table => {
                    println!("Job:      {}", job);
                    println!("Node:     {}", node);
                    println!("Active:   {}", active);
                    if services.is_empty() {
                        println!("Services: none");
                    } else {
                        println!("Services:");
                        for service in services {
                            println!("  {}", service);
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    match args.command {
        Commands::Server(server_args) => run_server(server_args).await?,
        Commands::Show(show_args) => handle_show(show_args).await?,
        Commands::Status(status_args) => handle_status(status_args).await?,
        Commands::Node { nomad, command } => handle_node(nomad, command).await?,
        Commands::Job { nomad, command } => handle_job(nomad, command).await?,
    }

    Ok(())
}
