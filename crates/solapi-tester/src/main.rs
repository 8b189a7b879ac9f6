mod host;
mod http_mock;
mod values;

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    process,
};

use axum::{
    Router,
    body::{Body, to_bytes},
    extract::State,
    http::{Method, Request, StatusCode},
    response::IntoResponse,
};
use clap::{Parser, Subcommand, ValueEnum};
use messaging_provider_solapi::{
    API_KEY_CREDENTIAL, ApiKeyCredentials, SolapiNode, SolapiTrigger, authorization_header,
    describe, items_from_body,
};
use provider_common::{ExecutionMode, NodeHost, ProviderError};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::runtime::Builder;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use crate::host::CliHost;
use crate::http_mock::{HttpHistory, history_json, new_history};
use crate::values::{Values, load_state, parse_item_params, save_state};

#[derive(Parser)]
#[command(name = "solapi-tester")]
#[command(about = "Drive the Solapi nodes from the command line", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the action node once and print the output items.
    Send {
        #[arg(long, value_name = "VALUES_JSON")]
        values: PathBuf,
        #[arg(long, value_name = "JSON")]
        item_params: Option<String>,
    },
    /// Populate one dynamic dropdown.
    Options {
        #[arg(long, value_name = "VALUES_JSON")]
        values: PathBuf,
        #[arg(long, value_name = "LOADER")]
        loader: String,
    },
    /// Run one webhook lifecycle step against a persisted state file.
    Webhook {
        #[arg(value_enum)]
        action: WebhookAction,
        #[arg(long, value_name = "VALUES_JSON")]
        values: PathBuf,
        #[arg(long, value_name = "STATE_JSON")]
        state: PathBuf,
        #[arg(long, value_name = "PUBLIC_BASE_URL")]
        public_base_url: String,
        #[arg(long)]
        event: Option<String>,
        #[arg(long)]
        hook_id: Option<String>,
        /// Register as a temporary (manual test) webhook.
        #[arg(long)]
        manual: bool,
    },
    /// Convert a webhook body into output items.
    Ingress {
        #[arg(long, value_name = "BODY_FILE")]
        body_file: PathBuf,
    },
    /// Serve POST requests on a path and print the items each one produces.
    Listen {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 8080)]
        port: u16,
        #[arg(long, default_value = "/")]
        path: String,
    },
    /// Print a fresh HMAC Authorization header for the API-key credential.
    Sign {
        #[arg(long, value_name = "VALUES_JSON")]
        values: PathBuf,
    },
    /// Print the node description.
    Describe,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum WebhookAction {
    /// Check and create when missing, like a workflow activation.
    Activate,
    Check,
    Deactivate,
}

impl WebhookAction {
    fn as_str(&self) -> &'static str {
        match self {
            WebhookAction::Activate => "activate",
            WebhookAction::Check => "check",
            WebhookAction::Deactivate => "deactivate",
        }
    }
}

struct WebhookParams {
    action: WebhookAction,
    values_path: PathBuf,
    state_path: PathBuf,
    public_base_url: String,
    event: Option<String>,
    hook_id: Option<String>,
    manual: bool,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(_) => 0,
        Err(err) => {
            eprintln!("error: {err}");
            err.exit_code()
        }
    };
    process::exit(exit_code);
}

/// Logs go to stderr so stdout stays machine readable.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Send {
            values,
            item_params,
        } => handle_send(values, item_params),
        Command::Options { values, loader } => handle_options(values, loader),
        Command::Webhook {
            action,
            values,
            state,
            public_base_url,
            event,
            hook_id,
            manual,
        } => handle_webhook(WebhookParams {
            action,
            values_path: values,
            state_path: state,
            public_base_url,
            event,
            hook_id,
            manual,
        }),
        Command::Ingress { body_file } => handle_ingress(body_file),
        Command::Listen { host, port, path } => run_listener(host, port, path),
        Command::Sign { values } => handle_sign(values),
        Command::Describe => print_json(&json!(describe())),
    }
}

fn load_values(path: &Path) -> Result<Values, CliError> {
    Values::load(path).map_err(|err| CliError::ValuesLoad(path.to_path_buf(), err))
}

fn handle_send(values_path: PathBuf, item_params: Option<String>) -> Result<(), CliError> {
    let values = load_values(&values_path)?;
    let item_params = match item_params {
        Some(raw) => parse_item_params(&raw).map_err(CliError::InvalidArgument)?,
        None => Vec::new(),
    };
    let history = new_history();
    let host = CliHost::new(values, history.clone()).with_item_params(item_params);
    let result = SolapiNode::execute(&host);
    log_http_history("send", &history);
    let items = result.map_err(CliError::from)?;
    print_json(&json!({
        "items": items,
        "http_calls": history_json(&history),
    }))
}

fn handle_options(values_path: PathBuf, loader: String) -> Result<(), CliError> {
    let values = load_values(&values_path)?;
    let history = new_history();
    let host = CliHost::new(values, history.clone());
    let options = SolapiNode::load_options(&host, &loader)?;
    print_json(&json!({
        "options": options,
        "http_calls": history_json(&history),
    }))
}

fn handle_webhook(params: WebhookParams) -> Result<(), CliError> {
    let public_base_url = params.public_base_url.trim();
    if public_base_url.is_empty() {
        return Err(CliError::InvalidArgument(anyhow::anyhow!(
            "--public-base-url is required"
        )));
    }
    let values = load_values(&params.values_path)?;
    let state = load_state(&params.state_path)
        .map_err(|err| CliError::StateFile(params.state_path.clone(), err))?;
    let history = new_history();
    let mode = if params.manual {
        ExecutionMode::Manual
    } else {
        ExecutionMode::Active
    };
    let mut host = CliHost::new(values, history.clone())
        .with_static_data(state)
        .with_public_base_url(public_base_url)
        .with_mode(mode);
    if let Some(event) = params.event {
        host.set_param("event", Value::String(event));
    }
    if let Some(hook_id) = params.hook_id {
        host.set_param("hookId", Value::String(hook_id));
    }

    let outcome = match params.action {
        WebhookAction::Check => {
            let exists = SolapiTrigger::check_exists(&mut host)?;
            json!({ "exists": exists })
        }
        WebhookAction::Activate => {
            let exists = SolapiTrigger::check_exists(&mut host)?;
            let created = !exists && SolapiTrigger::create(&mut host)?;
            json!({ "exists": exists, "created": created })
        }
        WebhookAction::Deactivate => {
            let report = SolapiTrigger::delete(&mut host);
            json!({ "teardown": report })
        }
    };
    save_state(&params.state_path, host.static_data())
        .map_err(|err| CliError::StateFile(params.state_path.clone(), err))?;
    log_http_history(params.action.as_str(), &history);

    print_json(&json!({
        "action": params.action.as_str(),
        "webhook_url": host.node_webhook_url(messaging_provider_solapi::DEFAULT_WEBHOOK),
        "result": outcome,
        "state": host.static_data(),
        "http_calls": history_json(&history),
    }))
}

fn handle_ingress(body_file: PathBuf) -> Result<(), CliError> {
    let body = fs::read(&body_file).map_err(|err| CliError::InputFile(body_file.clone(), err.into()))?;
    let items = SolapiTrigger::webhook(&body);
    print_json(&json!({ "items": items }))
}

fn handle_sign(values_path: PathBuf) -> Result<(), CliError> {
    let values = load_values(&values_path)?;
    let host = CliHost::new(values, new_history());
    let credentials = ApiKeyCredentials::from_value(&host.credentials(API_KEY_CREDENTIAL)?);
    print_json(&json!({ "authorization": authorization_header(&credentials)? }))
}

/// Largest webhook body the listener accepts.
const MAX_WEBHOOK_BODY: usize = 1024 * 1024;

#[derive(Clone)]
struct ListenerState {
    expected_path: String,
}

fn run_listener(host: String, port: u16, path: String) -> Result<(), CliError> {
    let bind_addr = format!("{host}:{port}");
    let listener_state = ListenerState {
        expected_path: path.clone(),
    };
    eprintln!("listening on http://{bind_addr} (webhook path {path})");

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err: io::Error| CliError::Listen(err.to_string()))?;
    runtime.block_on(async move {
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|err| CliError::Listen(err.to_string()))?;
        let app = Router::new()
            .fallback(handle_listener_request)
            .with_state(listener_state);
        axum::serve(listener, app)
            .with_graceful_shutdown(wait_for_shutdown())
            .await
            .map_err(|err| CliError::Listen(err.to_string()))
    })
}

async fn handle_listener_request(
    State(state): State<ListenerState>,
    req: Request<Body>,
) -> impl IntoResponse {
    let path = req.uri().path().to_string();
    if path != state.expected_path {
        return (StatusCode::NOT_FOUND, "not found");
    }
    if req.method() != Method::POST {
        return (StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
    }
    let Ok(body) = to_bytes(req.into_body(), MAX_WEBHOOK_BODY).await else {
        return (StatusCode::PAYLOAD_TOO_LARGE, "payload too large");
    };
    let items = items_from_body(&body);
    let detail = json!({ "path": path, "items": items });
    if let Ok(text) = serde_json::to_string(&detail) {
        println!("{text}");
    }
    io::stdout().flush().ok();
    (StatusCode::OK, "ok")
}

async fn wait_for_shutdown() {
    signal::ctrl_c().await.ok();
}

fn log_http_history(op: &str, history: &HttpHistory) {
    if let Ok(calls) = history.lock() {
        for (idx, call) in calls.iter().enumerate() {
            tracing::info!(
                op,
                call = idx,
                method = %call.request.method,
                url = %call.request.url,
                status = call.response.as_ref().map(|resp| resp.status),
                "http history"
            );
        }
    }
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value).map_err(|err| CliError::Output(err.into()))?;
    println!("{text}");
    Ok(())
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error("values load failed ({0}): {1}")]
    ValuesLoad(PathBuf, #[source] anyhow::Error),
    #[error("input file failed ({0}): {1}")]
    InputFile(PathBuf, #[source] anyhow::Error),
    #[error("state file failed ({0}): {1}")]
    StateFile(PathBuf, #[source] anyhow::Error),
    #[error("invalid argument: {0}")]
    InvalidArgument(#[source] anyhow::Error),
    #[error("{0}")]
    Validation(#[source] ProviderError),
    #[error("provider operation failed: {0}")]
    ProviderOp(#[source] ProviderError),
    #[error("webhook activation failed: {0}")]
    Webhook(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("listen helper failure: {0}")]
    Listen(String),
    #[error("failed to write output: {0}")]
    Output(#[source] anyhow::Error),
}

impl From<ProviderError> for CliError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Transport(message) => CliError::Network(message),
            ProviderError::Activation(message) => CliError::Webhook(message),
            err if err.is_configuration() => CliError::Validation(err),
            err => CliError::ProviderOp(err),
        }
    }
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            CliError::ValuesLoad(_, _) => 1,
            CliError::InputFile(_, _) => 1,
            CliError::Output(_) => 1,
            CliError::InvalidArgument(_) => 2,
            CliError::Validation(_) => 2,
            CliError::ProviderOp(_) => 4,
            CliError::Network(_) => 5,
            CliError::StateFile(_, _) => 6,
            CliError::Listen(_) => 7,
            CliError::Webhook(_) => 8,
        }
    }
}
