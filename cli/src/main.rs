use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::{Args, Parser, Subcommand};
use serde_json::Value;

use client::api::{Api, HttpApi, OfflineApi};
use client::resources::{Resource, ResourceClient};
use client::store::JsonFileStore;
use client::{ApiError, WizardDriver};
use wizard::capture::{self, CapturedFile};
use wizard::consts::MIN_LOADING_MS;
use wizard::field::{FieldDefinition, FieldType, FieldValue};
use wizard::machine::{Origin, Phase};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("api request failed: {0}")]
    Api(#[from] ApiError),
    #[error("terminal i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("the wizard stalled in an unexpected state")]
    Stalled,
}

#[derive(Parser, Debug)]
#[command(name = "worksite", about = "Worksite contractor marketplace CLI")]
struct Cli {
    #[arg(long, env = "WORKSITE_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    #[arg(long, env = "WORKSITE_STATE_FILE", default_value = ".worksite-session.json")]
    state_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone)]
struct CliContext {
    base_url: String,
    state_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a registration session and walk its steps interactively.
    Register(RegisterArgs),
    /// Continue a registration session persisted by an earlier run.
    Resume(RegisterArgs),
    /// Delete the persisted registration session, locally and server-side.
    Cancel,
    /// Invitation code helpers.
    Code(CodeCommand),
    /// Upload contractor documents for an existing user.
    Docs(DocsCommand),
    /// Thin passthrough to the marketplace resources.
    Api(ApiCommand),
}

#[derive(Args, Debug)]
struct DocsCommand {
    #[command(subcommand)]
    command: DocsSubcommand,
}

#[derive(Subcommand, Debug)]
enum DocsSubcommand {
    Upload {
        user_id: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct RegisterArgs {
    /// Role to register under (ignored when an invitation code is given).
    #[arg(long, default_value = "contractor")]
    role: String,

    /// Register through a company invitation code.
    #[arg(long)]
    invitation_code: Option<String>,

    /// Run fully locally, without a reachable backend.
    #[arg(long, default_value_t = false)]
    mock: bool,
}

#[derive(Args, Debug)]
struct CodeCommand {
    #[command(subcommand)]
    command: CodeSubcommand,
}

#[derive(Subcommand, Debug)]
enum CodeSubcommand {
    Validate { code: String },
}

#[derive(Args, Debug)]
struct ApiCommand {
    #[command(subcommand)]
    command: ApiSubcommand,
}

#[derive(Subcommand, Debug)]
enum ApiSubcommand {
    Services(ResourceCommand),
    WorkRequest(ResourceCommand),
    WorkOrder(ResourceCommand),
    Inspection(ResourceCommand),
    Review(ResourceCommand),
}

impl ApiSubcommand {
    fn split(self) -> (Resource, ResourceSubcommand) {
        match self {
            Self::Services(c) => (Resource::Services, c.command),
            Self::WorkRequest(c) => (Resource::WorkRequests, c.command),
            Self::WorkOrder(c) => (Resource::WorkOrders, c.command),
            Self::Inspection(c) => (Resource::Inspections, c.command),
            Self::Review(c) => (Resource::Reviews, c.command),
        }
    }
}

#[derive(Args, Debug)]
struct ResourceCommand {
    #[command(subcommand)]
    command: ResourceSubcommand,
}

#[derive(Subcommand, Debug)]
enum ResourceSubcommand {
    List,
    Read {
        id: String,
    },
    Create {
        #[arg(long)]
        data: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let ctx = CliContext {
        base_url: cli.base_url,
        state_file: cli.state_file,
    };

    match cli.command {
        Command::Register(args) => run_wizard(&ctx, args, false).await,
        Command::Resume(args) => run_wizard(&ctx, args, true).await,
        Command::Cancel => run_cancel(&ctx).await,
        Command::Code(code) => run_code(&ctx, code).await,
        Command::Docs(docs) => run_docs(&ctx, docs).await,
        Command::Api(api) => run_api(&ctx, api).await,
    }
}

// =============================================================================
// REGISTRATION WIZARD
// =============================================================================

async fn run_wizard(ctx: &CliContext, args: RegisterArgs, resume: bool) -> Result<(), CliError> {
    let origin = match args.invitation_code {
        Some(code) => Origin::Invitation { code },
        None => Origin::Fresh { role: args.role },
    };
    let store = JsonFileStore::open(&ctx.state_file);

    if args.mock {
        let mut driver = WizardDriver::new(OfflineApi, store, origin);
        start(&mut driver, resume).await;
        interact(&mut driver).await
    } else {
        let mut driver = WizardDriver::new(HttpApi::new(&ctx.base_url)?, store, origin);
        start(&mut driver, resume).await;
        interact(&mut driver).await
    }
}

async fn start<A: Api>(driver: &mut WizardDriver<A, JsonFileStore>, resume: bool) {
    if resume {
        driver.resume(now_ms()).await;
    } else {
        driver.begin(now_ms()).await;
    }
}

enum StepAction {
    Submit,
    Back,
    Quit,
}

async fn interact<A: Api>(driver: &mut WizardDriver<A, JsonFileStore>) -> Result<(), CliError> {
    loop {
        driver.tick(now_ms()).await;
        match driver.core().phase().clone() {
            Phase::Ready { .. } => {
                render_step(driver);
                match prompt_step(driver).await? {
                    StepAction::Submit => {
                        driver.advance(now_ms()).await;
                        tokio::time::sleep(Duration::from_millis(MIN_LOADING_MS)).await;
                    }
                    StepAction::Back => driver.retreat(now_ms()).await,
                    StepAction::Quit => {
                        driver.abandon().await;
                        println!("registration cancelled");
                        return Ok(());
                    }
                }
            }
            Phase::Success { user_id } => {
                match user_id {
                    Some(id) => println!("\nregistration complete: user {id}"),
                    None => println!("\nregistration complete"),
                }
                if let Some(warning) = driver.core().upload_warning() {
                    eprintln!("warning: {warning}");
                }
                return Ok(());
            }
            Phase::Expired => {
                println!("\nyour session expired after inactivity; sign in again to restart");
                return Ok(());
            }
            Phase::Failed { message } => {
                eprintln!("\nregistration failed: {message}");
                return Ok(());
            }
            // The driver settles every effect before returning control, so
            // these are not observable between turns.
            Phase::Uninitialized | Phase::Loading { .. } | Phase::Submitting { .. } => {
                return Err(CliError::Stalled);
            }
        }
    }
}

fn render_step<A: Api>(driver: &WizardDriver<A, JsonFileStore>) {
    let Some(def) = driver.core().step_def() else {
        return;
    };
    println!("\n== Step {}: {} ==", def.index + 1, def.title);
    if driver.core().is_offline() {
        println!("   (offline: running against the local step tables)");
    }
    if let Some(banner) = driver.core().general_error() {
        println!("   !! {banner}");
    }
    println!("   (:back goes back a step, :quit cancels)");
}

async fn prompt_step<A: Api>(
    driver: &mut WizardDriver<A, JsonFileStore>,
) -> Result<StepAction, CliError> {
    // The field list is re-read every turn: the identity step grows as
    // captures land.
    let mut index = 0;
    loop {
        let Some(field) = driver
            .core()
            .step_def()
            .and_then(|def| def.fields.get(index))
            .cloned()
        else {
            return Ok(StepAction::Submit);
        };
        match prompt_field(driver, &field).await? {
            StepAction::Submit => index += 1,
            other => return Ok(other),
        }
    }
}

async fn prompt_field<A: Api>(
    driver: &mut WizardDriver<A, JsonFileStore>,
    field: &FieldDefinition,
) -> Result<StepAction, CliError> {
    if let Some(error) = driver.core().errors().get(&field.name) {
        println!("   ! {error}");
    }
    if let Some(help) = &field.help {
        println!("   ({help})");
    }

    let action = match field.field_type {
        FieldType::Checkbox => prompt_checkbox(driver, field)?,
        FieldType::File => prompt_file(driver, field)?,
        FieldType::Select => prompt_select(driver, field)?,
        _ => prompt_text(driver, field)?,
    };
    driver.core_mut().record_activity(now_ms());

    if matches!(action, StepAction::Submit) && field.field_type == FieldType::Email {
        driver.check_email().await;
        if let Some(error) = driver.core().errors().get(&field.name) {
            println!("   ! {error}");
        }
    }
    Ok(action)
}

fn prompt_checkbox<A: Api>(
    driver: &mut WizardDriver<A, JsonFileStore>,
    field: &FieldDefinition,
) -> Result<StepAction, CliError> {
    let link = field
        .link
        .as_deref()
        .map(|link| format!(" (see {link})"))
        .unwrap_or_default();
    let current = driver.core().form().flag(&field.name);
    let marker = if current { "Y/n" } else { "y/N" };
    let Some(raw) = read_line(&format!("{} [{marker}]{link}: ", field.label))? else {
        return Ok(StepAction::Quit);
    };
    if let Some(action) = control_token(&raw) {
        return Ok(action);
    }
    let checked = match raw.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => current,
    };
    driver
        .core_mut()
        .set_field(&field.name, FieldValue::Flag(checked));
    Ok(StepAction::Submit)
}

fn prompt_file<A: Api>(
    driver: &mut WizardDriver<A, JsonFileStore>,
    field: &FieldDefinition,
) -> Result<StepAction, CliError> {
    let have = driver.core().form().file(&field.name).is_some();
    let hint = if have {
        "Enter keeps the current photo"
    } else {
        "path to an image file"
    };
    let Some(raw) = read_line(&format!("{} ({hint}): ", field.label))? else {
        return Ok(StepAction::Quit);
    };
    if let Some(action) = control_token(&raw) {
        return Ok(action);
    }
    let path = raw.trim();
    if !path.is_empty() {
        attach_from_path(driver, &field.name, path);
    }
    Ok(StepAction::Submit)
}

fn prompt_select<A: Api>(
    driver: &mut WizardDriver<A, JsonFileStore>,
    field: &FieldDefinition,
) -> Result<StepAction, CliError> {
    for (i, option) in field.options.iter().enumerate() {
        println!("   {}) {option}", i + 1);
    }
    let Some(raw) = read_line(&format!("{}: ", field.label))? else {
        return Ok(StepAction::Quit);
    };
    if let Some(action) = control_token(&raw) {
        return Ok(action);
    }
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(StepAction::Submit);
    }
    let value = trimmed
        .parse::<usize>()
        .ok()
        .and_then(|i| field.options.get(i.wrapping_sub(1)))
        .map_or_else(|| trimmed.to_owned(), Clone::clone);
    driver
        .core_mut()
        .set_field(&field.name, FieldValue::Text(value));
    Ok(StepAction::Submit)
}

fn prompt_text<A: Api>(
    driver: &mut WizardDriver<A, JsonFileStore>,
    field: &FieldDefinition,
) -> Result<StepAction, CliError> {
    let current = driver
        .core()
        .form()
        .text(&field.name)
        .unwrap_or_default()
        .to_owned();
    let shown = match field.field_type {
        FieldType::Password if !current.is_empty() => "********".to_owned(),
        FieldType::Tel if !current.is_empty() => wizard::format::format_phone(&current),
        _ => current,
    };
    let hint = if shown.is_empty() {
        field
            .placeholder
            .as_deref()
            .map(|p| format!(" (e.g. {p})"))
            .unwrap_or_default()
    } else {
        format!(" [{shown}]")
    };
    let Some(raw) = read_line(&format!("{}{hint}: ", field.label))? else {
        return Ok(StepAction::Quit);
    };
    if let Some(action) = control_token(&raw) {
        return Ok(action);
    }
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        driver
            .core_mut()
            .set_field(&field.name, FieldValue::Text(trimmed.to_owned()));
    }
    Ok(StepAction::Submit)
}

fn attach_from_path<A: Api>(driver: &mut WizardDriver<A, JsonFileStore>, name: &str, path: &str) {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(error) => {
            println!("   ! cannot read {path}: {error}");
            return;
        }
    };
    let ext = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let Some(mime) = capture::mime_for_extension(&ext) else {
        println!("   ! {path} is not a supported image (jpg, png, webp, gif)");
        return;
    };
    let file = CapturedFile {
        name: format!("{name}.{ext}"),
        mime: mime.to_owned(),
        bytes,
    };
    if let Err(error) = driver.core_mut().attach_file(name, file) {
        println!("   ! {error}");
    }
}

fn control_token(raw: &str) -> Option<StepAction> {
    match raw.trim() {
        ":back" => Some(StepAction::Back),
        ":quit" | ":exit" => Some(StepAction::Quit),
        _ => None,
    }
}

/// Prompt and read one line; `None` on end of input.
fn read_line(prompt: &str) -> Result<Option<String>, CliError> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    let bytes = io::stdin().lock().read_line(&mut line)?;
    if bytes == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\n', '\r']).to_owned()))
}

// =============================================================================
// SESSION AND CODE COMMANDS
// =============================================================================

async fn run_cancel(ctx: &CliContext) -> Result<(), CliError> {
    let mut store = JsonFileStore::open(&ctx.state_file);
    let Some(persisted) = wizard::session::load(&store, wizard::step::TOTAL_STEPS) else {
        println!("no persisted session to cancel");
        return Ok(());
    };

    if !persisted.id.starts_with("local-") {
        let api = HttpApi::new(&ctx.base_url)?;
        if let Err(error) = api.delete_session(&persisted.id).await {
            tracing::warn!(%error, "best-effort session delete failed");
        }
    }
    wizard::session::clear(&mut store);
    println!("session {} cancelled", persisted.id);
    Ok(())
}

async fn run_code(ctx: &CliContext, code: CodeCommand) -> Result<(), CliError> {
    match code.command {
        CodeSubcommand::Validate { code } => {
            let api = HttpApi::new(&ctx.base_url)?;
            let response = api.validate_code(&code).await?;
            print_json(&serde_json::to_value(response)?)?;
            Ok(())
        }
    }
}

async fn run_docs(ctx: &CliContext, docs: DocsCommand) -> Result<(), CliError> {
    match docs.command {
        DocsSubcommand::Upload { user_id, files } => {
            let mut batch = Vec::new();
            for path in &files {
                let bytes = fs::read(path)?;
                let ext = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .unwrap_or_default()
                    .to_ascii_lowercase();
                let stem = path
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .unwrap_or("document")
                    .to_owned();
                let mime = capture::mime_for_extension(&ext).unwrap_or("application/octet-stream");
                batch.push((
                    stem,
                    CapturedFile {
                        name: path
                            .file_name()
                            .and_then(|name| name.to_str())
                            .unwrap_or("document")
                            .to_owned(),
                        mime: mime.to_owned(),
                        bytes,
                    },
                ));
            }
            let api = HttpApi::new(&ctx.base_url)?;
            let response = api.upload_documents(&user_id, &batch).await?;
            print_json(&serde_json::to_value(response)?)?;
            Ok(())
        }
    }
}

// =============================================================================
// RESOURCE PASSTHROUGH
// =============================================================================

async fn run_api(ctx: &CliContext, api: ApiCommand) -> Result<(), CliError> {
    let (resource, command) = api.command.split();
    let resources = ResourceClient::new(&ctx.base_url)?;
    let json = match command {
        ResourceSubcommand::List => resources.list(resource).await?,
        ResourceSubcommand::Read { id } => resources.read(resource, &id).await?,
        ResourceSubcommand::Create { data } => {
            let body = serde_json::from_str::<Value>(&data)?;
            resources.create(resource, body).await?
        }
    };
    print_json(&json)?;
    Ok(())
}

fn now_ms() -> u64 {
    let Ok(duration) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    u64::try_from(duration.as_millis()).unwrap_or(0)
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
