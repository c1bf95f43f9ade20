//! mist - terminal client for the misteriosAI chat service

mod commands;
mod config;
mod storage;
mod ui;
mod utils;

use anyhow::Context;
use clap::Parser;
use mist_api::ApiClient;
use mist_chat::{
    ChatController, ChatEvent, ClientStorage, ConnectionEvent, Language, LocaleStore,
    RemoteBackend, SessionStore, validate_registration,
};
use mist_tui::theme::emotion_badge;
use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::commands::{CommandResult, execute_command};
use crate::storage::FileStorage;

/// mist - chat with misteriosAI from the terminal
#[derive(Parser, Debug)]
#[command(name = "mist")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Chat service URL (default: from config, then http://localhost:8000)
    #[arg(long)]
    server: Option<String>,

    /// Log in with this email (password from MIST_PASSWORD or prompt)
    #[arg(long, value_name = "EMAIL")]
    login: Option<String>,

    /// Create an account with this email, then log in
    #[arg(long, value_name = "EMAIL")]
    register: Option<String>,

    /// Forget the stored token
    #[arg(long)]
    logout: bool,

    /// Show the logged-in account
    #[arg(long)]
    whoami: bool,

    /// List conversations and exit
    #[arg(long)]
    conversations: bool,

    /// Set the preferred language (pt, en)
    #[arg(long, value_name = "LANG")]
    lang: Option<String>,

    /// Send a single message and print the reply
    #[arg(short = 'c', long, value_name = "MESSAGE")]
    command: Option<String>,

    /// Conversation to continue (default: the most recent, or a new one with -c)
    #[arg(long, value_name = "ID")]
    conversation: Option<Uuid>,

    /// Disable TUI mode (use simple stdin/stdout)
    #[arg(long)]
    no_tui: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

/// Session, language and API client shared by every mode
pub struct Services {
    pub api: ApiClient,
    pub session: Arc<SessionStore>,
    pub locale: LocaleStore,
    pub readiness: mist_chat::ReadinessConfig,
}

impl Services {
    /// A controller talking to the real backend, plus its connection event stream
    pub fn controller(&self) -> (ChatController, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let backend = Arc::new(RemoteBackend::new(self.api.clone(), Arc::clone(&self.session)));
        ChatController::new(backend, self.readiness)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("mist_cli=debug,mist_api=debug,mist_chat=debug")
            .with_writer(io::stderr)
            .init();
    }

    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let cfg = config::Config::load();
    let storage = Arc::new(FileStorage::new(FileStorage::default_path()));
    tracing::debug!("Client state in {}", storage.path().display());

    let session = Arc::new(SessionStore::restore(storage.clone()));
    let locale = LocaleStore::restore(storage.clone());
    if let Some(code) = args.lang.as_deref() {
        let language: Language = code.parse()?;
        locale.set_language(language)?;
    } else if storage.get(mist_chat::storage::LANGUAGE_KEY).is_none() {
        if let Some(language) = cfg.language.as_deref().and_then(|c| c.parse().ok()) {
            locale.set_language(language)?;
        }
    }

    let server = cfg.server_url(args.server.as_deref());
    let api = ApiClient::new(&server)
        .with_context(|| format!("Invalid server URL: {server}"))?
        .with_auth_handler(session.clone());
    let services = Services {
        api,
        session,
        locale,
        readiness: cfg.readiness(),
    };

    if args.logout {
        services.session.logout();
        println!("Logged out.");
        return Ok(());
    }

    if let Some(email) = args.register.as_deref() {
        return register(&services, email).await;
    }

    if let Some(email) = args.login.as_deref() {
        return login(&services, email).await;
    }

    if args.lang.is_some() && args.command.is_none() && !args.whoami && !args.conversations {
        println!("Language set to {}.", services.locale.language());
        return Ok(());
    }

    if args.whoami {
        return whoami(&services).await;
    }

    ensure_logged_in(&services).await?;

    if args.conversations {
        return list_conversations(&services).await;
    }

    if let Some(message) = args.command {
        return run_command(&services, &message, args.conversation).await;
    }

    let use_tui = !args.no_tui && cfg.tui.unwrap_or(true) && io::stdout().is_terminal();
    if use_tui {
        return ui::run_tui(&services, args.conversation).await;
    }

    run_interactive(&services, args.conversation).await
}

fn prompt_line(label: &str) -> io::Result<String> {
    eprint!("{label}");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Password from MIST_PASSWORD, else from stdin
fn read_password(label: &str) -> io::Result<String> {
    match std::env::var("MIST_PASSWORD") {
        Ok(password) if !password.is_empty() => Ok(password),
        _ => prompt_line(label),
    }
}

async fn login(services: &Services, email: &str) -> anyhow::Result<()> {
    let password = read_password("Password: ")?;
    match services.session.login(&services.api, email, &password).await {
        Ok(user) => {
            println!("Logged in as {}.", user.email);
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn register(services: &Services, email: &str) -> anyhow::Result<()> {
    let password = read_password("Password: ")?;
    let confirm = match std::env::var("MIST_PASSWORD") {
        Ok(p) if !p.is_empty() => p,
        _ => prompt_line("Confirm password: ")?,
    };
    if let Err(e) = validate_registration(&password, &confirm) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    match services.session.register(&services.api, email, &password).await {
        Ok(user) => {
            println!("Account created. Logged in as {}.", user.email);
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn whoami(services: &Services) -> anyhow::Result<()> {
    if !services.session.is_authenticated() {
        println!("Not logged in.");
        return Ok(());
    }
    match services.session.refresh_user(&services.api).await {
        Ok(user) => {
            println!("{} ({})", user.email, user.id);
            println!("Server: {}", services.api.base_url());
            println!("Language: {}", services.locale.language());
            Ok(())
        }
        Err(e) if e.is_unauthorized() => {
            println!("Stored token was rejected; logged out.");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Chat modes need a session; offer to log in when a terminal is attached
async fn ensure_logged_in(services: &Services) -> anyhow::Result<()> {
    if services.session.is_authenticated() {
        return Ok(());
    }
    if !io::stdin().is_terminal() {
        eprintln!("Error: Not logged in");
        eprintln!();
        eprintln!("Log in with: mist --login you@example.com");
        eprintln!("Or create an account with: mist --register you@example.com");
        std::process::exit(1);
    }

    eprintln!("Log in to {}", services.api.base_url());
    loop {
        let email = prompt_line("Email: ")?;
        if email.trim().is_empty() {
            std::process::exit(1);
        }
        let password = read_password("Password: ")?;
        match services.session.login(&services.api, email.trim(), &password).await {
            Ok(user) => {
                eprintln!("Logged in as {}.\n", user.email);
                return Ok(());
            }
            Err(e) => eprintln!("{}\n", e),
        }
    }
}

async fn list_conversations(services: &Services) -> anyhow::Result<()> {
    let (mut controller, _events) = services.controller();
    controller.refresh_conversations().await?;
    println!(
        "{}",
        utils::format_conversation_list(controller.conversations(), None)
    );
    Ok(())
}

/// Print what happened during a turn
fn print_events(events: &mut broadcast::Receiver<ChatEvent>) {
    while let Ok(event) = events.try_recv() {
        match event {
            ChatEvent::ToolActivity {
                name,
                content,
                communicating,
            } => {
                if communicating {
                    println!("[Calling {}...]", name);
                } else if let Some(content) = content {
                    println!("[{}: {}]", name, utils::truncate_chars(&content, 200));
                }
            }
            ChatEvent::TurnCompleted {
                message: Some(message),
            } => {
                let (emotion, text) = message.display();
                println!("misteriosAI {}\n{}", emotion_badge(emotion), text.trim());
            }
            ChatEvent::TurnFailed { message } | ChatEvent::Notice { message } => {
                eprintln!("Error: {}", message);
            }
            _ => {}
        }
    }
}

async fn run_turn(
    controller: &mut ChatController,
    connection_rx: &mut mpsc::UnboundedReceiver<ConnectionEvent>,
    events: &mut broadcast::Receiver<ChatEvent>,
    message: &str,
) {
    controller.send(message).await;
    print_events(events);
    while controller.is_loading() {
        match connection_rx.recv().await {
            Some(event) => controller.handle_connection_event(event).await,
            None => break,
        }
        print_events(events);
    }
}

async fn run_command(
    services: &Services,
    message: &str,
    conversation: Option<Uuid>,
) -> anyhow::Result<()> {
    let (mut controller, mut connection_rx) = services.controller();
    let mut events = controller.subscribe();
    if let Some(id) = conversation {
        controller.select_conversation(id).await?;
    }

    println!("> {}", message);
    println!();
    run_turn(&mut controller, &mut connection_rx, &mut events, message).await;

    if let Some(id) = controller.active() {
        eprintln!("\n[conversation {}]", id);
    }
    Ok(())
}

async fn run_interactive(services: &Services, conversation: Option<Uuid>) -> anyhow::Result<()> {
    let (mut controller, mut connection_rx) = services.controller();
    let mut events = controller.subscribe();

    match conversation {
        Some(id) => {
            controller.refresh_conversations().await?;
            controller.select_conversation(id).await?;
        }
        None => controller.load_conversations().await?,
    }
    print_events(&mut events);

    if io::stderr().is_terminal() {
        eprintln!("mist ({}) language: {}", services.api.base_url(), services.locale.language());
        if let Some(id) = controller.active() {
            eprintln!(
                "continuing conversation {} ({} messages)",
                id,
                controller.state().messages.len()
            );
        }
        eprintln!("Type /help for commands.\n");
    }

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(result) = execute_command(input) {
            let keep_going = apply_line_command(services, &mut controller, result).await;
            print_events(&mut events);
            if !keep_going {
                break;
            }
            println!();
            continue;
        }

        println!();
        run_turn(&mut controller, &mut connection_rx, &mut events, input).await;
        println!();

        if !services.session.is_authenticated() {
            eprintln!("Session expired. Log in again with: mist --login EMAIL");
            break;
        }
    }

    Ok(())
}

/// Returns false when the loop should end
async fn apply_line_command(
    services: &Services,
    controller: &mut ChatController,
    result: CommandResult,
) -> bool {
    match result {
        CommandResult::Message(msg) => println!("{}", msg),
        CommandResult::NewChat => {
            controller.new_chat();
            println!("Started a new conversation.");
        }
        CommandResult::List => match controller.refresh_conversations().await {
            Ok(()) => println!(
                "{}",
                utils::format_conversation_list(controller.conversations(), controller.active())
            ),
            Err(e) => println!("Could not load conversations: {}", e),
        },
        CommandResult::Open(index) => {
            let Some(id) = controller.conversations().get(index).map(|c| c.id) else {
                println!("No conversation {}. Use /list.", index + 1);
                return true;
            };
            match controller.select_conversation(id).await {
                Ok(()) => {
                    for message in &controller.state().messages {
                        let (emotion, text) = message.display();
                        match message.role {
                            mist_chat::Role::User => println!("you> {}", text),
                            mist_chat::Role::Assistant => {
                                println!("misteriosAI {}\n{}", emotion_badge(emotion), text.trim())
                            }
                        }
                    }
                }
                Err(e) => println!("Could not open conversation: {}", e),
            }
        }
        CommandResult::Delete(index) => {
            let Some(summary) = controller.conversations().get(index).cloned() else {
                println!("No conversation {}. Use /list.", index + 1);
                return true;
            };
            let title = mist_chat::conversations::display_title(&summary).to_string();
            let answer = prompt_line(&format!("Delete \"{}\"? [y/N] ", title)).unwrap_or_default();
            if !answer.trim().eq_ignore_ascii_case("y") {
                return true;
            }
            match controller.delete_conversation(summary.id).await {
                Ok(()) => println!("Deleted \"{}\".", title),
                Err(e) => println!("Could not delete conversation: {}", e),
            }
        }
        CommandResult::Language(choice) => {
            let result = match choice {
                Some(language) => services.locale.set_language(language).map(|_| language),
                None => services.locale.toggle(),
            };
            match result {
                Ok(language) => println!("Language set to {}.", language),
                Err(e) => println!("Could not save language: {}", e),
            }
        }
        CommandResult::WhoAmI => match services.session.refresh_user(&services.api).await {
            Ok(user) => println!("{} ({})", user.email, user.id),
            Err(e) => println!("{}", e),
        },
        CommandResult::Logout => {
            services.session.logout();
            controller.reset();
            println!("Logged out.");
            return false;
        }
        CommandResult::Exit => return false,
        CommandResult::Unknown(cmd) => {
            println!("Unknown command: /{}", cmd);
            println!("Type /help for available commands.");
        }
    }
    true
}
