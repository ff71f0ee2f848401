use std::sync::Arc;

use ambassador_chat::common::Role;
use ambassador_chat::config::{self, API_URL_ENV, AppConfig, SOCKET_URL_ENV};
use ambassador_chat::network::{ChatApi, ChatClient, ChatTransport, SocketIoConnector};
use ambassador_chat::session::{AuthState, Identity, Session, mask_token};
use ambassador_chat::ui::{ChatApp, Launch};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(
    name = "ambassador-chat",
    version,
    about = "Chat client for campus ambassadors, students and admins"
)]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
    /// REST API base URL
    #[arg(long, env = API_URL_ENV, value_name = "URL")]
    api_url: Option<String>,
    /// Socket.IO server URL
    #[arg(long, env = SOCKET_URL_ENV, value_name = "URL")]
    socket_url: Option<String>,
    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand)]
enum Mode {
    /// Manage the stored sign-in session
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// Run the visitor form for a public embed configuration
    Embed {
        #[arg(value_name = "CONFIG_KEY")]
        config_key: String,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Store a token and the user it belongs to
    Set {
        #[arg(long)]
        token: String,
        #[arg(long)]
        user_id: String,
        /// user, ambassador or admin
        #[arg(long)]
        role: Role,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// Print the stored identity
    Show,
    /// Sign out
    Clear,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let app_config = config::load_config(&cli.config).with_overrides(cli.api_url, cli.socket_url);
    log::info!(
        "Using API {} and socket server {}",
        app_config.api_url,
        app_config.socket_url
    );
    let session = Arc::new(Session::open(&app_config.session_db)?);

    match cli.mode {
        Some(Mode::Session { action }) => run_session_command(&session, action),
        Some(Mode::Embed { config_key }) => {
            let api = ChatApi::new(app_config.api_url.clone(), session.clone());
            let embed = api.get_embed_config(&config_key).await?;
            log::info!(
                "Loaded embed config {config_key} for ambassador {}",
                embed.ambassador_id
            );
            run_window(app_config, session, Launch::Embed(embed)).await
        }
        None => {
            let launch = match session.identity()? {
                Some(identity) => Launch::Chat(identity),
                None => {
                    log::warn!("No stored session; showing sign-in screen");
                    Launch::SignedOut
                }
            };
            run_window(app_config, session, launch).await
        }
    }
}

fn run_session_command(
    session: &Session,
    action: SessionAction,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        SessionAction::Set {
            token,
            user_id,
            role,
            name,
            email,
        } => {
            let user = Identity {
                id: user_id,
                role,
                name,
                email,
            };
            session.save(&AuthState { token, user })?;
            println!("Session saved");
        }
        SessionAction::Show => match session.current()? {
            Some(state) => println!(
                "{} ({}) {} token {}",
                state.user.name,
                state.user.role.as_str(),
                state.user.id,
                mask_token(&state.token)
            ),
            None => println!("Not signed in"),
        },
        SessionAction::Clear => {
            session.clear()?;
            println!("Signed out");
        }
    }
    Ok(())
}

async fn run_window(
    app_config: AppConfig,
    session: Arc<Session>,
    launch: Launch,
) -> Result<(), Box<dyn std::error::Error>> {
    // UI -> Network
    let (cmd_tx, cmd_rx) = mpsc::channel(100);
    // Network -> UI
    let (event_tx, event_rx) = mpsc::channel(100);

    let api = ChatApi::new(app_config.api_url.clone(), session.clone());
    let connector = SocketIoConnector::new(&app_config.socket_url)?;
    tokio::spawn(async move {
        let client = ChatClient::new(api, connector, session, event_tx, cmd_rx);
        if let Err(err) = client.run().await {
            log::error!("Chat worker terminated: {err}");
        }
    });

    let options = eframe::NativeOptions::default();
    let mut startup = Some((launch, event_rx));

    eframe::run_native(
        "Ambassador Chat",
        options,
        Box::new(move |cc| {
            let (launch, event_receiver) = startup
                .take()
                .ok_or("ChatApp should only be initialized once")?;
            Ok(Box::new(ChatApp::new(cc, launch, cmd_tx.clone(), event_receiver)))
        }),
    )?;
    Ok(())
}
