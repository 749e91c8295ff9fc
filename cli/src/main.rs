use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use jobscout::{
    ApiTransport, AuthClient, AuthClientError, AuthFacade, Config, ConfigError, FileStore,
    JobFeed, MockJobApi, RegisterRequest, SessionController, StoreError, TokenStore,
    job_categories, recent_jobs,
};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("auth api call failed: {0}")]
    Auth(#[from] AuthClientError),
    #[error("credential storage failed: {0}")]
    Store(#[from] StoreError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("{0}")]
    Operation(String),
}

#[derive(Parser, Debug)]
#[command(name = "jobscout", about = "Job-board auth and feed client")]
struct Cli {
    /// Base URL of the auth API, overriding the environment.
    #[arg(long, env = "API_URL")]
    api_url: Option<String>,

    /// Credential file backing the session between runs.
    #[arg(long, env = "JOBSCOUT_STORE", default_value = ".jobscout.json")]
    store: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Account and session operations.
    Auth(AuthCommand),
    /// Job feed queries.
    Jobs(JobsCommand),
}

#[derive(Args, Debug)]
struct AuthCommand {
    #[command(subcommand)]
    command: AuthSubcommand,
}

#[derive(Subcommand, Debug)]
enum AuthSubcommand {
    /// Create an account.
    Register {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        password: String,
    },
    /// Log in and persist the session.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Log out and clear stored credentials.
    Logout,
    /// Rotate the access token using the stored refresh token.
    Refresh,
    /// Show the session restored from the credential file.
    Status,
    /// Fetch the authenticated profile from the API.
    Me,
    /// Request a password-reset code by email.
    ForgotPassword {
        #[arg(long)]
        email: String,
    },
    /// Exchange an emailed reset code for a reset token.
    VerifyOtp {
        #[arg(long)]
        email: String,
        #[arg(long)]
        otp: String,
    },
    /// Set a new password using a reset token.
    ResetPassword {
        #[arg(long)]
        token: String,
        #[arg(long)]
        new_password: String,
        #[arg(long)]
        confirm_password: String,
    },
    /// Confirm a new account with an emailed code.
    VerifyAccount {
        #[arg(long)]
        email: String,
        #[arg(long)]
        otp: String,
    },
}

#[derive(Args, Debug)]
struct JobsCommand {
    #[command(subcommand)]
    command: JobsSubcommand,
}

#[derive(Subcommand, Debug)]
enum JobsSubcommand {
    /// Browse the job feed.
    List {
        /// Category filter; "All" disables it.
        #[arg(long, default_value = "All")]
        category: String,
        /// Case-insensitive search over title, company, and location.
        #[arg(long)]
        search: Option<String>,
        /// How many pages to accumulate.
        #[arg(long, default_value_t = 1)]
        pages: usize,
    },
    /// List the selectable job categories.
    Categories,
}

struct App {
    facade: AuthFacade,
    session: Arc<SessionController>,
    client: AuthClient,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(api_url) = &cli.api_url {
        config.api_url = api_url.trim_end_matches('/').to_string();
    }

    match cli.command {
        Command::Auth(auth) => {
            let app = build_app(&config, &cli.store).await?;
            run_auth(&app, auth.command).await
        }
        Command::Jobs(jobs) => run_jobs(&config, jobs.command).await,
    }
}

/// Wire the client, session, and facade over a file-backed store, then
/// restore whatever session the file holds.
async fn build_app(config: &Config, store_path: &Path) -> Result<App, CliError> {
    let store: Arc<dyn TokenStore> = Arc::new(FileStore::new(store_path));
    let transport = ApiTransport::new(config.api_url.clone());
    let client = AuthClient::new(transport.clone(), Arc::clone(&store));
    client.initialize().await?;

    let session = Arc::new(SessionController::new(store, transport.credentials()));
    session.check_auth().await;

    let facade = AuthFacade::new(client.clone(), Arc::clone(&session));
    Ok(App {
        facade,
        session,
        client,
    })
}

#[allow(clippy::too_many_lines)]
async fn run_auth(app: &App, command: AuthSubcommand) -> Result<(), CliError> {
    match command {
        AuthSubcommand::Register {
            first_name,
            last_name,
            email,
            phone,
            password,
        } => {
            let request = RegisterRequest {
                first_name,
                last_name,
                email,
                password,
                phone,
            };
            if !app.facade.register(&request).await {
                return Err(operation_error(&app.facade));
            }
            println!("registered: verify the account with the code sent to {}", request.email);
            Ok(())
        }
        AuthSubcommand::Login { email, password } => {
            if !app.facade.login(&email, &password).await {
                return Err(operation_error(&app.facade));
            }
            print_json(&serde_json::to_value(app.session.snapshot())?)
        }
        AuthSubcommand::Logout => {
            app.facade.logout().await;
            if let Some(error) = app.facade.error() {
                eprintln!("server logout failed: {}", error.message);
            }
            println!("logged out");
            Ok(())
        }
        AuthSubcommand::Refresh => {
            if !app.facade.refresh_token().await {
                return Err(CliError::Operation(
                    "token refresh failed; log in again".to_string(),
                ));
            }
            println!("token refreshed");
            Ok(())
        }
        AuthSubcommand::Status => print_json(&serde_json::to_value(app.session.snapshot())?),
        AuthSubcommand::Me => {
            let profile = app.client.current_user().await?;
            print_json(&profile)
        }
        AuthSubcommand::ForgotPassword { email } => {
            if !app.facade.forgot_password(&email).await {
                return Err(operation_error(&app.facade));
            }
            println!("reset code sent to {email}");
            Ok(())
        }
        AuthSubcommand::VerifyOtp { email, otp } => {
            let outcome = app.facade.verify_otp(&email, &otp).await;
            if !outcome.success {
                return Err(operation_error(&app.facade));
            }
            print_json(&serde_json::json!({ "token": outcome.token }))
        }
        AuthSubcommand::ResetPassword {
            token,
            new_password,
            confirm_password,
        } => {
            let outcome = app
                .facade
                .reset_password(&token, &new_password, &confirm_password)
                .await;
            if !outcome.success {
                return Err(CliError::Operation(outcome.message.unwrap_or_else(|| {
                    operation_error(&app.facade).to_string()
                })));
            }
            println!(
                "{}",
                outcome.message.unwrap_or_else(|| "password reset".to_string())
            );
            Ok(())
        }
        AuthSubcommand::VerifyAccount { email, otp } => {
            let outcome = app.facade.verify_account(&email, &otp).await;
            if !outcome.success {
                return Err(operation_error(&app.facade));
            }
            println!(
                "{}",
                outcome.message.unwrap_or_else(|| "account verified".to_string())
            );
            Ok(())
        }
    }
}

async fn run_jobs(config: &Config, command: JobsSubcommand) -> Result<(), CliError> {
    match command {
        JobsSubcommand::List {
            category,
            search,
            pages,
        } => {
            let source = Arc::new(MockJobApi::new(config));
            let feed = JobFeed::new(source, config);

            feed.load().await;
            if category != "All" {
                feed.set_category(&category).await;
            }
            if let Some(search) = &search {
                feed.set_search(search).await;
            }
            for _ in 1..pages {
                feed.load_more().await;
            }

            let snapshot = feed.snapshot();
            print_json(&serde_json::to_value(&snapshot)?)?;
            if let Some(error) = snapshot.error {
                return Err(CliError::Operation(error));
            }
            Ok(())
        }
        JobsSubcommand::Categories => {
            print_json(&serde_json::to_value(job_categories(&recent_jobs()))?)
        }
    }
}

/// Surface the facade's captured error as the command failure.
fn operation_error(facade: &AuthFacade) -> CliError {
    let message = facade
        .error()
        .map_or_else(|| "operation failed".to_string(), |error| error.message);
    CliError::Operation(message)
}

fn print_json(value: &serde_json::Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
