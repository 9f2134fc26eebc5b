//! Warbler admin CLI: schema lifecycle and every store operation, with JSON output.

mod config;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use warbler_db::{DEFAULT_TIMELINE_LIMIT, Database};
use warbler_types::User;
use warbler_types::api::{ProfileUpdate, ToggleLikeResponse};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "warbler")]
#[command(version)]
#[command(about = "Manage a Warbler social graph store")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the schema if it does not exist
    Init,

    /// Drop and recreate every table
    Reset {
        /// Confirm that all data should be deleted
        #[arg(long)]
        yes: bool,
    },

    /// Create an account
    Signup {
        username: String,
        email: String,
        #[arg(short, long)]
        password: Option<String>,
        #[arg(long)]
        image_url: Option<String>,
    },

    /// Check a username/password pair
    Login { username: String, password: String },

    /// List users, optionally filtered by a username substring
    Users {
        #[arg(short = 'q', long)]
        search: Option<String>,
    },

    /// Show a user with message/follower/following/like counts
    Profile { username: String },

    /// Edit a profile (requires the current password)
    Edit {
        username: String,
        #[arg(short, long)]
        password: String,
        #[arg(long)]
        new_username: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        image_url: Option<String>,
        #[arg(long)]
        header_image_url: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        #[arg(long)]
        location: Option<String>,
    },

    /// Make FOLLOWER follow FOLLOWEE
    Follow { follower: String, followee: String },

    /// Make FOLLOWER stop following FOLLOWEE
    Unfollow { follower: String, followee: String },

    /// List who follows a user
    Followers { username: String },

    /// List who a user follows
    Following { username: String },

    /// Post a message as a user
    Post { username: String, text: String },

    /// Like a message, or remove the like if already liked
    Like { username: String, message_id: Uuid },

    /// Show a user's home timeline
    Timeline {
        username: String,
        #[arg(short, long, default_value_t = DEFAULT_TIMELINE_LIMIT)]
        limit: u32,
    },

    /// Delete an account and everything it owns
    DeleteUser {
        username: String,
        #[arg(short, long)]
        password: String,
    },
}

fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warbler_cli=info,warbler_db=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let db = Database::open(&config.db_path, config.hasher()?)
        .with_context(|| format!("opening {}", config.db_path.display()))?;

    run(&db, cli.command)?;

    db.close()?;
    Ok(())
}

fn run(db: &Database, command: Command) -> Result<()> {
    match command {
        Command::Init => {
            db.create_all()?;
            info!("Schema ready");
        }
        Command::Reset { yes } => {
            if !yes {
                bail!("refusing to delete all data without --yes");
            }
            db.reset()?;
            info!("Store reset");
        }
        Command::Signup {
            username,
            email,
            password,
            image_url,
        } => {
            let user = db.signup(&username, &email, password.as_deref(), image_url.as_deref())?;
            print_json(&user)?;
        }
        Command::Login { username, password } => match db.authenticate(&username, &password)? {
            Some(user) => print_json(&user)?,
            None => bail!("invalid username or password"),
        },
        Command::Users { search } => {
            print_json(&db.list_users(search.as_deref())?)?;
        }
        Command::Profile { username } => {
            let user = find_user(db, &username)?;
            let profile = db
                .profile(user.id)?
                .ok_or_else(|| anyhow!("user '{}' disappeared", username))?;
            print_json(&profile)?;
        }
        Command::Edit {
            username,
            password,
            new_username,
            email,
            image_url,
            header_image_url,
            bio,
            location,
        } => {
            let user = find_user(db, &username)?;
            let update = ProfileUpdate {
                username: new_username,
                email,
                image_url,
                header_image_url,
                bio,
                location,
            };
            match db.update_profile(user.id, &password, update)? {
                Some(user) => print_json(&user)?,
                None => bail!("invalid password"),
            }
        }
        Command::Follow { follower, followee } => {
            let (follower, followee) = (find_user(db, &follower)?, find_user(db, &followee)?);
            let mut session = db.session();
            session.follow(follower.id, followee.id);
            session.commit()?;
            info!("{} now follows {}", follower.username, followee.username);
        }
        Command::Unfollow { follower, followee } => {
            let (follower, followee) = (find_user(db, &follower)?, find_user(db, &followee)?);
            let mut session = db.session();
            session.unfollow(follower.id, followee.id);
            session.commit()?;
            info!("{} no longer follows {}", follower.username, followee.username);
        }
        Command::Followers { username } => {
            let user = find_user(db, &username)?;
            print_json(&db.followers(user.id)?)?;
        }
        Command::Following { username } => {
            let user = find_user(db, &username)?;
            print_json(&db.following(user.id)?)?;
        }
        Command::Post { username, text } => {
            let user = find_user(db, &username)?;
            let mut session = db.session();
            let message = session.post_message(user.id, &text)?;
            session.commit()?;
            print_json(&message.to_message())?;
        }
        Command::Like {
            username,
            message_id,
        } => {
            let user = find_user(db, &username)?;
            let liked = db.toggle_like(user.id, message_id)?;
            print_json(&ToggleLikeResponse { message_id, liked })?;
        }
        Command::Timeline { username, limit } => {
            let user = find_user(db, &username)?;
            print_json(&db.timeline(user.id, limit)?)?;
        }
        Command::DeleteUser { username, password } => {
            let user = db
                .authenticate(&username, &password)?
                .ok_or_else(|| anyhow!("invalid username or password"))?;
            db.delete_user(user.id)?;
            info!("Deleted {}", user);
        }
    }
    Ok(())
}

fn find_user(db: &Database, username: &str) -> Result<User> {
    db.get_user_by_username(username)?
        .ok_or_else(|| anyhow!("no user named '{}'", username))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
