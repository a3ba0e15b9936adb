//! Account maintenance against the configured database, without going
//! through HTTP. Reads the same `DOCDESK_*` settings as the server.

use std::env;
use std::process::ExitCode;

use anyhow::{Context, bail};

use docdesk_api::auth::hash_password;
use docdesk_api::{Config, Storage, validate};
use docdesk_db::Database;
use docdesk_types::models::Role;

const USAGE: &str = "\
docdesk-admin commands:
  add-admin <email> <name> <password>   create an admin, or promote and reset an existing account
  add-user <email> <name> <password>    create a regular account
  set-password <email> <password>
  list-users
  delete-user <email>                   remove the account, its documents and messages";

struct Ctx {
    config: Config,
    db: Database,
}

impl Ctx {
    fn find(&self, email: &str) -> anyhow::Result<docdesk_db::models::UserRow> {
        let email = validate::normalize_email(email);
        self.db
            .get_user_by_email(&email)?
            .with_context(|| format!("no account with email {email}"))
    }
}

/// Applies the HTTP registration rules so CLI-made accounts can log in.
fn checked(email: &str, name: &str, password: &str) -> anyhow::Result<(String, String)> {
    let email = validate::email(email).map_err(|e| anyhow::anyhow!("{e}"))?;
    let name = validate::name(name).map_err(|e| anyhow::anyhow!("{e}"))?;
    validate::password(password).map_err(|e| anyhow::anyhow!("{e}"))?;
    Ok((email, name))
}

fn add_admin(ctx: &Ctx, email: &str, name: &str, password: &str) -> anyhow::Result<()> {
    let (email, name) = checked(email, name, password)?;
    let hash = hash_password(password)?;

    match ctx.db.get_user_by_email(&email)? {
        Some(user) => {
            ctx.db.set_user_role(user.id, Role::Admin)?;
            ctx.db.set_user_password(user.id, &hash)?;
            println!("Promoted {} (id {}) to admin and reset the password", email, user.id);
        }
        None => {
            let id = match ctx.db.create_user(&name, &email, &hash, Role::Admin) {
                Ok(id) => id,
                Err(e) if docdesk_db::is_unique_violation(&e) => {
                    bail!("{email} was registered concurrently; run add-admin again to promote it")
                }
                Err(e) => return Err(e),
            };
            println!("Created admin {} (id {})", email, id);
        }
    }
    Ok(())
}

fn add_user(ctx: &Ctx, email: &str, name: &str, password: &str) -> anyhow::Result<()> {
    let (email, name) = checked(email, name, password)?;
    if ctx.db.get_user_by_email(&email)?.is_some() {
        bail!("User with this email already exists");
    }
    let id = match ctx.db.create_user(&name, &email, &hash_password(password)?, Role::User) {
        Ok(id) => id,
        Err(e) if docdesk_db::is_unique_violation(&e) => {
            bail!("User with this email already exists")
        }
        Err(e) => return Err(e),
    };
    println!("Created user {} (id {})", email, id);
    Ok(())
}

fn set_password(ctx: &Ctx, email: &str, password: &str) -> anyhow::Result<()> {
    validate::password(password).map_err(|e| anyhow::anyhow!("{e}"))?;
    let user = ctx.find(email)?;
    ctx.db.set_user_password(user.id, &hash_password(password)?)?;
    println!("Password updated for {}", user.email);
    Ok(())
}

fn list_users(ctx: &Ctx) -> anyhow::Result<()> {
    let users = ctx.db.list_users(None)?;
    println!("{:>5}  {:<6}  {:<32}  {:<24}  created", "id", "role", "email", "name");
    for u in &users {
        println!(
            "{:>5}  {:<6}  {:<32}  {:<24}  {}",
            u.id, u.role, u.email, u.name, u.created_at
        );
    }
    println!("{} account(s)", users.len());
    Ok(())
}

async fn delete_user(ctx: &Ctx, email: &str) -> anyhow::Result<()> {
    let user = ctx.find(email)?;
    let paths = ctx
        .db
        .delete_user(user.id)?
        .with_context(|| format!("account {} vanished", user.email))?;
    let storage = Storage::new(ctx.config.upload_dir.clone()).await?;
    let files = paths.len();
    let removed = storage.delete_files(paths).await;
    println!(
        "Deleted {} (id {}); removed {}/{} stored files",
        user.email, user.id, removed, files
    );
    Ok(())
}

async fn run(args: &[String]) -> anyhow::Result<()> {
    let command = args.first().map(String::as_str).unwrap_or("help");
    if matches!(command, "help" | "--help" | "-h") {
        println!("{USAGE}");
        return Ok(());
    }

    let config = Config::from_env()?;
    let db = Database::open(&config.db_path)
        .with_context(|| format!("opening {}", config.db_path.display()))?;
    let ctx = Ctx { config, db };

    let rest: Vec<&str> = args[1..].iter().map(String::as_str).collect();
    match (command, rest.as_slice()) {
        ("add-admin", [email, name, password]) => add_admin(&ctx, email, name, password),
        ("add-user", [email, name, password]) => add_user(&ctx, email, name, password),
        ("set-password", [email, password]) => set_password(&ctx, email, password),
        ("list-users", []) => list_users(&ctx),
        ("delete-user", [email]) => delete_user(&ctx, email).await,
        ("add-admin" | "add-user" | "set-password" | "list-users" | "delete-user", _) => {
            bail!("wrong number of arguments for `{command}`\n\n{USAGE}")
        }
        _ => bail!("unknown command: {command}\n\n{USAGE}"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let args: Vec<String> = env::args().skip(1).collect();

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
