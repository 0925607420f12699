//! Account administration against the local credential store.
//!
//! The store is opened directly, so these commands must run while the
//! server is stopped.

use std::path::PathBuf;
use std::sync::Arc;

use jobsara_core::{Config, Role, WordTranslator};
use jobsara_gateway::auth::PasswordHasher;
use jobsara_gateway::model::Account;
use jobsara_gateway::{AuthState, Registration, SledStore};

use crate::ui;

const GENERATED_PASSWORD_LEN: usize = 16;

/// Arguments for admin commands.
pub struct AdminArgs {
    /// The admin action to perform.
    pub action: AdminAction,
    /// Data directory override.
    pub data_dir: Option<PathBuf>,
}

/// Admin actions. `user` accepts an email or a username.
pub enum AdminAction {
    /// Create an account.
    Create {
        username: String,
        email: String,
        password: Option<String>,
        generate_password: bool,
        role: String,
        first_name: String,
        last_name: String,
    },
    /// List accounts.
    List,
    /// Change an account's role.
    SetRole { user: String, role: String },
    /// Replace an account's password.
    ResetPassword {
        user: String,
        password: Option<String>,
    },
    /// Revoke all sessions of an account.
    RevokeSessions { user: String },
    /// Delete an account.
    Delete { user: String },
    /// Remove expired session records.
    PurgeSessions,
}

/// Run the admin command.
///
/// # Errors
///
/// Returns error if the store cannot be opened, the signing secret is
/// missing, or the operation fails.
pub async fn run_admin(config: Config, args: AdminArgs) -> anyhow::Result<()> {
    let data_dir = args.data_dir.unwrap_or_else(|| config.data_dir());
    std::fs::create_dir_all(&data_dir)?;

    tracing::debug!(path = %data_dir.display(), "Opening credential store");
    let store = SledStore::open(&data_dir)
        .map_err(|e| anyhow::anyhow!("Failed to open credential store: {}", e))?;
    let auth = AuthState::initialize(
        config.auth,
        Arc::new(store),
        Arc::new(WordTranslator::new()),
    )
    .map_err(|e| anyhow::anyhow!("{}. Run 'jobsara secret generate --save' first", e))?;

    match args.action {
        AdminAction::Create {
            username,
            email,
            password,
            generate_password,
            role,
            first_name,
            last_name,
        } => {
            let password = if generate_password {
                let password = PasswordHasher::generate_password(GENERATED_PASSWORD_LEN);
                ui::success(&format!("Generated password: {password}"));
                password
            } else {
                password.ok_or_else(|| {
                    anyhow::anyhow!("Password required. Use --password or --generate-password")
                })?
            };

            let account = auth
                .accounts
                .create(Registration {
                    username: Some(username),
                    email: Some(email),
                    password: Some(password),
                    first_name: Some(first_name),
                    last_name: Some(last_name),
                    user_type: Some(role),
                    ..Registration::default()
                })
                .await?;

            ui::success(&format!(
                "Created account '{}' (id {}) with role '{}'",
                account.username,
                account.id,
                account.role.as_str()
            ));
        }

        AdminAction::List => {
            let accounts = auth.accounts.all().await?;
            print_accounts(&accounts);
        }

        AdminAction::SetRole { user, role } => {
            let role: Role = role.parse().map_err(|_| {
                anyhow::anyhow!("Invalid role: {}. Use one of: {}", role, Role::valid_names())
            })?;
            let account = auth.accounts.find(&user).await?;
            auth.accounts.set_role(account.id, role).await?;
            ui::success(&format!(
                "Role of '{}' set to '{}'; existing sessions revoked",
                account.username,
                role.as_str()
            ));
        }

        AdminAction::ResetPassword { user, password } => {
            let account = auth.accounts.find(&user).await?;
            let generated = password.is_none();
            let password = password
                .unwrap_or_else(|| PasswordHasher::generate_password(GENERATED_PASSWORD_LEN));

            auth.accounts
                .reset_password(account.id, password.clone())
                .await?;

            ui::success(&format!("Password reset for '{}'", account.username));
            if generated {
                ui::success(&format!("New password: {password}"));
            }
        }

        AdminAction::RevokeSessions { user } => {
            let account = auth.accounts.find(&user).await?;
            let revoked = auth.sessions.revoke_all(account.id).await?;
            ui::success(&format!(
                "Revoked {revoked} session(s) for '{}'",
                account.username
            ));
        }

        AdminAction::Delete { user } => {
            let account = auth.accounts.find(&user).await?;
            auth.accounts.delete(account.id).await?;
            ui::success(&format!("Deleted account '{}'", account.username));
        }

        AdminAction::PurgeSessions => {
            let purged = auth.sessions.purge_expired().await?;
            ui::success(&format!("Purged {purged} expired session(s)"));
        }
    }

    Ok(())
}

fn print_accounts(accounts: &[Account]) {
    if accounts.is_empty() {
        ui::info("No accounts.");
        ui::info(
            "Run 'jobsara admin create --username admin --email admin@example.com --generate-password' to create one.",
        );
        return;
    }

    ui::info(&format!("Accounts ({}):", accounts.len()));
    println!();
    println!(
        "{:<6} {:<20} {:<28} {:<12} {:<20}",
        "ID", "USERNAME", "EMAIL", "ROLE", "CREATED"
    );
    println!("{}", "-".repeat(88));

    for account in accounts {
        println!(
            "{:<6} {:<20} {:<28} {:<12} {:<20}",
            account.id,
            account.username,
            account.email,
            account.role.as_str(),
            account.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobsara_core::AuthConfig;
    use jobsara_gateway::TokenCodec;

    fn config(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.gateway.data_dir = Some(dir.to_path_buf());
        config.auth = AuthConfig::builder()
            .jwt_secret(TokenCodec::generate_hex_secret())
            .hash_cost(1)
            .build();
        config
    }

    fn create(username: &str) -> AdminArgs {
        AdminArgs {
            action: AdminAction::Create {
                username: username.to_string(),
                email: format!("{username}@x.io"),
                password: None,
                generate_password: true,
                role: "admin".to_string(),
                first_name: "A".to_string(),
                last_name: "B".to_string(),
            },
            data_dir: None,
        }
    }

    #[tokio::test]
    async fn test_create_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());

        run_admin(config.clone(), create("root")).await.unwrap();
        assert!(run_admin(config.clone(), create("root")).await.is_err());

        run_admin(
            config.clone(),
            AdminArgs {
                action: AdminAction::Delete {
                    user: "root@x.io".to_string(),
                },
                data_dir: None,
            },
        )
        .await
        .unwrap();
        run_admin(config, create("root")).await.unwrap();
    }

    #[tokio::test]
    async fn test_requires_secret() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.auth.jwt_secret = None;

        let result = run_admin(
            config,
            AdminArgs {
                action: AdminAction::List,
                data_dir: None,
            },
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_set_role_rejects_unknown_role() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        run_admin(config.clone(), create("root")).await.unwrap();

        let result = run_admin(
            config,
            AdminArgs {
                action: AdminAction::SetRole {
                    user: "root".to_string(),
                    role: "wizard".to_string(),
                },
                data_dir: None,
            },
        )
        .await;
        assert!(result.is_err());
    }
}
