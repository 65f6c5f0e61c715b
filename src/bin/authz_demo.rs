use log::{error, info, warn};
use std::env;
use std::process;

use rusty_authz::config::AuthConfig;
use rusty_authz::{AuthManager, Attributes};

fn main() {
    // Initialize env
    match dotenvy::dotenv() {
        Ok(_) => info!("Environment variables loaded from .env file"),
        Err(e) => warn!("Failed to load .env file: {}", e),
    };

    // Initialize logging
    env_logger::init();

    let config = match AuthConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };

    let user_id: u64 = match env::args().nth(1).map(|a| a.parse()) {
        Some(Ok(id)) => id,
        _ => {
            eprintln!("usage: authz_demo <user-id> [display-name] [role...]");
            process::exit(2);
        }
    };
    let display_name = env::args().nth(2).unwrap_or_else(|| format!("user-{}", user_id));
    let roles: Vec<String> = env::args().skip(3).collect();

    let manager = match AuthManager::new(config, None) {
        Ok(manager) => manager,
        Err(e) => {
            error!("Failed to build auth manager: {}", e);
            process::exit(1);
        }
    };

    let issued = manager.issue_token(user_id, &display_name, &roles, &Attributes::new());
    let (access, refresh) = match issued {
        Ok(pair) => pair,
        Err(e) => {
            error!("Failed to issue token: {}", e);
            process::exit(1);
        }
    };

    println!("access_token:  {}", access);
    println!("refresh_token: {}", refresh);

    match manager.validate_token(&access) {
        Ok(principal) => println!(
            "validated: user_id={} display_name={} roles={:?}",
            principal.user_id, principal.display_name, principal.roles
        ),
        Err(e) => {
            error!("Freshly issued token failed validation: {}", e);
            process::exit(1);
        }
    }
}
