//! Command execution
//!
//! Each command returns the process exit status; errors that should abort with
//! a message are returned as `anyhow` errors instead.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use claims_gateway::{DispatchError, Gateway, LogicalRequest, Outcome, SessionError};
use reqwest::Method;
use tracing::info;

use crate::config::read_password;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_REAUTH: u8 = 2;
pub const EXIT_TRANSPORT: u8 = 3;

pub async fn login(
    gateway: &Gateway,
    username: &str,
    password_file: Option<&Path>,
) -> Result<u8> {
    let password = read_password(password_file)?;
    match gateway.login(username, &password).await {
        Ok(role) => {
            match role {
                Some(role) => println!("logged in as {username} ({role})"),
                None => println!("logged in as {username}"),
            }
            Ok(EXIT_SUCCESS)
        }
        Err(SessionError::Login(e)) => {
            eprintln!("login failed: {e}");
            Ok(EXIT_FAILURE)
        }
        Err(e) => Err(e).context("saving session"),
    }
}

pub async fn logout(gateway: &Gateway) -> Result<u8> {
    gateway.logout().await.context("clearing session")?;
    println!("logged out");
    Ok(EXIT_SUCCESS)
}

pub async fn status(gateway: &Gateway) -> Result<u8> {
    let session = gateway.session().await;
    println!(
        "{} (session file: {})",
        session.label(),
        gateway.session_path().display()
    );
    Ok(EXIT_SUCCESS)
}

/// Send one request and write the response body to `out`.
pub async fn request(
    gateway: &Gateway,
    method: Method,
    path: &str,
    body: Option<serde_json::Value>,
    out: &mut impl Write,
) -> Result<u8> {
    let mut logical = LogicalRequest::new(method, path);
    if let Some(body) = body {
        logical = logical.json(body);
    }

    let outcome = match gateway.dispatch(&logical).await {
        Ok(outcome) => outcome,
        Err(DispatchError::Transport(e)) => {
            eprintln!("request failed: {e}");
            return Ok(EXIT_TRANSPORT);
        }
        Err(e) => return Err(e.into()),
    };

    let response = outcome.response();
    info!(status = response.status.as_u16(), outcome = outcome.label(), "request complete");
    out.write_all(&response.body).context("writing response body")?;
    if !response.body.is_empty() {
        writeln!(out).context("writing response body")?;
    }

    Ok(match outcome {
        Outcome::Success(_) => EXIT_SUCCESS,
        Outcome::Failure(r) => {
            eprintln!("request failed with status {}", r.status);
            EXIT_FAILURE
        }
        Outcome::ReauthRequired(_) => {
            eprintln!("session expired, please log in again");
            EXIT_REAUTH
        }
    })
}
