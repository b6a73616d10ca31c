//! Per-connection auth handshake and statement dispatch (spec §4.7, §4.8).

use std::sync::Arc;

use anyhow::Result;
use basicsql_auth::AuthStore;
use basicsql_engine::{Engine, Session, SqlResult};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info};

pub async fn handle(mut socket: TcpStream, engine: Arc<Engine>, auth: Arc<AuthStore>) -> Result<()> {
    let (reader, mut writer) = socket.split();
    let mut reader = BufReader::new(reader);

    writer.write_all(b"AUTH_REQUIRED\n").await?;

    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(());
    }

    let Some(username) = parse_auth(line.trim_end()) else {
        writer.write_all(b"ERROR: Unauthenticated\n\n").await?;
        return Ok(());
    };
    let (username, password) = username;

    if !auth.verify(&username, &password) {
        let reply = "AUTH_FAILED invalid credentials\n";
        writer.write_all(reply.as_bytes()).await?;
        return Ok(());
    }

    writer.write_all(b"AUTH_SUCCESS\n").await?;
    let mut session = Session::new();
    session.authenticate(username);
    info!(user = session.user().unwrap_or(""), "session authenticated");

    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            break;
        }
        let statement = line.trim_end();
        if statement.is_empty() {
            continue;
        }
        if !session.is_authenticated() {
            writer.write_all(b"ERROR: Unauthenticated\n\n").await?;
            continue;
        }

        debug!(user = session.user().unwrap_or(""), database = session.database(), statement, "executing statement");
        let result = engine.execute(&mut session, statement);
        let response = render(&result);
        writer.write_all(response.as_bytes()).await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Parse `AUTH <username> <password>`; any other line is an unauthenticated
/// protocol violation (spec §4.7).
fn parse_auth(line: &str) -> Option<(String, String)> {
    let mut parts = line.splitn(3, ' ');
    if parts.next()? != "AUTH" {
        return None;
    }
    let username = parts.next()?.to_string();
    let password = parts.next()?.to_string();
    Some((username, password))
}

/// Render a `SqlResult` into the wire response shape (spec §4.8): zero or
/// more content lines followed by one empty terminator line.
fn render(result: &SqlResult) -> String {
    match result {
        SqlResult::Rows { columns, rows } => {
            let mut out = format!("Columns: {}\n", columns.join(","));
            for row in rows {
                let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
                out.push_str(&cells.join(","));
                out.push('\n');
            }
            out.push('\n');
            out
        }
        SqlResult::Mutation { rows_affected, generated } => {
            let mut out = format!("OK {rows_affected} row(s)\n");
            if let Some((column, value)) = generated {
                out.push_str(&format!("Generated: {column}={value}\n"));
            }
            out.push('\n');
            out
        }
        SqlResult::Tables(names) => format!("Tables: {}\n\n", names.join(",")),
        SqlResult::Databases(names) => format!("Databases: {}\n\n", names.join(",")),
        SqlResult::Ok => "OK\n\n".to_string(),
        SqlResult::Error(message) => format!("ERROR: {message}\n\n"),
    }
}
