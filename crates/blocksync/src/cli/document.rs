//! Document commands.

use std::future::Future;
use std::io::Read;

use blocksync_core::config::Config;
use blocksync_core::error::Result;
use blocksync_core::schema::AppendBlockRequest;
use blocksync_core::service::{CreateDocument, DocService};
use blocksync_core::transport::SocketIoConnector;

use crate::cli::args::Commands;
use crate::cli::print_json;

type CliService = DocService<SocketIoConnector>;

/// Handle every command that talks to the sync server.
pub fn handle_document_command(command: Commands, workspace_override: Option<String>) -> Result<()> {
    let service = open_service(workspace_override)?;

    match command {
        Commands::Create {
            title,
            content,
            tags,
        } => {
            let mut input = CreateDocument::titled(title).with_tags(tags);
            input.content = content;
            let created = block_on(service.create_document(input))??;
            print_json(&created)
        }

        Commands::Append { request, lenient } => {
            let mut request = parse_request(request)?;
            if lenient && request.strict.is_none() {
                request.strict = Some(false);
            }
            let appended = block_on(service.append_block(request))??;
            print_json(&appended)
        }

        Commands::Read { doc_id, markdown } => {
            let view = block_on(service.read_document(&doc_id))??;
            if markdown {
                print!("{}", view.to_markdown());
                Ok(())
            } else {
                print_json(&view)
            }
        }

        Commands::Delete { doc_id } => {
            let deleted = block_on(service.delete_document(&doc_id))??;
            print_json(&deleted)
        }

        Commands::List => {
            let pages = block_on(service.list_documents())??;
            print_json(&pages)
        }

        // Dispatched in `run_cli`.
        Commands::Config { .. } => Ok(()),
    }
}

fn open_service(workspace_override: Option<String>) -> Result<CliService> {
    let config = Config::load()?;
    let connector = SocketIoConnector::from_config(&config)?;
    let workspace_id = match workspace_override {
        Some(id) => id,
        None => config.require_workspace()?,
    };
    log::debug!("Using {connector:?} for workspace {workspace_id}");
    Ok(DocService::new(connector, workspace_id))
}

/// Read the append request from the argument, or stdin for `-`/nothing.
fn parse_request(raw: Option<String>) -> Result<AppendBlockRequest> {
    let raw = match raw.filter(|r| r != "-") {
        Some(raw) => raw,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    Ok(serde_json::from_str(&raw)?)
}

/// Run a future on a fresh current-thread runtime.
fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request_from_argument() {
        let request = parse_request(Some(
            r#"{"docId": "d1", "type": "todo", "text": "ship", "checked": true}"#.to_string(),
        ))
        .unwrap();
        assert_eq!(request.doc_id, "d1");
        assert_eq!(request.block_type, "todo");
        assert_eq!(request.fields.checked, Some(true));
    }

    #[test]
    fn test_parse_request_rejects_bad_json() {
        let err = parse_request(Some("{".to_string())).unwrap_err();
        assert!(err.is_validation());
    }
}
