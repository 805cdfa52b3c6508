//! Line protocol parsing and dispatch.
//!
//! # Responsibility
//! - Decode one input line into exactly one service call.
//! - Render results as one output line.
//!
//! # Invariants
//! - Every storage error becomes a generic `error: ...` line.
//! - A delete that matched nothing has its own response, distinct from errors.

use textstore_core::{ConnectionTarget, DeleteOutcome, Record, RecordId, RecordService};

pub const NOTHING_DELETED: &str = "No matching document found and deleted";
pub const TARGET_SET: &str = "Successfully set the connection data";

/// One decoded request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Databases,
    Collections(String),
    Target(ConnectionTarget),
    Create(Record),
    Get(RecordId),
    Update(Record),
    Delete(RecordId),
    Quit,
}

/// Parses one request line. Returns `Ok(None)` for blank lines.
pub fn parse_line(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "databases" => Command::Databases,
        "collections" => Command::Collections(rest.to_string()),
        "target" => Command::Target(decode_json(rest, "connection target")?),
        "create" => Command::Create(decode_json(rest, "record")?),
        "get" => Command::Get(parse_id(rest)?),
        "update" => Command::Update(decode_json(rest, "record")?),
        "delete" => Command::Delete(parse_id(rest)?),
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command `{other}`")),
    };
    Ok(Some(command))
}

/// Runs `command` against `service` and renders the response line.
pub async fn dispatch(service: &RecordService, command: Command) -> String {
    let rendered = match command {
        Command::Databases => service.list_databases().await.map(|names| to_json(&names)),
        Command::Collections(database) => service
            .list_collections(&database)
            .await
            .map(|names| to_json(&names)),
        Command::Target(target) => service
            .set_target(target)
            .await
            .map(|()| TARGET_SET.to_string()),
        Command::Create(record) => service.create(&record).await.map(|id| to_json(&id)),
        Command::Get(id) => service.get(id).await.map(|record| to_json(&record)),
        Command::Update(record) => service.update(&record).await.map(|record| to_json(&record)),
        Command::Delete(id) => service.delete(id).await.map(|outcome| match outcome {
            DeleteOutcome::Deleted => "deleted".to_string(),
            DeleteOutcome::NothingToDelete => NOTHING_DELETED.to_string(),
        }),
        Command::Quit => Ok(String::new()),
    };

    rendered.unwrap_or_else(|err| format!("error: {err}"))
}

fn decode_json<T: serde::de::DeserializeOwned>(raw: &str, what: &str) -> Result<T, String> {
    if raw.is_empty() {
        return Err(format!("missing {what} body"));
    }
    serde_json::from_str(raw).map_err(|err| format!("malformed {what}: {err}"))
}

fn parse_id(raw: &str) -> Result<RecordId, String> {
    raw.parse::<RecordId>()
        .map_err(|err| format!("invalid id `{raw}`: {err}"))
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|err| format!("error: {err}"))
}

#[cfg(test)]
mod tests {
    use super::{dispatch, parse_line, Command, NOTHING_DELETED, TARGET_SET};
    use std::sync::Arc;
    use textstore_core::db::open_store_in_memory;
    use textstore_core::{ConnectionTarget, Record, RecordService, RelationalFileBackend};

    #[test]
    fn parses_every_verb() {
        assert_eq!(parse_line("databases").unwrap(), Some(Command::Databases));
        assert_eq!(
            parse_line("collections main").unwrap(),
            Some(Command::Collections("main".to_string()))
        );
        assert_eq!(
            parse_line(r#"target {"database":"main","collection":"notes"}"#).unwrap(),
            Some(Command::Target(ConnectionTarget::new("main", "notes")))
        );
        assert_eq!(
            parse_line(r#"create {"title":"t1","text":"hello"}"#).unwrap(),
            Some(Command::Create(Record::new("t1", "hello")))
        );
        assert_eq!(parse_line("GET 3").unwrap(), Some(Command::Get(3)));
        assert_eq!(parse_line("delete 3").unwrap(), Some(Command::Delete(3)));
        assert_eq!(parse_line("quit").unwrap(), Some(Command::Quit));
        assert_eq!(parse_line("   ").unwrap(), None);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_line("get one").unwrap_err().contains("invalid id"));
        assert!(parse_line("create").unwrap_err().contains("missing record"));
        assert!(parse_line("create {title}").unwrap_err().contains("malformed record"));
        assert!(parse_line("drop all").unwrap_err().contains("unknown command"));
    }

    #[tokio::test]
    async fn dispatch_renders_scenario() {
        let backend = RelationalFileBackend::from_connection(open_store_in_memory().unwrap());
        let service = RecordService::new(Arc::new(backend));

        let gated = dispatch(&service, Command::Get(1)).await;
        assert!(gated.starts_with("error: operation not supported"));

        let set = dispatch(
            &service,
            Command::Target(ConnectionTarget::new("", "textfiles")),
        )
        .await;
        assert_eq!(set, TARGET_SET);

        assert_eq!(
            dispatch(&service, Command::Create(Record::new("t1", "hello"))).await,
            "1"
        );
        assert_eq!(
            dispatch(&service, Command::Get(1)).await,
            r#"{"id":1,"title":"t1","text":"hello"}"#
        );
        assert_eq!(
            dispatch(&service, Command::Update(Record::with_id(1, "t1", "world"))).await,
            r#"{"id":1,"title":"t1","text":"world"}"#
        );
        assert_eq!(dispatch(&service, Command::Delete(1)).await, "deleted");
        assert_eq!(dispatch(&service, Command::Delete(1)).await, NOTHING_DELETED);
        assert_eq!(
            dispatch(&service, Command::Get(1)).await,
            "error: no record with id 1"
        );
        assert!(dispatch(&service, Command::Databases)
            .await
            .starts_with("error: operation not supported"));
    }
}
