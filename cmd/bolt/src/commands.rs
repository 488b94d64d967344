//! Subcommands. Path segments and values are taken as UTF-8 arguments.

use std::ops::ControlFlow;

use clap::{Args, Subcommand};
use giztoy_bolt::{BoltError, Db};
use serde::Serialize;

/// One scanned entry, as printed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub bucket: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a bucket and any missing parents
    Mkbucket {
        /// Bucket path
        #[arg(required = true)]
        path: Vec<String>,
    },
    /// Store a value: bolt set <bucket>... <key> <value>
    Set {
        #[arg(required = true, num_args = 3..)]
        args: Vec<String>,
    },
    /// Print a value
    Get {
        /// Key path (at least a bucket and a key)
        #[arg(required = true, num_args = 2..)]
        path: Vec<String>,
    },
    /// Delete a bucket or a key
    Del {
        #[arg(required = true)]
        path: Vec<String>,
    },
    /// List buckets and keys under a bucket
    Scan(ScanArgs),
    /// List top-level buckets
    Buckets,
}

#[derive(Args)]
pub struct ScanArgs {
    /// Bucket path
    #[arg(required = true)]
    path: Vec<String>,

    /// Only names starting with this prefix
    #[arg(long, short = 'p', default_value = "")]
    prefix: String,

    /// Stop after this many entries
    #[arg(long, short = 'n')]
    limit: Option<usize>,
}

/// What a command produced.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Done,
    Value(Option<String>),
    Items(Vec<Item>),
}

impl Commands {
    pub fn run(&self, db: &Db) -> Result<Outcome, BoltError> {
        match self {
            Commands::Mkbucket { path } => {
                db.update(|tx| tx.create_bucket(path))?;
                Ok(Outcome::Done)
            }
            Commands::Set { args } => {
                let (value, path) = args.split_last().ok_or(BoltError::KeyRequired)?;
                db.update(|tx| tx.set(path, value.as_bytes()))?;
                Ok(Outcome::Done)
            }
            Commands::Get { path } => {
                let value = db.view(|tx| tx.get(path))?;
                Ok(Outcome::Value(value.map(|v| lossy(&v))))
            }
            Commands::Del { path } => {
                db.update(|tx| tx.delete(path))?;
                Ok(Outcome::Done)
            }
            Commands::Scan(args) => scan(db, &args.path, args.prefix.as_bytes(), args.limit),
            Commands::Buckets => {
                let root: [&str; 0] = [];
                scan(db, &root, b"", None)
            }
        }
    }
}

fn scan<P: AsRef<[u8]>>(
    db: &Db,
    path: &[P],
    prefix: &[u8],
    limit: Option<usize>,
) -> Result<Outcome, BoltError> {
    let limit = limit.unwrap_or(usize::MAX);
    let mut items = Vec::new();
    if limit > 0 {
        db.view(|tx| {
            tx.scan(path, prefix, |name, value, bucket| {
                items.push(Item {
                    name: lossy(name),
                    value: value.map(lossy),
                    bucket,
                });
                if items.len() >= limit {
                    Ok(ControlFlow::Break(()))
                } else {
                    Ok(ControlFlow::Continue(()))
                }
            })
        })?;
    }
    Ok(Outcome::Items(items))
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Render an outcome for the terminal.
pub fn render(outcome: &Outcome, json: bool) -> anyhow::Result<Option<String>> {
    let text = match (outcome, json) {
        (Outcome::Done, _) => return Ok(None),
        (Outcome::Value(value), true) => serde_json::to_string(value)?,
        (Outcome::Value(value), false) => value.clone().unwrap_or_else(|| "(nil)".to_string()),
        (Outcome::Items(items), true) => serde_json::to_string_pretty(items)?,
        (Outcome::Items(items), false) => items
            .iter()
            .map(|item| match &item.value {
                _ if item.bucket => format!("{}/", item.name),
                Some(value) => format!("{}\t{}", item.name, value),
                None => item.name.clone(),
            })
            .collect::<Vec<_>>()
            .join("\n"),
    };
    Ok(Some(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(segs: &[&str]) -> Vec<String> {
        segs.iter().map(|s| s.to_string()).collect()
    }

    fn seeded() -> Db {
        let db = Db::memory().unwrap();
        for cmd in [
            Commands::Set { args: strings(&["users", "alice", "A1"]) },
            Commands::Set { args: strings(&["users", "bob", "B1"]) },
            Commands::Mkbucket { path: strings(&["users", "admins"]) },
        ] {
            assert_eq!(cmd.run(&db).unwrap(), Outcome::Done);
        }
        db
    }

    fn item(name: &str, value: Option<&str>, bucket: bool) -> Item {
        Item {
            name: name.to_string(),
            value: value.map(str::to_string),
            bucket,
        }
    }

    #[test]
    fn test_get() {
        let db = seeded();
        let cmd = Commands::Get { path: strings(&["users", "alice"]) };
        assert_eq!(cmd.run(&db).unwrap(), Outcome::Value(Some("A1".to_string())));

        let cmd = Commands::Get { path: strings(&["users", "carol"]) };
        assert_eq!(cmd.run(&db).unwrap(), Outcome::Value(None));
    }

    #[test]
    fn test_scan_with_limit() {
        let db = seeded();
        let cmd = Commands::Scan(ScanArgs {
            path: strings(&["users"]),
            prefix: String::new(),
            limit: Some(2),
        });
        assert_eq!(
            cmd.run(&db).unwrap(),
            Outcome::Items(vec![item("admins", None, true), item("alice", Some("A1"), false)])
        );
    }

    #[test]
    fn test_buckets_and_delete() {
        let db = seeded();
        assert_eq!(
            Commands::Buckets.run(&db).unwrap(),
            Outcome::Items(vec![item("users", None, true)])
        );

        Commands::Del { path: strings(&["users"]) }.run(&db).unwrap();
        assert_eq!(Commands::Buckets.run(&db).unwrap(), Outcome::Items(vec![]));
    }

    #[test]
    fn test_render() {
        let items = Outcome::Items(vec![item("admins", None, true), item("alice", Some("A1"), false)]);
        assert_eq!(
            render(&items, false).unwrap(),
            Some("admins/\nalice\tA1".to_string())
        );
        assert_eq!(
            render(&Outcome::Value(None), false).unwrap(),
            Some("(nil)".to_string())
        );
        assert_eq!(render(&Outcome::Value(None), true).unwrap(), Some("null".to_string()));
        assert_eq!(render(&Outcome::Done, true).unwrap(), None);
    }
}
