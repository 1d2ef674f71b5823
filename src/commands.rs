//! Command execution.

use crate::Commands;
use colored::Colorize;
use iproto_client::{Client, Identifier, Key, SelectOptions, UpdateOp, Value};
use std::error::Error;

/// Executes a command and returns the formatted output.
pub async fn execute(client: &mut Client, cmd: Commands) -> Result<String, Box<dyn Error>> {
    match cmd {
        Commands::Repl => unreachable!(),

        Commands::Ping => {
            let token = client.ping().await?;
            Ok(token.green().to_string())
        }

        Commands::Greeting => Ok(format_greeting(client)),

        Commands::Select {
            space,
            index,
            key,
            limit,
            offset,
            iterator,
        } => {
            let mut options = SelectOptions::new().offset(offset).iterator_name(&iterator);
            if let Some(limit) = limit {
                options = options.limit(limit);
            }
            let key = parse_key(key.as_deref())?;
            let tuples = client
                .select(parse_identifier(&space), parse_identifier(&index), key, options)
                .await?;
            Ok(format_tuples(&tuples))
        }

        Commands::Insert { space, tuple } => {
            let tuple = parse_tuple(&tuple)?;
            let result = client.insert(parse_identifier(&space), tuple).await?;
            Ok(format_tuples(&result))
        }

        Commands::Replace { space, tuple } => {
            let tuple = parse_tuple(&tuple)?;
            let result = client.replace(parse_identifier(&space), tuple).await?;
            Ok(format_tuples(&result))
        }

        Commands::Delete { space, key } => {
            let key = parse_key(Some(key.as_str()))?;
            let result = client.delete(parse_identifier(&space), key).await?;
            Ok(format_tuples(&result))
        }

        Commands::Update {
            space,
            index,
            key,
            ops,
        } => {
            let key = parse_key(Some(key.as_str()))?;
            let ops = parse_ops(&ops)?;
            let result = client
                .update(parse_identifier(&space), parse_identifier(&index), key, &ops)
                .await?;
            Ok(format_tuples(&result))
        }

        Commands::Upsert {
            space,
            key,
            ops,
            tuple,
        } => {
            let key = parse_key(Some(key.as_str()))?;
            let ops = parse_ops(&ops)?;
            let tuple = parse_tuple(&tuple)?;
            client
                .upsert(parse_identifier(&space), key, &ops, tuple)
                .await?;
            Ok("OK".green().to_string())
        }

        Commands::Call { function, args } => {
            let args = parse_args(args.as_deref())?;
            let result = client.call(&function, args).await?;
            Ok(format_tuples(&result))
        }

        Commands::Eval { expression, args } => {
            let args = parse_args(args.as_deref())?;
            let result = client.eval(&expression, args).await?;
            Ok(format_tuples(&result))
        }
    }
}

/// Reads a space or index argument: digits are an id, anything else a name.
pub fn parse_identifier(arg: &str) -> Identifier {
    match arg.parse::<u32>() {
        Ok(id) => Identifier::Id(id),
        Err(_) => Identifier::Name(arg.to_string()),
    }
}

/// Parses a JSON argument (either inline JSON or @file.json).
pub fn parse_json_arg(arg: &str) -> Result<Value, Box<dyn Error>> {
    let json: serde_json::Value = if let Some(path) = arg.strip_prefix('@') {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)?
    } else {
        serde_json::from_str(arg)?
    };
    Ok(rmpv::ext::to_value(json)?)
}

/// Parses a key: absent means empty, a JSON array is composite, anything
/// else is a single part. Bare words are taken as strings.
pub fn parse_key(arg: Option<&str>) -> Result<Key, Box<dyn Error>> {
    let Some(arg) = arg else {
        return Ok(Key::Empty);
    };
    match parse_json_arg(arg) {
        Ok(value) => Ok(Key::from(value)),
        Err(_) if !arg.starts_with(['[', '{', '"', '@']) => Ok(Key::from(arg)),
        Err(e) => Err(e),
    }
}

/// Parses a tuple given as a JSON array.
pub fn parse_tuple(arg: &str) -> Result<Vec<Value>, Box<dyn Error>> {
    match parse_json_arg(arg)? {
        Value::Array(fields) => Ok(fields),
        _ => Err("tuple must be a JSON array".into()),
    }
}

fn parse_args(arg: Option<&str>) -> Result<Vec<Value>, Box<dyn Error>> {
    match arg {
        Some(arg) => parse_tuple(arg),
        None => Ok(Vec::new()),
    }
}

/// Parses operators given as `[["=", 2, "x"], ["+", 3, 1]]`.
pub fn parse_ops(arg: &str) -> Result<Vec<UpdateOp>, Box<dyn Error>> {
    let Value::Array(entries) = parse_json_arg(arg)? else {
        return Err("operators must be a JSON array".into());
    };

    entries
        .into_iter()
        .map(|entry| -> Result<UpdateOp, Box<dyn Error>> {
            let Value::Array(mut parts) = entry else {
                return Err("each operator must be an array".into());
            };
            if parts.len() < 3 {
                return Err("each operator needs an operator, a field and a value".into());
            }
            let args = parts.split_off(2);
            let operator = parts[0]
                .as_str()
                .ok_or("operator must be a string")?
                .to_string();
            let field = parts[1].as_i64().ok_or("field must be an integer")?;
            Ok(UpdateOp::with_args(operator, field, args))
        })
        .collect()
}

/// Formats result tuples as JSON, one tuple per line.
pub fn format_tuples(tuples: &[Value]) -> String {
    if tuples.is_empty() {
        return "No tuples".yellow().to_string();
    }
    tuples
        .iter()
        .map(|tuple| serde_json::to_string(tuple).unwrap_or_else(|_| tuple.to_string()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_greeting(client: &Client) -> String {
    let conn = client.connection();
    let Some(greeting) = conn.greeting() else {
        return "No greeting received".yellow().to_string();
    };
    format!(
        "{}\n  Version: {}\n  Protocol: {}\n  Salt: {}\n  State: {:?}",
        greeting.line().bold(),
        conn.server_version().unwrap_or("?").cyan(),
        greeting.protocol().unwrap_or("?"),
        hex::encode(greeting.salt()),
        conn.state()
    )
}
