//! Interactive REPL.

use crate::commands::{
    format_greeting, format_tuples, parse_identifier, parse_key, parse_ops, parse_tuple,
};
use colored::Colorize;
use iproto_client::{Client, SelectOptions};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};

const HELP_TEXT: &str = r#"
Available commands:
  help                                   Show this help
  ping                                   Ping the server
  greeting                               Show the server greeting

  select <space> [index] [key] [iter] [limit]  Select tuples
  insert <space> <tuple>                 Insert a tuple
  replace <space> <tuple>                Insert or replace a tuple
  delete <space> <key>                   Delete a tuple by primary key
  update <space> <index> <key> <ops>     Update a tuple
  upsert <space> <key> <ops> <tuple>     Update or insert a tuple

  call <function> [args]                 Call a stored procedure
  eval <expression>                      Evaluate an expression

  cache                                  Show cached space/index ids
  clear-cache                            Forget cached space/index ids

  quit, exit                             Exit the REPL

Keys, tuples and operators are JSON, e.g.
  update tester 0 1 [["=",2,"Roxette"]]
"#;

pub async fn run(mut client: Client) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "iproto CLI".bold().cyan());
    println!("Connecting to {}...", client.connection().config().pool_key());

    client.connect().await?;
    match client.connection().server_version() {
        Some(version) => println!("{} (server {})", "Connected!".green(), version),
        None => println!("{}", "Connected!".green()),
    }

    let config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .build();
    let mut rl: Editor<(), DefaultHistory> = Editor::with_config(config)?;

    let history_path = std::env::var("HOME")
        .map(|h| std::path::PathBuf::from(h).join(".iproto_history"))
        .unwrap_or_else(|_| ".iproto_history".into());
    let _ = rl.load_history(&history_path);

    println!("Type 'help' for available commands.\n");

    loop {
        let prompt = format!("{} ", "iproto>".cyan());
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match execute_repl_command(&mut client, line).await {
                    Ok(Some(output)) => println!("{}\n", output),
                    Ok(None) => break,
                    Err(e) => println!("{}: {}\n", "Error".red(), e),
                }

                if !client.is_connected() {
                    println!("{}", "Connection lost, reconnecting...".yellow());
                    if let Err(e) = client.connect().await {
                        println!("{}: {}", "Reconnect failed".red(), e);
                        break;
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                println!("{}: {:?}", "Error".red(), err);
                break;
            }
        }
    }

    let _ = rl.save_history(&history_path);

    client.disconnect().await;
    println!("{}", "Disconnected.".dimmed());

    Ok(())
}

/// Splits a line on whitespace, keeping JSON brackets and quoted strings
/// together as one argument.
fn split_args(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for c in line.chars() {
        if in_string {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                current.push(c);
            }
            '[' | '{' => {
                depth += 1;
                current.push(c);
            }
            ']' | '}' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            c if c.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        args.push(current);
    }
    args
}

async fn execute_repl_command(
    client: &mut Client,
    line: &str,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let (cmd, rest) = match line.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (cmd.to_lowercase(), rest.trim()),
        None => (line.to_lowercase(), ""),
    };
    let args = split_args(rest);

    match cmd.as_str() {
        "help" | "?" => Ok(Some(HELP_TEXT.to_string())),

        "quit" | "exit" | "q" => Ok(None),

        "ping" => {
            let token = client.ping().await?;
            Ok(Some(token.green().to_string()))
        }

        "greeting" => Ok(Some(format_greeting(client))),

        "select" | "s" => {
            if args.is_empty() {
                return Ok(Some(
                    "Usage: select <space> [index] [key] [iterator] [limit]".to_string(),
                ));
            }
            let index = args.get(1).map_or("0", String::as_str);
            let key = parse_key(args.get(2).map(String::as_str))?;
            let mut options = SelectOptions::new();
            if let Some(iterator) = args.get(3) {
                options = options.iterator_name(iterator);
            }
            if let Some(limit) = args.get(4) {
                options = options.limit(limit.parse()?);
            }

            let tuples = client
                .select(parse_identifier(&args[0]), parse_identifier(index), key, options)
                .await?;
            Ok(Some(format_tuples(&tuples)))
        }

        "insert" | "i" | "replace" | "r" => {
            if args.len() < 2 {
                return Ok(Some(format!("Usage: {} <space> <tuple_json>", cmd)));
            }
            let space = parse_identifier(&args[0]);
            let tuple = parse_tuple(&args[1..].join(" "))?;
            let result = if cmd.starts_with('i') {
                client.insert(space, tuple).await?
            } else {
                client.replace(space, tuple).await?
            };
            Ok(Some(format_tuples(&result)))
        }

        "delete" | "d" => {
            if args.len() < 2 {
                return Ok(Some("Usage: delete <space> <key>".to_string()));
            }
            let key = parse_key(Some(args[1].as_str()))?;
            let result = client.delete(parse_identifier(&args[0]), key).await?;
            Ok(Some(format_tuples(&result)))
        }

        "update" | "u" => {
            if args.len() < 4 {
                return Ok(Some(
                    "Usage: update <space> <index> <key> <ops_json>".to_string(),
                ));
            }
            let key = parse_key(Some(args[2].as_str()))?;
            let ops = parse_ops(&args[3])?;
            let result = client
                .update(
                    parse_identifier(&args[0]),
                    parse_identifier(&args[1]),
                    key,
                    &ops,
                )
                .await?;
            Ok(Some(format_tuples(&result)))
        }

        "upsert" => {
            if args.len() < 4 {
                return Ok(Some(
                    "Usage: upsert <space> <key> <ops_json> <tuple_json>".to_string(),
                ));
            }
            let key = parse_key(Some(args[1].as_str()))?;
            let ops = parse_ops(&args[2])?;
            let tuple = parse_tuple(&args[3])?;
            client
                .upsert(parse_identifier(&args[0]), key, &ops, tuple)
                .await?;
            Ok(Some("OK".green().to_string()))
        }

        "call" => {
            if args.is_empty() {
                return Ok(Some("Usage: call <function> [args_json]".to_string()));
            }
            let call_args = match args.get(1) {
                Some(arg) => parse_tuple(arg)?,
                None => Vec::new(),
            };
            let result = client.call(&args[0], call_args).await?;
            Ok(Some(format_tuples(&result)))
        }

        "eval" => {
            if rest.is_empty() {
                return Ok(Some("Usage: eval <expression>".to_string()));
            }
            let result = client.eval(rest, Vec::new()).await?;
            Ok(Some(format_tuples(&result)))
        }

        "cache" => {
            let schema = client.connection().schema();
            Ok(Some(format!(
                "Spaces: {}\nIndexes: {}",
                schema.space_count().to_string().cyan(),
                schema.index_count().to_string().cyan()
            )))
        }

        "clear-cache" => {
            client.connection_mut().clear_schema();
            Ok(Some("Cache cleared".green().to_string()))
        }

        _ => Ok(Some(format!(
            "Unknown command: {}. Type 'help' for help.",
            cmd
        ))),
    }
}
