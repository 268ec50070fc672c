//! Command runner.
//!
//! Each invocation performs one chat operation against the configured store
//! and prints the result as JSON on stdout.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use super::AppState;

pub const USAGE: &str = "\
usage: murmur <command>

commands:
  initialize                           reset to seed data and rebuild the channel cache
  channels                             list channels with cached message counts
  channel <channel_id>                 show one channel's description beside the channel list
  add-channel <name> <description>     create a channel
  post <channel_id> <user_id> <text>   post a message
  fetch <user_id> <channel_id> <last>  fetch messages after <last> and mark them read
  unread <user_id>                     unread counts per channel
  history <channel_id> <page>          one page of channel history";

/// An operation requested on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Initialize,
    Channels,
    Channel {
        channel_id: i64,
    },
    AddChannel {
        name: String,
        description: String,
    },
    Post {
        channel_id: i64,
        user_id: i64,
        content: String,
    },
    Fetch {
        user_id: i64,
        channel_id: i64,
        last_message_id: i64,
    },
    Unread {
        user_id: i64,
    },
    History {
        channel_id: i64,
        page: i64,
    },
}

impl Command {
    /// Parse arguments (without the program name).
    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let name = args.next().context(USAGE)?;
        let rest: Vec<String> = args.collect();

        let command = match (name.as_str(), rest.as_slice()) {
            ("initialize", []) => Self::Initialize,
            ("channels", []) => Self::Channels,
            ("channel", [channel_id]) => Self::Channel {
                channel_id: parse_id("channel_id", channel_id)?,
            },
            ("add-channel", [name, description]) => Self::AddChannel {
                name: name.clone(),
                description: description.clone(),
            },
            ("post", [channel_id, user_id, words @ ..]) if !words.is_empty() => Self::Post {
                channel_id: parse_id("channel_id", channel_id)?,
                user_id: parse_id("user_id", user_id)?,
                content: words.join(" "),
            },
            ("fetch", [user_id, channel_id, last]) => Self::Fetch {
                user_id: parse_id("user_id", user_id)?,
                channel_id: parse_id("channel_id", channel_id)?,
                last_message_id: parse_id("last_message_id", last)?,
            },
            ("unread", [user_id]) => Self::Unread {
                user_id: parse_id("user_id", user_id)?,
            },
            ("history", [channel_id, page]) => Self::History {
                channel_id: parse_id("channel_id", channel_id)?,
                page: parse_id("page", page)?,
            },
            _ => bail!("unrecognized command '{name}'\n\n{USAGE}"),
        };

        Ok(command)
    }
}

fn parse_id(field: &str, raw: &str) -> Result<i64> {
    raw.parse()
        .with_context(|| format!("{field} must be an integer, got '{raw}'"))
}

/// Cached channels, ordered by ID, in display form.
fn channel_list(state: &AppState) -> Vec<serde_json::Value> {
    state
        .chat
        .list_channels()
        .into_iter()
        .map(|c| {
            json!({
                "id": c.id,
                "name": c.name,
                "description": c.description,
                "message_count": c.message_count,
            })
        })
        .collect()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run one command.
///
/// The channel cache is warmed first, as a long-running service would at
/// startup, except for `initialize` which rebuilds it itself.
pub async fn run(state: &AppState, command: Command) -> Result<()> {
    let chat = &state.chat;

    if command != Command::Initialize {
        chat.warm_up().await?;
    }

    match command {
        Command::Initialize => {
            let channels = chat.initialize().await?;
            info!("Initialized with {} channels", channels);
            print_json(&json!({ "channels": channels }))
        }
        Command::Channels => print_json(&channel_list(state)),
        Command::Channel { channel_id } => {
            let description = chat.channel_description(channel_id).unwrap_or_default();
            print_json(&json!({
                "channel_id": channel_id,
                "description": description,
                "channels": channel_list(state),
            }))
        }
        Command::AddChannel { name, description } => {
            let record = chat.add_channel(&name, &description).await?;
            print_json(&json!({ "id": record.id, "name": record.name }))
        }
        Command::Post {
            channel_id,
            user_id,
            content,
        } => {
            let id = chat.post_message(channel_id, user_id, &content).await?;
            print_json(&json!({ "id": id, "channel_id": channel_id }))
        }
        Command::Fetch {
            user_id,
            channel_id,
            last_message_id,
        } => {
            let messages = chat
                .fetch_messages(user_id, channel_id, last_message_id)
                .await?;
            print_json(&messages)
        }
        Command::Unread { user_id } => print_json(&chat.fetch_unread(user_id).await?),
        Command::History { channel_id, page } => print_json(&chat.history(channel_id, page).await?),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::Config;
    use crate::database::{ChannelRecord, InMemoryStore};

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse(args("initialize")).unwrap(), Command::Initialize);
        assert_eq!(
            Command::parse(args("post 3 7 hello there")).unwrap(),
            Command::Post {
                channel_id: 3,
                user_id: 7,
                content: "hello there".to_string(),
            }
        );
        assert_eq!(
            Command::parse(args("fetch 7 3 0")).unwrap(),
            Command::Fetch {
                user_id: 7,
                channel_id: 3,
                last_message_id: 0,
            }
        );
        assert_eq!(
            Command::parse(args("channel 4")).unwrap(),
            Command::Channel { channel_id: 4 }
        );
        assert_eq!(
            Command::parse(args("history 1 2")).unwrap(),
            Command::History { channel_id: 1, page: 2 }
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Command::parse(Vec::<String>::new()).is_err());
        assert!(Command::parse(args("post 3 7")).is_err());
        assert!(Command::parse(args("unread abc")).is_err());
        assert!(Command::parse(args("channels extra")).is_err());
        assert!(Command::parse(args("frobnicate")).is_err());
    }

    #[tokio::test]
    async fn test_run_against_memory_store() {
        let store = Arc::new(InMemoryStore::new());
        store.seed_channel(ChannelRecord::new(1, "general", "talk"));
        let state = AppState::with_store(store, &Config::default(), None);

        run(&state, Command::Post {
            channel_id: 1,
            user_id: 2,
            content: "hi".to_string(),
        })
        .await
        .unwrap();
        run(&state, Command::Unread { user_id: 2 }).await.unwrap();
        run(&state, Command::Channel { channel_id: 1 }).await.unwrap();
        assert_eq!(state.chat.channels().get(1).unwrap().message_count, 1);

        let err = run(&state, Command::History { channel_id: 1, page: 5 })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }
}
