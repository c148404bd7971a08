//! Line-oriented terminal front end for [`VendorChat`].

use crate::chat::{ChatSnapshot, VendorChat};
use crate::types::{ChatMessage, MentionKind, Role};
use anyhow::Result;
use std::io::{self, Write};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use tokio::io::{AsyncBufReadExt, BufReader};

const MESSAGE_TIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[hour repr:12 padding:zero]:[minute padding:zero] [period case:upper]");

const HELP: &str = "\
Commands:
  /chats              list conversations
  /switch <id>        open a conversation
  /new                start a new conversation
  /history            print the open conversation (loads older messages first)
  /find <query>       look up invoices or POs to tag
  /kind inv|po        kind used by /find
  /pick <n>           tag the n-th result of the last /find
  /tag <token>        tag @inv:<id> or @po:<id>
  /untag <token>      remove a tag
  /tags               show current tags
  /context [inv|po]   show the vendor's invoices or POs
  /select <id>        check or uncheck a row of /context
  /quit               leave
Anything else is sent to the assistant.";

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Send(String),
    Chats,
    Switch(String),
    New,
    History,
    Find(String),
    Kind(MentionKind),
    Pick(usize),
    Tag(String),
    Untag(String),
    Tags,
    Context(Option<MentionKind>),
    Select(String),
    Help,
    Quit,
    Empty,
    Invalid(String),
}

fn parse_kind(raw: &str) -> Option<MentionKind> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "inv" | "invoice" | "invoices" => Some(MentionKind::Invoice),
        "po" | "pos" => Some(MentionKind::PurchaseOrder),
        _ => None,
    }
}

pub fn parse_command(line: &str) -> Command {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Command::Empty;
    }
    let Some(rest) = line.trim_start().strip_prefix('/') else {
        return Command::Send(line.to_string());
    };
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    let required = |build: fn(String) -> Command| {
        if arg.is_empty() {
            Command::Invalid(format!("/{name} needs an argument"))
        } else {
            build(arg.to_string())
        }
    };
    match name {
        "chats" => Command::Chats,
        "switch" => required(Command::Switch),
        "new" => Command::New,
        "history" => Command::History,
        "find" => Command::Find(arg.to_string()),
        "kind" => match parse_kind(arg) {
            Some(kind) => Command::Kind(kind),
            None => Command::Invalid("usage: /kind inv|po".into()),
        },
        "pick" => match arg.parse::<usize>() {
            Ok(n) if n > 0 => Command::Pick(n),
            _ => Command::Invalid("usage: /pick <n>".into()),
        },
        "tag" => required(Command::Tag),
        "untag" => required(Command::Untag),
        "tags" => Command::Tags,
        "context" if arg.is_empty() => Command::Context(None),
        "context" => match parse_kind(arg) {
            Some(kind) => Command::Context(Some(kind)),
            None => Command::Invalid("usage: /context [inv|po]".into()),
        },
        "select" => required(Command::Select),
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => Command::Invalid(format!("unknown command /{other}, try /help")),
    }
}

/// Prints a reply as it grows. Each render is normally an extension of the
/// previous one; anything else (an error replacing partial text) is
/// reprinted on a fresh line.
#[derive(Default)]
struct ReplyPrinter {
    printed: String,
}

impl ReplyPrinter {
    fn render(&mut self, content: &str, out: &mut impl Write) -> io::Result<()> {
        match content.strip_prefix(self.printed.as_str()) {
            Some(rest) => write!(out, "{rest}")?,
            None => {
                writeln!(out)?;
                write!(out, "{content}")?;
            }
        }
        self.printed = content.to_string();
        out.flush()
    }
}

fn format_message_timestamp(timestamp: Option<OffsetDateTime>) -> Option<String> {
    let mut datetime = timestamp?;
    if let Ok(offset) = UtcOffset::current_local_offset() {
        datetime = datetime.to_offset(offset);
    }
    datetime.format(MESSAGE_TIME_FORMAT).ok()
}

fn format_message(msg: &ChatMessage) -> String {
    let who = match msg.role {
        Role::User => "you",
        Role::Assistant => "assistant",
        Role::System => "system",
    };
    let mut line = match format_message_timestamp(msg.created_at) {
        Some(time) => format!("[{time}] {who}: {}", msg.content),
        None => format!("{who}: {}", msg.content),
    };
    let tags: Vec<String> = msg
        .tags
        .invoices
        .iter()
        .map(|id| format!("@inv:{id}"))
        .chain(msg.tags.pos.iter().map(|id| format!("@po:{id}")))
        .collect();
    if !tags.is_empty() {
        line.push_str(&format!("\n    tags: {}", tags.join(" ")));
    }
    line
}

fn print_header(snapshot: &ChatSnapshot) {
    let name = snapshot
        .vendor
        .as_ref()
        .map(|vendor| vendor.display_name())
        .unwrap_or("Vendor");
    println!("Chat with {name}");
    match &snapshot.chat_id {
        Some(id) => println!("conversation {id} ({} messages)", snapshot.messages.len()),
        None => println!("no conversation available; try /new"),
    }
    println!("/help for commands");
}

fn print_chats(snapshot: &ChatSnapshot) {
    if snapshot.chats.is_empty() {
        println!("No chats");
        return;
    }
    for chat in &snapshot.chats {
        let marker = if snapshot.chat_id.as_deref() == Some(chat.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{marker} {}  {}", chat.id, chat.display_title());
    }
}

fn print_context(snapshot: &ChatSnapshot) {
    let Some(vendor) = &snapshot.vendor else {
        println!("Vendor details unavailable");
        return;
    };
    let checked = |id: &str| {
        if snapshot.selection.ids.iter().any(|selected| selected == id) {
            "[x]"
        } else {
            "[ ]"
        }
    };
    match snapshot.selection.kind {
        MentionKind::Invoice => {
            for inv in &vendor.invoices {
                let number = if inv.invoice_number.is_empty() {
                    &inv.id
                } else {
                    &inv.invoice_number
                };
                println!(
                    "{} {}  {number}  {} • {} • ${:.2}",
                    checked(&inv.id),
                    inv.id,
                    inv.date,
                    inv.status,
                    inv.amount
                );
            }
        }
        MentionKind::PurchaseOrder => {
            for po in &vendor.purchase_orders {
                let number = if po.po_number.is_empty() {
                    &po.id
                } else {
                    &po.po_number
                };
                println!(
                    "{} {}  {number}  {} • ${:.2}",
                    checked(&po.id),
                    po.id,
                    po.status,
                    po.total_amount
                );
            }
        }
    }
}

async fn send_and_render(chat: &VendorChat, text: String) -> Result<()> {
    chat.set_input(text);
    let mut revisions = chat.subscribe();
    let mut task = tokio::spawn({
        let chat = chat.clone();
        async move { chat.send().await }
    });

    let mut printer = ReplyPrinter::default();
    let mut stdout = io::stdout();
    let placeholder = loop {
        tokio::select! {
            joined = &mut task => break joined?,
            changed = revisions.changed() => {
                if changed.is_err() {
                    continue;
                }
                let snapshot = chat.snapshot();
                if let Some(msg) = snapshot.messages.last().filter(|msg| msg.streaming) {
                    printer.render(&msg.content, &mut stdout)?;
                }
            }
        }
    };

    match placeholder.and_then(|id| chat.snapshot().message(&id).cloned()) {
        Some(msg) => {
            printer.render(&msg.content, &mut stdout)?;
            println!();
        }
        None => println!("Nothing sent: type a message and make sure a conversation is open."),
    }
    Ok(())
}

async fn find_mentions(chat: &VendorChat, query: &str) {
    if !chat.set_input(format!("@{query}")) {
        println!("usage: /find <query> (single word)");
        return;
    }
    chat.refresh_mentions().await;
    chat.set_input(String::new());
    let snapshot = chat.snapshot();
    if snapshot.mention.items.is_empty() {
        println!("No matches");
        return;
    }
    println!("Tag {}:", snapshot.mention.kind.label());
    for (i, item) in snapshot.mention.items.iter().enumerate() {
        println!("  {}. {}  {}", i + 1, item.display_label(), item.describe());
    }
}

/// Reads commands from stdin until `/quit` or end of input.
pub async fn run(chat: &VendorChat) -> Result<()> {
    print_header(&chat.snapshot());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_command(&line) {
            Command::Empty => {}
            Command::Quit => break,
            Command::Help => println!("{HELP}"),
            Command::Invalid(message) => println!("{message}"),
            Command::Send(text) => send_and_render(chat, text).await?,
            Command::Chats => {
                chat.refresh_chats().await;
                print_chats(&chat.snapshot());
            }
            Command::Switch(id) => {
                if chat.switch_chat(&id).await {
                    print_header(&chat.snapshot());
                } else {
                    println!("Could not open {id}");
                }
            }
            Command::New => {
                if chat.new_chat().await {
                    print_header(&chat.snapshot());
                } else {
                    println!("Could not create a chat");
                }
            }
            Command::History => {
                chat.load_older().await;
                let snapshot = chat.snapshot();
                if snapshot.messages.is_empty() {
                    println!("No messages yet. Ask a question about this vendor.");
                }
                for msg in &snapshot.messages {
                    println!("{}", format_message(msg));
                }
            }
            Command::Find(query) => find_mentions(chat, &query).await,
            Command::Kind(kind) => {
                chat.set_mention_kind(kind);
                println!("/find now looks up {}", kind.label());
            }
            Command::Pick(n) => {
                let snapshot = chat.snapshot();
                match snapshot.mention.items.get(n - 1) {
                    Some(item) => {
                        chat.select_mention(&item.id);
                        println!("tags: {}", chat.tokens().join(" "));
                    }
                    None => println!("No result {n}"),
                }
            }
            Command::Tag(token) => {
                chat.add_token(token);
                println!("tags: {}", chat.tokens().join(" "));
            }
            Command::Untag(token) => {
                if !chat.remove_token(&token) {
                    println!("{token} was not tagged");
                }
                println!("tags: {}", chat.tokens().join(" "));
            }
            Command::Tags => println!("tags: {}", chat.tokens().join(" ")),
            Command::Context(kind) => {
                if let Some(kind) = kind {
                    chat.set_selection_kind(kind);
                }
                print_context(&chat.snapshot());
            }
            Command::Select(id) => {
                chat.toggle_selection(&id);
                println!("tags: {}", chat.tokens().join(" "));
            }
        }
    }
    Ok(())
}
