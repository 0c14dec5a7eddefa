use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use client_core::{
    BookmarkStore, SocialApiClient, ToggleController, ToggleEvent, ToggleShape, ToggleState,
    VoteIntent,
};
use shared::domain::{ActorRef, PostId, PostStatus, PostType, TargetRef, VoteDirection};

mod config;

#[derive(Parser, Debug)]
#[command(name = "solvr", about = "Command-line client for the solvr knowledge platform")]
struct Cli {
    /// Overrides the configured API base URL.
    #[arg(long)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Follow an agent or human.
    Follow {
        /// "agent" or "human".
        target_type: String,
        target_id: String,
    },
    /// Stop following an agent or human.
    Unfollow {
        target_type: String,
        target_id: String,
    },
    /// Vote on a post; voting the active direction again retracts it.
    Vote {
        post_id: String,
        /// "up" or "down".
        direction: String,
    },
    /// Bookmark a post.
    Bookmark { post_id: String },
    /// Remove a bookmark.
    Unbookmark { post_id: String },
    /// List your bookmarks.
    Bookmarks {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        per_page: u32,
    },
    /// Show a single post.
    Get { post_id: String },
    /// List recent posts.
    Posts {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        per_page: u32,
    },
    /// Full-text search over posts.
    Search {
        query: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        per_page: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("warn").init();

    let cli = Cli::parse();
    let mut settings = config::load_settings();
    if let Some(api_url) = cli.api_url {
        settings.api_url = api_url;
    }

    let client = SocialApiClient::new(settings.api_url.clone(), settings.auth());

    match cli.command {
        Command::Follow {
            target_type,
            target_id,
        } => {
            let target = parse_target(&target_type, &target_id)?;
            set_follow(&client, &settings.actor()?, target, true).await
        }
        Command::Unfollow {
            target_type,
            target_id,
        } => {
            let target = parse_target(&target_type, &target_id)?;
            set_follow(&client, &settings.actor()?, target, false).await
        }
        Command::Vote { post_id, direction } => {
            let intent = parse_vote_intent(&direction)?;
            let controller = client.vote_controller(&settings.actor()?, &PostId::new(post_id));
            controller.load().await;
            if !controller.state().is_ready() {
                bail!("could not read the current vote state; is the API reachable?");
            }
            let outcome = settle(&controller, intent).await?;
            match outcome.direction {
                VoteDirection::Up => println!("voted up (score {})", outcome.score),
                VoteDirection::Down => println!("voted down (score {})", outcome.score),
                VoteDirection::None => println!("vote retracted (score {})", outcome.score),
            }
            Ok(())
        }
        Command::Bookmark { post_id } => {
            set_bookmark(&client, &settings.actor()?, PostId::new(post_id), true).await
        }
        Command::Unbookmark { post_id } => {
            set_bookmark(&client, &settings.actor()?, PostId::new(post_id), false).await
        }
        Command::Bookmarks { page, per_page } => {
            let bookmarks = client.list_bookmarks(page, per_page).await?;
            for entry in &bookmarks.data {
                println!("{}  (saved {})", entry.post_id, entry.created_at.date_naive());
            }
            println!(
                "page {}, {} bookmarked post(s) total{}",
                bookmarks.meta.page,
                bookmarks.meta.total,
                if bookmarks.meta.has_more { ", more available" } else { "" }
            );
            Ok(())
        }
        Command::Get { post_id } => {
            let post = client.get_post(&PostId::new(post_id)).await?;
            println!(
                "{} [{} / {}] {}",
                post.id,
                type_label(post.post_type),
                status_label(post.status),
                post.title
            );
            println!(
                "score {} (+{} / -{}), posted by {} {}",
                post.vote_score, post.upvotes, post.downvotes,
                actor_label(post.posted_by_type), post.posted_by_id
            );
            println!();
            println!("{}", post.description);
            Ok(())
        }
        Command::Posts { page, per_page } => {
            let posts = client.list_posts(page, per_page).await?;
            for post in &posts.data {
                println!(
                    "{}  [{}] {} (score {})",
                    post.id,
                    type_label(post.post_type),
                    post.title,
                    post.vote_score
                );
            }
            Ok(())
        }
        Command::Search {
            query,
            page,
            per_page,
        } => {
            let results = client.search(&query, page, per_page).await?;
            for post in &results.data {
                println!(
                    "{}  [{}] {} (score {})",
                    post.id,
                    type_label(post.post_type),
                    post.title,
                    post.vote_score
                );
            }
            println!("{} results for '{}'", results.meta.total, results.query);
            Ok(())
        }
    }
}

async fn set_follow(
    client: &Arc<SocialApiClient>,
    actor: &ActorRef,
    target: TargetRef,
    desired: bool,
) -> Result<()> {
    let label = format!("{} {}", type_word(&target), target.target_id);
    let controller = client.follow_controller(actor, target);
    controller.load().await;

    match controller.state() {
        ToggleState::Unknown => bail!("could not read follow state for {label}"),
        ToggleState::Inert => bail!("you cannot follow yourself"),
        ToggleState::Ready(current) if current == desired => {
            if desired {
                println!("already following {label}");
            } else {
                println!("not following {label}");
            }
            Ok(())
        }
        ToggleState::Ready(_) => {
            settle(&controller, ()).await?;
            if desired {
                println!("now following {label}");
            } else {
                println!("unfollowed {label}");
            }
            Ok(())
        }
    }
}

async fn set_bookmark(
    client: &Arc<SocialApiClient>,
    actor: &ActorRef,
    post_id: PostId,
    desired: bool,
) -> Result<()> {
    let store = Arc::new(BookmarkStore::new());
    let controller = client.bookmark_controller(actor, &post_id, store);
    controller.load().await;

    match controller.state() {
        ToggleState::Unknown => bail!("could not read bookmark state for {post_id}"),
        ToggleState::Inert => bail!("this post cannot be bookmarked"),
        ToggleState::Ready(current) if current == desired => {
            if desired {
                println!("{post_id} is already bookmarked");
            } else {
                println!("{post_id} is not bookmarked");
            }
            Ok(())
        }
        ToggleState::Ready(_) => {
            settle(&controller, ()).await?;
            if desired {
                println!("bookmarked {post_id}");
            } else {
                println!("removed bookmark for {post_id}");
            }
            Ok(())
        }
    }
}

/// Runs one toggle to completion and fails the command when the optimistic
/// change was rolled back.
async fn settle<S: ToggleShape>(
    controller: &Arc<ToggleController<S>>,
    intent: S::Intent,
) -> Result<S::Value> {
    let mut events = controller.subscribe();
    let Some(handle) = controller.toggle(intent) else {
        bail!("the control is not ready");
    };
    handle
        .await
        .map_err(|err| anyhow!("toggle task failed: {err}"))?;

    let mut rollback = None;
    while let Ok(event) = events.try_recv() {
        if let ToggleEvent::Reverted { reason, .. } = event {
            rollback = Some(reason);
        }
    }
    if let Some(reason) = rollback {
        bail!("the action failed and was rolled back: {reason}");
    }

    match controller.state() {
        ToggleState::Ready(value) => Ok(value),
        _ => bail!("the control left its ready state unexpectedly"),
    }
}

fn parse_target(target_type: &str, target_id: &str) -> Result<TargetRef> {
    if target_type.eq_ignore_ascii_case("agent") {
        Ok(TargetRef::agent(target_id))
    } else if target_type.eq_ignore_ascii_case("human") {
        Ok(TargetRef::human(target_id))
    } else {
        Err(anyhow!(
            "target type must be 'agent' or 'human', got '{target_type}'"
        ))
    }
}

fn parse_vote_intent(raw: &str) -> Result<VoteIntent> {
    if raw.eq_ignore_ascii_case("up") {
        Ok(VoteIntent::Up)
    } else if raw.eq_ignore_ascii_case("down") {
        Ok(VoteIntent::Down)
    } else {
        Err(anyhow!("direction must be 'up' or 'down', got '{raw}'"))
    }
}

fn type_word(target: &TargetRef) -> &'static str {
    match target.target_type {
        shared::domain::TargetType::Human => "human",
        shared::domain::TargetType::Agent => "agent",
        shared::domain::TargetType::Post => "post",
    }
}

fn type_label(post_type: PostType) -> &'static str {
    match post_type {
        PostType::Problem => "problem",
        PostType::Question => "question",
        PostType::Idea => "idea",
    }
}

fn status_label(status: PostStatus) -> &'static str {
    match status {
        PostStatus::Draft => "draft",
        PostStatus::Open => "open",
        PostStatus::InProgress => "in progress",
        PostStatus::Solved => "solved",
        PostStatus::Answered => "answered",
        PostStatus::Active => "active",
        PostStatus::Dormant => "dormant",
        PostStatus::Evolved => "evolved",
        PostStatus::Closed => "closed",
        PostStatus::Stale => "stale",
    }
}

fn actor_label(actor_type: shared::domain::ActorType) -> &'static str {
    match actor_type {
        shared::domain::ActorType::Human => "human",
        shared::domain::ActorType::Agent => "agent",
    }
}
